//! Nested record of an experiment: per run key the discovered system, the (method, noise magnitude)
//! aggregation key and the prediction error. The record is written once, as pretty JSON, at the end of
//! the whole run.
use crate::discovery::equation::{EquationSystem, TokenPool, fmt_number};
use crate::errors::Result;
use chrono::Local;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use strum_macros::{Display, EnumIter, EnumString};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PredictionError {
    Scalar(f64),
    PerVariable(Vec<f64>),
}

impl PredictionError {
    pub fn components(&self) -> Vec<f64> {
        match self {
            PredictionError::Scalar(e) => vec![*e],
            PredictionError::PerVariable(e) => e.clone(),
        }
    }

    pub fn total(&self) -> f64 {
        self.components().iter().sum()
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    Epde,
    Sindy,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AggregationKey {
    pub method: Method,
    pub magnitude: f64,
}

impl AggregationKey {
    pub fn new(method: Method, magnitude: f64) -> AggregationKey {
        AggregationKey { method, magnitude }
    }

    /// `epde__0.01`
    pub fn label(&self) -> String {
        format!("{}__{}", self.method, fmt_number(self.magnitude))
    }

    /// `epde__0_01`
    pub fn file_stem(&self) -> String {
        self.label().replace('.', "_")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub equations: BTreeMap<String, String>,
    pub aggregation_key: AggregationKey,
    pub error: PredictionError,
}

#[derive(Serialize)]
struct LogDocument<'a> {
    name: String,
    timestamp: String,
    referential_equations: &'a BTreeMap<String, String>,
    pool: &'a [String],
    entries: &'a BTreeMap<String, LogEntry>,
    aggregated: BTreeMap<String, Vec<(String, PredictionError)>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentLog {
    path: PathBuf,
    referential: BTreeMap<String, String>,
    pool: Vec<String>,
    entries: BTreeMap<String, LogEntry>,
}

impl ExperimentLog {
    pub fn new(path: &Path, referential: BTreeMap<String, String>, pool: Option<&TokenPool>) -> ExperimentLog {
        ExperimentLog {
            path: path.to_path_buf(),
            referential,
            pool: pool
                .map(|p| p.labels().cloned().collect())
                .unwrap_or_default(),
            entries: BTreeMap::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn add_log(
        &mut self,
        key: &str,
        system: &EquationSystem,
        aggregation_key: AggregationKey,
        error: PredictionError,
    ) {
        let entry = LogEntry {
            equations: system
                .equations
                .iter()
                .map(|(var, eq)| (var.clone(), eq.to_string()))
                .collect(),
            aggregation_key,
            error,
        };
        if self.entries.insert(key.to_string(), entry).is_some() {
            warn!("log entry '{}' overwritten", key);
        }
    }

    pub fn entries(&self) -> &BTreeMap<String, LogEntry> {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// errors grouped by aggregation key, every group ordered by entry key
    pub fn aggregate(&self) -> BTreeMap<String, Vec<(String, PredictionError)>> {
        let mut groups: BTreeMap<String, Vec<(String, PredictionError)>> = BTreeMap::new();
        for (key, entry) in &self.entries {
            groups
                .entry(entry.aggregation_key.label())
                .or_default()
                .push((key.clone(), entry.error.clone()));
        }
        groups
    }

    /// component-wise mean error of every group
    pub fn mean_errors(&self) -> BTreeMap<String, Vec<f64>> {
        self.aggregate()
            .into_iter()
            .map(|(label, errors)| {
                let n = errors.len() as f64;
                let width = errors.iter().map(|(_, e)| e.components().len()).max().unwrap_or(0);
                let mut sums = vec![0.0; width];
                for (_, e) in &errors {
                    for (s, c) in sums.iter_mut().zip(e.components()) {
                        *s += c;
                    }
                }
                (label, sums.into_iter().map(|s| s / n).collect())
            })
            .collect()
    }

    pub fn to_json(&self) -> Result<String> {
        let document = LogDocument {
            name: self
                .path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default(),
            timestamp: Local::now().to_rfc3339(),
            referential_equations: &self.referential,
            pool: &self.pool,
            entries: &self.entries,
            aggregated: self.aggregate(),
        };
        Ok(serde_json::to_string_pretty(&document)?)
    }

    pub fn dump(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.path, self.to_json()?)?;
        info!("{} log entries written to {}", self.entries.len(), self.path.display());
        Ok(())
    }
}

/// log constructed on first use
#[derive(Debug, Default)]
pub struct LogHolder {
    log: Option<ExperimentLog>,
}

impl LogHolder {
    pub fn new() -> LogHolder {
        LogHolder { log: None }
    }

    pub fn is_initialized(&self) -> bool {
        self.log.is_some()
    }

    pub fn get_or_init<F: FnOnce() -> ExperimentLog>(&mut self, init: F) -> &mut ExperimentLog {
        self.log.get_or_insert_with(init)
    }

    pub fn into_inner(self) -> Option<ExperimentLog> {
        self.log
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::equation::parse_equation;
    use std::str::FromStr;
    use tempfile::tempdir;

    fn system(c: f64) -> EquationSystem {
        let text = format!("{} * u{{power: 1.0}} + 0.0 = du/dx1{{power: 1.0}}", fmt_number(c));
        EquationSystem::single("u", parse_equation(&text).unwrap())
    }

    fn records() -> Vec<(String, AggregationKey, PredictionError)> {
        vec![
            (
                "run_noise_0_attempt_0".to_string(),
                AggregationKey::new(Method::Epde, 0.0),
                PredictionError::PerVariable(vec![0.1, 0.2]),
            ),
            (
                "run_noise_0_attempt_1".to_string(),
                AggregationKey::new(Method::Epde, 0.0),
                PredictionError::PerVariable(vec![0.3, 0.4]),
            ),
            (
                "run_noise_0.01_attempt_0".to_string(),
                AggregationKey::new(Method::Epde, 0.01),
                PredictionError::PerVariable(vec![1.0, 2.0]),
            ),
            (
                "run_SINDy_noise_0.01_attempt_0".to_string(),
                AggregationKey::new(Method::Sindy, 0.01),
                PredictionError::Scalar(5.0),
            ),
        ]
    }

    fn log_from(order: &[usize]) -> ExperimentLog {
        log_at(Path::new("logs/test.json"), order)
    }

    fn log_at(path: &Path, order: &[usize]) -> ExperimentLog {
        let mut log = ExperimentLog::new(path, BTreeMap::new(), None);
        let recs = records();
        for &i in order {
            let (key, agg, err) = &recs[i];
            log.add_log(key, &system(i as f64 + 1.0), *agg, err.clone());
        }
        log
    }

    #[test]
    fn test_aggregation_independent_of_insertion_order() {
        let a = log_from(&[0, 1, 2, 3]);
        let b = log_from(&[3, 1, 0, 2]);
        assert_eq!(a.aggregate(), b.aggregate());
        assert_eq!(
            serde_json::to_string(a.entries()).unwrap(),
            serde_json::to_string(b.entries()).unwrap()
        );
        let groups = a.aggregate();
        assert_eq!(groups.len(), 3);
        assert_eq!(groups["epde__0.0"].len(), 2);
        assert_eq!(groups["sindy__0.01"][0].1, PredictionError::Scalar(5.0));
    }

    #[test]
    fn test_dumped_records_independent_of_insertion_order() {
        let dir = tempdir().unwrap();
        let first = dir.path().join("a").join("run.json");
        let second = dir.path().join("b").join("run.json");
        log_at(&first, &[0, 1, 2, 3]).dump().unwrap();
        log_at(&second, &[2, 3, 1, 0]).dump().unwrap();

        let read = |path: &Path| -> serde_json::Value {
            serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
        };
        let a = read(&first);
        let b = read(&second);
        assert_eq!(a["entries"], b["entries"]);
        assert_eq!(a["aggregated"], b["aggregated"]);
        assert_eq!(a["aggregated"]["epde__0.0"].as_array().unwrap().len(), 2);

        let entries: BTreeMap<String, LogEntry> = serde_json::from_value(b["entries"].clone()).unwrap();
        assert_eq!(entries.len(), records().len());
        for (key, agg, err) in records() {
            assert_eq!(entries[&key].error, err);
            assert_eq!(entries[&key].aggregation_key, agg);
        }
    }

    #[test]
    fn test_mean_errors() {
        let means = log_from(&[0, 1, 2, 3]).mean_errors();
        let epde0 = &means["epde__0.0"];
        assert!((epde0[0] - 0.2).abs() < 1e-12);
        assert!((epde0[1] - 0.3).abs() < 1e-12);
        assert_eq!(means["sindy__0.01"], vec![5.0]);
    }

    #[test]
    fn test_keys_and_method_names() {
        let key = AggregationKey::new(Method::Sindy, 0.025);
        assert_eq!(key.label(), "sindy__0.025");
        assert_eq!(key.file_stem(), "sindy__0_025");
        assert_eq!(Method::from_str("EPDE").unwrap(), Method::Epde);
        assert_eq!(serde_json::to_string(&Method::Epde).unwrap(), "\"epde\"");
    }

    #[test]
    fn test_untagged_error_serialization() {
        assert_eq!(serde_json::to_string(&PredictionError::Scalar(0.5)).unwrap(), "0.5");
        assert_eq!(
            serde_json::to_string(&PredictionError::PerVariable(vec![0.5, 1.0])).unwrap(),
            "[0.5,1.0]"
        );
        assert_eq!(PredictionError::PerVariable(vec![0.5, 1.0]).total(), 1.5);
    }

    #[test]
    fn test_dump() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("logs").join("lv.json");
        let mut referential = BTreeMap::new();
        referential.insert("u".to_string(), "1.0 * u{power: 1.0} + 0.0 = du/dx1{power: 1.0}".to_string());
        let pool = TokenPool::new(["u", "du/dx1"]);
        let mut log = ExperimentLog::new(&path, referential, Some(&pool));
        log.add_log("k", &system(2.0), AggregationKey::new(Method::Epde, 0.0), PredictionError::Scalar(0.1));
        log.dump().unwrap();

        let written: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["name"], "lv");
        assert_eq!(written["entries"]["k"]["aggregation_key"]["method"], "epde");
        assert_eq!(
            written["entries"]["k"]["equations"]["u"],
            "2.0 * u{power: 1.0} + 0.0 = du/dx1{power: 1.0}"
        );
        assert_eq!(written["pool"].as_array().unwrap().len(), 2);
        assert!(written["timestamp"].is_string());
    }

    #[test]
    fn test_log_holder_lazy_init() {
        let mut holder = LogHolder::new();
        assert!(!holder.is_initialized());
        let mut inits = 0;
        for i in 0..3 {
            let log = holder.get_or_init(|| {
                inits += 1;
                ExperimentLog::new(Path::new("x.json"), BTreeMap::new(), None)
            });
            log.add_log(
                &format!("k{}", i),
                &system(1.0),
                AggregationKey::new(Method::Epde, 0.0),
                PredictionError::Scalar(0.0),
            );
        }
        assert_eq!(inits, 1);
        assert!(holder.is_initialized());
        assert_eq!(holder.into_inner().unwrap().entries().len(), 3);
    }
}
