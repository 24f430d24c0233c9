//! Predator-prey benchmark: u' = 20u - 20uv, v' = -20v + 20uv.
//!
//! The population table is split at `train_max`, the training part is perturbed for every noise magnitude,
//! the discovered systems are predicted from the first test values and scored by the per-variable MAE.
use crate::Utils::task_parser::TaskDocument;
use crate::benchmark::dataset::{DataPaths, load_lotka_volterra, train_test_split};
use crate::benchmark::runner::{
    ExperimentConfig, ExperimentResults, ExperimentRunner, TimeSeriesProblem,
    initial_value_conditions,
};
use crate::discovery::engines::{RegressionParams, SearchParams, SparseRegression};
use crate::discovery::replay::{ReplayRegression, ReplaySearch};
use crate::discovery::selection::ComplexityRelaxation;
use crate::discovery::translator::{ConstantHandling, CorrespondenceTable, SindyTranslator};
use crate::errors::{BenchError, Result};
use log::info;
use std::collections::BTreeMap;
use std::str::FromStr;

pub const REFERENCE_U: &str =
    "20.0 * u{power: 1.0} + -20.0 * u{power: 1.0} * v{power: 1.0} + 0.0 = du/dx1{power: 1.0}";
pub const REFERENCE_V: &str =
    "-20.0 * v{power: 1.0} + 20.0 * u{power: 1.0} * v{power: 1.0} + 0.0 = dv/dx1{power: 1.0}";

pub fn referential() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("u".to_string(), REFERENCE_U.to_string()),
        ("v".to_string(), REFERENCE_V.to_string()),
    ])
}

/// regression codes of the two species and their time derivatives
pub fn default_correspondence() -> CorrespondenceTable {
    CorrespondenceTable::new([
        ("0", "u"),
        ("0_1", "du/dx1"),
        ("1", "v"),
        ("1_1", "dv/dx1"),
    ])
}

/// complexity [2.5, 2.5], components relaxed in turn by 1, four attempts
pub fn default_selection() -> (Vec<f64>, ComplexityRelaxation, usize) {
    (vec![2.5, 2.5], ComplexityRelaxation::Cyclic { step: 1.0 }, 4)
}

/// everything the run needs, read and validated before any data is touched
pub struct LotkaVolterraSetup {
    pub runner: ExperimentRunner,
    pub variable_names: Vec<String>,
    pub train_max: usize,
    pub search: ReplaySearch,
    pub regression: Option<ReplayRegression>,
}

pub fn setup(task: &TaskDocument) -> Result<LotkaVolterraSetup> {
    let config = ExperimentConfig::from_task(task, referential(), default_selection())?;
    let variable_names = match task.section("experiment").and_then(|s| s.get("variables")) {
        Some(_) => task.get_str_list("experiment", "variables")?,
        None => vec!["u".to_string(), "v".to_string()],
    };
    if variable_names.len() != 2 {
        return Err(BenchError::InvalidTaskValue {
            section: "experiment".to_string(),
            key: "variables".to_string(),
            value: variable_names.join(", "),
        });
    }
    let train_max = task.opt_usize("experiment", "train_max")?.unwrap_or(150);
    let search_params = SearchParams::from_task(task)?;
    let search = ReplaySearch::from_section(task.section("candidates").ok_or_else(|| {
        BenchError::MissingTaskField {
            section: "candidates".to_string(),
            key: "*".to_string(),
        }
    })?)?;

    let run_sindy = config.run_sindy;
    let mut runner = ExperimentRunner::new(config, search_params, initial_value_conditions);
    let mut regression = None;
    if run_sindy {
        let params = RegressionParams::from_task(task)?;
        let table = match task.section("correspondence") {
            Some(section) => CorrespondenceTable::from_section(section)?,
            None => default_correspondence(),
        };
        let constant = match task.opt_str("regression", "constant")? {
            Some(c) => ConstantHandling::from_str(&c).map_err(|_| BenchError::InvalidTaskValue {
                section: "regression".to_string(),
                key: "constant".to_string(),
                value: c.clone(),
            })?,
            None => ConstantHandling::Leading,
        };
        let translator = SindyTranslator::new(
            table.clone(),
            &params.library.universe(variable_names.len()),
            constant,
            "x1",
        )?;
        let equations = task.get_str_list("regression", "equations")?;
        regression = Some(ReplayRegression::new(
            equations,
            table,
            constant,
            variable_names.clone(),
        ));
        runner = runner.with_regression(params, translator);
    }
    Ok(LotkaVolterraSetup {
        runner,
        variable_names,
        train_max,
        search,
        regression,
    })
}

pub fn run_lotka_volterra(task: &TaskDocument) -> Result<ExperimentResults> {
    let LotkaVolterraSetup {
        runner,
        variable_names,
        train_max,
        mut search,
        mut regression,
    } = setup(task)?;
    let paths = DataPaths::from_task(task, &["t_file", "data_file"])?;
    let (t, data) = load_lotka_volterra(paths.get("t_file")?, paths.get("data_file")?)?;
    let (train, test) = train_test_split(&t, &data, train_max)?;
    let problem = TimeSeriesProblem::new(variable_names, train, test)?;
    info!(
        "{} training and {} test points",
        problem.t_train.len(),
        problem.t_test.len()
    );
    runner.run(
        &problem,
        &mut search,
        regression.as_mut().map(|r| r as &mut dyn SparseRegression),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::benchmark::dataset::{LotkaVolterraParams, synthesize_lotka_volterra, write_table};
    use crate::discovery::equation::parse_equation;
    use ndarray::{Array1, Array2};
    use std::fs;
    use tempfile::tempdir;

    fn task_text(run_sindy: bool) -> String {
        format!(
            r#"
experiment
  kind: lotka_volterra
  name: Lotka_Volterra
  train_max: 150
  magnitudes: 0, 0.01
  epde_launches: 1
  run_sindy: {}
  seed: 3
data
  t_file: t.csv
  data_file: data.csv
candidates
  c01: 3.5, 3.5, "u: {}", "v: {}"
regression
  library: polynomial
  optimizer: STLSQ
  sparsity: 50.0
  equations: "20.000 x0 + -20.000 x0 x1", "-20.000 x1 + 20.000 x0 x1"
output
  log: logs/lv.json
"#,
            run_sindy, REFERENCE_U, REFERENCE_V
        )
    }

    #[test]
    fn test_reference_equations_parse() {
        for eq in referential().values() {
            assert_eq!(parse_equation(eq).unwrap().terms.len(), 2);
        }
    }

    #[test]
    fn test_setup_reads_task() {
        let task = TaskDocument::parse(&task_text(true)).unwrap();
        let setup = setup(&task).unwrap();
        assert_eq!(setup.train_max, 150);
        assert_eq!(setup.variable_names, vec!["u".to_string(), "v".to_string()]);
        assert_eq!(setup.runner.config.magnitudes, vec![0.0, 0.01]);
        assert_eq!(setup.runner.config.initial_complexity, vec![2.5, 2.5]);
        assert_eq!(setup.runner.config.sparsity_thresholds, vec![50.0]);
        assert!(setup.regression.is_some());
        assert!(setup.runner.translator.is_some());
        assert_eq!(setup.search.candidates().len(), 1);
    }

    #[test]
    fn test_missing_data_file_is_reported() {
        let dir = tempdir().unwrap();
        let task_path = dir.path().join("lv.task");
        fs::write(&task_path, task_text(false)).unwrap();
        let task = TaskDocument::from_file(&task_path).unwrap();
        match run_lotka_volterra(&task) {
            Err(BenchError::DataFileNotFound(p)) => assert_eq!(p, dir.path().join("t.csv")),
            other => panic!("expected a missing file, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_full_run_on_synthetic_data() {
        let dir = tempdir().unwrap();
        let t = Array1::linspace(0.0, 0.2, 200);
        let data = synthesize_lotka_volterra(&LotkaVolterraParams::default(), &t).unwrap();
        let t_table = Array2::from_shape_vec((t.len(), 1), t.to_vec()).unwrap();
        write_table(&dir.path().join("t.csv"), &["t"], &t_table).unwrap();
        write_table(&dir.path().join("data.csv"), &["u", "v"], &data).unwrap();
        let task_path = dir.path().join("lv.task");
        fs::write(&task_path, task_text(true)).unwrap();

        let task = TaskDocument::from_file(&task_path).unwrap();
        let results = run_lotka_volterra(&task).unwrap();
        assert_eq!(results.per_magnitude.len(), 2);
        let first = &results.per_magnitude[0];
        // the replayed candidate is the generating system: prediction error is integration error only
        assert!(first.epde_errors[0].iter().all(|e| *e < 1e-3));
        assert!(first.sindy_errors[0].iter().all(|e| *e < 1e-3));
        assert!(dir.path().join("logs").join("lv.json").exists());
        assert_eq!(results.log.unwrap().entries().len(), 4);
    }
}
