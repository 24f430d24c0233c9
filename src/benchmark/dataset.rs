//! Reference datasets: loading, train/test split and synthetic Lotka-Volterra data.
//!
//! Data files are plain numeric tables, comma or whitespace separated, `#` starts a comment line and an
//! optional non-numeric first line is taken as a header.
use crate::Utils::task_parser::TaskDocument;
use crate::errors::{BenchError, Result};
use crate::numerical::ode_integrator::{IntegratorKind, OdeIntegrator, RhsFn};
use csv::{ReaderBuilder, Trim, WriterBuilder};
use log::info;
use nalgebra::DVector;
use ndarray::{Array1, Array2, s};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// data files named in the `data` section of a task, resolved and checked once
#[derive(Debug, Clone, PartialEq)]
pub struct DataPaths {
    files: BTreeMap<String, PathBuf>,
}

impl DataPaths {
    pub fn from_task(task: &TaskDocument, keys: &[&str]) -> Result<DataPaths> {
        let mut files = BTreeMap::new();
        for key in keys {
            let path = task.get_path("data", key)?;
            if !path.exists() {
                return Err(BenchError::DataFileNotFound(path));
            }
            info!("data file '{}': {}", key, path.display());
            files.insert(key.to_string(), path);
        }
        Ok(DataPaths { files })
    }

    pub fn get(&self, key: &str) -> Result<&Path> {
        self.files
            .get(key)
            .map(PathBuf::as_path)
            .ok_or_else(|| BenchError::MissingTaskField {
                section: "data".to_string(),
                key: key.to_string(),
            })
    }
}

/// numeric table, one row per line
pub fn read_table(path: &Path) -> Result<Array2<f64>> {
    if !path.exists() {
        return Err(BenchError::DataFileNotFound(path.to_path_buf()));
    }
    let content = fs::read_to_string(path)?;
    let delimiter = if content.contains(',') { b',' } else { b' ' };
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .delimiter(delimiter)
        .comment(Some(b'#'))
        .flexible(true)
        .trim(Trim::All)
        .from_reader(content.as_bytes());

    let mut rows: Vec<Vec<f64>> = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record?;
        let fields: Vec<&str> = record.iter().filter(|f| !f.is_empty()).collect();
        if fields.is_empty() {
            continue;
        }
        let parsed: std::result::Result<Vec<f64>, _> = fields.iter().map(|f| f.parse::<f64>()).collect();
        match parsed {
            Ok(row) => rows.push(row),
            Err(_) if line == 0 => continue,
            Err(e) => {
                return Err(BenchError::ShapeMismatch(format!(
                    "{}: line {} is not numeric ({})",
                    path.display(),
                    line + 1,
                    e
                )));
            }
        }
    }
    let n_cols = rows.first().map_or(0, Vec::len);
    if rows.is_empty() || rows.iter().any(|r| r.len() != n_cols) {
        return Err(BenchError::ShapeMismatch(format!(
            "{} is empty or has rows of different length",
            path.display()
        )));
    }
    let n_rows = rows.len();
    Array2::from_shape_vec((n_rows, n_cols), rows.into_iter().flatten().collect())
        .map_err(|e| BenchError::ShapeMismatch(e.to_string()))
}

/// a table of any shape read as one vector
pub fn read_vector(path: &Path) -> Result<Array1<f64>> {
    let table = read_table(path)?;
    Ok(Array1::from_iter(table.iter().cloned()))
}

pub fn write_table(path: &Path, headers: &[&str], table: &Array2<f64>) -> Result<()> {
    let mut writer = WriterBuilder::new().from_path(path)?;
    if !headers.is_empty() {
        writer.write_record(headers)?;
    }
    for row in table.rows() {
        writer.write_record(row.iter().map(|v| v.to_string()))?;
    }
    writer.flush()?;
    Ok(())
}

/// time vector and the two-column (prey, predator) population table
pub fn load_lotka_volterra(t_file: &Path, data_file: &Path) -> Result<(Array1<f64>, Array2<f64>)> {
    let t = read_vector(t_file)?;
    let data = read_table(data_file)?;
    if data.ncols() != 2 || data.nrows() != t.len() {
        return Err(BenchError::ShapeMismatch(format!(
            "population table {:?} does not match {} time points and 2 species",
            data.shape(),
            t.len()
        )));
    }
    info!("Lotka-Volterra data: {} time points", t.len());
    Ok((t, data))
}

#[derive(Debug, Clone, PartialEq)]
pub struct BurgersData {
    pub t: Array1<f64>,
    pub x: Array1<f64>,
    /// rows along t, columns along x
    pub u: Array2<f64>,
}

impl BurgersData {
    pub fn dt(&self) -> f64 {
        self.t[1] - self.t[0]
    }

    pub fn dx(&self) -> f64 {
        self.x[1] - self.x[0]
    }
}

/// `usol` is stored with rows along x (as produced by the usual reference solvers) and is transposed;
/// a table already laid out along t is kept as is
pub fn load_burgers(t_file: &Path, x_file: &Path, usol_file: &Path) -> Result<BurgersData> {
    let t = read_vector(t_file)?;
    let x = read_vector(x_file)?;
    if t.len() < 2 || x.len() < 2 {
        return Err(BenchError::ShapeMismatch(
            "Burgers grids need at least two points on each axis".to_string(),
        ));
    }
    let usol = read_table(usol_file)?;
    let u = if usol.dim() == (x.len(), t.len()) {
        usol.reversed_axes().as_standard_layout().to_owned()
    } else if usol.dim() == (t.len(), x.len()) {
        usol
    } else {
        return Err(BenchError::ShapeMismatch(format!(
            "usol {:?} does not match t ({}) and x ({})",
            usol.shape(),
            t.len(),
            x.len()
        )));
    };
    Ok(BurgersData { t, x, u })
}

/// first `train_max` rows for training, the rest for testing
pub fn train_test_split(
    t: &Array1<f64>,
    data: &Array2<f64>,
    train_max: usize,
) -> Result<((Array1<f64>, Array2<f64>), (Array1<f64>, Array2<f64>))> {
    if data.nrows() != t.len() {
        return Err(BenchError::ShapeMismatch(format!(
            "{} time points but {} rows",
            t.len(),
            data.nrows()
        )));
    }
    if train_max == 0 || train_max >= t.len() {
        return Err(BenchError::InvalidTaskValue {
            section: "experiment".to_string(),
            key: "train_max".to_string(),
            value: train_max.to_string(),
        });
    }
    let train = (
        t.slice(s![..train_max]).to_owned(),
        data.slice(s![..train_max, ..]).to_owned(),
    );
    let test = (
        t.slice(s![train_max..]).to_owned(),
        data.slice(s![train_max.., ..]).to_owned(),
    );
    Ok((train, test))
}

/// u' = alpha u - beta u v, v' = -gamma v + delta u v
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LotkaVolterraParams {
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
    pub delta: f64,
    pub u0: f64,
    pub v0: f64,
}

impl Default for LotkaVolterraParams {
    fn default() -> Self {
        LotkaVolterraParams {
            alpha: 20.0,
            beta: 20.0,
            gamma: 20.0,
            delta: 20.0,
            u0: 4.0,
            v0: 2.0,
        }
    }
}

pub fn synthesize_lotka_volterra(params: &LotkaVolterraParams, t: &Array1<f64>) -> Result<Array2<f64>> {
    if t.is_empty() {
        return Err(BenchError::ShapeMismatch("empty time grid".to_string()));
    }
    let p = *params;
    let rhs: RhsFn = Box::new(move |_t, y: &DVector<f64>| {
        DVector::from_vec(vec![
            p.alpha * y[0] - p.beta * y[0] * y[1],
            -p.gamma * y[1] + p.delta * y[0] * y[1],
        ])
    });
    let mut integrator = OdeIntegrator::new(
        IntegratorKind::DOPRI,
        rhs,
        DVector::from_vec(vec![p.u0, p.v0]),
        t[0],
    );
    integrator.set_max_step(1e-4);
    let y = integrator.integrate_on_grid(&t.to_vec())?;
    Ok(Array2::from_shape_fn((y.nrows(), 2), |(i, j)| y[(i, j)]))
}
