//! Viscous Burgers' equation u_t = 0.1 u_xx - u u_x on a (t, x) grid.
//!
//! The driver loads and checks the field, validates the regression correspondence table and stops with
//! [`BenchError::NotImplemented`]: predicting a spatio-temporal field needs a PDE solver, which no engine
//! of this crate provides. The boundary conditions of the prediction are built by [`burgers_conditions`].
use crate::Utils::plots::heatmap;
use crate::Utils::task_parser::TaskDocument;
use crate::benchmark::dataset::{BurgersData, DataPaths, load_burgers};
use crate::benchmark::runner::ExperimentConfig;
use crate::discovery::boundary::{BoundaryCondition, SolverCondition, cartesian_prod};
use crate::discovery::selection::ComplexityRelaxation;
use crate::discovery::translator::{
    ConstantHandling, CorrespondenceTable, FactorUniverse, SindyTranslator,
};
use crate::errors::{BenchError, Result};
use log::{info, warn};
use ndarray::{Array1, s};
use std::collections::BTreeMap;

pub const REFERENCE_U: &str =
    "0.1 * d^2u/dx2^2{power: 1.0} + 1.0 * u{power: 1.0} * du/dx2{power: 1.0} + 0.0 = du/dx1{power: 1.0}";

pub fn referential() -> BTreeMap<String, String> {
    BTreeMap::from([("u".to_string(), REFERENCE_U.to_string())])
}

/// codes of the PDE library: u and its spatial derivatives up to the third order
pub fn default_correspondence() -> CorrespondenceTable {
    CorrespondenceTable::new([
        ("0", "u"),
        ("0_1", "du/dx2"),
        ("0_11", "d^2u/dx2^2"),
        ("0_111", "d^3u/dx2^3"),
    ])
}

/// complexity [4.5], relaxed by 0.5, four attempts
pub fn default_selection() -> (Vec<f64>, ComplexityRelaxation, usize) {
    (vec![4.5], ComplexityRelaxation::Leading { step: 0.5 }, 4)
}

/// backward difference of the field in time at the last training row
pub fn time_derivative_last_row(data: &BurgersData, train_max: usize) -> Result<Array1<f64>> {
    if train_max < 2 || train_max > data.t.len() {
        return Err(BenchError::InvalidTaskValue {
            section: "experiment".to_string(),
            key: "train_max".to_string(),
            value: train_max.to_string(),
        });
    }
    let last = data.u.row(train_max - 1);
    let prev = data.u.row(train_max - 2);
    let dt = data.t[train_max - 1] - data.t[train_max - 2];
    Ok((&last - &prev) / dt)
}

/// Conditions of the prediction on the test part `t[train_max..]`:
/// the field and its time derivative at the first test time, the field along both spatial edges
pub fn burgers_conditions(
    data: &BurgersData,
    train_max: usize,
    dudt: &Array1<f64>,
) -> Result<Vec<SolverCondition>> {
    let (n_t, n_x) = data.u.dim();
    if train_max == 0 || train_max >= n_t {
        return Err(BenchError::InvalidTaskValue {
            section: "experiment".to_string(),
            key: "train_max".to_string(),
            value: train_max.to_string(),
        });
    }
    if dudt.len() != n_x {
        return Err(BenchError::ShapeMismatch(format!(
            "time derivative has {} points, the grid has {}",
            dudt.len(),
            n_x
        )));
    }
    let t_first = Array1::from_elem(1, data.t[train_max]);
    let t_test = data.t.slice(s![train_max..]).to_owned();
    let bnd_t = cartesian_prod(&t_first, &data.x);
    let bnd_x1 = cartesian_prod(&t_test, &Array1::from_elem(1, data.x[0]));
    let bnd_x2 = cartesian_prod(&t_test, &Array1::from_elem(1, data.x[n_x - 1]));

    let mut bop_1 = BoundaryCondition::new(0, "u_t", vec![None], 1.0, 0);
    bop_1.set_grid(bnd_t.clone());
    bop_1.set_values(data.u.row(train_max).to_owned());

    let mut bop_2 = BoundaryCondition::new(0, "dudt", vec![Some(0)], 1.0, 0);
    bop_2.set_grid(bnd_t);
    bop_2.set_values(dudt.clone());

    let mut bop_3 = BoundaryCondition::new(1, "u_x1", vec![None], 1.0, 0);
    bop_3.set_grid(bnd_x1);
    bop_3.set_values(data.u.slice(s![train_max.., 0]).to_owned());

    let mut bop_4 = BoundaryCondition::new(1, "u_x2", vec![None], 1.0, 0);
    bop_4.set_grid(bnd_x2);
    bop_4.set_values(data.u.slice(s![train_max.., n_x - 1]).to_owned());

    [bop_1, bop_2, bop_3, bop_4]
        .iter()
        .map(BoundaryCondition::materialize)
        .collect()
}

/// translator of the PDE library, validated against every code the library can emit
pub fn burgers_translator(task: &TaskDocument) -> Result<SindyTranslator> {
    let table = match task.section("correspondence") {
        Some(section) => CorrespondenceTable::from_section(section)?,
        None => default_correspondence(),
    };
    let order = task.opt_usize("regression", "derivative_order")?.unwrap_or(3);
    SindyTranslator::new(
        table,
        &FactorUniverse::pde(1, order),
        ConstantHandling::Absent,
        "x1",
    )
}

pub fn run_burgers(task: &TaskDocument) -> Result<()> {
    let paths = DataPaths::from_task(task, &["t_file", "x_file", "usol_file"])?;
    let data = load_burgers(
        paths.get("t_file")?,
        paths.get("x_file")?,
        paths.get("usol_file")?,
    )?;
    info!("u: {:?}, t: {}, x: {}", data.u.shape(), data.t.len(), data.x.len());
    info!("dt = {}, dx = {}", data.dt(), data.dx());

    if let Some(dir) = task.opt_path("output", "plots")? {
        std::fs::create_dir_all(&dir)?;
        let path = dir.join("burgers_field.png");
        let area = (
            (data.t[0], data.t[data.t.len() - 1]),
            (data.x[0], data.x[data.x.len() - 1]),
        );
        if let Err(e) = heatmap(&path, &data.u, area, None, "u(t, x)") {
            warn!("plot {} failed: {}", path.display(), e);
        }
    }

    let config = ExperimentConfig::from_task(task, referential(), default_selection())?;
    let train_max = task.opt_usize("experiment", "train_max")?.unwrap_or(51);
    let dudt = time_derivative_last_row(&data, train_max)?;
    let conditions = burgers_conditions(&data, train_max, &dudt)?;
    info!(
        "{}: {} training rows, {} boundary conditions, magnitudes {:?}",
        config.name,
        train_max,
        conditions.len(),
        config.magnitudes
    );
    let translator = burgers_translator(task)?;
    info!(
        "correspondence table validated: {} codes",
        translator.table().codes().count()
    );
    Err(BenchError::NotImplemented(
        "Burgers sweep: prediction of a spatio-temporal field requires a PDE solver".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::benchmark::dataset::write_table;
    use crate::discovery::equation::parse_equation;
    use approx::assert_relative_eq;
    use ndarray::{Array2, array};
    use std::fs;
    use tempfile::tempdir;

    fn field() -> BurgersData {
        let t = array![0.0, 0.1, 0.2, 0.3, 0.4];
        let x = array![-1.0, 0.0, 1.0];
        let u = Array2::from_shape_fn((5, 3), |(i, j)| t[i] + 10.0 * x[j]);
        BurgersData { t, x, u }
    }

    #[test]
    fn test_reference_parses() {
        let eq = parse_equation(REFERENCE_U).unwrap();
        assert_eq!(eq.terms.len(), 2);
        assert_eq!(eq.rhs.label, "du/dx1");
    }

    #[test]
    fn test_time_derivative() {
        let data = field();
        let dudt = time_derivative_last_row(&data, 3).unwrap();
        for v in dudt.iter() {
            assert_relative_eq!(*v, 1.0, epsilon = 1e-12);
        }
        assert!(time_derivative_last_row(&data, 1).is_err());
    }

    #[test]
    fn test_four_conditions() {
        let data = field();
        let dudt = time_derivative_last_row(&data, 3).unwrap();
        let bcs = burgers_conditions(&data, 3, &dudt).unwrap();
        let keys: Vec<&str> = bcs.iter().map(|b| b.key.as_str()).collect();
        assert_eq!(keys, vec!["u_t", "dudt", "u_x1", "u_x2"]);

        // field at t = 0.3 on every x
        assert_eq!(bcs[0].grid, array![[0.3, -1.0], [0.3, 0.0], [0.3, 1.0]]);
        assert_eq!(bcs[0].values, array![0.3 - 10.0, 0.3, 0.3 + 10.0]);
        assert_eq!(bcs[1].term, vec![Some(0)]);
        assert_eq!(bcs[1].values.len(), 3);

        // left and right edges along the test times
        assert_eq!(bcs[2].axis, 1);
        assert_eq!(bcs[2].grid, array![[0.3, -1.0], [0.4, -1.0]]);
        assert_eq!(bcs[2].values, array![0.3 - 10.0, 0.4 - 10.0]);
        assert_eq!(bcs[3].grid.column(1).to_vec(), vec![1.0, 1.0]);
        assert_eq!(bcs[3].values, array![0.3 + 10.0, 0.4 + 10.0]);
    }

    #[test]
    fn test_conditions_reject_bad_split() {
        let data = field();
        let dudt = Array1::zeros(3);
        assert!(burgers_conditions(&data, 5, &dudt).is_err());
        assert!(burgers_conditions(&data, 2, &Array1::zeros(2)).is_err());
    }

    #[test]
    fn test_translator_for_pde_library() {
        let task = TaskDocument::parse("experiment\n  kind: burgers\n").unwrap();
        let translator = burgers_translator(&task).unwrap();
        let eq = translator.translate_equation("0.100 x0_11 + -1.000 x0 x0_1", "u").unwrap();
        assert_eq!(
            eq,
            "0.1 * d^2u/dx2^2{power: 1.0} + -1.0 * u{power: 1.0} * du/dx2{power: 1.0} + 0.0 = du/dx1{power: 1.0}"
        );
    }

    #[test]
    fn test_incomplete_table_is_fatal() {
        let task = TaskDocument::parse("correspondence\n  0: u\n  0_1: du/dx2\n").unwrap();
        match burgers_translator(&task) {
            Err(BenchError::IncompleteCorrespondence(missing)) => {
                assert_eq!(missing, vec!["0_11".to_string(), "0_111".to_string()])
            }
            other => panic!("expected an incomplete table, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_run_stops_after_loading() {
        let dir = tempdir().unwrap();
        let data = field();
        let col = |a: &Array1<f64>| Array2::from_shape_vec((a.len(), 1), a.to_vec()).unwrap();
        write_table(&dir.path().join("t.csv"), &["t"], &col(&data.t)).unwrap();
        write_table(&dir.path().join("x.csv"), &["x"], &col(&data.x)).unwrap();
        // stored along x, as reference solvers write it
        let usol = data.u.t().to_owned();
        write_table(&dir.path().join("usol.csv"), &["t0", "t1", "t2", "t3", "t4"], &usol).unwrap();
        let task_path = dir.path().join("burgers.task");
        fs::write(
            &task_path,
            "experiment\n  kind: burgers\n  train_max: 3\n  magnitudes: 0, 0.01\ndata\n  t_file: t.csv\n  x_file: x.csv\n  usol_file: usol.csv\n",
        )
        .unwrap();
        let task = TaskDocument::from_file(&task_path).unwrap();
        assert!(matches!(run_burgers(&task), Err(BenchError::NotImplemented(_))));
    }
}
