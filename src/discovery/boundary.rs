//! Boundary-condition value object handed to the prediction routine of the search engine.
//!
//! A condition is created with its axis, key, the term it constrains, power and variable index,
//! then receives the coordinates of its points and the values there, and is finally materialized
//! into a [`SolverCondition`].
use crate::errors::{BenchError, Result};
use ndarray::{Array1, Array2};

#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryCondition {
    pub axis: usize,
    pub key: String,
    /// differentiation axes of the constrained term, `[None]` for the variable itself
    pub term: Vec<Option<usize>>,
    pub power: f64,
    pub var: usize,
    grid: Option<Array2<f64>>,
    values: Option<Array1<f64>>,
}

/// solver-ready condition: one row of coordinates per value
#[derive(Debug, Clone, PartialEq)]
pub struct SolverCondition {
    pub axis: usize,
    pub key: String,
    pub term: Vec<Option<usize>>,
    pub power: f64,
    pub var: usize,
    pub grid: Array2<f64>,
    pub values: Array1<f64>,
}

impl BoundaryCondition {
    pub fn new(axis: usize, key: &str, term: Vec<Option<usize>>, power: f64, var: usize) -> Self {
        BoundaryCondition {
            axis,
            key: key.to_string(),
            term,
            power,
            var,
            grid: None,
            values: None,
        }
    }

    pub fn set_grid(&mut self, grid: Array2<f64>) {
        self.grid = Some(grid);
    }

    pub fn set_values(&mut self, values: Array1<f64>) {
        self.values = Some(values);
    }

    pub fn materialize(&self) -> Result<SolverCondition> {
        let (grid, values) = match (&self.grid, &self.values) {
            (Some(g), Some(v)) => (g, v),
            _ => {
                return Err(BenchError::ShapeMismatch(format!(
                    "boundary condition '{}' needs both grid and values",
                    self.key
                )));
            }
        };
        if grid.nrows() != values.len() {
            return Err(BenchError::ShapeMismatch(format!(
                "boundary condition '{}': {} grid points but {} values",
                self.key,
                grid.nrows(),
                values.len()
            )));
        }
        Ok(SolverCondition {
            axis: self.axis,
            key: self.key.clone(),
            term: self.term.clone(),
            power: self.power,
            var: self.var,
            grid: grid.clone(),
            values: values.clone(),
        })
    }
}

/// every pair (a_i, b_j), `a` varying slowest
pub fn cartesian_prod(a: &Array1<f64>, b: &Array1<f64>) -> Array2<f64> {
    let mut out = Array2::zeros((a.len() * b.len(), 2));
    for (i, &ai) in a.iter().enumerate() {
        for (j, &bj) in b.iter().enumerate() {
            let row = i * b.len() + j;
            out[[row, 0]] = ai;
            out[[row, 1]] = bj;
        }
    }
    out
}

/// value of variable `var` at a single time point, the initial condition of an ODE system
pub fn ode_initial_condition(key: &str, var: usize, t0: f64, value: f64) -> Result<SolverCondition> {
    let mut bc = BoundaryCondition::new(0, key, vec![None], 1.0, var);
    bc.set_grid(Array2::from_elem((1, 1), t0));
    bc.set_values(Array1::from_elem(1, value));
    bc.materialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_materialize() {
        let mut bc = BoundaryCondition::new(1, "u_x1", vec![None], 1.0, 0);
        assert!(bc.materialize().is_err());
        bc.set_grid(array![[0.5, 0.0], [0.6, 0.0]]);
        assert!(bc.materialize().is_err());
        bc.set_values(array![1.0, 2.0]);
        let cond = bc.materialize().unwrap();
        assert_eq!(cond.axis, 1);
        assert_eq!(cond.key, "u_x1");
        assert_eq!(cond.values, array![1.0, 2.0]);
    }

    #[test]
    fn test_row_count_mismatch() {
        let mut bc = BoundaryCondition::new(0, "dudt", vec![Some(0)], 1.0, 0);
        bc.set_grid(array![[0.5, 0.0]]);
        bc.set_values(array![1.0, 2.0]);
        assert!(matches!(bc.materialize(), Err(BenchError::ShapeMismatch(_))));
    }

    #[test]
    fn test_cartesian_prod() {
        let p = cartesian_prod(&array![1.0, 2.0], &array![10.0, 20.0, 30.0]);
        assert_eq!(p.dim(), (6, 2));
        assert_eq!(p.row(0).to_vec(), vec![1.0, 10.0]);
        assert_eq!(p.row(2).to_vec(), vec![1.0, 30.0]);
        assert_eq!(p.row(3).to_vec(), vec![2.0, 10.0]);
    }

    #[test]
    fn test_ode_initial_condition() {
        let c = ode_initial_condition("v", 1, 3.0, 0.25).unwrap();
        assert_eq!(c.var, 1);
        assert_eq!(c.grid[[0, 0]], 3.0);
        assert_eq!(c.values[0], 0.25);
        assert_eq!(c.term, vec![None]);
    }
}
