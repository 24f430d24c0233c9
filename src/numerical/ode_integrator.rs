//! Explicit fixed-step integrators used to simulate discovered ODE systems on a prediction grid.
//!
//! Example
//! ```
//! use nalgebra::DVector;
//! use RustedEqBench::numerical::ode_integrator::{IntegratorKind, OdeIntegrator};
//! // y' = -y, y(0) = 1
//! let rhs = Box::new(|_t: f64, y: &DVector<f64>| -y.clone());
//! let mut solver = OdeIntegrator::new(IntegratorKind::RK4, rhs, DVector::from_vec(vec![1.0]), 0.0);
//! solver.set_max_step(1e-2);
//! let y = solver.integrate_on_grid(&[0.0, 0.5, 1.0]).unwrap();
//! assert!((y[(2, 0)] - (-1.0f64).exp()).abs() < 1e-8);
//! ```
use crate::errors::{BenchError, Result};
use log::{debug, info};
use nalgebra::{DMatrix, DVector};
use std::collections::VecDeque;
use std::time::Instant;
use strum_macros::{Display, EnumIter, EnumString};

pub type RhsFn = Box<dyn Fn(f64, &DVector<f64>) -> DVector<f64>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, EnumIter)]
#[strum(ascii_case_insensitive)]
pub enum IntegratorKind {
    RK4,
    DOPRI,
    AB4,
}

trait Stepper {
    /// advance `y` from `t` to `t + h`
    fn step(&mut self, f: &RhsFn, t: f64, y: &DVector<f64>, h: f64) -> DVector<f64>;
}

pub struct RK4;

impl Stepper for RK4 {
    fn step(&mut self, f: &RhsFn, t: f64, y: &DVector<f64>, h: f64) -> DVector<f64> {
        let k1 = f(t, y);
        let k2 = f(t + 0.5 * h, &(y + 0.5 * h * &k1));
        let k3 = f(t + 0.5 * h, &(y + 0.5 * h * &k2));
        let k4 = f(t + h, &(y + h * &k3));
        y + (h / 6.0) * (k1 + 2.0 * k2 + 2.0 * k3 + k4)
    }
}

pub struct DormandPrince;

impl Stepper for DormandPrince {
    fn step(&mut self, f: &RhsFn, t: f64, y: &DVector<f64>, h: f64) -> DVector<f64> {
        // Butcher tableau coefficients for Dormand-Prince 5(4), fifth order solution
        let a: [[f64; 6]; 6] = [
            [1.0 / 5.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            [3.0 / 40.0, 9.0 / 40.0, 0.0, 0.0, 0.0, 0.0],
            [44.0 / 45.0, -56.0 / 15.0, 32.0 / 9.0, 0.0, 0.0, 0.0],
            [
                19372.0 / 6561.0,
                -25360.0 / 2187.0,
                64448.0 / 6561.0,
                -212.0 / 729.0,
                0.0,
                0.0,
            ],
            [
                9017.0 / 3168.0,
                -355.0 / 33.0,
                46732.0 / 5247.0,
                49.0 / 176.0,
                -5103.0 / 18656.0,
                0.0,
            ],
            [
                35.0 / 384.0,
                0.0,
                500.0 / 1113.0,
                125.0 / 192.0,
                -2187.0 / 6784.0,
                11.0 / 84.0,
            ],
        ];
        let c = [0.0, 1.0 / 5.0, 3.0 / 10.0, 4.0 / 5.0, 8.0 / 9.0, 1.0];
        let b = a[5];

        let mut k: Vec<DVector<f64>> = Vec::with_capacity(6);
        k.push(f(t, y));
        for i in 1..6 {
            let mut y_temp = y.clone();
            for j in 0..i {
                y_temp += h * a[i - 1][j] * &k[j];
            }
            k.push(f(t + c[i] * h, &y_temp));
        }
        let mut y_next = y.clone();
        for i in 0..6 {
            y_next += h * b[i] * &k[i];
        }
        y_next
    }
}

/// four-step Adams-Bashforth; the first three steps (and every step after a change of h) are bootstrapped with RK4
pub struct AdamsBashforth4 {
    f_history: VecDeque<DVector<f64>>,
    h_prev: Option<f64>,
}

impl AdamsBashforth4 {
    pub fn new() -> AdamsBashforth4 {
        AdamsBashforth4 {
            f_history: VecDeque::with_capacity(4),
            h_prev: None,
        }
    }
}

impl Default for AdamsBashforth4 {
    fn default() -> Self {
        Self::new()
    }
}

impl Stepper for AdamsBashforth4 {
    fn step(&mut self, f: &RhsFn, t: f64, y: &DVector<f64>, h: f64) -> DVector<f64> {
        if let Some(h_prev) = self.h_prev {
            if (h - h_prev).abs() > 1e-12 * h.abs().max(1.0) {
                self.f_history.clear();
            }
        }
        self.h_prev = Some(h);
        self.f_history.push_back(f(t, y));
        if self.f_history.len() > 4 {
            self.f_history.pop_front();
        }
        if self.f_history.len() < 4 {
            return RK4.step(f, t, y, h);
        }
        let f_n = &self.f_history[3];
        let f_n1 = &self.f_history[2];
        let f_n2 = &self.f_history[1];
        let f_n3 = &self.f_history[0];
        y + (h / 24.0) * (55.0 * f_n - 59.0 * f_n1 + 37.0 * f_n2 - 9.0 * f_n3)
    }
}

pub enum Solvers {
    RK4(RK4),
    DOPRI(DormandPrince),
    AB4(AdamsBashforth4),
}

impl Solvers {
    pub fn new(kind: IntegratorKind) -> Solvers {
        match kind {
            IntegratorKind::RK4 => Solvers::RK4(RK4),
            IntegratorKind::DOPRI => Solvers::DOPRI(DormandPrince),
            IntegratorKind::AB4 => Solvers::AB4(AdamsBashforth4::new()),
        }
    }

    fn step(&mut self, f: &RhsFn, t: f64, y: &DVector<f64>, h: f64) -> DVector<f64> {
        match self {
            Solvers::RK4(rk4) => rk4.step(f, t, y, h),
            Solvers::DOPRI(dopri) => dopri.step(f, t, y, h),
            Solvers::AB4(ab4) => ab4.step(f, t, y, h),
        }
    }
}

pub struct OdeIntegrator {
    rhs: RhsFn,
    kind: IntegratorKind,
    solver_instance: Solvers,
    t0: f64,
    y0: DVector<f64>,
    max_step: f64,
}

impl OdeIntegrator {
    pub fn new(kind: IntegratorKind, rhs: RhsFn, y0: DVector<f64>, t0: f64) -> OdeIntegrator {
        OdeIntegrator {
            rhs,
            kind,
            solver_instance: Solvers::new(kind),
            t0,
            y0,
            max_step: 1e-3,
        }
    }

    /// upper bound of the internal step; every grid interval is split into equal sub-steps not exceeding it
    pub fn set_max_step(&mut self, max_step: f64) {
        self.max_step = max_step;
    }

    /// integrate from (t0, y0) through every point of a strictly increasing grid starting at or after t0.
    /// Returns one row per grid point.
    pub fn integrate_on_grid(&mut self, grid: &[f64]) -> Result<DMatrix<f64>> {
        let start = Instant::now();
        if grid.is_empty() {
            return Err(BenchError::ShapeMismatch("empty integration grid".to_string()));
        }
        if grid.windows(2).any(|w| w[1] <= w[0]) || grid[0] < self.t0 {
            return Err(BenchError::ShapeMismatch(
                "integration grid must be strictly increasing and start at or after t0".to_string(),
            ));
        }
        if !(self.max_step > 0.0) {
            return Err(BenchError::IntegrationFailed(format!(
                "max_step must be positive, got {}",
                self.max_step
            )));
        }
        self.solver_instance = Solvers::new(self.kind);

        let n_vars = self.y0.len();
        let mut y_res = DMatrix::zeros(grid.len(), n_vars);
        let mut t = self.t0;
        let mut y = self.y0.clone();
        let mut n_steps: usize = 0;

        for (row, &t_target) in grid.iter().enumerate() {
            let span = t_target - t;
            if span > 0.0 {
                let n_sub = (span / self.max_step).ceil().max(1.0) as usize;
                let h = span / n_sub as f64;
                for _ in 0..n_sub {
                    y = self.solver_instance.step(&self.rhs, t, &y, h);
                    t += h;
                    n_steps += 1;
                    if y.iter().any(|v| !v.is_finite()) {
                        return Err(BenchError::IntegrationFailed(format!(
                            "non-finite state at t = {}",
                            t
                        )));
                    }
                }
                // remove the drift of the accumulated sum of sub-steps
                t = t_target;
            }
            y_res.set_row(row, &y.transpose());
        }
        debug!("{} integrator made {} steps", self.kind, n_steps);
        info!(
            "integration with {} took {} milliseconds",
            self.kind,
            start.elapsed().as_millis()
        );
        Ok(y_res)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    fn decay() -> RhsFn {
        Box::new(|_t, y| -y.clone())
    }

    fn oscillator() -> RhsFn {
        Box::new(|_t, y| DVector::from_vec(vec![y[1], -y[0]]))
    }

    #[test]
    fn test_all_methods_exponential_decay() {
        for kind in IntegratorKind::iter() {
            let mut solver = OdeIntegrator::new(kind, decay(), DVector::from_vec(vec![1.0]), 0.0);
            solver.set_max_step(1e-3);
            let grid: Vec<f64> = (0..=10).map(|i| i as f64 * 0.1).collect();
            let y = solver.integrate_on_grid(&grid).unwrap();
            assert_eq!(y.nrows(), 11);
            for (i, t) in grid.iter().enumerate() {
                assert_relative_eq!(y[(i, 0)], (-t).exp(), epsilon = 1e-8);
            }
        }
    }

    #[test]
    fn test_oscillator_keeps_energy() {
        let mut solver = OdeIntegrator::new(
            IntegratorKind::DOPRI,
            oscillator(),
            DVector::from_vec(vec![1.0, 0.0]),
            0.0,
        );
        solver.set_max_step(1e-2);
        let grid = [0.0, std::f64::consts::PI, 2.0 * std::f64::consts::PI];
        let y = solver.integrate_on_grid(&grid).unwrap();
        assert_relative_eq!(y[(1, 0)], -1.0, epsilon = 1e-8);
        assert_relative_eq!(y[(2, 0)], 1.0, epsilon = 1e-8);
        assert_relative_eq!(y[(2, 1)], 0.0, epsilon = 1e-8);
        assert_eq!(y.nrows(), 3);
    }

    #[test]
    fn test_grid_starting_after_t0() {
        let mut solver = OdeIntegrator::new(IntegratorKind::RK4, decay(), DVector::from_vec(vec![1.0]), 0.0);
        solver.set_max_step(1e-3);
        let y = solver.integrate_on_grid(&[1.0, 2.0]).unwrap();
        assert_relative_eq!(y[(0, 0)], (-1.0f64).exp(), epsilon = 1e-9);
        assert_relative_eq!(y[(1, 0)], (-2.0f64).exp(), epsilon = 1e-9);
    }

    #[test]
    fn test_bad_grids_and_blow_up() {
        let mut solver = OdeIntegrator::new(IntegratorKind::RK4, decay(), DVector::from_vec(vec![1.0]), 0.0);
        assert!(solver.integrate_on_grid(&[]).is_err());
        assert!(solver.integrate_on_grid(&[0.0, 0.5, 0.2]).is_err());

        // y' = y^2 blows up at t = 1
        let blow_up: RhsFn = Box::new(|_t, y| y.component_mul(y));
        let mut solver = OdeIntegrator::new(IntegratorKind::RK4, blow_up, DVector::from_vec(vec![1.0]), 0.0);
        solver.set_max_step(1e-2);
        let res = solver.integrate_on_grid(&[0.0, 5.0]);
        assert!(matches!(res, Err(BenchError::IntegrationFailed(_))));
    }

    #[test]
    fn test_kind_from_str() {
        assert_eq!(IntegratorKind::from_str("dopri").unwrap(), IntegratorKind::DOPRI);
        assert_eq!(IntegratorKind::AB4.to_string(), "AB4");
        assert!(IntegratorKind::from_str("BDF").is_err());
    }
}
