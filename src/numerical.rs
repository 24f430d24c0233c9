/// explicit fixed-step IVP solvers (RK4, Dormand-Prince, Adams-Bashforth 4)
/// used to simulate discovered ODE systems
/// Example
/// ```
/// use nalgebra::DVector;
/// use RustedEqBench::numerical::ode_integrator::{IntegratorKind, OdeIntegrator, RhsFn};
/// // Lotka-Volterra: u' = 20u - 20uv, v' = -20v + 20uv
/// let rhs: RhsFn = Box::new(|_t, y| {
///     DVector::from_vec(vec![20.0 * y[0] - 20.0 * y[0] * y[1], -20.0 * y[1] + 20.0 * y[0] * y[1]])
/// });
/// let mut solver = OdeIntegrator::new(IntegratorKind::DOPRI, rhs, DVector::from_vec(vec![4.0, 2.0]), 0.0);
/// solver.set_max_step(1e-4);
/// let y = solver.integrate_on_grid(&[0.0, 0.05, 0.1]).unwrap();
/// assert_eq!(y.shape(), (3, 2));
/// ```
pub mod ode_integrator;
