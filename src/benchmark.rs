/// relative Gaussian noise with reproducible seeding
pub mod noise;
/// reference data: CSV tables, train/test split, synthetic Lotka-Volterra data
pub mod dataset;
/// mean absolute error of predictions
pub mod metrics;
///____________________________________________________________________________________________________________________________
/// # Experiment log
/// keyed record of every discovered system with its prediction error, aggregated by (method, noise magnitude)
/// and written as one JSON document
///# Example
/// ```
/// use RustedEqBench::benchmark::experiment_log::{AggregationKey, ExperimentLog, Method, PredictionError};
/// use RustedEqBench::discovery::equation::{EquationSystem, parse_equation};
/// use std::collections::BTreeMap;
/// use std::path::Path;
/// let mut log = ExperimentLog::new(Path::new("logs/demo.json"), BTreeMap::new(), None);
/// let eq = parse_equation("-1.0 * u{power: 1.0} + 0.0 = du/dx1{power: 1.0}").unwrap();
/// let system = EquationSystem::single("u", eq);
/// log.add_log("run_0", &system, AggregationKey::new(Method::Epde, 0.0), PredictionError::Scalar(0.5));
/// log.add_log("run_1", &system, AggregationKey::new(Method::Epde, 0.0), PredictionError::Scalar(1.5));
/// assert_eq!(log.mean_errors()["epde__0.0"], vec![1.0]);
/// ```
/// ________________________________________________________________________________________________________________________________
pub mod experiment_log;
/// text files with the Pareto fronts of every launch
pub mod pareto;
/// noise sweep over discovery launches for time-series problems
pub mod runner;
/// predator-prey experiment
pub mod lotka_volterra;
/// Burgers' equation experiment
pub mod burgers;
