//! Sweep over noise magnitudes and launches for time-series problems.
//!
//! For every magnitude the training part of the data is perturbed once, then
//! * the evolutionary search is fitted `epde_launches` times, an equation of bounded complexity is selected,
//!   predicted on the test interval from the conditions built out of the test data and scored per variable;
//! * optionally the sparse regression is fitted for every sparsity value, its equations are translated into
//!   the token notation, the model is simulated on the test interval and the best run is kept.
//!
//! Every scored run is recorded in one experiment log which is written once, after the last magnitude.
use crate::Utils::logger::save_prediction_to_csv;
use crate::Utils::plots::plot_series;
use crate::Utils::task_parser::TaskDocument;
use crate::benchmark::experiment_log::{
    AggregationKey, ExperimentLog, LogHolder, Method, PredictionError,
};
use crate::benchmark::metrics::per_column_mae;
use crate::benchmark::noise::{add_relative_noise, seeded_rng};
use crate::benchmark::pareto::{ParetoRecord, write_pareto};
use crate::discovery::boundary::{SolverCondition, ode_initial_condition};
use crate::discovery::engines::{
    EvolutionarySearch, PredictionGrid, RegressionParams, SearchParams, SparseRegression,
    TrainingData,
};
use crate::discovery::equation::{EquationSystem, TokenPool, fmt_number};
use crate::discovery::selection::{ComplexityRelaxation, select_by_complexity};
use crate::discovery::translator::SindyTranslator;
use crate::errors::{BenchError, Result};
use log::{info, warn};
use ndarray::{Array1, Array2};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tabled::{builder::Builder, settings::Style};

/// conditions for the prediction on the test interval
pub type ConditionBuilder = fn(&TimeSeriesProblem) -> Result<Vec<SolverCondition>>;

/// value of every variable at the first test time
pub fn initial_value_conditions(problem: &TimeSeriesProblem) -> Result<Vec<SolverCondition>> {
    let t0 = problem.t_test[0];
    problem
        .variable_names
        .iter()
        .enumerate()
        .map(|(var, name)| ode_initial_condition(name, var, t0, problem.test[[0, var]]))
        .collect()
}

pub fn elapsed_time(elapsed: Duration) -> (String, f64) {
    let time = elapsed.as_millis();
    if time < 1000 {
        (" ms".to_string(), time as f64)
    } else if time < 60_000 {
        (" s".to_string(), elapsed.as_secs_f64())
    } else {
        (" min".to_string(), elapsed.as_secs_f64() / 60.0)
    }
}

/// data of an ODE benchmark split into training and test intervals
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeriesProblem {
    pub variable_names: Vec<String>,
    pub t_train: Array1<f64>,
    pub train: Array2<f64>,
    pub t_test: Array1<f64>,
    pub test: Array2<f64>,
}

impl TimeSeriesProblem {
    pub fn new(
        variable_names: Vec<String>,
        (t_train, train): (Array1<f64>, Array2<f64>),
        (t_test, test): (Array1<f64>, Array2<f64>),
    ) -> Result<TimeSeriesProblem> {
        let n = variable_names.len();
        if train.ncols() != n || test.ncols() != n {
            return Err(BenchError::ShapeMismatch(format!(
                "{} variables but tables {:?} and {:?}",
                n,
                train.shape(),
                test.shape()
            )));
        }
        if t_train.len() != train.nrows() || t_test.len() != test.nrows() || t_test.is_empty() {
            return Err(BenchError::ShapeMismatch(
                "time vectors do not match the tables".to_string(),
            ));
        }
        Ok(TimeSeriesProblem {
            variable_names,
            t_train,
            train,
            t_test,
            test,
        })
    }

    /// first test row, the initial state of simulations
    pub fn initial_state(&self) -> Vec<f64> {
        self.test.row(0).to_vec()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentConfig {
    /// prefix of the log keys, e.g. `Lotka_Volterra`
    pub name: String,
    pub magnitudes: Vec<f64>,
    pub run_epde: bool,
    pub run_sindy: bool,
    pub epde_launches: usize,
    pub sindy_launches: usize,
    pub sparsity_thresholds: Vec<f64>,
    pub seed: Option<u64>,
    pub initial_complexity: Vec<f64>,
    pub relaxation: ComplexityRelaxation,
    pub retries: usize,
    pub referential: BTreeMap<String, String>,
    pub log_path: PathBuf,
    pub plots_dir: Option<PathBuf>,
    pub pareto_dir: Option<PathBuf>,
}

impl ExperimentConfig {
    /// `experiment`, `selection`, `regression`, `reference` and `output` sections of a task.
    /// `selection` gives the initial complexity, relaxation and retry budget used when the task has none
    pub fn from_task(
        task: &TaskDocument,
        referential: BTreeMap<String, String>,
        selection: (Vec<f64>, ComplexityRelaxation, usize),
    ) -> Result<ExperimentConfig> {
        let name = task
            .opt_str("experiment", "name")?
            .unwrap_or_else(|| "experiment".to_string());
        let (default_complexity, default_relaxation, default_retries) = selection;
        let default_step = match default_relaxation {
            ComplexityRelaxation::Leading { step } | ComplexityRelaxation::Cyclic { step } => step,
        };
        let step = task.opt_f64("selection", "step")?.unwrap_or(default_step);
        let relaxation = match task.opt_str("selection", "relaxation")? {
            None => match default_relaxation {
                ComplexityRelaxation::Leading { .. } => ComplexityRelaxation::Leading { step },
                ComplexityRelaxation::Cyclic { .. } => ComplexityRelaxation::Cyclic { step },
            },
            Some(kind) => match kind.to_lowercase().as_str() {
                "leading" => ComplexityRelaxation::Leading { step },
                "cyclic" => ComplexityRelaxation::Cyclic { step },
                _ => {
                    return Err(BenchError::InvalidTaskValue {
                        section: "selection".to_string(),
                        key: "relaxation".to_string(),
                        value: kind,
                    });
                }
            },
        };
        let referential = match task.section("reference") {
            Some(section) => section
                .iter()
                .map(|(var, values)| match values.as_slice() {
                    [eq] => Ok((var.clone(), eq.to_string())),
                    _ => Err(BenchError::InvalidTaskValue {
                        section: "reference".to_string(),
                        key: var.clone(),
                        value: format!("{} values", values.len()),
                    }),
                })
                .collect::<Result<BTreeMap<String, String>>>()?,
            None => referential,
        };
        let log_path = match task.opt_path("output", "log")? {
            Some(path) => path,
            None => task.base_dir.join("logs").join(format!("{}.json", name)),
        };
        Ok(ExperimentConfig {
            magnitudes: task.get_f64_list("experiment", "magnitudes")?,
            run_epde: task.opt_bool("experiment", "run_epde")?.unwrap_or(true),
            run_sindy: task.opt_bool("experiment", "run_sindy")?.unwrap_or(false),
            epde_launches: task.opt_usize("experiment", "epde_launches")?.unwrap_or(10),
            sindy_launches: task.opt_usize("experiment", "sindy_launches")?.unwrap_or(1),
            sparsity_thresholds: task.opt_f64_list("regression", "sparsity")?.unwrap_or_default(),
            seed: task.opt_u64("experiment", "seed")?,
            initial_complexity: task
                .opt_f64_list("selection", "initial_complexity")?
                .unwrap_or(default_complexity),
            relaxation,
            retries: task.opt_usize("selection", "retries")?.unwrap_or(default_retries),
            referential,
            log_path,
            plots_dir: task.opt_path("output", "plots")?,
            pareto_dir: task.opt_path("output", "pareto")?,
            name,
        })
    }
}

/// outcome of one magnitude
#[derive(Debug, Clone, Default)]
pub struct MagnitudeResults {
    pub magnitude: f64,
    pub epde_systems: Vec<EquationSystem>,
    pub epde_errors: Vec<Vec<f64>>,
    pub epde_predictions: Vec<Array2<f64>>,
    pub epde_times: Vec<f64>,
    pub sindy_systems: Vec<EquationSystem>,
    pub sindy_errors: Vec<Vec<f64>>,
    pub sindy_predictions: Vec<Array2<f64>>,
}

#[derive(Debug, Default)]
pub struct ExperimentResults {
    pub per_magnitude: Vec<MagnitudeResults>,
    pub log: Option<ExperimentLog>,
    pub pareto: Vec<ParetoRecord>,
}

impl ExperimentResults {
    /// component-wise mean errors per (method, magnitude), the rows of the summary table
    pub fn summary(&self) -> Vec<(AggregationKey, usize, Vec<f64>)> {
        let mean = |errors: &[Vec<f64>]| -> Vec<f64> {
            let width = errors.iter().map(Vec::len).max().unwrap_or(0);
            (0..width)
                .map(|j| {
                    errors.iter().filter_map(|e| e.get(j)).sum::<f64>() / errors.len() as f64
                })
                .collect()
        };
        let mut rows = Vec::new();
        for res in &self.per_magnitude {
            if !res.epde_errors.is_empty() {
                rows.push((
                    AggregationKey::new(Method::Epde, res.magnitude),
                    res.epde_errors.len(),
                    mean(&res.epde_errors),
                ));
            }
            if !res.sindy_errors.is_empty() {
                rows.push((
                    AggregationKey::new(Method::Sindy, res.magnitude),
                    res.sindy_errors.len(),
                    mean(&res.sindy_errors),
                ));
            }
        }
        rows
    }

    pub fn summary_table(&self) -> String {
        let mut builder = Builder::default();
        builder.push_record(
            ["method", "noise magnitude", "runs", "mean absolute error"].map(String::from),
        );
        for (key, runs, errors) in self.summary() {
            builder.push_record([
                key.method.to_string(),
                fmt_number(key.magnitude),
                runs.to_string(),
                errors
                    .iter()
                    .map(|e| format!("{:.5}", e))
                    .collect::<Vec<_>>()
                    .join(", "),
            ]);
        }
        let mut table = builder.build();
        table.with(Style::modern_rounded());
        table.to_string()
    }
}

pub struct ExperimentRunner {
    pub config: ExperimentConfig,
    pub search_params: SearchParams,
    pub regression_params: Option<RegressionParams>,
    pub translator: Option<SindyTranslator>,
    pub conditions: ConditionBuilder,
}

impl ExperimentRunner {
    pub fn new(
        config: ExperimentConfig,
        search_params: SearchParams,
        conditions: ConditionBuilder,
    ) -> ExperimentRunner {
        ExperimentRunner {
            config,
            search_params,
            regression_params: None,
            translator: None,
            conditions,
        }
    }

    pub fn with_regression(mut self, params: RegressionParams, translator: SindyTranslator) -> ExperimentRunner {
        self.regression_params = Some(params);
        self.translator = Some(translator);
        self
    }

    fn log_key(&self, method: Method, magnitude: f64, idx: usize) -> String {
        match method {
            Method::Epde => format!("{}_noise_{}_attempt_{}", self.config.name, magnitude, idx),
            Method::Sindy => format!("{}_SINDy_noise_{}_attempt_{}", self.config.name, magnitude, idx),
        }
    }

    fn plot_noisy(&self, magnitude: f64, problem: &TimeSeriesProblem, noisy: &Array2<f64>) {
        if let Some(dir) = &self.config.plots_dir {
            let key = AggregationKey::new(Method::Epde, magnitude);
            let path = dir.join(format!("training_{}.png", key.file_stem()));
            if let Err(e) = plot_series(
                &path,
                &format!("training data, noise {}", magnitude),
                "t",
                &problem.t_train,
                noisy,
                None,
                &problem.variable_names,
            ) {
                warn!("plot {} failed: {}", path.display(), e);
            }
        }
    }

    /// prediction plot next to its table
    fn plot_prediction(&self, key: &str, problem: &TimeSeriesProblem, prediction: &Array2<f64>) {
        if let Some(dir) = &self.config.plots_dir {
            let stem = key.replace('.', "_");
            let table = dir.join(format!("{}.csv", stem));
            if let Err(e) = save_prediction_to_csv(
                &table,
                "t",
                &problem.t_test,
                &problem.variable_names,
                prediction,
            ) {
                warn!("saving {} failed: {}", table.display(), e);
            }
            let path = dir.join(format!("{}.png", stem));
            if let Err(e) = plot_series(
                &path,
                key,
                "t",
                &problem.t_test,
                &problem.test,
                Some(prediction),
                &problem.variable_names,
            ) {
                warn!("plot {} failed: {}", path.display(), e);
            }
        }
    }

    fn check(&self) -> Result<()> {
        if let Some(m) = self.config.magnitudes.iter().find(|m| !m.is_finite() || **m < 0.0) {
            return Err(BenchError::NegativeNoiseMagnitude(*m));
        }
        if self.config.run_sindy {
            if self.regression_params.is_none() || self.translator.is_none() {
                return Err(BenchError::Engine(
                    "sparse regression requested without regression parameters".to_string(),
                ));
            }
            if self.config.sparsity_thresholds.is_empty() {
                return Err(BenchError::MissingTaskField {
                    section: "regression".to_string(),
                    key: "sparsity".to_string(),
                });
            }
        }
        if let Some(dir) = &self.config.plots_dir {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    /// the whole sweep; the log is dumped once at the end when anything was recorded
    pub fn run(
        &self,
        problem: &TimeSeriesProblem,
        search: &mut dyn EvolutionarySearch,
        mut regression: Option<&mut dyn SparseRegression>,
    ) -> Result<ExperimentResults> {
        self.check()?;
        let run_start = Instant::now();
        let mut rng = seeded_rng(self.config.seed);
        let mut holder = LogHolder::new();
        let mut results = ExperimentResults::default();
        let grid = PredictionGrid::time(&problem.t_test);
        // built once for the sweep, the token vocabulary does not depend on the noise
        let mut pool: Option<TokenPool> = None;

        for &magnitude in &self.config.magnitudes {
            info!("noise magnitude {}", magnitude);
            let noisy = add_relative_noise(&problem.train, magnitude, &mut rng)?;
            self.plot_noisy(magnitude, problem, &noisy);
            let data = TrainingData::time_series(&problem.t_train, &noisy, &problem.variable_names)?;
            let mut res = MagnitudeResults {
                magnitude,
                ..Default::default()
            };
            let mut fronts = Vec::new();

            if self.config.run_epde {
                for idx in 0..self.config.epde_launches {
                    let start = Instant::now();
                    search.fit(&data, &self.search_params)?;
                    let selection = select_by_complexity(
                        &*search,
                        &self.config.initial_complexity,
                        self.config.relaxation,
                        self.config.retries,
                    )?;
                    let (unit, time) = elapsed_time(start.elapsed());
                    info!("time_epde {}{}", time, unit);
                    if pool.is_none() {
                        pool = search.pool().cloned();
                    }
                    fronts.push(search.pareto_front());

                    let conditions = (self.conditions)(problem)?;
                    let prediction = search.predict(&selection.system, &conditions, &grid)?;
                    let errors = per_column_mae(&problem.test, &prediction)?;
                    let key = self.log_key(Method::Epde, magnitude, idx);
                    info!("{}: {} with errors {:?}", key, selection.system.text_form(), errors);
                    self.plot_prediction(&key, problem, &prediction);

                    let search_pool = search.pool();
                    holder
                        .get_or_init(|| {
                            ExperimentLog::new(&self.config.log_path, self.config.referential.clone(), search_pool)
                        })
                        .add_log(
                            &key,
                            &selection.system,
                            AggregationKey::new(Method::Epde, magnitude),
                            PredictionError::PerVariable(errors.clone()),
                        );
                    res.epde_systems.push(selection.system);
                    res.epde_errors.push(errors);
                    res.epde_predictions.push(prediction);
                    res.epde_times.push(time);
                }
                results.pareto.push(ParetoRecord {
                    key: AggregationKey::new(Method::Epde, magnitude),
                    fronts,
                });
            }

            if self.config.run_sindy {
                if let (Some(regression), Some(params), Some(translator)) = (
                    regression.as_deref_mut(),
                    self.regression_params.as_ref(),
                    self.translator.as_ref(),
                ) {
                    if pool.is_none() {
                        pool = Some(search.create_pool(&data, &self.search_params)?);
                    }
                    for idx in 0..self.config.sindy_launches {
                        let mut best: Option<(f64, EquationSystem, Vec<f64>, Array2<f64>)> = None;
                        for &sparsity in &self.config.sparsity_thresholds {
                            let params = RegressionParams {
                                library: params.library,
                                optimizer: params.optimizer.with_sparsity(sparsity),
                            };
                            let start = Instant::now();
                            let model = regression.fit(&data, &params)?;
                            let (unit, time) = elapsed_time(start.elapsed());
                            info!("SINDy time {}{} (sparsity {})", time, unit, sparsity);

                            let system = translator.to_system(
                                &model.equations(),
                                &problem.variable_names,
                                pool.as_ref(),
                            )?;
                            info!("translated system:\n{}", system.text_form());
                            let prediction = model.simulate(&problem.initial_state(), &problem.t_test)?;
                            let errors = per_column_mae(&problem.test, &prediction)?;
                            let quality: f64 = errors.iter().sum();
                            if best.as_ref().is_none_or(|(q, ..)| quality < *q) {
                                best = Some((quality, system, errors, prediction));
                            }
                        }
                        if let Some((_, system, errors, prediction)) = best {
                            let key = self.log_key(Method::Sindy, magnitude, idx);
                            info!("Discovered by SINDy: {}", system.text_form());
                            self.plot_prediction(&key, problem, &prediction);
                            holder
                                .get_or_init(|| {
                                    ExperimentLog::new(
                                        &self.config.log_path,
                                        self.config.referential.clone(),
                                        pool.as_ref(),
                                    )
                                })
                                .add_log(
                                    &key,
                                    &system,
                                    AggregationKey::new(Method::Sindy, magnitude),
                                    PredictionError::PerVariable(errors.clone()),
                                );
                            res.sindy_systems.push(system);
                            res.sindy_errors.push(errors);
                            res.sindy_predictions.push(prediction);
                        }
                    }
                } else {
                    warn!("sparse regression requested but no regression engine given");
                }
            }
            results.per_magnitude.push(res);
        }

        if let Some(dir) = &self.config.pareto_dir {
            if !results.pareto.is_empty() {
                write_pareto(dir, &results.pareto)?;
            }
        }
        info!("\n{}", results.summary_table());
        let log = holder.into_inner();
        match &log {
            Some(log) => log.dump()?,
            None => warn!("nothing was recorded, no log written"),
        }
        results.log = log;
        let (unit, time) = elapsed_time(run_start.elapsed());
        info!("experiment {} finished in {}{}", self.config.name, time, unit);
        Ok(results)
    }
}
