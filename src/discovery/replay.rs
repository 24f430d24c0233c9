//! Engines that replay recorded discovery results instead of searching.
//!
//! [`ReplaySearch`] holds candidate systems recorded from an evolutionary search run together with their
//! complexity vectors and answers complexity queries from them. Predictions of ODE systems are made with
//! the explicit integrators of [`crate::numerical::ode_integrator`]; two-dimensional grids need a PDE
//! solver and are refused.
//!
//! [`ReplayRegression`] returns recorded sparse-regression equations; its model simulates them by
//! translating them into the token notation and integrating the resulting system.
use crate::Utils::task_parser::{SectionMap, Value};
use crate::discovery::boundary::SolverCondition;
use crate::discovery::engines::{
    EvolutionarySearch, PredictionGrid, RegressionParams, SearchParams, SparseModel,
    SparseRegression, TrainingData,
};
use crate::discovery::equation::{EquationSystem, TokenPool};
use crate::discovery::selection::EquationQuery;
use crate::discovery::translator::{ConstantHandling, CorrespondenceTable, SindyTranslator};
use crate::errors::{BenchError, Result};
use crate::numerical::ode_integrator::{IntegratorKind, OdeIntegrator};
use log::{debug, info};
use nalgebra::DVector;
use ndarray::{Array1, Array2};

/// recorded candidate of the search population
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub complexity: Vec<f64>,
    pub system: EquationSystem,
}

impl Candidate {
    /// from task values: numbers form the complexity vector, strings are `"var: equation"`
    pub fn from_values(name: &str, values: &[Value]) -> Result<Candidate> {
        let mut complexity = Vec::new();
        let mut texts: Vec<(String, String)> = Vec::new();
        for value in values {
            if let Some(c) = value.as_float() {
                complexity.push(c);
            } else if let Some(s) = value.as_string() {
                let (var, eq) = s.split_once(':').ok_or_else(|| {
                    BenchError::MalformedEquation(format!(
                        "candidate '{}': expected 'var: equation', got '{}'",
                        name, s
                    ))
                })?;
                texts.push((var.trim().to_string(), eq.trim().to_string()));
            } else {
                return Err(BenchError::InvalidTaskValue {
                    section: "candidates".to_string(),
                    key: name.to_string(),
                    value: value.to_string(),
                });
            }
        }
        let system =
            EquationSystem::from_texts(texts.iter().map(|(v, e)| (v.as_str(), e.as_str())), None)?;
        if complexity.len() != system.equations.len() {
            return Err(BenchError::ShapeMismatch(format!(
                "candidate '{}' has {} complexity values for {} equations",
                name,
                complexity.len(),
                system.equations.len()
            )));
        }
        Ok(Candidate { complexity, system })
    }
}

fn same_complexity(a: &[f64], b: &[f64]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| (x - y).abs() < 1e-9)
}

/// integrate an ODE system on a time grid, the state ordered as `variables`
fn integrate_system(
    system: &EquationSystem,
    variables: &[String],
    y0: &[f64],
    grid: &Array1<f64>,
    kind: IntegratorKind,
    max_step: f64,
) -> Result<Array2<f64>> {
    if grid.is_empty() {
        return Err(BenchError::ShapeMismatch("empty prediction grid".to_string()));
    }
    let rhs = system.as_ode_rhs(variables, "t")?;
    let mut integrator = OdeIntegrator::new(kind, rhs, DVector::from_column_slice(y0), grid[0]);
    integrator.set_max_step(max_step);
    let solution = integrator.integrate_on_grid(&grid.to_vec())?;
    Ok(Array2::from_shape_fn(
        (solution.nrows(), solution.ncols()),
        |(i, j)| solution[(i, j)],
    ))
}

pub struct ReplaySearch {
    candidates: Vec<Candidate>,
    variable_names: Vec<String>,
    pool: Option<TokenPool>,
    fitted: bool,
    integrator: IntegratorKind,
    max_step: f64,
}

impl ReplaySearch {
    /// candidates in the order given; the first one is the unconditional best
    pub fn new(candidates: Vec<Candidate>) -> ReplaySearch {
        ReplaySearch {
            candidates,
            variable_names: Vec::new(),
            pool: None,
            fitted: false,
            integrator: IntegratorKind::RK4,
            max_step: 1e-4,
        }
    }

    /// `candidates` section of a task; keys are ordered lexicographically
    pub fn from_section(section: &SectionMap) -> Result<ReplaySearch> {
        let candidates = section
            .iter()
            .map(|(name, values)| Candidate::from_values(name, values))
            .collect::<Result<Vec<_>>>()?;
        if candidates.is_empty() {
            return Err(BenchError::Engine("no recorded candidates".to_string()));
        }
        Ok(ReplaySearch::new(candidates))
    }

    pub fn with_integrator(mut self, kind: IntegratorKind, max_step: f64) -> ReplaySearch {
        self.integrator = kind;
        self.max_step = max_step;
        self
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }
}

impl EquationQuery for ReplaySearch {
    fn equations_by_complexity(&self, complexity: &[f64]) -> Vec<EquationSystem> {
        if !self.fitted {
            return Vec::new();
        }
        self.candidates
            .iter()
            .filter(|c| same_complexity(&c.complexity, complexity))
            .map(|c| c.system.clone())
            .collect()
    }

    fn best_equation(&self) -> Option<EquationSystem> {
        if !self.fitted {
            return None;
        }
        self.candidates.first().map(|c| c.system.clone())
    }

    fn pareto_front(&self) -> Vec<EquationSystem> {
        if !self.fitted {
            return Vec::new();
        }
        self.candidates.iter().map(|c| c.system.clone()).collect()
    }
}

impl EvolutionarySearch for ReplaySearch {
    fn create_pool(&mut self, data: &TrainingData, params: &SearchParams) -> Result<TokenPool> {
        let pool = TokenPool::from_variables(&data.variable_names, &params.max_deriv_order);
        info!("token pool: {}", pool);
        self.variable_names = data.variable_names.clone();
        self.pool = Some(pool.clone());
        Ok(pool)
    }

    fn fit(&mut self, data: &TrainingData, params: &SearchParams) -> Result<()> {
        if self.pool.is_none() {
            self.create_pool(data, params)?;
        }
        self.variable_names = data.variable_names.clone();
        if let Some(unknown) = self
            .candidates
            .iter()
            .flat_map(|c| c.system.vars_to_describe())
            .find(|v| !self.variable_names.contains(v))
        {
            return Err(BenchError::Engine(format!(
                "recorded candidate describes '{}' which is not a variable of the data",
                unknown
            )));
        }
        debug!(
            "replaying {} recorded candidates (population size {}, {} epochs)",
            self.candidates.len(),
            params.population_size,
            params.training_epochs
        );
        self.fitted = true;
        Ok(())
    }

    fn pool(&self) -> Option<&TokenPool> {
        self.pool.as_ref()
    }

    fn predict(
        &self,
        system: &EquationSystem,
        conditions: &[SolverCondition],
        grid: &PredictionGrid,
    ) -> Result<Array2<f64>> {
        if grid.axes.len() != 1 {
            return Err(BenchError::NotImplemented(format!(
                "prediction on a {}-dimensional grid requires a PDE solver",
                grid.axes.len()
            )));
        }
        let variables = if self.variable_names.is_empty() {
            system.vars_to_describe()
        } else {
            self.variable_names.clone()
        };
        let mut y0 = vec![f64::NAN; variables.len()];
        for cond in conditions {
            if cond.var >= y0.len() || cond.values.len() != 1 {
                return Err(BenchError::ShapeMismatch(format!(
                    "condition '{}' is not an initial value of one of {} variables",
                    cond.key,
                    variables.len()
                )));
            }
            // the integrator starts at the first grid time
            let t_start = grid.axes[0].first().copied().unwrap_or(f64::NAN);
            let t_cond = cond.grid.get((0, 0)).copied().unwrap_or(f64::NAN);
            if (t_cond - t_start).abs() > 1e-12 * t_start.abs().max(1.0) {
                return Err(BenchError::ShapeMismatch(format!(
                    "condition '{}' is set at t = {}, the prediction grid starts at t = {}",
                    cond.key, t_cond, t_start
                )));
            }
            y0[cond.var] = cond.values[0];
        }
        if y0.iter().any(|v| v.is_nan()) {
            return Err(BenchError::ShapeMismatch(
                "every variable needs an initial value".to_string(),
            ));
        }
        integrate_system(system, &variables, &y0, &grid.axes[0], self.integrator, self.max_step)
    }
}

/// replay of recorded regression output
pub struct ReplayRegression {
    equations: Vec<String>,
    table: CorrespondenceTable,
    constant: ConstantHandling,
    variable_names: Vec<String>,
    max_step: f64,
}

impl ReplayRegression {
    pub fn new(
        equations: Vec<String>,
        table: CorrespondenceTable,
        constant: ConstantHandling,
        variable_names: Vec<String>,
    ) -> ReplayRegression {
        ReplayRegression {
            equations,
            table,
            constant,
            variable_names,
            max_step: 1e-4,
        }
    }
}

impl SparseRegression for ReplayRegression {
    fn fit(&mut self, data: &TrainingData, params: &RegressionParams) -> Result<Box<dyn SparseModel>> {
        if data.n_vars() != self.equations.len() {
            return Err(BenchError::ShapeMismatch(format!(
                "{} recorded equations for {} variables",
                self.equations.len(),
                data.n_vars()
            )));
        }
        let universe = params.library.universe(data.n_vars());
        let translator =
            SindyTranslator::new(self.table.clone(), &universe, self.constant, "x1")?;
        debug!("replaying regression with {:?}", params.optimizer);
        Ok(Box::new(ReplayModel {
            equations: self.equations.clone(),
            translator,
            variable_names: self.variable_names.clone(),
            max_step: self.max_step,
        }))
    }
}

pub struct ReplayModel {
    equations: Vec<String>,
    translator: SindyTranslator,
    variable_names: Vec<String>,
    max_step: f64,
}

impl SparseModel for ReplayModel {
    fn equations(&self) -> Vec<String> {
        self.equations.clone()
    }

    fn simulate(&self, x0: &[f64], grid: &Array1<f64>) -> Result<Array2<f64>> {
        if x0.len() != self.variable_names.len() {
            return Err(BenchError::ShapeMismatch(format!(
                "{} initial values for {} variables",
                x0.len(),
                self.variable_names.len()
            )));
        }
        let system = self
            .translator
            .to_system(&self.equations, &self.variable_names, None)?;
        integrate_system(
            &system,
            &self.variable_names,
            x0,
            grid,
            IntegratorKind::DOPRI,
            self.max_step,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Utils::task_parser::TaskDocument;
    use crate::discovery::boundary::ode_initial_condition;
    use crate::discovery::engines::{FeatureLibrary, Optimizer};
    use crate::discovery::selection::{ComplexityRelaxation, select_by_complexity};
    use approx::assert_relative_eq;
    use ndarray::array;

    const TASK: &str = r#"
candidates
  c1: 3.0, 3.0, "u: 1.0 * u{power: 1.0} + 0.0 = du/dx1{power: 1.0}", "v: 0.0 * v{power: 1.0} + 0.0 = dv/dx1{power: 1.0}"
  c2: 2.5, 3.5, "u: -1.0 * u{power: 1.0} + 0.0 = du/dx1{power: 1.0}", "v: -2.0 * v{power: 1.0} + 0.0 = dv/dx1{power: 1.0}"
"#;

    fn names() -> Vec<String> {
        vec!["u".to_string(), "v".to_string()]
    }

    fn data() -> TrainingData {
        let t = array![0.0, 0.1, 0.2];
        let cols = array![[1.0, 1.0], [0.9, 0.8], [0.8, 0.7]];
        TrainingData::time_series(&t, &cols, &names()).unwrap()
    }

    fn fitted_search() -> ReplaySearch {
        let task = TaskDocument::parse(TASK).unwrap();
        let mut search = ReplaySearch::from_section(task.section("candidates").unwrap()).unwrap();
        search.fit(&data(), &SearchParams::default()).unwrap();
        search
    }

    #[test]
    fn test_candidates_from_task() {
        let search = fitted_search();
        assert_eq!(search.candidates().len(), 2);
        assert_eq!(search.candidates()[1].complexity, vec![2.5, 3.5]);
        assert_eq!(search.pool().unwrap().len(), 4);
    }

    #[test]
    fn test_query_needs_fit() {
        let task = TaskDocument::parse(TASK).unwrap();
        let search = ReplaySearch::from_section(task.section("candidates").unwrap()).unwrap();
        assert!(search.equations_by_complexity(&[3.0, 3.0]).is_empty());
        assert!(search.best_equation().is_none());
    }

    #[test]
    fn test_selection_over_replay() {
        let search = fitted_search();
        // [2.5, 2.5] -> [3.5, 2.5] -> [3.5, 3.5] -> [4.5, 3.5]: no exact match, fallback to c1
        let sel = select_by_complexity(
            &search,
            &[2.5, 2.5],
            ComplexityRelaxation::Cyclic { step: 1.0 },
            4,
        )
        .unwrap();
        assert!(sel.fallback);
        assert_eq!(sel.system.equations["u"].terms[0].coefficient, 1.0);

        let hits = search.equations_by_complexity(&[2.5, 3.5]);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].equations["v"].terms[0].coefficient, -2.0);
    }

    #[test]
    fn test_predict_exponential_decay() {
        let search = fitted_search();
        let system = search.equations_by_complexity(&[2.5, 3.5]).remove(0);
        let conditions = vec![
            ode_initial_condition("u", 0, 1.0, 2.0).unwrap(),
            ode_initial_condition("v", 1, 1.0, 1.0).unwrap(),
        ];
        let grid = PredictionGrid::time(&array![1.0, 1.5, 2.0]);
        let pred = search.predict(&system, &conditions, &grid).unwrap();
        assert_eq!(pred.dim(), (3, 2));
        assert_relative_eq!(pred[[0, 0]], 2.0);
        assert_relative_eq!(pred[[2, 0]], 2.0 * (-1.0f64).exp(), epsilon = 1e-6);
        assert_relative_eq!(pred[[2, 1]], (-2.0f64).exp(), epsilon = 1e-6);
    }

    #[test]
    fn test_predict_with_adams_bashforth() {
        let search = fitted_search().with_integrator(IntegratorKind::AB4, 1e-4);
        let system = search.equations_by_complexity(&[2.5, 3.5]).remove(0);
        let conditions = vec![
            ode_initial_condition("u", 0, 0.0, 1.0).unwrap(),
            ode_initial_condition("v", 1, 0.0, 1.0).unwrap(),
        ];
        let pred = search
            .predict(&system, &conditions, &PredictionGrid::time(&array![0.0, 0.5]))
            .unwrap();
        assert_relative_eq!(pred[[1, 0]], (-0.5f64).exp(), epsilon = 1e-6);
        assert_relative_eq!(pred[[1, 1]], (-1.0f64).exp(), epsilon = 1e-6);
    }

    #[test]
    fn test_predict_refuses_pde_grid() {
        let search = fitted_search();
        let system = search.best_equation().unwrap();
        let grid = PredictionGrid {
            axes: vec![array![0.0, 1.0], array![0.0, 1.0]],
        };
        assert!(matches!(
            search.predict(&system, &[], &grid),
            Err(BenchError::NotImplemented(_))
        ));
    }

    #[test]
    fn test_predict_missing_condition() {
        let search = fitted_search();
        let system = search.best_equation().unwrap();
        let conditions = vec![ode_initial_condition("u", 0, 0.0, 1.0).unwrap()];
        let grid = PredictionGrid::time(&array![0.0, 1.0]);
        assert!(search.predict(&system, &conditions, &grid).is_err());
    }

    #[test]
    fn test_predict_condition_off_grid_start() {
        let search = fitted_search();
        let system = search.best_equation().unwrap();
        let conditions = vec![
            ode_initial_condition("u", 0, 0.5, 1.0).unwrap(),
            ode_initial_condition("v", 1, 0.0, 1.0).unwrap(),
        ];
        let grid = PredictionGrid::time(&array![0.0, 1.0]);
        match search.predict(&system, &conditions, &grid) {
            Err(BenchError::ShapeMismatch(msg)) => assert!(msg.contains("'u'")),
            other => panic!("expected a shape mismatch, got {:?}", other.map(|p| p.dim())),
        }
    }

    #[test]
    fn test_replay_regression_simulates_translation() {
        let table = CorrespondenceTable::new([("0", "u"), ("1", "v")]);
        let mut regression = ReplayRegression::new(
            vec!["-1.000 x0".to_string(), "0.5 1 + 0.000 x1".to_string()],
            table,
            ConstantHandling::Leading,
            names(),
        );
        let params = RegressionParams {
            library: FeatureLibrary::Polynomial { degree: 2 },
            optimizer: Optimizer::Stlsq { threshold: 0.1, alpha: 0.05 },
        };
        let model = regression.fit(&data(), &params).unwrap();
        assert_eq!(model.equations().len(), 2);
        let sim = model.simulate(&[1.0, 0.0], &array![0.0, 1.0]).unwrap();
        assert_relative_eq!(sim[[1, 0]], (-1.0f64).exp(), epsilon = 1e-6);
        assert_relative_eq!(sim[[1, 1]], 0.5, epsilon = 1e-9);
        assert!(model.simulate(&[1.0], &array![0.0, 1.0]).is_err());
    }

    #[test]
    fn test_replay_regression_incomplete_table() {
        let table = CorrespondenceTable::new([("0", "u")]);
        let mut regression = ReplayRegression::new(
            vec!["1.0 x0".to_string(), "1.0 x1".to_string()],
            table,
            ConstantHandling::Leading,
            names(),
        );
        let params = RegressionParams {
            library: FeatureLibrary::Polynomial { degree: 2 },
            optimizer: Optimizer::Ssr { kappa: 1.0 },
        };
        assert!(matches!(
            regression.fit(&data(), &params),
            Err(BenchError::IncompleteCorrespondence(_))
        ));
    }
}
