//! Seams to the external discovery engines and the data and hyper-parameters passed to them.
//!
//! The evolutionary structure search and the sparse-regression method are collaborators of the
//! benchmark: the harness only drives them through [`EvolutionarySearch`], [`SparseRegression`] and
//! [`SparseModel`].
use crate::Utils::task_parser::TaskDocument;
use crate::discovery::boundary::SolverCondition;
use crate::discovery::equation::{EquationSystem, TokenPool};
use crate::discovery::selection::EquationQuery;
use crate::discovery::translator::FactorUniverse;
use crate::errors::{BenchError, Result};
use ndarray::{Array1, Array2, ArrayD, Axis};
use std::collections::BTreeMap;
use std::fmt;

////////////////////////////////////////////////////////////////////////////////////
//                         DATA
////////////////////////////////////////////////////////////////////////////////////

/// training data: coordinate axes, one field per variable and the derivative estimates
/// produced by the search engine preprocessing
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingData {
    /// coordinate axes, time first
    pub grids: Vec<Array1<f64>>,
    pub fields: Vec<ArrayD<f64>>,
    pub variable_names: Vec<String>,
    pub saved_derivatives: BTreeMap<String, ArrayD<f64>>,
}

impl TrainingData {
    /// ODE data: one column of `columns` per variable, one row per time point
    pub fn time_series(t: &Array1<f64>, columns: &Array2<f64>, names: &[String]) -> Result<TrainingData> {
        if columns.nrows() != t.len() || columns.ncols() != names.len() {
            return Err(BenchError::ShapeMismatch(format!(
                "time series {:?} does not fit {} time points and {} names",
                columns.shape(),
                t.len(),
                names.len()
            )));
        }
        let fields = columns
            .axis_iter(Axis(1))
            .map(|col| col.to_owned().into_dyn())
            .collect();
        Ok(TrainingData {
            grids: vec![t.clone()],
            fields,
            variable_names: names.to_vec(),
            saved_derivatives: BTreeMap::new(),
        })
    }

    /// PDE data of one variable on a (t, x) grid, rows along t
    pub fn field(t: &Array1<f64>, x: &Array1<f64>, u: &Array2<f64>, name: &str) -> Result<TrainingData> {
        if u.dim() != (t.len(), x.len()) {
            return Err(BenchError::ShapeMismatch(format!(
                "field {:?} does not fit grid ({}, {})",
                u.shape(),
                t.len(),
                x.len()
            )));
        }
        Ok(TrainingData {
            grids: vec![t.clone(), x.clone()],
            fields: vec![u.clone().into_dyn()],
            variable_names: vec![name.to_string()],
            saved_derivatives: BTreeMap::new(),
        })
    }

    pub fn dimensionality(&self) -> usize {
        self.grids.len()
    }

    pub fn n_vars(&self) -> usize {
        self.variable_names.len()
    }

    /// fields as columns of a table, for ODE data only
    pub fn as_columns(&self) -> Result<Array2<f64>> {
        if self.dimensionality() != 1 {
            return Err(BenchError::ShapeMismatch(
                "only one-dimensional data can be laid out as columns".to_string(),
            ));
        }
        let n = self.grids[0].len();
        let mut out = Array2::zeros((n, self.n_vars()));
        for (j, field) in self.fields.iter().enumerate() {
            let column = field
                .view()
                .into_shape_with_order(n)
                .map_err(|e| BenchError::ShapeMismatch(e.to_string()))?;
            out.column_mut(j).assign(&column);
        }
        Ok(out)
    }
}

/// coordinates of the points a prediction is requested on
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionGrid {
    pub axes: Vec<Array1<f64>>,
}

impl PredictionGrid {
    pub fn time(t: &Array1<f64>) -> PredictionGrid {
        PredictionGrid { axes: vec![t.clone()] }
    }
}

////////////////////////////////////////////////////////////////////////////////////
//                         EVOLUTIONARY SEARCH
////////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Clone, PartialEq)]
pub enum Preprocessor {
    Poly {
        use_smoothing: bool,
        sigma: f64,
        polynomial_window: usize,
        poly_order: usize,
    },
    Ann {
        epochs_max: usize,
    },
}

impl fmt::Display for Preprocessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Preprocessor::Poly { .. } => write!(f, "poly"),
            Preprocessor::Ann { .. } => write!(f, "ANN"),
        }
    }
}

/// hyper-parameters of one search run
#[derive(Debug, Clone, PartialEq)]
pub struct SearchParams {
    pub population_size: usize,
    pub training_epochs: usize,
    pub max_deriv_order: Vec<usize>,
    pub equation_terms_max_number: usize,
    pub data_fun_pow: usize,
    pub factors_num: Vec<usize>,
    pub factors_probas: Vec<f64>,
    pub eq_sparsity_interval: (f64, f64),
    pub boundary: usize,
    pub multiobjective: bool,
    pub preprocessor: Preprocessor,
}

impl Default for SearchParams {
    fn default() -> Self {
        SearchParams {
            population_size: 35,
            training_epochs: 55,
            max_deriv_order: vec![1],
            equation_terms_max_number: 5,
            data_fun_pow: 2,
            factors_num: vec![1, 2],
            factors_probas: vec![0.5, 0.5],
            eq_sparsity_interval: (1e-12, 1e-4),
            boundary: 25,
            multiobjective: true,
            preprocessor: Preprocessor::Poly {
                use_smoothing: true,
                sigma: 1.0,
                polynomial_window: 3,
                poly_order: 3,
            },
        }
    }
}

impl SearchParams {
    /// read the `search` section; absent keys keep their default values
    pub fn from_task(task: &TaskDocument) -> Result<SearchParams> {
        const S: &str = "search";
        let mut params = SearchParams::default();
        if let Some(v) = task.opt_usize(S, "population_size")? {
            params.population_size = v;
        }
        if let Some(v) = task.opt_usize(S, "training_epochs")? {
            params.training_epochs = v;
        }
        if let Some(v) = task.opt_f64_list(S, "max_deriv_order")? {
            params.max_deriv_order = v.iter().map(|o| *o as usize).collect();
        }
        if let Some(v) = task.opt_usize(S, "equation_terms_max_number")? {
            params.equation_terms_max_number = v;
        }
        if let Some(v) = task.opt_usize(S, "data_fun_pow")? {
            params.data_fun_pow = v;
        }
        if let Some(v) = task.opt_f64_list(S, "factors_num")? {
            params.factors_num = v.iter().map(|n| *n as usize).collect();
        }
        if let Some(v) = task.opt_f64_list(S, "factors_probas")? {
            params.factors_probas = v;
        }
        if let Some(v) = task.opt_f64_list(S, "eq_sparsity_interval")? {
            match v.as_slice() {
                [lo, hi] if lo <= hi => params.eq_sparsity_interval = (*lo, *hi),
                _ => {
                    return Err(BenchError::InvalidTaskValue {
                        section: S.to_string(),
                        key: "eq_sparsity_interval".to_string(),
                        value: format!("{:?}", v),
                    });
                }
            }
        }
        if let Some(v) = task.opt_usize(S, "boundary")? {
            params.boundary = v;
        }
        if let Some(v) = task.opt_bool(S, "multiobjective")? {
            params.multiobjective = v;
        }
        if let Some(kind) = task.opt_str(S, "preprocessor")? {
            params.preprocessor = match kind.to_lowercase().as_str() {
                "poly" => Preprocessor::Poly {
                    use_smoothing: task.opt_bool(S, "use_smoothing")?.unwrap_or(true),
                    sigma: task.opt_f64(S, "sigma")?.unwrap_or(1.0),
                    polynomial_window: task.opt_usize(S, "polynomial_window")?.unwrap_or(3),
                    poly_order: task.opt_usize(S, "poly_order")?.unwrap_or(3),
                },
                "ann" => Preprocessor::Ann {
                    epochs_max: task.opt_usize(S, "epochs_max")?.unwrap_or(35000),
                },
                _ => {
                    return Err(BenchError::InvalidTaskValue {
                        section: S.to_string(),
                        key: "preprocessor".to_string(),
                        value: kind,
                    });
                }
            };
        }
        if params.factors_num.len() != params.factors_probas.len() {
            return Err(BenchError::ShapeMismatch(
                "factors_num and factors_probas must have the same length".to_string(),
            ));
        }
        Ok(params)
    }
}

/// evolutionary equation-structure search engine
pub trait EvolutionarySearch: EquationQuery {
    /// token pool of the data without running the search
    fn create_pool(&mut self, data: &TrainingData, params: &SearchParams) -> Result<TokenPool>;
    fn fit(&mut self, data: &TrainingData, params: &SearchParams) -> Result<()>;
    fn pool(&self) -> Option<&TokenPool>;
    /// solve `system` on `grid` under `conditions`; one column per variable
    fn predict(
        &self,
        system: &EquationSystem,
        conditions: &[SolverCondition],
        grid: &PredictionGrid,
    ) -> Result<Array2<f64>>;
}

////////////////////////////////////////////////////////////////////////////////////
//                         SPARSE REGRESSION
////////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FeatureLibrary {
    Polynomial { degree: usize },
    Pde { derivative_order: usize },
}

impl FeatureLibrary {
    /// factor codes this library can emit for `n_vars` variables
    pub fn universe(&self, n_vars: usize) -> FactorUniverse {
        match *self {
            FeatureLibrary::Polynomial { .. } => FactorUniverse::polynomial(n_vars),
            FeatureLibrary::Pde { derivative_order } => FactorUniverse::pde(n_vars, derivative_order),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Optimizer {
    Stlsq { threshold: f64, alpha: f64 },
    Sr3 { threshold: f64 },
    Ssr { kappa: f64 },
    Frols { kappa: f64 },
}

impl Optimizer {
    /// optimizer by name with its single tuning value (threshold for STLSQ/SR3, kappa otherwise)
    pub fn from_name(name: &str, value: f64) -> Result<Optimizer> {
        match name.to_uppercase().as_str() {
            "STLSQ" => Ok(Optimizer::Stlsq {
                threshold: value,
                alpha: 0.05,
            }),
            "SR3" => Ok(Optimizer::Sr3 { threshold: value }),
            "SSR" => Ok(Optimizer::Ssr { kappa: value }),
            "FROLS" => Ok(Optimizer::Frols { kappa: value }),
            _ => Err(BenchError::InvalidTaskValue {
                section: "regression".to_string(),
                key: "optimizer".to_string(),
                value: name.to_string(),
            }),
        }
    }

    /// the same optimizer with another sparsity value
    pub fn with_sparsity(&self, sparsity: f64) -> Optimizer {
        match *self {
            Optimizer::Stlsq { threshold, .. } => Optimizer::Stlsq {
                threshold,
                alpha: sparsity,
            },
            Optimizer::Sr3 { .. } => Optimizer::Sr3 { threshold: sparsity },
            Optimizer::Ssr { .. } => Optimizer::Ssr { kappa: sparsity },
            Optimizer::Frols { .. } => Optimizer::Frols { kappa: sparsity },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegressionParams {
    pub library: FeatureLibrary,
    pub optimizer: Optimizer,
}

impl RegressionParams {
    /// `regression` section: `library` (polynomial or pde), `degree` / `derivative_order`,
    /// `optimizer` and its `threshold`
    pub fn from_task(task: &TaskDocument) -> Result<RegressionParams> {
        const S: &str = "regression";
        let library = match task
            .opt_str(S, "library")?
            .unwrap_or_else(|| "polynomial".to_string())
            .to_lowercase()
            .as_str()
        {
            "polynomial" => FeatureLibrary::Polynomial {
                degree: task.opt_usize(S, "degree")?.unwrap_or(2),
            },
            "pde" => FeatureLibrary::Pde {
                derivative_order: task.opt_usize(S, "derivative_order")?.unwrap_or(3),
            },
            other => {
                return Err(BenchError::InvalidTaskValue {
                    section: S.to_string(),
                    key: "library".to_string(),
                    value: other.to_string(),
                });
            }
        };
        let optimizer = Optimizer::from_name(
            &task
                .opt_str(S, "optimizer")?
                .unwrap_or_else(|| "STLSQ".to_string()),
            task.opt_f64(S, "threshold")?.unwrap_or(0.1),
        )?;
        Ok(RegressionParams { library, optimizer })
    }
}

/// fitted sparse-regression model
pub trait SparseModel {
    /// one equation per variable in the regression notation (`0.998 x0 + -0.998 x0 x1`)
    fn equations(&self) -> Vec<String>;
    /// integrate the model from `x0` over `grid`; one column per variable
    fn simulate(&self, x0: &[f64], grid: &Array1<f64>) -> Result<Array2<f64>>;
}

pub trait SparseRegression {
    fn fit(&mut self, data: &TrainingData, params: &RegressionParams) -> Result<Box<dyn SparseModel>>;
}
