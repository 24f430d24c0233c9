//! Selection of a discovered equation system of bounded complexity from the Pareto-style population
//! of an evolutionary search.
//!
//! The population is queried at a target complexity vector. Every empty answer relaxes the target and the
//! query is repeated, at most `retries` times; after that the unconditional best equation is taken.
use crate::discovery::equation::EquationSystem;
use crate::errors::{BenchError, Result};
use log::{info, warn};

/// queryable population of candidate systems
pub trait EquationQuery {
    /// systems whose complexity vector equals `complexity`
    fn equations_by_complexity(&self, complexity: &[f64]) -> Vec<EquationSystem>;
    /// the first system of the best front, regardless of complexity
    fn best_equation(&self) -> Option<EquationSystem>;
    fn pareto_front(&self) -> Vec<EquationSystem>;
}

/// how the complexity target is relaxed after an empty query
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ComplexityRelaxation {
    /// only the first component grows
    Leading { step: f64 },
    /// component `attempt % len` grows
    Cyclic { step: f64 },
}

impl ComplexityRelaxation {
    pub fn relax(&self, complexity: &mut [f64], attempt: usize) {
        if complexity.is_empty() {
            return;
        }
        match *self {
            ComplexityRelaxation::Leading { step } => complexity[0] += step,
            ComplexityRelaxation::Cyclic { step } => {
                let idx = attempt % complexity.len();
                complexity[idx] += step;
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct Selection {
    pub system: EquationSystem,
    /// target of the successful query, or the last target tried before the fallback
    pub complexity_used: Vec<f64>,
    /// number of empty queries
    pub attempts: usize,
    pub fallback: bool,
}

pub fn select_by_complexity<Q: EquationQuery + ?Sized>(
    query: &Q,
    initial: &[f64],
    relaxation: ComplexityRelaxation,
    retries: usize,
) -> Result<Selection> {
    let mut complexity = initial.to_vec();
    let mut attempt = 0;
    while attempt < retries {
        if let Some(system) = query.equations_by_complexity(&complexity).into_iter().next() {
            info!(
                "equation of complexity {:?} obtained after {} relaxations",
                complexity, attempt
            );
            return Ok(Selection {
                system,
                complexity_used: complexity,
                attempts: attempt,
                fallback: false,
            });
        }
        relaxation.relax(&mut complexity, attempt);
        attempt += 1;
    }
    warn!(
        "no equation of bounded complexity after {} attempts, taking the best available one",
        retries
    );
    let system = query.best_equation().ok_or(BenchError::NoEquationFound)?;
    Ok(Selection {
        system,
        complexity_used: complexity,
        attempts: attempt,
        fallback: true,
    })
}
