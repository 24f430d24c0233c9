//! Translation of sparse-regression output (`0.998 x0 + -0.998 x0 x1`, `0.1 x0_11 + -1.0 x0x0_1`)
//! into the token notation of the evolutionary search engine.
//!
//! Factor codes (`0`, `0_1`, `1^2`) are looked up in a declarative correspondence table which is
//! checked against the full set of codes the regression library can emit before anything is translated.
//! An unknown code at translation time is an error for the whole equation, a partial string is never returned.
//!
//! Example
//! ```
//! use RustedEqBench::discovery::translator::{
//!     ConstantHandling, CorrespondenceTable, FactorUniverse, SindyTranslator,
//! };
//! let table = CorrespondenceTable::new([("0", "u"), ("0_1", "du/dx2"), ("0_11", "d^2u/dx2^2")]);
//! let translator = SindyTranslator::new(
//!     table,
//!     &FactorUniverse::pde(1, 2),
//!     ConstantHandling::Absent,
//!     "x1",
//! )
//! .unwrap();
//! let text = translator.translate_equation("0.100 x0_11 + -1.000 x0x0_1", "u").unwrap();
//! assert_eq!(
//!     text,
//!     "0.1 * d^2u/dx2^2{power: 1.0} + -1.0 * u{power: 1.0} * du/dx2{power: 1.0} + 0.0 = du/dx1{power: 1.0}"
//! );
//! ```
use crate::Utils::task_parser::SectionMap;
use crate::discovery::equation::{EquationSystem, Factor, TokenPool, fmt_number};
use crate::errors::{BenchError, Result};
use itertools::Itertools;
use log::{debug, info};
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use strum_macros::{Display, EnumString};

/// `0`, `0_11`, `1^2`: variable index, optional derivative suffix, optional power
const FACTOR_CODE: &str = r"^(\d+(?:_\d+)?)(?:\^(\d+(?:\.\d+)?))?$";

/// factor code -> token label, e.g. "0_1" -> "du/dx1"
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CorrespondenceTable {
    entries: BTreeMap<String, String>,
}

impl CorrespondenceTable {
    pub fn new<I, K, V>(entries: I) -> CorrespondenceTable
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        CorrespondenceTable {
            entries: entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// from the `correspondence` section of a task: every key is a code with exactly one label
    pub fn from_section(section: &SectionMap) -> Result<CorrespondenceTable> {
        let mut entries = BTreeMap::new();
        for (code, values) in section {
            match values.as_slice() {
                [label] => {
                    entries.insert(code.clone(), label.to_string());
                }
                _ => {
                    return Err(BenchError::InvalidTaskValue {
                        section: "correspondence".to_string(),
                        key: code.clone(),
                        value: values.iter().map(|v| v.to_string()).join(", "),
                    });
                }
            }
        }
        Ok(CorrespondenceTable { entries })
    }

    pub fn lookup(&self, code: &str) -> Option<&str> {
        self.entries.get(code).map(String::as_str)
    }

    pub fn codes(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    pub fn labels(&self) -> impl Iterator<Item = &String> {
        self.entries.values()
    }

    /// every code of the universe must have an entry
    pub fn validate(&self, universe: &FactorUniverse) -> Result<()> {
        let missing: Vec<String> = universe
            .codes
            .iter()
            .filter(|code| !self.entries.contains_key(*code))
            .cloned()
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(BenchError::IncompleteCorrespondence(missing))
        }
    }
}

/// codes the regression feature library can produce
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FactorUniverse {
    pub codes: BTreeSet<String>,
}

impl FactorUniverse {
    /// polynomial library over `n_vars` variables: x0, x1, ... (powers are written as x0^2)
    pub fn polynomial(n_vars: usize) -> FactorUniverse {
        FactorUniverse {
            codes: (0..n_vars).map(|i| i.to_string()).collect(),
        }
    }

    /// PDE library: every variable and its spatial derivatives x0_1, x0_11, ... up to `derivative_order`
    pub fn pde(n_vars: usize, derivative_order: usize) -> FactorUniverse {
        let mut codes = BTreeSet::new();
        for i in 0..n_vars {
            codes.insert(i.to_string());
            for order in 1..=derivative_order {
                codes.insert(format!("{}_{}", i, "1".repeat(order)));
            }
        }
        FactorUniverse { codes }
    }

    pub fn explicit<I, S>(codes: I) -> FactorUniverse
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FactorUniverse {
            codes: codes.into_iter().map(Into::into).collect(),
        }
    }
}

/// how the bias term of the regression output is treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ConstantHandling {
    /// the library has no bias column: ` + 0.0` is appended, a bias term is an unknown code
    Absent,
    /// bias terms (`c 1`) form the constant of the equation
    Leading,
}

pub struct SindyTranslator {
    table: CorrespondenceTable,
    factor_code: Regex,
    constant: ConstantHandling,
    rhs_axis: String,
}

impl SindyTranslator {
    /// the table is validated against `universe` here, before any equation is seen
    pub fn new(
        table: CorrespondenceTable,
        universe: &FactorUniverse,
        constant: ConstantHandling,
        rhs_axis: &str,
    ) -> Result<SindyTranslator> {
        table.validate(universe)?;
        info!(
            "correspondence table with {} entries covers all {} factor codes",
            table.entries.len(),
            universe.codes.len()
        );
        Ok(SindyTranslator {
            table,
            factor_code: Regex::new(FACTOR_CODE)?,
            constant,
            rhs_axis: rhs_axis.to_string(),
        })
    }

    pub fn table(&self) -> &CorrespondenceTable {
        &self.table
    }

    fn replace_factor(&self, factor: &str, term: &str) -> Result<String> {
        let unknown = || BenchError::UnknownFactorCode {
            code: factor.to_string(),
            term: term.to_string(),
        };
        let captures = self.factor_code.captures(factor).ok_or_else(unknown)?;
        let code = &captures[1];
        let power = match captures.get(2) {
            Some(p) => p.as_str().parse::<f64>().map_err(|_| unknown())?,
            None => 1.0,
        };
        let label = self.table.lookup(code).ok_or_else(unknown)?;
        Ok(Factor::new(label, power).to_string())
    }

    fn parse_coefficient(coefficient: &str, term: &str) -> Result<f64> {
        if coefficient.is_empty() {
            return Ok(1.0);
        }
        coefficient.parse::<f64>().map_err(|_| {
            BenchError::MalformedEquation(format!("bad coefficient '{}' in term '{}'", coefficient, term))
        })
    }

    /// translate one regression equation describing `var`
    pub fn translate_equation(&self, equation: &str, var: &str) -> Result<String> {
        let mut terms: Vec<String> = Vec::new();
        let mut constant = 0.0;
        for term in equation.split('+') {
            let trimmed = term.trim();
            if trimmed.is_empty() {
                return Err(BenchError::MalformedEquation(format!(
                    "empty term in '{}'",
                    equation
                )));
            }
            if !trimmed.contains('x') {
                // bias column is printed as "c 1"
                let bias = trimmed.strip_suffix(" 1").map(str::trim).ok_or_else(|| {
                    BenchError::MalformedEquation(format!("term '{}' has no factors", trimmed))
                })?;
                match self.constant {
                    ConstantHandling::Leading => {
                        constant += Self::parse_coefficient(bias, trimmed)?;
                        continue;
                    }
                    ConstantHandling::Absent => {
                        return Err(BenchError::UnknownFactorCode {
                            code: "1".to_string(),
                            term: trimmed.to_string(),
                        });
                    }
                }
            }
            let compact: String = trimmed.chars().filter(|c| !c.is_whitespace()).collect();
            let mut pieces = compact.split('x');
            let coefficient = Self::parse_coefficient(pieces.next().unwrap_or(""), trimmed)?;
            let factors = pieces
                .map(|factor| self.replace_factor(factor, trimmed))
                .collect::<Result<Vec<String>>>()?;
            terms.push(
                std::iter::once(fmt_number(coefficient))
                    .chain(factors)
                    .join(" * "),
            );
        }
        terms.push(fmt_number(constant));
        let rhs = Factor::new(&format!("d{}/d{}", var, self.rhs_axis), 1.0);
        let translated = format!("{} = {}", terms.join(" + "), rhs);
        debug!("translated '{}' into '{}'", equation, translated);
        Ok(translated)
    }

    /// translate the i-th equation as the equation of `var_names[i]`
    pub fn translate_system(
        &self,
        equations: &[String],
        var_names: &[String],
    ) -> Result<Vec<(String, String)>> {
        if equations.len() > var_names.len() {
            return Err(BenchError::ShapeMismatch(format!(
                "{} equations but only {} variable names",
                equations.len(),
                var_names.len()
            )));
        }
        equations
            .iter()
            .zip(var_names)
            .map(|(eq, var)| Ok((var.clone(), self.translate_equation(eq, var)?)))
            .collect()
    }

    /// translate and parse into a system made of the engine's tokens
    pub fn to_system(
        &self,
        equations: &[String],
        var_names: &[String],
        pool: Option<&TokenPool>,
    ) -> Result<EquationSystem> {
        let translated = self.translate_system(equations, var_names)?;
        EquationSystem::from_texts(
            translated.iter().map(|(v, t)| (v.as_str(), t.as_str())),
            pool,
        )
    }
}
