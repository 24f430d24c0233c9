//! Equation data model in the notation of the evolutionary search engine:
//! `coef * token{power: p} * ... + ... + const = dvar/dx1{power: 1.0}`.
//!
//! Example
//! ```
//! use RustedEqBench::discovery::equation::parse_equation;
//! let eq = parse_equation("20.0 * u{power: 1.0} + -20.0 * u{power: 1.0} * v{power: 1.0} + 0.0 = du/dx1{power: 1.0}").unwrap();
//! assert_eq!(eq.terms.len(), 2);
//! assert_eq!(eq.rhs.label, "du/dx1");
//! ```
use crate::errors::{BenchError, Result};
use crate::numerical::ode_integrator::RhsFn;
use itertools::Itertools;
use nalgebra::DVector;
use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_while1},
    character::complete::{char, multispace0},
    combinator::{eof, map, peek},
    multi::{many0, separated_list1},
    number::complete::double,
    sequence::{delimited, preceded, terminated},
};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// numbers are printed with at least one decimal, as the search engine prints them
pub fn fmt_number(x: f64) -> String {
    if x.is_finite() && x.fract() == 0.0 && x.abs() < 1e15 {
        format!("{:.1}", x)
    } else {
        format!("{}", x)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Factor {
    pub label: String,
    pub power: f64,
}

impl Factor {
    pub fn new(label: &str, power: f64) -> Factor {
        Factor {
            label: label.to_string(),
            power,
        }
    }
}

impl fmt::Display for Factor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{{power: {}}}", self.label, fmt_number(self.power))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Term {
    pub coefficient: f64,
    pub factors: Vec<Factor>,
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", fmt_number(self.coefficient))?;
        for factor in &self.factors {
            write!(f, " * {}", factor)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Equation {
    pub terms: Vec<Term>,
    pub constant: f64,
    pub rhs: Factor,
}

impl Equation {
    /// number of non-constant terms
    pub fn structural_complexity(&self) -> f64 {
        self.terms.len() as f64
    }

    pub fn labels(&self) -> BTreeSet<&str> {
        self.terms
            .iter()
            .flat_map(|t| t.factors.iter())
            .chain(std::iter::once(&self.rhs))
            .map(|f| f.label.as_str())
            .collect()
    }
}

impl fmt::Display for Equation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for term in &self.terms {
            write!(f, "{} + ", term)?;
        }
        write!(f, "{} = {}", fmt_number(self.constant), self.rhs)
    }
}

////////////////////////////////////////////////////////////////////////////////////
//                         PARSER
////////////////////////////////////////////////////////////////////////////////////

fn ws<'a, O, F>(inner: F) -> impl Parser<&'a str, Output = O, Error = nom::error::Error<&'a str>>
where
    F: Parser<&'a str, Output = O, Error = nom::error::Error<&'a str>>,
{
    delimited(multispace0, inner, multispace0)
}

fn parse_label(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| !matches!(c, '{' | '}' | '*' | '+' | '=' | ' ' | '\t' | '\n' | '\r')).parse(input)
}

fn parse_factor(input: &str) -> IResult<&str, Factor> {
    let power = delimited(
        (char('{'), multispace0, tag("power"), multispace0, char(':'), multispace0),
        double,
        (multispace0, char('}')),
    );
    map((parse_label, power), |(label, power)| Factor::new(label, power)).parse(input)
}

/// a number counts as the coefficient only when a term boundary follows it,
/// labels such as `inf_u` or `nanx` are not numbers
fn parse_coefficient(input: &str) -> IResult<&str, f64> {
    terminated(
        ws(double),
        peek(alt((tag("*"), tag("+"), tag("="), eof))),
    )
    .parse(input)
}

fn parse_term(input: &str) -> IResult<&str, Term> {
    let with_coefficient = map(
        (parse_coefficient, many0(preceded(ws(char('*')), ws(parse_factor)))),
        |(coefficient, factors)| Term {
            coefficient,
            factors,
        },
    );
    let without_coefficient = map(
        separated_list1(ws(char('*')), ws(parse_factor)),
        |factors| Term {
            coefficient: 1.0,
            factors,
        },
    );
    alt((with_coefficient, without_coefficient)).parse(input)
}

fn parse_equation_raw(input: &str) -> IResult<&str, (Vec<Term>, Factor)> {
    let (input, terms) = separated_list1(ws(char('+')), parse_term).parse(input)?;
    let (input, _) = ws(char('=')).parse(input)?;
    let (input, rhs) = ws(parse_factor).parse(input)?;
    Ok((input, (terms, rhs)))
}

/// parse the text form of a single equation; terms without factors are summed into the constant
pub fn parse_equation(text: &str) -> Result<Equation> {
    match parse_equation_raw(text) {
        Ok((remaining, (all_terms, rhs))) => {
            if !remaining.trim().is_empty() {
                return Err(BenchError::MalformedEquation(format!(
                    "'{}': unparsed remainder '{}'",
                    text, remaining
                )));
            }
            let (constants, terms): (Vec<Term>, Vec<Term>) =
                all_terms.into_iter().partition(|t| t.factors.is_empty());
            let constant = constants.iter().map(|t| t.coefficient).sum();
            Ok(Equation {
                terms,
                constant,
                rhs,
            })
        }
        Err(e) => Err(BenchError::MalformedEquation(format!("'{}': {:?}", text, e))),
    }
}

/// parse and check that every token is known to the engine
pub fn parse_equation_with_pool(text: &str, pool: &TokenPool) -> Result<Equation> {
    let equation = parse_equation(text)?;
    if let Some(unknown) = equation.labels().into_iter().find(|l| !pool.contains(l)) {
        return Err(BenchError::UnknownToken(unknown.to_string()));
    }
    Ok(equation)
}

////////////////////////////////////////////////////////////////////////////////////
//                         TOKEN POOL
////////////////////////////////////////////////////////////////////////////////////

/// labels of the tokens an engine can build equations from
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TokenPool {
    labels: BTreeSet<String>,
}

impl TokenPool {
    pub fn new<I, S>(labels: I) -> TokenPool
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        TokenPool {
            labels: labels.into_iter().map(Into::into).collect(),
        }
    }

    /// derivative label of order `order` of `var` along axis `axis` (1-based): du/dx1, d^2u/dx2^2 ...
    pub fn derivative_label(var: &str, axis: usize, order: usize) -> String {
        if order == 1 {
            format!("d{}/dx{}", var, axis)
        } else {
            format!("d^{}{}/dx{}^{}", order, var, axis, order)
        }
    }

    /// variables themselves plus all their derivatives up to `max_deriv_order[axis]` along every axis
    pub fn from_variables(variables: &[String], max_deriv_order: &[usize]) -> TokenPool {
        let mut labels = BTreeSet::new();
        for var in variables {
            labels.insert(var.clone());
            for (axis, &max_order) in max_deriv_order.iter().enumerate() {
                for order in 1..=max_order {
                    labels.insert(Self::derivative_label(var, axis + 1, order));
                }
            }
        }
        TokenPool { labels }
    }

    pub fn contains(&self, label: &str) -> bool {
        self.labels.contains(label)
    }

    pub fn labels(&self) -> impl Iterator<Item = &String> {
        self.labels.iter()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl fmt::Display for TokenPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TokenPool[{}]", self.labels.iter().join(", "))
    }
}

////////////////////////////////////////////////////////////////////////////////////
//                         SYSTEM
////////////////////////////////////////////////////////////////////////////////////

/// one equation per described variable
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EquationSystem {
    pub equations: BTreeMap<String, Equation>,
}

enum CompiledFactor {
    State(usize, f64),
    Time(f64),
}

struct CompiledTerm {
    coefficient: f64,
    factors: Vec<CompiledFactor>,
}

fn raise(value: f64, power: f64) -> f64 {
    if power == 1.0 {
        value
    } else if power.fract() == 0.0 && power.abs() < i32::MAX as f64 {
        value.powi(power as i32)
    } else {
        value.powf(power)
    }
}

impl EquationSystem {
    pub fn single(var: &str, equation: Equation) -> EquationSystem {
        let mut equations = BTreeMap::new();
        equations.insert(var.to_string(), equation);
        EquationSystem { equations }
    }

    /// build from (variable, text form) pairs, checking tokens against the pool when given
    pub fn from_texts<'a, I>(texts: I, pool: Option<&TokenPool>) -> Result<EquationSystem>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut equations = BTreeMap::new();
        for (var, text) in texts {
            let equation = match pool {
                Some(pool) => parse_equation_with_pool(text, pool)?,
                None => parse_equation(text)?,
            };
            equations.insert(var.to_string(), equation);
        }
        if equations.is_empty() {
            return Err(BenchError::MalformedEquation("empty equation system".to_string()));
        }
        Ok(EquationSystem { equations })
    }

    pub fn vars_to_describe(&self) -> Vec<String> {
        self.equations.keys().cloned().collect()
    }

    pub fn text_form(&self) -> String {
        if self.equations.len() == 1 {
            self.equations
                .values()
                .map(|eq| eq.to_string())
                .collect::<String>()
        } else {
            self.equations
                .iter()
                .map(|(var, eq)| format!("{}: {}", var, eq))
                .join("\n")
        }
    }

    /// per-equation number of non-constant terms, in variable order
    pub fn complexity(&self) -> Vec<f64> {
        self.equations
            .values()
            .map(Equation::structural_complexity)
            .collect()
    }

    /// right-hand side of the explicit ODE system y' = F(t, y), state ordered as `variables`.
    /// Factors may only be state variables or the time token `time_label`.
    pub fn as_ode_rhs(&self, variables: &[String], time_label: &str) -> Result<RhsFn> {
        let index: BTreeMap<&str, usize> = variables
            .iter()
            .enumerate()
            .map(|(i, v)| (v.as_str(), i))
            .collect();
        let mut compiled: Vec<(Vec<CompiledTerm>, f64)> = Vec::with_capacity(variables.len());
        for var in variables {
            let equation = self.equations.get(var).ok_or_else(|| {
                BenchError::ShapeMismatch(format!("no equation describes variable '{}'", var))
            })?;
            let mut terms = Vec::with_capacity(equation.terms.len());
            for term in &equation.terms {
                let mut factors = Vec::with_capacity(term.factors.len());
                for factor in &term.factors {
                    if let Some(&i) = index.get(factor.label.as_str()) {
                        factors.push(CompiledFactor::State(i, factor.power));
                    } else if factor.label == time_label {
                        factors.push(CompiledFactor::Time(factor.power));
                    } else {
                        return Err(BenchError::UnsupportedTerm(format!(
                            "{} in the equation of {}",
                            factor, var
                        )));
                    }
                }
                terms.push(CompiledTerm {
                    coefficient: term.coefficient,
                    factors,
                });
            }
            compiled.push((terms, equation.constant));
        }

        Ok(Box::new(move |t: f64, y: &DVector<f64>| {
            DVector::from_iterator(
                compiled.len(),
                compiled.iter().map(|(terms, constant)| {
                    terms
                        .iter()
                        .map(|term| {
                            term.factors.iter().fold(term.coefficient, |acc, f| match *f {
                                CompiledFactor::State(i, p) => acc * raise(y[i], p),
                                CompiledFactor::Time(p) => acc * raise(t, p),
                            })
                        })
                        .sum::<f64>()
                        + constant
                }),
            )
        }))
    }
}

impl fmt::Display for EquationSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text_form())
    }
}
