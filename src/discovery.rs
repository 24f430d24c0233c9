#![allow(non_camel_case_types)]
#![allow(non_snake_case)]
/// equations in the token notation of the evolutionary search: factors, terms, equations, systems, token pool
///
///# Example
/// ```
/// use RustedEqBench::discovery::equation::parse_equation;
/// let eq = parse_equation(
///     "20.0 * u{power: 1.0} + -20.0 * u{power: 1.0} * v{power: 1.0} + 0.0 = du/dx1{power: 1.0}",
/// )
/// .unwrap();
/// assert_eq!(eq.terms.len(), 2);
/// assert_eq!(eq.rhs.label, "du/dx1");
/// ```
/// ________________________________________________________________________________________________________________________________
pub mod equation;
///____________________________________________________________________________________________________________________________
/// # Notation translator
/// turns sparse-regression output (`0.998 x0 + -0.998 x0 x1`) into the token notation with a correspondence
/// table checked against the codes of the regression feature library
pub mod translator;
/// complexity-bounded selection of an equation from the search population with relaxation and fallback
pub mod selection;
/// traits of the discovery engines, training data, search and regression hyper-parameters
pub mod engines;
/// boundary-condition value object
pub mod boundary;
/// engines replaying recorded results
pub mod replay;
