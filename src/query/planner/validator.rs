// Argument Validation
//
// Null checks for operator entry points. Arguments are checked in one fixed
// order per operator family (source first, then the primary selector, then
// the result selector) before anything else looks at them.

use crate::query::executor::result::{QueryError, QueryResult};
use crate::query::expr::Lambda;
use crate::query::planner::shape::{Arity, OperatorKind};

/// Parameter names of an operator family, in validation order
pub fn parameter_names(operator: OperatorKind, arity: Arity) -> &'static [&'static str] {
    match (operator, arity) {
        (OperatorKind::Select, _) => &["source", "selector"],
        (OperatorKind::Where, _) => &["source", "predicate"],
        (OperatorKind::SelectMany, Arity::Single) => &["source", "selector"],
        (OperatorKind::SelectMany, Arity::WithResultSelector) => {
            &["source", "collection_selector", "result_selector"]
        }
    }
}

/// Operands after validation, all present
#[derive(Debug)]
pub struct ValidatedCall<'a, S> {
    pub source: &'a S,
    pub primary: &'a Lambda,
    pub secondary: Option<&'a Lambda>,
}

/// Result selector slot of an entry point
#[derive(Debug, Clone, Copy)]
pub enum Secondary<'a> {
    /// The entry point has no result selector parameter
    NotApplicable,
    /// The entry point declares a result selector, which may be missing
    Supplied(Option<&'a Lambda>),
}

/// Check that every argument is present, reporting the first missing one.
///
/// Runs before classification and rewriting so that a missing selector is
/// never reported as anything but `ArgumentNull`.
pub fn validate_arguments<'a, S>(
    operator: OperatorKind,
    source: Option<&'a S>,
    primary: Option<&'a Lambda>,
    secondary: Secondary<'a>,
) -> QueryResult<ValidatedCall<'a, S>> {
    let arity = match secondary {
        Secondary::NotApplicable => Arity::Single,
        Secondary::Supplied(_) => Arity::WithResultSelector,
    };
    let names = parameter_names(operator, arity);

    let source = require(source, names[0])?;
    let primary = require(primary, names[1])?;
    let secondary = match secondary {
        Secondary::NotApplicable => None,
        Secondary::Supplied(lambda) => Some(require(lambda, names[2])?),
    };

    Ok(ValidatedCall {
        source,
        primary,
        secondary,
    })
}

fn require<T>(argument: Option<T>, parameter: &'static str) -> QueryResult<T> {
    argument.ok_or(QueryError::ArgumentNull { parameter })
}
