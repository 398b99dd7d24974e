// Query Result Implementation
//
// This module defines the error taxonomy and result alias shared by every
// stage of query composition and execution.

use thiserror::Error;

use crate::common::types::ElementType;

/// Errors raised while composing or executing a query.
///
/// Contract violations (`ArgumentNull`, `UnsupportedShape`, `TypeError`) are
/// reported when an operator is applied. Everything else is reported by the
/// pull on the result sequence that triggered it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    /// A required argument was not supplied
    #[error("Value cannot be null (parameter '{parameter}')")]
    ArgumentNull { parameter: &'static str },
    /// A lambda signature does not match any overload of the operator
    #[error("Unsupported shape for {operator}: {reason}")]
    UnsupportedShape { operator: &'static str, reason: String },
    /// Declared element types are incompatible
    #[error("Type error: {0}")]
    TypeError(String),
    /// A caller-supplied selector, predicate or native function failed
    #[error("Selector '{function}' failed: {message}")]
    SelectorFailed { function: String, message: String },
    /// The provider could not resolve a named source
    #[error("Source not found: {0}")]
    SourceNotFound(String),
    /// Error during query execution
    #[error("Execution error: {0}")]
    ExecutionError(String),
    /// A deferred value was forced on the synchronous path but had not completed
    #[error("Deferred value in '{context}' did not complete synchronously")]
    DeferredNotCompleted { context: String },
    /// The ambient cancellation signal was observed
    #[error("The operation was cancelled")]
    Cancelled,
    /// Numeric overflow
    #[error("Numeric overflow")]
    NumericOverflow,
    /// Division by zero
    #[error("Division by zero")]
    DivisionByZero,
}

impl QueryError {
    /// Build a selector failure from any displayable error
    pub fn selector(function: impl Into<String>, message: impl ToString) -> Self {
        QueryError::SelectorFailed {
            function: function.into(),
            message: message.to_string(),
        }
    }

    pub(crate) fn type_mismatch(context: &str, expected: &ElementType, found: &ElementType) -> Self {
        QueryError::TypeError(format!("{}: expected {}, found {}", context, expected, found))
    }

    /// Whether this error belongs to the call-time contract violations
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            QueryError::ArgumentNull { .. } | QueryError::UnsupportedShape { .. } | QueryError::TypeError(_)
        )
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, QueryError::Cancelled)
    }
}

/// Result type for query operations
pub type QueryResult<T> = std::result::Result<T, QueryError>;
