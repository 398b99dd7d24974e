// Query Operators Module
//
// This module defines the operators used by the synchronous provider path
// in the iterator-based execution model.

pub mod scan;
pub mod filter;
pub mod project;
pub mod flatten;

use std::sync::{Arc, Mutex};

use crate::common::types::Value;
use crate::query::executor::result::{QueryError, QueryResult};

/// The Operator trait defines the interface for all query execution operators
/// in the iterator-based execution model. Each operator pulls elements from
/// its input and passes them to the next operator in the execution plan.
pub trait Operator: Send + Sync {
    /// Initialize the operator before execution
    fn init(&mut self) -> QueryResult<()>;

    /// Get the next element from this operator
    fn next(&mut self) -> QueryResult<Option<Value>>;

    /// Close the operator and release any resources
    fn close(&mut self) -> QueryResult<()>;
}

/// Shared handle to an operator in an operator tree
pub type OperatorRef = Arc<Mutex<dyn Operator>>;

/// Wrap an operator into a shareable handle
pub fn into_ref<O: Operator + 'static>(operator: O) -> OperatorRef {
    Arc::new(Mutex::new(operator))
}

pub(crate) fn init_input(input: &OperatorRef) -> QueryResult<()> {
    lock(input)?.init()
}

pub(crate) fn next_input(input: &OperatorRef) -> QueryResult<Option<Value>> {
    lock(input)?.next()
}

pub(crate) fn close_input(input: &OperatorRef) -> QueryResult<()> {
    lock(input)?.close()
}

fn lock(input: &OperatorRef) -> QueryResult<std::sync::MutexGuard<'_, dyn Operator + 'static>> {
    input
        .lock()
        .map_err(|e| QueryError::ExecutionError(format!("Failed to lock input operator: {}", e)))
}

pub(crate) fn not_initialized() -> QueryError {
    QueryError::ExecutionError("Operator not initialized".to_string())
}
