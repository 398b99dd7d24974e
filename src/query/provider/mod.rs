// Query Provider Module
//
// This module defines the collaborators that execute rewritten plans. A
// provider always offers the synchronous operator path and may expose a
// native asynchronous backend.

pub mod memory;

use crate::query::executor::context::ExecutionContext;
use crate::query::executor::operators::OperatorRef;
use crate::query::executor::result::QueryResult;
use crate::query::planner::physical::RewrittenPlan;
use crate::query::planner::stream_builder::ValueStream;

pub use self::memory::InMemoryProvider;

/// Synchronous query provider
pub trait QueryProvider: Send + Sync {
    /// Name used in diagnostics
    fn name(&self) -> &str;

    /// Build the operator tree for a plan rewritten for the synchronous
    /// target. The returned tree does no work until it is initialised and
    /// pulled.
    fn execute(&self, plan: &RewrittenPlan, ctx: &ExecutionContext) -> QueryResult<OperatorRef>;

    /// Native asynchronous backend, if the provider has one
    fn async_backend(&self) -> Option<&dyn AsyncQueryProvider> {
        None
    }
}

/// Native asynchronous execution of plans rewritten for the asynchronous target
pub trait AsyncQueryProvider: Send + Sync {
    fn execute_async(&self, plan: &RewrittenPlan, ctx: &ExecutionContext) -> QueryResult<ValueStream>;
}
