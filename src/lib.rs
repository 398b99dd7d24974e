// Async Query Adapter
//
// Composes queries against an asynchronous operator surface and executes
// them through a synchronous, expression-tree based provider or its native
// asynchronous backend.

pub mod common;
pub mod query;

// Re-export key items for convenient access
pub use common::types::{ElementType, Value};
pub use query::executor::engine::{DispatchMode, EngineConfig, ExecutionEngine};
pub use query::executor::result::{QueryError, QueryResult};
pub use query::executor::sequence::ResultSequence;
pub use query::expr::{Deferred, Expr, Lambda};
pub use query::provider::{AsyncQueryProvider, InMemoryProvider, QueryProvider};
pub use query::surface::QuerySource;
