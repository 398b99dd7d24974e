// Query Processing Module
//
// This module contains the expression model, the shape classifier and
// rewriter, the execution engine, providers and the operator surface.

pub mod expr;
pub mod planner;
pub mod executor;
pub mod provider;
pub mod surface;

// Export key public interfaces
pub use executor::engine::{DispatchMode, EngineConfig, ExecutionEngine};
pub use executor::result::{QueryError, QueryResult};
pub use executor::sequence::ResultSequence;
pub use surface::QuerySource;
