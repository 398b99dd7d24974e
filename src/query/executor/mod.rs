// Query Executor Module
//
// This module is responsible for executing rewritten plans and producing
// results. The synchronous path follows the iterator-based execution model;
// both paths are exposed to callers as a `ResultSequence`.

pub mod context;
pub mod engine;
pub mod expression_eval;
pub mod operators;
pub mod result;
pub mod sequence;

// Export key types
pub use self::context::ExecutionContext;
pub use self::engine::ExecutionEngine;
pub use self::operators::Operator;
pub use self::result::QueryResult;
pub use self::sequence::ResultSequence;
