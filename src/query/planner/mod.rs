// Query Planner Module
//
// This module turns operator calls into query trees and query trees into
// physical plans: argument validation, shape classification, rewriting for
// a dispatch target, and building operator trees or streams from the result.

pub mod validator;
pub mod shape;
pub mod logical;
pub mod physical;
pub mod rewriter;
pub mod operator_builder;
pub mod stream_builder;

// Export key types
pub use self::logical::QueryNode;
pub use self::physical::{PhysicalPlan, RewrittenPlan, Target};
pub use self::rewriter::Rewriter;
pub use self::shape::{Arity, Asynchrony, Cancellation, Flavor, Indexing, OperatorKind, Shape};
