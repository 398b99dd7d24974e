// Query Expression Module
//
// Lambda operands, their expression bodies and the deferred-completion
// wrapper produced by asynchronous selectors.

pub mod ast;
pub mod deferred;
pub mod lambda;

pub use self::ast::{BinaryOp, Expr, Function, TokenRef, UnaryOp};
pub use self::deferred::Deferred;
pub use self::lambda::{Lambda, LambdaBuilder, Param, ParamKind, TypeRef};
