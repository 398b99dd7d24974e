// Expression Tree
//
// This module defines the expression nodes that make up lambda bodies.
// Native closures are held behind `Arc`, so cloning or rewriting an
// expression never duplicates captured state.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use tokio_util::sync::CancellationToken;

use crate::common::types::Value;
use crate::query::executor::result::QueryResult;

/// Native function returning its value immediately
pub type ImmediateFn = Arc<dyn Fn(&[Value], &CancellationToken) -> QueryResult<Value> + Send + Sync>;

/// Native function returning a deferred value
pub type DeferredFn =
    Arc<dyn Fn(Vec<Value>, CancellationToken) -> BoxFuture<'static, QueryResult<Value>> + Send + Sync>;

/// A caller-supplied function referenced from an expression
#[derive(Clone)]
pub enum Function {
    Immediate { name: Arc<str>, func: ImmediateFn },
    Deferred { name: Arc<str>, func: DeferredFn },
}

impl Function {
    pub fn name(&self) -> &str {
        match self {
            Function::Immediate { name, .. } | Function::Deferred { name, .. } => name,
        }
    }

    pub fn is_deferred(&self) -> bool {
        matches!(self, Function::Deferred { .. })
    }

    /// Whether two handles point at the same native closure
    pub fn same_closure(&self, other: &Function) -> bool {
        match (self, other) {
            (Function::Immediate { func: a, .. }, Function::Immediate { func: b, .. }) => Arc::ptr_eq(a, b),
            (Function::Deferred { func: a, .. }, Function::Deferred { func: b, .. }) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Function::Immediate { name, .. } => write!(f, "{}(..)", name),
            Function::Deferred { name, .. } => write!(f, "{}(..).await", name),
        }
    }
}

/// Where a native call obtains its cancellation token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenRef {
    /// A cancellation parameter declared on the enclosing lambda
    Param(Arc<str>),
    /// The signal supplied to the overall query execution
    Ambient,
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,
    Remainder,
    // Comparison
    Equals,
    NotEquals,
    LessThan,
    LessEquals,
    GreaterThan,
    GreaterEquals,
    // Logical
    And,
    Or,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Remainder => "%",
            BinaryOp::Equals => "==",
            BinaryOp::NotEquals => "!=",
            BinaryOp::LessThan => "<",
            BinaryOp::LessEquals => "<=",
            BinaryOp::GreaterThan => ">",
            BinaryOp::GreaterEquals => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        };
        write!(f, "{}", symbol)
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Negate,
    Not,
}

/// Expression node of a lambda body
#[derive(Debug, Clone)]
pub enum Expr {
    /// Constant value
    Literal(Value),
    /// Reference to a lambda parameter
    Param(Arc<str>),
    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    /// Sequence constructor
    List(Vec<Expr>),
    Conditional {
        condition: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    /// Invocation of a native function
    Call {
        function: Function,
        args: Vec<Expr>,
        token: Option<TokenRef>,
    },
    /// A deferred value that is already completed with the inner result
    Completed(Box<Expr>),
    /// Forces a deferred value without suspending
    RunToCompletion(Box<Expr>),
}

impl Expr {
    pub fn lit(value: impl Into<Value>) -> Self {
        Expr::Literal(value.into())
    }

    pub fn int(i: i64) -> Self {
        Expr::Literal(Value::Integer(i))
    }

    pub fn float(f: f64) -> Self {
        Expr::Literal(Value::Float(f))
    }

    pub fn param(name: &str) -> Self {
        Expr::Param(Arc::from(name))
    }

    pub fn list(items: Vec<Expr>) -> Self {
        Expr::List(items)
    }

    pub fn completed(inner: Expr) -> Self {
        Expr::Completed(Box::new(inner))
    }

    pub fn conditional(condition: Expr, then: Expr, otherwise: Expr) -> Self {
        Expr::Conditional {
            condition: Box::new(condition),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        }
    }

    pub fn binary(self, op: BinaryOp, right: Expr) -> Self {
        Expr::Binary {
            left: Box::new(self),
            op,
            right: Box::new(right),
        }
    }

    pub fn add(self, right: Expr) -> Self {
        self.binary(BinaryOp::Add, right)
    }

    pub fn sub(self, right: Expr) -> Self {
        self.binary(BinaryOp::Subtract, right)
    }

    pub fn mul(self, right: Expr) -> Self {
        self.binary(BinaryOp::Multiply, right)
    }

    pub fn rem(self, right: Expr) -> Self {
        self.binary(BinaryOp::Remainder, right)
    }

    pub fn eq(self, right: Expr) -> Self {
        self.binary(BinaryOp::Equals, right)
    }

    pub fn gt(self, right: Expr) -> Self {
        self.binary(BinaryOp::GreaterThan, right)
    }

    pub fn negate(self) -> Self {
        Expr::Unary {
            op: UnaryOp::Negate,
            expr: Box::new(self),
        }
    }

    /// Call a native function that returns immediately
    pub fn call<F>(name: &str, args: Vec<Expr>, func: F) -> Self
    where
        F: Fn(&[Value]) -> QueryResult<Value> + Send + Sync + 'static,
    {
        Expr::Call {
            function: Function::Immediate {
                name: Arc::from(name),
                func: Arc::new(move |args: &[Value], _: &CancellationToken| func(args)),
            },
            args,
            token: None,
        }
    }

    /// Call a native function that receives the cancellation parameter `token_param`
    pub fn call_cancellable<F>(name: &str, args: Vec<Expr>, token_param: &str, func: F) -> Self
    where
        F: Fn(&[Value], &CancellationToken) -> QueryResult<Value> + Send + Sync + 'static,
    {
        Expr::Call {
            function: Function::Immediate {
                name: Arc::from(name),
                func: Arc::new(func),
            },
            args,
            token: Some(TokenRef::Param(Arc::from(token_param))),
        }
    }

    /// Call a native function whose result is deferred
    pub fn call_async<F, Fut>(name: &str, args: Vec<Expr>, func: F) -> Self
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = QueryResult<Value>> + Send + 'static,
    {
        Expr::Call {
            function: Function::Deferred {
                name: Arc::from(name),
                func: Arc::new(move |args: Vec<Value>, _: CancellationToken| func(args).boxed()),
            },
            args,
            token: None,
        }
    }

    /// Call a native function whose result is deferred and which observes
    /// the cancellation parameter `token_param`
    pub fn call_async_cancellable<F, Fut>(name: &str, args: Vec<Expr>, token_param: &str, func: F) -> Self
    where
        F: Fn(Vec<Value>, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = QueryResult<Value>> + Send + 'static,
    {
        Expr::Call {
            function: Function::Deferred {
                name: Arc::from(name),
                func: Arc::new(move |args: Vec<Value>, token: CancellationToken| func(args, token).boxed()),
            },
            args,
            token: Some(TokenRef::Param(Arc::from(token_param))),
        }
    }

    /// Whether evaluating this node yields a deferred value rather than a plain one
    pub fn produces_deferred(&self) -> bool {
        match self {
            Expr::Completed(_) => true,
            Expr::Call { function, .. } => function.is_deferred(),
            Expr::Conditional { then, otherwise, .. } => then.produces_deferred() && otherwise.produces_deferred(),
            _ => false,
        }
    }

    /// First deferred node that sits where only a plain value can be used.
    /// `deferred_position` tells whether this node itself may be deferred:
    /// true for the root of a deferred body, the branches of a conditional
    /// in such a position, and the operand of `RunToCompletion`.
    pub fn misplaced_deferred(&self, deferred_position: bool) -> Option<&Expr> {
        match self {
            Expr::Literal(_) | Expr::Param(_) => None,
            Expr::Completed(inner) => {
                if !deferred_position {
                    return Some(self);
                }
                inner.misplaced_deferred(false)
            }
            Expr::Call { function, args, .. } => {
                if function.is_deferred() && !deferred_position {
                    return Some(self);
                }
                args.iter().find_map(|arg| arg.misplaced_deferred(false))
            }
            Expr::Conditional { condition, then, otherwise } => condition
                .misplaced_deferred(false)
                .or_else(|| then.misplaced_deferred(deferred_position))
                .or_else(|| otherwise.misplaced_deferred(deferred_position)),
            Expr::RunToCompletion(inner) => inner.misplaced_deferred(true),
            Expr::Binary { left, right, .. } => {
                left.misplaced_deferred(false).or_else(|| right.misplaced_deferred(false))
            }
            Expr::Unary { expr, .. } => expr.misplaced_deferred(false),
            Expr::List(items) => items.iter().find_map(|item| item.misplaced_deferred(false)),
        }
    }

    /// Visit this node and every descendant, parents first
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a Expr)) {
        visit(self);
        match self {
            Expr::Literal(_) | Expr::Param(_) => {}
            Expr::Binary { left, right, .. } => {
                left.walk(visit);
                right.walk(visit);
            }
            Expr::Unary { expr, .. } | Expr::Completed(expr) | Expr::RunToCompletion(expr) => expr.walk(visit),
            Expr::List(items) => items.iter().for_each(|item| item.walk(visit)),
            Expr::Conditional { condition, then, otherwise } => {
                condition.walk(visit);
                then.walk(visit);
                otherwise.walk(visit);
            }
            Expr::Call { args, .. } => args.iter().for_each(|arg| arg.walk(visit)),
        }
    }

    /// Rebuild this expression, replacing every token reference with `map(token)`
    pub fn map_tokens(&self, map: &dyn Fn(&TokenRef) -> TokenRef) -> Expr {
        match self {
            Expr::Literal(_) | Expr::Param(_) => self.clone(),
            Expr::Binary { left, op, right } => Expr::Binary {
                left: Box::new(left.map_tokens(map)),
                op: *op,
                right: Box::new(right.map_tokens(map)),
            },
            Expr::Unary { op, expr } => Expr::Unary {
                op: *op,
                expr: Box::new(expr.map_tokens(map)),
            },
            Expr::List(items) => Expr::List(items.iter().map(|item| item.map_tokens(map)).collect()),
            Expr::Conditional { condition, then, otherwise } => Expr::Conditional {
                condition: Box::new(condition.map_tokens(map)),
                then: Box::new(then.map_tokens(map)),
                otherwise: Box::new(otherwise.map_tokens(map)),
            },
            Expr::Call { function, args, token } => Expr::Call {
                function: function.clone(),
                args: args.iter().map(|arg| arg.map_tokens(map)).collect(),
                token: token.as_ref().map(map),
            },
            Expr::Completed(inner) => Expr::Completed(Box::new(inner.map_tokens(map))),
            Expr::RunToCompletion(inner) => Expr::RunToCompletion(Box::new(inner.map_tokens(map))),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(value) => write!(f, "{}", value),
            Expr::Param(name) => write!(f, "{}", name),
            Expr::Binary { left, op, right } => write!(f, "({} {} {})", left, op, right),
            Expr::Unary { op: UnaryOp::Negate, expr } => write!(f, "-{}", expr),
            Expr::Unary { op: UnaryOp::Not, expr } => write!(f, "!{}", expr),
            Expr::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Expr::Conditional { condition, then, otherwise } => {
                write!(f, "if {} {{ {} }} else {{ {} }}", condition, then, otherwise)
            }
            Expr::Call { function, args, token } => {
                write!(f, "{}(", function.name())?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                match token {
                    Some(TokenRef::Param(name)) => write!(f, "; {})", name),
                    Some(TokenRef::Ambient) => write!(f, "; <ambient>)"),
                    None => write!(f, ")"),
                }
            }
            Expr::Completed(inner) => write!(f, "completed({})", inner),
            Expr::RunToCompletion(inner) => write!(f, "run_to_completion({})", inner),
        }
    }
}
