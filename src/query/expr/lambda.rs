// Lambda Expressions
//
// A lambda is a parameter list, a declared return type and an expression
// body. The declared signature is what operator overloads are resolved
// against; the body is what gets rewritten and evaluated.

use std::fmt;
use std::sync::Arc;

use crate::common::types::ElementType;
use crate::query::expr::ast::Expr;

/// Role of a lambda parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamKind {
    /// An element of a sequence
    Element(ElementType),
    /// Zero-based position of the element within its source
    Index,
    /// Cancellation signal of the current execution
    Cancellation,
}

/// Declared lambda parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: Arc<str>,
    pub kind: ParamKind,
}

impl Param {
    pub fn element(name: &str, element_type: ElementType) -> Self {
        Param {
            name: Arc::from(name),
            kind: ParamKind::Element(element_type),
        }
    }

    pub fn index(name: &str) -> Self {
        Param {
            name: Arc::from(name),
            kind: ParamKind::Index,
        }
    }

    pub fn cancellation(name: &str) -> Self {
        Param {
            name: Arc::from(name),
            kind: ParamKind::Cancellation,
        }
    }
}

/// Declared return type of a lambda
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeRef {
    /// The value is returned directly
    Immediate(ElementType),
    /// The value is wrapped in a deferred completion
    Deferred(ElementType),
}

impl TypeRef {
    pub fn is_deferred(&self) -> bool {
        matches!(self, TypeRef::Deferred(_))
    }

    /// The element type carried by the return value
    pub fn payload(&self) -> &ElementType {
        match self {
            TypeRef::Immediate(t) | TypeRef::Deferred(t) => t,
        }
    }
}

/// A lambda expression operand
#[derive(Debug, Clone)]
pub struct Lambda {
    params: Vec<Param>,
    returns: TypeRef,
    body: Arc<Expr>,
}

impl Lambda {
    pub fn new(params: Vec<Param>, returns: TypeRef, body: Expr) -> Self {
        Lambda {
            params,
            returns,
            body: Arc::new(body),
        }
    }

    /// Start building a lambda parameter by parameter
    pub fn build() -> LambdaBuilder {
        LambdaBuilder::default()
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn returns(&self) -> &TypeRef {
        &self.returns
    }

    pub fn body(&self) -> &Expr {
        &self.body
    }

    pub(crate) fn shared_body(&self) -> &Arc<Expr> {
        &self.body
    }

    pub(crate) fn from_parts(params: Vec<Param>, returns: TypeRef, body: Arc<Expr>) -> Self {
        Lambda { params, returns, body }
    }

    pub fn has_index(&self) -> bool {
        self.params.iter().any(|p| p.kind == ParamKind::Index)
    }

    pub fn cancellation_param(&self) -> Option<&Arc<str>> {
        self.params
            .iter()
            .find(|p| p.kind == ParamKind::Cancellation)
            .map(|p| &p.name)
    }
}

impl fmt::Display for Lambda {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "|")?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match &param.kind {
                ParamKind::Element(t) => write!(f, "{}: {}", param.name, t)?,
                ParamKind::Index => write!(f, "{}: index", param.name)?,
                ParamKind::Cancellation => write!(f, "{}: token", param.name)?,
            }
        }
        match &self.returns {
            TypeRef::Immediate(t) => write!(f, "| -> {} {}", t, self.body),
            TypeRef::Deferred(t) => write!(f, "| -> deferred<{}> {}", t, self.body),
        }
    }
}

/// Incremental construction of a [`Lambda`]
#[derive(Debug, Default)]
pub struct LambdaBuilder {
    params: Vec<Param>,
}

impl LambdaBuilder {
    pub fn element(mut self, name: &str, element_type: ElementType) -> Self {
        self.params.push(Param::element(name, element_type));
        self
    }

    pub fn index(mut self, name: &str) -> Self {
        self.params.push(Param::index(name));
        self
    }

    pub fn cancellation(mut self, name: &str) -> Self {
        self.params.push(Param::cancellation(name));
        self
    }

    /// Finish with a body returning its value directly
    pub fn returns(self, element_type: ElementType, body: Expr) -> Lambda {
        Lambda::new(self.params, TypeRef::Immediate(element_type), body)
    }

    /// Finish with a body returning a deferred value
    pub fn returns_deferred(self, element_type: ElementType, body: Expr) -> Lambda {
        Lambda::new(self.params, TypeRef::Deferred(element_type), body)
    }
}
