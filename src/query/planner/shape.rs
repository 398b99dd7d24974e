// Overload Shape Classification
//
// Every operator overload is described by four independent axes. A call is
// classified purely from the declared signatures of its lambda operands.

use std::fmt;

use crate::common::types::ElementType;
use crate::query::executor::result::{QueryError, QueryResult};
use crate::query::expr::{Expr, Lambda, ParamKind, TokenRef, TypeRef};

/// Prefix reserved for parameters synthesised during rewriting
pub const RESERVED_PREFIX: char = '$';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arity {
    /// One projection
    Single,
    /// Collection selector followed by a result selector
    WithResultSelector,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Indexing {
    Element,
    ElementAndIndex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Asynchrony {
    Immediate,
    Deferred,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cancellation {
    None,
    Token,
}

/// Resolved overload shape of one operator call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Shape {
    pub arity: Arity,
    pub indexing: Indexing,
    pub asynchrony: Asynchrony,
    pub cancellation: Cancellation,
}

impl Shape {
    /// Every well-formed shape, in ordinal order
    pub const ALL: [Shape; 16] = {
        let mut all = [Shape::from_bits(0); 16];
        let mut i = 0;
        while i < 16 {
            all[i] = Shape::from_bits(i);
            i += 1;
        }
        all
    };

    const fn from_bits(bits: usize) -> Shape {
        Shape {
            arity: if bits & 0b1000 == 0 { Arity::Single } else { Arity::WithResultSelector },
            indexing: if bits & 0b0100 == 0 { Indexing::Element } else { Indexing::ElementAndIndex },
            asynchrony: if bits & 0b0010 == 0 { Asynchrony::Immediate } else { Asynchrony::Deferred },
            cancellation: if bits & 0b0001 == 0 { Cancellation::None } else { Cancellation::Token },
        }
    }

    /// Position of this shape in [`Shape::ALL`]
    pub const fn ordinal(&self) -> usize {
        (matches!(self.arity, Arity::WithResultSelector) as usize) << 3
            | (matches!(self.indexing, Indexing::ElementAndIndex) as usize) << 2
            | (matches!(self.asynchrony, Asynchrony::Deferred) as usize) << 1
            | matches!(self.cancellation, Cancellation::Token) as usize
    }

    /// Surface flavour that exposes this shape
    pub fn flavor(&self) -> Flavor {
        match (self.asynchrony, self.cancellation) {
            (Asynchrony::Immediate, _) => Flavor::Plain,
            (Asynchrony::Deferred, Cancellation::None) => Flavor::Await,
            (Asynchrony::Deferred, Cancellation::Token) => Flavor::AwaitWithCancellation,
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}{}",
            match self.flavor() {
                Flavor::Plain => "plain",
                Flavor::Await => "await",
                Flavor::AwaitWithCancellation => "await_with_cancellation",
            },
            if self.indexing == Indexing::ElementAndIndex { "+index" } else { "" },
            if self.asynchrony == Asynchrony::Immediate && self.cancellation == Cancellation::Token {
                "+token"
            } else {
                ""
            },
            if self.arity == Arity::WithResultSelector { "+result" } else { "" },
        )
    }
}

/// Naming flavour of a surface entry point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flavor {
    /// Selectors return their value directly
    Plain,
    /// Selectors return a deferred value
    Await,
    /// Selectors return a deferred value and receive a cancellation token
    AwaitWithCancellation,
}

/// Logical operator family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperatorKind {
    Select,
    Where,
    SelectMany,
}

impl OperatorKind {
    pub fn name(&self) -> &'static str {
        match self {
            OperatorKind::Select => "Select",
            OperatorKind::Where => "Where",
            OperatorKind::SelectMany => "SelectMany",
        }
    }
}

/// Description of one operator invocation, consumed by [`classify`]
#[derive(Debug, Clone, Copy)]
pub struct OperatorCall<'a> {
    pub operator: OperatorKind,
    pub flavor: Flavor,
    /// Declared element type of the source
    pub source_type: &'a ElementType,
    /// Selector, predicate or collection selector
    pub primary: &'a Lambda,
    /// Result selector of the two-level form
    pub secondary: Option<&'a Lambda>,
}

/// Signature of one lambda along the axes it can express
struct LambdaSignature<'a> {
    elements: Vec<&'a ElementType>,
    indexing: Indexing,
    asynchrony: Asynchrony,
    cancellation: Cancellation,
}

/// Resolve the overload shape of `call`.
///
/// Fails with `UnsupportedShape` when a signature fits no overload of the
/// called entry point and with `TypeError` when declared element types do
/// not line up with the source.
pub fn classify(call: &OperatorCall<'_>) -> QueryResult<Shape> {
    let operator = call.operator.name();
    let primary = read_signature(operator, call.primary)?;

    if primary.elements.len() != 1 {
        return Err(unsupported(operator, format!(
            "selector must declare exactly one element parameter, found {}",
            primary.elements.len()
        )));
    }
    check_flavor(operator, call.flavor, primary.asynchrony, primary.cancellation)?;
    check_assignable(
        "selector element parameter",
        call.source_type,
        primary.elements[0],
    )?;

    let payload = call.primary.returns().payload();
    match call.operator {
        OperatorKind::Select => {}
        OperatorKind::Where => {
            if !ElementType::Boolean.is_assignable_to(payload) {
                return Err(unsupported(operator, format!("predicate must return bool, declared {}", payload)));
            }
        }
        OperatorKind::SelectMany => {
            if !matches!(payload, ElementType::List(_) | ElementType::Any) {
                return Err(unsupported(operator, format!("selector must return a sequence, declared {}", payload)));
            }
        }
    }

    let arity = match call.secondary {
        None => Arity::Single,
        Some(_) if call.operator != OperatorKind::SelectMany => {
            return Err(unsupported(operator, "operator takes no result selector".to_string()));
        }
        Some(result_selector) => {
            let secondary = read_signature(operator, result_selector)?;
            if secondary.elements.len() != 2 {
                return Err(unsupported(operator, format!(
                    "result selector must declare two element parameters, found {}",
                    secondary.elements.len()
                )));
            }
            if secondary.indexing == Indexing::ElementAndIndex {
                return Err(unsupported(operator, "result selector cannot take an index".to_string()));
            }
            if secondary.asynchrony != primary.asynchrony || secondary.cancellation != primary.cancellation {
                return Err(unsupported(
                    operator,
                    "result selector must match the collection selector's asynchrony and cancellation".to_string(),
                ));
            }
            check_assignable("result selector source parameter", call.source_type, secondary.elements[0])?;
            let any = ElementType::Any;
            let item_type = match payload {
                ElementType::List(inner) => inner.as_ref(),
                _ => &any,
            };
            check_assignable("result selector collection parameter", item_type, secondary.elements[1])?;
            Arity::WithResultSelector
        }
    };

    Ok(Shape {
        arity,
        indexing: primary.indexing,
        asynchrony: primary.asynchrony,
        cancellation: primary.cancellation,
    })
}

/// Read the axes expressed by one lambda. Parameters must be declared as
/// elements, then an optional index, then an optional cancellation token.
fn read_signature<'a>(operator: &'static str, lambda: &'a Lambda) -> QueryResult<LambdaSignature<'a>> {
    let mut elements = Vec::new();
    let mut indexing = Indexing::Element;
    let mut cancellation = Cancellation::None;

    for (position, param) in lambda.params().iter().enumerate() {
        if param.name.starts_with(RESERVED_PREFIX) {
            return Err(unsupported(operator, format!("parameter name '{}' is reserved", param.name)));
        }
        if lambda.params()[..position].iter().any(|p| p.name == param.name) {
            return Err(unsupported(operator, format!("duplicate parameter '{}'", param.name)));
        }
        match &param.kind {
            ParamKind::Element(t) if indexing == Indexing::Element && cancellation == Cancellation::None => {
                elements.push(t)
            }
            ParamKind::Index if indexing == Indexing::Element && cancellation == Cancellation::None => {
                indexing = Indexing::ElementAndIndex
            }
            ParamKind::Cancellation if cancellation == Cancellation::None => cancellation = Cancellation::Token,
            _ => {
                return Err(unsupported(operator, format!(
                    "parameter '{}' is out of order in {}",
                    param.name, lambda
                )));
            }
        }
    }

    let asynchrony = match lambda.returns() {
        TypeRef::Immediate(_) => Asynchrony::Immediate,
        TypeRef::Deferred(_) => Asynchrony::Deferred,
    };
    let body_is_deferred = lambda.body().produces_deferred();
    if body_is_deferred != (asynchrony == Asynchrony::Deferred) {
        return Err(unsupported(operator, format!(
            "body of {} does not match its declared return type",
            lambda
        )));
    }
    check_body(operator, lambda, asynchrony)?;

    Ok(LambdaSignature {
        elements,
        indexing,
        asynchrony,
        cancellation,
    })
}

/// Reject bodies that could only fail once evaluated: a deferred value used
/// where a plain one is required, or a reference to an undeclared parameter.
fn check_body(operator: &'static str, lambda: &Lambda, asynchrony: Asynchrony) -> QueryResult<()> {
    if let Some(node) = lambda.body().misplaced_deferred(asynchrony == Asynchrony::Deferred) {
        return Err(unsupported(operator, format!(
            "deferred expression {} is used as a plain value in {}",
            node, lambda
        )));
    }

    let mut undeclared = None;
    lambda.body().walk(&mut |node| {
        if undeclared.is_some() {
            return;
        }
        match node {
            Expr::Param(name) if !declares(lambda, name, false) => {
                undeclared = Some(format!("undeclared parameter '{}'", name));
            }
            Expr::Call {
                token: Some(TokenRef::Param(name)),
                ..
            } if !declares(lambda, name, true) => {
                undeclared = Some(format!("undeclared cancellation parameter '{}'", name));
            }
            _ => {}
        }
    });
    match undeclared {
        Some(reason) => Err(unsupported(operator, format!("{} in {}", reason, lambda))),
        None => Ok(()),
    }
}

/// Whether `lambda` declares `name` as a value parameter, or as its
/// cancellation parameter when `token` is set
fn declares(lambda: &Lambda, name: &str, token: bool) -> bool {
    lambda
        .params()
        .iter()
        .any(|p| &*p.name == name && (p.kind == ParamKind::Cancellation) == token)
}

fn check_flavor(
    operator: &'static str,
    flavor: Flavor,
    asynchrony: Asynchrony,
    cancellation: Cancellation,
) -> QueryResult<()> {
    let admitted = match flavor {
        Flavor::Plain => asynchrony == Asynchrony::Immediate,
        Flavor::Await => asynchrony == Asynchrony::Deferred && cancellation == Cancellation::None,
        Flavor::AwaitWithCancellation => asynchrony == Asynchrony::Deferred && cancellation == Cancellation::Token,
    };
    if admitted {
        Ok(())
    } else {
        Err(unsupported(operator, format!(
            "{:?} selector with {:?} cancellation is not accepted by the {:?} overloads",
            asynchrony, cancellation, flavor
        )))
    }
}

fn check_assignable(context: &str, supplied: &ElementType, declared: &ElementType) -> QueryResult<()> {
    if supplied.is_assignable_to(declared) {
        Ok(())
    } else {
        Err(QueryError::type_mismatch(context, declared, supplied))
    }
}

fn unsupported(operator: &'static str, reason: String) -> QueryError {
    QueryError::UnsupportedShape { operator, reason }
}
