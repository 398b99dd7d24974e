// Expression Evaluation Utility
//
// Evaluates lambda bodies against bound arguments. `evaluate` is the
// synchronous path used by provider operators; `evaluate_deferred` is the
// asynchronous path used by the native async backend.

use std::sync::Arc;

use log::warn;
use tokio_util::sync::CancellationToken;

use crate::common::types::Value;
use crate::query::executor::result::{QueryError, QueryResult};
use crate::query::expr::{BinaryOp, Deferred, Expr, Function, Lambda, ParamKind, TokenRef, UnaryOp};

/// Arguments bound to the parameters of one lambda invocation
#[derive(Debug)]
pub struct Scope {
    values: Vec<(Arc<str>, Value)>,
    tokens: Vec<(Arc<str>, CancellationToken)>,
    ambient: CancellationToken,
}

impl Scope {
    /// Bind `elements` (in declaration order), `index` and the ambient token
    /// to the parameters of `lambda`.
    pub fn bind(lambda: &Lambda, elements: Vec<Value>, index: usize, ambient: &CancellationToken) -> QueryResult<Scope> {
        let mut values = Vec::with_capacity(lambda.params().len());
        let mut tokens = Vec::new();
        let mut elements = elements.into_iter();

        for param in lambda.params() {
            match &param.kind {
                ParamKind::Element(element_type) => {
                    let value = elements.next().ok_or_else(|| {
                        QueryError::ExecutionError(format!("no argument supplied for parameter '{}'", param.name))
                    })?;
                    if !element_type.admits(&value) {
                        return Err(QueryError::type_mismatch(
                            &format!("argument for parameter '{}'", param.name),
                            element_type,
                            &value.element_type(),
                        ));
                    }
                    values.push((param.name.clone(), value));
                }
                ParamKind::Index => {
                    let index = i64::try_from(index).map_err(|_| QueryError::NumericOverflow)?;
                    values.push((param.name.clone(), Value::Integer(index)));
                }
                ParamKind::Cancellation => tokens.push((param.name.clone(), ambient.clone())),
            }
        }

        if elements.next().is_some() {
            return Err(QueryError::ExecutionError(format!(
                "lambda declares fewer element parameters than supplied: {}",
                lambda
            )));
        }

        Ok(Scope {
            values,
            tokens,
            ambient: ambient.clone(),
        })
    }

    fn value(&self, name: &str) -> QueryResult<&Value> {
        self.values
            .iter()
            .find(|(n, _)| n.as_ref() == name)
            .map(|(_, v)| v)
            .ok_or_else(|| QueryError::ExecutionError(format!("unbound parameter '{}'", name)))
    }

    fn token(&self, token: Option<&TokenRef>) -> QueryResult<CancellationToken> {
        match token {
            None => Ok(CancellationToken::new()),
            Some(TokenRef::Ambient) => Ok(self.ambient.clone()),
            Some(TokenRef::Param(name)) => self
                .tokens
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, t)| t.clone())
                .ok_or_else(|| QueryError::ExecutionError(format!("unbound cancellation parameter '{}'", name))),
        }
    }
}

/// Evaluate an expression whose value is available immediately
pub fn evaluate(expr: &Expr, scope: &Scope) -> QueryResult<Value> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Param(name) => scope.value(name).cloned(),
        Expr::Binary { left, op, right } => evaluate_binary(left, *op, right, scope),
        Expr::Unary { op, expr } => {
            let value = evaluate(expr, scope)?;
            match (op, value) {
                (_, Value::Null) => Ok(Value::Null),
                (UnaryOp::Negate, Value::Integer(i)) => Ok(Value::Integer(i.checked_neg().ok_or(QueryError::NumericOverflow)?)),
                (UnaryOp::Negate, Value::Float(f)) => Ok(Value::Float(-f)),
                (UnaryOp::Not, Value::Boolean(b)) => Ok(Value::Boolean(!b)),
                (op, value) => Err(QueryError::TypeError(format!("Unsupported operand {} for {:?}", value, op))),
            }
        }
        Expr::List(items) => items
            .iter()
            .map(|item| evaluate(item, scope))
            .collect::<QueryResult<Vec<_>>>()
            .map(Value::List),
        Expr::Conditional { condition, then, otherwise } => {
            if evaluate_condition(condition, scope)? {
                evaluate(then, scope)
            } else {
                evaluate(otherwise, scope)
            }
        }
        Expr::Call { function, args, token } => match function {
            Function::Immediate { func, .. } => {
                let args = evaluate_args(args, scope)?;
                let token = scope.token(token.as_ref())?;
                func(&args, &token)
            }
            Function::Deferred { name, .. } => Err(QueryError::ExecutionError(format!(
                "deferred call '{}' evaluated on a synchronous path",
                name
            ))),
        },
        Expr::Completed(_) => Err(QueryError::ExecutionError(format!(
            "deferred expression {} evaluated on a synchronous path",
            expr
        ))),
        Expr::RunToCompletion(inner) => {
            let deferred = evaluate_deferred(inner, scope)?;
            match deferred.try_get_completed() {
                Ok(result) => result,
                Err(_) => {
                    warn!("Deferred value of {} would suspend; failing instead of blocking", inner);
                    Err(QueryError::DeferredNotCompleted {
                        context: inner.to_string(),
                    })
                }
            }
        }
    }
}

/// Evaluate an expression into a deferred value. Immediate expressions are
/// lifted into an already completed deferred value.
pub fn evaluate_deferred(expr: &Expr, scope: &Scope) -> QueryResult<Deferred> {
    match expr {
        Expr::Completed(inner) => Ok(Deferred::completed(evaluate(inner, scope))),
        Expr::Call {
            function: Function::Deferred { func, .. },
            args,
            token,
        } => {
            let args = evaluate_args(args, scope)?;
            let token = scope.token(token.as_ref())?;
            Ok(Deferred::pending(func(args, token)))
        }
        Expr::Conditional { condition, then, otherwise } => {
            if evaluate_condition(condition, scope)? {
                evaluate_deferred(then, scope)
            } else {
                evaluate_deferred(otherwise, scope)
            }
        }
        // Awaiting is always possible here, so nothing has to be forced
        Expr::RunToCompletion(inner) => evaluate_deferred(inner, scope),
        _ => Ok(Deferred::completed(evaluate(expr, scope))),
    }
}

/// Invoke a lambda whose body is immediate
pub fn invoke(lambda: &Lambda, elements: Vec<Value>, index: usize, ambient: &CancellationToken) -> QueryResult<Value> {
    let scope = Scope::bind(lambda, elements, index, ambient)?;
    evaluate(lambda.body(), &scope)
}

/// Invoke a lambda and await its result, whatever the body's asynchrony
pub async fn invoke_async(
    lambda: Lambda,
    elements: Vec<Value>,
    index: usize,
    ambient: CancellationToken,
) -> QueryResult<Value> {
    if ambient.is_cancelled() {
        return Err(QueryError::Cancelled);
    }
    let scope = Scope::bind(&lambda, elements, index, &ambient)?;
    let deferred = evaluate_deferred(lambda.body(), &scope)?;
    deferred.await
}

fn evaluate_args(args: &[Expr], scope: &Scope) -> QueryResult<Vec<Value>> {
    args.iter().map(|arg| evaluate(arg, scope)).collect()
}

fn evaluate_condition(condition: &Expr, scope: &Scope) -> QueryResult<bool> {
    match evaluate(condition, scope)? {
        Value::Boolean(b) => Ok(b),
        Value::Null => Ok(false),
        other => Err(QueryError::TypeError(format!("Condition evaluated to non-boolean {}", other))),
    }
}

fn evaluate_binary(left: &Expr, op: BinaryOp, right: &Expr, scope: &Scope) -> QueryResult<Value> {
    let left_val = evaluate(left, scope)?;

    // Logical operators short-circuit
    match op {
        BinaryOp::And | BinaryOp::Or => {
            let l = left_val
                .as_bool()
                .ok_or_else(|| QueryError::TypeError(format!("Unsupported operand {} for {}", left_val, op)))?;
            if (op == BinaryOp::And && !l) || (op == BinaryOp::Or && l) {
                return Ok(Value::Boolean(l));
            }
            let right_val = evaluate(right, scope)?;
            return right_val
                .as_bool()
                .map(Value::Boolean)
                .ok_or_else(|| QueryError::TypeError(format!("Unsupported operand {} for {}", right_val, op)));
        }
        _ => {}
    }

    let right_val = evaluate(right, scope)?;
    match op {
        BinaryOp::Equals => return Ok(Value::Boolean(left_val == right_val)),
        BinaryOp::NotEquals => return Ok(Value::Boolean(left_val != right_val)),
        _ => {}
    }

    if left_val == Value::Null || right_val == Value::Null {
        return Ok(Value::Null);
    }

    match op {
        BinaryOp::LessThan | BinaryOp::LessEquals | BinaryOp::GreaterThan | BinaryOp::GreaterEquals => {
            let ordering = left_val
                .partial_cmp(&right_val)
                .ok_or_else(|| QueryError::TypeError(format!("Cannot compare {} {} {}", left_val, op, right_val)))?;
            let result = match op {
                BinaryOp::LessThan => ordering.is_lt(),
                BinaryOp::LessEquals => ordering.is_le(),
                BinaryOp::GreaterThan => ordering.is_gt(),
                _ => ordering.is_ge(),
            };
            Ok(Value::Boolean(result))
        }
        _ => evaluate_arithmetic(left_val, op, right_val),
    }
}

fn evaluate_arithmetic(left: Value, op: BinaryOp, right: Value) -> QueryResult<Value> {
    match (left, right) {
        (Value::Integer(l), Value::Integer(r)) => {
            let result = match op {
                BinaryOp::Add => l.checked_add(r),
                BinaryOp::Subtract => l.checked_sub(r),
                BinaryOp::Multiply => l.checked_mul(r),
                BinaryOp::Divide | BinaryOp::Remainder if r == 0 => return Err(QueryError::DivisionByZero),
                BinaryOp::Divide => l.checked_div(r),
                BinaryOp::Remainder => l.checked_rem(r),
                _ => unreachable!("non-arithmetic operator {}", op),
            };
            result.map(Value::Integer).ok_or(QueryError::NumericOverflow)
        }
        (Value::Text(l), Value::Text(r)) if op == BinaryOp::Add => Ok(Value::Text(l + &r)),
        (l, r) => match (l.as_f64(), r.as_f64()) {
            (Some(l), Some(r)) => match op {
                BinaryOp::Add => Ok(Value::Float(l + r)),
                BinaryOp::Subtract => Ok(Value::Float(l - r)),
                BinaryOp::Multiply => Ok(Value::Float(l * r)),
                BinaryOp::Divide | BinaryOp::Remainder if r == 0.0 => Err(QueryError::DivisionByZero),
                BinaryOp::Divide => Ok(Value::Float(l / r)),
                BinaryOp::Remainder => Ok(Value::Float(l % r)),
                _ => unreachable!("non-arithmetic operator {}", op),
            },
            _ => Err(QueryError::TypeError(format!("Unsupported types for {} operator", op))),
        },
    }
}
