// Filter Operator Implementation
//
// This module implements the filter operator keeping the elements a
// canonical `(element, index)` predicate accepts.

use crate::common::types::Value;
use crate::query::executor::context::ExecutionContext;
use crate::query::executor::expression_eval::invoke;
use crate::query::executor::operators::{close_input, init_input, next_input, not_initialized, Operator, OperatorRef};
use crate::query::executor::result::{QueryError, QueryResult};
use crate::query::expr::Lambda;

/// Filter operator that filters elements based on a predicate
pub struct FilterOperator {
    /// The input operator
    input: OperatorRef,
    predicate: Lambda,
    /// Position of the next input element
    index: usize,
    ctx: ExecutionContext,
    initialized: bool,
}

impl FilterOperator {
    pub fn new(input: OperatorRef, predicate: Lambda, ctx: ExecutionContext) -> Self {
        FilterOperator {
            input,
            predicate,
            index: 0,
            ctx,
            initialized: false,
        }
    }
}

/// Interpret a predicate result. Null rejects the element.
pub(crate) fn accepts(predicate: &Lambda, result: Value) -> QueryResult<bool> {
    match result {
        Value::Boolean(b) => Ok(b),
        Value::Null => Ok(false),
        other => Err(QueryError::TypeError(format!(
            "Predicate {} returned non-boolean {}",
            predicate, other
        ))),
    }
}

impl Operator for FilterOperator {
    fn init(&mut self) -> QueryResult<()> {
        init_input(&self.input)?;
        self.index = 0;
        self.initialized = true;
        Ok(())
    }

    /// Get the next element that satisfies the predicate
    fn next(&mut self) -> QueryResult<Option<Value>> {
        if !self.initialized {
            return Err(not_initialized());
        }

        loop {
            let Some(element) = next_input(&self.input)? else {
                return Ok(None);
            };
            self.ctx.check_cancelled()?;

            let index = self.index;
            self.index += 1;
            let result = invoke(&self.predicate, vec![element.clone()], index, self.ctx.cancellation())?;
            if accepts(&self.predicate, result)? {
                return Ok(Some(element));
            }
        }
    }

    fn close(&mut self) -> QueryResult<()> {
        self.initialized = false;
        close_input(&self.input)
    }
}
