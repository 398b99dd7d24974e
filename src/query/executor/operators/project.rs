// Projection Operator Implementation
//
// This module implements the projection operator applying a canonical
// `(element, index)` selector to every input element.

use crate::common::types::Value;
use crate::query::executor::context::ExecutionContext;
use crate::query::executor::expression_eval::invoke;
use crate::query::executor::operators::{close_input, init_input, next_input, not_initialized, Operator, OperatorRef};
use crate::query::executor::result::QueryResult;
use crate::query::expr::Lambda;

/// Projection operator that maps every input element through a selector
pub struct ProjectionOperator {
    /// The input operator
    input: OperatorRef,
    selector: Lambda,
    /// Position of the next input element
    index: usize,
    ctx: ExecutionContext,
    initialized: bool,
}

impl ProjectionOperator {
    pub fn new(input: OperatorRef, selector: Lambda, ctx: ExecutionContext) -> Self {
        ProjectionOperator {
            input,
            selector,
            index: 0,
            ctx,
            initialized: false,
        }
    }
}

impl Operator for ProjectionOperator {
    fn init(&mut self) -> QueryResult<()> {
        init_input(&self.input)?;
        self.index = 0;
        self.initialized = true;
        Ok(())
    }

    fn next(&mut self) -> QueryResult<Option<Value>> {
        if !self.initialized {
            return Err(not_initialized());
        }
        let Some(element) = next_input(&self.input)? else {
            return Ok(None);
        };
        self.ctx.check_cancelled()?;

        let value = invoke(&self.selector, vec![element], self.index, self.ctx.cancellation())?;
        self.index += 1;
        Ok(Some(value))
    }

    fn close(&mut self) -> QueryResult<()> {
        self.initialized = false;
        close_input(&self.input)
    }
}
