// Flatten Operator Implementation
//
// This module implements flatten-then-project: every input element is mapped
// to a sequence by the collection selector, and every item of that sequence
// is paired with its element through the result selector.

use std::vec;

use crate::common::types::Value;
use crate::query::executor::context::ExecutionContext;
use crate::query::executor::expression_eval::invoke;
use crate::query::executor::operators::{close_input, init_input, next_input, not_initialized, Operator, OperatorRef};
use crate::query::executor::result::{QueryError, QueryResult};
use crate::query::expr::Lambda;

/// Flatten operator over canonical collection and result selectors
pub struct FlattenOperator {
    /// The input operator
    input: OperatorRef,
    collection_selector: Lambda,
    result_selector: Lambda,
    /// Position of the next input element
    index: usize,
    /// Element whose collection is being drained, with the remaining items
    current: Option<(Value, vec::IntoIter<Value>)>,
    ctx: ExecutionContext,
    initialized: bool,
}

impl FlattenOperator {
    pub fn new(
        input: OperatorRef,
        collection_selector: Lambda,
        result_selector: Lambda,
        ctx: ExecutionContext,
    ) -> Self {
        FlattenOperator {
            input,
            collection_selector,
            result_selector,
            index: 0,
            current: None,
            ctx,
            initialized: false,
        }
    }
}

/// Interpret a collection selector result as a sequence. Null is empty.
pub(crate) fn into_sequence(selector: &Lambda, collection: Value) -> QueryResult<Vec<Value>> {
    collection.into_list().map_err(|other| {
        QueryError::TypeError(format!(
            "Collection selector {} produced non-sequence value {}",
            selector, other
        ))
    })
}

impl Operator for FlattenOperator {
    fn init(&mut self) -> QueryResult<()> {
        init_input(&self.input)?;
        self.index = 0;
        self.current = None;
        self.initialized = true;
        Ok(())
    }

    fn next(&mut self) -> QueryResult<Option<Value>> {
        if !self.initialized {
            return Err(not_initialized());
        }

        loop {
            if let Some((element, items)) = &mut self.current {
                if let Some(item) = items.next() {
                    self.ctx.check_cancelled()?;
                    let value = invoke(
                        &self.result_selector,
                        vec![element.clone(), item],
                        0,
                        self.ctx.cancellation(),
                    )?;
                    return Ok(Some(value));
                }
                self.current = None;
            }

            let Some(element) = next_input(&self.input)? else {
                return Ok(None);
            };
            self.ctx.check_cancelled()?;

            let index = self.index;
            self.index += 1;
            let collection = invoke(
                &self.collection_selector,
                vec![element.clone()],
                index,
                self.ctx.cancellation(),
            )?;
            let items = into_sequence(&self.collection_selector, collection)?;
            self.current = Some((element, items.into_iter()));
        }
    }

    fn close(&mut self) -> QueryResult<()> {
        self.initialized = false;
        self.current = None;
        close_input(&self.input)
    }
}
