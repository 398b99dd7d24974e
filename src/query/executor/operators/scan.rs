// Sequential Scan Operator
//
// This module implements the scan operator reading a source snapshot in
// order.

use std::sync::Arc;

use crate::common::types::Value;
use crate::query::executor::context::ExecutionContext;
use crate::query::executor::operators::{not_initialized, Operator};
use crate::query::executor::result::QueryResult;

/// Scans every element of a source snapshot
pub struct ScanOperator {
    /// Name of the scanned source, for diagnostics
    source: String,
    elements: Arc<Vec<Value>>,
    position: usize,
    ctx: ExecutionContext,
    initialized: bool,
}

impl ScanOperator {
    pub fn new(source: String, elements: Arc<Vec<Value>>, ctx: ExecutionContext) -> Self {
        ScanOperator {
            source,
            elements,
            position: 0,
            ctx,
            initialized: false,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

impl Operator for ScanOperator {
    fn init(&mut self) -> QueryResult<()> {
        self.position = 0;
        self.initialized = true;
        Ok(())
    }

    fn next(&mut self) -> QueryResult<Option<Value>> {
        if !self.initialized {
            return Err(not_initialized());
        }
        self.ctx.check_cancelled()?;

        let element = self.elements.get(self.position).cloned();
        if element.is_some() {
            self.position += 1;
        }
        Ok(element)
    }

    fn close(&mut self) -> QueryResult<()> {
        self.initialized = false;
        Ok(())
    }
}
