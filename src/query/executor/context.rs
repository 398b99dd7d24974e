// Execution Context
//
// Per-execution state shared by every operator of one result sequence.

use tokio_util::sync::CancellationToken;

use crate::query::executor::result::{QueryError, QueryResult};

/// Context handed to providers and operators for one execution
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    /// Cancellation signal supplied by the caller for this execution
    cancellation: CancellationToken,
}

impl ExecutionContext {
    pub fn new(cancellation: CancellationToken) -> Self {
        ExecutionContext { cancellation }
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Fail with `QueryError::Cancelled` once the signal has been raised
    pub fn check_cancelled(&self) -> QueryResult<()> {
        if self.cancellation.is_cancelled() {
            return Err(QueryError::Cancelled);
        }
        Ok(())
    }
}
