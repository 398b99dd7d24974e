// Deferred-completion wrapper
//
// A value that may not have finished computing yet. It can be awaited, or
// forced without suspension on paths that must stay synchronous.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::future::{BoxFuture, FutureExt};

use crate::common::types::Value;
use crate::query::executor::result::{QueryError, QueryResult};

enum State {
    Completed(Option<QueryResult<Value>>),
    Pending(BoxFuture<'static, QueryResult<Value>>),
}

/// Result of an asynchronous selector invocation
pub struct Deferred {
    state: State,
}

impl Deferred {
    /// A deferred value that has already completed
    pub fn completed(result: QueryResult<Value>) -> Self {
        Deferred {
            state: State::Completed(Some(result)),
        }
    }

    pub fn ready(value: Value) -> Self {
        Self::completed(Ok(value))
    }

    /// Wrap a future that has not been polled yet
    pub fn pending(future: BoxFuture<'static, QueryResult<Value>>) -> Self {
        Deferred {
            state: State::Pending(future),
        }
    }

    /// Whether the result is known without polling
    pub fn is_completed(&self) -> bool {
        matches!(self.state, State::Completed(_))
    }

    /// Take the result if it is available without suspending.
    ///
    /// A pending future is polled exactly once. If it is not ready the
    /// deferred value is handed back unchanged in `Err`.
    pub fn try_get_completed(self) -> Result<QueryResult<Value>, Deferred> {
        match self.state {
            State::Completed(Some(result)) => Ok(result),
            State::Completed(None) => Ok(Err(QueryError::ExecutionError(
                "deferred value was already consumed".to_string(),
            ))),
            State::Pending(mut future) => match (&mut future).now_or_never() {
                Some(result) => Ok(result),
                None => Err(Deferred {
                    state: State::Pending(future),
                }),
            },
        }
    }
}

impl Future for Deferred {
    type Output = QueryResult<Value>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match &mut this.state {
            State::Completed(slot) => Poll::Ready(slot.take().unwrap_or_else(|| {
                Err(QueryError::ExecutionError("deferred value polled after completion".to_string()))
            })),
            State::Pending(future) => {
                let result = futures::ready!(future.poll_unpin(cx));
                this.state = State::Completed(None);
                Poll::Ready(result)
            }
        }
    }
}

impl fmt::Debug for Deferred {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.state {
            State::Completed(Some(result)) => f.debug_tuple("Deferred::Completed").field(result).finish(),
            State::Completed(None) => write!(f, "Deferred::Consumed"),
            State::Pending(_) => write!(f, "Deferred::Pending"),
        }
    }
}
