// Result Sequence
//
// Asynchronous, lazily started sequence of query results. Nothing runs until
// the first pull. A pull observes the execution's cancellation signal both
// before it starts and while it is pending. Any error ends the sequence.

use std::fmt;
use std::mem;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::stream::{FusedStream, Stream, StreamExt};
use futures::Future;
use log::{debug, warn};
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};

use crate::common::types::Value;
use crate::query::executor::operators::{close_input, next_input, OperatorRef};
use crate::query::executor::result::{QueryError, QueryResult};
use crate::query::planner::stream_builder::ValueStream;

/// Source of elements of a started sequence
pub enum Producer {
    /// Initialised operator tree of the synchronous provider path
    Operator(OperatorRef),
    /// Stream of the native asynchronous backend
    Stream(ValueStream),
}

/// Deferred start of an execution, run on the first pull
pub type Start = Box<dyn FnOnce() -> QueryResult<Producer> + Send>;

enum State {
    NotStarted(Start),
    Running(Producer),
    Finished,
}

/// Lazily consumed sequence of query results
pub struct ResultSequence {
    state: State,
    token: CancellationToken,
    cancelled: Pin<Box<WaitForCancellationFutureOwned>>,
}

impl ResultSequence {
    /// Sequence that runs `start` on its first pull and then yields from the
    /// producer it returns
    pub fn new(token: CancellationToken, start: Start) -> Self {
        ResultSequence {
            state: State::NotStarted(start),
            cancelled: Box::pin(token.clone().cancelled_owned()),
            token,
        }
    }

    /// Sequence whose first pull fails with `error`
    pub fn failed(token: CancellationToken, error: QueryError) -> Self {
        Self::new(token, Box::new(move || -> QueryResult<Producer> { Err(error) }))
    }

    pub fn is_started(&self) -> bool {
        !matches!(self.state, State::NotStarted(_))
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, State::Finished)
    }

    /// Pull the next element
    pub async fn try_next(&mut self) -> QueryResult<Option<Value>> {
        self.next().await.transpose()
    }

    fn start(&mut self) -> QueryResult<()> {
        if let State::NotStarted(_) = self.state {
            let State::NotStarted(start) = mem::replace(&mut self.state, State::Finished) else {
                return Ok(());
            };
            self.state = State::Running(start()?);
        }
        Ok(())
    }

    /// End the sequence with `error`
    fn fail(&mut self, error: QueryError) -> Poll<Option<QueryResult<Value>>> {
        if error.is_cancelled() {
            debug!("Result sequence cancelled");
        }
        self.finish();
        Poll::Ready(Some(Err(error)))
    }

    fn finish(&mut self) {
        if let State::Running(Producer::Operator(root)) = mem::replace(&mut self.state, State::Finished) {
            if let Err(e) = close_input(&root) {
                warn!("Failed to close operator tree: {}", e);
            }
        }
    }
}

impl Stream for ResultSequence {
    type Item = QueryResult<Value>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.is_finished() {
            return Poll::Ready(None);
        }
        if this.token.is_cancelled() {
            return this.fail(QueryError::Cancelled);
        }
        if let Err(e) = this.start() {
            return this.fail(e);
        }

        let polled = match &mut this.state {
            State::Running(Producer::Operator(root)) => Poll::Ready(next_input(root).transpose()),
            State::Running(Producer::Stream(stream)) => stream.poll_next_unpin(cx),
            _ => Poll::Ready(None),
        };

        match polled {
            Poll::Ready(Some(Ok(value))) => Poll::Ready(Some(Ok(value))),
            Poll::Ready(Some(Err(e))) => this.fail(e),
            Poll::Ready(None) => {
                this.finish();
                Poll::Ready(None)
            }
            Poll::Pending => {
                if this.cancelled.as_mut().poll(cx).is_ready() {
                    return this.fail(QueryError::Cancelled);
                }
                Poll::Pending
            }
        }
    }
}

impl FusedStream for ResultSequence {
    fn is_terminated(&self) -> bool {
        self.is_finished()
    }
}

impl Drop for ResultSequence {
    fn drop(&mut self) {
        self.finish();
    }
}

impl fmt::Debug for ResultSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &self.state {
            State::NotStarted(_) => "not started",
            State::Running(Producer::Operator(_)) => "running (operator)",
            State::Running(Producer::Stream(_)) => "running (stream)",
            State::Finished => "finished",
        };
        f.debug_struct("ResultSequence")
            .field("state", &state)
            .field("cancelled", &self.token.is_cancelled())
            .finish()
    }
}
