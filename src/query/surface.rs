// Operator Surface
//
// Entry points for composing queries. The free functions take every operand
// as an `Option` and report missing operands in declaration order; the
// methods on `QuerySource` take present operands and forward to them.
//
// Each family comes in three flavours:
//   plain                    selectors return their value directly
//   await                    selectors return a deferred value
//   await_with_cancellation  selectors return a deferred value and take a token
// Index and token parameters are read from the lambda signatures.

use std::fmt;
use std::sync::Arc;

use futures::TryStreamExt;
use log::trace;
use tokio_util::sync::CancellationToken;

use crate::common::types::{ElementType, Value};
use crate::query::executor::engine::ExecutionEngine;
use crate::query::executor::result::QueryResult;
use crate::query::executor::sequence::ResultSequence;
use crate::query::expr::Lambda;
use crate::query::planner::logical::QueryNode;
use crate::query::planner::shape::{classify, Flavor, OperatorCall, OperatorKind};
use crate::query::planner::validator::{validate_arguments, Secondary};
use crate::query::provider::QueryProvider;

/// Composable query over a provider
#[derive(Clone)]
pub struct QuerySource {
    node: Arc<QueryNode>,
    provider: Arc<dyn QueryProvider>,
}

impl QuerySource {
    /// Query over the named source of `provider`
    pub fn new(provider: Arc<dyn QueryProvider>, name: &str, element_type: ElementType) -> Self {
        QuerySource {
            node: Arc::new(QueryNode::Source {
                name: name.to_string(),
                element_type,
            }),
            provider,
        }
    }

    pub fn node(&self) -> &Arc<QueryNode> {
        &self.node
    }

    pub fn provider(&self) -> &Arc<dyn QueryProvider> {
        &self.provider
    }

    /// Declared type of the elements this query produces
    pub fn element_type(&self) -> &ElementType {
        self.node.element_type()
    }

    /// Enumerate with the default engine
    pub fn enumerate(&self, token: CancellationToken) -> ResultSequence {
        self.enumerate_with(&ExecutionEngine::default(), token)
    }

    pub fn enumerate_with(&self, engine: &ExecutionEngine, token: CancellationToken) -> ResultSequence {
        engine.execute(self, token)
    }

    /// Enumerate with a signal that is never raised
    pub fn stream(&self) -> ResultSequence {
        self.enumerate(CancellationToken::new())
    }

    /// Collect every element
    pub async fn to_vec(&self, token: CancellationToken) -> QueryResult<Vec<Value>> {
        self.to_vec_with(&ExecutionEngine::default(), token).await
    }

    /// Collect every element through `engine`
    pub async fn to_vec_with(&self, engine: &ExecutionEngine, token: CancellationToken) -> QueryResult<Vec<Value>> {
        self.enumerate_with(engine, token).try_collect().await
    }

    pub fn select_many(&self, selector: Lambda) -> QueryResult<QuerySource> {
        select_many(Some(self), Some(&selector))
    }

    pub fn select_many_await(&self, selector: Lambda) -> QueryResult<QuerySource> {
        select_many_await(Some(self), Some(&selector))
    }

    pub fn select_many_await_with_cancellation(&self, selector: Lambda) -> QueryResult<QuerySource> {
        select_many_await_with_cancellation(Some(self), Some(&selector))
    }

    pub fn select_many_with_result(
        &self,
        collection_selector: Lambda,
        result_selector: Lambda,
    ) -> QueryResult<QuerySource> {
        select_many_with_result(Some(self), Some(&collection_selector), Some(&result_selector))
    }

    pub fn select_many_await_with_result(
        &self,
        collection_selector: Lambda,
        result_selector: Lambda,
    ) -> QueryResult<QuerySource> {
        select_many_await_with_result(Some(self), Some(&collection_selector), Some(&result_selector))
    }

    pub fn select_many_await_with_cancellation_with_result(
        &self,
        collection_selector: Lambda,
        result_selector: Lambda,
    ) -> QueryResult<QuerySource> {
        select_many_await_with_cancellation_with_result(
            Some(self),
            Some(&collection_selector),
            Some(&result_selector),
        )
    }

    pub fn select(&self, selector: Lambda) -> QueryResult<QuerySource> {
        select(Some(self), Some(&selector))
    }

    pub fn select_await(&self, selector: Lambda) -> QueryResult<QuerySource> {
        select_await(Some(self), Some(&selector))
    }

    pub fn select_await_with_cancellation(&self, selector: Lambda) -> QueryResult<QuerySource> {
        select_await_with_cancellation(Some(self), Some(&selector))
    }

    pub fn where_(&self, predicate: Lambda) -> QueryResult<QuerySource> {
        where_(Some(self), Some(&predicate))
    }

    pub fn where_await(&self, predicate: Lambda) -> QueryResult<QuerySource> {
        where_await(Some(self), Some(&predicate))
    }

    pub fn where_await_with_cancellation(&self, predicate: Lambda) -> QueryResult<QuerySource> {
        where_await_with_cancellation(Some(self), Some(&predicate))
    }
}

impl fmt::Debug for QuerySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuerySource")
            .field("provider", &self.provider.name())
            .field("plan", &self.node.to_string())
            .finish()
    }
}

// SelectMany, one selector

pub fn select_many(source: Option<&QuerySource>, selector: Option<&Lambda>) -> QueryResult<QuerySource> {
    compose(OperatorKind::SelectMany, Flavor::Plain, source, selector, Secondary::NotApplicable)
}

pub fn select_many_await(source: Option<&QuerySource>, selector: Option<&Lambda>) -> QueryResult<QuerySource> {
    compose(OperatorKind::SelectMany, Flavor::Await, source, selector, Secondary::NotApplicable)
}

pub fn select_many_await_with_cancellation(
    source: Option<&QuerySource>,
    selector: Option<&Lambda>,
) -> QueryResult<QuerySource> {
    compose(
        OperatorKind::SelectMany,
        Flavor::AwaitWithCancellation,
        source,
        selector,
        Secondary::NotApplicable,
    )
}

// SelectMany, collection selector and result selector

pub fn select_many_with_result(
    source: Option<&QuerySource>,
    collection_selector: Option<&Lambda>,
    result_selector: Option<&Lambda>,
) -> QueryResult<QuerySource> {
    compose(
        OperatorKind::SelectMany,
        Flavor::Plain,
        source,
        collection_selector,
        Secondary::Supplied(result_selector),
    )
}

pub fn select_many_await_with_result(
    source: Option<&QuerySource>,
    collection_selector: Option<&Lambda>,
    result_selector: Option<&Lambda>,
) -> QueryResult<QuerySource> {
    compose(
        OperatorKind::SelectMany,
        Flavor::Await,
        source,
        collection_selector,
        Secondary::Supplied(result_selector),
    )
}

pub fn select_many_await_with_cancellation_with_result(
    source: Option<&QuerySource>,
    collection_selector: Option<&Lambda>,
    result_selector: Option<&Lambda>,
) -> QueryResult<QuerySource> {
    compose(
        OperatorKind::SelectMany,
        Flavor::AwaitWithCancellation,
        source,
        collection_selector,
        Secondary::Supplied(result_selector),
    )
}

// Select

pub fn select(source: Option<&QuerySource>, selector: Option<&Lambda>) -> QueryResult<QuerySource> {
    compose(OperatorKind::Select, Flavor::Plain, source, selector, Secondary::NotApplicable)
}

pub fn select_await(source: Option<&QuerySource>, selector: Option<&Lambda>) -> QueryResult<QuerySource> {
    compose(OperatorKind::Select, Flavor::Await, source, selector, Secondary::NotApplicable)
}

pub fn select_await_with_cancellation(
    source: Option<&QuerySource>,
    selector: Option<&Lambda>,
) -> QueryResult<QuerySource> {
    compose(
        OperatorKind::Select,
        Flavor::AwaitWithCancellation,
        source,
        selector,
        Secondary::NotApplicable,
    )
}

// Where

pub fn where_(source: Option<&QuerySource>, predicate: Option<&Lambda>) -> QueryResult<QuerySource> {
    compose(OperatorKind::Where, Flavor::Plain, source, predicate, Secondary::NotApplicable)
}

pub fn where_await(source: Option<&QuerySource>, predicate: Option<&Lambda>) -> QueryResult<QuerySource> {
    compose(OperatorKind::Where, Flavor::Await, source, predicate, Secondary::NotApplicable)
}

pub fn where_await_with_cancellation(
    source: Option<&QuerySource>,
    predicate: Option<&Lambda>,
) -> QueryResult<QuerySource> {
    compose(
        OperatorKind::Where,
        Flavor::AwaitWithCancellation,
        source,
        predicate,
        Secondary::NotApplicable,
    )
}

/// Validate, classify and wrap one operator application
fn compose(
    operator: OperatorKind,
    flavor: Flavor,
    source: Option<&QuerySource>,
    primary: Option<&Lambda>,
    secondary: Secondary<'_>,
) -> QueryResult<QuerySource> {
    let call = validate_arguments(operator, source, primary, secondary)?;
    let source = call.source;
    let shape = classify(&OperatorCall {
        operator,
        flavor,
        source_type: source.element_type(),
        primary: call.primary,
        secondary: call.secondary,
    })?;

    let input = source.node.clone();
    let node = match operator {
        OperatorKind::Select => QueryNode::Select {
            input,
            selector: call.primary.clone(),
            shape,
            output_type: call.primary.returns().payload().clone(),
        },
        OperatorKind::Where => QueryNode::Where {
            input,
            predicate: call.primary.clone(),
            shape,
        },
        OperatorKind::SelectMany => {
            let output_type = match call.secondary {
                Some(result_selector) => result_selector.returns().payload().clone(),
                None => match call.primary.returns().payload() {
                    ElementType::List(item) => item.as_ref().clone(),
                    _ => ElementType::Any,
                },
            };
            QueryNode::SelectMany {
                input,
                collection_selector: call.primary.clone(),
                result_selector: call.secondary.cloned(),
                shape,
                output_type,
            }
        }
    };

    trace!("Composed {} [{}] over {}", operator.name(), shape, source.element_type());
    Ok(QuerySource {
        node: Arc::new(node),
        provider: source.provider.clone(),
    })
}
