// Stream Builder
//
// This module builds asynchronous element streams from physical plans
// rewritten for the asynchronous target. Every selector invocation is
// awaited in source order and receives the execution's cancellation token.

use std::sync::Arc;

use futures::future;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use tokio_util::sync::CancellationToken;

use crate::common::types::Value;
use crate::query::executor::context::ExecutionContext;
use crate::query::executor::expression_eval::invoke_async;
use crate::query::executor::operators::filter::accepts;
use crate::query::executor::operators::flatten::into_sequence;
use crate::query::executor::result::{QueryError, QueryResult};
use crate::query::expr::Lambda;
use crate::query::planner::operator_builder::SourceResolver;
use crate::query::planner::physical::{PhysicalPlan, RewrittenPlan, Target};

/// Stream of query results produced by the asynchronous backend
pub type ValueStream = BoxStream<'static, QueryResult<Value>>;

/// Builds element streams from physical plans
pub struct StreamBuilder<'a> {
    resolver: &'a dyn SourceResolver,
    ctx: ExecutionContext,
}

impl<'a> StreamBuilder<'a> {
    pub fn new(resolver: &'a dyn SourceResolver, ctx: ExecutionContext) -> Self {
        StreamBuilder { resolver, ctx }
    }

    /// Build the stream for a plan rewritten for the asynchronous target
    pub fn build(&self, plan: &RewrittenPlan) -> QueryResult<ValueStream> {
        if plan.target() != Target::Asynchronous {
            return Err(QueryError::ExecutionError(format!(
                "cannot build a stream from a plan rewritten for the {} target",
                plan.target()
            )));
        }
        self.build_stream(plan.root())
    }

    fn build_stream(&self, plan: &PhysicalPlan) -> QueryResult<ValueStream> {
        let token = self.ctx.cancellation().clone();
        match plan {
            PhysicalPlan::Scan { source, .. } => {
                let elements = self.resolver.resolve(source)?;
                Ok(scan(elements, self.ctx.clone()))
            }
            PhysicalPlan::Project { input, selector } => {
                let selector = selector.clone();
                let input = self.build_stream(input)?;
                Ok(input
                    .enumerate()
                    .then(move |(index, element)| {
                        let selector = selector.clone();
                        let token = token.clone();
                        async move { invoke_async(selector, vec![element?], index, token).await }
                    })
                    .boxed())
            }
            PhysicalPlan::Filter { input, predicate } => {
                let predicate = predicate.clone();
                let input = self.build_stream(input)?;
                Ok(input
                    .enumerate()
                    .then(move |(index, element)| {
                        let predicate = predicate.clone();
                        let token = token.clone();
                        async move {
                            let element = element?;
                            let result = invoke_async(predicate.clone(), vec![element.clone()], index, token).await?;
                            Ok::<_, QueryError>(accepts(&predicate, result)?.then_some(element))
                        }
                    })
                    .filter_map(|result: QueryResult<Option<Value>>| future::ready(result.transpose()))
                    .boxed())
            }
            PhysicalPlan::Flatten {
                input,
                collection_selector,
                result_selector,
            } => {
                let collection_selector = collection_selector.clone();
                let result_selector = result_selector.clone();
                let input = self.build_stream(input)?;
                Ok(input
                    .enumerate()
                    .then(move |(index, element)| {
                        let collection_selector = collection_selector.clone();
                        let result_selector = result_selector.clone();
                        let token = token.clone();
                        async move {
                            let element = element?;
                            let collection =
                                invoke_async(collection_selector.clone(), vec![element.clone()], index, token.clone())
                                    .await?;
                            let items = into_sequence(&collection_selector, collection)?;
                            Ok::<_, QueryError>(pairs(element, items, result_selector, token))
                        }
                    })
                    .try_flatten()
                    .boxed())
            }
        }
    }
}

fn scan(elements: Arc<Vec<Value>>, ctx: ExecutionContext) -> ValueStream {
    let len = elements.len();
    stream::iter(0..len)
        .map(move |position| -> QueryResult<Value> {
            ctx.check_cancelled()?;
            Ok(elements[position].clone())
        })
        .boxed()
}

/// Apply the result selector to `element` paired with every item, in order
fn pairs(
    element: Value,
    items: Vec<Value>,
    result_selector: Lambda,
    token: CancellationToken,
) -> ValueStream {
    stream::iter(items)
        .then(move |item| invoke_async(result_selector.clone(), vec![element.clone(), item], 0, token.clone()))
        .boxed()
}
