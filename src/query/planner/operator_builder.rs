// Operator Builder
//
// This module builds executable operator trees from rewritten physical plans
// for the synchronous provider path.

use std::sync::Arc;

use crate::common::types::Value;
use crate::query::executor::context::ExecutionContext;
use crate::query::executor::operators::filter::FilterOperator;
use crate::query::executor::operators::flatten::FlattenOperator;
use crate::query::executor::operators::project::ProjectionOperator;
use crate::query::executor::operators::scan::ScanOperator;
use crate::query::executor::operators::{into_ref, OperatorRef};
use crate::query::executor::result::{QueryError, QueryResult};
use crate::query::planner::physical::{PhysicalPlan, RewrittenPlan, Target};

/// Looks up the element snapshot behind a source name
pub trait SourceResolver {
    fn resolve(&self, name: &str) -> QueryResult<Arc<Vec<Value>>>;
}

/// Builds executable operator trees from physical plans
pub struct OperatorBuilder<'a> {
    resolver: &'a dyn SourceResolver,
    ctx: ExecutionContext,
}

impl<'a> OperatorBuilder<'a> {
    pub fn new(resolver: &'a dyn SourceResolver, ctx: ExecutionContext) -> Self {
        OperatorBuilder { resolver, ctx }
    }

    /// Build the operator tree for a plan rewritten for the synchronous target
    pub fn build(&self, plan: &RewrittenPlan) -> QueryResult<OperatorRef> {
        if plan.target() != Target::Synchronous {
            return Err(QueryError::ExecutionError(format!(
                "cannot build an operator tree from a plan rewritten for the {} target",
                plan.target()
            )));
        }
        self.build_operator_tree(plan.root())
    }

    /// Build an operator tree from a physical plan
    pub fn build_operator_tree(&self, plan: &PhysicalPlan) -> QueryResult<OperatorRef> {
        match plan {
            PhysicalPlan::Scan { source, .. } => {
                let elements = self.resolver.resolve(source)?;
                Ok(into_ref(ScanOperator::new(source.clone(), elements, self.ctx.clone())))
            }
            PhysicalPlan::Project { input, selector } => {
                let input = self.build_operator_tree(input)?;
                Ok(into_ref(ProjectionOperator::new(input, selector.clone(), self.ctx.clone())))
            }
            PhysicalPlan::Filter { input, predicate } => {
                let input = self.build_operator_tree(input)?;
                Ok(into_ref(FilterOperator::new(input, predicate.clone(), self.ctx.clone())))
            }
            PhysicalPlan::Flatten {
                input,
                collection_selector,
                result_selector,
            } => {
                let input = self.build_operator_tree(input)?;
                Ok(into_ref(FlattenOperator::new(
                    input,
                    collection_selector.clone(),
                    result_selector.clone(),
                    self.ctx.clone(),
                )))
            }
        }
    }
}
