// Expression Rewriter
//
// This module converts a composed query tree into a physical plan whose
// lambdas are normalised for one dispatch target. Each shape axis selects at
// most one rewrite step per target and the selected steps are folded over
// the lambda in axis order.

use std::sync::Arc;

use log::debug;
use once_cell::sync::Lazy;

use crate::common::types::ElementType;
use crate::query::executor::result::QueryResult;
use crate::query::expr::{Expr, Lambda, Param, ParamKind, TokenRef, TypeRef};
use crate::query::planner::logical::QueryNode;
use crate::query::planner::physical::{PhysicalPlan, RewrittenPlan, Target};
use crate::query::planner::shape::{Arity, Asynchrony, Cancellation, Indexing, Shape};

/// Name of a synthesised, ignored index parameter
pub const SYNTHETIC_INDEX: &str = "$index";
/// Name of a synthesised parameter bound to the ambient cancellation signal
pub const SYNTHETIC_TOKEN: &str = "$token";

/// Result selector composed with single-arity flattening: `(element, item) -> item`
static IDENTITY_RESULT_SELECTOR: Lazy<Lambda> = Lazy::new(|| {
    Lambda::build()
        .element("$source", ElementType::Any)
        .element("$item", ElementType::Any)
        .returns(ElementType::Any, Expr::param("$item"))
});

/// Shape of the identity result selector
const IDENTITY_SHAPE: Shape = Shape {
    arity: Arity::WithResultSelector,
    indexing: Indexing::Element,
    asynchrony: Asynchrony::Immediate,
    cancellation: Cancellation::None,
};

type RewriteStep = fn(Lambda) -> Lambda;

// Step tables, indexed by [target][axis value]
const INDEXING_STEPS: [[Option<RewriteStep>; 2]; 2] = [
    [Some(synthesize_index), None],
    [Some(synthesize_index), None],
];
const ASYNCHRONY_STEPS: [[Option<RewriteStep>; 2]; 2] = [
    [None, Some(run_to_completion)],
    [Some(lift_completed), None],
];
const CANCELLATION_STEPS: [[Option<RewriteStep>; 2]; 2] = [
    [None, Some(bind_ambient_token)],
    [Some(synthesize_token), None],
];

/// Role of a lambda within its operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    /// Selector, predicate or collection selector; receives an index
    Primary,
    /// Result selector; never receives an index
    Result,
}

/// Rewrites query trees for one dispatch target
#[derive(Debug, Clone, Copy)]
pub struct Rewriter {
    target: Target,
}

impl Rewriter {
    pub fn new(target: Target) -> Self {
        Rewriter { target }
    }

    pub fn target(&self) -> Target {
        self.target
    }

    /// Rewrite `node` into a verified physical plan
    pub fn rewrite(&self, node: &QueryNode) -> QueryResult<RewrittenPlan> {
        let plan = RewrittenPlan::new(self.target, self.rewrite_node(node));
        plan.verify()?;
        debug!("Rewritten plan for {} target:\n{}", self.target, plan.root());
        Ok(plan)
    }

    fn rewrite_node(&self, node: &QueryNode) -> PhysicalPlan {
        match node {
            QueryNode::Source { name, element_type } => PhysicalPlan::Scan {
                source: name.clone(),
                element_type: element_type.clone(),
            },
            QueryNode::Select {
                input, selector, shape, ..
            } => PhysicalPlan::Project {
                input: Box::new(self.rewrite_node(input)),
                selector: self.rewrite_lambda(selector, shape, Role::Primary),
            },
            QueryNode::Where { input, predicate, shape } => PhysicalPlan::Filter {
                input: Box::new(self.rewrite_node(input)),
                predicate: self.rewrite_lambda(predicate, shape, Role::Primary),
            },
            QueryNode::SelectMany {
                input,
                collection_selector,
                result_selector,
                shape,
                ..
            } => {
                let result_selector = match result_selector {
                    Some(result_selector) => self.rewrite_lambda(result_selector, shape, Role::Result),
                    None => self.rewrite_lambda(&IDENTITY_RESULT_SELECTOR, &IDENTITY_SHAPE, Role::Result),
                };
                PhysicalPlan::Flatten {
                    input: Box::new(self.rewrite_node(input)),
                    collection_selector: self.rewrite_lambda(collection_selector, shape, Role::Primary),
                    result_selector,
                }
            }
        }
    }

    fn rewrite_lambda(&self, lambda: &Lambda, shape: &Shape, role: Role) -> Lambda {
        let target = self.target as usize;
        let indexing = match role {
            Role::Primary => INDEXING_STEPS[target][shape.indexing as usize],
            Role::Result => None,
        };
        [
            indexing,
            ASYNCHRONY_STEPS[target][shape.asynchrony as usize],
            CANCELLATION_STEPS[target][shape.cancellation as usize],
        ]
        .into_iter()
        .flatten()
        .fold(lambda.clone(), |lambda, step| step(lambda))
    }
}

/// Insert an ignored index parameter after the element parameters
fn synthesize_index(lambda: Lambda) -> Lambda {
    let mut params = lambda.params().to_vec();
    let position = params
        .iter()
        .rposition(|p| matches!(p.kind, ParamKind::Element(_)))
        .map_or(0, |i| i + 1);
    params.insert(position, Param::index(SYNTHETIC_INDEX));
    Lambda::from_parts(params, lambda.returns().clone(), lambda.shared_body().clone())
}

/// Force a deferred body without suspending
fn run_to_completion(lambda: Lambda) -> Lambda {
    let returns = TypeRef::Immediate(lambda.returns().payload().clone());
    let body = Expr::RunToCompletion(Box::new(lambda.body().clone()));
    Lambda::from_parts(lambda.params().to_vec(), returns, Arc::new(body))
}

/// Wrap an immediate body into an already completed deferred value
fn lift_completed(lambda: Lambda) -> Lambda {
    let returns = TypeRef::Deferred(lambda.returns().payload().clone());
    let body = Expr::Completed(Box::new(lambda.body().clone()));
    Lambda::from_parts(lambda.params().to_vec(), returns, Arc::new(body))
}

/// Drop the declared token parameter and route its uses to the ambient signal
fn bind_ambient_token(lambda: Lambda) -> Lambda {
    let Some(declared) = lambda.cancellation_param().cloned() else {
        return lambda;
    };
    let params = lambda
        .params()
        .iter()
        .filter(|p| p.kind != ParamKind::Cancellation)
        .cloned()
        .collect();
    let body = lambda.body().map_tokens(&|token: &TokenRef| match token {
        TokenRef::Param(name) if *name == declared => TokenRef::Ambient,
        other => other.clone(),
    });
    Lambda::from_parts(params, lambda.returns().clone(), Arc::new(body))
}

/// Append a token parameter bound to the ambient signal
fn synthesize_token(lambda: Lambda) -> Lambda {
    let mut params = lambda.params().to_vec();
    params.push(Param::cancellation(SYNTHETIC_TOKEN));
    Lambda::from_parts(params, lambda.returns().clone(), lambda.shared_body().clone())
}
