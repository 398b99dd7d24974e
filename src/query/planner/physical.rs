// Physical Query Plan Implementation
//
// This module defines the rewritten plan handed to a provider. Every lambda
// in a physical plan is in the canonical form of the plan's dispatch target.

use std::fmt;

use crate::common::types::ElementType;
use crate::query::executor::result::{QueryError, QueryResult};
use crate::query::expr::{Expr, Lambda, ParamKind, TokenRef};

/// Backend a plan is rewritten for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    /// The provider's synchronous operator tree
    Synchronous,
    /// The provider's native asynchronous backend
    Asynchronous,
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Synchronous => write!(f, "synchronous"),
            Target::Asynchronous => write!(f, "asynchronous"),
        }
    }
}

/// Represents a node in the physical query plan
#[derive(Debug, Clone)]
pub enum PhysicalPlan {
    /// Sequential scan of a named source
    Scan {
        source: String,
        element_type: ElementType,
    },
    /// Projection operator
    Project {
        input: Box<PhysicalPlan>,
        /// Canonical `(element, index)` selector
        selector: Lambda,
    },
    /// Filter operator
    Filter {
        input: Box<PhysicalPlan>,
        /// Canonical `(element, index)` predicate
        predicate: Lambda,
    },
    /// Flatten-then-project operator
    Flatten {
        input: Box<PhysicalPlan>,
        /// Canonical `(element, index)` selector producing a sequence
        collection_selector: Lambda,
        /// Canonical `(element, item)` selector applied to every pair
        result_selector: Lambda,
    },
}

impl PhysicalPlan {
    /// Name of the source this plan reads from
    pub fn source_name(&self) -> &str {
        match self {
            PhysicalPlan::Scan { source, .. } => source,
            PhysicalPlan::Project { input, .. }
            | PhysicalPlan::Filter { input, .. }
            | PhysicalPlan::Flatten { input, .. } => input.source_name(),
        }
    }

    fn fmt_with_indent(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        let pad = "  ".repeat(indent);
        match self {
            PhysicalPlan::Scan { source, element_type } => {
                return writeln!(f, "{}Scan: {} <{}>", pad, source, element_type);
            }
            PhysicalPlan::Project { selector, .. } => writeln!(f, "{}Project: {}", pad, selector)?,
            PhysicalPlan::Filter { predicate, .. } => writeln!(f, "{}Filter: {}", pad, predicate)?,
            PhysicalPlan::Flatten {
                collection_selector,
                result_selector,
                ..
            } => writeln!(f, "{}Flatten: {} => {}", pad, collection_selector, result_selector)?,
        }
        match self {
            PhysicalPlan::Project { input, .. }
            | PhysicalPlan::Filter { input, .. }
            | PhysicalPlan::Flatten { input, .. } => input.fmt_with_indent(f, indent + 1),
            PhysicalPlan::Scan { .. } => Ok(()),
        }
    }
}

impl fmt::Display for PhysicalPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_with_indent(f, 0)
    }
}

/// A physical plan together with the target it was rewritten for
#[derive(Debug, Clone)]
pub struct RewrittenPlan {
    target: Target,
    root: PhysicalPlan,
}

impl RewrittenPlan {
    pub fn new(target: Target, root: PhysicalPlan) -> Self {
        RewrittenPlan { target, root }
    }

    pub fn target(&self) -> Target {
        self.target
    }

    pub fn root(&self) -> &PhysicalPlan {
        &self.root
    }

    /// Check that every lambda is in the canonical form of the target.
    ///
    /// Selectors take their elements followed by an index; result selectors
    /// take exactly their elements. Asynchronous lambdas additionally take a
    /// trailing cancellation token and return a deferred value. Synchronous
    /// lambdas return immediately and reference no declared token.
    pub fn verify(&self) -> QueryResult<()> {
        let mut node = &self.root;
        loop {
            match node {
                PhysicalPlan::Scan { .. } => return Ok(()),
                PhysicalPlan::Project { input, selector } => {
                    self.verify_lambda(selector, 1, true)?;
                    node = input;
                }
                PhysicalPlan::Filter { input, predicate } => {
                    self.verify_lambda(predicate, 1, true)?;
                    node = input;
                }
                PhysicalPlan::Flatten {
                    input,
                    collection_selector,
                    result_selector,
                } => {
                    self.verify_lambda(collection_selector, 1, true)?;
                    self.verify_lambda(result_selector, 2, false)?;
                    node = input;
                }
            }
        }
    }

    fn verify_lambda(&self, lambda: &Lambda, elements: usize, indexed: bool) -> QueryResult<()> {
        let mut expected = vec![Kind::Element; elements];
        if indexed {
            expected.push(Kind::Index);
        }
        if self.target == Target::Asynchronous {
            expected.push(Kind::Token);
        }
        let actual: Vec<Kind> = lambda
            .params()
            .iter()
            .map(|p| match p.kind {
                ParamKind::Element(_) => Kind::Element,
                ParamKind::Index => Kind::Index,
                ParamKind::Cancellation => Kind::Token,
            })
            .collect();

        let deferred = self.target == Target::Asynchronous;
        let mut declared_token_reference = false;
        lambda.body().walk(&mut |expr| {
            if let Expr::Call {
                token: Some(TokenRef::Param(_)),
                ..
            } = expr
            {
                declared_token_reference = true;
            }
        });

        let canonical = actual == expected
            && lambda.returns().is_deferred() == deferred
            && lambda.body().produces_deferred() == deferred
            && (deferred || !declared_token_reference);
        if canonical {
            Ok(())
        } else {
            Err(QueryError::ExecutionError(format!(
                "lambda {} is not in canonical {} form",
                lambda, self.target
            )))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Element,
    Index,
    Token,
}
