// Logical Query Plan Implementation
//
// This module defines the composed, not yet executed query tree. Each
// operator application wraps the previous node, so trees share their inputs.

use std::fmt;
use std::sync::Arc;

use crate::common::types::ElementType;
use crate::query::expr::Lambda;
use crate::query::planner::shape::Shape;

/// Represents a node in the logical query plan
#[derive(Debug, Clone)]
pub enum QueryNode {
    /// A named sequence owned by the provider
    Source {
        name: String,
        element_type: ElementType,
    },
    /// Project every element
    Select {
        input: Arc<QueryNode>,
        selector: Lambda,
        shape: Shape,
        output_type: ElementType,
    },
    /// Keep elements satisfying a predicate
    Where {
        input: Arc<QueryNode>,
        predicate: Lambda,
        shape: Shape,
    },
    /// Project every element to a sequence and flatten the sequences
    SelectMany {
        input: Arc<QueryNode>,
        collection_selector: Lambda,
        result_selector: Option<Lambda>,
        shape: Shape,
        output_type: ElementType,
    },
}

impl QueryNode {
    /// Element type of the sequence this node produces
    pub fn element_type(&self) -> &ElementType {
        match self {
            QueryNode::Source { element_type, .. } => element_type,
            QueryNode::Select { output_type, .. } | QueryNode::SelectMany { output_type, .. } => output_type,
            QueryNode::Where { input, .. } => input.element_type(),
        }
    }

    pub fn input(&self) -> Option<&Arc<QueryNode>> {
        match self {
            QueryNode::Source { .. } => None,
            QueryNode::Select { input, .. } | QueryNode::Where { input, .. } | QueryNode::SelectMany { input, .. } => {
                Some(input)
            }
        }
    }

    /// Number of operator nodes above the source
    pub fn depth(&self) -> usize {
        self.input().map_or(0, |input| input.depth() + 1)
    }
}

impl fmt::Display for QueryNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryNode::Source { name, element_type } => write!(f, "Source: {} <{}>", name, element_type),
            QueryNode::Select { input, selector, shape, .. } => {
                write!(f, "Select [{}]: {}\n  {}", shape, selector, input)
            }
            QueryNode::Where { input, predicate, shape } => {
                write!(f, "Where [{}]: {}\n  {}", shape, predicate, input)
            }
            QueryNode::SelectMany {
                input,
                collection_selector,
                result_selector,
                shape,
                ..
            } => {
                write!(f, "SelectMany [{}]: {}", shape, collection_selector)?;
                if let Some(result_selector) = result_selector {
                    write!(f, " => {}", result_selector)?;
                }
                write!(f, "\n  {}", input)
            }
        }
    }
}
