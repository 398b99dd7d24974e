// In-Memory Provider
//
// Reference provider over named, immutable element snapshots. Registering a
// source again replaces its snapshot; executions already running keep
// reading the snapshot they resolved.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use log::debug;
use parking_lot::RwLock;

use crate::common::types::{ElementType, Value};
use crate::query::executor::context::ExecutionContext;
use crate::query::executor::operators::OperatorRef;
use crate::query::executor::result::{QueryError, QueryResult};
use crate::query::planner::operator_builder::{OperatorBuilder, SourceResolver};
use crate::query::planner::physical::RewrittenPlan;
use crate::query::planner::stream_builder::{StreamBuilder, ValueStream};
use crate::query::provider::{AsyncQueryProvider, QueryProvider};
use crate::query::surface::QuerySource;

#[derive(Debug)]
struct Collection {
    element_type: ElementType,
    elements: Arc<Vec<Value>>,
}

/// Provider over collections held in memory
#[derive(Debug)]
pub struct InMemoryProvider {
    collections: RwLock<HashMap<String, Collection>>,
    native_async: bool,
    executions: AtomicUsize,
}

impl InMemoryProvider {
    /// Provider offering both the operator path and the native async backend
    pub fn new() -> Self {
        InMemoryProvider {
            collections: RwLock::new(HashMap::new()),
            native_async: true,
            executions: AtomicUsize::new(0),
        }
    }

    /// Provider offering only the synchronous operator path
    pub fn synchronous_only() -> Self {
        InMemoryProvider {
            native_async: false,
            ..Self::new()
        }
    }

    /// Register (or replace) a named collection. Every element must conform
    /// to `element_type`.
    pub fn register(&self, name: &str, element_type: ElementType, elements: Vec<Value>) -> QueryResult<()> {
        if let Some(bad) = elements.iter().find(|v| !element_type.admits(v)) {
            return Err(QueryError::type_mismatch(
                &format!("element of collection '{}'", name),
                &element_type,
                &bad.element_type(),
            ));
        }
        debug!("Registering collection {} <{}> with {} elements", name, element_type, elements.len());
        self.collections.write().insert(
            name.to_string(),
            Collection {
                element_type,
                elements: Arc::new(elements),
            },
        );
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.collections.read().contains_key(name)
    }

    /// Number of plans this provider has been asked to execute
    pub fn execution_count(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }

    /// Query source over a registered collection
    pub fn source(self: &Arc<Self>, name: &str) -> QueryResult<QuerySource> {
        let element_type = self
            .collections
            .read()
            .get(name)
            .map(|c| c.element_type.clone())
            .ok_or_else(|| QueryError::SourceNotFound(name.to_string()))?;
        Ok(QuerySource::new(self.clone(), name, element_type))
    }
}

impl Default for InMemoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceResolver for InMemoryProvider {
    fn resolve(&self, name: &str) -> QueryResult<Arc<Vec<Value>>> {
        self.collections
            .read()
            .get(name)
            .map(|c| c.elements.clone())
            .ok_or_else(|| QueryError::SourceNotFound(name.to_string()))
    }
}

impl QueryProvider for InMemoryProvider {
    fn name(&self) -> &str {
        "in-memory"
    }

    fn execute(&self, plan: &RewrittenPlan, ctx: &ExecutionContext) -> QueryResult<OperatorRef> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        debug!("Building operator tree over {}", plan.root().source_name());
        OperatorBuilder::new(self, ctx.clone()).build(plan)
    }

    fn async_backend(&self) -> Option<&dyn AsyncQueryProvider> {
        if self.native_async { Some(self) } else { None }
    }
}

impl AsyncQueryProvider for InMemoryProvider {
    fn execute_async(&self, plan: &RewrittenPlan, ctx: &ExecutionContext) -> QueryResult<ValueStream> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        debug!("Building element stream over {}", plan.root().source_name());
        StreamBuilder::new(self, ctx.clone()).build(plan)
    }
}
