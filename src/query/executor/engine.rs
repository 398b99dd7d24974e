// Query Execution Engine Implementation
//
// This module dispatches composed queries to a provider. It picks the
// dispatch target, rewrites the query for it and hands back a lazily started
// result sequence.

use std::sync::Arc;

use log::{debug, info};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::query::executor::context::ExecutionContext;
use crate::query::executor::operators::init_input;
use crate::query::executor::result::{QueryError, QueryResult};
use crate::query::executor::sequence::{Producer, ResultSequence};
use crate::query::planner::logical::QueryNode;
use crate::query::planner::physical::Target;
use crate::query::planner::rewriter::Rewriter;
use crate::query::provider::QueryProvider;
use crate::query::surface::QuerySource;

/// How the engine chooses between provider backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// Use the native async backend when the provider offers one
    #[default]
    Auto,
    /// Always use the synchronous operator path
    Synchronous,
    /// Require the native async backend
    Native,
}

/// Configuration for the execution engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Backend selection policy
    pub dispatch: DispatchMode,
    /// Log every rewritten plan at info level
    pub log_plans: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dispatch: DispatchMode::Auto,
            log_plans: false,
        }
    }
}

impl EngineConfig {
    /// Set the dispatch mode
    pub fn with_dispatch(mut self, dispatch: DispatchMode) -> Self {
        self.dispatch = dispatch;
        self
    }

    /// Enable or disable plan logging
    pub fn with_plan_logging(mut self, enabled: bool) -> Self {
        self.log_plans = enabled;
        self
    }
}

/// Dispatches queries to their provider
#[derive(Debug, Clone, Default)]
pub struct ExecutionEngine {
    config: EngineConfig,
}

impl ExecutionEngine {
    pub fn new(config: EngineConfig) -> Self {
        ExecutionEngine { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Dispatch target for `provider` under the configured mode
    pub fn target_for(&self, provider: &dyn QueryProvider) -> QueryResult<Target> {
        let native = provider.async_backend().is_some();
        match (self.config.dispatch, native) {
            (DispatchMode::Synchronous, _) | (DispatchMode::Auto, false) => Ok(Target::Synchronous),
            (DispatchMode::Auto, true) | (DispatchMode::Native, true) => Ok(Target::Asynchronous),
            (DispatchMode::Native, false) => Err(QueryError::ExecutionError(format!(
                "provider '{}' has no native asynchronous backend",
                provider.name()
            ))),
        }
    }

    /// Execute `source`. Nothing is rewritten or run until the first pull.
    pub fn execute(&self, source: &QuerySource, token: CancellationToken) -> ResultSequence {
        self.execute_node(source.node().clone(), source.provider().clone(), token)
    }

    pub fn execute_node(
        &self,
        node: Arc<QueryNode>,
        provider: Arc<dyn QueryProvider>,
        token: CancellationToken,
    ) -> ResultSequence {
        let engine = self.clone();
        let ctx = ExecutionContext::new(token.clone());
        ResultSequence::new(
            token,
            Box::new(move || -> QueryResult<Producer> {
                let target = engine.target_for(provider.as_ref())?;
                debug!("Dispatching query to provider '{}' on the {} target", provider.name(), target);

                let plan = Rewriter::new(target).rewrite(&node)?;
                if engine.config.log_plans {
                    info!("Executing plan:\n{}", plan.root());
                }

                match target {
                    Target::Synchronous => {
                        let root = provider.execute(&plan, &ctx)?;
                        init_input(&root)?;
                        Ok(Producer::Operator(root))
                    }
                    Target::Asynchronous => {
                        let backend = provider.async_backend().ok_or_else(|| {
                            QueryError::ExecutionError(format!(
                                "provider '{}' has no native asynchronous backend",
                                provider.name()
                            ))
                        })?;
                        Ok(Producer::Stream(backend.execute_async(&plan, &ctx)?))
                    }
                }
            }),
        )
    }
}
