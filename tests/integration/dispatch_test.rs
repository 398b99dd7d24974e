use std::sync::Arc;

use anyhow::Result;
use futures::executor::block_on;
use tokio_util::sync::CancellationToken;

use asyncquery::query::expr::Expr;
use asyncquery::{
    DispatchMode, ElementType, EngineConfig, ExecutionEngine, InMemoryProvider, Lambda, QueryError, Value,
};

// Declare the common module for test utilities using a path attribute
#[path = "../common/mod.rs"]
mod common;
use common::*;

fn identity_spread() -> Lambda {
    Lambda::build()
        .element("n", ElementType::Integer)
        .returns(ElementType::list_of(ElementType::Integer), Expr::list(vec![Expr::param("n")]))
}

#[test]
fn test_config_from_json() -> Result<()> {
    let config: EngineConfig = serde_json::from_str(r#"{"dispatch":"native","log_plans":true}"#)?;
    assert_eq!(config, EngineConfig::default().with_dispatch(DispatchMode::Native).with_plan_logging(true));

    let config: EngineConfig = serde_json::from_str("{}")?;
    assert_eq!(config, EngineConfig::default());
    assert_eq!(config.dispatch, DispatchMode::Auto);

    let rendered = serde_json::to_string(&EngineConfig::default().with_dispatch(DispatchMode::Synchronous))?;
    assert!(rendered.contains(r#""dispatch":"synchronous""#));
    Ok(())
}

#[test]
fn test_enumeration_is_lazy() -> Result<()> {
    let (provider, numbers) = int_source(&[1, 2, 3])?;
    let query = numbers.select_many(identity_spread())?;

    for (expected_runs, (_, engine)) in (1..).zip(engines()) {
        let mut sequence = query.enumerate_with(&engine, CancellationToken::new());
        assert!(!sequence.is_started());
        assert_eq!(provider.execution_count(), expected_runs - 1);

        assert_eq!(block_on(sequence.try_next())?, Some(Value::Integer(1)));
        assert!(sequence.is_started());
        assert_eq!(provider.execution_count(), expected_runs);
    }
    Ok(())
}

#[test]
fn test_re_enumeration_runs_the_provider_again() -> Result<()> {
    let (provider, numbers) = int_source(&[4, 5])?;
    let query = numbers.select_many(identity_spread())?;
    let engine = ExecutionEngine::default();

    let first = collect(&query, &engine)?;
    let second = collect(&query, &engine)?;
    assert_eq!(first, second);
    assert_eq!(first, vec![Value::Integer(4), Value::Integer(5)]);
    assert_eq!(provider.execution_count(), 2);
    Ok(())
}

#[test]
fn test_source_changes_between_enumerations_are_observed() -> Result<()> {
    let (provider, numbers) = int_source(&[1])?;
    let query = numbers.select_many(identity_spread())?;
    let engine = ExecutionEngine::default();

    assert_eq!(collect(&query, &engine)?, vec![Value::Integer(1)]);
    provider.register("numbers", ElementType::Integer, vec![Value::Integer(7), Value::Integer(8)])?;
    assert_eq!(collect(&query, &engine)?, vec![Value::Integer(7), Value::Integer(8)]);
    Ok(())
}

#[test]
fn test_synchronous_dispatch_rejects_suspending_selector() -> Result<()> {
    let (_, numbers) = int_source(&[1])?;
    let query = numbers.select_many_await(Lambda::build().element("n", ElementType::Integer).returns_deferred(
        ElementType::list_of(ElementType::Integer),
        Expr::call_async("never", vec![Expr::param("n")], |_| futures::future::pending()),
    ))?;

    let engine = ExecutionEngine::new(EngineConfig::default().with_dispatch(DispatchMode::Synchronous));
    let mut sequence = query.enumerate_with(&engine, CancellationToken::new());
    let err = block_on(sequence.try_next()).unwrap_err();
    assert!(matches!(err, QueryError::DeferredNotCompleted { .. }), "{:?}", err);
    assert_eq!(block_on(sequence.try_next()), Ok(None));
    Ok(())
}

#[test]
fn test_native_dispatch_needs_an_async_backend() -> Result<()> {
    init_logging();
    let provider = Arc::new(InMemoryProvider::synchronous_only());
    provider.register("numbers", ElementType::Integer, vec![Value::Integer(1)])?;
    let query = provider.source("numbers")?.select_many(identity_spread())?;

    let native = ExecutionEngine::new(EngineConfig::default().with_dispatch(DispatchMode::Native));
    // Failure surfaces at the first pull, not when enumerating
    let mut sequence = query.enumerate_with(&native, CancellationToken::new());
    let err = block_on(sequence.try_next()).unwrap_err();
    assert!(matches!(err, QueryError::ExecutionError(_)), "{:?}", err);
    assert_eq!(provider.execution_count(), 0);

    // Auto falls back to the operator path
    assert_eq!(collect(&query, &ExecutionEngine::default())?, vec![Value::Integer(1)]);
    assert_eq!(provider.execution_count(), 1);
    Ok(())
}

#[test]
fn test_to_vec_collects_through_the_given_engine() -> Result<()> {
    let provider = Arc::new(InMemoryProvider::synchronous_only());
    provider.register("numbers", ElementType::Integer, vec![Value::Integer(3), Value::Integer(4)])?;
    let query = provider.source("numbers")?.select_many(identity_spread())?;

    let native = ExecutionEngine::new(EngineConfig::default().with_dispatch(DispatchMode::Native));
    let err = block_on(query.to_vec_with(&native, CancellationToken::new())).unwrap_err();
    assert!(matches!(err, QueryError::ExecutionError(_)), "{:?}", err);

    let synchronous = ExecutionEngine::new(EngineConfig::default().with_dispatch(DispatchMode::Synchronous));
    let values = block_on(query.to_vec_with(&synchronous, CancellationToken::new()))?;
    assert_eq!(values, vec![Value::Integer(3), Value::Integer(4)]);
    assert_eq!(provider.execution_count(), 1);
    Ok(())
}

#[test]
fn test_plan_logging_does_not_change_results() -> Result<()> {
    let (_, numbers) = int_source(&[1, 2])?;
    let query = numbers.select_many(identity_spread())?;
    for dispatch in [DispatchMode::Synchronous, DispatchMode::Native] {
        let engine = ExecutionEngine::new(EngineConfig::default().with_dispatch(dispatch).with_plan_logging(true));
        assert_eq!(collect(&query, &engine)?, vec![Value::Integer(1), Value::Integer(2)]);
    }
    Ok(())
}

#[test]
fn test_unknown_source_is_reported() -> Result<()> {
    let provider = Arc::new(InMemoryProvider::new());
    assert!(matches!(provider.source("missing"), Err(QueryError::SourceNotFound(_))));
    Ok(())
}
