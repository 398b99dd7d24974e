#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use futures::executor::block_on;
use futures::TryStreamExt;
use tokio_util::sync::CancellationToken;

use asyncquery::query::expr::Expr;
use asyncquery::query::planner::shape::{Arity, Asynchrony, Cancellation, Flavor, Indexing, Shape};
use asyncquery::query::surface;
use asyncquery::{
    DispatchMode, ElementType, EngineConfig, ExecutionEngine, InMemoryProvider, Lambda, QueryResult, QuerySource,
    Value,
};
use asyncquery::query::expr::LambdaBuilder;

// Route library logging to the test harness
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// Register `values` as a float collection and return the provider and a source over it
pub fn float_source(values: &[f64]) -> Result<(Arc<InMemoryProvider>, QuerySource)> {
    init_logging();
    let provider = Arc::new(InMemoryProvider::new());
    provider.register("prices", ElementType::Float, floats(values))?;
    let source = provider.source("prices")?;
    Ok((provider, source))
}

// Register `values` as an integer collection
pub fn int_source(values: &[i64]) -> Result<(Arc<InMemoryProvider>, QuerySource)> {
    init_logging();
    let provider = Arc::new(InMemoryProvider::new());
    provider.register("numbers", ElementType::Integer, values.iter().map(|&i| Value::Integer(i)).collect())?;
    let source = provider.source("numbers")?;
    Ok((provider, source))
}

pub fn floats(values: &[f64]) -> Vec<Value> {
    values.iter().map(|&f| Value::Float(f)).collect()
}

// One engine per dispatch target
pub fn engines() -> Vec<(&'static str, ExecutionEngine)> {
    vec![
        (
            "synchronous",
            ExecutionEngine::new(EngineConfig::default().with_dispatch(DispatchMode::Synchronous)),
        ),
        (
            "native",
            ExecutionEngine::new(EngineConfig::default().with_dispatch(DispatchMode::Native)),
        ),
    ]
}

// Drain a query on the given engine
pub fn collect(query: &QuerySource, engine: &ExecutionEngine) -> QueryResult<Vec<Value>> {
    block_on(query.enumerate_with(engine, CancellationToken::new()).try_collect())
}

// Every single-selector shape
pub fn single_shapes() -> impl Iterator<Item = Shape> {
    Shape::ALL.into_iter().filter(|s| s.arity == Arity::Single)
}

// Every two-level shape
pub fn two_level_shapes() -> impl Iterator<Item = Shape> {
    Shape::ALL.into_iter().filter(|s| s.arity == Arity::WithResultSelector)
}

// Declare the parameters of `shape` and return the builder with the matching call arguments
fn shaped_signature(shape: Shape, elements: &[(&str, ElementType)], index: bool) -> (LambdaBuilder, Vec<Expr>) {
    let mut builder = Lambda::build();
    let mut args: Vec<Expr> = Vec::new();
    for (name, element_type) in elements {
        builder = builder.element(name, element_type.clone());
        args.push(Expr::param(name));
    }
    if index {
        builder = builder.index("i");
        args.push(Expr::param("i"));
    }
    if shape.cancellation == Cancellation::Token {
        builder = builder.cancellation("ct");
    }
    (builder, args)
}

// Wrap `body` (an immediate computation over the argument list) into a
// lambda of the requested shape. Deferred variants complete without suspending.
pub fn shaped_lambda<F>(
    shape: Shape,
    elements: &[(&str, ElementType)],
    index: bool,
    returns: ElementType,
    body: F,
) -> Lambda
where
    F: Fn(&[Value]) -> QueryResult<Value> + Send + Sync + 'static,
{
    let (builder, args) = shaped_signature(shape, elements, index);
    let token = shape.cancellation == Cancellation::Token;

    match (shape.asynchrony, token) {
        (Asynchrony::Immediate, false) => builder.returns(returns, Expr::call("body", args, body)),
        (Asynchrony::Immediate, true) => {
            builder.returns(returns, Expr::call_cancellable("body", args, "ct", move |a, _| body(a)))
        }
        (Asynchrony::Deferred, false) => builder.returns_deferred(
            returns,
            Expr::call_async("body", args, move |a| {
                let result = body(&a);
                async move { result }
            }),
        ),
        (Asynchrony::Deferred, true) => builder.returns_deferred(
            returns,
            Expr::call_async_cancellable("body", args, "ct", move |a, _| {
                let result = body(&a);
                async move { result }
            }),
        ),
    }
}

// Counts selector invocations and how many of them started while another was still running
#[derive(Debug, Default)]
pub struct InFlight {
    busy: AtomicBool,
    calls: AtomicUsize,
    overlaps: AtomicUsize,
}

impl InFlight {
    // Suspend for a delay that differs from one call to the next, then run `work`
    pub async fn run<T>(&self, work: impl FnOnce() -> T) -> T {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.busy.swap(true, Ordering::SeqCst) {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        match call % 3 {
            0 => tokio::task::yield_now().await,
            n => tokio::time::sleep(Duration::from_millis(3 - n as u64)).await,
        }
        let result = work();
        self.busy.store(false, Ordering::SeqCst);
        result
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn overlaps(&self) -> usize {
        self.overlaps.load(Ordering::SeqCst)
    }
}

// Deferred lambda of the requested shape whose body suspends inside `in_flight`
// before producing `body(args)`. Needs a tokio runtime with timers.
pub fn suspending_lambda<F>(
    shape: Shape,
    elements: &[(&str, ElementType)],
    index: bool,
    returns: ElementType,
    body: F,
    in_flight: Arc<InFlight>,
) -> Lambda
where
    F: Fn(&[Value]) -> QueryResult<Value> + Send + Sync + 'static,
{
    assert_eq!(shape.asynchrony, Asynchrony::Deferred, "shape {} is not deferred", shape);
    let (builder, args) = shaped_signature(shape, elements, index);
    let body = Arc::new(body);
    let suspend = move |a: Vec<Value>| {
        let body = body.clone();
        let in_flight = in_flight.clone();
        async move { in_flight.run(|| body(&a)).await }
    };

    if shape.cancellation == Cancellation::Token {
        builder.returns_deferred(returns, Expr::call_async_cancellable("body", args, "ct", move |a, _| suspend(a)))
    } else {
        builder.returns_deferred(returns, Expr::call_async("body", args, suspend))
    }
}

// p -> [p + 3, p - 1, p + 1]
pub fn spread(args: &[Value]) -> QueryResult<Value> {
    let p = args[0].as_f64().unwrap_or_default();
    Ok(Value::from(vec![p + 3.0, p - 1.0, p + 1.0]))
}

// Apply SelectMany through the surface entry point matching `shape`
pub fn apply_select_many(
    source: &QuerySource,
    shape: Shape,
    collection_selector: &Lambda,
    result_selector: Option<&Lambda>,
) -> QueryResult<QuerySource> {
    let source = Some(source);
    let selector = Some(collection_selector);
    match (shape.arity, shape.flavor()) {
        (Arity::Single, Flavor::Plain) => surface::select_many(source, selector),
        (Arity::Single, Flavor::Await) => surface::select_many_await(source, selector),
        (Arity::Single, Flavor::AwaitWithCancellation) => surface::select_many_await_with_cancellation(source, selector),
        (Arity::WithResultSelector, Flavor::Plain) => surface::select_many_with_result(source, selector, result_selector),
        (Arity::WithResultSelector, Flavor::Await) => {
            surface::select_many_await_with_result(source, selector, result_selector)
        }
        (Arity::WithResultSelector, Flavor::AwaitWithCancellation) => {
            surface::select_many_await_with_cancellation_with_result(source, selector, result_selector)
        }
    }
}

pub fn is_indexed(shape: Shape) -> bool {
    shape.indexing == Indexing::ElementAndIndex
}
