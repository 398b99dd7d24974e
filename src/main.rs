use std::sync::Arc;

use anyhow::Result;
use futures::executor::block_on;
use tokio_util::sync::CancellationToken;

use asyncquery::query::expr::Expr;
use asyncquery::{DispatchMode, ElementType, EngineConfig, ExecutionEngine, InMemoryProvider, Lambda, Value};

fn main() -> Result<()> {
    // Register a small collection of prices
    let provider = Arc::new(InMemoryProvider::new());
    provider.register("prices", ElementType::Float, vec![Value::Float(1.0), Value::Float(2.0)])?;
    let prices = provider.source("prices")?;

    // p -> [p + 3, p - 1, p + 1], once as a plain selector and once as an
    // awaited selector observing the cancellation token
    let spread = |p: Expr| vec![p.clone().add(Expr::float(3.0)), p.clone().sub(Expr::float(1.0)), p.add(Expr::float(1.0))];
    let plain = prices.select_many(
        Lambda::build()
            .element("p", ElementType::Float)
            .returns(ElementType::list_of(ElementType::Float), Expr::list(spread(Expr::param("p")))),
    )?;
    let awaited = prices.select_many_await_with_cancellation(
        Lambda::build()
            .element("p", ElementType::Float)
            .cancellation("ct")
            .returns_deferred(
                ElementType::list_of(ElementType::Float),
                Expr::call_async_cancellable("spread", vec![Expr::param("p")], "ct", |args, token| async move {
                    if token.is_cancelled() {
                        return Err(asyncquery::QueryError::Cancelled);
                    }
                    let p = args[0].as_f64().unwrap_or_default();
                    Ok(Value::from(vec![p + 3.0, p - 1.0, p + 1.0]))
                }),
            ),
    )?;

    for mode in [DispatchMode::Synchronous, DispatchMode::Native] {
        let engine = ExecutionEngine::new(EngineConfig::default().with_dispatch(mode));
        for (name, query) in [("plain", &plain), ("await_with_cancellation", &awaited)] {
            let values: Vec<Value> = block_on(async {
                use futures::TryStreamExt;
                query.enumerate_with(&engine, CancellationToken::new()).try_collect().await
            })?;
            let rendered: Vec<String> = values.iter().map(|v| v.to_string()).collect();
            println!("{:?} {}: [{}]", mode, name, rendered.join(", "));
        }
    }

    println!("Provider executions: {}", provider.execution_count());
    Ok(())
}
