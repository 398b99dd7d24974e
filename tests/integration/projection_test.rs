use anyhow::Result;

use asyncquery::query::expr::Expr;
use asyncquery::query::planner::shape::{Flavor, Shape};
use asyncquery::query::surface;
use asyncquery::{ElementType, Lambda, QueryError, QueryResult, QuerySource, Value};

// Declare the common module for test utilities using a path attribute
#[path = "../common/mod.rs"]
mod common;
use common::*;

fn apply_select(source: &QuerySource, shape: Shape, selector: &Lambda) -> QueryResult<QuerySource> {
    match shape.flavor() {
        Flavor::Plain => surface::select(Some(source), Some(selector)),
        Flavor::Await => surface::select_await(Some(source), Some(selector)),
        Flavor::AwaitWithCancellation => surface::select_await_with_cancellation(Some(source), Some(selector)),
    }
}

fn apply_where(source: &QuerySource, shape: Shape, predicate: &Lambda) -> QueryResult<QuerySource> {
    match shape.flavor() {
        Flavor::Plain => surface::where_(Some(source), Some(predicate)),
        Flavor::Await => surface::where_await(Some(source), Some(predicate)),
        Flavor::AwaitWithCancellation => surface::where_await_with_cancellation(Some(source), Some(predicate)),
    }
}

#[test]
fn test_select_on_every_shape() -> Result<()> {
    let (_, numbers) = int_source(&[5, 6, 7])?;

    for shape in single_shapes() {
        let indexed = is_indexed(shape);
        let selector = shaped_lambda(
            shape,
            &[("n", ElementType::Integer)],
            indexed,
            ElementType::Integer,
            |args| match args {
                [Value::Integer(n)] => Ok(Value::Integer(n * 2)),
                [Value::Integer(n), Value::Integer(i)] => Ok(Value::Integer(n * 2 + i)),
                _ => Err(QueryError::selector("double", "unexpected arguments")),
            },
        );
        let query = apply_select(&numbers, shape, &selector)?;
        let expected: Vec<Value> = if indexed {
            vec![Value::Integer(10), Value::Integer(13), Value::Integer(16)]
        } else {
            vec![Value::Integer(10), Value::Integer(12), Value::Integer(14)]
        };
        for (target, engine) in engines() {
            assert_eq!(collect(&query, &engine)?, expected, "shape {} on {} target", shape, target);
        }
    }
    Ok(())
}

#[test]
fn test_where_on_every_shape() -> Result<()> {
    let (_, numbers) = int_source(&[1, 2, 3, 4, 5, 6])?;

    for shape in single_shapes() {
        let indexed = is_indexed(shape);
        // Keep odd values, or odd positions when indexed
        let predicate = shaped_lambda(
            shape,
            &[("n", ElementType::Integer)],
            indexed,
            ElementType::Boolean,
            |args| match args.last() {
                Some(Value::Integer(k)) => Ok(Value::Boolean(k % 2 == 1)),
                _ => Err(QueryError::selector("odd", "unexpected arguments")),
            },
        );
        let query = apply_where(&numbers, shape, &predicate)?;
        let expected: Vec<Value> = if indexed {
            vec![Value::Integer(2), Value::Integer(4), Value::Integer(6)]
        } else {
            vec![Value::Integer(1), Value::Integer(3), Value::Integer(5)]
        };
        for (target, engine) in engines() {
            assert_eq!(collect(&query, &engine)?, expected, "shape {} on {} target", shape, target);
        }
    }
    Ok(())
}

#[test]
fn test_chained_operators() -> Result<()> {
    let (_, numbers) = int_source(&[1, 2, 3, 4])?;
    let query = numbers
        .where_(
            Lambda::build()
                .element("n", ElementType::Integer)
                .returns(ElementType::Boolean, Expr::param("n").gt(Expr::int(1))),
        )?
        .select_many(Lambda::build().element("n", ElementType::Integer).index("i").returns(
            ElementType::list_of(ElementType::Integer),
            Expr::list(vec![Expr::param("n"), Expr::param("i")]),
        ))?
        .select(
            Lambda::build()
                .element("x", ElementType::Integer)
                .returns(ElementType::Integer, Expr::param("x").mul(Expr::int(10))),
        )?;

    assert_eq!(query.node().depth(), 3);
    // The index of the flattening counts elements surviving the filter
    let expected: Vec<Value> = [20, 0, 30, 10, 40, 20].into_iter().map(Value::Integer).collect();
    for (_, engine) in engines() {
        assert_eq!(collect(&query, &engine)?, expected);
    }
    Ok(())
}

#[test]
fn test_predicate_returning_sequence_is_rejected() -> Result<()> {
    let (provider, numbers) = int_source(&[1])?;
    let predicate = Lambda::build()
        .element("n", ElementType::Integer)
        .returns(ElementType::list_of(ElementType::Integer), Expr::list(vec![]));

    let err = numbers.where_(predicate).unwrap_err();
    assert!(matches!(err, QueryError::UnsupportedShape { operator: "Where", .. }));
    assert_eq!(provider.execution_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_to_vec_collects_projection() -> Result<()> {
    let (_, prices) = float_source(&[1.5, 2.5])?;
    let query = prices.select_await(Lambda::build().element("p", ElementType::Float).returns_deferred(
        ElementType::Text,
        Expr::call_async("label", vec![Expr::param("p")], |args| async move {
            Ok(Value::Text(format!("price {}", args[0])))
        }),
    ))?;

    assert_eq!(query.element_type(), &ElementType::Text);
    let labels = query.to_vec(Default::default()).await?;
    assert_eq!(labels, vec![Value::from("price 1.5"), Value::from("price 2.5")]);
    Ok(())
}
