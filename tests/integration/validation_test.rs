use anyhow::Result;

use asyncquery::query::expr::Expr;
use asyncquery::query::surface;
use asyncquery::{ElementType, Lambda, QueryError, QueryResult, QuerySource, Value};

// Declare the common module for test utilities using a path attribute
#[path = "../common/mod.rs"]
mod common;
use common::*;

type SingleEntry = fn(Option<&QuerySource>, Option<&Lambda>) -> QueryResult<QuerySource>;
type TwoLevelEntry = fn(Option<&QuerySource>, Option<&Lambda>, Option<&Lambda>) -> QueryResult<QuerySource>;

// Entry points taking one selector, with the name of that selector's parameter
fn single_entries() -> Vec<(&'static str, SingleEntry, &'static str)> {
    vec![
        ("select_many", surface::select_many as SingleEntry, "selector"),
        ("select_many_await", surface::select_many_await as SingleEntry, "selector"),
        (
            "select_many_await_with_cancellation",
            surface::select_many_await_with_cancellation as SingleEntry,
            "selector",
        ),
        ("select", surface::select as SingleEntry, "selector"),
        ("select_await", surface::select_await as SingleEntry, "selector"),
        ("select_await_with_cancellation", surface::select_await_with_cancellation as SingleEntry, "selector"),
        ("where_", surface::where_ as SingleEntry, "predicate"),
        ("where_await", surface::where_await as SingleEntry, "predicate"),
        ("where_await_with_cancellation", surface::where_await_with_cancellation as SingleEntry, "predicate"),
    ]
}

fn two_level_entries() -> Vec<(&'static str, TwoLevelEntry)> {
    vec![
        ("select_many_with_result", surface::select_many_with_result as TwoLevelEntry),
        ("select_many_await_with_result", surface::select_many_await_with_result as TwoLevelEntry),
        (
            "select_many_await_with_cancellation_with_result",
            surface::select_many_await_with_cancellation_with_result as TwoLevelEntry,
        ),
    ]
}

fn null_parameter(result: QueryResult<QuerySource>) -> &'static str {
    match result {
        Err(QueryError::ArgumentNull { parameter }) => parameter,
        other => panic!("expected ArgumentNull, got {:?}", other),
    }
}

// A lambda that fits no overload at all, to show null checks come first
fn unusable_lambda() -> Lambda {
    Lambda::build()
        .cancellation("ct")
        .element("p", ElementType::Text)
        .returns(ElementType::Text, Expr::param("p"))
}

#[test]
fn test_null_source_is_reported_first() -> Result<()> {
    let lambda = unusable_lambda();
    for (name, entry, _) in single_entries() {
        assert_eq!(null_parameter(entry(None, None)), "source", "{}", name);
        assert_eq!(null_parameter(entry(None, Some(&lambda))), "source", "{}", name);
    }
    for (name, entry) in two_level_entries() {
        assert_eq!(null_parameter(entry(None, None, None)), "source", "{}", name);
        assert_eq!(null_parameter(entry(None, Some(&lambda), None)), "source", "{}", name);
        assert_eq!(null_parameter(entry(None, None, Some(&lambda))), "source", "{}", name);
    }
    Ok(())
}

#[test]
fn test_null_selector_is_reported_before_anything_else() -> Result<()> {
    let (provider, prices) = float_source(&[1.0])?;
    let lambda = unusable_lambda();

    for (name, entry, parameter) in single_entries() {
        assert_eq!(null_parameter(entry(Some(&prices), None)), parameter, "{}", name);
    }
    for (name, entry) in two_level_entries() {
        assert_eq!(
            null_parameter(entry(Some(&prices), None, None)),
            "collection_selector",
            "{}",
            name
        );
        assert_eq!(
            null_parameter(entry(Some(&prices), None, Some(&lambda))),
            "collection_selector",
            "{}",
            name
        );
        assert_eq!(
            null_parameter(entry(Some(&prices), Some(&lambda), None)),
            "result_selector",
            "{}",
            name
        );
    }

    assert_eq!(provider.execution_count(), 0);
    Ok(())
}

#[test]
fn test_flavour_mismatch_is_unsupported() -> Result<()> {
    let (provider, prices) = float_source(&[1.0])?;
    let immediate = Lambda::build()
        .element("p", ElementType::Float)
        .returns(ElementType::list_of(ElementType::Float), Expr::list(vec![]));
    let deferred = Lambda::build()
        .element("p", ElementType::Float)
        .returns_deferred(ElementType::list_of(ElementType::Float), Expr::completed(Expr::list(vec![])));

    for result in [
        surface::select_many_await(Some(&prices), Some(&immediate)),
        surface::select_many_await_with_cancellation(Some(&prices), Some(&deferred)),
        surface::select_many(Some(&prices), Some(&deferred)),
    ] {
        assert!(matches!(result, Err(QueryError::UnsupportedShape { .. })), "{:?}", result);
    }
    assert_eq!(provider.execution_count(), 0);
    Ok(())
}

#[test]
fn test_declared_types_must_line_up() -> Result<()> {
    let (provider, prices) = float_source(&[1.0])?;
    let text_selector = Lambda::build()
        .element("s", ElementType::Text)
        .returns(ElementType::list_of(ElementType::Text), Expr::list(vec![Expr::param("s")]));
    assert!(matches!(prices.select_many(text_selector), Err(QueryError::TypeError(_))));

    // The result selector's second parameter must accept the collection items
    let collection_selector = Lambda::build()
        .element("p", ElementType::Float)
        .returns(ElementType::list_of(ElementType::Float), Expr::list(vec![Expr::param("p")]));
    let result_selector = Lambda::build()
        .element("p", ElementType::Float)
        .element("c", ElementType::Boolean)
        .returns(ElementType::Float, Expr::param("p"));
    assert!(matches!(
        prices.select_many_with_result(collection_selector, result_selector),
        Err(QueryError::TypeError(_))
    ));

    assert_eq!(provider.execution_count(), 0);
    Ok(())
}

#[test]
fn test_malformed_bodies_are_rejected_when_composed() -> Result<()> {
    let (provider, prices) = float_source(&[1.0])?;
    let fetch = Expr::call_async("fetch", vec![Expr::param("p")], |args| async move { Ok(Value::List(args)) });

    let nested_deferred = Lambda::build()
        .element("p", ElementType::Float)
        .returns(ElementType::list_of(ElementType::Float), Expr::list(vec![fetch.clone()]));
    let deferred_argument = Lambda::build().element("p", ElementType::Float).returns_deferred(
        ElementType::list_of(ElementType::Float),
        Expr::completed(Expr::list(vec![Expr::param("p").add(fetch)])),
    );
    let undeclared_element = Lambda::build()
        .element("p", ElementType::Float)
        .returns(ElementType::list_of(ElementType::Float), Expr::list(vec![Expr::param("q")]));
    let undeclared_token = Lambda::build().element("p", ElementType::Float).returns(
        ElementType::list_of(ElementType::Float),
        Expr::call_cancellable("spread", vec![Expr::param("p")], "ct", |args, _| Ok(Value::List(args.to_vec()))),
    );

    for result in [
        prices.select_many(nested_deferred),
        prices.select_many_await(deferred_argument),
        prices.select_many(undeclared_element),
        prices.select_many(undeclared_token),
    ] {
        assert!(matches!(result, Err(QueryError::UnsupportedShape { .. })), "{:?}", result.err());
    }
    assert_eq!(provider.execution_count(), 0);
    Ok(())
}

#[test]
fn test_reserved_parameter_names() -> Result<()> {
    let (_, prices) = float_source(&[1.0])?;
    let selector = Lambda::build()
        .element("$token", ElementType::Float)
        .returns(ElementType::Float, Expr::param("$token"));
    assert!(matches!(prices.select(selector), Err(QueryError::UnsupportedShape { .. })));
    Ok(())
}

#[test]
fn test_contract_violations_are_classified() {
    assert!(QueryError::ArgumentNull { parameter: "source" }.is_contract_violation());
    assert!(!QueryError::Cancelled.is_contract_violation());
}
