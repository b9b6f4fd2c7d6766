// Pagination Tests
// Page-parameter injection through the options builders, driven the way an
// engine's pagination loop would drive it.

use crate::testing::RecordingClient;
use crate::{
    infinite_query_options, DispatchTable, InfiniteData, InfiniteQueryConfig, Method,
    PageContext, QueryError,
};
use serde_json::json;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .with_test_writer()
        .try_init();
}

fn setup() -> (Arc<RecordingClient>, Arc<DispatchTable>) {
    init_tracing();
    let client = Arc::new(RecordingClient::new());
    let table = Arc::new(DispatchTable::build(client.clone(), &Method::ALL).unwrap());
    (client, table)
}

#[tokio::test]
async fn test_engine_loop_with_default_policy() {
    let (client, table) = setup();
    let options = infinite_query_options(
        table,
        Method::Get,
        "/items",
        Some(json!({"query": {"limit": 10}})),
        InfiniteQueryConfig::default()
            .with_page_accessor("query.page")
            .with_initial_page_param(0),
    );

    let mut data = InfiniteData::default();
    let mut param = options.initial_page_param;
    while data.len() < 3 {
        let current = param;
        let page = options.run_page(current, CancellationToken::new()).await.unwrap();
        data.push(page, current);
        let ctx = PageContext {
            last_page: &data.pages[data.len() - 1],
            all_pages: &data.pages,
            last_page_param: current,
            all_page_params: &data.page_params,
        };
        param = options.next_page_param(&ctx);
        if param.is_none() {
            break;
        }
    }

    let pages: Vec<_> = client
        .calls()
        .iter()
        .map(|call| call.init["query"].clone())
        .collect();
    assert_eq!(
        pages,
        vec![
            json!({"limit": 10, "page": 0}),
            json!({"limit": 10, "page": 1}),
            json!({"limit": 10, "page": 2}),
        ]
    );
}

#[tokio::test]
async fn test_first_init_unchanged_after_second_page() {
    let (client, table) = setup();
    let options = infinite_query_options(
        table,
        Method::Get,
        "/items",
        Some(json!({"query": {"page": 1}})),
        InfiniteQueryConfig::default().with_page_accessor("query.page"),
    );

    options.run_page(None, CancellationToken::new()).await.unwrap();
    let first = client.calls()[0].init.clone();
    options.run_page(Some(2), CancellationToken::new()).await.unwrap();

    assert_eq!(first, json!({"query": {"page": 1}}));
    assert_eq!(client.calls()[0].init, json!({"query": {"page": 1}}));
    assert_eq!(client.calls()[1].init, json!({"query": {"page": 2}}));
    assert_eq!(options.key.init(), Some(&json!({"query": {"page": 1}})));
}

#[tokio::test]
async fn test_accessor_through_scalar_overwrites_it() {
    let (client, table) = setup();
    let options = infinite_query_options(
        table,
        Method::Get,
        "/items",
        Some(json!({"query": "raw"})),
        InfiniteQueryConfig::default().with_page_accessor("query.page"),
    );

    options.run_page(Some(4), CancellationToken::new()).await.unwrap();
    assert_eq!(client.calls()[0].init, json!({"query": {"page": 4}}));
}

#[tokio::test]
async fn test_without_accessor_init_passes_through() {
    let (client, table) = setup();
    let options = infinite_query_options(
        table,
        Method::Get,
        "/items",
        Some(json!({"query": {"page": 9}})),
        InfiniteQueryConfig::default(),
    );
    assert!(!options.key.is_paginated());

    options.run_page(Some(3), CancellationToken::new()).await.unwrap();
    assert_eq!(client.calls()[0].init, json!({"query": {"page": 9}}));
}

#[tokio::test]
async fn test_page_failure_surfaces_api_error() {
    let (client, table) = setup();
    client.push_error(json!({"message": "page out of range"}));
    let options = infinite_query_options(
        table,
        Method::Get,
        "/items",
        None,
        InfiniteQueryConfig::default().with_page_accessor("page"),
    );

    let err = options.run_page(Some(99), CancellationToken::new()).await.unwrap_err();
    assert_eq!(err, QueryError::Api(json!({"message": "page out of range"})));
    assert_eq!(client.calls()[0].init, json!({"page": 99}));
}
