// A pass-through engine: runs every request as soon as it is asked for.
// Nothing is cached, retried or garbage collected, and staleness hints are
// ignored. Useful for tests, scripts and servers that want the adapter's
// key/execute/pagination behavior without a caching layer.

use async_trait::async_trait;
use openapi_query_core::{
    InfiniteData, InfiniteQueryOptions, MutationKey, MutationOptions, PageContext, PageParam,
    QueryConfig, QueryEngine, QueryError, QueryKey, QueryOptions, QueryState,
};
use serde_json::Value;
use std::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::debug;

fn apply_select(config: &QueryConfig, data: Value) -> Value {
    match &config.select {
        Some(select) => select(data),
        None => data,
    }
}

#[derive(Debug, Clone, Default)]
pub struct ImmediateEngine;

impl ImmediateEngine {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl QueryEngine for ImmediateEngine {
    type Query = QueryState;
    type SuspenseQuery = Result<Value, QueryError>;
    type InfiniteQuery = InfiniteQuery;
    type Mutation = Mutation;

    async fn query(&self, options: QueryOptions) -> QueryState {
        if !options.config.is_enabled() {
            debug!("Query {} disabled", options.key);
            return QueryState::pending();
        }
        let result = options.run(CancellationToken::new()).await;
        QueryState::from_result(result.map(|data| apply_select(&options.config, data)))
    }

    async fn suspense_query(&self, options: QueryOptions) -> Result<Value, QueryError> {
        let data = options.run(CancellationToken::new()).await?;
        Ok(apply_select(&options.config, data))
    }

    async fn infinite_query(&self, options: InfiniteQueryOptions) -> InfiniteQuery {
        let enabled = options.config.is_enabled();
        let mut query = InfiniteQuery::new(options);
        if enabled {
            // failure is kept on the handle
            let _ = query.fetch_next_page().await;
        }
        query
    }

    fn mutation(&self, options: MutationOptions) -> Mutation {
        Mutation::new(options)
    }
}

/// Where the next fetch of an infinite query starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cursor {
    First(Option<PageParam>),
    Next(PageParam),
    Exhausted,
}

/// Handle over the pages of one paginated query.
#[derive(Debug)]
pub struct InfiniteQuery {
    options: InfiniteQueryOptions,
    data: InfiniteData,
    cursor: Cursor,
    error: Option<QueryError>,
    cancel: CancellationToken,
}

impl InfiniteQuery {
    pub fn new(options: InfiniteQueryOptions) -> Self {
        let cursor = Cursor::First(options.initial_page_param);
        Self {
            options,
            data: InfiniteData::default(),
            cursor,
            error: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn key(&self) -> &QueryKey {
        &self.options.key
    }

    pub fn has_next_page(&self) -> bool {
        self.cursor != Cursor::Exhausted
    }

    /// Param the next fetch will inject. `None` before the first page means
    /// the first page goes out with init as given.
    pub fn next_page_param(&self) -> Option<PageParam> {
        match self.cursor {
            Cursor::First(param) => param,
            Cursor::Next(param) => Some(param),
            Cursor::Exhausted => None,
        }
    }

    /// Raw pages, without `select` applied.
    pub fn data(&self) -> &InfiniteData {
        &self.data
    }

    pub fn error(&self) -> Option<&QueryError> {
        self.error.as_ref()
    }

    /// Token whose cancellation aborts the page in flight. Once that fetch
    /// settles the handle moves on to a fresh token.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Abort the current fetch. Later fetches are unaffected.
    pub fn cancel(&mut self) {
        std::mem::replace(&mut self.cancel, CancellationToken::new()).cancel();
    }

    /// Current state with `select` applied to each page.
    pub fn state(&self) -> QueryState<InfiniteData> {
        if let Some(error) = &self.error {
            return QueryState::failure(error.clone());
        }
        if self.data.is_empty() {
            return QueryState::pending();
        }
        let pages = self
            .data
            .pages
            .iter()
            .cloned()
            .map(|page| apply_select(&self.options.config, page))
            .collect();
        QueryState::success(InfiniteData {
            pages,
            page_params: self.data.page_params.clone(),
        })
    }

    /// Fetch the page at the current cursor. Returns `Ok(false)` when there
    /// is no next page.
    pub async fn fetch_next_page(&mut self) -> Result<bool, QueryError> {
        let param = match self.cursor {
            Cursor::First(param) => param,
            Cursor::Next(param) => Some(param),
            Cursor::Exhausted => return Ok(false),
        };

        let signal = self.cancel.child_token();
        let result = self.options.run_page(param, signal).await;
        if self.cancel.is_cancelled() {
            self.cancel = CancellationToken::new();
        }

        match result {
            Ok(page) => {
                self.data.push(page, param);
                if let Some(max) = self.options.max_pages {
                    self.data.truncate_front(max);
                }
                self.cursor = self.compute_next().map_or(Cursor::Exhausted, Cursor::Next);
                self.error = None;
                Ok(true)
            }
            Err(err) => {
                debug!("Page {:?} of {} failed: {}", param, self.options.key, err);
                self.error = Some(err.clone());
                Err(err)
            }
        }
    }

    fn compute_next(&self) -> Option<PageParam> {
        let last_page = self.data.pages.last()?;
        let ctx = PageContext {
            last_page,
            all_pages: &self.data.pages,
            last_page_param: self.data.page_params.last().copied().flatten(),
            all_page_params: &self.data.page_params,
        };
        self.options.next_page_param(&ctx)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationStatus {
    Idle,
    Pending,
    Success,
    Error,
}

#[derive(Debug)]
struct MutationInner {
    status: MutationStatus,
    data: Option<Value>,
    error: Option<QueryError>,
}

/// Handle for invoking a mutation and observing its last outcome.
#[derive(Debug)]
pub struct Mutation {
    options: MutationOptions,
    inner: Mutex<MutationInner>,
}

impl Mutation {
    pub fn new(options: MutationOptions) -> Self {
        Self {
            options,
            inner: Mutex::new(MutationInner {
                status: MutationStatus::Idle,
                data: None,
                error: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MutationInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn key(&self) -> &MutationKey {
        &self.options.key
    }

    /// Run the mutation with a call-time init.
    pub async fn mutate(&self, init: Option<Value>) -> Result<Value, QueryError> {
        {
            let mut inner = self.lock();
            inner.status = MutationStatus::Pending;
            inner.error = None;
        }

        let result = self.options.run(init).await;

        let mut inner = self.lock();
        match &result {
            Ok(data) => {
                inner.status = MutationStatus::Success;
                inner.data = Some(data.clone());
            }
            Err(err) => {
                inner.status = MutationStatus::Error;
                inner.data = None;
                inner.error = Some(err.clone());
            }
        }
        result
    }

    pub fn status(&self) -> MutationStatus {
        self.lock().status
    }

    pub fn data(&self) -> Option<Value> {
        self.lock().data.clone()
    }

    pub fn error(&self) -> Option<QueryError> {
        self.lock().error.clone()
    }

    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.status = MutationStatus::Idle;
        inner.data = None;
        inner.error = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use openapi_query_core::testing::RecordingClient;
    use openapi_query_core::{
        infinite_query_options, mutation_options, query_options, DispatchTable,
        InfiniteQueryConfig, Method, MutationConfig,
    };
    use serde_json::json;
    use std::sync::Arc;

    fn table_for(client: &Arc<RecordingClient>) -> Arc<DispatchTable> {
        Arc::new(DispatchTable::build(client.clone(), &Method::ALL).unwrap())
    }

    #[tokio::test]
    async fn test_disabled_query_does_not_fetch() {
        let client = Arc::new(RecordingClient::new());
        let config = QueryConfig {
            enabled: Some(false),
            ..Default::default()
        };
        let options = query_options(table_for(&client), Method::Get, "/items", None, config);

        let state = ImmediateEngine::new().query(options).await;
        assert!(state.is_pending());
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn test_select_transforms_success_data() {
        let client = Arc::new(RecordingClient::new());
        client.push_data(json!({"items": [1, 2, 3], "total": 3}));
        let config = QueryConfig::default().with_select(|data| data["total"].clone());
        let options = query_options(table_for(&client), Method::Get, "/items", None, config);

        let state = ImmediateEngine::new().query(options).await;
        assert_eq!(state.data, Some(json!(3)));
    }

    #[tokio::test]
    async fn test_infinite_query_stops_when_next_is_none() {
        let client = Arc::new(RecordingClient::new());
        client.push_data(json!({"items": [1], "next": 5}));
        client.push_data(json!({"items": [2], "next": null}));
        let config = InfiniteQueryConfig::default()
            .with_page_accessor("query.cursor")
            .with_initial_page_param(0)
            .with_next_page_param(|ctx| ctx.last_page["next"].as_u64());
        let options = infinite_query_options(table_for(&client), Method::Get, "/feed", None, config);

        let mut query = ImmediateEngine::new().infinite_query(options).await;
        assert!(query.has_next_page());
        assert!(query.fetch_next_page().await.unwrap());
        assert!(!query.has_next_page());
        assert!(!query.fetch_next_page().await.unwrap());

        let calls = client.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].init, json!({"query": {"cursor": 0}}));
        assert_eq!(calls[1].init, json!({"query": {"cursor": 5}}));
        assert_eq!(query.data().page_params, vec![Some(0), Some(5)]);
    }

    #[tokio::test]
    async fn test_max_pages_keeps_latest() {
        let client = Arc::new(RecordingClient::new());
        let config = InfiniteQueryConfig {
            max_pages: Some(2),
            ..Default::default()
        }
        .with_page_accessor("page")
        .with_initial_page_param(0)
        .with_next_page_param(|ctx| ctx.last_page_param.map(|param| param + 1));
        let options = infinite_query_options(table_for(&client), Method::Get, "/items", None, config);

        let mut query = ImmediateEngine::new().infinite_query(options).await;
        query.fetch_next_page().await.unwrap();
        query.fetch_next_page().await.unwrap();

        assert_eq!(query.data().page_params, vec![Some(1), Some(2)]);
        assert_eq!(query.next_page_param(), Some(3));
    }

    #[tokio::test]
    async fn test_failed_page_is_reported_and_retryable() {
        let client = Arc::new(RecordingClient::new());
        client.push_error(json!({"message": "rate limited"}));
        let config = InfiniteQueryConfig::default().with_page_accessor("page");
        let options = infinite_query_options(table_for(&client), Method::Get, "/items", None, config);

        let mut query = ImmediateEngine::new().infinite_query(options).await;
        assert!(query.state().is_error());
        assert!(query.has_next_page());
        assert_eq!(query.next_page_param(), None);

        assert!(query.fetch_next_page().await.unwrap());
        let state = query.state();
        assert!(state.is_success());
        assert_eq!(state.data.unwrap().page_params, vec![None]);
        assert_eq!(query.next_page_param(), Some(1));
    }

    #[tokio::test]
    async fn test_first_page_sends_init_as_given() {
        let client = Arc::new(RecordingClient::new());
        let config = InfiniteQueryConfig::default().with_page_accessor("query.page");
        let options = infinite_query_options(
            table_for(&client),
            Method::Get,
            "/items",
            Some(json!({"query": {"page": 1}})),
            config,
        );

        let query = ImmediateEngine::new().infinite_query(options).await;
        assert_eq!(client.calls()[0].init, json!({"query": {"page": 1}}));
        assert_eq!(query.data().page_params, vec![None]);
    }

    #[tokio::test]
    async fn test_cancel_only_aborts_current_fetch() {
        let client = Arc::new(RecordingClient::new());
        let config = InfiniteQueryConfig {
            enabled: Some(false),
            ..Default::default()
        }
        .with_page_accessor("page")
        .with_initial_page_param(0);
        let options = infinite_query_options(table_for(&client), Method::Get, "/slow", None, config);
        let mut query = ImmediateEngine::new().infinite_query(options).await;

        client.push_until_cancelled();
        let token = query.cancellation_token();
        tokio::spawn(async move { token.cancel() });
        let err = query.fetch_next_page().await.unwrap_err();
        assert!(matches!(err, QueryError::Transport(_)));
        assert!(!query.cancellation_token().is_cancelled());

        query.cancel();
        assert!(query.fetch_next_page().await.unwrap());
        assert!(query.state().is_success());

        let calls = client.calls();
        assert_eq!(calls.len(), 2);
        assert!(!calls[1].signal.as_ref().unwrap().is_cancelled());
    }

    #[tokio::test]
    async fn test_mutation_tracks_status() {
        let client = Arc::new(RecordingClient::new());
        client.push_data(json!({"id": 1}));
        client.push_error(json!({"message": "conflict"}));
        let options = mutation_options(table_for(&client), Method::Post, "/items", MutationConfig::default());

        let mutation = ImmediateEngine::new().mutation(options);
        assert_eq!(mutation.status(), MutationStatus::Idle);

        let created = mutation.mutate(Some(json!({"body": {"name": "a"}}))).await.unwrap();
        assert_eq!(created, json!({"id": 1}));
        assert_eq!(mutation.status(), MutationStatus::Success);
        assert_eq!(mutation.data(), Some(json!({"id": 1})));

        let err = mutation.mutate(Some(json!({"body": {"name": "a"}}))).await.unwrap_err();
        assert_eq!(err.api_payload(), Some(&json!({"message": "conflict"})));
        assert_eq!(mutation.status(), MutationStatus::Error);
        assert_eq!(mutation.data(), None);

        mutation.reset();
        assert_eq!(mutation.status(), MutationStatus::Idle);
        assert!(mutation.error().is_none());
    }
}
