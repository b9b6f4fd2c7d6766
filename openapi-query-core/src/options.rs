// Engine-facing options: a key, an execute function, and typed config.

use futures::future::{BoxFuture, FutureExt};
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::error::QueryError;
use crate::executor::{execute, execute_page, PageParam};
use crate::fetch::DispatchTable;
use crate::key::{build_key, MutationKey, QueryKey};
use crate::method::Method;

/// What the engine hands to an execute function on each invocation.
#[derive(Debug, Clone)]
pub struct QueryContext {
    pub key: QueryKey,
    pub signal: CancellationToken,
    pub page_param: Option<PageParam>,
}

impl QueryContext {
    pub fn new(key: QueryKey, signal: CancellationToken) -> Self {
        Self {
            key,
            signal,
            page_param: None,
        }
    }
}

pub type QueryFn =
    Arc<dyn Fn(QueryContext) -> BoxFuture<'static, Result<Value, QueryError>> + Send + Sync>;
pub type MutationFn =
    Arc<dyn Fn(Option<Value>) -> BoxFuture<'static, Result<Value, QueryError>> + Send + Sync>;
pub type SelectFn = Arc<dyn Fn(Value) -> Value + Send + Sync>;
pub type NextPageParamFn = Arc<dyn Fn(&PageContext<'_>) -> Option<PageParam> + Send + Sync>;

/// Pages fetched so far, as seen by a next-page-param function.
#[derive(Debug, Clone, Copy)]
pub struct PageContext<'a> {
    pub last_page: &'a Value,
    pub all_pages: &'a [Value],
    pub last_page_param: Option<PageParam>,
    pub all_page_params: &'a [Option<PageParam>],
}

/// Next page is the number of pages already fetched.
///
/// Assumes zero-based, strictly incrementing integer pages. Cursor-based
/// endpoints need their own function.
pub fn default_next_page_param(ctx: &PageContext<'_>) -> Option<PageParam> {
    Some(ctx.all_pages.len() as PageParam)
}

fn parse_config<T: for<'de> Deserialize<'de>>(text: &str) -> Result<T, QueryError> {
    serde_json::from_str(text).map_err(|e| QueryError::Config(e.to_string()))
}

/// Passthrough options for single-shot queries.
#[derive(Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueryConfig {
    pub enabled: Option<bool>,
    pub stale_time_ms: Option<u64>,
    pub gc_time_ms: Option<u64>,
    pub retry: Option<u32>,
    pub refetch_on_window_focus: Option<bool>,
    #[serde(skip)]
    pub select: Option<SelectFn>,
}

impl QueryConfig {
    pub fn from_json(text: &str) -> Result<Self, QueryError> {
        parse_config(text)
    }

    pub fn with_select(mut self, select: impl Fn(Value) -> Value + Send + Sync + 'static) -> Self {
        self.select = Some(Arc::new(select));
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }
}

impl fmt::Debug for QueryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryConfig")
            .field("enabled", &self.enabled)
            .field("stale_time_ms", &self.stale_time_ms)
            .field("gc_time_ms", &self.gc_time_ms)
            .field("retry", &self.retry)
            .field("refetch_on_window_focus", &self.refetch_on_window_focus)
            .field("select", &self.select.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

/// Passthrough options for paginated queries.
#[derive(Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InfiniteQueryConfig {
    pub enabled: Option<bool>,
    pub stale_time_ms: Option<u64>,
    pub gc_time_ms: Option<u64>,
    pub retry: Option<u32>,
    pub refetch_on_window_focus: Option<bool>,
    /// Dot-path inside init where the page parameter is written.
    pub page_accessor: Option<String>,
    /// Param for the first page. Unset sends the first page with init as given.
    pub initial_page_param: Option<PageParam>,
    pub max_pages: Option<usize>,
    #[serde(skip)]
    pub select: Option<SelectFn>,
    #[serde(skip)]
    pub next_page_param: Option<NextPageParamFn>,
}

impl InfiniteQueryConfig {
    pub fn from_json(text: &str) -> Result<Self, QueryError> {
        parse_config(text)
    }

    pub fn with_page_accessor(mut self, accessor: impl Into<String>) -> Self {
        self.page_accessor = Some(accessor.into());
        self
    }

    pub fn with_initial_page_param(mut self, page_param: PageParam) -> Self {
        self.initial_page_param = Some(page_param);
        self
    }

    pub fn with_next_page_param(
        mut self,
        next: impl Fn(&PageContext<'_>) -> Option<PageParam> + Send + Sync + 'static,
    ) -> Self {
        self.next_page_param = Some(Arc::new(next));
        self
    }

    /// The query-level subset of this config.
    pub fn query_config(&self) -> QueryConfig {
        QueryConfig {
            enabled: self.enabled,
            stale_time_ms: self.stale_time_ms,
            gc_time_ms: self.gc_time_ms,
            retry: self.retry,
            refetch_on_window_focus: self.refetch_on_window_focus,
            select: self.select.clone(),
        }
    }
}

impl fmt::Debug for InfiniteQueryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InfiniteQueryConfig")
            .field("query", &self.query_config())
            .field("page_accessor", &self.page_accessor)
            .field("initial_page_param", &self.initial_page_param)
            .field("max_pages", &self.max_pages)
            .field("next_page_param", &self.next_page_param.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MutationConfig {
    pub retry: Option<u32>,
    pub gc_time_ms: Option<u64>,
}

impl MutationConfig {
    pub fn from_json(text: &str) -> Result<Self, QueryError> {
        parse_config(text)
    }
}

/// Options for a single-shot or suspending query.
#[derive(Clone)]
pub struct QueryOptions {
    pub key: QueryKey,
    pub execute: QueryFn,
    pub config: QueryConfig,
}

impl QueryOptions {
    /// Run the execute function once with the given signal.
    pub async fn run(&self, signal: CancellationToken) -> Result<Value, QueryError> {
        (self.execute)(QueryContext::new(self.key.clone(), signal)).await
    }
}

impl fmt::Debug for QueryOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryOptions")
            .field("key", &self.key)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Options for a paginated query.
#[derive(Clone)]
pub struct InfiniteQueryOptions {
    pub key: QueryKey,
    pub execute: QueryFn,
    pub initial_page_param: Option<PageParam>,
    pub max_pages: Option<usize>,
    pub next_page_param: NextPageParamFn,
    pub config: QueryConfig,
}

impl InfiniteQueryOptions {
    pub async fn run_page(
        &self,
        page_param: Option<PageParam>,
        signal: CancellationToken,
    ) -> Result<Value, QueryError> {
        let ctx = QueryContext {
            page_param,
            ..QueryContext::new(self.key.clone(), signal)
        };
        (self.execute)(ctx).await
    }

    pub fn next_page_param(&self, ctx: &PageContext<'_>) -> Option<PageParam> {
        (self.next_page_param)(ctx)
    }
}

impl fmt::Debug for InfiniteQueryOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InfiniteQueryOptions")
            .field("key", &self.key)
            .field("initial_page_param", &self.initial_page_param)
            .field("max_pages", &self.max_pages)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
pub struct MutationOptions {
    pub key: MutationKey,
    pub execute: MutationFn,
    pub config: MutationConfig,
}

impl MutationOptions {
    pub async fn run(&self, init: Option<Value>) -> Result<Value, QueryError> {
        (self.execute)(init).await
    }
}

impl fmt::Debug for MutationOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutationOptions")
            .field("key", &self.key)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Execute function for plain queries: reads method, path and init back out
/// of the key the engine passes in.
pub fn query_fn(table: Arc<DispatchTable>) -> QueryFn {
    Arc::new(move |ctx: QueryContext| {
        let table = table.clone();
        async move {
            let key = ctx.key;
            execute(&table, key.method(), key.path(), key.init(), Some(ctx.signal)).await
        }
        .boxed()
    })
}

/// Execute function for paginated queries.
pub fn infinite_query_fn(table: Arc<DispatchTable>) -> QueryFn {
    Arc::new(move |ctx: QueryContext| {
        let table = table.clone();
        async move {
            let key = ctx.key;
            execute_page(
                &table,
                key.method(),
                key.path(),
                key.init(),
                key.page_accessor(),
                ctx.page_param,
                Some(ctx.signal),
            )
            .await
        }
        .boxed()
    })
}

pub fn query_options(
    table: Arc<DispatchTable>,
    method: Method,
    path: &str,
    init: Option<Value>,
    config: QueryConfig,
) -> QueryOptions {
    QueryOptions {
        key: build_key(method, path, init, None),
        execute: query_fn(table),
        config,
    }
}

pub fn infinite_query_options(
    table: Arc<DispatchTable>,
    method: Method,
    path: &str,
    init: Option<Value>,
    config: InfiniteQueryConfig,
) -> InfiniteQueryOptions {
    let query_config = config.query_config();
    let next_page_param: NextPageParamFn = config
        .next_page_param
        .unwrap_or_else(|| Arc::new(default_next_page_param) as NextPageParamFn);

    InfiniteQueryOptions {
        key: build_key(method, path, init, config.page_accessor),
        execute: infinite_query_fn(table),
        initial_page_param: config.initial_page_param,
        max_pages: config.max_pages,
        next_page_param,
        config: query_config,
    }
}

pub fn mutation_options(
    table: Arc<DispatchTable>,
    method: Method,
    path: &str,
    config: MutationConfig,
) -> MutationOptions {
    let target = path.to_string();
    let run: MutationFn = Arc::new(move |init: Option<Value>| {
        let table = table.clone();
        let path = target.clone();
        async move { execute(&table, method, &path, init.as_ref(), None).await }.boxed()
    });

    MutationOptions {
        key: MutationKey::new(method, path),
        execute: run,
        config,
    }
}
