// Outbound contract with the caching query engine.
// The engine owns caching, staleness, retries, dedup of identical in-flight
// requests and garbage collection. This crate only hands it options.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::error::QueryError;
use crate::executor::PageParam;
use crate::options::{InfiniteQueryOptions, MutationOptions, QueryOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryStatus {
    Pending,
    Success,
    Error,
}

/// Snapshot of a query as an engine reports it.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryState<T = Value> {
    pub status: QueryStatus,
    pub data: Option<T>,
    pub error: Option<QueryError>,
}

impl<T> QueryState<T> {
    pub fn pending() -> Self {
        Self {
            status: QueryStatus::Pending,
            data: None,
            error: None,
        }
    }

    pub fn success(data: T) -> Self {
        Self {
            status: QueryStatus::Success,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(error: QueryError) -> Self {
        Self {
            status: QueryStatus::Error,
            data: None,
            error: Some(error),
        }
    }

    pub fn from_result(result: Result<T, QueryError>) -> Self {
        match result {
            Ok(data) => Self::success(data),
            Err(error) => Self::failure(error),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == QueryStatus::Pending
    }

    pub fn is_success(&self) -> bool {
        self.status == QueryStatus::Success
    }

    pub fn is_error(&self) -> bool {
        self.status == QueryStatus::Error
    }
}

/// Pages collected by an infinite query, in fetch order. A `None` param
/// marks a page fetched with the caller's init as given.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InfiniteData {
    pub pages: Vec<Value>,
    pub page_params: Vec<Option<PageParam>>,
}

impl InfiniteData {
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn push(&mut self, page: Value, page_param: Option<PageParam>) {
        self.pages.push(page);
        self.page_params.push(page_param);
    }

    /// Drop pages from the front until at most `max` remain.
    pub fn truncate_front(&mut self, max: usize) {
        let excess = self.pages.len().saturating_sub(max);
        if excess > 0 {
            self.pages.drain(..excess);
            self.page_params.drain(..excess);
        }
    }
}

/// A query/caching engine. Each entry point accepts the options this crate
/// builds and returns whatever result object the engine exposes.
#[async_trait]
pub trait QueryEngine: Send + Sync {
    type Query: Send;
    type SuspenseQuery: Send;
    type InfiniteQuery: Send;
    type Mutation: Send;

    async fn query(&self, options: QueryOptions) -> Self::Query;

    /// Like `query`, but resolves only once data or an error is available.
    async fn suspense_query(&self, options: QueryOptions) -> Self::SuspenseQuery;

    async fn infinite_query(&self, options: InfiniteQueryOptions) -> Self::InfiniteQuery;

    fn mutation(&self, options: MutationOptions) -> Self::Mutation;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_state_from_result() {
        let ok: QueryState = QueryState::from_result(Ok(json!(1)));
        assert!(ok.is_success());
        assert_eq!(ok.data, Some(json!(1)));

        let err: QueryState = QueryState::from_result(Err(QueryError::Api(json!("boom"))));
        assert!(err.is_error());
        assert_eq!(err.data, None);
        assert_eq!(err.error.unwrap().api_payload(), Some(&json!("boom")));
    }

    #[test]
    fn test_truncate_front_keeps_latest_pages() {
        let mut data = InfiniteData::default();
        for i in 0..5u64 {
            data.push(json!(i), Some(i));
        }
        data.truncate_front(2);
        assert_eq!(data.pages, vec![json!(3), json!(4)]);
        assert_eq!(data.page_params, vec![Some(3), Some(4)]);

        data.truncate_front(10);
        assert_eq!(data.len(), 2);
    }
}
