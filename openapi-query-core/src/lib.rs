// OpenAPI query adapter core
// Cache keys, request execution and page-parameter injection that sit
// between a typed HTTP client and a caching query engine.

pub mod engine;
pub mod error;
pub mod executor;
pub mod fetch;
pub mod key;
pub mod method;
pub mod nested;
pub mod options;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use engine::{InfiniteData, QueryEngine, QueryState, QueryStatus};
pub use error::QueryError;
pub use executor::{execute, execute_page, page_init, PageParam};
pub use fetch::{DispatchTable, HttpClient, RequestInit, ResponseEnvelope, VerbHandler};
pub use key::{build_key, MutationKey, QueryKey};
pub use method::Method;
pub use nested::{set_nested_value, with_nested_value};
pub use options::{
    default_next_page_param, infinite_query_options, mutation_options, query_options,
    InfiniteQueryConfig, InfiniteQueryOptions, MutationConfig, MutationFn, MutationOptions,
    NextPageParamFn, PageContext, QueryConfig, QueryContext, QueryFn, QueryOptions, SelectFn,
};

#[cfg(test)]
mod pagination_tests;
