pub mod client;
pub mod immediate;

pub use client::{Client, ClientConfig};
pub use immediate::{ImmediateEngine, InfiniteQuery, Mutation, MutationStatus};

pub use openapi_query_core::{
    InfiniteQueryConfig, Method, MutationConfig, QueryConfig, QueryEngine, QueryError, QueryKey,
};
