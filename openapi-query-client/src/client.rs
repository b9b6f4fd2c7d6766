// OpenAPI Query Client
// Binds an HTTP client to a query engine and exposes:
// - a bare options builder for composing with the engine directly
// - standard, suspending and paginated queries
// - mutations
// No caching happens here; every operation forwards to the engine.

use openapi_query_core::{
    infinite_query_options, mutation_options, query_options, DispatchTable, HttpClient,
    InfiniteQueryConfig, InfiniteQueryOptions, Method, MutationConfig, MutationOptions,
    QueryConfig, QueryEngine, QueryError, QueryOptions,
};
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Client configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// Verbs to bind at construction. Each must be supported by the HTTP client.
    pub methods: Vec<Method>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            methods: Method::ALL.to_vec(),
        }
    }
}

impl ClientConfig {
    pub fn from_json(text: &str) -> Result<Self, QueryError> {
        serde_json::from_str(text).map_err(|e| QueryError::Config(e.to_string()))
    }
}

/// Entry point: an HTTP client bound to a default query engine.
pub struct Client<E: QueryEngine> {
    config: ClientConfig,
    dispatch: Arc<DispatchTable>,
    engine: Arc<E>,
}

impl<E: QueryEngine> Client<E> {
    /// Create a new client binding every HTTP verb
    pub fn new(http: Arc<dyn HttpClient>, engine: E) -> Result<Self, QueryError> {
        Self::with_config(http, engine, ClientConfig::default())
    }

    /// Create a new client binding only the configured verbs
    pub fn with_config(
        http: Arc<dyn HttpClient>,
        engine: E,
        config: ClientConfig,
    ) -> Result<Self, QueryError> {
        let dispatch = DispatchTable::build(http, &config.methods)?;
        debug!("Bound HTTP client for {:?}", dispatch.methods());

        Ok(Self {
            config,
            dispatch: Arc::new(dispatch),
            engine: Arc::new(engine),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    fn ensure_bound(&self, method: Method) -> Result<(), QueryError> {
        if self.dispatch.contains(method) {
            Ok(())
        } else {
            Err(QueryError::UnsupportedMethod(method))
        }
    }

    fn pick<'a>(&'a self, engine: Option<&'a E>) -> &'a E {
        engine.unwrap_or(self.engine.as_ref())
    }

    /// Options for a single-shot query, for callers driving the engine themselves
    pub fn query_options(
        &self,
        method: Method,
        path: &str,
        init: Option<Value>,
        config: QueryConfig,
    ) -> Result<QueryOptions, QueryError> {
        self.ensure_bound(method)?;
        Ok(query_options(self.dispatch.clone(), method, path, init, config))
    }

    /// Options for a paginated query
    pub fn infinite_query_options(
        &self,
        method: Method,
        path: &str,
        init: Option<Value>,
        config: InfiniteQueryConfig,
    ) -> Result<InfiniteQueryOptions, QueryError> {
        self.ensure_bound(method)?;
        Ok(infinite_query_options(self.dispatch.clone(), method, path, init, config))
    }

    /// Options for a mutation; the init is supplied when the mutation runs
    pub fn mutation_options(
        &self,
        method: Method,
        path: &str,
        config: MutationConfig,
    ) -> Result<MutationOptions, QueryError> {
        self.ensure_bound(method)?;
        Ok(mutation_options(self.dispatch.clone(), method, path, config))
    }

    pub async fn query(
        &self,
        method: Method,
        path: &str,
        init: Option<Value>,
        config: QueryConfig,
        engine: Option<&E>,
    ) -> Result<E::Query, QueryError> {
        let options = self.query_options(method, path, init, config)?;
        Ok(self.pick(engine).query(options).await)
    }

    pub async fn suspense_query(
        &self,
        method: Method,
        path: &str,
        init: Option<Value>,
        config: QueryConfig,
        engine: Option<&E>,
    ) -> Result<E::SuspenseQuery, QueryError> {
        let options = self.query_options(method, path, init, config)?;
        Ok(self.pick(engine).suspense_query(options).await)
    }

    pub async fn infinite_query(
        &self,
        method: Method,
        path: &str,
        init: Option<Value>,
        config: InfiniteQueryConfig,
        engine: Option<&E>,
    ) -> Result<E::InfiniteQuery, QueryError> {
        let options = self.infinite_query_options(method, path, init, config)?;
        Ok(self.pick(engine).infinite_query(options).await)
    }

    pub fn mutation(
        &self,
        method: Method,
        path: &str,
        config: MutationConfig,
        engine: Option<&E>,
    ) -> Result<E::Mutation, QueryError> {
        let options = self.mutation_options(method, path, config)?;
        Ok(self.pick(engine).mutation(options))
    }
}

impl<E: QueryEngine> Clone for Client<E> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            dispatch: self.dispatch.clone(),
            engine: self.engine.clone(),
        }
    }
}

impl<E: QueryEngine> fmt::Debug for Client<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .field("dispatch", &self.dispatch)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ImmediateEngine;
    use openapi_query_core::testing::RecordingClient;
    use serde_json::json;

    #[test]
    fn test_client_creation() {
        let http = Arc::new(RecordingClient::new());
        let client = Client::new(http, ImmediateEngine::new());
        assert!(client.is_ok());
        assert_eq!(client.unwrap().config().methods.len(), 8);
    }

    #[test]
    fn test_unsupported_verb_fails_construction() {
        let http = Arc::new(RecordingClient::new().with_methods(&[Method::Get, Method::Post]));
        let err = Client::new(http, ImmediateEngine::new()).unwrap_err();
        assert_eq!(err, QueryError::UnsupportedMethod(Method::Put));
    }

    #[test]
    fn test_unbound_verb_rejected_when_building_options() {
        let http = Arc::new(RecordingClient::new().with_methods(&[Method::Get]));
        let config = ClientConfig {
            methods: vec![Method::Get],
        };
        let client = Client::with_config(http, ImmediateEngine::new(), config).unwrap();

        let err = client
            .mutation_options(Method::Post, "/items", MutationConfig::default())
            .unwrap_err();
        assert_eq!(err, QueryError::UnsupportedMethod(Method::Post));
        assert!(client
            .query_options(Method::Get, "/items", None, QueryConfig::default())
            .is_ok());
    }

    #[test]
    fn test_config_from_json() {
        let config = ClientConfig::from_json(r#"{"methods": ["get", "post"]}"#).unwrap();
        assert_eq!(config.methods, vec![Method::Get, Method::Post]);
        assert!(ClientConfig::from_json(r#"{"methods": ["get"], "base_url": "x"}"#).is_err());
        assert!(ClientConfig::from_json(r#"{"methods": ["connect"]}"#).is_err());
    }

    #[test]
    fn test_query_options_exposes_key() {
        let http = Arc::new(RecordingClient::new());
        let client = Client::new(http, ImmediateEngine::new()).unwrap();
        let options = client
            .query_options(
                Method::Get,
                "/items/{id}",
                Some(json!({"params": {"path": {"id": 3}}})),
                QueryConfig::default(),
            )
            .unwrap();
        assert_eq!(
            options.key.fingerprint(),
            r#"["get","/items/{id}",{"params":{"path":{"id":3}}}]"#
        );
    }
}
