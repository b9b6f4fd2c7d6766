use serde_json::Value;
use thiserror::Error;

use crate::method::Method;

/// The single failure channel surfaced to a query engine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    /// Error payload carried by the response envelope, passed through untouched.
    #[error("API error: {0}")]
    Api(Value),
    /// The HTTP client failed before producing an envelope.
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Method not bound on this client: {0}")]
    UnsupportedMethod(Method),
    #[error("Unknown HTTP method: {0}")]
    InvalidMethod(String),
    #[error("Request init must be an object, got {0}")]
    InvalidInit(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

impl QueryError {
    /// The raw API error value, if this failure came from the envelope.
    pub fn api_payload(&self) -> Option<&Value> {
        match self {
            QueryError::Api(value) => Some(value),
            _ => None,
        }
    }

    pub fn transport(err: &anyhow::Error) -> Self {
        QueryError::Transport(format!("{:#}", err))
    }
}

impl From<serde_json::Error> for QueryError {
    fn from(err: serde_json::Error) -> Self {
        QueryError::Config(err.to_string())
    }
}
