// Inbound contract with the HTTP client, and the per-verb dispatch table.

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::error::QueryError;
use crate::method::Method;

/// What the HTTP client answers: success data or the API's error payload.
pub type ResponseEnvelope = Result<Value, Value>;

/// Init fields for one call, merged with the caller's cancellation signal.
#[derive(Debug, Clone, Default)]
pub struct RequestInit {
    pub fields: Map<String, Value>,
    pub signal: Option<CancellationToken>,
}

impl RequestInit {
    /// Merge an init value with a signal. `None` and `null` both mean "no fields".
    pub fn from_value(init: Option<&Value>, signal: Option<CancellationToken>) -> Result<Self, QueryError> {
        let fields = match init {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(map)) => map.clone(),
            Some(other) => return Err(QueryError::InvalidInit(type_name(other).to_string())),
        };
        Ok(Self { fields, signal })
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Fields as a JSON object, without the signal.
    pub fn to_value(&self) -> Value {
        Value::Object(self.fields.clone())
    }

    pub fn is_cancelled(&self) -> bool {
        self.signal.as_ref().is_some_and(|s| s.is_cancelled())
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// An HTTP client exposing one callable per verb.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Whether this client can serve `method`. Checked once, when the
    /// dispatch table is built.
    fn supports(&self, method: Method) -> bool {
        let _ = method;
        true
    }

    /// Perform the call. `Err` is reserved for failures that produced no
    /// envelope at all.
    async fn request(
        &self,
        method: Method,
        path: &str,
        init: RequestInit,
    ) -> anyhow::Result<ResponseEnvelope>;
}

pub type VerbHandler =
    Arc<dyn Fn(String, RequestInit) -> BoxFuture<'static, anyhow::Result<ResponseEnvelope>> + Send + Sync>;

/// Verb-to-handler mapping resolved once against a client.
#[derive(Clone)]
pub struct DispatchTable {
    handlers: HashMap<Method, VerbHandler>,
}

impl DispatchTable {
    /// Bind one handler per verb in `methods`. Fails on the first verb the
    /// client does not support.
    pub fn build(client: Arc<dyn HttpClient>, methods: &[Method]) -> Result<Self, QueryError> {
        let mut handlers: HashMap<Method, VerbHandler> = HashMap::new();
        for &method in methods {
            if !client.supports(method) {
                return Err(QueryError::UnsupportedMethod(method));
            }
            let client = client.clone();
            let handler: VerbHandler = Arc::new(move |path, init| {
                let client = client.clone();
                async move { client.request(method, &path, init).await }.boxed()
            });
            handlers.insert(method, handler);
        }
        Ok(Self { handlers })
    }

    pub fn handler(&self, method: Method) -> Result<&VerbHandler, QueryError> {
        self.handlers
            .get(&method)
            .ok_or(QueryError::UnsupportedMethod(method))
    }

    pub fn contains(&self, method: Method) -> bool {
        self.handlers.contains_key(&method)
    }

    pub fn methods(&self) -> Vec<Method> {
        let mut methods: Vec<Method> = self.handlers.keys().copied().collect();
        methods.sort();
        methods
    }
}

impl fmt::Debug for DispatchTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchTable")
            .field("methods", &self.methods())
            .finish()
    }
}
