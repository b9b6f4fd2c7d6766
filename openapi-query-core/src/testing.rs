// Scripted HTTP client for tests.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

use crate::fetch::{HttpClient, RequestInit, ResponseEnvelope};
use crate::method::Method;

/// One call as the client saw it.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: Method,
    pub path: String,
    pub init: Value,
    pub signal: Option<CancellationToken>,
}

enum Reply {
    Envelope(anyhow::Result<ResponseEnvelope>),
    UntilCancelled,
}

/// Records every call and answers from a queue.
///
/// With an empty queue it echoes `{"method", "path", "init"}` back as data.
#[derive(Default)]
pub struct RecordingClient {
    methods: Option<Vec<Method>>,
    calls: Mutex<Vec<RecordedCall>>,
    replies: Mutex<VecDeque<Reply>>,
}

impl std::fmt::Debug for RecordingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingClient")
            .field("methods", &self.methods)
            .field("calls", &lock(&self.calls).len())
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl RecordingClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict the verbs this client claims to support.
    pub fn with_methods(mut self, methods: &[Method]) -> Self {
        self.methods = Some(methods.to_vec());
        self
    }

    pub fn push_response(&self, reply: anyhow::Result<ResponseEnvelope>) {
        lock(&self.replies).push_back(Reply::Envelope(reply));
    }

    pub fn push_data(&self, data: Value) {
        self.push_response(Ok(Ok(data)));
    }

    pub fn push_error(&self, error: Value) {
        self.push_response(Ok(Err(error)));
    }

    /// Next call blocks until its signal is cancelled, then fails.
    pub fn push_until_cancelled(&self) {
        lock(&self.replies).push_back(Reply::UntilCancelled);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        lock(&self.calls).clone()
    }
}

#[async_trait]
impl HttpClient for RecordingClient {
    fn supports(&self, method: Method) -> bool {
        self.methods.as_ref().is_none_or(|m| m.contains(&method))
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        init: RequestInit,
    ) -> anyhow::Result<ResponseEnvelope> {
        let body = init.to_value();
        lock(&self.calls).push(RecordedCall {
            method,
            path: path.to_string(),
            init: body.clone(),
            signal: init.signal.clone(),
        });

        let reply = lock(&self.replies).pop_front();
        match reply {
            Some(Reply::Envelope(reply)) => reply,
            Some(Reply::UntilCancelled) => match init.signal {
                Some(signal) => {
                    signal.cancelled().await;
                    Err(anyhow::anyhow!("request aborted"))
                }
                None => Err(anyhow::anyhow!("no signal to wait on")),
            },
            None => Ok(Ok(json!({
                "method": method.as_upper(),
                "path": path,
                "init": body,
            }))),
        }
    }
}
