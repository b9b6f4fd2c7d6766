// Request execution
// Turns a (method, path, init) triple into one HTTP call and maps the
// response envelope onto the engine's success/failure channel. Retries,
// dedup and cancellation bookkeeping all belong to the engine.

use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::error::QueryError;
use crate::fetch::{DispatchTable, RequestInit};
use crate::method::Method;
use crate::nested::with_nested_value;

/// Page index handed out by the engine's pagination loop.
pub type PageParam = u64;

/// Dispatch one call and translate the envelope.
///
/// The signal is forwarded unchanged so that cancelling the query aborts the
/// in-flight request.
pub async fn execute(
    table: &DispatchTable,
    method: Method,
    path: &str,
    init: Option<&Value>,
    signal: Option<CancellationToken>,
) -> Result<Value, QueryError> {
    let handler = table.handler(method)?;
    let request = RequestInit::from_value(init, signal)?;

    debug!("Dispatching {} {}", method.as_upper(), path);
    trace!("Request init: {}", request.to_value());

    let envelope = handler(path.to_string(), request).await.map_err(|err| {
        debug!("{} {} failed before a response: {:#}", method.as_upper(), path, err);
        QueryError::transport(&err)
    })?;

    match envelope {
        Ok(data) => Ok(data),
        Err(error) => {
            debug!("{} {} returned an error payload", method.as_upper(), path);
            Err(QueryError::Api(error))
        }
    }
}

/// Init for one page fetch: a fresh copy of `init` with `page_param`
/// written at `page_accessor`. The caller's value is never touched.
pub fn page_init(
    init: Option<&Value>,
    page_accessor: Option<&str>,
    page_param: Option<PageParam>,
) -> Option<Value> {
    match (page_accessor, page_param) {
        (Some(accessor), Some(param)) => {
            let base = init.cloned().unwrap_or_else(|| json!({}));
            Some(with_nested_value(&base, accessor, json!(param)))
        }
        _ => init.cloned(),
    }
}

/// Paginated variant of [`execute`].
pub async fn execute_page(
    table: &DispatchTable,
    method: Method,
    path: &str,
    init: Option<&Value>,
    page_accessor: Option<&str>,
    page_param: Option<PageParam>,
    signal: Option<CancellationToken>,
) -> Result<Value, QueryError> {
    let init = page_init(init, page_accessor, page_param);
    if let (Some(accessor), Some(param)) = (page_accessor, page_param) {
        trace!("Injecting page {} at {}", param, accessor);
    }
    execute(table, method, path, init.as_ref(), signal).await
}
