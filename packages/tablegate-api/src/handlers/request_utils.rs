//! Request utilities for HTTP endpoints.

use std::future::IntoFuture;

use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::{Body, Bytes};
use hyper::{HeaderMap, Request, Response};
use percent_encoding::percent_decode_str;
use tokio::time;

use crate::router::RouterError;
use tablegate_core::response::GatewayResponse;

/// Type alias for matchit parameters with explicit lifetimes
pub type MatchitParams<'a, 'b> = matchit::Params<'a, 'b>;

/// Reads the request body, bounded in time and size.
pub async fn read_request_body_with_timeout<B>(
    req: Request<B>,
    timeout_ms: u64,
    max_bytes: usize,
) -> Result<Bytes, RouterError>
where
    B: Body<Data = Bytes>,
    B::Error: std::error::Error + Send + Sync + 'static,
{
    let timeout_duration = time::Duration::from_millis(timeout_ms);
    let limited = Limited::new(req.into_body(), max_bytes);
    let body = time::timeout(timeout_duration, limited.collect())
        .await
        .map_err(|_| RouterError::Timeout)?
        .map_err(|e| {
            if e.downcast_ref::<LengthLimitError>().is_some() {
                RouterError::PayloadTooLarge(max_bytes)
            } else {
                RouterError::InternalError(format!("Failed to read request body: {}", e))
            }
        })?;
    Ok(body.to_bytes())
}

/// Waits for a worker result, bounded in time.
pub async fn wait_for_response_with_timeout<F, T, E>(
    worker: F,
    timeout_ms: u64,
) -> Result<T, RouterError>
where
    F: IntoFuture<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let timeout_duration = time::Duration::from_millis(timeout_ms);
    time::timeout(timeout_duration, worker)
        .await
        .map_err(|_| RouterError::Timeout)?
        .map_err(|e| RouterError::InternalError(format!("Worker failed: {}", e)))
}

/// Waits without a deadline for a worker that is already committing.
pub async fn wait_for_commit<F, T, E>(worker: F) -> Result<T, RouterError>
where
    F: IntoFuture<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    worker
        .await
        .map_err(|e| RouterError::InternalError(format!("Worker failed: {}", e)))
}

/// Percent-decodes a path parameter.
pub fn decode_param(params: &MatchitParams<'_, '_>, name: &str) -> Option<String> {
    params
        .get(name)
        .map(|raw| percent_decode_str(raw).decode_utf8_lossy().into_owned())
}

/// Copies headers with UTF-8 values.
pub fn collect_headers(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect()
}

/// Builds the HTTP response for a gateway result.
pub fn gateway_response(response: GatewayResponse) -> Result<Response<Bytes>, RouterError> {
    let body = serde_json::to_vec(&response.body).map_err(|e| {
        RouterError::InternalError(format!("Failed to serialize response: {}", e))
    })?;
    let mut builder = Response::builder()
        .status(response.status)
        .header("Content-Type", "application/json");
    for (name, value) in &response.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
        .body(Bytes::from(body))
        .map_err(|e| RouterError::InternalError(format!("Failed to build response: {}", e)))
}
