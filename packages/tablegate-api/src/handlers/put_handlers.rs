//! PUT upsert endpoint.

use hyper::body::{Body, Bytes};
use hyper::{Request, Response};

use super::request_utils::{
    collect_headers, decode_param, gateway_response, read_request_body_with_timeout,
    wait_for_commit, wait_for_response_with_timeout, MatchitParams,
};
use crate::router::{AppState, RouterError};
use tablegate_core::policy::ROLE_CLAIM;
use tablegate_core::upsert::CancellationFlag;
use tablegate_core::PutRequest;

/// Handler for PUT /{entity}/{*pk}
pub async fn upsert_entity<B>(
    req: Request<B>,
    params: MatchitParams<'_, '_>,
    state: AppState,
) -> Result<Response<Bytes>, RouterError>
where
    B: Body<Data = Bytes>,
    B::Error: std::error::Error + Send + Sync + 'static,
{
    let entity = decode_param(&params, "entity")
        .ok_or_else(|| RouterError::InternalError("Missing entity parameter".to_string()))?;
    // Segments are decoded individually by the core router
    let primary_key_path = params.get("pk").unwrap_or_default().to_string();
    let query_string = req.uri().query().map(str::to_string);
    let headers = collect_headers(req.headers());

    let role = req
        .headers()
        .get(state.config.role_header.as_str())
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| state.config.default_role.clone());

    let body = read_request_body_with_timeout(
        req,
        state.config.request_timeout_ms,
        state.config.max_body_bytes,
    )
    .await?;

    let mut request = PutRequest {
        entity,
        primary_key_path,
        query_string,
        body: body.to_vec(),
        headers,
        ..Default::default()
    };
    request.claims.insert(ROLE_CLAIM.to_string(), role);

    tracing::debug!(
        "PUT {} {} (role {})",
        request.entity,
        request.primary_key_path,
        request.claims[ROLE_CLAIM]
    );

    // Cancels the worker if this future is dropped or times out
    let cancel = CancellationFlag::new();
    let guard = cancel.guard();
    let gateway = state.gateway.clone();
    let worker_cancel = cancel.clone();
    let entity = request.entity.clone();
    let mut worker =
        tokio::task::spawn_blocking(move || gateway.handle_put(&request, &worker_cancel));

    let response = match wait_for_response_with_timeout(&mut worker, state.config.response_timeout_ms).await {
        Ok(response) => response,
        Err(RouterError::Timeout) if !cancel.cancel() => {
            // Commit was already claimed, so the write lands; report it
            tracing::info!("PUT {} committed after the response timeout", entity);
            wait_for_commit(worker).await?
        }
        Err(e) => {
            tracing::warn!("PUT {} did not complete: {}", entity, e);
            return Err(e);
        }
    };
    guard.disarm();

    gateway_response(response)
}
