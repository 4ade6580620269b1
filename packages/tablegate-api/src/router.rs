//! Matchit routing configuration.

use std::sync::Arc;

use hyper::body::{Body, Bytes};
use hyper::{Method, Request, Response};
use matchit::Router as MatchitRouter;

use crate::handlers;
use tablegate_core::config::GatewayConfig;
use tablegate_core::response::error_response;
use tablegate_core::Gateway;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<Gateway>,
    pub config: Arc<GatewayConfig>,
}

/// HTTP request router.
pub struct Router {
    inner: MatchitRouter<RouteHandler>,
    state: AppState,
}

impl Router {
    /// Creates a router serving entity routes under the configured base path.
    pub fn new(gateway: Arc<Gateway>) -> Self {
        let config = Arc::new(gateway.config().clone());
        let base = config.normalized_base_path();
        let mut router = MatchitRouter::new();

        router
            .insert(format!("{}/{{entity}}", base), RouteHandler::Entity)
            .expect("Failed to insert entity route");
        router
            .insert(format!("{}/{{entity}}/{{*pk}}", base), RouteHandler::Entity)
            .expect("Failed to insert entity primary key route");

        Self {
            inner: router,
            state: AppState { gateway, config },
        }
    }

    /// Routes an incoming request to the appropriate handler.
    pub async fn route<B>(&self, req: Request<B>) -> Result<Response<Bytes>, RouterError>
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: std::error::Error + Send + Sync + 'static,
    {
        let path = req.uri().path().to_string();

        match self.inner.at(&path) {
            Ok(matched) => {
                matched
                    .value
                    .handle(req, matched.params, self.state.clone())
                    .await
            }
            Err(_) => Err(RouterError::NotFound(format!("No route found for {}", path))),
        }
    }
}

/// Route handler type.
#[derive(Debug, Clone, Copy)]
enum RouteHandler {
    Entity,
}

impl RouteHandler {
    async fn handle<B>(
        &self,
        req: Request<B>,
        params: matchit::Params<'_, '_>,
        state: AppState,
    ) -> Result<Response<Bytes>, RouterError>
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: std::error::Error + Send + Sync + 'static,
    {
        match self {
            RouteHandler::Entity => {
                if req.method() == Method::PUT {
                    handlers::upsert_entity(req, params, state).await
                } else {
                    Err(RouterError::MethodNotAllowed)
                }
            }
        }
    }
}

/// Router error type.
#[derive(Debug)]
pub enum RouterError {
    MethodNotAllowed,
    InternalError(String),
    Timeout,
    PayloadTooLarge(usize),
    NotFound(String),
}

impl RouterError {
    fn status_and_code(&self) -> (u16, &'static str) {
        match self {
            RouterError::MethodNotAllowed => (405, "MethodNotAllowed"),
            RouterError::InternalError(_) => (500, "UnexpectedError"),
            RouterError::Timeout => (408, "RequestTimeout"),
            RouterError::PayloadTooLarge(_) => (413, "BadRequest"),
            RouterError::NotFound(_) => (404, "NotFound"),
        }
    }
}

impl std::fmt::Display for RouterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RouterError::MethodNotAllowed => write!(f, "Method Not Allowed"),
            RouterError::InternalError(msg) => write!(f, "Internal Error: {}", msg),
            RouterError::Timeout => write!(f, "Request Timeout"),
            RouterError::PayloadTooLarge(limit) => {
                write!(f, "Request body exceeds {} bytes", limit)
            }
            RouterError::NotFound(msg) => write!(f, "Not Found: {}", msg),
        }
    }
}

impl std::error::Error for RouterError {}

impl From<RouterError> for Response<Bytes> {
    fn from(err: RouterError) -> Self {
        let (status, code) = err.status_and_code();
        let error_response = error_response(code, err.to_string(), None);
        let body = serde_json::to_vec(&error_response).unwrap_or_else(|e| {
            format!(
                "{{\"success\":false,\"error\":{{\"code\":\"UnexpectedError\",\"message\":\"Failed to serialize error: {}\"}}}}",
                e
            )
            .into_bytes()
        });

        Response::builder()
            .status(status)
            .header("Content-Type", "application/json")
            .body(Bytes::from(body))
            .unwrap_or_else(|_| {
                let mut response = Response::new(Bytes::from("Internal Server Error"));
                *response.status_mut() = hyper::StatusCode::INTERNAL_SERVER_ERROR;
                response
            })
    }
}
