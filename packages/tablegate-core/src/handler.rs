//! PUT entry point.

use std::sync::Arc;

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::executor::MutationExecutor;
use crate::policy::{Claims, PolicyAction, PolicyResolver};
use crate::response::{compose_error, compose_inserted, compose_updated, GatewayResponse};
use crate::route::{parse_primary_key_route, split_segments};
use crate::schema::SchemaCatalog;
use crate::upsert::{CancellationFlag, Resolution, UpsertMachine, Upserter};
use crate::validation::validate_body;

/// A PUT request as seen by the gateway.
#[derive(Debug, Clone, Default)]
pub struct PutRequest {
    /// Entity name or REST path
    pub entity: String,
    /// Raw path after the entity, e.g. `book_id/1/id/568`
    pub primary_key_path: String,
    pub query_string: Option<String>,
    pub body: Vec<u8>,
    pub headers: Vec<(String, String)>,
    pub claims: Claims,
}

impl PutRequest {
    pub fn new(entity: impl Into<String>, primary_key_path: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            primary_key_path: primary_key_path.into(),
            ..Default::default()
        }
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query_string = Some(query.into());
        self
    }

    pub fn with_claim(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.claims.insert(name.into(), value.into());
        self
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// True for `If-Match: *`; any other value counts as absent.
    pub fn unconditional_match(&self) -> bool {
        self.header("If-Match").is_some_and(|v| v.trim() == "*")
    }
}

/// Schema-driven PUT handler over a catalog, policies and a store.
pub struct Gateway {
    catalog: Arc<dyn SchemaCatalog>,
    policies: Arc<dyn PolicyResolver>,
    executor: Arc<dyn MutationExecutor>,
    config: GatewayConfig,
}

impl Gateway {
    pub fn new(
        catalog: Arc<dyn SchemaCatalog>,
        policies: Arc<dyn PolicyResolver>,
        executor: Arc<dyn MutationExecutor>,
        config: GatewayConfig,
    ) -> Self {
        Self {
            catalog,
            policies,
            executor,
            config,
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Handles a PUT, always producing a response.
    pub fn handle_put(&self, request: &PutRequest, cancel: &CancellationFlag) -> GatewayResponse {
        match self.try_put(request, cancel) {
            Ok(response) => response,
            Err(e) => {
                if e.status_code() >= 500 {
                    tracing::error!("PUT {} failed: {}", request.entity, e);
                } else {
                    tracing::debug!("PUT {} rejected: {}", request.entity, e);
                }
                compose_error(&e, request.unconditional_match())
            }
        }
    }

    fn try_put(
        &self,
        request: &PutRequest,
        cancel: &CancellationFlag,
    ) -> Result<GatewayResponse, GatewayError> {
        if request.query_string.as_deref().is_some_and(|q| !q.is_empty()) {
            return Err(GatewayError::QueryStringNotAllowed);
        }

        let entity = self
            .catalog
            .get_schema(&request.entity)
            .ok_or_else(|| GatewayError::EntityNotRecognized {
                entity: request.entity.clone(),
            })?;

        let segments = split_segments(&request.primary_key_path);
        let route = parse_primary_key_route(&segments, &entity)?;

        let json: serde_json::Value =
            serde_json::from_slice(&request.body).map_err(|e| GatewayError::MalformedBody {
                detail: e.to_string(),
            })?;
        let body = validate_body(&entity, &json)?;

        let policy =
            self.policies
                .resolve_predicate(&entity, PolicyAction::Update, &request.claims);
        let mut machine = UpsertMachine::new(&entity, &route, &body, policy)?;
        if request.unconditional_match() {
            machine = machine.update_only();
        }

        let resolution = Upserter::new(self.executor.as_ref()).run(machine, cancel)?;
        match resolution {
            Resolution::Updated(outcome) => {
                tracing::info!("Upsert resolved on {}: updated", entity.name());
                Ok(compose_updated(&entity, &outcome))
            }
            Resolution::Inserted(outcome) => {
                tracing::info!("Upsert resolved on {}: inserted", entity.name());
                Ok(compose_inserted(&entity, &route, &outcome))
            }
            Resolution::NotFound => Err(GatewayError::EntityNotFound {
                entity: entity.name().to_string(),
                key: route.describe(&entity),
            }),
            Resolution::StoreFailed(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ntest::timeout;

    #[timeout(1000)]
    #[test]
    fn test_if_match_parsing() {
        let request = PutRequest::new("books", "id/1").with_header("if-match", " * ");
        assert!(request.unconditional_match());

        let request = PutRequest::new("books", "id/1").with_header("If-Match", "\"abc\"");
        assert!(!request.unconditional_match());

        assert!(!PutRequest::new("books", "id/1").unconditional_match());
    }
}
