//! Maps upsert results onto HTTP status, headers and JSON bodies.

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use serde::Serialize;

use crate::error::{GatewayError, SUB_STATUS_DATABASE_OPERATION_FAILED};
use crate::executor::MutationOutcome;
use crate::route::PrimaryKeyRoute;
use crate::schema::EntitySchema;

/// Message for a 412 when `If-Match: *` finds no row.
pub const PRECONDITION_FAILED_MESSAGE: &str = "No Update could be performed, record not found";

/// Characters escaped in Location key values.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'/')
    .add(b'%')
    .add(b'?')
    .add(b'#');

/// Success body wrapper.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    /// Always true for success responses
    pub success: bool,
    pub data: T,
}

/// Error details.
#[derive(Debug, Serialize)]
pub struct ApiError {
    /// Sub-status code
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Error body wrapper.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Always false for error responses
    pub success: bool,
    pub error: ApiError,
}

pub fn success_response<T: Serialize>(data: T) -> ApiResponse<T> {
    ApiResponse {
        success: true,
        data,
    }
}

pub fn error_response(code: &str, message: String, details: Option<String>) -> ErrorResponse {
    ErrorResponse {
        success: false,
        error: ApiError {
            code: code.to_string(),
            message,
            details,
        },
    }
}

/// Transport-neutral response produced by the gateway.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: serde_json::Value,
}

impl GatewayResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Error message from an error body.
    pub fn error_message(&self) -> Option<&str> {
        self.body.pointer("/error/message").and_then(|m| m.as_str())
    }

    /// Sub-status code from an error body.
    pub fn error_code(&self) -> Option<&str> {
        self.body.pointer("/error/code").and_then(|m| m.as_str())
    }

    /// `data` object of a success body.
    pub fn data(&self) -> Option<&serde_json::Value> {
        self.body.get("data")
    }
}

fn to_body<T: Serialize>(payload: &T) -> serde_json::Value {
    serde_json::to_value(payload).unwrap_or(serde_json::Value::Null)
}

/// Projects the returned row onto the entity's exposed names.
pub fn project_row(entity: &EntitySchema, outcome: &MutationOutcome) -> serde_json::Value {
    let mut object = serde_json::Map::new();
    if let Some(row) = &outcome.returned {
        for column in entity.columns() {
            if let Some(value) = row.get(entity.physical_column(column)) {
                object.insert(column.exposed_name.clone(), value.to_json());
            }
        }
    }
    serde_json::Value::Object(object)
}

/// `col1/val1/col2/val2` in schema key order, taking values from the
/// committed row and falling back to the route.
pub fn location(entity: &EntitySchema, route: &PrimaryKeyRoute, outcome: &MutationOutcome) -> String {
    entity
        .primary_key_columns()
        .filter_map(|column| {
            let value = outcome
                .returned
                .as_ref()
                .and_then(|row| row.get(entity.physical_column(column)))
                .or_else(|| outcome.generated_values.get(entity.physical_column(column)))
                .or_else(|| route.get(&column.name))?;
            Some(format!(
                "{}/{}",
                utf8_percent_encode(&column.exposed_name, SEGMENT),
                utf8_percent_encode(&value.to_string(), SEGMENT)
            ))
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// 200 with the updated row.
pub fn compose_updated(entity: &EntitySchema, outcome: &MutationOutcome) -> GatewayResponse {
    GatewayResponse {
        status: 200,
        headers: Vec::new(),
        body: to_body(&success_response(project_row(entity, outcome))),
    }
}

/// 201 with the inserted row and its Location.
pub fn compose_inserted(
    entity: &EntitySchema,
    route: &PrimaryKeyRoute,
    outcome: &MutationOutcome,
) -> GatewayResponse {
    GatewayResponse {
        status: 201,
        headers: vec![("Location".to_string(), location(entity, route, outcome))],
        body: to_body(&success_response(project_row(entity, outcome))),
    }
}

/// Error response. With `If-Match: *`, a missing row is a 412.
pub fn compose_error(error: &GatewayError, unconditional_match: bool) -> GatewayResponse {
    let (status, code, message) = match error {
        GatewayError::EntityNotFound { .. } if unconditional_match => (
            412,
            SUB_STATUS_DATABASE_OPERATION_FAILED,
            PRECONDITION_FAILED_MESSAGE.to_string(),
        ),
        e => (e.status_code(), e.sub_status(), e.to_string()),
    };
    GatewayResponse {
        status,
        headers: Vec::new(),
        body: to_body(&error_response(code, message, None)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::{parse_primary_key_route, split_segments};
    use crate::schema::{ColumnSchema, ColumnType};
    use crate::value::Value;
    use ntest::timeout;
    use serde_json::json;
    use std::collections::HashMap;

    fn trees() -> EntitySchema {
        EntitySchema::table(
            "trees",
            vec![
                ColumnSchema::new("treeId", ColumnType::Int32),
                ColumnSchema::new("species", ColumnType::String).exposed_as("Scientific Name"),
                ColumnSchema::new("region", ColumnType::String).nullable(),
            ],
            vec!["treeId".to_string()],
        )
        .unwrap()
    }

    fn outcome(insert: bool) -> MutationOutcome {
        MutationOutcome {
            rows_affected: 1,
            returned: Some(HashMap::from([
                ("treeId".to_string(), Value::Int(1)),
                ("species".to_string(), Value::Text("Quercus".to_string())),
                ("region".to_string(), Value::Null),
            ])),
            generated_values: HashMap::new(),
            executed_as_insert: insert,
        }
    }

    #[timeout(1000)]
    #[test]
    fn test_updated_body_uses_exposed_names() {
        let response = compose_updated(&trees(), &outcome(false));
        assert_eq!(response.status, 200);
        assert!(response.header("Location").is_none());
        assert_eq!(
            response.body,
            json!({"success": true, "data": {"treeId": 1, "Scientific Name": "Quercus", "region": null}})
        );
    }

    #[timeout(1000)]
    #[test]
    fn test_inserted_carries_location() {
        let entity = trees();
        let route = parse_primary_key_route(&split_segments("treeId/1"), &entity).unwrap();
        let response = compose_inserted(&entity, &route, &outcome(true));
        assert_eq!(response.status, 201);
        assert_eq!(response.header("location"), Some("treeId/1"));
    }

    #[timeout(1000)]
    #[test]
    fn test_not_found_maps_to_412_with_if_match() {
        let error = GatewayError::EntityNotFound {
            entity: "trees".to_string(),
            key: "treeId: 9".to_string(),
        };
        let response = compose_error(&error, false);
        assert_eq!(response.status, 404);
        assert_eq!(response.error_code(), Some("EntityNotFound"));
        assert_eq!(
            response.error_message(),
            Some("Cannot perform INSERT and could not find trees with primary key <treeId: 9> to perform UPDATE on.")
        );

        let response = compose_error(&error, true);
        assert_eq!(response.status, 412);
        assert_eq!(response.error_message(), Some(PRECONDITION_FAILED_MESSAGE));

        // Other errors ignore the header
        let response = compose_error(&GatewayError::RouteMissing, true);
        assert_eq!(response.status, 400);
        assert_eq!(response.error_code(), Some("BadRequest"));
    }

    #[timeout(1000)]
    #[test]
    fn test_location_escapes_values() {
        let entity = EntitySchema::table(
            "notes",
            vec![ColumnSchema::new("title", ColumnType::String)],
            vec!["title".to_string()],
        )
        .unwrap();
        let route = parse_primary_key_route(&split_segments("title/a%2Fb"), &entity).unwrap();
        let empty = MutationOutcome::default();
        assert_eq!(location(&entity, &route, &empty), "title/a%2Fb");
    }
}
