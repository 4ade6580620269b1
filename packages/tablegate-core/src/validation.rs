//! Request body validation.
//!
//! A PUT body is a full row image. Validation turns it into typed column
//! assignments shared by the UPDATE and INSERT statements:
//! - absent nullable columns are assigned NULL
//! - absent columns with a catalog default are assigned that default
//! - absent autogenerated columns are left to the store
//! - absent store-defaulted columns are filled by the store on INSERT and
//!   set to NULL on UPDATE
//! - any other absent non-key column is an error
//!
//! Checks run in a fixed order (unknown fields by name, view ownership,
//! then columns in schema order) so permuting the JSON object never
//! changes which error is reported.

use std::collections::BTreeMap;

use crate::error::GatewayError;
use crate::plan::FieldAssignment;
use crate::schema::{CoercionError, ColumnDefault, ColumnSchema, EntityKind, EntitySchema};
use crate::value::Value;

/// Validated full-replace row image.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidatedBody {
    /// Non-key assignments by backing column name, in schema order
    assignments: Vec<FieldAssignment>,
    /// Backing names of absent columns with a store default
    store_defaulted: Vec<String>,
    /// Key columns the body also supplied
    supplied_keys: Vec<FieldAssignment>,
}

impl ValidatedBody {
    pub fn assignments(&self) -> &[FieldAssignment] {
        &self.assignments
    }

    pub fn store_defaulted(&self) -> &[String] {
        &self.store_defaulted
    }

    pub fn supplied_keys(&self) -> &[FieldAssignment] {
        &self.supplied_keys
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// Validates a JSON body against `entity`.
pub fn validate_body(
    entity: &EntitySchema,
    body: &serde_json::Value,
) -> Result<ValidatedBody, GatewayError> {
    let object = body.as_object().ok_or_else(|| GatewayError::MalformedBody {
        detail: format!("found {}", json_kind(body)),
    })?;
    let fields: BTreeMap<&str, &serde_json::Value> =
        object.iter().map(|(k, v)| (k.as_str(), v)).collect();

    if let Some(field) = fields
        .keys()
        .find(|field| entity.column_by_exposed(field).is_none())
    {
        return Err(GatewayError::UnknownField {
            field: field.to_string(),
        });
    }

    if entity.kind() == EntityKind::View {
        for field in fields.keys() {
            let column = entity.column_by_exposed(field);
            if !column.is_some_and(|c| writes_base_table(entity, c)) {
                return Err(GatewayError::ViewMultiTableUpdate {
                    view: entity.name().to_string(),
                    field: field.to_string(),
                });
            }
        }
    }

    let mut validated = ValidatedBody::default();
    for column in entity.columns() {
        if !writes_base_table(entity, column) {
            continue;
        }
        match fields.get(column.exposed_name.as_str()) {
            Some(json) => {
                let value = coerce_field(column, json)?;
                let assignment = FieldAssignment::new(column.name.clone(), value);
                if column.is_primary_key {
                    validated.supplied_keys.push(assignment);
                } else {
                    validated.assignments.push(assignment);
                }
            }
            None => absent_field(column, &mut validated)?,
        }
    }

    Ok(validated)
}

/// Whether a write to `column` lands on the entity's base table.
fn writes_base_table(entity: &EntitySchema, column: &ColumnSchema) -> bool {
    match entity.kind() {
        EntityKind::Table => true,
        EntityKind::View => match entity.base_table() {
            Some(base) => entity.owning_table(&column.name) == Some(base),
            None => false,
        },
    }
}

fn coerce_field(column: &ColumnSchema, json: &serde_json::Value) -> Result<Value, GatewayError> {
    if column.autogenerated && !column.is_primary_key {
        return Err(GatewayError::AutogeneratedFieldSupplied {
            field: column.exposed_name.clone(),
        });
    }
    if json.is_null() && !column.nullable {
        return Err(GatewayError::InvalidNullValue {
            field: column.exposed_name.clone(),
        });
    }
    column.column_type.coerce_json(json).map_err(|e| match e {
        CoercionError::Uncastable(raw) => GatewayError::UncastableValue {
            value: raw,
            column: column.exposed_name.clone(),
            type_name: column.column_type.name().to_string(),
        },
        CoercionError::Mismatch => GatewayError::InvalidValue {
            field: column.exposed_name.clone(),
            expected: column.column_type.name().to_string(),
        },
    })
}

fn absent_field(column: &ColumnSchema, validated: &mut ValidatedBody) -> Result<(), GatewayError> {
    if column.is_primary_key {
        // Key values come from the route
        return Ok(());
    }
    if column.autogenerated {
        return Ok(());
    }
    match &column.default {
        Some(ColumnDefault::Store(_)) => {
            validated.store_defaulted.push(column.name.clone());
        }
        Some(ColumnDefault::Catalog(value)) => {
            validated
                .assignments
                .push(FieldAssignment::new(column.name.clone(), value.clone()));
        }
        None if column.nullable => {
            validated
                .assignments
                .push(FieldAssignment::new(column.name.clone(), Value::Null));
        }
        None => {
            return Err(GatewayError::MissingField {
                field: column.exposed_name.clone(),
            })
        }
    }
    Ok(())
}
