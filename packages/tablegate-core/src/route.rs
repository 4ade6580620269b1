//! Primary-key routing.
//!
//! A PUT addresses its row through alternating `column/value` path segments,
//! e.g. `book_id/1/id/568`. The segments must name exactly the entity's
//! primary key columns, in any order.

use std::collections::HashMap;

use percent_encoding::percent_decode_str;

use crate::error::GatewayError;
use crate::policy::Predicate;
use crate::schema::EntitySchema;
use crate::value::Value;

/// Typed primary key values in schema-declared key order.
#[derive(Debug, Clone, PartialEq)]
pub struct PrimaryKeyRoute {
    /// (backing column name, value)
    values: Vec<(String, Value)>,
}

impl PrimaryKeyRoute {
    pub fn values(&self) -> &[(String, Value)] {
        &self.values
    }

    /// Route value for a backing column name.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// Equality predicate over every key column, using physical names.
    pub fn predicate(&self, entity: &EntitySchema) -> Predicate {
        let mut terms = self.values.iter().filter_map(|(name, value)| {
            let column = entity.column(name)?;
            Some(Predicate::column_eq(
                entity.physical_column(column),
                value.clone(),
            ))
        });
        let first = terms.next().unwrap_or(Predicate::Const(false));
        terms.fold(first, Predicate::and)
    }

    /// Renders `k1: v1, k2: v2` with exposed names, for error messages.
    pub fn describe(&self, entity: &EntitySchema) -> String {
        self.values
            .iter()
            .map(|(name, value)| {
                let exposed = entity
                    .column(name)
                    .map(|c| c.exposed_name.as_str())
                    .unwrap_or(name);
                format!("{}: {}", exposed, value)
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Splits a raw path tail into percent-decoded segments, ignoring empty
/// segments (leading, trailing or doubled slashes).
pub fn split_segments(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| percent_decode_str(segment).decode_utf8_lossy().into_owned())
        .collect()
}

/// Parses `column/value` segments into a typed key for `entity`.
///
/// Column names are matched against exposed names.
pub fn parse_primary_key_route(
    segments: &[String],
    entity: &EntitySchema,
) -> Result<PrimaryKeyRoute, GatewayError> {
    if segments.is_empty() {
        return Err(GatewayError::RouteMissing);
    }
    if segments.len() % 2 != 0 || segments.len() / 2 != entity.primary_key().len() {
        return Err(GatewayError::RouteMismatch);
    }

    let mut raw: HashMap<&str, &str> = HashMap::with_capacity(segments.len() / 2);
    for pair in segments.chunks_exact(2) {
        let column = entity
            .column_by_exposed(&pair[0])
            .filter(|c| c.is_primary_key)
            .ok_or(GatewayError::RouteMismatch)?;
        if raw.insert(column.name.as_str(), pair[1].as_str()).is_some() {
            return Err(GatewayError::RouteMismatch);
        }
    }

    let mut values = Vec::with_capacity(raw.len());
    for column in entity.primary_key_columns() {
        let literal = raw
            .get(column.name.as_str())
            .ok_or(GatewayError::RouteMismatch)?;
        let value = column.column_type.parse_literal(literal).ok_or_else(|| {
            GatewayError::UncastableValue {
                value: literal.to_string(),
                column: column.exposed_name.clone(),
                type_name: column.column_type.name().to_string(),
            }
        })?;
        values.push((column.name.clone(), value));
    }

    Ok(PrimaryKeyRoute { values })
}
