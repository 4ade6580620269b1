//! Column definitions and per-type value coercion.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Declared data type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    Boolean,
    Byte,
    Int16,
    Int32,
    Int64,
    Single,
    Double,
    Decimal,
    String,
}

/// Why a JSON value could not be coerced into a column type.
#[derive(Debug, Clone, PartialEq)]
pub enum CoercionError {
    /// A string literal that does not parse as the type
    Uncastable(String),
    /// A JSON kind or numeric range the type can never hold
    Mismatch,
}

impl ColumnType {
    /// Type name as shown in error messages.
    pub fn name(&self) -> &'static str {
        match self {
            ColumnType::Boolean => "Boolean",
            ColumnType::Byte => "Byte",
            ColumnType::Int16 => "Int16",
            ColumnType::Int32 => "Int32",
            ColumnType::Int64 => "Int64",
            ColumnType::Single => "Single",
            ColumnType::Double => "Double",
            ColumnType::Decimal => "Decimal",
            ColumnType::String => "String",
        }
    }

    fn int_range(&self) -> Option<(i64, i64)> {
        match self {
            ColumnType::Byte => Some((u8::MIN as i64, u8::MAX as i64)),
            ColumnType::Int16 => Some((i16::MIN as i64, i16::MAX as i64)),
            ColumnType::Int32 => Some((i32::MIN as i64, i32::MAX as i64)),
            ColumnType::Int64 => Some((i64::MIN, i64::MAX)),
            _ => None,
        }
    }

    fn is_float(&self) -> bool {
        matches!(
            self,
            ColumnType::Single | ColumnType::Double | ColumnType::Decimal
        )
    }

    /// Parses a raw text literal (URL segment or JSON string) into a value.
    ///
    /// Returns `None` when the literal does not represent this type.
    pub fn parse_literal(&self, raw: &str) -> Option<Value> {
        if let Some((min, max)) = self.int_range() {
            let parsed = raw.parse::<i64>().ok()?;
            return (min..=max).contains(&parsed).then_some(Value::Int(parsed));
        }
        if self.is_float() {
            let parsed = raw.parse::<f64>().ok()?;
            return parsed.is_finite().then_some(Value::Float(parsed));
        }
        match self {
            ColumnType::Boolean => {
                if raw.eq_ignore_ascii_case("true") {
                    Some(Value::Bool(true))
                } else if raw.eq_ignore_ascii_case("false") {
                    Some(Value::Bool(false))
                } else {
                    None
                }
            }
            _ => Some(Value::Text(raw.to_string())),
        }
    }

    /// Coerces a JSON body value into this type.
    ///
    /// JSON `null` maps to `Value::Null`; nullability is the caller's concern.
    pub fn coerce_json(&self, json: &serde_json::Value) -> Result<Value, CoercionError> {
        match json {
            serde_json::Value::Null => Ok(Value::Null),
            serde_json::Value::String(s) => {
                if *self == ColumnType::String {
                    return Ok(Value::Text(s.clone()));
                }
                self.parse_literal(s)
                    .ok_or_else(|| CoercionError::Uncastable(s.clone()))
            }
            serde_json::Value::Number(n) => {
                if let Some((min, max)) = self.int_range() {
                    let int = match n.as_i64() {
                        Some(i) => Some(i),
                        None => n
                            .as_f64()
                            .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                            .map(|f| f as i64),
                    };
                    return match int {
                        Some(i) if (min..=max).contains(&i) => Ok(Value::Int(i)),
                        _ => Err(CoercionError::Mismatch),
                    };
                }
                if self.is_float() {
                    return n.as_f64().map(Value::Float).ok_or(CoercionError::Mismatch);
                }
                Err(CoercionError::Mismatch)
            }
            serde_json::Value::Bool(b) if *self == ColumnType::Boolean => Ok(Value::Bool(*b)),
            _ => Err(CoercionError::Mismatch),
        }
    }

    /// Returns true when `value` can be stored in a column of this type.
    pub fn accepts(&self, value: &Value) -> bool {
        match value {
            Value::Null => true,
            Value::Int(i) => match self.int_range() {
                Some((min, max)) => (min..=max).contains(i),
                None => self.is_float(),
            },
            Value::Float(_) => self.is_float(),
            Value::Bool(_) => *self == ColumnType::Boolean,
            Value::Text(_) => *self == ColumnType::String,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Default applied when a column is absent from a full-replace body.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnDefault {
    /// The store owns the default; the column is left out of the statement.
    Store(Value),
    /// The catalog owns the default; the validator assigns it explicitly.
    Catalog(Value),
}

/// Column definition within an entity.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSchema {
    /// Backing column name
    pub name: String,
    /// Name exposed over REST (equals `name` unless remapped)
    pub exposed_name: String,
    /// Declared data type
    pub column_type: ColumnType,
    /// Whether NULL is allowed
    pub nullable: bool,
    /// Default when absent from the body
    pub default: Option<ColumnDefault>,
    /// Whether the store generates the value (identity/sequence)
    pub autogenerated: bool,
    /// Whether the column is part of the entity's primary key
    pub is_primary_key: bool,
    /// Owning base table for view columns
    pub source_table: Option<String>,
    /// Column name in the owning base table
    pub source_column: Option<String>,
}

impl ColumnSchema {
    /// Creates a non-nullable column with no default.
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        let name = name.into();
        Self {
            exposed_name: name.clone(),
            name,
            column_type,
            nullable: false,
            default: None,
            autogenerated: false,
            is_primary_key: false,
            source_table: None,
            source_column: None,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn autogenerated(mut self) -> Self {
        self.autogenerated = true;
        self
    }

    pub fn with_default(mut self, default: ColumnDefault) -> Self {
        self.default = Some(default);
        self
    }

    pub fn exposed_as(mut self, exposed_name: impl Into<String>) -> Self {
        self.exposed_name = exposed_name.into();
        self
    }

    /// Marks a view column as projected from `table.column`.
    pub fn from_source(mut self, table: impl Into<String>, column: impl Into<String>) -> Self {
        self.source_table = Some(table.into());
        self.source_column = Some(column.into());
        self
    }

    /// Returns true when the column has a store or catalog default.
    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }
}
