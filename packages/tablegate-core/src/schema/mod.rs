//! Entity metadata: columns, tables, views and the shared catalog.

mod catalog;
mod column;
mod entity;
pub mod file;

pub use catalog::{Catalog, CatalogSnapshot, SchemaCatalog};
pub use column::{CoercionError, ColumnDefault, ColumnSchema, ColumnType};
pub use entity::{EntityKind, EntitySchema};

use thiserror::Error;

/// Errors raised while building or loading the catalog.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CatalogError {
    #[error("Entity '{0}' is declared more than once")]
    DuplicateEntity(String),

    #[error("Column '{column}' is declared more than once in entity '{entity}'")]
    DuplicateColumn { entity: String, column: String },

    #[error("Column '{column}' not found in entity '{entity}'")]
    UnknownColumn { entity: String, column: String },

    #[error("Entity '{entity}' declares no primary key")]
    MissingPrimaryKey { entity: String },

    #[error("View '{view}' references unknown table '{table}'")]
    UnknownBaseTable { view: String, table: String },

    #[error("Invalid default for column '{column}' in entity '{entity}': {reason}")]
    InvalidDefault {
        entity: String,
        column: String,
        reason: String,
    },

    #[error("Invalid policy on entity '{entity}': {reason}")]
    InvalidPolicy { entity: String, reason: String },

    #[error("Invalid seed row for table '{table}': {reason}")]
    InvalidSeed { table: String, reason: String },

    #[error("Unsupported catalog version {0}")]
    UnsupportedVersion(u32),

    #[error("Failed to parse catalog: {0}")]
    Parse(String),

    #[error("I/O error: {0}")]
    Io(String),
}
