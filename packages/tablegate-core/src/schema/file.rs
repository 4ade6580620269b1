//! Catalog file format and loading.
//!
//! The catalog is a JSON document describing entities, row-level policies
//! and optional seed rows:
//!
//! ```json
//! {
//!   "version": 1,
//!   "entities": [
//!     {
//!       "name": "books",
//!       "rest_path": "Book",
//!       "primary_key": ["id"],
//!       "columns": [
//!         {"name": "id", "type": "Int32", "autogenerated": true},
//!         {"name": "title", "type": "String"},
//!         {"name": "publisher_id", "type": "Int32"}
//!       ]
//!     }
//!   ],
//!   "policies": [
//!     {"entity": "books", "role": "editor", "action": "update", "expression": "@item.id ne 1234"}
//!   ],
//!   "seed": {"books": [{"id": 1, "title": "Awesome book", "publisher_id": 1234}]}
//! }
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{
    CatalogError, CatalogSnapshot, CoercionError, ColumnDefault, ColumnSchema, ColumnType,
    EntityKind, EntitySchema,
};
use crate::policy::{CatalogPolicyResolver, PolicyAction, PolicyExpression};

/// Supported catalog file version.
pub const CATALOG_VERSION: u32 = 1;

/// Seed rows keyed by table, each row keyed by backing column name.
pub type SeedRows = HashMap<String, Vec<serde_json::Map<String, serde_json::Value>>>;

/// Catalog file root.
#[derive(Debug, Serialize, Deserialize)]
pub struct CatalogFile {
    /// Format version
    pub version: u32,
    /// Tables and views
    #[serde(default)]
    pub entities: Vec<EntityDefinition>,
    /// Row-level policies
    #[serde(default)]
    pub policies: Vec<PolicyDefinition>,
    /// Initial rows per table
    #[serde(default)]
    pub seed: SeedRows,
}

/// Entity kind in the file.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKindDefinition {
    #[default]
    Table,
    View,
}

/// Entity definition.
#[derive(Debug, Serialize, Deserialize)]
pub struct EntityDefinition {
    pub name: String,
    #[serde(default)]
    pub kind: EntityKindDefinition,
    #[serde(default)]
    pub rest_path: Option<String>,
    /// Single table a view writes through to
    #[serde(default)]
    pub base_table: Option<String>,
    pub primary_key: Vec<String>,
    pub columns: Vec<ColumnDefinition>,
}

/// Column definition.
#[derive(Debug, Serialize, Deserialize)]
pub struct ColumnDefinition {
    pub name: String,
    /// Exposed REST name
    #[serde(default)]
    pub alias: Option<String>,
    pub r#type: ColumnType,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub autogenerated: bool,
    #[serde(default)]
    pub default: Option<DefaultDefinition>,
    /// Owning table and column for view columns
    #[serde(default)]
    pub source: Option<SourceDefinition>,
}

/// Column default and the layer that owns it.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefaultDefinition {
    Store(serde_json::Value),
    Catalog(serde_json::Value),
}

/// View column origin.
#[derive(Debug, Serialize, Deserialize)]
pub struct SourceDefinition {
    pub table: String,
    pub column: String,
}

/// Policy definition.
#[derive(Debug, Serialize, Deserialize)]
pub struct PolicyDefinition {
    pub entity: String,
    pub role: String,
    pub action: PolicyAction,
    pub expression: String,
}

/// Result of loading a catalog file.
#[derive(Debug)]
pub struct LoadedCatalog {
    pub snapshot: CatalogSnapshot,
    pub policies: CatalogPolicyResolver,
    pub seed: SeedRows,
}

/// Reads and validates a catalog file.
pub fn load_catalog_file(path: &Path) -> Result<LoadedCatalog, CatalogError> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| CatalogError::Io(format!("{}: {}", path.display(), e)))?;
    parse_catalog(&contents)
}

/// Parses and validates a catalog document.
pub fn parse_catalog(contents: &str) -> Result<LoadedCatalog, CatalogError> {
    let file: CatalogFile =
        serde_json::from_str(contents).map_err(|e| CatalogError::Parse(e.to_string()))?;
    file.into_catalog()
}

impl CatalogFile {
    /// Validates the file and builds the catalog, policies and seed set.
    pub fn into_catalog(self) -> Result<LoadedCatalog, CatalogError> {
        if self.version != CATALOG_VERSION {
            return Err(CatalogError::UnsupportedVersion(self.version));
        }

        let mut entities = Vec::with_capacity(self.entities.len());
        for definition in self.entities {
            entities.push(build_entity(definition)?);
        }
        validate_views(&entities)?;

        let by_name: HashMap<&str, &EntitySchema> =
            entities.iter().map(|e| (e.name(), e)).collect();

        let mut policies = CatalogPolicyResolver::new();
        for policy in self.policies {
            let entity = by_name
                .get(policy.entity.as_str())
                .ok_or_else(|| CatalogError::InvalidPolicy {
                    entity: policy.entity.clone(),
                    reason: "unknown entity".to_string(),
                })?;
            let expression =
                PolicyExpression::parse(&policy.expression).map_err(|e| {
                    CatalogError::InvalidPolicy {
                        entity: policy.entity.clone(),
                        reason: e.to_string(),
                    }
                })?;
            if let Some(field) = expression.unknown_field(entity) {
                return Err(CatalogError::InvalidPolicy {
                    entity: policy.entity.clone(),
                    reason: format!("unknown field '{}'", field),
                });
            }
            policies.add_rule(policy.entity, policy.role, policy.action, expression);
        }

        for (table, rows) in &self.seed {
            let entity = by_name
                .get(table.as_str())
                .filter(|e| e.kind() == EntityKind::Table)
                .ok_or_else(|| CatalogError::InvalidSeed {
                    table: table.clone(),
                    reason: "unknown table".to_string(),
                })?;
            for row in rows {
                if let Some(column) = row.keys().find(|k| entity.column(k).is_none()) {
                    return Err(CatalogError::InvalidSeed {
                        table: table.clone(),
                        reason: format!("unknown column '{}'", column),
                    });
                }
            }
        }

        let snapshot = CatalogSnapshot::new(entities)?;
        tracing::info!(
            "Loaded catalog with {} entities and {} policies",
            snapshot.len(),
            policies.len()
        );

        Ok(LoadedCatalog {
            snapshot,
            policies,
            seed: self.seed,
        })
    }
}

fn build_entity(definition: EntityDefinition) -> Result<EntitySchema, CatalogError> {
    let mut columns = Vec::with_capacity(definition.columns.len());
    for column_def in definition.columns {
        let mut column = ColumnSchema::new(column_def.name, column_def.r#type);
        column.nullable = column_def.nullable;
        column.autogenerated = column_def.autogenerated;
        if let Some(alias) = column_def.alias {
            column.exposed_name = alias;
        }
        if let Some(source) = column_def.source {
            column = column.from_source(source.table, source.column);
        }
        if let Some(default) = column_def.default {
            column.default = Some(build_default(&definition.name, &column, default)?);
        }
        columns.push(column);
    }

    let entity = match definition.kind {
        EntityKindDefinition::Table => {
            EntitySchema::table(definition.name, columns, definition.primary_key)?
        }
        EntityKindDefinition::View => EntitySchema::view(
            definition.name,
            definition.base_table,
            columns,
            definition.primary_key,
        )?,
    };
    Ok(match definition.rest_path {
        Some(path) => entity.with_rest_path(path),
        None => entity,
    })
}

fn build_default(
    entity: &str,
    column: &ColumnSchema,
    default: DefaultDefinition,
) -> Result<ColumnDefault, CatalogError> {
    let invalid = |reason: String| CatalogError::InvalidDefault {
        entity: entity.to_string(),
        column: column.name.clone(),
        reason,
    };
    let (json, is_store) = match &default {
        DefaultDefinition::Store(json) => (json, true),
        DefaultDefinition::Catalog(json) => (json, false),
    };
    let value = column.column_type.coerce_json(json).map_err(|e| match e {
        CoercionError::Uncastable(raw) => invalid(format!(
            "'{}' is not a {}",
            raw,
            column.column_type.name()
        )),
        CoercionError::Mismatch => invalid(format!("expected {}", column.column_type.name())),
    })?;
    if value.is_null() && !column.nullable {
        return Err(invalid("NULL default on non-nullable column".to_string()));
    }
    Ok(if is_store {
        ColumnDefault::Store(value)
    } else {
        ColumnDefault::Catalog(value)
    })
}

fn validate_views(entities: &[EntitySchema]) -> Result<(), CatalogError> {
    let tables: HashMap<&str, &EntitySchema> = entities
        .iter()
        .filter(|e| e.kind() == EntityKind::Table)
        .map(|e| (e.name(), e))
        .collect();

    for view in entities.iter().filter(|e| e.kind() == EntityKind::View) {
        if let Some(base) = view.base_table() {
            if !tables.contains_key(base) {
                return Err(CatalogError::UnknownBaseTable {
                    view: view.name().to_string(),
                    table: base.to_string(),
                });
            }
            // Key predicates run against the base table
            if let Some(key) = view
                .primary_key_columns()
                .find(|c| view.owning_table(&c.name) != Some(base))
            {
                return Err(CatalogError::UnknownColumn {
                    entity: base.to_string(),
                    column: key.name.clone(),
                });
            }
        }
        for column in view.columns() {
            let (Some(table), Some(source_column)) = (&column.source_table, &column.source_column)
            else {
                continue;
            };
            let owner = tables
                .get(table.as_str())
                .ok_or_else(|| CatalogError::UnknownBaseTable {
                    view: view.name().to_string(),
                    table: table.clone(),
                })?;
            if owner.column(source_column).is_none() {
                return Err(CatalogError::UnknownColumn {
                    entity: table.clone(),
                    column: source_column.clone(),
                });
            }
        }
    }
    Ok(())
}
