//! Entity (table or view) schema with precomputed lookups.

use std::collections::{HashMap, HashSet};

use super::column::ColumnSchema;
use super::CatalogError;

/// Whether an entity is backed by a table or a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Table,
    View,
}

/// Immutable per-entity metadata shared across requests.
#[derive(Debug, Clone)]
pub struct EntitySchema {
    name: String,
    rest_path: Option<String>,
    kind: EntityKind,
    columns: Vec<ColumnSchema>,
    /// Primary key column names (backing names) in declared order
    primary_key: Vec<String>,
    base_table: Option<String>,
    by_exposed: HashMap<String, usize>,
    by_name: HashMap<String, usize>,
    /// Owning base table per column index
    owners: Vec<Option<String>>,
}

impl EntitySchema {
    /// Builds a table entity.
    pub fn table(
        name: impl Into<String>,
        columns: Vec<ColumnSchema>,
        primary_key: Vec<String>,
    ) -> Result<Self, CatalogError> {
        Self::build(name.into(), EntityKind::Table, columns, primary_key, None)
    }

    /// Builds a view entity. `base_table` is the single table writes may
    /// target; `None` makes the view read-only for PUT.
    pub fn view(
        name: impl Into<String>,
        base_table: Option<String>,
        columns: Vec<ColumnSchema>,
        primary_key: Vec<String>,
    ) -> Result<Self, CatalogError> {
        Self::build(name.into(), EntityKind::View, columns, primary_key, base_table)
    }

    fn build(
        name: String,
        kind: EntityKind,
        mut columns: Vec<ColumnSchema>,
        primary_key: Vec<String>,
        base_table: Option<String>,
    ) -> Result<Self, CatalogError> {
        let mut by_exposed = HashMap::with_capacity(columns.len());
        let mut by_name = HashMap::with_capacity(columns.len());
        for (index, column) in columns.iter().enumerate() {
            if by_name.insert(column.name.clone(), index).is_some()
                || by_exposed.insert(column.exposed_name.clone(), index).is_some()
            {
                return Err(CatalogError::DuplicateColumn {
                    entity: name,
                    column: column.name.clone(),
                });
            }
        }

        if primary_key.is_empty() {
            return Err(CatalogError::MissingPrimaryKey { entity: name });
        }
        let mut seen = HashSet::new();
        for key in &primary_key {
            let index = by_name.get(key).copied().ok_or_else(|| CatalogError::UnknownColumn {
                entity: name.clone(),
                column: key.clone(),
            })?;
            if !seen.insert(key.as_str()) {
                return Err(CatalogError::DuplicateColumn {
                    entity: name.clone(),
                    column: key.clone(),
                });
            }
            columns[index].is_primary_key = true;
        }

        let owners = columns
            .iter()
            .map(|column| match kind {
                EntityKind::Table => Some(name.clone()),
                EntityKind::View => column.source_table.clone(),
            })
            .collect();

        Ok(Self {
            name,
            rest_path: None,
            kind,
            columns,
            primary_key,
            base_table,
            by_exposed,
            by_name,
            owners,
        })
    }

    /// Sets the REST path alias.
    pub fn with_rest_path(mut self, rest_path: impl Into<String>) -> Self {
        self.rest_path = Some(rest_path.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rest_path(&self) -> Option<&str> {
        self.rest_path.as_deref()
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn columns(&self) -> &[ColumnSchema] {
        &self.columns
    }

    pub fn base_table(&self) -> Option<&str> {
        self.base_table.as_deref()
    }

    /// Primary key column names in declared order.
    pub fn primary_key(&self) -> &[String] {
        &self.primary_key
    }

    /// Primary key columns in declared order.
    pub fn primary_key_columns(&self) -> impl Iterator<Item = &ColumnSchema> + '_ {
        self.primary_key
            .iter()
            .filter_map(move |key| self.column(key))
    }

    /// Looks up a column by backing name.
    pub fn column(&self, name: &str) -> Option<&ColumnSchema> {
        self.by_name.get(name).map(|&i| &self.columns[i])
    }

    /// Looks up a column by exposed (REST) name.
    pub fn column_by_exposed(&self, exposed_name: &str) -> Option<&ColumnSchema> {
        self.by_exposed.get(exposed_name).map(|&i| &self.columns[i])
    }

    /// Returns true when any primary key column is store-generated. Such
    /// keys are never client-supplied, so a PUT on them can only update.
    pub fn has_autogenerated_key(&self) -> bool {
        self.primary_key_columns().any(|c| c.autogenerated)
    }

    /// Base table that owns the column, if any.
    pub fn owning_table(&self, name: &str) -> Option<&str> {
        self.by_name
            .get(name)
            .and_then(|&i| self.owners[i].as_deref())
    }

    /// Table a mutation on this entity physically targets.
    pub fn physical_table(&self) -> &str {
        match self.kind {
            EntityKind::Table => &self.name,
            EntityKind::View => self.base_table.as_deref().unwrap_or(&self.name),
        }
    }

    /// Column name in the physical table.
    pub fn physical_column<'a>(&'a self, column: &'a ColumnSchema) -> &'a str {
        match self.kind {
            EntityKind::Table => &column.name,
            EntityKind::View => column.source_column.as_deref().unwrap_or(&column.name),
        }
    }
}
