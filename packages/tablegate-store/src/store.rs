//! Store handle and read helpers.

use std::collections::HashMap;

use parking_lot::Mutex;
use tablegate_core::error::StoreError;
use tablegate_core::executor::{MutationExecutor, MutationTransaction};
use tablegate_core::plan::FieldAssignment;
use tablegate_core::schema::{CatalogSnapshot, EntityKind};
use tablegate_core::value::Value;

use crate::table::StoreTable;
use crate::transaction::StoreTransaction;

/// In-memory relational store.
#[derive(Debug, Default)]
pub struct Store {
    tables: Mutex<HashMap<String, StoreTable>>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates one empty table per table entity in the catalog.
    pub fn from_catalog(snapshot: &CatalogSnapshot) -> Result<Self, StoreError> {
        let store = Self::new();
        for entity in snapshot.entities().filter(|e| e.kind() == EntityKind::Table) {
            store.add_table(StoreTable::from_entity(entity)?);
        }
        Ok(store)
    }

    /// Adds or replaces a table.
    pub fn add_table(&self, table: StoreTable) {
        tracing::debug!("Adding table {} with {} columns", table.name(), table.columns().len());
        self.tables.lock().insert(table.name().to_string(), table);
    }

    /// Inserts JSON rows keyed by column name, all or nothing.
    pub fn seed(
        &self,
        table: &str,
        rows: &[serde_json::Map<String, serde_json::Value>],
    ) -> Result<usize, StoreError> {
        let mut tables = self.tables.lock();
        let target = tables
            .get_mut(table)
            .ok_or_else(|| StoreError::TableNotFound(table.to_string()))?;

        let mut staged = target.clone();
        for row in rows {
            let mut assignments = Vec::with_capacity(row.len());
            for (column, json) in row {
                let column_type = staged
                    .columns()
                    .iter()
                    .find(|c| &c.name == column)
                    .map(|c| c.column_type)
                    .ok_or_else(|| StoreError::ColumnNotFound {
                        table: table.to_string(),
                        column: column.clone(),
                    })?;
                let value = column_type.coerce_json(json).map_err(|_| StoreError::TypeMismatch {
                    table: table.to_string(),
                    column: column.clone(),
                    expected: column_type.name().to_string(),
                })?;
                assignments.push(FieldAssignment::new(column.clone(), value));
            }
            let inserted = staged.prepare_insert(&assignments)?;
            if let Some(next) = inserted.next_identity {
                staged.next_identity = next;
            }
            staged.rows.push(inserted.values);
        }

        *target = staged;
        tracing::info!("Seeded {} rows into {}", rows.len(), table);
        Ok(rows.len())
    }

    /// Row with the given key values (in key order), by column name.
    pub fn row(&self, table: &str, key: &[Value]) -> Option<HashMap<String, Value>> {
        let tables = self.tables.lock();
        let table = tables.get(table)?;
        let key: Vec<&Value> = key.iter().collect();
        let index = table.find_key(&key, None)?;
        Some(table.row_map(&table.rows[index], None))
    }

    /// All rows of a table in insertion order.
    pub fn rows(&self, table: &str) -> Vec<HashMap<String, Value>> {
        let tables = self.tables.lock();
        tables
            .get(table)
            .map(|t| t.rows.iter().map(|r| t.row_map(r, None)).collect())
            .unwrap_or_default()
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.tables.lock().get(table).map_or(0, StoreTable::len)
    }
}

impl MutationExecutor for Store {
    fn begin(&self) -> Result<Box<dyn MutationTransaction + '_>, StoreError> {
        Ok(Box::new(StoreTransaction::new(self.tables.lock())))
    }
}
