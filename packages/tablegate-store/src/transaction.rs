//! Store transactions with undo-on-drop.

use std::collections::HashMap;

use parking_lot::MutexGuard;
use tablegate_core::error::StoreError;
use tablegate_core::executor::{MutationOutcome, MutationTransaction};
use tablegate_core::plan::{MutationKind, MutationPlan};

use crate::change::Change;
use crate::table::StoreTable;

/// Exclusive transaction over the whole store.
///
/// Changes are applied in place and logged. If the transaction is dropped
/// without [`commit`](MutationTransaction::commit), the log is replayed in
/// reverse before the lock is released.
pub struct StoreTransaction<'a> {
    tables: MutexGuard<'a, HashMap<String, StoreTable>>,
    undo: Vec<Change>,
    committed: bool,
}

impl<'a> StoreTransaction<'a> {
    pub(crate) fn new(tables: MutexGuard<'a, HashMap<String, StoreTable>>) -> Self {
        Self {
            tables,
            undo: Vec::new(),
            committed: false,
        }
    }

    fn table_mut(&mut self, name: &str) -> Result<&mut StoreTable, StoreError> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| StoreError::TableNotFound(name.to_string()))
    }

    fn insert(&mut self, plan: &MutationPlan) -> Result<MutationOutcome, StoreError> {
        let table = self.table_mut(&plan.table)?;
        let row = table.prepare_insert(&plan.assignments)?;
        let returned = table.row_map(&row.values, Some(&plan.returning));
        let previous = table.next_identity;
        if let Some(next) = row.next_identity {
            table.next_identity = next;
        }
        table.rows.push(row.values);

        if row.next_identity.is_some() {
            self.undo.push(Change::Identity {
                table: plan.table.clone(),
                previous,
            });
        }
        self.undo.push(Change::Insert {
            table: plan.table.clone(),
        });

        Ok(MutationOutcome {
            rows_affected: 1,
            returned: Some(returned),
            generated_values: row.generated,
            executed_as_insert: true,
        })
    }

    fn update(&mut self, plan: &MutationPlan) -> Result<MutationOutcome, StoreError> {
        let table = self.table_mut(&plan.table)?;
        let images = table.prepare_update(plan.predicate.as_ref(), &plan.assignments)?;
        let rows_affected = images.len() as u64;
        let returned = match images.as_slice() {
            [(_, image)] => Some(table.row_map(image, Some(&plan.returning))),
            _ => None,
        };

        let mut changes = Vec::with_capacity(images.len());
        for (index, image) in images {
            let original = std::mem::replace(&mut table.rows[index], image);
            changes.push(Change::Update {
                table: plan.table.clone(),
                index,
                original,
            });
        }
        self.undo.extend(changes);

        Ok(MutationOutcome {
            rows_affected,
            returned,
            generated_values: HashMap::new(),
            executed_as_insert: false,
        })
    }

    fn rollback(&mut self) {
        while let Some(change) = self.undo.pop() {
            match change {
                Change::Insert { table } => {
                    if let Some(table) = self.tables.get_mut(&table) {
                        table.rows.pop();
                    }
                }
                Change::Update {
                    table,
                    index,
                    original,
                } => {
                    if let Some(row) = self
                        .tables
                        .get_mut(&table)
                        .and_then(|t| t.rows.get_mut(index))
                    {
                        *row = original;
                    }
                }
                Change::Identity { table, previous } => {
                    if let Some(table) = self.tables.get_mut(&table) {
                        table.next_identity = previous;
                    }
                }
            }
        }
    }
}

impl MutationTransaction for StoreTransaction<'_> {
    fn execute(&mut self, plan: &MutationPlan) -> Result<MutationOutcome, StoreError> {
        if self.committed {
            return Err(StoreError::TransactionConflict(
                "transaction already committed".to_string(),
            ));
        }
        tracing::debug!("{} on {} for {}", plan.kind.as_str(), plan.table, plan.entity);
        match plan.kind {
            MutationKind::Update => self.update(plan),
            MutationKind::Insert => self.insert(plan),
        }
    }

    fn commit(mut self: Box<Self>) -> Result<(), StoreError> {
        if self.committed {
            return Err(StoreError::TransactionConflict(
                "transaction already committed".to_string(),
            ));
        }
        tracing::debug!("Committing {} changes", self.undo.len());
        self.undo.clear();
        self.committed = true;
        Ok(())
    }
}

impl Drop for StoreTransaction<'_> {
    fn drop(&mut self) {
        if !self.committed && !self.undo.is_empty() {
            tracing::debug!("Rolling back {} uncommitted changes", self.undo.len());
            self.rollback();
        }
    }
}
