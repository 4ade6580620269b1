//! Boundary between the upsert pipeline and the backing store.

use std::collections::HashMap;

use crate::error::StoreError;
use crate::plan::MutationPlan;
use crate::value::Value;

/// Result of one executed statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MutationOutcome {
    pub rows_affected: u64,
    /// Returned columns of the single affected row, by physical name
    pub returned: Option<HashMap<String, Value>>,
    /// Values the store generated for autogenerated columns
    pub generated_values: HashMap<String, Value>,
    pub executed_as_insert: bool,
}

/// One logical transaction.
///
/// Dropping a transaction without calling [`commit`](Self::commit) rolls
/// back every statement it executed.
pub trait MutationTransaction {
    fn execute(&mut self, plan: &MutationPlan) -> Result<MutationOutcome, StoreError>;

    fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

/// Opens transactions against a store.
pub trait MutationExecutor: Send + Sync {
    fn begin(&self) -> Result<Box<dyn MutationTransaction + '_>, StoreError>;
}
