use tablegate_core::value::Value;

/// Undo record for one applied change.
#[derive(Debug, Clone)]
pub(crate) enum Change {
    /// Row appended to the end of a table
    Insert { table: String },
    /// Row overwritten in place
    Update {
        table: String,
        index: usize,
        /// Row image before the update
        original: Vec<Value>,
    },
    /// Identity counter advanced
    Identity { table: String, previous: i64 },
}
