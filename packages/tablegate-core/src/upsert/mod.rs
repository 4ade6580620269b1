//! Update-then-insert planning and execution.

mod driver;
mod machine;

pub use driver::{CancelOnDrop, CancellationFlag, Upserter};
pub use machine::{
    transition, MachineContext, Resolution, UpsertEffect, UpsertEvent, UpsertMachine,
    UpsertState,
};
