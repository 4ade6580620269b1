//! In-memory relational store for the gateway.
//!
//! Tables hold rows as typed values and enforce NOT NULL, primary-key
//! uniqueness, identity columns and store defaults. A transaction holds the
//! store lock for its lifetime and undoes its changes when dropped without
//! commit.

mod change;
pub mod store;
pub mod table;
pub mod transaction;

pub use store::Store;
pub use table::{StoreColumn, StoreTable};
pub use transaction::StoreTransaction;
