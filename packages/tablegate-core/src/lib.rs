//! Core of the schema-driven REST gateway.
//!
//! Resolves entities from a catalog, parses primary-key routes, validates
//! full-replace PUT bodies, and runs the update-then-insert state machine
//! against a pluggable mutation executor.

pub mod config;
pub mod error;
pub mod executor;
pub mod handler;
pub mod plan;
pub mod policy;
pub mod response;
pub mod route;
pub mod schema;
pub mod upsert;
pub mod validation;
pub mod value;

pub use handler::{Gateway, PutRequest};
