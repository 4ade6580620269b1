//! HTTP endpoint implementations.

mod put_handlers;
pub mod request_utils;

pub use put_handlers::upsert_entity;
