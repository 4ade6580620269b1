//! HTTP surface for the gateway.
//!
//! Routes `PUT {base}/{entity}/{*pk}` to the core upsert pipeline, with
//! body size and time limits and cancellation when the caller goes away.

pub mod handlers;
pub mod router;
pub mod server;
