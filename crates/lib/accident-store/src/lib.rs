//! Storage models and schema helpers for accident-mcp.
//!
//! This crate defines the accident record layout, the pre-aggregated summary
//! tables built alongside it, and the row types the query layer reads back.

pub mod models;
pub mod schema;

pub use models::*;
