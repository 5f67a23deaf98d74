//! Core query layer for accident-mcp.
//!
//! This crate opens a built accident database read-only, exposes the control
//! plane behind every tool (area, temporal, weather, and summary queries plus
//! the composite risk score), and loads the classifier artifacts used by the
//! prediction adapters.

pub mod control;
pub mod geo;
pub mod inference;
pub mod risk;
pub mod services;
pub mod store;
