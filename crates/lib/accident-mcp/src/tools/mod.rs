//! MCP tool modules.
//!
//! Tools are grouped by domain: area lookups, driving conditions, dataset
//! summaries, the composite real-time score, model predictions, and help.

pub mod area;
pub mod conditions;
pub mod inference;
pub mod realtime;
pub mod summary;
mod context;

#[cfg(test)]
mod fixture {
    use accident_core::services::{DatasetConfig, DatasetHandle};
    use accident_ingest::{BuildOptions, build_database};
    use rmcp::ErrorData;

    use crate::AccidentMcp;

    pub fn server(dir: &tempfile::TempDir) -> AccidentMcp {
        let csv = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("../accident-core/tests/data/accidents_sample.csv");
        let db_path = dir.path().join("accidents.db");
        build_database(&BuildOptions::new(csv, &db_path)).expect("build fixture database");
        AccidentMcp::new(DatasetHandle::open(&DatasetConfig::new(db_path)).expect("open fixture"))
    }

    pub fn kind(err: &ErrorData) -> Option<&str> {
        err.data.as_ref()?.get("kind")?.as_str()
    }
}
