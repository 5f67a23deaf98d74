//! Read-only `SQLite` store over a built accident database.
//!
//! Queries run on a small pool of read-only connections, each carrying the
//! `haversine_km` scalar function used by radius lookups.

pub mod queries;
pub mod sqlite;

pub use queries::{
    CorridorFilter, DateWindow, FeatureComparison, HotspotFilter, RadiusSummary, SearchFilter,
    TemporalFilter, WeatherFilter,
};
pub use sqlite::{
    DEFAULT_POOL_SIZE, SqliteAccidentStore, StateBreakdown, StoreError, StoreResult,
    register_functions,
};
