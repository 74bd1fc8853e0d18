pub mod config;
pub mod records;

// Re-export key types for easier use by dependent crates
pub use config::{
    BunchConfig, CavityConfig, MAX_BINS, MAX_CLOSING_SIZE, OutputConfig, OutputFormat, RunConfig, ScheduleConfig, SwarmConfig,
};
pub use records::{
    Array2Record, BunchRecord, CavityRecord, Column, RecordHeader, RegionProps, ResultsTable,
    ScheduleRecord, SwarmRecord,
};

/// Version string written into every persisted record by default.
pub fn default_format_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
