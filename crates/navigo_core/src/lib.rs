//! Core grid state for Navigo cleanliness tracking.
//! This crate is the single source of truth for grid invariants.

pub mod codec;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod schedule;
pub mod service;

pub use codec::{decode, encode, CodecError, CodecResult, ExportDocument, EXPORT_VERSION};
pub use config::{AppConfig, ConfigError};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::matrix::{Matrix, MatrixError, MatrixResult};
pub use model::snapshot::{
    clamp_dimension, GridSnapshot, DEFAULT_DIMENSION, MAX_DIMENSION, MIN_DIMENSION,
};
pub use repo::grid_repo::{GridStorage, DEFAULT_KEY_PREFIX};
pub use repo::kv_repo::{
    KeyValueStore, MemoryKeyValueStore, RepoError, RepoResult, SqliteKeyValueStore,
};
pub use schedule::daily_reset::{
    default_reset_time, delay_until_next_reset, next_reset_after, Clock, DailyResetScheduler,
    ScheduleError, SystemClock,
};
pub use service::grid_store::GridStateStore;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
