//! Persistence contracts and implementations.
//!
//! # Responsibility
//! - Define the key-value contract the grid is persisted through.
//! - Isolate SQLite details from the grid store.
//!
//! # Invariants
//! - Reads of corrupt grid data degrade to defaults instead of failing.

pub mod grid_repo;
pub mod kv_repo;
