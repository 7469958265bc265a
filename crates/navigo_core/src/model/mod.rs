//! Grid domain model.
//!
//! # Responsibility
//! - Define the boolean matrix used for both grid layers.
//! - Define the snapshot shape shared by store, storage and import/export.
//!
//! # Invariants
//! - Layout and cleanliness layers always share the snapshot dimensions
//!   once normalized.

pub mod matrix;
pub mod snapshot;
