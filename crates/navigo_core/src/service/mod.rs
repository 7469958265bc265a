//! Core use-case services.
//!
//! # Responsibility
//! - Own grid state and expose the operations UI hosts call into.
//! - Keep hosts decoupled from storage details.

pub mod grid_store;
