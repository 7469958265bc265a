//! Namespaced persisted layout of the grid.
//!
//! # Responsibility
//! - Map dimensions and both grid layers onto `<prefix>:<name>` keys.
//! - Recover a usable snapshot from missing or corrupt entries.
//!
//! # Invariants
//! - `rows`/`cols` are stored as decimal strings.
//! - `layout`/`states` are stored as JSON arrays of boolean arrays.
//! - `load()` never fails: each unusable key falls back to its default.

use crate::model::matrix::Matrix;
use crate::model::snapshot::{
    GridSnapshot, CLEANLINESS_FILL, DEFAULT_DIMENSION, LAYOUT_FILL, MAX_DIMENSION,
};
use crate::repo::kv_repo::{KeyValueStore, RepoError, RepoResult};
use log::warn;

/// Prefix used when no explicit namespace is configured.
pub const DEFAULT_KEY_PREFIX: &str = "navigo";

const KEY_ROWS: &str = "rows";
const KEY_COLS: &str = "cols";
const KEY_LAYOUT: &str = "layout";
const KEY_STATES: &str = "states";

/// Grid persistence over any key-value backend.
pub struct GridStorage<S: KeyValueStore> {
    store: S,
    prefix: String,
}

impl<S: KeyValueStore> GridStorage<S> {
    /// Uses the default `navigo` namespace.
    pub fn new(store: S) -> Self {
        Self::with_prefix(store, DEFAULT_KEY_PREFIX)
    }

    pub fn with_prefix(store: S, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Returns the backend key for one logical entry.
    pub fn key(&self, name: &str) -> String {
        format!("{}:{name}", self.prefix)
    }

    /// Loads the persisted snapshot, falling back per key.
    ///
    /// The returned snapshot is always normalized to its dimensions.
    pub fn load(&self) -> GridSnapshot {
        let rows = self.load_dimension(KEY_ROWS);
        let cols = self.load_dimension(KEY_COLS);
        let layout = self.load_layer(KEY_LAYOUT);
        let states = self.load_layer(KEY_STATES);

        let layout = layout
            .and_then(|source| Matrix::from_rows(&source, rows, cols, LAYOUT_FILL).ok())
            .unwrap_or_else(|| Matrix::filled(rows, cols, LAYOUT_FILL));
        let cleanliness = states
            .and_then(|source| Matrix::from_rows(&source, rows, cols, CLEANLINESS_FILL).ok())
            .unwrap_or_else(|| Matrix::filled(rows, cols, CLEANLINESS_FILL));

        GridSnapshot {
            rows,
            cols,
            layout,
            cleanliness,
        }
    }

    /// Returns whether any grid key exists in the backend.
    pub fn has_saved_grid(&self) -> RepoResult<bool> {
        for name in [KEY_ROWS, KEY_COLS, KEY_LAYOUT, KEY_STATES] {
            if self.store.get(&self.key(name))?.is_some() {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Reads the persisted layout layer without touching other keys.
    pub fn load_layout(&self, rows: usize, cols: usize) -> Matrix<bool> {
        self.load_layer(KEY_LAYOUT)
            .and_then(|source| Matrix::from_rows(&source, rows, cols, LAYOUT_FILL).ok())
            .unwrap_or_else(|| Matrix::filled(rows, cols, LAYOUT_FILL))
    }

    pub fn save_dimensions(&self, rows: usize, cols: usize) -> RepoResult<()> {
        self.store.set_many(&[
            (self.key(KEY_ROWS), rows.to_string()),
            (self.key(KEY_COLS), cols.to_string()),
        ])
    }

    pub fn save_layout(&self, layout: &Matrix<bool>) -> RepoResult<()> {
        let value = encode_layer(layout)?;
        self.store.set(&self.key(KEY_LAYOUT), &value)
    }

    pub fn save_states(&self, cleanliness: &Matrix<bool>) -> RepoResult<()> {
        let value = encode_layer(cleanliness)?;
        self.store.set(&self.key(KEY_STATES), &value)
    }

    /// Writes dimensions and both layers in one batch.
    pub fn save_all(&self, snapshot: &GridSnapshot) -> RepoResult<()> {
        self.store.set_many(&[
            (self.key(KEY_ROWS), snapshot.rows.to_string()),
            (self.key(KEY_COLS), snapshot.cols.to_string()),
            (self.key(KEY_LAYOUT), encode_layer(&snapshot.layout)?),
            (self.key(KEY_STATES), encode_layer(&snapshot.cleanliness)?),
        ])
    }

    /// Removes every grid key under this prefix.
    pub fn clear(&self) -> RepoResult<()> {
        for name in [KEY_ROWS, KEY_COLS, KEY_LAYOUT, KEY_STATES] {
            self.store.remove(&self.key(name))?;
        }
        Ok(())
    }

    fn load_dimension(&self, name: &str) -> usize {
        let raw = match self.store.get(&self.key(name)) {
            Ok(Some(raw)) => raw,
            Ok(None) => return DEFAULT_DIMENSION,
            Err(err) => {
                warn!(
                    "event=grid_load module=repo status=fallback key={name} reason=read_failed error={err}"
                );
                return DEFAULT_DIMENSION;
            }
        };

        match raw.trim().parse::<usize>() {
            Ok(0) | Err(_) => {
                warn!(
                    "event=grid_load module=repo status=fallback key={name} reason=invalid_dimension"
                );
                DEFAULT_DIMENSION
            }
            Ok(value) => value.min(MAX_DIMENSION),
        }
    }

    fn load_layer(&self, name: &str) -> Option<Vec<Vec<bool>>> {
        let raw = match self.store.get(&self.key(name)) {
            Ok(raw) => raw?,
            Err(err) => {
                warn!(
                    "event=grid_load module=repo status=fallback key={name} reason=read_failed error={err}"
                );
                return None;
            }
        };

        match serde_json::from_str::<Vec<Vec<bool>>>(&raw) {
            Ok(rows) => Some(rows),
            Err(err) => {
                warn!(
                    "event=grid_load module=repo status=fallback key={name} reason=invalid_json error={err}"
                );
                None
            }
        }
    }
}

fn encode_layer(layer: &Matrix<bool>) -> RepoResult<String> {
    serde_json::to_string(&layer.to_rows())
        .map_err(|err| RepoError::InvalidData(format!("failed to encode grid layer: {err}")))
}
