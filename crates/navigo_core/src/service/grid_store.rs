//! Grid state store: the single owner of layout and cleanliness.
//!
//! # Responsibility
//! - Enforce that both layers always match the store dimensions.
//! - Expose the mutations the UI layer and the daily reset call into.
//! - Persist after every mutation that must survive a reload.
//!
//! # Invariants
//! - `layout`, `cleanliness`, `rows` and `cols` change together or not at all.
//! - Inactive cells are never toggled or reset.
//! - Persistence failures never abort a mutation; they are logged and
//!   surfaced through `persistence_degraded()`.

use crate::codec::{self, CodecResult};
use crate::model::matrix::{Matrix, MatrixResult};
use crate::model::snapshot::{clamp_dimension, GridSnapshot, CLEANLINESS_FILL, LAYOUT_FILL};
use crate::repo::grid_repo::GridStorage;
use crate::repo::kv_repo::{KeyValueStore, RepoResult};
use log::{debug, info, warn};

/// In-memory grid state backed by namespaced key-value persistence.
pub struct GridStateStore<S: KeyValueStore> {
    rows: usize,
    cols: usize,
    layout: Matrix<bool>,
    cleanliness: Matrix<bool>,
    storage: GridStorage<S>,
    persistence_degraded: bool,
}

impl<S: KeyValueStore> GridStateStore<S> {
    /// Restores the grid from storage, using defaults for anything unusable.
    pub fn open(storage: GridStorage<S>) -> Self {
        let snapshot = storage.load();
        info!(
            "event=grid_open module=service status=ok prefix={} rows={} cols={}",
            storage.prefix(),
            snapshot.rows,
            snapshot.cols
        );
        Self::from_parts(snapshot, storage)
    }

    /// Starts from the 20x20 default grid, ignoring anything persisted.
    pub fn with_defaults(storage: GridStorage<S>) -> Self {
        Self::from_parts(GridSnapshot::defaults(), storage)
    }

    /// Replaces in-memory state with what storage holds now.
    ///
    /// Picks up writes made by other handles on the same backend and drops
    /// uncommitted layout edits.
    pub fn reload(&mut self) {
        let snapshot = self.storage.load();
        debug!(
            "event=grid_reload module=service status=ok rows={} cols={}",
            snapshot.rows, snapshot.cols
        );
        self.rows = snapshot.rows;
        self.cols = snapshot.cols;
        self.layout = snapshot.layout;
        self.cleanliness = snapshot.cleanliness;
    }

    fn from_parts(snapshot: GridSnapshot, storage: GridStorage<S>) -> Self {
        Self {
            rows: snapshot.rows,
            cols: snapshot.cols,
            layout: snapshot.layout,
            cleanliness: snapshot.cleanliness,
            storage,
            persistence_degraded: false,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Returns whether `(row, col)` is part of the tracked space.
    pub fn is_active(&self, row: usize, col: usize) -> MatrixResult<bool> {
        self.layout.get(row, col)
    }

    /// Returns whether `(row, col)` is clean. Meaningless for inactive cells.
    pub fn is_clean(&self, row: usize, col: usize) -> MatrixResult<bool> {
        self.cleanliness.get(row, col)
    }

    pub fn layout(&self) -> &Matrix<bool> {
        &self.layout
    }

    pub fn cleanliness(&self) -> &Matrix<bool> {
        &self.cleanliness
    }

    pub fn active_count(&self) -> usize {
        self.layout.count_true()
    }

    /// Counts clean cells among active ones.
    pub fn clean_count(&self) -> usize {
        self.layout
            .iter_cells()
            .filter(|(row, col, active)| {
                *active && self.cleanliness.get(*row, *col).unwrap_or(false)
            })
            .count()
    }

    /// Returns `true` when a write has failed since the last full save.
    pub fn persistence_degraded(&self) -> bool {
        self.persistence_degraded
    }

    pub fn storage(&self) -> &GridStorage<S> {
        &self.storage
    }

    /// Copies the current state into a snapshot.
    pub fn snapshot(&self) -> GridSnapshot {
        GridSnapshot {
            rows: self.rows,
            cols: self.cols,
            layout: self.layout.clone(),
            cleanliness: self.cleanliness.clone(),
        }
    }

    /// Flips one active cell between clean and dirty.
    ///
    /// Returns the new cleanliness, or `None` when the cell is inactive
    /// (inactive cells are not interactive and nothing changes).
    ///
    /// # Side effects
    /// - Persists the cleanliness layer only.
    pub fn toggle_cleanliness(&mut self, row: usize, col: usize) -> MatrixResult<Option<bool>> {
        if !self.layout.get(row, col)? {
            debug!(
                "event=cell_toggle module=service status=skip row={row} col={col} reason=inactive"
            );
            return Ok(None);
        }

        let clean = !self.cleanliness.get(row, col)?;
        self.cleanliness.set(row, col, clean)?;
        let result = self.storage.save_states(&self.cleanliness);
        self.record_persist("save_states", result);
        Ok(Some(clean))
    }

    /// Flips whether `(row, col)` exists. Returns the new layout value.
    ///
    /// Not persisted: layout edits are committed with `persist_all()` or
    /// dropped with `discard_layout_edits()`.
    pub fn toggle_layout(&mut self, row: usize, col: usize) -> MatrixResult<bool> {
        let active = !self.layout.get(row, col)?;
        self.layout.set(row, col, active)?;
        Ok(active)
    }

    /// Resizes the grid to the clamped request.
    ///
    /// New layout cells are active and new cleanliness cells dirty; cells
    /// outside the new bounds are dropped. Returns whether anything changed.
    ///
    /// # Side effects
    /// - Persists grid dimensions.
    pub fn resize(&mut self, rows: i64, cols: i64) -> bool {
        let rows = clamp_dimension(rows);
        let cols = clamp_dimension(cols);
        if rows == self.rows && cols == self.cols {
            return false;
        }

        // clamped dimensions are >= 1, so neither resize can fail
        let (Ok(layout), Ok(cleanliness)) = (
            self.layout.resize(rows, cols, LAYOUT_FILL),
            self.cleanliness.resize(rows, cols, CLEANLINESS_FILL),
        ) else {
            return false;
        };

        info!(
            "event=grid_resize module=service status=ok from={}x{} to={rows}x{cols}",
            self.rows, self.cols
        );
        self.rows = rows;
        self.cols = cols;
        self.layout = layout;
        self.cleanliness = cleanliness;

        let result = self.storage.save_dimensions(rows, cols);
        self.record_persist("save_dimensions", result);
        true
    }

    /// Marks every active cell dirty; inactive cells keep their value.
    ///
    /// # Side effects
    /// - Persists the cleanliness layer.
    pub fn reset_all_cleanliness(&mut self) {
        let mut reset = 0usize;
        for (row, col, active) in self.layout.iter_cells() {
            if active && self.cleanliness.set(row, col, false).is_ok() {
                reset += 1;
            }
        }
        info!("event=grid_reset module=service status=ok active_cells={reset}");
        let result = self.storage.save_states(&self.cleanliness);
        self.record_persist("save_states", result);
    }

    /// Replaces the whole grid with `snapshot`, normalized to its dimensions.
    ///
    /// Declared dimensions are clamped to `[1, 50]` first.
    ///
    /// # Side effects
    /// - Persists dimensions and both layers.
    pub fn load_snapshot(&mut self, mut snapshot: GridSnapshot) -> MatrixResult<()> {
        snapshot.rows = clamp_dimension(i64::try_from(snapshot.rows).unwrap_or(i64::MAX));
        snapshot.cols = clamp_dimension(i64::try_from(snapshot.cols).unwrap_or(i64::MAX));
        let snapshot = snapshot.normalized()?;
        self.rows = snapshot.rows;
        self.cols = snapshot.cols;
        self.layout = snapshot.layout;
        self.cleanliness = snapshot.cleanliness;
        info!(
            "event=grid_load_snapshot module=service status=ok rows={} cols={}",
            self.rows, self.cols
        );
        self.persist_all();
        Ok(())
    }

    /// Returns the current state as a snapshot (alias used by export paths).
    pub fn dump_snapshot(&self) -> GridSnapshot {
        self.snapshot()
    }

    /// Decodes an import payload and loads it; nothing changes on error.
    pub fn import_json(&mut self, raw: &str) -> CodecResult<()> {
        let snapshot = match codec::decode(raw) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!("event=grid_import module=service status=error error={err}");
                return Err(err);
            }
        };
        self.load_snapshot(snapshot)
            .map_err(|err| codec::CodecError::InvalidFormat(err.to_string()))
    }

    /// Encodes the current state as an export document.
    pub fn export_json(&self) -> CodecResult<String> {
        codec::encode_to_string(&self.snapshot())
    }

    /// Writes dimensions and both layers. Commits pending layout edits.
    ///
    /// Returns whether the write succeeded.
    pub fn persist_all(&mut self) -> bool {
        let result = self.storage.save_all(&self.snapshot());
        let ok = result.is_ok();
        self.record_persist("save_all", result);
        if ok {
            self.persistence_degraded = false;
        }
        ok
    }

    /// Drops uncommitted layout edits by reloading the persisted layout.
    pub fn discard_layout_edits(&mut self) {
        self.layout = self.storage.load_layout(self.rows, self.cols);
    }

    fn record_persist(&mut self, operation: &str, result: RepoResult<()>) {
        if let Err(err) = result {
            self.persistence_degraded = true;
            warn!(
                "event=grid_persist module=service status=error operation={operation} error={err}"
            );
        }
    }
}
