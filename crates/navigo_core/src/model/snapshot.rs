//! Grid snapshot: dimensions plus the layout and cleanliness layers.
//!
//! # Responsibility
//! - Bundle the data exchanged between store, persistence and import/export.
//! - Own dimension clamping and layer normalization rules.
//!
//! # Invariants
//! - After `normalized()`, both layers are exactly `rows x cols`.
//! - New layout cells default to active (`true`); new cleanliness cells
//!   default to dirty (`false`).

use crate::model::matrix::{Matrix, MatrixResult};

/// Smallest accepted row/column count.
pub const MIN_DIMENSION: usize = 1;
/// Largest accepted row/column count.
pub const MAX_DIMENSION: usize = 50;
/// Row/column count used when nothing usable is persisted.
pub const DEFAULT_DIMENSION: usize = 20;

/// Fill for layout cells introduced by a resize.
pub const LAYOUT_FILL: bool = true;
/// Fill for cleanliness cells introduced by a resize.
pub const CLEANLINESS_FILL: bool = false;

/// Clamps an externally requested dimension into `[1, 50]`.
pub fn clamp_dimension(value: i64) -> usize {
    let clamped = value.clamp(MIN_DIMENSION as i64, MAX_DIMENSION as i64);
    clamped as usize
}

/// Serializable bundle of dimensions, layout and cleanliness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridSnapshot {
    pub rows: usize,
    pub cols: usize,
    /// `true` = active (tracked) cell.
    pub layout: Matrix<bool>,
    /// `true` = clean. Only meaningful where `layout` is active.
    pub cleanliness: Matrix<bool>,
}

impl GridSnapshot {
    /// Default state: 20x20, all active, all dirty.
    pub fn defaults() -> Self {
        Self::blank(DEFAULT_DIMENSION, DEFAULT_DIMENSION)
    }

    /// All-active, all-dirty snapshot of the given (clamped) size.
    pub fn blank(rows: usize, cols: usize) -> Self {
        let rows = rows.clamp(MIN_DIMENSION, MAX_DIMENSION);
        let cols = cols.clamp(MIN_DIMENSION, MAX_DIMENSION);
        Self {
            rows,
            cols,
            layout: Matrix::filled(rows, cols, LAYOUT_FILL),
            cleanliness: Matrix::filled(rows, cols, CLEANLINESS_FILL),
        }
    }

    /// Resizes both layers to the declared `rows x cols`.
    ///
    /// Idempotent: a snapshot whose layers already match is returned as-is.
    pub fn normalized(self) -> MatrixResult<Self> {
        let layout = self.layout.resize(self.rows, self.cols, LAYOUT_FILL)?;
        let cleanliness = self
            .cleanliness
            .resize(self.rows, self.cols, CLEANLINESS_FILL)?;
        Ok(Self {
            rows: self.rows,
            cols: self.cols,
            layout,
            cleanliness,
        })
    }

    /// Returns whether both layers match the declared dimensions.
    pub fn is_consistent(&self) -> bool {
        self.layout.rows() == self.rows
            && self.layout.cols() == self.cols
            && self.cleanliness.rows() == self.rows
            && self.cleanliness.cols() == self.cols
    }
}

impl Default for GridSnapshot {
    fn default() -> Self {
        Self::defaults()
    }
}
