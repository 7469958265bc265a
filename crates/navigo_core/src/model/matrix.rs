//! Rectangular value grid with overlap-preserving resize.
//!
//! # Responsibility
//! - Store a dense `rows x cols` grid addressed by `(row, col)`.
//! - Produce resized copies that keep the overlapping block.
//!
//! # Invariants
//! - `rows >= 1` and `cols >= 1`.
//! - Every row has exactly `cols` entries (storage is one flat buffer).
//! - Out-of-range access is reported as `IndexOutOfRange`, never clamped.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub type MatrixResult<T> = Result<T, MatrixError>;

/// Errors from matrix construction and cell access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatrixError {
    /// Requested dimensions contain a zero.
    EmptyDimensions { rows: usize, cols: usize },
    /// Coordinates fall outside current dimensions.
    IndexOutOfRange {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },
}

impl Display for MatrixError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyDimensions { rows, cols } => {
                write!(f, "matrix dimensions must be positive, got {rows}x{cols}")
            }
            Self::IndexOutOfRange {
                row,
                col,
                rows,
                cols,
            } => write!(
                f,
                "cell ({row}, {col}) is outside matrix bounds {rows}x{cols}"
            ),
        }
    }
}

impl Error for MatrixError {}

/// Dense 2D grid of copyable values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matrix<T> {
    rows: usize,
    cols: usize,
    cells: Vec<T>,
}

impl<T: Copy> Matrix<T> {
    /// Creates a matrix with every cell set to `fill`.
    ///
    /// # Errors
    /// - Returns `EmptyDimensions` when either dimension is zero.
    pub fn new(rows: usize, cols: usize, fill: T) -> MatrixResult<Self> {
        ensure_dimensions(rows, cols)?;
        Ok(Self {
            rows,
            cols,
            cells: vec![fill; rows * cols],
        })
    }

    /// Infallible constructor; zero dimensions are raised to one.
    pub(crate) fn filled(rows: usize, cols: usize, fill: T) -> Self {
        let rows = rows.max(1);
        let cols = cols.max(1);
        Self {
            rows,
            cols,
            cells: vec![fill; rows * cols],
        }
    }

    /// Builds a matrix from possibly ragged nested rows.
    ///
    /// Cell `(r, c)` takes `source[r][c]` when present and `fill` otherwise,
    /// so short rows and missing rows are padded and extra entries dropped.
    pub fn from_rows(source: &[Vec<T>], rows: usize, cols: usize, fill: T) -> MatrixResult<Self> {
        ensure_dimensions(rows, cols)?;
        let mut cells = Vec::with_capacity(rows * cols);
        for r in 0..rows {
            let source_row = source.get(r);
            for c in 0..cols {
                let value = source_row.and_then(|row| row.get(c)).copied();
                cells.push(value.unwrap_or(fill));
            }
        }
        Ok(Self { rows, cols, cells })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Returns the value at `(row, col)`.
    pub fn get(&self, row: usize, col: usize) -> MatrixResult<T> {
        let index = self.index_of(row, col)?;
        Ok(self.cells[index])
    }

    /// Overwrites the value at `(row, col)`.
    pub fn set(&mut self, row: usize, col: usize, value: T) -> MatrixResult<()> {
        let index = self.index_of(row, col)?;
        self.cells[index] = value;
        Ok(())
    }

    /// Produces a new matrix of the target dimensions.
    ///
    /// Cells inside both the source and the target keep their value; cells
    /// only in the target get `fill`; cells only in the source are dropped.
    pub fn resize(&self, rows: usize, cols: usize, fill: T) -> MatrixResult<Self> {
        ensure_dimensions(rows, cols)?;
        let mut cells = Vec::with_capacity(rows * cols);
        for r in 0..rows {
            for c in 0..cols {
                let value = if r < self.rows && c < self.cols {
                    self.cells[r * self.cols + c]
                } else {
                    fill
                };
                cells.push(value);
            }
        }
        Ok(Self { rows, cols, cells })
    }

    /// Iterates `(row, col, value)` in row-major order.
    pub fn iter_cells(&self) -> impl Iterator<Item = (usize, usize, T)> + '_ {
        let cols = self.cols;
        self.cells
            .iter()
            .enumerate()
            .map(move |(index, value)| (index / cols, index % cols, *value))
    }

    /// Returns the grid as nested rows (persistence/export shape).
    pub fn to_rows(&self) -> Vec<Vec<T>> {
        self.cells
            .chunks(self.cols)
            .map(|row| row.to_vec())
            .collect()
    }

    fn index_of(&self, row: usize, col: usize) -> MatrixResult<usize> {
        if row >= self.rows || col >= self.cols {
            return Err(MatrixError::IndexOutOfRange {
                row,
                col,
                rows: self.rows,
                cols: self.cols,
            });
        }
        Ok(row * self.cols + col)
    }
}

impl Matrix<bool> {
    /// Counts cells set to `true`.
    pub fn count_true(&self) -> usize {
        self.cells.iter().filter(|value| **value).count()
    }
}

fn ensure_dimensions(rows: usize, cols: usize) -> MatrixResult<()> {
    if rows == 0 || cols == 0 {
        return Err(MatrixError::EmptyDimensions { rows, cols });
    }
    Ok(())
}
