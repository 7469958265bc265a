//! JSON import/export of grid snapshots.
//!
//! # Responsibility
//! - Validate external JSON payloads and turn them into snapshots.
//! - Produce the versioned export document.
//!
//! # Invariants
//! - Decoding either returns a normalized snapshot or an error; nothing
//!   partial escapes.
//! - Declared `rows`/`cols` that disagree with the array shapes are
//!   reconciled by resize, not rejected.
//! - The `version` field is written on export but not checked on import.

use crate::model::matrix::Matrix;
use crate::model::snapshot::{
    clamp_dimension, GridSnapshot, CLEANLINESS_FILL, LAYOUT_FILL,
};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Export schema version written by this codec.
pub const EXPORT_VERSION: u32 = 1;

pub type CodecResult<T> = Result<T, CodecError>;

/// Import validation errors.
#[derive(Debug)]
pub enum CodecError {
    /// Payload is not parseable JSON.
    InvalidJson(serde_json::Error),
    /// JSON parsed but does not have the grid shape.
    InvalidFormat(String),
}

impl Display for CodecError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidJson(err) => write!(f, "import is not valid JSON: {err}"),
            Self::InvalidFormat(message) => write!(f, "invalid import format: {message}"),
        }
    }
}

impl Error for CodecError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidJson(err) => Some(err),
            Self::InvalidFormat(_) => None,
        }
    }
}

impl From<serde_json::Error> for CodecError {
    fn from(value: serde_json::Error) -> Self {
        Self::InvalidJson(value)
    }
}

/// Export file document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub rows: usize,
    pub cols: usize,
    pub layout: Vec<Vec<bool>>,
    /// Cleanliness layer; `true` = clean.
    pub states: Vec<Vec<bool>>,
    pub version: u32,
    /// ISO-8601 UTC timestamp taken at encode time.
    pub exported_at: String,
}

/// Builds the export document for a snapshot, stamped with the current time.
pub fn encode(snapshot: &GridSnapshot) -> ExportDocument {
    ExportDocument {
        rows: snapshot.rows,
        cols: snapshot.cols,
        layout: snapshot.layout.to_rows(),
        states: snapshot.cleanliness.to_rows(),
        version: EXPORT_VERSION,
        exported_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    }
}

/// Serializes the export document of a snapshot to JSON text.
pub fn encode_to_string(snapshot: &GridSnapshot) -> CodecResult<String> {
    Ok(serde_json::to_string(&encode(snapshot))?)
}

/// Parses and validates an import payload.
///
/// # Errors
/// - `InvalidJson` when `raw` is not JSON.
/// - `InvalidFormat` when `layout`/`states` are not arrays of boolean-like
///   arrays, or when no dimension can be derived.
pub fn decode(raw: &str) -> CodecResult<GridSnapshot> {
    let payload: Value = serde_json::from_str(raw)?;
    let Value::Object(fields) = payload else {
        return Err(CodecError::InvalidFormat(
            "top-level value must be an object".to_string(),
        ));
    };

    let layout = parse_layer(fields.get("layout"), "layout")?;
    let states = parse_layer(fields.get("states"), "states")?;

    let rows = declared_dimension(fields.get("rows"))
        .or_else(|| positive(layout.len()))
        .ok_or_else(|| {
            CodecError::InvalidFormat("cannot derive rows from an empty layout".to_string())
        })?;
    let cols = declared_dimension(fields.get("cols"))
        .or_else(|| layout.first().and_then(|row| positive(row.len())))
        .ok_or_else(|| {
            CodecError::InvalidFormat("cannot derive cols from an empty layout".to_string())
        })?;

    let rows = clamp_dimension(rows);
    let cols = clamp_dimension(cols);
    let layout = Matrix::from_rows(&fill_gaps(&layout, LAYOUT_FILL), rows, cols, LAYOUT_FILL)
        .map_err(|err| CodecError::InvalidFormat(err.to_string()))?;
    let cleanliness = Matrix::from_rows(
        &fill_gaps(&states, CLEANLINESS_FILL),
        rows,
        cols,
        CLEANLINESS_FILL,
    )
    .map_err(|err| CodecError::InvalidFormat(err.to_string()))?;

    Ok(GridSnapshot {
        rows,
        cols,
        layout,
        cleanliness,
    })
}

/// A parsed layer; `None` marks an explicit `null` cell.
type RawLayer = Vec<Vec<Option<bool>>>;

fn parse_layer(value: Option<&Value>, field: &str) -> CodecResult<RawLayer> {
    let Some(Value::Array(rows)) = value else {
        return Err(CodecError::InvalidFormat(format!(
            "`{field}` must be an array of arrays"
        )));
    };

    rows.iter()
        .enumerate()
        .map(|(r, row)| {
            let Value::Array(cells) = row else {
                return Err(CodecError::InvalidFormat(format!(
                    "`{field}[{r}]` must be an array"
                )));
            };
            cells
                .iter()
                .enumerate()
                .map(|(c, cell)| {
                    parse_cell(cell).ok_or_else(|| {
                        CodecError::InvalidFormat(format!(
                            "`{field}[{r}][{c}]` must be a boolean"
                        ))
                    })
                })
                .collect::<CodecResult<Vec<Option<bool>>>>()
        })
        .collect()
}

/// Accepts booleans, `0`/`1` and `null` (resolved to the layer fill later).
fn parse_cell(cell: &Value) -> Option<Option<bool>> {
    match cell {
        Value::Bool(value) => Some(Some(*value)),
        Value::Null => Some(None),
        Value::Number(number) => match number.as_i64() {
            Some(0) => Some(Some(false)),
            Some(1) => Some(Some(true)),
            _ => None,
        },
        _ => None,
    }
}

fn fill_gaps(layer: &RawLayer, fill: bool) -> Vec<Vec<bool>> {
    layer
        .iter()
        .map(|row| row.iter().map(|cell| cell.unwrap_or(fill)).collect())
        .collect()
}

/// Reads an explicit `rows`/`cols` value; zero, negative or non-numeric
/// values count as absent.
fn declared_dimension(value: Option<&Value>) -> Option<i64> {
    let number = match value? {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|float| float.trunc() as i64))?,
        Value::String(text) => text.trim().parse::<i64>().ok()?,
        _ => return None,
    };
    (number > 0).then_some(number)
}

fn positive(len: usize) -> Option<i64> {
    (len > 0).then_some(len as i64)
}

#[cfg(test)]
mod tests {
    use super::{decode, declared_dimension, encode, CodecError, EXPORT_VERSION};
    use crate::model::snapshot::GridSnapshot;
    use serde_json::json;

    #[test]
    fn declared_dimension_ignores_non_positive_and_garbage() {
        assert_eq!(declared_dimension(Some(&json!(5))), Some(5));
        assert_eq!(declared_dimension(Some(&json!(5.9))), Some(5));
        assert_eq!(declared_dimension(Some(&json!("7"))), Some(7));
        assert_eq!(declared_dimension(Some(&json!(0))), None);
        assert_eq!(declared_dimension(Some(&json!(-3))), None);
        assert_eq!(declared_dimension(Some(&json!(true))), None);
        assert_eq!(declared_dimension(None), None);
    }

    #[test]
    fn encode_stamps_version_and_timestamp() {
        let document = encode(&GridSnapshot::blank(2, 3));
        assert_eq!(document.version, EXPORT_VERSION);
        assert_eq!(document.rows, 2);
        assert_eq!(document.states, vec![vec![false; 3]; 2]);
        assert!(document.exported_at.ends_with('Z'));
        assert!(chrono::DateTime::parse_from_rfc3339(&document.exported_at).is_ok());
    }

    #[test]
    fn decode_rejects_non_array_layers() {
        let err = decode(r#"{"layout": 3, "states": []}"#).expect_err("layout must be array");
        assert!(matches!(err, CodecError::InvalidFormat(_)));

        let err = decode(r#"{"layout": [[true]]}"#).expect_err("states is required");
        assert!(matches!(err, CodecError::InvalidFormat(_)));

        let err = decode(r#"{"layout": [[true, "yes"]], "states": []}"#)
            .expect_err("strings are not boolean-like");
        assert!(matches!(err, CodecError::InvalidFormat(_)));
    }

    #[test]
    fn decode_rejects_invalid_json() {
        let err = decode("{").expect_err("truncated json");
        assert!(matches!(err, CodecError::InvalidJson(_)));
    }

    #[test]
    fn decode_derives_dimensions_from_layout_when_not_declared() {
        let snapshot = decode(r#"{"layout": [[true, false], [true, true], [false, true]], "states": [[1, 0]]}"#)
            .expect("valid payload");
        assert_eq!((snapshot.rows, snapshot.cols), (3, 2));
        assert!(!snapshot.layout.get(0, 1).unwrap());
        assert!(snapshot.cleanliness.get(0, 0).unwrap());
        assert!(!snapshot.cleanliness.get(2, 1).unwrap());
    }

    #[test]
    fn decode_fills_null_cells_with_layer_default() {
        let snapshot =
            decode(r#"{"rows": 1, "cols": 2, "layout": [[null, false]], "states": [[null, true]]}"#)
                .expect("valid payload");
        assert!(snapshot.layout.get(0, 0).unwrap());
        assert!(!snapshot.cleanliness.get(0, 0).unwrap());
        assert!(snapshot.cleanliness.get(0, 1).unwrap());
    }

    #[test]
    fn decode_clamps_declared_dimensions() {
        let snapshot = decode(r#"{"rows": 80, "cols": 2, "layout": [[true]], "states": []}"#)
            .expect("valid payload");
        assert_eq!(snapshot.rows, 50);
        assert!(snapshot.is_consistent());
    }

    #[test]
    fn decode_without_any_dimension_source_fails() {
        let err = decode(r#"{"layout": [], "states": []}"#).expect_err("no rows derivable");
        assert!(matches!(err, CodecError::InvalidFormat(_)));
    }
}
