use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Tag written at the top of every persisted record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordHeader {
    /// Format version of the writer.
    pub version: String,
    /// When the run that produced the record completed.
    pub completed_at: DateTime<Local>,
}

/// Dense row-major 2-D array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Array2Record<T> {
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<T>,
}

impl<T> Array2Record<T> {
    /// Returns true when `data` holds exactly `rows * cols` values.
    pub fn is_consistent(&self) -> bool {
        self.rows.checked_mul(self.cols) == Some(self.data.len())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BunchRecord {
    pub header: RecordHeader,
    pub sx: f64,
    pub sy: f64,
    pub sz: f64,
    pub charge: f64,
    pub gamma: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleRecord {
    pub header: RecordHeader,
    pub xi_start: f64,
    pub xi_end: f64,
    pub dxi: f64,
    pub density: f64,
}

/// Electron time history, every array shaped `(num_steps, num_parts)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwarmRecord {
    pub header: RecordHeader,
    pub num_parts: usize,
    pub x: Array2Record<f64>,
    pub y: Array2Record<f64>,
    pub bx: Array2Record<f64>,
    pub by: Array2Record<f64>,
}

/// Shape measurements of a binary region, in pixel units (axis 0, axis 1).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegionProps {
    pub area: usize,
    pub centroid: (f64, f64),
    /// Angle between axis 0 and the major axis, in radians.
    pub orientation: f64,
    pub major_axis_length: f64,
    pub minor_axis_length: f64,
}

/// One column of the flattened per-slice results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Column {
    /// Exactly one value at every slice.
    Dense(Vec<f64>),
    /// Variable number of values per slice.
    Ragged(Vec<Vec<f64>>),
}

impl Column {
    /// Number of slices covered by the column.
    pub fn len(&self) -> usize {
        match self {
            Column::Dense(values) => values.len(),
            Column::Ragged(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Values recorded for one slice.
    pub fn row(&self, index: usize) -> Option<Vec<f64>> {
        match self {
            Column::Dense(values) => values.get(index).map(|v| vec![*v]),
            Column::Ragged(rows) => rows.get(index).cloned(),
        }
    }
}

/// Fixed-shape table of named columns, one row per slice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ResultsTable {
    pub num_rows: usize,
    pub columns: BTreeMap<String, Column>,
}

impl ResultsTable {
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.get(name)
    }
}

/// Ion cavity time history. Per-slice arrays may differ in shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CavityRecord {
    pub header: RecordHeader,
    pub images: Vec<Array2Record<f64>>,
    /// `(xmin, xmax, ymin, ymax)` of every slice's histogram.
    pub extents: Vec<(f64, f64, f64, f64)>,
    pub center_indices: Vec<(i64, i64)>,
    pub closed_masks: Vec<Array2Record<bool>>,
    pub boundary_masks: Vec<Array2Record<bool>>,
    pub regions: Vec<RegionProps>,
    pub results: ResultsTable,
}
