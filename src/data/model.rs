use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// MetadataValue – a single cell in a metadata column
// ---------------------------------------------------------------------------

/// A dynamically-typed metadata value mirroring common spreadsheet dtypes.
///
/// Only the filename column is interpreted by the pipeline; everything else
/// is carried through untouched.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    /// ISO-8601 date string kept as text.
    Date(String),
    Null,
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::String(s) => write!(f, "{s}"),
            MetadataValue::Integer(i) => write!(f, "{i}"),
            MetadataValue::Float(v) => write!(f, "{v}"),
            MetadataValue::Bool(b) => write!(f, "{b}"),
            MetadataValue::Date(d) => write!(f, "{d}"),
            MetadataValue::Null => write!(f, "<null>"),
        }
    }
}

impl MetadataValue {
    /// Text form used when the value names a scan file.
    ///
    /// Integers are accepted because spreadsheet exports sometimes type a
    /// purely numeric filename as a number.
    pub fn as_key(&self) -> Option<String> {
        match self {
            MetadataValue::String(s) | MetadataValue::Date(s) => Some(s.clone()),
            MetadataValue::Integer(i) => Some(i.to_string()),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Matrix – dense row-major f64 storage
// ---------------------------------------------------------------------------

/// Dense 2-D matrix of `f64`, stored row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Matrix {
    /// Build a matrix from row-major data. Returns `None` when `data` does not
    /// hold exactly `rows * cols` values.
    pub fn new(rows: usize, cols: usize, data: Vec<f64>) -> Option<Self> {
        (rows * cols == data.len()).then_some(Self { rows, cols, data })
    }

    /// Build from a list of rows. Returns `None` for ragged input.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Option<Self> {
        let n_rows = rows.len();
        let n_cols = rows.first().map_or(0, Vec::len);
        if rows.iter().any(|r| r.len() != n_cols) {
            return None;
        }
        let data = rows.into_iter().flatten().collect();
        Some(Self {
            rows: n_rows,
            cols: n_cols,
            data,
        })
    }

    /// A 1-D signal stored as a single column.
    pub fn column_vector(values: Vec<f64>) -> Self {
        Self {
            rows: values.len(),
            cols: 1,
            data: values,
        }
    }

    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// True when the matrix holds no values at all.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.cols + col]
    }

    /// Borrow one row.
    pub fn row(&self, row: usize) -> &[f64] {
        let start = row * self.cols;
        &self.data[start..start + self.cols]
    }

    /// Iterate over rows as slices.
    pub fn iter_rows(&self) -> impl Iterator<Item = &[f64]> {
        // chunks_exact panics on a zero chunk size
        self.data.chunks_exact(self.cols.max(1)).take(self.rows)
    }

    /// Values in row-major order, i.e. the flattened matrix.
    #[inline]
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// Apply `f` to every value, keeping the shape.
    pub fn map(&self, mut f: impl FnMut(f64) -> f64) -> Self {
        Self {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().map(|&v| f(v)).collect(),
        }
    }

    /// Combine two equally shaped matrices value by value.
    /// Returns `None` when the shapes differ.
    pub fn zip_map(&self, other: &Matrix, mut f: impl FnMut(f64, f64) -> f64) -> Option<Self> {
        if self.shape() != other.shape() {
            return None;
        }
        Some(Self {
            rows: self.rows,
            cols: self.cols,
            data: self
                .data
                .iter()
                .zip(&other.data)
                .map(|(&a, &b)| f(a, b))
                .collect(),
        })
    }

    /// Circularly shift rows by `shift` positions (wrap-around).
    ///
    /// Row `i` of `self` ends up at row `(i + shift) mod rows`, so a positive
    /// shift moves content towards the end.
    pub fn roll_rows(&self, shift: isize) -> Self {
        if self.rows == 0 {
            return self.clone();
        }
        let n = self.rows as isize;
        let offset = shift.rem_euclid(n) as usize;
        let mut data = Vec::with_capacity(self.data.len());
        for out_row in 0..self.rows {
            let src = (out_row + self.rows - offset) % self.rows;
            data.extend_from_slice(self.row(src));
        }
        Self {
            rows: self.rows,
            cols: self.cols,
            data,
        }
    }

    /// Elementwise arithmetic mean of equally shaped matrices.
    /// Returns `None` for an empty slice or mismatched shapes.
    pub fn mean_of(matrices: &[Matrix]) -> Option<Self> {
        let first = matrices.first()?;
        if matrices.iter().any(|m| m.shape() != first.shape()) {
            return None;
        }
        let count = matrices.len() as f64;
        let mut data = vec![0.0; first.data.len()];
        for m in matrices {
            for (acc, &v) in data.iter_mut().zip(&m.data) {
                *acc += v;
            }
        }
        for v in &mut data {
            *v /= count;
        }
        Some(Self {
            rows: first.rows,
            cols: first.cols,
            data,
        })
    }
}

// ---------------------------------------------------------------------------
// Scan records
// ---------------------------------------------------------------------------

/// One stored scan: currently just its measurement matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanRecord {
    pub matrix: Matrix,
}

/// Keyed collection of scans, `"<sensor>_<index>"` for raw data and
/// `"<sensor>"` for background data.
pub type ScanSet = BTreeMap<String, ScanRecord>;

/// Sensor identifier for a scan key: everything before the first underscore.
pub fn sensor_of(key: &str) -> &str {
    key.split('_').next().unwrap_or(key)
}

/// Key of repeated scan `index` for `sensor`.
pub fn scan_key(sensor: &str, index: usize) -> String {
    format!("{sensor}_{index}")
}

// ---------------------------------------------------------------------------
// Metadata table
// ---------------------------------------------------------------------------

/// A single metadata row (one scan).
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataRow {
    /// Scan key this row describes; `None` when the cell was empty or not text.
    pub filename: Option<String>,
    /// Every other column: column_name → value.
    pub fields: BTreeMap<String, MetadataValue>,
}

/// Row-oriented metadata, in source order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataTable {
    pub rows: Vec<MetadataRow>,
    /// Passthrough column names in source order (filename column excluded).
    pub column_names: Vec<String>,
}

impl MetadataTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Filenames in row order, skipping rows without one.
    pub fn filenames(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().filter_map(|r| r.filename.as_deref())
    }
}
