//! Writers for the flattened CSV output and for scan collections.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{Float64Builder, ListBuilder, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use log::info;
use parquet::arrow::ArrowWriter;
use serde_json::{json, Map, Value as JsonValue};

use super::loader::extension_of;
use super::model::{Matrix, ScanSet};
use crate::error::WriteError;

/// Result type for write operations.
pub type Result<T> = std::result::Result<T, WriteError>;

/// What was written by [`write_flattened_csv`].
#[derive(Debug, Clone, PartialEq)]
pub struct WriteSummary {
    pub path: PathBuf,
    /// Data rows, one per sensor.
    pub rows: usize,
    /// Value columns after the index column.
    pub columns: usize,
}

/// Creates parent directories for a file path if they don't exist.
fn ensure_parent_dirs(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| WriteError::CreateDirectory {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
    }
    Ok(())
}

fn create_file(path: &Path) -> Result<File> {
    File::create(path).map_err(|e| WriteError::Io {
        path: path.display().to_string(),
        source: e,
    })
}

/// Text form of one output cell. NaN becomes an empty cell, everything else
/// uses the shortest representation that parses back to the same value.
fn format_value(v: f64) -> String {
    if v.is_nan() {
        String::new()
    } else {
        format!("{v:?}")
    }
}

// ---------------------------------------------------------------------------
// Flattened CSV
// ---------------------------------------------------------------------------

/// Write one row per sensor: the sensor key, then the matrix flattened in
/// row-major order.
///
/// The header is an empty index cell followed by the column positions
/// `0..n`, where `n` is the longest flattened row. Shorter rows are padded
/// with empty cells.
pub fn write_flattened_csv(path: &Path, rows: &[(String, Matrix)]) -> Result<WriteSummary> {
    ensure_parent_dirs(path)?;
    let path_str = path.display().to_string();
    let csv_err = |source: csv::Error| WriteError::Csv {
        path: path_str.clone(),
        source,
    };

    let mut writer = csv::WriterBuilder::new()
        .flexible(false)
        .from_writer(BufWriter::new(create_file(path)?));

    let columns = rows.iter().map(|(_, m)| m.as_slice().len()).max().unwrap_or(0);

    let header = std::iter::once(String::new()).chain((0..columns).map(|i| i.to_string()));
    writer.write_record(header).map_err(csv_err)?;

    for (sensor, matrix) in rows {
        let values = matrix.as_slice();
        let record = std::iter::once(sensor.clone()).chain(
            (0..columns).map(|i| values.get(i).copied().map(format_value).unwrap_or_default()),
        );
        writer.write_record(record).map_err(csv_err)?;
    }

    writer.flush().map_err(|e| WriteError::Io {
        path: path_str.clone(),
        source: e,
    })?;

    info!("Processed data saved to {}", path.display());
    Ok(WriteSummary {
        path: path.to_path_buf(),
        rows: rows.len(),
        columns,
    })
}

// ---------------------------------------------------------------------------
// Scan collections
// ---------------------------------------------------------------------------

/// Write a scan collection in the layout [`load_scans`](super::loader::load_scans)
/// reads back. Dispatch by extension (`.json`, `.parquet`/`.pq`).
pub fn save_scans(path: &Path, scans: &ScanSet) -> Result<()> {
    ensure_parent_dirs(path)?;
    match extension_of(path).as_str() {
        "json" => save_scans_json(path, scans),
        "parquet" | "pq" => save_scans_parquet(path, scans),
        other => Err(WriteError::UnsupportedExtension(other.to_string())),
    }
}

fn save_scans_json(path: &Path, scans: &ScanSet) -> Result<()> {
    let mut root = Map::new();
    for (key, record) in scans {
        let rows: Vec<JsonValue> = record
            .matrix
            .iter_rows()
            .map(|row| json!(row))
            .collect();
        root.insert(key.clone(), json!({ "matrix": rows }));
    }

    let writer = BufWriter::new(create_file(path)?);
    serde_json::to_writer(writer, &JsonValue::Object(root)).map_err(|e| WriteError::Json {
        path: path.display().to_string(),
        source: e,
    })
}

/// One parquet row per matrix row; a scan without rows is stored as a single
/// row with a null `values` list so the key survives.
fn save_scans_parquet(path: &Path, scans: &ScanSet) -> Result<()> {
    let path_str = path.display().to_string();

    let mut keys: Vec<&str> = Vec::new();
    let mut values_builder = ListBuilder::new(Float64Builder::new());
    for (key, record) in scans {
        if record.matrix.rows() == 0 {
            keys.push(key);
            values_builder.append(false);
            continue;
        }
        for row in record.matrix.iter_rows() {
            keys.push(key);
            values_builder.values().append_slice(row);
            values_builder.append(true);
        }
        // zero-column rows are not yielded by iter_rows
        if record.matrix.cols() == 0 {
            for _ in 0..record.matrix.rows() {
                keys.push(key);
                values_builder.append(true);
            }
        }
    }

    let schema = Arc::new(Schema::new(vec![
        Field::new("key", DataType::Utf8, false),
        Field::new(
            "values",
            DataType::List(Arc::new(Field::new("item", DataType::Float64, true))),
            true,
        ),
    ]));

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(StringArray::from(keys)),
            Arc::new(values_builder.finish()),
        ],
    )
    .map_err(|e| WriteError::Arrow {
        path: path_str.clone(),
        source: e,
    })?;

    let parquet_err = |source| WriteError::Parquet {
        path: path_str.clone(),
        source,
    };
    let mut writer = ArrowWriter::try_new(create_file(path)?, schema, None).map_err(parquet_err)?;
    writer.write(&batch).map_err(parquet_err)?;
    writer.close().map_err(parquet_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::loader::load_scans;
    use crate::data::model::ScanRecord;
    use tempfile::tempdir;

    fn m(rows: Vec<Vec<f64>>) -> Matrix {
        Matrix::from_rows(rows).unwrap()
    }

    fn sample_scans() -> ScanSet {
        let mut scans = ScanSet::new();
        scans.insert(
            "S1_0".to_string(),
            ScanRecord {
                matrix: m(vec![vec![1.5, -2.0], vec![0.1, 3.0]]),
            },
        );
        scans.insert(
            "S1_1".to_string(),
            ScanRecord {
                matrix: Matrix::column_vector(vec![4.0, 5.0, 6.0]),
            },
        );
        scans.insert(
            "S2".to_string(),
            ScanRecord {
                matrix: Matrix::zeros(0, 0),
            },
        );
        scans
    }

    #[test]
    fn test_write_flattened_csv_layout() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("out.csv");
        let rows = vec![
            ("S1".to_string(), m(vec![vec![1.0, 0.0], vec![0.25, 2.0]])),
            ("S2".to_string(), Matrix::column_vector(vec![f64::NAN, 3.5])),
        ];

        let summary = write_flattened_csv(&path, &rows).unwrap();
        assert_eq!(summary.rows, 2);
        assert_eq!(summary.columns, 4);

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, vec![",0,1,2,3", "S1,1.0,0.0,0.25,2.0", "S2,,3.5,,"]);
    }

    #[test]
    fn test_write_flattened_csv_no_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        let summary = write_flattened_csv(&path, &[]).unwrap();
        assert_eq!(summary.rows, 0);
        assert_eq!(summary.columns, 0);
        assert_eq!(fs::read_to_string(&path).unwrap().lines().count(), 1);
    }

    #[test]
    fn test_scans_survive_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scans.json");
        let scans = sample_scans();
        save_scans(&path, &scans).unwrap();
        assert_eq!(load_scans(&path).unwrap(), scans);
    }

    #[test]
    fn test_scans_survive_parquet() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scans.parquet");
        let scans = sample_scans();
        save_scans(&path, &scans).unwrap();

        let loaded = load_scans(&path).unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded["S1_0"], scans["S1_0"]);
        assert_eq!(loaded["S1_1"], scans["S1_1"]);
        assert!(loaded["S2"].matrix.is_empty());
    }

    #[test]
    fn test_save_scans_unsupported_extension() {
        let dir = tempdir().unwrap();
        let err = save_scans(&dir.path().join("scans.pickle"), &sample_scans()).unwrap_err();
        assert!(matches!(err, WriteError::UnsupportedExtension(_)));
    }
}
