use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{
    Array, BooleanArray, Float32Array, Float64Array, Int32Array, Int64Array, LargeListArray,
    LargeStringArray, ListArray, StringArray,
};
use arrow::datatypes::DataType;
use arrow::util::display::array_value_to_string;
use log::debug;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::{Matrix, MetadataRow, MetadataTable, MetadataValue, ScanRecord, ScanSet};
use crate::error::LoadError;

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, LoadError>;

/// Lower-cased file extension, empty when there is none.
pub(crate) fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase()
}

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load the metadata table.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv`     – header row, one row per scan
/// * `.json`    – `[{ "filename": "S1_0", ...meta }, ...]`
/// * `.parquet` – flat columns, one row per scan
///
/// `filename_column` must be present; every other column is passthrough.
pub fn load_metadata(path: &Path, filename_column: &str) -> Result<MetadataTable> {
    let table = match extension_of(path).as_str() {
        "csv" => load_metadata_csv(path, filename_column),
        "json" => load_metadata_json(path, filename_column),
        "parquet" | "pq" => load_metadata_parquet(path, filename_column),
        other => Err(LoadError::UnsupportedExtension(other.to_string())),
    }?;
    debug!(
        "Loaded {} metadata rows ({} passthrough columns) from {}",
        table.len(),
        table.column_names.len(),
        path.display()
    );
    Ok(table)
}

/// Load a keyed scan collection.  Dispatch by extension.
///
/// Supported formats:
/// * `.json`    – `{ "S1_0": { "matrix": [[...], ...] }, ... }`
/// * `.parquet` – `key` (string) and `values` (list of float) columns,
///   one parquet row per matrix row
pub fn load_scans(path: &Path) -> Result<ScanSet> {
    let scans = match extension_of(path).as_str() {
        "json" => load_scans_json(path),
        "parquet" | "pq" => load_scans_parquet(path),
        other => Err(LoadError::UnsupportedExtension(other.to_string())),
    }?;
    debug!("Loaded {} scans from {}", scans.len(), path.display());
    Ok(scans)
}

// ---------------------------------------------------------------------------
// JSON loaders
// ---------------------------------------------------------------------------

fn load_scans_json(path: &Path) -> Result<ScanSet> {
    let text = std::fs::read_to_string(path)?;
    let root: JsonValue = serde_json::from_str(&text)?;

    let entries = root
        .as_object()
        .ok_or_else(|| LoadError::Malformed("expected top-level JSON object".to_string()))?;

    let mut scans = ScanSet::new();
    for (key, record) in entries {
        let matrix_value = record
            .as_object()
            .and_then(|obj| obj.get("matrix"))
            .ok_or_else(|| invalid_scan(key, "record has no 'matrix' field"))?;
        let matrix = json_to_matrix(matrix_value, key)?;
        scans.insert(key.clone(), ScanRecord { matrix });
    }
    Ok(scans)
}

/// Nested arrays become rows; a flat array becomes a single column.
fn json_to_matrix(value: &JsonValue, key: &str) -> Result<Matrix> {
    let items = value
        .as_array()
        .ok_or_else(|| invalid_scan(key, "'matrix' is not an array"))?;

    if items.is_empty() {
        return Ok(Matrix::zeros(0, 0));
    }

    if items.iter().all(JsonValue::is_array) {
        let rows = items
            .iter()
            .enumerate()
            .map(|(i, row)| json_array_to_f64(row, key, i))
            .collect::<Result<Vec<_>>>()?;
        return Matrix::from_rows(rows).ok_or_else(|| invalid_scan(key, "ragged rows"));
    }

    let values = json_array_to_f64(value, key, 0)?;
    Ok(Matrix::column_vector(values))
}

/// JSON has no NaN; `null` stands in for it.
fn json_array_to_f64(value: &JsonValue, key: &str, row: usize) -> Result<Vec<f64>> {
    let arr = value
        .as_array()
        .ok_or_else(|| invalid_scan(key, format!("row {row} is not an array")))?;

    arr.iter()
        .enumerate()
        .map(|(j, v)| match v {
            JsonValue::Null => Ok(f64::NAN),
            other => other
                .as_f64()
                .ok_or_else(|| invalid_scan(key, format!("row {row}, value {j}: not a number"))),
        })
        .collect()
}

fn load_metadata_json(path: &Path, filename_column: &str) -> Result<MetadataTable> {
    let text = std::fs::read_to_string(path)?;
    let root: JsonValue = serde_json::from_str(&text)?;

    let records = root
        .as_array()
        .ok_or_else(|| LoadError::Malformed("expected top-level JSON array".to_string()))?;

    let mut table = MetadataTable::default();
    let mut saw_filename = false;

    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .ok_or_else(|| LoadError::Malformed(format!("row {i} is not a JSON object")))?;

        let mut filename = None;
        let mut fields = BTreeMap::new();
        for (col, val) in obj {
            if col == filename_column {
                saw_filename = true;
                filename = json_to_metadata(val).as_key();
                continue;
            }
            if !table.column_names.contains(col) {
                table.column_names.push(col.clone());
            }
            fields.insert(col.clone(), json_to_metadata(val));
        }
        table.rows.push(MetadataRow { filename, fields });
    }

    if !saw_filename && !records.is_empty() {
        return Err(LoadError::MissingColumn(filename_column.to_string()));
    }
    Ok(table)
}

fn json_to_metadata(val: &JsonValue) -> MetadataValue {
    match val {
        JsonValue::String(s) => MetadataValue::String(s.clone()),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                MetadataValue::Integer(i)
            } else if let Some(f) = n.as_f64() {
                MetadataValue::Float(f)
            } else {
                MetadataValue::String(n.to_string())
            }
        }
        JsonValue::Bool(b) => MetadataValue::Bool(*b),
        JsonValue::Null => MetadataValue::Null,
        other => MetadataValue::String(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout: header row with column names, one row per scan.
/// The filename cell is taken verbatim; other cells are type-guessed.
fn load_metadata_csv(path: &Path, filename_column: &str) -> Result<MetadataTable> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();

    let filename_idx = headers
        .iter()
        .position(|h| h == filename_column)
        .ok_or_else(|| LoadError::MissingColumn(filename_column.to_string()))?;

    let mut table = MetadataTable {
        rows: Vec::new(),
        column_names: headers
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != filename_idx)
            .map(|(_, h)| h.clone())
            .collect(),
    };

    for result in reader.records() {
        let record = result?;

        let filename = record
            .get(filename_idx)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        let mut fields = BTreeMap::new();
        for (col_idx, value) in record.iter().enumerate() {
            if col_idx == filename_idx {
                continue;
            }
            if let Some(col_name) = headers.get(col_idx) {
                fields.insert(col_name.clone(), guess_metadata_type(value));
            }
        }

        table.rows.push(MetadataRow { filename, fields });
    }

    Ok(table)
}

fn guess_metadata_type(s: &str) -> MetadataValue {
    if s.is_empty() {
        return MetadataValue::Null;
    }
    if let Ok(i) = s.parse::<i64>() {
        return MetadataValue::Integer(i);
    }
    if let Ok(f) = s.parse::<f64>() {
        return MetadataValue::Float(f);
    }
    if s == "true" || s == "false" {
        return MetadataValue::Bool(s == "true");
    }
    MetadataValue::String(s.to_string())
}

// ---------------------------------------------------------------------------
// Parquet loaders
// ---------------------------------------------------------------------------

/// Expected schema:
/// - `key`: Utf8 or LargeUtf8 – scan key, repeated for each matrix row
/// - `values`: List<Float64> or LargeList<Float64> – one matrix row;
///   a null list marks a scan that is present but empty
fn load_scans_parquet(path: &Path) -> Result<ScanSet> {
    let file = std::fs::File::open(path)?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;

    // Rows per key in file order
    let mut collected: BTreeMap<String, Vec<Vec<f64>>> = BTreeMap::new();

    for batch_result in reader {
        let batch = batch_result?;
        let schema = batch.schema();

        let key_idx = schema
            .index_of("key")
            .map_err(|_| LoadError::MissingColumn("key".to_string()))?;
        let values_idx = schema
            .index_of("values")
            .map_err(|_| LoadError::MissingColumn("values".to_string()))?;

        let key_col = batch.column(key_idx);
        let values_col = batch.column(values_idx);

        for row in 0..batch.num_rows() {
            let key = extract_string(key_col, row)
                .ok_or_else(|| LoadError::Malformed(format!("row {row}: null or non-string key")))?;
            let rows = collected.entry(key.clone()).or_default();
            if values_col.is_null(row) {
                continue;
            }
            rows.push(extract_f64_list(values_col, row, &key)?);
        }
    }

    collected
        .into_iter()
        .map(|(key, rows)| {
            let matrix = Matrix::from_rows(rows).ok_or_else(|| invalid_scan(&key, "ragged rows"))?;
            Ok((key, ScanRecord { matrix }))
        })
        .collect()
}

/// Flat columns; the filename column may be string or integer typed.
fn load_metadata_parquet(path: &Path, filename_column: &str) -> Result<MetadataTable> {
    let file = std::fs::File::open(path)?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;

    let mut table = MetadataTable::default();

    for batch_result in reader {
        let batch = batch_result?;
        let schema = batch.schema();

        let filename_idx = schema
            .index_of(filename_column)
            .map_err(|_| LoadError::MissingColumn(filename_column.to_string()))?;

        let meta_cols: Vec<(usize, String)> = schema
            .fields()
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != filename_idx)
            .map(|(i, f)| (i, f.name().clone()))
            .collect();

        if table.column_names.is_empty() {
            table.column_names = meta_cols.iter().map(|(_, name)| name.clone()).collect();
        }

        for row in 0..batch.num_rows() {
            let filename = extract_metadata_value(batch.column(filename_idx), row).as_key();

            let mut fields = BTreeMap::new();
            for (col_idx, col_name) in &meta_cols {
                let value = extract_metadata_value(batch.column(*col_idx), row);
                fields.insert(col_name.clone(), value);
            }
            table.rows.push(MetadataRow { filename, fields });
        }
    }

    Ok(table)
}

// -- Parquet / Arrow helpers --

fn extract_string(col: &Arc<dyn Array>, row: usize) -> Option<String> {
    if col.is_null(row) {
        return None;
    }
    if let Some(s) = col.as_any().downcast_ref::<StringArray>() {
        Some(s.value(row).to_string())
    } else {
        col.as_any()
            .downcast_ref::<LargeStringArray>()
            .map(|s| s.value(row).to_string())
    }
}

/// Extract a `Vec<f64>` from a List or LargeList column at the given row.
fn extract_f64_list(col: &Arc<dyn Array>, row: usize, key: &str) -> Result<Vec<f64>> {
    let values_array = match col.data_type() {
        DataType::List(_) => col
            .as_any()
            .downcast_ref::<ListArray>()
            .map(|list| list.value(row)),
        DataType::LargeList(_) => col
            .as_any()
            .downcast_ref::<LargeListArray>()
            .map(|list| list.value(row)),
        other => {
            return Err(invalid_scan(
                key,
                format!("expected List or LargeList column, got {other:?}"),
            ))
        }
    }
    .ok_or_else(|| invalid_scan(key, "list column could not be read"))?;

    // The inner array can be Float64 or Float32
    if let Some(f64_arr) = values_array.as_any().downcast_ref::<Float64Array>() {
        Ok(f64_arr.iter().map(|v| v.unwrap_or(f64::NAN)).collect())
    } else if let Some(f32_arr) = values_array.as_any().downcast_ref::<Float32Array>() {
        Ok(f32_arr
            .iter()
            .map(|v| v.map_or(f64::NAN, f64::from))
            .collect())
    } else {
        Err(invalid_scan(
            key,
            format!(
                "list inner type is {:?}, expected Float64 or Float32",
                values_array.data_type()
            ),
        ))
    }
}

/// Extract a single metadata value from an Arrow column at a given row.
fn extract_metadata_value(col: &Arc<dyn Array>, row: usize) -> MetadataValue {
    if col.is_null(row) {
        return MetadataValue::Null;
    }
    let any = col.as_any();
    let value = match col.data_type() {
        DataType::Utf8 | DataType::LargeUtf8 => {
            extract_string(col, row).map(MetadataValue::String)
        }
        DataType::Int32 => any
            .downcast_ref::<Int32Array>()
            .map(|arr| MetadataValue::Integer(i64::from(arr.value(row)))),
        DataType::Int64 => any
            .downcast_ref::<Int64Array>()
            .map(|arr| MetadataValue::Integer(arr.value(row))),
        DataType::Float32 => any
            .downcast_ref::<Float32Array>()
            .map(|arr| MetadataValue::Float(f64::from(arr.value(row)))),
        DataType::Float64 => any
            .downcast_ref::<Float64Array>()
            .map(|arr| MetadataValue::Float(arr.value(row))),
        DataType::Boolean => any
            .downcast_ref::<BooleanArray>()
            .map(|arr| MetadataValue::Bool(arr.value(row))),
        DataType::Date32 | DataType::Date64 | DataType::Timestamp(_, _) => {
            array_value_to_string(col, row).ok().map(MetadataValue::Date)
        }
        _ => array_value_to_string(col, row).ok().map(MetadataValue::String),
    };
    value.unwrap_or(MetadataValue::Null)
}

fn invalid_scan(key: &str, reason: impl Into<String>) -> LoadError {
    LoadError::InvalidScan {
        key: key.to_string(),
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::Builder;

    fn temp_with(suffix: &str, contents: &str) -> tempfile::NamedTempFile {
        let mut file = Builder::new().suffix(suffix).tempfile().unwrap();
        write!(file, "{contents}").unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_scans_json() -> Result<()> {
        let file = temp_with(
            ".json",
            r#"{
                "S1_0": {"matrix": [[1.0, 2.0], [3.0, 4.0]]},
                "S1_1": {"matrix": [5, 6, 7]},
                "S2_0": {"matrix": []}
            }"#,
        );

        let scans = load_scans(file.path())?;
        assert_eq!(scans.len(), 3);
        assert_eq!(scans["S1_0"].matrix.shape(), (2, 2));
        assert_eq!(scans["S1_0"].matrix.get(1, 0), 3.0);
        assert_eq!(scans["S1_1"].matrix.shape(), (3, 1));
        assert!(scans["S2_0"].matrix.is_empty());
        Ok(())
    }

    #[test]
    fn test_load_scans_json_null_is_nan() -> Result<()> {
        let file = temp_with(".json", r#"{"S1": {"matrix": [[1.0, null]]}}"#);
        let scans = load_scans(file.path())?;
        assert!(scans["S1"].matrix.get(0, 1).is_nan());
        Ok(())
    }

    #[test]
    fn test_load_scans_json_rejects_ragged() {
        let file = temp_with(".json", r#"{"S1_0": {"matrix": [[1.0, 2.0], [3.0]]}}"#);
        let err = load_scans(file.path()).unwrap_err();
        assert!(matches!(err, LoadError::InvalidScan { .. }));
    }

    #[test]
    fn test_load_scans_json_missing_matrix() {
        let file = temp_with(".json", r#"{"S1_0": {"data": [1.0]}}"#);
        assert!(matches!(
            load_scans(file.path()),
            Err(LoadError::InvalidScan { .. })
        ));
    }

    #[test]
    fn test_load_scans_missing_file() {
        let err = load_scans(Path::new("/nonexistent/x_raw.json")).unwrap_err();
        assert!(matches!(err, LoadError::Io(_)));
    }

    #[test]
    fn test_unsupported_extension() {
        let file = temp_with(".pickle", "not really a pickle");
        assert!(matches!(
            load_scans(file.path()),
            Err(LoadError::UnsupportedExtension(ext)) if ext == "pickle"
        ));
    }

    #[test]
    fn test_load_metadata_csv() -> Result<()> {
        let file = temp_with(
            ".csv",
            "filename,sensor,gain\nS1_0,alpha,40\nS1_1,alpha,40\n,beta,\n007,gamma,1.5\n",
        );

        let table = load_metadata(file.path(), "filename")?;
        assert_eq!(table.len(), 4);
        assert_eq!(table.column_names, vec!["sensor", "gain"]);
        assert_eq!(table.rows[0].filename.as_deref(), Some("S1_0"));
        assert_eq!(
            table.rows[0].fields["sensor"],
            MetadataValue::String("alpha".to_string())
        );
        assert_eq!(table.rows[1].fields["gain"], MetadataValue::Integer(40));
        assert_eq!(table.rows[2].filename, None);
        assert_eq!(table.rows[2].fields["gain"], MetadataValue::Null);
        // filename cells are kept verbatim
        assert_eq!(table.rows[3].filename.as_deref(), Some("007"));
        Ok(())
    }

    #[test]
    fn test_load_metadata_csv_missing_column() {
        let file = temp_with(".csv", "name,sensor\nS1_0,alpha\n");
        assert!(matches!(
            load_metadata(file.path(), "filename"),
            Err(LoadError::MissingColumn(col)) if col == "filename"
        ));
    }

    #[test]
    fn test_load_metadata_parquet() -> Result<()> {
        use arrow::array::Date32Array;
        use arrow::datatypes::{Field, Schema};
        use arrow::record_batch::RecordBatch;
        use parquet::arrow::ArrowWriter;

        let schema = Arc::new(Schema::new(vec![
            Field::new("filename", DataType::Utf8, true),
            Field::new("gain", DataType::Int64, true),
            Field::new("measured", DataType::Date32, true),
        ]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(StringArray::from(vec![Some("S1_0"), None])),
                Arc::new(Int64Array::from(vec![40, 50])),
                // days since the epoch: 2024-01-01, then null
                Arc::new(Date32Array::from(vec![Some(19723), None])),
            ],
        )
        .unwrap();

        let file = Builder::new().suffix(".parquet").tempfile().unwrap();
        let mut writer = ArrowWriter::try_new(file.reopen().unwrap(), schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let table = load_metadata(file.path(), "filename")?;
        assert_eq!(table.len(), 2);
        assert_eq!(table.column_names, vec!["gain", "measured"]);
        assert_eq!(table.rows[0].filename.as_deref(), Some("S1_0"));
        assert_eq!(table.rows[0].fields["gain"], MetadataValue::Integer(40));
        assert_eq!(
            table.rows[0].fields["measured"],
            MetadataValue::Date("2024-01-01".to_string())
        );
        assert_eq!(table.rows[1].filename, None);
        assert_eq!(table.rows[1].fields["measured"], MetadataValue::Null);
        Ok(())
    }

    #[test]
    fn test_load_metadata_json() -> Result<()> {
        let file = temp_with(
            ".json",
            r#"[{"filename": "S1_0", "operator": "Ana"}, {"filename": "S1_1", "run": 2}]"#,
        );
        let table = load_metadata(file.path(), "filename")?;
        assert_eq!(table.filenames().collect::<Vec<_>>(), vec!["S1_0", "S1_1"]);
        assert_eq!(table.rows[1].fields["run"], MetadataValue::Integer(2));
        assert!(table.column_names.contains(&"operator".to_string()));
        Ok(())
    }
}
