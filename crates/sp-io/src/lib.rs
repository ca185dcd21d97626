#![forbid(unsafe_code)]

use std::fs::{self, File};
use std::io::Read;
use std::path::Path;

use csv::ReaderBuilder;
use serde_json::Value;
use sha2::{Digest, Sha256};
use sp_types::{CellGrid, CellValue, DataObject, DataValue, NumericArray, Record, ShapeError};
use thiserror::Error;

const HASH_CHUNK_BYTES: usize = 64 * 1024;

/// Key of the single-entry object that marks an explicit cell grid.
pub const CELL_GRID_MARKER: &str = "__cells__";

#[derive(Debug, Error)]
pub enum IoError {
    #[error("table input has no headers")]
    MissingHeaders,
    #[error("malformed data container: {0}")]
    Container(String),
    #[error(transparent)]
    Shape(#[from] ShapeError),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Loads the variables stored in one data file.
pub trait DataLoader {
    /// Short identifier used in log lines and skip reasons.
    fn name(&self) -> &str;

    fn load(&self, path: &Path) -> Result<DataObject, IoError>;
}

/// Reads data files that hold a JSON object of named variables.
///
/// Keys are variable names in declaration order. Numbers and booleans become
/// `1x1` numeric arrays, `null` is empty, strings are text, objects are nested
/// records, rectangular numeric arrays keep the shape of their nesting (a flat
/// list is a `1 x n` row) and any other array becomes a cell grid.
///
/// `{"__cells__": [...]}` is always a cell grid, whatever its entries hold, so
/// an all-numeric or empty collection keeps its cell-grid kind.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonVariableLoader;

impl DataLoader for JsonVariableLoader {
    fn name(&self) -> &str {
        "json-variables"
    }

    fn load(&self, path: &Path) -> Result<DataObject, IoError> {
        let body = fs::read(path)?;
        parse_variables_slice(&body)
    }
}

pub fn parse_variables_str(input: &str) -> Result<DataObject, IoError> {
    parse_variables_slice(input.as_bytes())
}

pub fn parse_variables_slice(input: &[u8]) -> Result<DataObject, IoError> {
    match serde_json::from_slice::<Value>(input)? {
        Value::Object(map) => map
            .iter()
            .map(|(name, value)| Ok((name.clone(), value_from_json(value)?)))
            .collect::<Result<Record, IoError>>(),
        other => Err(IoError::Container(format!(
            "top level must be an object of variables, found {}",
            json_kind(&other)
        ))),
    }
}

pub fn value_from_json(value: &Value) -> Result<DataValue, IoError> {
    let converted = match value {
        Value::Null => DataValue::Empty,
        Value::Bool(_) | Value::Number(_) => {
            DataValue::Numeric(NumericArray::scalar(leaf_f64(value)?))
        }
        Value::String(text) => DataValue::Text(text.clone()),
        Value::Object(map) => match explicit_cells(map) {
            Some(items) => DataValue::Cells(cells_from_items(items)?),
            None => DataValue::Nested(
                map.iter()
                    .map(|(name, field)| Ok((name.clone(), value_from_json(field)?)))
                    .collect::<Result<Record, IoError>>()?,
            ),
        },
        Value::Array(items) => match numeric_from_items(items)? {
            Some(array) => DataValue::Numeric(array),
            None => DataValue::Cells(cells_from_items(items)?),
        },
    };
    Ok(converted)
}

fn explicit_cells(map: &serde_json::Map<String, Value>) -> Option<&[Value]> {
    if map.len() != 1 {
        return None;
    }
    map.get(CELL_GRID_MARKER)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
}

fn leaf_f64(value: &Value) -> Result<f64, IoError> {
    match value {
        Value::Bool(flag) => Ok(if *flag { 1.0 } else { 0.0 }),
        Value::Number(number) => number.as_f64().ok_or_else(|| {
            IoError::Container(format!("number {number} is not representable as f64"))
        }),
        other => Err(IoError::Container(format!(
            "expected a numeric leaf, found {}",
            json_kind(other)
        ))),
    }
}

/// Returns `None` when the items are not a rectangular, purely numeric nest.
fn numeric_from_items(items: &[Value]) -> Result<Option<NumericArray>, IoError> {
    let mut shape = Vec::new();
    let mut data = Vec::new();
    let mut leaf_depth = None;
    if !collect_numeric(items, 0, &mut shape, &mut data, &mut leaf_depth)? {
        return Ok(None);
    }

    let shape = match shape.len() {
        1 if shape[0] == 0 => vec![0, 0],
        1 => vec![1, shape[0]],
        _ => shape,
    };
    Ok(Some(NumericArray::new(shape, data)?))
}

fn collect_numeric(
    items: &[Value],
    depth: usize,
    shape: &mut Vec<usize>,
    data: &mut Vec<f64>,
    leaf_depth: &mut Option<usize>,
) -> Result<bool, IoError> {
    match shape.get(depth) {
        Some(len) if *len != items.len() => return Ok(false),
        Some(_) => {}
        None => shape.push(items.len()),
    }

    for item in items {
        match item {
            Value::Array(nested) => {
                if leaf_depth.is_some_and(|leaf| leaf <= depth + 1) {
                    return Ok(false);
                }
                if !collect_numeric(nested, depth + 1, shape, data, leaf_depth)? {
                    return Ok(false);
                }
            }
            Value::Bool(_) | Value::Number(_) => {
                if leaf_depth.is_some_and(|leaf| leaf != depth + 1) || shape.len() > depth + 1 {
                    return Ok(false);
                }
                *leaf_depth = Some(depth + 1);
                data.push(leaf_f64(item)?);
            }
            _ => return Ok(false),
        }
    }
    Ok(true)
}

fn cells_from_items(items: &[Value]) -> Result<CellGrid, IoError> {
    if items.is_empty() {
        return Ok(CellGrid::new(0, 0, Vec::new())?);
    }
    let all_rows = items.iter().all(Value::is_array);
    if !all_rows {
        let cells = items.iter().map(cell_from_json).collect::<Result<Vec<_>, _>>()?;
        return Ok(CellGrid::new(1, cells.len(), cells)?);
    }

    let mut cols = None;
    let mut cells = Vec::new();
    for (row_idx, row) in items.iter().enumerate() {
        let row = row.as_array().map(Vec::as_slice).unwrap_or_default();
        match cols {
            Some(expected) if expected != row.len() => {
                return Err(IoError::Container(format!(
                    "cell grid row {} has {} entries, expected {expected}",
                    row_idx + 1,
                    row.len()
                )));
            }
            Some(_) => {}
            None => cols = Some(row.len()),
        }
        for entry in row {
            cells.push(cell_from_json(entry)?);
        }
    }
    Ok(CellGrid::new(items.len(), cols.unwrap_or(0), cells)?)
}

fn cell_from_json(value: &Value) -> Result<CellValue, IoError> {
    match value {
        Value::Null => Ok(CellValue::Empty),
        Value::String(text) => Ok(CellValue::Text(text.clone())),
        Value::Bool(_) | Value::Number(_) => {
            Ok(CellValue::Numeric(NumericArray::scalar(leaf_f64(value)?)))
        }
        Value::Array(items) => numeric_from_items(items)?
            .map(CellValue::Numeric)
            .ok_or_else(|| IoError::Container("cell entries must be numeric arrays".to_owned())),
        Value::Object(_) => Err(IoError::Container(
            "nested records are not allowed inside a cell grid".to_owned(),
        )),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TableCell {
    Empty,
    Number(f64),
    Text(String),
}

/// Rows keep every field as read; a row may be narrower or wider than the header.
#[derive(Debug, Clone, PartialEq)]
pub struct DelimitedTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<TableCell>>,
}

impl DelimitedTable {
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn column_count(&self) -> usize {
        self.headers.len()
    }
}

/// Tab for `.tsv`, comma otherwise.
#[must_use]
pub fn delimiter_for(path: &Path) -> u8 {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => b'\t',
        _ => b',',
    }
}

pub fn read_table_path(path: &Path) -> Result<DelimitedTable, IoError> {
    let body = String::from_utf8(fs::read(path)?)?;
    read_table_str(&body, delimiter_for(path))
}

pub fn read_table_str(input: &str, delimiter: u8) -> Result<DelimitedTable, IoError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(input.as_bytes());

    let headers = reader
        .headers()?
        .iter()
        .map(|name| name.trim().to_owned())
        .collect::<Vec<_>>();
    if headers.is_empty() || headers.iter().all(String::is_empty) {
        return Err(IoError::MissingHeaders);
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(parse_cell).collect::<Vec<_>>());
    }

    Ok(DelimitedTable { headers, rows })
}

fn parse_cell(field: &str) -> TableCell {
    let trimmed = field.trim();
    if trimmed.is_empty() {
        return TableCell::Empty;
    }
    if let Ok(value) = trimmed.parse::<i64>() {
        return TableCell::Number(value as f64);
    }
    if let Ok(value) = trimmed.parse::<f64>() {
        return TableCell::Number(value);
    }
    TableCell::Text(trimmed.to_owned())
}

/// Every line of a UTF-8 text file, trimmed of surrounding whitespace.
pub fn read_trimmed_lines(path: &Path) -> Result<Vec<String>, IoError> {
    let body = String::from_utf8(fs::read(path)?)?;
    Ok(trimmed_lines(&body))
}

#[must_use]
pub fn trimmed_lines(body: &str) -> Vec<String> {
    body.lines().map(|line| line.trim().to_owned()).collect()
}

pub fn file_size(path: &Path) -> Result<u64, IoError> {
    Ok(fs::metadata(path)?.len())
}

/// Lowercase hex sha256 of a file, read in fixed-size chunks.
pub fn sha256_file(path: &Path) -> Result<String, IoError> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0_u8; HASH_CHUNK_BYTES];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hasher
        .finalize()
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use sp_types::{CellValue, DataValue, NumericArray, ValueKind};

    use super::{
        DataLoader, IoError, JsonVariableLoader, TableCell, parse_variables_str, read_table_str,
        sha256_file, trimmed_lines,
    };

    #[test]
    fn container_keeps_declaration_order_and_resolves_kinds() {
        let input = r#"{
            "zeta": [[1, 2, 3], [4, 5, 6]],
            "alpha": "label",
            "meta": {"fs": 30000, "shank": {"id": "np1"}},
            "labels": [["good", 3], [null, [1, 2]]],
            "missing": null
        }"#;
        let object = parse_variables_str(input).expect("parse");
        assert_eq!(
            object.names().collect::<Vec<_>>(),
            vec!["zeta", "alpha", "meta", "labels", "missing"]
        );
        let zeta = object.get("zeta").and_then(DataValue::as_numeric).expect("numeric");
        assert_eq!(zeta.shape(), &[2, 3]);
        assert_eq!(zeta.data(), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(object.get("alpha").map(DataValue::kind), Some(ValueKind::Text));
        assert_eq!(object.get("meta").map(DataValue::kind), Some(ValueKind::Nested));
        assert_eq!(object.get("missing").map(DataValue::kind), Some(ValueKind::Empty));

        let labels = object.get("labels").and_then(DataValue::as_cells).expect("cells");
        assert_eq!(labels.shape(), (2, 2));
        assert_eq!(labels.get(1, 0), Some(&CellValue::Empty));
        assert_eq!(
            labels.get(1, 1),
            Some(&CellValue::Numeric(NumericArray::row(vec![1.0, 2.0])))
        );
    }

    #[test]
    fn numeric_shapes_follow_nesting() {
        let object =
            parse_variables_str(r#"{"row": [1, 2], "col": [[1], [2], [3]], "none": [], "s": 4}"#)
                .expect("parse");
        let shape = |name: &str| {
            object
                .get(name)
                .and_then(DataValue::as_numeric)
                .map(|array| array.shape().to_vec())
        };
        assert_eq!(shape("row"), Some(vec![1, 2]));
        assert_eq!(shape("col"), Some(vec![3, 1]));
        assert_eq!(shape("none"), Some(vec![0, 0]));
        assert_eq!(shape("s"), Some(vec![1, 1]));
    }

    #[test]
    fn flat_mixed_array_is_a_single_row_grid() {
        let object = parse_variables_str(r#"{"c": ["a", 1, null]}"#).expect("parse");
        let grid = object.get("c").and_then(DataValue::as_cells).expect("cells");
        assert_eq!(grid.shape(), (1, 3));
    }

    #[test]
    fn marked_cell_grids_stay_cells_even_when_numeric() {
        let object = parse_variables_str(
            r#"{"labels": {"__cells__": [[0, 1], [1, 2]]}, "none": {"__cells__": []}}"#,
        )
        .expect("parse");
        let labels = object.get("labels").and_then(DataValue::as_cells).expect("cells");
        assert_eq!(labels.shape(), (2, 2));
        assert_eq!(
            labels.get(1, 1),
            Some(&CellValue::Numeric(NumericArray::scalar(2.0)))
        );
        let none = object.get("none").and_then(DataValue::as_cells).expect("cells");
        assert_eq!(none.shape(), (0, 0));

        let record =
            parse_variables_str(r#"{"meta": {"__cells__": [1], "fs": 2}}"#).expect("parse");
        assert_eq!(record.get("meta").map(DataValue::kind), Some(ValueKind::Nested));
    }

    #[test]
    fn ragged_grid_and_non_object_top_level_are_rejected() {
        let err = parse_variables_str(r#"{"c": [["a", "b"], ["c"]]}"#).expect_err("ragged");
        assert!(matches!(err, IoError::Container(_)), "got {err:?}");
        let err = parse_variables_str("[1, 2]").expect_err("top level");
        assert!(err.to_string().contains("top level"));
    }

    #[test]
    fn loader_reads_from_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("channels.mat");
        fs::write(&path, r#"{"chanMap": [1, 2, 3]}"#).expect("write");
        let object = JsonVariableLoader.load(&path).expect("load");
        assert!(object.contains("chanMap"));
        assert!(JsonVariableLoader.load(&dir.path().join("absent.mat")).is_err());
    }

    #[test]
    fn table_cells_are_typed_per_field() {
        let table = read_table_str("id,name,score\n1, a ,0.5\n2,,x\n", b',').expect("table");
        assert_eq!(table.headers, vec!["id", "name", "score"]);
        assert_eq!(table.row_count(), 2);
        assert_eq!(
            table.rows[0],
            vec![
                TableCell::Number(1.0),
                TableCell::Text("a".to_owned()),
                TableCell::Number(0.5)
            ]
        );
        assert_eq!(table.rows[1][1], TableCell::Empty);
    }

    #[test]
    fn ragged_rows_keep_every_field() {
        let table = read_table_str("a,b\n1,2,999\n3\n", b',').expect("table");
        assert_eq!(table.column_count(), 2);
        assert_eq!(table.rows[0].len(), 3);
        assert_eq!(table.rows[0][2], TableCell::Number(999.0));
        assert_eq!(table.rows[1], vec![TableCell::Number(3.0)]);
    }

    #[test]
    fn lines_are_trimmed() {
        assert_eq!(trimmed_lines(" a \nb\t\n"), vec!["a", "b"]);
    }

    #[test]
    fn sha256_matches_known_digest() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("abc.bin");
        fs::write(&path, b"abc").expect("write");
        assert_eq!(
            sha256_file(&path).expect("hash"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
