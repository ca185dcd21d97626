#![forbid(unsafe_code)]

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ShapeError {
    #[error("numeric data length {len} does not match shape {shape:?} (expected {expected})")]
    DataLength {
        shape: Vec<usize>,
        expected: usize,
        len: usize,
    },
    #[error("cell grid {rows}x{cols} needs {expected} cells but got {len}")]
    CellCount {
        rows: usize,
        cols: usize,
        expected: usize,
        len: usize,
    },
}

/// Dense numeric array of fixed shape, stored row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawNumericArray")]
pub struct NumericArray {
    shape: Vec<usize>,
    data: Vec<f64>,
}

#[derive(Deserialize)]
struct RawNumericArray {
    shape: Vec<usize>,
    data: Vec<f64>,
}

impl TryFrom<RawNumericArray> for NumericArray {
    type Error = ShapeError;

    fn try_from(raw: RawNumericArray) -> Result<Self, Self::Error> {
        Self::new(raw.shape, raw.data)
    }
}

impl NumericArray {
    pub fn new(shape: Vec<usize>, data: Vec<f64>) -> Result<Self, ShapeError> {
        let expected = shape.iter().product::<usize>();
        if expected != data.len() {
            return Err(ShapeError::DataLength {
                shape,
                expected,
                len: data.len(),
            });
        }
        Ok(Self { shape, data })
    }

    #[must_use]
    pub fn scalar(value: f64) -> Self {
        Self {
            shape: vec![1, 1],
            data: vec![value],
        }
    }

    /// A `1 x n` row vector.
    #[must_use]
    pub fn row(values: Vec<f64>) -> Self {
        Self {
            shape: vec![1, values.len()],
            data: values,
        }
    }

    #[must_use]
    pub fn empty() -> Self {
        Self {
            shape: vec![0, 0],
            data: Vec::new(),
        }
    }

    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    #[must_use]
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Shape rendered as `3x4`.
    #[must_use]
    pub fn shape_label(&self) -> String {
        shape_label(&self.shape)
    }
}

#[must_use]
pub fn shape_label(shape: &[usize]) -> String {
    shape
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("x")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Numeric,
    Text,
    Nested,
    Cells,
    Empty,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Numeric => "numeric",
            Self::Text => "text",
            Self::Nested => "nested",
            Self::Cells => "cells",
            Self::Empty => "empty",
        };
        f.write_str(name)
    }
}

/// One entry of a heterogeneous cell grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum CellValue {
    Numeric(NumericArray),
    Text(String),
    Empty,
}

impl CellValue {
    #[must_use]
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Numeric(_) => ValueKind::Numeric,
            Self::Text(_) => ValueKind::Text,
            Self::Empty => ValueKind::Empty,
        }
    }
}

/// Fixed-shape 2-D grid whose entries are typed independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCellGrid")]
pub struct CellGrid {
    rows: usize,
    cols: usize,
    cells: Vec<CellValue>,
}

#[derive(Deserialize)]
struct RawCellGrid {
    rows: usize,
    cols: usize,
    cells: Vec<CellValue>,
}

impl TryFrom<RawCellGrid> for CellGrid {
    type Error = ShapeError;

    fn try_from(raw: RawCellGrid) -> Result<Self, Self::Error> {
        Self::new(raw.rows, raw.cols, raw.cells)
    }
}

impl CellGrid {
    pub fn new(rows: usize, cols: usize, cells: Vec<CellValue>) -> Result<Self, ShapeError> {
        let expected = rows * cols;
        if expected != cells.len() {
            return Err(ShapeError::CellCount {
                rows,
                cols,
                expected,
                len: cells.len(),
            });
        }
        Ok(Self { rows, cols, cells })
    }

    /// Views a 2-D numeric matrix as a grid of `1x1` numeric cells.
    ///
    /// Returns `None` for arrays of any other rank.
    #[must_use]
    pub fn from_numeric(array: &NumericArray) -> Option<Self> {
        let &[rows, cols] = array.shape() else {
            return None;
        };
        let cells = array
            .data()
            .iter()
            .map(|value| CellValue::Numeric(NumericArray::scalar(*value)))
            .collect();
        Some(Self { rows, cols, cells })
    }

    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> Option<&CellValue> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        self.cells.get(row * self.cols + col)
    }

    #[must_use]
    pub fn cells(&self) -> &[CellValue] {
        &self.cells
    }
}

/// Ordered field mapping. Field order is declaration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    fields: Vec<(String, DataValue)>,
}

/// The variables of one loaded data file.
pub type DataObject = Record;

impl Record {
    #[must_use]
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Insert or replace a field; a replaced field keeps its original position.
    pub fn insert(&mut self, name: impl Into<String>, value: DataValue) {
        let name = name.into();
        match self.fields.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((name, value)),
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&DataValue> {
        self.fields
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &DataValue)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, DataValue)> for Record {
    fn from_iter<T: IntoIterator<Item = (S, DataValue)>>(iter: T) -> Self {
        let mut record = Self::new();
        for (name, value) in iter {
            record.insert(name, value);
        }
        record
    }
}

/// A loaded value. The variant is decided once, at load time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum DataValue {
    Numeric(NumericArray),
    Text(String),
    Nested(Record),
    Cells(CellGrid),
    Empty,
}

impl DataValue {
    #[must_use]
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Numeric(_) => ValueKind::Numeric,
            Self::Text(_) => ValueKind::Text,
            Self::Nested(_) => ValueKind::Nested,
            Self::Cells(_) => ValueKind::Cells,
            Self::Empty => ValueKind::Empty,
        }
    }

    #[must_use]
    pub fn as_numeric(&self) -> Option<&NumericArray> {
        match self {
            Self::Numeric(array) => Some(array),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_nested(&self) -> Option<&Record> {
        match self {
            Self::Nested(record) => Some(record),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_cells(&self) -> Option<&CellGrid> {
        match self {
            Self::Cells(grid) => Some(grid),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Pass,
    Fail,
    Warn,
    Skip,
    Error,
}

impl Verdict {
    pub const ALL: [Self; 5] = [Self::Pass, Self::Fail, Self::Warn, Self::Skip, Self::Error];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
            Self::Warn => "WARN",
            Self::Skip => "SKIP",
            Self::Error => "ERROR",
        }
    }

    /// `PASS` when `ok`, `FAIL` otherwise.
    #[must_use]
    pub fn from_ok(ok: bool) -> Self {
        if ok { Self::Pass } else { Self::Fail }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Semantic tag assigned from a file's name and extension.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FileType {
    NumericTimeseries,
    SpikeWaveform,
    ClusterLabelTable,
    QualityMetricRecord,
    NumericGeneric,
    StructGeneric,
    ChannelNameList,
    SortOrderList,
    StructuredTable,
    /// `generic<ext>`; `extension` is lowercase without the dot, empty when absent.
    Generic { extension: String },
}

impl FileType {
    #[must_use]
    pub fn generic(extension: &str) -> Self {
        Self::Generic {
            extension: extension.to_ascii_lowercase(),
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            Self::NumericTimeseries => "numeric-timeseries",
            Self::SpikeWaveform => "spike-waveform",
            Self::ClusterLabelTable => "cluster-label-table",
            Self::QualityMetricRecord => "quality-metric-record",
            Self::NumericGeneric => "numeric-generic",
            Self::StructGeneric => "struct-generic",
            Self::ChannelNameList => "channel-name-list",
            Self::SortOrderList => "sort-order-list",
            Self::StructuredTable => "structured-table",
            Self::Generic { extension } if extension.is_empty() => "generic",
            Self::Generic { extension } => return write!(f, "generic.{extension}"),
        };
        f.write_str(tag)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown file type tag: {0:?}")]
pub struct UnknownFileType(pub String);

impl FromStr for FileType {
    type Err = UnknownFileType;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        let file_type = match tag {
            "numeric-timeseries" => Self::NumericTimeseries,
            "spike-waveform" => Self::SpikeWaveform,
            "cluster-label-table" => Self::ClusterLabelTable,
            "quality-metric-record" => Self::QualityMetricRecord,
            "numeric-generic" => Self::NumericGeneric,
            "struct-generic" => Self::StructGeneric,
            "channel-name-list" => Self::ChannelNameList,
            "sort-order-list" => Self::SortOrderList,
            "structured-table" => Self::StructuredTable,
            "generic" => Self::generic(""),
            other => match other.strip_prefix("generic.") {
                Some(extension) if !extension.is_empty() => Self::generic(extension),
                _ => return Err(UnknownFileType(other.to_owned())),
            },
        };
        Ok(file_type)
    }
}

impl From<FileType> for String {
    fn from(value: FileType) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for FileType {
    type Error = UnknownFileType;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// What a comparator concluded for one file pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckOutcome {
    pub verdict: Verdict,
    pub detail: String,
    pub size_delta_bytes: Option<i64>,
}

impl CheckOutcome {
    #[must_use]
    pub fn new(verdict: Verdict, detail: impl Into<String>) -> Self {
        Self {
            verdict,
            detail: detail.into(),
            size_delta_bytes: None,
        }
    }

    #[must_use]
    pub fn pass(detail: impl Into<String>) -> Self {
        Self::new(Verdict::Pass, detail)
    }

    #[must_use]
    pub fn fail(detail: impl Into<String>) -> Self {
        Self::new(Verdict::Fail, detail)
    }

    #[must_use]
    pub fn with_size_delta(mut self, delta: i64) -> Self {
        self.size_delta_bytes = Some(delta);
        self
    }
}

/// One row of the parity report. Field order is the serialized column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonEntry {
    relative_path: String,
    file_type: FileType,
    check_name: String,
    verdict: Verdict,
    detail: String,
    size_delta_bytes: Option<i64>,
}

impl ComparisonEntry {
    #[must_use]
    pub fn new(
        relative_path: impl Into<String>,
        file_type: FileType,
        check_name: impl Into<String>,
        outcome: CheckOutcome,
    ) -> Self {
        Self {
            relative_path: relative_path.into(),
            file_type,
            check_name: check_name.into(),
            verdict: outcome.verdict,
            detail: outcome.detail,
            size_delta_bytes: outcome.size_delta_bytes,
        }
    }

    #[must_use]
    pub fn relative_path(&self) -> &str {
        &self.relative_path
    }

    #[must_use]
    pub fn file_type(&self) -> &FileType {
        &self.file_type
    }

    #[must_use]
    pub fn check_name(&self) -> &str {
        &self.check_name
    }

    #[must_use]
    pub fn verdict(&self) -> Verdict {
        self.verdict
    }

    #[must_use]
    pub fn detail(&self) -> &str {
        &self.detail
    }

    #[must_use]
    pub fn size_delta_bytes(&self) -> Option<i64> {
        self.size_delta_bytes
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerdictSummary {
    pub pass: usize,
    pub fail: usize,
    pub warn: usize,
    pub skip: usize,
    pub error: usize,
    pub total: usize,
}

impl VerdictSummary {
    #[must_use]
    pub fn from_entries(entries: &[ComparisonEntry]) -> Self {
        let mut summary = Self::default();
        for entry in entries {
            summary.add(entry.verdict());
        }
        summary
    }

    pub fn add(&mut self, verdict: Verdict) {
        match verdict {
            Verdict::Pass => self.pass += 1,
            Verdict::Fail => self.fail += 1,
            Verdict::Warn => self.warn += 1,
            Verdict::Skip => self.skip += 1,
            Verdict::Error => self.error += 1,
        }
        self.total += 1;
    }

    #[must_use]
    pub fn count(&self, verdict: Verdict) -> usize {
        match verdict {
            Verdict::Pass => self.pass,
            Verdict::Fail => self.fail,
            Verdict::Warn => self.warn,
            Verdict::Skip => self.skip,
            Verdict::Error => self.error,
        }
    }

    #[must_use]
    pub fn render_plain(&self) -> String {
        let counts = Verdict::ALL
            .iter()
            .map(|verdict| format!("{verdict}={}", self.count(*verdict)))
            .collect::<Vec<_>>()
            .join(" ");
        format!("{counts} total={}", self.total)
    }
}
