#![forbid(unsafe_code)]

//! Comparators that decide whether a NEW and an OLD pipeline output agree.
//!
//! Every comparator is pure with respect to its inputs and takes the run's
//! [`Tolerance`] explicitly. Structured comparators work on already-loaded
//! [`DataObject`]s; file comparators read the two paths they are given.

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

use sp_io::{DataLoader, IoError};
use sp_types::{DataObject, NumericArray, Record};
use thiserror::Error;

mod cells;
mod files;
mod nested;
mod numeric;
mod table;
mod text;

pub use cells::{compare_cell_grids, compare_heterogeneous_objects};
pub use files::{compare_checksum, compare_checksum_with, compare_sizes};
pub use nested::{compare_nested_objects, compare_records};
pub use numeric::compare_numeric_objects;
pub use table::{compare_table_files, compare_tables};
pub use text::{compare_lines, compare_text_files};

pub const DEFAULT_TOLERANCE: f64 = 1e-6;

/// Previewed mismatches per comparison detail.
pub const MISMATCH_PREVIEW_LIMIT: usize = 5;

const TEXT_PREVIEW_CHARS: usize = 120;

#[derive(Debug, Error)]
pub enum CompareError {
    #[error("cannot read {side} file: {source}")]
    Load {
        side: Side,
        #[source]
        source: IoError,
    },
    #[error("tolerance must be finite and non-negative, got {0}")]
    InvalidTolerance(f64),
}

impl CompareError {
    #[must_use]
    pub fn load(side: Side, source: IoError) -> Self {
        Self::Load { side, source }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    New,
    Old,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::New => "NEW",
            Self::Old => "OLD",
        })
    }
}

/// Maximum absolute elementwise deviation that still counts as equal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerance(f64);

impl Tolerance {
    pub fn new(value: f64) -> Result<Self, CompareError> {
        if !value.is_finite() || value < 0.0 {
            return Err(CompareError::InvalidTolerance(value));
        }
        Ok(Self(value))
    }

    #[must_use]
    pub fn value(self) -> f64 {
        self.0
    }

    /// NaN deviations always exceed.
    #[must_use]
    pub fn is_exceeded_by(self, deviation: f64) -> bool {
        deviation.is_nan() || deviation > self.0
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self(DEFAULT_TOLERANCE)
    }
}

impl fmt::Display for Tolerance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_g(self.0))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MismatchKind {
    Schema,
    Shape,
    Tolerance,
    Type,
    Value,
}

impl fmt::Display for MismatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Schema => "schema mismatch",
            Self::Shape => "shape mismatch",
            Self::Tolerance => "tolerance exceeded",
            Self::Type => "type mismatch",
            Self::Value => "value mismatch",
        })
    }
}

/// One failing position of a grid or table, with 1-based coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct CellMismatch {
    pub row: usize,
    pub col: usize,
    pub kind: MismatchKind,
    pub description: String,
}

impl fmt::Display for CellMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({},{}) {}: {}",
            self.row, self.col, self.kind, self.description
        )
    }
}

/// `<count> mismatching cells: <first five>`.
pub(crate) fn render_mismatches(mismatches: &[CellMismatch]) -> String {
    let preview = mismatches
        .iter()
        .take(MISMATCH_PREVIEW_LIMIT)
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ");
    let hidden = mismatches.len().saturating_sub(MISMATCH_PREVIEW_LIMIT);
    if hidden == 0 {
        format!("{} mismatching cells: {preview}", mismatches.len())
    } else {
        format!(
            "{} mismatching cells: {preview}; ... {hidden} more",
            mismatches.len()
        )
    }
}

/// Result of lining up two numeric arrays.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayCheck {
    ShapeMismatch { new: String, old: String },
    Deviation(f64),
}

#[must_use]
pub fn check_arrays(new: &NumericArray, old: &NumericArray) -> ArrayCheck {
    if new.shape() != old.shape() {
        return ArrayCheck::ShapeMismatch {
            new: new.shape_label(),
            old: old.shape_label(),
        };
    }
    ArrayCheck::Deviation(max_abs_deviation(new.data(), old.data()))
}

/// Largest `|new - old|` over paired elements; `0` for empty input.
/// NaN paired with NaN counts as equal, NaN paired with a number as infinite.
#[must_use]
pub fn max_abs_deviation(new: &[f64], old: &[f64]) -> f64 {
    new.iter()
        .zip(old)
        .map(|(a, b)| element_deviation(*a, *b))
        .fold(0.0, f64::max)
}

fn element_deviation(a: f64, b: f64) -> f64 {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => 0.0,
        (true, false) | (false, true) => f64::INFINITY,
        // equal infinities would otherwise produce NaN
        _ if a == b => 0.0,
        _ => (a - b).abs(),
    }
}

/// `%g`-style rendering: six significant digits, trailing zeros dropped,
/// exponent form outside `1e-4 ..= 1e6` with a two-digit exponent.
#[must_use]
pub fn format_g(value: f64) -> String {
    if value == 0.0 {
        return "0".to_owned();
    }
    if value.is_nan() {
        return "NaN".to_owned();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Inf" } else { "-Inf" }.to_owned();
    }

    let scientific = format!("{value:.5e}");
    let (mantissa, exponent) = scientific
        .split_once('e')
        .unwrap_or((scientific.as_str(), "0"));
    let exponent = exponent.parse::<i32>().unwrap_or(0);
    if !(-4..6).contains(&exponent) {
        let sign = if exponent < 0 { '-' } else { '+' };
        return format!(
            "{}e{sign}{:02}",
            trim_fraction(mantissa),
            exponent.unsigned_abs()
        );
    }

    let decimals = usize::try_from(5 - exponent).unwrap_or(0);
    trim_fraction(&format!("{value:.decimals$}")).to_owned()
}

fn trim_fraction(text: &str) -> &str {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.')
    } else {
        text
    }
}

pub(crate) fn deviation_line(label: &str, deviation: f64, tolerance: Tolerance) -> String {
    if tolerance.is_exceeded_by(deviation) {
        format!(
            "{label}: max |Δ| = {} exceeds tolerance {tolerance}",
            format_g(deviation)
        )
    } else {
        format!("{label}: max |Δ| = {}", format_g(deviation))
    }
}

pub(crate) fn name_sets_differ(new: &Record, old: &Record) -> bool {
    new.len() != old.len() || new.names().any(|name| !old.contains(name))
}

/// Sorted `{a, b, c}` rendering of a record's field names.
pub(crate) fn render_names(record: &Record) -> String {
    let names = record.names().collect::<BTreeSet<_>>();
    format!("{{{}}}", names.into_iter().collect::<Vec<_>>().join(", "))
}

pub(crate) fn preview_text(text: &str) -> String {
    if text.chars().count() <= TEXT_PREVIEW_CHARS {
        return text.to_owned();
    }
    let mut shortened = text.chars().take(TEXT_PREVIEW_CHARS).collect::<String>();
    shortened.push_str("...");
    shortened
}

/// Load both sides of a data-file pair with `loader`.
pub fn load_pair(
    loader: &dyn DataLoader,
    new: &Path,
    old: &Path,
) -> Result<(DataObject, DataObject), CompareError> {
    let new_object = loader
        .load(new)
        .map_err(|source| CompareError::load(Side::New, source))?;
    let old_object = loader
        .load(old)
        .map_err(|source| CompareError::load(Side::Old, source))?;
    Ok((new_object, old_object))
}
