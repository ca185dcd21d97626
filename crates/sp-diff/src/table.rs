use std::path::Path;

use sp_io::{DelimitedTable, TableCell, read_table_path};
use sp_types::CheckOutcome;

use crate::{
    CellMismatch, CompareError, MismatchKind, Side, Tolerance, element_deviation, format_g,
    preview_text, render_mismatches,
};

pub fn compare_table_files(
    new: &Path,
    old: &Path,
    tolerance: Tolerance,
) -> Result<CheckOutcome, CompareError> {
    let new_table = read_table_path(new).map_err(|source| CompareError::load(Side::New, source))?;
    let old_table = read_table_path(old).map_err(|source| CompareError::load(Side::Old, source))?;
    Ok(compare_tables(&new_table, &old_table, tolerance))
}

/// Column-wise table comparison: numbers within tolerance, text exactly.
///
/// Rows of different width on the two sides are schema mismatches; fields
/// beyond the header are compared like any other.
#[must_use]
pub fn compare_tables(
    new: &DelimitedTable,
    old: &DelimitedTable,
    tolerance: Tolerance,
) -> CheckOutcome {
    if new.headers != old.headers {
        return CheckOutcome::fail(format!(
            "column names differ: NEW=[{}] OLD=[{}]",
            new.headers.join(", "),
            old.headers.join(", ")
        ));
    }
    if new.row_count() != old.row_count() {
        return CheckOutcome::fail(format!(
            "Different number of rows: NEW={} OLD={}",
            new.row_count(),
            old.row_count()
        ));
    }

    let mut max_deviation = 0.0_f64;
    let mut mismatches = Vec::new();
    for (row_idx, (new_row, old_row)) in new.rows.iter().zip(&old.rows).enumerate() {
        if new_row.len() != old_row.len() {
            mismatches.push(CellMismatch {
                row: row_idx + 1,
                col: new_row.len().min(old_row.len()) + 1,
                kind: MismatchKind::Schema,
                description: format!(
                    "NEW has {} fields OLD has {}",
                    new_row.len(),
                    old_row.len()
                ),
            });
            continue;
        }
        for (col_idx, (new_cell, old_cell)) in new_row.iter().zip(old_row).enumerate() {
            let column = column_label(&new.headers, col_idx);
            let finding = match (new_cell, old_cell) {
                (TableCell::Number(a), TableCell::Number(b)) => {
                    let deviation = element_deviation(*a, *b);
                    max_deviation = max_deviation.max(deviation);
                    tolerance.is_exceeded_by(deviation).then(|| {
                        (
                            MismatchKind::Tolerance,
                            format!("{column}: |Δ| = {}", format_g(deviation)),
                        )
                    })
                }
                (TableCell::Text(a), TableCell::Text(b)) => (a != b).then(|| {
                    (
                        MismatchKind::Value,
                        format!("{column}: NEW='{}' OLD='{}'", preview_text(a), preview_text(b)),
                    )
                }),
                (TableCell::Empty, TableCell::Empty) => None,
                _ => Some((
                    MismatchKind::Type,
                    format!(
                        "{column}: NEW={} OLD={}",
                        cell_kind(new_cell),
                        cell_kind(old_cell)
                    ),
                )),
            };
            if let Some((kind, description)) = finding {
                mismatches.push(CellMismatch {
                    row: row_idx + 1,
                    col: col_idx + 1,
                    kind,
                    description,
                });
            }
        }
    }

    if mismatches.is_empty() {
        CheckOutcome::pass(format!(
            "{} rows x {} columns match (max |Δ| = {})",
            new.row_count(),
            new.column_count(),
            format_g(max_deviation)
        ))
    } else {
        CheckOutcome::fail(render_mismatches(&mismatches))
    }
}

/// Header name, or `#<n>` for fields past the header width.
fn column_label(headers: &[String], col_idx: usize) -> String {
    headers
        .get(col_idx)
        .cloned()
        .unwrap_or_else(|| format!("#{}", col_idx + 1))
}

fn cell_kind(cell: &TableCell) -> &'static str {
    match cell {
        TableCell::Empty => "empty",
        TableCell::Number(_) => "numeric",
        TableCell::Text(_) => "text",
    }
}
