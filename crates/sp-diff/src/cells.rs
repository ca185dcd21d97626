use std::borrow::Cow;

use sp_types::{CellGrid, CellValue, CheckOutcome, DataObject, DataValue};

use crate::{
    ArrayCheck, CellMismatch, MismatchKind, Tolerance, check_arrays, format_g, preview_text,
    render_mismatches,
};

/// Compare the first variable (in NEW order) that is a cell grid on both sides.
///
/// When no variable is a cell grid on both sides, the first 2-D numeric (or
/// empty) variable on both sides is compared as a grid of scalar cells, so a
/// collection whose cells all happen to be numbers still compares.
#[must_use]
pub fn compare_heterogeneous_objects(
    new: &DataObject,
    old: &DataObject,
    tolerance: Tolerance,
) -> CheckOutcome {
    let selected = new
        .iter()
        .find_map(|(name, value)| match (value, old.get(name)) {
            (DataValue::Cells(new_grid), Some(DataValue::Cells(old_grid))) => {
                Some((name, Cow::Borrowed(new_grid), Cow::Borrowed(old_grid)))
            }
            _ => None,
        })
        .or_else(|| {
            new.iter().find_map(|(name, value)| {
                let new_grid = grid_view(value)?;
                let old_grid = grid_view(old.get(name)?)?;
                Some((name, Cow::Owned(new_grid), Cow::Owned(old_grid)))
            })
        });

    match selected {
        Some((name, new_grid, old_grid)) => {
            compare_cell_grids(name, &new_grid, &old_grid, tolerance)
        }
        None => CheckOutcome::fail("no heterogeneous collection found"),
    }
}

fn grid_view(value: &DataValue) -> Option<CellGrid> {
    match value {
        DataValue::Numeric(array) => CellGrid::from_numeric(array),
        DataValue::Empty => CellGrid::new(0, 0, Vec::new()).ok(),
        _ => None,
    }
}

/// Shapes must agree; then every position is compared by the kind of its entries.
#[must_use]
pub fn compare_cell_grids(
    name: &str,
    new: &CellGrid,
    old: &CellGrid,
    tolerance: Tolerance,
) -> CheckOutcome {
    let (rows, cols) = new.shape();
    if new.shape() != old.shape() {
        let (old_rows, old_cols) = old.shape();
        return CheckOutcome::fail(format!(
            "{name}: shape mismatch NEW=[{rows}x{cols}] OLD=[{old_rows}x{old_cols}]"
        ));
    }

    let mut mismatches = Vec::new();
    for row in 0..rows {
        for col in 0..cols {
            let (Some(new_cell), Some(old_cell)) = (new.get(row, col), old.get(row, col)) else {
                continue;
            };
            if let Some((kind, description)) = compare_cell(new_cell, old_cell, tolerance) {
                mismatches.push(CellMismatch {
                    row: row + 1,
                    col: col + 1,
                    kind,
                    description,
                });
            }
        }
    }

    if mismatches.is_empty() {
        CheckOutcome::pass(format!("{name}: all {rows}x{cols} cells match"))
    } else {
        CheckOutcome::fail(format!("{name}: {}", render_mismatches(&mismatches)))
    }
}

fn compare_cell(
    new: &CellValue,
    old: &CellValue,
    tolerance: Tolerance,
) -> Option<(MismatchKind, String)> {
    match (new, old) {
        (CellValue::Numeric(new_array), CellValue::Numeric(old_array)) => {
            match check_arrays(new_array, old_array) {
                ArrayCheck::ShapeMismatch {
                    new: new_shape,
                    old: old_shape,
                } => Some((
                    MismatchKind::Shape,
                    format!("NEW=[{new_shape}] OLD=[{old_shape}]"),
                )),
                ArrayCheck::Deviation(deviation) if tolerance.is_exceeded_by(deviation) => Some((
                    MismatchKind::Tolerance,
                    format!("max |Δ| = {}", format_g(deviation)),
                )),
                ArrayCheck::Deviation(_) => None,
            }
        }
        (CellValue::Text(new_text), CellValue::Text(old_text)) => (new_text != old_text).then(|| {
            (
                MismatchKind::Value,
                format!(
                    "NEW='{}' OLD='{}'",
                    preview_text(new_text),
                    preview_text(old_text)
                ),
            )
        }),
        (CellValue::Empty, CellValue::Empty) => None,
        _ => Some((
            MismatchKind::Type,
            format!("NEW={} OLD={}", new.kind(), old.kind()),
        )),
    }
}

#[cfg(test)]
mod tests {
    use sp_types::{CellGrid, CellValue, DataObject, DataValue, NumericArray, Verdict};

    use super::compare_heterogeneous_objects;
    use crate::Tolerance;

    fn text(value: &str) -> CellValue {
        CellValue::Text(value.to_owned())
    }

    fn num(value: f64) -> CellValue {
        CellValue::Numeric(NumericArray::scalar(value))
    }

    fn labels(cells: Vec<CellValue>) -> DataObject {
        let rows = cells.len() / 2;
        let grid = CellGrid::new(rows, 2, cells).expect("grid");
        [
            ("fs", DataValue::Numeric(NumericArray::scalar(30_000.0))),
            ("cluster_labels", DataValue::Cells(grid)),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn identical_grids_with_empty_cells_pass() {
        let cells = vec![num(0.0), text("good"), num(1.0), CellValue::Empty];
        let outcome = compare_heterogeneous_objects(
            &labels(cells.clone()),
            &labels(cells),
            Tolerance::default(),
        );
        assert_eq!(outcome.verdict, Verdict::Pass, "{}", outcome.detail);
        assert_eq!(outcome.detail, "cluster_labels: all 2x2 cells match");
    }

    #[test]
    fn numeric_against_text_is_a_type_mismatch() {
        let new = labels(vec![num(0.0), text("good"), num(1.0), text("mua")]);
        let old = labels(vec![num(0.0), num(3.0), num(1.0), text("mua")]);
        let outcome = compare_heterogeneous_objects(&new, &old, Tolerance::default());
        assert_eq!(outcome.verdict, Verdict::Fail);
        assert_eq!(
            outcome.detail,
            "cluster_labels: 1 mismatching cells: (1,2) type mismatch: NEW=text OLD=numeric"
        );
    }

    #[test]
    fn every_mismatch_is_counted_but_only_five_previewed() {
        let new = labels((0..14).map(|idx| num(f64::from(idx))).collect());
        let old = labels(
            (0..14)
                .map(|idx| if idx < 7 { text("x") } else { num(f64::from(idx)) })
                .collect(),
        );
        let outcome = compare_heterogeneous_objects(&new, &old, Tolerance::default());
        assert_eq!(outcome.verdict, Verdict::Fail);
        assert!(outcome.detail.starts_with("cluster_labels: 7 mismatching cells"));
        assert!(outcome.detail.contains("(3,1)"));
        assert!(!outcome.detail.contains("(4,1)"));
        assert!(outcome.detail.ends_with("... 2 more"));
    }

    #[test]
    fn numeric_cells_use_tolerance_and_shape() {
        let new = labels(vec![
            num(1.0 + 5e-7),
            CellValue::Numeric(NumericArray::row(vec![1.0, 2.0])),
        ]);
        let old = labels(vec![num(1.0), CellValue::Numeric(NumericArray::scalar(1.0))]);
        let outcome = compare_heterogeneous_objects(&new, &old, Tolerance::default());
        assert_eq!(outcome.verdict, Verdict::Fail);
        assert!(
            outcome
                .detail
                .contains("(1,2) shape mismatch: NEW=[1x2] OLD=[1x1]"),
            "{}",
            outcome.detail
        );
        assert!(!outcome.detail.contains("(1,1)"));
    }

    #[test]
    fn grid_shapes_must_match() {
        let new = labels(vec![num(0.0), num(1.0)]);
        let old = labels(vec![num(0.0), num(1.0), num(2.0), num(3.0)]);
        let outcome = compare_heterogeneous_objects(&new, &old, Tolerance::default());
        assert_eq!(outcome.verdict, Verdict::Fail);
        assert_eq!(
            outcome.detail,
            "cluster_labels: shape mismatch NEW=[1x2] OLD=[2x2]"
        );
    }

    #[test]
    fn all_numeric_or_empty_collections_compare_as_grids() {
        let matrix = |data: Vec<f64>| {
            let object: DataObject = [(
                "cluster_labels",
                DataValue::Numeric(NumericArray::new(vec![2, 2], data).expect("matrix")),
            )]
            .into_iter()
            .collect();
            object
        };
        let same = matrix(vec![0.0, 1.0, 1.0, 2.0]);
        let outcome = compare_heterogeneous_objects(&same, &same, Tolerance::default());
        assert_eq!(outcome.verdict, Verdict::Pass, "{}", outcome.detail);
        assert_eq!(outcome.detail, "cluster_labels: all 2x2 cells match");

        let outcome = compare_heterogeneous_objects(
            &matrix(vec![0.0, 1.0, 1.0, 3.0]),
            &same,
            Tolerance::default(),
        );
        assert_eq!(outcome.verdict, Verdict::Fail);
        assert!(outcome.detail.contains("(2,2) tolerance exceeded"), "{}", outcome.detail);

        let empty: DataObject = [("cluster_labels", DataValue::Numeric(NumericArray::empty()))]
            .into_iter()
            .collect();
        let outcome = compare_heterogeneous_objects(&empty, &empty, Tolerance::default());
        assert_eq!(outcome.verdict, Verdict::Pass, "{}", outcome.detail);
        assert_eq!(outcome.detail, "cluster_labels: all 0x0 cells match");
    }

    #[test]
    fn genuine_grid_wins_over_numeric_fallback() {
        let cells = vec![num(0.0), text("good"), num(1.0), CellValue::Empty];
        let object = labels(cells);
        let outcome = compare_heterogeneous_objects(&object, &object, Tolerance::default());
        assert_eq!(outcome.detail, "cluster_labels: all 2x2 cells match");
    }

    #[test]
    fn missing_grid_fails() {
        let object: DataObject = [
            ("name", DataValue::Text("session".to_owned())),
            (
                "cube",
                DataValue::Numeric(NumericArray::new(vec![1, 1, 2], vec![1.0, 2.0]).expect("cube")),
            ),
        ]
        .into_iter()
        .collect();
        let outcome = compare_heterogeneous_objects(&object, &object, Tolerance::default());
        assert_eq!(outcome.verdict, Verdict::Fail);
        assert_eq!(outcome.detail, "no heterogeneous collection found");
    }
}
