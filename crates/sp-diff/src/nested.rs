use sp_types::{CheckOutcome, DataObject, DataValue, Record, Verdict};

use crate::{ArrayCheck, Tolerance, check_arrays, deviation_line, name_sets_differ, render_names};

/// Compare the first variable (in NEW order) that is a nested record on both sides.
///
/// Every numeric field contributes a deviation line, passing or not, so the
/// detail shows the whole record rather than just the first failure.
#[must_use]
pub fn compare_nested_objects(
    new: &DataObject,
    old: &DataObject,
    tolerance: Tolerance,
) -> CheckOutcome {
    let selected = new.iter().find_map(|(name, value)| match (value, old.get(name)) {
        (DataValue::Nested(new_record), Some(DataValue::Nested(old_record))) => {
            Some((name, new_record, old_record))
        }
        _ => None,
    });
    let Some((name, new_record, old_record)) = selected else {
        return CheckOutcome::fail("no nested record found");
    };

    let mut lines = Vec::new();
    let ok = compare_records(name, new_record, old_record, tolerance, &mut lines);
    if lines.is_empty() {
        lines.push(format!("{name}: no fields"));
    }
    CheckOutcome::new(Verdict::from_ok(ok), lines.join("; "))
}

/// Recursive field-wise comparison under `path`; appends one line per field.
///
/// Returns `false` when a field-name set, a numeric size or a tolerance check
/// fails anywhere below `path`. Siblings are still visited after a failure.
pub fn compare_records(
    path: &str,
    new: &Record,
    old: &Record,
    tolerance: Tolerance,
    lines: &mut Vec<String>,
) -> bool {
    if name_sets_differ(new, old) {
        lines.push(format!(
            "{path}: field names differ NEW={} OLD={}",
            render_names(new),
            render_names(old)
        ));
        return false;
    }

    let mut ok = true;
    for (field, new_value) in new.iter() {
        let Some(old_value) = old.get(field) else {
            continue;
        };
        let field_path = format!("{path}.{field}");
        match (new_value, old_value) {
            (DataValue::Nested(new_record), DataValue::Nested(old_record)) => {
                ok &= compare_records(&field_path, new_record, old_record, tolerance, lines);
            }
            (DataValue::Numeric(new_array), DataValue::Numeric(old_array)) => {
                match check_arrays(new_array, old_array) {
                    ArrayCheck::ShapeMismatch {
                        new: new_shape,
                        old: old_shape,
                    } => {
                        ok = false;
                        lines.push(format!(
                            "{field_path}: size mismatch NEW=[{new_shape}] OLD=[{old_shape}]"
                        ));
                    }
                    ArrayCheck::Deviation(deviation) => {
                        ok &= !tolerance.is_exceeded_by(deviation);
                        lines.push(deviation_line(&field_path, deviation, tolerance));
                    }
                }
            }
            (new_value, old_value) if new_value.kind() == old_value.kind() => {
                lines.push(format!("{field_path}: skipped (non-numeric)"));
            }
            (new_value, old_value) => lines.push(format!(
                "{field_path}: skipped (type mismatch NEW={} OLD={})",
                new_value.kind(),
                old_value.kind()
            )),
        }
    }
    ok
}
