use sp_types::{CheckOutcome, DataObject, DataValue, Verdict};

use crate::{ArrayCheck, Tolerance, check_arrays, deviation_line, name_sets_differ, render_names};

/// Compare every shared numeric variable of two data objects.
///
/// The variable-name sets must match exactly. Numeric variables need equal
/// shapes and a max absolute deviation within `tolerance`; other variables are
/// listed as skipped and never fail. The detail carries one summary per
/// variable in NEW declaration order.
#[must_use]
pub fn compare_numeric_objects(
    new: &DataObject,
    old: &DataObject,
    tolerance: Tolerance,
) -> CheckOutcome {
    if name_sets_differ(new, old) {
        return CheckOutcome::fail(format!(
            "variable names differ: NEW={} OLD={}",
            render_names(new),
            render_names(old)
        ));
    }

    let mut ok = true;
    let mut lines = Vec::with_capacity(new.len());
    for (name, new_value) in new.iter() {
        let Some(old_value) = old.get(name) else {
            continue;
        };
        match (new_value, old_value) {
            (DataValue::Numeric(new_array), DataValue::Numeric(old_array)) => {
                match check_arrays(new_array, old_array) {
                    ArrayCheck::ShapeMismatch {
                        new: new_shape,
                        old: old_shape,
                    } => {
                        ok = false;
                        lines.push(format!(
                            "{name}: shape mismatch NEW=[{new_shape}] OLD=[{old_shape}]"
                        ));
                    }
                    ArrayCheck::Deviation(deviation) => {
                        ok &= !tolerance.is_exceeded_by(deviation);
                        lines.push(deviation_line(name, deviation, tolerance));
                    }
                }
            }
            _ => lines.push(format!("{name}: skipped (non-numeric)")),
        }
    }

    if lines.is_empty() {
        return CheckOutcome::pass("no variables to compare");
    }
    CheckOutcome::new(Verdict::from_ok(ok), lines.join("; "))
}
