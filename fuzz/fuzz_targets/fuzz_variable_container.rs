#![no_main]

use libfuzzer_sys::fuzz_target;
use sp_diff::{Tolerance, compare_heterogeneous_objects, compare_numeric_objects};
use sp_io::parse_variables_slice;
use sp_types::Verdict;

fuzz_target!(|data: &[u8]| {
    let Ok(object) = parse_variables_slice(data) else {
        return;
    };
    let tolerance = Tolerance::default();

    let numeric = compare_numeric_objects(&object, &object, tolerance);
    assert_eq!(numeric.verdict, Verdict::Pass, "{}", numeric.detail);

    let cells = compare_heterogeneous_objects(&object, &object, tolerance);
    assert!(
        cells.verdict == Verdict::Pass || cells.detail == "no heterogeneous collection found",
        "{}",
        cells.detail
    );
});
