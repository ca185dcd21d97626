#![no_main]

use libfuzzer_sys::fuzz_target;
use sp_diff::{Tolerance, compare_tables};
use sp_io::read_table_str;
use sp_types::Verdict;

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };
    for delimiter in [b',', b'\t'] {
        let Ok(table) = read_table_str(input, delimiter) else {
            continue;
        };
        let outcome = compare_tables(&table, &table, Tolerance::default());
        assert_eq!(outcome.verdict, Verdict::Pass, "{}", outcome.detail);
    }
});
