use std::path::Path;

use sp_io::read_trimmed_lines;
use sp_types::CheckOutcome;

use crate::{CompareError, Side, preview_text};

pub fn compare_text_files(new: &Path, old: &Path) -> Result<CheckOutcome, CompareError> {
    let new_lines =
        read_trimmed_lines(new).map_err(|source| CompareError::load(Side::New, source))?;
    let old_lines =
        read_trimmed_lines(old).map_err(|source| CompareError::load(Side::Old, source))?;
    Ok(compare_lines(&new_lines, &old_lines))
}

/// Exact comparison of already-trimmed lines. Line numbers in the detail are 1-based.
#[must_use]
pub fn compare_lines(new: &[String], old: &[String]) -> CheckOutcome {
    if new.len() != old.len() {
        return CheckOutcome::fail(format!(
            "Different number of lines: NEW={} OLD={}",
            new.len(),
            old.len()
        ));
    }

    match new.iter().zip(old).position(|(a, b)| a != b) {
        Some(idx) => CheckOutcome::fail(format!(
            "Line {} differs: NEW='{}' OLD='{}'",
            idx + 1,
            preview_text(&new[idx]),
            preview_text(&old[idx])
        )),
        None => CheckOutcome::pass(format!("{} lines identical", new.len())),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use sp_types::Verdict;

    use super::{compare_lines, compare_text_files};
    use crate::CompareError;

    fn lines(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| (*value).to_owned()).collect()
    }

    #[test]
    fn identical_lines_pass_with_count() {
        let outcome = compare_lines(&lines(&["a", "b"]), &lines(&["a", "b"]));
        assert_eq!(outcome.verdict, Verdict::Pass);
        assert_eq!(outcome.detail, "2 lines identical");
    }

    #[test]
    fn line_count_mismatch_reports_both_counts() {
        let outcome = compare_lines(&lines(&["a", "b", "c"]), &lines(&["a", "b"]));
        assert_eq!(outcome.verdict, Verdict::Fail);
        assert_eq!(outcome.detail, "Different number of lines: NEW=3 OLD=2");
    }

    #[test]
    fn first_differing_line_is_reported() {
        let outcome = compare_lines(&lines(&["a", "x", "y"]), &lines(&["a", "b", "c"]));
        assert_eq!(outcome.verdict, Verdict::Fail);
        assert_eq!(outcome.detail, "Line 2 differs: NEW='x' OLD='b'");
    }

    #[test]
    fn files_are_trimmed_before_comparison() {
        let dir = tempfile::tempdir().expect("tempdir");
        let new = dir.path().join("new.txt");
        let old = dir.path().join("old.txt");
        fs::write(&new, "  ch1\nch2  \n").expect("write");
        fs::write(&old, "ch1\r\n\tch2\n").expect("write");
        let outcome = compare_text_files(&new, &old).expect("compare");
        assert_eq!(outcome.verdict, Verdict::Pass, "{}", outcome.detail);
    }

    #[test]
    fn unreadable_side_is_a_load_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let new = dir.path().join("new.txt");
        fs::write(&new, "a\n").expect("write");
        let err = compare_text_files(&new, &dir.path().join("gone.txt")).expect_err("missing");
        assert!(matches!(err, CompareError::Load { .. }));
        assert!(err.to_string().starts_with("cannot read OLD file"));
    }
}
