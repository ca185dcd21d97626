use std::path::Path;

use sp_io::{IoError, file_size, sha256_file};
use sp_types::{CheckOutcome, Verdict};

use crate::{CompareError, Side};

/// sha256 comparison with an explicit size-only fallback when hashing fails.
pub fn compare_checksum(new: &Path, old: &Path) -> Result<CheckOutcome, CompareError> {
    compare_checksum_with(new, old, sha256_file)
}

/// [`compare_checksum`] with a caller-provided hash function.
pub fn compare_checksum_with<H>(
    new: &Path,
    old: &Path,
    hash: H,
) -> Result<CheckOutcome, CompareError>
where
    H: Fn(&Path) -> Result<String, IoError>,
{
    let (new_size, old_size) = sizes(new, old)?;
    let delta = size_delta(new_size, old_size);

    let outcome = match hash(new).and_then(|new_hash| Ok((new_hash, hash(old)?))) {
        Ok((new_hash, old_hash)) if new_hash == old_hash => {
            CheckOutcome::pass(format!("sha256 match {new_hash}"))
        }
        Ok((new_hash, old_hash)) => CheckOutcome::fail(format!(
            "sha256 differs: NEW={new_hash} OLD={old_hash} (size delta {delta:+} bytes)"
        )),
        Err(err) => CheckOutcome::new(
            Verdict::from_ok(new_size == old_size),
            format!(
                "hash unavailable ({err}); size-only fallback: NEW={new_size} OLD={old_size} bytes"
            ),
        ),
    };
    Ok(outcome.with_size_delta(delta))
}

/// Size comparison for media outputs: a difference is advisory (`WARN`).
pub fn compare_sizes(new: &Path, old: &Path) -> Result<CheckOutcome, CompareError> {
    let (new_size, old_size) = sizes(new, old)?;
    let delta = size_delta(new_size, old_size);
    let outcome = if new_size == old_size {
        CheckOutcome::pass(format!("sizes match ({new_size} bytes)"))
    } else {
        CheckOutcome::new(
            Verdict::Warn,
            format!("size differs: NEW={new_size} OLD={old_size} bytes (delta {delta:+})"),
        )
    };
    Ok(outcome.with_size_delta(delta))
}

fn sizes(new: &Path, old: &Path) -> Result<(u64, u64), CompareError> {
    let new_size = file_size(new).map_err(|source| CompareError::load(Side::New, source))?;
    let old_size = file_size(old).map_err(|source| CompareError::load(Side::Old, source))?;
    Ok((new_size, old_size))
}

fn size_delta(new_size: u64, old_size: u64) -> i64 {
    let new_size = i64::try_from(new_size).unwrap_or(i64::MAX);
    let old_size = i64::try_from(old_size).unwrap_or(i64::MAX);
    new_size.saturating_sub(old_size)
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::{Path, PathBuf};

    use proptest::prelude::*;
    use sp_io::IoError;
    use sp_types::Verdict;

    use super::{compare_checksum, compare_checksum_with, compare_sizes};

    fn pair(new: &[u8], old: &[u8]) -> (tempfile::TempDir, PathBuf, PathBuf) {
        let dir = tempfile::tempdir().expect("tempdir");
        let new_path = dir.path().join("new.bin");
        let old_path = dir.path().join("old.bin");
        fs::write(&new_path, new).expect("write new");
        fs::write(&old_path, old).expect("write old");
        (dir, new_path, old_path)
    }

    #[test]
    fn differing_content_reports_both_hashes_and_delta() {
        let (_dir, new, old) = pair(b"abcd", b"abc");
        let outcome = compare_checksum(&new, &old).expect("compare");
        assert_eq!(outcome.verdict, Verdict::Fail);
        assert_eq!(outcome.size_delta_bytes, Some(1));
        assert!(outcome.detail.contains(
            "OLD=ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        ));
        assert!(outcome.detail.ends_with("(size delta +1 bytes)"));
    }

    #[test]
    fn failed_hash_falls_back_to_size_and_says_so() {
        let (_dir, new, old) = pair(b"abc", b"xyz");
        let unavailable = |_: &Path| -> Result<String, IoError> {
            Err(IoError::Container("digest backend offline".to_owned()))
        };
        let outcome = compare_checksum_with(&new, &old, unavailable).expect("compare");
        assert_eq!(outcome.verdict, Verdict::Pass);
        assert_eq!(outcome.size_delta_bytes, Some(0));
        assert!(outcome.detail.contains("size-only fallback"), "{}", outcome.detail);

        let (_dir, new, old) = pair(b"abcd", b"xyz");
        let outcome = compare_checksum_with(&new, &old, unavailable).expect("compare");
        assert_eq!(outcome.verdict, Verdict::Fail);
    }

    #[test]
    fn size_difference_is_only_a_warning() {
        let (_dir, new, old) = pair(&[0_u8; 10], &[0_u8; 7]);
        let outcome = compare_sizes(&new, &old).expect("compare");
        assert_eq!(outcome.verdict, Verdict::Warn);
        assert_eq!(outcome.size_delta_bytes, Some(3));

        let (_dir, new, old) = pair(&[1_u8; 7], &[0_u8; 7]);
        let outcome = compare_sizes(&new, &old).expect("compare");
        assert_eq!(outcome.verdict, Verdict::Pass);
    }

    #[test]
    fn missing_file_is_a_load_error() {
        let (dir, new, _old) = pair(b"a", b"a");
        assert!(compare_checksum(&new, &dir.path().join("gone.bin")).is_err());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn byte_identical_files_always_pass(
            content in proptest::collection::vec(any::<u8>(), 0..2048)
        ) {
            let (_dir, new, old) = pair(&content, &content);
            let outcome = compare_checksum(&new, &old).expect("compare");
            prop_assert_eq!(outcome.verdict, Verdict::Pass);
            prop_assert_eq!(outcome.size_delta_bytes, Some(0));
        }
    }
}
