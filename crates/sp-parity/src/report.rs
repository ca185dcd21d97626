use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use csv::WriterBuilder;
use serde::{Deserialize, Serialize};
use sp_types::{ComparisonEntry, Verdict, VerdictSummary};
use unicode_casefold::UnicodeCaseFold;

use crate::EngineError;

/// Append-only collector of entries for one run.
#[derive(Debug, Default)]
pub struct ResultSet {
    entries: Vec<ComparisonEntry>,
    seen: BTreeSet<String>,
}

impl ResultSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails if an entry for the same relative path was already recorded.
    pub fn record(&mut self, entry: ComparisonEntry) -> Result<(), EngineError> {
        if !self.seen.insert(entry.relative_path().to_owned()) {
            return Err(EngineError::DuplicatePath(entry.relative_path().to_owned()));
        }
        self.entries.push(entry);
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sort case-insensitively by path and compute the summary.
    #[must_use]
    pub fn finish(self, warnings: Vec<String>) -> ParityReport {
        let mut keyed = self
            .entries
            .into_iter()
            .map(|entry| (fold_case(entry.relative_path()), entry))
            .collect::<Vec<_>>();
        keyed.sort_by(|(left_key, left), (right_key, right)| {
            left_key
                .cmp(right_key)
                .then_with(|| left.relative_path().cmp(right.relative_path()))
        });
        let entries = keyed.into_iter().map(|(_, entry)| entry).collect::<Vec<_>>();
        let summary = VerdictSummary::from_entries(&entries);
        ParityReport {
            metadata: None,
            summary,
            warnings,
            entries,
        }
    }
}

fn fold_case(path: &str) -> String {
    path.chars().case_fold().collect()
}

/// Where and when a report was produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub generated_at: String,
    pub tool_version: String,
    pub host: Option<String>,
    pub new_root: String,
    pub old_root: String,
    pub tolerance: f64,
}

impl RunMetadata {
    #[must_use]
    pub fn capture(new_root: &Path, old_root: &Path, tolerance: f64) -> Self {
        let host = ["HOSTNAME", "COMPUTERNAME"]
            .iter()
            .find_map(|key| std::env::var(key).ok().filter(|value| !value.is_empty()));
        Self {
            generated_at: chrono::Utc::now().to_rfc3339(),
            tool_version: env!("CARGO_PKG_VERSION").to_owned(),
            host,
            new_root: new_root.display().to_string(),
            old_root: old_root.display().to_string(),
            tolerance,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParityReport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<RunMetadata>,
    pub summary: VerdictSummary,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    pub entries: Vec<ComparisonEntry>,
}

impl ParityReport {
    /// No `FAIL` and no `ERROR`.
    #[must_use]
    pub fn is_green(&self) -> bool {
        self.summary.fail == 0 && self.summary.error == 0
    }

    #[must_use]
    pub fn entry(&self, relative_path: &str) -> Option<&ComparisonEntry> {
        self.entries
            .iter()
            .find(|entry| entry.relative_path() == relative_path)
    }

    pub fn entries_with(&self, verdict: Verdict) -> impl Iterator<Item = &ComparisonEntry> {
        self.entries
            .iter()
            .filter(move |entry| entry.verdict() == verdict)
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: RunMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

pub fn render_json_report(report: &ParityReport) -> Result<String, EngineError> {
    Ok(serde_json::to_string_pretty(report)?)
}

/// One row per entry, columns in [`ComparisonEntry`] field order.
pub fn render_csv_report(report: &ParityReport) -> Result<String, EngineError> {
    let mut writer = WriterBuilder::new().from_writer(Vec::new());
    for entry in &report.entries {
        writer.serialize(entry)?;
    }
    if report.entries.is_empty() {
        writer.write_record(CSV_COLUMNS)?;
    }
    let bytes = writer.into_inner().map_err(|err| err.into_error())?;
    Ok(String::from_utf8(bytes)?)
}

const CSV_COLUMNS: [&str; 6] = [
    "relative_path",
    "file_type",
    "check_name",
    "verdict",
    "detail",
    "size_delta_bytes",
];

pub fn write_json_report(path: &Path, report: &ParityReport) -> Result<(), EngineError> {
    fs::write(path, render_json_report(report)?)?;
    Ok(())
}

pub fn write_csv_report(path: &Path, report: &ParityReport) -> Result<(), EngineError> {
    fs::write(path, render_csv_report(report)?)?;
    Ok(())
}
