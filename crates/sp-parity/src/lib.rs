#![forbid(unsafe_code)]

//! Parity engine: pairs the files of a NEW and an OLD session tree by relative
//! path, routes each pair to one comparator and aggregates the verdicts.

use std::path::{Path, PathBuf};

use regex::Regex;
use sp_diff::{
    CompareError, Tolerance, compare_checksum, compare_heterogeneous_objects,
    compare_nested_objects, compare_numeric_objects, compare_sizes, compare_table_files,
    compare_text_files, load_pair,
};
use sp_io::{DataLoader, JsonVariableLoader};
use sp_types::{CheckOutcome, ComparisonEntry, DataObject, FileType, Verdict};
use thiserror::Error;

mod classify;
mod config;
mod report;
mod route;
mod walk;

pub use classify::Classifier;
pub use config::EngineConfig;
pub use report::{
    ParityReport, ResultSet, RunMetadata, render_csv_report, render_json_report,
    write_csv_report, write_json_report,
};
pub use route::{CheckKind, RoutingTable};
pub use walk::{SessionListing, list_session_files};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Regex(#[from] regex::Error),
    #[error(transparent)]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("session root not found: {}", .0.display())]
    RootNotFound(PathBuf),
    #[error("duplicate entry for path: {0}")]
    DuplicatePath(String),
    #[error("invalid configuration: {0}")]
    Config(String),
}

type ObjectComparator = fn(&DataObject, &DataObject, Tolerance) -> CheckOutcome;

/// Classifier, routing table, exclusion filter and the optional data loader
/// for one configuration. Build once, run against any number of session pairs.
pub struct ParityEngine {
    tolerance: Tolerance,
    exclude: Regex,
    classifier: Classifier,
    routes: RoutingTable,
    loader: Option<Box<dyn DataLoader>>,
}

impl std::fmt::Debug for ParityEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParityEngine")
            .field("tolerance", &self.tolerance)
            .field("exclude", &self.exclude.as_str())
            .field("loader", &self.loader.as_ref().map(|loader| loader.name()))
            .finish_non_exhaustive()
    }
}

impl ParityEngine {
    /// Engine with the bundled JSON variable-container loader.
    pub fn new(config: &EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            tolerance: config.tolerance()?,
            exclude: Regex::new(&config.exclude_dir_pattern)?,
            classifier: Classifier::new(config)?,
            routes: RoutingTable::from_config(config),
            loader: Some(Box::new(JsonVariableLoader)),
        })
    }

    #[must_use]
    pub fn with_loader(mut self, loader: Box<dyn DataLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Data-file comparisons become `SKIP` with a `helper missing` detail.
    #[must_use]
    pub fn without_loader(mut self) -> Self {
        self.loader = None;
        self
    }

    #[must_use]
    pub fn tolerance(&self) -> Tolerance {
        self.tolerance
    }

    #[must_use]
    pub fn classify(&self, relative_path: &str) -> FileType {
        self.classifier.classify(relative_path)
    }

    #[must_use]
    pub fn route(&self, file_type: &FileType) -> CheckKind {
        self.routes.route(file_type)
    }

    /// Compare every path in the union of both trees.
    ///
    /// Only a missing root, an unreadable root or a duplicate path abort the
    /// run; every per-file problem becomes that file's verdict.
    pub fn run(&self, new_root: &Path, old_root: &Path) -> Result<ParityReport, EngineError> {
        let new_listing = list_session_files(new_root, &self.exclude)?;
        let old_listing = list_session_files(old_root, &self.exclude)?;

        let mut warnings = new_listing.warnings;
        warnings.extend(old_listing.warnings);

        let mut results = ResultSet::new();
        for relative_path in new_listing.files.union(&old_listing.files) {
            let entry = self.compare_path(
                relative_path,
                new_listing.files.contains(relative_path).then_some(new_root),
                old_listing.files.contains(relative_path).then_some(old_root),
            );
            results.record(entry)?;
        }

        let report = results.finish(warnings);
        #[cfg(feature = "tracing")]
        tracing::info!(summary = %report.summary.render_plain(), "parity run finished");
        Ok(report)
    }

    /// Produce the entry for one relative path. `None` marks the side on
    /// which the path is absent.
    #[must_use]
    pub fn compare_path(
        &self,
        relative_path: &str,
        new_root: Option<&Path>,
        old_root: Option<&Path>,
    ) -> ComparisonEntry {
        let file_type = self.classifier.classify(relative_path);

        let (new_root, old_root) = match (new_root, old_root) {
            (Some(new_root), Some(old_root)) => (new_root, old_root),
            (None, Some(_)) => {
                return ComparisonEntry::new(
                    relative_path,
                    file_type,
                    "",
                    CheckOutcome::fail("missing in NEW"),
                );
            }
            (Some(_), None) => {
                return ComparisonEntry::new(
                    relative_path,
                    file_type,
                    "",
                    CheckOutcome::fail("missing in OLD"),
                );
            }
            (None, None) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(path = relative_path, "path missing from both trees");
                return ComparisonEntry::new(
                    relative_path,
                    file_type,
                    "",
                    CheckOutcome::new(Verdict::Skip, "missing in both NEW and OLD"),
                );
            }
        };

        let check = self.routes.route(&file_type);
        let new_path = new_root.join(relative_path);
        let old_path = old_root.join(relative_path);
        let outcome = self
            .dispatch(check, &new_path, &old_path)
            .unwrap_or_else(|err| CheckOutcome::new(Verdict::Error, err.to_string()));

        #[cfg(feature = "tracing")]
        trace_outcome(relative_path, &file_type, check, &outcome);

        ComparisonEntry::new(relative_path, file_type, check.check_name(), outcome)
    }

    fn dispatch(
        &self,
        check: CheckKind,
        new: &Path,
        old: &Path,
    ) -> Result<CheckOutcome, CompareError> {
        match check {
            CheckKind::NumericArray => {
                self.compare_objects(check, new, old, compare_numeric_objects)
            }
            CheckKind::HeterogeneousRecord => {
                self.compare_objects(check, new, old, compare_heterogeneous_objects)
            }
            CheckKind::NestedRecord => {
                self.compare_objects(check, new, old, compare_nested_objects)
            }
            CheckKind::TextExact => compare_text_files(new, old),
            CheckKind::StructuredTable => compare_table_files(new, old, self.tolerance),
            CheckKind::SizeOnly => compare_sizes(new, old),
            CheckKind::Skip => Ok(CheckOutcome::new(
                Verdict::Skip,
                "not compared: output is non-deterministic by extension",
            )),
            CheckKind::Checksum => compare_checksum(new, old),
        }
    }

    fn compare_objects(
        &self,
        check: CheckKind,
        new: &Path,
        old: &Path,
        compare: ObjectComparator,
    ) -> Result<CheckOutcome, CompareError> {
        let Some(loader) = self.loader.as_deref() else {
            return Ok(CheckOutcome::new(
                Verdict::Skip,
                format!("helper missing: no data loader installed for {check}"),
            ));
        };
        let (new_object, old_object) = load_pair(loader, new, old)?;
        Ok(compare(&new_object, &old_object, self.tolerance))
    }
}

#[cfg(feature = "tracing")]
fn trace_outcome(
    relative_path: &str,
    file_type: &FileType,
    check: CheckKind,
    outcome: &CheckOutcome,
) {
    let incomplete =
        matches!(outcome.verdict, Verdict::Error | Verdict::Skip) && check != CheckKind::Skip;
    if incomplete {
        tracing::warn!(
            path = relative_path,
            check = check.check_name(),
            verdict = %outcome.verdict,
            detail = %outcome.detail,
            "comparison not completed"
        );
    } else {
        tracing::debug!(
            path = relative_path,
            file_type = %file_type,
            check = check.check_name(),
            verdict = %outcome.verdict,
            "compared"
        );
    }
}

/// Build an engine from `config` and run it once.
pub fn run_parity(
    new_root: &Path,
    old_root: &Path,
    config: &EngineConfig,
) -> Result<ParityReport, EngineError> {
    ParityEngine::new(config)?.run(new_root, old_root)
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use sp_types::{FileType, Verdict};

    use super::{CheckKind, EngineConfig, ParityEngine};

    fn engine() -> ParityEngine {
        ParityEngine::new(&EngineConfig::default()).expect("default engine")
    }

    #[test]
    fn presence_failures_carry_no_check_name() {
        let dir = tempfile::tempdir().expect("tempdir");
        let engine = engine();

        let entry = engine.compare_path("ch1_spikes.mat", None, Some(dir.path()));
        assert_eq!(entry.verdict(), Verdict::Fail);
        assert_eq!(entry.detail(), "missing in NEW");
        assert_eq!(entry.check_name(), "");
        assert_eq!(entry.file_type(), &FileType::SpikeWaveform);

        let entry = engine.compare_path("plot.png", Some(dir.path()), None);
        assert_eq!(entry.detail(), "missing in OLD");

        let entry = engine.compare_path("plot.png", None, None);
        assert_eq!(entry.verdict(), Verdict::Skip);
        assert_eq!(entry.check_name(), "");
    }

    #[test]
    fn comparator_errors_stay_local_to_the_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (new_root, old_root) = (dir.path().join("new"), dir.path().join("old"));
        fs::create_dir_all(&new_root).expect("mkdir");
        fs::create_dir_all(&old_root).expect("mkdir");
        fs::write(new_root.join("cluster_labels.mat"), "not json").expect("write");
        fs::write(old_root.join("cluster_labels.mat"), "{}").expect("write");

        let entry = engine().compare_path(
            "cluster_labels.mat",
            Some(new_root.as_path()),
            Some(old_root.as_path()),
        );
        assert_eq!(entry.verdict(), Verdict::Error);
        assert_eq!(entry.check_name(), "heterogeneous_record");
        assert!(entry.detail().starts_with("cannot read NEW file"), "{}", entry.detail());
    }

    #[test]
    fn missing_loader_degrades_to_skip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root: &Path = dir.path();
        fs::write(root.join("reflookup.mat"), "{}").expect("write");

        let entry = engine()
            .without_loader()
            .compare_path("reflookup.mat", Some(root), Some(root));
        assert_eq!(entry.verdict(), Verdict::Skip);
        assert_eq!(entry.check_name(), "nested_record");
        assert_eq!(
            entry.detail(),
            "helper missing: no data loader installed for nested_record"
        );
    }

    #[test]
    fn engine_exposes_classification_and_routing() {
        let engine = engine();
        let file_type = engine.classify("sorted/cluster_labels.mat");
        assert_eq!(file_type, FileType::ClusterLabelTable);
        assert_eq!(engine.route(&file_type), CheckKind::HeterogeneousRecord);
        assert!(format!("{engine:?}").contains("json-variables"));
    }
}
