use std::fs;
use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};
use sp_diff::{DEFAULT_TOLERANCE, Tolerance};

use crate::EngineError;

/// Run configuration. Every field has a default, so a YAML file only needs
/// the keys it overrides:
///
/// ```yaml
/// tolerance: 1.0e-5
/// exclude_dir_pattern: "(?i)^_?(staging|scratch)$"
/// size_only_extensions: [png, svg]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub tolerance: f64,
    /// Directory names matching this regex are not descended into on either side.
    pub exclude_dir_pattern: String,
    /// Extension of the variable-container data files, without the dot.
    pub data_extension: String,
    pub timeseries_prefix: String,
    pub spike_pattern: String,
    pub cluster_label_name: String,
    pub quality_metric_substring: String,
    pub numeric_generic_names: Vec<String>,
    pub struct_generic_names: Vec<String>,
    pub text_extensions: Vec<String>,
    pub channel_list_names: Vec<String>,
    pub sort_order_names: Vec<String>,
    pub table_extensions: Vec<String>,
    pub size_only_extensions: Vec<String>,
    pub skip_extensions: Vec<String>,
}

fn owned(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| (*value).to_owned()).collect()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            exclude_dir_pattern: "(?i)^_?(staging|intermediate|tmp)$".to_owned(),
            data_extension: "mat".to_owned(),
            timeseries_prefix: "timeseries".to_owned(),
            spike_pattern: "^[A-Za-z0-9]+_spikes$".to_owned(),
            cluster_label_name: "cluster_labels".to_owned(),
            quality_metric_substring: "quality_metrics".to_owned(),
            numeric_generic_names: owned(&["channels"]),
            struct_generic_names: owned(&["reflookup"]),
            text_extensions: owned(&["txt"]),
            channel_list_names: owned(&["channels", "channel_names"]),
            sort_order_names: owned(&["sort_order"]),
            table_extensions: owned(&["csv", "tsv"]),
            size_only_extensions: owned(&[
                "png", "jpg", "jpeg", "tif", "tiff", "bmp", "gif", "fig", "nii", "gz", "svg",
            ]),
            skip_extensions: owned(&[
                "log", "json", "yaml", "yml", "toml", "ini", "pdf", "html", "htm",
            ]),
        }
    }
}

impl EngineConfig {
    pub fn from_yaml_str(input: &str) -> Result<Self, EngineError> {
        let config: Self = serde_yaml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_path(path: &Path) -> Result<Self, EngineError> {
        Self::from_yaml_str(&fs::read_to_string(path)?)
    }

    /// Checks the tolerance, both regexes and the extension lists.
    pub fn validate(&self) -> Result<(), EngineError> {
        self.tolerance()?;
        Regex::new(&self.exclude_dir_pattern)?;
        Regex::new(&self.spike_pattern)?;
        if self.data_extension.trim().is_empty() {
            return Err(EngineError::Config("data_extension must not be empty".to_owned()));
        }
        let groups = [
            ("text_extensions", &self.text_extensions),
            ("table_extensions", &self.table_extensions),
            ("size_only_extensions", &self.size_only_extensions),
            ("skip_extensions", &self.skip_extensions),
        ];
        for (group, extensions) in groups {
            if let Some(bad) = extensions
                .iter()
                .find(|ext| ext.is_empty() || ext.starts_with('.'))
            {
                return Err(EngineError::Config(format!(
                    "{group}: extensions are listed without a leading dot, got {bad:?}"
                )));
            }
        }
        Ok(())
    }

    pub fn tolerance(&self) -> Result<Tolerance, EngineError> {
        Tolerance::new(self.tolerance).map_err(|err| EngineError::Config(err.to_string()))
    }
}
