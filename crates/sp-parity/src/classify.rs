use std::path::Path;

use regex::Regex;
use sp_types::FileType;

use crate::{EngineConfig, EngineError};

#[derive(Debug, Clone)]
enum StemMatcher {
    Prefix(String),
    Pattern(Regex),
    Equals(String),
    Contains(String),
    OneOf(Vec<String>),
}

impl StemMatcher {
    fn matches(&self, stem: &str) -> bool {
        match self {
            Self::Prefix(prefix) => stem.starts_with(prefix.as_str()),
            Self::Pattern(pattern) => pattern.is_match(stem),
            Self::Equals(name) => stem == name,
            Self::Contains(needle) => stem.contains(needle.as_str()),
            Self::OneOf(names) => names.iter().any(|name| name == stem),
        }
    }
}

#[derive(Debug, Clone)]
struct StemRule {
    matcher: StemMatcher,
    file_type: FileType,
}

/// Assigns a [`FileType`] from a relative path's file name alone.
///
/// Rules are evaluated in order and the first match wins; every path gets a
/// type, falling back to `generic.<ext>`.
#[derive(Debug, Clone)]
pub struct Classifier {
    data_extension: String,
    data_rules: Vec<StemRule>,
    text_extensions: Vec<String>,
    text_rules: Vec<StemRule>,
    table_extensions: Vec<String>,
}

impl Classifier {
    pub fn new(config: &EngineConfig) -> Result<Self, EngineError> {
        let data_rules = vec![
            StemRule {
                matcher: StemMatcher::Prefix(config.timeseries_prefix.clone()),
                file_type: FileType::NumericTimeseries,
            },
            StemRule {
                matcher: StemMatcher::Pattern(Regex::new(&config.spike_pattern)?),
                file_type: FileType::SpikeWaveform,
            },
            StemRule {
                matcher: StemMatcher::Equals(config.cluster_label_name.clone()),
                file_type: FileType::ClusterLabelTable,
            },
            StemRule {
                matcher: StemMatcher::Contains(config.quality_metric_substring.clone()),
                file_type: FileType::QualityMetricRecord,
            },
            StemRule {
                matcher: StemMatcher::OneOf(config.numeric_generic_names.clone()),
                file_type: FileType::NumericGeneric,
            },
            StemRule {
                matcher: StemMatcher::OneOf(config.struct_generic_names.clone()),
                file_type: FileType::StructGeneric,
            },
        ];
        let text_rules = vec![
            StemRule {
                matcher: StemMatcher::OneOf(config.channel_list_names.clone()),
                file_type: FileType::ChannelNameList,
            },
            StemRule {
                matcher: StemMatcher::OneOf(config.sort_order_names.clone()),
                file_type: FileType::SortOrderList,
            },
        ];

        Ok(Self {
            data_extension: config.data_extension.to_ascii_lowercase(),
            data_rules,
            text_extensions: lowercase_all(&config.text_extensions),
            text_rules,
            table_extensions: lowercase_all(&config.table_extensions),
        })
    }

    #[must_use]
    pub fn classify(&self, relative_path: &str) -> FileType {
        let (stem, extension) = split_file_name(relative_path);

        let rules = if extension == self.data_extension {
            &self.data_rules
        } else if self.text_extensions.contains(&extension) {
            &self.text_rules
        } else if self.table_extensions.contains(&extension) {
            return FileType::StructuredTable;
        } else {
            return FileType::generic(&extension);
        };

        rules
            .iter()
            .find(|rule| rule.matcher.matches(&stem))
            .map_or_else(|| FileType::generic(&extension), |rule| rule.file_type.clone())
    }
}

fn lowercase_all(values: &[String]) -> Vec<String> {
    values.iter().map(|value| value.to_ascii_lowercase()).collect()
}

/// `(stem, lowercase extension)` of the last `/`-separated component.
pub(crate) fn split_file_name(relative_path: &str) -> (String, String) {
    let file_name = relative_path.rsplit('/').next().unwrap_or(relative_path);
    let path = Path::new(file_name);
    let stem = path
        .file_stem()
        .map_or_else(String::new, |stem| stem.to_string_lossy().into_owned());
    let extension = path
        .extension()
        .map_or_else(String::new, |ext| ext.to_string_lossy().to_ascii_lowercase());
    (stem, extension)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use sp_types::FileType;

    use super::{Classifier, split_file_name};
    use crate::EngineConfig;

    fn classifier() -> Classifier {
        Classifier::new(&EngineConfig::default()).expect("default rules compile")
    }

    #[test]
    fn data_files_follow_rule_priority() {
        let classifier = classifier();
        let cases = [
            ("timeseries.mat", FileType::NumericTimeseries),
            ("sorted/timeseries_ch01.mat", FileType::NumericTimeseries),
            ("ch12_spikes.mat", FileType::SpikeWaveform),
            ("cluster_labels.mat", FileType::ClusterLabelTable),
            ("ch1_quality_metrics_v2.mat", FileType::QualityMetricRecord),
            ("channels.mat", FileType::NumericGeneric),
            ("reflookup.mat", FileType::StructGeneric),
            ("ch-12_spikes.mat", FileType::generic("mat")),
            ("results.MAT", FileType::generic("mat")),
        ];
        for (path, expected) in cases {
            assert_eq!(classifier.classify(path), expected, "{path}");
        }
    }

    #[test]
    fn timeseries_prefix_wins_over_spike_pattern() {
        assert_eq!(
            classifier().classify("timeseries_spikes.mat"),
            FileType::NumericTimeseries
        );
    }

    #[test]
    fn text_tables_and_everything_else() {
        let classifier = classifier();
        assert_eq!(classifier.classify("channels.txt"), FileType::ChannelNameList);
        assert_eq!(classifier.classify("a/channel_names.TXT"), FileType::ChannelNameList);
        assert_eq!(classifier.classify("sort_order.txt"), FileType::SortOrderList);
        assert_eq!(classifier.classify("notes.txt"), FileType::generic("txt"));
        assert_eq!(classifier.classify("units.csv"), FileType::StructuredTable);
        assert_eq!(classifier.classify("units.tsv"), FileType::StructuredTable);
        assert_eq!(classifier.classify("plot.png"), FileType::generic("png"));
        assert_eq!(classifier.classify("signal.bin"), FileType::generic("bin"));
        assert_eq!(classifier.classify("README"), FileType::generic(""));
        assert_eq!(classifier.classify("README").to_string(), "generic");
    }

    #[test]
    fn configured_data_extension_is_honoured() {
        let config = EngineConfig {
            data_extension: "h5".to_owned(),
            ..EngineConfig::default()
        };
        let classifier = Classifier::new(&config).expect("rules");
        assert_eq!(classifier.classify("timeseries.h5"), FileType::NumericTimeseries);
        assert_eq!(classifier.classify("timeseries.mat"), FileType::generic("mat"));
    }

    #[test]
    fn file_names_split_on_last_dot() {
        assert_eq!(
            split_file_name("figs/raster.tar.GZ"),
            ("raster.tar".to_owned(), "gz".to_owned())
        );
        assert_eq!(split_file_name(".hidden"), (".hidden".to_owned(), String::new()));
    }

    proptest! {
        #[test]
        fn classification_is_deterministic_and_tags_parse_back(
            path in "[A-Za-z0-9_./-]{0,40}"
        ) {
            let classifier = classifier();
            let first = classifier.classify(&path);
            prop_assert_eq!(&first, &classifier.classify(&path));
            prop_assert_eq!(first.to_string().parse::<FileType>().ok(), Some(first));
        }
    }
}
