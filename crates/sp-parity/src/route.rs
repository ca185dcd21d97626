use std::collections::BTreeSet;
use std::fmt;

use sp_types::FileType;

use crate::EngineConfig;

/// The comparator a file pair is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckKind {
    NumericArray,
    HeterogeneousRecord,
    NestedRecord,
    TextExact,
    StructuredTable,
    SizeOnly,
    Skip,
    Checksum,
}

impl CheckKind {
    /// Name recorded in the report's `check_name` column.
    #[must_use]
    pub fn check_name(self) -> &'static str {
        match self {
            Self::NumericArray => "numeric_array",
            Self::HeterogeneousRecord => "heterogeneous_record",
            Self::NestedRecord => "nested_record",
            Self::TextExact => "text_exact",
            Self::StructuredTable => "structured_table",
            Self::SizeOnly => "size_only",
            Self::Skip => "skip",
            Self::Checksum => "checksum",
        }
    }
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.check_name())
    }
}

#[derive(Debug, Clone)]
enum Selector {
    Type(FileType),
    Extensions(BTreeSet<String>),
    Any,
}

impl Selector {
    fn selects(&self, file_type: &FileType) -> bool {
        match self {
            Self::Type(expected) => expected == file_type,
            Self::Extensions(extensions) => matches!(
                file_type,
                FileType::Generic { extension } if extensions.contains(extension)
            ),
            Self::Any => true,
        }
    }
}

#[derive(Debug, Clone)]
struct Route {
    selector: Selector,
    check: CheckKind,
}

/// Ordered `selector -> check` table; the first selecting row wins.
#[derive(Debug, Clone)]
pub struct RoutingTable {
    routes: Vec<Route>,
}

impl RoutingTable {
    #[must_use]
    pub fn from_config(config: &EngineConfig) -> Self {
        let extensions = |values: &[String]| {
            Selector::Extensions(values.iter().map(|ext| ext.to_ascii_lowercase()).collect())
        };
        let typed = |file_type: FileType, check: CheckKind| Route {
            selector: Selector::Type(file_type),
            check,
        };

        let routes = vec![
            typed(FileType::NumericTimeseries, CheckKind::NumericArray),
            typed(FileType::SpikeWaveform, CheckKind::NumericArray),
            typed(FileType::ClusterLabelTable, CheckKind::HeterogeneousRecord),
            typed(FileType::QualityMetricRecord, CheckKind::NestedRecord),
            typed(FileType::NumericGeneric, CheckKind::NumericArray),
            typed(FileType::StructGeneric, CheckKind::NestedRecord),
            Route {
                selector: extensions(std::slice::from_ref(&config.data_extension)),
                check: CheckKind::Checksum,
            },
            typed(FileType::ChannelNameList, CheckKind::TextExact),
            typed(FileType::SortOrderList, CheckKind::TextExact),
            Route {
                selector: extensions(&config.text_extensions),
                check: CheckKind::TextExact,
            },
            typed(FileType::StructuredTable, CheckKind::StructuredTable),
            Route {
                selector: extensions(&config.size_only_extensions),
                check: CheckKind::SizeOnly,
            },
            Route {
                selector: extensions(&config.skip_extensions),
                check: CheckKind::Skip,
            },
            Route {
                selector: Selector::Any,
                check: CheckKind::Checksum,
            },
        ];
        Self { routes }
    }

    #[must_use]
    pub fn route(&self, file_type: &FileType) -> CheckKind {
        self.routes
            .iter()
            .find(|route| route.selector.selects(file_type))
            .map_or(CheckKind::Checksum, |route| route.check)
    }
}
