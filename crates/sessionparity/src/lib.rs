#![forbid(unsafe_code)]

//! Compare the outputs of two runs of a session-processing pipeline.
//!
//! ```no_run
//! use std::path::Path;
//!
//! use sessionparity::{EngineConfig, run_parity};
//!
//! let report = run_parity(
//!     Path::new("sessions/new"),
//!     Path::new("sessions/old"),
//!     &EngineConfig::default(),
//! )?;
//! println!("{}", report.summary.render_plain());
//! # Ok::<(), sessionparity::EngineError>(())
//! ```

pub use sp_diff::{
    CompareError, DEFAULT_TOLERANCE, MismatchKind, Tolerance, compare_cell_grids,
    compare_checksum, compare_heterogeneous_objects, compare_lines, compare_nested_objects,
    compare_numeric_objects, compare_sizes, compare_table_files, compare_tables,
    compare_text_files, format_g, max_abs_deviation,
};
pub use sp_io::{DataLoader, IoError, JsonVariableLoader, parse_variables_str, read_table_str};
pub use sp_parity::{
    CheckKind, Classifier, EngineConfig, EngineError, ParityEngine, ParityReport, ResultSet,
    RoutingTable, RunMetadata, render_csv_report, render_json_report, run_parity,
    write_csv_report, write_json_report,
};
pub use sp_types::{
    CellGrid, CellValue, CheckOutcome, ComparisonEntry, DataObject, DataValue, FileType,
    NumericArray, Record, Verdict, VerdictSummary,
};
