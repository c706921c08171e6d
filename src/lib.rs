pub mod aggregation;
pub mod analyzer;
pub mod discovery;
pub mod error;
pub mod filter;
pub mod fixfen;
pub mod merge;
pub mod metadata;
pub mod parallel_processing;
pub mod pipeline;
pub mod reader;
pub mod report;

// Re-export main types for convenient access
pub use aggregation::{AggregationTable, GameOutcome, OutcomeCounters, TableSnapshot};
pub use error::AnalysisError;

// Re-export pipeline entry points for the binary and integration tests
pub use pipeline::{run_analysis, AnalysisConfig, RunOutcome, RunStats};
pub use report::{DrawRateWindow, Report, ReportOptions, SortOrder};
