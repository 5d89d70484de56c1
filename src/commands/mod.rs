//! CLI command implementations.
//!
//! Commands orchestrate the various library components to perform user tasks.

pub mod analyze;
pub mod models;

// Re-export main command functions
pub use analyze::{correlation_line, execute_analysis, AnalysisOutcome};
pub use models::{validate_args, AnalyzeArgs};
