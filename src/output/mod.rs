//! Output module for run reports
//!
//! This module handles:
//! - Printing the per-resource report to stdout
//! - Writing the markdown run summary
//! - Aggregate statistics over a finished run

mod markdown;
pub mod stats;

pub use markdown::{format_markdown_summary, write_markdown_summary};
pub use stats::{print_report, RunStatistics};

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while writing reports
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;
