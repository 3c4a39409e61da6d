//! Markdown summary generation
//!
//! This module generates a human-readable markdown summary of a harvest
//! run, with one table row per resource kind.

use crate::crawler::HarvestReport;
use crate::output::stats::RunStatistics;
use crate::output::{OutputError, OutputResult};
use std::path::Path;

/// Writes the markdown summary of a run
///
/// # Arguments
///
/// * `report` - The finished run's report
/// * `output_path` - Path where the markdown file should be written
///
/// # Returns
///
/// * `Ok(())` - Successfully wrote markdown summary
/// * `Err(OutputError)` - Failed to write summary
pub fn write_markdown_summary(report: &HarvestReport, output_path: &Path) -> OutputResult<()> {
    let markdown = format_markdown_summary(report);
    std::fs::write(output_path, markdown).map_err(|source| OutputError::Write {
        path: output_path.to_path_buf(),
        source,
    })
}

/// Formats a run report as markdown
pub fn format_markdown_summary(report: &HarvestReport) -> String {
    let stats = RunStatistics::from_report(report);
    let mut md = String::new();

    md.push_str("# Carcinologer Harvest Summary\n\n");

    // Run metadata
    md.push_str("## Run Information\n\n");
    md.push_str(&format!("- **Started**: {}\n", report.started_at.to_rfc3339()));
    md.push_str(&format!(
        "- **Finished**: {}\n",
        report.finished_at.to_rfc3339()
    ));
    md.push_str(&format!(
        "- **Duration**: {} seconds\n",
        report.duration_seconds()
    ));
    md.push_str(&format!(
        "- **Mode**: {}\n",
        if report.authenticated {
            "authenticated"
        } else {
            "anonymous"
        }
    ));
    md.push_str(&format!("- **HTTP Requests**: {}\n", report.requests));
    if report.cancelled {
        md.push_str("- **Cancelled**: yes\n");
    }
    md.push_str(&format!("- **Config Hash**: {}\n\n", report.config_hash));

    if let Some(site) = &report.stats {
        md.push_str("## Platform Totals\n\n");
        md.push_str(&format!("- **Communities**: {}\n", site.total_submolts));
        md.push_str(&format!("- **Posts**: {}\n", site.total_posts));
        md.push_str(&format!("- **Comments**: {}\n\n", site.total_comments));
    }

    // Per-resource table
    md.push_str("## Resources\n\n");
    md.push_str("| Resource | Status | Records | Pages | Stored Rows | Notes |\n");
    md.push_str("|----------|--------|---------|-------|-------------|-------|\n");
    for resource in &report.resources {
        let stored = resource
            .persisted
            .map(|outcome| outcome.total.to_string())
            .unwrap_or_else(|| "-".to_string());
        let notes = resource
            .persist_error
            .as_deref()
            .or_else(|| resource.status.detail())
            .unwrap_or("");
        md.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} |\n",
            resource.kind,
            resource.status.to_db_string(),
            resource.status.records(),
            resource.pages,
            stored,
            notes.replace('|', "\\|")
        ));
    }
    md.push('\n');

    md.push_str("## Totals\n\n");
    md.push_str(&format!("- **Records Fetched**: {}\n", stats.records));
    md.push_str(&format!("- **Pages Requested**: {}\n", stats.pages));
    md.push_str(&format!(
        "- **Complete / Degraded / Failed**: {} / {} / {}\n",
        stats.complete, stats.degraded, stats.failed
    ));
    if stats.persist_failures > 0 {
        md.push_str(&format!(
            "- **Write Failures**: {}\n",
            stats.persist_failures
        ));
    }

    md
}
