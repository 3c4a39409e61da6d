//! Statistics over a finished harvest

use crate::crawler::HarvestReport;
use crate::state::ResourceStatus;

/// Totals across all resource kinds of one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStatistics {
    pub records: usize,
    pub pages: u32,
    pub complete: usize,
    pub degraded: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub skipped: usize,
    pub persist_failures: usize,
}

impl RunStatistics {
    pub fn from_report(report: &HarvestReport) -> Self {
        let mut stats = Self::default();
        for resource in &report.resources {
            stats.records += resource.status.records();
            stats.pages += resource.pages;
            match resource.status {
                ResourceStatus::Complete { .. } => stats.complete += 1,
                ResourceStatus::Degraded { .. } => stats.degraded += 1,
                ResourceStatus::Failed { .. } => stats.failed += 1,
                ResourceStatus::Cancelled { .. } => stats.cancelled += 1,
                ResourceStatus::Skipped => stats.skipped += 1,
            }
            if resource.persist_error.is_some() {
                stats.persist_failures += 1;
            }
        }
        stats
    }
}

/// Prints the run report to stdout in a formatted manner
///
/// # Arguments
///
/// * `report` - The finished run's report
pub fn print_report(report: &HarvestReport) {
    let stats = RunStatistics::from_report(report);

    println!("=== Harvest Report ===\n");

    println!("Overview:");
    println!(
        "  Mode: {}",
        if report.authenticated {
            "authenticated"
        } else {
            "anonymous"
        }
    );
    println!("  Duration: {}s", report.duration_seconds());
    println!("  HTTP requests: {}", report.requests);
    println!("  Records fetched: {}", stats.records);
    if let Some(site) = &report.stats {
        println!(
            "  Platform totals: {} communities, {} posts, {} comments",
            site.total_submolts, site.total_posts, site.total_comments
        );
    }
    println!();

    println!("Resources:");
    for resource in &report.resources {
        let stored = match (&resource.persisted, &resource.persist_error) {
            (Some(outcome), _) => format!("{} stored", outcome.total),
            (None, Some(_)) => "write failed".to_string(),
            (None, None) => "not written".to_string(),
        };
        println!(
            "  {:<14} {:<10} {:>7} records, {:>4} pages, {}",
            resource.kind.to_db_string(),
            resource.status.to_db_string(),
            resource.status.records(),
            resource.pages,
            stored
        );
        if let Some(detail) = resource.status.detail() {
            println!("    {}", detail);
        }
        if let Some(error) = &resource.persist_error {
            println!("    write error: {}", error);
        }
    }
    println!();

    if report.cancelled {
        println!("Run was cancelled; data gathered before cancellation was kept.");
    }
    println!(
        "Result: {} complete, {} degraded, {} failed, {} cancelled, {} skipped",
        stats.complete, stats.degraded, stats.failed, stats.cancelled, stats.skipped
    );
}
