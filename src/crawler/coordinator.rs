//! Harvester coordinator - main harvest orchestration logic
//!
//! This module sequences one full run:
//! - Site statistics and the community list
//! - The agent leaderboard
//! - The main feed, then every community feed
//! - Optionally, comments for every post that has any
//! - Persisting each resource kind and writing the run summary
//!
//! A failure fetching one resource kind (or one community, or one post's
//! comments) is recorded in the report and the run moves on.

use crate::config::Config;
use crate::crawler::fetcher::{ApiClient, Endpoint};
use crate::crawler::paginator::{PageOutcome, Paginator, Termination};
use crate::crawler::parser::{map_agent, map_comment, map_post, map_submolt};
use crate::crawler::{CancelToken, FetchError};
use crate::model::{
    Agent, Comment, Identified, MapError, Post, ResourceKind, SiteStats, Submolt,
};
use crate::output::write_markdown_summary;
use crate::state::ResourceStatus;
use crate::storage::{open_store, DatasetStore, PersistOutcome, Row, SqliteDatasetStore, ToRow};
use crate::HarvestError;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};

/// Everything gathered by one run, before persistence
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HarvestData {
    pub stats: Option<SiteStats>,
    pub submolts: Vec<Submolt>,
    pub agents: Vec<Agent>,
    /// Main-feed posts
    pub posts: Vec<Post>,
    /// Community-feed posts, keyed by community name
    pub submolt_posts: BTreeMap<String, Vec<Post>>,
    /// Comments, keyed by post id
    pub comments: BTreeMap<String, Vec<Comment>>,
}

impl HarvestData {
    /// Dataset rows for one resource kind
    pub fn rows(&self, kind: ResourceKind) -> Vec<Row> {
        match kind {
            ResourceKind::Communities => self.submolts.iter().map(ToRow::to_row).collect(),
            ResourceKind::Leaderboard => self.agents.iter().map(ToRow::to_row).collect(),
            ResourceKind::Posts => self.posts.iter().map(ToRow::to_row).collect(),
            ResourceKind::SubmoltPosts => self
                .submolt_posts
                .values()
                .flatten()
                .map(ToRow::to_row)
                .collect(),
            ResourceKind::Comments => self.comments.values().flatten().map(ToRow::to_row).collect(),
        }
    }

    /// Posts worth asking comments for: every distinct post, from any feed,
    /// with a non-zero comment count
    pub fn posts_with_comments(&self) -> Vec<&Post> {
        let mut seen = HashSet::new();
        self.posts
            .iter()
            .chain(self.submolt_posts.values().flatten())
            .filter(|post| post.comment_count > 0)
            .filter(|post| seen.insert(post.id.as_str()))
            .collect()
    }
}

/// Outcome of one resource kind
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceReport {
    pub kind: ResourceKind,
    pub status: ResourceStatus,
    /// Page requests made for this kind
    pub pages: u32,
    pub persisted: Option<PersistOutcome>,
    pub persist_error: Option<String>,
}

impl ResourceReport {
    fn new(kind: ResourceKind, status: ResourceStatus, pages: u32) -> Self {
        Self {
            kind,
            status,
            pages,
            persisted: None,
            persist_error: None,
        }
    }
}

/// Report of a finished run
#[derive(Debug, Clone, PartialEq)]
pub struct HarvestReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub config_hash: String,
    pub authenticated: bool,
    pub cancelled: bool,
    /// HTTP requests sent, retries included
    pub requests: u64,
    pub stats: Option<SiteStats>,
    pub resources: Vec<ResourceReport>,
}

impl HarvestReport {
    pub fn resource(&self, kind: ResourceKind) -> Option<&ResourceReport> {
        self.resources.iter().find(|r| r.kind == kind)
    }

    pub fn duration_seconds(&self) -> i64 {
        (self.finished_at - self.started_at).num_seconds()
    }

    /// Whether every requested resource was fetched and stored in full
    pub fn is_complete(&self) -> bool {
        self.resources.iter().all(|r| {
            r.persist_error.is_none()
                && matches!(
                    r.status,
                    ResourceStatus::Complete { .. } | ResourceStatus::Skipped
                )
        })
    }
}

/// Running totals for a resource made of many independent requests
#[derive(Debug, Default)]
struct Tally {
    records: usize,
    pages: u32,
    units: usize,
    failures: Vec<String>,
    degraded: usize,
    unauthenticated: usize,
    cancelled: bool,
}

impl Tally {
    fn add<T>(&mut self, result: &Result<PageOutcome<T>, FetchError>, label: &str) {
        self.units += 1;
        match result {
            Ok(outcome) => {
                self.records += outcome.records.len();
                self.pages += outcome.pages;
                match outcome.termination {
                    Termination::Cancelled => self.cancelled = true,
                    Termination::Unauthenticated => self.unauthenticated += 1,
                    Termination::Stalled => self.degraded += 1,
                    _ => {}
                }
            }
            Err(e) => self.failures.push(format!("{}: {}", label, e)),
        }
    }

    fn into_status(self, unit: &str, planned: usize) -> ResourceStatus {
        if self.cancelled || self.units < planned {
            return ResourceStatus::Cancelled {
                records: self.records,
            };
        }
        if self.units > 0 && self.failures.len() == self.units {
            return ResourceStatus::Failed {
                error: format!(
                    "all {} {} failed; first: {}",
                    self.units, unit, self.failures[0]
                ),
            };
        }

        let mut problems = Vec::new();
        if !self.failures.is_empty() {
            problems.push(format!(
                "{} of {} {} failed",
                self.failures.len(),
                planned,
                unit
            ));
        }
        if self.unauthenticated > 0 {
            problems.push(format!(
                "{} of {} {} require authentication",
                self.unauthenticated, planned, unit
            ));
        }
        if self.degraded > 0 {
            problems.push(format!("{} {} stopped early", self.degraded, unit));
        }

        if problems.is_empty() {
            ResourceStatus::Complete {
                records: self.records,
            }
        } else {
            ResourceStatus::Degraded {
                records: self.records,
                reason: problems.join("; "),
            }
        }
    }
}

fn status_of<T>(result: &Result<PageOutcome<T>, FetchError>) -> ResourceStatus {
    match result {
        Ok(outcome) => {
            let records = outcome.records.len();
            match outcome.termination {
                t if t.is_complete() => ResourceStatus::Complete { records },
                Termination::Cancelled => ResourceStatus::Cancelled { records },
                Termination::Unauthenticated => ResourceStatus::Degraded {
                    records,
                    reason: "API key missing or rejected".to_string(),
                },
                _ => ResourceStatus::Degraded {
                    records,
                    reason: "pagination stalled".to_string(),
                },
            }
        }
        Err(e) => ResourceStatus::Failed {
            error: e.to_string(),
        },
    }
}

fn pages_of<T>(result: &Result<PageOutcome<T>, FetchError>) -> u32 {
    result.as_ref().map_or(0, |outcome| outcome.pages)
}

/// Main harvest coordinator
pub struct Harvester {
    config: Config,
    config_hash: String,
    client: ApiClient,
    cancel: CancelToken,
    store: SqliteDatasetStore,
}

impl Harvester {
    /// Creates a harvester around an already-built client
    ///
    /// # Arguments
    ///
    /// * `config` - The harvester configuration
    /// * `config_hash` - Hash recorded in the run summary
    /// * `client` - The API client; closed when the run ends
    /// * `cancel` - Flag checked between requests
    pub fn new(config: Config, config_hash: String, client: ApiClient, cancel: CancelToken) -> Self {
        let store = open_store(&config.output.data_dir);
        Self {
            config,
            config_hash,
            client,
            cancel,
            store,
        }
    }

    pub fn store(&self) -> &SqliteDatasetStore {
        &self.store
    }

    /// Runs a full harvest: fetch, persist, write the summary
    ///
    /// Per-resource failures are reported, not returned. The client is closed
    /// before this returns.
    pub async fn run(self, include_comments: bool) -> HarvestReport {
        let started_at = Utc::now();
        tracing::info!(
            "Starting harvest of {} ({})",
            self.config.api.base_url,
            if self.client.is_authenticated() {
                "authenticated"
            } else {
                "anonymous"
            }
        );

        let (data, mut resources) = self.collect(include_comments).await;

        for report in &mut resources {
            self.persist(&data, report);
        }

        let report = HarvestReport {
            started_at,
            finished_at: Utc::now(),
            config_hash: self.config_hash.clone(),
            authenticated: self.client.is_authenticated(),
            cancelled: self.cancel.is_cancelled(),
            requests: self.client.request_count(),
            stats: data.stats,
            resources,
        };

        if let Err(e) = self.write_summary(&report) {
            tracing::error!("Failed to write run summary: {}", e);
        }

        tracing::info!(
            "Harvest finished in {}s with {} requests",
            report.duration_seconds(),
            report.requests
        );

        self.client.close();
        report
    }

    /// Fetches every resource kind without persisting anything
    ///
    /// Returns the gathered data and one report per resource kind, in the
    /// order they were visited.
    pub async fn collect(&self, include_comments: bool) -> (HarvestData, Vec<ResourceReport>) {
        let mut data = HarvestData::default();
        let mut reports = Vec::with_capacity(ResourceKind::ALL.len());

        if !self.cancel.is_cancelled() {
            match self.client.get_stats().await {
                Ok(stats) => {
                    tracing::info!(
                        "Platform has {} communities, {} posts, {} comments",
                        stats.total_submolts,
                        stats.total_posts,
                        stats.total_comments
                    );
                    data.stats = Some(stats);
                }
                Err(e) => tracing::warn!("Could not fetch site statistics: {}", e),
            }
        }

        // Communities
        let (submolts, report) = self
            .fetch_kind(ResourceKind::Communities, Endpoint::Submolts, None, map_submolt)
            .await;
        data.submolts = submolts;
        let communities_failed = report.status.is_error();
        reports.push(report);

        // Leaderboard
        let (agents, report) = self
            .fetch_kind(ResourceKind::Leaderboard, Endpoint::Leaderboard, None, map_agent)
            .await;
        data.agents = agents
            .into_iter()
            .zip(1u32..)
            .map(|(agent, position)| agent.with_rank(position))
            .collect();
        reports.push(report);

        // Main feed
        let (posts, report) = self
            .fetch_kind(
                ResourceKind::Posts,
                Endpoint::Feed,
                self.config.fetch.max_posts,
                |raw: &Value| map_post(raw, None),
            )
            .await;
        data.posts = posts;
        reports.push(report);

        // Community feeds
        let report = if communities_failed {
            ResourceReport::new(
                ResourceKind::SubmoltPosts,
                ResourceStatus::Failed {
                    error: "community list unavailable".to_string(),
                },
                0,
            )
        } else {
            self.fetch_submolt_feeds(&mut data).await
        };
        reports.push(report);

        // Comments
        let report = if include_comments {
            self.fetch_comments(&mut data).await
        } else {
            ResourceReport::new(ResourceKind::Comments, ResourceStatus::Skipped, 0)
        };
        reports.push(report);

        (data, reports)
    }

    async fn paginate<T, M>(
        &self,
        endpoint: Endpoint,
        max_records: Option<usize>,
        map: M,
    ) -> Result<PageOutcome<T>, FetchError>
    where
        M: Fn(&Value) -> Result<T, MapError>,
        T: Identified,
    {
        Paginator::new(self.client.pages(endpoint), self.config.fetch.page_size, map)
            .with_max_records(max_records)
            .with_cancel(&self.cancel)
            .collect_all()
            .await
    }

    async fn fetch_kind<T, M>(
        &self,
        kind: ResourceKind,
        endpoint: Endpoint,
        max_records: Option<usize>,
        map: M,
    ) -> (Vec<T>, ResourceReport)
    where
        M: Fn(&Value) -> Result<T, MapError>,
        T: Identified,
    {
        if self.cancel.is_cancelled() {
            let status = ResourceStatus::Cancelled { records: 0 };
            return (Vec::new(), ResourceReport::new(kind, status, 0));
        }

        tracing::info!("Fetching {}", kind);
        let result = self.paginate(endpoint, max_records, map).await;
        let status = status_of(&result);
        let pages = pages_of(&result);
        log_status(kind, &status);

        let records = result.map(|outcome| outcome.records).unwrap_or_default();
        (records, ResourceReport::new(kind, status, pages))
    }

    async fn fetch_submolt_feeds(&self, data: &mut HarvestData) -> ResourceReport {
        let kind = ResourceKind::SubmoltPosts;
        if self.cancel.is_cancelled() {
            return ResourceReport::new(kind, ResourceStatus::Cancelled { records: 0 }, 0);
        }

        let names: Vec<String> = data.submolts.iter().map(|s| s.name.clone()).collect();
        tracing::info!("Fetching {} for {} communities", kind, names.len());

        let mut tally = Tally::default();
        for name in &names {
            if self.cancel.is_cancelled() {
                break;
            }

            let result = self
                .paginate(
                    Endpoint::SubmoltFeed(name.clone()),
                    self.config.fetch.max_posts,
                    |raw: &Value| map_post(raw, Some(name.as_str())),
                )
                .await;
            tally.add(&result, name);

            match result {
                Ok(outcome) => {
                    tracing::debug!("{}: {} posts", name, outcome.records.len());
                    data.submolt_posts.insert(name.clone(), outcome.records);
                }
                Err(e) => tracing::error!("Failed to fetch feed of {}: {}", name, e),
            }
        }

        let pages = tally.pages;
        let status = tally.into_status("communities", names.len());
        log_status(kind, &status);
        ResourceReport::new(kind, status, pages)
    }

    async fn fetch_comments(&self, data: &mut HarvestData) -> ResourceReport {
        let kind = ResourceKind::Comments;
        if self.cancel.is_cancelled() {
            return ResourceReport::new(kind, ResourceStatus::Cancelled { records: 0 }, 0);
        }

        let post_ids: Vec<String> = data
            .posts_with_comments()
            .into_iter()
            .map(|post| post.id.clone())
            .collect();
        tracing::info!("Fetching {} for {} posts", kind, post_ids.len());

        let mut tally = Tally::default();
        for post_id in &post_ids {
            if self.cancel.is_cancelled() {
                break;
            }

            let result = self
                .paginate(Endpoint::Comments(post_id.clone()), None, |raw: &Value| {
                    map_comment(raw, Some(post_id.as_str()))
                })
                .await;
            tally.add(&result, post_id);

            match result {
                Ok(outcome) => {
                    data.comments.insert(post_id.clone(), outcome.records);
                }
                Err(e) => tracing::error!("Failed to fetch comments of post {}: {}", post_id, e),
            }
        }

        let pages = tally.pages;
        let status = tally.into_status("posts", post_ids.len());
        log_status(kind, &status);
        ResourceReport::new(kind, status, pages)
    }

    fn persist(&self, data: &HarvestData, report: &mut ResourceReport) {
        let kind = report.kind;
        if !report.status.should_persist(kind.persist_mode()) {
            tracing::debug!("Not writing {} ({})", kind, report.status);
            return;
        }

        let rows = data.rows(kind);
        match self.store.persist(kind, &rows) {
            Ok(outcome) => {
                tracing::info!(
                    "Stored {}: {} fetched, {} total in {}",
                    kind,
                    outcome.incoming,
                    outcome.total,
                    self.store.path_for(kind).display()
                );
                report.persisted = Some(outcome);
            }
            Err(e) => {
                tracing::error!("Failed to store {}: {}", kind, e);
                report.persist_error = Some(e.to_string());
            }
        }
    }

    /// Writes the markdown summary to the configured path
    pub fn write_summary(&self, report: &HarvestReport) -> Result<(), HarvestError> {
        let path = &self.config.output.summary_path;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        write_markdown_summary(report, path)?;
        tracing::info!("Summary written to {}", path.display());
        Ok(())
    }
}

fn log_status(kind: ResourceKind, status: &ResourceStatus) {
    match status {
        ResourceStatus::Complete { records } => {
            tracing::info!("Fetched {} {}", records, kind)
        }
        ResourceStatus::Degraded { records, reason } => {
            tracing::warn!("Fetched {} {} with problems: {}", records, kind, reason)
        }
        ResourceStatus::Failed { error } => tracing::error!("Failed to fetch {}: {}", kind, error),
        ResourceStatus::Cancelled { records } => {
            tracing::warn!("Cancelled {} after {} records", kind, records)
        }
        ResourceStatus::Skipped => tracing::info!("Skipping {}", kind),
    }
}
