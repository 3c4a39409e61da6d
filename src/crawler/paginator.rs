//! Cursor pagination
//!
//! Feeds are paged with `before=<id of the last record seen>`. A page shorter
//! than the requested size (including an empty one) ends the sequence, so a
//! collection whose size is an exact multiple of the page size costs one extra
//! request that comes back empty.

use crate::crawler::{CancelToken, FetchError};
use crate::model::{Identified, MapError};
use serde_json::Value;
use std::collections::HashSet;
use std::marker::PhantomData;
use tracing::{debug, warn};

/// Source of raw pages for one logical resource
#[allow(async_fn_in_trait)]
pub trait PageFetcher {
    /// Fetches the page that follows `cursor` (`None` for the first page)
    async fn fetch_page(&self, cursor: Option<&str>, limit: u32) -> Result<Vec<Value>, FetchError>;
}

/// Why a pagination run stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The last page held fewer records than requested
    ShortPage,
    /// The last page held no records
    EmptyPage,
    /// The endpoint answered 401; records gathered before that are kept
    Unauthenticated,
    /// The cancel token was set between pages
    Cancelled,
    /// The configured record cap was reached
    Limit,
    /// A full page added no new identities
    Stalled,
}

impl Termination {
    /// Whether the resource was read to its end
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::ShortPage | Self::EmptyPage | Self::Limit)
    }

    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::ShortPage => "short_page",
            Self::EmptyPage => "empty_page",
            Self::Unauthenticated => "unauthenticated",
            Self::Cancelled => "cancelled",
            Self::Limit => "limit",
            Self::Stalled => "stalled",
        }
    }
}

/// Records gathered by a finished pagination run
#[derive(Debug, Clone, PartialEq)]
pub struct PageOutcome<T> {
    pub records: Vec<T>,
    /// Page requests issued
    pub pages: u32,
    /// Raw objects that failed to map and were skipped
    pub skipped: usize,
    pub termination: Termination,
}

/// Drives a [`PageFetcher`] to the end of one resource
///
/// Records are deduplicated by identity across pages; the first occurrence
/// wins. The sequence is lazy: each [`Paginator::next_page`] call issues at
/// most one request.
pub struct Paginator<'a, F, M, T> {
    fetcher: F,
    map: M,
    page_size: u32,
    max_records: Option<usize>,
    cancel: Option<&'a CancelToken>,
    cursor: Option<String>,
    seen: HashSet<String>,
    yielded: usize,
    pages: u32,
    skipped: usize,
    termination: Option<Termination>,
    _record: PhantomData<fn() -> T>,
}

impl<'a, F, M, T> Paginator<'a, F, M, T>
where
    F: PageFetcher,
    M: Fn(&Value) -> Result<T, MapError>,
    T: Identified,
{
    /// Creates a paginator; a zero page size is raised to one
    pub fn new(fetcher: F, page_size: u32, map: M) -> Self {
        Self {
            fetcher,
            map,
            page_size: page_size.max(1),
            max_records: None,
            cancel: None,
            cursor: None,
            seen: HashSet::new(),
            yielded: 0,
            pages: 0,
            skipped: 0,
            termination: None,
            _record: PhantomData,
        }
    }

    /// Stops once this many records have been produced
    pub fn with_max_records(mut self, max_records: Option<usize>) -> Self {
        self.max_records = max_records;
        self
    }

    /// Checks `cancel` before every page request
    pub fn with_cancel(mut self, cancel: &'a CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn termination(&self) -> Option<Termination> {
        self.termination
    }

    pub fn pages(&self) -> u32 {
        self.pages
    }

    /// Fetches and maps the next page
    ///
    /// # Returns
    ///
    /// * `Ok(Some(records))` - New records from one page (possibly empty after dedup)
    /// * `Ok(None)` - Pagination has terminated; see [`Paginator::termination`]
    /// * `Err(FetchError)` - A page failed for a reason other than 401
    pub async fn next_page(&mut self) -> Result<Option<Vec<T>>, FetchError> {
        if self.termination.is_some() {
            return Ok(None);
        }

        if self.cancel.map_or(false, CancelToken::is_cancelled) {
            debug!("Pagination cancelled after {} pages", self.pages);
            self.termination = Some(Termination::Cancelled);
            return Ok(None);
        }

        let raw = match self
            .fetcher
            .fetch_page(self.cursor.as_deref(), self.page_size)
            .await
        {
            Ok(raw) => raw,
            Err(e) if e.is_unauthenticated() => {
                warn!("{}; keeping {} records gathered so far", e, self.yielded);
                self.termination = Some(Termination::Unauthenticated);
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
        self.pages += 1;

        let raw_count = raw.len();
        let mut records = Vec::with_capacity(raw_count);
        let mut last_identity = None;

        for item in &raw {
            let record = match (self.map)(item) {
                Ok(record) => record,
                Err(e) => {
                    warn!("Skipping record on page {}: {}", self.pages, e);
                    self.skipped += 1;
                    continue;
                }
            };

            let identity = record.identity().to_string();
            last_identity = Some(identity.clone());
            if !self.seen.insert(identity) {
                continue;
            }
            if self.max_records.map_or(false, |max| self.yielded >= max) {
                break;
            }
            self.yielded += 1;
            records.push(record);
        }

        debug!(
            "Page {}: {} raw, {} new (cursor {:?})",
            self.pages,
            raw_count,
            records.len(),
            self.cursor
        );

        self.termination = if raw_count == 0 {
            Some(Termination::EmptyPage)
        } else if raw_count < self.page_size as usize {
            Some(Termination::ShortPage)
        } else if self.max_records.map_or(false, |max| self.yielded >= max) {
            Some(Termination::Limit)
        } else if records.is_empty() {
            warn!(
                "Page {} added no new records; the server may be ignoring the cursor",
                self.pages
            );
            Some(Termination::Stalled)
        } else {
            None
        };

        match last_identity {
            Some(identity) => self.cursor = Some(identity),
            None if self.termination.is_none() => {
                warn!("Page {} had no mappable records to continue from", self.pages);
                self.termination = Some(Termination::Stalled);
            }
            None => {}
        }

        Ok(Some(records))
    }

    /// Runs pagination to the end and returns everything gathered
    ///
    /// A 401 ends the run with the records gathered so far; any other fetch
    /// failure is returned as an error and the partial records are dropped.
    pub async fn collect_all(mut self) -> Result<PageOutcome<T>, FetchError> {
        let mut records = Vec::new();
        while let Some(page) = self.next_page().await? {
            records.extend(page);
        }

        Ok(PageOutcome {
            records,
            pages: self.pages,
            skipped: self.skipped,
            termination: self.termination.unwrap_or(Termination::EmptyPage),
        })
    }
}
