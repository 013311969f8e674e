//! Page-range partitioning and the primary worker pool.

use std::sync::Arc;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::aggregate::{AggregateResult, ResultAggregator};
use crate::error::HarvestError;
use crate::extract::{probe_total_pages, ListingExtractor};
use crate::fetcher::PageSource;
use crate::filter::HarvestContext;
use crate::models::{DiscussionRecord, FetchJob, ListingPageRef, PageFailure, WorkerOutcome};

/// Split `[0, max_page]` into `worker_count` contiguous chunks of
/// `ceil((max_page + 1) / worker_count)` pages, the last one clipped.
///
/// Trailing chunks are empty when there are more workers than pages.
///
/// # Panics
///
/// Panics if `worker_count` is zero.
#[must_use]
pub fn partition(max_page: u32, worker_count: usize) -> Vec<FetchJob> {
    assert!(worker_count > 0, "worker_count must be at least 1");
    let last = u64::from(max_page);
    let step = (last + 1).div_ceil(worker_count as u64);

    (0..worker_count)
        .map(|worker_index| {
            let start = (worker_index as u64).saturating_mul(step);
            let (page_range_start, page_range_end) = if start > last {
                // Empty: starts past the last page.
                let start = u32::try_from(start).unwrap_or(u32::MAX);
                (start, start - 1)
            } else {
                let end = (worker_index as u64 + 1)
                    .saturating_mul(step)
                    .saturating_sub(1)
                    .min(last);
                (start as u32, end as u32)
            };
            FetchJob {
                worker_index,
                page_range_start,
                page_range_end,
            }
        })
        .collect()
}

/// Where the listing is known to end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PaginationEnd {
    /// Zero matches on any page is an anomaly and reported.
    #[default]
    Unknown,
    /// Index of the last page with results. Pages past it are not fetched.
    LastPage(u32),
}

/// A pagination end together with the first listing page, when reading the
/// end required fetching it.
#[derive(Debug, Clone, Default)]
pub struct ProbedEnd {
    pub end: PaginationEnd,
    first_page: Option<String>,
}

impl From<PaginationEnd> for ProbedEnd {
    fn from(end: PaginationEnd) -> Self {
        Self {
            end,
            first_page: None,
        }
    }
}

impl PaginationEnd {
    /// Highest page index worth requesting given a configured maximum.
    #[must_use]
    pub fn clip(self, max_page: u32) -> u32 {
        match self {
            Self::Unknown => max_page,
            Self::LastPage(last) => last.min(max_page),
        }
    }
}

/// Runs Fetch -> Extract -> Filter&Dedup over a page range with a fixed pool
/// of workers, one per chunk.
#[derive(Clone)]
pub struct Harvester {
    source: Arc<dyn PageSource>,
    extractor: Arc<ListingExtractor>,
    context: Arc<HarvestContext>,
    base_url: String,
    forum_id: String,
    cancel: CancellationToken,
}

impl Harvester {
    #[must_use]
    pub fn new(
        source: Arc<dyn PageSource>,
        extractor: ListingExtractor,
        context: HarvestContext,
        base_url: impl Into<String>,
        forum_id: impl Into<String>,
    ) -> Self {
        Self {
            source,
            extractor: Arc::new(extractor),
            context: Arc::new(context),
            base_url: base_url.into(),
            forum_id: forum_id.into(),
            cancel: CancellationToken::new(),
        }
    }

    /// Stop workers before their next page once `token` is cancelled.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    fn page_url(&self, page: u32) -> String {
        ListingPageRef::new(self.forum_id.clone(), page).url(&self.base_url)
    }

    /// Read the paginator on the first listing page to learn where the
    /// results end.
    ///
    /// The fetched page is kept so [`run_probed`](Self::run_probed) does not
    /// request it again.
    ///
    /// # Errors
    ///
    /// Returns the fetch error if the first page cannot be retrieved.
    pub async fn probe_end(&self) -> Result<ProbedEnd, HarvestError> {
        let url = self.page_url(0);
        let body = self.fetch_cancellable(&url).await?;
        let end = probe_total_pages(&body)
            .filter(|&total| total > 0)
            .map_or(PaginationEnd::Unknown, |total| PaginationEnd::LastPage(total - 1));
        debug!(url = %url, ?end, "Probed pagination");
        Ok(ProbedEnd {
            end,
            first_page: Some(body),
        })
    }

    /// Harvest pages `[0, max_page]` (clipped to `end`) with `worker_count`
    /// workers and merge their outcomes.
    ///
    /// Never fails as a whole: page failures end up in the result's error
    /// summary next to whatever was collected.
    pub async fn run(&self, max_page: u32, worker_count: usize, end: PaginationEnd) -> AggregateResult {
        self.run_probed(max_page, worker_count, end.into()).await
    }

    /// Like [`run`](Self::run), reusing the first page fetched by
    /// [`probe_end`](Self::probe_end).
    pub async fn run_probed(
        &self,
        max_page: u32,
        worker_count: usize,
        probed: ProbedEnd,
    ) -> AggregateResult {
        let ProbedEnd { end, mut first_page } = probed;
        let max_page = end.clip(max_page);
        let jobs = partition(max_page, worker_count);
        info!(
            forum = %self.forum_id,
            max_page,
            workers = jobs.len(),
            layout = self.extractor.layout_name(),
            "Starting harvest"
        );

        let mut set = JoinSet::new();
        for job in jobs {
            let this = self.clone();
            let prefetched = if job.pages().contains(&0) {
                first_page.take()
            } else {
                None
            };
            set.spawn(async move { this.run_worker_from(job, prefetched).await });
        }

        let mut aggregator = ResultAggregator::new(max_page.saturating_add(1));
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(outcome) => aggregator.push(outcome),
                Err(e) => {
                    error!("Harvest worker task failed: {e}");
                    aggregator.push_lost_worker(format!("worker task failed: {e}"));
                }
            }
        }
        debug_assert_eq!(aggregator.outcomes(), worker_count);

        let result = aggregator.finish();
        info!(
            records = result.records.len(),
            pages_completed = result.pages_completed,
            pages_planned = result.pages_planned,
            "Harvest finished"
        );
        if let Some(errors) = &result.errors {
            warn!(failures = errors.total(), "Harvest interrupted with errors: {errors}");
        }
        result
    }

    /// Process one chunk strictly in page order, stopping at the first
    /// failure but keeping everything collected before it.
    pub async fn run_worker(&self, job: FetchJob) -> WorkerOutcome {
        self.run_worker_from(job, None).await
    }

    async fn run_worker_from(&self, job: FetchJob, mut first_page: Option<String>) -> WorkerOutcome {
        let mut outcome = WorkerOutcome::empty(job.worker_index);
        if job.is_empty() {
            debug!(worker = job.worker_index, "No pages assigned");
            return outcome;
        }

        for page in job.pages() {
            let prefetched = if page == 0 { first_page.take() } else { None };
            match self.harvest_page(page, prefetched).await {
                Ok(records) => {
                    debug!(
                        worker = job.worker_index,
                        page,
                        records = records.len(),
                        "Page harvested"
                    );
                    outcome.pages_completed += 1;
                    outcome.records.extend(records);
                }
                Err(error) => {
                    warn!(worker = job.worker_index, page, "Stopping worker: {error}");
                    outcome.failure = Some(PageFailure { page, error });
                    break;
                }
            }
        }

        outcome
    }

    async fn harvest_page(
        &self,
        page: u32,
        prefetched: Option<String>,
    ) -> Result<Vec<DiscussionRecord>, HarvestError> {
        let url = self.page_url(page);
        let body = match prefetched {
            Some(body) => body,
            None => self.fetch_cancellable(&url).await?,
        };
        let records = self.extractor.extract(&body, &url)?;
        Ok(records
            .into_iter()
            .filter(|record| self.context.admit(record))
            .collect())
    }

    async fn fetch_cancellable(&self, url: &str) -> Result<String, HarvestError> {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(HarvestError::Cancelled { url: url.to_string() }),
            body = self.source.fetch(url) => body,
        }
    }
}
