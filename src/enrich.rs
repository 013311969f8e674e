//! Optional second stage: per-thread detail fetches.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::aggregate::ErrorSummary;
use crate::error::HarvestError;
use crate::extract::{parse_detail, DetailFields};
use crate::fetcher::PageSource;
use crate::models::DiscussionRecord;

/// Fills `created_at`, `content` and `favor_count` of records from their
/// detail pages.
///
/// At most `max_in_flight` detail fetches run at once, independent of the
/// primary worker pool.
#[derive(Clone)]
pub struct DetailEnricher {
    source: Arc<dyn PageSource>,
    gate: Arc<Semaphore>,
    cancel: CancellationToken,
}

impl DetailEnricher {
    /// # Panics
    ///
    /// Panics if `max_in_flight` is zero.
    #[must_use]
    pub fn new(source: Arc<dyn PageSource>, max_in_flight: usize) -> Self {
        assert!(max_in_flight > 0, "max_in_flight must be at least 1");
        Self {
            source,
            gate: Arc::new(Semaphore::new(max_in_flight)),
            cancel: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Fetch and parse one detail page under the concurrency gate.
    ///
    /// # Errors
    ///
    /// Returns the fetch error, or `Parse`/`FieldConversion` from parsing.
    pub async fn fetch_detail(&self, link: &str) -> Result<DetailFields, HarvestError> {
        let body = {
            // Held only for the network call; dropped on every path.
            let _permit = tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    return Err(HarvestError::Cancelled { url: link.to_string() });
                }
                permit = self.gate.acquire() => permit.map_err(|_| HarvestError::Cancelled {
                    url: link.to_string(),
                })?,
            };

            tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    return Err(HarvestError::Cancelled { url: link.to_string() });
                }
                body = self.source.fetch(link) => body?,
            }
        };
        parse_detail(&body, link)
    }

    /// Enrich a single record in place.
    ///
    /// # Errors
    ///
    /// Same as [`fetch_detail`](Self::fetch_detail). The record is untouched
    /// on error.
    pub async fn enrich_one(&self, record: &mut DiscussionRecord) -> Result<(), HarvestError> {
        let detail = self.fetch_detail(&record.link).await?;
        apply(record, detail);
        Ok(())
    }

    /// Enrich every record concurrently. Failed records keep their listing
    /// fields and their failures are returned grouped by message.
    pub async fn enrich_all(&self, records: &mut [DiscussionRecord]) -> ErrorSummary {
        info!(records = records.len(), "Enriching records with detail pages");

        let mut set = JoinSet::new();
        for (index, record) in records.iter().enumerate() {
            let this = self.clone();
            let link = record.link.clone();
            set.spawn(async move { (index, this.fetch_detail(&link).await) });
        }

        let mut errors = ErrorSummary::new();
        let mut enriched = 0usize;
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((index, Ok(detail))) => {
                    apply(&mut records[index], detail);
                    enriched += 1;
                }
                Ok((index, Err(e))) => {
                    warn!(link = %records[index].link, "Detail enrichment failed: {e}");
                    errors.record(&e, None);
                }
                Err(e) => {
                    error!("Detail task failed: {e}");
                    errors.record_message(format!("detail task failed: {e}"), None);
                }
            }
        }

        debug!(enriched, failed = errors.total(), "Detail enrichment finished");
        errors
    }
}

fn apply(record: &mut DiscussionRecord, detail: DetailFields) {
    record.created_at = Some(detail.created_at);
    record.content = Some(detail.content);
    record.favor_count = Some(detail.favor_count);
}
