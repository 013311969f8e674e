//! One parameterized pipeline: harvest, optionally enrich, then emit.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::aggregate::AggregateResult;
use crate::config::Config;
use crate::enrich::DetailEnricher;
use crate::extract::ListingExtractor;
use crate::fetcher::{HttpPageSource, PageSource};
use crate::filter::HarvestContext;
use crate::scheduler::{Harvester, PaginationEnd, ProbedEnd};
use crate::sink::{JsonSink, RecordSink};

pub struct Pipeline {
    harvester: Harvester,
    enricher: Option<DetailEnricher>,
    sink: Box<dyn RecordSink>,
    max_page: u32,
    worker_count: usize,
    end: PaginationEnd,
    probe_end: bool,
}

impl Pipeline {
    /// Build the pipeline described by `config` over HTTP.
    ///
    /// # Errors
    ///
    /// Returns an error if the filter patterns do not compile or the HTTP
    /// client cannot be built.
    pub fn from_config(config: &Config, cancel: CancellationToken) -> Result<Self> {
        let source: Arc<dyn PageSource> = Arc::new(
            HttpPageSource::new(config.request_timeout).context("Failed to build HTTP client")?,
        );
        Self::with_source(config, source, cancel)
    }

    /// Build the pipeline over an arbitrary page source.
    ///
    /// # Errors
    ///
    /// Returns an error if the filter patterns do not compile.
    pub fn with_source(
        config: &Config,
        source: Arc<dyn PageSource>,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let patterns = config.title_patterns().context("Invalid filter patterns")?;
        info!(patterns = patterns.len(), "Compiled title filter");

        let harvester = Harvester::new(
            Arc::clone(&source),
            ListingExtractor::default(),
            HarvestContext::new(Box::new(patterns)),
            config.site_base_url.clone(),
            config.forum_id.clone(),
        )
        .with_cancellation(cancel.clone());

        let enricher = config.enrich_details.then(|| {
            DetailEnricher::new(Arc::clone(&source), config.enrich_concurrency)
                .with_cancellation(cancel)
        });

        Ok(Self {
            harvester,
            enricher,
            sink: Box::new(JsonSink::from_path(config.output_path.clone())),
            max_page: config.max_page,
            worker_count: config.worker_count,
            end: config
                .end_of_results_page
                .map_or(PaginationEnd::Unknown, PaginationEnd::LastPage),
            probe_end: config.probe_total_pages,
        })
    }

    #[must_use]
    pub fn with_sink(mut self, sink: Box<dyn RecordSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Run every stage and hand the result to the sink.
    ///
    /// Page and detail failures are part of the returned result, not errors.
    ///
    /// # Errors
    ///
    /// Returns an error only if the sink fails.
    pub async fn run(&self) -> Result<AggregateResult> {
        let probed = self.resolve_end().await;
        let mut result = self
            .harvester
            .run_probed(self.max_page, self.worker_count, probed)
            .await;

        if let Some(enricher) = &self.enricher {
            let errors = enricher.enrich_all(&mut result.records).await;
            if !errors.is_empty() {
                warn!(failures = errors.total(), "Detail enrichment incomplete: {errors}");
            }
            result.absorb_errors(errors);
        }

        self.sink
            .emit(&result)
            .await
            .context("Failed to emit harvest result")?;
        Ok(result)
    }

    async fn resolve_end(&self) -> ProbedEnd {
        if self.end != PaginationEnd::Unknown || !self.probe_end {
            return self.end.into();
        }
        match self.harvester.probe_end().await {
            Ok(probed) => {
                info!(end = ?probed.end, "Pagination end resolved from first page");
                probed
            }
            Err(e) => {
                warn!("Could not probe pagination, treating end as unknown: {e}");
                PaginationEnd::Unknown.into()
            }
        }
    }
}
