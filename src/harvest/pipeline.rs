//! Harvest coordinator.
//!
//! This module provides the [`HarvestPipeline`] that runs one harvest
//! sequentially (load → scroll → extract → resolve) with:
//! - One driver session for the feed, always released before returning
//! - Bounded waits on every suspension point
//! - Structured logging via `tracing`
//! - Optional detail-page username resolution joined back by link

use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, instrument, warn};
use url::Url;

use crate::executor::UsernameResolver;
use crate::harvest::config::{HarvestTimings, SiteSelectors};
use crate::harvest::extract::extract_records;
use crate::harvest::scroll::run_until_stable;
use crate::model::{HarvestResult, HarvestTarget};
use crate::traits::{navigate_within, DriverError, DriverFactory, PageDriver, Progress};

// ============================================================================
// Pipeline Errors
// ============================================================================

/// Failures that abort a run. Everything else ends up in
/// [`HarvestResult::errors`].
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    /// No session could be opened for the feed page
    #[error("Could not open a driver session: {0}")]
    SessionOpen(#[source] DriverError),

    /// Initial navigation or container wait failed at the driver level
    #[error("Failed to load {url}: {source}")]
    PageLoad {
        url: String,
        #[source]
        source: DriverError,
    },

    /// The item container never rendered
    #[error("Item container '{selector}' did not appear within {timeout_secs}s")]
    ContainerTimeout { selector: String, timeout_secs: u64 },
}

// ============================================================================
// Pipeline Executor
// ============================================================================

/// Harvest coordinator bound to a driver factory.
///
/// # Example
///
/// ```ignore
/// let pipeline = HarvestPipeline::new(factory).with_concurrency(8);
/// let target = HarvestTarget::new("https://www.reddit.com/r/rust/search/?q=tokio&type=media")
///     .with_scroll_budget(60)
///     .with_username_resolution(true);
///
/// let result = pipeline.execute(&target, None).await?;
/// println!("Harvested {} records", result.records.len());
/// ```
pub struct HarvestPipeline<F>
where
    F: DriverFactory,
{
    factory: Arc<F>,
    selectors: SiteSelectors,
    timings: HarvestTimings,
}

impl<F> HarvestPipeline<F>
where
    F: DriverFactory + 'static,
{
    /// Creates a pipeline with the default selectors and timings.
    pub fn new(factory: F) -> Self {
        Self {
            factory: Arc::new(factory),
            selectors: SiteSelectors::default(),
            timings: HarvestTimings::default(),
        }
    }

    pub fn with_selectors(mut self, selectors: SiteSelectors) -> Self {
        self.selectors = selectors;
        self
    }

    pub fn with_timings(mut self, timings: HarvestTimings) -> Self {
        self.timings = timings;
        self
    }

    /// Sets the resolver worker count (minimum 1).
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.timings.concurrency = concurrency.max(1);
        self
    }

    pub fn selectors(&self) -> &SiteSelectors {
        &self.selectors
    }

    /// Runs one harvest.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] only if the feed page cannot be opened,
    /// loaded, or never shows its item container. Per-item and per-link
    /// failures are reported in the result instead.
    #[instrument(skip(self, target, progress), fields(url = %target.url))]
    pub async fn execute(
        &self,
        target: &HarvestTarget,
        progress: Option<&mut dyn Progress>,
    ) -> Result<HarvestResult, PipelineError> {
        let start = Instant::now();
        let session = self.factory.open().await.map_err(PipelineError::SessionOpen)?;

        let outcome = self.run(&session, target, progress).await;

        if let Err(e) = session.close().await {
            warn!(error = %e, "Failed to release feed session");
        }

        let mut result = outcome?;
        result.stats.total_duration_ms = start.elapsed().as_millis() as u64;
        info!(
            records = result.records.len(),
            issues = result.errors.len(),
            duration_ms = result.stats.total_duration_ms,
            "Harvest completed"
        );
        Ok(result)
    }

    async fn run(
        &self,
        session: &F::Session,
        target: &HarvestTarget,
        progress: Option<&mut dyn Progress>,
    ) -> Result<HarvestResult, PipelineError> {
        // ====================================================================
        // Stage 1: Load
        // ====================================================================

        let page_load = |source| PipelineError::PageLoad {
            url: target.url.clone(),
            source,
        };
        navigate_within(session, &target.url, self.timings.navigation_timeout)
            .await
            .map_err(page_load)?;

        let container_wait = self.timings.container_wait;
        let appeared = session
            .wait_for_selector(&self.selectors.item, container_wait)
            .await
            .map_err(page_load)?;
        if !appeared {
            return Err(PipelineError::ContainerTimeout {
                selector: self.selectors.item.clone(),
                timeout_secs: container_wait.as_secs(),
            });
        }

        // ====================================================================
        // Stage 2: Scroll
        // ====================================================================

        let scroll_start = Instant::now();
        let budget = Duration::from_secs(target.scroll_budget_seconds);
        let scrolls = run_until_stable(session, budget, self.timings.settle_interval).await;
        let scroll_duration_ms = scroll_start.elapsed().as_millis() as u64;
        info!(scrolls, duration_ms = scroll_duration_ms, "Scrolling finished");

        // ====================================================================
        // Stage 3: Extract
        // ====================================================================

        let base = Url::parse(&target.url).ok();
        let mut result = extract_records(session, &self.selectors, base.as_ref(), progress).await;
        result.stats.scroll_duration_ms = scroll_duration_ms;
        info!(
            items = result.stats.items_seen,
            records = result.records.len(),
            dropped = result.errors.len(),
            duplicates = result.stats.duplicates_dropped,
            "Extraction completed"
        );

        // ====================================================================
        // Stage 4: Resolve (optional)
        // ====================================================================

        if target.resolve_usernames && !result.records.is_empty() {
            let resolve_start = Instant::now();
            let links = result.records.iter().map(|r| r.link.clone()).collect();
            let resolver = UsernameResolver::new(
                self.factory.clone(),
                self.selectors.detail_author.clone(),
                self.timings.author_wait,
            )
            .with_concurrency(self.timings.concurrency)
            .with_navigation_timeout(self.timings.navigation_timeout);
            let resolution = resolver.resolve(links).await;

            // Left join by link: records without a resolved name keep theirs.
            for record in &mut result.records {
                if let Some(Some(name)) = resolution.usernames.get(&record.link) {
                    record.username = Some(name.clone());
                }
            }
            result.stats.usernames_resolved = resolution.resolved();
            result.errors.extend(resolution.errors);
            result.stats.resolution_duration_ms = resolve_start.elapsed().as_millis() as u64;
        }

        Ok(result)
    }
}

// ============================================================================
// Tests
// ============================================================================
