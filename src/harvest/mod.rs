//! Harvest module - scroll, extract and enrich pipeline for infinite feeds.
//!
//! This module provides the harvesting core:
//! - **Config**: [`SiteSelectors`] and [`HarvestTimings`] describing the page and its waits
//! - **Scroll**: [`run_until_stable`] grows the feed until it stops or the budget ends
//! - **Extract**: [`extract_records`] turns rendered items into records with fallbacks
//! - **Pipeline**: [`HarvestPipeline`] runs one harvest end to end

pub mod config;
pub mod extract;
pub mod pipeline;
pub mod scroll;

// Re-export commonly used types
pub use config::{HarvestTimings, MediaRule, SiteSelectors};
pub use extract::{author_from_context, extract_records};
pub use pipeline::{HarvestPipeline, PipelineError};
pub use scroll::run_until_stable;
