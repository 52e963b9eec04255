pub mod executor;
pub mod export;
pub mod harvest;
pub mod model;
pub mod traits;

#[cfg(feature = "chromium")]
pub mod drivers;

#[cfg(test)]
pub(crate) mod testing;

// Re-export common types for convenience
pub use executor::*;
pub use harvest::{HarvestPipeline, HarvestTimings, PipelineError, SiteSelectors};
pub use model::*;
pub use traits::*;
