use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DriverError {
    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },
    #[error("Script evaluation failed: {0}")]
    Script(String),
    #[error("Element lookup failed for '{selector}': {reason}")]
    Lookup { selector: String, reason: String },
    #[error("Session error: {0}")]
    Session(String),
    #[error("Driver error: {0}")]
    Other(String),
}

/// One live page session of the rendering engine.
///
/// Element handles are owned by the session and are only valid until the
/// next navigation; callers must not keep them past the extraction pass that
/// produced them.
///
/// `wait_for_selector` reports a timeout as `Ok(false)`. `Err` is reserved
/// for the session itself misbehaving.
#[async_trait]
pub trait PageDriver: Send + Sync {
    type Element: Send + Sync;

    async fn navigate(&self, url: &str) -> Result<(), DriverError>;

    async fn wait_for_selector(&self, selector: &str, timeout: Duration)
        -> Result<bool, DriverError>;

    async fn evaluate_script(&self, script: &str) -> Result<serde_json::Value, DriverError>;

    async fn find_all(&self, selector: &str) -> Result<Vec<Self::Element>, DriverError>;

    /// First descendant of `scope` matching `selector`, if any.
    async fn find_one(
        &self,
        scope: &Self::Element,
        selector: &str,
    ) -> Result<Option<Self::Element>, DriverError>;

    /// URL-valued attributes (`href`, `src`) come back absolute, resolved
    /// against the current page the way the browser resolves them.
    async fn attribute(
        &self,
        element: &Self::Element,
        name: &str,
    ) -> Result<Option<String>, DriverError>;

    async fn text(&self, element: &Self::Element) -> Result<String, DriverError>;

    /// Releases the session. Called exactly once by whoever opened it.
    async fn close(&self) -> Result<(), DriverError>;
}

/// Navigates with an explicit upper bound; expiry is a navigation error.
pub async fn navigate_within<D: PageDriver + ?Sized>(
    driver: &D,
    url: &str,
    limit: Duration,
) -> Result<(), DriverError> {
    match tokio::time::timeout(limit, driver.navigate(url)).await {
        Ok(outcome) => outcome,
        Err(_) => Err(DriverError::Navigation {
            url: url.to_string(),
            reason: format!("timed out after {}ms", limit.as_millis()),
        }),
    }
}

/// Opens page sessions. The coordinator opens one for the feed page and the
/// resolver opens one per worker.
#[async_trait]
pub trait DriverFactory: Send + Sync {
    type Session: PageDriver + 'static;

    async fn open(&self) -> Result<Self::Session, DriverError>;
}

/// Progress sink for the extraction pass. Receives the fraction of items
/// processed, non-decreasing from 0.0 to 1.0 within one pass.
pub trait Progress: Send {
    fn report(&mut self, fraction: f64);
}

impl<F> Progress for F
where
    F: FnMut(f64) + Send,
{
    fn report(&mut self, fraction: f64) {
        self(fraction)
    }
}

