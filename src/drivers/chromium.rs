//! Page driver over a headless Chromium via `chromiumoxide`.
//!
//! One browser process is shared by every session; each session is its own
//! tab, so resolver workers navigate independently.

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::element::Element;
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{error, info};

use crate::traits::{DriverError, DriverFactory, PageDriver};

const POLL_INTERVAL: Duration = Duration::from_millis(250);
const DEFAULT_NAVIGATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Attributes the browser reports resolved against the document URL.
const URL_ATTRIBUTES: &[&str] = &["href", "src"];

/// Owns the browser process and its event handler task.
///
/// Dropping the factory aborts the handler; the browser process is killed
/// when `Browser` drops.
pub struct ChromiumFactory {
    browser: Browser,
    handler: JoinHandle<()>,
    navigation_timeout: Duration,
}

impl ChromiumFactory {
    pub async fn launch(headless: bool) -> Result<Self, DriverError> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .request_timeout(Duration::from_secs(30))
            .window_size(1920, 1080)
            .arg("--disable-dev-shm-usage");
        if !headless {
            builder = builder.with_head();
        }
        let config = builder.build().map_err(DriverError::Session)?;

        info!(headless, "Launching browser");
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| DriverError::Session(format!("browser launch failed: {e}")))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    error!("Browser handler error: {:?}", e);
                }
            }
        });

        Ok(Self {
            browser,
            handler,
            navigation_timeout: DEFAULT_NAVIGATION_TIMEOUT,
        })
    }

    /// Bounds every tab's `navigate`, including the wait for the load event.
    pub fn with_navigation_timeout(mut self, timeout: Duration) -> Self {
        self.navigation_timeout = timeout;
        self
    }
}

impl Drop for ChromiumFactory {
    fn drop(&mut self) {
        self.handler.abort();
    }
}

#[async_trait]
impl DriverFactory for ChromiumFactory {
    type Session = ChromiumPage;

    async fn open(&self) -> Result<ChromiumPage, DriverError> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| DriverError::Session(format!("could not open tab: {e}")))?;
        Ok(ChromiumPage {
            page,
            navigation_timeout: self.navigation_timeout,
        })
    }
}

/// One browser tab.
pub struct ChromiumPage {
    page: Page,
    navigation_timeout: Duration,
}

fn lookup_error(selector: &str, e: impl std::fmt::Display) -> DriverError {
    DriverError::Lookup {
        selector: selector.to_string(),
        reason: e.to_string(),
    }
}

#[async_trait]
impl PageDriver for ChromiumPage {
    type Element = Element;

    async fn navigate(&self, url: &str) -> Result<(), DriverError> {
        let failed = |reason: String| DriverError::Navigation {
            url: url.to_string(),
            reason,
        };
        let load = async {
            self.page.goto(url).await?;
            self.page.wait_for_navigation().await?;
            Ok::<_, chromiumoxide::error::CdpError>(())
        };
        match tokio::time::timeout(self.navigation_timeout, load).await {
            Ok(loaded) => loaded.map_err(|e| failed(e.to_string())),
            Err(_) => Err(failed(format!(
                "timed out after {}s",
                self.navigation_timeout.as_secs()
            ))),
        }
    }

    async fn wait_for_selector(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<bool, DriverError> {
        let deadline = Instant::now() + timeout;
        loop {
            // Lookup errors while the DOM is still settling count as "not yet".
            if let Ok(found) = self.page.find_elements(selector).await {
                if !found.is_empty() {
                    return Ok(true);
                }
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn evaluate_script(&self, script: &str) -> Result<serde_json::Value, DriverError> {
        let evaluation = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| DriverError::Script(e.to_string()))?;
        Ok(evaluation.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    async fn find_all(&self, selector: &str) -> Result<Vec<Element>, DriverError> {
        self.page
            .find_elements(selector)
            .await
            .map_err(|e| lookup_error(selector, e))
    }

    async fn find_one(
        &self,
        scope: &Element,
        selector: &str,
    ) -> Result<Option<Element>, DriverError> {
        let found = scope
            .find_elements(selector)
            .await
            .map_err(|e| lookup_error(selector, e))?;
        Ok(found.into_iter().next())
    }

    async fn attribute(&self, element: &Element, name: &str) -> Result<Option<String>, DriverError> {
        let failed = |e: chromiumoxide::error::CdpError| {
            DriverError::Other(format!("attribute '{name}': {e}"))
        };
        // The DOM property carries the absolute URL; the raw attribute keeps
        // whatever the markup wrote.
        if URL_ATTRIBUTES.contains(&name) {
            let resolved = element.property(name).await.map_err(failed)?;
            if let Some(url) = resolved.as_ref().and_then(|v| v.as_str()).filter(|v| !v.is_empty()) {
                return Ok(Some(url.to_string()));
            }
        }
        element.attribute(name).await.map_err(failed)
    }

    async fn text(&self, element: &Element) -> Result<String, DriverError> {
        let text = element
            .inner_text()
            .await
            .map_err(|e| DriverError::Other(format!("inner text: {e}")))?;
        Ok(text.unwrap_or_default())
    }

    async fn close(&self) -> Result<(), DriverError> {
        self.page
            .clone()
            .close()
            .await
            .map_err(|e| DriverError::Session(e.to_string()))
    }
}
