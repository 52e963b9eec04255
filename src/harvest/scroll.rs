//! Scroll pager: drives lazy loading until the page stops growing or the
//! scroll budget runs out.

use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::traits::{DriverError, PageDriver};

pub(crate) const HEIGHT_SCRIPT: &str = "document.body.scrollHeight";
pub(crate) const SCROLL_SCRIPT: &str = "window.scrollTo(0, document.body.scrollHeight);";

async fn read_height<D: PageDriver>(driver: &D) -> Result<u64, DriverError> {
    let value = driver.evaluate_script(HEIGHT_SCRIPT).await?;
    value
        .as_u64()
        .or_else(|| value.as_f64().map(|h| h as u64))
        .ok_or_else(|| DriverError::Script(format!("page height is not a number: {value}")))
}

/// Scrolls to the bottom repeatedly, pausing `settle` after each scroll.
///
/// Stops when two consecutive height reads are equal or once `budget` has
/// elapsed; the caller proceeds with whatever loaded either way. Returns the
/// number of scrolls issued. A driver failure stops scrolling early and is
/// logged, never propagated.
pub async fn run_until_stable<D: PageDriver>(driver: &D, budget: Duration, settle: Duration) -> usize {
    let deadline = Instant::now() + budget;
    let mut scrolls = 0;

    let mut last_height = match read_height(driver).await {
        Ok(height) => height,
        Err(e) => {
            warn!(error = %e, "Could not read page height, skipping scroll");
            return scrolls;
        }
    };

    while Instant::now() < deadline {
        if let Err(e) = driver.evaluate_script(SCROLL_SCRIPT).await {
            warn!(error = %e, "Scroll command failed, proceeding with loaded content");
            break;
        }
        scrolls += 1;

        tokio::time::sleep(settle).await;

        let height = match read_height(driver).await {
            Ok(height) => height,
            Err(e) => {
                warn!(error = %e, "Could not re-read page height");
                break;
            }
        };
        debug!(scrolls, last_height, height, "Scrolled");
        if height == last_height {
            break;
        }
        last_height = height;
    }

    scrolls
}
