//! Record extraction over a rendered snapshot of the feed.
//!
//! Title and link are mandatory; an item missing either is dropped with an
//! issue entry. Media and the inline username are best-effort and fall back
//! to sentinels without recording anything.

use serde_json::Value;
use std::collections::HashSet;
use std::time::Instant;
use tracing::{debug, warn};
use url::Url;

use crate::harvest::config::{MediaRule, SiteSelectors};
use crate::model::{
    HarvestIssue, HarvestResult, HarvestedRecord, MediaReference, UNKNOWN_USERNAME,
};
use crate::traits::{PageDriver, Progress};

/// Extracts records from every item currently rendered, in DOM order.
///
/// Duplicate links keep their first occurrence. Issues for dropped items are
/// collected in the result and never abort the pass. `progress` receives
/// `processed / total` after each item, or `1.0` once if there are none.
///
/// Relative links and media sources are resolved against `base`, so the
/// dedup key and the resolver both see absolute URLs.
pub async fn extract_records<D: PageDriver>(
    driver: &D,
    selectors: &SiteSelectors,
    base: Option<&Url>,
    mut progress: Option<&mut dyn Progress>,
) -> HarvestResult {
    let start = Instant::now();
    let mut result = HarvestResult::default();

    let items = match driver.find_all(&selectors.item).await {
        Ok(items) => items,
        Err(e) => {
            warn!(error = %e, "Could not list feed items");
            result.errors.push(HarvestIssue::new("items", e.to_string()));
            if let Some(sink) = progress.as_deref_mut() {
                sink.report(1.0);
            }
            return result;
        }
    };

    let total = items.len();
    result.stats.items_seen = total;
    if total == 0 {
        if let Some(sink) = progress.as_deref_mut() {
            sink.report(1.0);
        }
    }

    let mut seen = HashSet::new();
    for (index, item) in items.iter().enumerate() {
        match extract_item(driver, item, selectors, base).await {
            Ok(record) => {
                if seen.insert(record.link.clone()) {
                    result.records.push(record);
                } else {
                    debug!(link = %record.link, "Dropping duplicate item");
                    result.stats.duplicates_dropped += 1;
                }
            }
            Err(message) => {
                debug!(item = index + 1, %message, "Dropping item");
                result
                    .errors
                    .push(HarvestIssue::new(format!("item {}", index + 1), message));
            }
        }

        if let Some(sink) = progress.as_deref_mut() {
            sink.report((index + 1) as f64 / total as f64);
        }
    }

    result.stats.extraction_duration_ms = start.elapsed().as_millis() as u64;
    result
}

async fn extract_item<D: PageDriver>(
    driver: &D,
    item: &D::Element,
    selectors: &SiteSelectors,
    base: Option<&Url>,
) -> Result<HarvestedRecord, String> {
    let title = match driver.find_one(item, &selectors.title).await {
        Ok(Some(element)) => driver
            .text(&element)
            .await
            .map_err(|e| format!("title unreadable: {e}"))?,
        Ok(None) => return Err("missing title".to_string()),
        Err(e) => return Err(format!("title lookup failed: {e}")),
    };

    let link = match driver.find_one(item, &selectors.link).await {
        Ok(Some(element)) => driver
            .attribute(&element, "href")
            .await
            .map_err(|e| format!("link unreadable: {e}"))?,
        Ok(None) => None,
        Err(e) => return Err(format!("link lookup failed: {e}")),
    };
    let link = match link {
        Some(link) if !link.trim().is_empty() => absolutize(link.trim(), base),
        _ => return Err("missing link".to_string()),
    };

    let mut media = first_media(driver, item, &selectors.media).await;
    media.url = media.url.map(|src| absolutize(&src, base));

    let username = match &selectors.author_context_attribute {
        Some(attribute) => Some(inline_username(driver, item, attribute, &selectors.author_context_path).await),
        None => None,
    };

    Ok(HarvestedRecord {
        title: title.trim().to_string(),
        link,
        media,
        username,
    })
}

fn absolutize(raw: &str, base: Option<&Url>) -> String {
    match base.map(|b| b.join(raw)) {
        Some(Ok(resolved)) => resolved.into(),
        _ => raw.to_string(),
    }
}

/// Walks the media rules in order; the first rule whose selector matches
/// decides the kind, even if its source attribute is missing.
async fn first_media<D: PageDriver>(
    driver: &D,
    item: &D::Element,
    rules: &[MediaRule],
) -> MediaReference {
    for rule in rules {
        let Ok(Some(element)) = driver.find_one(item, &rule.selector).await else {
            continue;
        };
        let url = driver
            .attribute(&element, &rule.attribute)
            .await
            .ok()
            .flatten();
        return MediaReference {
            url,
            kind: rule.kind,
        };
    }
    MediaReference::none()
}

async fn inline_username<D: PageDriver>(
    driver: &D,
    item: &D::Element,
    attribute: &str,
    path: &[String],
) -> String {
    driver
        .attribute(item, attribute)
        .await
        .ok()
        .flatten()
        .and_then(|raw| author_from_context(&raw, path))
        .unwrap_or_else(|| UNKNOWN_USERNAME.to_string())
}

/// Walks `path` through a JSON tracking context and returns the leaf as text.
pub fn author_from_context(raw: &str, path: &[String]) -> Option<String> {
    let root: Value = serde_json::from_str(raw).ok()?;
    let leaf = path.iter().try_fold(&root, |node, key| node.get(key))?;
    match leaf {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
