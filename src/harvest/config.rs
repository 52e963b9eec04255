//! Selector and timing configuration for a harvest run.
//!
//! Defaults describe the Reddit search-results layout. Both structs load from
//! JSON with missing fields falling back to their defaults.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::model::MediaKind;

/// One step of the media fallback chain: the first descendant matching
/// `selector` yields a reference of `kind` with `url` read from `attribute`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRule {
    pub selector: String,
    pub attribute: String,
    pub kind: MediaKind,
}

impl MediaRule {
    pub fn new(selector: &str, attribute: &str, kind: MediaKind) -> Self {
        Self {
            selector: selector.to_string(),
            attribute: attribute.to_string(),
            kind,
        }
    }
}

/// CSS selectors locating each field on the feed and detail pages.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteSelectors {
    /// Container of one feed item
    pub item: String,

    /// Title element within an item (text is read)
    pub title: String,

    /// Anchor within an item whose `href` is the record link
    pub link: String,

    /// Ordered media rules; first hit wins
    pub media: Vec<MediaRule>,

    /// Attribute on the item holding a JSON tracking context. When `None`
    /// the inline username path is skipped entirely.
    pub author_context_attribute: Option<String>,

    /// Key path into the tracking context, e.g. `["post", "author_id"]`
    pub author_context_path: Vec<String>,

    /// Author anchor on a record's detail page
    pub detail_author: String,
}

impl Default for SiteSelectors {
    fn default() -> Self {
        Self {
            item: r#"[data-testid="search-post"]"#.to_string(),
            title: "a.no-underline.text-sm.font-semibold".to_string(),
            link: "a.no-underline".to_string(),
            media: vec![
                MediaRule::new("img", "src", MediaKind::Image),
                MediaRule::new("source", "src", MediaKind::Video),
            ],
            author_context_attribute: None,
            author_context_path: vec!["post".to_string(), "author_id".to_string()],
            detail_author: "shreddit-post faceplate-hovercard faceplate-tracker a".to_string(),
        }
    }
}

impl SiteSelectors {
    /// Enables the single-pass username path reading the given attribute.
    pub fn with_author_context(mut self, attribute: &str) -> Self {
        self.author_context_attribute = Some(attribute.to_string());
        self
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn load(path: &Path) -> std::io::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}

/// Fixed waits and pool width. All durations are upper bounds on a single
/// suspension; nothing in a run waits indefinitely.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestTimings {
    /// Pause after each bottom-scroll before re-measuring height
    #[serde(with = "millis")]
    pub settle_interval: Duration,

    /// Bound on any single page load
    #[serde(with = "millis")]
    pub navigation_timeout: Duration,

    /// Initial wait for the item container; expiry is fatal
    #[serde(with = "millis")]
    pub container_wait: Duration,

    /// Per-link wait for the detail-page author anchor
    #[serde(with = "millis")]
    pub author_wait: Duration,

    /// Resolver worker count
    pub concurrency: usize,
}

impl Default for HarvestTimings {
    fn default() -> Self {
        Self {
            settle_interval: Duration::from_secs(2),
            navigation_timeout: Duration::from_secs(30),
            container_wait: Duration::from_secs(10),
            author_wait: Duration::from_secs(10),
            concurrency: 5,
        }
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_selectors_keep_defaults() {
        let selectors =
            SiteSelectors::from_json(r#"{"item": "article", "author_context_attribute": "data-ctx"}"#)
                .unwrap();

        assert_eq!(selectors.item, "article");
        assert_eq!(selectors.author_context_attribute.as_deref(), Some("data-ctx"));
        assert_eq!(selectors.title, SiteSelectors::default().title);
        assert_eq!(selectors.media.len(), 2);
        assert_eq!(selectors.media[1].kind, MediaKind::Video);
    }

    #[test]
    fn test_timings_read_millis() {
        let timings: HarvestTimings =
            serde_json::from_str(r#"{"settle_interval": 500, "concurrency": 3}"#).unwrap();

        assert_eq!(timings.settle_interval, Duration::from_millis(500));
        assert_eq!(timings.container_wait, Duration::from_secs(10));
        assert_eq!(timings.navigation_timeout, Duration::from_secs(30));
        assert_eq!(timings.concurrency, 3);
    }
}
