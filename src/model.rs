use serde::{Deserialize, Serialize};

/// Sentinel username for the inline author-context path when the attribute
/// is present but cannot be parsed. Distinct from an absent username.
pub const UNKNOWN_USERNAME: &str = "Unknown";

/// Immutable input to one harvest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestTarget {
    pub url: String,
    pub scroll_budget_seconds: u64,
    pub resolve_usernames: bool,
}

impl HarvestTarget {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            scroll_budget_seconds: 30,
            resolve_usernames: false,
        }
    }

    pub fn with_scroll_budget(mut self, seconds: u64) -> Self {
        self.scroll_budget_seconds = seconds;
        self
    }

    pub fn with_username_resolution(mut self, enabled: bool) -> Self {
        self.resolve_usernames = enabled;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    None,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
            MediaKind::None => "none",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaReference {
    pub url: Option<String>,
    pub kind: MediaKind,
}

impl MediaReference {
    pub fn none() -> Self {
        Self {
            url: None,
            kind: MediaKind::None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarvestedRecord {
    pub title: String,
    pub link: String, // unique within one run
    pub media: MediaReference,
    pub username: Option<String>,
}

/// A non-fatal problem recorded during a run (dropped item, failed lookup).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarvestIssue {
    pub context: String,
    pub message: String,
}

impl HarvestIssue {
    pub fn new(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarvestStats {
    pub total_duration_ms: u64,
    pub scroll_duration_ms: u64,
    pub extraction_duration_ms: u64,
    pub resolution_duration_ms: u64,
    pub items_seen: usize,
    pub duplicates_dropped: usize,
    pub usernames_resolved: usize,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct HarvestResult {
    pub records: Vec<HarvestedRecord>,
    pub errors: Vec<HarvestIssue>,
    pub stats: HarvestStats,
}
