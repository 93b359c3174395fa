//! Core types for social-dl

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::paginator::StopReason;

/// Supported platforms
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Douyin (mainland China)
    #[default]
    Douyin,
    /// TikTok
    Tiktok,
    /// Weibo
    Weibo,
    /// Twitter / X
    Twitter,
}

impl Platform {
    /// Every platform, in declaration order
    pub const ALL: [Platform; 4] = [
        Platform::Douyin,
        Platform::Tiktok,
        Platform::Weibo,
        Platform::Twitter,
    ];

    /// Lowercase tag used in paths and file names
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Douyin => "douyin",
            Platform::Tiktok => "tiktok",
            Platform::Weibo => "weibo",
            Platform::Twitter => "twitter",
        }
    }

    /// Modes the platform's API can serve
    pub fn supported_modes(&self) -> &'static [Mode] {
        match self {
            Platform::Douyin | Platform::Tiktok | Platform::Twitter => {
                &[Mode::One, Mode::Post, Mode::Like]
            }
            Platform::Weibo => &[Mode::One, Mode::Post],
        }
    }

    /// Largest page size the listing endpoints accept
    pub fn max_page_size(&self) -> u32 {
        match self {
            Platform::Douyin => 35,
            Platform::Tiktok => 35,
            Platform::Weibo => 20,
            Platform::Twitter => 20,
        }
    }

    /// Name of the `{id}` alias placeholder for this platform
    pub fn id_alias(&self) -> &'static str {
        match self {
            Platform::Douyin | Platform::Tiktok => "aweme_id",
            Platform::Weibo => "weibo_id",
            Platform::Twitter => "tweet_id",
        }
    }

    /// User agent sent when none is configured
    pub fn default_user_agent(&self) -> &'static str {
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
         Chrome/120.0.0.0 Safari/537.36"
    }

    /// Referer sent when none is configured
    pub fn default_referer(&self) -> &'static str {
        match self {
            Platform::Douyin => "https://www.douyin.com/",
            Platform::Tiktok => "https://www.tiktok.com/",
            Platform::Weibo => "https://weibo.com/",
            Platform::Twitter => "https://x.com/",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "douyin" => Ok(Platform::Douyin),
            "tiktok" => Ok(Platform::Tiktok),
            "weibo" => Ok(Platform::Weibo),
            "twitter" | "x" => Ok(Platform::Twitter),
            other => Err(format!("unknown platform: {other}")),
        }
    }
}

/// Acquisition mode
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// A single post
    One,
    /// Everything a user has posted
    #[default]
    Post,
    /// Everything a user has liked
    Like,
}

impl Mode {
    /// Lowercase tag used in paths
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::One => "one",
            Mode::Post => "post",
            Mode::Like => "like",
        }
    }

    /// Whether the mode walks a paginated listing
    pub fn is_listing(&self) -> bool {
        !matches!(self, Mode::One)
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of a media reference
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Video stream
    Video,
    /// Still image
    Image,
    /// Background music / audio track
    Audio,
}

impl MediaKind {
    /// Lowercase tag used in multi-file suffixes
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Video => "video",
            MediaKind::Image => "image",
            MediaKind::Audio => "audio",
        }
    }

    /// Extension used when the URL does not reveal one
    pub fn default_extension(&self) -> &'static str {
        match self {
            MediaKind::Video => "mp4",
            MediaKind::Image => "jpg",
            MediaKind::Audio => "mp3",
        }
    }
}

/// One downloadable media file of an item
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    /// Direct URL
    pub url: String,
    /// Media kind
    pub kind: MediaKind,
}

/// Author of an item
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    /// Stable remote id
    pub uid: String,
    /// Current display name (may change between runs)
    pub nickname: String,
}

/// Decoded listing entry
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ItemMetadata {
    /// Remote item id
    pub item_id: String,
    /// Author
    pub author: Author,
    /// Post text
    pub desc: String,
    /// Creation time
    pub create_time: DateTime<Utc>,
    /// Media files, in display order
    pub media: Vec<MediaRef>,
}

/// Result of handling one item
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DownloadOutcome {
    /// Media written and recorded
    Downloaded {
        /// Final paths of the written files
        files: Vec<PathBuf>,
        /// Total bytes written
        bytes: u64,
    },
    /// Already recorded as complete; nothing fetched
    Skipped,
}

/// Persisted status of a download record
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    /// Download started, not yet finished
    Pending,
    /// All media written
    Complete,
    /// Download failed; retried on a later run
    Failed,
}

impl ItemStatus {
    /// Convert integer status code to ItemStatus
    pub fn from_i32(status: i32) -> Self {
        match status {
            0 => ItemStatus::Pending,
            1 => ItemStatus::Complete,
            _ => ItemStatus::Failed, // Unknown codes are treated as failed
        }
    }

    /// Convert ItemStatus to integer status code
    pub fn to_i32(&self) -> i32 {
        match self {
            ItemStatus::Pending => 0,
            ItemStatus::Complete => 1,
            ItemStatus::Failed => 2,
        }
    }
}

/// One failed item in a run
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFailure {
    /// Remote item id (empty when a page, not an item, failed)
    pub item_id: String,
    /// Machine-readable error code
    pub code: String,
    /// Human-readable cause
    pub error: String,
}

/// Outcome of one acquisition run
///
/// Every attempted item ends in exactly one of `succeeded`, `skipped`, `failed` or
/// `cancelled`. Failed profile, page and item-detail lookups never reach the pipeline and
/// are counted in `page_failures` instead.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Items handed to the download pipeline
    pub attempted: u64,
    /// Items downloaded in this run
    pub succeeded: u64,
    /// Items already present
    pub skipped: u64,
    /// Items that failed
    pub failed: u64,
    /// Items interrupted by cancellation
    pub cancelled: u64,
    /// Profile, listing page or item detail requests that failed
    pub page_failures: u64,
    /// Listing pages fetched
    pub pages: u32,
    /// Failure details
    pub failures: Vec<ItemFailure>,
    /// Why the listing stopped (None for single-item runs)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<StopReason>,
}

/// Event emitted during an acquisition run
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Run started
    RunStarted {
        /// Platform
        platform: Platform,
        /// Mode
        mode: Mode,
        /// Target link
        url: String,
    },

    /// A listing page was fetched and decoded
    PageFetched {
        /// 1-based page number
        page: u32,
        /// Items on the page
        items: usize,
        /// Items not seen earlier in this run
        new_items: usize,
        /// Whether the server reports more pages
        has_more: bool,
    },

    /// Item already downloaded in an earlier run
    ItemSkipped {
        /// Remote item id
        item_id: String,
    },

    /// Item media written
    ItemDownloaded {
        /// Remote item id
        item_id: String,
        /// Written files
        files: Vec<PathBuf>,
        /// Total bytes
        bytes: u64,
    },

    /// Item failed
    ItemFailed {
        /// Remote item id
        item_id: String,
        /// Error message
        error: String,
    },

    /// A user's folder followed a display name change
    FolderRenamed {
        /// Stable remote user id
        uid: String,
        /// Previous folder
        from: PathBuf,
        /// New folder
        to: PathBuf,
    },

    /// Run finished (also emitted after cancellation)
    RunFinished {
        /// Final counters
        summary: RunSummary,
    },
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_status_round_trips_through_i32() {
        for status in [ItemStatus::Pending, ItemStatus::Complete, ItemStatus::Failed] {
            assert_eq!(ItemStatus::from_i32(status.to_i32()), status);
        }
    }

    #[test]
    fn item_status_from_unknown_integer_defaults_to_failed() {
        assert_eq!(ItemStatus::from_i32(42), ItemStatus::Failed);
        assert_eq!(ItemStatus::from_i32(-1), ItemStatus::Failed);
    }

    #[test]
    fn platform_parses_case_insensitively() {
        assert_eq!("Douyin".parse::<Platform>().unwrap(), Platform::Douyin);
        assert_eq!("X".parse::<Platform>().unwrap(), Platform::Twitter);
        assert!("myspace".parse::<Platform>().is_err());
    }

    #[test]
    fn platform_display_matches_serde_tag() {
        for platform in Platform::ALL {
            let json = serde_json::to_string(&platform).unwrap();
            assert_eq!(json, format!("\"{platform}\""));
        }
    }

    #[test]
    fn weibo_has_no_like_listing() {
        assert!(!Platform::Weibo.supported_modes().contains(&Mode::Like));
        assert!(Platform::Douyin.supported_modes().contains(&Mode::Like));
    }

    #[test]
    fn event_serializes_with_type_tag() {
        let event = Event::ItemSkipped {
            item_id: "7301".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "item_skipped");
        assert_eq!(json["item_id"], "7301");
    }

    #[test]
    fn run_summary_omits_missing_stop_reason() {
        let json = serde_json::to_value(RunSummary::default()).unwrap();
        assert!(json.get("stop_reason").is_none());
        assert_eq!(json["attempted"], 0);
    }
}
