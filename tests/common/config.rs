//! Test configuration helpers

use social_dl::{Config, Mode, Platform};
use std::time::Duration;
use tempfile::TempDir;

/// Douyin listing config pointed at a mock API server
///
/// Files go to `<dir>/Download`, names are the bare item id, pages hold 3 items and
/// retries back off for milliseconds instead of seconds.
pub fn douyin_config(api_base: &str, dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.platform = Platform::Douyin;
    config.target.url = format!("https://www.douyin.com/user/{}", SEC_UID);
    config.target.mode = Mode::Post;
    config.output.path = dir.path().join("Download");
    config.output.naming = "{id}".to_string();
    config.network.api_base = Some(api_base.to_string());
    config.network.cookie = Some("sessionid=test-session".to_string());
    config.network.timeout = Duration::from_secs(5);
    config.network.retry.initial_delay = Duration::from_millis(10);
    config.network.retry.max_delay = Duration::from_millis(50);
    config.network.retry.jitter = false;
    config.listing.page_counts = 3;
    config
}

/// `sec_user_id` of the mock user
pub const SEC_UID: &str = "MS4wLjABAAAAmock";

/// Stable uid of the mock user
pub const UID: &str = "4242";
