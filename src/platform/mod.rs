//! Platform adapters: target links, endpoint descriptions and response decoding
//!
//! [`Target::parse`] turns the configured link into the id the API needs. [`PlatformApi`]
//! describes the profile, listing and detail endpoints of a platform, signs them into
//! [`FetchRequest`]s and decodes the responses into [`Profile`]s, [`Page`]s and
//! [`ItemMetadata`].

mod decode;

use crate::config::Config;
use crate::error::{Error, FetchError, Result, SigningError};
use crate::fetcher::{FetchRequest, FetchResponse};
use crate::paginator::PageRequest;
use crate::signing::{self, RequestParams, SigningContext};
use crate::types::{Author, ItemMetadata, Mode, Platform};
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

const TWITTER_FEATURES: &str = r#"{"responsive_web_graphql_exclude_directive_enabled":true,"verified_phone_label_enabled":false,"responsive_web_graphql_timeline_navigation_enabled":true,"view_counts_everywhere_api_enabled":true,"longform_notetweets_consumption_enabled":true,"responsive_web_media_download_video_enabled":true}"#;

const TWITTER_USER_BY_SCREEN_NAME: &str = "G3KGOASz96M-Qu0nwmGXNg/UserByScreenName";
const TWITTER_USER_TWEETS: &str = "E3opETHurmVJflFsUBVuUQ/UserTweets";
const TWITTER_LIKES: &str = "aeJWz--kknVBOl7wQ7gh7Q/Likes";
const TWITTER_TWEET_BY_ID: &str = "Xl5pC_lBk_gcO2ItU39DQw/TweetResultByRestId";

/// Path segments on x.com that are not screen names
const TWITTER_RESERVED: [&str; 8] = [
    "i", "home", "explore", "search", "settings", "messages", "notifications", "hashtag",
];

// Static patterns, compiled once
#[allow(clippy::expect_used)]
static DOUYIN_ITEM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/(?:video|note)/(\d+)").expect("douyin item pattern is valid")
});
#[allow(clippy::expect_used)]
static DOUYIN_USER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/user/([A-Za-z0-9_\-]+)").expect("douyin user pattern is valid")
});
#[allow(clippy::expect_used)]
static TIKTOK_ITEM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/@[^/]+/(?:video|photo)/(\d+)").expect("tiktok item pattern is valid")
});
#[allow(clippy::expect_used)]
static TIKTOK_USER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/@([A-Za-z0-9_.]+)").expect("tiktok user pattern is valid"));
#[allow(clippy::expect_used)]
static WEIBO_ITEM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/(?:\d+|detail)/([A-Za-z0-9]+)/?$").expect("weibo item pattern is valid")
});
#[allow(clippy::expect_used)]
static WEIBO_USER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/(?:u/)?(\d+)/?$").expect("weibo user pattern is valid"));
#[allow(clippy::expect_used)]
static TWITTER_ITEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/status/(\d+)").expect("twitter item pattern is valid"));
#[allow(clippy::expect_used)]
static TWITTER_USER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/([A-Za-z0-9_]{1,15})/?(?:likes/?)?$").expect("twitter user pattern is valid")
});

impl Platform {
    /// Origin the platform's web API is served from
    pub fn api_base(&self) -> &'static str {
        match self {
            Platform::Douyin => "https://www.douyin.com",
            Platform::Tiktok => "https://www.tiktok.com",
            Platform::Weibo => "https://weibo.com",
            Platform::Twitter => "https://x.com",
        }
    }
}

/// What a run acquires, extracted from the configured link
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Target {
    /// Platform the link belongs to
    pub platform: Platform,
    /// Acquisition mode
    pub mode: Mode,
    /// Item id in single-item mode, otherwise the user key the profile endpoint takes
    /// (Douyin `sec_user_id`, TikTok unique id, Weibo uid, Twitter screen name)
    pub id: String,
}

impl Target {
    /// Parse `url` for `platform` and `mode`
    ///
    /// Fails with a configuration error keyed `url` when the link does not identify an
    /// item (single-item mode) or a user (listing modes).
    pub fn parse(platform: Platform, mode: Mode, url: &str) -> Result<Self> {
        let parsed = url::Url::parse(url.trim())
            .map_err(|e| Error::config("url", format!("invalid url {}: {}", url, e)))?;
        let path = parsed.path();

        let id = match (platform, mode.is_listing()) {
            (Platform::Douyin, false) => capture(&DOUYIN_ITEM, path).or_else(|| {
                parsed
                    .query_pairs()
                    .find(|(k, v)| k == "modal_id" && v.chars().all(|c| c.is_ascii_digit()))
                    .map(|(_, v)| v.into_owned())
            }),
            (Platform::Douyin, true) => capture(&DOUYIN_USER, path).filter(|id| id != "self"),
            (Platform::Tiktok, false) => capture(&TIKTOK_ITEM, path),
            (Platform::Tiktok, true) => capture(&TIKTOK_USER, path),
            (Platform::Weibo, false) => capture(&WEIBO_ITEM, path),
            (Platform::Weibo, true) => capture(&WEIBO_USER, path),
            (Platform::Twitter, false) => capture(&TWITTER_ITEM, path),
            (Platform::Twitter, true) => capture(&TWITTER_USER, path)
                .filter(|name| !TWITTER_RESERVED.contains(&name.to_ascii_lowercase().as_str())),
        };

        let id = id.ok_or_else(|| {
            let wanted = if mode.is_listing() { "user" } else { "item" };
            Error::config(
                "url",
                format!("{} link does not identify a {}: {}", platform, wanted, url),
            )
        })?;

        Ok(Self { platform, mode, id })
    }
}

fn capture(pattern: &Regex, haystack: &str) -> Option<String> {
    pattern
        .captures(haystack)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Profile of a listed user
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Profile {
    /// Stable id and display name
    pub author: Author,
    /// Id the listing endpoints take (Douyin/TikTok `secUid`, Weibo and Twitter uid)
    pub list_key: String,
}

/// One decoded listing page
#[derive(Clone, Debug, Default)]
pub struct Page {
    /// Items in listing order
    pub items: Vec<ItemMetadata>,
    /// Token for the next page
    pub next_cursor: Option<String>,
    /// Whether the server reports further pages
    pub has_more: bool,
}

/// Endpoint descriptions and decoders for one platform
#[derive(Clone, Debug)]
pub struct PlatformApi {
    platform: Platform,
    base: String,
    user_agent: String,
    referer: String,
    cookie: Option<String>,
}

impl PlatformApi {
    /// API for the configured platform; `api_base` overrides the origin
    pub fn new(config: &Config) -> Self {
        let base = config
            .network
            .api_base
            .as_deref()
            .unwrap_or_else(|| config.platform.api_base())
            .trim_end_matches('/')
            .to_string();

        Self {
            platform: config.platform,
            base,
            user_agent: config.user_agent().to_string(),
            referer: config.referer().to_string(),
            cookie: config.network.cookie.clone(),
        }
    }

    /// Platform served by this API
    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Profile request for a listing target
    pub fn profile_params(&self, target: &Target) -> RequestParams {
        let id = target.id.clone();
        match self.platform {
            Platform::Douyin => RequestParams::new(
                "/aweme/v1/web/user/profile/other/",
                &[
                    ("device_platform", "webapp".into()),
                    ("aid", "6383".into()),
                    ("sec_user_id", id),
                ],
            ),
            Platform::Tiktok => RequestParams::new(
                "/api/user/detail/",
                &[("aid", "1988".into()), ("uniqueId", id)],
            ),
            Platform::Weibo => RequestParams::new("/ajax/profile/info", &[("uid", id)]),
            Platform::Twitter => twitter_params(
                TWITTER_USER_BY_SCREEN_NAME,
                serde_json::json!({ "screen_name": id }),
            ),
        }
    }

    /// Listing page request for `mode`
    pub fn page_params(&self, mode: Mode, profile: &Profile, page: &PageRequest) -> RequestParams {
        let key = profile.list_key.clone();
        let count = page.count.to_string();
        let cursor = page.cursor.clone();

        match self.platform {
            Platform::Douyin => {
                let path = match mode {
                    Mode::Like => "/aweme/v1/web/aweme/favorite/",
                    _ => "/aweme/v1/web/aweme/post/",
                };
                RequestParams::new(
                    path,
                    &[
                        ("device_platform", "webapp".into()),
                        ("aid", "6383".into()),
                        ("sec_user_id", key),
                        ("max_cursor", cursor.unwrap_or_else(|| "0".into())),
                        ("count", count),
                    ],
                )
            }
            Platform::Tiktok => {
                let path = match mode {
                    Mode::Like => "/api/favorite/item_list/",
                    _ => "/api/post/item_list/",
                };
                RequestParams::new(
                    path,
                    &[
                        ("aid", "1988".into()),
                        ("secUid", key),
                        ("cursor", cursor.unwrap_or_else(|| "0".into())),
                        ("count", count),
                    ],
                )
            }
            Platform::Weibo => {
                let mut query = vec![
                    ("uid", key),
                    ("page", page.page.to_string()),
                    ("feature", "0".to_string()),
                ];
                if let Some(since_id) = cursor {
                    query.push(("since_id", since_id));
                }
                RequestParams::new("/ajax/statuses/mymblog", &query)
            }
            Platform::Twitter => {
                let operation = match mode {
                    Mode::Like => TWITTER_LIKES,
                    _ => TWITTER_USER_TWEETS,
                };
                let mut variables = serde_json::json!({
                    "userId": key,
                    "count": page.count,
                    "includePromotedContent": false,
                });
                if let Some(cursor) = cursor {
                    variables["cursor"] = Value::String(cursor);
                }
                twitter_params(operation, variables)
            }
        }
    }

    /// Detail request for one item
    pub fn item_params(&self, item_id: &str) -> RequestParams {
        let id = item_id.to_string();
        match self.platform {
            Platform::Douyin => RequestParams::new(
                "/aweme/v1/web/aweme/detail/",
                &[
                    ("device_platform", "webapp".into()),
                    ("aid", "6383".into()),
                    ("aweme_id", id),
                ],
            ),
            Platform::Tiktok => RequestParams::new(
                "/api/item/detail/",
                &[("aid", "1988".into()), ("itemId", id)],
            ),
            Platform::Weibo => RequestParams::new("/ajax/statuses/show", &[("id", id)]),
            Platform::Twitter => twitter_params(
                TWITTER_TWEET_BY_ID,
                serde_json::json!({ "tweetId": id, "withCommunity": false }),
            ),
        }
    }

    /// Sign `params` and turn them into a request with the configured headers
    pub fn request(
        &self,
        params: RequestParams,
        ctx: &SigningContext,
    ) -> std::result::Result<FetchRequest, SigningError> {
        let signature = signing::sign(self.platform, &params, ctx)?;

        let mut query = params.query;
        let mut headers = vec![
            ("User-Agent".to_string(), self.user_agent.clone()),
            ("Referer".to_string(), self.referer.clone()),
        ];
        if let Some(cookie) = &self.cookie {
            headers.push(("Cookie".to_string(), cookie.clone()));
        }
        signature.apply(&mut query, &mut headers);

        Ok(FetchRequest {
            url: format!("{}{}", self.base, params.path),
            query,
            headers,
        })
    }

    /// Unsigned request for a media file
    pub fn media_request(&self, url: &str) -> FetchRequest {
        FetchRequest::get(url)
            .header("User-Agent", self.user_agent.clone())
            .header("Referer", self.referer.clone())
    }

    /// Decode a profile response
    pub fn decode_profile(
        &self,
        response: &FetchResponse,
    ) -> std::result::Result<Profile, FetchError> {
        self.decode(response, decode::profile)
    }

    /// Decode a listing page response
    pub fn decode_page(&self, response: &FetchResponse) -> std::result::Result<Page, FetchError> {
        self.decode(response, decode::page)
    }

    /// Decode a detail response
    pub fn decode_item(
        &self,
        response: &FetchResponse,
    ) -> std::result::Result<ItemMetadata, FetchError> {
        self.decode(response, decode::item)
    }

    fn decode<T>(
        &self,
        response: &FetchResponse,
        decoder: fn(Platform, &Value) -> std::result::Result<T, String>,
    ) -> std::result::Result<T, FetchError> {
        let body: Value = response.json()?;
        decoder(self.platform, &body).map_err(|reason| FetchError::Decode {
            url: response.url.clone(),
            reason,
        })
    }
}

fn twitter_params(operation: &str, variables: Value) -> RequestParams {
    RequestParams::new(
        format!("/i/api/graphql/{}", operation),
        &[
            ("variables", variables.to_string()),
            ("features", TWITTER_FEATURES.to_string()),
        ],
    )
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn parse(platform: Platform, mode: Mode, url: &str) -> Result<String> {
        Target::parse(platform, mode, url).map(|t| t.id)
    }

    #[test]
    fn parses_douyin_links() {
        assert_eq!(
            parse(
                Platform::Douyin,
                Mode::Post,
                "https://www.douyin.com/user/MS4wLjABAAAA-x_y?from_tab_name=main"
            )
            .unwrap(),
            "MS4wLjABAAAA-x_y"
        );
        assert_eq!(
            parse(
                Platform::Douyin,
                Mode::One,
                "https://www.douyin.com/video/7301234567890123456"
            )
            .unwrap(),
            "7301234567890123456"
        );
        assert_eq!(
            parse(
                Platform::Douyin,
                Mode::One,
                "https://www.douyin.com/discover?modal_id=7301234567890123456"
            )
            .unwrap(),
            "7301234567890123456"
        );
    }

    #[test]
    fn parses_other_platform_links() {
        assert_eq!(
            parse(Platform::Tiktok, Mode::Like, "https://www.tiktok.com/@some.body").unwrap(),
            "some.body"
        );
        assert_eq!(
            parse(
                Platform::Tiktok,
                Mode::One,
                "https://www.tiktok.com/@some.body/video/7301234567890123456"
            )
            .unwrap(),
            "7301234567890123456"
        );
        assert_eq!(
            parse(Platform::Weibo, Mode::Post, "https://weibo.com/u/1234567890").unwrap(),
            "1234567890"
        );
        assert_eq!(
            parse(Platform::Weibo, Mode::One, "https://weibo.com/1234567890/NxYzAbC12").unwrap(),
            "NxYzAbC12"
        );
        assert_eq!(
            parse(Platform::Twitter, Mode::Post, "https://x.com/rustlang").unwrap(),
            "rustlang"
        );
        assert_eq!(
            parse(
                Platform::Twitter,
                Mode::One,
                "https://x.com/rustlang/status/1765000000000000000"
            )
            .unwrap(),
            "1765000000000000000"
        );
    }

    #[test]
    fn rejects_links_without_an_id() {
        for (platform, mode, url) in [
            (Platform::Douyin, Mode::One, "https://www.douyin.com/user/MS4w"),
            (Platform::Douyin, Mode::Post, "https://www.douyin.com/user/self"),
            (Platform::Twitter, Mode::Post, "https://x.com/home"),
            (Platform::Weibo, Mode::Post, "https://weibo.com/hot"),
            (Platform::Tiktok, Mode::Post, "not a url"),
        ] {
            let err = Target::parse(platform, mode, url).unwrap_err();
            assert!(
                matches!(err, Error::Config { ref key, .. } if key.as_deref() == Some("url")),
                "{url}: {err:?}"
            );
        }
    }

    fn douyin_config(api_base: Option<&str>) -> Config {
        let mut config = Config::default();
        config.platform = Platform::Douyin;
        config.network.api_base = api_base.map(str::to_string);
        config.network.cookie = Some("sessionid=abc".to_string());
        config
    }

    #[test]
    fn signed_request_carries_signature_and_headers() {
        let config = douyin_config(Some("http://127.0.0.1:9000/"));
        let api = PlatformApi::new(&config);
        let profile = Profile {
            author: Author::default(),
            list_key: "MS4w".to_string(),
        };
        let page = PageRequest {
            cursor: None,
            count: 20,
            page: 1,
        };
        let ctx = SigningContext::from_config(&config, 1_710_000_000);

        let request = api
            .request(api.page_params(Mode::Post, &profile, &page), &ctx)
            .unwrap();

        assert_eq!(
            request.url,
            "http://127.0.0.1:9000/aweme/v1/web/aweme/post/"
        );
        assert!(request.query.iter().any(|(k, v)| k == "max_cursor" && v == "0"));
        assert!(request.query.iter().any(|(k, _)| k == "X-Bogus"));
        assert!(
            request
                .headers
                .iter()
                .any(|(k, v)| k == "Cookie" && v == "sessionid=abc")
        );
    }

    #[test]
    fn like_mode_uses_favorite_endpoint() {
        let api = PlatformApi::new(&douyin_config(None));
        let profile = Profile {
            author: Author::default(),
            list_key: "MS4w".to_string(),
        };
        let page = PageRequest {
            cursor: Some("170".to_string()),
            count: 10,
            page: 2,
        };

        let params = api.page_params(Mode::Like, &profile, &page);
        assert_eq!(params.path, "/aweme/v1/web/aweme/favorite/");
        assert!(params.query.contains(&("max_cursor".to_string(), "170".to_string())));
    }

    #[test]
    fn twitter_requests_need_csrf_cookie() {
        let mut config = Config::default();
        config.platform = Platform::Twitter;
        let api = PlatformApi::new(&config);
        let ctx = SigningContext::from_config(&config, 1);

        let err = api.request(api.item_params("1"), &ctx).unwrap_err();
        assert!(matches!(err, SigningError::MissingField { .. }));
    }

    #[test]
    fn twitter_page_variables_carry_cursor() {
        let mut config = Config::default();
        config.platform = Platform::Twitter;
        let api = PlatformApi::new(&config);
        let profile = Profile {
            author: Author::default(),
            list_key: "12".to_string(),
        };
        let page = PageRequest {
            cursor: Some("bottom-1".to_string()),
            count: 20,
            page: 2,
        };

        let params = api.page_params(Mode::Post, &profile, &page);
        let variables = &params.query.iter().find(|(k, _)| k == "variables").unwrap().1;
        let variables: Value = serde_json::from_str(variables).unwrap();
        assert_eq!(variables["userId"], "12");
        assert_eq!(variables["cursor"], "bottom-1");
        assert!(params.path.ends_with("/UserTweets"));
    }
}
