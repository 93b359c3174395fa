//! Mock Douyin API: profile, paginated post listing and media files

use super::{SEC_UID, UID};
use serde_json::{Value, json};
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// Listing endpoint path
pub const POST_PATH: &str = "/aweme/v1/web/aweme/post/";

/// Profile endpoint path
pub const PROFILE_PATH: &str = "/aweme/v1/web/user/profile/other/";

/// Body served for media file `id`
pub fn media_body(id: usize) -> Vec<u8> {
    format!("mp4-bytes-of-{}", id).into_bytes()
}

/// One post entry pointing its video at `base`
pub fn aweme(base: &str, id: usize, nickname: &str) -> Value {
    json!({
        "aweme_id": id.to_string(),
        "desc": format!("post number {}", id),
        "create_time": 1_710_000_000 + id as i64,
        "author": {"uid": UID, "nickname": nickname},
        "video": {"play_addr": {"url_list": [format!("{}/media/{}.mp4", base, id)]}}
    })
}

/// Serves `total` posts, `count` per page, using `max_cursor` as an offset
pub struct PagedPosts {
    pub base: String,
    pub total: usize,
    pub nickname: String,
}

impl Respond for PagedPosts {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let param = |name: &str| {
            request
                .url
                .query_pairs()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.into_owned())
        };
        let offset: usize = param("max_cursor")
            .and_then(|c| c.parse().ok())
            .unwrap_or(0);
        let count: usize = param("count").and_then(|c| c.parse().ok()).unwrap_or(20);

        let end = (offset + count).min(self.total);
        let list: Vec<Value> = (offset + 1..=end)
            .map(|id| aweme(&self.base, id, &self.nickname))
            .collect();

        ResponseTemplate::new(200).set_body_json(json!({
            "status_code": 0,
            "aweme_list": list,
            "max_cursor": end,
            "has_more": if end < self.total { 1 } else { 0 },
        }))
    }
}

/// Mount profile, listing and media mocks for a user called `nickname` with `total` posts
pub async fn mount_douyin_user(server: &MockServer, total: usize, nickname: &str) {
    Mock::given(method("GET"))
        .and(path(PROFILE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status_code": 0,
            "user": {"uid": UID, "sec_uid": SEC_UID, "nickname": nickname}
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(POST_PATH))
        .respond_with(PagedPosts {
            base: server.uri(),
            total,
            nickname: nickname.to_string(),
        })
        .mount(server)
        .await;

    mount_media(server).await;
}

/// Serve every `/media/<id>.mp4` with [`media_body`]
pub async fn mount_media(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path_regex(r"^/media/\d+\.mp4$"))
        .respond_with(MediaFiles)
        .mount(server)
        .await;
}

struct MediaFiles;

impl Respond for MediaFiles {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let id = request
            .url
            .path()
            .trim_start_matches("/media/")
            .trim_end_matches(".mp4")
            .parse()
            .unwrap_or(0);
        ResponseTemplate::new(200).set_body_bytes(media_body(id))
    }
}

/// Number of requests the server received for paths starting with `prefix`
pub async fn requests_to(server: &MockServer, prefix: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path().starts_with(prefix))
        .count()
}
