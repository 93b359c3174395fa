//! Response decoders
//!
//! Platform APIs change shape often and omit fields freely, so decoding walks
//! [`serde_json::Value`] by JSON pointer instead of deserializing into fixed structs.
//! A malformed envelope fails the page; a malformed entry is skipped with a warning.

use super::{Page, Profile};
use crate::types::{Author, ItemMetadata, MediaKind, MediaRef, Platform};
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

/// Date format of Weibo and Twitter timestamps, e.g. `Sat Mar 09 21:05:07 +0800 2024`
const TEXT_DATE_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

type Decoded<T> = std::result::Result<T, String>;

/// String at `pointer`, accepting numbers for id fields
fn text(value: &Value, pointer: &str) -> Option<String> {
    match value.pointer(pointer)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn required(value: &Value, pointer: &str) -> Decoded<String> {
    text(value, pointer).ok_or_else(|| format!("missing `{}`", pointer))
}

/// Truthy flag at `pointer`: `true`, or a non-zero number
fn flag(value: &Value, pointer: &str) -> bool {
    match value.pointer(pointer) {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_i64().is_some_and(|n| n != 0),
        _ => false,
    }
}

fn array<'a>(value: &'a Value, pointer: &str) -> &'a [Value] {
    value
        .pointer(pointer)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

fn unix_time(value: &Value, pointer: &str) -> DateTime<Utc> {
    value
        .pointer(pointer)
        .and_then(|v| v.as_i64().or_else(|| v.as_str()?.parse().ok()))
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
        .unwrap_or_default()
}

fn text_time(value: &Value, pointer: &str) -> DateTime<Utc> {
    value
        .pointer(pointer)
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_str(s, TEXT_DATE_FORMAT).ok())
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_default()
}

fn media(url: Option<String>, kind: MediaKind) -> Option<MediaRef> {
    url.map(|url| MediaRef { url, kind })
}

/// Fail when the platform reports an API-level error in a 200 response
fn check_status(platform: Platform, body: &Value) -> Decoded<()> {
    let code = match platform {
        Platform::Douyin => body.pointer("/status_code").and_then(Value::as_i64),
        Platform::Tiktok => body.pointer("/statusCode").and_then(Value::as_i64),
        Platform::Weibo => body
            .pointer("/ok")
            .and_then(Value::as_i64)
            .map(|ok| if ok == 1 { 0 } else { ok.min(-1) }),
        Platform::Twitter => {
            if let Some(message) = body.pointer("/errors/0/message").and_then(Value::as_str) {
                return Err(format!("api error: {}", message));
            }
            None
        }
    };
    match code {
        Some(0) | None => Ok(()),
        Some(code) => Err(format!("api status {}", code)),
    }
}

/// Decode the profile of the target user
pub fn profile(platform: Platform, body: &Value) -> Decoded<Profile> {
    check_status(platform, body)?;
    let (uid, nickname, list_key) = match platform {
        Platform::Douyin => (
            required(body, "/user/uid")?,
            text(body, "/user/nickname"),
            required(body, "/user/sec_uid")?,
        ),
        Platform::Tiktok => (
            required(body, "/userInfo/user/id")?,
            text(body, "/userInfo/user/nickname"),
            required(body, "/userInfo/user/secUid")?,
        ),
        Platform::Weibo => {
            let uid = required(body, "/data/user/idstr")
                .or_else(|_| required(body, "/data/user/id"))?;
            (uid.clone(), text(body, "/data/user/screen_name"), uid)
        }
        Platform::Twitter => {
            let uid = required(body, "/data/user/result/rest_id")?;
            (
                uid.clone(),
                text(body, "/data/user/result/legacy/name"),
                uid,
            )
        }
    };

    Ok(Profile {
        author: Author {
            uid,
            nickname: nickname.unwrap_or_default(),
        },
        list_key,
    })
}

/// Decode one listing page
pub fn page(platform: Platform, body: &Value) -> Decoded<Page> {
    check_status(platform, body)?;
    match platform {
        Platform::Douyin => Ok(Page {
            items: entries(array(body, "/aweme_list"), aweme),
            next_cursor: text(body, "/max_cursor"),
            has_more: flag(body, "/has_more"),
        }),
        Platform::Tiktok => Ok(Page {
            items: entries(array(body, "/itemList"), tiktok_item),
            next_cursor: text(body, "/cursor"),
            has_more: flag(body, "/hasMore"),
        }),
        Platform::Weibo => {
            let next_cursor = text(body, "/data/since_id").filter(|id| id != "0");
            Ok(Page {
                items: entries(array(body, "/data/list"), weibo_status),
                has_more: next_cursor.is_some(),
                next_cursor,
            })
        }
        Platform::Twitter => twitter_timeline(body),
    }
}

/// Decode a single-item detail response
pub fn item(platform: Platform, body: &Value) -> Decoded<ItemMetadata> {
    check_status(platform, body)?;
    let entry = match platform {
        Platform::Douyin => body.pointer("/aweme_detail"),
        Platform::Tiktok => body.pointer("/itemInfo/itemStruct"),
        Platform::Weibo => Some(body),
        Platform::Twitter => body.pointer("/data/tweetResult/result"),
    }
    .filter(|entry| !entry.is_null())
    .ok_or_else(|| "item not found in response".to_string())?;

    match platform {
        Platform::Douyin => aweme(entry),
        Platform::Tiktok => tiktok_item(entry),
        Platform::Weibo => weibo_status(entry),
        Platform::Twitter => tweet(entry),
    }
}

fn entries(list: &[Value], decode: fn(&Value) -> Decoded<ItemMetadata>) -> Vec<ItemMetadata> {
    list.iter()
        .filter_map(|entry| match decode(entry) {
            Ok(item) => Some(item),
            Err(reason) => {
                tracing::warn!(reason = %reason, "Skipping undecodable listing entry");
                None
            }
        })
        .collect()
}

fn aweme(entry: &Value) -> Decoded<ItemMetadata> {
    let images = array(entry, "/images");
    let media = if images.is_empty() {
        media(text(entry, "/video/play_addr/url_list/0"), MediaKind::Video)
            .into_iter()
            .collect()
    } else {
        images
            .iter()
            .filter_map(|image| media(text(image, "/url_list/0"), MediaKind::Image))
            .collect()
    };

    Ok(ItemMetadata {
        item_id: required(entry, "/aweme_id")?,
        author: Author {
            uid: text(entry, "/author/uid").unwrap_or_default(),
            nickname: text(entry, "/author/nickname").unwrap_or_default(),
        },
        desc: text(entry, "/desc").unwrap_or_default(),
        create_time: unix_time(entry, "/create_time"),
        media,
    })
}

fn tiktok_item(entry: &Value) -> Decoded<ItemMetadata> {
    let images = array(entry, "/imagePost/images");
    let media = if images.is_empty() {
        media(text(entry, "/video/playAddr"), MediaKind::Video)
            .into_iter()
            .collect()
    } else {
        images
            .iter()
            .filter_map(|image| media(text(image, "/imageURL/urlList/0"), MediaKind::Image))
            .collect()
    };

    Ok(ItemMetadata {
        item_id: required(entry, "/id")?,
        author: Author {
            uid: text(entry, "/author/id").unwrap_or_default(),
            nickname: text(entry, "/author/nickname").unwrap_or_default(),
        },
        desc: text(entry, "/desc").unwrap_or_default(),
        create_time: unix_time(entry, "/createTime"),
        media,
    })
}

fn weibo_status(entry: &Value) -> Decoded<ItemMetadata> {
    let mut media: Vec<MediaRef> = array(entry, "/pic_ids")
        .iter()
        .filter_map(Value::as_str)
        .filter_map(|pic| {
            text(entry, &format!("/pic_infos/{}/largest/url", pic))
                .map(|url| MediaRef {
                    url,
                    kind: MediaKind::Image,
                })
        })
        .collect();
    if let Some(video) = text(entry, "/page_info/media_info/mp4_hd_url")
        .or_else(|| text(entry, "/page_info/media_info/stream_url"))
    {
        media.push(MediaRef {
            url: video,
            kind: MediaKind::Video,
        });
    }

    Ok(ItemMetadata {
        item_id: required(entry, "/idstr").or_else(|_| required(entry, "/id"))?,
        author: Author {
            uid: text(entry, "/user/idstr")
                .or_else(|| text(entry, "/user/id"))
                .unwrap_or_default(),
            nickname: text(entry, "/user/screen_name").unwrap_or_default(),
        },
        desc: text(entry, "/text_raw").unwrap_or_default(),
        create_time: text_time(entry, "/created_at"),
        media,
    })
}

fn tweet(entry: &Value) -> Decoded<ItemMetadata> {
    // Tweets with visibility results wrap the tweet one level deeper
    let entry = entry.pointer("/tweet").unwrap_or(entry);

    let media = array(entry, "/legacy/extended_entities/media")
        .iter()
        .filter_map(|m| match m.pointer("/type").and_then(Value::as_str) {
            Some("photo") => media(text(m, "/media_url_https"), MediaKind::Image),
            Some("video") | Some("animated_gif") => {
                let best = array(m, "/video_info/variants")
                    .iter()
                    .filter(|v| {
                        v.pointer("/content_type").and_then(Value::as_str) == Some("video/mp4")
                    })
                    .max_by_key(|v| v.pointer("/bitrate").and_then(Value::as_u64).unwrap_or(0));
                media(best.and_then(|v| text(v, "/url")), MediaKind::Video)
            }
            _ => None,
        })
        .collect();

    Ok(ItemMetadata {
        item_id: required(entry, "/rest_id")?,
        author: Author {
            uid: text(entry, "/core/user_results/result/rest_id").unwrap_or_default(),
            nickname: text(entry, "/core/user_results/result/legacy/name").unwrap_or_default(),
        },
        desc: text(entry, "/legacy/full_text").unwrap_or_default(),
        create_time: text_time(entry, "/legacy/created_at"),
        media,
    })
}

fn twitter_timeline(body: &Value) -> Decoded<Page> {
    let instructions = body
        .pointer("/data/user/result/timeline_v2/timeline/instructions")
        .or_else(|| body.pointer("/data/user/result/timeline/timeline/instructions"))
        .and_then(Value::as_array)
        .ok_or_else(|| "missing timeline instructions".to_string())?;

    let mut items = Vec::new();
    let mut next_cursor = None;
    for entry in instructions
        .iter()
        .flat_map(|instruction| array(instruction, "/entries"))
    {
        let content = match entry.pointer("/content") {
            Some(content) => content,
            None => continue,
        };
        if content.pointer("/cursorType").and_then(Value::as_str) == Some("Bottom") {
            next_cursor = text(content, "/value");
        } else if let Some(result) = content.pointer("/itemContent/tweet_results/result") {
            match tweet(result) {
                Ok(item) => items.push(item),
                Err(reason) => {
                    tracing::warn!(reason = %reason, "Skipping undecodable timeline entry")
                }
            }
        }
    }

    // The timeline keeps returning a bottom cursor after the last tweet
    let has_more = next_cursor.is_some() && !items.is_empty();
    Ok(Page {
        items,
        next_cursor,
        has_more,
    })
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn douyin_page_decodes_videos_and_image_posts() {
        let body = json!({
            "status_code": 0,
            "max_cursor": 1700000000000i64,
            "has_more": 1,
            "aweme_list": [
                {
                    "aweme_id": "7001",
                    "desc": "first",
                    "create_time": 1710018307,
                    "author": {"uid": "42", "nickname": "Night Owl"},
                    "video": {"play_addr": {"url_list": ["https://v.example/7001"]}}
                },
                {
                    "aweme_id": "7002",
                    "desc": "album",
                    "create_time": 1710018308,
                    "author": {"uid": "42", "nickname": "Night Owl"},
                    "images": [
                        {"url_list": ["https://p.example/a.jpeg"]},
                        {"url_list": ["https://p.example/b.jpeg"]}
                    ],
                    "video": {"play_addr": {"url_list": ["https://v.example/bgm"]}}
                },
                {"desc": "no id"}
            ]
        });

        let page = page(Platform::Douyin, &body).unwrap();

        assert!(page.has_more);
        assert_eq!(page.next_cursor.as_deref(), Some("1700000000000"));
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].media.len(), 1);
        assert_eq!(page.items[0].media[0].kind, MediaKind::Video);
        assert_eq!(page.items[0].author.nickname, "Night Owl");
        assert_eq!(page.items[0].create_time.timestamp(), 1710018307);
        assert_eq!(page.items[1].media.len(), 2);
        assert!(page.items[1].media.iter().all(|m| m.kind == MediaKind::Image));
    }

    #[test]
    fn douyin_error_status_fails_page() {
        let body = json!({"status_code": 8, "status_msg": "login required"});
        let err = page(Platform::Douyin, &body).unwrap_err();
        assert!(err.contains('8'));
    }

    #[test]
    fn tiktok_page_uses_bool_has_more() {
        let body = json!({
            "statusCode": 0,
            "cursor": "1710018307000",
            "hasMore": false,
            "itemList": [{
                "id": "9001",
                "desc": "clip",
                "createTime": "1710018307",
                "author": {"id": "77", "nickname": "dancer"},
                "video": {"playAddr": "https://v.example/9001"}
            }]
        });

        let page = page(Platform::Tiktok, &body).unwrap();
        assert!(!page.has_more);
        assert_eq!(page.items[0].item_id, "9001");
        assert_eq!(page.items[0].create_time.timestamp(), 1710018307);
    }

    #[test]
    fn weibo_status_collects_pictures_and_video() {
        let body = json!({
            "ok": 1,
            "data": {
                "since_id": "0",
                "list": [{
                    "idstr": "5001",
                    "text_raw": "hello",
                    "created_at": "Sat Mar 09 21:05:07 +0800 2024",
                    "user": {"idstr": "123", "screen_name": "writer"},
                    "pic_ids": ["p1", "p2"],
                    "pic_infos": {
                        "p1": {"largest": {"url": "https://w.example/p1.jpg"}},
                        "p2": {"largest": {"url": "https://w.example/p2.jpg"}}
                    },
                    "page_info": {"media_info": {"stream_url": "https://w.example/v.mp4"}}
                }]
            }
        });

        let page = page(Platform::Weibo, &body).unwrap();

        assert!(!page.has_more);
        assert!(page.next_cursor.is_none());
        let item = &page.items[0];
        assert_eq!(item.media.len(), 3);
        assert_eq!(item.media[2].kind, MediaKind::Video);
        assert_eq!(item.create_time.to_rfc3339(), "2024-03-09T13:05:07+00:00");
    }

    #[test]
    fn twitter_timeline_picks_best_variant_and_bottom_cursor() {
        let body = json!({
            "data": {"user": {"result": {"timeline_v2": {"timeline": {"instructions": [{
                "type": "TimelineAddEntries",
                "entries": [
                    {"content": {"itemContent": {"tweet_results": {"result": {
                        "rest_id": "1765",
                        "core": {"user_results": {"result": {
                            "rest_id": "12", "legacy": {"name": "poster"}
                        }}},
                        "legacy": {
                            "full_text": "look",
                            "created_at": "Sat Mar 09 13:05:07 +0000 2024",
                            "extended_entities": {"media": [
                                {"type": "photo", "media_url_https": "https://t.example/a.jpg"},
                                {"type": "video", "video_info": {"variants": [
                                    {"content_type": "application/x-mpegURL", "url": "https://t.example/v.m3u8"},
                                    {"content_type": "video/mp4", "bitrate": 832000, "url": "https://t.example/low.mp4"},
                                    {"content_type": "video/mp4", "bitrate": 2176000, "url": "https://t.example/high.mp4"}
                                ]}}
                            ]}
                        }
                    }}}}},
                    {"content": {"cursorType": "Top", "value": "top"}},
                    {"content": {"cursorType": "Bottom", "value": "bottom-1"}}
                ]
            }]}}}}}
        });

        let page = page(Platform::Twitter, &body).unwrap();

        assert!(page.has_more);
        assert_eq!(page.next_cursor.as_deref(), Some("bottom-1"));
        let media = &page.items[0].media;
        assert_eq!(media.len(), 2);
        assert_eq!(media[1].url, "https://t.example/high.mp4");
    }

    #[test]
    fn twitter_timeline_without_tweets_is_exhausted() {
        let body = json!({
            "data": {"user": {"result": {"timeline_v2": {"timeline": {"instructions": [{
                "entries": [{"content": {"cursorType": "Bottom", "value": "bottom-2"}}]
            }]}}}}}
        });

        let page = page(Platform::Twitter, &body).unwrap();
        assert!(!page.has_more);
        assert!(page.items.is_empty());
    }

    #[test]
    fn profiles_yield_uid_nickname_and_list_key() {
        let douyin = json!({"status_code": 0, "user": {
            "uid": "42", "sec_uid": "MS4wLjABAAAA", "nickname": "Night Owl"
        }});
        let p = profile(Platform::Douyin, &douyin).unwrap();
        assert_eq!(p.author.uid, "42");
        assert_eq!(p.list_key, "MS4wLjABAAAA");

        let weibo = json!({"ok": 1, "data": {"user": {"id": 123, "screen_name": "writer"}}});
        let p = profile(Platform::Weibo, &weibo).unwrap();
        assert_eq!(p.author.uid, "123");
        assert_eq!(p.list_key, "123");
        assert_eq!(p.author.nickname, "writer");

        let missing = json!({"status_code": 0, "user": {}});
        assert!(profile(Platform::Douyin, &missing).is_err());
    }

    #[test]
    fn detail_responses_decode_single_item() {
        let body = json!({"status_code": 0, "aweme_detail": {
            "aweme_id": "7001",
            "author": {"uid": "42", "nickname": "n"},
            "video": {"play_addr": {"url_list": ["https://v.example/7001"]}}
        }});
        assert_eq!(item(Platform::Douyin, &body).unwrap().item_id, "7001");

        let empty = json!({"status_code": 0, "aweme_detail": null});
        assert!(item(Platform::Douyin, &empty).is_err());
    }
}
