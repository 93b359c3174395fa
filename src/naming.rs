//! File naming templates and filesystem-safe names
//!
//! A naming template is a sequence of `{placeholder}` tokens joined by `-` or `_`, e.g.
//! `{create}_{desc}` or `{nickname}-{aweme_id}`. Rendering substitutes item metadata and
//! sanitizes the result so it is valid on common filesystems.

use crate::types::{ItemMetadata, Platform};
use regex::Regex;
use std::sync::LazyLock;

/// Characters allowed between placeholders
pub const SEPARATORS: [char; 2] = ['-', '_'];

/// Longest name (in characters) produced by [`sanitize_component`]
pub const MAX_NAME_CHARS: usize = 100;

/// Descriptions are cut to this many characters before rendering
pub const DESC_CHARS: usize = 20;

/// Timestamp format of `{create}`
pub const CREATE_FORMAT: &str = "%Y-%m-%d %H-%M-%S";

const INVALID_CHARS: [char; 9] = ['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

const RESERVED_NAMES: [&str; 22] = [
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

// Static pattern, compiled once
#[allow(clippy::expect_used)]
static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([A-Za-z_]+)\}").expect("placeholder pattern is valid"));

/// Placeholders a template may use on `platform`
pub fn allowed_placeholders(platform: Platform) -> [&'static str; 6] {
    ["nickname", "create", "id", "desc", "uid", platform.id_alias()]
}

/// Parts of `template` that are neither allowed placeholders nor separators
///
/// An empty result means the template is valid. An empty template is reported as invalid.
pub fn invalid_segments(template: &str, platform: Platform) -> Vec<String> {
    if template.trim().is_empty() {
        return vec!["(empty)".to_string()];
    }

    let allowed = allowed_placeholders(platform);
    let mut invalid = Vec::new();
    let mut last = 0;

    for captures in PLACEHOLDER.captures_iter(template) {
        let (Some(whole), Some(name)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        push_residue(&template[last..whole.start()], &mut invalid);
        if !allowed.contains(&name.as_str()) {
            invalid.push(whole.as_str().to_string());
        }
        last = whole.end();
    }
    push_residue(&template[last..], &mut invalid);

    invalid
}

fn push_residue(residue: &str, invalid: &mut Vec<String>) {
    if !residue.is_empty() && !residue.chars().all(|c| SEPARATORS.contains(&c)) {
        invalid.push(residue.to_string());
    }
}

/// Render the file stem of `item` from a validated template
///
/// Unknown placeholders render as empty strings. The result is sanitized.
pub fn render(template: &str, platform: Platform, item: &ItemMetadata) -> String {
    let alias = platform.id_alias();
    let rendered = PLACEHOLDER.replace_all(template, |captures: &regex::Captures<'_>| {
        let name = captures.get(1).map(|m| m.as_str()).unwrap_or_default();
        match name {
            "nickname" => item.author.nickname.clone(),
            "uid" => item.author.uid.clone(),
            "create" => item.create_time.format(CREATE_FORMAT).to_string(),
            "desc" => item.desc.chars().take(DESC_CHARS).collect(),
            "id" => item.item_id.clone(),
            other if other == alias => item.item_id.clone(),
            _ => String::new(),
        }
    });
    sanitize_component(&rendered)
}

/// Folder name for a user: the sanitized nickname, or the uid when the nickname is blank
pub fn folder_name(nickname: &str, uid: &str) -> String {
    if nickname.trim().is_empty() {
        sanitize_component(uid)
    } else {
        sanitize_component(nickname)
    }
}

/// Make `name` usable as a single path component on common filesystems
///
/// - `<>:"/\|?*` and control characters become `_`
/// - trailing dots and spaces are trimmed
/// - Windows device names (`CON`, `COM1`, ...) get a `_` prefix
/// - length is capped at [`MAX_NAME_CHARS`] characters
/// - an empty result becomes `_`
pub fn sanitize_component(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| {
            if INVALID_CHARS.contains(&c) || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();

    let mut cleaned = trim_trailing(&replaced).to_string();

    let stem = cleaned.split('.').next().unwrap_or_default();
    if RESERVED_NAMES
        .iter()
        .any(|reserved| stem.eq_ignore_ascii_case(reserved))
    {
        cleaned.insert(0, '_');
    }

    if cleaned.chars().count() > MAX_NAME_CHARS {
        let capped: String = cleaned.chars().take(MAX_NAME_CHARS).collect();
        cleaned = trim_trailing(&capped).to_string();
    }

    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned
    }
}

fn trim_trailing(name: &str) -> &str {
    name.trim_end_matches(['.', ' '])
}
