//! Per-platform request signing
//!
//! Each platform authenticates API calls differently. Every algorithm is an independent
//! [`RequestSigner`]; [`Platform::signer`] picks the one a platform's listing endpoints use.
//! Signers are pure functions of the request parameters and the [`SigningContext`], so the
//! same inputs always yield the same [`Signature`].

mod csrf;
mod query;
mod webcast;

pub use csrf::CsrfSigner;
pub use query::QuerySigner;
pub use webcast::WebcastSigner;

use crate::config::Config;
use crate::error::SigningError;
use crate::types::Platform;
use std::collections::BTreeMap;

/// The request being signed
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RequestParams {
    /// URL path, e.g. `/aweme/v1/web/aweme/post/`
    pub path: String,
    /// Query parameters, in any order
    pub query: Vec<(String, String)>,
}

impl RequestParams {
    /// Build from a path and borrowed pairs
    pub fn new(path: impl Into<String>, query: &[(&str, String)]) -> Self {
        Self {
            path: path.into(),
            query: query
                .iter()
                .map(|(k, v)| ((*k).to_string(), v.clone()))
                .collect(),
        }
    }

    /// Canonical query string: sorted by key then value, percent-encoded, `exclude` omitted
    pub fn canonical_query(&self, exclude: &[&str]) -> String {
        let sorted: BTreeMap<(&str, &str), ()> = self
            .query
            .iter()
            .filter(|(k, _)| !exclude.contains(&k.as_str()))
            .map(|(k, v)| ((k.as_str(), v.as_str()), ()))
            .collect();

        sorted
            .keys()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }
}

/// Secret material and per-request inputs for a signer
#[derive(Clone, Debug, Default)]
pub struct SigningContext {
    /// User agent the request is sent with
    pub user_agent: String,
    /// Client device id
    pub device_id: Option<String>,
    /// Salt for digest signatures
    pub salt: Option<String>,
    /// Algorithm version
    pub algorithm_version: u32,
    /// Cookie string
    pub cookie: Option<String>,
    /// Live room id
    pub room_id: Option<String>,
    /// Client unique id for room signatures
    pub user_unique_id: Option<String>,
    /// Bearer token override
    pub bearer_token: Option<String>,
    /// Request time, unix seconds
    pub timestamp: i64,
}

impl SigningContext {
    /// Context for one request of a run configured by `config`
    pub fn from_config(config: &Config, timestamp: i64) -> Self {
        Self {
            user_agent: config.user_agent().to_string(),
            device_id: config.signing.device_id.clone(),
            salt: config.signing.salt.clone(),
            algorithm_version: config.signing.algorithm_version,
            cookie: config.network.cookie.clone(),
            room_id: config.signing.room_id.clone(),
            user_unique_id: config.signing.user_unique_id.clone(),
            bearer_token: config.signing.bearer_token.clone(),
            timestamp,
        }
    }

    /// Value of cookie `name`, if the cookie string carries a non-empty one
    pub fn cookie_value(&self, name: &str) -> Option<&str> {
        self.cookie
            .as_deref()
            .and_then(|cookie| crate::utils::cookie_value(cookie, name))
    }
}

/// Authentication material to attach to a request
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Signature {
    /// Extra query parameters
    pub query: Vec<(String, String)>,
    /// Extra headers
    pub headers: Vec<(String, String)>,
}

impl Signature {
    /// Append the signature to a request's query and headers
    pub fn apply(
        self,
        query: &mut Vec<(String, String)>,
        headers: &mut Vec<(String, String)>,
    ) {
        query.extend(self.query);
        headers.extend(self.headers);
    }
}

/// A request signing algorithm
pub trait RequestSigner: Send + Sync {
    /// Short algorithm name for logs and errors
    fn name(&self) -> &'static str;

    /// Compute the signature of `params` under `ctx`
    fn sign(&self, params: &RequestParams, ctx: &SigningContext)
    -> Result<Signature, SigningError>;
}

static QUERY: QuerySigner = QuerySigner;
static TWITTER: CsrfSigner = CsrfSigner::TWITTER;
static WEIBO: CsrfSigner = CsrfSigner::WEIBO;

impl Platform {
    /// Signer used by this platform's API endpoints
    pub fn signer(&self) -> &'static dyn RequestSigner {
        match self {
            Platform::Douyin | Platform::Tiktok => &QUERY,
            Platform::Twitter => &TWITTER,
            Platform::Weibo => &WEIBO,
        }
    }
}

/// Sign `params` with the algorithm `platform` uses
pub fn sign(
    platform: Platform,
    params: &RequestParams,
    ctx: &SigningContext,
) -> Result<Signature, SigningError> {
    platform.signer().sign(params, ctx)
}

pub(crate) fn require<'a>(
    algorithm: &'static str,
    field: &'static str,
    value: Option<&'a str>,
) -> Result<&'a str, SigningError> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(SigningError::MissingField { algorithm, field })
}

pub(crate) fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
