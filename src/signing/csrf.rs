use super::{RequestParams, RequestSigner, Signature, SigningContext, require};
use crate::error::SigningError;

/// Bearer token the public web client sends with every GraphQL request
const TWITTER_WEB_BEARER: &str = "AAAAAAAAAAAAAAAAAAAAANRILgAAAAAAnNwIzUejRCOuH5E6I8xnZz4puTs%3D1Zv7ttfk8LF81IUq16cHjhLTvJu4FA33AGWWjCpTnA";

/// Copies an anti-forgery token from the cookie jar into a request header
///
/// Some platforms also require a bearer token; it is taken from the context or falls back
/// to the public web client token.
#[derive(Clone, Copy, Debug)]
pub struct CsrfSigner {
    cookie_name: &'static str,
    header: &'static str,
    bearer: Option<&'static str>,
    extra_headers: &'static [(&'static str, &'static str)],
}

impl CsrfSigner {
    /// Twitter: `ct0` cookie → `x-csrf-token`, plus bearer authorization
    pub const TWITTER: CsrfSigner = CsrfSigner {
        cookie_name: "ct0",
        header: "x-csrf-token",
        bearer: Some(TWITTER_WEB_BEARER),
        extra_headers: &[
            ("x-twitter-auth-type", "OAuth2Session"),
            ("x-twitter-active-user", "yes"),
        ],
    };

    /// Weibo: `XSRF-TOKEN` cookie → `x-xsrf-token`
    pub const WEIBO: CsrfSigner = CsrfSigner {
        cookie_name: "XSRF-TOKEN",
        header: "x-xsrf-token",
        bearer: None,
        extra_headers: &[],
    };
}

impl RequestSigner for CsrfSigner {
    fn name(&self) -> &'static str {
        "csrf"
    }

    fn sign(
        &self,
        _params: &RequestParams,
        ctx: &SigningContext,
    ) -> Result<Signature, SigningError> {
        require(self.name(), "cookie", ctx.cookie.as_deref())?;
        let token = ctx
            .cookie_value(self.cookie_name)
            .ok_or(SigningError::MissingField {
                algorithm: self.name(),
                field: self.cookie_name,
            })?;

        let mut headers = vec![(self.header.to_string(), token.to_string())];
        if let Some(default_bearer) = self.bearer {
            let bearer = ctx
                .bearer_token
                .as_deref()
                .filter(|b| !b.trim().is_empty())
                .unwrap_or(default_bearer);
            headers.push(("authorization".to_string(), format!("Bearer {bearer}")));
        }
        headers.extend(
            self.extra_headers
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string())),
        );

        Ok(Signature {
            query: Vec::new(),
            headers,
        })
    }
}
