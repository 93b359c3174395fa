use super::{RequestParams, RequestSigner, Signature, SigningContext, hex, require};
use crate::error::SigningError;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::{Digest, Sha256};

/// Query parameter carrying the signature
pub const PARAM: &str = "X-Bogus";

const DEFAULT_SALT: &str = "dhzx";
const TOKEN_BYTES: usize = 21;

/// Salted digest over the canonical query string, user agent and timestamp
///
/// Version 1 layout:
///
/// ```text
/// q  = md5(md5(canonical_query))
/// u  = md5(salt || user_agent)
/// t  = base64url(sha256("1|timestamp|device_id|path|q|u")[..21])
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct QuerySigner;

impl RequestSigner for QuerySigner {
    fn name(&self) -> &'static str {
        "query"
    }

    fn sign(
        &self,
        params: &RequestParams,
        ctx: &SigningContext,
    ) -> Result<Signature, SigningError> {
        if ctx.algorithm_version != 1 {
            return Err(SigningError::UnsupportedVersion {
                algorithm: self.name(),
                version: ctx.algorithm_version,
            });
        }
        let user_agent = require(self.name(), "user_agent", Some(ctx.user_agent.as_str()))?;
        if ctx.timestamp <= 0 {
            return Err(SigningError::Malformed {
                field: "timestamp",
                reason: format!("{} is not a unix time", ctx.timestamp),
            });
        }

        let canonical = params.canonical_query(&[PARAM]);
        let query_digest = md5::compute(md5::compute(canonical.as_bytes()).0);
        let salt = ctx.salt.as_deref().unwrap_or(DEFAULT_SALT);
        let ua_digest = md5::compute(format!("{salt}{user_agent}").as_bytes());

        let payload = format!(
            "{}|{}|{}|{}|{}|{}",
            ctx.algorithm_version,
            ctx.timestamp,
            ctx.device_id.as_deref().unwrap_or_default(),
            params.path,
            hex(&query_digest.0),
            hex(&ua_digest.0),
        );
        let digest = Sha256::digest(payload.as_bytes());
        let token = URL_SAFE_NO_PAD.encode(&digest[..TOKEN_BYTES]);

        Ok(Signature {
            query: vec![(PARAM.to_string(), token)],
            headers: Vec::new(),
        })
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> SigningContext {
        SigningContext {
            user_agent: "Mozilla/5.0 test".to_string(),
            device_id: Some("7312000000000000000".to_string()),
            algorithm_version: 1,
            timestamp: 1_700_000_000,
            ..Default::default()
        }
    }

    fn params() -> RequestParams {
        RequestParams::new(
            "/aweme/v1/web/aweme/post/",
            &[
                ("sec_user_id", "MS4wLjABAAAA".to_string()),
                ("max_cursor", "0".to_string()),
                ("count", "20".to_string()),
            ],
        )
    }

    fn token(sig: &Signature) -> &str {
        assert_eq!(sig.query.len(), 1);
        assert_eq!(sig.query[0].0, PARAM);
        &sig.query[0].1
    }

    #[test]
    fn identical_inputs_give_identical_tokens() {
        let a = QuerySigner.sign(&params(), &ctx()).unwrap();
        let b = QuerySigner.sign(&params(), &ctx()).unwrap();
        assert_eq!(a, b);
        assert_eq!(token(&a).len(), 28);
        assert!(
            token(&a)
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }

    #[test]
    fn parameter_order_does_not_matter() {
        let mut reordered = params();
        reordered.query.reverse();
        assert_eq!(
            QuerySigner.sign(&params(), &ctx()).unwrap(),
            QuerySigner.sign(&reordered, &ctx()).unwrap()
        );
    }

    #[test]
    fn existing_signature_param_is_ignored() {
        let mut signed = params();
        signed.query.push((PARAM.to_string(), "stale".to_string()));
        assert_eq!(
            QuerySigner.sign(&params(), &ctx()).unwrap(),
            QuerySigner.sign(&signed, &ctx()).unwrap()
        );
    }

    #[test]
    fn inputs_change_the_token() {
        let base = QuerySigner.sign(&params(), &ctx()).unwrap();

        let mut later = ctx();
        later.timestamp += 1;
        assert_ne!(base, QuerySigner.sign(&params(), &later).unwrap());

        let mut other_ua = ctx();
        other_ua.user_agent = "curl/8".to_string();
        assert_ne!(base, QuerySigner.sign(&params(), &other_ua).unwrap());

        let mut salted = ctx();
        salted.salt = Some("pepper".to_string());
        assert_ne!(base, QuerySigner.sign(&params(), &salted).unwrap());
    }

    #[test]
    fn missing_user_agent_is_rejected() {
        let mut ctx = ctx();
        ctx.user_agent = "  ".to_string();
        let err = QuerySigner.sign(&params(), &ctx).unwrap_err();
        assert!(matches!(
            err,
            SigningError::MissingField {
                field: "user_agent",
                ..
            }
        ));
    }

    #[test]
    fn unknown_version_is_rejected() {
        let mut ctx = ctx();
        ctx.algorithm_version = 2;
        let err = QuerySigner.sign(&params(), &ctx).unwrap_err();
        assert!(matches!(
            err,
            SigningError::UnsupportedVersion { version: 2, .. }
        ));
    }

    #[test]
    fn zero_timestamp_is_malformed() {
        let mut ctx = ctx();
        ctx.timestamp = 0;
        assert!(matches!(
            QuerySigner.sign(&params(), &ctx).unwrap_err(),
            SigningError::Malformed {
                field: "timestamp",
                ..
            }
        ));
    }
}
