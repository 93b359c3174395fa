use super::{RequestParams, RequestSigner, Signature, SigningContext, hex, require};
use crate::error::SigningError;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::{Digest, Sha256};

/// Query parameter carrying the signature
pub const PARAM: &str = "signature";

/// Header carrying the stub digest
pub const STUB_HEADER: &str = "X-MS-STUB";

const SIGNATURE_BYTES: usize = 12;

/// Room-bound signature for live room endpoints
///
/// The digest covers a fixed client stub that embeds the room id and the client's unique
/// id, so a signature is only valid for the room it was computed for.
///
/// Runs never fetch live rooms, so [`Platform::signer`](crate::Platform::signer) does not
/// select this signer. Callers building live room requests apply it directly.
#[derive(Clone, Copy, Debug, Default)]
pub struct WebcastSigner;

impl WebcastSigner {
    /// The client stub digested into `X-MS-STUB`
    pub fn stub(room_id: &str, user_unique_id: &str) -> String {
        format!(
            "live_id=1,aid=6383,version_code=180800,webcast_sdk_version=1.0.14-beta.0,\
             room_id={room_id},sub_room_id=,sub_channel_id=,did_rule=3,\
             user_unique_id={user_unique_id},device_platform=web,device_type=,ac=,\
             identity=audience"
        )
    }
}

impl RequestSigner for WebcastSigner {
    fn name(&self) -> &'static str {
        "webcast"
    }

    fn sign(
        &self,
        _params: &RequestParams,
        ctx: &SigningContext,
    ) -> Result<Signature, SigningError> {
        let user_agent = require(self.name(), "user_agent", Some(ctx.user_agent.as_str()))?;
        let room_id = require(self.name(), "room_id", ctx.room_id.as_deref())?;
        let user_unique_id = require(self.name(), "user_unique_id", ctx.user_unique_id.as_deref())?;

        for (field, value) in [("room_id", room_id), ("user_unique_id", user_unique_id)] {
            if !value.chars().all(|c| c.is_ascii_digit()) {
                return Err(SigningError::Malformed {
                    field,
                    reason: format!("`{value}` is not numeric"),
                });
            }
        }

        let stub_digest = hex(&md5::compute(Self::stub(room_id, user_unique_id).as_bytes()).0);
        let mixed = Sha256::digest(format!("{stub_digest}|{user_agent}|{}", ctx.timestamp).as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(&mixed[..SIGNATURE_BYTES]);

        Ok(Signature {
            query: vec![(PARAM.to_string(), signature)],
            headers: vec![(STUB_HEADER.to_string(), stub_digest)],
        })
    }
}
