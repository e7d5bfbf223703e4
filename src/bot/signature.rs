//! Slack request signing verification.
//!
//! See <https://api.slack.com/authentication/verifying-requests-from-slack>.

use axum::http::HeaderMap;
use hmac::Hmac;
use hmac::Mac;
use sha2::Sha256;

use crate::bot::error::BotError;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-slack-signature";
pub const TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";

/// Requests older or newer than this many seconds are rejected as replays.
const MAX_SKEW_SECS: u64 = 5 * 60;

const VERSION: &str = "v0";

pub struct SlackVerifier {
    secret: Vec<u8>,
}

impl SlackVerifier {
    pub fn new(signing_secret: &str) -> Self {
        Self {
            secret: signing_secret.as_bytes().to_vec(),
        }
    }

    /// Checks the signature headers of a request against its raw body.
    pub fn verify_request(&self, headers: &HeaderMap, body: &[u8], now: i64) -> Result<(), BotError> {
        let timestamp = header(headers, TIMESTAMP_HEADER)?;
        let signature = header(headers, SIGNATURE_HEADER)?;
        self.verify(timestamp, body, signature, now)
    }

    pub fn verify(
        &self,
        timestamp: &str,
        body: &[u8],
        signature: &str,
        now: i64,
    ) -> Result<(), BotError> {
        let sent_at: i64 = timestamp.parse().map_err(|_| BotError::StaleRequest)?;
        if now.abs_diff(sent_at) > MAX_SKEW_SECS {
            return Err(BotError::StaleRequest);
        }

        let expected = signature
            .strip_prefix("v0=")
            .and_then(|hex_sig| hex::decode(hex_sig).ok())
            .ok_or(BotError::InvalidSignature)?;

        self.mac(timestamp, body)?
            .verify_slice(&expected)
            .map_err(|_| BotError::InvalidSignature)
    }

    /// Signature header value for a body, as Slack would send it.
    pub fn sign(&self, timestamp: &str, body: &[u8]) -> Result<String, BotError> {
        let digest = self.mac(timestamp, body)?.finalize().into_bytes();
        Ok(format!("{VERSION}={}", hex::encode(digest)))
    }

    fn mac(&self, timestamp: &str, body: &[u8]) -> Result<HmacSha256, BotError> {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).map_err(|_| BotError::InvalidSignature)?;
        mac.update(VERSION.as_bytes());
        mac.update(b":");
        mac.update(timestamp.as_bytes());
        mac.update(b":");
        mac.update(body);
        Ok(mac)
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &'static str) -> Result<&'a str, BotError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .ok_or(BotError::MissingHeader { name })
}
