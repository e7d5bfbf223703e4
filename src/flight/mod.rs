//! Upstream flight data: wire decoding, the source trait and its HTTP client.

use async_trait::async_trait;

use crate::flight::error::FlightError;
use crate::flight::error::UrlParseError;
use crate::flight::model::FlightSnapshot;

pub mod error;
pub mod flighty_client;
pub mod model;
pub mod payload;

/// Domain of the public share links users paste into the track command.
pub const SHARE_DOMAIN: &str = "live.flighty.app";

/// Source of current flight state for a tracking identifier.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FlightSource: Send + Sync {
    /// Fetches the current state of the flight.
    ///
    /// Never retries. Retry timing belongs to the reconciliation sweep.
    async fn fetch(&self, tracking_id: &str) -> Result<FlightSnapshot, FlightError>;
}

/// Extracts the tracking identifier from a share URL such as
/// `https://live.flighty.app/abc-123`.
pub fn parse_tracking_url(url: &str) -> Result<&str, UrlParseError> {
    let url = url.trim();
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .ok_or_else(|| UrlParseError::InvalidFormat {
            url: url.to_string(),
        })?;

    let (host, path) = rest.split_once('/').unwrap_or((rest, ""));
    if !host.eq_ignore_ascii_case(SHARE_DOMAIN) {
        return Err(UrlParseError::UnsupportedSite {
            site: host.to_string(),
        });
    }

    if path.is_empty() {
        return Err(UrlParseError::MissingId {
            url: url.to_string(),
        });
    }

    let valid = path
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-');
    if !valid {
        return Err(UrlParseError::InvalidFormat {
            url: url.to_string(),
        });
    }

    Ok(path)
}

/// Public share URL for a tracking identifier.
pub fn share_url(tracking_id: &str) -> String {
    format!("https://{SHARE_DOMAIN}/{tracking_id}")
}
