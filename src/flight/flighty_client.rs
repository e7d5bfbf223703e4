//! Flighty live-share client.

use std::num::NonZeroU32;
use std::time::Duration;

use async_trait::async_trait;
use governor::Quota;
use governor::RateLimiter;
use governor::clock::QuantaClock;
use governor::state::InMemoryState;
use governor::state::direct::NotKeyed;
use log::debug;
use log::info;
use log::warn;
use wreq::StatusCode;
use wreq::header::ACCEPT;

use crate::flight::FlightSource;
use crate::flight::error::FlightError;
use crate::flight::model::FlightSnapshot;
use crate::flight::payload::decode_snapshot;

/// Marker preceding the flight document embedded in the share page.
const FLIGHT_MARKER: &str = "var flight = ";

// NOTE: Not documented. Sweeps are spread over a minute so this is generous.
const REQUESTS_PER_SECOND: NonZeroU32 = NonZeroU32::new(10).unwrap();

#[derive(Clone, Debug)]
pub struct FlightyInfo {
    /// Base of the machine-readable endpoint, e.g. `https://live.flighty.app/api`.
    pub api_url: String,
    /// Base of the human-facing share page, e.g. `https://live.flighty.app`.
    pub page_url: String,
}

/// Fetches flights with a structured endpoint first and the share page as fallback.
pub struct FlightyClient {
    pub info: FlightyInfo,
    client: wreq::Client,
    limiter: RateLimiter<NotKeyed, InMemoryState, QuantaClock>,
    timeout: Duration,
}

impl FlightyClient {
    pub fn new(info: FlightyInfo, timeout: Duration) -> Result<Self, FlightError> {
        // The share page sits behind bot protection that rejects non-browser clients.
        // Redirects are not followed so an invalid link does not silently land on the
        // homepage.
        let client = wreq::Client::builder()
            .emulation(wreq_util::Emulation::Chrome137)
            .redirect(wreq::redirect::Policy::none())
            .build()?;

        let limiter = RateLimiter::direct(Quota::per_second(REQUESTS_PER_SECOND));

        Ok(Self {
            info,
            client,
            limiter,
            timeout,
        })
    }

    async fn fetch_structured(&self, tracking_id: &str) -> Result<FlightSnapshot, FlightError> {
        let request = self
            .client
            .get(format!("{}/flights/{tracking_id}", self.info.api_url))
            .header(ACCEPT, "application/json");

        let (status, body) = self.send(request).await?;
        if status == StatusCode::NOT_FOUND {
            return Err(FlightError::NotFound {
                tracking_id: tracking_id.to_string(),
            });
        }
        if !status.is_success() {
            return Err(FlightError::unavailable(format!(
                "structured endpoint returned status {status}"
            )));
        }

        decode_snapshot(&body)
    }

    async fn fetch_page(&self, tracking_id: &str) -> Result<FlightSnapshot, FlightError> {
        let request = self
            .client
            .get(format!("{}/{tracking_id}", self.info.page_url))
            .header(ACCEPT, "text/html");

        let (status, body) = self.send(request).await?;
        if status == StatusCode::NOT_FOUND || status.is_redirection() {
            return Err(FlightError::NotFound {
                tracking_id: tracking_id.to_string(),
            });
        }
        if !status.is_success() {
            return Err(FlightError::unavailable(format!(
                "share page returned status {status}"
            )));
        }

        let json = extract_embedded_flight(&body)
            .ok_or_else(|| FlightError::malformed("no flight data found in share page"))?;
        decode_snapshot(json)
    }

    /// Sends a request and reads the whole body, bounded by the client timeout.
    async fn send(
        &self,
        request: wreq::RequestBuilder,
    ) -> Result<(StatusCode, String), FlightError> {
        if self.limiter.check().is_err() {
            info!("Flighty is ratelimited. Waiting...");
        }
        self.limiter.until_ready().await;

        let req = request.build()?;
        debug!("Making request to: {}", req.url());

        let exchange = async {
            let response = self.client.execute(req).await?;
            let status = response.status();
            let body = response.text().await?;
            Ok::<_, wreq::Error>((status, body))
        };

        match tokio::time::timeout(self.timeout, exchange).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(FlightError::unavailable(format!(
                "request timed out after {:?}",
                self.timeout
            ))),
        }
    }
}

#[async_trait]
impl FlightSource for FlightyClient {
    async fn fetch(&self, tracking_id: &str) -> Result<FlightSnapshot, FlightError> {
        debug!("Fetching flight for tracking_id: {tracking_id}");
        match self.fetch_structured(tracking_id).await {
            Err(FlightError::NotFound { .. }) => {
                // The structured endpoint intermittently 404s for valid links.
                warn!("Structured endpoint has no flight {tracking_id}. Trying share page.");
                self.fetch_page(tracking_id).await
            }
            other => other,
        }
    }
}

/// Returns the JSON text assigned by `var flight = ...;` on a single line of the page.
pub fn extract_embedded_flight(html: &str) -> Option<&str> {
    let start = html.find(FLIGHT_MARKER)? + FLIGHT_MARKER.len();
    let rest = &html[start..];
    let line = &rest[..rest.find('\n')?];
    let json = line.trim_end_matches('\r').strip_suffix(';')?;
    if json.trim().is_empty() {
        return None;
    }
    Some(json)
}
