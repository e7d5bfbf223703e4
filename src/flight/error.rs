#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum UrlParseError {
    #[error("The site `{site}` is not supported.")]
    UnsupportedSite { site: String },

    #[error("The URL `{url}` has an invalid format.")]
    InvalidFormat { url: String },

    #[error("Could not find a flight identifier in the URL `{url}`.")]
    MissingId { url: String },
}

/// Failure of a single flight fetch.
///
/// Only [`FlightError::NotFound`] is permanent. The other variants are retried on the next
/// sweep.
#[derive(Debug, thiserror::Error)]
pub enum FlightError {
    #[error("Flight not found (ID: {tracking_id}).")]
    NotFound { tracking_id: String },

    #[error("Flight upstream unavailable: {message}")]
    UpstreamUnavailable { message: String },

    #[error("Malformed flight response: {message}")]
    MalformedResponse { message: String },
}

impl FlightError {
    pub fn is_permanent(&self) -> bool {
        matches!(self, FlightError::NotFound { .. })
    }

    pub fn kind(&self) -> FlightErrorKind {
        match self {
            FlightError::NotFound { .. } => FlightErrorKind::NotFound,
            FlightError::UpstreamUnavailable { .. } => FlightErrorKind::UpstreamUnavailable,
            FlightError::MalformedResponse { .. } => FlightErrorKind::MalformedResponse,
        }
    }

    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        FlightError::MalformedResponse {
            message: message.into(),
        }
    }

    pub(crate) fn unavailable(message: impl Into<String>) -> Self {
        FlightError::UpstreamUnavailable {
            message: message.into(),
        }
    }
}

/// Payload-free discriminant of [`FlightError`], used in refresh outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlightErrorKind {
    NotFound,
    UpstreamUnavailable,
    MalformedResponse,
}

impl From<serde_json::Error> for FlightError {
    fn from(e: serde_json::Error) -> Self {
        FlightError::malformed(e.to_string())
    }
}

impl From<wreq::Error> for FlightError {
    fn from(e: wreq::Error) -> Self {
        FlightError::unavailable(e.to_string())
    }
}
