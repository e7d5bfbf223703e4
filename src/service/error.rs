use crate::flight::error::FlightError;
use crate::flight::error::UrlParseError;
use crate::notifier::error::ChatError;
use crate::repository::error::DatabaseError;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ServiceError {
    #[error("Unexpected result: {message}")]
    UnexpectedResult { message: String },

    #[error("FlightError: {0}")]
    FlightError(#[from] FlightError),

    #[error("UrlParseError: {0}")]
    UrlParseError(#[from] UrlParseError),

    #[error("ChatError: {0}")]
    ChatError(#[from] ChatError),

    #[error("DatabaseError: {0}")]
    DatabaseError(#[from] DatabaseError),
}
