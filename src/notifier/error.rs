#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ChatError {
    #[error("Message `{message_ref}` not found in channel `{channel_ref}`.")]
    MessageNotFound {
        channel_ref: String,
        message_ref: String,
    },

    #[error("Channel `{channel_ref}` not found.")]
    ChannelNotFound { channel_ref: String },

    #[error("Chat API error: {code}")]
    ApiError { code: String },

    #[error("Chat request failed: {0}")]
    RequestFailed(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Chat request timed out.")]
    Timeout,

    #[error("Unexpected chat API response: {message}")]
    InvalidResponse { message: String },
}

impl ChatError {
    /// Whether the card can no longer exist, so there is nothing left to update.
    pub fn is_gone(&self) -> bool {
        matches!(
            self,
            ChatError::MessageNotFound { .. } | ChatError::ChannelNotFound { .. }
        )
    }
}

impl From<wreq::Error> for ChatError {
    fn from(e: wreq::Error) -> Self {
        ChatError::RequestFailed(Box::new(e))
    }
}

impl From<serde_json::Error> for ChatError {
    fn from(e: serde_json::Error) -> Self {
        ChatError::InvalidResponse {
            message: e.to_string(),
        }
    }
}
