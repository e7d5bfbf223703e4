//! Chat platform collaborator: posting, updating and deleting cards.

use async_trait::async_trait;
use serde::Serialize;

use crate::notifier::error::ChatError;

pub mod error;
pub mod slack_notifier;

/// A rendered chat message: fallback text plus Block Kit blocks.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct ChatMessage {
    pub text: String,
    pub blocks: serde_json::Value,
}

/// Location of a message that was just posted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PostedMessage {
    pub channel_ref: String,
    pub message_ref: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn post_message(
        &self,
        channel_ref: &str,
        message: &ChatMessage,
    ) -> Result<PostedMessage, ChatError>;

    /// Replaces the content of an existing message.
    ///
    /// Fails with [`ChatError::MessageNotFound`] or [`ChatError::ChannelNotFound`] when the
    /// message cannot exist anymore.
    async fn update_message(
        &self,
        channel_ref: &str,
        message_ref: &str,
        message: &ChatMessage,
    ) -> Result<(), ChatError>;

    async fn delete_message(
        &self,
        channel_ref: &str,
        message_ref: &str,
    ) -> Result<(), ChatError>;

    async fn resolve_permalink(
        &self,
        channel_ref: &str,
        message_ref: &str,
    ) -> Result<String, ChatError>;

    /// Joins the channel unless the bot is already a member.
    async fn ensure_member(&self, channel_ref: &str) -> Result<(), ChatError>;

    /// Sends an ephemeral reply through an interaction's response URL.
    async fn respond(&self, response_url: &str, text: &str) -> Result<(), ChatError>;
}
