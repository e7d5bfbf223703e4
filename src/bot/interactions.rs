//! Overflow menu selections on flight cards.

use std::sync::Arc;

use log::debug;
use log::error;
use serde::Deserialize;

use crate::bot::AppState;
use crate::bot::error::BotError;
use crate::model::TrackAction;
use crate::service::tracking_service::StopResult;

/// Form body of an interaction request.
#[derive(Deserialize, Debug)]
pub struct InteractionForm {
    pub payload: String,
}

/// The parts of a `block_actions` payload the bot reads.
#[derive(Deserialize, Debug)]
pub struct BlockActions {
    #[serde(rename = "type")]
    pub kind: String,
    pub user: User,
    pub container: Option<Container>,
    pub channel: Option<Channel>,
    pub message: Option<Message>,
    pub response_url: Option<String>,
    #[serde(default)]
    pub actions: Vec<Action>,
}

#[derive(Deserialize, Debug)]
pub struct User {
    pub id: String,
}

#[derive(Deserialize, Debug)]
pub struct Container {
    pub channel_id: Option<String>,
    pub message_ts: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct Channel {
    pub id: String,
}

#[derive(Deserialize, Debug)]
pub struct Message {
    pub ts: String,
}

#[derive(Deserialize, Debug)]
pub struct Action {
    pub action_id: String,
    pub selected_option: Option<SelectedOption>,
}

#[derive(Deserialize, Debug)]
pub struct SelectedOption {
    pub value: String,
}

/// A card action ready to dispatch.
#[derive(Debug, PartialEq, Eq)]
pub struct CardAction {
    pub action: TrackAction,
    pub channel_ref: String,
    pub message_ref: String,
    pub actor_ref: String,
    pub response_url: Option<String>,
}

impl BlockActions {
    /// Extracts the card action, if the payload carries one for this bot.
    pub fn card_action(self) -> Option<CardAction> {
        if self.kind != "block_actions" {
            return None;
        }
        let action = self
            .actions
            .iter()
            .filter(|a| a.action_id == TrackAction::ACTION_ID)
            .find_map(|a| a.selected_option.as_ref())
            .and_then(|o| TrackAction::from_value(&o.value))?;

        let container = self.container.as_ref();
        let channel_ref = container
            .and_then(|c| c.channel_id.clone())
            .or_else(|| self.channel.map(|c| c.id))?;
        let message_ref = container
            .and_then(|c| c.message_ts.clone())
            .or_else(|| self.message.map(|m| m.ts))?;

        Some(CardAction {
            action,
            channel_ref,
            message_ref,
            actor_ref: self.user.id,
            response_url: self.response_url,
        })
    }
}

pub fn parse_payload(form: InteractionForm) -> Result<BlockActions, BotError> {
    Ok(serde_json::from_str(&form.payload)?)
}

/// Dispatches the card action in the background. Slack only needs an empty 200 in time.
pub fn handle_interaction(state: &AppState, payload: BlockActions) {
    let Some(card_action) = payload.card_action() else {
        debug!("Ignoring interaction without a card action.");
        return;
    };

    let services = Arc::clone(&state.services);
    tokio::spawn(async move {
        let CardAction {
            action,
            channel_ref,
            message_ref,
            actor_ref,
            response_url,
        } = card_action;

        let reply = match services
            .tracking
            .handle_action(action, &channel_ref, &message_ref, &actor_ref)
            .await
        {
            Ok(result) => result.and_then(action_reply),
            Err(e) => {
                error!("Error handling {action:?} on {channel_ref}/{message_ref}: {e}");
                Some("Something went wrong. Please try again later.")
            }
        };

        if let (Some(reply), Some(url)) = (reply, response_url)
            && let Err(e) = services.sink.respond(&url, reply).await
        {
            error!("Failed to reply to interaction: {e}");
        }
    });
}

/// Ephemeral feedback for an action. A successful action speaks through the card itself.
pub fn action_reply(result: StopResult) -> Option<&'static str> {
    match result {
        StopResult::NotTracked => Some("This flight is not being tracked."),
        StopResult::NotOwner => {
            Some("Only the person who started tracking this flight can do that.")
        }
        StopResult::AlreadyStopped => Some("This flight is already no longer updating."),
        StopResult::Stopped => None,
    }
}
