//! The `/track` slash command.

use std::sync::Arc;

use log::error;
use serde::Deserialize;

use crate::bot::AppState;
use crate::service::error::ServiceError;
use crate::service::tracking_service::TrackResult;
use crate::service::tracking_service::TrackedFlight;

pub const HELP: &str = "Usage:\n\
    • `/track <link>` posts a live card for a Flighty share link, e.g. `https://live.flighty.app/abc123`\n\
    • `/track list` lists the flights you are tracking";

const FAILED: &str = "Something went wrong. Please try again later.";

/// Form body of a slash command request.
#[derive(Deserialize, Debug)]
pub struct SlashCommand {
    #[serde(default)]
    pub text: String,
    pub channel_id: String,
    pub user_id: String,
    pub response_url: String,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Command<'a> {
    Track(&'a str),
    List,
    Help,
}

impl<'a> Command<'a> {
    pub fn parse(text: &'a str) -> Self {
        let text = text.trim();
        // Slack wraps links it recognizes in angle brackets.
        let text = text
            .strip_prefix('<')
            .and_then(|t| t.strip_suffix('>'))
            .map(|t| t.split('|').next().unwrap_or(t))
            .unwrap_or(text);

        match text {
            "" => Command::Help,
            t if t.eq_ignore_ascii_case("help") => Command::Help,
            t if t.eq_ignore_ascii_case("list") => Command::List,
            t => Command::Track(t),
        }
    }
}

/// Answers a slash command right away and finishes slow work in the background.
///
/// The returned text is the immediate ephemeral reply. Results of tracking and listing
/// arrive later through the command's response URL.
pub fn handle_command(state: &AppState, command: SlashCommand) -> String {
    let SlashCommand {
        text,
        channel_id,
        user_id,
        response_url,
    } = command;

    match Command::parse(&text) {
        Command::Help => HELP.to_string(),
        Command::List => {
            let services = Arc::clone(&state.services);
            tokio::spawn(async move {
                let reply = list_reply(services.tracking.list(&user_id).await);
                if let Err(e) = services.sink.respond(&response_url, &reply).await {
                    error!("Failed to reply to list command: {e}");
                }
            });
            "Looking up your flights...".to_string()
        }
        Command::Track(url) => {
            let url = url.to_string();
            let services = Arc::clone(&state.services);
            tokio::spawn(async move {
                let result = services.tracking.track(&url, &channel_id, &user_id).await;
                let reply = track_reply(result);
                if let Err(e) = services.sink.respond(&response_url, &reply).await {
                    error!("Failed to reply to track command: {e}");
                }
            });
            "Looking up your flight...".to_string()
        }
    }
}

pub fn track_reply(result: Result<TrackResult, ServiceError>) -> String {
    match result {
        Ok(TrackResult::Tracking(sub)) => format!("Now tracking {}.", sub.flight_label),
        Ok(TrackResult::InvalidUrl(e)) => format!("{e}\n\n{HELP}"),
        Ok(TrackResult::ChannelInaccessible) => {
            "I can't post in this channel. Invite me to it and try again.".to_string()
        }
        Ok(TrackResult::InvalidFlight(e)) => format!("Could not load that flight. {e}"),
        Err(e) => {
            error!("Error tracking flight: {e}");
            FAILED.to_string()
        }
    }
}

pub fn list_reply(result: Result<Vec<TrackedFlight>, ServiceError>) -> String {
    let flights = match result {
        Ok(flights) => flights,
        Err(e) => {
            error!("Error listing flights: {e}");
            return FAILED.to_string();
        }
    };
    if flights.is_empty() {
        return "You are not tracking any flights.".to_string();
    }

    let lines = flights
        .iter()
        .map(|f| match &f.permalink {
            Some(link) => format!("• <{link}|{}>", f.subscription.flight_label),
            None => format!("• {}", f.subscription.flight_label),
        })
        .collect::<Vec<_>>()
        .join("\n");
    format!("Flights you are tracking:\n{lines}")
}
