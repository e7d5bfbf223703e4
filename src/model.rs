use chrono::DateTime;
use chrono::TimeDelta;
use chrono::Utc;
use derive_builder::Builder;
use diesel::prelude::*;
use uuid::Uuid;

use crate::repository::schema::subscriptions;

/// A tracked flight bound to the chat message that is kept live for it.
///
/// Only `active` and `last_refreshed_at` ever change after creation, and both change in one
/// direction: deactivation is permanent and the refresh clock never moves backwards.
#[derive(Queryable, Selectable, Insertable, Clone, Debug, PartialEq)]
#[diesel(table_name = subscriptions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Subscription {
    pub id: Uuid,
    pub active: bool,
    /// Upstream identifier taken from the share URL.
    pub tracking_id: String,
    /// Designator such as `UA 123`, captured from the first successful fetch.
    pub flight_label: String,
    /// Slack channel id of the card.
    pub channel_ref: String,
    /// Slack message `ts` of the card.
    pub message_ref: String,
    /// Slack user id of the creator.
    pub owner_ref: String,
    pub created_at: DateTime<Utc>,
    pub last_refreshed_at: DateTime<Utc>,
}

impl Subscription {
    /// Builds a fresh active record from a draft.
    pub fn from_draft(draft: NewSubscription, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            active: true,
            tracking_id: draft.tracking_id,
            flight_label: draft.flight_label,
            channel_ref: draft.channel_ref,
            message_ref: draft.message_ref,
            owner_ref: draft.owner_ref,
            created_at: now,
            last_refreshed_at: now,
        }
    }

    /// Whether at least `threshold` has elapsed since the last refresh.
    pub fn is_stale(&self, now: DateTime<Utc>, threshold: TimeDelta) -> bool {
        now - self.last_refreshed_at >= threshold
    }

    /// Marks the subscription as deactivated. Returns `false` if it already was.
    pub fn deactivate(&mut self) -> bool {
        std::mem::replace(&mut self.active, false)
    }

    /// Advances the refresh clock. Never moves it backwards.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        if now > self.last_refreshed_at {
            self.last_refreshed_at = now;
        }
    }

    pub fn is_owned_by(&self, user: &str) -> bool {
        self.owner_ref == user
    }

    /// Fields of the subscription that the message renderer may read.
    pub fn view(&self) -> SubscriptionView<'_> {
        SubscriptionView {
            active: self.active,
            owner_ref: &self.owner_ref,
            created_at: self.created_at,
        }
    }
}

/// Draft of a subscription whose card has already been posted.
#[derive(Builder, Clone, Debug, PartialEq)]
#[builder(setter(into))]
pub struct NewSubscription {
    pub tracking_id: String,
    pub flight_label: String,
    pub channel_ref: String,
    pub message_ref: String,
    pub owner_ref: String,
}

/// Borrowed view of the subscription fields shown on the card.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SubscriptionView<'a> {
    pub active: bool,
    pub owner_ref: &'a str,
    pub created_at: DateTime<Utc>,
}

/// Option of the card's overflow menu.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackAction {
    /// Link to the live share page. Slack opens it client-side.
    Open,
    Delete,
    Deactivate,
}

impl TrackAction {
    /// `action_id` of the overflow menu on the card.
    pub const ACTION_ID: &'static str = "track_overflow";

    pub fn value(self) -> &'static str {
        match self {
            TrackAction::Open => "flighty",
            TrackAction::Delete => "delete",
            TrackAction::Deactivate => "deactivate",
        }
    }

    pub fn from_value(value: &str) -> Option<Self> {
        match value {
            "flighty" => Some(TrackAction::Open),
            "delete" => Some(TrackAction::Delete),
            "deactivate" => Some(TrackAction::Deactivate),
            _ => None,
        }
    }
}
