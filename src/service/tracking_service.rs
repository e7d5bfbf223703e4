//! User-facing tracking operations: track, list, stop and delete.

use std::sync::Arc;

use chrono::Utc;
use log::info;
use log::warn;

use crate::flight::FlightSource;
use crate::flight::error::FlightError;
use crate::flight::error::UrlParseError;
use crate::flight::parse_tracking_url;
use crate::model::NewSubscriptionBuilder;
use crate::model::Subscription;
use crate::model::SubscriptionView;
use crate::model::TrackAction;
use crate::notifier::NotificationSink;
use crate::notifier::error::ChatError;
use crate::render::render;
use crate::repository::SubscriptionStore;
use crate::service::error::ServiceError;
use crate::service::reconciliation_service::ReconciliationService;

pub enum TrackResult {
    InvalidUrl(UrlParseError),
    /// The bot cannot post into the channel.
    ChannelInaccessible,
    InvalidFlight(FlightError),
    Tracking(Subscription),
}

/// An active subscription with a link to its card.
pub struct TrackedFlight {
    pub subscription: Subscription,
    /// `None` when Slack could not resolve the link.
    pub permalink: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopResult {
    NotTracked,
    NotOwner,
    AlreadyStopped,
    Stopped,
}

pub struct TrackingService {
    store: Arc<dyn SubscriptionStore>,
    source: Arc<dyn FlightSource>,
    sink: Arc<dyn NotificationSink>,
    reconciliation: Arc<ReconciliationService>,
}

impl TrackingService {
    pub fn new(
        store: Arc<dyn SubscriptionStore>,
        source: Arc<dyn FlightSource>,
        sink: Arc<dyn NotificationSink>,
        reconciliation: Arc<ReconciliationService>,
    ) -> Self {
        Self {
            store,
            source,
            sink,
            reconciliation,
        }
    }

    /// Posts a card for the flight behind `url` and starts tracking it.
    pub async fn track(
        &self,
        url: &str,
        channel_ref: &str,
        owner_ref: &str,
    ) -> Result<TrackResult, ServiceError> {
        let tracking_id = match parse_tracking_url(url) {
            Ok(id) => id,
            Err(e) => return Ok(TrackResult::InvalidUrl(e)),
        };

        match self.sink.ensure_member(channel_ref).await {
            Ok(()) => {}
            Err(ChatError::ChannelNotFound { .. }) => {
                return Ok(TrackResult::ChannelInaccessible);
            }
            Err(e) => return Err(e.into()),
        }

        let snapshot = match self.source.fetch(tracking_id).await {
            Ok(snapshot) => snapshot,
            Err(e) => return Ok(TrackResult::InvalidFlight(e)),
        };

        let view = SubscriptionView {
            active: true,
            owner_ref,
            created_at: Utc::now(),
        };
        let posted = self
            .sink
            .post_message(channel_ref, &render(&snapshot, &view))
            .await?;

        let draft = NewSubscriptionBuilder::default()
            .tracking_id(tracking_id)
            .flight_label(snapshot.label())
            .channel_ref(posted.channel_ref)
            .message_ref(posted.message_ref)
            .owner_ref(owner_ref)
            .build()
            .map_err(|e| ServiceError::UnexpectedResult {
                message: e.to_string(),
            })?;
        let sub = self.store.create(draft).await?;

        info!(
            "User {owner_ref} started tracking {} as subscription {}.",
            sub.flight_label, sub.id
        );
        Ok(TrackResult::Tracking(sub))
    }

    /// Active subscriptions of `owner_ref`, newest first.
    pub async fn list(&self, owner_ref: &str) -> Result<Vec<TrackedFlight>, ServiceError> {
        let subs = self.store.list_active_by_owner(owner_ref).await?;

        let mut tracked = Vec::with_capacity(subs.len());
        for sub in subs {
            let permalink = match self
                .sink
                .resolve_permalink(&sub.channel_ref, &sub.message_ref)
                .await
            {
                Ok(link) => Some(link),
                Err(e) => {
                    warn!("Failed to resolve permalink of subscription {}: {e}", sub.id);
                    None
                }
            };
            tracked.push(TrackedFlight {
                subscription: sub,
                permalink,
            });
        }
        Ok(tracked)
    }

    /// Stops updating a card and renders it one final time.
    pub async fn stop(
        &self,
        channel_ref: &str,
        message_ref: &str,
        actor_ref: &str,
    ) -> Result<StopResult, ServiceError> {
        let mut sub = match self.owned(channel_ref, message_ref, actor_ref).await? {
            Ok(sub) => sub,
            Err(result) => return Ok(result),
        };
        if !sub.deactivate() {
            return Ok(StopResult::AlreadyStopped);
        }

        self.store.update(&sub).await?;
        info!("User {actor_ref} stopped subscription {}.", sub.id);

        self.reconciliation.refresh_one(sub, Utc::now()).await;
        Ok(StopResult::Stopped)
    }

    /// Stops tracking and removes the card from the channel.
    pub async fn delete(
        &self,
        channel_ref: &str,
        message_ref: &str,
        actor_ref: &str,
    ) -> Result<StopResult, ServiceError> {
        let mut sub = match self.owned(channel_ref, message_ref, actor_ref).await? {
            Ok(sub) => sub,
            Err(result) => return Ok(result),
        };
        if sub.deactivate() {
            self.store.update(&sub).await?;
        }

        match self
            .sink
            .delete_message(&sub.channel_ref, &sub.message_ref)
            .await
        {
            Ok(()) => {}
            Err(e) if e.is_gone() => {
                warn!("Card of subscription {} was already gone.", sub.id);
            }
            Err(e) => return Err(e.into()),
        }

        info!("User {actor_ref} deleted subscription {}.", sub.id);
        Ok(StopResult::Stopped)
    }

    /// Dispatches an overflow menu selection on a card.
    ///
    /// Returns `None` for [`TrackAction::Open`], which Slack handles as a link.
    pub async fn handle_action(
        &self,
        action: TrackAction,
        channel_ref: &str,
        message_ref: &str,
        actor_ref: &str,
    ) -> Result<Option<StopResult>, ServiceError> {
        match action {
            TrackAction::Open => Ok(None),
            TrackAction::Delete => self
                .delete(channel_ref, message_ref, actor_ref)
                .await
                .map(Some),
            TrackAction::Deactivate => self
                .stop(channel_ref, message_ref, actor_ref)
                .await
                .map(Some),
        }
    }

    /// Loads the subscription of a card if `actor_ref` created it.
    async fn owned(
        &self,
        channel_ref: &str,
        message_ref: &str,
        actor_ref: &str,
    ) -> Result<Result<Subscription, StopResult>, ServiceError> {
        let Some(sub) = self.store.get_by_message(channel_ref, message_ref).await? else {
            return Ok(Err(StopResult::NotTracked));
        };
        if !sub.is_owned_by(actor_ref) {
            return Ok(Err(StopResult::NotOwner));
        }
        Ok(Ok(sub))
    }
}
