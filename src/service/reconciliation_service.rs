//! Reconciliation of active subscriptions against upstream flight data.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::time::Duration;

use chrono::DateTime;
use chrono::TimeDelta;
use chrono::Utc;
use log::debug;
use log::error;
use log::info;
use log::warn;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::flight::FlightSource;
use crate::flight::error::FlightErrorKind;
use crate::model::Subscription;
use crate::notifier::ChatMessage;
use crate::notifier::NotificationSink;
use crate::notifier::error::ChatError;
use crate::render::render;
use crate::render::render_unavailable;
use crate::repository::SubscriptionStore;
use crate::service::error::ServiceError;

/// Why a subscription stopped being refreshed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeactivationReason {
    Landed,
    FlightNotFound,
    MessageGone,
}

/// Result of one refresh unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The card was re-rendered and the subscription stays active.
    Refreshed,
    Deactivated(DeactivationReason),
    /// Upstream failed in a way worth retrying on the next sweep.
    Transient(FlightErrorKind),
    /// The card could not be updated for a reason other than it being gone.
    ChatFailed,
}

/// Summary of a sweep. Refresh units keep running after the sweep returns.
pub struct SweepReport {
    pub active: usize,
    pub fresh: usize,
    pub in_flight: usize,
    pub dispatched: usize,
    pub handles: Vec<JoinHandle<RefreshOutcome>>,
}

impl SweepReport {
    /// Waits for every dispatched refresh unit. Units that panicked are left out.
    pub async fn join(self) -> Vec<RefreshOutcome> {
        futures::future::join_all(self.handles)
            .await
            .into_iter()
            .filter_map(|res| res.ok())
            .collect()
    }
}

/// Keeps the card of every active subscription in sync with upstream.
pub struct ReconciliationService {
    store: Arc<dyn SubscriptionStore>,
    source: Arc<dyn FlightSource>,
    sink: Arc<dyn NotificationSink>,
    staleness_threshold: TimeDelta,
    in_flight: Mutex<HashSet<Uuid>>,
    permits: Semaphore,
}

impl ReconciliationService {
    pub fn new(
        store: Arc<dyn SubscriptionStore>,
        source: Arc<dyn FlightSource>,
        sink: Arc<dyn NotificationSink>,
        staleness_threshold: Duration,
        max_concurrent_refreshes: usize,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            source,
            sink,
            staleness_threshold: TimeDelta::from_std(staleness_threshold)
                .unwrap_or(TimeDelta::MAX),
            in_flight: Mutex::new(HashSet::new()),
            permits: Semaphore::new(max_concurrent_refreshes.max(1)),
        })
    }

    /// Dispatches a refresh unit for every stale active subscription.
    ///
    /// Returns as soon as the units are spawned. A subscription whose previous unit is
    /// still running is skipped.
    pub async fn sweep(self: &Arc<Self>, now: DateTime<Utc>) -> Result<SweepReport, ServiceError> {
        let subscriptions = self.store.list_active().await?;
        let mut report = SweepReport {
            active: subscriptions.len(),
            fresh: 0,
            in_flight: 0,
            dispatched: 0,
            handles: Vec::new(),
        };

        for sub in subscriptions {
            if !sub.is_stale(now, self.staleness_threshold) {
                report.fresh += 1;
                continue;
            }
            let Some(claim) = InFlightClaim::acquire(self, sub.id) else {
                debug!("Subscription {} is still refreshing. Skipping.", sub.id);
                report.in_flight += 1;
                continue;
            };

            let service = Arc::clone(self);
            report.handles.push(tokio::spawn(async move {
                let _claim = claim;
                // The semaphore is never closed.
                let _permit = service.permits.acquire().await.ok();
                service.refresh_one(sub, now).await
            }));
            report.dispatched += 1;
        }

        debug!(
            "Sweep found {} active subscriptions: {} fresh, {} in flight, {} dispatched.",
            report.active, report.fresh, report.in_flight, report.dispatched
        );
        Ok(report)
    }

    /// Refreshes one subscription and persists its resulting state.
    ///
    /// Every failure is contained: the returned outcome says what happened and store
    /// errors are only logged.
    pub async fn refresh_one(&self, mut sub: Subscription, now: DateTime<Utc>) -> RefreshOutcome {
        let outcome = match self.source.fetch(&sub.tracking_id).await {
            Ok(snapshot) => {
                let landed = snapshot.is_landed();
                if landed && sub.deactivate() {
                    info!(
                        "Flight {} of subscription {} landed. Deactivating.",
                        sub.flight_label, sub.id
                    );
                    self.persist(&sub).await;
                }

                let message = render(&snapshot, &sub.view());
                match self.update_card(&sub, &message).await {
                    Ok(()) if landed => RefreshOutcome::Deactivated(DeactivationReason::Landed),
                    Ok(()) => RefreshOutcome::Refreshed,
                    Err(e) if e.is_gone() => {
                        warn!(
                            "Card of subscription {} is gone: {e}. Deactivating.",
                            sub.id
                        );
                        sub.deactivate();
                        if landed {
                            RefreshOutcome::Deactivated(DeactivationReason::Landed)
                        } else {
                            RefreshOutcome::Deactivated(DeactivationReason::MessageGone)
                        }
                    }
                    Err(e) => {
                        warn!("Failed to update card of subscription {}: {e}", sub.id);
                        if landed {
                            RefreshOutcome::Deactivated(DeactivationReason::Landed)
                        } else {
                            RefreshOutcome::ChatFailed
                        }
                    }
                }
            }
            Err(e) if e.is_permanent() => {
                warn!(
                    "Flight {} of subscription {} no longer exists: {e}. Deactivating.",
                    sub.tracking_id, sub.id
                );
                sub.deactivate();
                self.persist(&sub).await;

                let message = render_unavailable(&sub.flight_label, &sub.view());
                if let Err(e) = self.update_card(&sub, &message).await {
                    warn!(
                        "Failed to mark card of subscription {} as unavailable: {e}",
                        sub.id
                    );
                }
                RefreshOutcome::Deactivated(DeactivationReason::FlightNotFound)
            }
            Err(e) => {
                warn!("Transient failure refreshing subscription {}: {e}", sub.id);
                RefreshOutcome::Transient(e.kind())
            }
        };

        sub.touch(now);
        self.persist(&sub).await;
        debug!("Refreshed subscription {}: {outcome:?}", sub.id);
        outcome
    }

    async fn update_card(
        &self,
        sub: &Subscription,
        message: &ChatMessage,
    ) -> Result<(), ChatError> {
        self.sink
            .update_message(&sub.channel_ref, &sub.message_ref, message)
            .await
    }

    async fn persist(&self, sub: &Subscription) {
        if let Err(e) = self.store.update(sub).await {
            error!("Failed to persist subscription {}: {e}", sub.id);
        }
    }

    fn in_flight(&self) -> std::sync::MutexGuard<'_, HashSet<Uuid>> {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Marks a subscription as being refreshed until dropped.
struct InFlightClaim {
    service: Arc<ReconciliationService>,
    id: Uuid,
}

impl InFlightClaim {
    fn acquire(service: &Arc<ReconciliationService>, id: Uuid) -> Option<Self> {
        service.in_flight().insert(id).then(|| Self {
            service: Arc::clone(service),
            id,
        })
    }
}

impl Drop for InFlightClaim {
    fn drop(&mut self) {
        self.service.in_flight().remove(&self.id);
    }
}
