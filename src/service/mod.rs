//! Business logic services for flight tracking.

use std::sync::Arc;

use crate::config::Config;
use crate::flight::FlightSource;
use crate::notifier::NotificationSink;
use crate::repository::SubscriptionStore;
use crate::service::reconciliation_service::ReconciliationService;
use crate::service::tracking_service::TrackingService;

pub mod error;
pub mod reconciliation_service;
pub mod tracking_service;

/// Container for all application services.
pub struct Services {
    pub reconciliation: Arc<ReconciliationService>,
    pub tracking: Arc<TrackingService>,
    pub sink: Arc<dyn NotificationSink>,
}

impl Services {
    /// Creates and initializes all services.
    pub fn new(
        config: &Config,
        store: Arc<dyn SubscriptionStore>,
        source: Arc<dyn FlightSource>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        let reconciliation = ReconciliationService::new(
            store.clone(),
            source.clone(),
            sink.clone(),
            config.staleness_threshold,
            config.max_concurrent_refreshes,
        );

        Self {
            tracking: Arc::new(TrackingService::new(
                store,
                source,
                sink.clone(),
                reconciliation.clone(),
            )),
            reconciliation,
            sink,
        }
    }
}
