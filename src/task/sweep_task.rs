//! Background task driving periodic reconciliation sweeps.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;

use chrono::Utc;
use log::debug;
use log::error;
use log::info;

use crate::service::reconciliation_service::ReconciliationService;

/// Task that periodically sweeps active subscriptions.
pub struct SweepTask {
    service: Arc<ReconciliationService>,
    sweep_interval: Duration,
    running: AtomicBool,
}

impl SweepTask {
    pub fn new(service: Arc<ReconciliationService>, sweep_interval: Duration) -> Arc<Self> {
        info!("Initializing SweepTask with sweep interval {sweep_interval:?}");
        Arc::new(Self {
            service,
            sweep_interval,
            running: AtomicBool::new(false),
        })
    }

    /// Starts the sweep loop. The first sweep runs immediately.
    pub fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("Starting SweepTask loop.");
        self.clone().spawn_sweep_loop();
    }

    /// Stops the sweep loop at its next tick.
    pub fn stop(&self) {
        info!("Stopping SweepTask loop.");
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn spawn_sweep_loop(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.sweep_interval);
        tokio::spawn(async move {
            loop {
                interval.tick().await;
                if !self.is_running() {
                    info!("Stopping sweep loop.");
                    break;
                }
                self.sweep().await;
            }
        });
    }

    async fn sweep(&self) {
        match self.service.sweep(Utc::now()).await {
            Ok(report) => {
                if report.dispatched > 0 {
                    info!(
                        "Refreshing {} of {} active subscriptions.",
                        report.dispatched, report.active
                    );
                } else {
                    debug!("No stale subscriptions among {}.", report.active);
                }
                // Refresh units are detached.
            }
            Err(e) => error!("Error sweeping subscriptions: {e}"),
        }
    }
}
