//! Slack-facing HTTP surface: slash commands and card interactions.

pub mod commands;
pub mod error;
pub mod interactions;
pub mod server;
pub mod signature;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use log::info;

use crate::bot::server::build_router;
use crate::bot::signature::SlackVerifier;
use crate::config::Config;
use crate::service::Services;

/// State shared by every request handler.
#[derive(Clone)]
pub struct AppState {
    pub services: Arc<Services>,
    pub verifier: Arc<SlackVerifier>,
}

pub struct Bot {
    listen_addr: SocketAddr,
    state: AppState,
}

impl Bot {
    pub fn new(config: &Config, services: Arc<Services>) -> Self {
        info!("Initializing bot...");
        Self {
            listen_addr: config.listen_addr,
            state: AppState {
                services,
                verifier: Arc::new(SlackVerifier::new(&config.slack_signing_secret)),
            },
        }
    }

    /// Serves the HTTP routes until `shutdown` resolves.
    pub async fn serve(self, shutdown: impl Future<Output = ()> + Send + 'static) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(self.listen_addr).await?;
        info!("Listening for Slack requests on {}.", listener.local_addr()?);

        axum::serve(listener, build_router(self.state))
            .with_graceful_shutdown(shutdown)
            .await?;
        Ok(())
    }
}
