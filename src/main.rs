//! Application entry point for flight-bot.
//!
//! Initializes all components, starts the sweep loop and serves Slack requests.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use dotenv::dotenv;
use flight_bot::bot::Bot;
use flight_bot::config::Config;
use flight_bot::flight::flighty_client::FlightyClient;
use flight_bot::flight::flighty_client::FlightyInfo;
use flight_bot::logging::setup_logging;
use flight_bot::notifier::slack_notifier::SlackNotifier;
use flight_bot::repository::Repository;
use flight_bot::service::Services;
use flight_bot::task::sweep_task::SweepTask;
use log::debug;
use log::error;
use log::info;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    let init_start = Instant::now();
    let config = load_config()?;
    let _log_guard = setup_logging(&config)?;
    info!("Starting flight-bot...");

    let repository = setup_repository(&config, init_start).await?;
    let services = setup_services(&config, &repository)?;
    let sweep_task = setup_sweep_task(&config, &services, init_start);

    let bot = Bot::new(&config, services.clone());
    info!(
        "flight-bot is up in {:.2}s. Press Ctrl+C to stop.",
        init_start.elapsed().as_secs_f64()
    );
    bot.serve(shutdown_signal()).await?;

    sweep_task.stop();
    info!("Shut down.");
    Ok(())
}

fn load_config() -> Result<Config> {
    let mut config = Config::new();
    config.load()?;
    Ok(config)
}

async fn setup_repository(config: &Config, init_start: Instant) -> Result<Repository> {
    debug!("Setting up Repository...");
    let repository = Repository::new(&config.db_url, config.db_pool_size).await?;

    info!("Running database migrations...");
    repository.run_migrations().await?;
    info!(
        "Database setup complete ({:.2}s).",
        init_start.elapsed().as_secs_f64()
    );

    Ok(repository)
}

fn setup_services(config: &Config, repository: &Repository) -> Result<Arc<Services>> {
    debug!("Setting up Services...");
    let source = FlightyClient::new(
        FlightyInfo {
            api_url: config.flight_api_url.clone(),
            page_url: config.flight_page_url.clone(),
        },
        config.request_timeout,
    )?;
    let sink = SlackNotifier::new(
        &config.slack_api_url,
        &config.slack_bot_token,
        config.request_timeout,
    )?;

    Ok(Arc::new(Services::new(
        config,
        repository.subscription.clone(),
        Arc::new(source),
        Arc::new(sink),
    )))
}

fn setup_sweep_task(config: &Config, services: &Services, init_start: Instant) -> Arc<SweepTask> {
    debug!("Setting up SweepTask...");
    let sweep_task = SweepTask::new(services.reconciliation.clone(), config.sweep_interval);
    sweep_task.start();
    info!(
        "SweepTask setup complete ({:.2}s).",
        init_start.elapsed().as_secs_f64()
    );
    sweep_task
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {e}");
        std::future::pending::<()>().await;
    }
    info!("Ctrl+C received, shutting down.");
}
