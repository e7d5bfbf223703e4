use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::AppError;

#[derive(Clone, Debug)]
pub struct Config {
    pub db_url: String,
    pub db_pool_size: usize,
    pub slack_bot_token: String,
    pub slack_signing_secret: String,
    pub slack_api_url: String,
    pub flight_api_url: String,
    pub flight_page_url: String,
    /// Minimum age of the last refresh before a subscription is refreshed again.
    pub staleness_threshold: Duration,
    pub sweep_interval: Duration,
    /// Bound on every upstream and Slack HTTP exchange.
    pub request_timeout: Duration,
    pub max_concurrent_refreshes: usize,
    pub listen_addr: SocketAddr,
    pub logs_path: PathBuf,
}

impl Config {
    /// Creates a config with defaults. Secrets are empty until [`Config::load`].
    pub fn new() -> Self {
        Self {
            db_url: String::new(),
            db_pool_size: 8,
            slack_bot_token: String::new(),
            slack_signing_secret: String::new(),
            slack_api_url: "https://slack.com/api".to_string(),
            flight_api_url: "https://live.flighty.app/api".to_string(),
            flight_page_url: "https://live.flighty.app".to_string(),
            staleness_threshold: Duration::from_secs(300),
            sweep_interval: Duration::from_secs(60),
            request_timeout: Duration::from_secs(10),
            max_concurrent_refreshes: 8,
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            logs_path: PathBuf::from("logs"),
        }
    }

    /// Overrides the defaults with values from the environment.
    pub fn load(&mut self) -> Result<(), AppError> {
        self.db_url = required("DATABASE_URL")?;
        self.slack_bot_token = required("SLACK_BOT_TOKEN")?;
        self.slack_signing_secret = required("SLACK_SIGNING_SECRET")?;

        self.db_pool_size = positive("DB_POOL_SIZE", self.db_pool_size)?;
        self.max_concurrent_refreshes =
            positive("MAX_CONCURRENT_REFRESHES", self.max_concurrent_refreshes)?;

        self.staleness_threshold = seconds("STALENESS_THRESHOLD", self.staleness_threshold)?;
        self.sweep_interval = seconds("SWEEP_INTERVAL", self.sweep_interval)?;
        self.request_timeout = seconds("REQUEST_TIMEOUT", self.request_timeout)?;
        if self.sweep_interval.is_zero() {
            return Err(AppError::InvalidConfig {
                key: "SWEEP_INTERVAL".to_string(),
                msg: "must be greater than zero".to_string(),
            });
        }

        if let Some(url) = optional("SLACK_API_URL") {
            self.slack_api_url = url;
        }
        if let Some(url) = optional("FLIGHT_API_URL") {
            self.flight_api_url = url;
        }
        if let Some(url) = optional("FLIGHT_PAGE_URL") {
            self.flight_page_url = url;
        }
        self.listen_addr = parsed("LISTEN_ADDR", self.listen_addr)?;
        if let Some(path) = optional("LOGS_PATH") {
            self.logs_path = PathBuf::from(path);
        }

        Ok(())
    }
}

fn optional(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn required(key: &str) -> Result<String, AppError> {
    optional(key).ok_or_else(|| AppError::MissingConfig {
        key: key.to_string(),
    })
}

fn parsed<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match optional(key) {
        Some(value) => value.trim().parse().map_err(|e: T::Err| AppError::InvalidConfig {
            key: key.to_string(),
            msg: e.to_string(),
        }),
        None => Ok(default),
    }
}

fn positive(key: &str, default: usize) -> Result<usize, AppError> {
    match parsed(key, default)? {
        0 => Err(AppError::InvalidConfig {
            key: key.to_string(),
            msg: "must be greater than zero".to_string(),
        }),
        v => Ok(v),
    }
}

fn seconds(key: &str, default: Duration) -> Result<Duration, AppError> {
    parsed(key, default.as_secs()).map(Duration::from_secs)
}
