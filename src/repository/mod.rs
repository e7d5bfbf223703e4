//! Subscription storage backed by PostgreSQL through diesel-async.

use std::sync::Arc;

use async_trait::async_trait;
use diesel::Connection;
use diesel::pg::PgConnection;
use diesel_async::AsyncPgConnection;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::pooled_connection::deadpool::Pool;
use diesel_migrations::EmbeddedMigrations;
use diesel_migrations::MigrationHarness;
use diesel_migrations::embed_migrations;
use log::debug;
use log::info;

use crate::model::NewSubscription;
use crate::model::Subscription;
use crate::repository::error::DatabaseError;
use crate::repository::subscription_table::SubscriptionTable;

pub mod error;
pub mod schema;
pub mod subscription_table;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

pub type DbPool = Pool<AsyncPgConnection>;

/// Durable CRUD for subscription records.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// All subscriptions with `active = true`.
    async fn list_active(&self) -> Result<Vec<Subscription>, DatabaseError>;

    /// Active subscriptions created by `owner_ref`, newest first.
    async fn list_active_by_owner(
        &self,
        owner_ref: &str,
    ) -> Result<Vec<Subscription>, DatabaseError>;

    async fn get_by_message(
        &self,
        channel_ref: &str,
        message_ref: &str,
    ) -> Result<Option<Subscription>, DatabaseError>;

    /// Persists a draft, assigning id, creation time and refresh time.
    async fn create(&self, draft: NewSubscription) -> Result<Subscription, DatabaseError>;

    /// Writes back the mutable fields of `subscription`, matched by id.
    ///
    /// Implementations must never reactivate a deactivated record nor move
    /// `last_refreshed_at` backwards, whatever the in-memory copy says.
    async fn update(&self, subscription: &Subscription) -> Result<(), DatabaseError>;
}

/// Main database struct containing all table handlers.
pub struct Repository {
    db_url: String,
    pub subscription: Arc<SubscriptionTable>,
}

impl Repository {
    /// Creates the connection pool and table handlers.
    pub async fn new(db_url: &str, pool_size: usize) -> anyhow::Result<Self> {
        debug!("Connecting to db...");
        let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(db_url);
        let pool = Pool::builder(manager).max_size(pool_size).build()?;

        // Fail fast on a bad URL instead of on the first sweep.
        drop(pool.get().await?);
        info!("Connected to db.");

        Ok(Self {
            db_url: db_url.to_string(),
            subscription: Arc::new(SubscriptionTable::new(pool)),
        })
    }

    /// Runs embedded migrations on a dedicated blocking connection.
    pub async fn run_migrations(&self) -> anyhow::Result<()> {
        let db_url = self.db_url.clone();
        let applied = tokio::task::spawn_blocking(move || -> anyhow::Result<usize> {
            let mut conn = PgConnection::establish(&db_url)?;
            let versions = conn
                .run_pending_migrations(MIGRATIONS)
                .map_err(|e| anyhow::anyhow!("Failed to run migrations: {e}"))?;
            Ok(versions.len())
        })
        .await??;

        info!("Applied {applied} pending migrations.");
        Ok(())
    }
}
