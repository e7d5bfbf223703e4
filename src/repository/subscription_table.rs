use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel::sql_types;
use diesel_async::AsyncPgConnection;
use diesel_async::RunQueryDsl;
use diesel_async::pooled_connection::deadpool::Object;
use log::debug;

use crate::model::NewSubscription;
use crate::model::Subscription;
use crate::repository::DbPool;
use crate::repository::SubscriptionStore;
use crate::repository::error::DatabaseError;
use crate::repository::schema::subscriptions;

/// `active` may only go from true to false and the refresh clock only forwards, so a
/// stale copy written back after a concurrent deactivation cannot undo it.
const UPDATE_SQL: &str = "UPDATE subscriptions \
     SET active = active AND $1, last_refreshed_at = GREATEST(last_refreshed_at, $2) \
     WHERE id = $3";

#[derive(Clone)]
pub struct SubscriptionTable {
    pool: DbPool,
}

impl SubscriptionTable {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn conn(&self) -> Result<Object<AsyncPgConnection>, DatabaseError> {
        self.pool
            .get()
            .await
            .map_err(|e| DatabaseError::PoolError {
                message: e.to_string(),
            })
    }

    /// Deletes all rows. Only meant for tests.
    pub async fn delete_all(&self) -> Result<(), DatabaseError> {
        let mut conn = self.conn().await?;
        diesel::delete(subscriptions::table)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl SubscriptionStore for SubscriptionTable {
    async fn list_active(&self) -> Result<Vec<Subscription>, DatabaseError> {
        let mut conn = self.conn().await?;
        Ok(subscriptions::table
            .filter(subscriptions::active.eq(true))
            .order(subscriptions::last_refreshed_at.asc())
            .select(Subscription::as_select())
            .load(&mut *conn)
            .await?)
    }

    async fn list_active_by_owner(
        &self,
        owner_ref: &str,
    ) -> Result<Vec<Subscription>, DatabaseError> {
        let mut conn = self.conn().await?;
        Ok(subscriptions::table
            .filter(subscriptions::active.eq(true))
            .filter(subscriptions::owner_ref.eq(owner_ref))
            .order(subscriptions::created_at.desc())
            .select(Subscription::as_select())
            .load(&mut *conn)
            .await?)
    }

    async fn get_by_message(
        &self,
        channel_ref: &str,
        message_ref: &str,
    ) -> Result<Option<Subscription>, DatabaseError> {
        let mut conn = self.conn().await?;
        Ok(subscriptions::table
            .filter(subscriptions::channel_ref.eq(channel_ref))
            .filter(subscriptions::message_ref.eq(message_ref))
            .select(Subscription::as_select())
            .first(&mut *conn)
            .await
            .optional()?)
    }

    async fn create(&self, draft: NewSubscription) -> Result<Subscription, DatabaseError> {
        let row = Subscription::from_draft(draft, Utc::now());
        let mut conn = self.conn().await?;
        let created = diesel::insert_into(subscriptions::table)
            .values(&row)
            .returning(Subscription::as_returning())
            .get_result(&mut *conn)
            .await?;
        debug!("Created subscription {} for {}.", created.id, created.tracking_id);
        Ok(created)
    }

    async fn update(&self, subscription: &Subscription) -> Result<(), DatabaseError> {
        let mut conn = self.conn().await?;
        let affected = diesel::sql_query(UPDATE_SQL)
            .bind::<sql_types::Bool, _>(subscription.active)
            .bind::<sql_types::Timestamptz, _>(subscription.last_refreshed_at)
            .bind::<sql_types::Uuid, _>(subscription.id)
            .execute(&mut *conn)
            .await?;

        if affected == 0 {
            return Err(DatabaseError::InternalError {
                message: format!("subscription {} does not exist", subscription.id),
            });
        }
        Ok(())
    }
}
