//! Common test utilities and in-memory collaborators.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::RwLock;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use flight_bot::config::Config;
use flight_bot::flight::FlightSource;
use flight_bot::flight::error::FlightError;
use flight_bot::flight::model::FlightSnapshot;
use flight_bot::flight::payload::decode_snapshot;
use flight_bot::model::NewSubscription;
use flight_bot::model::NewSubscriptionBuilder;
use flight_bot::model::Subscription;
use flight_bot::notifier::ChatMessage;
use flight_bot::notifier::NotificationSink;
use flight_bot::notifier::PostedMessage;
use flight_bot::notifier::error::ChatError;
use flight_bot::repository::SubscriptionStore;
use flight_bot::repository::error::DatabaseError;
use flight_bot::service::Services;
use serde_json::json;
use tokio::sync::Notify;

/// Loads a test response file from the responses directory.
#[allow(dead_code)]
pub fn get_response(filename: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests/responses");
    path.push(filename);
    std::fs::read_to_string(path).expect("Failed to read response file")
}

/// A flight document in the current upstream schema.
#[allow(dead_code)]
pub fn flight_json(tracking_id: &str, status: &str) -> String {
    json!({
        "flight": {
            "id": tracking_id,
            "status": status,
            "flight_number": "100",
            "airline": { "iata": "AA", "name": "American Airlines" },
            "departure": {
                "airport": { "iata": "JFK", "city": "New York", "timezone": "America/New_York" },
                "schedule": {
                    "initialGateTime": 1767308400,
                    "gate": { "original": 1767308400, "actual": 1767308700 },
                    "runway": { "original": 1767309300, "actual": 1767309600 }
                }
            },
            "arrival": {
                "scheduled_airport": { "iata": "LHR", "city": "London", "timezone": "Europe/London" },
                "schedule": {
                    "initialGateTime": 1767333600,
                    "runway": { "original": 1767332700, "actual": 1767332400 }
                }
            }
        },
        "update": 1767310000
    })
    .to_string()
}

#[allow(dead_code)]
pub fn draft(tracking_id: &str, owner_ref: &str, message_ref: &str) -> NewSubscription {
    NewSubscriptionBuilder::default()
        .tracking_id(tracking_id)
        .flight_label("AA 100")
        .channel_ref("C1")
        .message_ref(message_ref)
        .owner_ref(owner_ref)
        .build()
        .expect("Failed to build draft")
}

/// Services wired to the given collaborators with a 5 minute staleness threshold.
#[allow(dead_code)]
pub fn services(
    store: Arc<InMemoryStore>,
    source: Arc<FakeFlightSource>,
    sink: Arc<RecordingSink>,
) -> Services {
    let mut config = Config::new();
    config.staleness_threshold = Duration::from_secs(300);
    config.max_concurrent_refreshes = 4;
    Services::new(&config, store, source, sink)
}

// IN-MEMORY STORE

/// Subscription store that enforces the same monotonic update rules as the database.
#[derive(Default)]
pub struct InMemoryStore {
    rows: RwLock<Vec<Subscription>>,
}

#[allow(dead_code)]
impl InMemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Inserts a row as-is.
    pub fn seed(&self, sub: Subscription) {
        self.rows.write().unwrap().push(sub);
    }

    /// Overwrites a row, bypassing the monotonic update rules.
    pub fn update_raw(&self, sub: Subscription) {
        let mut rows = self.rows.write().unwrap();
        if let Some(row) = rows.iter_mut().find(|s| s.id == sub.id) {
            *row = sub;
        }
    }

    pub fn get(&self, id: uuid::Uuid) -> Subscription {
        self.rows
            .read()
            .unwrap()
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .expect("Subscription not found")
    }

    /// Seeds an active subscription last refreshed at `last_refreshed_at`.
    pub fn seed_at(&self, tracking_id: &str, last_refreshed_at: DateTime<Utc>) -> Subscription {
        let mut sub = Subscription::from_draft(
            draft(tracking_id, "U1", &format!("{tracking_id}.ts")),
            last_refreshed_at,
        );
        sub.last_refreshed_at = last_refreshed_at;
        self.seed(sub.clone());
        sub
    }
}

#[async_trait]
impl SubscriptionStore for InMemoryStore {
    async fn list_active(&self) -> Result<Vec<Subscription>, DatabaseError> {
        let mut subs: Vec<_> = self
            .rows
            .read()
            .unwrap()
            .iter()
            .filter(|s| s.active)
            .cloned()
            .collect();
        subs.sort_by_key(|s| s.last_refreshed_at);
        Ok(subs)
    }

    async fn list_active_by_owner(
        &self,
        owner_ref: &str,
    ) -> Result<Vec<Subscription>, DatabaseError> {
        let mut subs: Vec<_> = self
            .rows
            .read()
            .unwrap()
            .iter()
            .filter(|s| s.active && s.owner_ref == owner_ref)
            .cloned()
            .collect();
        subs.sort_by_key(|s| std::cmp::Reverse(s.created_at));
        Ok(subs)
    }

    async fn get_by_message(
        &self,
        channel_ref: &str,
        message_ref: &str,
    ) -> Result<Option<Subscription>, DatabaseError> {
        Ok(self
            .rows
            .read()
            .unwrap()
            .iter()
            .find(|s| s.channel_ref == channel_ref && s.message_ref == message_ref)
            .cloned())
    }

    async fn create(&self, draft: NewSubscription) -> Result<Subscription, DatabaseError> {
        let sub = Subscription::from_draft(draft, Utc::now());
        self.seed(sub.clone());
        Ok(sub)
    }

    async fn update(&self, subscription: &Subscription) -> Result<(), DatabaseError> {
        let mut rows = self.rows.write().unwrap();
        let row = rows
            .iter_mut()
            .find(|s| s.id == subscription.id)
            .ok_or_else(|| DatabaseError::InternalError {
                message: format!("subscription {} does not exist", subscription.id),
            })?;
        row.active = row.active && subscription.active;
        row.touch(subscription.last_refreshed_at);
        Ok(())
    }
}

// FAKE FLIGHT SOURCE

/// Scripted answer of the fake flight source.
#[derive(Clone)]
#[allow(dead_code)]
pub enum Scripted {
    Flight(String),
    NotFound,
    Unavailable,
    Malformed,
}

/// Flight source answering from a script and recording every fetch.
#[derive(Default)]
pub struct FakeFlightSource {
    script: RwLock<HashMap<String, Scripted>>,
    calls: Mutex<Vec<String>>,
    held: AtomicBool,
    release: Notify,
}

#[allow(dead_code)]
impl FakeFlightSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script(&self, tracking_id: &str, answer: Scripted) {
        self.script
            .write()
            .unwrap()
            .insert(tracking_id.to_string(), answer);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Makes every following fetch wait until [`FakeFlightSource::release_one`].
    pub fn hold(&self) {
        self.held.store(true, Ordering::SeqCst);
    }

    pub fn release_one(&self) {
        self.held.store(false, Ordering::SeqCst);
        self.release.notify_one();
    }
}

#[async_trait]
impl FlightSource for FakeFlightSource {
    async fn fetch(&self, tracking_id: &str) -> Result<FlightSnapshot, FlightError> {
        self.calls.lock().unwrap().push(tracking_id.to_string());
        if self.held.load(Ordering::SeqCst) {
            self.release.notified().await;
        }

        let answer = self.script.read().unwrap().get(tracking_id).cloned();
        match answer {
            Some(Scripted::Flight(json)) => decode_snapshot(&json),
            Some(Scripted::NotFound) | None => Err(FlightError::NotFound {
                tracking_id: tracking_id.to_string(),
            }),
            Some(Scripted::Unavailable) => Err(FlightError::UpstreamUnavailable {
                message: "connection reset".to_string(),
            }),
            Some(Scripted::Malformed) => Err(FlightError::MalformedResponse {
                message: "expected value at line 1 column 1".to_string(),
            }),
        }
    }
}

// RECORDING SINK

#[derive(Clone, Copy, PartialEq, Eq)]
#[allow(dead_code)]
pub enum SinkFailure {
    MessageGone,
    ChannelGone,
    RateLimited,
}

/// A chat update the sink received.
#[derive(Clone)]
pub struct Update {
    pub channel_ref: String,
    pub message_ref: String,
    pub message: ChatMessage,
}

/// Notification sink recording every call.
#[derive(Default)]
pub struct RecordingSink {
    pub posts: Mutex<Vec<(String, ChatMessage)>>,
    pub updates: Mutex<Vec<Update>>,
    pub deletes: Mutex<Vec<(String, String)>>,
    pub replies: Mutex<Vec<(String, String)>>,
    failure: RwLock<Option<SinkFailure>>,
    next_ts: Mutex<u32>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Makes every following update fail.
    pub fn fail_updates(&self, failure: SinkFailure) {
        *self.failure.write().unwrap() = Some(failure);
    }

    pub fn updates(&self) -> Vec<Update> {
        self.updates.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn post_message(
        &self,
        channel_ref: &str,
        message: &ChatMessage,
    ) -> Result<PostedMessage, ChatError> {
        self.posts
            .lock()
            .unwrap()
            .push((channel_ref.to_string(), message.clone()));
        let mut next_ts = self.next_ts.lock().unwrap();
        *next_ts += 1;
        Ok(PostedMessage {
            channel_ref: channel_ref.to_string(),
            message_ref: format!("1767300000.{:06}", *next_ts),
        })
    }

    async fn update_message(
        &self,
        channel_ref: &str,
        message_ref: &str,
        message: &ChatMessage,
    ) -> Result<(), ChatError> {
        self.updates.lock().unwrap().push(Update {
            channel_ref: channel_ref.to_string(),
            message_ref: message_ref.to_string(),
            message: message.clone(),
        });
        match *self.failure.read().unwrap() {
            None => Ok(()),
            Some(SinkFailure::MessageGone) => Err(ChatError::MessageNotFound {
                channel_ref: channel_ref.to_string(),
                message_ref: message_ref.to_string(),
            }),
            Some(SinkFailure::ChannelGone) => Err(ChatError::ChannelNotFound {
                channel_ref: channel_ref.to_string(),
            }),
            Some(SinkFailure::RateLimited) => Err(ChatError::ApiError {
                code: "ratelimited".to_string(),
            }),
        }
    }

    async fn delete_message(&self, channel_ref: &str, message_ref: &str) -> Result<(), ChatError> {
        self.deletes
            .lock()
            .unwrap()
            .push((channel_ref.to_string(), message_ref.to_string()));
        Ok(())
    }

    async fn resolve_permalink(
        &self,
        channel_ref: &str,
        message_ref: &str,
    ) -> Result<String, ChatError> {
        Ok(format!(
            "https://example.slack.com/archives/{channel_ref}/p{}",
            message_ref.replace('.', "")
        ))
    }

    async fn ensure_member(&self, _channel_ref: &str) -> Result<(), ChatError> {
        Ok(())
    }

    async fn respond(&self, response_url: &str, text: &str) -> Result<(), ChatError> {
        self.replies
            .lock()
            .unwrap()
            .push((response_url.to_string(), text.to_string()));
        Ok(())
    }
}
