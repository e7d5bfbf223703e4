//! Slack Web API client.

use std::num::NonZeroU32;
use std::time::Duration;

use async_trait::async_trait;
use governor::Quota;
use governor::RateLimiter;
use governor::clock::QuantaClock;
use governor::state::InMemoryState;
use governor::state::direct::NotKeyed;
use log::debug;
use log::info;
use serde_json::Value;
use serde_json::json;
use wreq::header::AUTHORIZATION;
use wreq::header::CONTENT_TYPE;
use wreq::header::HeaderValue;

use crate::notifier::ChatMessage;
use crate::notifier::NotificationSink;
use crate::notifier::PostedMessage;
use crate::notifier::error::ChatError;

// NOTE: See https://api.slack.com/apis/rate-limits.
// chat.update is a Tier 3 method, roughly 50 requests per minute.
const REQUESTS_PER_MINUTE: NonZeroU32 = NonZeroU32::new(50).unwrap();

const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

pub struct SlackNotifier {
    /// Web API base, e.g. `https://slack.com/api`.
    pub api_url: String,
    client: wreq::Client,
    auth: HeaderValue,
    limiter: RateLimiter<NotKeyed, InMemoryState, QuantaClock>,
    timeout: Duration,
}

impl SlackNotifier {
    pub fn new(api_url: &str, bot_token: &str, timeout: Duration) -> Result<Self, ChatError> {
        let client = wreq::Client::builder().build()?;
        let auth = HeaderValue::from_str(&format!("Bearer {bot_token}")).map_err(|_| {
            ChatError::InvalidResponse {
                message: "bot token is not a valid header value".to_string(),
            }
        })?;

        Ok(Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            client,
            auth,
            limiter: RateLimiter::direct(Quota::per_minute(REQUESTS_PER_MINUTE)),
            timeout,
        })
    }

    /// Calls a write method with a JSON body.
    async fn post(&self, method: &str, body: Value) -> Result<Value, ChatError> {
        let request = self
            .client
            .post(format!("{}/{method}", self.api_url))
            .header(AUTHORIZATION, self.auth.clone())
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
            .body(body.to_string());
        self.call(method, request).await
    }

    /// Calls a read method with query parameters.
    async fn get(&self, method: &str, params: &[(&str, &str)]) -> Result<Value, ChatError> {
        let query = serde_urlencoded::to_string(params).map_err(|e| ChatError::InvalidResponse {
            message: e.to_string(),
        })?;
        let request = self
            .client
            .get(format!("{}/{method}?{query}", self.api_url))
            .header(AUTHORIZATION, self.auth.clone());
        self.call(method, request).await
    }

    async fn call(&self, method: &str, request: wreq::RequestBuilder) -> Result<Value, ChatError> {
        let body = self.send(request).await?;
        let resp: Value = serde_json::from_str(&body)?;
        check_resp_errors(&resp)?;
        debug!("Slack method {method} succeeded.");
        Ok(resp)
    }

    async fn send(&self, request: wreq::RequestBuilder) -> Result<String, ChatError> {
        if self.limiter.check().is_err() {
            info!("Slack is ratelimited. Waiting...");
        }
        self.limiter.until_ready().await;

        let req = request.build()?;
        debug!("Making request to: {}", req.url());

        let exchange = async {
            let response = self.client.execute(req).await?;
            let status = response.status();
            let body = response.text().await?;
            Ok::<_, wreq::Error>((status, body))
        };

        let (status, body) = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| ChatError::Timeout)??;

        // Slack answers 200 with `ok: false` for API errors; anything else is transport.
        if !status.is_success() {
            return Err(ChatError::ApiError {
                code: format!("http_{}", status.as_u16()),
            });
        }
        Ok(body)
    }
}

/// Maps Slack's `{ "ok": false, "error": "..." }` envelope to a [`ChatError`].
fn check_resp_errors(resp: &Value) -> Result<(), ChatError> {
    if resp.get("ok").and_then(Value::as_bool) == Some(true) {
        return Ok(());
    }

    let code = resp
        .get("error")
        .and_then(Value::as_str)
        .unwrap_or("unknown_error");
    Err(ChatError::ApiError {
        code: code.to_string(),
    })
}

/// Narrows an API error to the typed not-found variants for the given target.
fn classify(err: ChatError, channel_ref: &str, message_ref: Option<&str>) -> ChatError {
    match err {
        ChatError::ApiError { code } => match (code.as_str(), message_ref) {
            ("message_not_found", Some(message_ref)) => {
                ChatError::MessageNotFound {
                    channel_ref: channel_ref.to_string(),
                    message_ref: message_ref.to_string(),
                }
            }
            ("channel_not_found", _) => ChatError::ChannelNotFound {
                channel_ref: channel_ref.to_string(),
            },
            _ => ChatError::ApiError { code },
        },
        other => other,
    }
}

fn str_field<'a>(resp: &'a Value, field: &str) -> Result<&'a str, ChatError> {
    resp.get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| ChatError::InvalidResponse {
            message: format!("missing field `{field}`"),
        })
}

#[async_trait]
impl NotificationSink for SlackNotifier {
    async fn post_message(
        &self,
        channel_ref: &str,
        message: &ChatMessage,
    ) -> Result<PostedMessage, ChatError> {
        let body = json!({
            "channel": channel_ref,
            "text": message.text,
            "blocks": message.blocks,
        });
        let resp = self
            .post("chat.postMessage", body)
            .await
            .map_err(|e| classify(e, channel_ref, None))?;

        Ok(PostedMessage {
            channel_ref: str_field(&resp, "channel")?.to_string(),
            message_ref: str_field(&resp, "ts")?.to_string(),
        })
    }

    async fn update_message(
        &self,
        channel_ref: &str,
        message_ref: &str,
        message: &ChatMessage,
    ) -> Result<(), ChatError> {
        let body = json!({
            "channel": channel_ref,
            "ts": message_ref,
            "text": message.text,
            "blocks": message.blocks,
        });
        self.post("chat.update", body)
            .await
            .map_err(|e| classify(e, channel_ref, Some(message_ref)))?;
        Ok(())
    }

    async fn delete_message(
        &self,
        channel_ref: &str,
        message_ref: &str,
    ) -> Result<(), ChatError> {
        let body = json!({ "channel": channel_ref, "ts": message_ref });
        self.post("chat.delete", body)
            .await
            .map_err(|e| classify(e, channel_ref, Some(message_ref)))?;
        Ok(())
    }

    async fn resolve_permalink(
        &self,
        channel_ref: &str,
        message_ref: &str,
    ) -> Result<String, ChatError> {
        let resp = self
            .get(
                "chat.getPermalink",
                &[("channel", channel_ref), ("message_ts", message_ref)],
            )
            .await
            .map_err(|e| classify(e, channel_ref, Some(message_ref)))?;
        Ok(str_field(&resp, "permalink")?.to_string())
    }

    async fn ensure_member(&self, channel_ref: &str) -> Result<(), ChatError> {
        let resp = self
            .get("conversations.info", &[("channel", channel_ref)])
            .await
            .map_err(|e| classify(e, channel_ref, None))?;

        let is_member = resp
            .get("channel")
            .and_then(|c| c.get("is_member"))
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if is_member {
            return Ok(());
        }

        info!("Joining channel {channel_ref}.");
        self.post("conversations.join", json!({ "channel": channel_ref }))
            .await
            .map_err(|e| classify(e, channel_ref, None))?;
        Ok(())
    }

    async fn respond(&self, response_url: &str, text: &str) -> Result<(), ChatError> {
        let body = json!({ "response_type": "ephemeral", "text": text });
        let request = self
            .client
            .post(response_url)
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
            .body(body.to_string());
        // Response URLs answer with plain text, not the Web API envelope.
        self.send(request).await?;
        Ok(())
    }
}
