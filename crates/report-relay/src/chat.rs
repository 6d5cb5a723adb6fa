//! Chat transport: the small slice of Discord the relay needs.
//!
//! The orchestrator only talks to the `ChatPlatform` / `ChatChannel` traits.
//! `DiscordClient` implements them over the Discord REST API; tests provide
//! in-memory recorders.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::DiscordConfig;

/// Discord rejects message content longer than this many characters.
pub const MAX_MESSAGE_CHARS: usize = 2000;

/// Resends allowed for one request after `429 Too Many Requests`.
const MAX_RATE_LIMIT_RETRIES: u32 = 5;
/// Wait used when a 429 reply carries no usable `retry_after`.
const DEFAULT_RATE_LIMIT_WAIT: Duration = Duration::from_secs(1);
/// A 429 asking for a longer wait than this is returned as an error.
const MAX_RATE_LIMIT_WAIT: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Chat request failed: {0}")]
    Request(String),

    #[error("Chat API returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Chat response could not be decoded: {0}")]
    Decode(String),
}

/// Identity of the logged-in bot, reported once the client is ready.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BotIdentity {
    pub id: String,
    pub username: String,
}

impl std::fmt::Display for BotIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.username, self.id)
    }
}

/// A channel messages can be appended to.
#[async_trait]
pub trait ChatChannel: Send + Sync {
    fn id(&self) -> u64;

    async fn send(&self, content: &str) -> Result<(), ChatError>;
}

/// Connection to a chat platform.
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// Authenticate. Success is the "ready" signal that starts a run.
    async fn connect(&self) -> Result<BotIdentity, ChatError>;

    /// Resolve a channel handle by numeric id.
    async fn channel(&self, id: u64) -> Result<Box<dyn ChatChannel>, ChatError>;

    /// Disconnect. Must be safe to call on every exit path.
    async fn close(&self);
}

/// Split `text` into pieces of at most `max_chars` characters, in order.
///
/// Characters are Unicode scalar values, so multi-byte text is never cut in
/// the middle of a code point. An empty string yields no pieces.
pub fn split_message(text: &str, max_chars: usize) -> Vec<&str> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut count = 0;

    for (idx, _) in text.char_indices() {
        if count == max_chars {
            chunks.push(&text[start..idx]);
            start = idx;
            count = 0;
        }
        count += 1;
    }
    if start < text.len() {
        chunks.push(&text[start..]);
    }
    chunks
}

#[derive(Debug, Deserialize)]
struct ChannelPayload {
    id: String,
    #[serde(default)]
    name: Option<String>,
}

/// Body of a Discord 429 reply. `retry_after` is in seconds.
#[derive(Debug, Deserialize)]
struct RateLimitPayload {
    retry_after: f64,
}

#[derive(Debug, Serialize)]
struct CreateMessage<'a> {
    content: &'a str,
}

/// Discord REST client authenticated as a bot.
pub struct DiscordClient {
    http: reqwest::Client,
    api_base: String,
    auth: String,
    closed: AtomicBool,
}

impl DiscordClient {
    pub fn new(config: &DiscordConfig, timeout: Duration) -> Result<Self, ChatError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChatError::Request(e.to_string()))?;
        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            auth: format!("Bot {}", config.token),
            closed: AtomicBool::new(false),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, ChatError> {
        let url = format!("{}{}", self.api_base, path);
        let response =
            execute(|| self.http.get(&url).header("Authorization", &self.auth)).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| ChatError::Decode(e.to_string()))
    }
}

/// Send the request built by `build`, waiting out Discord rate limits.
///
/// A 429 reply is slept through for the `retry_after` it names (body first,
/// then the `Retry-After` header) and the same request is sent again. Any
/// other non-success status is returned as `ChatError::Status`.
async fn execute<F>(build: F) -> Result<reqwest::Response, ChatError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut retries = 0;
    loop {
        let response = build()
            .send()
            .await
            .map_err(|e| ChatError::Request(e.to_string()))?;
        if response.status() != reqwest::StatusCode::TOO_MANY_REQUESTS {
            return ensure_success(response).await;
        }

        let (wait, body) = rate_limit_wait(response).await;
        let wait = wait.unwrap_or(DEFAULT_RATE_LIMIT_WAIT);
        if retries >= MAX_RATE_LIMIT_RETRIES || wait > MAX_RATE_LIMIT_WAIT {
            return Err(ChatError::Status { status: 429, body });
        }
        retries += 1;
        warn!(
            retry = retries,
            wait_ms = wait.as_millis() as u64,
            "Rate limited by Discord, waiting before resending"
        );
        tokio::time::sleep(wait).await;
    }
}

async fn rate_limit_wait(response: reqwest::Response) -> (Option<Duration>, String) {
    let header = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<f64>().ok());
    let body = response.text().await.unwrap_or_default();
    let secs = serde_json::from_str::<RateLimitPayload>(&body)
        .ok()
        .map(|p| p.retry_after)
        .or(header)
        .filter(|s| s.is_finite() && *s >= 0.0);
    (secs.map(Duration::from_secs_f64), body)
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ChatError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ChatError::Status {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl ChatPlatform for DiscordClient {
    async fn connect(&self) -> Result<BotIdentity, ChatError> {
        let me: BotIdentity = self.get_json("/users/@me").await?;
        info!(bot = %me, "Bot connected");
        Ok(me)
    }

    async fn channel(&self, id: u64) -> Result<Box<dyn ChatChannel>, ChatError> {
        let payload: ChannelPayload = self.get_json(&format!("/channels/{id}")).await?;
        debug!(
            channel = %payload.id,
            name = payload.name.as_deref().unwrap_or("-"),
            "Channel resolved"
        );
        Ok(Box::new(DiscordChannel {
            id,
            http: self.http.clone(),
            url: format!("{}/channels/{id}/messages", self.api_base),
            auth: self.auth.clone(),
        }))
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            info!("Bot disconnected");
        }
    }
}

/// A resolved Discord text channel.
pub struct DiscordChannel {
    id: u64,
    http: reqwest::Client,
    url: String,
    auth: String,
}

#[async_trait]
impl ChatChannel for DiscordChannel {
    fn id(&self) -> u64 {
        self.id
    }

    async fn send(&self, content: &str) -> Result<(), ChatError> {
        let message = CreateMessage { content };
        execute(|| {
            self.http
                .post(&self.url)
                .header("Authorization", &self.auth)
                .json(&message)
        })
        .await?;
        debug!(channel = self.id, chars = content.chars().count(), "Message posted");
        Ok(())
    }
}
