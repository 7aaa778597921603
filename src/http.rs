//! HTTP client for the Discord REST API.
//!
//! All outbound HTTP calls go through [`DiscordHttpClient`] so that auth
//! headers, rate-limit back-off, and error handling live in one place. The
//! rest of the crate only sees the [`Messenger`] trait, which keeps the
//! acknowledger and commands testable without a network.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_lock::Mutex;
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode, Url};
use serde_json::json;
use tracing::{debug, warn};

use crate::config::Credential;
use crate::error::HttpError;

const BASE_URL: &str = "https://discord.com/api/v10";
const USER_AGENT: &str = "DiscordBot (https://github.com/ffr-community/ffr-bot, 0.1)";
const MAX_RETRIES: u32 = 5;

// ---------------------------------------------------------------------------
// Messenger seam
// ---------------------------------------------------------------------------

/// The slice of the REST API the bot's handlers need.
#[async_trait]
pub trait Messenger: Send + Sync + 'static {
    /// Add `emoji` as the bot's own reaction on a message.
    async fn add_reaction(
        &self,
        channel_id: &str,
        message_id: &str,
        emoji: &str,
    ) -> Result<(), HttpError>;

    /// Post a plain text message to a channel.
    async fn send_message(&self, channel_id: &str, content: &str) -> Result<(), HttpError>;
}

// ---------------------------------------------------------------------------
// Rate-limit tracker (per-bucket)
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Clone, PartialEq)]
struct RateLimitInfo {
    remaining: Option<u32>,
    reset_after: Option<f64>,
    bucket: Option<String>,
    is_global: bool,
}

impl RateLimitInfo {
    fn from_headers(headers: &HeaderMap) -> Self {
        let get = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
        Self {
            remaining: get("x-ratelimit-remaining").and_then(|s| s.parse().ok()),
            reset_after: get("x-ratelimit-reset-after")
                .or_else(|| get("retry-after"))
                .and_then(|s| s.parse().ok()),
            bucket: get("x-ratelimit-bucket").map(str::to_string),
            is_global: get("x-ratelimit-global") == Some("true"),
        }
    }
}

#[derive(Debug, Clone)]
struct BucketState {
    remaining: u32,
    resets_at: Instant,
}

#[derive(Debug, Default)]
struct RateLimiter {
    /// Route-key → bucket id.
    route_buckets: HashMap<String, String>,
    buckets: HashMap<String, BucketState>,
    /// No request may be sent before this instant.
    global_until: Option<Instant>,
}

impl RateLimiter {
    /// How long to wait before sending on `route_key`, if at all.
    fn delay_for(&self, route_key: &str, now: Instant) -> Option<Duration> {
        if let Some(until) = self.global_until.filter(|until| *until > now) {
            return Some(until - now);
        }

        let bucket_id = self.route_buckets.get(route_key)?;
        let state = self.buckets.get(bucket_id)?;
        (state.remaining == 0 && state.resets_at > now).then(|| state.resets_at - now)
    }

    fn update(&mut self, route_key: &str, info: &RateLimitInfo, now: Instant) {
        let reset_after = info.reset_after.map(Duration::from_secs_f64);

        if info.is_global {
            if let Some(after) = reset_after {
                self.global_until = Some(now + after);
            }
        }

        if let Some(bucket) = &info.bucket {
            self.route_buckets
                .insert(route_key.to_string(), bucket.clone());
            self.buckets.insert(
                bucket.clone(),
                BucketState {
                    remaining: info.remaining.unwrap_or(1),
                    resets_at: now + reset_after.unwrap_or(Duration::from_secs(1)),
                },
            );
        }
    }
}

// ---------------------------------------------------------------------------
// DiscordHttpClient
// ---------------------------------------------------------------------------

/// A thin, rate-limit–aware HTTP client for the Discord REST API.
///
/// Cheap to clone (internals are behind `Arc`).
#[derive(Clone)]
pub struct DiscordHttpClient {
    client: reqwest::Client,
    credential: Credential,
    limiter: Arc<Mutex<RateLimiter>>,
}

impl DiscordHttpClient {
    pub fn new(credential: Credential) -> Self {
        Self {
            client: reqwest::Client::new(),
            credential,
            limiter: Arc::new(Mutex::new(RateLimiter::default())),
        }
    }

    /// Build `{BASE_URL}/{segments...}`, percent-encoding each segment.
    fn url(segments: &[&str]) -> Result<Url, HttpError> {
        let mut url = Url::parse(BASE_URL).map_err(|e| HttpError::Transport(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| HttpError::Transport(format!("{BASE_URL} cannot be a base")))?
            .extend(segments);
        Ok(url)
    }

    /// Send a request, honouring the rate limiter and retrying on 429.
    ///
    /// `route_key` is used for per-route bucketing, e.g.
    /// `POST /channels/{channel_id}/messages`.
    pub async fn request(
        &self,
        method: Method,
        segments: &[&str],
        route_key: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<Vec<u8>, HttpError> {
        let url = Self::url(segments)?;

        for attempt in 0..=MAX_RETRIES {
            let delay = self.limiter.lock().await.delay_for(route_key, Instant::now());
            if let Some(delay) = delay {
                let delay = delay.min(Duration::from_secs(60));
                debug!(
                    route = route_key,
                    delay_ms = delay.as_millis() as u64,
                    "rate-limit pre-emptive backoff"
                );
                tokio::time::sleep(delay).await;
            }

            let mut req = self
                .client
                .request(method.clone(), url.clone())
                .header("authorization", format!("Bot {}", self.credential.expose()))
                .header("user-agent", USER_AGENT);
            if let Some(json) = body {
                req = req.json(json);
            } else if method == Method::PUT {
                req = req.header("content-length", "0");
            }

            let resp = req
                .send()
                .await
                .map_err(|e| HttpError::Transport(e.to_string()))?;

            let status = resp.status();
            let info = RateLimitInfo::from_headers(resp.headers());
            self.limiter
                .lock()
                .await
                .update(route_key, &info, Instant::now());

            if status == StatusCode::TOO_MANY_REQUESTS && attempt < MAX_RETRIES {
                let retry_after = info.reset_after.unwrap_or(1.0).min(60.0);
                warn!(
                    route = route_key,
                    attempt,
                    retry_after_s = retry_after,
                    global = info.is_global,
                    "rate-limited by Discord, backing off"
                );
                tokio::time::sleep(Duration::from_secs_f64(retry_after)).await;
                continue;
            }

            let bytes = resp
                .bytes()
                .await
                .map_err(|e| HttpError::Transport(e.to_string()))?;

            if status.is_success() {
                return Ok(bytes.to_vec());
            }

            return Err(HttpError::Api {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
                route: route_key.to_string(),
            });
        }

        Err(HttpError::Api {
            status: 429,
            body: "rate-limited after max retries".to_string(),
            route: route_key.to_string(),
        })
    }
}

#[async_trait]
impl Messenger for DiscordHttpClient {
    async fn add_reaction(
        &self,
        channel_id: &str,
        message_id: &str,
        emoji: &str,
    ) -> Result<(), HttpError> {
        let route_key = format!("PUT /channels/{channel_id}/messages/reactions");
        self.request(
            Method::PUT,
            &[
                "channels", channel_id, "messages", message_id, "reactions", emoji, "@me",
            ],
            &route_key,
            None,
        )
        .await
        .map(drop)
    }

    async fn send_message(&self, channel_id: &str, content: &str) -> Result<(), HttpError> {
        let route_key = format!("POST /channels/{channel_id}/messages");
        let body = json!({ "content": content });
        self.request(
            Method::POST,
            &["channels", channel_id, "messages"],
            &route_key,
            Some(&body),
        )
        .await
        .map(drop)
    }
}
