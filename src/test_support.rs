//! Fakes shared by the unit tests.

use std::fmt;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

use crate::error::HttpError;
use crate::http::Messenger;
use crate::types::{Message, User};

/// A non-bot message in channel `chan`.
pub fn message(id: &str, content: &str) -> Message {
    Message {
        id: id.to_string(),
        channel_id: "chan".to_string(),
        guild_id: Some("guild".to_string()),
        author: User {
            id: "42".to_string(),
            username: "racer".to_string(),
            discriminator: None,
            bot: false,
        },
        content: content.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Messenger fake
// ---------------------------------------------------------------------------

/// Records every call; optionally fails them all as if the target was deleted.
#[derive(Default)]
pub struct RecordingMessenger {
    fail: bool,
    reactions: Mutex<Vec<(String, String)>>,
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingMessenger {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// `(message_id, emoji)` per reaction attempt.
    pub fn reactions(&self) -> Vec<(String, String)> {
        self.reactions.lock().unwrap().clone()
    }

    /// `(channel_id, content)` per send attempt.
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    fn outcome(&self, route: &str) -> Result<(), HttpError> {
        if self.fail {
            Err(HttpError::Api {
                status: 404,
                body: r#"{"message": "Unknown Message", "code": 10008}"#.to_string(),
                route: route.to_string(),
            })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn add_reaction(
        &self,
        _channel_id: &str,
        message_id: &str,
        emoji: &str,
    ) -> Result<(), HttpError> {
        self.reactions
            .lock()
            .unwrap()
            .push((message_id.to_string(), emoji.to_string()));
        self.outcome("PUT /reactions")
    }

    async fn send_message(&self, channel_id: &str, content: &str) -> Result<(), HttpError> {
        self.sent
            .lock()
            .unwrap()
            .push((channel_id.to_string(), content.to_string()));
        self.outcome("POST /messages")
    }
}

// ---------------------------------------------------------------------------
// Log capture
// ---------------------------------------------------------------------------

/// Tracing layer that keeps every event as `(level, "message k=v ...")`.
#[derive(Clone, Default)]
pub struct LogCapture {
    records: Arc<Mutex<Vec<(Level, String)>>>,
}

impl LogCapture {
    /// Capture events on the current thread until the guard drops.
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        tracing::subscriber::set_default(tracing_subscriber::registry().with(self.clone()))
    }

    /// Events at `level` whose rendered text contains `needle`.
    pub fn count(&self, level: Level, needle: &str) -> usize {
        self.records
            .lock()
            .unwrap()
            .iter()
            .filter(|(l, text)| *l == level && text.contains(needle))
            .count()
    }

    pub fn count_level(&self, level: Level) -> usize {
        self.count(level, "")
    }
}

impl<S: Subscriber> Layer<S> for LogCapture {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut text = Rendered::default();
        event.record(&mut text);
        self.records
            .lock()
            .unwrap()
            .push((*event.metadata().level(), text.0));
    }
}

#[derive(Default)]
struct Rendered(String);

impl Visit for Rendered {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if !self.0.is_empty() {
            self.0.push(' ');
        }
        if field.name() == "message" {
            self.0.push_str(&format!("{value:?}"));
        } else {
            self.0.push_str(&format!("{}={value:?}", field.name()));
        }
    }
}
