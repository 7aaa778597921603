//! Reaction acknowledgements for command outcomes.
//!
//! Purely cosmetic and best-effort: a reaction that cannot be added (message
//! deleted, channel gone, missing permission) is logged at debug and dropped.
//! No retry, no state.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::Subscribe;
use crate::commands::CommandContext;
use crate::error::CommandError;
use crate::http::Messenger;
use crate::types::Message;

pub const SUCCESS_MARKER: &str = "✔";
pub const FAILURE_MARKER: &str = "✖";

pub struct ReactionAcknowledger {
    messenger: Arc<dyn Messenger>,
}

impl ReactionAcknowledger {
    pub fn new(messenger: Arc<dyn Messenger>) -> Self {
        Self { messenger }
    }

    /// Mark `message` as successfully handled.
    pub async fn command_completed(&self, message: &Message) {
        self.mark(message, SUCCESS_MARKER, "on_command_completion").await;
    }

    /// Log `error` and mark `message` as failed.
    pub async fn command_failed(&self, message: &Message, error: &CommandError) {
        warn!(kind = error.as_label(), "command error: {error}");
        self.mark(message, FAILURE_MARKER, "on_command_error").await;
    }

    async fn mark(&self, message: &Message, marker: &str, hook: &'static str) {
        if let Err(e) = self
            .messenger
            .add_reaction(&message.channel_id, &message.id, marker)
            .await
        {
            debug!(
                hook,
                message_id = %message.id,
                error = %e,
                not_found = e.is_not_found(),
                "could not add reaction, original command possibly deleted"
            );
        }
    }
}

#[async_trait]
impl Subscribe for ReactionAcknowledger {
    async fn on_command_completed(&self, ctx: &CommandContext) {
        self.command_completed(&ctx.message).await;
    }

    async fn on_command_error(&self, ctx: &CommandContext, error: &CommandError) {
        self.command_failed(&ctx.message, error).await;
    }

    fn name(&self) -> &'static str {
        "reaction_ack"
    }
}
