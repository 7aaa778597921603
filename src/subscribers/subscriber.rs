//! # Event subscriber trait.
//!
//! [`Subscribe`] is the only way to observe what a connection does. Every
//! method has a no-op default, so a subscriber implements just the events it
//! cares about.
//!
//! ## Rules
//! - Handle errors internally; nothing a subscriber returns reaches the
//!   connection or the supervisor.
//! - Panics are caught by [`SubscriberSet`](super::SubscriberSet) and logged.
//! - Command events arrive on the command's own task, so two commands may be
//!   reported concurrently.

use async_trait::async_trait;

use crate::commands::CommandContext;
use crate::error::CommandError;
use crate::types::ReadyEvent;

#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// The gateway accepted our IDENTIFY. Fired once per successful connect.
    async fn on_ready(&self, _ready: &ReadyEvent) {}

    /// A command ran to completion.
    async fn on_command_completed(&self, _ctx: &CommandContext) {}

    /// A command failed, including unknown command names.
    async fn on_command_error(&self, _ctx: &CommandContext, _error: &CommandError) {}

    /// Name used in logs.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}
