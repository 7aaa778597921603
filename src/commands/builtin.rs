//! Built-in commands that exist on every deployment.

use async_trait::async_trait;

use super::{Command, CommandContext};
use crate::error::CommandError;

/// `?ping` — liveness check.
pub struct Ping;

#[async_trait]
impl Command for Ping {
    fn name(&self) -> &'static str {
        "ping"
    }

    async fn run(&self, ctx: &CommandContext) -> Result<(), CommandError> {
        ctx.reply("pong").await
    }
}
