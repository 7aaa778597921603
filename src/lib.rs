//! Racing-community Discord bot.
//!
//! The interesting part is the process lifecycle: [`supervisor`] keeps a
//! [`gateway`] connection alive across faults and shuts it down cleanly on
//! interrupt. Commands and their acknowledgements are plugged in through
//! [`commands`] and [`subscribers`].

pub mod commands;
pub mod config;
pub mod error;
pub mod events;
pub mod gateway;
pub mod http;
pub mod signals;
pub mod subscribers;
pub mod supervisor;
pub mod tasks;
pub mod types;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use tracing::info;

use crate::commands::{builtin, CommandRegistry};
use crate::config::{BotConfig, Credential};
use crate::gateway::{DiscordGateway, GatewayConfig};
use crate::http::{DiscordHttpClient, Messenger};
use crate::subscribers::{ReactionAcknowledger, ReadyLogger, SubscriberSet};
use crate::supervisor::{RunReport, Supervisor, SupervisorConfig};

/// Build the bot from `cfg` and run it until the process is interrupted.
pub async fn run(cfg: BotConfig, credential: Credential) -> RunReport {
    let messenger: Arc<dyn Messenger> = Arc::new(DiscordHttpClient::new(credential.clone()));

    let mut commands = CommandRegistry::new(cfg.command_prefix.clone(), cfg.case_insensitive);
    commands.register(builtin::Ping);

    let mut subscribers = SubscriberSet::default();
    subscribers.push(Arc::new(ReadyLogger));
    subscribers.push(Arc::new(ReactionAcknowledger::new(Arc::clone(&messenger))));

    info!(
        description = %cfg.description,
        prefix = %cfg.command_prefix,
        commands = commands.len(),
        subscribers = subscribers.len(),
        "initializing bot"
    );
    let gateway = DiscordGateway::new(
        GatewayConfig {
            intents: cfg.intents,
            ..GatewayConfig::default()
        },
        messenger,
        commands,
        subscribers,
    );

    Supervisor::new(Arc::new(gateway), SupervisorConfig::from(&cfg))
        .run(&credential)
        .await
}
