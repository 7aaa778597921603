//! Prefix commands.
//!
//! A [`CommandRegistry`] is built before connecting and handed to the gateway.
//! For each incoming message it decides whether the message is a command
//! invocation; the gateway runs the invocation as its own pending task and
//! reports the outcome to the subscribers.

mod registry;

pub mod builtin;

pub use self::registry::{Command, CommandContext, CommandRegistry, Invocation};
