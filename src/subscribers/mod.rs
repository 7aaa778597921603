//! Event subscribers.
//!
//! The gateway owns a [`SubscriberSet`] and reports lifecycle and command
//! outcomes to it; nothing subscribes by mutating the connection.
//!
//! ## Built-in
//! - [`ReactionAcknowledger`]: ✔ / ✖ reaction on the invoking message.
//! - [`ReadyLogger`]: logs the bot identity once per successful connect.

mod ack;
mod ready;
mod set;
mod subscriber;

pub use ack::{ReactionAcknowledger, FAILURE_MARKER, SUCCESS_MARKER};
pub use ready::ReadyLogger;
pub(crate) use set::panic_message;
pub use set::SubscriberSet;
pub use subscriber::Subscribe;
