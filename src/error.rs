//! Error types for the bot.
//!
//! Each layer owns one enum so the supervisor can tell a transport fault
//! (restart) from a command failure (acknowledge and move on) by type alone:
//!
//! - [`GatewayError`] — the active connection died. Only these reach the
//!   supervisor loop.
//! - [`CommandError`] — a single command invocation failed.
//! - [`HttpError`] — a REST call failed (reactions, replies).
//! - [`ConfigError`] — startup configuration could not be loaded.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

// ---------------------------------------------------------------------------
// Gateway
// ---------------------------------------------------------------------------

/// Why the active gateway connection terminated.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum GatewayError {
    /// WebSocket connect, read or write failure.
    #[error("gateway transport error: {0}")]
    Transport(String),

    /// The HELLO / IDENTIFY exchange did not complete.
    #[error("gateway handshake failed: {0}")]
    Handshake(String),

    /// The server closed the socket.
    #[error("gateway closed by server (code {code:?})")]
    Closed {
        /// Close code, if the server sent a close frame.
        code: Option<u16>,
    },

    /// The server stopped acknowledging heartbeats.
    #[error("no heartbeat ACK within {interval:?}, connection zombied")]
    Zombied {
        /// The heartbeat interval that elapsed without an ACK.
        interval: Duration,
    },

    /// The server asked us to reconnect (op 7).
    #[error("gateway requested reconnect")]
    ReconnectRequested,

    /// The session was invalidated (op 9).
    #[error("session invalidated (resumable: {resumable})")]
    InvalidSession {
        /// Whether the server flagged the session as resumable.
        resumable: bool,
    },

    /// The connection future panicked.
    #[error("connection panicked: {0}")]
    Panicked(String),
}

impl GatewayError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            GatewayError::Transport(_) => "gateway_transport",
            GatewayError::Handshake(_) => "gateway_handshake",
            GatewayError::Closed { .. } => "gateway_closed",
            GatewayError::Zombied { .. } => "gateway_zombied",
            GatewayError::ReconnectRequested => "gateway_reconnect",
            GatewayError::InvalidSession { .. } => "gateway_invalid_session",
            GatewayError::Panicked(_) => "gateway_panicked",
        }
    }

    /// Close codes that will fail again on reconnect without operator action
    /// (bad token, bad intents, bad shard, bad API version).
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            GatewayError::Closed {
                code: Some(4004 | 4010 | 4011 | 4012 | 4013 | 4014)
            }
        )
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// Failure of a single command invocation.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// No command is registered under this name.
    #[error("command \"{0}\" is not found")]
    NotFound(String),

    /// The arguments could not be understood.
    #[error("bad argument: {0}")]
    BadArgument(String),

    /// The command ran and failed.
    #[error("{0}")]
    Failed(String),

    /// The command panicked.
    #[error("command panicked: {0}")]
    Panicked(String),
}

impl CommandError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            CommandError::NotFound(_) => "command_not_found",
            CommandError::BadArgument(_) => "command_bad_argument",
            CommandError::Failed(_) => "command_failed",
            CommandError::Panicked(_) => "command_panicked",
        }
    }
}

impl From<HttpError> for CommandError {
    fn from(e: HttpError) -> Self {
        CommandError::Failed(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// HTTP
// ---------------------------------------------------------------------------

#[derive(Error, Debug)]
pub enum HttpError {
    /// Non-success status from Discord.
    #[error("Discord API error {status} on {route}: {body}")]
    Api {
        status: u16,
        body: String,
        route: String,
    },
    /// Transport / network error.
    #[error("HTTP transport error: {0}")]
    Transport(String),
}

impl HttpError {
    /// `true` when Discord says the target does not exist (deleted message,
    /// channel we can no longer see).
    pub fn is_not_found(&self) -> bool {
        matches!(self, HttpError::Api { status: 404, .. })
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read credential from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("credential file {path} is empty")]
    EmptyCredential { path: PathBuf },
}
