//! Startup configuration: the bearer credential and process-wide knobs.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

/// Where the bot token lives, relative to the working directory.
pub const TOKEN_PATH: &str = "ffrbot/token.txt";

/// Sleep between a connection fault and the next connect attempt.
pub const RESTART_DELAY: Duration = Duration::from_secs(10);

/// How long a cancelled task may take to settle during shutdown.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Gateway intents bitmask.
///
/// GUILDS(1) | GUILD_MEMBERS(2) | GUILD_MESSAGES(512) | MESSAGE_CONTENT(32768)
pub const DEFAULT_INTENTS: u32 = 1 | 2 | 512 | 32768;

// ---------------------------------------------------------------------------
// Credential
// ---------------------------------------------------------------------------

/// Opaque bearer token. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Read the token from `path`: a single line, surrounding whitespace trimmed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let token = raw.trim();
        if token.is_empty() {
            return Err(ConfigError::EmptyCredential {
                path: path.to_path_buf(),
            });
        }
        Ok(Self(token.to_string()))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

// ---------------------------------------------------------------------------
// BotConfig
// ---------------------------------------------------------------------------

/// Knobs for the bot as a whole.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Prefix that marks a message as a command.
    pub command_prefix: String,
    /// Match command names regardless of case.
    pub case_insensitive: bool,
    pub description: String,
    pub intents: u32,
    pub token_path: PathBuf,
    pub restart_delay: Duration,
    pub shutdown_grace: Duration,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            command_prefix: "?".to_string(),
            case_insensitive: true,
            description: "FFR discord bot".to_string(),
            intents: DEFAULT_INTENTS,
            token_path: PathBuf::from(TOKEN_PATH),
            restart_delay: RESTART_DELAY,
            shutdown_grace: SHUTDOWN_GRACE,
        }
    }
}
