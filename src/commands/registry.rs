use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::CommandError;
use crate::http::Messenger;
use crate::types::Message;

/// Everything a command sees about its invocation.
#[derive(Clone)]
pub struct CommandContext {
    /// The message that invoked the command.
    pub message: Message,
    /// Name as typed by the user (prefix stripped).
    pub invoked_with: String,
    pub args: Vec<String>,
    pub messenger: Arc<dyn Messenger>,
}

impl CommandContext {
    /// Reply in the channel the command came from.
    pub async fn reply(&self, content: &str) -> Result<(), CommandError> {
        self.messenger
            .send_message(&self.message.channel_id, content)
            .await
            .map_err(CommandError::from)
    }
}

impl std::fmt::Debug for CommandContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandContext")
            .field("message_id", &self.message.id)
            .field("channel_id", &self.message.channel_id)
            .field("invoked_with", &self.invoked_with)
            .field("args", &self.args)
            .finish()
    }
}

/// A single prefix command.
#[async_trait]
pub trait Command: Send + Sync + 'static {
    /// Primary name, matched after the prefix.
    fn name(&self) -> &'static str;

    fn aliases(&self) -> &'static [&'static str] {
        &[]
    }

    async fn run(&self, ctx: &CommandContext) -> Result<(), CommandError>;
}

/// A parsed command invocation, ready to run.
pub struct Invocation {
    /// `None` when no command matches the name.
    pub command: Option<Arc<dyn Command>>,
    pub ctx: CommandContext,
}

impl Invocation {
    pub async fn run(&self) -> Result<(), CommandError> {
        match &self.command {
            Some(command) => command.run(&self.ctx).await,
            None => Err(CommandError::NotFound(self.ctx.invoked_with.clone())),
        }
    }
}

/// Name → command lookup with prefix parsing.
pub struct CommandRegistry {
    prefix: String,
    case_insensitive: bool,
    commands: HashMap<String, Arc<dyn Command>>,
}

impl CommandRegistry {
    pub fn new(prefix: impl Into<String>, case_insensitive: bool) -> Self {
        Self {
            prefix: prefix.into(),
            case_insensitive,
            commands: HashMap::new(),
        }
    }

    /// Register a command under its name and aliases. Later registrations
    /// replace earlier ones with the same key.
    pub fn register(&mut self, command: impl Command) -> &mut Self {
        let command: Arc<dyn Command> = Arc::new(command);
        for name in std::iter::once(command.name()).chain(command.aliases().iter().copied()) {
            let key = self.key(name);
            self.commands.insert(key, Arc::clone(&command));
        }
        self
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Split `content` into `(name, args)` if it starts with the prefix
    /// followed directly by a name.
    pub fn parse<'a>(&self, content: &'a str) -> Option<(&'a str, Vec<&'a str>)> {
        let rest = content.strip_prefix(self.prefix.as_str())?;
        if rest.starts_with(char::is_whitespace) {
            return None;
        }
        let mut words = rest.split_whitespace();
        let name = words.next()?;
        Some((name, words.collect()))
    }

    /// Build an invocation for `message`, or `None` if it is not a command.
    /// Messages from bots are never commands.
    pub fn invocation(&self, message: &Message, messenger: Arc<dyn Messenger>) -> Option<Invocation> {
        if message.author.bot {
            return None;
        }
        let (name, args) = self.parse(&message.content)?;
        Some(Invocation {
            command: self.commands.get(&self.key(name)).cloned(),
            ctx: CommandContext {
                message: message.clone(),
                invoked_with: name.to_string(),
                args: args.into_iter().map(str::to_string).collect(),
                messenger,
            },
        })
    }

    fn key(&self, name: &str) -> String {
        if self.case_insensitive {
            name.to_lowercase()
        } else {
            name.to_string()
        }
    }
}
