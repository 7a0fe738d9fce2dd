//! The command registry.
//!
//! Commands are registered once at startup and looked up by exact name on
//! every dispatch. Registration order is kept for help listings.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{Instrument, error, info, info_span};

use crate::command::{BoxedCommand, Command, CommandDescriptor};
use crate::error::RegistryError;

/// Name of the built-in help command.
pub const HELP_COMMAND: &str = "help";

/// A registered command with its descriptor resolved once.
#[derive(Clone)]
pub struct RegisteredCommand {
    descriptor: CommandDescriptor,
    handler: BoxedCommand,
}

impl RegisteredCommand {
    pub fn descriptor(&self) -> &CommandDescriptor {
        &self.descriptor
    }

    pub fn name(&self) -> &str {
        self.descriptor.name()
    }

    pub fn handler(&self) -> &BoxedCommand {
        &self.handler
    }
}

impl std::fmt::Debug for RegisteredCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredCommand")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

/// Name-to-command lookup, immutable once dispatch begins.
#[derive(Debug, Clone, Default)]
pub struct CommandRegistry {
    commands: Vec<RegisteredCommand>,
    index: HashMap<String, usize>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a command.
    ///
    /// Fails if the name is empty, contains whitespace, is `help`, or is
    /// already taken.
    pub fn register<C: Command>(&mut self, command: C) -> Result<(), RegistryError> {
        self.register_shared(Arc::new(command))
    }

    /// Registers a command that is already behind an `Arc`.
    pub fn register_shared(&mut self, command: BoxedCommand) -> Result<(), RegistryError> {
        let descriptor = command.descriptor();
        let name = descriptor.name();

        if name.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if name.chars().any(char::is_whitespace) {
            return Err(RegistryError::InvalidName(name.to_string()));
        }
        if name == HELP_COMMAND {
            return Err(RegistryError::Reserved(name.to_string()));
        }
        if self.index.contains_key(name) {
            return Err(RegistryError::Duplicate(name.to_string()));
        }

        self.index.insert(name.to_string(), self.commands.len());
        self.commands.push(RegisteredCommand {
            descriptor,
            handler: command,
        });
        Ok(())
    }

    /// Builder form of [`register`](Self::register).
    pub fn with<C: Command>(mut self, command: C) -> Result<Self, RegistryError> {
        self.register(command)?;
        Ok(self)
    }

    /// Looks up a command by exact, case-sensitive name.
    pub fn resolve(&self, name: &str) -> Option<&RegisteredCommand> {
        self.index.get(name).map(|&i| &self.commands[i])
    }

    /// Iterates commands in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &RegisteredCommand> {
        self.commands.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.commands.iter().map(RegisteredCommand::name)
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Runs every command's `init` hook in registration order.
    ///
    /// Failures are logged and do not stop the remaining hooks. Returns the
    /// number of hooks that failed.
    pub async fn init_all(&self) -> usize {
        let mut failed = 0;
        for command in &self.commands {
            let span = info_span!("command_init", command = %command.name());
            if let Err(e) = command.handler.init().instrument(span).await {
                error!(command = %command.name(), error = %e, "Command init failed");
                failed += 1;
            }
        }
        info!(
            commands = self.commands.len(),
            failed, "Command init hooks finished"
        );
        failed
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::context::InvocationContext;
    use crate::error::{CommandError, CommandResult};

    struct Named(&'static str);

    #[async_trait]
    impl Command for Named {
        fn descriptor(&self) -> CommandDescriptor {
            CommandDescriptor::new(self.0, "test command")
        }

        async fn handle(&self, _ctx: &InvocationContext) -> CommandResult<()> {
            Ok(())
        }
    }

    struct Init {
        name: &'static str,
        fail: bool,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Command for Init {
        fn descriptor(&self) -> CommandDescriptor {
            CommandDescriptor::new(self.name, "")
        }

        async fn init(&self) -> CommandResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(CommandError::internal("no tips"))
            } else {
                Ok(())
            }
        }

        async fn handle(&self, _ctx: &InvocationContext) -> CommandResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_register_and_resolve() {
        let registry = CommandRegistry::new()
            .with(Named("ping"))
            .unwrap()
            .with(Named("tip"))
            .unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.resolve("tip").unwrap().name(), "tip");
        assert!(registry.resolve("Tip").is_none());
        assert!(registry.resolve("missing").is_none());
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["ping", "tip"]);
    }

    #[test]
    fn test_rejects_bad_names() {
        let mut registry = CommandRegistry::new();
        registry.register(Named("ping")).unwrap();

        assert_eq!(
            registry.register(Named("ping")),
            Err(RegistryError::Duplicate("ping".into()))
        );
        assert_eq!(registry.register(Named("")), Err(RegistryError::EmptyName));
        assert_eq!(
            registry.register(Named("two words")),
            Err(RegistryError::InvalidName("two words".into()))
        );
        assert_eq!(
            registry.register(Named("help")),
            Err(RegistryError::Reserved("help".into()))
        );
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_init_all_continues_after_failure() {
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = CommandRegistry::new()
            .with(Init {
                name: "tip",
                fail: true,
                calls: calls.clone(),
            })
            .unwrap()
            .with(Init {
                name: "ping",
                fail: false,
                calls: calls.clone(),
            })
            .unwrap();

        assert_eq!(registry.init_all().await, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
