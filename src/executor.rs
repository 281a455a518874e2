use stacked_errors::Result;

use crate::{Command, CommandResult};

/// Something that can run a [Command] to completion. [SystemExecutor] spawns
/// real OS processes, other implementations can stand in for the container
/// runtime.
#[allow(async_fn_in_trait)]
pub trait Executor {
    /// Runs `command` and waits for it. An `Err` means the command could not
    /// be run at all, an unsuccessful status is returned as an `Ok`.
    async fn execute(&mut self, command: Command) -> Result<CommandResult>;
}

/// Runs commands as child processes with inherited standard streams
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemExecutor;

impl Executor for SystemExecutor {
    async fn execute(&mut self, command: Command) -> Result<CommandResult> {
        command.run_to_completion().await
    }
}
