use core::fmt;
use std::{
    ffi::{OsStr, OsString},
    fmt::Debug,
    process::{ExitStatus, Stdio},
};

use stacked_errors::{DisplayStr, Result, StackableErr};
use tokio::process;

/// An OS Command, this is `tokio::process::Command` wrapped with the things
/// needed for driving a container CLI.
///
/// Unlike a plain `tokio::process::Command`, this is `Clone` and comparable, so
/// a planned invocation can be inspected (and logged) before it is run. The
/// standard streams of the child are always inherited from this process.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Command {
    /// The program to run.
    pub program: OsString,
    /// All the arguments that will be passed to the program
    pub args: Vec<OsString>,
}

impl Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_fmt(format_args!(
            "Command {{ program: {:?} }}",
            DisplayStr(&self.get_unified_command()),
        ))
    }
}

impl Command {
    /// Creates a new `Command` for launching the `program` with no arguments
    pub fn new_os_str(program: impl AsRef<OsStr>) -> Self {
        Self {
            program: program.as_ref().into(),
            ..Default::default()
        }
    }

    /// Adds an argument
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().into());
        self
    }

    /// Adds arguments to be passed to the program
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|s| s.as_ref().into()));
        self
    }

    /// Gets the program and args interspersed with spaces
    pub fn get_unified_command(&self) -> String {
        let mut command = self.program.to_string_lossy().into_owned();
        for arg in &self.args {
            command.push(' ');
            command += arg.to_string_lossy().as_ref();
        }
        command
    }

    /// Spawns the program with stdin, stdout, and stderr inherited from this
    /// process and waits for it to exit.
    ///
    /// Note: If this function succeeds, it only means that the process could be
    /// spawned and waited on, it does not mean that the command itself had a
    /// successful return status, check `successful` on the `CommandResult`.
    pub async fn run_to_completion(self) -> Result<CommandResult> {
        let mut child = process::Command::new(&self.program)
            .args(&self.args)
            // an abandoned future should not leave an orphaned container CLI process
            .kill_on_drop(true)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .stack_err_with_locationless(|| {
                format!("{self:?}.run_to_completion() -> failed to spawn child process")
            })?;
        let status = child.wait().await.stack_err_with_locationless(|| {
            format!("{self:?}.run_to_completion() -> failed when waiting on child process")
        })?;
        Ok(CommandResult {
            command: self,
            status,
        })
    }
}

/// The result of a [Command](crate::Command) that ran to completion
#[must_use]
#[derive(Debug, Clone)]
pub struct CommandResult {
    // the command information is kept around for failures
    pub command: Command,
    pub status: ExitStatus,
}

impl CommandResult {
    /// Returns if the command completed with a successful return status
    pub fn successful(&self) -> bool {
        self.status.success()
    }
}

/// Maps an `ExitStatus` to the code a shell would report for it. Processes
/// killed by a signal give `128 + signal` on Unix. Anything else that does not
/// fit in a `u8` becomes a generic 1.
pub fn exit_code_of(status: ExitStatus) -> u8 {
    if let Some(code) = status.code() {
        return u8::try_from(code).unwrap_or(1)
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return u8::try_from(signal).map_or(1, |signal| 128u8.saturating_add(signal))
        }
    }
    1
}
