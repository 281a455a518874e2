use std::process::ExitStatus;

use crate::exit_code_of;

/// Why one of the external container CLI steps did not succeed
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("`{command}` exited with {status}")]
    Unsuccessful { command: String, status: ExitStatus },
    /// The step could not be started at all, e.g. the container CLI is not
    /// installed or the dockerfile does not exist
    #[error("`{command}` could not be launched: {error:?}")]
    Launch {
        command: String,
        error: stacked_errors::Error,
    },
}

impl StepError {
    pub fn exit_code(&self) -> u8 {
        match self {
            StepError::Unsuccessful { status, .. } => exit_code_of(*status),
            StepError::Launch { .. } => 1,
        }
    }
}

/// The outcome of a failed [Invocation::invoke](crate::Invocation::invoke).
/// Image removal failures never show up here.
#[derive(Debug, thiserror::Error)]
pub enum InvokeError {
    /// Nothing was run or removed after this
    #[error("building the image failed: {0}")]
    Build(StepError),
    /// The image was still removed after this
    #[error("running the image failed: {0}")]
    Run(StepError),
}

impl InvokeError {
    /// The code this process should exit with, mirroring the failed step
    pub fn exit_code(&self) -> u8 {
        match self {
            InvokeError::Build(e) | InvokeError::Run(e) => e.exit_code(),
        }
    }
}
