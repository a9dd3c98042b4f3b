//! Error taxonomy for launcher operations.
//!
//! Precondition failures (platform, CLI version) are raised before anything is
//! spawned. Everything after the spawn is reported through the exit of the
//! child process.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::version::Version;

pub type Result<T> = std::result::Result<T, LaunchError>;

/// How a child process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExitInfo {
    pub code: Option<i32>,
    pub signal: Option<i32>,
}

impl ExitInfo {
    pub fn from_status(status: std::process::ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = {
            use std::os::unix::process::ExitStatusExt;
            status.signal()
        };
        #[cfg(not(unix))]
        let signal = None;

        Self {
            code: status.code(),
            signal,
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl fmt::Display for ExitInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "code:{code}"),
            (None, Some(signal)) => write!(f, "signal:{signal}"),
            (None, None) => write!(f, "code:unknown"),
        }
    }
}

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("{platform} platform is supported only on {required}")]
    PlatformUnsupported {
        platform: &'static str,
        required: &'static str,
    },

    #[error("{operation} is not available for {platform}")]
    OperationUnsupported {
        operation: &'static str,
        platform: &'static str,
    },

    #[error("NativeScript CLI not found, please run 'npm install -g nativescript' to install it")]
    ToolNotFound,

    #[error(
        "this extension is compatible with NativeScript CLI v{minimum} or greater; \
         the currently installed NativeScript CLI is v{installed}. \
         You can update it by executing 'npm install -g nativescript'"
    )]
    ToolVersionTooOld { installed: Version, minimum: Version },

    #[error("failed to spawn `{command}` in {cwd:?}")]
    SpawnFailed {
        command: String,
        cwd: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("The debug process exited unexpectedly {0}")]
    ExitedBeforeReady(ExitInfo),

    #[error("debug port not found before the process exited ({0})")]
    PortNotFound(ExitInfo),

    #[error("invalid debug request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl LaunchError {
    /// Stable identifier reported to the host alongside the message.
    pub fn kind(&self) -> &'static str {
        match self {
            LaunchError::PlatformUnsupported { .. } => "platformUnsupported",
            LaunchError::OperationUnsupported { .. } => "operationUnsupported",
            LaunchError::ToolNotFound => "toolNotFound",
            LaunchError::ToolVersionTooOld { .. } => "toolVersionTooOld",
            LaunchError::SpawnFailed { .. } => "processSpawnFailed",
            LaunchError::ExitedBeforeReady(_) => "processExitedBeforeReady",
            LaunchError::PortNotFound(_) => "portNotFound",
            LaunchError::InvalidRequest(_) => "invalidRequest",
            LaunchError::Io(_) => "io",
        }
    }
}
