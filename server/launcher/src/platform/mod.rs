//! Platform-specific build, run and debug flows.
//!
//! Each flow is a CLI command plus a wait on the child's stdout for the
//! readiness marker of that platform. The waits are plain functions over the
//! event receiver so they can be driven without a real CLI.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::command::{CliCommand, CommandBuilder};
use crate::constants::{millis_to_duration, ADB_SETTLE_DELAY_MS, CLOSE_GRACE_PERIOD_MS};
use crate::error::Result;
use crate::logging::OutputSink;
use crate::process::{self, Disposer, ProcessHandle};
use crate::request::LaunchRequest;
use crate::version::VersionGate;

pub mod android;
pub mod ios;

pub use android::{await_debug_port, await_debugger_started, AndroidSession};
pub use ios::{await_socket, IosSession};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Ios,
    Android,
}

impl Platform {
    /// Name as the CLI expects it on the command line.
    pub fn name(self) -> &'static str {
        match self {
            Platform::Ios => "ios",
            Platform::Android => "android",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a successful debug operation produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DebugReady {
    /// iOS: the debugger socket to connect to.
    Socket(String),
    /// Android: the debugger can be attached.
    Ready,
}

/// Result of `debug`: the readiness signal plus the still-running CLI, if one
/// was started. The host owns the handle and terminates it when the debug
/// session ends.
#[derive(Debug)]
pub struct DebugOutcome {
    pub ready: DebugReady,
    pub process: Option<ProcessHandle>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    /// Wait after the Android debugger marker before reporting readiness.
    pub adb_settle: Duration,
    /// Wait before reporting an Android debug process that closed early
    /// while not rebuilding.
    pub close_grace: Duration,
}

impl Timings {
    pub const fn immediate() -> Self {
        Self {
            adb_settle: Duration::ZERO,
            close_grace: Duration::ZERO,
        }
    }
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            adb_settle: millis_to_duration(ADB_SETTLE_DELAY_MS),
            close_grace: millis_to_duration(CLOSE_GRACE_PERIOD_MS),
        }
    }
}

/// Everything a platform session needs besides the request itself.
#[derive(Clone)]
pub struct SessionContext {
    pub project_path: PathBuf,
    pub gate: VersionGate,
    pub sink: Arc<dyn OutputSink>,
    pub timings: Timings,
    /// Every process spawned through this context is registered here.
    pub disposer: Option<Disposer>,
}

impl SessionContext {
    pub fn new(
        project_path: impl Into<PathBuf>,
        gate: VersionGate,
        sink: Arc<dyn OutputSink>,
    ) -> Self {
        Self {
            project_path: project_path.into(),
            gate,
            sink,
            timings: Timings::default(),
            disposer: None,
        }
    }

    pub fn with_timings(mut self, timings: Timings) -> Self {
        self.timings = timings;
        self
    }

    pub fn with_disposer(mut self, disposer: Disposer) -> Self {
        self.disposer = Some(disposer);
        self
    }

    fn builder(&self) -> CommandBuilder {
        CommandBuilder::new(Some(self.gate.tool_path()))
    }

    /// `run <platform> [--emulator] <forwarded>`; identical for both platforms.
    fn run_command(&self, platform: Platform, request: &LaunchRequest) -> CliCommand {
        self.builder()
            .append_param("run")
            .append_param(platform.name())
            .append_param_if("--emulator", request.emulator)
            .append_params(request.forwarded_args.iter().cloned())
            .build()
    }

    fn spawn(&self, command: &CliCommand) -> Result<ProcessHandle> {
        let handle = process::spawn(command, &self.project_path, self.sink.clone())?;
        if let Some(disposer) = &self.disposer {
            disposer.register(handle.control());
        }
        Ok(handle)
    }
}

/// Operations every platform exposes to the host.
pub trait PlatformSession {
    fn platform_name(&self) -> &'static str;

    /// Build and start the app. Resolves as soon as the CLI is running.
    fn run(&self, request: &LaunchRequest) -> Result<ProcessHandle>;

    /// Start (launch) or connect to (attach) a debuggable app and wait until
    /// a debugger can be attached.
    fn debug(&self, request: &LaunchRequest) -> Result<DebugOutcome>;

    /// Ask the CLI which port the app's debugger listens on.
    fn debug_port(&self, request: &LaunchRequest) -> Result<u16>;
}

/// The closed set of supported platforms.
#[derive(Clone)]
pub enum Session {
    Ios(IosSession),
    Android(AndroidSession),
}

impl Session {
    pub fn new(platform: Platform, ctx: SessionContext) -> Self {
        match platform {
            Platform::Ios => Session::Ios(IosSession::new(ctx)),
            Platform::Android => Session::Android(AndroidSession::new(ctx)),
        }
    }

    pub fn platform(&self) -> Platform {
        match self {
            Session::Ios(_) => Platform::Ios,
            Session::Android(_) => Platform::Android,
        }
    }
}

impl PlatformSession for Session {
    fn platform_name(&self) -> &'static str {
        match self {
            Session::Ios(s) => s.platform_name(),
            Session::Android(s) => s.platform_name(),
        }
    }

    fn run(&self, request: &LaunchRequest) -> Result<ProcessHandle> {
        match self {
            Session::Ios(s) => s.run(request),
            Session::Android(s) => s.run(request),
        }
    }

    fn debug(&self, request: &LaunchRequest) -> Result<DebugOutcome> {
        match self {
            Session::Ios(s) => s.debug(request),
            Session::Android(s) => s.debug(request),
        }
    }

    fn debug_port(&self, request: &LaunchRequest) -> Result<u16> {
        match self {
            Session::Ios(s) => s.debug_port(request),
            Session::Android(s) => s.debug_port(request),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
