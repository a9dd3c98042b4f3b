//! NativeScript debug launcher library.
//!
//! This crate provides the ns_launcher binary that Zed's NativeScript
//! extension shells out to. It drives the NativeScript CLI and turns its
//! textual output into readiness signals a debug adapter can act on.
//!
//! # Architecture
//!
//! ```text
//! Zed <-> ns_launcher --mode debug <-> sh -c "tns debug <platform> ..."
//!              |                              |
//!              +-- JSON events on stdout      +-- stdout scanned for markers
//! ```
//!
//! # Modules
//!
//! - [`command`]: Ordered CLI command lines
//! - [`constants`]: Readiness markers, timing and CLI defaults
//! - [`error`]: Launch error taxonomy
//! - [`logging`]: Timestamps and the CLI output channel
//! - [`orchestrator`]: Mode dispatch and JSON events for the host
//! - [`platform`]: iOS and Android run/debug flows
//! - [`process`]: CLI discovery, spawning and termination
//! - [`request`]: Debug request configuration
//! - [`scanner`]: Readiness marker predicates
//! - [`version`]: CLI version gate

use clap::Parser;
use std::path::PathBuf;

pub mod command;
pub mod constants;
pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod platform;
pub mod process;
pub mod request;
pub mod scanner;
pub mod version;

// ============================================================================
// CLI Types (shared between main.rs and modules)
// ============================================================================

/// NativeScript debug launcher arguments.
#[derive(Parser, Debug, Default)]
#[command(
    name = "ns_launcher",
    version,
    about = "Drive the NativeScript CLI for Zed debug sessions"
)]
pub struct Args {
    /// Launcher mode
    #[arg(long, value_enum, default_value_t = Mode::Probe)]
    pub mode: Mode,

    /// Target platform (overrides the request's "platform")
    #[arg(long, value_enum)]
    pub platform: Option<Platform>,

    /// Debug request JSON file (launch.json-style configuration)
    #[arg(long, value_name = "FILE")]
    pub request: Option<PathBuf>,

    /// Request kind (overrides the request's "request")
    #[arg(long, value_enum)]
    pub kind: Option<RequestKind>,

    /// Path to the NativeScript CLI (overrides detection)
    #[arg(long)]
    pub tns_path: Option<String>,

    /// Project directory (defaults to the request's appRoot, then the cwd)
    #[arg(long)]
    pub project: Option<PathBuf>,

    /// Log filter for launcher diagnostics (e.g. error, warn, info, debug)
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Terminate the CLI once stdin is closed by the host
    #[arg(long)]
    pub watch_stdin: bool,

    /// Extra arguments forwarded to the CLI after `--`
    #[arg(last = true)]
    pub forwarded: Vec<String>,
}

/// Launcher operation mode.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, clap::ValueEnum)]
pub enum Mode {
    /// Check the installed CLI version and print JSON
    #[default]
    Probe,
    /// `tns run <platform>` until it exits
    Run,
    /// Start or attach a debuggable app and report readiness
    Debug,
    /// Report the Android debug port
    Port,
}

// Re-exports for public API
pub use command::{CliCommand, CommandBuilder};
pub use error::{ExitInfo, LaunchError};
pub use logging::{LogSink, MemorySink, OutputSink};
pub use orchestrator::{execute, LauncherEvent};
pub use platform::{DebugOutcome, DebugReady, Platform, PlatformSession, Session, SessionContext};
pub use process::{spawn, Disposer, ProcessControl, ProcessEvent, ProcessHandle};
pub use request::{LaunchRequest, RequestKind};
pub use version::{Version, VersionCache, VersionGate, VersionState};
