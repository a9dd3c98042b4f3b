//! iOS flows. The CLI only drives iOS builds on macOS.

use log::{debug, info};
use std::sync::mpsc::Receiver;

use super::{DebugOutcome, DebugReady, Platform, PlatformSession, SessionContext};
use crate::command::CliCommand;
use crate::error::{ExitInfo, LaunchError, Result};
use crate::process::{ProcessEvent, ProcessHandle};
use crate::request::LaunchRequest;
use crate::scanner;

const REQUIRED_HOST_OS: &str = "macos";

#[derive(Clone)]
pub struct IosSession {
    ctx: SessionContext,
    host_os: &'static str,
}

impl IosSession {
    pub fn new(ctx: SessionContext) -> Self {
        Self {
            ctx,
            host_os: std::env::consts::OS,
        }
    }

    /// Pretend to run on another host OS.
    pub fn with_host_os(mut self, os: &'static str) -> Self {
        self.host_os = os;
        self
    }

    fn check_preconditions(&self) -> Result<()> {
        if self.host_os != REQUIRED_HOST_OS {
            return Err(LaunchError::PlatformUnsupported {
                platform: "iOS",
                required: "macOS",
            });
        }
        self.ctx.gate.check()
    }

    /// Attach always rebuilds; launch rebuilds only when asked to.
    pub fn rebuild(request: &LaunchRequest) -> bool {
        if request.is_launch() {
            request.rebuild
        } else {
            true
        }
    }

    pub fn debug_command(&self, request: &LaunchRequest) -> CliCommand {
        let launch = request.is_launch();
        let rebuild = Self::rebuild(request);
        self.ctx
            .builder()
            .append_param("debug")
            .append_param(Platform::Ios.name())
            .append_param_if("--emulator", request.emulator)
            .append_param_if("--start", request.is_attach())
            .append_param_if("--debug-brk", launch && request.stop_on_entry)
            .append_param_if("--no-rebuild", !rebuild)
            .append_param_if("--syncAllFiles", launch && !rebuild && request.sync_all_files)
            .append_param("--no-client")
            .append_params(request.forwarded_args.iter().cloned())
            .build()
    }
}

/// Wait for the debugger socket path.
///
/// When rebuilding, the socket alone is enough. Otherwise the app must also
/// report that its files were synced.
pub fn await_socket(events: &Receiver<ProcessEvent>, rebuild: bool) -> Result<String> {
    let mut socket_path: Option<String> = None;
    let mut synced = false;

    for event in events.iter() {
        match event {
            ProcessEvent::Stdout(chunk) => {
                if socket_path.is_none() {
                    socket_path = scanner::socket_opened(&chunk);
                    if let Some(path) = &socket_path {
                        debug!("debugger socket announced at {}", path);
                    }
                }
                if !rebuild && !synced {
                    synced = scanner::app_synced(&chunk);
                }
                if let Some(path) = &socket_path {
                    if rebuild || synced {
                        return Ok(path.clone());
                    }
                }
            }
            ProcessEvent::Exited(info) => return Err(LaunchError::ExitedBeforeReady(info)),
        }
    }
    Err(LaunchError::ExitedBeforeReady(ExitInfo::default()))
}

impl PlatformSession for IosSession {
    fn platform_name(&self) -> &'static str {
        Platform::Ios.name()
    }

    fn run(&self, request: &LaunchRequest) -> Result<ProcessHandle> {
        self.check_preconditions()?;
        let command = self.ctx.run_command(Platform::Ios, request);
        info!("running `{}`", command);
        self.ctx.spawn(&command)
    }

    fn debug(&self, request: &LaunchRequest) -> Result<DebugOutcome> {
        self.check_preconditions()?;
        let command = self.debug_command(request);
        info!("debugging `{}`", command);

        let mut handle = self.ctx.spawn(&command)?;
        let events = handle
            .take_events()
            .ok_or_else(|| LaunchError::ExitedBeforeReady(ExitInfo::default()))?;
        let socket_path = await_socket(&events, Self::rebuild(request))?;

        Ok(DebugOutcome {
            ready: DebugReady::Socket(socket_path),
            process: Some(handle),
        })
    }

    fn debug_port(&self, _request: &LaunchRequest) -> Result<u16> {
        // iOS debugging goes through the socket reported by `debug`.
        Err(LaunchError::OperationUnsupported {
            operation: "debug port lookup",
            platform: "iOS",
        })
    }
}
