//! Launcher mode orchestration.
//!
//! Turns the parsed [`Args`] into a debug request and a platform session,
//! runs the requested operation and reports its outcome to the host as one
//! JSON object per line on stdout.

use anyhow::{anyhow, Context, Result};
use log::{info, warn};
use serde::Serialize;
use std::io::{self, Write};
use std::sync::Arc;
use std::thread;

use crate::logging::{LogSink, OutputSink};
use crate::platform::{DebugReady, Platform, PlatformSession, Session, SessionContext};
use crate::process::{detect_tool, Disposer, ProcessHandle};
use crate::request::LaunchRequest;
use crate::version::{VersionCache, VersionGate, VersionState};
use crate::{Args, Mode};

// ============================================================================
// Host Events
// ============================================================================

/// Messages written to stdout for the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum LauncherEvent {
    #[serde(rename_all = "camelCase")]
    Probe {
        tool_path: String,
        installed: Option<String>,
        minimum: String,
        compatible: bool,
        message: Option<String>,
    },
    Started { pid: u32, command: String },
    #[serde(rename_all = "camelCase")]
    Ready {
        platform: Platform,
        socket_path: Option<String>,
        pid: Option<u32>,
    },
    Port { port: u16 },
    Exited { code: Option<i32>, signal: Option<i32> },
    Error { kind: String, message: String },
}

pub fn emit(out: &mut dyn Write, event: &LauncherEvent) -> Result<()> {
    let line = serde_json::to_string(event).context("failed to encode launcher event")?;
    writeln!(out, "{line}")?;
    out.flush()?;
    Ok(())
}

// ============================================================================
// Request & Session Setup
// ============================================================================

/// Load the request file, if any, and apply command-line overrides.
pub fn load_request(args: &Args) -> Result<LaunchRequest> {
    let mut request = match &args.request {
        Some(path) => LaunchRequest::from_file(path)
            .with_context(|| format!("failed to load debug request {}", path.display()))?,
        None => LaunchRequest::default(),
    };

    if let Some(kind) = args.kind {
        request.request = kind;
    }
    if let Some(platform) = args.platform {
        request.platform = Some(platform);
    }
    if let Some(tool) = &args.tns_path {
        request.tool_path = Some(tool.clone());
    }
    if let Some(project) = &args.project {
        request.project_path = Some(project.clone());
    }
    request.forwarded_args.extend(args.forwarded.iter().cloned());
    Ok(request)
}

pub fn create_session(
    request: &LaunchRequest,
    cache: Arc<VersionCache>,
    disposer: Option<Disposer>,
) -> Result<Session> {
    let platform = request.platform.ok_or_else(|| {
        anyhow!("no platform given; pass --platform or set \"platform\" in the request")
    })?;

    let project = match &request.project_path {
        Some(path) => path.clone(),
        None => std::env::current_dir().context("failed to resolve project directory")?,
    };

    let gate = VersionGate::new(detect_tool(request.tool_path.as_deref()), cache);
    let sink: Arc<dyn OutputSink> = match &request.tool_output {
        Some(path) => Arc::new(LogSink::with_mirror(path)),
        None => Arc::new(LogSink::new()),
    };

    let mut ctx = SessionContext::new(project, gate, sink);
    if let Some(disposer) = disposer {
        ctx = ctx.with_disposer(disposer);
    }
    Ok(Session::new(platform, ctx))
}

pub fn probe(gate: &VersionGate) -> LauncherEvent {
    let state = gate.evaluate();
    LauncherEvent::Probe {
        tool_path: gate.tool_path().to_string(),
        installed: gate.installed_version().map(|v| v.to_string()),
        minimum: gate.minimum_supported_version().to_string(),
        compatible: state == VersionState::Compatible,
        message: gate.error_message(),
    }
}

// ============================================================================
// Process Supervision
// ============================================================================

/// Dispose of every CLI process once the host closes our stdin.
///
/// Started before anything is spawned, so closing stdin also cancels a build
/// or a readiness wait that is still in progress.
fn watch_stdin() -> Result<Disposer> {
    let disposer = Disposer::new();
    let watched = disposer.clone();
    thread::Builder::new()
        .name("stdin-watch".into())
        .spawn(move || {
            if let Err(e) = io::copy(&mut io::stdin().lock(), &mut io::sink()) {
                warn!("reading stdin failed: {e}");
            }
            info!("stdin closed, stopping the NativeScript CLI");
            watched.dispose();
        })
        .context("failed to spawn stdin watcher thread")?;
    Ok(disposer)
}

/// Wait for the CLI to exit, report it, and return its exit code.
fn supervise(handle: ProcessHandle, out: &mut dyn Write) -> Result<i32> {
    let exit = handle.wait();
    info!("`{}` exited ({})", handle.command_line(), exit);
    emit(
        out,
        &LauncherEvent::Exited {
            code: exit.code,
            signal: exit.signal,
        },
    )?;
    Ok(exit.code.unwrap_or(1))
}

// ============================================================================
// Entry Point
// ============================================================================

/// Run the mode selected in `args`, writing host events to `out`.
/// Returns the process exit code for the launcher.
pub fn execute(args: &Args, out: &mut dyn Write) -> Result<i32> {
    let request = load_request(args)?;
    let cache = Arc::new(VersionCache::new());
    let disposer = if args.watch_stdin && args.mode != Mode::Probe {
        Some(watch_stdin()?)
    } else {
        None
    };

    match args.mode {
        Mode::Probe => {
            let gate = VersionGate::new(detect_tool(request.tool_path.as_deref()), cache);
            let event = probe(&gate);
            let compatible = matches!(event, LauncherEvent::Probe { compatible: true, .. });
            emit(out, &event)?;
            Ok(if compatible { 0 } else { 1 })
        }
        Mode::Run => {
            let session = create_session(&request, cache, disposer)?;
            let mut handle = session.run(&request)?;
            // Output still reaches the log; nobody waits for markers here.
            handle.detach();
            emit(
                out,
                &LauncherEvent::Started {
                    pid: handle.pid(),
                    command: handle.command_line().to_string(),
                },
            )?;
            supervise(handle, out)
        }
        Mode::Debug => {
            let session = create_session(&request, cache, disposer)?;
            let outcome = session.debug(&request)?;
            let socket_path = match outcome.ready {
                DebugReady::Socket(path) => Some(path),
                DebugReady::Ready => None,
            };
            emit(
                out,
                &LauncherEvent::Ready {
                    platform: session.platform(),
                    socket_path,
                    pid: outcome.process.as_ref().map(|p| p.pid()),
                },
            )?;
            match outcome.process {
                Some(handle) => supervise(handle, out),
                None => Ok(0),
            }
        }
        Mode::Port => {
            let session = create_session(&request, cache, disposer)?;
            let port = session.debug_port(&request)?;
            emit(out, &LauncherEvent::Port { port })?;
            Ok(0)
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
