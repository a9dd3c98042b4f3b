//! Process lifecycle management for ns_launcher.
//!
//! Handles NativeScript CLI discovery, spawning through the shell, forwarding
//! of the child's output, and termination on behalf of the host.

use anyhow::{anyhow, Result as AnyResult};
use log::{debug, warn};
use std::io::{ErrorKind, Read};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::Duration;

use crate::command::CliCommand;
use crate::constants::*;
use crate::error::{ExitInfo, LaunchError, Result};
use crate::logging::{OutputSink, Stream};

// ============================================================================
// Safe Signal Wrapper
// ============================================================================

/// Safe wrappers around libc signal operations.
/// All unsafe code is isolated here with SAFETY documentation.
#[cfg(unix)]
pub mod signal {
    use std::io;

    /// Signal every process in the group led by `pgid`.
    fn send_group(pgid: u32, sig: libc::c_int) -> io::Result<()> {
        // SAFETY: kill has no memory-safety preconditions; a negative pid
        // addresses the process group, failures are reported through errno.
        let result = unsafe { libc::kill(-(pgid as i32), sig) };
        if result == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }

    /// Send SIGTERM to the whole group for graceful termination.
    pub fn terminate_group(pgid: u32) -> io::Result<()> {
        send_group(pgid, libc::SIGTERM)
    }

    /// Send SIGKILL to the whole group for immediate termination.
    pub fn kill_group(pgid: u32) -> io::Result<()> {
        send_group(pgid, libc::SIGKILL)
    }
}

// ============================================================================
// Tool Detection
// ============================================================================

/// Resolve the NativeScript CLI executable.
/// Checks: explicit path, NS_TNS_PATH env, `tns` and `ns` on PATH, then bare `tns`.
pub fn detect_tool(explicit: Option<&str>) -> String {
    if let Some(path) = explicit.filter(|p| !p.trim().is_empty()) {
        return path.to_string();
    }

    if let Ok(env_path) = std::env::var(TOOL_PATH_ENV) {
        if !env_path.trim().is_empty() {
            debug!("using NativeScript CLI from {}={}", TOOL_PATH_ENV, env_path);
            return env_path;
        }
    }

    for name in [DEFAULT_TOOL, FALLBACK_TOOL] {
        if let Ok(path) = which::which(name) {
            return path.display().to_string();
        }
    }

    // Leave it to the shell; the version gate reports a missing CLI.
    DEFAULT_TOOL.to_string()
}

// ============================================================================
// Spawning
// ============================================================================

/// Build a command that runs `line` through the platform shell.
pub fn shell_command(line: &str) -> Command {
    #[cfg(windows)]
    {
        let mut cmd = Command::new("cmd");
        cmd.arg("/C").arg(line);
        cmd
    }
    #[cfg(not(windows))]
    {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(line);
        cmd
    }
}

/// Notifications from a running CLI process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    /// A raw chunk of standard output. Chunks are not aligned to lines.
    Stdout(String),
    /// Sent exactly once, after both output streams closed and the child was reaped.
    Exited(ExitInfo),
}

#[derive(Debug, Default)]
struct ExitState {
    status: Mutex<Option<ExitInfo>>,
    done: Condvar,
}

impl ExitState {
    fn set(&self, info: ExitInfo) {
        let mut status = self.status.lock().unwrap_or_else(|e| e.into_inner());
        *status = Some(info);
        self.done.notify_all();
    }

    fn get(&self) -> Option<ExitInfo> {
        *self.status.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Block until the process exits, or until `timeout` elapses.
    fn wait(&self, timeout: Option<Duration>) -> Option<ExitInfo> {
        let status = self.status.lock().unwrap_or_else(|e| e.into_inner());
        match timeout {
            None => {
                let status = self
                    .done
                    .wait_while(status, |s| s.is_none())
                    .unwrap_or_else(|e| e.into_inner());
                *status
            }
            Some(timeout) => {
                let (status, _) = self
                    .done
                    .wait_timeout_while(status, timeout, |s| s.is_none())
                    .unwrap_or_else(|e| e.into_inner());
                *status
            }
        }
    }
}

/// A spawned CLI process.
///
/// The shell and everything it starts share one process group led by
/// [`ProcessHandle::pid`]. Output keeps flowing to the [`OutputSink`] for the
/// whole life of the process; the event receiver is only needed while someone
/// waits for a readiness marker and can be dropped with
/// [`ProcessHandle::detach`].
#[derive(Debug)]
pub struct ProcessHandle {
    pid: u32,
    command_line: String,
    events: Option<Receiver<ProcessEvent>>,
    /// Set as soon as the shell is reaped.
    exit: Arc<ExitState>,
    /// Set once the output was drained as well, right before `Exited` is sent.
    done: Arc<ExitState>,
}

impl ProcessHandle {
    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn command_line(&self) -> &str {
        &self.command_line
    }

    pub fn take_events(&mut self) -> Option<Receiver<ProcessEvent>> {
        self.events.take()
    }

    /// Stop listening for events. The process and its logging are unaffected.
    pub fn detach(&mut self) {
        self.events = None;
    }

    /// Block until the process exits and its output reached the sink.
    pub fn wait(&self) -> ExitInfo {
        self.done.wait(None).unwrap_or_default()
    }

    /// A cloneable handle that can stop the process from another thread.
    pub fn control(&self) -> ProcessControl {
        ProcessControl {
            pid: self.pid,
            exit: self.exit.clone(),
        }
    }

    /// Ask the process group to stop, escalating to SIGKILL after a grace period.
    pub fn terminate(&self) -> AnyResult<ExitInfo> {
        self.control().terminate()
    }
}

/// Termination side of a [`ProcessHandle`], without the event receiver.
#[derive(Debug, Clone)]
pub struct ProcessControl {
    pid: u32,
    exit: Arc<ExitState>,
}

impl ProcessControl {
    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn terminate(&self) -> AnyResult<ExitInfo> {
        if let Some(info) = self.exit.get() {
            return Ok(info);
        }

        #[cfg(unix)]
        {
            debug!("sending SIGTERM to process group {}", self.pid);
            if let Err(e) = signal::terminate_group(self.pid) {
                debug!("SIGTERM to process group {} failed: {}", self.pid, e);
            }
            if let Some(info) = self.exit.wait(Some(SIGTERM_GRACE_PERIOD)) {
                return Ok(info);
            }

            warn!(
                "pid {} didn't respond to SIGTERM, using SIGKILL",
                self.pid
            );
            let _ = signal::kill_group(self.pid);
            self.exit
                .wait(Some(SIGTERM_GRACE_PERIOD))
                .ok_or_else(|| anyhow!("pid {} survived SIGKILL", self.pid))
        }
        #[cfg(not(unix))]
        {
            Err(anyhow!(
                "terminating pid {} is not supported on this platform",
                self.pid
            ))
        }
    }
}

// ============================================================================
// Disposal
// ============================================================================

/// Terminates every registered process once disposed. A process registered
/// after disposal is terminated right away.
#[derive(Debug, Clone, Default)]
pub struct Disposer {
    state: Arc<Mutex<DisposerState>>,
}

#[derive(Debug, Default)]
struct DisposerState {
    disposed: bool,
    controls: Vec<ProcessControl>,
}

impl Disposer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, control: ProcessControl) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if !state.disposed {
            state.controls.push(control);
            return;
        }
        drop(state);
        stop(&control);
    }

    pub fn dispose(&self) {
        let controls = {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            state.disposed = true;
            std::mem::take(&mut state.controls)
        };
        for control in &controls {
            stop(control);
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).disposed
    }
}

fn stop(control: &ProcessControl) {
    match control.terminate() {
        Ok(info) => debug!("pid {} stopped ({})", control.pid(), info),
        Err(e) => warn!("{e:#}"),
    }
}

// ============================================================================
// Output Forwarding
// ============================================================================

/// Read raw chunks from a child stream, forwarding each one to the sink and,
/// for stdout, to the event channel while it has a listener.
fn pump_output<R: Read>(
    stream: Stream,
    mut reader: R,
    sink: &dyn OutputSink,
    mut events: Option<Sender<ProcessEvent>>,
) {
    let mut buf = vec![0u8; READ_CHUNK_SIZE];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                debug!("{:?} read failed: {}", stream, e);
                break;
            }
        };

        let text = String::from_utf8_lossy(&buf[..n]).into_owned();
        match stream {
            Stream::Stdout => sink.tool_output(&text),
            Stream::Stderr => sink.tool_error(&text),
        }

        if let Some(tx) = &events {
            if tx.send(ProcessEvent::Stdout(text)).is_err() {
                // Listener detached; keep draining so the child never blocks.
                events = None;
            }
        }
    }
}

/// `drained` is dropped when the stream hits EOF.
fn spawn_reader<R>(
    stream: Stream,
    reader: R,
    sink: Arc<dyn OutputSink>,
    events: Option<Sender<ProcessEvent>>,
    drained: Sender<()>,
) -> std::io::Result<()>
where
    R: Read + Send + 'static,
{
    let name = match stream {
        Stream::Stdout => "tns-stdout-reader",
        Stream::Stderr => "tns-stderr-reader",
    };
    thread::Builder::new()
        .name(name.into())
        .spawn(move || {
            pump_output(stream, reader, sink.as_ref(), events);
            drop(drained);
        })
        .map(|_| ())
}

/// Reap the child, then give the readers a bounded time to reach EOF before
/// reporting the exit.
struct Waiter {
    child: Child,
    drained: Receiver<()>,
    exit: Arc<ExitState>,
    done: Arc<ExitState>,
    events: Sender<ProcessEvent>,
}

impl Waiter {
    fn spawn(self) -> std::io::Result<()> {
        thread::Builder::new()
            .name("tns-waiter".into())
            .spawn(move || self.run())
            .map(|_| ())
    }

    fn run(mut self) {
        let pid = self.child.id();
        let info = match self.child.wait() {
            Ok(status) => ExitInfo::from_status(status),
            Err(e) => {
                warn!("failed to wait for pid {}: {}", pid, e);
                ExitInfo::default()
            }
        };
        debug!("pid {} exited ({})", pid, info);
        self.exit.set(info);

        // Nothing is ever sent; the channel disconnects once both readers hit EOF.
        // Leftover processes outside the group can hold the pipes open.
        if let Err(RecvTimeoutError::Timeout) = self.drained.recv_timeout(OUTPUT_DRAIN_TIMEOUT) {
            warn!(
                "output of pid {} still open {:?} after exit",
                pid, OUTPUT_DRAIN_TIMEOUT
            );
        }
        self.done.set(info);
        let _ = self.events.send(ProcessEvent::Exited(info));
    }
}

/// Start `command` through the shell in `cwd`.
///
/// Output forwarding is wired before this returns, so no early chunk is lost.
/// Returns as soon as the process is started; it does not wait for readiness.
pub fn spawn(
    command: &CliCommand,
    cwd: &Path,
    sink: Arc<dyn OutputSink>,
) -> Result<ProcessHandle> {
    let command_line = command.to_command_line();
    debug!("spawning `{}` in {}", command_line, cwd.display());

    let mut cmd = shell_command(&command_line);
    cmd.current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    // Own process group, so termination reaches everything the shell starts.
    #[cfg(unix)]
    std::os::unix::process::CommandExt::process_group(&mut cmd, 0);

    let mut child = cmd
        .spawn()
        .map_err(|source| LaunchError::SpawnFailed {
            command: command_line.clone(),
            cwd: cwd.to_path_buf(),
            source,
        })?;
    let pid = child.id();

    let (tx, rx) = mpsc::channel();
    let (drained_tx, drained_rx) = mpsc::channel();
    let exit = Arc::new(ExitState::default());
    let done = Arc::new(ExitState::default());

    let wired = (|| -> std::io::Result<()> {
        if let Some(stdout) = child.stdout.take() {
            spawn_reader(
                Stream::Stdout,
                stdout,
                sink.clone(),
                Some(tx.clone()),
                drained_tx.clone(),
            )?;
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_reader(Stream::Stderr, stderr, sink.clone(), None, drained_tx)?;
        }
        Ok(())
    })();

    if let Err(e) = wired {
        let _ = child.kill();
        let _ = child.wait();
        return Err(e.into());
    }
    Waiter {
        child,
        drained: drained_rx,
        exit: exit.clone(),
        done: done.clone(),
        events: tx,
    }
    .spawn()?;

    debug!("spawned pid {}", pid);
    Ok(ProcessHandle {
        pid,
        command_line,
        events: Some(rx),
        exit,
        done,
    })
}

// ============================================================================
// Tests
// ============================================================================
