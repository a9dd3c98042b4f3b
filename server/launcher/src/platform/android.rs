//! Android flows.

use log::{debug, info};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use super::{DebugOutcome, DebugReady, Platform, PlatformSession, SessionContext, Timings};
use crate::command::CliCommand;
use crate::error::{ExitInfo, LaunchError, Result};
use crate::process::{ProcessEvent, ProcessHandle};
use crate::request::LaunchRequest;
use crate::scanner;

#[derive(Clone)]
pub struct AndroidSession {
    ctx: SessionContext,
}

impl AndroidSession {
    pub fn new(ctx: SessionContext) -> Self {
        Self { ctx }
    }

    pub fn debug_command(&self, request: &LaunchRequest) -> CliCommand {
        self.ctx
            .builder()
            .append_param("debug")
            .append_param(Platform::Android.name())
            .append_param_if("--emulator", request.emulator)
            .append_param_if("--no-rebuild", !request.rebuild)
            .append_param_if("--debug-brk", request.stop_on_entry)
            .append_param("--no-client")
            .append_params(request.forwarded_args.iter().cloned())
            .build()
    }

    pub fn debug_port_command(&self, request: &LaunchRequest) -> CliCommand {
        self.ctx
            .builder()
            .append_param("debug")
            .append_param(Platform::Android.name())
            .append_param("--get-port")
            .append_params(request.forwarded_args.iter().cloned())
            .build()
    }
}

/// Hold the result for `delay` after the debugger marker.
///
/// An exit during the delay only fails the operation when rebuilding; without
/// a rebuild the exit is reported after the longer close grace period, so the
/// settle delay always wins.
fn settle(events: &Receiver<ProcessEvent>, rebuild: bool, delay: Duration) -> Result<()> {
    let deadline = Instant::now() + delay;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Ok(());
        }
        match events.recv_timeout(remaining) {
            Ok(ProcessEvent::Exited(info)) if rebuild => {
                return Err(LaunchError::ExitedBeforeReady(info))
            }
            Ok(_) => {}
            Err(RecvTimeoutError::Timeout) => return Ok(()),
            Err(RecvTimeoutError::Disconnected) => {
                thread::sleep(remaining);
                return Ok(());
            }
        }
    }
}

/// Wait for the Android debugger to report that it started.
pub fn await_debugger_started(
    events: &Receiver<ProcessEvent>,
    rebuild: bool,
    timings: Timings,
) -> Result<()> {
    for event in events.iter() {
        match event {
            ProcessEvent::Stdout(chunk) => {
                if scanner::debug_launched(&chunk) {
                    debug!("debugger started; waiting {:?} for adb", timings.adb_settle);
                    return settle(events, rebuild, timings.adb_settle);
                }
            }
            ProcessEvent::Exited(info) => {
                if !rebuild {
                    thread::sleep(timings.close_grace);
                }
                return Err(LaunchError::ExitedBeforeReady(info));
            }
        }
    }
    Err(LaunchError::ExitedBeforeReady(ExitInfo::default()))
}

/// Wait for the first non-zero debug port printed by `debug android --get-port`.
pub fn await_debug_port(events: &Receiver<ProcessEvent>) -> Result<u16> {
    for event in events.iter() {
        match event {
            ProcessEvent::Stdout(chunk) => {
                if let Some(port) = scanner::debug_port(&chunk) {
                    return Ok(port);
                }
            }
            ProcessEvent::Exited(info) => return Err(LaunchError::PortNotFound(info)),
        }
    }
    Err(LaunchError::PortNotFound(ExitInfo::default()))
}

impl PlatformSession for AndroidSession {
    fn platform_name(&self) -> &'static str {
        Platform::Android.name()
    }

    fn run(&self, request: &LaunchRequest) -> Result<ProcessHandle> {
        self.ctx.gate.check()?;
        let command = self.ctx.run_command(Platform::Android, request);
        info!("running `{}`", command);
        self.ctx.spawn(&command)
    }

    fn debug(&self, request: &LaunchRequest) -> Result<DebugOutcome> {
        self.ctx.gate.check()?;
        if request.is_attach() {
            // Nothing to launch; the debugger connects to the running app.
            return Ok(DebugOutcome {
                ready: DebugReady::Ready,
                process: None,
            });
        }

        let command = self.debug_command(request);
        info!("debugging `{}`", command);

        let mut handle = self.ctx.spawn(&command)?;
        let events = handle
            .take_events()
            .ok_or_else(|| LaunchError::ExitedBeforeReady(ExitInfo::default()))?;
        await_debugger_started(&events, request.rebuild, self.ctx.timings)?;

        Ok(DebugOutcome {
            ready: DebugReady::Ready,
            process: Some(handle),
        })
    }

    fn debug_port(&self, request: &LaunchRequest) -> Result<u16> {
        self.ctx.gate.check()?;
        let command = self.debug_port_command(request);
        info!("looking up debug port with `{}`", command);

        let mut handle = self.ctx.spawn(&command)?;
        let events = handle
            .take_events()
            .ok_or_else(|| LaunchError::PortNotFound(ExitInfo::default()))?;
        let port = await_debug_port(&events)?;
        drop(events);
        info!("debug port {}", port);
        Ok(port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::tests::context_with_version;
    use crate::version::Version;
    use std::sync::mpsc;

    fn exited(code: i32) -> ProcessEvent {
        ProcessEvent::Exited(ExitInfo {
            code: Some(code),
            signal: None,
        })
    }

    fn stdout(text: &str) -> ProcessEvent {
        ProcessEvent::Stdout(text.to_string())
    }

    fn feed(events: Vec<ProcessEvent>) -> Receiver<ProcessEvent> {
        let (tx, rx) = mpsc::channel();
        for event in events {
            tx.send(event).unwrap();
        }
        rx
    }

    fn session() -> AndroidSession {
        AndroidSession::new(context_with_version(Some(Version::new(6, 0, 0))))
    }

    #[test]
    fn test_debug_port_found() {
        let rx = feed(vec![
            stdout("Searching for devices..."),
            stdout("device: 030b258308e6ce89 debug port: 40001"),
            exited(0),
        ]);
        assert_eq!(await_debug_port(&rx).unwrap(), 40001);
    }

    #[test]
    fn test_zero_debug_port_is_skipped() {
        let rx = feed(vec![stdout("debug port: 00000"), stdout("debug port: 40002")]);
        assert_eq!(await_debug_port(&rx).unwrap(), 40002);

        let rx = feed(vec![stdout("debug port: 00000"), exited(4)]);
        match await_debug_port(&rx).unwrap_err() {
            LaunchError::PortNotFound(info) => assert_eq!(info.code, Some(4)),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_debugger_started_resolves() {
        let rx = feed(vec![
            stdout("Project successfully built"),
            stdout("# NativeScript Debugger started #"),
        ]);
        await_debugger_started(&rx, true, Timings::immediate()).unwrap();
    }

    #[test]
    fn test_settle_delay_is_observed() {
        let (tx, rx) = mpsc::channel();
        tx.send(stdout("# NativeScript Debugger started #")).unwrap();
        let timings = Timings {
            adb_settle: Duration::from_millis(50),
            close_grace: Duration::ZERO,
        };

        let start = Instant::now();
        await_debugger_started(&rx, false, timings).unwrap();
        assert!(start.elapsed() >= Duration::from_millis(50));
        drop(tx);
    }

    #[test]
    fn test_exit_during_settle_rejects_when_rebuilding() {
        let rx = feed(vec![stdout("# NativeScript Debugger started #"), exited(2)]);
        let timings = Timings {
            adb_settle: Duration::from_millis(200),
            close_grace: Duration::ZERO,
        };
        assert!(matches!(
            await_debugger_started(&rx, true, timings),
            Err(LaunchError::ExitedBeforeReady(_))
        ));

        let rx = feed(vec![stdout("# NativeScript Debugger started #"), exited(2)]);
        await_debugger_started(&rx, false, timings).unwrap();
    }

    #[test]
    fn test_close_without_rebuild_waits_grace_period() {
        let rx = feed(vec![stdout("Building project..."), exited(1)]);
        let timings = Timings {
            adb_settle: Duration::ZERO,
            close_grace: Duration::from_millis(50),
        };

        let start = Instant::now();
        let err = await_debugger_started(&rx, false, timings).unwrap_err();
        assert!(start.elapsed() >= Duration::from_millis(50));
        assert_eq!(err.to_string(), "The debug process exited unexpectedly code:1");
    }

    #[test]
    fn test_close_when_rebuilding_rejects_immediately() {
        let rx = feed(vec![exited(1)]);
        let timings = Timings {
            adb_settle: Duration::ZERO,
            close_grace: Duration::from_secs(30),
        };
        let start = Instant::now();
        assert!(await_debugger_started(&rx, true, timings).is_err());
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_launch_command_flags() {
        let mut request = LaunchRequest::launch();
        request.stop_on_entry = true;
        request.forwarded_args = vec!["--device".into(), "emulator-5554".into()];
        assert_eq!(
            session().debug_command(&request).args,
            vec![
                "debug",
                "android",
                "--no-rebuild",
                "--debug-brk",
                "--no-client",
                "--device",
                "emulator-5554"
            ]
        );

        request.rebuild = true;
        request.stop_on_entry = false;
        assert_eq!(
            session().debug_command(&request).args,
            vec!["debug", "android", "--no-client", "--device", "emulator-5554"]
        );
    }

    #[test]
    fn test_get_port_command() {
        let mut request = LaunchRequest::attach();
        request.forwarded_args = vec!["--device".into(), "030b258308e6ce89".into()];
        assert_eq!(
            session().debug_port_command(&request).args,
            vec!["debug", "android", "--get-port", "--device", "030b258308e6ce89"]
        );
    }

    #[test]
    fn test_attach_resolves_without_spawning() {
        let outcome = session().debug(&LaunchRequest::attach()).unwrap();
        assert_eq!(outcome.ready, DebugReady::Ready);
        assert!(outcome.process.is_none());
    }

    #[test]
    fn test_version_gate_blocks_before_spawn() {
        let android = AndroidSession::new(context_with_version(None));
        assert!(matches!(
            android.debug_port(&LaunchRequest::attach()),
            Err(LaunchError::ToolNotFound)
        ));
        assert!(matches!(
            android.debug(&LaunchRequest::attach()),
            Err(LaunchError::ToolNotFound)
        ));
    }
}
