use clap::Parser;
use log::error;
use std::io::{self, Write};

use ns_launcher::orchestrator::{emit, execute, LauncherEvent};
use ns_launcher::{Args, LaunchError};

fn init_logging(args: &Args) {
    // Diagnostics go to stderr; stdout carries JSON events for the host.
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if let Some(level) = &args.log_level {
        builder.parse_filters(level);
    }
    builder.format_timestamp_millis().init();
}

fn main() {
    let args = Args::parse();
    init_logging(&args);

    let stdout = io::stdout();
    let mut out = stdout.lock();

    let code = match execute(&args, &mut out) {
        Ok(code) => code,
        Err(e) => {
            error!("{e:#}");
            let kind = e
                .downcast_ref::<LaunchError>()
                .map(LaunchError::kind)
                .unwrap_or("launcher");
            let event = LauncherEvent::Error {
                kind: kind.to_string(),
                message: e.to_string(),
            };
            if let Err(e) = emit(&mut out, &event) {
                error!("failed to report error to host: {e:#}");
            }
            1
        }
    };

    let _ = out.flush();
    std::process::exit(code);
}
