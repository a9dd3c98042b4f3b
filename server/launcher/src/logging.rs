//! Logging utilities for ns_launcher.
//!
//! Provides timestamp generation and the diagnostics channel that receives the
//! NativeScript CLI's own output, kept apart from the launcher's diagnostics.

use log::{error, info, warn};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

/// Log target used for text produced by the CLI itself.
pub const TOOL_LOG_TARGET: &str = "tns";

// ============================================================================
// Timestamp Generation
// ============================================================================

/// Generate a timestamp string in format "YYYY-MM-DD HH:MM:SS.mmm".
/// Uses libc for local time conversion to avoid heavy chrono dependency.
pub fn timestamp() -> String {
    use libc::{localtime_r, strftime, time_t, tm};
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0));
    let secs = now.as_secs() as time_t;
    let millis = now.subsec_millis();

    // SAFETY: localtime_r is thread-safe (uses caller-provided tm struct)
    let mut tm: tm = unsafe { std::mem::zeroed() };
    unsafe {
        localtime_r(&secs, &mut tm);
    }

    let mut buf = [0u8; 32];
    let fmt = b"%Y-%m-%d %H:%M:%S\0";
    // SAFETY: strftime writes to our buffer, format string is null-terminated
    let len = unsafe {
        strftime(
            buf.as_mut_ptr() as *mut libc::c_char,
            buf.len(),
            fmt.as_ptr() as *const libc::c_char,
            &tm,
        )
    };
    let prefix = std::str::from_utf8(&buf[..len]).unwrap_or("1970-01-01 00:00:00");
    format!("{prefix}.{millis:03}")
}

// ============================================================================
// Diagnostics Channel
// ============================================================================

/// Receives CLI output chunks as they are read from the child process.
pub trait OutputSink: Send + Sync {
    /// A chunk of the CLI's standard output.
    fn tool_output(&self, text: &str);

    /// A chunk of the CLI's standard error.
    fn tool_error(&self, text: &str);
}

/// Non-empty lines of a chunk, without line terminators.
fn lines(text: &str) -> impl Iterator<Item = &str> {
    text.lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.is_empty())
}

/// Production sink: forwards CLI output to the `log` facade under the `tns`
/// target and optionally mirrors the raw text into a file.
#[derive(Debug, Default)]
pub struct LogSink {
    mirror: Option<Mutex<File>>,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also append every chunk to `path`. Failing to open it is not fatal.
    pub fn with_mirror(path: &Path) -> Self {
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(mut file) => {
                let _ = writeln!(file, "--- ns_launcher {} ---", timestamp());
                Self {
                    mirror: Some(Mutex::new(file)),
                }
            }
            Err(e) => {
                warn!("failed to open tns output file {}: {}", path.display(), e);
                Self::new()
            }
        }
    }

    fn mirror(&self, text: &str) {
        if let Some(ref file) = self.mirror {
            let mut file = file.lock().unwrap_or_else(|e| e.into_inner());
            let _ = file.write_all(text.as_bytes());
        }
    }
}

impl OutputSink for LogSink {
    fn tool_output(&self, text: &str) {
        for line in lines(text) {
            info!(target: TOOL_LOG_TARGET, "{}", line);
        }
        self.mirror(text);
    }

    fn tool_error(&self, text: &str) {
        for line in lines(text) {
            error!(target: TOOL_LOG_TARGET, "{}", line);
        }
        self.mirror(text);
    }
}

/// Which stream a captured chunk came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

/// Keeps every chunk in memory, tagged with its stream, for inspection after
/// the CLI ran.
#[derive(Debug, Default)]
pub struct MemorySink {
    chunks: Mutex<Vec<(Stream, String)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chunks(&self) -> Vec<(Stream, String)> {
        self.chunks.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// All text captured from one stream, concatenated.
    pub fn text(&self, stream: Stream) -> String {
        self.chunks()
            .into_iter()
            .filter(|(s, _)| *s == stream)
            .map(|(_, text)| text)
            .collect()
    }

    fn push(&self, stream: Stream, text: &str) {
        self.chunks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((stream, text.to_string()));
    }
}

impl OutputSink for MemorySink {
    fn tool_output(&self, text: &str) {
        self.push(Stream::Stdout, text);
    }

    fn tool_error(&self, text: &str) {
        self.push(Stream::Stderr, text);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_format() {
        let ts = timestamp();
        // Should be in format "YYYY-MM-DD HH:MM:SS.mmm"
        assert!(ts.len() >= 23, "timestamp too short: {}", ts);
        assert!(ts.contains('-'), "timestamp missing date separator: {}", ts);
        assert!(ts.contains(':'), "timestamp missing time separator: {}", ts);
        assert!(ts.contains('.'), "timestamp missing milliseconds: {}", ts);
    }

    #[test]
    fn test_lines_skips_blank_and_crlf() {
        let collected: Vec<&str> = lines("one\r\n\r\ntwo\nthree").collect();
        assert_eq!(collected, vec!["one", "two", "three"]);
    }

    #[test]
    fn test_mirror_file_receives_raw_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tns_output.log");
        let sink = LogSink::with_mirror(&path);
        sink.tool_output("Project successfully prepared\n");
        sink.tool_error("WARNING: no device\n");
        drop(sink);

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("--- ns_launcher "));
        assert!(content.contains("Project successfully prepared\n"));
        assert!(content.contains("WARNING: no device\n"));
    }

    #[test]
    fn test_memory_sink_separates_streams() {
        let sink = MemorySink::new();
        sink.tool_output("a");
        sink.tool_error("b");
        sink.tool_output("c");
        assert_eq!(sink.text(Stream::Stdout), "ac");
        assert_eq!(sink.text(Stream::Stderr), "b");
        assert_eq!(sink.chunks().len(), 3);
    }
}
