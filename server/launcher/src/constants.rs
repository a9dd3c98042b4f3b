//! Centralized constants for ns_launcher markers, timing, and CLI defaults.
//!
//! This module contains the readiness markers the NativeScript CLI prints, the
//! delays used while waiting on it, and the defaults used when no explicit
//! configuration is given.

use std::time::Duration;

// ============================================================================
// CLI Defaults
// ============================================================================

/// Program name used when no tool path is configured.
pub const DEFAULT_TOOL: &str = "tns";

/// Newer CLI releases also ship the shorter `ns` alias.
pub const FALLBACK_TOOL: &str = "ns";

/// Environment variable that overrides tool detection.
pub const TOOL_PATH_ENV: &str = "NS_TNS_PATH";

/// Oldest CLI release whose flags and output this launcher understands.
pub const MIN_SUPPORTED_VERSION: (u32, u32, u32) = (2, 5, 0);

// ============================================================================
// Readiness Markers
// ============================================================================

/// Literal prefix preceding the iOS debugger socket path.
pub const SOCKET_PREFIX: &str = "socket-file-location: ";

/// Printed once the app files were pushed to the device.
pub const SYNCED_MARKER: &str = "Successfully synced application";

/// Printed by the Android debug flow once the debugger is listening.
pub const DEBUGGER_STARTED_MARKER: &str = "# NativeScript Debugger started #";

// ============================================================================
// Timing
// ============================================================================

/// Delay after the Android debugger marker so adb can forward the debug socket.
pub const ADB_SETTLE_DELAY_MS: u64 = 500;

/// Grace period before reporting an Android debug process that closed early
/// while not rebuilding.
pub const CLOSE_GRACE_PERIOD_MS: u64 = 3_000;

/// SIGTERM grace period before forceful termination
pub const SIGTERM_GRACE_PERIOD: Duration = Duration::from_secs(2);

/// How long output may keep flowing after the CLI was reaped.
pub const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Size of the buffer used for each raw output read.
pub const READ_CHUNK_SIZE: usize = 8 * 1024;

// ============================================================================
// Helper Functions
// ============================================================================

/// Convert milliseconds to Duration (const fn for compile-time evaluation)
pub const fn millis_to_duration(ms: u64) -> Duration {
    Duration::from_millis(ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_millis_to_duration() {
        assert_eq!(millis_to_duration(100), Duration::from_millis(100));
        assert_eq!(millis_to_duration(0), Duration::from_millis(0));
    }

    #[test]
    fn test_grace_period_outlasts_settle_delay() {
        assert!(CLOSE_GRACE_PERIOD_MS > ADB_SETTLE_DELAY_MS);
        assert!(SIGTERM_GRACE_PERIOD >= Duration::from_secs(1));
    }
}
