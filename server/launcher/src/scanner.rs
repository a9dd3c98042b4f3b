//! Readiness markers in NativeScript CLI output.
//!
//! Every predicate looks at a single stdout chunk and keeps no state; callers
//! latch the first hit themselves. Chunks are whatever the pipe delivered, so
//! a marker split across two chunks is not recognised.

use std::sync::LazyLock;

use regex_lite::Regex;

use crate::constants::{DEBUGGER_STARTED_MARKER, SOCKET_PREFIX, SYNCED_MARKER};

static SOCKET_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"socket-file-location: .*\.sock").expect("valid socket regex"));

static DEBUG_PORT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"debug port: (\d{5})").expect("valid debug port regex"));

/// Path of the iOS debugger socket announced in `chunk`.
pub fn socket_opened(chunk: &str) -> Option<String> {
    SOCKET_PATTERN
        .find(chunk)
        .map(|m| m.as_str()[SOCKET_PREFIX.len()..].to_string())
}

pub fn app_synced(chunk: &str) -> bool {
    chunk.contains(SYNCED_MARKER)
}

pub fn debug_launched(chunk: &str) -> bool {
    chunk.contains(DEBUGGER_STARTED_MARKER)
}

/// Android debug port announced in `chunk`. A port of zero counts as no match.
pub fn debug_port(chunk: &str) -> Option<u16> {
    DEBUG_PORT_PATTERN
        .captures(chunk)
        .and_then(|caps| caps.get(1))
        .and_then(|digits| digits.as_str().parse::<u32>().ok())
        .filter(|port| *port != 0)
        .and_then(|port| u16::try_from(port).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socket_path_extracted() {
        assert_eq!(
            socket_opened("socket-file-location: /tmp/x.sock").as_deref(),
            Some("/tmp/x.sock")
        );
        let chunk = "Setting up debugger proxy...\nsocket-file-location: /Users/dev/dbg.sock\n";
        assert_eq!(socket_opened(chunk).as_deref(), Some("/Users/dev/dbg.sock"));
    }

    #[test]
    fn test_socket_requires_sock_suffix() {
        assert_eq!(socket_opened("socket-file-location: /tmp/x"), None);
        assert_eq!(socket_opened("foo"), None);
    }

    #[test]
    fn test_split_marker_is_not_recognised() {
        assert_eq!(socket_opened("socket-file-loc"), None);
        assert_eq!(socket_opened("ation: /tmp/x.sock"), None);
        assert!(!app_synced("Successfully synced"));
        assert!(!app_synced(" application"));
    }

    #[test]
    fn test_app_synced() {
        assert!(app_synced(
            "Successfully synced application org.nativescript.app on device 1234."
        ));
        assert!(!app_synced("Successfully prepared plugin"));
    }

    #[test]
    fn test_debug_launched() {
        assert!(debug_launched("# NativeScript Debugger started #\n"));
        assert!(!debug_launched("NativeScript Debugger started"));
    }

    #[test]
    fn test_debug_port_parsed() {
        assert_eq!(
            debug_port("device: 030b258308e6ce89 debug port: 40001"),
            Some(40001)
        );
        assert_eq!(debug_port("debug port: 40001\n"), Some(40001));
    }

    #[test]
    fn test_debug_port_zero_is_no_match() {
        assert_eq!(debug_port("debug port: 00000"), None);
    }

    #[test]
    fn test_debug_port_needs_five_digits() {
        assert_eq!(debug_port("debug port: 4000"), None);
        assert_eq!(debug_port("debug port:40001"), None);
        assert_eq!(debug_port("debug port: 99999"), None);
    }
}
