//! NativeScript CLI version detection and compatibility gate.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use log::{debug, warn};

use crate::command::CommandBuilder;
use crate::constants::MIN_SUPPORTED_VERSION;
use crate::error::{LaunchError, Result};
use crate::process::shell_command;

// ============================================================================
// Version
// ============================================================================

/// A `major.minor.subminor` release number, ordered lexicographically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub subminor: u32,
}

impl Version {
    pub const fn new(major: u32, minor: u32, subminor: u32) -> Self {
        Self {
            major,
            minor,
            subminor,
        }
    }

    /// Minimum CLI release the launcher supports.
    pub const fn minimum_supported() -> Self {
        let (major, minor, subminor) = MIN_SUPPORTED_VERSION;
        Self::new(major, minor, subminor)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.subminor)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseVersionError(String);

impl fmt::Display for ParseVersionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "malformed version string: {:?}", self.0)
    }
}

impl std::error::Error for ParseVersionError {}

/// Leading decimal digits of a version component; `0-rc` parses as 0.
fn leading_number(component: &str) -> Option<u32> {
    let end = component
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(component.len());
    component[..end].parse().ok()
}

impl FromStr for Version {
    type Err = ParseVersionError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut parts = s.trim().splitn(3, '.');
        let mut next = || {
            parts
                .next()
                .and_then(leading_number)
                .ok_or_else(|| ParseVersionError(s.to_string()))
        };
        let major = next()?;
        let minor = next()?;
        let subminor = next()?;
        Ok(Self::new(major, minor, subminor))
    }
}

// ============================================================================
// Installed Version Cache
// ============================================================================

/// Lazily populated, first-write-wins cache of the installed CLI version.
///
/// A failed probe is cached as `None` just like a successful one; nothing is
/// retried until [`VersionCache::invalidate`] is called.
#[derive(Debug, Default)]
pub struct VersionCache {
    slot: Mutex<Option<Option<Version>>>,
}

impl VersionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_init(&self, probe: impl FnOnce() -> Option<Version>) -> Option<Version> {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(cached) = *slot {
            return cached;
        }
        let value = probe();
        *slot = Some(value);
        value
    }

    /// The cached lookup result, if a lookup already happened.
    pub fn cached(&self) -> Option<Option<Version>> {
        *self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn invalidate(&self) {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        *slot = None;
    }
}

// ============================================================================
// Version Gate
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionState {
    NotInstalled,
    TooOld { installed: Version, minimum: Version },
    Compatible,
}

/// Run `<tool> --version` and parse its trimmed output.
pub fn probe_installed_version(tool_path: &str) -> Option<Version> {
    let line = CommandBuilder::new(Some(tool_path))
        .append_param("--version")
        .build_as_string();

    let output = match shell_command(&line).output() {
        Ok(output) => output,
        Err(e) => {
            debug!("failed to execute `{}`: {}", line, e);
            return None;
        }
    };
    if !output.status.success() {
        debug!("`{}` exited with {}", line, output.status);
        return None;
    }

    let text = String::from_utf8_lossy(&output.stdout);
    match text.trim().parse::<Version>() {
        Ok(version) => Some(version),
        Err(e) => {
            warn!("{}", e);
            None
        }
    }
}

#[derive(Debug, Clone)]
pub struct VersionGate {
    tool_path: String,
    minimum: Version,
    cache: Arc<VersionCache>,
}

impl VersionGate {
    pub fn new(tool_path: impl Into<String>, cache: Arc<VersionCache>) -> Self {
        Self {
            tool_path: tool_path.into(),
            minimum: Version::minimum_supported(),
            cache,
        }
    }

    pub fn with_minimum(mut self, minimum: Version) -> Self {
        self.minimum = minimum;
        self
    }

    pub fn tool_path(&self) -> &str {
        &self.tool_path
    }

    pub fn installed_version(&self) -> Option<Version> {
        self.cache
            .get_or_init(|| probe_installed_version(&self.tool_path))
    }

    pub fn minimum_supported_version(&self) -> Version {
        self.minimum
    }

    pub fn evaluate(&self) -> VersionState {
        let minimum = self.minimum_supported_version();
        match self.installed_version() {
            None => VersionState::NotInstalled,
            Some(installed) if installed < minimum => {
                VersionState::TooOld { installed, minimum }
            }
            Some(_) => VersionState::Compatible,
        }
    }

    pub fn check(&self) -> Result<()> {
        match self.evaluate() {
            VersionState::NotInstalled => Err(LaunchError::ToolNotFound),
            VersionState::TooOld { installed, minimum } => {
                Err(LaunchError::ToolVersionTooOld { installed, minimum })
            }
            VersionState::Compatible => Ok(()),
        }
    }

    /// Human readable reason the CLI can't be used, if any.
    pub fn error_message(&self) -> Option<String> {
        self.check().err().map(|e| e.to_string())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn gate_with(installed: Option<Version>) -> VersionGate {
        let cache = Arc::new(VersionCache::new());
        cache.get_or_init(|| installed);
        VersionGate::new("tns", cache)
    }

    #[test]
    fn test_parse_plain_version() {
        assert_eq!("2.5.0".parse::<Version>().unwrap(), Version::new(2, 5, 0));
        assert_eq!(
            " 6.5.1\n".parse::<Version>().unwrap(),
            Version::new(6, 5, 1)
        );
    }

    #[test]
    fn test_parse_prerelease_suffix() {
        assert_eq!(
            "6.0.0-rc.1".parse::<Version>().unwrap(),
            Version::new(6, 0, 0)
        );
    }

    #[test]
    fn test_parse_malformed() {
        assert!("".parse::<Version>().is_err());
        assert!("2.5".parse::<Version>().is_err());
        assert!("v2.5.0".parse::<Version>().is_err());
        assert!("command not found".parse::<Version>().is_err());
    }

    #[test]
    fn test_ordering_is_lexicographic() {
        let ordered = [
            Version::new(1, 9, 9),
            Version::new(2, 0, 0),
            Version::new(2, 4, 10),
            Version::new(2, 5, 0),
            Version::new(2, 5, 1),
            Version::new(10, 0, 0),
        ];
        for pair in ordered.windows(2) {
            assert!(pair[0] < pair[1], "{} < {}", pair[0], pair[1]);
        }
        assert_eq!(Version::new(2, 5, 0), Version::new(2, 5, 0));
    }

    #[test]
    fn test_evaluate_states() {
        assert_eq!(gate_with(None).evaluate(), VersionState::NotInstalled);
        assert_eq!(
            gate_with(Some(Version::new(2, 4, 9))).evaluate(),
            VersionState::TooOld {
                installed: Version::new(2, 4, 9),
                minimum: Version::new(2, 5, 0),
            }
        );
        assert_eq!(
            gate_with(Some(Version::new(2, 5, 0))).evaluate(),
            VersionState::Compatible
        );
        assert_eq!(
            gate_with(Some(Version::new(8, 1, 0))).evaluate(),
            VersionState::Compatible
        );
    }

    #[test]
    fn test_error_message_only_when_incompatible() {
        assert!(gate_with(None)
            .error_message()
            .unwrap()
            .contains("not found"));
        assert!(gate_with(Some(Version::new(1, 0, 0)))
            .error_message()
            .is_some());
        assert!(gate_with(Some(Version::new(3, 0, 0)))
            .error_message()
            .is_none());
    }

    #[test]
    fn test_custom_minimum() {
        let gate = gate_with(Some(Version::new(3, 0, 0))).with_minimum(Version::new(4, 0, 0));
        assert!(matches!(
            gate.check(),
            Err(LaunchError::ToolVersionTooOld { .. })
        ));
    }

    #[test]
    fn test_cache_first_write_wins() {
        let cache = VersionCache::new();
        let calls = Cell::new(0);
        let probe = |v| {
            calls.set(calls.get() + 1);
            v
        };

        assert_eq!(cache.get_or_init(|| probe(None)), None);
        assert_eq!(cache.get_or_init(|| probe(Some(Version::new(9, 9, 9)))), None);
        assert_eq!(calls.get(), 1);
        assert_eq!(cache.cached(), Some(None));

        cache.invalidate();
        assert_eq!(cache.cached(), None);
        assert_eq!(
            cache.get_or_init(|| probe(Some(Version::new(9, 9, 9)))),
            Some(Version::new(9, 9, 9))
        );
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_missing_tool_is_not_installed() {
        let gate = VersionGate::new(
            "/nonexistent/ns_launcher_test_tool",
            Arc::new(VersionCache::new()),
        );
        assert_eq!(gate.installed_version(), None);
        assert_eq!(gate.evaluate(), VersionState::NotInstalled);
    }
}
