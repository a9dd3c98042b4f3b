//! Debug request configuration, as sent by the editor's debug adapter.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{LaunchError, Result};
use crate::platform::Platform;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    #[default]
    Launch,
    Attach,
}

/// A `launch` or `attach` debug request.
///
/// Field names follow the debug configuration JSON; the older `tns*` and
/// `appRoot` spellings are accepted as aliases.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LaunchRequest {
    pub request: RequestKind,
    pub platform: Option<Platform>,
    #[serde(alias = "appRoot")]
    pub project_path: Option<PathBuf>,
    pub rebuild: bool,
    pub stop_on_entry: bool,
    pub sync_all_files: bool,
    pub emulator: bool,
    #[serde(alias = "tnsPath")]
    pub tool_path: Option<String>,
    #[serde(alias = "tnsArgs")]
    pub forwarded_args: Vec<String>,
    /// File that receives a copy of everything the CLI prints.
    #[serde(alias = "tnsOutput")]
    pub tool_output: Option<PathBuf>,
}

impl LaunchRequest {
    pub fn launch() -> Self {
        Self::default()
    }

    pub fn attach() -> Self {
        Self {
            request: RequestKind::Attach,
            ..Self::default()
        }
    }

    pub fn is_launch(&self) -> bool {
        self.request == RequestKind::Launch
    }

    pub fn is_attach(&self) -> bool {
        self.request == RequestKind::Attach
    }

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| LaunchError::InvalidRequest(e.to_string()))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }
}
