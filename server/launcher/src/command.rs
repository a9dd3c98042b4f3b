//! NativeScript CLI command lines.
//!
//! The CLI is flag-order sensitive, so arguments are kept exactly in the
//! order they were appended.

use std::fmt;

use crate::constants::DEFAULT_TOOL;

/// A finished CLI invocation: program path plus ordered arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliCommand {
    pub path: String,
    pub args: Vec<String>,
}

impl CliCommand {
    /// Space-joined command line, as handed to the shell.
    pub fn to_command_line(&self) -> String {
        format!("{} {}", self.path, self.args.join(" "))
    }
}

impl fmt::Display for CliCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_command_line())
    }
}

/// Builds a [`CliCommand`] argument by argument.
///
/// The finished command line is handed to the shell verbatim: neither the
/// tool path nor the arguments are quoted. A path with spaces or an argument
/// like `'iPhone 15'` must carry its own shell quoting.
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    path: String,
    args: Vec<String>,
}

impl CommandBuilder {
    /// Start a command for `tool_path`, or the default `tns` when none is configured.
    pub fn new(tool_path: Option<&str>) -> Self {
        Self {
            path: tool_path.unwrap_or(DEFAULT_TOOL).to_string(),
            args: Vec::new(),
        }
    }

    pub fn append_param(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn append_param_if(self, arg: impl Into<String>, condition: bool) -> Self {
        if condition {
            self.append_param(arg)
        } else {
            self
        }
    }

    pub fn append_params<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn build(self) -> CliCommand {
        CliCommand {
            path: self.path,
            args: self.args,
        }
    }

    /// Only used for diagnostic and version-probe invocations.
    pub fn build_as_string(self) -> String {
        self.build().to_command_line()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tool_path() {
        let cmd = CommandBuilder::new(None).append_param("--version").build();
        assert_eq!(cmd.path, "tns");
        assert_eq!(cmd.args, vec!["--version"]);
    }

    #[test]
    fn test_argument_order_follows_call_order() {
        for (start, brk, no_rebuild) in [
            (false, false, false),
            (true, false, true),
            (false, true, true),
            (true, true, false),
        ] {
            let cmd = CommandBuilder::new(Some("/opt/tns"))
                .append_param("debug")
                .append_param("ios")
                .append_param_if("--start", start)
                .append_param_if("--debug-brk", brk)
                .append_param_if("--no-rebuild", no_rebuild)
                .append_param("--no-client")
                .build();

            let mut expected = vec!["debug", "ios"];
            if start {
                expected.push("--start");
            }
            if brk {
                expected.push("--debug-brk");
            }
            if no_rebuild {
                expected.push("--no-rebuild");
            }
            expected.push("--no-client");
            assert_eq!(cmd.args, expected);
        }
    }

    #[test]
    fn test_append_params_keeps_order() {
        let cmd = CommandBuilder::new(None)
            .append_param("run")
            .append_params(["--device", "emulator-5554"])
            .append_param("--release")
            .build();
        assert_eq!(cmd.args, vec!["run", "--device", "emulator-5554", "--release"]);
    }

    #[test]
    fn test_build_as_string() {
        let line = CommandBuilder::new(Some("tns"))
            .append_param("debug")
            .append_param("android")
            .append_param("--get-port")
            .build_as_string();
        assert_eq!(line, "tns debug android --get-port");

        // The separator is kept even without arguments; the shell ignores it.
        assert_eq!(CommandBuilder::new(Some("tns")).build_as_string(), "tns ");
    }

    #[test]
    fn test_command_line_is_not_requoted() {
        let line = CommandBuilder::new(Some("'/Users/x/My Tools/tns'"))
            .append_param("run")
            .append_param("--device")
            .append_param("'iPhone 15'")
            .build_as_string();
        assert_eq!(line, "'/Users/x/My Tools/tns' run --device 'iPhone 15'");
    }
}
