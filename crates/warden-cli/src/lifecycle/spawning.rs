//! Server process spawning.
//!
//! Builds the server command line from a [`LaunchRequest`] and the merged
//! arguments, then spawns it with piped output so the pumps can capture it.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use warden_config::{HarnessConfig, MergedArguments};

use super::error::LifecycleError;

/// Harness settings that shape a launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSettings {
    pub ready_marker: String,
    pub usage_banner_prefix: String,
    pub port_flag: String,
    pub workspace_flag: String,
    pub stop_grace: Duration,
}

impl LaunchSettings {
    /// Extracts launch settings from the harness configuration.
    pub fn from_config(config: &HarnessConfig) -> Self {
        Self {
            ready_marker: config.ready_marker().to_owned(),
            usage_banner_prefix: config.usage_banner_prefix().to_owned(),
            port_flag: config.port_flag().to_owned(),
            workspace_flag: config.workspace_flag().to_owned(),
            stop_grace: config.stop_grace(),
        }
    }
}

impl Default for LaunchSettings {
    fn default() -> Self {
        Self::from_config(&HarnessConfig::default())
    }
}

/// Everything needed to start one server process.
#[derive(Debug, Clone)]
pub struct LaunchRequest {
    program: OsString,
    subcommand: Option<String>,
    workspace: PathBuf,
    port: u16,
    output_path: PathBuf,
    environment: Vec<(OsString, OsString)>,
    settings: LaunchSettings,
}

impl LaunchRequest {
    /// Creates a request with default settings and no subcommand.
    pub fn new(
        program: impl Into<OsString>,
        workspace: impl Into<PathBuf>,
        port: u16,
        output_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            program: program.into(),
            subcommand: None,
            workspace: workspace.into(),
            port,
            output_path: output_path.into(),
            environment: Vec::new(),
            settings: LaunchSettings::default(),
        }
    }

    #[must_use]
    pub fn with_subcommand(mut self, subcommand: Option<String>) -> Self {
        self.subcommand = subcommand;
        self
    }

    #[must_use]
    pub fn with_env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.environment.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn with_settings(mut self, settings: LaunchSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn program(&self) -> &OsString {
        &self.program
    }

    pub fn subcommand(&self) -> Option<&str> {
        self.subcommand.as_deref()
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    pub const fn port(&self) -> u16 {
        self.port
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    pub const fn settings(&self) -> &LaunchSettings {
        &self.settings
    }

    /// Arguments passed to the server, excluding the program itself.
    ///
    /// Layout: `[subcommand] <workspace-flag> <workspace> <port-flag> <port>
    /// <merged...>`.
    pub fn server_arguments(&self, merged: &MergedArguments) -> Vec<OsString> {
        let mut arguments = Vec::with_capacity(merged.len() + 5);
        if let Some(subcommand) = &self.subcommand {
            arguments.push(OsString::from(subcommand));
        }
        arguments.push(OsString::from(&self.settings.workspace_flag));
        arguments.push(self.workspace.clone().into_os_string());
        arguments.push(OsString::from(&self.settings.port_flag));
        arguments.push(OsString::from(self.port.to_string()));
        arguments.extend(merged.tokens().iter().map(OsString::from));
        arguments
    }
}

/// Spawns the server with piped output and closed stdin.
///
/// On Unix the server leads a new process group so shutdown reaches any
/// workers it forks. Spawn failures are fatal and never retried.
pub(super) fn spawn_server(
    request: &LaunchRequest,
    merged: &MergedArguments,
) -> Result<Child, LifecycleError> {
    let mut command = Command::new(request.program());
    command
        .args(request.server_arguments(merged))
        .current_dir(request.workspace())
        .env("RUST_BACKTRACE", "0")
        .envs(request.environment.iter().map(|(key, value)| (key, value)))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }
    command
        .spawn()
        .map_err(|source| LifecycleError::LaunchServer {
            program: request.program().clone(),
            source,
        })
}
