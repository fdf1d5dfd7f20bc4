//! High-level orchestration for server launches.
//!
//! [`ServerHarness`] wires resolution, port allocation, spawning and the
//! bounded readiness wait together so callers drive a single entrypoint.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info, warn};
use warden_config::{
    ConfigFormat, ConfigResolver, ExpectedOutcome, FlagVocabulary, HarnessConfig,
    MergedArguments, Resolution,
};

use super::capture::LaunchOutcome;
use super::error::LifecycleError;
use super::handle::{ServerProcessHandle, StoppedServer};
use super::monitoring::ReadinessEvent;
use super::port::{LoopbackPortAllocator, PortAllocator};
use super::spawning::{LaunchRequest, LaunchSettings};
use super::{LIFECYCLE_TARGET, RESOLVE_TARGET};

/// Section consulted when a plan names no subcommand.
pub const DEFAULT_SECTION: &str = "server";

/// File name of the capture file placed in the workspace by default.
pub const DEFAULT_CAPTURE_FILE: &str = "server_output.log";

/// Description of one server launch.
#[derive(Debug, Clone)]
pub struct LaunchPlan {
    program: OsString,
    subcommand: Option<String>,
    workspace: PathBuf,
    port: Option<u16>,
    output_path: Option<PathBuf>,
    server_args: Vec<String>,
    vocabulary: Option<FlagVocabulary>,
    config_format: Option<ConfigFormat>,
    environment: Vec<(OsString, OsString)>,
}

impl LaunchPlan {
    pub fn new(program: impl Into<OsString>, workspace: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            subcommand: None,
            workspace: workspace.into(),
            port: None,
            output_path: None,
            server_args: Vec::new(),
            vocabulary: None,
            config_format: None,
            environment: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_subcommand(mut self, subcommand: impl Into<String>) -> Self {
        self.subcommand = Some(subcommand.into());
        self
    }

    #[must_use]
    pub const fn with_port(mut self, port: Option<u16>) -> Self {
        self.port = port;
        self
    }

    #[must_use]
    pub fn with_output_path(mut self, path: Option<PathBuf>) -> Self {
        self.output_path = path;
        self
    }

    /// Server arguments, possibly including `--config <path>`.
    #[must_use]
    pub fn with_server_args<I, S>(mut self, arguments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.server_args = arguments.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_vocabulary(mut self, vocabulary: Option<FlagVocabulary>) -> Self {
        self.vocabulary = vocabulary;
        self
    }

    #[must_use]
    pub const fn with_config_format(mut self, format: Option<ConfigFormat>) -> Self {
        self.config_format = format;
        self
    }

    #[must_use]
    pub fn with_env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.environment.push((key.into(), value.into()));
        self
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    /// Configuration section the plan resolves against.
    pub fn section(&self) -> &str {
        self.subcommand.as_deref().unwrap_or(DEFAULT_SECTION)
    }

    /// Capture path, defaulting to a file inside the workspace.
    pub fn output_path(&self) -> PathBuf {
        self.output_path
            .clone()
            .unwrap_or_else(|| self.workspace.join(DEFAULT_CAPTURE_FILE))
    }
}

/// A server that reached its first readiness event.
#[derive(Debug)]
pub struct StartedServer {
    handle: ServerProcessHandle,
    resolution: Resolution,
    readiness: Option<ReadinessEvent>,
}

impl StartedServer {
    pub const fn handle(&self) -> &ServerProcessHandle {
        &self.handle
    }

    pub fn into_handle(self) -> ServerProcessHandle {
        self.handle
    }

    pub const fn resolution(&self) -> &Resolution {
        &self.resolution
    }

    pub fn merged(&self) -> &MergedArguments {
        self.resolution.merged()
    }

    /// What validation predicted, when a vocabulary was supplied.
    pub fn expected_outcome(&self) -> Option<ExpectedOutcome> {
        self.resolution.expected_outcome()
    }

    pub const fn readiness(&self) -> Option<ReadinessEvent> {
        self.readiness
    }

    pub fn outcome(&self) -> Result<LaunchOutcome, LifecycleError> {
        self.handle.outcome()
    }

    pub fn stop(self) -> Result<StoppedServer, LifecycleError> {
        self.handle.stop()
    }
}

/// Production launch controller.
#[derive(Debug, Clone)]
pub struct ServerHarness<P = LoopbackPortAllocator> {
    settings: LaunchSettings,
    startup_timeout: Duration,
    ports: P,
}

impl ServerHarness {
    pub fn new(config: &HarnessConfig) -> Self {
        Self::with_port_allocator(config, LoopbackPortAllocator)
    }
}

impl<P: PortAllocator> ServerHarness<P> {
    pub fn with_port_allocator(config: &HarnessConfig, ports: P) -> Self {
        Self {
            settings: LaunchSettings::from_config(config),
            startup_timeout: config.startup_timeout(),
            ports,
        }
    }

    /// Resolves the plan's arguments without launching anything.
    pub fn resolve(&self, plan: &LaunchPlan) -> Result<Resolution, LifecycleError> {
        let resolution = ConfigResolver::new(plan.section())
            .with_vocabulary(plan.vocabulary.as_ref())
            .with_format(plan.config_format)
            .resolve(&plan.server_args)?;
        debug!(
            target: RESOLVE_TARGET,
            section = plan.section(),
            config = ?resolution.config_path(),
            tokens = resolution.merged().len(),
            "resolved server arguments"
        );
        if let Some(report) = resolution.report().filter(|report| !report.is_clean()) {
            info!(
                target: RESOLVE_TARGET,
                unrecognised = ?report.unrecognised(),
                missing_values = ?report.missing_values(),
                "configuration carries options the server will reject"
            );
        }
        Ok(resolution)
    }

    /// Resolves, launches and waits for the first readiness event.
    ///
    /// When the startup timeout expires the server is stopped and
    /// `ReadyTimeout` is returned.
    pub fn start(&self, plan: &LaunchPlan) -> Result<StartedServer, LifecycleError> {
        let resolution = self.resolve(plan)?;
        let port = match plan.port {
            Some(port) => port,
            None => self.ports.allocate()?,
        };
        let request = self.request(plan, port);
        let handle = ServerProcessHandle::launch(&request, resolution.merged())?;
        let readiness = match handle.await_ready_within(self.startup_timeout) {
            Ok(readiness) => readiness,
            Err(error) => {
                if let Err(stop_error) = handle.stop() {
                    warn!(
                        target: LIFECYCLE_TARGET,
                        error = %stop_error,
                        "failed to stop server after timeout"
                    );
                }
                return Err(error);
            }
        };
        Ok(StartedServer {
            handle,
            resolution,
            readiness,
        })
    }

    fn request(&self, plan: &LaunchPlan, port: u16) -> LaunchRequest {
        plan.environment.iter().fold(
            LaunchRequest::new(
                plan.program.clone(),
                plan.workspace.clone(),
                port,
                plan.output_path(),
            )
            .with_subcommand(plan.subcommand.clone())
            .with_settings(self.settings.clone()),
            |request, (key, value)| request.with_env(key.clone(), value.clone()),
        )
    }
}
