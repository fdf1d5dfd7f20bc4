//! Configuration for the warden server harness.
//!
//! Two kinds of configuration live here. [`HarnessConfig`] tunes the harness
//! itself and is layered by `ortho_config` from defaults, a TOML file,
//! `WARDEN_*` environment variables and command-line flags. The remaining
//! modules handle the configuration files handed to launched servers: they are
//! decoded from JSON or YAML, checked against the server's flag vocabulary and
//! merged with explicit command-line tokens.

mod defaults;
mod document;
mod logging;
mod merge;
mod resolve;
mod validation;
mod vocabulary;

use std::ffi::OsString;
use std::sync::Arc;
use std::time::Duration;

use ortho_config::{OrthoConfig, OrthoError};
use serde::{Deserialize, Serialize};

pub use defaults::{
    DEFAULT_LOG_FILTER, DEFAULT_PORT_FLAG, DEFAULT_READY_MARKER, DEFAULT_STARTUP_TIMEOUT,
    DEFAULT_STOP_GRACE, DEFAULT_USAGE_BANNER_PREFIX, DEFAULT_WORKSPACE_FLAG, default_log_filter,
    default_log_filter_string, default_log_format, default_port_flag, default_ready_marker,
    default_startup_timeout_ms, default_stop_grace_ms, default_usage_banner_prefix,
    default_workspace_flag,
};
pub use document::{
    ConfigFileError, ConfigFormat, OptionSection, OptionSections, RawConfigDocument,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use merge::{MergedArguments, merge};
pub use resolve::{CONFIG_FLAG, ConfigResolver, Resolution, ResolveError, extract_config_path};
pub use validation::{ConfigValidator, ExpectedOutcome, ValidationReport};
pub use vocabulary::FlagVocabulary;

/// Settings that control how the harness launches and observes servers.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "WARDEN")]
pub struct HarnessConfig {
    /// Tracing filter expression applied to harness logs.
    #[ortho_config(default = default_log_filter_string())]
    pub log_filter: String,
    /// Output format for harness logs.
    #[ortho_config(default = default_log_format())]
    pub log_format: LogFormat,
    /// Milliseconds to wait for a launched server to become ready.
    #[ortho_config(default = default_startup_timeout_ms())]
    pub startup_timeout_ms: u64,
    /// Milliseconds between the termination request and a forced kill.
    #[ortho_config(default = default_stop_grace_ms())]
    pub stop_grace_ms: u64,
    /// Output fragment that marks a server as ready.
    #[ortho_config(default = default_ready_marker())]
    pub ready_marker: String,
    /// Line prefix that identifies a usage banner.
    #[ortho_config(default = default_usage_banner_prefix())]
    pub usage_banner_prefix: String,
    /// Flag used to pass the allocated port to the server.
    #[ortho_config(default = default_port_flag())]
    pub port_flag: String,
    /// Flag used to pass the workspace directory to the server.
    #[ortho_config(default = default_workspace_flag())]
    pub workspace_flag: String,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
            startup_timeout_ms: default_startup_timeout_ms(),
            stop_grace_ms: default_stop_grace_ms(),
            ready_marker: default_ready_marker(),
            usage_banner_prefix: default_usage_banner_prefix(),
            port_flag: default_port_flag(),
            workspace_flag: default_workspace_flag(),
        }
    }
}

impl HarnessConfig {
    /// Loads the layered configuration: defaults, the TOML file named by
    /// `--config-path` or `WARDEN_CONFIG_PATH`, `WARDEN_*` variables, then
    /// the flags in `args`.
    ///
    /// # Errors
    ///
    /// Returns the loader error when any layer holds an invalid value.
    pub fn load_from_iter<I, T>(args: I) -> Result<Self, Arc<OrthoError>>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as OrthoConfig>::load_from_iter(args)
    }

    /// Tracing filter expression.
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Log output format.
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Readiness budget for a launched server.
    pub const fn startup_timeout(&self) -> Duration {
        Duration::from_millis(self.startup_timeout_ms)
    }

    /// Grace period granted to a server asked to stop.
    pub const fn stop_grace(&self) -> Duration {
        Duration::from_millis(self.stop_grace_ms)
    }

    /// Readiness marker.
    pub fn ready_marker(&self) -> &str {
        &self.ready_marker
    }

    /// Usage banner prefix.
    pub fn usage_banner_prefix(&self) -> &str {
        &self.usage_banner_prefix
    }

    /// Port flag spelling.
    pub fn port_flag(&self) -> &str {
        &self.port_flag
    }

    /// Workspace flag spelling.
    pub fn workspace_flag(&self) -> &str {
        &self.workspace_flag
    }
}
