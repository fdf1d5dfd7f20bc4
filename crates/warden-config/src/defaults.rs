//! Built-in values for harness settings.

use std::time::Duration;

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Startup budget granted to a launched server before readiness times out.
pub const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(30);

/// Grace period between the termination request and a forced kill.
pub const DEFAULT_STOP_GRACE: Duration = Duration::from_secs(5);

/// Line fragment a server prints once it accepts client requests.
pub const DEFAULT_READY_MARKER: &str = "Server waiting for client requests";

/// Prefix of the usage banner a server prints when it rejects its arguments.
pub const DEFAULT_USAGE_BANNER_PREFIX: &str = "Usage:";

/// Flag used to hand the allocated port to the server.
pub const DEFAULT_PORT_FLAG: &str = "--port";

/// Flag used to hand the workspace directory to the server.
pub const DEFAULT_WORKSPACE_FLAG: &str = "--workspace";

/// Default log filter expression used by the binaries.
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the binaries.
pub fn default_log_format() -> crate::logging::LogFormat {
    crate::logging::LogFormat::Json
}

/// Startup timeout expressed in milliseconds for layered configuration.
pub fn default_startup_timeout_ms() -> u64 {
    duration_millis(DEFAULT_STARTUP_TIMEOUT)
}

/// Stop grace period expressed in milliseconds for layered configuration.
pub fn default_stop_grace_ms() -> u64 {
    duration_millis(DEFAULT_STOP_GRACE)
}

/// Owned readiness marker.
pub fn default_ready_marker() -> String {
    DEFAULT_READY_MARKER.to_owned()
}

/// Owned usage banner prefix.
pub fn default_usage_banner_prefix() -> String {
    DEFAULT_USAGE_BANNER_PREFIX.to_owned()
}

/// Owned port flag spelling.
pub fn default_port_flag() -> String {
    DEFAULT_PORT_FLAG.to_owned()
}

/// Owned workspace flag spelling.
pub fn default_workspace_flag() -> String {
    DEFAULT_WORKSPACE_FLAG.to_owned()
}

fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
