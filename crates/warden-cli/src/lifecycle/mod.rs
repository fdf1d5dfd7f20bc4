//! Lifecycle management for launched servers.
//!
//! This module is split into focused submodules so each concern remains small and
//! testable:
//! - [`error`] captures the error surface exposed to the CLI.
//! - [`signal`] provides the condvar-backed lifecycle flag.
//! - [`spawning`] builds the server command line and spawns the process.
//! - [`monitoring`] pumps child output into the capture file and detects
//!   readiness.
//! - [`capture`] reads captured output back and classifies it.
//! - [`shutdown`] manages termination and the grace period.
//! - [`handle`] owns one running server.
//! - [`port`] allocates free ports.
//! - [`controller`] implements the resolve/launch/wait flow.

mod capture;
mod controller;
mod error;
mod handle;
mod monitoring;
mod port;
mod shutdown;
mod signal;
mod spawning;

pub use capture::{CapturedOutput, LaunchOutcome};
pub use controller::{
    DEFAULT_CAPTURE_FILE, DEFAULT_SECTION, LaunchPlan, ServerHarness, StartedServer,
};
pub use error::LifecycleError;
pub use handle::{ServerProcessHandle, StoppedServer};
pub use monitoring::ReadinessEvent;
pub use port::{LoopbackPortAllocator, PortAllocator, allocate_free_port};
pub use signal::{LifecycleSynchronizer, SignalState, SignalTimeout};
pub use spawning::{LaunchRequest, LaunchSettings};

/// Tracing target for process lifecycle events.
pub(crate) const LIFECYCLE_TARGET: &str = "warden::lifecycle";

/// Tracing target for argument resolution events.
pub(crate) const RESOLVE_TARGET: &str = "warden::resolve";
