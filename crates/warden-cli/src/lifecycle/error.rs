//! Error types for server lifecycle operations.

use std::ffi::OsString;
use std::io;
use std::path::PathBuf;

use thiserror::Error;
use warden_config::ResolveError;

/// Errors raised while launching, observing, or stopping a server.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("failed to resolve server configuration: {0}")]
    Resolve(#[from] ResolveError),
    #[error("failed to allocate a free port: {source}")]
    AllocatePort {
        #[source]
        source: io::Error,
    },
    #[error("failed to create capture file {path:?}: {source}")]
    CreateCapture {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to read captured output {path:?}: {source}")]
    ReadCapture {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to spawn server binary '{program:?}': {source}")]
    LaunchServer {
        program: OsString,
        #[source]
        source: io::Error,
    },
    #[error("server {stream} pipe was not available after spawn")]
    MissingPipe { stream: &'static str },
    #[error("failed to start {stream} output pump: {source}")]
    SpawnPump {
        stream: &'static str,
        #[source]
        source: io::Error,
    },
    #[error("server was not ready within {timeout_ms} ms; inspect {capture:?}")]
    ReadyTimeout { timeout_ms: u64, capture: PathBuf },
    #[error("failed to signal server pid {pid}: {source}")]
    SignalFailed {
        pid: u32,
        #[source]
        source: io::Error,
    },
    #[error("failed to kill server pid {pid}: {source}")]
    Kill {
        pid: u32,
        #[source]
        source: io::Error,
    },
    #[error("failed to wait for server pid {pid}: {source}")]
    Wait {
        pid: u32,
        #[source]
        source: io::Error,
    },
    #[error("failed to install signal handlers: {source}")]
    InstallSignals {
        #[source]
        source: io::Error,
    },
    #[cfg(not(unix))]
    #[error("platform does not support server lifecycle signalling")]
    UnsupportedPlatform,
}
