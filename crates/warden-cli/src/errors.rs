//! Error types for the CLI runtime.

use std::io;
use std::sync::Arc;

use thiserror::Error;

use crate::lifecycle::LifecycleError;
use crate::telemetry::TelemetryError;

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error("failed to load configuration: {0}")]
    LoadConfiguration(Arc<ortho_config::OrthoError>),
    #[error("{0}")]
    CliUsage(clap::Error),
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
    #[error("server lifecycle failed: {0}")]
    Lifecycle(#[from] LifecycleError),
    #[error("failed to serialise resolution: {0}")]
    SerialiseResolution(serde_json::Error),
    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),
}
