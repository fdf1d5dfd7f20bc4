//! Captured server output and the outcome derived from it.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use warden_config::ExpectedOutcome;

use super::error::LifecycleError;

/// How a launched server treated its arguments, as observed in its output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchOutcome {
    /// No usage banner was printed.
    Accepted,
    /// The server printed its usage banner; carries the banner text.
    RejectedAtRuntime(String),
}

impl LaunchOutcome {
    /// Classifies captured `text` using the usage banner `prefix`.
    pub fn from_text(text: &str, prefix: &str) -> Self {
        match usage_banner_in(text, prefix) {
            Some(banner) => Self::RejectedAtRuntime(banner.to_owned()),
            None => Self::Accepted,
        }
    }

    /// Returns true when the server rejected its arguments.
    pub const fn is_rejected(&self) -> bool {
        matches!(self, Self::RejectedAtRuntime(_))
    }

    /// Usage banner text, when the server rejected its arguments.
    pub fn usage_text(&self) -> Option<&str> {
        match self {
            Self::Accepted => None,
            Self::RejectedAtRuntime(text) => Some(text),
        }
    }

    /// Returns true when the observation matches what validation predicted.
    pub const fn satisfies(&self, expected: ExpectedOutcome) -> bool {
        matches!(
            (self, expected),
            (Self::Accepted, ExpectedOutcome::Accepted)
                | (Self::RejectedAtRuntime(_), ExpectedOutcome::RejectedAtRuntime)
        )
    }
}

/// Read access to the file a server's output was captured into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedOutput {
    path: PathBuf,
}

impl CapturedOutput {
    /// Wraps an existing capture file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the capture file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads everything captured so far, replacing undecodable bytes.
    pub fn read_text(&self) -> Result<String, LifecycleError> {
        let bytes = fs::read(&self.path).map_err(|source| LifecycleError::ReadCapture {
            path: self.path.clone(),
            source,
        })?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Returns true when the captured text contains `needle`.
    pub fn contains(&self, needle: &str) -> Result<bool, LifecycleError> {
        Ok(self.read_text()?.contains(needle))
    }

    /// Text from the first usage banner line to the end of the capture.
    pub fn usage_banner(&self, prefix: &str) -> Result<Option<String>, LifecycleError> {
        let text = self.read_text()?;
        Ok(usage_banner_in(&text, prefix).map(str::to_owned))
    }

    /// Classifies the captured text.
    pub fn outcome(&self, prefix: &str) -> Result<LaunchOutcome, LifecycleError> {
        Ok(LaunchOutcome::from_text(&self.read_text()?, prefix))
    }
}

/// Finds the first line whose trimmed start begins with `prefix` and returns
/// the text from that line onwards.
pub(super) fn usage_banner_in<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    if prefix.is_empty() {
        return None;
    }
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        if line.trim_start().starts_with(prefix) {
            return text.get(offset..);
        }
        offset += line.len();
    }
    None
}

/// Creates (or truncates) the capture file, creating parent directories.
pub(super) fn create_capture_file(path: &Path) -> Result<File, LifecycleError> {
    let create_error = |source| LifecycleError::CreateCapture {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(create_error)?;
    }
    File::create(path).map_err(create_error)
}
