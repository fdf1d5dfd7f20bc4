//! Configuration documents for the end-to-end scenarios.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// JSON configuration whose only option the stub server accepts.
pub const VALID_JSON: &str = r#"{"server": ["--skip-db-cleanup"]}"#;

/// YAML configuration equivalent to [`VALID_JSON`].
pub const VALID_YAML: &str = "server:\n  - --skip-db-cleanup\n";

/// JSON configuration carrying an option the stub server rejects.
pub const INVALID_JSON: &str = r#"{"server": ["--dummy-option"]}"#;

/// An empty configuration file, equivalent to passing no file at all.
pub const EMPTY: &str = "";

/// JSON configuration naming the server, for precedence checks.
pub const NAMED_JSON: &str = r#"{"server": ["--name", "from-file", "--verbose"]}"#;

/// JSON configuration whose `--name` option is followed by a flag instead of
/// its value.
pub const MISSING_VALUE_JSON: &str = r#"{"server": ["--name", "--skip-db-cleanup"]}"#;

/// Writes `contents` to `file_name` inside `dir` and returns the path.
///
/// # Errors
///
/// Returns the underlying I/O error when the file cannot be written.
pub fn write_config(dir: &Path, file_name: &str, contents: &str) -> io::Result<PathBuf> {
    let path = dir.join(file_name);
    fs::write(&path, contents)?;
    Ok(path)
}
