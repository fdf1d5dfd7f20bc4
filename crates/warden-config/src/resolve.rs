//! Resolves server arguments that may reference a configuration file.
//!
//! Resolution pulls `--config <path>` out of the server arguments, decodes the
//! file, selects the section for the invoked subcommand, checks it against an
//! optional vocabulary, and merges it with the remaining arguments.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::document::{ConfigFileError, ConfigFormat, OptionSections, RawConfigDocument};
use crate::merge::{MergedArguments, merge};
use crate::validation::{ConfigValidator, ExpectedOutcome, ValidationReport};
use crate::vocabulary::FlagVocabulary;

/// Flag that names the server configuration file.
pub const CONFIG_FLAG: &str = "--config";

/// Errors that abort resolution.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// `--config` appeared without a path.
    #[error("'--config' requires a configuration file path")]
    MissingConfigPath,
    /// The configuration file could not be loaded.
    #[error(transparent)]
    File(#[from] ConfigFileError),
}

/// Outcome of resolving one set of server arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    merged: MergedArguments,
    config_path: Option<PathBuf>,
    report: Option<ValidationReport>,
}

impl Resolution {
    /// Arguments to launch the server with.
    pub fn merged(&self) -> &MergedArguments {
        &self.merged
    }

    /// Consumes the resolution, returning the merged arguments.
    pub fn into_merged(self) -> MergedArguments {
        self.merged
    }

    /// Configuration file named on the command line, if any.
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Validation findings when a vocabulary was supplied and the file
    /// contributed a section.
    pub fn report(&self) -> Option<&ValidationReport> {
        self.report.as_ref()
    }

    /// Expected runtime behaviour, when a vocabulary was available.
    pub fn expected_outcome(&self) -> Option<ExpectedOutcome> {
        self.report.as_ref().map(ValidationReport::expected_outcome)
    }
}

/// Resolves server arguments for one subcommand.
#[derive(Debug, Clone, Copy)]
pub struct ConfigResolver<'a> {
    subcommand: &'a str,
    vocabulary: Option<&'a FlagVocabulary>,
    format: Option<ConfigFormat>,
}

impl<'a> ConfigResolver<'a> {
    /// Creates a resolver for `subcommand`.
    pub const fn new(subcommand: &'a str) -> Self {
        Self {
            subcommand,
            vocabulary: None,
            format: None,
        }
    }

    /// Checks file sections against `vocabulary`.
    #[must_use]
    pub const fn with_vocabulary(mut self, vocabulary: Option<&'a FlagVocabulary>) -> Self {
        self.vocabulary = vocabulary;
        self
    }

    /// Forces the document format instead of inferring it from the extension.
    #[must_use]
    pub const fn with_format(mut self, format: Option<ConfigFormat>) -> Self {
        self.format = format;
        self
    }

    /// Resolves `arguments` into the final launch tokens.
    ///
    /// An empty configuration file resolves exactly as if `--config` had been
    /// omitted.
    pub fn resolve(&self, arguments: &[String]) -> Result<Resolution, ResolveError> {
        let (config_path, remaining) = extract_config_path(arguments)?;
        let sections = match config_path.as_deref() {
            Some(path) => load_sections(path, self.format)?,
            None => None,
        };
        let section = sections
            .as_ref()
            .and_then(|sections| sections.section(self.subcommand));
        let report = section.and_then(|section| {
            self.vocabulary
                .map(|vocabulary| ConfigValidator::new(vocabulary).validate(section))
        });
        Ok(Resolution {
            merged: merge(section, &remaining),
            config_path,
            report,
        })
    }
}

fn load_sections(
    path: &Path,
    format: Option<ConfigFormat>,
) -> Result<Option<OptionSections>, ResolveError> {
    match RawConfigDocument::read(path, format)?.parse() {
        Ok(sections) => Ok(Some(sections)),
        Err(ConfigFileError::EmptyDocument { .. }) => Ok(None),
        Err(error) => Err(error.into()),
    }
}

/// Splits `--config` out of the arguments.
///
/// Accepts `--config <path>` and `--config=<path>`. When the flag repeats the
/// last occurrence wins. Every other token is returned in order.
pub fn extract_config_path(
    arguments: &[String],
) -> Result<(Option<PathBuf>, Vec<String>), ResolveError> {
    let mut config_path = None;
    let mut remaining = Vec::with_capacity(arguments.len());
    let mut tokens = arguments.iter();
    while let Some(token) = tokens.next() {
        if token == CONFIG_FLAG {
            let value = tokens.next().ok_or(ResolveError::MissingConfigPath)?;
            config_path = Some(PathBuf::from(value));
            continue;
        }
        match token.strip_prefix(CONFIG_FLAG).and_then(|rest| rest.strip_prefix('=')) {
            Some("") => return Err(ResolveError::MissingConfigPath),
            Some(value) => config_path = Some(PathBuf::from(value)),
            None => remaining.push(token.clone()),
        }
    }
    Ok((config_path, remaining))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    fn strings(tokens: &[&str]) -> Vec<String> {
        tokens.iter().map(|token| (*token).to_owned()).collect()
    }

    #[fixture]
    fn workspace() -> TempDir {
        tempfile::tempdir().expect("temp dir")
    }

    fn write(dir: &TempDir, name: &str, contents: &str) -> String {
        let path = dir.path().join(name);
        fs::write(&path, contents).expect("write config");
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn extracts_separate_and_inline_config_flags() {
        let (path, rest) =
            extract_config_path(&strings(&["--verbose", "--config", "a.json", "--x"]))
                .expect("extract");
        assert_eq!(path, Some(PathBuf::from("a.json")));
        assert_eq!(rest, strings(&["--verbose", "--x"]));

        let (path, rest) =
            extract_config_path(&strings(&["--config=a.json", "--config=b.yaml"]))
                .expect("extract");
        assert_eq!(path, Some(PathBuf::from("b.yaml")));
        assert!(rest.is_empty());
    }

    #[rstest]
    #[case(&["--config"])]
    #[case(&["--config="])]
    fn config_flag_requires_a_path(#[case] tokens: &[&str]) {
        let error = extract_config_path(&strings(tokens)).expect_err("missing path");
        assert!(matches!(error, ResolveError::MissingConfigPath));
    }

    #[test]
    fn leaves_similar_flags_alone() {
        let (path, rest) =
            extract_config_path(&strings(&["--config-path", "x"])).expect("extract");
        assert!(path.is_none());
        assert_eq!(rest, strings(&["--config-path", "x"]));
    }

    #[rstest]
    fn merges_the_active_section_before_cli_tokens(workspace: TempDir) {
        let path = write(
            &workspace,
            "codechecker.json",
            r#"{"server": ["--skip-db-cleanup"], "analyze": ["--jobs", "2"]}"#,
        );
        let resolution = ConfigResolver::new("server")
            .resolve(&strings(&["--config", &path, "--name", "cli"]))
            .expect("resolve");
        assert_eq!(
            resolution.merged().tokens(),
            ["--skip-db-cleanup", "--name", "cli"]
        );
        assert_eq!(resolution.config_path(), Some(Path::new(&path)));
        assert!(resolution.report().is_none());
    }

    #[rstest]
    fn empty_file_behaves_like_no_file(workspace: TempDir) {
        let path = write(&workspace, "codechecker.json", "");
        let with_empty = ConfigResolver::new("server")
            .resolve(&strings(&["--config", &path, "--name", "cli"]))
            .expect("resolve");
        let without = ConfigResolver::new("server")
            .resolve(&strings(&["--name", "cli"]))
            .expect("resolve");
        assert_eq!(with_empty.merged(), without.merged());
        assert!(with_empty.expected_outcome().is_none());
    }

    #[rstest]
    fn validates_against_the_vocabulary(workspace: TempDir) {
        let path = write(&workspace, "codechecker.yaml", "server:\n  - --dummy-option\n");
        let vocabulary = FlagVocabulary::new().flag("--skip-db-cleanup");
        let resolution = ConfigResolver::new("server")
            .with_vocabulary(Some(&vocabulary))
            .resolve(&strings(&["--config", &path]))
            .expect("resolve");
        assert_eq!(
            resolution.expected_outcome(),
            Some(ExpectedOutcome::RejectedAtRuntime)
        );
        assert_eq!(resolution.merged().tokens(), ["--dummy-option"]);
    }

    #[rstest]
    fn missing_section_contributes_nothing(workspace: TempDir) {
        let path = write(&workspace, "codechecker.json", r#"{"analyze": ["--jobs", "2"]}"#);
        let resolution = ConfigResolver::new("server")
            .resolve(&strings(&["--config", &path]))
            .expect("resolve");
        assert!(resolution.merged().is_empty());
    }

    #[rstest]
    fn malformed_files_abort_resolution(workspace: TempDir) {
        let path = write(&workspace, "codechecker.json", "{not json");
        let error = ConfigResolver::new("server")
            .resolve(&strings(&["--config", &path]))
            .expect_err("malformed file");
        assert!(matches!(
            error,
            ResolveError::File(ConfigFileError::Parse { .. })
        ));
    }

    #[rstest]
    fn forced_format_overrides_extension(workspace: TempDir) {
        let path = write(&workspace, "server.cfg", "server:\n  - --verbose\n");
        let resolution = ConfigResolver::new("server")
            .with_format(Some(ConfigFormat::Yaml))
            .resolve(&strings(&["--config", &path]))
            .expect("resolve");
        assert_eq!(resolution.merged().tokens(), ["--verbose"]);
    }
}
