//! Server configuration documents.
//!
//! A document maps subcommand names to ordered sequences of option tokens and
//! may be written as JSON or YAML. Both formats decode into the same
//! [`OptionSections`] value so later stages never learn which syntax the
//! operator used.

use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;

/// Serialisation formats accepted for server configuration documents.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ConfigFormat {
    /// A JSON object keyed by subcommand.
    #[default]
    Json,
    /// A YAML mapping keyed by subcommand.
    #[strum(to_string = "yaml", serialize = "yml")]
    Yaml,
}

impl ConfigFormat {
    /// Infers the format from a file extension.
    ///
    /// `.yaml` and `.yml` select YAML; every other extension, including none,
    /// falls back to JSON.
    pub fn from_path(path: &Path) -> Self {
        let extension = path
            .extension()
            .and_then(OsStr::to_str)
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("yaml" | "yml") => Self::Yaml,
            _ => Self::Json,
        }
    }
}

/// Errors raised while reading or decoding a configuration document.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// The document could not be read from disk.
    #[error("failed to read configuration file {path:?}: {source}")]
    Read {
        /// Path that failed to load.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
    /// The document text is not valid for its declared format.
    #[error("failed to parse {format} configuration{}: {message}", describe_origin(.path.as_deref()))]
    Parse {
        /// Declared or inferred format.
        format: ConfigFormat,
        /// Source path when the document came from disk.
        path: Option<PathBuf>,
        /// Decoder diagnostic.
        message: String,
    },
    /// The document holds no content at all.
    #[error("configuration{} is empty", describe_origin(.path.as_deref()))]
    EmptyDocument {
        /// Source path when the document came from disk.
        path: Option<PathBuf>,
    },
}

fn describe_origin(path: Option<&Path>) -> String {
    path.map(|path| format!(" {}", path.display()))
        .unwrap_or_default()
}

/// Text of a configuration document together with its format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawConfigDocument {
    path: Option<PathBuf>,
    format: ConfigFormat,
    text: String,
}

impl RawConfigDocument {
    /// Wraps in-memory text declared as `format`.
    pub fn new(text: impl Into<String>, format: ConfigFormat) -> Self {
        Self {
            path: None,
            format,
            text: text.into(),
        }
    }

    /// Reads a document from disk.
    ///
    /// The format is taken from `format` when provided, otherwise inferred from
    /// the file extension. Bytes that are not valid UTF-8 are replaced rather
    /// than failing the read.
    pub fn read(path: &Path, format: Option<ConfigFormat>) -> Result<Self, ConfigFileError> {
        let bytes = fs::read(path).map_err(|source| ConfigFileError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            path: Some(path.to_path_buf()),
            format: format.unwrap_or_else(|| ConfigFormat::from_path(path)),
            text: String::from_utf8_lossy(&bytes).into_owned(),
        })
    }

    /// Source path, when the document came from disk.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Declared or inferred format.
    pub const fn format(&self) -> ConfigFormat {
        self.format
    }

    /// Raw document text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Decodes the document into option sections.
    ///
    /// Returns [`ConfigFileError::EmptyDocument`] when the text carries no
    /// content; callers treat that as "no configuration supplied".
    pub fn parse(&self) -> Result<OptionSections, ConfigFileError> {
        if self.is_blank() {
            return Err(ConfigFileError::EmptyDocument {
                path: self.path.clone(),
            });
        }
        let decoded: BTreeMap<String, Option<Vec<String>>> = match self.format {
            ConfigFormat::Json => {
                serde_json::from_str(&self.text).map_err(|error| self.parse_error(error))?
            }
            ConfigFormat::Yaml => {
                serde_saphyr::from_str(&self.text).map_err(|error| self.parse_error(error))?
            }
        };
        let sections = decoded
            .into_iter()
            .map(|(subcommand, entries)| {
                let section = OptionSection::from_entries(&subcommand, entries.unwrap_or_default());
                (subcommand, section)
            })
            .collect();
        Ok(OptionSections { sections })
    }

    fn parse_error(&self, error: impl std::fmt::Display) -> ConfigFileError {
        ConfigFileError::Parse {
            format: self.format,
            path: self.path.clone(),
            message: error.to_string(),
        }
    }

    fn is_blank(&self) -> bool {
        match self.format {
            ConfigFormat::Json => self.text.trim().is_empty(),
            ConfigFormat::Yaml => self.text.lines().map(str::trim).all(|line| {
                line.is_empty() || line.starts_with('#') || line == "---" || line == "..."
            }),
        }
    }
}

/// Ordered option tokens scoped to one server subcommand.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OptionSection {
    subcommand: String,
    tokens: Vec<String>,
}

impl OptionSection {
    /// Builds a section from tokens that are already split.
    pub fn from_tokens<I, S>(subcommand: &str, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            subcommand: subcommand.to_owned(),
            tokens: tokens.into_iter().map(Into::into).collect(),
        }
    }

    /// Builds a section from document entries.
    ///
    /// An entry such as `--name value` is split at its first whitespace run so
    /// the flag and value become separate tokens. Entries without a leading
    /// dash and `--name=value` entries are kept whole; blank entries are
    /// dropped.
    pub fn from_entries<I, S>(subcommand: &str, entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut tokens = Vec::new();
        for entry in entries {
            let entry = entry.as_ref().trim();
            if entry.is_empty() {
                continue;
            }
            match split_flag_entry(entry) {
                Some((flag, value)) => {
                    tokens.push(flag.to_owned());
                    tokens.push(value.to_owned());
                }
                None => tokens.push(entry.to_owned()),
            }
        }
        Self {
            subcommand: subcommand.to_owned(),
            tokens,
        }
    }

    /// Subcommand this section configures.
    pub fn subcommand(&self) -> &str {
        &self.subcommand
    }

    /// Tokens in document order.
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Returns true when the section contributes no tokens.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

fn split_flag_entry(entry: &str) -> Option<(&str, &str)> {
    if !entry.starts_with('-') {
        return None;
    }
    let (flag, rest) = entry.split_once(char::is_whitespace)?;
    if flag.contains('=') {
        return None;
    }
    Some((flag, rest.trim_start()))
}

/// Every section decoded from one document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionSections {
    sections: BTreeMap<String, OptionSection>,
}

impl OptionSections {
    /// Section for `subcommand`, if the document declares one.
    pub fn section(&self, subcommand: &str) -> Option<&OptionSection> {
        self.sections.get(subcommand)
    }

    /// Subcommand names declared by the document, sorted.
    pub fn subcommands(&self) -> impl Iterator<Item = &str> {
        self.sections.keys().map(String::as_str)
    }

    /// Number of declared sections.
    pub fn len(&self) -> usize {
        self.sections.len()
    }

    /// Returns true when the document declared no sections.
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn server_tokens(document: &RawConfigDocument) -> Vec<String> {
        let sections = document.parse().expect("document should parse");
        sections
            .section("server")
            .expect("server section")
            .tokens()
            .to_vec()
    }

    #[rstest]
    #[case("codechecker.json", ConfigFormat::Json)]
    #[case("codechecker.yaml", ConfigFormat::Yaml)]
    #[case("codechecker.YML", ConfigFormat::Yaml)]
    #[case("codechecker.cfg", ConfigFormat::Json)]
    #[case("codechecker", ConfigFormat::Json)]
    fn infers_format_from_extension(#[case] name: &str, #[case] expected: ConfigFormat) {
        assert_eq!(ConfigFormat::from_path(Path::new(name)), expected);
    }

    #[test]
    fn json_and_yaml_decode_to_the_same_sections() {
        let json = RawConfigDocument::new(r#"{"server": ["--skip-db-cleanup"]}"#, ConfigFormat::Json);
        let yaml = RawConfigDocument::new(
            "# Server related options:\nserver:\n  - --skip-db-cleanup\n",
            ConfigFormat::Yaml,
        );
        assert_eq!(
            json.parse().expect("json parses"),
            yaml.parse().expect("yaml parses")
        );
    }

    #[test]
    fn keeps_other_sections_separate() {
        let document = RawConfigDocument::new(
            r#"{"analyze": ["--jobs", "4"], "server": ["--skip-db-cleanup"]}"#,
            ConfigFormat::Json,
        );
        let sections = document.parse().expect("document should parse");
        assert_eq!(sections.len(), 2);
        assert_eq!(
            sections.subcommands().collect::<Vec<_>>(),
            vec!["analyze", "server"]
        );
        assert_eq!(server_tokens(&document), vec!["--skip-db-cleanup"]);
    }

    #[test]
    fn splits_flag_entries_with_separate_values() {
        let document = RawConfigDocument::new(
            r#"{"server": ["--name   primary node", "--level=debug", "plain value", "  "]}"#,
            ConfigFormat::Json,
        );
        assert_eq!(
            server_tokens(&document),
            vec!["--name", "primary node", "--level=debug", "plain value"]
        );
    }

    #[test]
    fn yaml_section_without_entries_is_empty() {
        let document = RawConfigDocument::new("server:\n", ConfigFormat::Yaml);
        let sections = document.parse().expect("document should parse");
        assert!(sections.section("server").expect("server section").is_empty());
    }

    #[rstest]
    #[case("", ConfigFormat::Json)]
    #[case("   \n\t", ConfigFormat::Json)]
    #[case("", ConfigFormat::Yaml)]
    #[case("# only a comment\n---\n", ConfigFormat::Yaml)]
    fn blank_documents_are_reported_as_empty(#[case] text: &str, #[case] format: ConfigFormat) {
        let error = RawConfigDocument::new(text, format)
            .parse()
            .expect_err("blank documents should not parse");
        assert!(matches!(error, ConfigFileError::EmptyDocument { .. }));
    }

    #[rstest]
    #[case(r#"{"server": ["--skip-db-cleanup"]"#, ConfigFormat::Json)]
    #[case(r#"["--skip-db-cleanup"]"#, ConfigFormat::Json)]
    #[case(r#"{"server": [1, 2]}"#, ConfigFormat::Json)]
    #[case("server: [--skip-db-cleanup\n", ConfigFormat::Yaml)]
    fn malformed_documents_fail_to_parse(#[case] text: &str, #[case] format: ConfigFormat) {
        let error = RawConfigDocument::new(text, format)
            .parse()
            .expect_err("malformed documents should fail");
        match error {
            ConfigFileError::Parse {
                format: reported, ..
            } => assert_eq!(reported, format),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn reads_documents_with_invalid_utf8() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("server.json");
        let mut bytes = br#"{"server": ["--name", "caf"#.to_vec();
        bytes.push(0xff);
        bytes.extend_from_slice(br#""]}"#);
        fs::write(&path, bytes).expect("write config");

        let document = RawConfigDocument::read(&path, None).expect("read config");
        assert_eq!(document.format(), ConfigFormat::Json);
        assert_eq!(document.path(), Some(path.as_path()));
        assert_eq!(server_tokens(&document), vec!["--name", "caf\u{fffd}"]);
    }

    #[test]
    fn explicit_format_overrides_extension() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("server.conf");
        fs::write(&path, "server:\n  - --verbose\n").expect("write config");

        let document =
            RawConfigDocument::read(&path, Some(ConfigFormat::Yaml)).expect("read config");
        assert_eq!(server_tokens(&document), vec!["--verbose"]);
    }

    #[test]
    fn missing_files_report_read_errors() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("absent.json");
        let error = RawConfigDocument::read(&path, None).expect_err("missing file should fail");
        assert!(matches!(error, ConfigFileError::Read { .. }));
    }
}
