//! Predicts how a server will react to a configuration section.
//!
//! Validation never blocks a launch. An unrecognised token only establishes
//! the expectation that the launched server prints its usage banner and exits
//! rather than running normally.

use serde::Serialize;

use crate::document::OptionSection;
use crate::vocabulary::FlagVocabulary;

/// What the harness expects the launched server to do with its arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpectedOutcome {
    /// Every token is known; the server should start normally.
    Accepted,
    /// At least one token is unknown; the server should reject it at runtime.
    RejectedAtRuntime,
}

/// Findings for one section checked against a vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    subcommand: String,
    unrecognised: Vec<String>,
    missing_values: Vec<String>,
}

impl ValidationReport {
    /// Subcommand whose section was checked.
    pub fn subcommand(&self) -> &str {
        &self.subcommand
    }

    /// Tokens the vocabulary does not recognise, in document order.
    pub fn unrecognised(&self) -> &[String] {
        &self.unrecognised
    }

    /// Options that take a value but were not given one, in document order.
    pub fn missing_values(&self) -> &[String] {
        &self.missing_values
    }

    /// Returns true when every token was recognised and every option has
    /// its value.
    pub fn is_clean(&self) -> bool {
        self.unrecognised.is_empty() && self.missing_values.is_empty()
    }

    /// Expected runtime behaviour of the server.
    pub fn expected_outcome(&self) -> ExpectedOutcome {
        if self.is_clean() {
            ExpectedOutcome::Accepted
        } else {
            ExpectedOutcome::RejectedAtRuntime
        }
    }
}

/// Checks option sections against a subcommand vocabulary.
#[derive(Debug, Clone, Copy)]
pub struct ConfigValidator<'a> {
    vocabulary: &'a FlagVocabulary,
}

impl<'a> ConfigValidator<'a> {
    /// Creates a validator over `vocabulary`.
    pub const fn new(vocabulary: &'a FlagVocabulary) -> Self {
        Self { vocabulary }
    }

    /// Walks the section's tokens and records the unrecognised ones.
    ///
    /// `--name=value` is checked as `--name`. A recognised option that takes a
    /// value consumes the following token unless that token is itself a flag,
    /// in which case the option is missing its value. Short switches may be
    /// clustered (`-ab`) and a short option may carry its value attached
    /// (`-p8001`). A token without a leading dash that is not a value is
    /// unrecognised.
    pub fn validate(&self, section: &OptionSection) -> ValidationReport {
        let mut unrecognised = Vec::new();
        let mut missing_values = Vec::new();
        let mut pending: Option<&String> = None;
        for token in section.tokens() {
            if let Some(option) = pending.take() {
                if !is_flag(token) {
                    continue;
                }
                missing_values.push(option.clone());
            }
            if !is_flag(token) {
                unrecognised.push(token.clone());
                continue;
            }
            match self.check_flag(token) {
                FlagCheck::Complete => {}
                FlagCheck::NeedsValue => pending = Some(token),
                FlagCheck::Unknown => unrecognised.push(token.clone()),
            }
        }
        if let Some(option) = pending {
            missing_values.push(option.clone());
        }
        ValidationReport {
            subcommand: section.subcommand().to_owned(),
            unrecognised,
            missing_values,
        }
    }

    fn check_flag(&self, token: &str) -> FlagCheck {
        if let Some((spelling, _)) = token.split_once('=') {
            return match self.vocabulary.lookup(spelling) {
                Some(_) => FlagCheck::Complete,
                None => FlagCheck::Unknown,
            };
        }
        match self.vocabulary.lookup(token) {
            Some(true) => return FlagCheck::NeedsValue,
            Some(false) => return FlagCheck::Complete,
            None => {}
        }
        match token.strip_prefix('-') {
            Some(cluster) if !cluster.starts_with('-') => self.check_short_cluster(cluster),
            _ => FlagCheck::Unknown,
        }
    }

    /// Checks `-abc` as `-a -b -c`, stopping at the first short option that
    /// takes a value; the rest of the cluster is that value.
    fn check_short_cluster(&self, cluster: &str) -> FlagCheck {
        for (index, short) in cluster.char_indices() {
            match self.vocabulary.lookup(&format!("-{short}")) {
                Some(true) => {
                    let rest = &cluster[index + short.len_utf8()..];
                    return if rest.is_empty() {
                        FlagCheck::NeedsValue
                    } else {
                        FlagCheck::Complete
                    };
                }
                Some(false) => {}
                None => return FlagCheck::Unknown,
            }
        }
        FlagCheck::Complete
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlagCheck {
    Complete,
    NeedsValue,
    Unknown,
}

fn is_flag(token: &str) -> bool {
    token.len() > 1 && token.starts_with('-')
}
