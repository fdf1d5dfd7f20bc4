//! Configuration loading helpers for the warden CLI.
//!
//! Harness flags lead the command line. They are split off here so
//! `ortho-config` only receives the flags it understands while clap parses
//! the command that follows.

use std::ffi::{OsStr, OsString};

use warden_config::HarnessConfig;

use crate::AppError;

pub(crate) trait ConfigLoader {
    /// Loads the harness configuration.
    ///
    /// # Flag Ordering
    ///
    /// Harness flags (listed in `CONFIG_CLI_FLAGS`) must appear before the
    /// command. Anything after the first other token belongs to the command.
    fn load(&self, args: &[OsString]) -> Result<HarnessConfig, AppError>;
}

pub(crate) struct OrthoConfigLoader;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlagAction {
    Include { needs_value: bool },
    Stop,
}

impl ConfigLoader for OrthoConfigLoader {
    fn load(&self, args: &[OsString]) -> Result<HarnessConfig, AppError> {
        HarnessConfig::load_from_iter(args.iter().cloned()).map_err(AppError::LoadConfiguration)
    }
}

fn classify(argument: &OsStr) -> FlagAction {
    let text = argument.to_string_lossy();
    let (flag, inline_value) = match text.split_once('=') {
        Some((flag, _)) => (flag, true),
        None => (text.as_ref(), false),
    };
    if super::CONFIG_CLI_FLAGS.contains(&flag) {
        FlagAction::Include {
            needs_value: !inline_value,
        }
    } else {
        FlagAction::Stop
    }
}

/// Harness flags and the index at which the command begins.
pub(crate) struct ConfigArgumentSplit {
    pub(crate) config_arguments: Vec<OsString>,
    pub(crate) command_start: usize,
}

pub(crate) fn split_config_arguments(args: &[OsString]) -> ConfigArgumentSplit {
    let Some(program) = args.first() else {
        return ConfigArgumentSplit {
            config_arguments: Vec::new(),
            command_start: 0,
        };
    };

    let mut config_arguments = vec![program.clone()];
    let mut index = 1;
    while let Some(argument) = args.get(index) {
        match classify(argument) {
            FlagAction::Include { needs_value } => {
                config_arguments.push(argument.clone());
                index += 1;
                if needs_value {
                    if let Some(value) = args.get(index) {
                        config_arguments.push(value.clone());
                        index += 1;
                    }
                }
            }
            FlagAction::Stop => break,
        }
    }

    ConfigArgumentSplit {
        config_arguments,
        command_start: index,
    }
}

/// Program name followed by everything from the command onwards.
pub(crate) fn prepare_cli_arguments(args: &[OsString], split: &ConfigArgumentSplit) -> Vec<OsString> {
    args.first()
        .into_iter()
        .chain(args.get(split.command_start..).unwrap_or_default())
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn os(args: &[&str]) -> Vec<OsString> {
        args.iter().map(OsString::from).collect()
    }

    #[rstest]
    #[case("--log-filter=debug", FlagAction::Include { needs_value: false })]
    #[case("--log-filter", FlagAction::Include { needs_value: true })]
    #[case("--port-flag", FlagAction::Include { needs_value: true })]
    #[case("launch", FlagAction::Stop)]
    #[case("--unknown", FlagAction::Stop)]
    fn classifies_leading_arguments(#[case] argument: &str, #[case] expected: FlagAction) {
        assert_eq!(classify(OsStr::new(argument)), expected);
    }

    #[test]
    fn splits_harness_flags_from_the_command() {
        let args = os(&[
            "warden",
            "--port-flag",
            "--port",
            "--log-format=compact",
            "launch",
            "--log-filter",
            "debug",
        ]);
        let split = split_config_arguments(&args);
        assert_eq!(
            split.config_arguments,
            os(&["warden", "--port-flag", "--port", "--log-format=compact"])
        );
        assert_eq!(
            prepare_cli_arguments(&args, &split),
            os(&["warden", "launch", "--log-filter", "debug"])
        );
    }

    #[test]
    fn empty_arguments_split_cleanly() {
        let split = split_config_arguments(&[]);
        assert!(split.config_arguments.is_empty());
        assert!(prepare_cli_arguments(&[], &split).is_empty());
    }
}
