//! CLI argument definitions for the warden harness.

use std::ffi::OsString;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use warden_config::{ConfigFormat, FlagVocabulary};

/// Launches a server with layered configuration and watches it start.
#[derive(Parser, Debug)]
#[command(name = "warden", version, disable_help_subcommand = true)]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: CliCommand,
}

#[derive(Subcommand, Debug)]
pub(crate) enum CliCommand {
    /// Starts a server, waits for readiness, then stops it and reports.
    Launch(LaunchArgs),
    /// Prints the arguments a server would be launched with.
    Resolve(ResolveArgs),
}

/// Flags the server is known to accept, used to predict rejection.
#[derive(Args, Debug, Default, Clone)]
pub(crate) struct VocabularyArgs {
    /// Switch the server accepts (repeatable).
    #[arg(long = "recognise", value_name = "FLAG", allow_hyphen_values = true)]
    pub(crate) flags: Vec<String>,
    /// Option the server accepts together with a value (repeatable).
    #[arg(long = "recognise-option", value_name = "FLAG", allow_hyphen_values = true)]
    pub(crate) options: Vec<String>,
}

impl VocabularyArgs {
    /// Builds a vocabulary, or `None` when no flag was listed.
    pub(crate) fn vocabulary(&self) -> Option<FlagVocabulary> {
        if self.flags.is_empty() && self.options.is_empty() {
            return None;
        }
        let vocabulary = self
            .flags
            .iter()
            .fold(FlagVocabulary::new(), |vocabulary, flag| vocabulary.flag(flag.as_str()));
        Some(
            self.options
                .iter()
                .fold(vocabulary, |vocabulary, option| vocabulary.option(option.as_str())),
        )
    }
}

#[derive(Args, Debug)]
pub(crate) struct LaunchArgs {
    /// Server binary to launch.
    #[arg(long, value_name = "BIN")]
    pub(crate) server: OsString,
    /// Working directory handed to the server.
    #[arg(long, value_name = "DIR")]
    pub(crate) workspace: PathBuf,
    /// Server subcommand; also selects the configuration section.
    #[arg(long, default_value = "server")]
    pub(crate) subcommand: String,
    /// Port handed to the server; a free loopback port when omitted.
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Capture file; defaults to `server_output.log` in the workspace.
    #[arg(long, value_name = "PATH")]
    pub(crate) output_file: Option<PathBuf>,
    /// Configuration file format, overriding the extension.
    #[arg(long, value_name = "FORMAT")]
    pub(crate) config_format: Option<ConfigFormat>,
    #[command(flatten)]
    pub(crate) vocabulary: VocabularyArgs,
    /// Keeps the server running until SIGINT or SIGTERM.
    #[arg(long)]
    pub(crate) until_signal: bool,
    /// Arguments for the server, after `--`; may include `--config <path>`.
    #[arg(last = true, value_name = "SERVER_ARG")]
    pub(crate) server_args: Vec<String>,
}

#[derive(Args, Debug)]
pub(crate) struct ResolveArgs {
    /// Configuration section to resolve.
    #[arg(long, default_value = "server")]
    pub(crate) subcommand: String,
    /// Configuration file format, overriding the extension.
    #[arg(long, value_name = "FORMAT")]
    pub(crate) config_format: Option<ConfigFormat>,
    #[command(flatten)]
    pub(crate) vocabulary: VocabularyArgs,
    /// Output format for the resolution.
    #[arg(long, value_enum, default_value_t = ResolveFormat::Text)]
    pub(crate) format: ResolveFormat,
    /// Arguments for the server, after `--`; may include `--config <path>`.
    #[arg(last = true, value_name = "SERVER_ARG")]
    pub(crate) server_args: Vec<String>,
}

/// Rendering for `warden resolve`.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, ValueEnum)]
pub(crate) enum ResolveFormat {
    #[default]
    Text,
    Json,
}
