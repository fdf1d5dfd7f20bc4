//! Command-line runtime for the warden server harness.
//!
//! The runtime splits harness configuration flags from the command, loads
//! [`warden_config::HarnessConfig`] through `ortho-config`, installs
//! telemetry and dispatches to the `launch` or `resolve` handlers. The
//! [`lifecycle`] module is public so integration suites can drive servers
//! without going through the binary.

use std::ffi::OsString;
use std::io::Write;
use std::process::ExitCode;

use clap::Parser;
use clap::error::ErrorKind;

mod cli;
mod commands;
mod config;
mod errors;
pub mod lifecycle;
mod output;
pub mod telemetry;

use cli::{Cli, CliCommand};
use config::{ConfigLoader, OrthoConfigLoader, prepare_cli_arguments, split_config_arguments};
pub(crate) use errors::AppError;
use output::CommandOutput;

/// CLI flags recognised by the configuration loader.
///
/// MAINTENANCE: keep in sync with the fields of `HarnessConfig`.
const CONFIG_CLI_FLAGS: &[&str] = &[
    "--config-path",
    "--log-filter",
    "--log-format",
    "--startup-timeout-ms",
    "--stop-grace-ms",
    "--ready-marker",
    "--usage-banner-prefix",
    "--port-flag",
    "--workspace-flag",
];

struct CliRunner<'a, W: Write, E: Write, L: ConfigLoader> {
    output: CommandOutput<&'a mut W, &'a mut E>,
    loader: &'a L,
}

impl<'a, W, E, L> CliRunner<'a, W, E, L>
where
    W: Write,
    E: Write,
    L: ConfigLoader,
{
    fn new(stdout: &'a mut W, stderr: &'a mut E, loader: &'a L) -> Self {
        Self {
            output: CommandOutput::new(stdout, stderr),
            loader,
        }
    }

    fn run<I>(&mut self, args: I) -> ExitCode
    where
        I: IntoIterator<Item = OsString>,
    {
        let args: Vec<OsString> = args.into_iter().collect();
        let split = split_config_arguments(&args);
        let cli_arguments = prepare_cli_arguments(&args, &split);

        let cli = match Cli::try_parse_from(cli_arguments) {
            Ok(cli) => cli,
            Err(error) if is_informational(&error) => return self.print_informational(&error),
            Err(error) => return self.fail(&AppError::CliUsage(error)),
        };

        let result = self
            .loader
            .load(&split.config_arguments)
            .and_then(|config| {
                telemetry::initialise(&config)?;
                match cli.command {
                    CliCommand::Launch(args) => commands::launch(args, &config, &mut self.output),
                    CliCommand::Resolve(args) => commands::resolve(&args, &mut self.output),
                }
            });

        match result {
            Ok(exit_code) => exit_code,
            Err(error) => self.fail(&error),
        }
    }

    fn print_informational(&mut self, error: &clap::Error) -> ExitCode {
        let rendered = error.render().to_string();
        match self.output.stdout_raw(rendered.as_bytes()) {
            Ok(()) => ExitCode::SUCCESS,
            Err(_) => ExitCode::FAILURE,
        }
    }

    fn fail(&mut self, error: &AppError) -> ExitCode {
        let _ = self.output.stderr_line(format_args!("{error}"));
        ExitCode::FAILURE
    }
}

fn is_informational(error: &clap::Error) -> bool {
    matches!(
        error.kind(),
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion
    )
}

/// Runs the CLI using the provided arguments and IO handles.
#[must_use]
pub fn run<I, W, E>(args: I, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    CliRunner::new(stdout, stderr, &OrthoConfigLoader).run(args)
}
