//! Handlers for the `launch` and `resolve` commands.

use std::io::Write;
use std::path::Path;
use std::process::ExitCode;

use serde::Serialize;
use tracing::{info, warn};
use warden_config::{ConfigResolver, ExpectedOutcome, HarnessConfig, MergedArguments, Resolution};

use crate::AppError;
use crate::cli::{LaunchArgs, ResolveArgs, ResolveFormat};
use crate::lifecycle::{
    LaunchOutcome, LaunchPlan, LifecycleError, ReadinessEvent, ServerHarness,
    ServerProcessHandle, StoppedServer,
};
use crate::output::CommandOutput;

const COMMAND_TARGET: &str = "warden::command";

/// Resolution as printed by `warden resolve --format json`.
#[derive(Debug, Serialize)]
struct ResolutionSummary<'a> {
    subcommand: &'a str,
    config: Option<&'a Path>,
    arguments: &'a MergedArguments,
    unrecognised: &'a [String],
    missing_values: &'a [String],
    expected_outcome: Option<ExpectedOutcome>,
}

impl<'a> ResolutionSummary<'a> {
    fn new(subcommand: &'a str, resolution: &'a Resolution) -> Self {
        Self {
            subcommand,
            config: resolution.config_path(),
            arguments: resolution.merged(),
            unrecognised: resolution
                .report()
                .map(|report| report.unrecognised())
                .unwrap_or_default(),
            missing_values: resolution
                .report()
                .map(|report| report.missing_values())
                .unwrap_or_default(),
            expected_outcome: resolution.expected_outcome(),
        }
    }
}

pub(crate) fn resolve<W: Write, E: Write>(
    args: &ResolveArgs,
    output: &mut CommandOutput<W, E>,
) -> Result<ExitCode, AppError> {
    let vocabulary = args.vocabulary.vocabulary();
    let resolution = ConfigResolver::new(&args.subcommand)
        .with_vocabulary(vocabulary.as_ref())
        .with_format(args.config_format)
        .resolve(&args.server_args)
        .map_err(LifecycleError::from)?;
    let summary = ResolutionSummary::new(&args.subcommand, &resolution);

    match args.format {
        ResolveFormat::Json => {
            let mut rendered =
                serde_json::to_vec(&summary).map_err(AppError::SerialiseResolution)?;
            rendered.push(b'\n');
            output.stdout_raw(&rendered)?;
        }
        ResolveFormat::Text => write_summary(&summary, output)?,
    }
    Ok(ExitCode::SUCCESS)
}

fn write_summary<W: Write, E: Write>(
    summary: &ResolutionSummary<'_>,
    output: &mut CommandOutput<W, E>,
) -> std::io::Result<()> {
    output.stdout_line(format_args!("subcommand: {}", summary.subcommand))?;
    match summary.config {
        Some(path) => output.stdout_line(format_args!("config: {}", path.display()))?,
        None => output.stdout_line(format_args!("config: none"))?,
    }
    output.stdout_line(format_args!(
        "arguments: {}",
        summary.arguments.tokens().join(" ")
    ))?;
    if !summary.unrecognised.is_empty() {
        output.stdout_line(format_args!(
            "unrecognised: {}",
            summary.unrecognised.join(" ")
        ))?;
    }
    if !summary.missing_values.is_empty() {
        output.stdout_line(format_args!(
            "missing value: {}",
            summary.missing_values.join(" ")
        ))?;
    }
    if let Some(expected) = summary.expected_outcome {
        output.stdout_line(format_args!("expected: {}", expected_label(expected)))?;
    }
    Ok(())
}

pub(crate) fn launch<W: Write, E: Write>(
    args: LaunchArgs,
    config: &HarnessConfig,
    output: &mut CommandOutput<W, E>,
) -> Result<ExitCode, AppError> {
    let until_signal = args.until_signal;
    let plan = LaunchPlan::new(args.server, args.workspace)
        .with_subcommand(args.subcommand)
        .with_port(args.port)
        .with_output_path(args.output_file)
        .with_config_format(args.config_format)
        .with_vocabulary(args.vocabulary.vocabulary())
        .with_server_args(args.server_args);

    let started = ServerHarness::new(config).start(&plan)?;
    let expected = started.expected_outcome();
    let readiness = started.readiness();
    output.stdout_line(format_args!(
        "server pid {} on port {}",
        started.handle().pid(),
        started.handle().port()
    ))?;
    match readiness {
        Some(event) => output.stdout_line(format_args!("readiness: {event}"))?,
        None => output.stdout_line(format_args!("readiness: none"))?,
    }
    if let Some(expected) = expected {
        output.stdout_line(format_args!("expected: {}", expected_label(expected)))?;
    }

    if until_signal {
        wait_for_signal(started.handle())?;
    }

    let stopped = started.stop()?;
    report_stopped(&stopped, readiness, expected, output)
}

/// Prints the stopped server's results.
///
/// The launch fails when the server printed its usage banner, or when it
/// closed its output without becoming ready and exited with a non-zero code.
fn report_stopped<W: Write, E: Write>(
    stopped: &StoppedServer,
    readiness: Option<ReadinessEvent>,
    expected: Option<ExpectedOutcome>,
    output: &mut CommandOutput<W, E>,
) -> Result<ExitCode, AppError> {
    match stopped.exit_code() {
        Some(code) => output.stdout_line(format_args!("exit code: {code}"))?,
        None => output.stdout_line(format_args!("exit code: none"))?,
    }
    output.stdout_line(format_args!(
        "capture: {}",
        stopped.output().path().display()
    ))?;

    let outcome = stopped.outcome();
    if let Some(expected) = expected.filter(|expected| !outcome.satisfies(*expected)) {
        warn!(
            target: COMMAND_TARGET,
            expected = expected_label(expected),
            observed = outcome_label(outcome),
            "server behaviour differed from the configuration check"
        );
    }

    output.stdout_line(format_args!("outcome: {}", outcome_label(outcome)))?;
    match outcome.usage_text() {
        Some(usage) => {
            output.stderr_block(usage)?;
            Ok(ExitCode::FAILURE)
        }
        None if exited_early(readiness, stopped.exit_code()) => Ok(ExitCode::FAILURE),
        None => Ok(ExitCode::SUCCESS),
    }
}

fn exited_early(readiness: Option<ReadinessEvent>, exit_code: Option<i32>) -> bool {
    readiness == Some(ReadinessEvent::OutputClosed) && exit_code.is_some_and(|code| code != 0)
}

/// Blocks until SIGINT or SIGTERM arrives or the server closes its output.
#[cfg(unix)]
fn wait_for_signal(handle: &ServerProcessHandle) -> Result<(), LifecycleError> {
    use signal_hook::consts::signal::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals =
        Signals::new([SIGINT, SIGTERM]).map_err(|source| LifecycleError::InstallSignals {
            source,
        })?;
    let closer = signals.handle();
    let output_closed = handle.output_closed();
    std::thread::Builder::new()
        .name(String::from("warden-output-watch"))
        .spawn(move || {
            output_closed.await_ready();
            closer.close();
        })
        .map_err(|source| LifecycleError::InstallSignals { source })?;

    info!(
        target: COMMAND_TARGET,
        pid = handle.pid(),
        "waiting for SIGINT or SIGTERM"
    );
    match signals.forever().next() {
        Some(signal) => info!(target: COMMAND_TARGET, signal, "received shutdown signal"),
        None => info!(target: COMMAND_TARGET, "server closed its output"),
    }
    Ok(())
}

#[cfg(not(unix))]
fn wait_for_signal(_handle: &ServerProcessHandle) -> Result<(), LifecycleError> {
    Err(LifecycleError::UnsupportedPlatform)
}

const fn expected_label(expected: ExpectedOutcome) -> &'static str {
    match expected {
        ExpectedOutcome::Accepted => "accepted",
        ExpectedOutcome::RejectedAtRuntime => "rejected at runtime",
    }
}

const fn outcome_label(outcome: &LaunchOutcome) -> &'static str {
    match outcome {
        LaunchOutcome::Accepted => "accepted",
        LaunchOutcome::RejectedAtRuntime(_) => "rejected at runtime",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::VocabularyArgs;
    use rstest::rstest;
    use std::fs;
    use tempfile::TempDir;

    fn resolve_args(server_args: Vec<String>, format: ResolveFormat) -> ResolveArgs {
        ResolveArgs {
            subcommand: String::from("server"),
            config_format: None,
            vocabulary: VocabularyArgs {
                flags: vec![String::from("--skip-db-cleanup")],
                options: Vec::new(),
            },
            format,
            server_args,
        }
    }

    fn run_resolve(args: &ResolveArgs) -> (ExitCode, String) {
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let exit = {
            let mut output = CommandOutput::new(&mut stdout, &mut stderr);
            resolve(args, &mut output).expect("resolve")
        };
        (exit, String::from_utf8(stdout).expect("utf8"))
    }

    #[test]
    fn text_resolution_lists_unrecognised_tokens() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("codechecker.json");
        fs::write(&path, r#"{"server": ["--dummy-option"]}"#).expect("write config");
        let config = path.to_string_lossy().into_owned();

        let args = resolve_args(
            vec![String::from("--config"), config, String::from("--verbose")],
            ResolveFormat::Text,
        );
        let (exit, stdout) = run_resolve(&args);

        assert_eq!(exit, ExitCode::SUCCESS);
        assert!(stdout.contains("arguments: --dummy-option --verbose"));
        assert!(stdout.contains("unrecognised: --dummy-option"));
        assert!(stdout.contains("expected: rejected at runtime"));
    }

    #[test]
    fn json_resolution_without_config_passes_arguments_through() {
        let args = resolve_args(vec![String::from("--skip-db-cleanup")], ResolveFormat::Json);
        let (_, stdout) = run_resolve(&args);

        let value: serde_json::Value = serde_json::from_str(&stdout).expect("json");
        assert_eq!(value["subcommand"], "server");
        assert_eq!(value["config"], serde_json::Value::Null);
        assert_eq!(value["arguments"], serde_json::json!(["--skip-db-cleanup"]));
        assert_eq!(value["unrecognised"], serde_json::json!([]));
    }

    #[test]
    fn text_resolution_lists_options_missing_their_value() {
        let mut args = resolve_args(
            vec![String::from("--name"), String::from("--skip-db-cleanup")],
            ResolveFormat::Text,
        );
        args.vocabulary.options.push(String::from("--name"));
        let (_, stdout) = run_resolve(&args);

        assert!(stdout.contains("missing value: --name"));
        assert!(!stdout.contains("unrecognised:"));
        assert!(stdout.contains("expected: rejected at runtime"));
    }

    #[rstest]
    #[case(Some(ReadinessEvent::OutputClosed), Some(3), true)]
    #[case(Some(ReadinessEvent::OutputClosed), Some(0), false)]
    #[case(Some(ReadinessEvent::OutputClosed), None, false)]
    #[case(Some(ReadinessEvent::Ready), Some(143), false)]
    #[case(None, Some(1), false)]
    fn early_non_zero_exits_fail_the_launch(
        #[case] readiness: Option<ReadinessEvent>,
        #[case] exit_code: Option<i32>,
        #[case] expected: bool,
    ) {
        assert_eq!(exited_early(readiness, exit_code), expected);
    }

    #[test]
    fn labels_read_naturally() {
        assert_eq!(expected_label(ExpectedOutcome::Accepted), "accepted");
        assert_eq!(
            outcome_label(&LaunchOutcome::RejectedAtRuntime(String::from("Usage: x"))),
            "rejected at runtime"
        );
    }
}
