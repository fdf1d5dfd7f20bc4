//! Stub server launched by the warden end-to-end suites.
//!
//! Argument errors go through clap, which prints a usage banner to stderr and
//! exits with status 2.

use std::io::{self, Write};
use std::process::ExitCode;

use clap::Parser;
use warden_e2e::stub::{StubCli, StubCommand, serve};

fn main() -> ExitCode {
    let cli = StubCli::try_parse().unwrap_or_else(|error| error.exit());
    let StubCommand::Server(args) = cli.command;
    match serve(&args, &mut io::stdout()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            let _ = writeln!(io::stderr(), "stub server failed: {error}");
            ExitCode::FAILURE
        }
    }
}
