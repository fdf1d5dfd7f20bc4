//! Entrypoint for the `warden` server harness.
//!
//! Output pumps log through the global subscriber on stderr while a command
//! runs, so the streams are passed unlocked.

use std::io;
use std::process::ExitCode;

fn main() -> ExitCode {
    let mut stdout = io::stdout();
    let mut stderr = io::stderr();
    warden_cli::run(std::env::args_os(), &mut stdout, &mut stderr)
}
