//! The stub server launched by the end-to-end suites.

use std::io::{self, Write};
use std::net::{Ipv4Addr, TcpListener};
use std::path::PathBuf;

use clap::{Args, CommandFactory, Parser, Subcommand};
use warden_config::{DEFAULT_READY_MARKER, FlagVocabulary};

/// Command line accepted by `warden-stub-server`.
///
/// Repeated options keep their last value, matching how warden merges file
/// tokens ahead of command-line tokens.
#[derive(Parser, Debug)]
#[command(name = "warden-stub-server", args_override_self = true)]
pub struct StubCli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: StubCommand,
}

/// Subcommands of the stub server.
#[derive(Subcommand, Debug)]
pub enum StubCommand {
    /// Serves until SIGTERM or SIGINT.
    Server(ServeArgs),
}

/// Options of `warden-stub-server server`.
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Workspace directory.
    #[arg(long, value_name = "DIR")]
    pub workspace: PathBuf,
    /// Loopback port to listen on.
    #[arg(long, short = 'p')]
    pub port: u16,
    /// Skips the database cleanup step.
    #[arg(long)]
    pub skip_db_cleanup: bool,
    /// Name announced at startup.
    #[arg(long)]
    pub name: Option<String>,
    /// Announces extra startup detail.
    #[arg(long)]
    pub verbose: bool,
}

/// Flags the stub's `server` subcommand accepts.
#[must_use]
pub fn stub_vocabulary() -> FlagVocabulary {
    FlagVocabulary::from_subcommand(&StubCli::command(), "server").unwrap_or_default()
}

/// Binds the port, announces readiness on `out` and waits for shutdown.
///
/// # Errors
///
/// Returns an error when the port cannot be bound, the signal handlers cannot
/// be installed, or `out` cannot be written.
pub fn serve<W: Write>(args: &ServeArgs, out: &mut W) -> io::Result<()> {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, args.port))?;
    let shutdown = Shutdown::install()?;

    if let Some(name) = args.name.as_deref() {
        writeln!(out, "Server name: {name}")?;
    }
    if args.skip_db_cleanup {
        writeln!(out, "Database cleanup skipped")?;
    }
    if args.verbose {
        writeln!(out, "Workspace: {}", args.workspace.display())?;
    }
    writeln!(out, "{DEFAULT_READY_MARKER} on {}", listener.local_addr()?)?;
    out.flush()?;

    shutdown.wait(&listener)
}

#[cfg(unix)]
struct Shutdown {
    signals: signal_hook::iterator::Signals,
}

#[cfg(unix)]
impl Shutdown {
    fn install() -> io::Result<Self> {
        use signal_hook::consts::signal::{SIGINT, SIGTERM};
        let signals = signal_hook::iterator::Signals::new([SIGTERM, SIGINT])?;
        Ok(Self { signals })
    }

    fn wait(mut self, _listener: &TcpListener) -> io::Result<()> {
        let _signal = self.signals.forever().next();
        Ok(())
    }
}

#[cfg(not(unix))]
struct Shutdown;

#[cfg(not(unix))]
impl Shutdown {
    const fn install() -> io::Result<Self> {
        Ok(Self)
    }

    fn wait(self, listener: &TcpListener) -> io::Result<()> {
        loop {
            let (stream, _) = listener.accept()?;
            drop(stream);
        }
    }
}
