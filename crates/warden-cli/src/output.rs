//! Writers used by the command handlers.

use std::fmt;
use std::io::{self, Write};

/// Line-oriented access to the stdout and stderr the CLI was given.
pub(crate) struct CommandOutput<W: Write, E: Write> {
    stdout: W,
    stderr: E,
}

impl<W: Write, E: Write> CommandOutput<W, E> {
    pub(crate) fn new(stdout: W, stderr: E) -> Self {
        Self { stdout, stderr }
    }

    pub(crate) fn stdout_line(&mut self, args: fmt::Arguments<'_>) -> io::Result<()> {
        write_line(&mut self.stdout, args)
    }

    pub(crate) fn stderr_line(&mut self, args: fmt::Arguments<'_>) -> io::Result<()> {
        write_line(&mut self.stderr, args)
    }

    /// Copies multi-line text to stderr, terminating the last line.
    pub(crate) fn stderr_block(&mut self, text: &str) -> io::Result<()> {
        self.stderr.write_all(text.as_bytes())?;
        if !text.ends_with('\n') {
            self.stderr.write_all(b"\n")?;
        }
        self.stderr.flush()
    }

    pub(crate) fn stdout_raw(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.stdout.write_all(bytes)?;
        self.stdout.flush()
    }
}

fn write_line<T: Write>(writer: &mut T, args: fmt::Arguments<'_>) -> io::Result<()> {
    writer.write_fmt(args)?;
    writer.write_all(b"\n")?;
    writer.flush()
}
