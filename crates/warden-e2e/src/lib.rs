//! End-to-end support for exercising the warden harness against a real server.
//!
//! The crate ships `warden-stub-server`, a small clap-driven server that
//! behaves like the processes warden is built to launch: it accepts a
//! `server` subcommand with workspace and port flags, announces readiness on
//! stdout, prints a usage banner when it meets an unknown flag, and exits
//! cleanly on SIGTERM.
//!
//! - [`fixtures`]: configuration documents used by the scenario suites.
//! - [`stub`]: the stub server's argument specification and serve loop.

pub mod fixtures;
pub mod stub;
