//! Server shutdown utilities.
//!
//! Provides helpers for asking the server to stop, waiting out the grace
//! period, and forcing termination when it does not comply. On Unix the
//! server leads its own process group, so signals go to the whole group and
//! workers it forked cannot outlive it.

use std::io;
use std::process::{Child, ExitStatus};
use std::thread;
use std::time::{Duration, Instant};

use tracing::warn;

use super::LIFECYCLE_TARGET;
use super::error::LifecycleError;

#[cfg(unix)]
use libc::{SIGKILL, SIGTERM, kill};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Stops `child`, returning its exit status.
///
/// A child that already exited is simply reaped. Otherwise SIGTERM is sent
/// and the child gets `grace` to exit before it is killed. Whatever is left
/// of the process group afterwards is killed.
pub(super) fn terminate(child: &mut Child, grace: Duration) -> Result<ExitStatus, LifecycleError> {
    let status = stop_leader(child, grace)?;
    sweep_group(child.id());
    Ok(status)
}

fn stop_leader(child: &mut Child, grace: Duration) -> Result<ExitStatus, LifecycleError> {
    let pid = child.id();
    if let Some(status) = child
        .try_wait()
        .map_err(|source| LifecycleError::Wait { pid, source })?
    {
        return Ok(status);
    }
    match signal_server(pid) {
        Ok(()) => {
            if let Some(status) = wait_for_exit(child, grace)? {
                return Ok(status);
            }
            warn!(
                target: LIFECYCLE_TARGET,
                pid,
                grace_ms = grace.as_millis(),
                "server ignored termination request; killing"
            );
        }
        Err(error) => {
            warn!(target: LIFECYCLE_TARGET, pid, %error, "termination request failed; killing");
        }
    }
    force_kill(child)
}

/// Polls the child until it exits or `grace` elapses.
pub(super) fn wait_for_exit(
    child: &mut Child,
    grace: Duration,
) -> Result<Option<ExitStatus>, LifecycleError> {
    let pid = child.id();
    let deadline = Instant::now() + grace;
    loop {
        if let Some(status) = child
            .try_wait()
            .map_err(|source| LifecycleError::Wait { pid, source })?
        {
            return Ok(Some(status));
        }
        let now = Instant::now();
        if now >= deadline {
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL.min(deadline - now));
    }
}

/// Kills the child and its process group, then reaps the child.
pub(super) fn force_kill(child: &mut Child) -> Result<ExitStatus, LifecycleError> {
    let pid = child.id();
    sweep_group(pid);
    match child.kill() {
        Ok(()) => {}
        // The child exited between the last poll and the kill.
        Err(error) if error.kind() == io::ErrorKind::InvalidInput => {}
        Err(source) => return Err(LifecycleError::Kill { pid, source }),
    }
    child
        .wait()
        .map_err(|source| LifecycleError::Wait { pid, source })
}

/// Sends SIGTERM to the server's process group.
///
/// # Errors
///
/// Returns `SignalFailed` when the signal cannot be delivered and
/// `UnsupportedPlatform` where signalling is unavailable.
pub(super) fn signal_server(pid: u32) -> Result<(), LifecycleError> {
    #[cfg(unix)]
    {
        signal_group(pid, SIGTERM).map_err(|source| LifecycleError::SignalFailed { pid, source })
    }
    #[cfg(not(unix))]
    {
        let _ = pid;
        Err(LifecycleError::UnsupportedPlatform)
    }
}

/// Kills every process left in the group led by `pid`.
///
/// An empty group is the normal case and is not reported.
fn sweep_group(pid: u32) {
    #[cfg(unix)]
    {
        match signal_group(pid, SIGKILL) {
            Ok(()) => {}
            Err(error) if error.raw_os_error() == Some(libc::ESRCH) => {}
            Err(error) => {
                warn!(target: LIFECYCLE_TARGET, pid, %error, "failed to kill server process group");
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = pid;
    }
}

#[cfg(unix)]
fn signal_group(pid: u32, signal: libc::c_int) -> io::Result<()> {
    let group = libc::pid_t::try_from(pid)
        .map_err(|_| io::Error::from(io::ErrorKind::InvalidInput))?;
    // SAFETY: `kill(2)` is memory-safe even when the group is gone; the
    // kernel reports the failure through errno.
    let result = unsafe { kill(-group, signal) };
    if result == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}
