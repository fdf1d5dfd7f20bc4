//! Ownership of one running server process.

use std::fs::File;
use std::io::Read;
use std::process::{Child, ExitStatus};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::{info, warn};
use warden_config::MergedArguments;

use super::LIFECYCLE_TARGET;
use super::capture::{CapturedOutput, LaunchOutcome, create_capture_file};
use super::error::LifecycleError;
use super::monitoring::{ReadinessEvent, ReadinessWatch, spawn_pump};
use super::shutdown::{force_kill, terminate};
use super::signal::LifecycleSynchronizer;
use super::spawning::{LaunchRequest, spawn_server};

/// A launched server, its output pumps and its lifecycle signal.
///
/// Dropping a handle whose server is still running kills the server.
#[derive(Debug)]
pub struct ServerProcessHandle {
    child: Option<Child>,
    pid: u32,
    port: u16,
    sync: LifecycleSynchronizer,
    watch: Arc<ReadinessWatch>,
    pumps: Vec<JoinHandle<()>>,
    output: CapturedOutput,
    stop_grace: Duration,
    usage_banner_prefix: String,
}

/// Final state of a stopped server.
#[derive(Debug, Clone)]
pub struct StoppedServer {
    exit_status: Option<ExitStatus>,
    output: CapturedOutput,
    outcome: LaunchOutcome,
}

impl StoppedServer {
    pub const fn exit_status(&self) -> Option<ExitStatus> {
        self.exit_status
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.exit_status.and_then(|status| status.code())
    }

    pub const fn output(&self) -> &CapturedOutput {
        &self.output
    }

    pub const fn outcome(&self) -> &LaunchOutcome {
        &self.outcome
    }
}

impl ServerProcessHandle {
    /// Starts the server described by `request` with `merged` arguments.
    ///
    /// The capture file is created before the spawn. If the pumps cannot be
    /// started the child is killed and reaped before the error is returned.
    pub fn launch(
        request: &LaunchRequest,
        merged: &MergedArguments,
    ) -> Result<Self, LifecycleError> {
        let sink = Arc::new(Mutex::new(create_capture_file(request.output_path())?));
        let mut child = spawn_server(request, merged)?;
        let pid = child.id();
        let settings = request.settings();
        let sync = LifecycleSynchronizer::new();
        let watch = Arc::new(ReadinessWatch::new(
            settings.ready_marker.as_str(),
            settings.usage_banner_prefix.as_str(),
            sync.clone(),
        ));

        let pumps = match start_pumps(&mut child, &sink, &watch) {
            Ok(pumps) => pumps,
            Err(error) => {
                if let Err(kill_error) = force_kill(&mut child) {
                    warn!(target: LIFECYCLE_TARGET, pid, error = %kill_error, "failed to reap server");
                }
                return Err(error);
            }
        };

        info!(
            target: LIFECYCLE_TARGET,
            pid,
            port = request.port(),
            program = ?request.program(),
            capture = %request.output_path().display(),
            "server launched"
        );
        Ok(Self {
            child: Some(child),
            pid,
            port: request.port(),
            sync,
            watch,
            pumps,
            output: CapturedOutput::new(request.output_path()),
            stop_grace: settings.stop_grace,
            usage_banner_prefix: settings.usage_banner_prefix.clone(),
        })
    }

    pub const fn pid(&self) -> u32 {
        self.pid
    }

    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Signal set at the first readiness event and again after stopping.
    pub const fn synchronizer(&self) -> &LifecycleSynchronizer {
        &self.sync
    }

    /// Signal set once the server's output streams have both closed.
    pub fn output_closed(&self) -> LifecycleSynchronizer {
        self.watch.closed().clone()
    }

    pub const fn output(&self) -> &CapturedOutput {
        &self.output
    }

    /// Event that released readiness waiters, if one has happened yet.
    pub fn readiness(&self) -> Option<ReadinessEvent> {
        self.watch.event()
    }

    /// Blocks until the first readiness event.
    pub fn await_ready(&self) -> Option<ReadinessEvent> {
        self.sync.await_ready();
        self.readiness()
    }

    /// Blocks until the first readiness event or until `timeout` expires.
    pub fn await_ready_within(
        &self,
        timeout: Duration,
    ) -> Result<Option<ReadinessEvent>, LifecycleError> {
        self.sync
            .await_ready_within(timeout)
            .map_err(|elapsed| LifecycleError::ReadyTimeout {
                timeout_ms: u64::try_from(elapsed.timeout.as_millis()).unwrap_or(u64::MAX),
                capture: self.output.path().to_path_buf(),
            })?;
        Ok(self.readiness())
    }

    /// Classifies the output captured so far.
    pub fn outcome(&self) -> Result<LaunchOutcome, LifecycleError> {
        self.output.outcome(&self.usage_banner_prefix)
    }

    /// Terminates the server, drains its output and signals the stop phase.
    pub fn stop(mut self) -> Result<StoppedServer, LifecycleError> {
        let exit_status = match self.child.take() {
            Some(mut child) => match terminate(&mut child, self.stop_grace) {
                Ok(status) => Some(status),
                Err(error) => {
                    self.child = Some(child);
                    return Err(error);
                }
            },
            None => None,
        };
        drain_pumps(
            std::mem::take(&mut self.pumps),
            self.watch.closed(),
            self.stop_grace,
            self.pid,
        );
        self.sync.signal_stop();
        let outcome = self.outcome()?;
        info!(
            target: LIFECYCLE_TARGET,
            pid = self.pid,
            exit_code = ?exit_status.and_then(|status| status.code()),
            rejected = outcome.is_rejected(),
            "server stopped"
        );
        Ok(StoppedServer {
            exit_status,
            output: self.output.clone(),
            outcome,
        })
    }
}

impl Drop for ServerProcessHandle {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            match force_kill(&mut child) {
                Ok(_) => warn!(target: LIFECYCLE_TARGET, pid = self.pid, "reaped abandoned server"),
                Err(error) => {
                    warn!(target: LIFECYCLE_TARGET, pid = self.pid, %error, "failed to kill abandoned server");
                }
            }
        }
    }
}

/// Joins the pumps once both output streams have closed.
///
/// A process that left the server's group can hold the streams open past
/// `grace`. The pumps are then detached and finish whenever the streams
/// close. Returns whether the pumps were joined.
fn drain_pumps(
    pumps: Vec<JoinHandle<()>>,
    closed: &LifecycleSynchronizer,
    grace: Duration,
    pid: u32,
) -> bool {
    if closed.await_ready_within(grace).is_err() {
        warn!(
            target: LIFECYCLE_TARGET,
            pid,
            grace_ms = grace.as_millis(),
            "server output still open after shutdown; detaching output pumps"
        );
        return false;
    }
    for pump in pumps {
        if pump.join().is_err() {
            warn!(target: LIFECYCLE_TARGET, pid, "output pump panicked");
        }
    }
    true
}

fn start_pumps(
    child: &mut Child,
    sink: &Arc<Mutex<File>>,
    watch: &Arc<ReadinessWatch>,
) -> Result<Vec<JoinHandle<()>>, LifecycleError> {
    let stdout = child
        .stdout
        .take()
        .ok_or(LifecycleError::MissingPipe { stream: "stdout" })?;
    let stderr = child
        .stderr
        .take()
        .ok_or(LifecycleError::MissingPipe { stream: "stderr" })?;
    let streams: [(&'static str, Box<dyn Read + Send>); 2] =
        [("stdout", Box::new(stdout)), ("stderr", Box::new(stderr))];
    let mut pumps = Vec::with_capacity(streams.len());
    for (name, stream) in streams {
        pumps.push(spawn_pump(name, stream, Arc::clone(sink), Arc::clone(watch))?);
    }
    Ok(pumps)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::lifecycle::LaunchSettings;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Instant;

    fn launch(dir: &tempfile::TempDir, script: &str) -> ServerProcessHandle {
        // `sh SCRIPT --workspace DIR --port PORT` runs the script with the
        // injected flags as positional parameters.
        let script_path = dir.path().join("server.sh");
        std::fs::write(&script_path, script).expect("write script");
        let request = LaunchRequest::new("sh", dir.path(), 8001, dir.path().join("server_output.log"))
            .with_subcommand(Some(script_path.to_string_lossy().into_owned()))
            .with_settings(LaunchSettings {
                stop_grace: Duration::from_secs(2),
                ..LaunchSettings::default()
            });
        ServerProcessHandle::launch(&request, &MergedArguments::default()).expect("launch server")
    }

    #[test]
    fn readiness_marker_releases_waiters_and_stop_reaps() {
        let dir = tempfile::tempdir().expect("temp dir");
        let handle = launch(
            &dir,
            "echo 'Server waiting for client requests on 127.0.0.1:8001'; exec sleep 30",
        );
        let event = handle
            .await_ready_within(Duration::from_secs(10))
            .expect("server ready");
        assert_eq!(event, Some(ReadinessEvent::Ready));

        let observer = handle.synchronizer().clone();
        observer.clear();
        let stopped = handle.stop().expect("stop server");
        assert!(observer.is_set());
        assert_eq!(stopped.outcome(), &LaunchOutcome::Accepted);
        assert!(stopped
            .output()
            .contains("Server waiting for client requests")
            .expect("read capture"));
    }

    #[test]
    fn stop_is_not_held_up_by_background_workers() {
        let dir = tempfile::tempdir().expect("temp dir");
        let handle = launch(
            &dir,
            "sleep 20 & echo 'Server waiting for client requests on 127.0.0.1:8001'; exec sleep 30",
        );
        handle
            .await_ready_within(Duration::from_secs(10))
            .expect("server ready");

        let started = Instant::now();
        let stopped = handle.stop().expect("stop server");
        assert!(
            started.elapsed() < Duration::from_secs(8),
            "stop took {:?}",
            started.elapsed()
        );
        assert_eq!(stopped.outcome(), &LaunchOutcome::Accepted);
    }

    #[test]
    fn drain_detaches_pumps_whose_streams_stay_open() {
        let (release, blocked) = mpsc::channel::<()>();
        let pump = thread::spawn(move || {
            let _ = blocked.recv();
        });
        let closed = LifecycleSynchronizer::new();

        let started = Instant::now();
        let joined = drain_pumps(vec![pump], &closed, Duration::from_millis(100), 1);
        assert!(!joined);
        assert!(started.elapsed() < Duration::from_secs(5));
        drop(release);
    }

    #[test]
    fn drain_joins_pumps_once_streams_close() {
        let pump = thread::spawn(|| {});
        let closed = LifecycleSynchronizer::new();
        closed.set();
        assert!(drain_pumps(vec![pump], &closed, Duration::from_secs(1), 1));
    }

    #[test]
    fn usage_banner_is_reported_as_rejection() {
        let dir = tempfile::tempdir().expect("temp dir");
        let handle = launch(&dir, "echo 'Usage: stub server [OPTIONS]' >&2; exit 2");
        handle
            .await_ready_within(Duration::from_secs(10))
            .expect("banner observed");
        let stopped = handle.stop().expect("stop server");
        assert_eq!(stopped.exit_code(), Some(2));
        assert!(stopped.outcome().is_rejected());
    }

    #[test]
    fn silent_exit_releases_waiters() {
        let dir = tempfile::tempdir().expect("temp dir");
        let handle = launch(&dir, "exit 0");
        let event = handle
            .await_ready_within(Duration::from_secs(10))
            .expect("output closed");
        assert_eq!(event, Some(ReadinessEvent::OutputClosed));
    }

    #[test]
    fn bounded_wait_reports_the_capture_path() {
        let dir = tempfile::tempdir().expect("temp dir");
        let handle = launch(&dir, "exec sleep 30");
        let error = handle
            .await_ready_within(Duration::from_millis(100))
            .expect_err("server never becomes ready");
        match error {
            LifecycleError::ReadyTimeout { capture, .. } => {
                assert_eq!(capture, dir.path().join("server_output.log"));
            }
            other => panic!("expected ReadyTimeout, got: {other:?}"),
        }
        drop(handle);
    }
}
