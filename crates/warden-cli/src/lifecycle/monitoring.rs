//! Output pumps and readiness detection.
//!
//! Each child stream is drained by its own thread into the shared capture
//! file. Every complete line is inspected: the first line carrying the
//! readiness marker or a usage banner (or both streams closing) sets the
//! lifecycle signal.

use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use once_cell::sync::OnceCell;
use tracing::{debug, info, warn};

use super::LIFECYCLE_TARGET;
use super::error::LifecycleError;
use super::signal::LifecycleSynchronizer;

/// First event that released readiness waiters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessEvent {
    /// The server printed its readiness marker.
    Ready,
    /// The server printed its usage banner.
    UsageBanner,
    /// Both output streams closed without either line appearing.
    OutputClosed,
}

impl fmt::Display for ReadinessEvent {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready => formatter.write_str("ready"),
            Self::UsageBanner => formatter.write_str("usage banner"),
            Self::OutputClosed => formatter.write_str("output closed"),
        }
    }
}

/// Watches pumped lines for readiness events.
#[derive(Debug)]
pub(super) struct ReadinessWatch {
    marker: String,
    banner_prefix: String,
    open_streams: AtomicUsize,
    event: OnceCell<ReadinessEvent>,
    ready: LifecycleSynchronizer,
    closed: LifecycleSynchronizer,
}

impl ReadinessWatch {
    pub(super) fn new(
        marker: impl Into<String>,
        banner_prefix: impl Into<String>,
        ready: LifecycleSynchronizer,
    ) -> Self {
        Self {
            marker: marker.into(),
            banner_prefix: banner_prefix.into(),
            open_streams: AtomicUsize::new(STREAM_COUNT),
            event: OnceCell::new(),
            ready,
            closed: LifecycleSynchronizer::new(),
        }
    }

    /// Event that released the readiness signal, once one has happened.
    pub(super) fn event(&self) -> Option<ReadinessEvent> {
        self.event.get().copied()
    }

    /// Signal set once every output stream has closed.
    pub(super) fn closed(&self) -> &LifecycleSynchronizer {
        &self.closed
    }

    fn observe(&self, line: &str) {
        if self.event.get().is_some() {
            return;
        }
        if !self.marker.is_empty() && line.contains(&self.marker) {
            self.fire(ReadinessEvent::Ready);
        } else if !self.banner_prefix.is_empty()
            && line.trim_start().starts_with(&self.banner_prefix)
        {
            self.fire(ReadinessEvent::UsageBanner);
        }
    }

    fn stream_closed(&self) {
        if self.open_streams.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.fire(ReadinessEvent::OutputClosed);
            self.closed.set();
        }
    }

    fn fire(&self, event: ReadinessEvent) {
        if self.event.set(event).is_ok() {
            info!(target: LIFECYCLE_TARGET, %event, "server readiness observed");
            self.ready.set();
        }
    }
}

const STREAM_COUNT: usize = 2;

/// Capture file shared by both pumps.
pub(super) type CaptureSink = Arc<Mutex<File>>;

/// Starts a thread that copies `reader` into `sink` line by line.
pub(super) fn spawn_pump<R>(
    stream: &'static str,
    reader: R,
    sink: CaptureSink,
    watch: Arc<ReadinessWatch>,
) -> Result<JoinHandle<()>, LifecycleError>
where
    R: Read + Send + 'static,
{
    thread::Builder::new()
        .name(format!("warden-{stream}-pump"))
        .spawn(move || pump(stream, reader, &sink, &watch))
        .map_err(|source| LifecycleError::SpawnPump { stream, source })
}

fn pump<R: Read>(stream: &'static str, reader: R, sink: &CaptureSink, watch: &ReadinessWatch) {
    let mut reader = BufReader::new(reader);
    let mut line = Vec::new();
    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line) {
            Ok(0) => break,
            Ok(_) => {
                write_line(stream, sink, &line);
                watch.observe(&String::from_utf8_lossy(&line));
            }
            Err(error) => {
                warn!(target: LIFECYCLE_TARGET, stream, %error, "failed to read server output");
                break;
            }
        }
    }
    debug!(target: LIFECYCLE_TARGET, stream, "server output stream closed");
    watch.stream_closed();
}

fn write_line(stream: &'static str, sink: &CaptureSink, line: &[u8]) {
    let mut file = sink.lock().unwrap_or_else(PoisonError::into_inner);
    if let Err(error) = file.write_all(line).and_then(|()| file.flush()) {
        warn!(target: LIFECYCLE_TARGET, stream, %error, "failed to capture server output");
    }
}
