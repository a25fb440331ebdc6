//! Side channel for human-readable hub lifecycle events.
//!
//! The hub reports joins, leaves, received messages and per-recipient
//! deliveries through a [`Tracer`]. Tracing is never on the correctness
//! path: [`NoopTracer`] can replace any other implementation without
//! changing hub behavior.

use std::fmt;
use std::io::Write;
use std::str::FromStr;
use std::sync::Arc;
use std::thread;

use tokio::sync::mpsc;

/// Events a [`WriterTracer`] buffers before it starts discarding them.
const TRACE_BACKLOG: usize = 1024;

/// Sink for lifecycle event strings.
///
/// Implementations must not block for long and must swallow their own
/// failures.
pub trait Tracer: Send + Sync + fmt::Debug {
    /// Records one event.
    fn trace(&self, event: &str);
}

/// Forwards events to the `tracing` subscriber under the `hub` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTracer;

impl Tracer for LogTracer {
    fn trace(&self, event: &str) {
        tracing::info!(target: "hub", "{event}");
    }
}

/// Writes one line per event to any [`Write`] implementation.
///
/// Writes happen on a dedicated worker thread that owns `W`; [`trace`]
/// only enqueues. When the worker falls more than a backlog behind, new
/// events are discarded.
///
/// [`trace`]: Tracer::trace
#[derive(Debug)]
pub struct WriterTracer<W> {
    events: mpsc::Sender<String>,
    worker: thread::JoinHandle<W>,
}

impl<W: Write + Send + 'static> WriterTracer<W> {
    /// Creates a tracer writing to `out` from a background thread.
    #[must_use]
    pub fn new(mut out: W) -> Self {
        let (events, mut rx) = mpsc::channel::<String>(TRACE_BACKLOG);
        let worker = thread::spawn(move || {
            while let Some(event) = rx.blocking_recv() {
                let _ = writeln!(out, "{event}");
            }
            let _ = out.flush();
            out
        });
        Self { events, worker }
    }

    /// Stops the worker once it has written every queued event and returns
    /// the underlying writer.
    ///
    /// Returns `None` if the worker thread panicked.
    pub fn into_inner(self) -> Option<W> {
        let Self { events, worker } = self;
        drop(events);
        worker.join().ok()
    }
}

impl<W: Write + Send + fmt::Debug> Tracer for WriterTracer<W> {
    fn trace(&self, event: &str) {
        let _ = self.events.try_send(event.to_owned());
    }
}

/// Tracer that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTracer;

impl Tracer for NoopTracer {
    fn trace(&self, _event: &str) {}
}

/// Which [`Tracer`] the server binary installs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TraceMode {
    /// [`LogTracer`].
    #[default]
    Log,
    /// [`WriterTracer`] over standard output.
    Stdout,
    /// [`NoopTracer`].
    Off,
}

impl TraceMode {
    /// Builds the tracer for this mode.
    #[must_use]
    pub fn build(self) -> Arc<dyn Tracer> {
        match self {
            Self::Log => Arc::new(LogTracer),
            Self::Stdout => Arc::new(WriterTracer::new(std::io::stdout())),
            Self::Off => Arc::new(NoopTracer),
        }
    }
}

impl FromStr for TraceMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "log" => Ok(Self::Log),
            "stdout" => Ok(Self::Stdout),
            "off" | "none" => Ok(Self::Off),
            other => Err(format!("unknown trace mode: {other}")),
        }
    }
}
