//! The task contract and the runner that drives a task through one session.

use iocopy_engine::{CopyOptions, Event, ProgressBase, StopCause, StopSignal, percent};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use crate::TaskError;

/// A resumable transfer.
///
/// The reader and writer are moved out for the duration of a session with
/// [`take_io`](Self::take_io). When the session ends the runner closes both:
/// the reader is dropped, the writer is shut down and handed back with
/// [`restore_writer`](Self::restore_writer) so `snapshot` and `result` can
/// still inspect it.
pub trait Task: Send {
    type Reader: AsyncRead + Unpin + Send + 'static;
    type Writer: AsyncWrite + Unpin + Send + 'static;

    /// Size of the whole transfer, if known.
    fn total(&self) -> Option<u64>;

    fn is_total_known(&self) -> bool {
        self.total().is_some()
    }

    /// Bytes accounted for by earlier sessions.
    fn copied(&self) -> u64;

    fn set_copied(&mut self, copied: u64);

    /// Moves the reader and writer out. `None` once a session has taken them.
    fn take_io(&mut self) -> Option<(Self::Reader, Self::Writer)>;

    /// Hands back the writer, already shut down, after a session.
    fn restore_writer(&mut self, writer: Self::Writer);

    /// Serializes everything needed to rebuild the task at `copied`.
    fn snapshot(&self) -> Result<Vec<u8>, TaskError>;

    /// Payload reported on successful completion, if the task has one.
    fn result(&self) -> Result<Option<Vec<u8>>, TaskError> {
        Ok(None)
    }
}

/// Reader and writer slots of a task.
///
/// Both leave together through [`take`](Self::take); only the writer comes
/// back, through [`restore_writer`](Self::restore_writer).
#[derive(Debug)]
pub struct TaskIo<R, W> {
    reader: Option<R>,
    writer: Option<W>,
}

impl<R, W> TaskIo<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader: Some(reader),
            writer: Some(writer),
        }
    }

    /// Moves both out. `None` unless both are present.
    pub fn take(&mut self) -> Option<(R, W)> {
        if self.reader.is_none() || self.writer.is_none() {
            return None;
        }
        Some((self.reader.take()?, self.writer.take()?))
    }

    pub fn restore_writer(&mut self, writer: W) {
        self.writer = Some(writer);
    }

    pub fn writer(&self) -> Option<&W> {
        self.writer.as_ref()
    }

    pub fn writer_mut(&mut self) -> Option<&mut W> {
        self.writer.as_mut()
    }

    pub fn has_reader(&self) -> bool {
        self.reader.is_some()
    }
}

/// Progress of a task as seen by callbacks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    pub total: Option<u64>,
    /// Bytes copied overall, including earlier sessions.
    pub copied: u64,
    /// Bytes written in the current session.
    pub written: u64,
    pub percent: f32,
}

impl Progress {
    fn new(total: Option<u64>, base: u64, written: u64, done: bool) -> Self {
        Self {
            total,
            copied: base + written,
            written,
            percent: percent(total, base, written, done),
        }
    }

    pub fn is_total_known(&self) -> bool {
        self.total.is_some()
    }
}

/// Receives the events of a task run. Every method defaults to a no-op.
///
/// Exactly one of `on_stop`, `on_ok` and `on_error` is called per run.
pub trait TaskHandler {
    fn on_progress(&mut self, _progress: &Progress) {}

    /// `snapshot` is what the task's `load` accepts to resume.
    fn on_stop(&mut self, _progress: &Progress, _cause: StopCause, _snapshot: &[u8]) {}

    fn on_ok(&mut self, _progress: &Progress, _result: Option<&[u8]>) {}

    fn on_error(&mut self, _err: &TaskError) {}
}

impl TaskHandler for () {}

type ProgressFn<'a> = Box<dyn FnMut(&Progress) + Send + 'a>;
type StopFn<'a> = Box<dyn FnMut(&Progress, StopCause, &[u8]) + Send + 'a>;
type OkFn<'a> = Box<dyn FnMut(&Progress, Option<&[u8]>) + Send + 'a>;
type ErrorFn<'a> = Box<dyn FnMut(&TaskError) + Send + 'a>;

/// [`TaskHandler`] built from closures. Unset callbacks do nothing.
#[derive(Default)]
pub struct FnHandler<'a> {
    progress: Option<ProgressFn<'a>>,
    stop: Option<StopFn<'a>>,
    ok: Option<OkFn<'a>>,
    error: Option<ErrorFn<'a>>,
}

impl<'a> FnHandler<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_progress(mut self, f: impl FnMut(&Progress) + Send + 'a) -> Self {
        self.progress = Some(Box::new(f));
        self
    }

    pub fn with_stop(mut self, f: impl FnMut(&Progress, StopCause, &[u8]) + Send + 'a) -> Self {
        self.stop = Some(Box::new(f));
        self
    }

    pub fn with_ok(mut self, f: impl FnMut(&Progress, Option<&[u8]>) + Send + 'a) -> Self {
        self.ok = Some(Box::new(f));
        self
    }

    pub fn with_error(mut self, f: impl FnMut(&TaskError) + Send + 'a) -> Self {
        self.error = Some(Box::new(f));
        self
    }
}

impl TaskHandler for FnHandler<'_> {
    fn on_progress(&mut self, progress: &Progress) {
        if let Some(f) = &mut self.progress {
            f(progress);
        }
    }

    fn on_stop(&mut self, progress: &Progress, cause: StopCause, snapshot: &[u8]) {
        if let Some(f) = &mut self.stop {
            f(progress, cause, snapshot);
        }
    }

    fn on_ok(&mut self, progress: &Progress, result: Option<&[u8]>) {
        if let Some(f) = &mut self.ok {
            f(progress, result);
        }
    }

    fn on_error(&mut self, err: &TaskError) {
        if let Some(f) = &mut self.error {
            f(err);
        }
    }
}

/// How a run ended.
#[derive(Debug)]
pub enum Outcome {
    Completed {
        progress: Progress,
        result: Option<Vec<u8>>,
    },
    Stopped {
        progress: Progress,
        cause: StopCause,
        snapshot: Vec<u8>,
    },
    Failed(TaskError),
}

impl Outcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Outcome::Completed { .. })
    }
}

fn fail(handler: &mut impl TaskHandler, err: TaskError) -> Outcome {
    warn!(error = %err, "task failed");
    handler.on_error(&err);
    Outcome::Failed(err)
}

/// Runs `task` through one copy session.
///
/// On `Stop` and `Ok` the task's `copied` is advanced by the bytes written;
/// on error it is left untouched. The reader is dropped and the writer shut
/// down exactly once before the task gets the writer back.
pub async fn run<T: Task>(
    task: &mut T,
    options: CopyOptions,
    stop: StopSignal,
    handler: &mut impl TaskHandler,
) -> Outcome {
    let total = task.total();
    let base = task.copied();
    let Some((reader, writer)) = task.take_io() else {
        return fail(handler, TaskError::IoInUse);
    };

    debug!(?total, copied = base, "task run started");
    let options = options.with_progress(ProgressBase::new(total, base));
    let mut session = iocopy_engine::start(reader, writer, options, stop);

    let mut terminal = None;
    while let Some(event) = session.next_event().await {
        match event {
            Event::Progress { written, percent } => {
                let progress = Progress {
                    percent,
                    ..Progress::new(total, base, written, false)
                };
                handler.on_progress(&progress);
            }
            Event::Written { written } => {
                handler.on_progress(&Progress::new(total, base, written, false));
            }
            other => terminal = Some(other),
        }
    }

    let (reader, mut writer) = match session.finish().await {
        Ok(io) => io,
        Err(e) => return fail(handler, TaskError::Copy(e)),
    };
    drop(reader);
    let shutdown = writer.shutdown().await;
    task.restore_writer(writer);

    let terminal = match (terminal, shutdown) {
        (Some(Event::Error(e)), shutdown) => {
            if let Err(close_err) = shutdown {
                warn!(error = %close_err, "closing writer after failed copy");
            }
            return fail(handler, TaskError::Copy(e));
        }
        (_, Err(e)) => return fail(handler, TaskError::Copy(e)),
        (Some(event), Ok(())) => event,
        (None, Ok(())) => {
            return fail(
                handler,
                TaskError::Copy(std::io::Error::other("copy session ended without a result")),
            );
        }
    };

    match terminal {
        Event::Stop { cause, written } => {
            let progress = Progress::new(total, base, written, false);
            task.set_copied(progress.copied);
            debug!(%cause, copied = progress.copied, "task stopped");
            match task.snapshot() {
                Ok(snapshot) => {
                    handler.on_stop(&progress, cause, &snapshot);
                    Outcome::Stopped {
                        progress,
                        cause,
                        snapshot,
                    }
                }
                Err(e) => fail(handler, e),
            }
        }
        Event::Ok { written } => {
            let progress = Progress::new(total, base, written, true);
            task.set_copied(progress.copied);
            debug!(copied = progress.copied, "task completed");
            match task.result() {
                Ok(result) => {
                    handler.on_ok(&progress, result.as_deref());
                    Outcome::Completed { progress, result }
                }
                Err(e) => fail(handler, e),
            }
        }
        // Samples were consumed in the loop and errors handled above.
        Event::Written { .. } | Event::Progress { .. } | Event::Error(_) => fail(
            handler,
            TaskError::Copy(std::io::Error::other("unexpected terminal event")),
        ),
    }
}
