//! The copy worker and its session handle.

use std::io;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::debug;

use crate::{DEFAULT_BUF_SIZE, DEFAULT_INTERVAL, EVENT_CHANNEL_CAPACITY, Event, StopCause, StopSignal};

/// Returns the completion percentage of a transfer.
///
/// `copied` is what earlier sessions moved, `written` what the current one
/// moved. A finished transfer is always 100%, even when `total` is 0 or
/// unknown. An unfinished transfer with an unknown (or zero) total is 0%.
pub fn percent(total: Option<u64>, copied: u64, written: u64, done: bool) -> f32 {
    if done {
        return 100.0;
    }

    match total {
        Some(total) if total > 0 => {
            (copied.saturating_add(written) as f64 * 100.0 / total as f64) as f32
        }
        _ => 0.0,
    }
}

/// Progress context for a session that is part of a larger transfer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressBase {
    /// Size of the whole transfer, if known.
    pub total: Option<u64>,
    /// Bytes moved by earlier sessions.
    pub copied: u64,
}

impl ProgressBase {
    pub fn new(total: Option<u64>, copied: u64) -> Self {
        Self { total, copied }
    }

    /// Percentage after `written` more bytes.
    pub fn percent(&self, written: u64, done: bool) -> f32 {
        percent(self.total, self.copied, written, done)
    }
}

/// Per-session settings.
#[derive(Debug, Clone)]
pub struct CopyOptions {
    /// Read buffer size. 0 means [`DEFAULT_BUF_SIZE`].
    pub buf_size: usize,
    /// Sample interval. Zero disables sampling entirely.
    pub interval: Duration,
    /// When set, samples are `Progress` events instead of `Written`.
    pub progress: Option<ProgressBase>,
}

impl Default for CopyOptions {
    fn default() -> Self {
        Self {
            buf_size: DEFAULT_BUF_SIZE,
            interval: DEFAULT_INTERVAL,
            progress: None,
        }
    }
}

impl CopyOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_buf_size(mut self, buf_size: usize) -> Self {
        self.buf_size = buf_size;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Disables periodic samples; only the terminal event reports `written`.
    pub fn without_sampling(self) -> Self {
        self.with_interval(Duration::ZERO)
    }

    pub fn with_progress(mut self, progress: ProgressBase) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Buffer size actually used by the worker.
    pub fn effective_buf_size(&self) -> usize {
        if self.buf_size == 0 {
            DEFAULT_BUF_SIZE
        } else {
            self.buf_size
        }
    }

    pub fn sampling_enabled(&self) -> bool {
        !self.interval.is_zero()
    }
}

/// Errors returned by [`copy`].
#[derive(Debug, thiserror::Error)]
pub enum CopyError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("copy stopped after {written} bytes: {cause}")]
    Stopped { cause: StopCause, written: u64 },
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Handle to a running copy session.
///
/// Read events with [`next_event`](Self::next_event) until it returns `None`,
/// then call [`finish`](Self::finish) to get the reader and writer back.
pub struct Session<R, W> {
    events: mpsc::Receiver<Event>,
    worker: JoinHandle<(R, W)>,
}

impl<R, W> Session<R, W> {
    /// Receives the next event. `None` once the terminal event was delivered.
    pub async fn next_event(&mut self) -> Option<Event> {
        self.events.recv().await
    }

    /// Waits for the worker to exit and returns the reader and writer.
    ///
    /// Undelivered events are discarded; a worker still blocked on sending
    /// one exits as soon as the receiver is gone.
    pub async fn finish(self) -> io::Result<(R, W)> {
        drop(self.events);
        self.worker.await.map_err(io::Error::other)
    }
}

/// Starts a copy session on a background task.
pub fn start<R, W>(src: R, dst: W, options: CopyOptions, stop: StopSignal) -> Session<R, W>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let worker = tokio::spawn(run_session(src, dst, options, stop, tx));
    Session { events: rx, worker }
}

/// Copies `src` to `dst` and returns the number of bytes written.
///
/// Samples are discarded; a stop is reported as [`CopyError::Stopped`].
pub async fn copy<R, W>(
    src: R,
    dst: W,
    options: CopyOptions,
    stop: StopSignal,
) -> Result<u64, CopyError>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let mut session = start(src, dst, options.without_sampling(), stop);
    let mut outcome = Err(CopyError::Io(io::Error::other(
        "copy session ended without a terminal event",
    )));

    while let Some(event) = session.next_event().await {
        match event {
            Event::Ok { written } => outcome = Ok(written),
            Event::Stop { cause, written } => outcome = Err(CopyError::Stopped { cause, written }),
            Event::Error(e) => outcome = Err(CopyError::Io(e)),
            Event::Written { .. } | Event::Progress { .. } => {}
        }
    }

    session.finish().await?;
    outcome
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

/// Emits samples, skipping values that were already reported.
struct Sampler {
    tx: mpsc::Sender<Event>,
    progress: Option<ProgressBase>,
    enabled: bool,
    last_sampled: u64,
}

impl Sampler {
    /// Returns `false` if the consumer is gone.
    async fn sample(&mut self, written: u64, done: bool) -> bool {
        if !self.enabled || written == self.last_sampled {
            return true;
        }
        self.last_sampled = written;

        let event = match self.progress {
            Some(base) => Event::Progress {
                written,
                percent: base.percent(written, done),
            },
            None => Event::Written { written },
        };
        self.emit(event).await
    }

    async fn emit(&self, event: Event) -> bool {
        self.tx.send(event).await.is_ok()
    }
}

fn sample_ticker(interval: Duration) -> Option<Interval> {
    if interval.is_zero() {
        return None;
    }
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    Some(ticker)
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

/// Worker body. The event sender is dropped on return, which closes the stream.
async fn run_session<R, W>(
    mut src: R,
    mut dst: W,
    options: CopyOptions,
    stop: StopSignal,
    tx: mpsc::Sender<Event>,
) -> (R, W)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let buf_size = options.effective_buf_size();
    let mut buf = vec![0u8; buf_size];
    let mut ticker = sample_ticker(options.interval);
    let mut sampler = Sampler {
        tx,
        progress: options.progress,
        enabled: ticker.is_some(),
        last_sampled: 0,
    };
    let mut written: u64 = 0;

    debug!(
        buf_size,
        interval_ms = options.interval.as_millis() as u64,
        "copy session started"
    );

    loop {
        // Stop and sample take priority; the read only starts when neither is ready.
        tokio::select! {
            biased;
            cause = stop.stopped() => {
                if let Err(e) = dst.flush().await {
                    debug!(error = %e, written, "flush on stop failed");
                    sampler.emit(Event::Error(e)).await;
                    break;
                }
                sampler.sample(written, false).await;
                debug!(%cause, written, "copy session stopped");
                sampler.emit(Event::Stop { cause, written }).await;
                break;
            }
            _ = next_tick(&mut ticker) => {
                if !sampler.sample(written, false).await {
                    debug!(written, "event consumer dropped, abandoning session");
                    break;
                }
                continue;
            }
            _ = std::future::ready(()) => {}
        }

        let n = match src.read(&mut buf).await {
            Ok(n) => n,
            Err(e) => {
                debug!(error = %e, written, "copy session read failed");
                sampler.emit(Event::Error(e)).await;
                break;
            }
        };

        if n == 0 {
            if let Err(e) = dst.flush().await {
                debug!(error = %e, written, "final flush failed");
                sampler.emit(Event::Error(e)).await;
                break;
            }
            sampler.sample(written, true).await;
            debug!(written, "copy session completed");
            sampler.emit(Event::Ok { written }).await;
            break;
        }

        if let Err(e) = dst.write_all(&buf[..n]).await {
            debug!(error = %e, written, "copy session write failed");
            sampler.emit(Event::Error(e)).await;
            break;
        }
        written += n as u64;

        tokio::task::yield_now().await;
    }

    (src, dst)
}
