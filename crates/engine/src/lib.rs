//! Interruptible, progress-reporting copy engine.
//!
//! A copy session moves bytes from an [`AsyncRead`](tokio::io::AsyncRead)
//! source to an [`AsyncWrite`](tokio::io::AsyncWrite) sink on a background
//! tokio task and reports what happens through a stream of [`Event`]s:
//! periodic samples while running, then exactly one terminal event
//! (`Stop`, `Error` or `Ok`) after which the stream closes.
//!
//! Cancellation is cooperative: the [`StopSignal`] is checked between buffer
//! operations, never in the middle of one.

mod copy;
mod event;
mod signal;

pub use copy::{CopyError, CopyOptions, ProgressBase, Session, copy, percent, start};
pub use event::{Event, StopCause};
pub use signal::StopSignal;

use std::time::Duration;

/// Default buffer size for a copy session: 32 KiB.
pub const DEFAULT_BUF_SIZE: usize = 32 * 1024;

/// Default interval between progress samples.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(500);

/// Capacity of the event channel between the worker and the consumer.
pub const EVENT_CHANNEL_CAPACITY: usize = 16;
