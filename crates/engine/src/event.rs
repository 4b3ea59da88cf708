//! Events emitted by a copy session.

use std::io;

/// Why a session stopped before the source was exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum StopCause {
    /// The stop signal was cancelled explicitly.
    #[error("copy cancelled")]
    Cancelled,

    /// The stop signal's deadline passed.
    #[error("deadline exceeded")]
    DeadlineExceeded,
}

/// An event on a session's stream.
///
/// `Written` and `Progress` are samples; `Stop`, `Error` and `Ok` are
/// terminal and always the last event before the stream closes.
#[derive(Debug)]
pub enum Event {
    /// Sample tick without progress context.
    Written { written: u64 },

    /// Sample tick for a session started with a [`ProgressBase`](crate::ProgressBase).
    Progress { written: u64, percent: f32 },

    /// The stop signal fired.
    Stop { cause: StopCause, written: u64 },

    /// Reading or writing failed. Nothing more was written after the failure.
    Error(io::Error),

    /// The source reached EOF and the sink was flushed.
    Ok { written: u64 },
}

impl Event {
    /// Bytes written in this session as of this event.
    ///
    /// `None` for `Error`: the count at failure time is not meaningful to resume from.
    pub fn written(&self) -> Option<u64> {
        match self {
            Event::Written { written }
            | Event::Progress { written, .. }
            | Event::Stop { written, .. }
            | Event::Ok { written } => Some(*written),
            Event::Error(_) => None,
        }
    }

    /// Returns `true` for `Stop`, `Error` and `Ok`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Event::Stop { .. } | Event::Error(_) | Event::Ok { .. })
    }
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Event::Written { written } => write!(f, "{written} bytes written"),
            Event::Progress { written, percent } => {
                write!(f, "progress updated: {percent:.2}% ({written} bytes written)")
            }
            Event::Stop { cause, written } => {
                write!(f, "copy stopped ({cause}, {written} bytes written)")
            }
            Event::Error(e) => write!(f, "copy failed: {e}"),
            Event::Ok { written } => write!(f, "copy ok ({written} bytes written)"),
        }
    }
}
