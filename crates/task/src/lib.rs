//! Resumable copy tasks on top of the copy engine.
//!
//! A [`Task`] bundles a reader, a writer and the bookkeeping needed to
//! serialize itself mid-transfer. [`run`] drives one task through one engine
//! session and reports the result through a [`TaskHandler`] and an
//! [`Outcome`]. A stopped task hands back a JSON snapshot; each task type's
//! `load` rebuilds it from that snapshot positioned at the next byte.

mod download;
mod file_copy;
mod file_hash;
pub mod fsutil;
mod http;
mod multi_hash;
mod serde_ext;
mod task;

#[cfg(test)]
mod testutil;

use std::path::{Path, PathBuf};

use iocopy_engine::{CopyOptions, StopSignal};
use iocopy_hash::HashError;

pub use download::DownloadTask;
pub use file_copy::FileCopyTask;
pub use file_hash::FileHashTask;
pub use http::{HttpSource, Probe, ResponseBody};
pub use multi_hash::MultiHashTask;
pub use task::{FnHandler, Outcome, Progress, Task, TaskHandler, TaskIo, run};

/// Errors produced by the task crate.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP status {status} for {url}")]
    HttpStatus { status: u16, url: String },

    #[error("server ignored range request for {url} at offset {offset}")]
    RangeIgnored { url: String, offset: u64 },

    #[error("not a regular file: {}", .0.display())]
    NotRegularFile(PathBuf),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("hash error: {0}")]
    Hash(#[from] HashError),

    #[error("snapshot has no state for {0}")]
    MissingState(String),

    #[error("reader and writer are taken by a session or already released")]
    IoInUse,

    #[error("copy failed: {0}")]
    Copy(std::io::Error),
}

/// Downloads `url` to `dst` in one run.
///
/// A stopped download comes back as [`Outcome::Stopped`] with a snapshot
/// that [`DownloadTask::load`] accepts.
pub async fn download(
    dst: impl Into<PathBuf>,
    url: impl Into<String>,
    options: CopyOptions,
    stop: StopSignal,
) -> Result<Outcome, TaskError> {
    let source = HttpSource::new()?;
    let mut task = DownloadTask::new(dst, url, &source).await?;
    Ok(run(&mut task, options, stop, &mut ()).await)
}

/// Copies the regular file `src` to `dst` in one run.
pub async fn copy_file(
    dst: impl Into<PathBuf>,
    src: impl AsRef<Path>,
    options: CopyOptions,
    stop: StopSignal,
) -> Result<Outcome, TaskError> {
    let mut task = FileCopyTask::new(dst, src).await?;
    Ok(run(&mut task, options, stop, &mut ()).await)
}
