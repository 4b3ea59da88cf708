//! Local file copy, resumed by seeking both files.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs::File;
use tracing::info;

use crate::fsutil::{ensure_parent_dir, open_at, open_read_at, regular_file_size};
use crate::serde_ext::u64_string;
use crate::{Task, TaskError, TaskIo};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct FileCopyState {
    dst: PathBuf,
    src: PathBuf,
    #[serde(with = "u64_string")]
    size: u64,
    #[serde(with = "u64_string")]
    copied: u64,
}

/// Copies a regular file to a new location.
#[derive(Debug)]
pub struct FileCopyTask {
    state: FileCopyState,
    io: TaskIo<File, File>,
}

impl FileCopyTask {
    /// Prepares a copy of `src` to `dst`, creating `dst` (and its directory).
    pub async fn new(dst: impl Into<PathBuf>, src: impl AsRef<Path>) -> Result<Self, TaskError> {
        let dst = dst.into();
        let src = src.as_ref().to_path_buf();

        let size = regular_file_size(&src).await?;
        ensure_parent_dir(&dst).await?;
        let writer = File::create(&dst).await?;
        let reader = File::open(&src).await?;
        info!(src = %src.display(), dst = %dst.display(), size, "file copy task created");

        Ok(Self {
            state: FileCopyState {
                dst,
                src,
                size,
                copied: 0,
            },
            io: TaskIo::new(reader, writer),
        })
    }

    /// Rebuilds a task from a snapshot with both files positioned at `copied`.
    ///
    /// The destination is recreated when nothing was copied yet.
    pub async fn load(snapshot: &[u8]) -> Result<Self, TaskError> {
        let state: FileCopyState = serde_json::from_slice(snapshot)?;
        ensure_parent_dir(&state.dst).await?;
        let writer = open_at(&state.dst, state.copied).await?;
        let reader = open_read_at(&state.src, state.copied).await?;
        info!(
            src = %state.src.display(),
            dst = %state.dst.display(),
            copied = state.copied,
            "file copy task loaded"
        );

        Ok(Self {
            state,
            io: TaskIo::new(reader, writer),
        })
    }

    pub fn src(&self) -> &Path {
        &self.state.src
    }

    pub fn dst(&self) -> &Path {
        &self.state.dst
    }
}

impl Task for FileCopyTask {
    type Reader = File;
    type Writer = File;

    fn total(&self) -> Option<u64> {
        Some(self.state.size)
    }

    fn copied(&self) -> u64 {
        self.state.copied
    }

    fn set_copied(&mut self, copied: u64) {
        self.state.copied = copied;
    }

    fn take_io(&mut self) -> Option<(File, File)> {
        self.io.take()
    }

    fn restore_writer(&mut self, writer: File) {
        self.io.restore_writer(writer);
    }

    fn snapshot(&self) -> Result<Vec<u8>, TaskError> {
        Ok(serde_json::to_vec_pretty(&self.state)?)
    }
}
