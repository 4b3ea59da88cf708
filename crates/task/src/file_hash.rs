//! Resumable hashing of a local file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use iocopy_hash::MultiHasher;
use serde::{Deserialize, Serialize};
use tokio::fs::File;
use tracing::info;

use crate::fsutil::{open_read_at, regular_file_size};
use crate::multi_hash::{MultiHashState, MultiHashTask};
use crate::serde_ext::u64_string;
use crate::{Task, TaskError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct FileHashState {
    src: PathBuf,
    #[serde(with = "u64_string")]
    size: u64,
    #[serde(flatten)]
    hash: MultiHashState,
}

/// Hashes a regular file. Unlike [`MultiHashTask`] the total is known.
#[derive(Debug)]
pub struct FileHashTask {
    src: PathBuf,
    size: u64,
    inner: MultiHashTask<File>,
}

impl FileHashTask {
    /// Opens `src` for hashing with `algs` (empty selects every supported algorithm).
    pub async fn new<S: AsRef<str>>(algs: &[S], src: impl AsRef<Path>) -> Result<Self, TaskError> {
        let src = src.as_ref().to_path_buf();
        let size = regular_file_size(&src).await?;
        let file = File::open(&src).await?;
        let inner = MultiHashTask::new(algs, file)?;
        info!(src = %src.display(), size, "file hash task created");

        Ok(Self { src, size, inner })
    }

    /// Rebuilds a task from a snapshot, reopening the file at the hashed offset.
    pub async fn load(snapshot: &[u8]) -> Result<Self, TaskError> {
        let state: FileHashState = serde_json::from_slice(snapshot)?;
        let file = open_read_at(&state.src, state.hash.computed).await?;
        let inner = MultiHashTask::from_state(state.hash, file)?;
        info!(src = %state.src.display(), computed = inner.copied(), "file hash task loaded");

        Ok(Self {
            src: state.src,
            size: state.size,
            inner,
        })
    }

    pub fn src(&self) -> &Path {
        &self.src
    }

    pub fn checksums(&self) -> Result<BTreeMap<String, Vec<u8>>, TaskError> {
        self.inner.checksums()
    }
}

impl Task for FileHashTask {
    type Reader = File;
    type Writer = MultiHasher;

    fn total(&self) -> Option<u64> {
        Some(self.size)
    }

    fn copied(&self) -> u64 {
        self.inner.copied()
    }

    fn set_copied(&mut self, copied: u64) {
        self.inner.set_copied(copied);
    }

    fn take_io(&mut self) -> Option<(File, MultiHasher)> {
        self.inner.take_io()
    }

    fn restore_writer(&mut self, writer: MultiHasher) {
        self.inner.restore_writer(writer);
    }

    fn snapshot(&self) -> Result<Vec<u8>, TaskError> {
        let state = FileHashState {
            src: self.src.clone(),
            size: self.size,
            hash: self.inner.snapshot_state()?,
        };
        Ok(serde_json::to_vec_pretty(&state)?)
    }

    fn result(&self) -> Result<Option<Vec<u8>>, TaskError> {
        self.inner.report().map(Some)
    }
}
