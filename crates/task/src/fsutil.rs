//! Filesystem helpers for task construction and resume.

use std::io::SeekFrom;
use std::path::Path;

use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncSeekExt;
use tracing::debug;

use crate::TaskError;

/// Mode for directories created by [`ensure_parent_dir`] (Unix only).
pub const DIR_MODE: u32 = 0o755;

/// Ensures the directory that will hold `path` exists, creating it if necessary.
pub async fn ensure_parent_dir(path: &Path) -> Result<(), TaskError> {
    let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) else {
        return Ok(());
    };

    let mut builder = tokio::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(DIR_MODE);
    builder.create(parent).await?;

    debug!(dir = %parent.display(), "destination directory ready");
    Ok(())
}

/// Size of `path`, which must be a regular file.
pub(crate) async fn regular_file_size(path: &Path) -> Result<u64, TaskError> {
    let meta = tokio::fs::metadata(path).await?;
    if !meta.is_file() {
        return Err(TaskError::NotRegularFile(path.to_path_buf()));
    }
    Ok(meta.len())
}

/// Opens `path` for writing at `offset`, dropping anything past it.
///
/// At offset 0 a missing file is created. Past 0 the file must exist, since
/// the bytes before `offset` are the ones being resumed from.
pub(crate) async fn open_at(path: &Path, offset: u64) -> Result<File, TaskError> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(offset == 0)
        .open(path)
        .await?;
    file.set_len(offset).await?;
    if offset != 0 {
        file.seek(SeekFrom::Start(offset)).await?;
    }
    Ok(file)
}

/// Opens `path` for reading at `offset`.
pub(crate) async fn open_read_at(path: &Path, offset: u64) -> Result<File, TaskError> {
    let mut file = File::open(path).await?;
    if offset != 0 {
        file.seek(SeekFrom::Start(offset)).await?;
    }
    Ok(file)
}
