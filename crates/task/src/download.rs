//! HTTP download, resumed with a ranged request when the server allows it.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs::File;
use tracing::{info, warn};

use crate::fsutil::{ensure_parent_dir, open_at};
use crate::http::{HttpSource, ResponseBody};
use crate::serde_ext::u64_string;
use crate::{Task, TaskError, TaskIo};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct DownloadState {
    dst: PathBuf,
    url: String,
    is_size_known: bool,
    #[serde(with = "u64_string")]
    size: u64,
    is_range_supported: bool,
    #[serde(with = "u64_string")]
    downloaded: u64,
}

/// Downloads a URL into a local file.
#[derive(Debug)]
pub struct DownloadTask {
    state: DownloadState,
    io: TaskIo<ResponseBody, File>,
}

impl DownloadTask {
    /// Starts a download of `url` into `dst`, creating or truncating `dst`.
    pub async fn new(
        dst: impl Into<PathBuf>,
        url: impl Into<String>,
        source: &HttpSource,
    ) -> Result<Self, TaskError> {
        let dst = dst.into();
        let url = url.into();

        ensure_parent_dir(&dst).await?;
        let probe = source.get(&url).await?;
        let file = File::create(&dst).await?;
        info!(
            %url,
            dst = %dst.display(),
            size = ?probe.size,
            range_supported = probe.range_supported,
            "download task created"
        );

        Ok(Self {
            state: DownloadState {
                dst,
                url,
                is_size_known: probe.size.is_some(),
                size: probe.size.unwrap_or(0),
                is_range_supported: probe.range_supported,
                downloaded: 0,
            },
            io: TaskIo::new(probe.body, file),
        })
    }

    /// Rebuilds a download from a snapshot.
    ///
    /// If the server supported ranges, the request resumes at `downloaded`.
    /// Otherwise the download starts over: size and range support are taken
    /// from the fresh response and the destination is truncated.
    pub async fn load(snapshot: &[u8], source: &HttpSource) -> Result<Self, TaskError> {
        let mut state: DownloadState = serde_json::from_slice(snapshot)?;
        ensure_parent_dir(&state.dst).await?;

        let (body, file) = if state.is_range_supported {
            let body = if state.is_size_known && state.downloaded >= state.size {
                ResponseBody::empty()
            } else {
                source.get_range(&state.url, state.downloaded).await?
            };
            let file = open_at(&state.dst, state.downloaded).await?;
            info!(url = %state.url, offset = state.downloaded, "download resumed");
            (body, file)
        } else {
            warn!(url = %state.url, "server does not accept ranges, restarting download from zero");
            let probe = source.get(&state.url).await?;
            let file = open_at(&state.dst, 0).await?;
            state.is_size_known = probe.size.is_some();
            state.size = probe.size.unwrap_or(0);
            state.is_range_supported = probe.range_supported;
            state.downloaded = 0;
            (probe.body, file)
        };

        Ok(Self {
            state,
            io: TaskIo::new(body, file),
        })
    }

    pub fn url(&self) -> &str {
        &self.state.url
    }

    pub fn dst(&self) -> &Path {
        &self.state.dst
    }

    pub fn is_range_supported(&self) -> bool {
        self.state.is_range_supported
    }
}

impl Task for DownloadTask {
    type Reader = ResponseBody;
    type Writer = File;

    fn total(&self) -> Option<u64> {
        self.state.is_size_known.then_some(self.state.size)
    }

    fn copied(&self) -> u64 {
        self.state.downloaded
    }

    fn set_copied(&mut self, copied: u64) {
        self.state.downloaded = copied;
    }

    fn take_io(&mut self) -> Option<(ResponseBody, File)> {
        self.io.take()
    }

    fn restore_writer(&mut self, writer: File) {
        self.io.restore_writer(writer);
    }

    fn snapshot(&self) -> Result<Vec<u8>, TaskError> {
        Ok(serde_json::to_vec_pretty(&self.state)?)
    }
}
