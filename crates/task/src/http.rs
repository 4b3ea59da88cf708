//! HTTP side of downloads: probing a URL and issuing ranged requests.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::TryStreamExt;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT_RANGES, CONTENT_LENGTH, HeaderMap, RANGE};
use tokio::io::{AsyncRead, ReadBuf};
use tokio_util::io::StreamReader;
use tracing::debug;

use crate::TaskError;

/// Response body as an async reader.
pub struct ResponseBody(Pin<Box<dyn AsyncRead + Send>>);

impl ResponseBody {
    fn from_response(resp: reqwest::Response) -> Self {
        let stream = resp.bytes_stream().map_err(io::Error::other);
        Self(Box::pin(StreamReader::new(stream)))
    }

    /// A body with no bytes, for resuming a transfer that already has all of them.
    pub fn empty() -> Self {
        Self(Box::pin(tokio::io::empty()))
    }
}

impl std::fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ResponseBody")
    }
}

impl AsyncRead for ResponseBody {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        self.0.as_mut().poll_read(cx, buf)
    }
}

/// Result of a plain GET.
#[derive(Debug)]
pub struct Probe {
    pub body: ResponseBody,
    /// `Content-Length`, if present and numeric.
    pub size: Option<u64>,
    /// Whether the server advertised `Accept-Ranges: bytes`.
    pub range_supported: bool,
}

/// HTTP client used by download tasks.
#[derive(Debug, Clone)]
pub struct HttpSource {
    http: reqwest::Client,
}

impl HttpSource {
    /// Creates a source with a default client.
    pub fn new() -> Result<Self, TaskError> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self { http })
    }

    /// Uses a caller-configured client (proxies, timeouts, TLS roots).
    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// Issues a plain GET and reports what the response says about the body.
    pub async fn get(&self, url: &str) -> Result<Probe, TaskError> {
        let resp = self.http.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(TaskError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let size = content_length(resp.headers());
        let range_supported = accepts_byte_ranges(resp.headers());
        debug!(url, ?size, range_supported, "GET response");

        Ok(Probe {
            body: ResponseBody::from_response(resp),
            size,
            range_supported,
        })
    }

    /// Issues `GET` with `Range: bytes=start-`. The server must answer 206.
    pub async fn get_range(&self, url: &str, start: u64) -> Result<ResponseBody, TaskError> {
        let resp = self
            .http
            .get(url)
            .header(RANGE, format!("bytes={start}-"))
            .send()
            .await?;
        let status = resp.status();

        if status == StatusCode::PARTIAL_CONTENT {
            debug!(url, start, "ranged GET response");
            return Ok(ResponseBody::from_response(resp));
        }
        if status.is_success() {
            return Err(TaskError::RangeIgnored {
                url: url.to_string(),
                offset: start,
            });
        }
        Err(TaskError::HttpStatus {
            status: status.as_u16(),
            url: url.to_string(),
        })
    }
}

fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

fn accepts_byte_ranges(headers: &HeaderMap) -> bool {
    headers
        .get_all(ACCEPT_RANGES)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|unit| unit.trim().eq_ignore_ascii_case("bytes"))
}
