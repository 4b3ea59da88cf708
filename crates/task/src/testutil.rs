//! Shared test fixtures: a local HTTP server and readers that trip a stop signal.

use std::io::{self, Cursor};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use iocopy_engine::StopSignal;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt, ReadBuf};
use tokio::net::{TcpListener, TcpStream};

pub(crate) fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

#[derive(Debug, Clone)]
pub(crate) struct MockOptions {
    /// Advertise and honour `Range: bytes=N-`.
    pub ranges: bool,
    /// Send `Content-Length`; otherwise the body ends at connection close.
    pub content_length: bool,
    /// Send the body in pieces of this size with `chunk_delay` between them.
    pub chunk_size: usize,
    pub chunk_delay: Option<Duration>,
}

impl Default for MockOptions {
    fn default() -> Self {
        Self {
            ranges: true,
            content_length: true,
            chunk_size: 8 * 1024,
            chunk_delay: None,
        }
    }
}

pub(crate) struct MockServer {
    base: String,
    ranges: Arc<Mutex<Vec<Option<u64>>>>,
    _handle: tokio::task::JoinHandle<()>,
}

impl MockServer {
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    /// Range start of every request served so far, `None` for plain GETs.
    pub fn range_requests(&self) -> Vec<Option<u64>> {
        self.ranges.lock().unwrap().clone()
    }
}

/// Serves `body` on every path except `/missing`, which answers 404.
pub(crate) async fn mock_server(body: Vec<u8>, opts: MockOptions) -> MockServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let ranges = Arc::new(Mutex::new(Vec::new()));
    let body = Arc::new(body);

    let seen = ranges.clone();
    let handle = tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let body = body.clone();
            let opts = opts.clone();
            let seen = seen.clone();
            tokio::spawn(async move {
                let _ = serve(stream, &body, &opts, &seen).await;
            });
        }
    });

    MockServer {
        base: format!("http://127.0.0.1:{port}"),
        ranges,
        _handle: handle,
    }
}

async fn serve(
    mut stream: TcpStream,
    body: &[u8],
    opts: &MockOptions,
    seen: &Mutex<Vec<Option<u64>>>,
) -> io::Result<()> {
    let mut request = Vec::new();
    let mut buf = [0u8; 1024];
    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        request.extend_from_slice(&buf[..n]);
    }
    let request = String::from_utf8_lossy(&request).to_string();

    if request.starts_with("GET /missing ") {
        let resp = "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";
        stream.write_all(resp.as_bytes()).await?;
        return stream.shutdown().await;
    }

    let range_start = request.lines().find_map(|line| {
        let (name, value) = line.split_once(':')?;
        if !name.trim().eq_ignore_ascii_case("range") {
            return None;
        }
        value
            .trim()
            .strip_prefix("bytes=")?
            .trim_end_matches('-')
            .parse::<u64>()
            .ok()
    });
    seen.lock().unwrap().push(range_start);

    let len = body.len();
    let mut head = String::new();
    let payload = match range_start {
        Some(start) if opts.ranges => {
            let start = start as usize;
            if start >= len {
                let resp = format!(
                    "HTTP/1.1 416 Range Not Satisfiable\r\nContent-Range: bytes */{len}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
                );
                stream.write_all(resp.as_bytes()).await?;
                return stream.shutdown().await;
            }
            head.push_str("HTTP/1.1 206 Partial Content\r\n");
            head.push_str(&format!("Content-Range: bytes {start}-{}/{len}\r\n", len - 1));
            &body[start..]
        }
        _ => {
            head.push_str("HTTP/1.1 200 OK\r\n");
            body
        }
    };
    if opts.ranges {
        head.push_str("Accept-Ranges: bytes\r\n");
    }
    if opts.content_length {
        head.push_str(&format!("Content-Length: {}\r\n", payload.len()));
    }
    head.push_str("Connection: close\r\n\r\n");
    stream.write_all(head.as_bytes()).await?;

    for chunk in payload.chunks(opts.chunk_size.max(1)) {
        stream.write_all(chunk).await?;
        stream.flush().await?;
        if let Some(delay) = opts.chunk_delay {
            tokio::time::sleep(delay).await;
        }
    }
    stream.shutdown().await
}

/// Reader over `data` that cancels `stop` once `limit` bytes went through it.
pub(crate) struct CancelAfter {
    inner: Cursor<Vec<u8>>,
    limit: u64,
    seen: u64,
    stop: StopSignal,
}

impl CancelAfter {
    pub fn new(data: Vec<u8>, limit: u64, stop: StopSignal) -> Self {
        Self {
            inner: Cursor::new(data),
            limit,
            seen: 0,
            stop,
        }
    }
}

impl AsyncRead for CancelAfter {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = &mut *self;
        let before = buf.filled().len();
        let res = Pin::new(&mut this.inner).poll_read(cx, buf);
        this.seen += (buf.filled().len() - before) as u64;
        if this.seen >= this.limit {
            this.stop.cancel();
        }
        res
    }
}
