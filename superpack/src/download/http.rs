//! HTTP download manager backed by a worker pool.
//!
//! Each task runs a blocking reqwest transfer on the blocking pool of a
//! dedicated Tokio runtime. The pool size caps the number of concurrent
//! transfers. Range requests are used for footer probes; servers that ignore
//! the `Range` header are handled by slicing the full response locally.

use std::io::Read;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use reqwest::blocking::Client;
use reqwest::header::RANGE;
use reqwest::StatusCode;
use tokio::runtime::{Builder, Runtime};

use super::error::{DownloadError, DownloadResult};
use super::task::{TaskSlot, TaskTable};
use super::traits::DownloadManager;
use super::types::{ByteRange, TaskId};

/// Default timeout for HTTP requests in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300; // 5 minutes

/// Default number of concurrent transfers.
pub const DEFAULT_MAX_CONCURRENT: usize = 4;

/// Buffer size for reading response bodies (64KB).
const BUFFER_SIZE: usize = 64 * 1024;

/// Most bytes reserved up front for a response body, whatever the server
/// announces.
const MAX_PREALLOCATION: u64 = 16 * 1024 * 1024;

/// HTTP implementation of [`DownloadManager`].
pub struct HttpDownloadManager {
    runtime: Runtime,
    client: Client,
    tasks: Arc<TaskTable>,
    timeout: Duration,
    max_concurrent: usize,
}

impl std::fmt::Debug for HttpDownloadManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpDownloadManager")
            .field("timeout", &self.timeout)
            .field("max_concurrent", &self.max_concurrent)
            .field("live_tasks", &self.tasks.len())
            .finish()
    }
}

impl HttpDownloadManager {
    /// Create a manager with default timeout and concurrency.
    pub fn new() -> DownloadResult<Self> {
        Self::with_settings(
            Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            DEFAULT_MAX_CONCURRENT,
        )
    }

    /// Create a manager with a custom timeout and worker count.
    pub fn with_settings(timeout: Duration, max_concurrent: usize) -> DownloadResult<Self> {
        let max_concurrent = max_concurrent.max(1);
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DownloadError::Setup(format!("HTTP client: {}", e)))?;
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(max_concurrent)
            .thread_name("superpack-download")
            .enable_time()
            .build()
            .map_err(|e| DownloadError::Setup(format!("worker pool: {}", e)))?;

        Ok(Self {
            runtime,
            client,
            tasks: Arc::new(TaskTable::new()),
            timeout,
            max_concurrent,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }
}

impl DownloadManager for HttpDownloadManager {
    fn start_task(&self, url: &str, range: Option<ByteRange>) -> TaskId {
        let slot = self.tasks.create(url);
        let id = slot.id();
        let client = self.client.clone();
        let timeout = self.timeout;

        tracing::debug!(task = %id, url, range = ?range, "Starting download task");
        self.runtime.spawn_blocking(move || {
            if slot.is_cancelled() {
                return;
            }
            let result = panic::catch_unwind(AssertUnwindSafe(|| {
                fetch(&client, &slot, range, timeout)
            }))
            .unwrap_or_else(|_| {
                Err(DownloadError::Http {
                    url: slot.url().to_string(),
                    reason: "download worker panicked".to_string(),
                })
            });
            match &result {
                Ok(bytes) => {
                    tracing::debug!(task = %slot.id(), bytes = bytes.len(), "Download task finished")
                }
                Err(DownloadError::Cancelled(_)) => {
                    tracing::debug!(task = %slot.id(), "Download task cancelled")
                }
                Err(e) => tracing::warn!(task = %slot.id(), error = %e, "Download task failed"),
            }
            slot.complete(result);
        });
        id
    }

    fn is_task_finished(&self, id: TaskId) -> bool {
        self.tasks.is_finished(id)
    }

    fn task_result(&self, id: TaskId) -> DownloadResult<Bytes> {
        self.tasks.take_result(id)
    }

    fn cancel_task(&self, id: TaskId) {
        if self.tasks.cancel(id) {
            tracing::debug!(task = %id, "Cancelled download task");
        }
    }

    fn task_progress(&self, id: TaskId) -> u64 {
        self.tasks.progress(id)
    }
}

impl Drop for HttpDownloadManager {
    fn drop(&mut self) {
        self.tasks.cancel_all();
    }
}

/// Run one transfer to completion, honouring cancellation between chunks.
fn fetch(
    client: &Client,
    slot: &TaskSlot,
    range: Option<ByteRange>,
    timeout: Duration,
) -> DownloadResult<Bytes> {
    let url = slot.url();
    let mut request = client.get(url);
    if let Some(range) = range {
        request = request.header(RANGE, range.to_header_value());
    }

    let mut response = request.send().map_err(|e| {
        if e.is_timeout() {
            DownloadError::Timeout {
                url: url.to_string(),
                timeout_secs: timeout.as_secs(),
            }
        } else {
            DownloadError::Http {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return Err(DownloadError::NotFound(url.to_string()));
    }
    if status == StatusCode::RANGE_NOT_SATISFIABLE {
        return Err(DownloadError::RangeNotSatisfiable {
            url: url.to_string(),
            range: range.map(|r| r.to_string()).unwrap_or_default(),
            size: response.content_length().unwrap_or(0),
        });
    }
    if !status.is_success() {
        return Err(DownloadError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    // A partial response must hold exactly the requested bytes. A full
    // response to a span request is cut off once the span is covered.
    let partial = status == StatusCode::PARTIAL_CONTENT;
    let (limit, truncate) = match range {
        Some(range) if partial => (Some(range.len_hint()), false),
        Some(ByteRange::Span { end, .. }) => (Some(end.saturating_add(1)), true),
        _ => (None, false),
    };

    let announced = response.content_length().unwrap_or(0);
    let reserve = announced
        .min(limit.unwrap_or(u64::MAX))
        .min(MAX_PREALLOCATION);
    let mut body = Vec::with_capacity(reserve as usize);
    let mut buffer = vec![0u8; BUFFER_SIZE];
    loop {
        if slot.is_cancelled() {
            return Err(DownloadError::Cancelled(slot.id()));
        }
        let bytes_read = response
            .read(&mut buffer)
            .map_err(|e| DownloadError::Http {
                url: url.to_string(),
                reason: format!("read error: {}", e),
            })?;
        if bytes_read == 0 {
            break;
        }
        body.extend_from_slice(&buffer[..bytes_read]);
        slot.add_received(bytes_read as u64);

        if let Some(limit) = limit {
            let received = body.len() as u64;
            if received > limit && !truncate {
                return Err(DownloadError::Incomplete {
                    url: url.to_string(),
                    expected: limit,
                    received,
                });
            }
            if received >= limit && truncate {
                body.truncate(limit as usize);
                break;
            }
        }
    }

    let body = Bytes::from(body);
    match range {
        // Server ignored the Range header and sent the whole object.
        Some(range) if status == StatusCode::OK => {
            let span = range
                .resolve(body.len() as u64)
                .ok_or_else(|| DownloadError::RangeNotSatisfiable {
                    url: url.to_string(),
                    range: range.to_string(),
                    size: body.len() as u64,
                })?;
            Ok(body.slice(span))
        }
        _ => Ok(body),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_manager_default() {
        let manager = HttpDownloadManager::new().unwrap();
        assert_eq!(manager.timeout().as_secs(), DEFAULT_TIMEOUT_SECS);
        assert_eq!(manager.max_concurrent(), DEFAULT_MAX_CONCURRENT);
    }

    #[test]
    fn test_http_manager_min_concurrency() {
        let manager = HttpDownloadManager::with_settings(Duration::from_secs(5), 0).unwrap();
        assert_eq!(manager.max_concurrent(), 1);
    }

    #[test]
    fn test_unknown_task() {
        let manager = HttpDownloadManager::new().unwrap();

        assert!(manager.is_task_finished(TaskId(42)));
        assert_eq!(
            manager.task_result(TaskId(42)),
            Err(DownloadError::UnknownTask(TaskId(42)))
        );
        manager.cancel_task(TaskId(42));
    }

    #[test]
    fn test_unreachable_host_fails() {
        let manager = HttpDownloadManager::with_settings(Duration::from_secs(2), 1).unwrap();
        let id = manager.start_task("http://127.0.0.1:9/missing.spak", None);

        let deadline = std::time::Instant::now() + Duration::from_secs(10);
        while !manager.is_task_finished(id) && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }

        assert!(manager.task_result(id).is_err());
    }

    /// Serve one canned HTTP response on a local port.
    fn serve_once(response: &'static [u8]) -> String {
        use std::io::Write;
        use std::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut request = Vec::new();
                let mut byte = [0u8; 1];
                while !request.ends_with(b"\r\n\r\n") {
                    match stream.read(&mut byte) {
                        Ok(1) => request.push(byte[0]),
                        _ => break,
                    }
                }
                let _ = stream.write_all(response);
            }
        });
        format!("http://{}/pack.spak", addr)
    }

    fn wait(manager: &HttpDownloadManager, id: TaskId) -> DownloadResult<Bytes> {
        let deadline = std::time::Instant::now() + Duration::from_secs(10);
        while !manager.is_task_finished(id) && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        assert!(manager.is_task_finished(id), "task {} never finished", id);
        manager.task_result(id)
    }

    #[test]
    fn test_huge_content_length_fails_cleanly() {
        let url = serve_once(
            b"HTTP/1.1 200 OK\r\nContent-Length: 9223372036854775808\r\nConnection: close\r\n\r\nabc",
        );
        let manager = HttpDownloadManager::with_settings(Duration::from_secs(5), 1).unwrap();
        let id = manager.start_task(&url, Some(ByteRange::Span { start: 0, end: 99 }));

        assert!(wait(&manager, id).is_err());
    }

    #[test]
    fn test_partial_response_longer_than_range() {
        let url = serve_once(
            b"HTTP/1.1 206 Partial Content\r\nContent-Length: 10\r\nConnection: close\r\n\r\n0123456789",
        );
        let manager = HttpDownloadManager::with_settings(Duration::from_secs(5), 1).unwrap();
        let id = manager.start_task(&url, Some(ByteRange::Span { start: 0, end: 3 }));

        assert!(matches!(
            wait(&manager, id),
            Err(DownloadError::Incomplete {
                expected: 4,
                received: 10,
                ..
            })
        ));
    }

    #[test]
    fn test_full_response_cut_to_span() {
        let url = serve_once(
            b"HTTP/1.1 200 OK\r\nContent-Length: 10\r\nConnection: close\r\n\r\n0123456789",
        );
        let manager = HttpDownloadManager::with_settings(Duration::from_secs(5), 1).unwrap();
        let id = manager.start_task(&url, Some(ByteRange::Span { start: 2, end: 5 }));

        assert_eq!(wait(&manager, id), Ok(Bytes::from_static(b"2345")));
    }
}
