//! The download manager interface consumed by pack requests.

use bytes::Bytes;

use super::error::DownloadResult;
use super::types::{ByteRange, TaskId};

/// Asynchronous fetcher of remote objects.
///
/// Transfers run on the implementation's own workers. Callers start a task,
/// poll [`is_task_finished`](Self::is_task_finished) from their update loop,
/// and then collect the bytes with [`task_result`](Self::task_result). None of
/// the methods block on network I/O.
pub trait DownloadManager: Send + Sync {
    /// Begin fetching `url`, or only `range` of it.
    fn start_task(&self, url: &str, range: Option<ByteRange>) -> TaskId;

    /// Whether the task has completed, failed or been cancelled.
    ///
    /// Unknown ids report `true` so that callers proceed to
    /// [`task_result`](Self::task_result) and receive an error.
    fn is_task_finished(&self, id: TaskId) -> bool;

    /// Take the outcome of a finished task. The task is forgotten afterwards.
    fn task_result(&self, id: TaskId) -> DownloadResult<Bytes>;

    /// Cancel a task. Cancelling an unknown or finished task is a no-op.
    fn cancel_task(&self, id: TaskId);

    /// Bytes received so far for a running task.
    fn task_progress(&self, _id: TaskId) -> u64 {
        0
    }
}
