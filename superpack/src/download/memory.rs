//! In-process download manager.
//!
//! Serves objects registered by URL from memory. Used for offline tooling and
//! as the test double for pack requests: it can complete tasks immediately or
//! hold them until [`MemoryDownloadManager::complete_pending`] is called, and
//! it can be told to fail specific URLs.

use std::collections::HashMap;

use bytes::Bytes;
use parking_lot::{Mutex, RwLock};

use super::error::{DownloadError, DownloadResult};
use super::task::TaskTable;
use super::traits::DownloadManager;
use super::types::{ByteRange, TaskId};

/// A task recorded by the memory manager, for inspection in tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartedTask {
    pub id: TaskId,
    pub url: String,
    pub range: Option<ByteRange>,
}

/// Memory-backed [`DownloadManager`].
#[derive(Debug)]
pub struct MemoryDownloadManager {
    objects: RwLock<HashMap<String, Bytes>>,
    failures: RwLock<HashMap<String, String>>,
    tasks: TaskTable,
    auto_complete: bool,
    pending: Mutex<Vec<StartedTask>>,
    started: Mutex<Vec<StartedTask>>,
    cancelled: Mutex<Vec<TaskId>>,
}

impl Default for MemoryDownloadManager {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDownloadManager {
    /// Tasks complete as soon as they are started.
    pub fn new() -> Self {
        Self::with_auto_complete(true)
    }

    /// Tasks stay in flight until [`complete_pending`](Self::complete_pending).
    pub fn manual() -> Self {
        Self::with_auto_complete(false)
    }

    fn with_auto_complete(auto_complete: bool) -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
            failures: RwLock::new(HashMap::new()),
            tasks: TaskTable::new(),
            auto_complete,
            pending: Mutex::new(Vec::new()),
            started: Mutex::new(Vec::new()),
            cancelled: Mutex::new(Vec::new()),
        }
    }

    /// Serve `data` at `url`.
    pub fn insert(&self, url: impl Into<String>, data: impl Into<Bytes>) {
        self.objects.write().insert(url.into(), data.into());
    }

    pub fn remove(&self, url: &str) -> Option<Bytes> {
        self.objects.write().remove(url)
    }

    /// Make every future task for `url` fail with a transport error.
    pub fn fail_url(&self, url: impl Into<String>, reason: impl Into<String>) {
        self.failures.write().insert(url.into(), reason.into());
    }

    /// Finish every held task. Returns how many were completed.
    pub fn complete_pending(&self) -> usize {
        let pending = std::mem::take(&mut *self.pending.lock());
        let count = pending.len();
        for task in pending {
            self.resolve(&task);
        }
        count
    }

    /// Simulate partial progress on a held task.
    pub fn advance(&self, id: TaskId, bytes: u64) {
        if let Some(slot) = self.tasks.get(id) {
            slot.add_received(bytes);
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Every task started so far, in start order.
    pub fn started_tasks(&self) -> Vec<StartedTask> {
        self.started.lock().clone()
    }

    /// Ids passed to `cancel_task` for tasks that were still live.
    pub fn cancelled_tasks(&self) -> Vec<TaskId> {
        self.cancelled.lock().clone()
    }

    fn resolve(&self, task: &StartedTask) {
        let Some(slot) = self.tasks.get(task.id) else {
            return;
        };
        slot.complete(self.serve(&task.url, task.range));
    }

    fn serve(&self, url: &str, range: Option<ByteRange>) -> DownloadResult<Bytes> {
        if let Some(reason) = self.failures.read().get(url) {
            return Err(DownloadError::Http {
                url: url.to_string(),
                reason: reason.clone(),
            });
        }
        let data = self
            .objects
            .read()
            .get(url)
            .cloned()
            .ok_or_else(|| DownloadError::NotFound(url.to_string()))?;

        match range {
            None => Ok(data),
            Some(range) => {
                let span = range.resolve(data.len() as u64).ok_or_else(|| {
                    DownloadError::RangeNotSatisfiable {
                        url: url.to_string(),
                        range: range.to_string(),
                        size: data.len() as u64,
                    }
                })?;
                Ok(data.slice(span))
            }
        }
    }
}

impl DownloadManager for MemoryDownloadManager {
    fn start_task(&self, url: &str, range: Option<ByteRange>) -> TaskId {
        let id = self.tasks.create(url).id();
        let task = StartedTask {
            id,
            url: url.to_string(),
            range,
        };
        self.started.lock().push(task.clone());

        if self.auto_complete {
            self.resolve(&task);
        } else {
            self.pending.lock().push(task);
        }
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
            self.pending.lock().retain(|task| task.id != id);
            self.cancelled.lock().push(id);
        }
    }

    fn task_progress(&self, id: TaskId) -> u64 {
        self.tasks.progress(id)
    }
}
