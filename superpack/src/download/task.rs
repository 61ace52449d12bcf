//! Task bookkeeping shared by download manager implementations.
//!
//! Each task owns a [`TaskSlot`] with atomic progress counters and a result
//! cell. Workers write into the slot; the scheduler thread polls it through
//! the [`TaskTable`] without blocking.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::Mutex;

use super::error::{DownloadError, DownloadResult};
use super::types::TaskId;

/// Per-task state written by workers and read by the scheduler.
#[derive(Debug)]
pub struct TaskSlot {
    id: TaskId,
    url: String,
    cancelled: AtomicBool,
    finished: AtomicBool,
    received: AtomicU64,
    result: Mutex<Option<DownloadResult<Bytes>>>,
}

impl TaskSlot {
    fn new(id: TaskId, url: String) -> Self {
        Self {
            id,
            url,
            cancelled: AtomicBool::new(false),
            finished: AtomicBool::new(false),
            received: AtomicU64::new(0),
            result: Mutex::new(None),
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Whether cancellation was requested. Workers check this between chunks.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }

    /// Bytes received so far.
    pub fn received(&self) -> u64 {
        self.received.load(Ordering::SeqCst)
    }

    pub fn add_received(&self, bytes: u64) {
        self.received.fetch_add(bytes, Ordering::SeqCst);
    }

    /// Store the outcome. The first completion wins; later ones are ignored.
    pub fn complete(&self, result: DownloadResult<Bytes>) {
        let mut cell = self.result.lock();
        if self.is_finished() {
            return;
        }
        if let Ok(bytes) = &result {
            self.received.store(bytes.len() as u64, Ordering::SeqCst);
        }
        *cell = Some(result);
        self.finished.store(true, Ordering::SeqCst);
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.complete(Err(DownloadError::Cancelled(self.id)));
    }

    fn take(&self) -> Option<DownloadResult<Bytes>> {
        self.result.lock().take()
    }
}

/// Registry of live tasks keyed by id.
#[derive(Debug)]
pub struct TaskTable {
    next_id: AtomicU64,
    slots: DashMap<TaskId, Arc<TaskSlot>>,
}

impl Default for TaskTable {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskTable {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            slots: DashMap::new(),
        }
    }

    /// Register a new task and return its slot.
    pub fn create(&self, url: &str) -> Arc<TaskSlot> {
        let id = TaskId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let slot = Arc::new(TaskSlot::new(id, url.to_string()));
        self.slots.insert(id, Arc::clone(&slot));
        slot
    }

    pub fn get(&self, id: TaskId) -> Option<Arc<TaskSlot>> {
        self.slots.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    /// Unknown tasks report finished so callers move on to `take_result`,
    /// which explains the problem.
    pub fn is_finished(&self, id: TaskId) -> bool {
        self.slots
            .get(&id)
            .map(|slot| slot.is_finished())
            .unwrap_or(true)
    }

    pub fn progress(&self, id: TaskId) -> u64 {
        self.slots.get(&id).map(|slot| slot.received()).unwrap_or(0)
    }

    /// Take the result of a finished task and forget the task.
    pub fn take_result(&self, id: TaskId) -> DownloadResult<Bytes> {
        let slot = self.get(id).ok_or(DownloadError::UnknownTask(id))?;
        if !slot.is_finished() {
            return Err(DownloadError::NotFinished(id));
        }
        self.slots.remove(&id);
        slot.take().unwrap_or(Err(DownloadError::UnknownTask(id)))
    }

    /// Flag the task as cancelled and drop it. Returns whether it existed.
    pub fn cancel(&self, id: TaskId) -> bool {
        match self.slots.remove(&id) {
            Some((_, slot)) => {
                slot.cancel();
                true
            }
            None => false,
        }
    }

    /// Number of tasks not yet collected.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Cancel every outstanding task.
    pub fn cancel_all(&self) {
        let ids: Vec<TaskId> = self.slots.iter().map(|entry| *entry.key()).collect();
        for id in ids {
            self.cancel(id);
        }
    }
}
