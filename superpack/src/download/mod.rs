//! Download managers for remote pack archives.
//!
//! This module provides the asynchronous fetch interface used by pack
//! requests, including:
//! - The [`DownloadManager`] trait (`traits`)
//! - Task ids and byte ranges (`types`)
//! - Shared task bookkeeping with atomic progress (`task`)
//! - An HTTP worker-pool implementation (`http`)
//! - An in-memory implementation for offline use and tests (`memory`)
//!
//! # Architecture
//!
//! ```text
//! PackRequest (scheduler thread)
//!         │ start_task / is_task_finished / task_result / cancel_task
//!         ▼
//! DownloadManager (trait)
//!         ├── HttpDownloadManager ──► Tokio blocking pool ──► reqwest
//!         └── MemoryDownloadManager
//!                 │
//!                 └── TaskTable (id → TaskSlot: progress, result, cancel flag)
//! ```

mod error;
mod http;
mod memory;
mod task;
mod traits;
mod types;

pub use error::{DownloadError, DownloadResult};
pub use http::{HttpDownloadManager, DEFAULT_MAX_CONCURRENT, DEFAULT_TIMEOUT_SECS};
pub use memory::{MemoryDownloadManager, StartedTask};
pub use task::{TaskSlot, TaskTable};
pub use traits::DownloadManager;
pub use types::{ByteRange, TaskId};
