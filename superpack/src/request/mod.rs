//! Per-pack download and mount state machine.
//!
//! A [`PackRequest`] acquires one root pack together with every dependency
//! that is not mounted yet. Each pack becomes a [`SubRequest`] that steps
//! through:
//!
//! ```text
//! Wait ─► AskFooter ─► GetFooter ─► LoadingPackFile ─► CheckHash ─► Mounted
//!   │         │            │               │               │
//!   └─────────┴────────────┴───────┬───────┴───────────────┘
//!                                  ▼
//!                                Error
//! ```
//!
//! Sub-requests run strictly one after another in dependency order, the root
//! last. [`PackRequest::update`] never blocks: it advances the current
//! sub-request by at most one step, or returns immediately while a download
//! task is still running on the download manager's worker pool.
//!
//! State changes are queued as [`PackEvent`]s rather than dispatched, since
//! the request is usually locked while it runs. The owner drains them with
//! [`PackRequest::take_events`] once the lock is released.

mod error;
mod sub_request;

use std::iter;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;
use tracing::{debug, info, trace, warn};

use crate::download::{ByteRange, DownloadError, DownloadResult};
use crate::events::PackEvent;
use crate::format::{FooterBlock, FormatError, FOOTER_SIZE};
use crate::index::{Pack, PackIndex, PackState};
use crate::resolve::{collect_downloadable_dependencies, ResolveError, ResolveResult};
use crate::services::PackServices;

pub use error::RequestError;
pub use sub_request::{SubRequest, SubRequestStatus};

/// Result type for a single state machine step.
pub type RequestResult<T> = Result<T, RequestError>;

/// The active download/mount operation for one root pack.
pub struct PackRequest {
    root: String,
    priority: f32,
    index: Arc<RwLock<PackIndex>>,
    services: Arc<PackServices>,

    sub_requests: Vec<SubRequest>,
    current: usize,

    /// Footer of the current sub-request's pack, once parsed.
    footer: Option<FooterBlock>,
    /// Bytes of the last finished task of the current sub-request.
    payload: Option<Bytes>,
    /// Archive size declared by the current footer.
    full_size_server_data: u64,

    error: Option<RequestError>,
    error_pack: Option<String>,
    started: bool,
    stopped: bool,

    /// State changes not yet handed to the event dispatcher.
    events: Vec<PackEvent>,
}

impl std::fmt::Debug for PackRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackRequest")
            .field("root", &self.root)
            .field("priority", &self.priority)
            .field("sub_requests", &self.sub_requests)
            .field("current", &self.current)
            .field("error", &self.error)
            .field("stopped", &self.stopped)
            .finish_non_exhaustive()
    }
}

impl PackRequest {
    /// Create a request for `root`. Nothing happens until [`start`](Self::start).
    ///
    /// The request's priority starts as the root pack's declared priority.
    pub fn new(
        root: impl Into<String>,
        index: Arc<RwLock<PackIndex>>,
        services: Arc<PackServices>,
    ) -> Self {
        let root = root.into();
        let priority = index
            .read()
            .get(&root)
            .map(|pack| pack.priority)
            .unwrap_or_default();
        Self {
            root,
            priority,
            index,
            services,
            sub_requests: Vec::new(),
            current: 0,
            footer: None,
            payload: None,
            full_size_server_data: 0,
            error: None,
            error_pack: None,
            started: false,
            stopped: false,
            events: Vec::new(),
        }
    }

    /// Expand dependencies and queue one sub-request per pack to acquire.
    ///
    /// Calling `start` again is a no-op. A resolution failure puts the
    /// request into the error state with the root as the offending pack.
    pub fn start(&mut self) -> ResolveResult<()> {
        if self.started {
            return Ok(());
        }
        self.started = true;

        let resolved = {
            let index = self.index.read();
            collect_downloadable_dependencies(&index, &self.root)
        };
        match resolved {
            Ok(dependencies) => {
                self.sub_requests = dependencies
                    .into_iter()
                    .chain(iter::once(self.root.clone()))
                    .map(SubRequest::new)
                    .collect();
                debug!(
                    pack = %self.root,
                    sub_requests = self.sub_requests.len(),
                    "Pack request started"
                );
                Ok(())
            }
            Err(err) => {
                self.sub_requests = vec![SubRequest::new(self.root.clone())];
                self.fail(RequestError::Resolve(err.clone()));
                Err(err)
            }
        }
    }

    /// Advance the current sub-request by at most one step.
    ///
    /// Safe to call any number of times; does nothing once the request is
    /// done, failed or stopped.
    pub fn update(&mut self) {
        if !self.is_running() {
            return;
        }

        let step = match self.sub_requests[self.current].status {
            SubRequestStatus::Wait => self.on_wait(),
            SubRequestStatus::AskFooter => self.on_ask_footer(),
            SubRequestStatus::GetFooter => self.on_get_footer(),
            SubRequestStatus::LoadingPackFile => self.on_loading_pack_file(),
            SubRequestStatus::CheckHash => self.on_check_hash(),
            SubRequestStatus::Mounted => {
                self.go_to_next_sub_request();
                Ok(())
            }
            SubRequestStatus::Error => Ok(()),
        };

        if let Err(err) = step {
            self.fail(err);
        }
    }

    /// Change the scheduling priority of this request and its root pack.
    ///
    /// Only the order among requests changes; sub-requests keep their order.
    pub fn change_priority(&mut self, priority: f32) {
        self.priority = priority;
        if let Some(pack) = self.index.write().get_mut(&self.root) {
            pack.priority = priority;
        }
        debug!(pack = %self.root, priority, "Pack request priority changed");
    }

    /// Cancel the in-flight task and halt.
    ///
    /// The claimed pack is released so another request may take it over.
    /// Sub-request statuses are left as they were. A stopped request never
    /// resumes.
    pub fn stop(&mut self) {
        if self.stopped || self.is_done() || self.is_error() {
            return;
        }
        self.stopped = true;
        self.payload = None;
        self.footer = None;

        let Some(sub) = self.sub_requests.get(self.current) else {
            debug!(pack = %self.root, "Pack request stopped before start");
            return;
        };
        let name = sub.pack.clone();
        let status = sub.status;

        if let (Some(id), SubRequestStatus::AskFooter | SubRequestStatus::LoadingPackFile) =
            (sub.task_id, status)
        {
            self.services.downloader.cancel_task(id);
            debug!(pack = %name, task = %id, "Cancelled download task");
        }

        if status.is_active() {
            let released = match self.index.write().get_mut(&name) {
                Some(pack) if pack.state == PackState::Downloading => {
                    pack.state = PackState::NotRequested;
                    pack.downloaded_size = 0;
                    true
                }
                _ => false,
            };
            if released {
                self.emit_state(&name, PackState::NotRequested);
            }
        }
        info!(pack = %self.root, at = %name, status = %status, "Pack request stopped");
    }

    /// Every sub-request is mounted.
    pub fn is_done(&self) -> bool {
        self.started && self.error.is_none() && self.current >= self.sub_requests.len()
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Done or failed.
    pub fn is_finished(&self) -> bool {
        self.is_done() || self.is_error()
    }

    /// Work has begun and the request has not finished or stopped.
    pub fn is_in_flight(&self) -> bool {
        self.is_running()
            && (self.current > 0 || self.sub_requests[self.current].status != SubRequestStatus::Wait)
    }

    /// The sub-request being processed, or the last one once finished.
    pub fn current_sub_request(&self) -> Option<&SubRequest> {
        self.sub_requests
            .get(self.current)
            .or_else(|| self.sub_requests.last())
    }

    /// Sub-requests in execution order; the root pack is last.
    pub fn sub_requests(&self) -> &[SubRequest] {
        &self.sub_requests
    }

    pub fn root_pack(&self) -> &str {
        &self.root
    }

    pub fn priority(&self) -> f32 {
        self.priority
    }

    /// Sum of the sizes of every pack this request acquires.
    ///
    /// Sizes are footer-declared once the footer has been fetched and
    /// manifest-declared before that.
    pub fn full_size_with_dependencies(&self) -> u64 {
        let index = self.index.read();
        self.full_size(&index)
    }

    /// Bytes downloaded so far across mounted and in-flight sub-requests.
    ///
    /// Never exceeds [`full_size_with_dependencies`](Self::full_size_with_dependencies).
    pub fn downloaded_size(&self) -> u64 {
        let index = self.index.read();
        let mut downloaded = 0u64;

        for (position, sub) in self.sub_requests.iter().enumerate() {
            let size = index.get(&sub.pack).map(|pack| pack.size).unwrap_or(0);
            downloaded += match sub.status {
                SubRequestStatus::Mounted => size,
                SubRequestStatus::CheckHash if position == self.current => size,
                SubRequestStatus::LoadingPackFile if position == self.current => sub
                    .task_id
                    .map(|id| self.services.downloader.task_progress(id).min(size))
                    .unwrap_or(0),
                _ => 0,
            };
        }

        downloaded.min(self.full_size(&index))
    }

    /// The pack that caused the failure.
    pub fn error_pack(&self) -> Option<Pack> {
        let name = self.error_pack.as_ref()?;
        self.index.read().get(name).cloned()
    }

    /// Human-readable failure description, empty if the request has not failed.
    pub fn error_message(&self) -> String {
        self.error
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default()
    }

    pub fn error(&self) -> Option<&RequestError> {
        self.error.as_ref()
    }

    /// Drain the state change events queued since the last call.
    pub fn take_events(&mut self) -> Vec<PackEvent> {
        std::mem::take(&mut self.events)
    }

    fn is_running(&self) -> bool {
        self.started
            && !self.stopped
            && self.error.is_none()
            && self.current < self.sub_requests.len()
    }

    fn full_size(&self, index: &PackIndex) -> u64 {
        if self.sub_requests.is_empty() {
            return index.get(&self.root).map(|pack| pack.size).unwrap_or(0);
        }
        self.sub_requests
            .iter()
            .filter_map(|sub| index.get(&sub.pack))
            .map(|pack| pack.size)
            .sum()
    }

    fn current_pack(&self) -> String {
        self.sub_requests[self.current].pack.clone()
    }

    fn set_status(&mut self, status: SubRequestStatus) {
        let sub = &mut self.sub_requests[self.current];
        trace!(pack = %sub.pack, from = %sub.status, to = %status, "Sub-request transition");
        sub.status = status;
    }

    fn start_task(&mut self, range: Option<ByteRange>) {
        let name = self.current_pack();
        let url = self.services.pack_url(&name);
        let id = self.services.downloader.start_task(&url, range);
        self.sub_requests[self.current].task_id = Some(id);
        debug!(pack = %name, task = %id, url = %url, ?range, "Started download task");
    }

    /// Result of the current task, or `None` while it is still running.
    fn poll_task(&self) -> Option<DownloadResult<Bytes>> {
        let Some(id) = self.sub_requests[self.current].task_id else {
            return Some(Err(DownloadError::Setup(
                "no download task was started".to_string(),
            )));
        };
        let downloader = &self.services.downloader;
        if !downloader.is_task_finished(id) {
            return None;
        }
        Some(downloader.task_result(id))
    }

    fn on_wait(&mut self) -> RequestResult<()> {
        let name = self.current_pack();
        let claimed = {
            let mut index = self.index.write();
            let Some(pack) = index.get_mut(&name) else {
                return Err(ResolveError::UnknownPack {
                    name: name.clone(),
                    required_by: Some(self.root.clone()),
                }
                .into());
            };
            match pack.state {
                PackState::Mounted => false,
                // Another request owns this pack; wait until it lets go.
                PackState::Downloading => return Ok(()),
                PackState::NotRequested | PackState::Error => {
                    pack.state = PackState::Downloading;
                    pack.downloaded_size = 0;
                    true
                }
            }
        };

        if !claimed {
            debug!(pack = %name, "Pack already mounted");
            self.set_status(SubRequestStatus::Mounted);
            self.go_to_next_sub_request();
            return Ok(());
        }

        self.emit_state(&name, PackState::Downloading);
        self.start_task(Some(ByteRange::Suffix(FOOTER_SIZE as u64)));
        self.set_status(SubRequestStatus::AskFooter);
        Ok(())
    }

    fn on_ask_footer(&mut self) -> RequestResult<()> {
        let Some(result) = self.poll_task() else {
            return Ok(());
        };
        let bytes = result.map_err(|source| RequestError::FooterUnreachable {
            pack: self.current_pack(),
            source,
        })?;
        self.payload = Some(bytes);
        self.set_status(SubRequestStatus::GetFooter);
        Ok(())
    }

    fn on_get_footer(&mut self) -> RequestResult<()> {
        let name = self.current_pack();
        let bytes = self.payload.take().unwrap_or_default();
        let footer = FooterBlock::decode(&bytes).map_err(|source| RequestError::Footer {
            pack: name.clone(),
            source,
        })?;

        self.full_size_server_data = footer.archive_size();
        if let Some(pack) = self.index.write().get_mut(&name) {
            pack.size = footer.archive_size();
            pack.content_hash = Some(footer.content_hash);
        }
        self.footer = Some(footer);
        debug!(
            pack = %name,
            size = footer.archive_size(),
            files = footer.file_count,
            hash = %footer.content_hash,
            "Footer received"
        );

        self.start_task(Some(ByteRange::Span {
            start: 0,
            end: footer.archive_size() - 1,
        }));
        self.set_status(SubRequestStatus::LoadingPackFile);
        Ok(())
    }

    fn on_loading_pack_file(&mut self) -> RequestResult<()> {
        let name = self.current_pack();
        let Some(result) = self.poll_task() else {
            if let Some(id) = self.sub_requests[self.current].task_id {
                let received = self.services.downloader.task_progress(id);
                if let Some(pack) = self.index.write().get_mut(&name) {
                    pack.downloaded_size = received.min(pack.size);
                }
            }
            return Ok(());
        };

        let data = result.map_err(|source| RequestError::Download {
            pack: name.clone(),
            source,
        })?;
        let received = data.len() as u64;
        if received != self.full_size_server_data {
            return Err(RequestError::Download {
                source: DownloadError::Incomplete {
                    url: self.services.pack_url(&name),
                    expected: self.full_size_server_data,
                    received,
                },
                pack: name,
            });
        }

        self.payload = Some(data);
        self.set_status(SubRequestStatus::CheckHash);
        Ok(())
    }

    fn on_check_hash(&mut self) -> RequestResult<()> {
        let name = self.current_pack();
        let footer = self.footer.take().ok_or_else(|| RequestError::Footer {
            pack: name.clone(),
            source: FormatError::Layout("footer missing at hash check".to_string()),
        })?;
        let data = self.payload.take().unwrap_or_default();
        let body = data.get(..footer.body_size as usize).unwrap_or(&data[..]);

        let actual = self.services.hasher.hash(body);
        if actual != footer.content_hash {
            return Err(RequestError::Integrity {
                pack: name,
                expected: footer.content_hash,
                actual,
            });
        }

        if let Some(store) = &self.services.store {
            store.save(&name, &data).map_err(|source| RequestError::Store {
                pack: name.clone(),
                source,
            })?;
        }

        let mount_path = &self.services.config.mount_path;
        if let Err(source) = self.services.mount_point.mount(&name, data, mount_path) {
            if let Some(store) = &self.services.store {
                if let Err(e) = store.remove(&name) {
                    warn!(pack = %name, error = %e, "Failed to remove unmountable archive");
                }
            }
            return Err(RequestError::Mount { pack: name, source });
        }

        let size = match self.index.write().get_mut(&name) {
            Some(pack) => {
                pack.state = PackState::Mounted;
                pack.downloaded_size = pack.size;
                pack.size
            }
            None => 0,
        };
        self.set_status(SubRequestStatus::Mounted);
        self.emit_state(&name, PackState::Mounted);
        info!(pack = %name, size, "Pack mounted");

        self.go_to_next_sub_request();
        Ok(())
    }

    fn go_to_next_sub_request(&mut self) {
        self.current += 1;
        self.footer = None;
        self.payload = None;
        self.full_size_server_data = 0;

        if self.current >= self.sub_requests.len() {
            info!(
                pack = %self.root,
                packs = self.sub_requests.len(),
                "Pack request completed"
            );
        }
    }

    /// Enter the terminal error state for the current sub-request.
    fn fail(&mut self, err: RequestError) {
        let message = err.to_string();
        let name = self
            .sub_requests
            .get(self.current)
            .map(|sub| sub.pack.clone())
            .unwrap_or_else(|| self.root.clone());

        if let Some(sub) = self.sub_requests.get_mut(self.current) {
            sub.status = SubRequestStatus::Error;
            sub.error_message = message.clone();
        }

        let marked = match self.index.write().get_mut(&name) {
            Some(pack) if !pack.is_mounted() => {
                pack.state = PackState::Error;
                pack.downloaded_size = 0;
                true
            }
            _ => false,
        };

        warn!(pack = %self.root, error_pack = %name, error = %message, "Pack request failed");
        self.payload = None;
        self.footer = None;
        self.error_pack = Some(name.clone());
        self.error = Some(err);

        if marked {
            self.emit_state(&name, PackState::Error);
        }
    }

    fn emit_state(&mut self, pack: &str, state: PackState) {
        self.events.push(PackEvent::StateChanged {
            pack: pack.to_string(),
            state,
        });
    }
}

impl Drop for PackRequest {
    fn drop(&mut self) {
        self.stop();
    }
}
