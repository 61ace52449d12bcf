//! Pack manager: request coalescing and priority scheduling.
//!
//! The manager owns the pack index and every live [`PackRequest`]. Client
//! code asks for packs by name and drives the manager from its update loop:
//!
//! ```ignore
//! let manager = PackManager::new(index, services);
//! manager.initialize()?;
//!
//! let level = manager.request_pack("level1")?;
//! while !level.is_done() && !level.is_error() {
//!     manager.update();
//!     draw_progress(level.downloaded_size(), level.full_size_with_dependencies());
//! }
//! ```
//!
//! Requests are coalesced by root pack name: asking for the same pack twice
//! returns the same [`RequestHandle`]. Each [`update`](PackManager::update)
//! visits queued requests from highest to lowest priority. Requests that
//! already started downloading always progress; new work is only started
//! while fewer than `max_concurrent_requests` requests are in flight.
//!
//! Events are dispatched on the calling thread after the manager has
//! released its locks, so listeners may read request handles and query the
//! manager.

mod error;
mod handle;
mod queue;

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::config::PackManagerConfig;
use crate::download::HttpDownloadManager;
use crate::events::PackEvent;
use crate::format::PackArchive;
use crate::index::{Pack, PackIndex, PackState};
use crate::mount::MountPoint;
use crate::request::PackRequest;
use crate::services::PackServices;

pub use error::{ManagerResult, PackManagerError};
pub use handle::RequestHandle;
pub use queue::{QueuedRequest, RequestQueue};

#[derive(Debug, Default)]
struct SchedulerState {
    requests: HashMap<String, RequestHandle>,
    queue: RequestQueue,
    /// Last reported downloaded size per request.
    reported: HashMap<String, u64>,
}

/// Owns the pack index and schedules pack requests.
pub struct PackManager {
    index: Arc<RwLock<PackIndex>>,
    services: Arc<PackServices>,
    state: Mutex<SchedulerState>,
}

impl std::fmt::Debug for PackManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("PackManager")
            .field("packs", &self.index.read().len())
            .field("requests", &state.requests.len())
            .field("queued", &state.queue.len())
            .finish()
    }
}

impl PackManager {
    pub fn new(index: PackIndex, services: PackServices) -> Self {
        Self {
            index: Arc::new(RwLock::new(index)),
            services: Arc::new(services),
            state: Mutex::new(SchedulerState::default()),
        }
    }

    /// Manager downloading over HTTP with the settings from `config`.
    pub fn with_http(
        config: PackManagerConfig,
        index: PackIndex,
        mount_point: Arc<dyn MountPoint>,
    ) -> ManagerResult<Self> {
        let downloader =
            HttpDownloadManager::with_settings(config.timeout, config.max_concurrent_downloads)?;
        let services = PackServices::new(config, Arc::new(downloader), mount_point);
        Ok(Self::new(index, services))
    }

    /// Reset every pack and mount the archives already in local storage.
    ///
    /// Live requests are stopped and forgotten. Stored archives that fail
    /// verification or mounting are skipped and stay `NotRequested`.
    /// Returns the number of packs mounted from storage.
    pub fn initialize(&self) -> ManagerResult<usize> {
        let mut released = Vec::new();
        {
            let mut state = self.state.lock();
            for handle in state.requests.values() {
                let mut request = handle.lock();
                request.stop();
                released.extend(request.take_events());
            }
            state.requests.clear();
            state.queue.clear();
            state.reported.clear();
        }
        self.dispatch(released);

        let names: Vec<String> = {
            let mut index = self.index.write();
            index.reset_all();
            index.names().map(str::to_string).collect()
        };
        for name in &names {
            if self.services.mount_point.is_mounted(name) {
                if let Err(e) = self.services.mount_point.unmount(name) {
                    warn!(pack = %name, error = %e, "Failed to unmount pack");
                }
            }
        }

        let Some(store) = &self.services.store else {
            info!(packs = names.len(), "Pack manager initialized");
            return Ok(0);
        };
        if !store.dir().exists() {
            info!(packs = names.len(), "Pack manager initialized");
            return Ok(0);
        }

        let mut mounted = 0;
        for name in store.list()? {
            if !names.contains(&name) {
                debug!(pack = %name, "Ignoring stored pack missing from index");
                continue;
            }
            match self.mount_stored(&name) {
                Ok(size) => {
                    mounted += 1;
                    debug!(pack = %name, size, "Mounted stored pack");
                }
                Err(reason) => {
                    warn!(pack = %name, error = %reason, "Skipping stored pack");
                }
            }
        }

        info!(packs = names.len(), mounted, "Pack manager initialized");
        Ok(mounted)
    }

    fn mount_stored(&self, name: &str) -> Result<u64, String> {
        let store = self
            .services
            .store
            .as_ref()
            .ok_or_else(|| "local storage disabled".to_string())?;
        let data = store
            .load(name)
            .map_err(|e| e.to_string())?
            .ok_or_else(|| "archive vanished".to_string())?;

        let archive = PackArchive::parse_verified(data.clone(), self.services.hasher.as_ref())
            .map_err(|e| e.to_string())?;
        let footer = *archive.footer();
        self.services
            .mount_point
            .mount(name, data, &self.services.config.mount_path)
            .map_err(|e| e.to_string())?;

        if let Some(pack) = self.index.write().get_mut(name) {
            pack.state = PackState::Mounted;
            pack.size = footer.archive_size();
            pack.downloaded_size = pack.size;
            pack.content_hash = Some(footer.content_hash);
        }
        self.services.events.emit(PackEvent::StateChanged {
            pack: name.to_string(),
            state: PackState::Mounted,
        });
        Ok(footer.archive_size())
    }

    /// Get the request for `name`, creating and starting one if needed.
    ///
    /// A live request for the same pack is returned as is. A request that
    /// failed or was stopped is replaced by a fresh one.
    pub fn request_pack(&self, name: &str) -> ManagerResult<RequestHandle> {
        if !self.index.read().contains(name) {
            return Err(PackManagerError::UnknownPack(name.to_string()));
        }

        let mut state = self.state.lock();
        if let Some(existing) = state.requests.get(name) {
            let reusable = {
                let request = existing.lock();
                !request.is_error() && !request.is_stopped()
            };
            if reusable {
                debug!(pack = %name, "Reusing live pack request");
                return Ok(existing.clone());
            }
            debug!(pack = %name, "Replacing finished pack request");
        }

        let mut request = PackRequest::new(name, Arc::clone(&self.index), Arc::clone(&self.services));
        if let Err(e) = request.start() {
            warn!(pack = %name, error = %e, "Pack request could not be started");
        }
        let events = request.take_events();
        let priority = request.priority();
        let handle = RequestHandle::new(request);

        state.requests.insert(name.to_string(), handle.clone());
        state.reported.remove(name);
        state.queue.push(name, priority);
        drop(state);

        info!(pack = %name, priority, "Pack requested");
        self.dispatch(events);
        Ok(handle)
    }

    /// Run one scheduling pass over the queued requests.
    pub fn update(&self) {
        let events = {
            let mut state = self.state.lock();
            self.schedule(&mut state)
        };
        self.dispatch(events);
    }

    /// Hand events to listeners. Callers must not hold any manager or
    /// request lock.
    fn dispatch(&self, events: Vec<PackEvent>) {
        for event in events {
            self.services.events.emit(event);
        }
    }

    fn schedule(&self, state: &mut SchedulerState) -> Vec<PackEvent> {
        let max_in_flight = self.services.config.max_concurrent_requests.max(1);
        let order = state.queue.ordered();
        let handles: Vec<(String, RequestHandle)> = order
            .into_iter()
            .filter_map(|name| state.requests.get(&name).cloned().map(|h| (name, h)))
            .collect();

        let mut in_flight = handles
            .iter()
            .filter(|(_, handle)| handle.lock().is_in_flight())
            .count();
        let mut events = Vec::new();
        let mut finished = Vec::new();

        for (name, handle) in handles {
            let mut request = handle.lock();
            if request.is_stopped() {
                events.extend(request.take_events());
                finished.push(name);
                continue;
            }

            let was_in_flight = request.is_in_flight();
            if !was_in_flight && !request.is_finished() && in_flight >= max_in_flight {
                continue;
            }

            request.update();
            events.extend(request.take_events());

            match (was_in_flight, request.is_in_flight()) {
                (false, true) => in_flight += 1,
                (true, false) => in_flight = in_flight.saturating_sub(1),
                _ => {}
            }

            let downloaded = request.downloaded_size();
            if state.reported.get(&name) != Some(&downloaded) {
                state.reported.insert(name.clone(), downloaded);
                events.push(PackEvent::Progress {
                    pack: name.clone(),
                    downloaded,
                    total: request.full_size_with_dependencies(),
                });
            }

            if request.is_done() {
                events.push(PackEvent::RequestCompleted { pack: name.clone() });
                finished.push(name);
            } else if request.is_error() {
                events.push(PackEvent::RequestFailed {
                    pack: name.clone(),
                    error_pack: request
                        .error_pack()
                        .map(|pack| pack.name)
                        .unwrap_or_else(|| name.clone()),
                    message: request.error_message(),
                });
                finished.push(name);
            }
        }

        // Clients holding a handle keep the request alive; the manager lets go.
        for name in finished {
            state.queue.remove(&name);
            state.reported.remove(&name);
            state.requests.remove(&name);
        }
        events
    }

    /// Change the priority of the live request for `name`.
    pub fn change_priority(&self, name: &str, priority: f32) -> ManagerResult<()> {
        let mut state = self.state.lock();
        let handle = state
            .requests
            .get(name)
            .cloned()
            .ok_or_else(|| PackManagerError::NoActiveRequest(name.to_string()))?;
        handle.lock().change_priority(priority);
        state.queue.set_priority(name, priority);
        Ok(())
    }

    /// Stop and forget the request for `name`. Returns whether one existed.
    pub fn cancel(&self, name: &str) -> bool {
        let handle = {
            let mut state = self.state.lock();
            let Some(handle) = state.requests.remove(name) else {
                return false;
            };
            state.queue.remove(name);
            state.reported.remove(name);
            handle
        };
        let events = {
            let mut request = handle.lock();
            request.stop();
            request.take_events()
        };
        info!(pack = %name, "Pack request cancelled");
        self.dispatch(events);
        true
    }

    pub fn pack(&self, name: &str) -> Option<Pack> {
        self.index.read().get(name).cloned()
    }

    /// Snapshot of every pack in name order.
    pub fn packs(&self) -> Vec<Pack> {
        self.index.read().iter().cloned().collect()
    }

    /// Queued requests from highest to lowest priority.
    pub fn active_requests(&self) -> Vec<RequestHandle> {
        let state = self.state.lock();
        state
            .queue
            .ordered()
            .iter()
            .filter_map(|name| state.requests.get(name).cloned())
            .collect()
    }

    /// Register an event listener.
    pub fn subscribe<F>(&self, listener: F)
    where
        F: Fn(&PackEvent) + Send + Sync + 'static,
    {
        self.services.events.subscribe(listener);
    }

    /// No request is waiting or in flight.
    pub fn is_idle(&self) -> bool {
        self.state.lock().queue.is_empty()
    }

    pub fn index(&self) -> Arc<RwLock<PackIndex>> {
        Arc::clone(&self.index)
    }

    pub fn services(&self) -> &Arc<PackServices> {
        &self.services
    }
}
