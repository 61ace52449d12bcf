//! Shared handle to a live pack request.

use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use crate::index::Pack;
use crate::request::{PackRequest, SubRequest};

/// Client-side reference to a [`PackRequest`] owned by the pack manager.
///
/// Handles for the same pack name obtained while the request is live point
/// at the same request; use [`same_request`](Self::same_request) to check.
#[derive(Debug, Clone)]
pub struct RequestHandle(Arc<Mutex<PackRequest>>);

impl RequestHandle {
    pub(crate) fn new(request: PackRequest) -> Self {
        Self(Arc::new(Mutex::new(request)))
    }

    /// Lock the underlying request.
    ///
    /// Holding the guard blocks the manager's scheduling pass.
    pub fn lock(&self) -> MutexGuard<'_, PackRequest> {
        self.0.lock()
    }

    /// Whether both handles refer to the same request.
    pub fn same_request(&self, other: &RequestHandle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn root_pack(&self) -> String {
        self.0.lock().root_pack().to_string()
    }

    pub fn priority(&self) -> f32 {
        self.0.lock().priority()
    }

    pub fn is_done(&self) -> bool {
        self.0.lock().is_done()
    }

    pub fn is_error(&self) -> bool {
        self.0.lock().is_error()
    }

    pub fn is_stopped(&self) -> bool {
        self.0.lock().is_stopped()
    }

    pub fn current_sub_request(&self) -> Option<SubRequest> {
        self.0.lock().current_sub_request().cloned()
    }

    pub fn full_size_with_dependencies(&self) -> u64 {
        self.0.lock().full_size_with_dependencies()
    }

    pub fn downloaded_size(&self) -> u64 {
        self.0.lock().downloaded_size()
    }

    pub fn error_pack(&self) -> Option<Pack> {
        self.0.lock().error_pack()
    }

    pub fn error_message(&self) -> String {
        self.0.lock().error_message()
    }
}
