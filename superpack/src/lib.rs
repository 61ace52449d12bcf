//! Superpack - on-demand asset pack delivery
//!
//! This library downloads remotely hosted asset archives ("superpacks"),
//! verifies them against the hash in their footer and mounts them into a
//! virtual filesystem, resolving dependencies between packs and scheduling
//! requests by priority.
//!
//! # Overview
//!
//! - [`format`]: the archive layout (header, file data, file table, footer)
//! - [`download`]: asynchronous download tasks polled by id
//! - [`request`]: the per-pack state machine
//! - [`resolve`]: dependency expansion in acquisition order
//! - [`manager`]: request coalescing and priority scheduling
//! - [`mount`]: the virtual filesystem archives are mounted into

pub mod config;
pub mod download;
pub mod events;
pub mod format;
pub mod hash;
pub mod index;
pub mod logging;
pub mod manager;
pub mod mount;
pub mod request;
pub mod resolve;
pub mod services;
pub mod store;

pub use config::{ConfigError, PackManagerConfig};
pub use events::{EventDispatcher, PackEvent};
pub use index::{Pack, PackIndex, PackState};
pub use manager::{ManagerResult, PackManager, PackManagerError, RequestHandle};
pub use request::{PackRequest, RequestError, SubRequest, SubRequestStatus};
pub use services::PackServices;
