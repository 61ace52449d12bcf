//! One pack's progress through a request.

use std::fmt;

use crate::download::TaskId;

/// Step of a [`SubRequest`].
///
/// `Wait → AskFooter → GetFooter → LoadingPackFile → CheckHash → Mounted`,
/// with `Error` reachable from every step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SubRequestStatus {
    /// Queued, nothing started.
    #[default]
    Wait,
    /// Footer range task in flight.
    AskFooter,
    /// Footer bytes arrived and wait to be parsed.
    GetFooter,
    /// Body task in flight.
    LoadingPackFile,
    /// Body arrived and waits for hash verification.
    CheckHash,
    Mounted,
    Error,
}

impl SubRequestStatus {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Wait => "wait",
            Self::AskFooter => "ask footer",
            Self::GetFooter => "get footer",
            Self::LoadingPackFile => "loading pack file",
            Self::CheckHash => "check hash",
            Self::Mounted => "mounted",
            Self::Error => "error",
        }
    }

    /// Whether the pack is claimed and being worked on.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            Self::AskFooter | Self::GetFooter | Self::LoadingPackFile | Self::CheckHash
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Mounted | Self::Error)
    }
}

impl fmt::Display for SubRequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Progress of one pack (a dependency or the root) within a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubRequest {
    pub pack: String,
    /// Download task of the current step, if one was started.
    pub task_id: Option<TaskId>,
    pub error_message: String,
    pub status: SubRequestStatus,
}

impl SubRequest {
    pub fn new(pack: impl Into<String>) -> Self {
        Self {
            pack: pack.into(),
            task_id: None,
            error_message: String::new(),
            status: SubRequestStatus::Wait,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_sub_request_waits() {
        let sub = SubRequest::new("core");
        assert_eq!(sub.status, SubRequestStatus::Wait);
        assert!(sub.task_id.is_none());
        assert!(sub.error_message.is_empty());
    }

    #[test]
    fn test_status_classification() {
        assert!(!SubRequestStatus::Wait.is_active());
        assert!(SubRequestStatus::LoadingPackFile.is_active());
        assert!(SubRequestStatus::CheckHash.is_active());
        assert!(SubRequestStatus::Mounted.is_terminal());
        assert!(SubRequestStatus::Error.is_terminal());
        assert!(!SubRequestStatus::Error.is_active());
        assert_eq!(SubRequestStatus::AskFooter.to_string(), "ask footer");
    }
}
