//! Identifiers and byte ranges shared by download managers.

use std::fmt;
use std::ops::Range;

/// Opaque identifier of an asynchronous download task.
///
/// Ids are handed out in increasing order by each download manager and are
/// never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Portion of a remote object to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteRange {
    /// The last `n` bytes of the object.
    Suffix(u64),
    /// Bytes `start..=end`.
    Span { start: u64, end: u64 },
}

impl ByteRange {
    /// Value for an HTTP `Range` header.
    pub fn to_header_value(&self) -> String {
        match self {
            Self::Suffix(n) => format!("bytes=-{}", n),
            Self::Span { start, end } => format!("bytes={}-{}", start, end),
        }
    }

    /// Resolve the range against an object of `len` bytes.
    ///
    /// A span running past the end is cut short, as HTTP servers do.
    /// Returns `None` when the range cannot be satisfied.
    pub fn resolve(&self, len: u64) -> Option<Range<usize>> {
        match *self {
            Self::Suffix(n) => {
                if n == 0 || n > len {
                    return None;
                }
                Some((len - n) as usize..len as usize)
            }
            Self::Span { start, end } => {
                if start > end || start >= len {
                    return None;
                }
                Some(start as usize..end.min(len - 1) as usize + 1)
            }
        }
    }

    /// Number of bytes the range covers, when known without the object size.
    pub fn len_hint(&self) -> u64 {
        match *self {
            Self::Suffix(n) => n,
            Self::Span { start, end } => end.saturating_sub(start) + 1,
        }
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_header_value())
    }
}
