//! Provides the immutable byte payload handed out by the cache.
//!
//! Cached values are shared between the cache itself and any number of concurrent readers.
//! Therefore values are represented as a [ByteView] which is immutable after construction and
//! cheap to clone - cloning only bumps a reference count, the payload itself is never copied
//! or mutated.
use std::fmt;

use bytes::Bytes;

use crate::lru::ByteSize;

/// An immutable view on a cached byte sequence.
///
/// A view is created from an owned buffer (or by copying a borrowed one) and never changes
/// afterwards. Readers either borrow the payload via [as_slice](ByteView::as_slice) or obtain
/// an independent copy via [to_vec](ByteView::to_vec) - mutating such a copy has no effect on
/// the view or any of its clones.
///
/// # Examples
/// ```
/// # use ganymede::byteview::ByteView;
/// let view = ByteView::from("hello");
/// assert_eq!(view.len(), 5);
/// assert_eq!(view.as_slice(), b"hello");
///
/// // Copies handed out by the view are independent...
/// let mut copy = view.to_vec();
/// copy[0] = b'H';
/// assert_eq!(view.as_slice(), b"hello");
/// ```
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ByteView {
    data: Bytes,
}

impl ByteView {
    /// Returns the length of the underlying payload in bytes. O(1).
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Determines if the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Provides read access to the underlying payload.
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Returns an independent copy of the underlying payload.
    pub fn to_vec(&self) -> Vec<u8> {
        self.data.to_vec()
    }
}

impl From<Vec<u8>> for ByteView {
    fn from(data: Vec<u8>) -> Self {
        ByteView {
            data: Bytes::from(data),
        }
    }
}

impl From<&[u8]> for ByteView {
    fn from(data: &[u8]) -> Self {
        ByteView {
            data: Bytes::copy_from_slice(data),
        }
    }
}

impl From<&str> for ByteView {
    fn from(data: &str) -> Self {
        ByteView {
            data: Bytes::copy_from_slice(data.as_bytes()),
        }
    }
}

impl fmt::Display for ByteView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.data))
    }
}

impl fmt::Debug for ByteView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ByteView({} bytes)", self.data.len())
    }
}

impl ByteSize for ByteView {
    fn allocated_size(&self) -> usize {
        self.data.len()
    }
}
