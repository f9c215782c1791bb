//! Handle table: stable opaque tokens for pinned native objects.
//!
//! A [`Handle`] is what scripts hold (inside a wrapper's handle token) in
//! place of a pointer to the native object. The [`HandleTable`] keeps every
//! issued object alive until it is explicitly released, and never reissues a
//! handle, so a stale wrapper cannot alias a newer object.

use crate::error::LifecycleError;
use crate::logging::targets;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

/// Opaque pointer-sized token identifying one live native object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Handle(usize);

impl Handle {
    /// Reconstruct a handle from its raw value.
    #[must_use]
    pub const fn from_raw(raw: usize) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn as_raw(self) -> usize {
        self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Arena of pinned objects addressed by [`Handle`].
///
/// Holding an entry is what "pinned" means here: the table owns a strong
/// reference to the object until [`HandleTable::release`] hands it back.
#[derive(Debug)]
pub struct HandleTable<T> {
    live: HashMap<Handle, T>,
    next: usize,
    released: u64,
}

impl<T> Default for HandleTable<T> {
    fn default() -> Self {
        Self {
            live: HashMap::new(),
            // 0 is never issued so it can stand for "no object"
            next: 1,
            released: 0,
        }
    }
}

impl<T> HandleTable<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin `object` and return a fresh handle for it.
    pub fn allocate(&mut self, object: T) -> Handle {
        self.allocate_with(|_| object)
    }

    /// Like [`HandleTable::allocate`], for objects that record their own handle.
    pub fn allocate_with(&mut self, build: impl FnOnce(Handle) -> T) -> Handle {
        let handle = Handle(self.next);
        self.next += 1;
        self.live.insert(handle, build(handle));
        tracing::trace!(
            target: targets::LIFECYCLE,
            handle = %handle,
            pinned = self.live.len(),
            "handle allocated"
        );
        handle
    }

    /// Look up a pinned object. Unknown and released handles resolve to `None`.
    pub fn resolve(&self, handle: Handle) -> Option<&T> {
        self.live.get(&handle)
    }

    pub fn contains(&self, handle: Handle) -> bool {
        self.live.contains_key(&handle)
    }

    /// Unpin the object behind `handle` and invalidate the handle.
    ///
    /// Releasing the same handle twice is a lifecycle violation and is
    /// reported, not ignored.
    pub fn release(&mut self, handle: Handle) -> Result<T, LifecycleError> {
        if let Some(object) = self.live.remove(&handle) {
            self.released += 1;
            tracing::trace!(
                target: targets::LIFECYCLE,
                handle = %handle,
                pinned = self.live.len(),
                "handle released"
            );
            return Ok(object);
        }

        let err = if self.was_issued(handle) {
            LifecycleError::DoubleRelease(handle)
        } else {
            LifecycleError::UnknownHandle(handle)
        };
        tracing::error!(target: targets::LIFECYCLE, handle = %handle, error = %err, "invalid handle release");
        Err(err)
    }

    /// Whether `handle` was issued by this table at some point.
    pub fn was_issued(&self, handle: Handle) -> bool {
        handle.0 != 0 && handle.0 < self.next
    }

    /// Number of currently pinned objects.
    pub fn pinned(&self) -> usize {
        self.live.len()
    }

    /// Number of successful releases over the table's lifetime.
    pub fn released(&self) -> u64 {
        self.released
    }

    /// Live handles in issue order.
    pub fn handles(&self) -> Vec<Handle> {
        let mut handles: Vec<Handle> = self.live.keys().copied().collect();
        handles.sort_unstable();
        handles
    }
}
