use std::num::NonZeroUsize;

use lru::LruCache;

use crate::config::DEFAULT_DEDUP_CAPACITY;

/// Outcome of recording a digest in a [`DigestWindow`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestPresence {
    New,
    Seen,
}

/// Bounded set of recently delivered transaction digests for one account.
/// Only the overlap with the previous poll has to be checked, so once the
/// window is full the least recently observed digest is evicted. A digest
/// that keeps showing up on the page is refreshed and stays in the window.
#[derive(Debug, Clone)]
pub struct DigestWindow {
    entries: LruCache<String, ()>,
}

impl DigestWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
        }
    }

    pub fn contains(&self, digest: &str) -> bool {
        self.entries.contains(digest)
    }

    /// Records the digest, evicting the least recent entry when full.
    pub fn record(&mut self, digest: &str) -> DigestPresence {
        if self.entries.get(digest).is_some() {
            return DigestPresence::Seen;
        }
        self.entries.put(digest.to_owned(), ());
        DigestPresence::New
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }
}

impl Default for DigestWindow {
    fn default() -> Self {
        Self::new(DEFAULT_DEDUP_CAPACITY)
    }
}
