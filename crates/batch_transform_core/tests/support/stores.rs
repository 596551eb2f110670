use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use batch_transform_core::{KeyPage, MemoryObjectStore, ObjectStore, StorageError};

/// Wraps a memory store and records how many read/write calls overlap.
pub struct InstrumentedStore {
    pub inner: MemoryObjectStore,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    writes: AtomicUsize,
    call_delay: Duration,
}

impl InstrumentedStore {
    pub fn new(inner: MemoryObjectStore, call_delay: Duration) -> Self {
        Self {
            inner,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
            call_delay,
        }
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn track<T>(&self, call: impl FnOnce() -> T) -> T {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        if !self.call_delay.is_zero() {
            thread::sleep(self.call_delay);
        }
        let result = call();
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

impl ObjectStore for InstrumentedStore {
    fn list_page(
        &self,
        container: &str,
        prefix: Option<&str>,
        continuation: Option<&str>,
    ) -> Result<KeyPage, StorageError> {
        self.inner.list_page(container, prefix, continuation)
    }

    fn read_object(&self, container: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        self.track(|| self.inner.read_object(container, key))
    }

    fn write_object(
        &self,
        container: &str,
        key: &str,
        body: &[u8],
        content_type: Option<&str>,
    ) -> Result<(), StorageError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.track(|| self.inner.write_object(container, key, body, content_type))
    }
}

/// Serves the first `pages_before_failure` listing pages, then denies access.
pub struct FlakyListingStore {
    pub inner: MemoryObjectStore,
    pages_before_failure: usize,
    pages_served: AtomicUsize,
    writes: AtomicUsize,
}

impl FlakyListingStore {
    pub fn new(inner: MemoryObjectStore, pages_before_failure: usize) -> Self {
        Self {
            inner,
            pages_before_failure,
            pages_served: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
        }
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl ObjectStore for FlakyListingStore {
    fn list_page(
        &self,
        container: &str,
        prefix: Option<&str>,
        continuation: Option<&str>,
    ) -> Result<KeyPage, StorageError> {
        if self.pages_served.fetch_add(1, Ordering::SeqCst) >= self.pages_before_failure {
            return Err(StorageError::list(container, "access denied"));
        }
        self.inner.list_page(container, prefix, continuation)
    }

    fn read_object(&self, container: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        self.inner.read_object(container, key)
    }

    fn write_object(
        &self,
        container: &str,
        key: &str,
        body: &[u8],
        content_type: Option<&str>,
    ) -> Result<(), StorageError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.write_object(container, key, body, content_type)
    }
}

/// Replays a fixed page script, reading and writing through `inner`.
pub struct ScriptedListingStore {
    pub inner: MemoryObjectStore,
    pages: Vec<KeyPage>,
    pages_served: AtomicUsize,
    writes: AtomicUsize,
}

impl ScriptedListingStore {
    pub fn new(inner: MemoryObjectStore, pages: &[(&[&str], Option<&str>)]) -> Self {
        let pages = pages
            .iter()
            .map(|(keys, next_token)| KeyPage {
                keys: keys.iter().map(|key| key.to_string()).collect(),
                next_token: next_token.map(str::to_string),
            })
            .collect();
        Self {
            inner,
            pages,
            pages_served: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
        }
    }

    pub fn pages_served(&self) -> usize {
        self.pages_served.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl ObjectStore for ScriptedListingStore {
    fn list_page(
        &self,
        container: &str,
        _prefix: Option<&str>,
        _continuation: Option<&str>,
    ) -> Result<KeyPage, StorageError> {
        let index = self.pages_served.fetch_add(1, Ordering::SeqCst);
        self.pages
            .get(index)
            .cloned()
            .ok_or_else(|| StorageError::list(container, "page script exhausted"))
    }

    fn read_object(&self, container: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        self.inner.read_object(container, key)
    }

    fn write_object(
        &self,
        container: &str,
        key: &str,
        body: &[u8],
        content_type: Option<&str>,
    ) -> Result<(), StorageError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.write_object(container, key, body, content_type)
    }
}

pub fn seeded_store(page_size: usize, objects: &[(&str, &[u8])]) -> MemoryObjectStore {
    let store = MemoryObjectStore::with_page_size(page_size);
    store.create_container("source");
    for (key, body) in objects {
        store.seed_object("source", key, body);
    }
    store
}
