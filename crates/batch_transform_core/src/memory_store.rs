use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::RwLock;

use crate::storage::{KeyPage, ObjectStore, StorageError};

pub const DEFAULT_PAGE_SIZE: usize = 1_000;

type Container = BTreeMap<String, Vec<u8>>;

/// In-process object store used by tests and local runs.
///
/// Containers must be created before they can be listed. Writing to an
/// unknown container creates it, mirroring a bucket that already exists.
#[derive(Debug)]
pub struct MemoryObjectStore {
    containers: RwLock<BTreeMap<String, Container>>,
    page_size: usize,
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            containers: RwLock::new(BTreeMap::new()),
            page_size: page_size.max(1),
        }
    }

    pub fn create_container(&self, container: &str) {
        if let Ok(mut containers) = self.containers.write() {
            containers.entry(container.to_string()).or_default();
        }
    }

    pub fn seed_object(&self, container: &str, key: &str, body: &[u8]) {
        if let Ok(mut containers) = self.containers.write() {
            containers
                .entry(container.to_string())
                .or_default()
                .insert(key.to_string(), body.to_vec());
        }
    }

    pub fn object(&self, container: &str, key: &str) -> Option<Vec<u8>> {
        let containers = self.containers.read().ok()?;
        containers.get(container)?.get(key).cloned()
    }

    /// Copy of every object currently held in `container`.
    pub fn snapshot(&self, container: &str) -> BTreeMap<String, Vec<u8>> {
        self.containers
            .read()
            .ok()
            .and_then(|containers| containers.get(container).cloned())
            .unwrap_or_default()
    }
}

impl ObjectStore for MemoryObjectStore {
    fn list_page(
        &self,
        container: &str,
        prefix: Option<&str>,
        continuation: Option<&str>,
    ) -> Result<KeyPage, StorageError> {
        let containers = self
            .containers
            .read()
            .map_err(|_| StorageError::list(container, "store lock poisoned"))?;
        let objects = containers
            .get(container)
            .ok_or_else(|| StorageError::list(container, "container does not exist"))?;

        let lower = match continuation {
            Some(token) => Bound::Excluded(token.to_string()),
            None => Bound::Unbounded,
        };
        let mut matching = objects
            .range((lower, Bound::Unbounded))
            .map(|(key, _)| key)
            .filter(|key| prefix.map_or(true, |prefix| key.starts_with(prefix)));

        let keys: Vec<String> = matching.by_ref().take(self.page_size).cloned().collect();
        let next_token = match (matching.next(), keys.last()) {
            (Some(_), Some(last)) => Some(last.clone()),
            _ => None,
        };

        Ok(KeyPage { keys, next_token })
    }

    fn read_object(&self, container: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        let containers = self
            .containers
            .read()
            .map_err(|_| StorageError::read(container, key, "store lock poisoned"))?;
        containers
            .get(container)
            .and_then(|objects| objects.get(key))
            .cloned()
            .ok_or_else(|| StorageError::read(container, key, "no such key"))
    }

    fn write_object(
        &self,
        container: &str,
        key: &str,
        body: &[u8],
        _content_type: Option<&str>,
    ) -> Result<(), StorageError> {
        let mut containers = self
            .containers
            .write()
            .map_err(|_| StorageError::write(container, key, "store lock poisoned"))?;
        containers
            .entry(container.to_string())
            .or_default()
            .insert(key.to_string(), body.to_vec());
        Ok(())
    }
}
