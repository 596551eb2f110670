//! Object storage contract consumed by the pipeline.
//!
//! Backends implement a single page of listing plus whole-object reads and
//! writes. [`list_keys`] turns the paged listing into a lazy key sequence so
//! the dispatcher never deals with continuation tokens.

use std::collections::VecDeque;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("failed to list container '{container}': {message}")]
    List { container: String, message: String },

    #[error("failed to read '{key}' from '{container}': {message}")]
    Read {
        container: String,
        key: String,
        message: String,
    },

    #[error("failed to write '{key}' to '{container}': {message}")]
    Write {
        container: String,
        key: String,
        message: String,
    },
}

impl StorageError {
    pub fn list(container: &str, message: impl Into<String>) -> Self {
        Self::List {
            container: container.to_string(),
            message: message.into(),
        }
    }

    pub fn read(container: &str, key: &str, message: impl Into<String>) -> Self {
        Self::Read {
            container: container.to_string(),
            key: key.to_string(),
            message: message.into(),
        }
    }

    pub fn write(container: &str, key: &str, message: impl Into<String>) -> Self {
        Self::Write {
            container: container.to_string(),
            key: key.to_string(),
            message: message.into(),
        }
    }
}

/// One page of a container listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyPage {
    pub keys: Vec<String>,
    /// Token for the next page; `None` once the listing is exhausted.
    pub next_token: Option<String>,
}

/// Shared, read-only storage capability handed to every task unit.
pub trait ObjectStore: Send + Sync {
    fn list_page(
        &self,
        container: &str,
        prefix: Option<&str>,
        continuation: Option<&str>,
    ) -> Result<KeyPage, StorageError>;

    fn read_object(&self, container: &str, key: &str) -> Result<Vec<u8>, StorageError>;

    /// Replaces any existing object stored under `key`.
    fn write_object(
        &self,
        container: &str,
        key: &str,
        body: &[u8],
        content_type: Option<&str>,
    ) -> Result<(), StorageError>;
}

impl<T: ObjectStore + ?Sized> ObjectStore for &T {
    fn list_page(
        &self,
        container: &str,
        prefix: Option<&str>,
        continuation: Option<&str>,
    ) -> Result<KeyPage, StorageError> {
        (**self).list_page(container, prefix, continuation)
    }

    fn read_object(&self, container: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        (**self).read_object(container, key)
    }

    fn write_object(
        &self,
        container: &str,
        key: &str,
        body: &[u8],
        content_type: Option<&str>,
    ) -> Result<(), StorageError> {
        (**self).write_object(container, key, body, content_type)
    }
}

/// Lazily pages through every key under `prefix` in `container`.
///
/// The sequence yields at most one error and then ends. It cannot be
/// restarted; call [`list_keys`] again to re-list from the beginning.
pub fn list_keys<'a>(
    store: &'a dyn ObjectStore,
    container: &'a str,
    prefix: Option<&'a str>,
) -> KeyListing<'a> {
    KeyListing {
        store,
        container,
        prefix,
        buffered: VecDeque::new(),
        next_token: None,
        pages_fetched: 0,
        exhausted: false,
    }
}

pub struct KeyListing<'a> {
    store: &'a dyn ObjectStore,
    container: &'a str,
    prefix: Option<&'a str>,
    buffered: VecDeque<String>,
    next_token: Option<String>,
    pages_fetched: usize,
    exhausted: bool,
}

impl KeyListing<'_> {
    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }
}

impl Iterator for KeyListing<'_> {
    type Item = Result<String, StorageError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(key) = self.buffered.pop_front() {
                return Some(Ok(key));
            }
            if self.exhausted {
                return None;
            }

            let page = match self.store.list_page(
                self.container,
                self.prefix,
                self.next_token.as_deref(),
            ) {
                Ok(page) => page,
                Err(error) => {
                    self.exhausted = true;
                    return Some(Err(error));
                }
            };

            self.pages_fetched += 1;
            // Empty pages carrying a token are legal; keep paging.
            match page.next_token {
                Some(token) if Some(&token) == self.next_token.as_ref() => {
                    self.exhausted = true;
                    return Some(Err(StorageError::list(
                        self.container,
                        "listing returned a repeated continuation token",
                    )));
                }
                Some(token) => self.next_token = Some(token),
                None => self.exhausted = true,
            }
            self.buffered.extend(page.keys);
        }
    }
}
