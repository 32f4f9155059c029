use std::collections::HashSet;
use std::fmt;

use thiserror::Error;

/// Keys fetched per round-trip while iterating with [`scan`].
pub const DEFAULT_SCAN_COUNT: usize = 256;

/// Shape of the value stored under a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    Set,
    String,
    None,
}

impl KeyType {
    pub fn as_str(self) -> &'static str {
        match self {
            KeyType::Set => "set",
            KeyType::String => "string",
            KeyType::None => "none",
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("key {key} holds a {found} value, not a set")]
    WrongType { key: String, found: KeyType },
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

/// One page of keys returned by [`BucketStore::scan_page`].
///
/// `cursor` is the last key of the page; `None` means the keyspace is exhausted.
#[derive(Debug, Default)]
pub struct ScanPage {
    pub keys: Vec<String>,
    pub cursor: Option<String>,
}

/// Key-value namespace whose timestamp keys hold sets of visited URLs.
///
/// Every call is atomic on its own; nothing spans calls.
pub trait BucketStore: Send + Sync {
    /// Adds `urls` to the set stored at `timestamp`, creating it if absent.
    fn add_to_bucket(&self, timestamp: u64, urls: &[String]) -> Result<(), StoreError>;

    /// Returns up to `count` keys ordered after `cursor`.
    fn scan_page(&self, cursor: Option<&str>, count: usize) -> Result<ScanPage, StoreError>;

    fn type_of(&self, key: &str) -> Result<KeyType, StoreError>;

    /// Members of the set at `key`; empty when the key is absent.
    fn members_of(&self, key: &str) -> Result<HashSet<String>, StoreError>;
}

/// Lazily enumerates every key in `store`, one page at a time.
pub fn scan(store: &dyn BucketStore) -> KeyScan<'_> {
    KeyScan {
        store,
        count: DEFAULT_SCAN_COUNT,
        cursor: None,
        buffered: Vec::new().into_iter(),
        finished: false,
    }
}

pub struct KeyScan<'a> {
    store: &'a dyn BucketStore,
    count: usize,
    cursor: Option<String>,
    buffered: std::vec::IntoIter<String>,
    finished: bool,
}

impl KeyScan<'_> {
    pub fn with_count(mut self, count: usize) -> Self {
        self.count = count.max(1);
        self
    }
}

impl Iterator for KeyScan<'_> {
    type Item = Result<String, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(key) = self.buffered.next() {
                return Some(Ok(key));
            }
            if self.finished {
                return None;
            }
            match self.store.scan_page(self.cursor.as_deref(), self.count) {
                Ok(page) => {
                    self.finished = page.cursor.is_none();
                    self.cursor = page.cursor;
                    self.buffered = page.keys.into_iter();
                }
                Err(err) => {
                    self.finished = true;
                    return Some(Err(err));
                }
            }
        }
    }
}

/// A store whose backend is gone: every call reports `Unavailable`.
#[cfg(test)]
pub(crate) struct OfflineStore;

#[cfg(test)]
impl BucketStore for OfflineStore {
    fn add_to_bucket(&self, _timestamp: u64, _urls: &[String]) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }

    fn scan_page(&self, _cursor: Option<&str>, _count: usize) -> Result<ScanPage, StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }

    fn type_of(&self, _key: &str) -> Result<KeyType, StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }

    fn members_of(&self, _key: &str) -> Result<HashSet<String>, StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;

    #[test]
    fn scan_walks_every_page() {
        let store = MemoryStore::new();
        for ts in 0..10u64 {
            store
                .add_to_bucket(1_600_000_000 + ts, &["https://redis.io".to_string()])
                .unwrap();
        }
        store.set_string("session", "abc").unwrap();

        let keys: Vec<String> = scan(&store)
            .with_count(3)
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(keys.len(), 11);
        assert!(keys.contains(&"session".to_string()));
        assert!(keys.contains(&"1600000009".to_string()));
    }

    #[test]
    fn scan_of_empty_store_yields_nothing() {
        let store = MemoryStore::new();
        assert_eq!(scan(&store).count(), 0);
    }

    #[test]
    fn scan_surfaces_store_failure_once() {
        let mut keys = scan(&OfflineStore);
        assert!(matches!(keys.next(), Some(Err(StoreError::Unavailable(_)))));
        assert!(keys.next().is_none());
    }

    #[test]
    fn key_type_names_match_redis() {
        assert_eq!(KeyType::Set.to_string(), "set");
        assert_eq!(KeyType::String.to_string(), "string");
        assert_eq!(KeyType::None.to_string(), "none");
    }
}
