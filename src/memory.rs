use std::collections::{BTreeMap, HashSet};
use std::ops::Bound;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::store::{BucketStore, KeyType, ScanPage, StoreError};

#[derive(Debug, Clone)]
enum Value {
    Set(HashSet<String>),
    String(String),
}

/// Process-local store backed by an ordered map.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<BTreeMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a plain string under `key`, replacing whatever was there.
    pub fn set_string(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.write()?
            .insert(key.to_string(), Value::String(value.to_string()));
        Ok(())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<String, Value>>, StoreError> {
        self.data
            .read()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<String, Value>>, StoreError> {
        self.data
            .write()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }
}

impl BucketStore for MemoryStore {
    fn add_to_bucket(&self, timestamp: u64, urls: &[String]) -> Result<(), StoreError> {
        if urls.is_empty() {
            return Ok(());
        }
        let key = timestamp.to_string();
        let mut data = self.write()?;
        match data
            .entry(key.clone())
            .or_insert_with(|| Value::Set(HashSet::new()))
        {
            Value::Set(members) => {
                members.extend(urls.iter().cloned());
                Ok(())
            }
            Value::String(_) => Err(StoreError::WrongType {
                key,
                found: KeyType::String,
            }),
        }
    }

    fn scan_page(&self, cursor: Option<&str>, count: usize) -> Result<ScanPage, StoreError> {
        let data = self.read()?;
        let lower = match cursor {
            Some(last) => Bound::Excluded(last),
            None => Bound::Unbounded,
        };
        let keys: Vec<String> = data
            .range::<str, _>((lower, Bound::Unbounded))
            .take(count)
            .map(|(key, _)| key.clone())
            .collect();
        let cursor = if keys.len() == count {
            keys.last().cloned()
        } else {
            None
        };
        Ok(ScanPage { keys, cursor })
    }

    fn type_of(&self, key: &str) -> Result<KeyType, StoreError> {
        Ok(match self.read()?.get(key) {
            Some(Value::Set(_)) => KeyType::Set,
            Some(Value::String(_)) => KeyType::String,
            None => KeyType::None,
        })
    }

    fn members_of(&self, key: &str) -> Result<HashSet<String>, StoreError> {
        match self.read()?.get(key) {
            Some(Value::Set(members)) => Ok(members.clone()),
            Some(Value::String(_)) => Err(StoreError::WrongType {
                key: key.to_string(),
                found: KeyType::String,
            }),
            None => Ok(HashSet::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn links(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn writes_in_the_same_second_merge() {
        let store = MemoryStore::new();
        store
            .add_to_bucket(1627575770, &links(&["vk.com", "redis.io"]))
            .unwrap();
        store
            .add_to_bucket(1627575770, &links(&["redis.io", "https://yandex.ru?=111111"]))
            .unwrap();

        let members = store.members_of("1627575770").unwrap();
        assert_eq!(members.len(), 3);
        assert!(members.contains("https://yandex.ru?=111111"));
    }

    #[test]
    fn empty_batch_creates_no_bucket() {
        let store = MemoryStore::new();
        store.add_to_bucket(1627575770, &[]).unwrap();
        assert_eq!(store.type_of("1627575770").unwrap(), KeyType::None);
    }

    #[test]
    fn adding_to_a_string_key_is_a_type_error() {
        let store = MemoryStore::new();
        store.set_string("1627575770", "plain").unwrap();
        let err = store
            .add_to_bucket(1627575770, &links(&["vk.com"]))
            .unwrap_err();
        assert!(matches!(err, StoreError::WrongType { found: KeyType::String, .. }));
    }

    #[test]
    fn pages_resume_after_cursor() {
        let store = MemoryStore::new();
        for key in ["a", "b", "c"] {
            store.set_string(key, "x").unwrap();
        }
        let first = store.scan_page(None, 2).unwrap();
        assert_eq!(first.keys, vec!["a", "b"]);
        let second = store.scan_page(first.cursor.as_deref(), 2).unwrap();
        assert_eq!(second.keys, vec!["c"]);
        assert!(second.cursor.is_none());
    }
}
