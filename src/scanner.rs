use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use tracing::info;

use crate::domain::extract_domain;
use crate::error::{ServiceError, ValidationError};
use crate::stats::DomainScan;
use crate::store::{scan, BucketStore, KeyType, StoreError};

/// Inclusive `[from, to]` range of Unix timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeInterval {
    pub from: u64,
    pub to: u64,
}

impl TimeInterval {
    const EMPTY: Self = Self {
        from: u64::MAX,
        to: 0,
    };

    /// Accepts only non-empty strings of ASCII digits for both bounds.
    ///
    /// `from > to` is allowed and simply matches nothing.
    pub fn parse(from: Option<&str>, to: Option<&str>) -> Result<Self, ValidationError> {
        let (Some(from), Some(to)) = (
            from.filter(|raw| is_decimal(raw)),
            to.filter(|raw| is_decimal(raw)),
        ) else {
            return Err(ValidationError::InvalidTimeInterval);
        };

        // A `to` beyond u64 covers every bucket; a `from` beyond u64 covers none.
        let to = to.parse().unwrap_or(u64::MAX);
        match from.parse() {
            Ok(from) => Ok(Self { from, to }),
            Err(_) => Ok(Self::EMPTY),
        }
    }

    pub fn contains(&self, timestamp: u64) -> bool {
        self.from <= timestamp && timestamp <= self.to
    }
}

fn is_decimal(raw: &str) -> bool {
    !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit())
}

/// Bucket keys are decimal timestamps; anything else is another key shape.
fn bucket_timestamp(key: &str) -> Option<u64> {
    if is_decimal(key) {
        key.parse().ok()
    } else {
        None
    }
}

/// Answers "which domains were visited between two instants".
///
/// Every key in the store is inspected on each query; there is no time index.
pub struct DomainScanner {
    store: Arc<dyn BucketStore>,
}

impl DomainScanner {
    pub fn new(store: Arc<dyn BucketStore>) -> Self {
        Self { store }
    }

    /// Validates raw query bounds before touching the store, then scans.
    pub fn scan_domains(
        &self,
        from: Option<&str>,
        to: Option<&str>,
    ) -> Result<DomainScan, ServiceError> {
        let interval = TimeInterval::parse(from, to)?;
        Ok(self.scan(interval)?)
    }

    pub fn scan(&self, interval: TimeInterval) -> Result<DomainScan, StoreError> {
        let start_time = Instant::now();
        info!(
            action = "start",
            component = "domain_scan",
            from = interval.from,
            to = interval.to,
            "Scanning buckets for domains"
        );

        let mut result = DomainScan::default();
        let mut links: HashSet<String> = HashSet::new();

        for key in scan(self.store.as_ref()) {
            let key = key?;
            result.keys_seen += 1;

            let Some(timestamp) = bucket_timestamp(&key) else {
                continue;
            };
            if !interval.contains(timestamp) {
                continue;
            }
            // The key may have been replaced since it was listed.
            if self.store.type_of(&key)? != KeyType::Set {
                continue;
            }
            let members = match self.store.members_of(&key) {
                Ok(members) => members,
                Err(StoreError::WrongType { .. }) => continue,
                Err(err) => return Err(err),
            };
            result.buckets_matched += 1;
            links.extend(members);
        }

        result.links_collected = links.len();
        result.domains = links
            .par_iter()
            .map(|link| extract_domain(link).to_string())
            .collect();

        info!(
            action = "complete",
            component = "domain_scan",
            keys_seen = result.keys_seen,
            buckets_matched = result.buckets_matched,
            link_count = result.links_collected,
            unique_domains = result.domains.len(),
            duration_ms = start_time.elapsed().as_millis(),
            "Domain scan completed"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::store::{OfflineStore, ScanPage};

    fn links(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn domains(items: &[&str]) -> HashSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn seeded_store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store
            .add_to_bucket(1620000000, &links(&["https://ya.ru"]))
            .unwrap();
        store
            .add_to_bucket(1620000150, &links(&["https://www.instagram.com"]))
            .unwrap();
        store
            .add_to_bucket(1620000300, &links(&["https://redis.io", "redis.io/docs"]))
            .unwrap();
        store
            .add_to_bucket(1620000500, &links(&["https://vk.com"]))
            .unwrap();
        store
    }

    #[test]
    fn collects_domains_inside_the_interval() {
        let store = seeded_store();
        let scanner = DomainScanner::new(store);
        let result = scanner
            .scan(TimeInterval { from: 1620000050, to: 1620000400 })
            .unwrap();

        assert_eq!(result.domains, domains(&["instagram.com", "redis.io"]));
        assert_eq!(result.buckets_matched, 2);
        assert_eq!(result.links_collected, 3);
        assert_eq!(result.keys_seen, 4);
    }

    #[test]
    fn bounds_are_inclusive() {
        let scanner = DomainScanner::new(seeded_store());
        let result = scanner
            .scan(TimeInterval { from: 1620000150, to: 1620000300 })
            .unwrap();
        assert_eq!(result.domains, domains(&["instagram.com", "redis.io"]));

        let result = scanner
            .scan(TimeInterval { from: 1620000500, to: 1620000500 })
            .unwrap();
        assert_eq!(result.domains, domains(&["vk.com"]));
    }

    #[test]
    fn inverted_interval_is_empty_not_an_error() {
        let scanner = DomainScanner::new(seeded_store());
        let result = scanner.scan_domains(Some("1620000400"), Some("1620000050")).unwrap();
        assert!(result.domains.is_empty());
    }

    #[test]
    fn foreign_keys_never_contribute() {
        let store = seeded_store();
        store.set_string("1620000200", "https://string.example").unwrap();
        store.set_string("session:1620000200", "x").unwrap();
        store.set_string("-1620000200", "x").unwrap();
        let scanner = DomainScanner::new(store);

        let result = scanner
            .scan(TimeInterval { from: 0, to: u64::MAX })
            .unwrap();
        assert_eq!(
            result.domains,
            domains(&["ya.ru", "instagram.com", "redis.io", "vk.com"])
        );
        assert_eq!(result.keys_seen, 7);
        assert_eq!(result.buckets_matched, 4);
    }

    #[test]
    fn rejects_bad_bounds_before_scanning() {
        let scanner = DomainScanner::new(Arc::new(OfflineStore));
        for (from, to) in [
            (None, Some("10")),
            (Some("10"), None),
            (Some(""), Some("10")),
            (Some("1.5"), Some("10")),
            (Some("-1"), Some("10")),
            (Some("10"), Some("ten")),
            (Some(" 10"), Some("20")),
        ] {
            assert!(matches!(
                scanner.scan_domains(from, to),
                Err(ServiceError::Validation(ValidationError::InvalidTimeInterval))
            ));
        }
    }

    #[test]
    fn oversized_to_covers_everything() {
        let interval =
            TimeInterval::parse(Some("0"), Some("99999999999999999999999")).unwrap();
        assert_eq!(interval, TimeInterval { from: 0, to: u64::MAX });
        assert!(interval.contains(u64::MAX));
    }

    #[test]
    fn oversized_from_matches_nothing() {
        let store = Arc::new(MemoryStore::new());
        store
            .add_to_bucket(u64::MAX, &links(&["https://edge.example"]))
            .unwrap();
        let scanner = DomainScanner::new(store);

        let result = scanner
            .scan_domains(Some("99999999999999999999999"), Some("99999999999999999999999"))
            .unwrap();
        assert!(result.domains.is_empty());
        assert_eq!(result.keys_seen, 1);
    }

    #[test]
    fn store_failure_reaches_the_caller() {
        let scanner = DomainScanner::new(Arc::new(OfflineStore));
        assert!(matches!(
            scanner.scan(TimeInterval { from: 0, to: 10 }),
            Err(StoreError::Unavailable(_))
        ));
        assert!(matches!(
            scanner.scan_domains(Some("0"), Some("10")),
            Err(ServiceError::Storage(StoreError::Unavailable(_)))
        ));
    }

    /// Lists one bucket key but fails every read of it.
    struct FailingReads;

    impl BucketStore for FailingReads {
        fn add_to_bucket(&self, _timestamp: u64, _urls: &[String]) -> Result<(), StoreError> {
            Ok(())
        }

        fn scan_page(&self, _cursor: Option<&str>, _count: usize) -> Result<ScanPage, StoreError> {
            Ok(ScanPage {
                keys: vec!["5".to_string()],
                cursor: None,
            })
        }

        fn type_of(&self, _key: &str) -> Result<KeyType, StoreError> {
            Err(StoreError::Unavailable("read timed out".to_string()))
        }

        fn members_of(&self, _key: &str) -> Result<HashSet<String>, StoreError> {
            Err(StoreError::Unavailable("read timed out".to_string()))
        }
    }

    #[test]
    fn failed_bucket_read_is_not_skipped() {
        let scanner = DomainScanner::new(Arc::new(FailingReads));
        assert!(matches!(
            scanner.scan(TimeInterval { from: 0, to: 10 }),
            Err(StoreError::Unavailable(_))
        ));
    }
}
