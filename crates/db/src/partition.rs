//! Time partitions of the large item tables.
//!
//! Every partitioned table is split into fixed-width windows aligned to the
//! epoch. A `time_partition` row names each window; rows for the windows a
//! file touches are created inside the file's own transaction, before its
//! items are inserted. Readers look partitions up through a cache that is
//! refreshed when older than the configured staleness, and dropped after a
//! commit that created new partitions.

use std::sync::Arc;
use std::time::{Duration, Instant};

use mirror_common::time::{align_down, to_datetime, NANOS_PER_SECOND};
use parking_lot::RwLock;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::persister::{CommittedFile, PostCommitHook};
use crate::queries::{TimePartition, TimePartitionQueries};
use crate::{Database, Result};

/// Tables split into time partitions.
pub const PARTITIONED_TABLES: &[&str] = &[
    "transaction",
    "crypto_transfer",
    "token_transfer",
    "topic_message",
    "account_balance",
];

const DAY_SECONDS: u64 = 86_400;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartitionConfig {
    /// Width of one partition.
    pub interval_secs: u64,
    /// How long a loaded partition list may be served from the cache.
    pub cache_ttl_secs: u64,
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            interval_secs: DAY_SECONDS,
            cache_ttl_secs: 60,
        }
    }
}

impl PartitionConfig {
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.interval_secs == 0 {
            return Err("partition interval must be positive".into());
        }
        if self.interval_secs > i64::MAX as u64 / NANOS_PER_SECOND as u64 {
            return Err("partition interval is too large".into());
        }
        Ok(())
    }
}

struct CachedPartitions {
    loaded_at: Instant,
    partitions: Arc<Vec<TimePartition>>,
}

/// Creates and caches time partitions.
pub struct TimePartitionService {
    interval_ns: i64,
    daily: bool,
    ttl: Duration,
    cache: RwLock<Option<CachedPartitions>>,
}

impl TimePartitionService {
    pub fn new(config: &PartitionConfig) -> Self {
        let interval_secs = config.interval_secs.max(1);
        Self {
            interval_ns: (interval_secs as i64).saturating_mul(NANOS_PER_SECOND),
            daily: interval_secs % DAY_SECONDS == 0,
            ttl: Duration::from_secs(config.cache_ttl_secs),
            cache: RwLock::new(None),
        }
    }

    pub fn interval_ns(&self) -> i64 {
        self.interval_ns
    }

    /// The window holding `timestamp`, as `[from, to)`.
    pub fn window(&self, timestamp: i64) -> (i64, i64) {
        let from = align_down(timestamp, self.interval_ns);
        (from, from.saturating_add(self.interval_ns))
    }

    /// Partition name of `parent` for the window starting at `from`, e.g.
    /// `transaction_p2022_04_15`.
    pub fn partition_name(&self, parent: &str, from: i64) -> Result<String> {
        let start = to_datetime(from)?;
        let suffix = if self.daily {
            start.format("%Y_%m_%d")
        } else {
            start.format("%Y_%m_%d_%H%M%S")
        };
        Ok(format!("{}_p{}", parent, suffix))
    }

    /// Creates the partitions of every partitioned table covering
    /// `[from_timestamp, to_timestamp]`. Returns how many were new.
    pub fn ensure_partitions(
        &self,
        conn: &Connection,
        from_timestamp: i64,
        to_timestamp: i64,
    ) -> Result<usize> {
        let mut created = 0;
        let (mut from, _) = self.window(from_timestamp);
        while from <= to_timestamp {
            let to = from.saturating_add(self.interval_ns);
            for parent in PARTITIONED_TABLES {
                let partition = TimePartition {
                    name: self.partition_name(parent, from)?,
                    parent: (*parent).to_string(),
                    from_timestamp: from,
                    to_timestamp: to,
                };
                if conn.insert_time_partition(&partition)? {
                    debug!(partition = %partition.name, "Created time partition");
                    created += 1;
                }
            }
            if to == i64::MAX {
                break;
            }
            from = to;
        }
        Ok(created)
    }

    /// All partitions, served from the cache while it is fresh.
    pub fn partitions(&self, db: &Database) -> Result<Arc<Vec<TimePartition>>> {
        if let Some(cached) = self.cache.read().as_ref() {
            if cached.loaded_at.elapsed() < self.ttl {
                return Ok(cached.partitions.clone());
            }
        }
        let partitions = Arc::new(db.with_connection(|conn| conn.load_time_partitions(None))?);
        *self.cache.write() = Some(CachedPartitions {
            loaded_at: Instant::now(),
            partitions: partitions.clone(),
        });
        Ok(partitions)
    }

    /// The partition of `parent` holding `timestamp`, if it exists.
    pub fn find(&self, db: &Database, parent: &str, timestamp: i64) -> Result<Option<TimePartition>> {
        Ok(self
            .partitions(db)?
            .iter()
            .find(|p| p.parent == parent && p.contains(timestamp))
            .cloned())
    }

    pub fn invalidate(&self) {
        *self.cache.write() = None;
    }
}

impl PostCommitHook for TimePartitionService {
    fn name(&self) -> &'static str {
        "time_partition_cache"
    }

    fn on_commit(&self, file: &CommittedFile) {
        if file.stats.partitions_created > 0 {
            self.invalidate();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const APRIL_15_2022: i64 = 1_649_980_800 * NANOS_PER_SECOND;

    fn service(interval_secs: u64) -> TimePartitionService {
        TimePartitionService::new(&PartitionConfig {
            interval_secs,
            cache_ttl_secs: 3600,
        })
    }

    #[test]
    fn test_window_and_name() {
        let service = service(DAY_SECONDS);
        let ts = APRIL_15_2022 + 5 * 3600 * NANOS_PER_SECOND;
        let (from, to) = service.window(ts);
        assert_eq!(from, APRIL_15_2022);
        assert_eq!(to - from, DAY_SECONDS as i64 * NANOS_PER_SECOND);
        assert_eq!(
            service.partition_name("transaction", from).unwrap(),
            "transaction_p2022_04_15"
        );

        let hourly = self::service(3600);
        let (from, _) = hourly.window(ts);
        assert_eq!(
            hourly.partition_name("crypto_transfer", from).unwrap(),
            "crypto_transfer_p2022_04_15_050000"
        );
    }

    #[test]
    fn test_ensure_partitions_spans_windows_once() {
        let db = Database::open_in_memory().unwrap();
        let service = service(DAY_SECONDS);
        let day = DAY_SECONDS as i64 * NANOS_PER_SECOND;

        let created = db
            .transaction(|tx| service.ensure_partitions(tx, APRIL_15_2022 + 10, APRIL_15_2022 + day + 10))
            .unwrap();
        assert_eq!(created, 2 * PARTITIONED_TABLES.len());

        let again = db
            .transaction(|tx| service.ensure_partitions(tx, APRIL_15_2022, APRIL_15_2022 + 1))
            .unwrap();
        assert_eq!(again, 0);

        let found = service
            .find(&db, "topic_message", APRIL_15_2022 + day + 1)
            .unwrap()
            .unwrap();
        assert_eq!(found.name, "topic_message_p2022_04_16");
    }

    #[test]
    fn test_cache_serves_stale_list_until_invalidated() {
        let db = Database::open_in_memory().unwrap();
        let service = service(DAY_SECONDS);
        assert!(service.partitions(&db).unwrap().is_empty());

        db.transaction(|tx| service.ensure_partitions(tx, APRIL_15_2022, APRIL_15_2022))
            .unwrap();
        assert!(service.partitions(&db).unwrap().is_empty());

        service.invalidate();
        assert_eq!(service.partitions(&db).unwrap().len(), PARTITIONED_TABLES.len());
    }
}
