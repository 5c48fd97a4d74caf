//! Balance reconciliation.
//!
//! Each balance snapshot must equal the previous snapshot plus every hbar
//! transfer between the two. The reconciler walks consecutive snapshot pairs
//! after the last reconciled one, stops at the first pair the record stream
//! does not yet cover, and records every run as a `reconciliation_job` row.
//! A mismatch fails the run and leaves the pair to be checked again.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use mirror_common::time::current_timestamp_nanos;
use mirror_common::EntityId;
use mirror_db::schema::state_keys;
use mirror_db::{
    BalanceFileRow, BalanceQueries, Database, DbError, ReconciliationJob, ReconciliationQueries,
    ReconciliationStatus, StateQueries, StreamFileQueries, TransactionQueries,
};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::config::ReconciliationConfig;

/// Mismatching accounts named in a failed job's error.
const MAX_REPORTED_MISMATCHES: usize = 10;

/// One account whose snapshot balance disagrees with the transfers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceMismatch {
    pub account_id: EntityId,
    pub expected: i64,
    pub actual: i64,
}

/// Compares `previous + transfers` with `actual`. Zero balances and absent
/// accounts are equivalent.
pub fn diff_balances(
    previous: &BTreeMap<EntityId, i64>,
    transfers: &BTreeMap<EntityId, i64>,
    actual: &BTreeMap<EntityId, i64>,
) -> Vec<BalanceMismatch> {
    let accounts: BTreeSet<EntityId> = previous
        .keys()
        .chain(transfers.keys())
        .chain(actual.keys())
        .copied()
        .collect();

    accounts
        .into_iter()
        .filter_map(|account_id| {
            let expected = previous
                .get(&account_id)
                .copied()
                .unwrap_or(0)
                .saturating_add(transfers.get(&account_id).copied().unwrap_or(0));
            let actual = actual.get(&account_id).copied().unwrap_or(0);
            (expected != actual).then_some(BalanceMismatch {
                account_id,
                expected,
                actual,
            })
        })
        .collect()
}

/// Checks persisted balance snapshots against persisted transfers.
pub struct BalanceReconciler {
    db: Database,
    max_files_per_run: usize,
}

impl BalanceReconciler {
    pub fn new(db: Database, config: &ReconciliationConfig) -> Self {
        Self {
            db,
            max_files_per_run: config.max_files_per_run.max(1),
        }
    }

    /// Runs one reconciliation and stores its job row.
    ///
    /// Check failures are reported through the job's status; only a failure
    /// to store the job is returned as an error.
    pub fn reconcile(&self) -> Result<ReconciliationJob, DbError> {
        let mut job = self
            .db
            .with_connection(|conn| conn.start_reconciliation_job(current_timestamp_nanos()))?;

        if let Err(e) = self.check(&mut job) {
            error!(job = job.id, error = %e, "Reconciliation aborted");
            job.status = ReconciliationStatus::FailureUnknown;
            job.error = Some(e.to_string());
        }
        job.finished_at = Some(current_timestamp_nanos());
        self.db
            .with_connection(|conn| conn.finish_reconciliation_job(&job))?;

        match job.status {
            ReconciliationStatus::Success => info!(
                job = job.id,
                pairs = job.count,
                until = ?job.timestamp_end,
                "Reconciliation succeeded"
            ),
            status => warn!(
                job = job.id,
                %status,
                error = job.error.as_deref().unwrap_or_default(),
                "Reconciliation failed"
            ),
        }
        Ok(job)
    }

    /// Consensus timestamp of the newest snapshot known to reconcile.
    pub fn last_reconciled(&self) -> Result<Option<i64>, DbError> {
        let value = self
            .db
            .with_connection(|conn| conn.get_state(state_keys::LAST_RECONCILED_BALANCE))?;
        value
            .map(|v| {
                v.parse::<i64>().map_err(|_| {
                    DbError::Integrity(format!("invalid last reconciled balance {:?}", v))
                })
            })
            .transpose()
    }

    fn check(&self, job: &mut ReconciliationJob) -> Result<(), DbError> {
        let after = match self.last_reconciled()? {
            // The last reconciled snapshot is the base of the next pair.
            Some(ts) => ts.saturating_sub(1),
            None => i64::MIN,
        };
        let files = self.db.with_connection(|conn| {
            conn.account_balance_files_after(after, self.max_files_per_run + 1)
        })?;
        let covered_until = self
            .db
            .last_record_file()?
            .map(|file| file.consensus_end)
            .unwrap_or(i64::MIN);

        job.status = ReconciliationStatus::Success;
        for pair in files.windows(2) {
            let (previous, next) = (&pair[0], &pair[1]);
            if next.consensus_timestamp > covered_until {
                debug!(
                    balance_file = %next.name,
                    covered_until,
                    "Record stream does not cover balance file yet"
                );
                break;
            }

            job.timestamp_start.get_or_insert(previous.consensus_timestamp);
            let mismatches = self.check_pair(previous, next)?;
            if !mismatches.is_empty() {
                warn!(
                    previous = %previous.name,
                    next = %next.name,
                    mismatches = mismatches.len(),
                    "Balance file does not match transfers"
                );
                job.status = ReconciliationStatus::FailureCryptoTransfers;
                job.timestamp_end = Some(next.consensus_timestamp);
                job.error = Some(describe(next, &mismatches));
                return Ok(());
            }

            self.db.with_connection(|conn| {
                conn.set_state(
                    state_keys::LAST_RECONCILED_BALANCE,
                    &next.consensus_timestamp.to_string(),
                )
            })?;
            job.timestamp_end = Some(next.consensus_timestamp);
            job.count += 1;
        }
        Ok(())
    }

    fn check_pair(
        &self,
        previous: &BalanceFileRow,
        next: &BalanceFileRow,
    ) -> Result<Vec<BalanceMismatch>, DbError> {
        self.db.with_connection(|conn| {
            let before = conn.load_account_balances(previous.consensus_timestamp)?;
            let transfers =
                conn.sum_crypto_transfers(previous.consensus_timestamp, next.consensus_timestamp)?;
            let after = conn.load_account_balances(next.consensus_timestamp)?;
            Ok(diff_balances(&before, &transfers, &after))
        })
    }

    /// Reconciles on a fixed period until shutdown.
    pub async fn start(self, period: Duration, mut shutdown_rx: watch::Receiver<bool>) {
        info!(period_secs = period.as_secs(), "Starting balance reconciliation");
        let reconciler = std::sync::Arc::new(self);
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let reconciler = std::sync::Arc::clone(&reconciler);
                    match tokio::task::spawn_blocking(move || reconciler.reconcile()).await {
                        Ok(Ok(_)) => {}
                        Ok(Err(e)) => error!(error = %e, "Failed to record reconciliation job"),
                        Err(e) => error!(error = %e, "Reconciliation task failed"),
                    }
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("Balance reconciliation shutting down");
                        break;
                    }
                }
            }
        }
    }
}

fn describe(file: &BalanceFileRow, mismatches: &[BalanceMismatch]) -> String {
    let shown: Vec<String> = mismatches
        .iter()
        .take(MAX_REPORTED_MISMATCHES)
        .map(|m| format!("{} expected {} actual {}", m.account_id, m.expected, m.actual))
        .collect();
    let mut message = format!("{}: {}", file.name, shown.join(", "));
    if mismatches.len() > MAX_REPORTED_MISMATCHES {
        message.push_str(&format!(" and {} more", mismatches.len() - MAX_REPORTED_MISMATCHES));
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(num: i64) -> EntityId {
        EntityId::new(0, 0, num).unwrap()
    }

    #[test]
    fn test_diff_balances() {
        let previous = BTreeMap::from([(id(2), 1_000), (id(98), 0)]);
        let transfers = BTreeMap::from([(id(2), -100), (id(3), 100)]);
        let actual = BTreeMap::from([(id(2), 900), (id(3), 100)]);
        assert!(diff_balances(&previous, &transfers, &actual).is_empty());

        let actual = BTreeMap::from([(id(2), 900), (id(3), 90)]);
        let mismatches = diff_balances(&previous, &transfers, &actual);
        assert_eq!(
            mismatches,
            vec![BalanceMismatch {
                account_id: id(3),
                expected: 100,
                actual: 90,
            }]
        );
    }

    #[test]
    fn test_diff_balances_saturates() {
        let previous = BTreeMap::from([(id(2), i64::MAX)]);
        let transfers = BTreeMap::from([(id(2), 1)]);
        let actual = BTreeMap::from([(id(2), 0)]);
        let mismatches = diff_balances(&previous, &transfers, &actual);
        assert_eq!(mismatches.len(), 1);
        assert_eq!(mismatches[0].expected, i64::MAX);
    }

    #[test]
    fn test_nothing_to_reconcile() {
        let db = Database::open_in_memory().unwrap();
        let reconciler = BalanceReconciler::new(db.clone(), &ReconciliationConfig::default());
        let job = reconciler.reconcile().unwrap();
        assert_eq!(job.status, ReconciliationStatus::Success);
        assert_eq!(job.count, 0);
        assert!(job.finished_at.is_some());
        assert!(reconciler.last_reconciled().unwrap().is_none());

        let stored = db
            .with_connection(|conn| conn.latest_reconciliation_job())
            .unwrap()
            .unwrap();
        assert_eq!(stored, job);
    }

    #[test]
    fn test_describe_truncates() {
        let file = BalanceFileRow {
            name: "b.csv".into(),
            consensus_timestamp: 1,
            count: 0,
            file_hash: mirror_common::Hash384::ZERO,
            node_id: None,
            size: 0,
        };
        let mismatches: Vec<_> = (0..12)
            .map(|n| BalanceMismatch {
                account_id: id(n),
                expected: 1,
                actual: 0,
            })
            .collect();
        let message = describe(&file, &mismatches);
        assert!(message.starts_with("b.csv: 0.0.0 expected 1 actual 0"));
        assert!(message.ends_with("and 2 more"));
    }
}
