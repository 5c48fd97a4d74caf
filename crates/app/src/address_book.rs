//! Periodic address book reload.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use mirror_downloader::NodeDirectory;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Reloads the roster file into the [`NodeDirectory`] on a fixed period.
///
/// Ticks in flight keep the snapshot they started with; the next tick sees
/// the new roster.
pub struct AddressBookRefresher {
    directory: Arc<NodeDirectory>,
    path: PathBuf,
    period: Duration,
}

impl AddressBookRefresher {
    pub fn new(directory: Arc<NodeDirectory>, path: impl Into<PathBuf>, period: Duration) -> Self {
        Self {
            directory,
            path: path.into(),
            period,
        }
    }

    /// Reloads once. A roster that fails to load leaves the current one in
    /// place.
    pub fn refresh(&self) -> bool {
        match self.directory.refresh_from_file(&self.path) {
            Ok(changed) => {
                if !changed {
                    debug!(path = %self.path.display(), "Address book unchanged");
                }
                changed
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to reload address book");
                false
            }
        }
    }

    pub async fn start(self, mut shutdown_rx: watch::Receiver<bool>) {
        if self.period.is_zero() {
            info!("Address book refresh disabled");
            return;
        }
        info!(
            path = %self.path.display(),
            period_secs = self.period.as_secs(),
            "Starting address book refresher"
        );

        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The book was loaded at start-up.
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.refresh();
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("Address book refresher shutting down");
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mirror_common::EntityId;
    use mirror_crypto::NodeSigningKey;
    use mirror_downloader::{AddressBook, ConsensusNode};

    fn book(stakes: &[i64]) -> AddressBook {
        let nodes = stakes
            .iter()
            .enumerate()
            .map(|(i, stake)| ConsensusNode {
                node_id: i as i64,
                node_account_id: EntityId::new(0, 0, i as i64 + 3).unwrap(),
                public_key: NodeSigningKey::from_seed(&[i as u8 + 1; 32]).public_key(),
                stake: *stake,
                total_stake: 0,
            })
            .collect();
        AddressBook::new(nodes).unwrap()
    }

    #[test]
    fn test_refresh_swaps_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("address-book.json");
        std::fs::write(&path, book(&[1, 1]).to_json().unwrap()).unwrap();

        let directory = Arc::new(NodeDirectory::new(AddressBook::load(&path).unwrap()));
        let refresher = AddressBookRefresher::new(Arc::clone(&directory), &path, Duration::from_secs(60));
        let before = directory.snapshot();
        assert!(!refresher.refresh());

        std::fs::write(&path, book(&[5, 5, 5]).to_json().unwrap()).unwrap();
        assert!(refresher.refresh());
        assert_eq!(directory.snapshot().len(), 3);
        assert_eq!(directory.snapshot().total_stake(), 15);
        assert_eq!(before.len(), 2);

        std::fs::write(&path, "not json").unwrap();
        assert!(!refresher.refresh());
        assert_eq!(directory.snapshot().len(), 3);
    }

    #[tokio::test]
    async fn test_stops_on_shutdown() {
        let directory = Arc::new(NodeDirectory::new(AddressBook::default()));
        let refresher =
            AddressBookRefresher::new(directory, "/nonexistent/book.json", Duration::from_millis(5));
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(refresher.start(rx));
        tokio::time::sleep(Duration::from_millis(20)).await;
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
