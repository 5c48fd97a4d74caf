//! Typed query traits, one per data domain.
//!
//! Each trait is implemented on [`rusqlite::Connection`], so the same
//! methods work on a pooled connection and inside a transaction:
//!
//! ```ignore
//! use mirror_db::queries::StreamFileQueries;
//!
//! let last = db.with_connection(|conn| conn.last_record_file())?;
//! ```

pub mod balance;
pub mod entity;
pub mod gap;
pub mod partition;
pub mod reconciliation;
pub mod sidecar;
pub mod state;
pub mod stream_file;
pub mod token;
pub mod topic;
pub mod transaction;

pub use balance::BalanceQueries;
pub use entity::{EntityQueries, EntityRow};
pub use gap::{StreamGapQueries, StreamGapRow};
pub use partition::{TimePartition, TimePartitionQueries};
pub use reconciliation::{ReconciliationJob, ReconciliationQueries, ReconciliationStatus};
pub use sidecar::SidecarQueries;
pub use state::StateQueries;
pub use stream_file::{BalanceFileRow, RecordFileRow, StreamFileQueries};
pub use token::TokenQueries;
pub use topic::TopicMessageQueries;
pub use transaction::TransactionQueries;
