//! Common types and utilities for the mirror node ingestion core.
//!
//! This crate provides the small set of types that every other crate in the
//! workspace speaks:
//!
//! - [`Hash384`]: the SHA-384 digest used for file hashes, running hashes and
//!   signed payloads
//! - [`EntityId`]: a `shard.realm.num` ledger entity identifier
//! - [`time`]: nanosecond consensus timestamps and their ISO-8601 rendering
//! - [`CommonProperties`]: the immutable network configuration (shard, realm,
//!   network name) that is built once at start-up and passed by reference
//!
//! Nothing in this crate performs I/O.

pub mod error;
pub mod network;
pub mod time;
pub mod types;

pub use error::{Error, Result};
pub use network::{CommonProperties, NetworkKind};
pub use types::{EntityId, Hash384, HASH384_LEN};
