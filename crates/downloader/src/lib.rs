//! Stream file download and consensus for the mirror node.
//!
//! Consensus nodes each publish every stream file together with a signature
//! file. This crate fetches those signatures from all nodes, verifies them,
//! decides by stake which file hash the network agreed on, and downloads a
//! matching copy of the data file.
//!
//! # Components
//!
//! - [`AddressBook`] / [`NodeDirectory`]: the nodes, their keys and stake
//! - [`StreamFileProvider`]: storage access ([`LocalStreamFileProvider`],
//!   [`HttpStreamFileProvider`])
//! - [`SignatureVerifier`]: per-node signature checks
//! - [`ConsensusValidator`]: stake-weighted agreement
//! - [`Downloader`]: the per-stream-type tick state machine feeding a
//!   [`StreamFileSink`]

pub mod address_book;
pub mod consensus;
mod downloader;
mod error;
pub mod provider;
mod verifier;

pub use address_book::{AddressBook, ConsensusNode, NodeDirectory};
pub use consensus::{
    ConsensusMode, ConsensusPolicy, ConsensusResult, ConsensusValidator, TallyState, Threshold,
};
pub use downloader::{
    Downloader, DownloaderConfig, PersistedFile, StreamFileSink, StreamGap, TickOutcome,
};
pub use error::{ConsensusError, DownloaderError, ProviderError, Result};
pub use provider::{
    HttpProviderConfig, HttpStreamFileProvider, LocalStreamFileProvider, StreamFileProvider,
};
pub use verifier::SignatureVerifier;
