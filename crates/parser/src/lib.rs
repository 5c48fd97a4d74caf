//! Parsing of verified stream files into mirror node rows.
//!
//! [`RecordFileParser`] walks the items of a record file in order, writes a
//! transaction row and its transfers for every item, and dispatches
//! successful items to the handler registered for their
//! [`TransactionType`](mirror_streams::TransactionType). The result is a
//! [`ParserContext`] holding every pending row of the file, ready for the
//! persister. [`BalanceFileParser`] does the same for balance snapshots.
//!
//! Handlers are plain functions and perform no I/O.

mod balance_parser;
mod context;
pub mod domain;
mod error;
mod handlers;
mod record_parser;
mod registry;

pub use balance_parser::BalanceFileParser;
pub use context::ParserContext;
pub use domain::{
    AccountBalanceRow, CryptoTransfer, Entity, EntityType, SidecarRow, Token, TokenBalanceRow,
    TokenTransfer, TopicMessage, Transaction,
};
pub use error::{ParserError, Result};
pub use handlers::primary_entity;
pub use record_parser::{ParserProperties, RecordFileParser};
pub use registry::{Handler, HandlerRegistry};
