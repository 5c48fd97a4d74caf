//! Built-in transaction handlers.
//!
//! One submodule per service. Every handler receives a successful item and
//! adds the entity, topic or token mutations its transaction implies.

mod consensus;
mod crypto;
mod token;

use mirror_common::EntityId;
use mirror_streams::proto::{
    transaction_body::Data, AccountId, Duration, Timestamp, TransactionReceipt,
};
use mirror_streams::{RecordItem, TransactionType};

use crate::error::{ParserError, Result};
use crate::registry::Handler;

pub(crate) const BUILT_IN: &[(TransactionType, Handler)] = &[
    (TransactionType::CryptoCreateAccount, crypto::create_account),
    (TransactionType::CryptoUpdateAccount, crypto::update_account),
    (TransactionType::CryptoDelete, crypto::delete_account),
    (TransactionType::CryptoTransfer, crypto::transfer),
    (TransactionType::ConsensusCreateTopic, consensus::create_topic),
    (TransactionType::ConsensusUpdateTopic, consensus::update_topic),
    (TransactionType::ConsensusDeleteTopic, consensus::delete_topic),
    (TransactionType::ConsensusSubmitMessage, consensus::submit_message),
    (TransactionType::TokenCreation, token::create),
    (TransactionType::TokenMint, token::mint),
    (TransactionType::TokenBurn, token::burn),
];

/// The entity a transaction acts on: the created id from the receipt for
/// create transactions, the target from the body otherwise.
pub fn primary_entity(item: &RecordItem) -> Result<Option<EntityId>> {
    let receipt = item.record.receipt.as_ref();
    let id = match &item.body.data {
        Some(Data::CryptoCreateAccount(_)) => account(&receipt.and_then(|r| r.account_id.clone()))?,
        Some(Data::CryptoUpdateAccount(b)) => account(&b.account_id_to_update)?,
        Some(Data::CryptoDelete(b)) => account(&b.delete_account_id)?,
        Some(Data::ConsensusCreateTopic(_)) => match receipt.and_then(|r| r.topic_id.as_ref()) {
            Some(topic) => Some(topic.to_entity_id()?),
            None => None,
        },
        Some(Data::ConsensusUpdateTopic(b)) => topic(b.topic_id.as_ref())?,
        Some(Data::ConsensusDeleteTopic(b)) => topic(b.topic_id.as_ref())?,
        Some(Data::ConsensusSubmitMessage(b)) => topic(b.topic_id.as_ref())?,
        Some(Data::TokenCreation(_)) => match receipt.and_then(|r| r.token_id.as_ref()) {
            Some(token) => Some(token.to_entity_id()?),
            None => None,
        },
        Some(Data::TokenMint(b)) => token_id(b.token.as_ref())?,
        Some(Data::TokenBurn(b)) => token_id(b.token.as_ref())?,
        Some(Data::CryptoTransfer(_)) | Some(Data::Freeze(_)) | None => None,
    };
    Ok(id.filter(|id| !id.is_empty()))
}

pub(crate) fn account(id: &Option<AccountId>) -> Result<Option<EntityId>> {
    Ok(match id {
        Some(id) => Some(id.to_entity_id()?),
        None => None,
    })
}

fn topic(id: Option<&mirror_streams::proto::TopicId>) -> Result<Option<EntityId>> {
    Ok(match id {
        Some(id) => Some(id.to_entity_id()?),
        None => None,
    })
}

fn token_id(id: Option<&mirror_streams::proto::TokenId>) -> Result<Option<EntityId>> {
    Ok(match id {
        Some(id) => Some(id.to_entity_id()?),
        None => None,
    })
}

pub(crate) fn receipt(item: &RecordItem) -> Result<&TransactionReceipt> {
    item.record
        .receipt
        .as_ref()
        .ok_or_else(|| missing(item, "receipt"))
}

pub(crate) fn missing(item: &RecordItem, field: &'static str) -> ParserError {
    ParserError::MissingField {
        consensus_timestamp: item.consensus_timestamp,
        field,
    }
}

pub(crate) fn seconds(duration: &Option<Duration>) -> Option<i64> {
    duration.as_ref().map(|d| d.seconds)
}

pub(crate) fn nanos(timestamp: &Option<Timestamp>) -> Result<Option<i64>> {
    Ok(match timestamp {
        Some(ts) => Some(ts.to_nanos()?),
        None => None,
    })
}

/// Empty bytes mean "not set" on the wire.
pub(crate) fn non_empty(bytes: &[u8]) -> Option<Vec<u8>> {
    (!bytes.is_empty()).then(|| bytes.to_vec())
}
