//! Consensus service: topics and their messages.

use mirror_streams::proto::transaction_body::Data;
use mirror_streams::RecordItem;

use super::{account, missing, nanos, non_empty, receipt, seconds};
use crate::context::ParserContext;
use crate::domain::{Entity, EntityType, TopicMessage};
use crate::error::Result;

pub(super) fn create_topic(item: &RecordItem, ctx: &mut ParserContext) -> Result<()> {
    let Some(Data::ConsensusCreateTopic(body)) = &item.body.data else {
        return Ok(());
    };
    let id = receipt(item)?
        .topic_id
        .as_ref()
        .ok_or_else(|| missing(item, "receipt.topic_id"))?
        .to_entity_id()?;

    let mut topic = Entity::new(id, EntityType::Topic);
    topic.created_timestamp = Some(item.consensus_timestamp);
    topic.modified_timestamp = Some(item.consensus_timestamp);
    topic.memo = Some(body.memo.clone());
    topic.key = non_empty(&body.admin_key);
    topic.submit_key = non_empty(&body.submit_key);
    topic.auto_renew_period = seconds(&body.auto_renew_period);
    topic.auto_renew_account_id = account(&body.auto_renew_account)?;
    topic.deleted = Some(false);
    ctx.merge_entity(topic);
    Ok(())
}

pub(super) fn update_topic(item: &RecordItem, ctx: &mut ParserContext) -> Result<()> {
    let Some(Data::ConsensusUpdateTopic(body)) = &item.body.data else {
        return Ok(());
    };
    let id = body
        .topic_id
        .as_ref()
        .ok_or_else(|| missing(item, "topic_id"))?
        .to_entity_id()?;

    let mut topic = Entity::new(id, EntityType::Topic);
    topic.modified_timestamp = Some(item.consensus_timestamp);
    topic.memo = body.memo.clone();
    topic.expiration_timestamp = nanos(&body.expiration_time)?;
    // An explicitly empty key clears it.
    topic.key = body.admin_key.clone();
    topic.submit_key = body.submit_key.clone();
    topic.auto_renew_period = seconds(&body.auto_renew_period);
    ctx.merge_entity(topic);
    Ok(())
}

pub(super) fn delete_topic(item: &RecordItem, ctx: &mut ParserContext) -> Result<()> {
    let Some(Data::ConsensusDeleteTopic(body)) = &item.body.data else {
        return Ok(());
    };
    let id = body
        .topic_id
        .as_ref()
        .ok_or_else(|| missing(item, "topic_id"))?
        .to_entity_id()?;

    let mut topic = Entity::new(id, EntityType::Topic);
    topic.modified_timestamp = Some(item.consensus_timestamp);
    topic.deleted = Some(true);
    ctx.merge_entity(topic);
    Ok(())
}

pub(super) fn submit_message(item: &RecordItem, ctx: &mut ParserContext) -> Result<()> {
    let Some(Data::ConsensusSubmitMessage(body)) = &item.body.data else {
        return Ok(());
    };
    let topic_id = body
        .topic_id
        .as_ref()
        .ok_or_else(|| missing(item, "topic_id"))?
        .to_entity_id()?;
    let receipt = receipt(item)?;

    let (chunk_num, chunk_total, initial_valid_start) = match &body.chunk_info {
        Some(chunk) => {
            let valid_start = chunk
                .initial_transaction_id
                .as_ref()
                .map(|id| nanos(&id.transaction_valid_start))
                .transpose()?
                .flatten();
            (Some(chunk.number), Some(chunk.total), valid_start)
        }
        None => (None, None, None),
    };

    let payer = match &item.body.transaction_id {
        Some(id) => account(&id.account_id)?,
        None => None,
    };

    ctx.add_topic_message(TopicMessage {
        consensus_timestamp: item.consensus_timestamp,
        topic_id,
        message: body.message.clone(),
        running_hash: receipt.topic_running_hash.clone(),
        running_hash_version: receipt.topic_running_hash_version as i64,
        sequence_number: receipt.topic_sequence_number as i64,
        payer_account_id: payer,
        chunk_num,
        chunk_total,
        initial_valid_start,
    });
    Ok(())
}
