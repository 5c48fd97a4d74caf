use mirror_streams::proto::transaction_body::Data;
use mirror_streams::RecordItem;

use super::{account, missing, nanos, non_empty, receipt, seconds};
use crate::context::ParserContext;
use crate::domain::{Entity, EntityType};
use crate::error::Result;

pub(super) fn create_account(item: &RecordItem, ctx: &mut ParserContext) -> Result<()> {
    let Some(Data::CryptoCreateAccount(body)) = &item.body.data else {
        return Ok(());
    };
    let id = account(&receipt(item)?.account_id)?.ok_or_else(|| missing(item, "receipt.account_id"))?;

    let mut entity = Entity::new(id, EntityType::Account);
    entity.created_timestamp = Some(item.consensus_timestamp);
    entity.modified_timestamp = Some(item.consensus_timestamp);
    entity.key = non_empty(&body.key);
    entity.auto_renew_period = seconds(&body.auto_renew_period);
    entity.memo = Some(body.memo.clone());
    entity.deleted = Some(false);
    ctx.merge_entity(entity);
    Ok(())
}

pub(super) fn update_account(item: &RecordItem, ctx: &mut ParserContext) -> Result<()> {
    let Some(Data::CryptoUpdateAccount(body)) = &item.body.data else {
        return Ok(());
    };
    let id = account(&body.account_id_to_update)?
        .ok_or_else(|| missing(item, "account_id_to_update"))?;

    let mut entity = Entity::new(id, EntityType::Account);
    entity.modified_timestamp = Some(item.consensus_timestamp);
    entity.key = body.key.as_deref().and_then(non_empty);
    entity.auto_renew_period = seconds(&body.auto_renew_period);
    entity.expiration_timestamp = nanos(&body.expiration_time)?;
    entity.memo = body.memo.clone();
    ctx.merge_entity(entity);
    Ok(())
}

pub(super) fn delete_account(item: &RecordItem, ctx: &mut ParserContext) -> Result<()> {
    let Some(Data::CryptoDelete(body)) = &item.body.data else {
        return Ok(());
    };
    let id = account(&body.delete_account_id)?.ok_or_else(|| missing(item, "delete_account_id"))?;

    let mut entity = Entity::new(id, EntityType::Account);
    entity.modified_timestamp = Some(item.consensus_timestamp);
    entity.deleted = Some(true);
    ctx.merge_entity(entity);
    Ok(())
}

/// Transfers are recorded for every transaction; nothing else changes.
pub(super) fn transfer(_item: &RecordItem, _ctx: &mut ParserContext) -> Result<()> {
    Ok(())
}
