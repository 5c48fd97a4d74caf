//! Token service.

use mirror_streams::proto::transaction_body::Data;
use mirror_streams::RecordItem;

use super::{account, missing, non_empty, receipt};
use crate::context::ParserContext;
use crate::domain::{Entity, EntityType, Token};
use crate::error::Result;

pub(super) fn create(item: &RecordItem, ctx: &mut ParserContext) -> Result<()> {
    let Some(Data::TokenCreation(body)) = &item.body.data else {
        return Ok(());
    };
    let token_id = receipt(item)?
        .token_id
        .as_ref()
        .ok_or_else(|| missing(item, "receipt.token_id"))?
        .to_entity_id()?;
    let ts = item.consensus_timestamp;

    let mut entity = Entity::new(token_id, EntityType::Token);
    entity.created_timestamp = Some(ts);
    entity.modified_timestamp = Some(ts);
    entity.key = non_empty(&body.admin_key);
    entity.memo = Some(body.memo.clone());
    entity.deleted = Some(false);
    ctx.merge_entity(entity);

    let supply = body.initial_supply as i64;
    ctx.merge_token(Token {
        created_timestamp: Some(ts),
        name: Some(body.name.clone()),
        symbol: Some(body.symbol.clone()),
        decimals: Some(i64::from(body.decimals)),
        initial_supply: Some(supply),
        total_supply: Some(supply),
        treasury_account_id: account(&body.treasury)?,
        ..Token::update(token_id, ts)
    });
    Ok(())
}

pub(super) fn mint(item: &RecordItem, ctx: &mut ParserContext) -> Result<()> {
    let Some(Data::TokenMint(body)) = &item.body.data else {
        return Ok(());
    };
    update_supply(item, body.token.as_ref(), ctx)
}

pub(super) fn burn(item: &RecordItem, ctx: &mut ParserContext) -> Result<()> {
    let Some(Data::TokenBurn(body)) = &item.body.data else {
        return Ok(());
    };
    update_supply(item, body.token.as_ref(), ctx)
}

/// The receipt carries the supply after the mint or burn.
fn update_supply(
    item: &RecordItem,
    token: Option<&mirror_streams::proto::TokenId>,
    ctx: &mut ParserContext,
) -> Result<()> {
    let token_id = token.ok_or_else(|| missing(item, "token"))?.to_entity_id()?;
    let total_supply = receipt(item)?.new_total_supply as i64;
    ctx.merge_token(Token {
        total_supply: Some(total_supply),
        ..Token::update(token_id, item.consensus_timestamp)
    });
    Ok(())
}
