//! Pending rows of one stream file.

use std::collections::{BTreeMap, BTreeSet};

use mirror_common::EntityId;

use crate::domain::{
    AccountBalanceRow, CryptoTransfer, Entity, SidecarRow, Token, TokenBalanceRow, TokenTransfer,
    TopicMessage, Transaction,
};

/// Everything parsed from one file, grouped by table.
///
/// Append-only rows keep file order. Entity and token updates are keyed by
/// id and merged as they arrive; hbar transfers also accumulate into
/// per-account balance deltas.
#[derive(Debug, Default)]
pub struct ParserContext {
    transactions: Vec<Transaction>,
    crypto_transfers: Vec<CryptoTransfer>,
    token_transfers: Vec<TokenTransfer>,
    topic_messages: Vec<TopicMessage>,
    account_balances: Vec<AccountBalanceRow>,
    token_balances: Vec<TokenBalanceRow>,
    sidecar_records: Vec<SidecarRow>,
    entities: BTreeMap<EntityId, Entity>,
    tokens: BTreeMap<EntityId, Token>,
    balance_deltas: BTreeMap<EntityId, i64>,
    created: BTreeSet<EntityId>,
}

impl ParserContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_transaction(&mut self, transaction: Transaction) {
        self.transactions.push(transaction);
    }

    /// Adds a balance change; the row itself is kept only when `persist`.
    pub fn add_crypto_transfer(&mut self, transfer: CryptoTransfer, persist: bool) {
        *self.balance_deltas.entry(transfer.entity_id).or_insert(0) += transfer.amount;
        if persist {
            self.crypto_transfers.push(transfer);
        }
    }

    pub fn add_token_transfer(&mut self, transfer: TokenTransfer) {
        self.token_transfers.push(transfer);
    }

    pub fn add_topic_message(&mut self, message: TopicMessage) {
        self.topic_messages.push(message);
    }

    pub fn add_account_balance(&mut self, row: AccountBalanceRow) {
        self.account_balances.push(row);
    }

    pub fn add_token_balance(&mut self, row: TokenBalanceRow) {
        self.token_balances.push(row);
    }

    pub fn add_sidecar_record(&mut self, row: SidecarRow) {
        self.sidecar_records.push(row);
    }

    pub fn merge_entity(&mut self, entity: Entity) {
        if entity.created_timestamp.is_some() {
            self.created.insert(entity.id);
        }
        match self.entities.get_mut(&entity.id) {
            Some(existing) => existing.merge(entity),
            None => {
                self.entities.insert(entity.id, entity);
            }
        }
    }

    pub fn merge_token(&mut self, token: Token) {
        match self.tokens.get_mut(&token.token_id) {
            Some(existing) => existing.merge(token),
            None => {
                self.tokens.insert(token.token_id, token);
            }
        }
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn crypto_transfers(&self) -> &[CryptoTransfer] {
        &self.crypto_transfers
    }

    pub fn token_transfers(&self) -> &[TokenTransfer] {
        &self.token_transfers
    }

    pub fn topic_messages(&self) -> &[TopicMessage] {
        &self.topic_messages
    }

    pub fn account_balances(&self) -> &[AccountBalanceRow] {
        &self.account_balances
    }

    pub fn token_balances(&self) -> &[TokenBalanceRow] {
        &self.token_balances
    }

    pub fn sidecar_records(&self) -> &[SidecarRow] {
        &self.sidecar_records
    }

    /// Merged entity updates, ordered by id.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn entity(&self, id: &EntityId) -> Option<&Entity> {
        self.entities.get(id)
    }

    pub fn tokens(&self) -> impl Iterator<Item = &Token> {
        self.tokens.values()
    }

    /// Net hbar change per account over the file.
    pub fn balance_deltas(&self) -> &BTreeMap<EntityId, i64> {
        &self.balance_deltas
    }

    /// Ids of entities created in this file.
    pub fn new_entity_ids(&self) -> Vec<EntityId> {
        self.created.iter().copied().collect()
    }

    /// Total rows waiting to be written.
    pub fn row_count(&self) -> usize {
        self.transactions.len()
            + self.crypto_transfers.len()
            + self.token_transfers.len()
            + self.topic_messages.len()
            + self.account_balances.len()
            + self.token_balances.len()
            + self.sidecar_records.len()
            + self.entities.len()
            + self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.row_count() == 0 && self.balance_deltas.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EntityType;

    fn id(num: i64) -> EntityId {
        EntityId::new(0, 0, num).unwrap()
    }

    fn transfer(account: i64, amount: i64) -> CryptoTransfer {
        CryptoTransfer {
            consensus_timestamp: 1,
            entity_id: id(account),
            amount,
            payer_account_id: None,
        }
    }

    #[test]
    fn test_balance_deltas_accumulate() {
        let mut ctx = ParserContext::new();
        ctx.add_crypto_transfer(transfer(2, -10), true);
        ctx.add_crypto_transfer(transfer(3, 10), true);
        ctx.add_crypto_transfer(transfer(2, -5), false);

        assert_eq!(ctx.balance_deltas()[&id(2)], -15);
        assert_eq!(ctx.balance_deltas()[&id(3)], 10);
        assert_eq!(ctx.crypto_transfers().len(), 2);
    }

    #[test]
    fn test_entities_merge_by_id() {
        let mut ctx = ParserContext::new();
        let mut created = Entity::new(id(7), EntityType::Topic);
        created.created_timestamp = Some(1);
        created.memo = Some("a".into());
        ctx.merge_entity(created);

        let mut deleted = Entity::new(id(7), EntityType::Topic);
        deleted.deleted = Some(true);
        ctx.merge_entity(deleted);

        let merged = ctx.entity(&id(7)).unwrap();
        assert_eq!(merged.memo.as_deref(), Some("a"));
        assert_eq!(merged.deleted, Some(true));
        assert_eq!(ctx.entities().count(), 1);
        assert_eq!(ctx.new_entity_ids(), vec![id(7)]);
    }

    #[test]
    fn test_empty_context() {
        let ctx = ParserContext::new();
        assert!(ctx.is_empty());
        assert_eq!(ctx.row_count(), 0);
    }
}
