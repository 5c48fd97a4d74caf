//! Record file parser.

use mirror_streams::{RecordFile, RecordItem};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::context::ParserContext;
use crate::domain::{CryptoTransfer, SidecarRow, TokenTransfer, Transaction};
use crate::error::{ParserError, Result};
use crate::handlers::{self, account};
use crate::registry::HandlerRegistry;

/// What the parsers keep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserProperties {
    pub persist_crypto_transfers: bool,
    pub persist_token_balances: bool,
    pub persist_transaction_bytes: bool,
    pub persist_sidecars: bool,
}

impl Default for ParserProperties {
    fn default() -> Self {
        Self {
            persist_crypto_transfers: true,
            persist_token_balances: true,
            persist_transaction_bytes: false,
            persist_sidecars: true,
        }
    }
}

/// Turns the items of a record file into rows.
#[derive(Debug, Clone, Default)]
pub struct RecordFileParser {
    registry: HandlerRegistry,
    properties: ParserProperties,
}

impl RecordFileParser {
    pub fn new(registry: HandlerRegistry, properties: ParserProperties) -> Self {
        Self {
            registry,
            properties,
        }
    }

    pub fn properties(&self) -> &ParserProperties {
        &self.properties
    }

    /// Consumes the file's items. Items must be strictly increasing in
    /// consensus timestamp and add up to the file's count.
    pub fn parse(&self, file: &mut RecordFile) -> Result<ParserContext> {
        let mut ctx = ParserContext::new();
        let mut previous: Option<i64> = None;
        let mut parsed = 0u64;

        for item in file.take_items() {
            let item = item?;
            if let Some(previous) = previous {
                if item.consensus_timestamp <= previous {
                    return Err(ParserError::OutOfOrder {
                        previous,
                        current: item.consensus_timestamp,
                    });
                }
            }
            previous = Some(item.consensus_timestamp);
            self.parse_item(&item, &mut ctx)?;
            parsed += 1;
        }

        if parsed != file.count {
            return Err(ParserError::CountMismatch {
                file: file.name.clone(),
                expected: file.count,
                actual: parsed,
            });
        }

        if self.properties.persist_sidecars {
            for sidecar in &file.sidecars {
                for (index, record) in sidecar.records.iter().enumerate() {
                    ctx.add_sidecar_record(SidecarRow {
                        consensus_timestamp: record.consensus_timestamp,
                        sidecar_id: sidecar.id,
                        index: index as i32,
                        kind: record.kind,
                        migration: record.migration,
                        data: record.data.to_vec(),
                    });
                }
            }
        }

        debug!(
            file = %file.name,
            items = parsed,
            rows = ctx.row_count(),
            "Parsed record file"
        );
        Ok(ctx)
    }

    fn parse_item(&self, item: &RecordItem, ctx: &mut ParserContext) -> Result<()> {
        let ts = item.consensus_timestamp;
        let transaction_id = item.body.transaction_id.as_ref();
        let payer = match transaction_id {
            Some(id) => account(&id.account_id)?,
            None => None,
        };
        let valid_start_ns = match transaction_id.and_then(|id| id.transaction_valid_start.as_ref()) {
            Some(start) => start.to_nanos()?,
            None => 0,
        };

        ctx.add_transaction(Transaction {
            consensus_timestamp: ts,
            transaction_type: item.transaction_type.proto_id(),
            result: item.status(),
            payer_account_id: payer,
            node_account_id: account(&item.body.node_account_id)?,
            valid_start_ns,
            valid_duration_seconds: item.body.transaction_valid_duration.as_ref().map(|d| d.seconds),
            max_fee: signed(ts, "max fee", item.body.transaction_fee)?,
            charged_tx_fee: signed(ts, "charged fee", item.record.transaction_fee)?,
            memo: item.body.memo.as_bytes().to_vec(),
            entity_id: handlers::primary_entity(item)?,
            transaction_hash: item.record.transaction_hash.clone(),
            index: item.index as i32,
            nonce: transaction_id.map(|id| id.nonce).unwrap_or_default(),
            scheduled: transaction_id.map(|id| id.scheduled).unwrap_or_default(),
            parent_consensus_timestamp: item.parent_consensus_timestamp(),
            transaction_bytes: self
                .properties
                .persist_transaction_bytes
                .then(|| item.transaction_bytes.to_vec()),
        });

        if let Some(transfers) = &item.record.transfer_list {
            for amount in &transfers.account_amounts {
                let Some(entity_id) = account(&amount.account_id)? else {
                    continue;
                };
                ctx.add_crypto_transfer(
                    CryptoTransfer {
                        consensus_timestamp: ts,
                        entity_id,
                        amount: amount.amount,
                        payer_account_id: payer,
                    },
                    self.properties.persist_crypto_transfers,
                );
            }
        }

        for list in &item.record.token_transfer_lists {
            let Some(token) = &list.token else {
                continue;
            };
            let token_id = token.to_entity_id()?;
            for amount in &list.transfers {
                let Some(account_id) = account(&amount.account_id)? else {
                    continue;
                };
                ctx.add_token_transfer(TokenTransfer {
                    consensus_timestamp: ts,
                    token_id,
                    account_id,
                    amount: amount.amount,
                    payer_account_id: payer,
                });
            }
        }

        if !item.is_successful() {
            trace!(consensus_timestamp = ts, status = item.status(), "Skipping handler of failed transaction");
            return Ok(());
        }
        match self.registry.get(item.transaction_type) {
            Some(handler) => handler(item, ctx),
            None => {
                trace!(
                    consensus_timestamp = ts,
                    transaction_type = %item.transaction_type,
                    "No handler for transaction type"
                );
                Ok(())
            }
        }
    }
}

fn signed(consensus_timestamp: i64, field: &'static str, value: u64) -> Result<i64> {
    i64::try_from(value).map_err(|_| ParserError::OutOfRange {
        consensus_timestamp,
        field,
        value,
    })
}
