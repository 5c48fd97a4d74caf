//! Account balance file parser.

use mirror_streams::AccountBalanceFile;
use tracing::debug;

use crate::context::ParserContext;
use crate::domain::{AccountBalanceRow, TokenBalanceRow};
use crate::error::{ParserError, Result};
use crate::record_parser::ParserProperties;

/// Turns balance snapshot rows into `account_balance` and `token_balance`
/// rows.
#[derive(Debug, Clone, Default)]
pub struct BalanceFileParser {
    properties: ParserProperties,
}

impl BalanceFileParser {
    pub fn new(properties: ParserProperties) -> Self {
        Self { properties }
    }

    pub fn parse(&self, file: &mut AccountBalanceFile) -> Result<ParserContext> {
        let mut ctx = ParserContext::new();
        let mut parsed = 0u64;
        for balance in file.take_items() {
            ctx.add_account_balance(AccountBalanceRow {
                consensus_timestamp: balance.consensus_timestamp,
                account_id: balance.account_id,
                balance: balance.balance,
            });
            if self.properties.persist_token_balances {
                for token in &balance.token_balances {
                    ctx.add_token_balance(TokenBalanceRow {
                        consensus_timestamp: balance.consensus_timestamp,
                        account_id: balance.account_id,
                        token_id: token.token_id,
                        balance: token.balance,
                    });
                }
            }
            parsed += 1;
        }

        if parsed != file.count {
            return Err(ParserError::CountMismatch {
                file: file.name.clone(),
                expected: file.count,
                actual: parsed,
            });
        }
        debug!(file = %file.name, accounts = parsed, "Parsed balance file");
        Ok(ctx)
    }
}
