//! Account balance file readers.
//!
//! CSV v1 starts with a `TimeStamp:` line, CSV v2 with `# version:2` and a
//! commented timestamp line. Anything else is read as a protobuf
//! `AllAccountBalances` message.

use mirror_common::time::parse_instant;
use mirror_common::EntityId;
use mirror_crypto::sha384;
use prost::Message;

use super::StreamFileData;
use crate::error::{Result, StreamError};
use crate::model::{AccountBalance, AccountBalanceFile, BalanceFormat, TokenBalance};
use crate::proto::AllAccountBalances;

const V1_TIMESTAMP_PREFIX: &str = "TimeStamp:";
const V2_VERSION_LINE: &str = "# version:2";
const V2_TIMESTAMP_PREFIX: &str = "# TimeStamp:";
const HEADER_PREFIX: &str = "shard";

/// Detects the layout from the leading bytes.
pub(crate) fn detect(bytes: &[u8]) -> BalanceFormat {
    if bytes.starts_with(V2_VERSION_LINE.as_bytes()) {
        BalanceFormat::CsvV2
    } else if bytes.starts_with(V1_TIMESTAMP_PREFIX.as_bytes()) {
        BalanceFormat::CsvV1
    } else {
        BalanceFormat::Protobuf
    }
}

pub(crate) fn read_csv(data: &StreamFileData, format: BalanceFormat) -> Result<AccountBalanceFile> {
    let text = std::str::from_utf8(&data.bytes)
        .map_err(|e| StreamError::InvalidData(format!("balance file is not utf-8: {}", e)))?;
    let mut lines = text.lines().enumerate().map(|(i, l)| (i + 1, l.trim()));

    let csv_err = |line: usize, reason: &str| StreamError::Csv {
        line,
        reason: reason.to_string(),
    };

    if format == BalanceFormat::CsvV2 {
        match lines.next() {
            Some((_, V2_VERSION_LINE)) => {}
            Some((n, _)) => return Err(csv_err(n, "missing version line")),
            None => return Err(csv_err(1, "missing version line")),
        }
    }
    let timestamp_prefix = match format {
        BalanceFormat::CsvV2 => V2_TIMESTAMP_PREFIX,
        _ => V1_TIMESTAMP_PREFIX,
    };

    let (line_no, line) = lines
        .next()
        .ok_or_else(|| csv_err(1, "missing timestamp line"))?;
    let instant = line
        .strip_prefix(timestamp_prefix)
        .ok_or_else(|| csv_err(line_no, "missing timestamp line"))?;
    let consensus_timestamp =
        parse_instant(instant.trim()).map_err(|e| csv_err(line_no, &e.to_string()))?;
    if consensus_timestamp != data.filename.timestamp() {
        return Err(StreamError::InvalidData(format!(
            "balance timestamp {} does not match filename {}",
            consensus_timestamp,
            data.filename.name()
        )));
    }

    let (line_no, header) = lines
        .next()
        .ok_or_else(|| csv_err(line_no + 1, "missing header"))?;
    if !header.to_ascii_lowercase().starts_with(HEADER_PREFIX) {
        return Err(csv_err(line_no, "missing header"));
    }

    let mut items = Vec::new();
    for (line_no, line) in lines {
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() < 4 {
            return Err(csv_err(line_no, "expected shard,realm,number,balance"));
        }
        let number = |i: usize| {
            fields[i]
                .parse::<i64>()
                .map_err(|_| csv_err(line_no, &format!("invalid number {:?}", fields[i])))
        };
        let account_id = EntityId::new(number(0)?, number(1)?, number(2)?)
            .map_err(|e| csv_err(line_no, &e.to_string()))?;
        let balance = number(3)?;
        if balance < 0 {
            return Err(csv_err(line_no, "negative balance"));
        }
        items.push(AccountBalance {
            consensus_timestamp,
            account_id,
            balance,
            token_balances: Vec::new(),
        });
    }

    Ok(AccountBalanceFile::new(
        data.filename.name().to_string(),
        format,
        consensus_timestamp,
        sha384(&data.bytes),
        data.bytes.clone(),
        items,
    ))
}

pub(crate) fn read_protobuf(data: &StreamFileData) -> Result<AccountBalanceFile> {
    let proto = AllAccountBalances::decode(data.bytes.clone())?;
    let consensus_timestamp = proto
        .consensus_timestamp
        .as_ref()
        .ok_or_else(|| StreamError::InvalidData("balance file without timestamp".into()))?
        .to_nanos()?;

    let mut items = Vec::with_capacity(proto.all_accounts.len());
    for account in &proto.all_accounts {
        let account_id = account
            .account_id
            .as_ref()
            .ok_or_else(|| StreamError::InvalidData("balance without account id".into()))?
            .to_entity_id()?;
        let token_balances = account
            .token_unit_balances
            .iter()
            .map(|tb| {
                let token_id = tb
                    .token_id
                    .as_ref()
                    .ok_or_else(|| StreamError::InvalidData("token balance without token".into()))?
                    .to_entity_id()?;
                Ok(TokenBalance {
                    token_id,
                    balance: to_i64(tb.balance)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        items.push(AccountBalance {
            consensus_timestamp,
            account_id,
            balance: to_i64(account.hbar_balance)?,
            token_balances,
        });
    }

    Ok(AccountBalanceFile::new(
        data.filename.name().to_string(),
        BalanceFormat::Protobuf,
        consensus_timestamp,
        sha384(&data.bytes),
        data.bytes.clone(),
        items,
    ))
}

fn to_i64(value: u64) -> Result<i64> {
    i64::try_from(value).map_err(|_| StreamError::InvalidData(format!("balance {} overflows", value)))
}
