//! Parsing written record and balance files.

use bytes::Bytes;
use mirror_common::{EntityId, Hash384};
use mirror_parser::{
    BalanceFileParser, EntityType, HandlerRegistry, ParserContext, ParserError, ParserProperties,
    RecordFileParser,
};
use mirror_streams::model::{AccountBalance, SidecarKind, SidecarRecord, TokenBalance};
use mirror_streams::proto::{
    self, transaction_body::Data, AccountAmount, AccountId, ConsensusCreateTopicTransactionBody,
    ConsensusSubmitMessageTransactionBody, CryptoCreateTransactionBody,
    CryptoUpdateTransactionBody, Timestamp, TokenCreateTransactionBody, TokenId,
    TokenMintTransactionBody, TopicId, TransactionBody, TransactionId, TransactionRecord,
    TransferList, SUCCESS,
};
use mirror_streams::reader::{AccountBalanceFileReader, RecordFileReader, StreamFileData, StreamFileReader};
use mirror_streams::writer::{
    gzip, transaction_record, write_balance_csv, write_balance_protobuf, RecordFileWriter,
};
use mirror_streams::{RecordFile, RecordItem, SidecarFile, StreamFilename, TransactionType};

const T0: i64 = 1_650_000_000_000_000_000;
const INSUFFICIENT_PAYER_BALANCE: i32 = 10;

fn id(num: i64) -> EntityId {
    EntityId::new(0, 0, num).unwrap()
}

fn account(num: i64) -> AccountId {
    AccountId::from_entity_id(id(num))
}

fn body(data: Data) -> TransactionBody {
    TransactionBody {
        transaction_id: Some(TransactionId {
            account_id: Some(account(2)),
            transaction_valid_start: Some(Timestamp::from_nanos(T0 - 10)),
            ..Default::default()
        }),
        node_account_id: Some(account(3)),
        transaction_fee: 100,
        memo: "memo".into(),
        data: Some(data),
        ..Default::default()
    }
}

fn read(writer: RecordFileWriter) -> RecordFile {
    let written = writer.write();
    let name = StreamFilename::parse("2022-04-15T05_20_00.000000000Z.rcd").unwrap();
    let data = StreamFileData::from_bytes(name, Bytes::from(written.bytes)).unwrap();
    RecordFileReader.read(&data).unwrap()
}

fn parse(writer: RecordFileWriter) -> ParserContext {
    let mut file = read(writer);
    RecordFileParser::default().parse(&mut file).unwrap()
}

fn transfer_record(ts: i64, transfers: &[(i64, i64)]) -> TransactionRecord {
    TransactionRecord {
        transaction_fee: 8,
        transfer_list: Some(TransferList {
            account_amounts: transfers
                .iter()
                .map(|(num, amount)| AccountAmount {
                    account_id: Some(account(*num)),
                    amount: *amount,
                })
                .collect(),
        }),
        ..transaction_record(ts, SUCCESS)
    }
}

#[test]
fn test_transactions_and_transfers() {
    let transfer = body(Data::CryptoTransfer(Default::default()));
    let ctx = parse(
        RecordFileWriter::new(5)
            .item(&transfer, &transfer_record(T0, &[(2, -108), (3, 8), (98, 100)]))
            .item(&transfer, &transfer_record(T0 + 1, &[(2, -50), (98, 50)])),
    );

    assert_eq!(ctx.transactions().len(), 2);
    let tx = &ctx.transactions()[0];
    assert_eq!(tx.consensus_timestamp, T0);
    assert_eq!(tx.transaction_type, TransactionType::CryptoTransfer.proto_id());
    assert_eq!(tx.result, SUCCESS);
    assert_eq!(tx.payer_account_id, Some(id(2)));
    assert_eq!(tx.node_account_id, Some(id(3)));
    assert_eq!(tx.valid_start_ns, T0 - 10);
    assert_eq!(tx.max_fee, 100);
    assert_eq!(tx.charged_tx_fee, 8);
    assert_eq!(tx.memo, b"memo");
    assert_eq!(tx.index, 0);
    assert_eq!(tx.entity_id, None);
    assert!(tx.transaction_bytes.is_none());
    assert_eq!(ctx.transactions()[1].index, 1);

    assert_eq!(ctx.crypto_transfers().len(), 5);
    assert_eq!(ctx.balance_deltas()[&id(2)], -158);
    assert_eq!(ctx.balance_deltas()[&id(98)], 150);
}

#[test]
fn test_entity_lifecycle_merges_within_file() {
    let create = body(Data::CryptoCreateAccount(CryptoCreateTransactionBody {
        key: vec![1, 2, 3],
        memo: "created".into(),
        ..Default::default()
    }));
    let mut create_record = transaction_record(T0, SUCCESS);
    create_record.receipt.as_mut().unwrap().account_id = Some(account(1001));

    let update = body(Data::CryptoUpdateAccount(CryptoUpdateTransactionBody {
        account_id_to_update: Some(account(1001)),
        memo: Some("updated".into()),
        ..Default::default()
    }));

    let ctx = parse(
        RecordFileWriter::new(6)
            .item(&create, &create_record)
            .item(&update, &transaction_record(T0 + 1, SUCCESS)),
    );

    let entity = ctx.entity(&id(1001)).unwrap();
    assert_eq!(entity.entity_type, EntityType::Account);
    assert_eq!(entity.created_timestamp, Some(T0));
    assert_eq!(entity.modified_timestamp, Some(T0 + 1));
    assert_eq!(entity.memo.as_deref(), Some("updated"));
    assert_eq!(entity.key, Some(vec![1, 2, 3]));
    assert_eq!(ctx.new_entity_ids(), vec![id(1001)]);
    assert_eq!(ctx.transactions()[0].entity_id, Some(id(1001)));
    assert_eq!(ctx.transactions()[1].entity_id, Some(id(1001)));
}

#[test]
fn test_failed_transaction_skips_handler() {
    let update = body(Data::CryptoUpdateAccount(CryptoUpdateTransactionBody {
        account_id_to_update: Some(account(1001)),
        memo: Some("never".into()),
        ..Default::default()
    }));
    let ctx = parse(
        RecordFileWriter::new(5).item(&update, &transaction_record(T0, INSUFFICIENT_PAYER_BALANCE)),
    );

    assert_eq!(ctx.transactions().len(), 1);
    assert_eq!(ctx.transactions()[0].result, INSUFFICIENT_PAYER_BALANCE);
    assert!(ctx.entity(&id(1001)).is_none());
}

#[test]
fn test_child_of_failed_parent_skips_handler() {
    let parent = body(Data::CryptoTransfer(Default::default()));
    let child = body(Data::CryptoCreateAccount(CryptoCreateTransactionBody::default()));
    let mut child_record = transaction_record(T0 + 1, SUCCESS);
    child_record.receipt.as_mut().unwrap().account_id = Some(account(1500));
    child_record.parent_consensus_timestamp = Some(Timestamp::from_nanos(T0));

    let ctx = parse(
        RecordFileWriter::new(5)
            .item(&parent, &transaction_record(T0, INSUFFICIENT_PAYER_BALANCE))
            .item(&child, &child_record),
    );

    assert_eq!(ctx.transactions()[1].parent_consensus_timestamp, Some(T0));
    assert!(ctx.entity(&id(1500)).is_none());
}

#[test]
fn test_topic_and_messages() {
    let create = body(Data::ConsensusCreateTopic(ConsensusCreateTopicTransactionBody {
        memo: "topic".into(),
        submit_key: vec![9],
        ..Default::default()
    }));
    let mut create_record = transaction_record(T0, SUCCESS);
    create_record.receipt.as_mut().unwrap().topic_id =
        Some(TopicId::from_entity_id(id(2000)));

    let submit = body(Data::ConsensusSubmitMessage(ConsensusSubmitMessageTransactionBody {
        topic_id: Some(TopicId::from_entity_id(id(2000))),
        message: b"hello".to_vec(),
        chunk_info: None,
    }));
    let mut submit_record = transaction_record(T0 + 1, SUCCESS);
    {
        let receipt = submit_record.receipt.as_mut().unwrap();
        receipt.topic_sequence_number = 1;
        receipt.topic_running_hash = Hash384::hash(b"running").as_bytes().to_vec();
        receipt.topic_running_hash_version = 3;
    }

    let ctx = parse(
        RecordFileWriter::new(5)
            .item(&create, &create_record)
            .item(&submit, &submit_record),
    );

    let topic = ctx.entity(&id(2000)).unwrap();
    assert_eq!(topic.entity_type, EntityType::Topic);
    assert_eq!(topic.submit_key, Some(vec![9]));

    let message = &ctx.topic_messages()[0];
    assert_eq!(message.topic_id, id(2000));
    assert_eq!(message.message, b"hello");
    assert_eq!(message.sequence_number, 1);
    assert_eq!(message.running_hash_version, 3);
    assert_eq!(message.payer_account_id, Some(id(2)));
}

#[test]
fn test_token_create_and_mint() {
    let create = body(Data::TokenCreation(TokenCreateTransactionBody {
        name: "Coin".into(),
        symbol: "CN".into(),
        decimals: 2,
        initial_supply: 1000,
        treasury: Some(account(2)),
        ..Default::default()
    }));
    let mut create_record = transaction_record(T0, SUCCESS);
    create_record.receipt.as_mut().unwrap().token_id = Some(TokenId::from_entity_id(id(3000)));

    let mint = body(Data::TokenMint(TokenMintTransactionBody {
        token: Some(TokenId::from_entity_id(id(3000))),
        amount: 500,
        metadata: Vec::new(),
    }));
    let mut mint_record = transaction_record(T0 + 1, SUCCESS);
    mint_record.receipt.as_mut().unwrap().new_total_supply = 1500;
    mint_record.token_transfer_lists = vec![proto::TokenTransferList {
        token: Some(TokenId::from_entity_id(id(3000))),
        transfers: vec![AccountAmount {
            account_id: Some(account(2)),
            amount: 500,
        }],
    }];

    let ctx = parse(
        RecordFileWriter::new(5)
            .item(&create, &create_record)
            .item(&mint, &mint_record),
    );

    let token = ctx.tokens().next().unwrap();
    assert_eq!(token.token_id, id(3000));
    assert_eq!(token.name.as_deref(), Some("Coin"));
    assert_eq!(token.initial_supply, Some(1000));
    assert_eq!(token.total_supply, Some(1500));
    assert_eq!(token.treasury_account_id, Some(id(2)));
    assert_eq!(token.modified_timestamp, T0 + 1);
    assert_eq!(ctx.entity(&id(3000)).unwrap().entity_type, EntityType::Token);

    assert_eq!(ctx.token_transfers().len(), 1);
    assert_eq!(ctx.token_transfers()[0].amount, 500);
}

#[test]
fn test_unknown_type_is_recorded_without_handler() {
    let ctx = parse(
        RecordFileWriter::new(5).item(&TransactionBody::default(), &transaction_record(T0, SUCCESS)),
    );
    assert_eq!(ctx.transactions()[0].transaction_type, -1);
    assert_eq!(ctx.entities().count(), 0);
}

#[test]
fn test_out_of_order_items_rejected() {
    let transfer = body(Data::CryptoTransfer(Default::default()));
    let mut file = read(
        RecordFileWriter::new(5)
            .item(&transfer, &transaction_record(T0 + 5, SUCCESS))
            .item(&transfer, &transaction_record(T0 + 5, SUCCESS)),
    );
    let err = RecordFileParser::default().parse(&mut file).unwrap_err();
    assert!(matches!(
        err,
        ParserError::OutOfOrder { previous, current } if previous == T0 + 5 && current == T0 + 5
    ));
}

#[test]
fn test_fee_beyond_i64_rejected() {
    let transfer = TransactionBody {
        transaction_fee: u64::MAX,
        ..body(Data::CryptoTransfer(Default::default()))
    };
    let mut file = read(RecordFileWriter::new(5).item(&transfer, &transaction_record(T0, SUCCESS)));
    let err = RecordFileParser::default().parse(&mut file).unwrap_err();
    assert!(matches!(
        err,
        ParserError::OutOfRange { field: "max fee", value: u64::MAX, consensus_timestamp } if consensus_timestamp == T0
    ));
}

#[test]
fn test_items_are_single_pass() {
    let transfer = body(Data::CryptoTransfer(Default::default()));
    let mut file = read(RecordFileWriter::new(2).item(&transfer, &transaction_record(T0, SUCCESS)));
    let parser = RecordFileParser::default();
    parser.parse(&mut file).unwrap();
    assert!(matches!(
        parser.parse(&mut file),
        Err(ParserError::CountMismatch { expected: 1, actual: 0, .. })
    ));
}

#[test]
fn test_properties_control_kept_rows() {
    let transfer = body(Data::CryptoTransfer(Default::default()));
    let mut file = read(
        RecordFileWriter::new(5).item(&transfer, &transfer_record(T0, &[(2, -5), (98, 5)])),
    );
    file.sidecars = vec![SidecarFile {
        name: "2022-04-15T05_20_00.000000000Z_01.rcd.gz".into(),
        id: 1,
        hash: Hash384::ZERO,
        size: 0,
        records: vec![SidecarRecord {
            consensus_timestamp: T0,
            migration: false,
            kind: SidecarKind::Actions,
            data: Bytes::from_static(b"action"),
        }],
    }];

    let parser = RecordFileParser::new(
        HandlerRegistry::new(),
        ParserProperties {
            persist_crypto_transfers: false,
            persist_transaction_bytes: true,
            ..ParserProperties::default()
        },
    );
    let ctx = parser.parse(&mut file).unwrap();

    assert!(ctx.crypto_transfers().is_empty());
    assert_eq!(ctx.balance_deltas()[&id(98)], 5);
    assert!(ctx.transactions()[0].transaction_bytes.is_some());
    assert_eq!(ctx.sidecar_records().len(), 1);
    assert_eq!(ctx.sidecar_records()[0].kind, SidecarKind::Actions);
    assert_eq!(ctx.sidecar_records()[0].data, b"action");
}

#[test]
fn test_custom_handler_replaces_built_in() {
    fn mark(item: &RecordItem, ctx: &mut ParserContext) -> mirror_parser::Result<()> {
        let mut entity = mirror_parser::Entity::new(id(77), EntityType::Account);
        entity.modified_timestamp = Some(item.consensus_timestamp);
        ctx.merge_entity(entity);
        Ok(())
    }

    let mut registry = HandlerRegistry::new();
    registry.register(TransactionType::CryptoTransfer, mark);
    let transfer = body(Data::CryptoTransfer(Default::default()));
    let mut file = read(RecordFileWriter::new(5).item(&transfer, &transaction_record(T0, SUCCESS)));
    let ctx = RecordFileParser::new(registry, ParserProperties::default())
        .parse(&mut file)
        .unwrap();
    assert_eq!(ctx.entity(&id(77)).unwrap().modified_timestamp, Some(T0));
}

#[test]
fn test_balance_csv_rows() {
    let csv = write_balance_csv(2, T0, &[(id(2), 100), (id(98), 5)]).unwrap();
    let name = StreamFilename::parse("2022-04-15T05_20_00.000000000Z_Balances.csv").unwrap();
    let data = StreamFileData::from_bytes(name, Bytes::from(csv)).unwrap();
    let mut file = AccountBalanceFileReader.read(&data).unwrap();

    let ctx = BalanceFileParser::default().parse(&mut file).unwrap();
    let rows = ctx.account_balances();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r.consensus_timestamp == T0));
    assert_eq!(rows[1].account_id, id(98));
    assert_eq!(rows[1].balance, 5);
    assert!(ctx.token_balances().is_empty());
}

#[test]
fn test_balance_protobuf_token_rows() {
    let balances = vec![AccountBalance {
        consensus_timestamp: T0,
        account_id: id(2),
        balance: 100,
        token_balances: vec![TokenBalance {
            token_id: id(3000),
            balance: 7,
        }],
    }];
    let bytes = gzip(&write_balance_protobuf(T0, &balances)).unwrap();
    let name = StreamFilename::parse("2022-04-15T05_20_00.000000000Z_Balances.pb.gz").unwrap();
    let data = StreamFileData::from_bytes(name, Bytes::from(bytes)).unwrap();
    let mut file = AccountBalanceFileReader.read(&data).unwrap();

    let ctx = BalanceFileParser::default().parse(&mut file).unwrap();
    assert_eq!(ctx.account_balances().len(), 1);
    assert_eq!(ctx.token_balances()[0].token_id, id(3000));
    assert_eq!(ctx.token_balances()[0].balance, 7);

    let mut file = AccountBalanceFileReader.read(&data).unwrap();
    let ctx = BalanceFileParser::new(ParserProperties {
        persist_token_balances: false,
        ..ParserProperties::default()
    })
    .parse(&mut file)
    .unwrap();
    assert!(ctx.token_balances().is_empty());
}
