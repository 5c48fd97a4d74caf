//! HCS topic messages.

use mirror_common::EntityId;
use mirror_parser::TopicMessage;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::DbError;

pub trait TopicMessageQueries {
    fn insert_topic_messages(&self, messages: &[TopicMessage]) -> Result<usize, DbError>;

    /// Messages of a topic in sequence order, starting after
    /// `after_sequence`.
    fn load_topic_messages(
        &self,
        topic_id: EntityId,
        after_sequence: i64,
        limit: usize,
    ) -> Result<Vec<TopicMessage>, DbError>;

    fn last_sequence_number(&self, topic_id: EntityId) -> Result<Option<i64>, DbError>;
}

impl TopicMessageQueries for Connection {
    fn insert_topic_messages(&self, messages: &[TopicMessage]) -> Result<usize, DbError> {
        let mut stmt = self.prepare_cached(
            "INSERT INTO topic_message (consensus_timestamp, topic_id, message, running_hash, \
             running_hash_version, sequence_number, payer_account_id, chunk_num, chunk_total, \
             initial_valid_start) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )?;
        for message in messages {
            stmt.execute(params![
                message.consensus_timestamp,
                message.topic_id.encode(),
                message.message,
                message.running_hash,
                message.running_hash_version,
                message.sequence_number,
                message.payer_account_id.map(|id| id.encode()),
                message.chunk_num,
                message.chunk_total,
                message.initial_valid_start,
            ])?;
        }
        Ok(messages.len())
    }

    fn load_topic_messages(
        &self,
        topic_id: EntityId,
        after_sequence: i64,
        limit: usize,
    ) -> Result<Vec<TopicMessage>, DbError> {
        let mut stmt = self.prepare(
            "SELECT consensus_timestamp, topic_id, message, running_hash, running_hash_version, \
             sequence_number, payer_account_id, chunk_num, chunk_total, initial_valid_start \
             FROM topic_message WHERE topic_id = ?1 AND sequence_number > ?2 \
             ORDER BY sequence_number ASC LIMIT ?3",
        )?;
        let messages = stmt
            .query_map(params![topic_id.encode(), after_sequence, limit as i64], |row| {
                Ok(TopicMessage {
                    consensus_timestamp: row.get(0)?,
                    topic_id: EntityId::decode(row.get(1)?),
                    message: row.get(2)?,
                    running_hash: row.get(3)?,
                    running_hash_version: row.get(4)?,
                    sequence_number: row.get(5)?,
                    payer_account_id: row.get::<_, Option<i64>>(6)?.map(EntityId::decode),
                    chunk_num: row.get(7)?,
                    chunk_total: row.get(8)?,
                    initial_valid_start: row.get(9)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(messages)
    }

    fn last_sequence_number(&self, topic_id: EntityId) -> Result<Option<i64>, DbError> {
        let last = self
            .query_row(
                "SELECT MAX(sequence_number) FROM topic_message WHERE topic_id = ?1",
                params![topic_id.encode()],
                |row| row.get::<_, Option<i64>>(0),
            )
            .optional()?;
        Ok(last.flatten())
    }
}
