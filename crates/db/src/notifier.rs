//! Committed-file notifications.
//!
//! The [`Notifier`] publishes one JSON payload per committed file on a
//! `tokio::sync::broadcast` channel. It runs as a post-commit hook, so a
//! listener never hears of a file that was rolled back. Payloads larger than
//! the configured limit are dropped with a warning rather than truncated.

use mirror_parser::TopicMessage;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::persister::{CommittedFile, PostCommitHook};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    pub enabled: bool,
    /// Payloads buffered per slow subscriber before it starts lagging.
    pub capacity: usize,
    pub max_payload_bytes: usize,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: 1024,
            max_payload_bytes: 8000,
        }
    }
}

/// A topic message as announced to listeners.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicMessageNotification {
    pub topic_id: String,
    pub sequence_number: i64,
    pub consensus_timestamp: i64,
    /// Hex-encoded.
    pub message: String,
    /// Hex-encoded.
    pub running_hash: String,
}

impl From<&TopicMessage> for TopicMessageNotification {
    fn from(message: &TopicMessage) -> Self {
        Self {
            topic_id: message.topic_id.to_string(),
            sequence_number: message.sequence_number,
            consensus_timestamp: message.consensus_timestamp,
            message: hex::encode(&message.message),
            running_hash: hex::encode(&message.running_hash),
        }
    }
}

/// The JSON payload sent for each committed file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileNotification {
    pub stream_type: String,
    pub filename: String,
    pub consensus_end: i64,
    pub new_entity_ids: Vec<String>,
    pub topic_messages: Vec<TopicMessageNotification>,
}

impl From<&CommittedFile> for FileNotification {
    fn from(file: &CommittedFile) -> Self {
        Self {
            stream_type: file.stream_type.as_str().to_string(),
            filename: file.name.clone(),
            consensus_end: file.consensus_end,
            new_entity_ids: file.new_entity_ids.iter().map(|id| id.to_string()).collect(),
            topic_messages: file.topic_messages.iter().map(Into::into).collect(),
        }
    }
}

/// Broadcasts committed files to in-process listeners.
pub struct Notifier {
    config: NotifierConfig,
    sender: broadcast::Sender<String>,
}

impl Notifier {
    pub fn new(config: NotifierConfig) -> Self {
        let (sender, _) = broadcast::channel(config.capacity.max(1));
        Self { config, sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.sender.subscribe()
    }

    /// Encodes and sends the notification. Returns `true` if the payload
    /// was handed to the channel.
    pub fn notify(&self, notification: &FileNotification) -> bool {
        if !self.config.enabled {
            return false;
        }
        let payload = match serde_json::to_string(notification) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(file = %notification.filename, error = %e, "Failed to encode notification");
                return false;
            }
        };
        if payload.len() > self.config.max_payload_bytes {
            warn!(
                file = %notification.filename,
                size = payload.len(),
                limit = self.config.max_payload_bytes,
                "Notification payload too large, dropping"
            );
            return false;
        }
        match self.sender.send(payload) {
            Ok(receivers) => {
                debug!(file = %notification.filename, receivers, "Sent notification");
            }
            Err(_) => {
                debug!(file = %notification.filename, "No notification listeners");
            }
        }
        true
    }
}

impl PostCommitHook for Notifier {
    fn name(&self) -> &'static str {
        "notifier"
    }

    fn on_commit(&self, file: &CommittedFile) {
        self.notify(&FileNotification::from(file));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persister::PersistStats;
    use mirror_common::EntityId;
    use mirror_streams::StreamType;

    fn committed(messages: usize) -> CommittedFile {
        let topic = EntityId::new(0, 0, 1001).unwrap();
        CommittedFile {
            stream_type: StreamType::Record,
            name: "2022-04-15T05_20_00.000000000Z.rcd".into(),
            consensus_end: 42,
            new_entity_ids: vec![topic],
            topic_messages: (0..messages as i64)
                .map(|i| TopicMessage {
                    consensus_timestamp: 40 + i,
                    topic_id: topic,
                    message: vec![0xab; 64],
                    running_hash: vec![1; 48],
                    running_hash_version: 3,
                    sequence_number: i + 1,
                    payer_account_id: None,
                    chunk_num: None,
                    chunk_total: None,
                    initial_valid_start: None,
                })
                .collect(),
            stats: PersistStats::default(),
        }
    }

    #[test]
    fn test_payload_shape() {
        let notifier = Notifier::new(NotifierConfig::default());
        let mut rx = notifier.subscribe();
        notifier.on_commit(&committed(1));

        let payload = rx.try_recv().unwrap();
        let value: serde_json::Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(value["stream_type"], "RECORD");
        assert_eq!(value["consensus_end"], 42);
        assert_eq!(value["new_entity_ids"][0], "0.0.1001");
        assert_eq!(value["topic_messages"][0]["sequence_number"], 1);
        assert_eq!(value["topic_messages"][0]["message"], "ab".repeat(64));
    }

    #[test]
    fn test_oversized_payload_dropped() {
        let notifier = Notifier::new(NotifierConfig {
            max_payload_bytes: 500,
            ..Default::default()
        });
        let mut rx = notifier.subscribe();
        assert!(!notifier.notify(&FileNotification::from(&committed(10))));
        assert!(rx.try_recv().is_err());

        assert!(notifier.notify(&FileNotification::from(&committed(0))));
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn test_disabled_and_unobserved() {
        let disabled = Notifier::new(NotifierConfig {
            enabled: false,
            ..Default::default()
        });
        assert!(!disabled.notify(&FileNotification::from(&committed(0))));

        let unobserved = Notifier::new(NotifierConfig::default());
        assert!(unobserved.notify(&FileNotification::from(&committed(0))));
    }
}
