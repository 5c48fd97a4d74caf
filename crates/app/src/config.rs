//! Configuration loading and validation.
//!
//! The configuration is a TOML file with one section per concern. Every
//! section has defaults, so an empty file is a valid single-file testnet
//! configuration reading from `./data/streams`.
//!
//! | Section | Description |
//! |---------|-------------|
//! | `common` | Network, shard and realm |
//! | `database` | SQLite path and connection pool |
//! | `storage` | Where the stream files are read from (local directory or HTTP bucket) |
//! | `address_book` | Node roster file and refresh period |
//! | `consensus` | Signature consensus mode and threshold |
//! | `record` / `balance` | Per-stream downloader and scheduler settings |
//! | `parser` | Which rows the parsers keep |
//! | `notify` | Committed-file notifications |
//! | `partition` | Time partition width and cache staleness |
//! | `reconciliation` | Periodic balance cross-check |
//! | `logging` | Log level and format |
//!
//! ```toml
//! [common]
//! network = "testnet"
//!
//! [database]
//! path = "/var/lib/mirror/mirror.db"
//!
//! [storage]
//! kind = "http"
//! base_url = "https://storage.example.com/testnet-streams"
//!
//! [address_book]
//! path = "/etc/mirror/address-book.json"
//!
//! [balance]
//! only_if_empty = true
//! ```
//!
//! # Environment Overrides
//!
//! - `MIRROR_NETWORK`
//! - `MIRROR_DATABASE_PATH`
//! - `MIRROR_STORAGE_KIND`, `MIRROR_STORAGE_PATH`, `MIRROR_STORAGE_BASE_URL`
//! - `MIRROR_ADDRESS_BOOK_PATH`
//! - `MIRROR_RECORD_ENABLED`, `MIRROR_BALANCE_ENABLED`
//! - `MIRROR_RECONCILIATION_ENABLED`
//! - `MIRROR_LOG_LEVEL`, `MIRROR_LOG_FORMAT`

use std::path::{Path, PathBuf};
use std::time::Duration;

use mirror_common::{CommonProperties, NetworkKind};
use mirror_db::{NotifierConfig, PartitionConfig};
use mirror_downloader::{ConsensusMode, ConsensusPolicy, DownloaderConfig, HttpProviderConfig};
use mirror_parser::ParserProperties;
use mirror_streams::StreamType;
use serde::{Deserialize, Serialize};

use crate::logging::{self, LogConfig, LogFormat};

/// Complete node configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MirrorConfig {
    #[serde(default)]
    pub common: CommonProperties,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub address_book: AddressBookConfig,

    #[serde(default)]
    pub consensus: ConsensusPolicy,

    #[serde(default = "StreamConfig::record")]
    pub record: StreamConfig,

    #[serde(default = "StreamConfig::balance")]
    pub balance: StreamConfig,

    #[serde(default)]
    pub parser: ParserProperties,

    #[serde(default)]
    pub notify: NotifierConfig,

    #[serde(default)]
    pub partition: PartitionConfig,

    #[serde(default)]
    pub reconciliation: ReconciliationConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            common: CommonProperties::default(),
            database: DatabaseConfig::default(),
            storage: StorageConfig::default(),
            address_book: AddressBookConfig::default(),
            consensus: ConsensusPolicy::default(),
            record: StreamConfig::record(),
            balance: StreamConfig::balance(),
            parser: ParserProperties::default(),
            notify: NotifierConfig::default(),
            partition: PartitionConfig::default(),
            reconciliation: ReconciliationConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            pool_size: default_pool_size(),
        }
    }
}

/// Storage backend kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    /// A directory laid out like the bucket.
    #[default]
    Local,
    /// An S3-compatible bucket over HTTP.
    Http,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub kind: StorageKind,

    /// Root directory for `local` storage.
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,

    /// Bucket URL for `http` storage.
    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Attempts per request on transient errors.
    #[serde(default = "default_request_retries")]
    pub retries: u32,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            kind: StorageKind::Local,
            path: default_storage_path(),
            base_url: None,
            request_timeout_secs: default_request_timeout_secs(),
            retries: default_request_retries(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

impl StorageConfig {
    /// HTTP provider settings; `None` unless `kind` is `http` with a URL.
    pub fn http_provider_config(&self) -> Option<HttpProviderConfig> {
        if self.kind != StorageKind::Http {
            return None;
        }
        let base_url = self.base_url.as_ref()?;
        Some(HttpProviderConfig {
            timeout: Duration::from_secs(self.request_timeout_secs),
            retries: self.retries,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
            ..HttpProviderConfig::new(base_url.clone())
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressBookConfig {
    /// JSON roster of the consensus nodes.
    #[serde(default = "default_address_book_path")]
    pub path: PathBuf,

    /// How often the roster file is reloaded; zero disables reloading.
    #[serde(default = "default_address_book_refresh_secs")]
    pub refresh_interval_secs: u64,
}

impl Default for AddressBookConfig {
    fn default() -> Self {
        Self {
            path: default_address_book_path(),
            refresh_interval_secs: default_address_book_refresh_secs(),
        }
    }
}

/// Downloader and scheduler settings of one stream type.
///
/// An absent `[balance]` section takes [`StreamConfig::balance`]; fields left
/// out of a present section take the record defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Delay between the end of one tick and the start of the next.
    #[serde(default = "default_frequency_ms")]
    pub frequency_ms: u64,

    /// A tick running longer than this is abandoned.
    #[serde(default = "default_processing_timeout_secs")]
    pub processing_timeout_secs: u64,

    /// Intervals processed per tick.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_node_timeout_ms")]
    pub node_timeout_ms: u64,

    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Keep the raw file bytes in the database.
    #[serde(default)]
    pub persist_bytes: bool,

    #[serde(default = "default_true")]
    pub sidecars_enabled: bool,

    /// Only ingest while nothing of this stream type is stored.
    #[serde(default)]
    pub only_if_empty: bool,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self::record()
    }
}

impl StreamConfig {
    pub fn record() -> Self {
        Self {
            enabled: true,
            frequency_ms: default_frequency_ms(),
            processing_timeout_secs: default_processing_timeout_secs(),
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            node_timeout_ms: default_node_timeout_ms(),
            max_concurrency: default_max_concurrency(),
            persist_bytes: false,
            sidecars_enabled: true,
            only_if_empty: false,
        }
    }

    /// Balance snapshots are published every few minutes and carry no
    /// sidecars.
    pub fn balance() -> Self {
        Self {
            frequency_ms: 30_000,
            batch_size: 10,
            sidecars_enabled: false,
            ..Self::record()
        }
    }

    pub fn frequency(&self) -> Duration {
        Duration::from_millis(self.frequency_ms)
    }

    pub fn processing_timeout(&self) -> Duration {
        Duration::from_secs(self.processing_timeout_secs)
    }

    pub fn downloader_config(&self, consensus: ConsensusPolicy) -> DownloaderConfig {
        DownloaderConfig {
            enabled: self.enabled,
            batch_size: self.batch_size,
            max_retries: self.max_retries,
            node_timeout: Duration::from_millis(self.node_timeout_ms),
            max_concurrency: self.max_concurrency,
            persist_bytes: self.persist_bytes,
            sidecars_enabled: self.sidecars_enabled,
            only_if_empty: self.only_if_empty,
            consensus,
        }
    }

    fn validate(&self, name: &str) -> anyhow::Result<()> {
        if self.frequency_ms == 0 {
            anyhow::bail!("{}.frequency_ms must be > 0", name);
        }
        if self.processing_timeout_secs == 0 {
            anyhow::bail!("{}.processing_timeout_secs must be > 0", name);
        }
        if self.batch_size == 0 {
            anyhow::bail!("{}.batch_size must be > 0", name);
        }
        if self.node_timeout_ms == 0 {
            anyhow::bail!("{}.node_timeout_ms must be > 0", name);
        }
        if self.max_concurrency == 0 {
            anyhow::bail!("{}.max_concurrency must be > 0", name);
        }
        if self.node_timeout_ms / 1000 > self.processing_timeout_secs {
            tracing::warn!(
                stream = name,
                node_timeout_ms = self.node_timeout_ms,
                processing_timeout_secs = self.processing_timeout_secs,
                "Node timeout exceeds the processing timeout"
            );
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_reconciliation_frequency_secs")]
    pub frequency_secs: u64,

    /// Snapshot pairs checked per run.
    #[serde(default = "default_reconciliation_batch")]
    pub max_files_per_run: usize,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            frequency_secs: default_reconciliation_frequency_secs(),
            max_files_per_run: default_reconciliation_batch(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// trace, debug, info, warn or error.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// text or json.
    #[serde(default = "default_log_format")]
    pub format: String,

    #[serde(default = "default_true")]
    pub colors: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            colors: true,
        }
    }
}

impl LoggingConfig {
    pub fn to_log_config(&self) -> anyhow::Result<LogConfig> {
        let format: LogFormat = self.format.parse()?;
        let mut config = LogConfig::default().with_level(&self.level).with_format(format);
        if format == LogFormat::Text {
            config.ansi_colors = self.colors;
        }
        Ok(config)
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("data/mirror.db")
}

fn default_pool_size() -> u32 {
    mirror_db::DEFAULT_POOL_SIZE
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("data/streams")
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_request_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    500
}

fn default_address_book_path() -> PathBuf {
    PathBuf::from("address-book.json")
}

fn default_address_book_refresh_secs() -> u64 {
    300
}

fn default_frequency_ms() -> u64 {
    500
}

fn default_processing_timeout_secs() -> u64 {
    60
}

fn default_batch_size() -> usize {
    100
}

fn default_max_retries() -> u32 {
    3
}

fn default_node_timeout_ms() -> u64 {
    10_000
}

fn default_max_concurrency() -> usize {
    16
}

fn default_reconciliation_frequency_secs() -> u64 {
    3600
}

fn default_reconciliation_batch() -> usize {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_true() -> bool {
    true
}

fn env_flag(name: &str) -> Option<bool> {
    std::env::var(name)
        .ok()
        .and_then(|val| match val.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => Some(true),
            "0" | "false" | "no" => Some(false),
            _ => None,
        })
}

impl MirrorConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("reading {}: {}", path.display(), e))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Loads configuration and applies `MIRROR_*` environment overrides.
    pub fn from_file_with_env(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Applies `MIRROR_*` environment overrides.
    pub fn apply_env_overrides(&mut self) -> anyhow::Result<()> {
        if let Ok(val) = std::env::var("MIRROR_NETWORK") {
            self.common.network = val.parse::<NetworkKind>()?;
        }

        if let Ok(val) = std::env::var("MIRROR_DATABASE_PATH") {
            self.database.path = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var("MIRROR_STORAGE_KIND") {
            self.storage.kind = match val.to_ascii_lowercase().as_str() {
                "local" => StorageKind::Local,
                "http" => StorageKind::Http,
                other => anyhow::bail!("MIRROR_STORAGE_KIND: unknown storage kind {}", other),
            };
        }
        if let Ok(val) = std::env::var("MIRROR_STORAGE_PATH") {
            self.storage.path = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("MIRROR_STORAGE_BASE_URL") {
            self.storage.base_url = Some(val);
        }

        if let Ok(val) = std::env::var("MIRROR_ADDRESS_BOOK_PATH") {
            self.address_book.path = PathBuf::from(val);
        }

        if let Some(enabled) = env_flag("MIRROR_RECORD_ENABLED") {
            self.record.enabled = enabled;
        }
        if let Some(enabled) = env_flag("MIRROR_BALANCE_ENABLED") {
            self.balance.enabled = enabled;
        }
        if let Some(enabled) = env_flag("MIRROR_RECONCILIATION_ENABLED") {
            self.reconciliation.enabled = enabled;
        }

        if let Ok(val) = std::env::var("MIRROR_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = std::env::var("MIRROR_LOG_FORMAT") {
            self.logging.format = val;
        }
        Ok(())
    }

    /// Checks the configuration for consistency.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.common.validate()?;

        if self.database.pool_size == 0 {
            anyhow::bail!("database.pool_size must be > 0");
        }

        match self.storage.kind {
            StorageKind::Local => {
                if self.storage.path.as_os_str().is_empty() {
                    anyhow::bail!("storage.path must be set for local storage");
                }
            }
            StorageKind::Http => {
                let Some(url) = self.storage.base_url.as_deref() else {
                    anyhow::bail!("storage.base_url must be set for http storage");
                };
                if !url.starts_with("http://") && !url.starts_with("https://") {
                    anyhow::bail!("storage.base_url must be an http(s) URL, got {}", url);
                }
                if self.storage.request_timeout_secs == 0 {
                    anyhow::bail!("storage.request_timeout_secs must be > 0");
                }
            }
        }

        self.consensus
            .validate()
            .map_err(|e| anyhow::anyhow!("consensus: {}", e))?;
        if self.consensus.mode == ConsensusMode::SingleNode
            && !self.common.network.allows_single_node()
        {
            anyhow::bail!(
                "consensus.mode = single_node is not allowed on {}",
                self.common.network
            );
        }

        self.record.validate("record")?;
        self.balance.validate("balance")?;

        self.partition
            .validate()
            .map_err(|e| anyhow::anyhow!("partition: {}", e))?;

        if self.notify.enabled && self.notify.max_payload_bytes == 0 {
            anyhow::bail!("notify.max_payload_bytes must be > 0");
        }

        if self.reconciliation.enabled {
            if self.reconciliation.frequency_secs == 0 {
                anyhow::bail!("reconciliation.frequency_secs must be > 0");
            }
            if self.reconciliation.max_files_per_run == 0 {
                anyhow::bail!("reconciliation.max_files_per_run must be > 0");
            }
            if !self.parser.persist_crypto_transfers {
                tracing::warn!(
                    "Reconciliation is enabled but crypto transfers are not persisted; \
                     every check will fail"
                );
            }
        }

        if logging::parse_level(&self.logging.level).is_none() {
            anyhow::bail!("logging.level: unknown level {}", self.logging.level);
        }
        self.logging.format.parse::<LogFormat>()?;

        Ok(())
    }

    /// Downloader settings for a stream type.
    pub fn downloader_config(&self, stream_type: StreamType) -> DownloaderConfig {
        self.stream(stream_type).downloader_config(self.consensus)
    }

    pub fn stream(&self, stream_type: StreamType) -> &StreamConfig {
        match stream_type {
            StreamType::Record => &self.record,
            StreamType::Balance => &self.balance,
        }
    }

    /// Sample configuration with every default spelled out.
    pub fn sample_config() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mirror_downloader::Threshold;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = MirrorConfig::from_toml("").unwrap();
        assert_eq!(config, MirrorConfig::default());
        assert_eq!(config.common.network, NetworkKind::Testnet);
        assert_eq!(config.balance.frequency_ms, 30_000);
        assert!(!config.balance.sidecars_enabled);
        config.validate().unwrap();
    }

    #[test]
    fn test_parse_sections() {
        let config = MirrorConfig::from_toml(
            r#"
            [common]
            network = "mainnet"

            [database]
            path = "/tmp/mirror.db"

            [storage]
            kind = "http"
            base_url = "https://bucket.example.com"

            [consensus]
            mode = "equal_weight"
            threshold = { numerator = 1, denominator = 2 }

            [record]
            batch_size = 5

            [balance]
            enabled = false

            [notify]
            max_payload_bytes = 4000
            "#,
        )
        .unwrap();
        config.validate().unwrap();

        assert_eq!(config.common.network, NetworkKind::Mainnet);
        assert_eq!(config.database.path, PathBuf::from("/tmp/mirror.db"));
        assert_eq!(config.consensus.mode, ConsensusMode::EqualWeight);
        assert_eq!(config.consensus.threshold, Threshold::ONE_HALF);
        assert_eq!(config.notify.max_payload_bytes, 4000);
        assert!(config.notify.enabled);

        let record = config.downloader_config(StreamType::Record);
        assert_eq!(record.batch_size, 5);
        assert_eq!(record.consensus.mode, ConsensusMode::EqualWeight);
        assert!(!config.downloader_config(StreamType::Balance).enabled);

        let http = config.storage.http_provider_config().unwrap();
        assert_eq!(http.base_url, "https://bucket.example.com");
        assert_eq!(http.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_validation_failures() {
        let mut config = MirrorConfig::default();
        config.storage.kind = StorageKind::Http;
        assert!(config.validate().is_err());
        config.storage.base_url = Some("ftp://bucket".into());
        assert!(config.validate().is_err());

        let mut config = MirrorConfig::default();
        config.consensus.threshold = Threshold {
            numerator: 3,
            denominator: 3,
        };
        assert!(config.validate().is_err());

        let mut config = MirrorConfig::default();
        config.record.batch_size = 0;
        assert!(config.validate().is_err());

        let mut config = MirrorConfig::default();
        config.logging.level = "loud".into();
        assert!(config.validate().is_err());

        let mut config = MirrorConfig::default();
        config.partition.interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_single_node_only_on_private_networks() {
        let mut config = MirrorConfig::default();
        config.consensus.mode = ConsensusMode::SingleNode;
        assert!(config.validate().is_err());
        config.common.network = NetworkKind::Demo;
        config.validate().unwrap();
    }

    #[test]
    fn test_sample_config_round_trips() {
        let sample = MirrorConfig::sample_config();
        assert!(sample.contains("[database]"));
        let parsed = MirrorConfig::from_toml(&sample).unwrap();
        assert_eq!(parsed, MirrorConfig::default());
    }

    #[test]
    fn test_logging_conversion() {
        let logging = LoggingConfig {
            level: "debug".into(),
            format: "json".into(),
            colors: true,
        };
        let log = logging.to_log_config().unwrap();
        assert_eq!(log.level, tracing::Level::DEBUG);
        assert_eq!(log.format, LogFormat::Json);
        assert!(!log.ansi_colors);
    }
}
