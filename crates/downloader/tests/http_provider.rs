//! HTTP provider against an in-process S3-like server.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Router,
};
use mirror_common::{EntityId, Hash384};
use mirror_crypto::NodeSigningKey;
use mirror_downloader::{
    AddressBook, ConsensusNode, Downloader, DownloaderConfig, HttpProviderConfig,
    HttpStreamFileProvider, NodeDirectory, PersistedFile, ProviderError, Result, StreamFileProvider,
    StreamFileSink, StreamGap,
};
use mirror_streams::proto::{TransactionBody, SUCCESS};
use mirror_streams::reader::RecordFileReader;
use mirror_streams::writer::{transaction_record, write_signature, RecordFileWriter};
use mirror_streams::{FileType, StreamFile, StreamFilename, StreamType};
use parking_lot::Mutex;
use tokio::net::TcpListener;

const T0: i64 = 1_650_000_000_000_000_000;

struct Bucket {
    objects: BTreeMap<String, Vec<u8>>,
    flaky_hits: AtomicUsize,
}

type Shared = Arc<Bucket>;

async fn get_object(Path(path): Path<String>, State(bucket): State<Shared>) -> (StatusCode, Vec<u8>) {
    if path == "flaky" {
        return if bucket.flaky_hits.fetch_add(1, Ordering::SeqCst) == 0 {
            (StatusCode::SERVICE_UNAVAILABLE, Vec::new())
        } else {
            (StatusCode::OK, b"recovered".to_vec())
        };
    }
    if path == "forbidden" {
        return (StatusCode::FORBIDDEN, Vec::new());
    }
    match bucket.objects.get(&path) {
        Some(body) => (StatusCode::OK, body.clone()),
        None => (StatusCode::NOT_FOUND, Vec::new()),
    }
}

async fn list_objects(
    Query(params): Query<HashMap<String, String>>,
    State(bucket): State<Shared>,
) -> (StatusCode, String) {
    if params.get("list-type").map(String::as_str) != Some("2") {
        return (StatusCode::BAD_REQUEST, String::new());
    }
    let prefix = params.get("prefix").cloned().unwrap_or_default();
    let start_after = params.get("start-after").cloned().unwrap_or_default();
    let max_keys: usize = params
        .get("max-keys")
        .and_then(|v| v.parse().ok())
        .unwrap_or(1000);

    let mut xml = String::from("<ListBucketResult>");
    for key in bucket
        .objects
        .keys()
        .filter(|k| k.starts_with(&prefix) && k.as_str() > start_after.as_str())
        .take(max_keys)
    {
        xml.push_str(&format!("<Contents><Key>{}</Key></Contents>", key));
    }
    xml.push_str("</ListBucketResult>");
    (StatusCode::OK, xml)
}

/// Starts the server; `None` when binding is not permitted.
async fn serve(objects: BTreeMap<String, Vec<u8>>) -> Option<String> {
    let bucket = Arc::new(Bucket {
        objects,
        flaky_hits: AtomicUsize::new(0),
    });
    let app = Router::new()
        .route("/", get(list_objects))
        .route("/*path", get(get_object))
        .with_state(bucket);

    let listener = match TcpListener::bind("127.0.0.1:0").await {
        Ok(listener) => listener,
        Err(err) if err.kind() == std::io::ErrorKind::PermissionDenied => {
            eprintln!("skipping test: tcp bind not permitted in this environment");
            return None;
        }
        Err(err) => panic!("bind: {err}"),
    };
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    Some(format!("http://{}", addr))
}

fn provider(base_url: &str) -> HttpStreamFileProvider {
    HttpStreamFileProvider::new(HttpProviderConfig {
        retries: 2,
        retry_delay: Duration::from_millis(10),
        ..HttpProviderConfig::new(base_url)
    })
    .expect("provider")
}

fn node(key: &NodeSigningKey) -> ConsensusNode {
    ConsensusNode {
        node_id: 0,
        node_account_id: EntityId::new(0, 0, 3).unwrap(),
        public_key: key.public_key(),
        stake: 1,
        total_stake: 0,
    }
}

fn record_name(ts: i64) -> String {
    StreamFilename::from_timestamp(StreamType::Record, FileType::Data, ts, "rcd", false)
        .unwrap()
        .name()
        .to_string()
}

/// Publishes `count` chained record files for node 0.3.
fn record_objects(key: &NodeSigningKey, count: i64) -> (BTreeMap<String, Vec<u8>>, Vec<Hash384>) {
    let mut objects = BTreeMap::new();
    let mut hashes = Vec::new();
    let mut previous = Hash384::ZERO;
    for i in 0..count {
        let ts = T0 + i * 2_000_000_000;
        let written = RecordFileWriter::new(5)
            .previous_hash(previous)
            .item(&TransactionBody::default(), &transaction_record(ts, SUCCESS))
            .write();
        let signature = write_signature(5, &written.file_hash, written.metadata_hash.as_ref(), key);
        let name = record_name(ts);
        objects.insert(format!("recordstreams/record0.0.3/{}", name), written.bytes);
        objects.insert(format!("recordstreams/record0.0.3/{}_sig", name), signature);
        previous = written.hash;
        hashes.push(written.hash);
    }
    (objects, hashes)
}

#[tokio::test]
async fn test_get_classifies_responses() {
    let mut objects = BTreeMap::new();
    objects.insert("a/b.txt".to_string(), b"hello".to_vec());
    let Some(base_url) = serve(objects).await else {
        return;
    };
    let provider = provider(&base_url);
    let node = node(&NodeSigningKey::from_seed(&[1; 32]));

    assert_eq!(&provider.get(&node, "a/b.txt").await.unwrap()[..], b"hello");
    assert!(matches!(
        provider.get(&node, "a/missing").await,
        Err(ProviderError::NotFound(_))
    ));
    assert!(matches!(
        provider.get(&node, "forbidden").await,
        Err(ProviderError::Permanent(_))
    ));
    // 503 is retried.
    assert_eq!(&provider.get(&node, "flaky").await.unwrap()[..], b"recovered");
}

#[tokio::test]
async fn test_list_after_returns_newer_signatures() {
    let key = NodeSigningKey::from_seed(&[1; 32]);
    let (objects, _) = record_objects(&key, 3);
    let Some(base_url) = serve(objects).await else {
        return;
    };
    let provider = provider(&base_url);
    let node = node(&key);

    let all = provider
        .list_after(&node, StreamType::Record, None, 10)
        .await
        .unwrap();
    assert_eq!(all.len(), 3);
    assert!(all.iter().all(|f| f.file_type() == FileType::Signature));

    let newer = provider
        .list_after(&node, StreamType::Record, Some(&all[0]), 10)
        .await
        .unwrap();
    assert_eq!(newer, all[1..].to_vec());

    let balances = provider
        .list_after(&node, StreamType::Balance, None, 10)
        .await
        .unwrap();
    assert!(balances.is_empty());
}

#[derive(Default)]
struct Sink {
    files: Mutex<Vec<PersistedFile>>,
}

#[async_trait]
impl<F: StreamFile> StreamFileSink<F> for Sink {
    async fn last_persisted(&self) -> Result<Option<PersistedFile>> {
        Ok(self.files.lock().last().cloned())
    }

    async fn on_stream_file(&self, file: F) -> Result<()> {
        self.files.lock().push(PersistedFile::of(&file));
        Ok(())
    }

    async fn on_gap(&self, _gap: StreamGap) -> Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_downloader_over_http() {
    let key = NodeSigningKey::from_seed(&[1; 32]);
    let (objects, hashes) = record_objects(&key, 2);
    let Some(base_url) = serve(objects).await else {
        return;
    };

    let directory = Arc::new(NodeDirectory::new(AddressBook::new(vec![node(&key)]).unwrap()));
    let mut downloader = Downloader::new(
        DownloaderConfig::default(),
        directory,
        Arc::new(provider(&base_url)),
        RecordFileReader,
    );
    let sink = Sink::default();
    let outcome = downloader.tick(&sink).await.unwrap();

    assert_eq!(outcome.processed, 2);
    let persisted: Vec<_> = sink.files.lock().iter().map(|f| f.hash).collect();
    assert_eq!(persisted, hashes);
}
