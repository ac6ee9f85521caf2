//! Backend property client, listing file loading and hash-addressed snapshot
//! storage for Rentverse.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rentverse_core::{ApiEnvelope, PropertyRecord};
use reqwest::StatusCode;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

pub const CRATE_NAME: &str = "rentverse-storage";

/// Where a listing snapshot landed and whether an identical one was already there.
#[derive(Debug, Clone)]
pub struct StoredSnapshot {
    pub content_hash: String,
    pub path: PathBuf,
    pub record_count: usize,
    pub reused: bool,
}

/// Immutable on-disk copies of fetched listings under
/// `<root>/<YYYYmmdd_HHMMSS>/<source>/<sha256>.json`.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    root: PathBuf,
}

impl SnapshotStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn sha256_hex(bytes: &[u8]) -> String {
        hex::encode(Sha256::digest(bytes))
    }

    pub fn snapshot_path(
        &self,
        fetched_at: DateTime<Utc>,
        source_id: &str,
        content_hash: &str,
    ) -> PathBuf {
        self.root
            .join(fetched_at.format("%Y%m%d_%H%M%S").to_string())
            .join(source_id)
            .join(format!("{content_hash}.json"))
    }

    /// Write `records` as a pretty JSON array. A listing whose bytes already
    /// exist at the hash path for this fetch time is not written again.
    pub async fn store_listing(
        &self,
        fetched_at: DateTime<Utc>,
        source_id: &str,
        records: &[PropertyRecord],
    ) -> anyhow::Result<StoredSnapshot> {
        let json = serde_json::to_vec_pretty(records).context("serializing property snapshot")?;
        let content_hash = Self::sha256_hex(&json);
        let path = self.snapshot_path(fetched_at, source_id, &content_hash);

        let reused = if fs::try_exists(&path)
            .await
            .with_context(|| format!("checking snapshot {}", path.display()))?
        {
            true
        } else {
            !publish_snapshot(&path, &json).await?
        };

        if reused {
            debug!(path = %path.display(), "listing snapshot unchanged");
        } else {
            info!(path = %path.display(), records = records.len(), "stored property snapshot");
        }
        Ok(StoredSnapshot {
            content_hash,
            path,
            record_count: records.len(),
            reused,
        })
    }

    /// Newest stored snapshot for `source_id`, judged by the timestamp directory.
    pub async fn latest_snapshot(&self, source_id: &str) -> anyhow::Result<Option<PathBuf>> {
        if !fs::try_exists(&self.root).await.unwrap_or(false) {
            return Ok(None);
        }
        let mut stamps = Vec::new();
        let mut entries = fs::read_dir(&self.root)
            .await
            .with_context(|| format!("listing snapshot root {}", self.root.display()))?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                stamps.push(entry.path());
            }
        }
        stamps.sort();

        for stamp in stamps.into_iter().rev() {
            let source_dir = stamp.join(source_id);
            if !fs::try_exists(&source_dir).await.unwrap_or(false) {
                continue;
            }
            let mut files = Vec::new();
            let mut entries = fs::read_dir(&source_dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if path.extension().is_some_and(|ext| ext == "json") {
                    files.push(path);
                }
            }
            files.sort();
            if let Some(path) = files.pop() {
                return Ok(Some(path));
            }
        }
        Ok(None)
    }
}

/// Stage `json` next to `path` and rename it into place. Returns `false` when
/// another writer published the same snapshot first.
async fn publish_snapshot(path: &Path, json: &[u8]) -> anyhow::Result<bool> {
    let dir = path.parent().context("snapshot path has no directory")?;
    fs::create_dir_all(dir)
        .await
        .with_context(|| format!("creating snapshot directory {}", dir.display()))?;

    let staged = dir.join(format!(".{}.partial", Uuid::new_v4()));
    fs::write(&staged, json)
        .await
        .with_context(|| format!("writing staged snapshot {}", staged.display()))?;

    match fs::rename(&staged, path).await {
        Ok(()) => Ok(true),
        Err(err) => {
            let _ = fs::remove_file(&staged).await;
            if err.kind() == std::io::ErrorKind::AlreadyExists {
                Ok(false)
            } else {
                Err(err).with_context(|| format!("publishing snapshot {}", path.display()))
            }
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ListingPayload {
    Bare(Vec<PropertyRecord>),
    Envelope(ApiEnvelope<Vec<PropertyRecord>>),
}

/// Decode a listing body that is either a bare array or a backend envelope.
pub fn decode_listing(bytes: &[u8]) -> Result<Vec<PropertyRecord>, FetchError> {
    match serde_json::from_slice::<ListingPayload>(bytes) {
        Ok(ListingPayload::Bare(records)) => Ok(records),
        Ok(ListingPayload::Envelope(envelope)) => envelope.into_result().map_err(FetchError::Rejected),
        Err(err) => Err(FetchError::Decode(err)),
    }
}

pub async fn load_listing_file(path: impl AsRef<Path>) -> Result<Vec<PropertyRecord>, FetchError> {
    let path = path.as_ref();
    let bytes = fs::read(path).await.map_err(|source| FetchError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    decode_listing(&bytes)
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("http status {status} for {url}")]
    HttpStatus {
        status: u16,
        url: String,
        message: Option<String>,
    },
    #[error("{0}")]
    Rejected(String),
    #[error("decoding property listing: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("no bearer token configured for {0} listings")]
    MissingToken(&'static str),
}

impl FetchError {
    /// Text suitable for the "could not load properties" state.
    pub fn user_message(&self) -> String {
        match self {
            FetchError::HttpStatus {
                message: Some(message),
                ..
            } => message.clone(),
            FetchError::Rejected(message) => message.clone(),
            other => other.to_string(),
        }
    }
}

/// Which backend listing endpoint to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingSource {
    Guest,
    Tenant,
}

impl ListingSource {
    pub fn id(self) -> &'static str {
        match self {
            ListingSource::Guest => "guest",
            ListingSource::Tenant => "tenant",
        }
    }

    pub fn path(self) -> &'static str {
        match self {
            ListingSource::Guest => "properties",
            ListingSource::Tenant => "tenant/properties",
        }
    }

    pub fn requires_token(self) -> bool {
        matches!(self, ListingSource::Tenant)
    }
}

impl std::str::FromStr for ListingSource {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "guest" => Ok(ListingSource::Guest),
            "tenant" => Ok(ListingSource::Tenant),
            other => anyhow::bail!("unknown listing source `{other}` (expected guest or tenant)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub user_agent: Option<String>,
    pub bearer_token: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000/api".to_string(),
            timeout: Duration::from_secs(10),
            user_agent: None,
            bearer_token: None,
        }
    }
}

/// Thin REST client for the listing endpoints. One request per call; retries
/// are user-initiated.
#[derive(Debug, Clone)]
pub struct PropertyClient {
    client: reqwest::Client,
    base_url: String,
    bearer_token: Option<String>,
}

impl PropertyClient {
    pub fn new(config: ClientConfig) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder()
            .gzip(true)
            .brotli(true)
            .timeout(config.timeout);

        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }

        let client = builder.build().context("building reqwest client")?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            bearer_token: config.bearer_token.filter(|t| !t.trim().is_empty()),
        })
    }

    pub fn listing_url(&self, source: ListingSource) -> String {
        format!("{}/{}", self.base_url, source.path())
    }

    pub async fn fetch_properties(&self, source: ListingSource) -> Result<Vec<PropertyRecord>, FetchError> {
        let url = self.listing_url(source);
        let span = info_span!("property_fetch", source = source.id(), %url);
        self.fetch_listing(source, url).instrument(span).await
    }

    async fn fetch_listing(&self, source: ListingSource, url: String) -> Result<Vec<PropertyRecord>, FetchError> {
        let mut request = self.client.get(&url);
        match (&self.bearer_token, source.requires_token()) {
            (Some(token), _) => request = request.bearer_auth(token),
            (None, true) => return Err(FetchError::MissingToken(source.id())),
            (None, false) => {}
        }

        let resp = request.send().await?;
        let status = resp.status();
        let final_url = resp.url().to_string();
        let body = resp.bytes().await?;

        if !status.is_success() {
            let message = serde_json::from_slice::<ApiEnvelope<serde_json::Value>>(&body)
                .ok()
                .and_then(|env| env.message);
            warn!(status = status.as_u16(), ?message, "property listing request failed");
            return Err(FetchError::HttpStatus {
                status: status.as_u16(),
                url: final_url,
                message: message.or_else(|| status_reason(status)),
            });
        }

        let records = decode_listing(&body)?;
        info!(count = records.len(), "fetched property listing");
        Ok(records)
    }
}

fn status_reason(status: StatusCode) -> Option<String> {
    match status {
        StatusCode::UNAUTHORIZED => Some("Unauthorized, please log in again".to_string()),
        StatusCode::FORBIDDEN => Some("Forbidden".to_string()),
        _ => None,
    }
}

/// Where a listing view gets its raw collection from.
#[async_trait]
pub trait PropertySource: Send + Sync {
    fn source_id(&self) -> &str;

    async fn list_properties(&self) -> Result<Vec<PropertyRecord>, FetchError>;
}

pub struct HttpPropertySource {
    client: PropertyClient,
    source: ListingSource,
}

impl HttpPropertySource {
    pub fn new(client: PropertyClient, source: ListingSource) -> Self {
        Self { client, source }
    }
}

#[async_trait]
impl PropertySource for HttpPropertySource {
    fn source_id(&self) -> &str {
        self.source.id()
    }

    async fn list_properties(&self) -> Result<Vec<PropertyRecord>, FetchError> {
        self.client.fetch_properties(self.source).await
    }
}

/// Listing read from a local JSON file (a snapshot or a saved API response).
pub struct FilePropertySource {
    path: PathBuf,
}

impl FilePropertySource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl PropertySource for FilePropertySource {
    fn source_id(&self) -> &str {
        "file"
    }

    async fn list_properties(&self) -> Result<Vec<PropertyRecord>, FetchError> {
        load_listing_file(&self.path).await
    }
}
