use std::sync::{
    atomic::{AtomicU64, Ordering},
    Mutex,
};

use anyhow::Result;
use reqwest::{blocking::Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use serde_with::{serde_as, DefaultOnNull};
use thiserror::Error;

use crate::{
    config::RpcConfig,
    model::{FileStat, RawRecord, TorrentId, TrackerStat},
    poller::{PollError, SnapshotSource},
};

#[derive(Debug, Error)]
pub enum TransmissionError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("authentication failed")]
    Authentication,
    #[error("session negotiation failed")]
    Session,
    #[error("unexpected http status {0}")]
    HttpStatus(StatusCode),
    #[error("rpc error: {0}")]
    Rpc(String),
    #[error("response parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

pub type RpcResult<T> = std::result::Result<T, TransmissionError>;

impl From<TransmissionError> for PollError {
    fn from(err: TransmissionError) -> Self {
        match err {
            TransmissionError::Http(inner) if inner.is_timeout() => PollError::Timeout,
            TransmissionError::Http(inner) if inner.is_decode() => {
                PollError::MalformedResponse(inner.to_string())
            }
            TransmissionError::Http(inner) => PollError::Unreachable(inner.to_string()),
            TransmissionError::Rpc(result) => {
                PollError::MalformedResponse(format!("daemon replied '{result}'"))
            }
            TransmissionError::Parse(inner) => PollError::MalformedResponse(inner.to_string()),
            other @ (TransmissionError::Authentication
            | TransmissionError::Session
            | TransmissionError::HttpStatus(_)) => PollError::Unreachable(other.to_string()),
        }
    }
}

// camelCase names are understood by every daemon version; 4.x replies in
// whatever spelling was requested, and the wire structs accept both.
const TORRENT_FIELDS: &[&str] = &[
    "id",
    "name",
    "status",
    "error",
    "errorString",
    "sizeWhenDone",
    "leftUntilDone",
    "downloadedEver",
    "uploadedEver",
    "haveValid",
    "corruptEver",
    "pieceCount",
    "pieceSize",
    "rateDownload",
    "rateUpload",
    "peersConnected",
    "percentDone",
    "downloadDir",
    "hashString",
    "trackerStats",
    "files",
];

pub struct TransmissionClient {
    http: Client,
    endpoint: String,
    auth: Option<(String, Option<String>)>,
    session_id: Mutex<Option<String>>,
    counter: AtomicU64,
}

impl TransmissionClient {
    pub fn new(config: RpcConfig) -> Result<Self> {
        let endpoint = config.endpoint();
        let RpcConfig {
            username,
            password,
            timeout,
            verify_ssl,
            user_agent,
            ..
        } = config;
        let mut builder = Client::builder().timeout(timeout).user_agent(user_agent);
        if !verify_ssl {
            builder = builder.danger_accept_invalid_certs(true);
        }
        let http = builder.build()?;
        let auth = username.map(|user| (user, password));
        Ok(Self {
            http,
            endpoint,
            auth,
            session_id: Mutex::new(None),
            counter: AtomicU64::new(1),
        })
    }

    pub fn daemon_version(&self) -> RpcResult<String> {
        let session: SessionInfo = self.call("session-get", Some(json!({"fields": ["version"]})))?;
        Ok(session.version.unwrap_or_else(|| "unknown".to_string()))
    }

    /// Fetches every torrent. A single undecodable record fails the whole
    /// batch so callers never see a partial snapshot.
    pub fn fetch_records(&self) -> RpcResult<Vec<RawRecord>> {
        let value = self.call_raw("torrent-get", Some(json!({ "fields": TORRENT_FIELDS })))?;
        records_from_arguments(value)
    }

    fn call<T>(&self, method: &str, arguments: Option<Value>) -> RpcResult<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        let value = self.call_raw(method, arguments)?;
        serde_json::from_value(value).map_err(TransmissionError::from)
    }

    fn call_raw(&self, method: &str, arguments: Option<Value>) -> RpcResult<Value> {
        let payload = RpcRequest {
            method,
            arguments,
            tag: self.counter.fetch_add(1, Ordering::Relaxed),
        };
        let mut renegotiated = false;
        loop {
            let mut request = self
                .http
                .post(&self.endpoint)
                .header("Content-Type", "application/json")
                .json(&payload);
            if let Some((user, pass)) = &self.auth {
                request = request.basic_auth(user, pass.as_ref());
            }
            let session_header = match self.session_id.lock() {
                Ok(guard) => (*guard).clone(),
                Err(_) => None,
            };
            if let Some(session) = session_header {
                request = request.header("X-Transmission-Session-Id", session);
            }
            let response = request.send()?;
            match response.status() {
                StatusCode::CONFLICT if !renegotiated => {
                    let id = response
                        .headers()
                        .get("X-Transmission-Session-Id")
                        .ok_or(TransmissionError::Session)?;
                    let value = id
                        .to_str()
                        .map_err(|_| TransmissionError::Session)?
                        .to_string();
                    if let Ok(mut guard) = self.session_id.lock() {
                        *guard = Some(value);
                    }
                    renegotiated = true;
                }
                StatusCode::CONFLICT => return Err(TransmissionError::Session),
                StatusCode::UNAUTHORIZED => return Err(TransmissionError::Authentication),
                status if !status.is_success() => {
                    return Err(TransmissionError::HttpStatus(status));
                }
                _ => {
                    let body: RpcResponse = response.json()?;
                    if body.result != "success" {
                        return Err(TransmissionError::Rpc(body.result));
                    }
                    return Ok(body.arguments.unwrap_or(Value::Null));
                }
            }
        }
    }
}

impl SnapshotSource for TransmissionClient {
    fn poll(&self) -> Result<Vec<RawRecord>, PollError> {
        self.fetch_records().map_err(PollError::from)
    }
}

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    arguments: Option<Value>,
    tag: u64,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    arguments: Option<Value>,
    result: String,
}

#[derive(Debug, Deserialize)]
struct SessionInfo {
    version: Option<String>,
}

#[serde_as]
#[derive(Debug, Deserialize)]
struct TorrentWire {
    id: i64,
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    name: String,
    #[serde(default)]
    status: i64,
    #[serde(default)]
    error: i64,
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default, alias = "errorString")]
    error_string: String,
    #[serde(default, alias = "sizeWhenDone")]
    size_when_done: i64,
    #[serde(default, alias = "leftUntilDone")]
    left_until_done: i64,
    #[serde(default, alias = "downloadedEver")]
    downloaded_ever: i64,
    #[serde(default, alias = "uploadedEver")]
    uploaded_ever: i64,
    #[serde(default, alias = "haveValid")]
    have_valid: i64,
    #[serde(default, alias = "corruptEver")]
    corrupt_ever: i64,
    #[serde(default, alias = "pieceCount")]
    piece_count: i64,
    #[serde(default, alias = "pieceSize")]
    piece_size: i64,
    #[serde(default, alias = "rateDownload")]
    rate_download: i64,
    #[serde(default, alias = "rateUpload")]
    rate_upload: i64,
    #[serde(default, alias = "peersConnected")]
    peers_connected: i64,
    #[serde(default, alias = "percentDone")]
    percent_done: f64,
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default, alias = "downloadDir")]
    download_dir: String,
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default, alias = "hashString")]
    hash_string: String,
    #[serde(default, alias = "trackerStats")]
    tracker_stats: Option<Vec<TrackerWire>>,
    #[serde(default)]
    files: Option<Vec<FileWire>>,
}

#[serde_as]
#[derive(Debug, Deserialize)]
struct FileWire {
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    name: String,
    #[serde(default)]
    length: i64,
    #[serde(default, alias = "bytesCompleted")]
    bytes_completed: i64,
}

#[serde_as]
#[derive(Debug, Deserialize)]
struct TrackerWire {
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    host: String,
    #[serde(default)]
    tier: i64,
    #[serde(default = "unknown_count", alias = "seederCount")]
    seeder_count: i64,
    #[serde(default = "unknown_count", alias = "leecherCount")]
    leecher_count: i64,
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default, alias = "lastAnnounceResult")]
    last_announce_result: String,
}

fn unknown_count() -> i64 {
    -1
}

fn non_negative(value: i64) -> u64 {
    value.max(0) as u64
}

/// Decodes the `torrents` list of a `torrent-get` reply, all or nothing.
fn records_from_arguments(mut arguments: Value) -> RpcResult<Vec<RawRecord>> {
    match arguments.get_mut("torrents").map(Value::take) {
        Some(Value::Array(list)) => list.into_iter().map(parse_record).collect(),
        Some(_) => Err(TransmissionError::Rpc("torrents is not a list".to_string())),
        None => Ok(Vec::new()),
    }
}

fn parse_record(raw: Value) -> RpcResult<RawRecord> {
    let wire: TorrentWire = serde_json::from_value(raw.clone())?;
    Ok(RawRecord {
        id: TorrentId(wire.id),
        name: wire.name,
        status_code: wire.status,
        error_code: wire.error,
        error_string: wire.error_string,
        size_bytes: non_negative(wire.size_when_done),
        left_until_done: non_negative(wire.left_until_done),
        downloaded_bytes: non_negative(wire.downloaded_ever),
        uploaded_bytes: non_negative(wire.uploaded_ever),
        have_valid: non_negative(wire.have_valid),
        corrupt_bytes: non_negative(wire.corrupt_ever),
        piece_count: non_negative(wire.piece_count),
        piece_size: non_negative(wire.piece_size),
        download_rate: non_negative(wire.rate_download),
        upload_rate: non_negative(wire.rate_upload),
        peers_connected: non_negative(wire.peers_connected).min(u32::MAX as u64) as u32,
        percent_done: wire.percent_done,
        download_dir: wire.download_dir,
        hash: wire.hash_string,
        trackers: wire.tracker_stats.map(|list| {
            list.into_iter()
                .map(|tracker| TrackerStat {
                    host: tracker.host,
                    tier: tracker.tier,
                    seeders: tracker.seeder_count,
                    leechers: tracker.leecher_count,
                    last_announce_result: tracker.last_announce_result,
                })
                .collect()
        }),
        files: wire.files.map(|list| {
            list.into_iter()
                .map(|file| FileStat {
                    name: file.name,
                    length: non_negative(file.length),
                    bytes_completed: non_negative(file.bytes_completed),
                })
                .collect()
        }),
        raw,
    })
}
