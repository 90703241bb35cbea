use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};

use nestlog_shared::constants::{
    ACCESS_KEY_HEADER, DEFAULT_API_BASE, DEFAULT_HTTP_TIMEOUT_SECS,
};
use nestlog_shared::{RoomInfo, SyncSnapshot};

use crate::error::RemoteError;

/// Result of reading a room. A missing document is an outcome, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Found(SyncSnapshot),
    NotFound,
}

/// Create/read/update of one JSON document by opaque id.
#[async_trait]
pub trait RemoteDocumentClient: Send + Sync {
    /// Create a room holding `initial`. Credential and quota rejections are
    /// returned as-is; nothing here retries.
    async fn create(&self, initial: &SyncSnapshot) -> Result<RoomInfo, RemoteError>;

    async fn fetch(&self, document_id: &str) -> Result<FetchOutcome, RemoteError>;

    /// Overwrite the room unconditionally.
    async fn update(&self, document_id: &str, snapshot: &SyncSnapshot) -> Result<(), RemoteError>;
}

#[derive(Debug, Clone)]
pub struct JsonBinConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl Default for JsonBinConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE.to_string(),
            api_key: None,
            timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug, Deserialize)]
struct BinMetadata {
    id: String,
}

#[derive(Debug, Deserialize)]
struct CreateResponse {
    metadata: BinMetadata,
}

#[derive(Debug, Deserialize)]
struct ReadResponse {
    record: SyncSnapshot,
}

/// JSONBin v3 binding.
#[derive(Debug, Clone)]
pub struct JsonBinClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl JsonBinClient {
    pub fn new(config: JsonBinConfig) -> Result<Self, RemoteError> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.filter(|key| !key.trim().is_empty()),
        })
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.header(ACCESS_KEY_HEADER, key),
            None => request,
        }
    }
}

/// Map a non-success status to the error taxonomy. 404 only becomes
/// `NotFound` here; reads intercept it earlier as `FetchOutcome::NotFound`.
async fn status_error(response: Response, document_id: &str) -> RemoteError {
    let status = response.status();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RemoteError::Auth {
            status: status.as_u16(),
        },
        StatusCode::PAYMENT_REQUIRED | StatusCode::TOO_MANY_REQUESTS => RemoteError::Quota {
            status: status.as_u16(),
        },
        StatusCode::NOT_FOUND => RemoteError::NotFound(document_id.to_string()),
        _ => {
            let message = response
                .text()
                .await
                .unwrap_or_default()
                .chars()
                .take(200)
                .collect::<String>();
            RemoteError::Status {
                status: status.as_u16(),
                message,
            }
        }
    }
}

#[async_trait]
impl RemoteDocumentClient for JsonBinClient {
    async fn create(&self, initial: &SyncSnapshot) -> Result<RoomInfo, RemoteError> {
        let request = self.http.post(self.url("/b")).json(initial);
        let response = self.authorize(request).send().await?;

        if !response.status().is_success() {
            let err = status_error(response, "").await;
            warn!(error = %err, "room creation rejected");
            return Err(err);
        }

        let body: CreateResponse = response
            .json()
            .await
            .map_err(|e| RemoteError::Decode(e.to_string()))?;

        let room = RoomInfo::new(body.metadata.id);
        debug!(room = %room.document_id, code = %room.human_code, "room created");
        Ok(room)
    }

    async fn fetch(&self, document_id: &str) -> Result<FetchOutcome, RemoteError> {
        let request = self.http.get(self.url(&format!("/b/{document_id}/latest")));
        let response = self.authorize(request).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!(room = %document_id, "room not found");
            return Ok(FetchOutcome::NotFound);
        }
        if !response.status().is_success() {
            return Err(status_error(response, document_id).await);
        }

        let body: ReadResponse = response
            .json()
            .await
            .map_err(|e| RemoteError::Decode(e.to_string()))?;

        Ok(FetchOutcome::Found(body.record))
    }

    async fn update(&self, document_id: &str, snapshot: &SyncSnapshot) -> Result<(), RemoteError> {
        let request = self
            .http
            .put(self.url(&format!("/b/{document_id}")))
            .json(snapshot);
        let response = self.authorize(request).send().await?;

        if !response.status().is_success() {
            return Err(status_error(response, document_id).await);
        }

        debug!(room = %document_id, entries = snapshot.entries.len(), "room updated");
        Ok(())
    }
}
