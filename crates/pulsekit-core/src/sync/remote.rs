//! Remote document store seam.
//!
//! The engine only needs "create one document in a flat collection". The
//! HTTP implementation POSTs the projected document as JSON to
//! `{endpoint}/{collection}`; anything other than a 2xx leaves the event
//! queued for the next pass.

use async_trait::async_trait;
use url::Url;

use super::types::SyncError;
use crate::events::RemoteDocument;
use crate::storage::SyncConfig;

#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Create one document in `collection`.
    async fn create_document(
        &self,
        collection: &str,
        document: &RemoteDocument,
    ) -> Result<(), SyncError>;

    /// Whether the store has what it needs to accept documents.
    fn is_configured(&self) -> bool {
        true
    }
}

/// Document store reached over HTTP.
pub struct HttpRemoteStore {
    client: reqwest::Client,
    base_url: Option<Url>,
    api_key: Option<String>,
}

impl HttpRemoteStore {
    /// Build a store for `endpoint`. An empty endpoint yields an
    /// unconfigured store that rejects every upload.
    pub fn new(endpoint: &str, api_key: &str) -> Result<Self, SyncError> {
        let endpoint = endpoint.trim();
        let base_url = if endpoint.is_empty() {
            None
        } else {
            let url = Url::parse(endpoint)
                .map_err(|e| SyncError::InvalidEndpoint(format!("{endpoint}: {e}")))?;
            if url.cannot_be_a_base() {
                return Err(SyncError::InvalidEndpoint(endpoint.to_string()));
            }
            Some(url)
        };
        let api_key = Some(api_key.trim().to_string()).filter(|k| !k.is_empty());

        Ok(Self {
            client: reqwest::Client::new(),
            base_url,
            api_key,
        })
    }

    pub fn from_config(cfg: &SyncConfig) -> Result<Self, SyncError> {
        Self::new(&cfg.endpoint, &cfg.api_key)
    }

    fn collection_url(&self, collection: &str) -> Result<Url, SyncError> {
        let mut url = self.base_url.clone().ok_or(SyncError::NotConfigured)?;
        url.path_segments_mut()
            .map_err(|_| SyncError::InvalidEndpoint(format!("cannot append {collection}")))?
            .pop_if_empty()
            .push(collection);
        Ok(url)
    }
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    async fn create_document(
        &self,
        collection: &str,
        document: &RemoteDocument,
    ) -> Result<(), SyncError> {
        let url = self.collection_url(collection)?;
        let mut request = self.client.post(url).json(document);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(SyncError::RateLimited);
        }
        let message = response.text().await.unwrap_or_default();
        Err(SyncError::Remote {
            status: status.as_u16(),
            message,
        })
    }

    fn is_configured(&self) -> bool {
        self.base_url.is_some()
    }
}
