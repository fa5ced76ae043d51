//! Content store access — gateway reads, pinning uploads, and the CID cache.
//!
//! CIDs are content-addressed, so a successful resolution is valid forever
//! and the cache is append-only with no expiry.  Failed resolutions are
//! *not* cached; the next access retries the gateway.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::errors::{AggregatorError, Result};

// ─────────────────────────────────────────────────────────
// Cache
// ─────────────────────────────────────────────────────────

/// Process-wide CID → document cache.  Constructed explicitly (rather than
/// living in a module-level static) so tests can substitute a fresh one.
#[derive(Debug, Default)]
pub struct CidCache {
    inner: Mutex<HashMap<String, Value>>,
}

impl CidCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, cid: &str) -> Option<Value> {
        self.inner.lock().expect("cid cache poisoned").get(cid).cloned()
    }

    pub fn insert(&self, cid: &str, document: Value) {
        self.inner
            .lock()
            .expect("cid cache poisoned")
            .insert(cid.to_string(), document);
    }
}

// ─────────────────────────────────────────────────────────
// Documents
// ─────────────────────────────────────────────────────────

/// The `{title, description}` document a job CID resolves to.  Blank fields
/// stand in for an unreachable or malformed document; the surrounding
/// aggregation is never failed by one bad CID.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobMetadata {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
}

impl JobMetadata {
    /// The degraded sentinel used when a document cannot be resolved.
    pub fn unavailable() -> Self {
        Self::default()
    }
}

// ─────────────────────────────────────────────────────────
// Store
// ─────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct MetadataStore {
    client: Client,
    gateway: String,
    pinning_url: String,
    pinning_token: Option<String>,
    cache: Arc<CidCache>,
}

impl MetadataStore {
    pub fn new(
        client: Client,
        gateway: String,
        pinning_url: String,
        pinning_token: Option<String>,
        cache: Arc<CidCache>,
    ) -> Self {
        Self {
            client,
            gateway,
            pinning_url: pinning_url.trim_end_matches('/').to_string(),
            pinning_token,
            cache,
        }
    }

    /// Gateway URL for a CID; accepts bare and `ipfs://`-prefixed forms.
    pub fn gateway_url(&self, cid: &str) -> String {
        let cid = cid.strip_prefix("ipfs://").unwrap_or(cid);
        format!("https://{}/ipfs/{}", self.gateway, cid)
    }

    /// Resolve a CID to its JSON document.
    ///
    /// Returns `None` when the CID is empty, the gateway is unreachable, or
    /// the body is not JSON — callers degrade the affected fields instead of
    /// failing their whole batch.
    pub async fn resolve(&self, cid: &str) -> Option<Value> {
        if cid.is_empty() {
            return None;
        }
        if let Some(cached) = self.cache.get(cid) {
            return Some(cached);
        }

        let url = self.gateway_url(cid);
        let document: Option<Value> = match self.client.get(&url).send().await {
            Ok(resp) if resp.status().is_success() => resp.json().await.ok(),
            Ok(resp) => {
                warn!("Gateway returned {} for {cid}", resp.status());
                None
            }
            Err(e) => {
                warn!("Gateway fetch failed for {cid}: {e}");
                None
            }
        };

        if let Some(ref doc) = document {
            self.cache.insert(cid, doc.clone());
        }
        document
    }

    /// Resolve a job CID into its title/description document, degrading to
    /// the blank sentinel when unavailable.
    pub async fn resolve_job_metadata(&self, cid: &str) -> JobMetadata {
        match self.resolve(cid).await {
            Some(doc) => serde_json::from_value(doc).unwrap_or_else(|_| JobMetadata::unavailable()),
            None => JobMetadata::unavailable(),
        }
    }

    /// Pin a JSON document; returns its CID.
    pub async fn upload_json(&self, document: &Value) -> Result<String> {
        let url = format!("{}/pinning/pinJSONToIPFS", self.pinning_url);
        let mut request = self.client.post(&url).json(&serde_json::json!({
            "pinataContent": document,
        }));
        if let Some(token) = &self.pinning_token {
            request = request.bearer_auth(token);
        }
        let resp = request.send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(AggregatorError::ContentStore(format!(
                "pin upload failed ({status}): {body}"
            )));
        }
        let body: Value = resp.json().await?;
        extract_cid(&body).ok_or_else(|| {
            AggregatorError::ContentStore("pin response carried no CID".to_string())
        })
    }

    /// Pin a raw file; returns its CID.
    pub async fn upload_file(&self, bytes: Vec<u8>, filename: &str) -> Result<String> {
        let url = format!("{}/pinning/pinFileToIPFS", self.pinning_url);
        let part = reqwest::multipart::Part::bytes(bytes).file_name(filename.to_string());
        let form = reqwest::multipart::Form::new().part("file", part);
        let mut request = self.client.post(&url).multipart(form);
        if let Some(token) = &self.pinning_token {
            request = request.bearer_auth(token);
        }
        let resp = request.send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(AggregatorError::ContentStore(format!(
                "file upload failed ({status}): {body}"
            )));
        }
        let body: Value = resp.json().await?;
        extract_cid(&body).ok_or_else(|| {
            AggregatorError::ContentStore("file response carried no CID".to_string())
        })
    }
}

/// Pull the CID out of a pinning-service response, whichever of the common
/// field names it uses.
pub fn extract_cid(body: &Value) -> Option<String> {
    for key in ["IpfsHash", "cid", "Hash"] {
        if let Some(s) = body.get(key).and_then(|v| v.as_str()) {
            if !s.is_empty() {
                return Some(s.to_string());
            }
        }
    }
    None
}

// ─────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────
