//! Chain node REST client — read-only state access plus transaction
//! finality.
//!
//! Every read distinguishes two non-success outcomes: HTTP 404 means the
//! resource/row/log simply does not exist yet and maps to `None` (or an
//! empty page); anything else is a real [`AggregatorError::Chain`] error.
//! Nothing in this client retries — a failed call surfaces once and the
//! caller (ultimately the user) decides whether to re-trigger.

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::errors::{AggregatorError, Result};

// ─────────────────────────────────────────────────────────
// Wire shapes
// ─────────────────────────────────────────────────────────

/// One entry from a module event log.
#[derive(Debug, Clone, Deserialize)]
#[allow(dead_code)]
pub struct RawChainEvent {
    pub data: Value,
    /// Serialised as a decimal string by the node.
    pub sequence_number: String,
}

/// Result of a finality wait on a submitted transaction.
#[derive(Debug, Clone, Deserialize)]
pub struct TransactionResult {
    pub hash: String,
    pub success: bool,
    /// VM status string; carries the contract abort message on failure.
    #[serde(default)]
    pub vm_status: String,
}

/// Entry-function submission payload, shaped exactly as the wallet and the
/// node expect it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryFunctionPayload {
    #[serde(rename = "type")]
    pub payload_type: String,
    /// `<address>::<module>::<entry>`
    pub function: String,
    pub type_arguments: Vec<String>,
    pub arguments: Vec<Value>,
}

impl EntryFunctionPayload {
    pub fn new(function: String, arguments: Vec<Value>) -> Self {
        Self {
            payload_type: "entry_function_payload".to_string(),
            function,
            type_arguments: Vec::new(),
            arguments,
        }
    }
}

/// Requested ordering for event-log pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOrder {
    Ascending,
    Descending,
}

impl EventOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventOrder::Ascending => "asc",
            EventOrder::Descending => "desc",
        }
    }
}

// ─────────────────────────────────────────────────────────
// Client
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ChainClient {
    client: Client,
    node_url: String,
}

impl ChainClient {
    pub fn new(client: Client, node_url: String) -> Self {
        Self {
            client,
            node_url: node_url.trim_end_matches('/').to_string(),
        }
    }

    /// Fetch a resource published under an account.
    /// Returns `Ok(None)` when the account has no such resource yet.
    pub async fn get_account_resource(
        &self,
        address: &str,
        resource_type: &str,
    ) -> Result<Option<Value>> {
        let url = format!(
            "{}/v1/accounts/{}/resource/{}",
            self.node_url, address, resource_type
        );
        let resp = self.client.get(&url).send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body: Value = check_status(resp).await?.json().await?;
        // The node wraps resources as {"type": …, "data": …}.
        Ok(Some(body.get("data").cloned().unwrap_or(body)))
    }

    /// Fetch one row of an on-chain table by handle and key.
    /// Returns `Ok(None)` when the key was never written.
    pub async fn get_table_item(
        &self,
        handle: &str,
        key_type: &str,
        value_type: &str,
        key: &Value,
    ) -> Result<Option<Value>> {
        let url = format!("{}/v1/tables/{}/item", self.node_url, handle);
        let resp = self
            .client
            .post(&url)
            .json(&json!({
                "key_type": key_type,
                "value_type": value_type,
                "key": key,
            }))
            .send()
            .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(check_status(resp).await?.json().await?))
    }

    /// Fetch a bounded page of module events by fully-qualified event type.
    /// An account that never emitted the event type yields an empty page.
    pub async fn get_events_by_type(
        &self,
        event_type: &str,
        limit: u32,
        order: EventOrder,
    ) -> Result<Vec<RawChainEvent>> {
        let url = format!(
            "{}/v1/events/{}?limit={}&order={}",
            self.node_url,
            event_type,
            limit,
            order.as_str()
        );
        let resp = self.client.get(&url).send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        let events: Vec<RawChainEvent> = check_status(resp).await?.json().await?;
        debug!("Fetched {} events of type {event_type}", events.len());
        Ok(events)
    }

    /// Call a read-only view function; returns its raw return values.
    pub async fn view(&self, function: &str, args: Vec<Value>) -> Result<Vec<Value>> {
        let url = format!("{}/v1/view", self.node_url);
        let resp = self
            .client
            .post(&url)
            .json(&json!({
                "function": function,
                "type_arguments": [],
                "arguments": args,
            }))
            .send()
            .await?;
        Ok(check_status(resp).await?.json().await?)
    }

    /// Long-poll the node until the transaction with `hash` reaches
    /// finality.  There is no timeout at this layer; a hung wait stalls
    /// only the initiating action.
    pub async fn wait_for_transaction(&self, hash: &str) -> Result<TransactionResult> {
        let url = format!("{}/v1/transactions/wait_by_hash/{}", self.node_url, hash);
        let resp = self.client.get(&url).send().await?;
        Ok(check_status(resp).await?.json().await?)
    }
}

/// Map non-success statuses (other than the 404s handled above) to a chain
/// error carrying the node's message body.
async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let message = resp.text().await.unwrap_or_default();
    Err(AggregatorError::Chain {
        status: status.as_u16(),
        message,
    })
}

// ─────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────
