//! Wallet bridge — the external signing surface.
//!
//! This layer never holds key material.  A mutating action is handed to the
//! bridge as a ready-shaped entry-function payload; the bridge signs with
//! the session's wallet and submits, returning the transaction hash.  Once
//! a payload has been handed over there is no way to abort it from here.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::chain::EntryFunctionPayload;
use crate::errors::{AggregatorError, Result};

/// The active wallet session: which address is acting, through which wallet
/// implementation, on which network.  Pure cache — reconstructable by the
/// user reconnecting their wallet.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct WalletSession {
    pub address: String,
    pub wallet_kind: String,
    pub network: String,
}

/// Narrow contract to the external wallet: sign the payload with the
/// session's key and submit it, returning the transaction hash.
#[async_trait]
pub trait WalletBridge: Send + Sync {
    async fn sign_and_submit(
        &self,
        session: &WalletSession,
        payload: &EntryFunctionPayload,
    ) -> Result<String>;
}

/// HTTP implementation talking to a local wallet-bridge daemon.
pub struct HttpWalletBridge {
    client: Client,
    bridge_url: String,
}

impl HttpWalletBridge {
    pub fn new(client: Client, bridge_url: String) -> Self {
        Self {
            client,
            bridge_url: bridge_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl WalletBridge for HttpWalletBridge {
    async fn sign_and_submit(
        &self,
        session: &WalletSession,
        payload: &EntryFunctionPayload,
    ) -> Result<String> {
        let url = format!("{}/transactions", self.bridge_url);
        let resp = self
            .client
            .post(&url)
            .json(&json!({
                "address": session.address,
                "network": session.network,
                "payload": payload,
            }))
            .send()
            .await
            .map_err(|e| AggregatorError::Wallet(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(AggregatorError::Wallet(format!(
                "bridge refused submission ({status}): {body}"
            )));
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| AggregatorError::Wallet(e.to_string()))?;
        body.get("hash")
            .and_then(|h| h.as_str())
            .map(String::from)
            .ok_or_else(|| AggregatorError::Wallet("bridge response carried no hash".to_string()))
    }
}
