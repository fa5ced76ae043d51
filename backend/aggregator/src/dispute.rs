//! Dispute aggregation — mirrors the job aggregation pattern for DAO
//! disputes: one view call lists the dispute ids, one view call per id
//! fetches the full record.  A record that fails to fetch or parse is
//! skipped; the surrounding list survives.

use serde_json::{json, Value};
use tracing::warn;

use crate::chain::ChainClient;
use crate::config::Config;
use crate::errors::Result;
use crate::model::{normalize_optional_address, parse_bool, parse_u64, Dispute};

#[derive(Clone)]
pub struct DisputeAggregator {
    chain: ChainClient,
    config: Config,
}

impl DisputeAggregator {
    pub fn new(chain: ChainClient, config: Config) -> Self {
        Self { chain, config }
    }

    /// Rebuild the full dispute list.
    pub async fn load_all(&self) -> Result<Vec<Dispute>> {
        let returns = self
            .chain
            .view(&self.config.dao_fn("get_all_dispute_ids"), vec![])
            .await?;
        let ids: Vec<String> = returns
            .first()
            .and_then(|v| v.as_array())
            .map(|items| items.iter().map(|v| parse_u64(v).to_string()).collect())
            .unwrap_or_default();

        let mut disputes = Vec::with_capacity(ids.len());
        for id in ids {
            match self.load_dispute(&id).await {
                Ok(Some(dispute)) => disputes.push(dispute),
                Ok(None) => warn!("Dispute {id} listed but not readable; skipping"),
                Err(e) => warn!("Dispute {id} fetch failed: {e}"),
            }
        }
        Ok(disputes)
    }

    /// Fetch one dispute's full record.
    pub async fn load_dispute(&self, id: &str) -> Result<Option<Dispute>> {
        let returns = self
            .chain
            .view(&self.config.dao_fn("get_dispute"), vec![json!(id)])
            .await?;
        Ok(returns
            .first()
            .and_then(|record| dispute_from_record(id, record)))
    }
}

/// Decode a dispute record as the view function returns it.  `u64`s arrive
/// as decimal strings and `winning_address` in any of the optional-address
/// shapes.
pub fn dispute_from_record(id: &str, record: &Value) -> Option<Dispute> {
    let obj = record.as_object()?;
    let text = |name: &str| {
        obj.get(name)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string()
    };
    let wallets = |name: &str| -> Vec<String> {
        obj.get(name)
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default()
    };

    Some(Dispute {
        id: id.to_string(),
        creator: text("creator"),
        client_address: text("client_address"),
        freelancer_address: text("freelancer_address"),
        winning_address: obj
            .get("winning_address")
            .and_then(normalize_optional_address),
        description: text("description"),
        document_link: text("document_link"),
        voting_deadline: obj.get("voting_deadline").map(parse_u64).unwrap_or(0),
        is_resolved: obj.get("is_resolved").map(parse_bool).unwrap_or(false),
        client_vote_wallets: wallets("client_vote_wallets"),
        freelancer_vote_wallets: wallets("freelancer_vote_wallets"),
    })
}

// ─────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────
