//! Application configuration loaded from environment variables.

use crate::errors::{AggregatorError, Result};

/// Hard bounds for the event page size; call sites may ask for anything
/// inside this range but never an unbounded log read.
pub const MIN_EVENT_PAGE: u32 = 50;
pub const MAX_EVENT_PAGE: u32 = 1000;

#[derive(Debug, Clone)]
pub struct Config {
    /// Chain fullnode REST endpoint (e.g. https://fullnode.testnet.aptoslabs.com)
    pub node_url: String,
    /// Account address the marketplace modules are published under
    pub contract_address: String,
    /// Module name holding the job/milestone entry functions
    pub marketplace_module: String,
    /// Module name holding the dispute/vote entry functions
    pub dao_module: String,
    /// Hostname of the content-store gateway (e.g. gateway.pinata.cloud)
    pub ipfs_gateway: String,
    /// Base URL of the pinning service used for uploads
    pub pinning_url: String,
    /// Bearer token for the pinning service (optional for read-only use)
    pub pinning_token: Option<String>,
    /// Base URL of the wallet bridge that signs and submits transactions
    pub wallet_bridge_url: String,
    /// Path to the SQLite database file holding session/profile snapshots
    pub database_url: String,
    /// Port for the REST API server
    pub api_port: u16,
    /// How often (in seconds) to rebuild the aggregated snapshot
    pub refresh_interval_secs: u64,
    /// Number of posted-job events to fetch per refresh
    pub events_page_limit: u32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Config {
            node_url: env_var("NODE_URL")
                .unwrap_or_else(|_| "https://fullnode.testnet.aptoslabs.com".to_string()),
            contract_address: env_var("CONTRACT_ADDRESS").map_err(|_| {
                AggregatorError::Config(
                    "CONTRACT_ADDRESS environment variable is required".to_string(),
                )
            })?,
            marketplace_module: env_var("MARKETPLACE_MODULE")
                .unwrap_or_else(|_| "marketplace".to_string()),
            dao_module: env_var("DAO_MODULE").unwrap_or_else(|_| "dispute_dao".to_string()),
            ipfs_gateway: env_var("IPFS_GATEWAY")
                .unwrap_or_else(|_| "gateway.pinata.cloud".to_string()),
            pinning_url: env_var("PINNING_URL")
                .unwrap_or_else(|_| "https://api.pinata.cloud".to_string()),
            pinning_token: env_var("PINNING_TOKEN").ok(),
            wallet_bridge_url: env_var("WALLET_BRIDGE_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:8090".to_string()),
            database_url: env_var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:./aggregator.db".to_string()),
            api_port: env_var("API_PORT")
                .unwrap_or_else(|_| "3001".to_string())
                .parse()
                .map_err(|_| AggregatorError::Config("Invalid API_PORT".to_string()))?,
            refresh_interval_secs: env_var("REFRESH_INTERVAL_SECS")
                .unwrap_or_else(|_| "15".to_string())
                .parse()
                .map_err(|_| {
                    AggregatorError::Config("Invalid REFRESH_INTERVAL_SECS".to_string())
                })?,
            events_page_limit: env_var("EVENTS_PAGE_LIMIT")
                .unwrap_or_else(|_| "200".to_string())
                .parse::<u32>()
                .map_err(|_| AggregatorError::Config("Invalid EVENTS_PAGE_LIMIT".to_string()))?
                .clamp(MIN_EVENT_PAGE, MAX_EVENT_PAGE),
        })
    }

    // ─────────────────────────────────────────────────────────
    // Fully-qualified chain identifiers
    // ─────────────────────────────────────────────────────────

    /// `<address>::<marketplace module>::<entry or view name>`
    pub fn marketplace_fn(&self, name: &str) -> String {
        format!("{}::{}::{}", self.contract_address, self.marketplace_module, name)
    }

    /// `<address>::<dao module>::<entry or view name>`
    pub fn dao_fn(&self, name: &str) -> String {
        format!("{}::{}::{}", self.contract_address, self.dao_module, name)
    }

    /// Event type emitted once per posted job.
    pub fn job_posted_event_type(&self) -> String {
        self.marketplace_fn("JobPostedEvent")
    }

    /// Resource on the contract account holding the job/milestone table handles.
    pub fn store_resource_type(&self) -> String {
        self.marketplace_fn("MarketplaceStore")
    }

    /// Value type of a row in the jobs table.
    pub fn job_row_type(&self) -> String {
        self.marketplace_fn("Job")
    }

    /// Value type of a row in the per-milestone table.
    pub fn milestone_row_type(&self) -> String {
        self.marketplace_fn("MilestoneData")
    }

    /// Key type of the per-milestone table (job id + milestone index).
    pub fn milestone_key_type(&self) -> String {
        self.marketplace_fn("MilestoneKey")
    }

    /// Resource published on a user account once a profile is registered.
    pub fn profile_resource_type(&self) -> String {
        self.marketplace_fn("Profile")
    }
}

fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| AggregatorError::Config(format!("Missing env var: {key}")))
}
