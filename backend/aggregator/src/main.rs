//! Marketplace chain aggregator — entry point.
//!
//! Starts a background task that rebuilds the aggregated job/dispute view
//! from the chain (events for discovery, table rows for state, the content
//! store for metadata), and exposes an Axum REST API serving that view and
//! accepting mutating actions, which are signed by an external wallet
//! bridge and submitted on-chain.

mod aggregate;
mod api;
mod chain;
mod cid;
mod config;
mod dispatch;
mod dispute;
mod errors;
mod ipfs;
mod model;
mod profile;
mod refresh;
mod store;
mod wallet;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    routing::{get, post},
    Router,
};
use reqwest::Client;
use tokio::sync::{Notify, RwLock};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use aggregate::JobAggregator;
use chain::ChainClient;
use config::Config;
use dispatch::ActionDispatcher;
use dispute::DisputeAggregator;
use ipfs::{CidCache, MetadataStore};
use model::Snapshot;
use profile::ProfileService;
use wallet::HttpWalletBridge;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise structured logging (RUST_LOG controls verbosity).
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Load optional .env file (ignored if missing).
    let _ = dotenvy::dotenv();

    // Load config from environment.
    let config = Config::from_env().map_err(|e| anyhow::anyhow!("{e}"))?;

    // Set up the SQLite connection pool and run migrations.
    let pool = store::init_pool(&config.database_url).await?;

    // HTTP client shared between the chain reader, the content store, and
    // the wallet bridge.
    let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

    let chain = ChainClient::new(client.clone(), config.node_url.clone());
    let metadata = MetadataStore::new(
        client.clone(),
        config.ipfs_gateway.clone(),
        config.pinning_url.clone(),
        config.pinning_token.clone(),
        Arc::new(CidCache::new()),
    );
    let wallet_bridge = Arc::new(HttpWalletBridge::new(
        client.clone(),
        config.wallet_bridge_url.clone(),
    ));

    let jobs = JobAggregator::new(chain.clone(), metadata.clone(), config.clone());
    let disputes = DisputeAggregator::new(chain.clone(), config.clone());
    let profiles = ProfileService::new(chain.clone(), metadata.clone(), pool.clone(), config.clone());
    let dispatcher = ActionDispatcher::new(chain, metadata.clone(), wallet_bridge, config.clone());

    let snapshot = Arc::new(RwLock::new(Snapshot::default()));
    let notify = Arc::new(Notify::new());

    // ─── Background aggregation ───────────────────────────
    let refresh_state = Arc::new(refresh::RefreshState {
        jobs: jobs.clone(),
        disputes,
        snapshot: snapshot.clone(),
        notify: notify.clone(),
        interval: Duration::from_secs(config.refresh_interval_secs),
    });
    tokio::spawn(refresh::run(refresh_state));

    // ─── REST API ─────────────────────────────────────────
    let api_state = Arc::new(api::ApiState {
        snapshot,
        jobs,
        profiles,
        dispatcher,
        metadata,
        pool,
        notify,
    });

    let app = Router::new()
        .route("/health", get(api::health))
        .route("/jobs", get(api::list_jobs))
        .route("/jobs/:id", get(api::get_job))
        .route("/accounts/:address/jobs", get(api::account_jobs))
        .route("/disputes", get(api::list_disputes))
        .route("/disputes/:id", get(api::get_dispute))
        .route("/profiles/:address", get(api::get_profile))
        .route(
            "/session",
            get(api::get_session)
                .put(api::put_session)
                .delete(api::delete_session),
        )
        .route("/actions", post(api::post_action))
        .route("/uploads", post(api::upload))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(api_state);

    let addr = format!("0.0.0.0:{}", config.api_port);
    info!("API listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
