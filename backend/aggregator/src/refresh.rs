//! Background refresh task — rebuilds the aggregated snapshot on a fixed
//! interval, or immediately after a dispatched action confirms, and swaps
//! the shared view wholesale.  A failed rebuild leaves the previous
//! snapshot serving untouched; there is no partial patching.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{Notify, RwLock};
use tracing::{error, info};

use crate::aggregate::JobAggregator;
use crate::dispute::DisputeAggregator;
use crate::model::Snapshot;

pub type SharedSnapshot = Arc<RwLock<Snapshot>>;

pub struct RefreshState {
    pub jobs: JobAggregator,
    pub disputes: DisputeAggregator,
    pub snapshot: SharedSnapshot,
    /// Poked after a confirmed transaction to refresh ahead of schedule.
    pub notify: Arc<Notify>,
    pub interval: Duration,
}

/// Run the refresh loop as a background [`tokio`] task.
pub async fn run(state: Arc<RefreshState>) {
    info!(
        "Aggregation loop starting (interval {}s)",
        state.interval.as_secs()
    );
    loop {
        match rebuild(&state).await {
            Ok(snapshot) => {
                let jobs = snapshot.jobs.len();
                let disputes = snapshot.disputes.len();
                *state.snapshot.write().await = snapshot;
                info!("Snapshot refreshed: {jobs} jobs, {disputes} disputes");
            }
            Err(e) => {
                // Keep serving the previous snapshot; the next tick (or the
                // next confirmed action) re-attempts from scratch.
                error!("Snapshot refresh failed: {e}");
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(state.interval) => {}
            _ = state.notify.notified() => {}
        }
    }
}

async fn rebuild(state: &RefreshState) -> crate::errors::Result<Snapshot> {
    let jobs = state.jobs.load_all_jobs().await?;
    let disputes = state.disputes.load_all().await?;
    Ok(Snapshot {
        jobs,
        disputes,
        refreshed_at: Utc::now().timestamp(),
    })
}
