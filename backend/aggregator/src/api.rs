//! Axum REST API handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use base64::Engine;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tokio::sync::Notify;

use crate::aggregate::{split_for_account, JobAggregator};
use crate::dispatch::{Action, ActionDispatcher};
use crate::errors::AggregatorError;
use crate::ipfs::MetadataStore;
use crate::model::{Dispute, Job};
use crate::profile::ProfileService;
use crate::refresh::SharedSnapshot;
use crate::store;
use crate::wallet::WalletSession;

pub struct ApiState {
    pub snapshot: SharedSnapshot,
    pub jobs: JobAggregator,
    pub profiles: ProfileService,
    pub dispatcher: ActionDispatcher,
    pub metadata: MetadataStore,
    pub pool: SqlitePool,
    pub notify: Arc<Notify>,
}

// ─────────────────────────────────────────────────────────
// Response shapes
// ─────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct JobsResponse {
    pub count: usize,
    pub refreshed_at: i64,
    pub jobs: Vec<Job>,
}

#[derive(Serialize)]
pub struct DisputesResponse {
    pub count: usize,
    pub refreshed_at: i64,
    pub disputes: Vec<Dispute>,
}

#[derive(Serialize)]
pub struct ActionResponse {
    pub hash: String,
    pub vm_status: String,
}

#[derive(Deserialize)]
pub struct UploadRequest {
    pub filename: String,
    /// Base64-encoded file body.
    pub content: String,
}

#[derive(Serialize)]
pub struct UploadResponse {
    pub cid: String,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_json(status: StatusCode, message: String) -> axum::response::Response {
    (status, Json(ErrorResponse { error: message })).into_response()
}

/// One place maps the error taxonomy onto HTTP statuses: precondition and
/// contract rejections are client-side (422), missing session is 401, and
/// connectivity failures surface as 502 with the transient message.
fn dispatch_error(e: AggregatorError) -> axum::response::Response {
    match e {
        AggregatorError::NoSession => error_json(StatusCode::UNAUTHORIZED, e.to_string()),
        AggregatorError::Precondition(_) | AggregatorError::TransactionFailed { .. } => {
            error_json(StatusCode::UNPROCESSABLE_ENTITY, e.to_string())
        }
        AggregatorError::Http(_) | AggregatorError::Chain { .. } => error_json(
            StatusCode::BAD_GATEWAY,
            format!("Temporarily unable to reach the network: {e}"),
        ),
        other => error_json(StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
    }
}

// ─────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────

/// `GET /health`
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// `GET /jobs`
pub async fn list_jobs(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    let snapshot = state.snapshot.read().await;
    Json(JobsResponse {
        count: snapshot.jobs.len(),
        refreshed_at: snapshot.refreshed_at,
        jobs: snapshot.jobs.clone(),
    })
}

/// `GET /jobs/:id`
pub async fn get_job(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Some(job) = state.snapshot.read().await.job(&id) {
        return Json(job.clone()).into_response();
    }
    // Not in the snapshot yet — maybe posted after the last refresh.
    match state.jobs.load_job(&id).await {
        Ok(Some(job)) => Json(job).into_response(),
        Ok(None) => error_json(StatusCode::NOT_FOUND, format!("Unknown job {id}")),
        Err(e) => dispatch_error(e),
    }
}

/// `GET /accounts/:address/jobs`
pub async fn account_jobs(
    State(state): State<Arc<ApiState>>,
    Path(address): Path<String>,
) -> impl IntoResponse {
    let snapshot = state.snapshot.read().await;
    Json(split_for_account(&snapshot.jobs, &address))
}

/// `GET /disputes`
pub async fn list_disputes(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    let snapshot = state.snapshot.read().await;
    Json(DisputesResponse {
        count: snapshot.disputes.len(),
        refreshed_at: snapshot.refreshed_at,
        disputes: snapshot.disputes.clone(),
    })
}

/// `GET /disputes/:id`
pub async fn get_dispute(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    match state.snapshot.read().await.dispute(&id) {
        Some(dispute) => Json(dispute.clone()).into_response(),
        None => error_json(StatusCode::NOT_FOUND, format!("Unknown dispute {id}")),
    }
}

/// `GET /profiles/:address`
pub async fn get_profile(
    State(state): State<Arc<ApiState>>,
    Path(address): Path<String>,
) -> axum::response::Response {
    match state.profiles.load_profile(&address).await {
        Ok(Some(profile)) => Json(profile).into_response(),
        Ok(None) => error_json(
            StatusCode::NOT_FOUND,
            format!("No profile registered for {address}"),
        ),
        Err(e) => dispatch_error(e),
    }
}

/// `GET /session`
pub async fn get_session(State(state): State<Arc<ApiState>>) -> axum::response::Response {
    match store::load_session(&state.pool).await {
        Ok(Some(session)) => Json(session).into_response(),
        Ok(None) => error_json(StatusCode::NOT_FOUND, "No active wallet session".to_string()),
        Err(e) => dispatch_error(e),
    }
}

/// `PUT /session`
pub async fn put_session(
    State(state): State<Arc<ApiState>>,
    Json(session): Json<WalletSession>,
) -> axum::response::Response {
    if session.address.is_empty() {
        return error_json(
            StatusCode::UNPROCESSABLE_ENTITY,
            "A wallet address is required".to_string(),
        );
    }
    match store::save_session(&state.pool, &session).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => dispatch_error(e),
    }
}

/// `DELETE /session`
pub async fn delete_session(State(state): State<Arc<ApiState>>) -> axum::response::Response {
    match store::clear_session(&state.pool).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => dispatch_error(e),
    }
}

/// `POST /uploads`
///
/// Pins a file to the content store ahead of a milestone action; the
/// returned CID goes into that action's `file_info`.
pub async fn upload(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<UploadRequest>,
) -> axum::response::Response {
    let bytes = match base64::engine::general_purpose::STANDARD.decode(&request.content) {
        Ok(bytes) => bytes,
        Err(e) => {
            return error_json(
                StatusCode::UNPROCESSABLE_ENTITY,
                format!("Invalid base64 body: {e}"),
            )
        }
    };
    match state.metadata.upload_file(bytes, &request.filename).await {
        Ok(cid) => Json(UploadResponse { cid }).into_response(),
        Err(e) => dispatch_error(e),
    }
}

/// `POST /actions`
///
/// Runs the dispatcher for the active wallet session.  On a confirmed
/// transaction the refresh loop is poked so the next read sees the new
/// state.
pub async fn post_action(
    State(state): State<Arc<ApiState>>,
    Json(action): Json<Action>,
) -> axum::response::Response {
    let session = match store::load_session(&state.pool).await {
        Ok(Some(session)) => session,
        Ok(None) => return dispatch_error(AggregatorError::NoSession),
        Err(e) => return dispatch_error(e),
    };

    let snapshot = state.snapshot.read().await.clone();
    match state.dispatcher.dispatch(&session, &action, &snapshot).await {
        Ok(result) => {
            state.notify.notify_one();
            Json(ActionResponse {
                hash: result.hash,
                vm_status: result.vm_status,
            })
            .into_response()
        }
        Err(e) => dispatch_error(e),
    }
}
