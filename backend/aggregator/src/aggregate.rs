//! Job state aggregation — merges the posted-job event log, the
//! authoritative job table, per-milestone table rows, and content-store
//! metadata into the view served to consumers.
//!
//! ## Reconciliation policy
//!
//! The event log and the table are eventually consistent with each other.
//! The table row is authoritative for all live state; events are used only
//! to discover which job ids exist and for the originally-posted CID.  An
//! event whose table row no longer resolves is skipped silently — it is not
//! an error for the log to run ahead of (or outlive) the table.
//!
//! ## Failure isolation
//!
//! One job's failed metadata fetch or one milestone's failed table read
//! degrades that job/slot only; the surrounding list always survives.

use std::collections::HashSet;

use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::chain::{ChainClient, EventOrder};
use crate::cid;
use crate::config::Config;
use crate::errors::Result;
use crate::ipfs::{JobMetadata, MetadataStore};
use crate::model::{
    parse_bool, parse_u64, parse_u64_list, normalize_optional_address, Job, JobBucket,
    JobRelation, JobStatus, MilestoneState,
};

// ─────────────────────────────────────────────────────────
// Table handles
// ─────────────────────────────────────────────────────────

/// Handles of the job and milestone tables, read off the contract's store
/// resource.  Either may be absent on a freshly-published contract.
#[derive(Debug, Clone, Default)]
pub struct TableHandles {
    pub jobs: Option<String>,
    pub milestones: Option<String>,
}

impl TableHandles {
    pub fn from_resource(resource: &Value) -> Self {
        Self {
            jobs: table_handle(resource, "jobs"),
            milestones: table_handle(resource, "milestone_data"),
        }
    }
}

fn table_handle(resource: &Value, field: &str) -> Option<String> {
    resource
        .get(field)
        .and_then(|t| t.get("handle"))
        .and_then(|h| h.as_str())
        .map(String::from)
}

// ─────────────────────────────────────────────────────────
// Pure merge
// ─────────────────────────────────────────────────────────

/// Merge one authoritative table row with its resolved metadata and
/// milestone slots into the aggregated [`Job`].
pub fn build_job(
    id: String,
    cid: String,
    row: &Value,
    metadata: JobMetadata,
    milestone_states: Vec<MilestoneState>,
) -> Job {
    let get_u64 = |name: &str| row.get(name).map(parse_u64).unwrap_or(0);
    let get_bool = |name: &str| row.get(name).map(parse_bool).unwrap_or(false);

    let worker = row.get("worker").and_then(normalize_optional_address);
    let active = get_bool("active");
    let completed = get_bool("completed");
    let job_expired = get_bool("job_expired");
    let locked = get_bool("locked");
    let status = JobStatus::classify(completed, job_expired, locked, active, worker.is_some());

    Job {
        id,
        poster: row
            .get("poster")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
        worker,
        cid,
        title: metadata.title,
        description: metadata.description,
        milestones: row.get("milestones").map(parse_u64_list).unwrap_or_default(),
        duration_per_milestone: row
            .get("duration_per_milestone")
            .map(parse_u64_list)
            .unwrap_or_default(),
        active,
        approved: get_bool("approved"),
        completed,
        job_expired,
        locked,
        start_time: get_u64("start_time"),
        application_deadline: get_u64("application_deadline"),
        milestone_deadlines: row
            .get("milestone_deadlines")
            .map(parse_u64_list)
            .unwrap_or_default(),
        submit_time: get_u64("submit_time"),
        approve_time: get_u64("approve_time"),
        last_reject_time: get_u64("last_reject_time"),
        current_milestone: get_u64("current_milestone"),
        rejected_count: get_u64("rejected_count"),
        withdraw_request: row
            .get("withdraw_request")
            .and_then(normalize_optional_address),
        cancel_request: get_bool("cancel_request"),
        unlock_confirm_poster: get_bool("unlock_confirm_poster"),
        unlock_confirm_worker: get_bool("unlock_confirm_worker"),
        status,
        milestone_states,
    }
}

/// Build every milestone slot from its (possibly missing) table row.
/// A `None` row — never written, or its read failed — stays uninitialised.
pub fn milestones_from_rows(rows: Vec<Option<Value>>) -> Vec<MilestoneState> {
    rows.iter()
        .map(|row| MilestoneState::from_row(row.as_ref()))
        .collect()
}

// ─────────────────────────────────────────────────────────
// Account views
// ─────────────────────────────────────────────────────────

/// A job annotated with the viewing account's relation to it.
#[derive(Debug, Clone, Serialize)]
pub struct RelatedJob {
    pub relation: JobRelation,
    #[serde(flatten)]
    pub job: Job,
}

/// Relation-filtered, bucket-split dashboard view for one account.
#[derive(Debug, Clone, Serialize)]
pub struct AccountJobsView {
    pub address: String,
    pub in_progress: Vec<RelatedJob>,
    pub completed: Vec<RelatedJob>,
}

/// Keep only the jobs related to `address` (as poster or worker, compared
/// case-insensitively) and split them into dashboard buckets.
pub fn split_for_account(jobs: &[Job], address: &str) -> AccountJobsView {
    let mut in_progress = Vec::new();
    let mut completed = Vec::new();
    for job in jobs {
        let relation = job.relation_to(address);
        if relation == JobRelation::Unrelated {
            continue;
        }
        let related = RelatedJob {
            relation,
            job: job.clone(),
        };
        match job.bucket() {
            JobBucket::InProgress => in_progress.push(related),
            JobBucket::Completed => completed.push(related),
        }
    }
    AccountJobsView {
        address: address.to_string(),
        in_progress,
        completed,
    }
}

// ─────────────────────────────────────────────────────────
// Aggregator
// ─────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct JobAggregator {
    chain: ChainClient,
    metadata: MetadataStore,
    config: Config,
}

impl JobAggregator {
    pub fn new(chain: ChainClient, metadata: MetadataStore, config: Config) -> Self {
        Self {
            chain,
            metadata,
            config,
        }
    }

    /// Rebuild the full job list: event page for discovery, table rows for
    /// state, content store for titles.
    pub async fn load_all_jobs(&self) -> Result<Vec<Job>> {
        let Some(resource) = self
            .chain
            .get_account_resource(
                &self.config.contract_address,
                &self.config.store_resource_type(),
            )
            .await?
        else {
            // Contract not published yet — a valid empty marketplace.
            return Ok(Vec::new());
        };
        let handles = TableHandles::from_resource(&resource);
        let Some(jobs_handle) = handles.jobs.clone() else {
            return Ok(Vec::new());
        };

        let events = self
            .chain
            .get_events_by_type(
                &self.config.job_posted_event_type(),
                self.config.events_page_limit,
                EventOrder::Descending,
            )
            .await?;

        let mut jobs = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        for event in &events {
            let Some(id_value) = event.data.get("job_id") else {
                continue;
            };
            let id = parse_u64(id_value).to_string();
            if !seen.insert(id.clone()) {
                continue;
            }
            let posted_cid = event.data.get("cid").map(cid::decode).unwrap_or_default();

            let row = match self
                .chain
                .get_table_item(&jobs_handle, "u64", &self.config.job_row_type(), &json!(id))
                .await
            {
                Ok(Some(row)) => row,
                Ok(None) => {
                    debug!("Job {id} has an event but no table row; skipping");
                    continue;
                }
                Err(e) => {
                    warn!("Job {id} table read failed: {e}");
                    continue;
                }
            };

            jobs.push(self.hydrate_job(&handles, id, posted_cid, row).await);
        }
        Ok(jobs)
    }

    /// Load a single job by id, bypassing the event page.  The posted CID is
    /// taken from the row itself, falling back to an event-log lookup when
    /// the row predates CID storage.
    pub async fn load_job(&self, id: &str) -> Result<Option<Job>> {
        let Some(resource) = self
            .chain
            .get_account_resource(
                &self.config.contract_address,
                &self.config.store_resource_type(),
            )
            .await?
        else {
            return Ok(None);
        };
        let handles = TableHandles::from_resource(&resource);
        let Some(jobs_handle) = handles.jobs.clone() else {
            return Ok(None);
        };

        let Some(row) = self
            .chain
            .get_table_item(&jobs_handle, "u64", &self.config.job_row_type(), &json!(id))
            .await?
        else {
            return Ok(None);
        };

        let mut posted_cid = String::new();
        if row.get("cid").map(cid::decode).unwrap_or_default().is_empty() {
            posted_cid = self.posted_cid_from_events(id).await;
        }

        Ok(Some(self.hydrate_job(&handles, id.to_string(), posted_cid, row).await))
    }

    async fn posted_cid_from_events(&self, id: &str) -> String {
        let events = match self
            .chain
            .get_events_by_type(
                &self.config.job_posted_event_type(),
                self.config.events_page_limit,
                EventOrder::Descending,
            )
            .await
        {
            Ok(events) => events,
            Err(e) => {
                warn!("Event lookup for job {id} failed: {e}");
                return String::new();
            }
        };
        events
            .iter()
            .find(|ev| {
                ev.data
                    .get("job_id")
                    .map(|v| parse_u64(v).to_string() == id)
                    .unwrap_or(false)
            })
            .and_then(|ev| ev.data.get("cid").map(cid::decode))
            .unwrap_or_default()
    }

    async fn hydrate_job(
        &self,
        handles: &TableHandles,
        id: String,
        posted_cid: String,
        row: Value,
    ) -> Job {
        let row_cid = row.get("cid").map(cid::decode).unwrap_or_default();
        let cid = if row_cid.is_empty() { posted_cid } else { row_cid };

        let metadata = self.metadata.resolve_job_metadata(&cid).await;

        let count = row
            .get("milestones")
            .map(parse_u64_list)
            .unwrap_or_default()
            .len();
        let states = self
            .load_milestones(handles.milestones.as_deref(), &id, count)
            .await;

        build_job(id, cid, &row, metadata, states)
    }

    /// Read every milestone slot for a job.  The slots are independent keys,
    /// so the reads run concurrently; a failed or missing slot degrades to
    /// the uninitialised state without touching its siblings.
    async fn load_milestones(
        &self,
        handle: Option<&str>,
        job_id: &str,
        count: usize,
    ) -> Vec<MilestoneState> {
        let Some(handle) = handle else {
            return vec![MilestoneState::default(); count];
        };
        let key_type = self.config.milestone_key_type();
        let value_type = self.config.milestone_row_type();

        let reads = (0..count).map(|index| {
            let key = json!({
                "job_id": job_id,
                "milestone_index": index.to_string(),
            });
            let key_type = key_type.clone();
            let value_type = value_type.clone();
            async move {
                match self
                    .chain
                    .get_table_item(handle, &key_type, &value_type, &key)
                    .await
                {
                    Ok(row) => row,
                    Err(e) => {
                        warn!("Milestone {job_id}/{index} read failed: {e}");
                        None
                    }
                }
            }
        });
        let rows = futures::future::join_all(reads).await;
        milestones_from_rows(rows)
    }
}

// ─────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_row(worker: Value) -> Value {
        json!({
            "poster": "0xP0STER",
            "worker": worker,
            "cid": "0x516d54657374",
            "milestones": ["1000", "2000"],
            "duration_per_milestone": ["86400", "172800"],
            "active": true,
            "approved": false,
            "completed": false,
            "job_expired": false,
            "locked": false,
            "start_time": "1700000000",
            "application_deadline": "1700600000",
            "milestone_deadlines": ["1700700000", "1700900000"],
            "submit_time": "0",
            "approve_time": "0",
            "last_reject_time": "0",
            "current_milestone": "0",
            "rejected_count": "0",
            "withdraw_request": {"vec": []},
            "cancel_request": false,
            "unlock_confirm_poster": false,
            "unlock_confirm_worker": false
        })
    }

    fn meta() -> JobMetadata {
        JobMetadata {
            title: "Build a parser".to_string(),
            description: "Rust, please".to_string(),
        }
    }

    #[test]
    fn merges_numeric_strings_and_metadata() {
        let row = sample_row(json!({"vec": []}));
        let job = build_job("7".into(), "QmTest".into(), &row, meta(), Vec::new());
        assert_eq!(job.id, "7");
        assert_eq!(job.poster, "0xP0STER");
        assert_eq!(job.worker, None);
        assert_eq!(job.milestones, vec![1000, 2000]);
        assert_eq!(job.application_deadline, 1_700_600_000);
        assert_eq!(job.title, "Build a parser");
        assert_eq!(job.status, JobStatus::Recruiting);
    }

    #[test]
    fn worker_shapes_all_normalise() {
        for (worker, expected) in [
            (json!("0xw0rk"), Some("0xw0rk".to_string())),
            (json!({"vec": ["0xw0rk"]}), Some("0xw0rk".to_string())),
            (json!({"some": "0xw0rk"}), Some("0xw0rk".to_string())),
            (json!({"vec": []}), None),
            (Value::Null, None),
        ] {
            let row = sample_row(worker);
            let job = build_job("1".into(), String::new(), &row, meta(), Vec::new());
            assert_eq!(job.worker, expected);
        }
    }

    #[test]
    fn status_follows_flags_through_merge() {
        let mut row = sample_row(json!({"vec": ["0xw"]}));
        let job = build_job("1".into(), String::new(), &row, meta(), Vec::new());
        assert_eq!(job.status, JobStatus::InProgress);

        row["completed"] = json!(true);
        let job = build_job("1".into(), String::new(), &row, meta(), Vec::new());
        assert_eq!(job.status, JobStatus::Completed);
    }

    #[test]
    fn milestone_read_failures_are_isolated_per_index() {
        let populated = json!({
            "submitted": true,
            "accepted": true,
            "reject_count": "0",
            "submit_time": "1700000001",
            "submission_cid": "0x516d41",
            "acceptance_cid": "0x516d42",
            "rejection_cid": "0x"
        });
        // Index 2 failed (or was never written); its siblings survive.
        let rows = vec![
            Some(populated.clone()),
            Some(populated.clone()),
            None,
            Some(populated),
        ];
        let states = milestones_from_rows(rows);
        assert_eq!(states.len(), 4);
        assert!(states[0].accepted && states[1].accepted && states[3].accepted);
        assert_eq!(states[2], MilestoneState::default());
    }

    #[test]
    fn account_split_is_case_insensitive_and_bucketed() {
        let mine_active = build_job(
            "1".into(),
            String::new(),
            &sample_row(json!({"vec": []})),
            JobMetadata::unavailable(),
            Vec::new(),
        );
        let mut mine_done = build_job(
            "2".into(),
            String::new(),
            &sample_row(json!({"vec": []})),
            JobMetadata::unavailable(),
            Vec::new(),
        );
        mine_done.completed = true;
        let mut working = build_job(
            "3".into(),
            String::new(),
            &sample_row(json!("0xME")),
            JobMetadata::unavailable(),
            Vec::new(),
        );
        working.poster = "0xSOMEONE".to_string();
        let mut unrelated = mine_active.clone();
        unrelated.id = "4".to_string();
        unrelated.poster = "0xELSE".to_string();

        let jobs = vec![mine_active, mine_done, working, unrelated];
        let view = split_for_account(&jobs, "0xp0ster");

        assert_eq!(view.in_progress.len(), 1);
        assert_eq!(view.in_progress[0].relation, JobRelation::Poster);
        assert_eq!(view.completed.len(), 1);
        assert_eq!(view.completed[0].job.id, "2");

        let worker_view = split_for_account(&jobs, "0xme");
        assert_eq!(worker_view.in_progress.len(), 1);
        assert_eq!(worker_view.in_progress[0].relation, JobRelation::Worker);
    }

    #[test]
    fn table_handles_tolerate_missing_fields() {
        let resource = json!({
            "jobs": {"handle": "0xhandle1"},
            "job_count": "9"
        });
        let handles = TableHandles::from_resource(&resource);
        assert_eq!(handles.jobs.as_deref(), Some("0xhandle1"));
        assert!(handles.milestones.is_none());
    }
}
