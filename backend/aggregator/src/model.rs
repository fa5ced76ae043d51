//! Domain model for jobs, milestones, disputes, and profiles.
//!
//! ## Raw vs. aggregated shapes
//!
//! The node's JSON layer serves `u64` fields as decimal strings, `vector<u8>`
//! fields as hex strings or byte arrays, and `Option<address>` fields in a
//! handful of historical shapes (plain string, absent, `{"vec": [...]}`,
//! `{"some": ...}`).  Everything in this module past the `parse_*` /
//! `normalize_*` helpers works on plain Rust types; the raw unions never
//! escape this boundary.
//!
//! ## Status as a single authority
//!
//! A job's display status is derived, never stored.  [`JobStatus::classify`]
//! is the only place the precedence between the lifecycle flags lives:
//!
//! ```text
//! completed > expired > locked > in-progress > recruiting > closed
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cid;

// ─────────────────────────────────────────────────────────
// Raw-value helpers
// ─────────────────────────────────────────────────────────

/// Cast a chain numeric field (decimal string or JSON number) to `u64`.
/// Anything unparseable counts as zero.
pub fn parse_u64(value: &Value) -> u64 {
    match value {
        Value::Number(n) => n.as_u64().unwrap_or(0),
        Value::String(s) => s.parse().unwrap_or(0),
        _ => 0,
    }
}

/// Cast a chain boolean field.  Optional wrappers (`{"vec": [...]}`)
/// count as set when non-empty.
pub fn parse_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => s == "true",
        Value::Object(_) => value
            .get("vec")
            .and_then(|v| v.as_array())
            .map(|a| !a.is_empty())
            .unwrap_or(false),
        _ => false,
    }
}

/// Cast a list of chain numerics (e.g. milestone amounts).
pub fn parse_u64_list(value: &Value) -> Vec<u64> {
    value
        .as_array()
        .map(|items| items.iter().map(parse_u64).collect())
        .unwrap_or_default()
}

/// Collapse the chain's optional-address union into `Option<String>`.
///
/// Accepted shapes: plain address string, JSON null / absent, the MoveVM
/// option wrapper `{"vec": ["0x…"]}` (empty vec = none), and the legacy
/// `{"some": "0x…"}` / `{"none": …}` wrapper.
pub fn normalize_optional_address(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Object(map) => {
            if let Some(inner) = map.get("vec") {
                return inner
                    .as_array()
                    .and_then(|a| a.first())
                    .and_then(normalize_optional_address);
            }
            if let Some(inner) = map.get("some") {
                return normalize_optional_address(inner);
            }
            None
        }
        _ => None,
    }
}

/// Case-insensitive address equality (addresses arrive with inconsistent
/// hex casing depending on the source).
pub fn addresses_match(a: &str, b: &str) -> bool {
    !a.is_empty() && a.eq_ignore_ascii_case(b)
}

// ─────────────────────────────────────────────────────────
// Jobs
// ─────────────────────────────────────────────────────────

/// One payable sub-deliverable of a job, keyed by (job id, index).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MilestoneState {
    pub submitted: bool,
    pub accepted: bool,
    pub reject_count: u64,
    /// Unix seconds; zero when never submitted.
    pub submit_time: u64,
    pub submission_cid: String,
    pub acceptance_cid: String,
    pub rejection_cid: String,
}

impl MilestoneState {
    /// Build a milestone slot from its table row.  `None` (row never
    /// materialised, or its read failed) yields the uninitialised slot.
    pub fn from_row(row: Option<&Value>) -> Self {
        let Some(row) = row else {
            return Self::default();
        };
        Self {
            submitted: row.get("submitted").map(parse_bool).unwrap_or(false),
            accepted: row.get("accepted").map(parse_bool).unwrap_or(false),
            reject_count: row.get("reject_count").map(parse_u64).unwrap_or(0),
            submit_time: row.get("submit_time").map(parse_u64).unwrap_or(0),
            submission_cid: row.get("submission_cid").map(cid::decode).unwrap_or_default(),
            acceptance_cid: row.get("acceptance_cid").map(cid::decode).unwrap_or_default(),
            rejection_cid: row.get("rejection_cid").map(cid::decode).unwrap_or_default(),
        }
    }
}

/// Aggregated view of one posted engagement: the authoritative table row
/// merged with content-store metadata and per-milestone slots.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub poster: String,
    pub worker: Option<String>,
    /// Content identifier of the `{title, description}` document.
    pub cid: String,
    pub title: String,
    pub description: String,
    /// Escrowed amount per milestone, fixed at creation.
    pub milestones: Vec<u64>,
    pub duration_per_milestone: Vec<u64>,
    pub active: bool,
    pub approved: bool,
    pub completed: bool,
    pub job_expired: bool,
    pub locked: bool,
    pub start_time: u64,
    pub application_deadline: u64,
    pub milestone_deadlines: Vec<u64>,
    pub submit_time: u64,
    pub approve_time: u64,
    pub last_reject_time: u64,
    /// Index of the milestone currently awaiting action; equal to
    /// `milestones.len()` once every milestone has been accepted.
    pub current_milestone: u64,
    pub rejected_count: u64,
    pub withdraw_request: Option<String>,
    pub cancel_request: bool,
    pub unlock_confirm_poster: bool,
    pub unlock_confirm_worker: bool,
    pub status: JobStatus,
    pub milestone_states: Vec<MilestoneState>,
}

impl Job {
    /// True once every milestone has been accepted and the job may complete.
    pub fn all_milestones_accepted(&self) -> bool {
        self.current_milestone >= self.milestones.len() as u64
    }

    pub fn relation_to(&self, address: &str) -> JobRelation {
        if addresses_match(&self.poster, address) {
            JobRelation::Poster
        } else if self
            .worker
            .as_deref()
            .map(|w| addresses_match(w, address))
            .unwrap_or(false)
        {
            JobRelation::Worker
        } else {
            JobRelation::Unrelated
        }
    }

    /// Which list a related job lands in on the account dashboard.
    pub fn bucket(&self) -> JobBucket {
        if self.completed || self.job_expired || (self.locked && !self.active) {
            JobBucket::Completed
        } else {
            JobBucket::InProgress
        }
    }
}

/// Display status, derived from the lifecycle flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobStatus {
    Completed,
    Expired,
    Locked,
    InProgress,
    Recruiting,
    #[default]
    Closed,
}

impl JobStatus {
    /// Sole authority for the status label.  Exactly one label applies; the
    /// precedence between flags is fixed and enforced only here.
    pub fn classify(
        completed: bool,
        job_expired: bool,
        locked: bool,
        active: bool,
        has_worker: bool,
    ) -> Self {
        if completed {
            JobStatus::Completed
        } else if job_expired {
            JobStatus::Expired
        } else if locked {
            JobStatus::Locked
        } else if active && has_worker {
            JobStatus::InProgress
        } else if active {
            JobStatus::Recruiting
        } else {
            JobStatus::Closed
        }
    }
}

/// How a job relates to a viewing account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobRelation {
    Poster,
    Worker,
    Unrelated,
}

/// Dashboard bucket for a related job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobBucket {
    InProgress,
    Completed,
}

// ─────────────────────────────────────────────────────────
// Disputes
// ─────────────────────────────────────────────────────────

/// One DAO dispute: open for voting until its deadline, terminal once the
/// creator resolves it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dispute {
    pub id: String,
    pub creator: String,
    pub client_address: String,
    pub freelancer_address: String,
    /// Unset until the dispute is resolved.
    pub winning_address: Option<String>,
    pub description: String,
    pub document_link: String,
    pub voting_deadline: u64,
    pub is_resolved: bool,
    pub client_vote_wallets: Vec<String>,
    pub freelancer_vote_wallets: Vec<String>,
}

impl Dispute {
    /// An address may appear in at most one of the two vote lists.
    pub fn has_voted(&self, address: &str) -> bool {
        self.client_vote_wallets
            .iter()
            .chain(self.freelancer_vote_wallets.iter())
            .any(|w| addresses_match(w, address))
    }

    pub fn voting_open(&self, now: u64) -> bool {
        !self.is_resolved && now < self.voting_deadline
    }
}

// ─────────────────────────────────────────────────────────
// Profiles
// ─────────────────────────────────────────────────────────

/// Registered user profile: on-chain DID + CID, hydrated with the
/// content-store document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Profile {
    pub address: String,
    pub did: String,
    pub cid: String,
    pub name: String,
    pub bio: String,
    pub skills: Vec<String>,
}

// ─────────────────────────────────────────────────────────
// Snapshot
// ─────────────────────────────────────────────────────────

/// The whole aggregated view served to consumers.  Refreshes replace it
/// wholesale; it is never patched incrementally.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Snapshot {
    pub jobs: Vec<Job>,
    pub disputes: Vec<Dispute>,
    /// Unix seconds of the refresh that produced this snapshot.
    pub refreshed_at: i64,
}

impl Snapshot {
    pub fn job(&self, id: &str) -> Option<&Job> {
        self.jobs.iter().find(|j| j.id == id)
    }

    pub fn dispute(&self, id: &str) -> Option<&Dispute> {
        self.disputes.iter().find(|d| d.id == id)
    }
}

// ─────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────
