//! Action dispatch — validates a mutating action against the last
//! aggregated view, shapes the entry-function payload, hands it to the
//! wallet bridge, and waits for finality.
//!
//! ## Failure semantics
//!
//! Every failure is terminal for that attempt: precondition violations are
//! caught before submission, contract aborts are mapped to a user-facing
//! message, and nothing is ever retried automatically.  Once a payload has
//! been handed to the wallet the only remaining control point is the
//! finality wait.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::chain::{ChainClient, EntryFunctionPayload, TransactionResult};
use crate::cid;
use crate::config::Config;
use crate::errors::{AggregatorError, Result};
use crate::ipfs::MetadataStore;
use crate::model::{addresses_match, Dispute, Job, Snapshot};
use crate::wallet::{WalletBridge, WalletSession};

// ─────────────────────────────────────────────────────────
// Actions
// ─────────────────────────────────────────────────────────

/// Every mutating action this layer can submit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Action {
    Apply {
        job_id: String,
    },
    ApproveWorker {
        job_id: String,
    },
    /// Reject the current candidate and extend the application deadline.
    ReopenApplications {
        job_id: String,
        extra_days: u64,
    },
    SubmitMilestone {
        job_id: String,
        milestone_index: u64,
        message: String,
        #[serde(default)]
        link: Option<String>,
        #[serde(default)]
        file_info: Option<Value>,
    },
    AcceptMilestone {
        job_id: String,
        milestone_index: u64,
        message: String,
    },
    RejectMilestone {
        job_id: String,
        milestone_index: u64,
        message: String,
    },
    CancelJob {
        job_id: String,
    },
    RequestCancelJob {
        job_id: String,
    },
    ApproveCancelJob {
        job_id: String,
    },
    RequestWithdraw {
        job_id: String,
    },
    ApproveWithdraw {
        job_id: String,
    },
    WorkerWithdraw {
        job_id: String,
    },
    CompleteJob {
        job_id: String,
    },
    ExpireJob {
        job_id: String,
    },
    ConfirmUnlock {
        job_id: String,
    },
    RemoveInactiveWorker {
        job_id: String,
    },
    RegisterProfile {
        did: String,
        metadata: Value,
    },
    UpdateProfile {
        metadata: Value,
    },
    TransferOwnership {
        new_owner: String,
    },
    OpenDisputeVote {
        client_address: String,
        freelancer_address: String,
        description: String,
        document_link: String,
        voting_deadline: u64,
    },
    Vote {
        dispute_id: String,
        chosen_address: String,
    },
    ResolveDispute {
        dispute_id: String,
    },
}

impl Action {
    /// On-chain entry-function name.  These are part of the contract surface
    /// and must match it byte for byte.
    pub fn entry_function(&self) -> &'static str {
        match self {
            Action::Apply { .. } => "apply",
            Action::ApproveWorker { .. } => "approve_worker",
            Action::ReopenApplications { .. } => "reopen_applications",
            Action::SubmitMilestone { .. } => "submit_milestone",
            Action::AcceptMilestone { .. } => "accept_milestone",
            Action::RejectMilestone { .. } => "reject_milestone",
            Action::CancelJob { .. } => "cancel_job",
            Action::RequestCancelJob { .. } => "request_cancel_job",
            Action::ApproveCancelJob { .. } => "approve_cancel_job",
            Action::RequestWithdraw { .. } => "request_withdraw_apply",
            Action::ApproveWithdraw { .. } => "approve_withdraw_apply",
            Action::WorkerWithdraw { .. } => "worker_withdraw_apply",
            Action::CompleteJob { .. } => "complete_job",
            Action::ExpireJob { .. } => "expire_job",
            Action::ConfirmUnlock { .. } => "confirm_unlock_job",
            Action::RemoveInactiveWorker { .. } => "poster_remove_inactive_worker",
            Action::RegisterProfile { .. } => "register_profile",
            Action::UpdateProfile { .. } => "update_profile",
            Action::TransferOwnership { .. } => "transfer_ownership",
            Action::OpenDisputeVote { .. } => "open_dispute_vote",
            Action::Vote { .. } => "vote",
            Action::ResolveDispute { .. } => "resolve_dispute_and_close_vote",
        }
    }

    /// Dispute actions live in the DAO module; everything else in the
    /// marketplace module.
    pub fn is_dao(&self) -> bool {
        matches!(
            self,
            Action::OpenDisputeVote { .. } | Action::Vote { .. } | Action::ResolveDispute { .. }
        )
    }

    pub fn job_id(&self) -> Option<&str> {
        match self {
            Action::Apply { job_id }
            | Action::ApproveWorker { job_id }
            | Action::ReopenApplications { job_id, .. }
            | Action::SubmitMilestone { job_id, .. }
            | Action::AcceptMilestone { job_id, .. }
            | Action::RejectMilestone { job_id, .. }
            | Action::CancelJob { job_id }
            | Action::RequestCancelJob { job_id }
            | Action::ApproveCancelJob { job_id }
            | Action::RequestWithdraw { job_id }
            | Action::ApproveWithdraw { job_id }
            | Action::WorkerWithdraw { job_id }
            | Action::CompleteJob { job_id }
            | Action::ExpireJob { job_id }
            | Action::ConfirmUnlock { job_id }
            | Action::RemoveInactiveWorker { job_id } => Some(job_id),
            _ => None,
        }
    }

    pub fn dispute_id(&self) -> Option<&str> {
        match self {
            Action::Vote { dispute_id, .. } | Action::ResolveDispute { dispute_id } => {
                Some(dispute_id)
            }
            _ => None,
        }
    }

    /// Positional arguments for the entry-function payload.  `u64`s travel
    /// as decimal strings, `vector<u8>` CIDs as `0x…` hex.
    pub fn build_arguments(&self, cid_hex: Option<&str>) -> Vec<Value> {
        let cid_arg = || json!(cid_hex.unwrap_or_default());
        match self {
            Action::Apply { job_id }
            | Action::ApproveWorker { job_id }
            | Action::CancelJob { job_id }
            | Action::RequestCancelJob { job_id }
            | Action::ApproveCancelJob { job_id }
            | Action::RequestWithdraw { job_id }
            | Action::ApproveWithdraw { job_id }
            | Action::WorkerWithdraw { job_id }
            | Action::CompleteJob { job_id }
            | Action::ExpireJob { job_id }
            | Action::ConfirmUnlock { job_id }
            | Action::RemoveInactiveWorker { job_id } => vec![json!(job_id)],
            Action::ReopenApplications { job_id, extra_days } => {
                vec![json!(job_id), json!(extra_days.to_string())]
            }
            Action::SubmitMilestone {
                job_id,
                milestone_index,
                ..
            }
            | Action::AcceptMilestone {
                job_id,
                milestone_index,
                ..
            }
            | Action::RejectMilestone {
                job_id,
                milestone_index,
                ..
            } => vec![
                json!(job_id),
                json!(milestone_index.to_string()),
                cid_arg(),
            ],
            Action::RegisterProfile { did, .. } => vec![json!(did), cid_arg()],
            Action::UpdateProfile { .. } => vec![cid_arg()],
            Action::TransferOwnership { new_owner } => vec![json!(new_owner)],
            Action::OpenDisputeVote {
                client_address,
                freelancer_address,
                description,
                document_link,
                voting_deadline,
            } => vec![
                json!(client_address),
                json!(freelancer_address),
                json!(description),
                json!(document_link),
                json!(voting_deadline.to_string()),
            ],
            Action::Vote {
                dispute_id,
                chosen_address,
            } => vec![json!(dispute_id), json!(chosen_address)],
            Action::ResolveDispute { dispute_id } => vec![json!(dispute_id)],
        }
    }
}

// ─────────────────────────────────────────────────────────
// Content-store documents
// ─────────────────────────────────────────────────────────

/// The document uploaded to the content store before a milestone action's
/// on-chain call; its CID becomes the `vector<u8>` argument.
pub fn milestone_action_document(
    action_name: &str,
    job_id: &str,
    milestone_index: u64,
    timestamp: i64,
    user_address: &str,
    message: &str,
    link: Option<&str>,
    file_info: Option<&Value>,
) -> Value {
    let mut document = json!({
        "action": action_name,
        "jobId": job_id,
        "milestoneIndex": milestone_index,
        "timestamp": timestamp,
        "userAddress": user_address,
        "message": message,
        "link": link.unwrap_or_default(),
        "metadata": {
            "actionType": action_name,
            "description": message,
        }
    });
    if let Some(info) = file_info {
        document["fileInfo"] = info.clone();
    }
    document
}

/// The document an action needs pinned before submission, if any.
pub fn action_document(action: &Action, caller: &str, timestamp: i64) -> Option<Value> {
    match action {
        Action::SubmitMilestone {
            job_id,
            milestone_index,
            message,
            link,
            file_info,
        } => Some(milestone_action_document(
            action.entry_function(),
            job_id,
            *milestone_index,
            timestamp,
            caller,
            message,
            link.as_deref(),
            file_info.as_ref(),
        )),
        Action::AcceptMilestone {
            job_id,
            milestone_index,
            message,
        }
        | Action::RejectMilestone {
            job_id,
            milestone_index,
            message,
        } => Some(milestone_action_document(
            action.entry_function(),
            job_id,
            *milestone_index,
            timestamp,
            caller,
            message,
            None,
            None,
        )),
        Action::RegisterProfile { metadata, .. } | Action::UpdateProfile { metadata } => {
            Some(metadata.clone())
        }
        _ => None,
    }
}

// ─────────────────────────────────────────────────────────
// Preconditions
// ─────────────────────────────────────────────────────────

/// Validate an action against the last-known aggregated view before any
/// payload is built.  Returns the user-facing message on violation.
pub fn check_preconditions(
    action: &Action,
    snapshot: &Snapshot,
    caller: &str,
    now: u64,
) -> std::result::Result<(), String> {
    if let Some(job_id) = action.job_id() {
        let job = snapshot
            .job(job_id)
            .ok_or_else(|| format!("Unknown job {job_id}."))?;
        return check_job_action(action, job, caller, now);
    }
    if let Some(dispute_id) = action.dispute_id() {
        let dispute = snapshot
            .dispute(dispute_id)
            .ok_or_else(|| format!("Unknown dispute {dispute_id}."))?;
        return check_dispute_action(action, dispute, caller, now);
    }
    match action {
        Action::RegisterProfile { did, .. } if did.is_empty() => {
            Err("A DID is required to register a profile.".to_string())
        }
        Action::TransferOwnership { new_owner } if new_owner.is_empty() => {
            Err("A new owner address is required.".to_string())
        }
        Action::TransferOwnership { new_owner } if addresses_match(new_owner, caller) => {
            Err("The new owner must be a different account.".to_string())
        }
        Action::OpenDisputeVote {
            client_address,
            freelancer_address,
            voting_deadline,
            ..
        } => {
            if addresses_match(client_address, freelancer_address) {
                return Err("Client and freelancer must differ.".to_string());
            }
            if *voting_deadline <= now {
                return Err("Voting deadline must be in the future.".to_string());
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

fn check_job_action(
    action: &Action,
    job: &Job,
    caller: &str,
    now: u64,
) -> std::result::Result<(), String> {
    let is_poster = addresses_match(&job.poster, caller);
    let is_worker = job
        .worker
        .as_deref()
        .map(|w| addresses_match(w, caller))
        .unwrap_or(false);

    match action {
        Action::Apply { .. } => {
            if !job.active {
                return Err("This job is not accepting applications.".to_string());
            }
            if job.worker.is_some() {
                return Err("This job already has a worker.".to_string());
            }
            if is_poster {
                return Err("You cannot apply to your own job.".to_string());
            }
            Ok(())
        }
        Action::ApproveWorker { .. } => {
            if !is_poster {
                return Err("Only the job poster can approve a worker.".to_string());
            }
            if job.worker.is_none() {
                return Err("No candidate has applied yet.".to_string());
            }
            if job.approved {
                return Err("The worker is already approved.".to_string());
            }
            Ok(())
        }
        Action::ReopenApplications { extra_days, .. } => {
            if !is_poster {
                return Err("Only the job poster can reopen applications.".to_string());
            }
            if *extra_days == 0 {
                return Err("The extension must be at least one day.".to_string());
            }
            Ok(())
        }
        Action::SubmitMilestone {
            milestone_index, ..
        } => {
            if !is_worker {
                return Err("Only the assigned worker can submit a milestone.".to_string());
            }
            if *milestone_index != job.current_milestone {
                return Err(format!(
                    "Milestone {milestone_index} is not the one awaiting action."
                ));
            }
            match job.milestone_states.get(*milestone_index as usize) {
                None => Err("No such milestone.".to_string()),
                Some(slot) if slot.submitted => {
                    Err("This milestone was already submitted.".to_string())
                }
                Some(_) => Ok(()),
            }
        }
        Action::AcceptMilestone {
            milestone_index, ..
        }
        | Action::RejectMilestone {
            milestone_index, ..
        } => {
            if !is_poster {
                return Err("Only the job poster can review a milestone.".to_string());
            }
            match job.milestone_states.get(*milestone_index as usize) {
                None => Err("No such milestone.".to_string()),
                Some(slot) if !slot.submitted => {
                    Err("This milestone has not been submitted.".to_string())
                }
                Some(slot) if slot.accepted => {
                    Err("This milestone was already accepted.".to_string())
                }
                Some(_) => Ok(()),
            }
        }
        Action::CancelJob { .. } => {
            if !is_poster {
                return Err("Only the job poster can cancel this job.".to_string());
            }
            if job.worker.is_some() && job.current_milestone > 0 {
                return Err(
                    "A job with milestone progress needs a two-step cancellation.".to_string()
                );
            }
            Ok(())
        }
        Action::RequestCancelJob { .. } => {
            if !is_poster && !is_worker {
                return Err("Only a party to this job can request cancellation.".to_string());
            }
            if job.cancel_request {
                return Err("Cancellation was already requested.".to_string());
            }
            Ok(())
        }
        Action::ApproveCancelJob { .. } => {
            if !is_poster && !is_worker {
                return Err("Only a party to this job can approve cancellation.".to_string());
            }
            if !job.cancel_request {
                return Err("No cancellation request is pending.".to_string());
            }
            Ok(())
        }
        Action::RequestWithdraw { .. } => {
            if !is_worker {
                return Err("Only the assigned worker can request withdrawal.".to_string());
            }
            if job.withdraw_request.is_some() {
                return Err("A withdrawal request is already pending.".to_string());
            }
            Ok(())
        }
        Action::ApproveWithdraw { .. } => {
            if !is_poster {
                return Err("Only the job poster can approve a withdrawal.".to_string());
            }
            if job.withdraw_request.is_none() {
                return Err("No withdrawal request is pending.".to_string());
            }
            Ok(())
        }
        Action::WorkerWithdraw { .. } => {
            if !is_worker {
                return Err("Only the applicant can withdraw an application.".to_string());
            }
            if job.approved {
                return Err("An approved worker must request withdrawal instead.".to_string());
            }
            Ok(())
        }
        Action::CompleteJob { .. } => {
            if !is_poster {
                return Err("Only the job poster can complete this job.".to_string());
            }
            if job.completed {
                return Err("This job is already completed.".to_string());
            }
            if !job.all_milestones_accepted() {
                return Err("All milestones must be accepted first.".to_string());
            }
            Ok(())
        }
        Action::ExpireJob { .. } => {
            if !is_poster {
                return Err("Only the job poster can expire this job.".to_string());
            }
            if now <= job.application_deadline {
                return Err("The application deadline has not passed yet.".to_string());
            }
            if job.approved {
                return Err("A worker was already hired for this job.".to_string());
            }
            Ok(())
        }
        Action::ConfirmUnlock { .. } => {
            if !job.locked {
                return Err("This job is not locked.".to_string());
            }
            if !is_poster && !is_worker {
                return Err("Only a party to this job can confirm the unlock.".to_string());
            }
            Ok(())
        }
        Action::RemoveInactiveWorker { .. } => {
            if !is_poster {
                return Err("Only the job poster can remove the worker.".to_string());
            }
            if job.worker.is_none() {
                return Err("This job has no worker to remove.".to_string());
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

fn check_dispute_action(
    action: &Action,
    dispute: &Dispute,
    caller: &str,
    now: u64,
) -> std::result::Result<(), String> {
    match action {
        Action::Vote { chosen_address, .. } => {
            if dispute.is_resolved {
                return Err("This dispute is already resolved.".to_string());
            }
            if !dispute.voting_open(now) {
                return Err("Voting on this dispute has closed.".to_string());
            }
            if dispute.has_voted(caller) {
                return Err("You have already voted on this dispute.".to_string());
            }
            if !addresses_match(&dispute.client_address, chosen_address)
                && !addresses_match(&dispute.freelancer_address, chosen_address)
            {
                return Err("The vote must pick one of the two parties.".to_string());
            }
            Ok(())
        }
        Action::ResolveDispute { .. } => {
            if dispute.is_resolved {
                return Err("This dispute is already resolved.".to_string());
            }
            if !addresses_match(&dispute.creator, caller) {
                return Err("Only the dispute creator can resolve it.".to_string());
            }
            if now < dispute.voting_deadline {
                return Err("Voting on this dispute is still open.".to_string());
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

// ─────────────────────────────────────────────────────────
// Contract-error mapping
// ─────────────────────────────────────────────────────────

const ERROR_MESSAGES: &[(&str, &str)] = &[
    ("already has worker", "This job already has a worker."),
    ("not authorized", "You are not authorized to perform this action."),
    ("not poster", "Only the job poster can perform this action."),
    ("not worker", "Only the assigned worker can perform this action."),
    ("already submitted", "This milestone was already submitted."),
    ("already accepted", "This milestone was already accepted."),
    ("already voted", "You have already voted on this dispute."),
    ("already resolved", "This dispute is already resolved."),
    ("not active", "This job is no longer active."),
    ("insufficient", "Insufficient balance for this action."),
];

/// Map a contract abort message to a user-facing one; unrecognised errors
/// pass through with the raw message appended.
pub fn map_contract_error(raw: &str) -> String {
    let lowered = raw.to_lowercase();
    for (needle, message) in ERROR_MESSAGES {
        if lowered.contains(needle) {
            return (*message).to_string();
        }
    }
    format!("Transaction failed: {raw}")
}

// ─────────────────────────────────────────────────────────
// Dispatcher
// ─────────────────────────────────────────────────────────

pub struct ActionDispatcher {
    chain: ChainClient,
    metadata: MetadataStore,
    wallet: Arc<dyn WalletBridge>,
    config: Config,
}

impl ActionDispatcher {
    pub fn new(
        chain: ChainClient,
        metadata: MetadataStore,
        wallet: Arc<dyn WalletBridge>,
        config: Config,
    ) -> Self {
        Self {
            chain,
            metadata,
            wallet,
            config,
        }
    }

    /// Validate, pin any action document, submit through the wallet, and
    /// wait for finality.  The caller is responsible for refreshing the
    /// snapshot after a successful dispatch.
    pub async fn dispatch(
        &self,
        session: &WalletSession,
        action: &Action,
        snapshot: &Snapshot,
    ) -> Result<TransactionResult> {
        if session.address.is_empty() {
            return Err(AggregatorError::NoSession);
        }
        let caller = session.address.as_str();
        let now = Utc::now();

        check_preconditions(action, snapshot, caller, now.timestamp() as u64)
            .map_err(AggregatorError::Precondition)?;

        let cid_hex = match action_document(action, caller, now.timestamp()) {
            Some(document) => {
                let cid = self.metadata.upload_json(&document).await?;
                Some(cid::encode_hex(&cid))
            }
            None => None,
        };

        let function = if action.is_dao() {
            self.config.dao_fn(action.entry_function())
        } else {
            self.config.marketplace_fn(action.entry_function())
        };
        let payload = EntryFunctionPayload::new(function, action.build_arguments(cid_hex.as_deref()));

        info!("Submitting {} for {caller}", payload.function);
        let hash = self.wallet.sign_and_submit(session, &payload).await?;
        let result = self.chain.wait_for_transaction(&hash).await?;

        if !result.success {
            return Err(AggregatorError::TransactionFailed {
                hash: result.hash,
                message: map_contract_error(&result.vm_status),
            });
        }
        Ok(result)
    }
}

// ─────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{JobStatus, MilestoneState};
    use serde_json::json;

    const POSTER: &str = "0xPoster";
    const WORKER: &str = "0xWorker";
    const OTHER: &str = "0xSomeoneElse";

    fn recruiting_job(id: &str) -> Job {
        Job {
            id: id.to_string(),
            poster: POSTER.to_string(),
            worker: None,
            active: true,
            milestones: vec![1000, 2000],
            milestone_states: vec![MilestoneState::default(), MilestoneState::default()],
            status: JobStatus::Recruiting,
            ..Job::default()
        }
    }

    fn snapshot_with(jobs: Vec<Job>, disputes: Vec<Dispute>) -> Snapshot {
        Snapshot {
            jobs,
            disputes,
            refreshed_at: 0,
        }
    }

    fn check(action: Action, snapshot: &Snapshot, caller: &str) -> std::result::Result<(), String> {
        check_preconditions(&action, snapshot, caller, 1_700_000_000)
    }

    #[test]
    fn entry_function_names_match_the_contract_surface() {
        let cases = [
            (Action::Apply { job_id: "1".into() }, "apply"),
            (Action::ApproveWorker { job_id: "1".into() }, "approve_worker"),
            (
                Action::ReopenApplications {
                    job_id: "1".into(),
                    extra_days: 3,
                },
                "reopen_applications",
            ),
            (
                Action::SubmitMilestone {
                    job_id: "1".into(),
                    milestone_index: 0,
                    message: String::new(),
                    link: None,
                    file_info: None,
                },
                "submit_milestone",
            ),
            (
                Action::AcceptMilestone {
                    job_id: "1".into(),
                    milestone_index: 0,
                    message: String::new(),
                },
                "accept_milestone",
            ),
            (
                Action::RejectMilestone {
                    job_id: "1".into(),
                    milestone_index: 0,
                    message: String::new(),
                },
                "reject_milestone",
            ),
            (Action::CancelJob { job_id: "1".into() }, "cancel_job"),
            (Action::CompleteJob { job_id: "1".into() }, "complete_job"),
            (Action::ExpireJob { job_id: "1".into() }, "expire_job"),
            (
                Action::RequestWithdraw { job_id: "1".into() },
                "request_withdraw_apply",
            ),
            (
                Action::ApproveWithdraw { job_id: "1".into() },
                "approve_withdraw_apply",
            ),
            (
                Action::WorkerWithdraw { job_id: "1".into() },
                "worker_withdraw_apply",
            ),
            (
                Action::RequestCancelJob { job_id: "1".into() },
                "request_cancel_job",
            ),
            (
                Action::ApproveCancelJob { job_id: "1".into() },
                "approve_cancel_job",
            ),
            (
                Action::ConfirmUnlock { job_id: "1".into() },
                "confirm_unlock_job",
            ),
            (
                Action::RemoveInactiveWorker { job_id: "1".into() },
                "poster_remove_inactive_worker",
            ),
            (
                Action::RegisterProfile {
                    did: "did:example:1".into(),
                    metadata: json!({}),
                },
                "register_profile",
            ),
            (
                Action::UpdateProfile { metadata: json!({}) },
                "update_profile",
            ),
            (
                Action::TransferOwnership {
                    new_owner: "0x2".into(),
                },
                "transfer_ownership",
            ),
            (
                Action::OpenDisputeVote {
                    client_address: "0xa".into(),
                    freelancer_address: "0xb".into(),
                    description: String::new(),
                    document_link: String::new(),
                    voting_deadline: 0,
                },
                "open_dispute_vote",
            ),
            (
                Action::Vote {
                    dispute_id: "1".into(),
                    chosen_address: "0xa".into(),
                },
                "vote",
            ),
            (
                Action::ResolveDispute {
                    dispute_id: "1".into(),
                },
                "resolve_dispute_and_close_vote",
            ),
        ];
        for (action, expected) in cases {
            assert_eq!(action.entry_function(), expected);
        }
    }

    #[test]
    fn milestone_arguments_carry_the_cid() {
        let action = Action::SubmitMilestone {
            job_id: "7".into(),
            milestone_index: 1,
            message: "done".into(),
            link: None,
            file_info: None,
        };
        let args = action.build_arguments(Some("0x516d54657374"));
        assert_eq!(args, vec![json!("7"), json!("1"), json!("0x516d54657374")]);
    }

    #[test]
    fn action_document_shape() {
        let action = Action::SubmitMilestone {
            job_id: "7".into(),
            milestone_index: 0,
            message: "first deliverable".into(),
            link: Some("https://example.org/work".into()),
            file_info: None,
        };
        let doc = action_document(&action, WORKER, 1_700_000_000).unwrap();
        assert_eq!(doc["action"], "submit_milestone");
        assert_eq!(doc["jobId"], "7");
        assert_eq!(doc["milestoneIndex"], 0);
        assert_eq!(doc["userAddress"], WORKER);
        assert_eq!(doc["link"], "https://example.org/work");
        assert_eq!(doc["metadata"]["actionType"], "submit_milestone");
        assert_eq!(doc["metadata"]["description"], "first deliverable");
        assert!(doc.get("fileInfo").is_none());

        // fileInfo present when supplied
        let with_file = Action::SubmitMilestone {
            job_id: "7".into(),
            milestone_index: 0,
            message: "m".into(),
            link: None,
            file_info: Some(json!({"name": "report.pdf", "size": 1024})),
        };
        let doc = action_document(&with_file, WORKER, 0).unwrap();
        assert_eq!(doc["fileInfo"]["name"], "report.pdf");

        // plain actions need no document
        assert!(action_document(&Action::Apply { job_id: "7".into() }, WORKER, 0).is_none());
    }

    #[test]
    fn contract_errors_map_to_user_messages() {
        assert_eq!(
            map_contract_error("Move abort: EJOB_ALREADY_HAS_WORKER: already has worker"),
            "This job already has a worker."
        );
        assert_eq!(
            map_contract_error("caller NOT AUTHORIZED for entry"),
            "You are not authorized to perform this action."
        );
        let unknown = map_contract_error("ECODE_9999 mystery");
        assert!(unknown.starts_with("Transaction failed: "));
        assert!(unknown.contains("ECODE_9999 mystery"));
    }

    // ── apply / approve / withdraw ───────────────────────

    #[test]
    fn apply_preconditions() {
        let snapshot = snapshot_with(vec![recruiting_job("1")], vec![]);
        assert!(check(Action::Apply { job_id: "1".into() }, &snapshot, OTHER).is_ok());
        // own job
        assert!(check(Action::Apply { job_id: "1".into() }, &snapshot, POSTER).is_err());
        // poster casing differs
        assert!(check(Action::Apply { job_id: "1".into() }, &snapshot, "0xPOSTER").is_err());
        // unknown job
        assert!(check(Action::Apply { job_id: "9".into() }, &snapshot, OTHER).is_err());

        let mut taken = recruiting_job("2");
        taken.worker = Some(WORKER.to_string());
        let snapshot = snapshot_with(vec![taken], vec![]);
        assert_eq!(
            check(Action::Apply { job_id: "2".into() }, &snapshot, OTHER).unwrap_err(),
            "This job already has a worker."
        );
    }

    #[test]
    fn apply_then_withdraw_scenario() {
        // recruiting job, no worker
        let job = recruiting_job("1");
        let snapshot = snapshot_with(vec![job], vec![]);
        assert!(check(Action::Apply { job_id: "1".into() }, &snapshot, WORKER).is_ok());

        // after the application lands: worker set, not approved
        let mut applied = recruiting_job("1");
        applied.worker = Some(WORKER.to_string());
        let snapshot = snapshot_with(vec![applied], vec![]);
        assert!(check(
            Action::RequestWithdraw { job_id: "1".into() },
            &snapshot,
            WORKER
        )
        .is_ok());
        // a second request while one is pending is refused
        let mut pending = recruiting_job("1");
        pending.worker = Some(WORKER.to_string());
        pending.withdraw_request = Some(WORKER.to_string());
        let snapshot = snapshot_with(vec![pending], vec![]);
        assert!(check(
            Action::RequestWithdraw { job_id: "1".into() },
            &snapshot,
            WORKER
        )
        .is_err());
        // poster approves the pending request
        assert!(check(
            Action::ApproveWithdraw { job_id: "1".into() },
            &snapshot,
            POSTER
        )
        .is_ok());

        // after approval: worker cleared, approved still false, applications open again
        let reopened = recruiting_job("1");
        assert!(!reopened.approved);
        let snapshot = snapshot_with(vec![reopened], vec![]);
        assert!(check(Action::Apply { job_id: "1".into() }, &snapshot, OTHER).is_ok());
    }

    #[test]
    fn unapproved_candidate_withdraws_directly() {
        let mut applied = recruiting_job("1");
        applied.worker = Some(WORKER.to_string());
        let snapshot = snapshot_with(vec![applied], vec![]);
        assert!(check(
            Action::WorkerWithdraw { job_id: "1".into() },
            &snapshot,
            WORKER
        )
        .is_ok());

        let mut approved = recruiting_job("1");
        approved.worker = Some(WORKER.to_string());
        approved.approved = true;
        let snapshot = snapshot_with(vec![approved], vec![]);
        assert_eq!(
            check(
                Action::WorkerWithdraw { job_id: "1".into() },
                &snapshot,
                WORKER
            )
            .unwrap_err(),
            "An approved worker must request withdrawal instead."
        );
    }

    // ── milestone cycle ──────────────────────────────────

    fn job_in_progress(current: u64, states: Vec<MilestoneState>) -> Job {
        Job {
            id: "1".to_string(),
            poster: POSTER.to_string(),
            worker: Some(WORKER.to_string()),
            approved: true,
            active: true,
            milestones: vec![1000, 2000],
            current_milestone: current,
            milestone_states: states,
            status: JobStatus::InProgress,
            ..Job::default()
        }
    }

    fn submitted_slot() -> MilestoneState {
        MilestoneState {
            submitted: true,
            submit_time: 1_700_000_000,
            submission_cid: "QmSub".to_string(),
            ..MilestoneState::default()
        }
    }

    fn accepted_slot() -> MilestoneState {
        MilestoneState {
            submitted: true,
            accepted: true,
            ..MilestoneState::default()
        }
    }

    #[test]
    fn full_milestone_cycle_scenario() {
        let submit0 = Action::SubmitMilestone {
            job_id: "1".into(),
            milestone_index: 0,
            message: "work".into(),
            link: None,
            file_info: None,
        };
        let accept0 = Action::AcceptMilestone {
            job_id: "1".into(),
            milestone_index: 0,
            message: "ok".into(),
        };
        let reject0 = Action::RejectMilestone {
            job_id: "1".into(),
            milestone_index: 0,
            message: "redo".into(),
        };

        // fresh job: worker submits milestone 0
        let snapshot = snapshot_with(
            vec![job_in_progress(
                0,
                vec![MilestoneState::default(), MilestoneState::default()],
            )],
            vec![],
        );
        assert!(check(submit0.clone(), &snapshot, WORKER).is_ok());
        // only the worker may submit
        assert!(check(submit0.clone(), &snapshot, POSTER).is_err());

        // submitted: a duplicate submission is refused, poster may reject
        let snapshot = snapshot_with(
            vec![job_in_progress(
                0,
                vec![submitted_slot(), MilestoneState::default()],
            )],
            vec![],
        );
        assert_eq!(
            check(submit0.clone(), &snapshot, WORKER).unwrap_err(),
            "This milestone was already submitted."
        );
        assert!(check(reject0.clone(), &snapshot, POSTER).is_ok());

        // rejected: submitted resets on-chain, worker resubmits at index 0
        let rejected = MilestoneState {
            reject_count: 1,
            rejection_cid: "QmWhy".to_string(),
            ..MilestoneState::default()
        };
        let snapshot = snapshot_with(
            vec![job_in_progress(
                0,
                vec![rejected, MilestoneState::default()],
            )],
            vec![],
        );
        assert!(check(submit0.clone(), &snapshot, WORKER).is_ok());

        // resubmitted and accepted: current advances to 1
        let snapshot = snapshot_with(
            vec![job_in_progress(
                1,
                vec![accepted_slot(), MilestoneState::default()],
            )],
            vec![],
        );
        // a second accept on index 0 is refused before submission
        assert_eq!(
            check(accept0.clone(), &snapshot, POSTER).unwrap_err(),
            "This milestone was already accepted."
        );
        // milestone 1 follows the same path
        let submit1 = Action::SubmitMilestone {
            job_id: "1".into(),
            milestone_index: 1,
            message: "work".into(),
            link: None,
            file_info: None,
        };
        assert!(check(submit1, &snapshot, WORKER).is_ok());
        // submitting index 0 again is out of turn now
        assert!(check(submit0, &snapshot, WORKER).is_err());

        // both accepted: current equals the milestone count, job may complete
        let done = job_in_progress(2, vec![accepted_slot(), accepted_slot()]);
        assert!(done.all_milestones_accepted());
        let snapshot = snapshot_with(vec![done], vec![]);
        assert!(check(
            Action::CompleteJob { job_id: "1".into() },
            &snapshot,
            POSTER
        )
        .is_ok());
        assert!(check(
            Action::CompleteJob { job_id: "1".into() },
            &snapshot,
            WORKER
        )
        .is_err());
    }

    #[test]
    fn complete_requires_all_milestones() {
        let snapshot = snapshot_with(
            vec![job_in_progress(
                1,
                vec![accepted_slot(), MilestoneState::default()],
            )],
            vec![],
        );
        assert_eq!(
            check(
                Action::CompleteJob { job_id: "1".into() },
                &snapshot,
                POSTER
            )
            .unwrap_err(),
            "All milestones must be accepted first."
        );
    }

    // ── cancellation / unlock ────────────────────────────

    #[test]
    fn direct_cancel_only_before_milestone_progress() {
        let snapshot = snapshot_with(vec![recruiting_job("1")], vec![]);
        assert!(check(Action::CancelJob { job_id: "1".into() }, &snapshot, POSTER).is_ok());

        let progressed = job_in_progress(1, vec![accepted_slot(), MilestoneState::default()]);
        let snapshot = snapshot_with(vec![progressed], vec![]);
        assert!(check(Action::CancelJob { job_id: "1".into() }, &snapshot, POSTER).is_err());
        // the two-step path remains open
        assert!(check(
            Action::RequestCancelJob { job_id: "1".into() },
            &snapshot,
            WORKER
        )
        .is_ok());
    }

    #[test]
    fn unlock_two_party_confirm_scenario() {
        let mut locked = job_in_progress(0, vec![MilestoneState::default(); 2]);
        locked.locked = true;
        locked.status = JobStatus::Locked;

        let snapshot = snapshot_with(vec![locked.clone()], vec![]);
        // either party may confirm; outsiders may not
        assert!(check(
            Action::ConfirmUnlock { job_id: "1".into() },
            &snapshot,
            POSTER
        )
        .is_ok());
        assert!(check(
            Action::ConfirmUnlock { job_id: "1".into() },
            &snapshot,
            OTHER
        )
        .is_err());

        // poster confirmed: job remains locked until the worker also confirms
        locked.unlock_confirm_poster = true;
        assert_eq!(
            JobStatus::classify(false, false, locked.locked, locked.active, true),
            JobStatus::Locked
        );
        let snapshot = snapshot_with(vec![locked.clone()], vec![]);
        assert!(check(
            Action::ConfirmUnlock { job_id: "1".into() },
            &snapshot,
            WORKER
        )
        .is_ok());

        // both bits set: the contract clears the lock and the job is active again
        locked.unlock_confirm_worker = true;
        locked.locked = false;
        assert_eq!(
            JobStatus::classify(false, false, locked.locked, locked.active, true),
            JobStatus::InProgress
        );
        let snapshot = snapshot_with(vec![locked], vec![]);
        assert_eq!(
            check(
                Action::ConfirmUnlock { job_id: "1".into() },
                &snapshot,
                WORKER
            )
            .unwrap_err(),
            "This job is not locked."
        );
    }

    #[test]
    fn expire_requires_no_hire() {
        let snapshot = snapshot_with(vec![recruiting_job("1")], vec![]);
        assert!(check(Action::ExpireJob { job_id: "1".into() }, &snapshot, POSTER).is_ok());

        let mut hired = recruiting_job("1");
        hired.worker = Some(WORKER.to_string());
        hired.approved = true;
        let snapshot = snapshot_with(vec![hired], vec![]);
        assert!(check(Action::ExpireJob { job_id: "1".into() }, &snapshot, POSTER).is_err());
    }

    // ── disputes ─────────────────────────────────────────

    fn open_dispute() -> Dispute {
        Dispute {
            id: "1".to_string(),
            creator: "0xCreator".to_string(),
            client_address: "0xClient".to_string(),
            freelancer_address: "0xFreelancer".to_string(),
            voting_deadline: 1_800_000_000,
            ..Dispute::default()
        }
    }

    #[test]
    fn vote_preconditions() {
        let snapshot = snapshot_with(vec![], vec![open_dispute()]);
        let vote = |chosen: &str| Action::Vote {
            dispute_id: "1".into(),
            chosen_address: chosen.into(),
        };
        assert!(check(vote("0xclient"), &snapshot, OTHER).is_ok());
        assert_eq!(
            check(vote("0xNobody"), &snapshot, OTHER).unwrap_err(),
            "The vote must pick one of the two parties."
        );

        let mut voted = open_dispute();
        voted.client_vote_wallets.push(OTHER.to_string());
        let snapshot = snapshot_with(vec![], vec![voted]);
        assert_eq!(
            check(vote("0xClient"), &snapshot, OTHER).unwrap_err(),
            "You have already voted on this dispute."
        );

        let mut closed = open_dispute();
        closed.voting_deadline = 1_600_000_000;
        let snapshot = snapshot_with(vec![], vec![closed]);
        assert!(check(vote("0xClient"), &snapshot, OTHER).is_err());
    }

    #[test]
    fn resolve_is_creator_only_after_deadline() {
        let resolve = Action::ResolveDispute {
            dispute_id: "1".into(),
        };
        // still open
        let snapshot = snapshot_with(vec![], vec![open_dispute()]);
        assert_eq!(
            check(resolve.clone(), &snapshot, "0xCreator").unwrap_err(),
            "Voting on this dispute is still open."
        );

        let mut past_deadline = open_dispute();
        past_deadline.voting_deadline = 1_600_000_000;
        let snapshot = snapshot_with(vec![], vec![past_deadline.clone()]);
        assert!(check(resolve.clone(), &snapshot, "0xcreator").is_ok());
        assert!(check(resolve.clone(), &snapshot, OTHER).is_err());

        past_deadline.is_resolved = true;
        past_deadline.winning_address = Some("0xClient".to_string());
        let snapshot = snapshot_with(vec![], vec![past_deadline]);
        assert_eq!(
            check(resolve, &snapshot, "0xCreator").unwrap_err(),
            "This dispute is already resolved."
        );
    }
}
