use chrono::{DateTime, Utc};
use serde::Serialize;

use super::domain::{Account, AccountId, AccountRole, RequestId, RequestStatus, VerificationRequest};
use super::timeline::{Stage, StepStatus};

const AI_ACTOR: &str = "System (AI)";
const OFFICER_ACTOR: &str = "Verification Officer";

/// Status counts over the requests visible to one viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardSummary {
    pub total: usize,
    pub verified: usize,
    pub in_progress: usize,
    pub rejected: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credits: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_plan: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_expiry: Option<DateTime<Utc>>,
}

impl DashboardSummary {
    /// `requests` must already be scoped to the viewer. Clients also see their balance.
    pub fn for_viewer(
        viewer: &Account,
        requests: &[VerificationRequest],
        now: DateTime<Utc>,
    ) -> Self {
        let count = |predicate: fn(RequestStatus) -> bool| {
            requests
                .iter()
                .filter(|request| predicate(request.status))
                .count()
        };

        let is_client = viewer.role == AccountRole::Client;
        let active_plan = if is_client {
            viewer.subscription_plan.clone()
        } else {
            None
        };

        Self {
            total: requests.len(),
            verified: count(|status| status == RequestStatus::Verified),
            in_progress: count(RequestStatus::is_in_progress),
            rejected: count(|status| status == RequestStatus::Rejected),
            credits: is_client.then_some(viewer.credits),
            active_plan,
            plan_expiry: viewer
                .subscription_expiry
                .filter(|_| is_client && viewer.has_unlimited_grant(now)),
        }
    }
}

/// One row of the staff-facing client overview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientSummary {
    pub account_id: AccountId,
    pub organization: String,
    pub total: usize,
    pub verified: usize,
    pub pending: usize,
}

impl ClientSummary {
    pub fn collect(accounts: &[Account], requests: &[VerificationRequest]) -> Vec<Self> {
        accounts
            .iter()
            .filter(|account| account.role == AccountRole::Client)
            .map(|account| {
                let owned = requests
                    .iter()
                    .filter(|request| request.owner_id == account.id);
                let (mut total, mut verified, mut pending) = (0, 0, 0);
                for request in owned {
                    total += 1;
                    if request.status == RequestStatus::Verified {
                        verified += 1;
                    } else if request.status.is_in_progress() {
                        pending += 1;
                    }
                }
                Self {
                    account_id: account.id.clone(),
                    organization: account.organization.clone(),
                    total,
                    verified,
                    pending,
                }
            })
            .collect()
    }
}

/// Audit trail line derived from a settled timeline step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditEntry {
    pub id: String,
    pub request_id: RequestId,
    pub timestamp: DateTime<Utc>,
    pub actor: String,
    pub action: String,
    pub details: String,
    pub outcome: StepStatus,
}

impl AuditEntry {
    /// Every completed or error step becomes one entry, newest first.
    pub fn collect(requests: &[VerificationRequest]) -> Vec<Self> {
        let mut entries: Vec<Self> = requests
            .iter()
            .flat_map(|request| {
                request
                    .timeline
                    .steps()
                    .iter()
                    .filter(|step| step.status.is_settled())
                    .map(move |step| Self {
                        id: format!("{}-{}", request.id, step.stage.index() + 1),
                        request_id: request.id.clone(),
                        timestamp: step.date.unwrap_or(request.submission_date),
                        actor: actor_for(request, step.stage),
                        action: step.label.clone(),
                        details: format!("{} (Ref: {})", step.description, request.id),
                        outcome: step.status,
                    })
            })
            .collect();

        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| b.id.cmp(&a.id)));
        entries
    }
}

fn actor_for(request: &VerificationRequest, stage: Stage) -> String {
    match stage {
        Stage::Submission => request.owner_name.clone(),
        Stage::Analysis if request.manual_verification_requested => OFFICER_ACTOR.to_string(),
        Stage::Analysis => AI_ACTOR.to_string(),
        Stage::Outreach | Stage::Final => OFFICER_ACTOR.to_string(),
    }
}
