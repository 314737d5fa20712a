use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::analysis::{AnalysisGate, GateDecision};
use super::domain::{
    Account, AnalysisResult, DocumentRef, RequestId, RequestStatus, SubmissionInput,
    VerificationOutcome, VerificationRequest,
};
use super::ledger::{AccountLedger, LedgerError};
use super::timeline::{Stage, StepStatus, Timeline, TimelineError};

/// Report note attached to a verified request when the officer supplies none.
pub const STANDARD_VERIFICATION_STATEMENT: &str =
    "Credentials confirmed with the issuing institution. No discrepancies found.";

const OUTREACH_STARTED: &str = "Contacting the issuing institution for confirmation.";

/// Decisions an officer can submit against a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum OfficerAction {
    ApproveAnalysis,
    RequestManualReview,
    OverrideApprove,
    MarkAuthenticated,
    MarkOutreachFailed {
        reason: String,
    },
    Finalize {
        #[serde(default)]
        note: Option<String>,
    },
}

impl OfficerAction {
    pub const fn name(&self) -> &'static str {
        match self {
            OfficerAction::ApproveAnalysis => "approve_analysis",
            OfficerAction::RequestManualReview => "request_manual_review",
            OfficerAction::OverrideApprove => "override_approve",
            OfficerAction::MarkAuthenticated => "mark_authenticated",
            OfficerAction::MarkOutreachFailed { .. } => "mark_outreach_failed",
            OfficerAction::Finalize { .. } => "finalize",
        }
    }
}

/// Everything that can move an existing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    Officer(OfficerAction),
    /// Client supplied a new document; the analysis result is already resolved.
    Reupload {
        document: DocumentRef,
        analysis: AnalysisResult,
    },
}

impl Trigger {
    pub const fn name(&self) -> &'static str {
        match self {
            Trigger::Officer(action) => action.name(),
            Trigger::Reupload { .. } => "reupload",
        }
    }
}

impl From<OfficerAction> for Trigger {
    fn from(action: OfficerAction) -> Self {
        Trigger::Officer(action)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LifecycleError {
    #[error("cannot apply {trigger} while request is {status}")]
    InvalidTransition {
        status: RequestStatus,
        trigger: &'static str,
    },
    #[error("{trigger} requires a non-empty reason")]
    MissingReason { trigger: &'static str },
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error("timeline rejected the transition: {0}")]
    Timeline(#[from] TimelineError),
}

/// Outcome of applying a trigger that passed its guards.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Applied {
        request: VerificationRequest,
        from: RequestStatus,
    },
    /// Re-sent trigger on a request that already reflects it.
    Unchanged(VerificationRequest),
}

impl Transition {
    pub fn request(&self) -> &VerificationRequest {
        match self {
            Transition::Applied { request, .. } | Transition::Unchanged(request) => request,
        }
    }

    pub fn into_request(self) -> VerificationRequest {
        match self {
            Transition::Applied { request, .. } | Transition::Unchanged(request) => request,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, Transition::Applied { .. })
    }
}

/// Open a new request for `owner`, charging the ledger and routing through the gate.
///
/// Returns the created request together with the charged account; neither is persisted.
pub fn submit(
    id: RequestId,
    input: SubmissionInput,
    owner: &Account,
    ledger: &AccountLedger,
    gate: &AnalysisGate,
    now: DateTime<Utc>,
) -> Result<(VerificationRequest, Account), LifecycleError> {
    let charged = ledger.consume(owner, now)?;

    let mut timeline = Timeline::initialize(now);
    let status = match &input.analysis {
        Some(result) => {
            let decision = gate.evaluate(result);
            let description = gate.describe(result, decision);
            match decision {
                GateDecision::Pass => {
                    timeline.advance(Stage::Analysis, StepStatus::Current, description, now)?;
                    RequestStatus::Processing
                }
                GateDecision::NeedsReview => {
                    timeline.advance(Stage::Analysis, StepStatus::Error, description, now)?;
                    RequestStatus::ReviewRequired
                }
            }
        }
        None => RequestStatus::Processing,
    };

    let request = VerificationRequest {
        id,
        candidate: input.candidate,
        owner_id: owner.id.clone(),
        owner_name: owner.organization.clone(),
        status,
        timeline,
        document: input.document,
        ai_analysis: input.analysis,
        verification_outcome: None,
        final_report_note: None,
        manual_verification_requested: false,
        submission_date: now,
        last_updated: now,
    };

    Ok((request, charged))
}

/// Pure transition function. The input request is never modified; on error nothing changes.
pub fn apply(
    request: &VerificationRequest,
    trigger: &Trigger,
    gate: &AnalysisGate,
    now: DateTime<Utc>,
) -> Result<Transition, LifecycleError> {
    use OfficerAction as A;
    use RequestStatus as S;

    let from = request.status;
    let invalid = || LifecycleError::InvalidTransition {
        status: from,
        trigger: trigger.name(),
    };
    let require_stage = |expected: Stage| {
        if request.timeline.active_stage() == Some(expected) {
            Ok(())
        } else {
            Err(invalid())
        }
    };

    let mut next = request.clone();

    match (from, trigger) {
        (S::Verified | S::Rejected, Trigger::Officer(A::Finalize { .. })) => {
            return Ok(Transition::Unchanged(next));
        }
        (S::Processing | S::ReviewRequired, Trigger::Officer(A::ApproveAnalysis)) => {
            require_stage(Stage::Analysis)?;
            open_outreach(
                &mut next.timeline,
                "Document analysis approved by verification officer.",
                now,
            )?;
            next.status = S::InstitutionOutreach;
        }
        (S::Processing | S::ReviewRequired, Trigger::Officer(A::RequestManualReview)) => {
            require_stage(Stage::Analysis)?;
            next.timeline.advance(
                Stage::Analysis,
                StepStatus::Error,
                "Manual verification requested. Awaiting a new document from the client.",
                now,
            )?;
            next.manual_verification_requested = true;
            next.status = S::PendingClientAction;
        }
        (S::PendingClientAction, Trigger::Reupload { document, analysis }) => {
            let decision = gate.evaluate(analysis);
            let description = gate.describe(analysis, decision);
            match decision {
                GateDecision::Pass => {
                    open_outreach(&mut next.timeline, description, now)?;
                    next.status = S::InstitutionOutreach;
                }
                GateDecision::NeedsReview => {
                    next.timeline
                        .advance(Stage::Analysis, StepStatus::Error, description, now)?;
                    next.status = S::ReviewRequired;
                }
            }
            next.document = Some(document.clone());
            next.ai_analysis = Some(analysis.clone());
        }
        (S::PendingClientAction, Trigger::Officer(A::OverrideApprove)) => {
            open_outreach(
                &mut next.timeline,
                "Manual override: document accepted by verification officer.",
                now,
            )?;
            next.status = S::InstitutionOutreach;
        }
        (S::InstitutionOutreach, Trigger::Officer(A::MarkAuthenticated)) => {
            require_stage(Stage::Outreach)?;
            next.timeline.advance(
                Stage::Outreach,
                StepStatus::Completed,
                "Registrar confirmed enrollment and graduation.",
                now,
            )?;
            next.timeline.advance(
                Stage::Final,
                StepStatus::Current,
                "Preparing the final verification report.",
                now,
            )?;
            next.verification_outcome = Some(VerificationOutcome::Success);
            next.status = S::Processing;
        }
        (S::InstitutionOutreach, Trigger::Officer(A::MarkOutreachFailed { reason })) => {
            let reason = required_reason(Some(reason), trigger)?;
            require_stage(Stage::Outreach)?;
            next.timeline
                .advance(Stage::Outreach, StepStatus::Error, reason.clone(), now)?;
            next.timeline
                .mark_terminal(format!("Verification failed: {reason}"), now)?;
            next.verification_outcome = Some(VerificationOutcome::Failure);
            next.final_report_note = Some(reason);
            next.status = S::Rejected;
        }
        (S::Processing, Trigger::Officer(A::Finalize { note })) => {
            require_stage(Stage::Final)?;
            if next.verification_outcome == Some(VerificationOutcome::Success) {
                let statement = note
                    .as_deref()
                    .map(str::trim)
                    .filter(|note| !note.is_empty())
                    .unwrap_or(STANDARD_VERIFICATION_STATEMENT)
                    .to_string();
                next.timeline.mark_terminal("Verified successfully.", now)?;
                next.final_report_note = Some(statement);
                next.status = S::Verified;
            } else {
                let reason = required_reason(note.as_ref(), trigger)?;
                next.timeline
                    .mark_terminal(format!("Verification failed: {reason}"), now)?;
                next.verification_outcome = Some(VerificationOutcome::Failure);
                next.final_report_note = Some(reason);
                next.status = S::Rejected;
            }
        }
        _ => return Err(invalid()),
    }

    next.touch(now);
    Ok(Transition::Applied {
        request: next,
        from,
    })
}

/// Settle the analysis step as passed and make outreach the active stage.
fn open_outreach(
    timeline: &mut Timeline,
    analysis_description: impl Into<String>,
    now: DateTime<Utc>,
) -> Result<(), TimelineError> {
    timeline.advance(
        Stage::Analysis,
        StepStatus::Completed,
        analysis_description,
        now,
    )?;
    timeline.advance(Stage::Outreach, StepStatus::Current, OUTREACH_STARTED, now)
}

fn required_reason(reason: Option<&String>, trigger: &Trigger) -> Result<String, LifecycleError> {
    reason
        .map(|reason| reason.trim())
        .filter(|reason| !reason.is_empty())
        .map(str::to_string)
        .ok_or(LifecycleError::MissingReason {
            trigger: trigger.name(),
        })
}
