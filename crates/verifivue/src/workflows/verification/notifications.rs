use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    Account, AccountId, AccountStatus, Package, RequestId, RequestStatus, VerificationRequest,
};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NotificationId(pub String);

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Info,
    Success,
    Warning,
    Error,
}

/// Addressed message produced by an accepted transition, submission, or purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub user_id: AccountId,
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
    pub timestamp: DateTime<Utc>,
    pub read: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_request_id: Option<RequestId>,
}

/// Builds notifications for lifecycle events. Emission is pure apart from id allocation;
/// the caller appends the result to a `NotificationStore`.
#[derive(Debug, Default)]
pub struct NotificationEmitter {
    sequence: AtomicU64,
}

impl NotificationEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self) -> NotificationId {
        let id = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        NotificationId(format!("N-{id:06}"))
    }

    fn build(
        &self,
        user_id: &AccountId,
        kind: NotificationKind,
        title: &str,
        message: String,
        related: Option<&RequestId>,
        now: DateTime<Utc>,
    ) -> Notification {
        Notification {
            id: self.next_id(),
            user_id: user_id.clone(),
            title: title.to_string(),
            message,
            kind,
            timestamp: now,
            read: false,
            related_request_id: related.cloned(),
        }
    }

    /// Confirmation for the owner plus a heads-up for every active staff account. A staff
    /// owner receives both.
    pub fn on_submission(
        &self,
        request: &VerificationRequest,
        staff: &[Account],
        now: DateTime<Utc>,
    ) -> Vec<Notification> {
        let mut notifications = vec![self.build(
            &request.owner_id,
            NotificationKind::Success,
            "Request Submitted",
            format!(
                "Verification request for {} submitted successfully.",
                request.candidate.name
            ),
            Some(&request.id),
            now,
        )];

        notifications.extend(
            staff
                .iter()
                .filter(|account| {
                    account.role.is_staff() && account.status == AccountStatus::Active
                })
                .map(|account| {
                    self.build(
                        &account.id,
                        NotificationKind::Info,
                        "New Request Received",
                        format!(
                            "{} submitted {} for {}.",
                            request.owner_name, request.id, request.candidate.name
                        ),
                        Some(&request.id),
                        now,
                    )
                }),
        );

        notifications
    }

    /// At most one owner notification per status change.
    pub fn on_transition(
        &self,
        request: &VerificationRequest,
        old: RequestStatus,
        new: RequestStatus,
        now: DateTime<Utc>,
    ) -> Option<Notification> {
        if old == new {
            return None;
        }

        let name = &request.candidate.name;
        let (kind, title, message) = match new {
            RequestStatus::Verified => (
                NotificationKind::Success,
                "Verification Complete",
                format!("Credentials for {name} have been verified."),
            ),
            RequestStatus::Rejected => (
                NotificationKind::Error,
                "Verification Failed",
                match &request.final_report_note {
                    Some(reason) => format!("Verification for {name} was rejected: {reason}"),
                    None => format!("Verification for {name} was rejected."),
                },
            ),
            RequestStatus::InstitutionOutreach => (
                NotificationKind::Info,
                "Institution Outreach Started",
                format!(
                    "We are contacting {} to confirm the credentials of {name}.",
                    request.candidate.institution
                ),
            ),
            RequestStatus::PendingClientAction => (
                NotificationKind::Warning,
                "Action Required",
                format!("A clearer document is needed to continue verifying {name}."),
            ),
            RequestStatus::ReviewRequired => (
                NotificationKind::Warning,
                "Review Required",
                format!("The document for {name} needs review by a verification officer."),
            ),
            RequestStatus::Processing => (
                NotificationKind::Info,
                "Request Processing",
                format!("Verification for {name} is moving to final review."),
            ),
            RequestStatus::Draft | RequestStatus::Pending => (
                NotificationKind::Info,
                "Request Updated",
                format!("Verification for {name} is now {new}."),
            ),
        };

        Some(self.build(&request.owner_id, kind, title, message, Some(&request.id), now))
    }

    /// Confirmation to the administrator who added `account`.
    pub fn on_account_added(
        &self,
        actor: &AccountId,
        account: &Account,
        now: DateTime<Utc>,
    ) -> Notification {
        self.build(
            actor,
            NotificationKind::Success,
            "User Added",
            format!(
                "User {} ({}) has been added.",
                account.name,
                account.role.label()
            ),
            None,
            now,
        )
    }

    pub fn on_grant(
        &self,
        account: &Account,
        package: &Package,
        now: DateTime<Utc>,
    ) -> Notification {
        self.build(
            &account.id,
            NotificationKind::Success,
            "Purchase Successful",
            format!("You have successfully purchased the {} package.", package.name),
            None,
            now,
        )
    }
}
