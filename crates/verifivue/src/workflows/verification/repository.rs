use chrono::{DateTime, Utc};
use serde::Serialize;

use super::domain::{
    Account, AccountId, AnalysisResult, DocumentRef, RequestId, VerificationOutcome,
    VerificationRequest,
};
use super::notifications::{Notification, NotificationId};
use super::timeline::Stage;

/// Request storage. Implementations hand back owned records; the service never holds
/// references into storage.
pub trait RequestRepository: Send + Sync {
    fn insert(&self, request: VerificationRequest)
        -> Result<VerificationRequest, RepositoryError>;
    fn update(&self, request: VerificationRequest) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &RequestId) -> Result<Option<VerificationRequest>, RepositoryError>;
    fn list(&self) -> Result<Vec<VerificationRequest>, RepositoryError>;
    fn list_by_owner(&self, owner: &AccountId)
        -> Result<Vec<VerificationRequest>, RepositoryError>;
}

pub trait AccountRepository: Send + Sync {
    /// Fails with `Conflict` when the id is taken.
    fn insert(&self, account: Account) -> Result<Account, RepositoryError>;
    fn fetch(&self, id: &AccountId) -> Result<Option<Account>, RepositoryError>;
    fn update(&self, account: Account) -> Result<(), RepositoryError>;
    /// Fails with `NotFound` when no account has that id.
    fn delete(&self, id: &AccountId) -> Result<Account, RepositoryError>;
    fn list(&self) -> Result<Vec<Account>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Append-only notification inbox. Only the `read` flag is ever rewritten.
pub trait NotificationStore: Send + Sync {
    fn append(&self, notification: Notification) -> Result<(), NotificationError>;
    fn list_for(&self, user: &AccountId) -> Result<Vec<Notification>, NotificationError>;
    /// Returns `false` when the recipient holds no notification with that id.
    fn mark_read(&self, user: &AccountId, id: &NotificationId)
        -> Result<bool, NotificationError>;
    /// Bulk-delete one recipient's inbox, returning how many were removed.
    fn clear_for(&self, user: &AccountId) -> Result<usize, NotificationError>;
}

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("notification store unavailable: {0}")]
    Unavailable(String),
}

/// Document analysis collaborator (the AI call).
pub trait DocumentAnalyzer: Send + Sync {
    fn analyze(&self, document: &DocumentRef) -> Result<AnalysisResult, AnalysisError>;
}

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("document analyzer unavailable: {0}")]
    Unavailable(String),
    #[error("analyzer returned malformed output: {0}")]
    Malformed(String),
}

/// Sanitized representation of a request's exposed status.
#[derive(Debug, Clone, Serialize)]
pub struct RequestStatusView {
    pub request_id: RequestId,
    pub candidate_name: String,
    pub owner_name: String,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_stage: Option<Stage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence_score: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_outcome: Option<VerificationOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_report_note: Option<String>,
    pub last_updated: DateTime<Utc>,
}

impl VerificationRequest {
    pub fn status_view(&self) -> RequestStatusView {
        RequestStatusView {
            request_id: self.id.clone(),
            candidate_name: self.candidate.name.clone(),
            owner_name: self.owner_name.clone(),
            status: self.status.label(),
            active_stage: self.timeline.active_stage(),
            confidence_score: self
                .ai_analysis
                .as_ref()
                .map(|analysis| analysis.confidence_score),
            verification_outcome: self.verification_outcome,
            final_report_note: self.final_report_note.clone(),
            last_updated: self.last_updated,
        }
    }
}
