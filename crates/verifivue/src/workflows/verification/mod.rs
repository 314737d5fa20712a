//! Verification request lifecycle: credit accounting, AI analysis routing, the four-stage
//! timeline, officer/client triggers, and the notifications each accepted transition emits.
//!
//! `lifecycle::apply` is a pure transition function; `VerificationService` wraps it with
//! repository access, per-account/per-request serialization, and notification fan-out.

pub mod analysis;
pub mod domain;
pub mod ledger;
pub mod lifecycle;
pub(crate) mod locks;
pub mod notifications;
pub mod report;
pub mod repository;
pub mod router;
pub mod service;
pub mod timeline;

#[cfg(test)]
mod tests;

pub use analysis::{AnalysisGate, AnalysisPolicy, GateDecision, REVIEW_CONFIDENCE_THRESHOLD};
pub use domain::{
    Account, AccountId, AccountRole, AccountStatus, AnalysisResult, CandidateFacts, DocumentRef,
    NewAccount, Package, PackageCatalog, PackageCredits, RequestId, RequestStatus,
    SubmissionInput, VerificationOutcome, VerificationRequest,
};
pub use ledger::{AccountLedger, Eligibility, LedgerError};
pub use lifecycle::{LifecycleError, OfficerAction, Transition, Trigger};
pub use notifications::{Notification, NotificationEmitter, NotificationId, NotificationKind};
pub use report::{AuditEntry, ClientSummary, DashboardSummary};
pub use repository::{
    AccountRepository, AnalysisError, DocumentAnalyzer, NotificationError, NotificationStore,
    RepositoryError, RequestRepository, RequestStatusView,
};
pub use router::verification_router;
pub use service::{Clock, SystemClock, VerificationService, VerificationServiceError};
pub use timeline::{Stage, StepStatus, Timeline, TimelineError, TimelineStep};
