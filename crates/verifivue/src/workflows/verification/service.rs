use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::analysis::{AnalysisGate, AnalysisPolicy};
use super::domain::{
    Account, AccountId, AccountRole, AccountStatus, AnalysisResult, DocumentRef, NewAccount,
    Package, PackageCatalog, RequestId, RequestStatus, SubmissionInput, VerificationRequest,
};
use super::ledger::{AccountLedger, LedgerError};
use super::lifecycle::{self, LifecycleError, OfficerAction, Transition, Trigger};
use super::locks::KeyedLocks;
use super::notifications::{Notification, NotificationEmitter, NotificationId};
use super::report::{AuditEntry, ClientSummary, DashboardSummary};
use super::repository::{
    AccountRepository, AnalysisError, DocumentAnalyzer, NotificationError, NotificationStore,
    RepositoryError, RequestRepository,
};
use super::timeline::TimelineError;

/// Source of the current instant, injectable for deterministic tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Service composing the ledger, analysis gate, lifecycle, and notification emitter over
/// the storage and analyzer collaborators.
pub struct VerificationService<R, A, N, D> {
    requests: Arc<R>,
    accounts: Arc<A>,
    notifications: Arc<N>,
    analyzer: Arc<D>,
    ledger: AccountLedger,
    gate: AnalysisGate,
    emitter: NotificationEmitter,
    catalog: RwLock<PackageCatalog>,
    clock: Arc<dyn Clock>,
    sequence: AtomicU64,
    account_sequence: AtomicU64,
    account_locks: KeyedLocks<AccountId>,
    request_locks: KeyedLocks<RequestId>,
}

impl<R, A, N, D> VerificationService<R, A, N, D>
where
    R: RequestRepository + 'static,
    A: AccountRepository + 'static,
    N: NotificationStore + 'static,
    D: DocumentAnalyzer + 'static,
{
    pub fn new(
        requests: Arc<R>,
        accounts: Arc<A>,
        notifications: Arc<N>,
        analyzer: Arc<D>,
        policy: AnalysisPolicy,
    ) -> Self {
        Self {
            requests,
            accounts,
            notifications,
            analyzer,
            ledger: AccountLedger::new(),
            gate: AnalysisGate::new(policy),
            emitter: NotificationEmitter::new(),
            catalog: RwLock::new(PackageCatalog::standard()),
            clock: Arc::new(SystemClock),
            sequence: AtomicU64::new(1),
            account_sequence: AtomicU64::new(1),
            account_locks: KeyedLocks::default(),
            request_locks: KeyedLocks::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_catalog(mut self, catalog: PackageCatalog) -> Self {
        self.catalog = RwLock::new(catalog);
        self
    }

    /// Snapshot of the packages currently on offer.
    pub fn catalog(&self) -> Result<PackageCatalog, VerificationServiceError> {
        let catalog = self
            .catalog
            .read()
            .map_err(|_| RepositoryError::Unavailable("package catalog poisoned".to_string()))?;
        Ok(catalog.clone())
    }

    pub fn gate(&self) -> &AnalysisGate {
        &self.gate
    }

    fn next_request_id(&self) -> RequestId {
        RequestId::from_sequence(self.sequence.fetch_add(1, Ordering::Relaxed))
    }

    fn next_account_id(&self) -> AccountId {
        let sequence = self.account_sequence.fetch_add(1, Ordering::Relaxed);
        AccountId(format!("user-{sequence:06}"))
    }

    /// Append notifications for a change that is already committed. A store failure is
    /// logged and skipped; it never fails or reverts the committed change.
    fn deliver(&self, notifications: impl IntoIterator<Item = Notification>) {
        for notification in notifications {
            let id = notification.id.clone();
            let user_id = notification.user_id.clone();
            if let Err(error) = self.notifications.append(notification) {
                warn!(
                    notification_id = %id,
                    user_id = %user_id,
                    error = %error,
                    "notification delivery failed"
                );
            }
        }
    }

    /// Submit a new request on behalf of `account_id`.
    ///
    /// A document without an attached result is analyzed first, outside any lock. The
    /// eligibility check, debit, and insert then run as one unit per account. Notifications
    /// are built before anything is written and delivered once the request is stored.
    pub fn submit(
        &self,
        account_id: &AccountId,
        mut input: SubmissionInput,
    ) -> Result<VerificationRequest, VerificationServiceError> {
        input.analysis = match (input.analysis.take(), input.document.as_ref()) {
            (Some(result), _) => Some(validated(result)?),
            (None, Some(document)) => Some(self.analyze(document)?),
            (None, None) => None,
        };

        let (request, notifications) = self
            .account_locks
            .with(account_id, || -> Result<_, VerificationServiceError> {
                let owner = self.fetch_account(account_id)?;
                let now = self.clock.now();
                let (request, charged) = lifecycle::submit(
                    self.next_request_id(),
                    input,
                    &owner,
                    &self.ledger,
                    &self.gate,
                    now,
                )
                .map_err(|error| {
                    warn!(account_id = %account_id, error = %error, "submission rejected");
                    VerificationServiceError::from(error)
                })?;

                let staff: Vec<Account> = self
                    .accounts
                    .list()?
                    .into_iter()
                    .filter(|account| account.role.is_staff())
                    .collect();
                let notifications = self.emitter.on_submission(&request, &staff, now);

                if charged != owner {
                    self.accounts.update(charged.clone())?;
                }
                if let Err(error) = self.requests.insert(request.clone()) {
                    if charged != owner {
                        self.accounts.update(owner)?;
                    }
                    return Err(error.into());
                }

                info!(
                    request_id = %request.id,
                    account_id = %account_id,
                    status = %request.status,
                    credits = charged.credits,
                    "verification request submitted"
                );
                Ok((request, notifications))
            })?;

        self.deliver(notifications);
        Ok(request)
    }

    /// Apply an officer decision to an existing request.
    pub fn apply_officer_action(
        &self,
        request_id: &RequestId,
        action: OfficerAction,
    ) -> Result<VerificationRequest, VerificationServiceError> {
        self.apply_trigger(request_id, Trigger::Officer(action))
    }

    /// Client re-upload after a manual review request. The analyzer runs before the
    /// request lock is taken; the guards then see the fresh record.
    pub fn reupload(
        &self,
        request_id: &RequestId,
        document: DocumentRef,
    ) -> Result<VerificationRequest, VerificationServiceError> {
        let analysis = self.analyze(&document)?;
        self.apply_trigger(request_id, Trigger::Reupload { document, analysis })
    }

    fn apply_trigger(
        &self,
        request_id: &RequestId,
        trigger: Trigger,
    ) -> Result<VerificationRequest, VerificationServiceError> {
        self.request_locks.with(request_id, || -> Result<_, VerificationServiceError> {
            let current = self.fetch_request(request_id)?;
            let now = self.clock.now();

            let transition =
                lifecycle::apply(&current, &trigger, &self.gate, now).map_err(|error| {
                    warn!(
                        request_id = %request_id,
                        trigger = trigger.name(),
                        error = %error,
                        "transition rejected"
                    );
                    VerificationServiceError::from(error)
                })?;

            match transition {
                Transition::Unchanged(request) => Ok(request),
                Transition::Applied { request, from } => {
                    let notification =
                        self.emitter.on_transition(&request, from, request.status, now);
                    self.requests.update(request.clone())?;
                    info!(
                        request_id = %request.id,
                        trigger = trigger.name(),
                        from = %from,
                        to = %request.status,
                        "transition applied"
                    );

                    self.deliver(notification);
                    Ok(request)
                }
            }
        })
    }

    /// Apply a purchased package from the catalog to an account.
    pub fn grant_package(
        &self,
        account_id: &AccountId,
        package_id: &str,
    ) -> Result<Account, VerificationServiceError> {
        let package = self
            .catalog()?
            .find(package_id)
            .cloned()
            .ok_or_else(|| VerificationServiceError::PackageNotFound(package_id.to_string()))?;

        let now = self.clock.now();
        let (account, receipt) = self
            .account_locks
            .with(account_id, || -> Result<_, VerificationServiceError> {
                let account = self.fetch_account(account_id)?;
                let updated = self.ledger.grant(&account, &package, now);
                let receipt = self.emitter.on_grant(&updated, &package, now);
                self.accounts.update(updated.clone())?;
                Ok((updated, receipt))
            })?;

        info!(
            account_id = %account_id,
            package = %package.id,
            credits = account.credits,
            "package granted"
        );
        self.deliver([receipt]);
        Ok(account)
    }

    pub fn set_account_status(
        &self,
        account_id: &AccountId,
        status: AccountStatus,
    ) -> Result<Account, VerificationServiceError> {
        self.account_locks.with(account_id, || -> Result<_, VerificationServiceError> {
            let mut account = self.fetch_account(account_id)?;
            account.status = status;
            self.accounts.update(account.clone())?;
            info!(account_id = %account_id, status = ?status, "account status changed");
            Ok(account)
        })
    }

    /// Create an active account on behalf of an administrator, who is notified.
    pub fn add_account(
        &self,
        actor_id: &AccountId,
        draft: NewAccount,
    ) -> Result<Account, VerificationServiceError> {
        let actor = self.require_admin(actor_id)?;
        let account_id = self.next_account_id();
        let now = self.clock.now();

        let (account, notice) =
            self.account_locks
                .with(&account_id, || -> Result<_, VerificationServiceError> {
                    let account = draft.into_account(account_id.clone());
                    let notice = self.emitter.on_account_added(&actor.id, &account, now);
                    let account = self.accounts.insert(account)?;
                    Ok((account, notice))
                })?;

        info!(
            actor = %actor.id,
            account_id = %account.id,
            role = account.role.label(),
            "account added"
        );
        self.deliver([notice]);
        Ok(account)
    }

    /// Replace an existing account's details. The id is taken from `account`.
    pub fn update_account(
        &self,
        actor_id: &AccountId,
        account: Account,
    ) -> Result<Account, VerificationServiceError> {
        let actor = self.require_admin(actor_id)?;
        let account_id = account.id.clone();
        self.account_locks.with(&account_id, || -> Result<_, VerificationServiceError> {
            self.fetch_account(&account_id)?;
            self.accounts.update(account.clone())?;
            info!(actor = %actor.id, account_id = %account_id, "account updated");
            Ok(account)
        })
    }

    /// Remove an account. Requests it owns are kept.
    pub fn delete_account(
        &self,
        actor_id: &AccountId,
        account_id: &AccountId,
    ) -> Result<Account, VerificationServiceError> {
        let actor = self.require_admin(actor_id)?;
        self.account_locks.with(account_id, || -> Result<_, VerificationServiceError> {
            let removed = self.accounts.delete(account_id).map_err(|error| match error {
                RepositoryError::NotFound => {
                    VerificationServiceError::AccountNotFound(account_id.clone())
                }
                other => other.into(),
            })?;
            info!(actor = %actor.id, account_id = %account_id, "account deleted");
            Ok(removed)
        })
    }

    pub fn add_package(
        &self,
        actor_id: &AccountId,
        package: Package,
    ) -> Result<Package, VerificationServiceError> {
        let actor = self.require_admin(actor_id)?;
        let mut catalog = self.catalog_mut()?;
        if !catalog.add(package.clone()) {
            return Err(VerificationServiceError::PackageExists(package.id));
        }
        info!(actor = %actor.id, package = %package.id, "package added");
        Ok(package)
    }

    pub fn update_package(
        &self,
        actor_id: &AccountId,
        package: Package,
    ) -> Result<Package, VerificationServiceError> {
        let actor = self.require_admin(actor_id)?;
        let mut catalog = self.catalog_mut()?;
        if !catalog.replace(package.clone()) {
            return Err(VerificationServiceError::PackageNotFound(package.id));
        }
        info!(actor = %actor.id, package = %package.id, "package updated");
        Ok(package)
    }

    /// Withdraw a package from sale. Grants already applied are unaffected.
    pub fn delete_package(
        &self,
        actor_id: &AccountId,
        package_id: &str,
    ) -> Result<Package, VerificationServiceError> {
        let actor = self.require_admin(actor_id)?;
        let removed = self
            .catalog_mut()?
            .remove(package_id)
            .ok_or_else(|| VerificationServiceError::PackageNotFound(package_id.to_string()))?;
        info!(actor = %actor.id, package = %removed.id, "package removed");
        Ok(removed)
    }

    pub fn get(
        &self,
        request_id: &RequestId,
    ) -> Result<VerificationRequest, VerificationServiceError> {
        self.fetch_request(request_id)
    }

    pub fn account(&self, account_id: &AccountId) -> Result<Account, VerificationServiceError> {
        self.fetch_account(account_id)
    }

    /// Staff see every request, clients only their own. Newest first.
    pub fn list_visible(
        &self,
        viewer_id: &AccountId,
    ) -> Result<Vec<VerificationRequest>, VerificationServiceError> {
        let viewer = self.fetch_account(viewer_id)?;
        self.visible_to(&viewer)
    }

    fn visible_to(
        &self,
        viewer: &Account,
    ) -> Result<Vec<VerificationRequest>, VerificationServiceError> {
        let mut requests = if viewer.role.is_staff() {
            self.requests.list()?
        } else {
            self.requests.list_by_owner(&viewer.id)?
        };
        requests.sort_by(|a, b| {
            b.submission_date
                .cmp(&a.submission_date)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(requests)
    }

    pub fn notifications_for(
        &self,
        user: &AccountId,
    ) -> Result<Vec<Notification>, VerificationServiceError> {
        let mut notifications = self.notifications.list_for(user)?;
        notifications.sort_by(|a, b| {
            b.timestamp
                .cmp(&a.timestamp)
                .then_with(|| b.id.0.cmp(&a.id.0))
        });
        Ok(notifications)
    }

    pub fn mark_notification_read(
        &self,
        user: &AccountId,
        id: &NotificationId,
    ) -> Result<(), VerificationServiceError> {
        if self.notifications.mark_read(user, id)? {
            Ok(())
        } else {
            Err(VerificationServiceError::NotificationNotFound(id.clone()))
        }
    }

    pub fn clear_notifications(&self, user: &AccountId) -> Result<usize, VerificationServiceError> {
        Ok(self.notifications.clear_for(user)?)
    }

    pub fn dashboard(
        &self,
        viewer_id: &AccountId,
    ) -> Result<DashboardSummary, VerificationServiceError> {
        let viewer = self.fetch_account(viewer_id)?;
        let requests = self.visible_to(&viewer)?;
        Ok(DashboardSummary::for_viewer(&viewer, &requests, self.clock.now()))
    }

    /// Per-client request counts. Staff only.
    pub fn client_summaries(
        &self,
        viewer_id: &AccountId,
    ) -> Result<Vec<ClientSummary>, VerificationServiceError> {
        let viewer = self.fetch_account(viewer_id)?;
        if !viewer.role.is_staff() {
            return Err(VerificationServiceError::StaffOnly(viewer.id));
        }
        let accounts = self.accounts.list()?;
        let requests = self.requests.list()?;
        Ok(ClientSummary::collect(&accounts, &requests))
    }

    pub fn audit_log(
        &self,
        viewer_id: &AccountId,
    ) -> Result<Vec<AuditEntry>, VerificationServiceError> {
        let viewer = self.fetch_account(viewer_id)?;
        let requests = self.visible_to(&viewer)?;
        Ok(AuditEntry::collect(&requests))
    }

    fn analyze(&self, document: &DocumentRef) -> Result<AnalysisResult, VerificationServiceError> {
        let result = self.analyzer.analyze(document).map_err(|error| {
            warn!(document = %document.0, error = %error, "document analysis failed");
            VerificationServiceError::AnalysisUnavailable(error)
        })?;
        validated(result)
    }

    fn fetch_request(
        &self,
        id: &RequestId,
    ) -> Result<VerificationRequest, VerificationServiceError> {
        self.requests
            .fetch(id)?
            .ok_or_else(|| VerificationServiceError::RequestNotFound(id.clone()))
    }

    fn fetch_account(&self, id: &AccountId) -> Result<Account, VerificationServiceError> {
        self.accounts
            .fetch(id)?
            .ok_or_else(|| VerificationServiceError::AccountNotFound(id.clone()))
    }

    fn require_admin(&self, id: &AccountId) -> Result<Account, VerificationServiceError> {
        let account = self.fetch_account(id)?;
        if account.role != AccountRole::Admin {
            warn!(account_id = %id, "administrative operation refused");
            return Err(VerificationServiceError::AdminOnly(account.id));
        }
        Ok(account)
    }

    fn catalog_mut(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, PackageCatalog>, VerificationServiceError> {
        self.catalog.write().map_err(|_| {
            VerificationServiceError::Repository(RepositoryError::Unavailable(
                "package catalog poisoned".to_string(),
            ))
        })
    }
}

fn validated(result: AnalysisResult) -> Result<AnalysisResult, VerificationServiceError> {
    if result.confidence_score > 100 {
        return Err(VerificationServiceError::AnalysisUnavailable(
            AnalysisError::Malformed(format!(
                "confidence score {} is outside 0-100",
                result.confidence_score
            )),
        ));
    }
    Ok(result)
}

/// Error raised by the verification service.
#[derive(Debug, thiserror::Error)]
pub enum VerificationServiceError {
    #[error("account {0} has insufficient credits")]
    InsufficientCredits(AccountId),
    #[error("account {0} is suspended")]
    AccountSuspended(AccountId),
    #[error("cannot apply {trigger} while request is {status}")]
    InvalidTransition {
        status: RequestStatus,
        trigger: &'static str,
    },
    #[error("{trigger} requires a non-empty reason")]
    MissingReason { trigger: &'static str },
    #[error(transparent)]
    AnalysisUnavailable(AnalysisError),
    #[error("timeline rejected the transition: {0}")]
    Timeline(TimelineError),
    #[error("request {0} not found")]
    RequestNotFound(RequestId),
    #[error("account {0} not found")]
    AccountNotFound(AccountId),
    #[error("package {0} not found")]
    PackageNotFound(String),
    #[error("package {0} already exists")]
    PackageExists(String),
    #[error("notification {0} not found")]
    NotificationNotFound(NotificationId),
    #[error("account {0} is not a staff account")]
    StaffOnly(AccountId),
    #[error("account {0} is not an administrator")]
    AdminOnly(AccountId),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Notification(#[from] NotificationError),
}

impl VerificationServiceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InsufficientCredits(_) => StatusCode::PAYMENT_REQUIRED,
            Self::AccountSuspended(_) | Self::StaffOnly(_) | Self::AdminOnly(_) => {
                StatusCode::FORBIDDEN
            }
            Self::InvalidTransition { .. } | Self::Timeline(_) | Self::PackageExists(_) => {
                StatusCode::CONFLICT
            }
            Self::MissingReason { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::AnalysisUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::RequestNotFound(_)
            | Self::AccountNotFound(_)
            | Self::PackageNotFound(_)
            | Self::NotificationNotFound(_)
            | Self::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
            Self::Repository(RepositoryError::Conflict) => StatusCode::CONFLICT,
            Self::Repository(_) | Self::Notification(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Safe to retry without changing the input.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::AnalysisUnavailable(_))
    }
}

impl From<LifecycleError> for VerificationServiceError {
    fn from(error: LifecycleError) -> Self {
        match error {
            LifecycleError::InvalidTransition { status, trigger } => {
                Self::InvalidTransition { status, trigger }
            }
            LifecycleError::MissingReason { trigger } => Self::MissingReason { trigger },
            LifecycleError::Ledger(error) => error.into(),
            LifecycleError::Timeline(error) => Self::Timeline(error),
        }
    }
}

impl From<LedgerError> for VerificationServiceError {
    fn from(error: LedgerError) -> Self {
        match error {
            LedgerError::InsufficientCredits(id) => Self::InsufficientCredits(id),
            LedgerError::AccountSuspended(id) => Self::AccountSuspended(id),
        }
    }
}
