use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard};
use verifivue::workflows::verification::{
    Account, AccountId, AccountRepository, AccountRole, AccountStatus, AnalysisError,
    AnalysisResult, DocumentAnalyzer, DocumentRef, Notification, NotificationError,
    NotificationId, NotificationStore, RepositoryError, RequestId, RequestRepository,
    VerificationRequest, VerificationService,
};

pub(crate) type InMemoryVerificationService = VerificationService<
    InMemoryRequestRepository,
    InMemoryAccountRepository,
    InMemoryNotificationStore,
    KeywordAnalyzer,
>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

fn lock<'a, T>(mutex: &'a Mutex<T>, what: &str) -> Result<MutexGuard<'a, T>, RepositoryError> {
    mutex
        .lock()
        .map_err(|_| RepositoryError::Unavailable(format!("{what} mutex poisoned")))
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryRequestRepository {
    records: Arc<Mutex<HashMap<RequestId, VerificationRequest>>>,
}

impl RequestRepository for InMemoryRequestRepository {
    fn insert(
        &self,
        request: VerificationRequest,
    ) -> Result<VerificationRequest, RepositoryError> {
        let mut guard = lock(&self.records, "request")?;
        if guard.contains_key(&request.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(request.id.clone(), request.clone());
        Ok(request)
    }

    fn update(&self, request: VerificationRequest) -> Result<(), RepositoryError> {
        let mut guard = lock(&self.records, "request")?;
        if guard.contains_key(&request.id) {
            guard.insert(request.id.clone(), request);
            Ok(())
        } else {
            Err(RepositoryError::NotFound)
        }
    }

    fn fetch(&self, id: &RequestId) -> Result<Option<VerificationRequest>, RepositoryError> {
        let guard = lock(&self.records, "request")?;
        Ok(guard.get(id).cloned())
    }

    fn list(&self) -> Result<Vec<VerificationRequest>, RepositoryError> {
        let guard = lock(&self.records, "request")?;
        Ok(guard.values().cloned().collect())
    }

    fn list_by_owner(
        &self,
        owner: &AccountId,
    ) -> Result<Vec<VerificationRequest>, RepositoryError> {
        let guard = lock(&self.records, "request")?;
        Ok(guard
            .values()
            .filter(|request| &request.owner_id == owner)
            .cloned()
            .collect())
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryAccountRepository {
    records: Arc<Mutex<HashMap<AccountId, Account>>>,
}

impl InMemoryAccountRepository {
    pub(crate) fn seeded(accounts: Vec<Account>) -> Self {
        let records = accounts
            .into_iter()
            .map(|account| (account.id.clone(), account))
            .collect();
        Self {
            records: Arc::new(Mutex::new(records)),
        }
    }
}

impl AccountRepository for InMemoryAccountRepository {
    fn insert(&self, account: Account) -> Result<Account, RepositoryError> {
        let mut guard = lock(&self.records, "account")?;
        if guard.contains_key(&account.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(account.id.clone(), account.clone());
        Ok(account)
    }

    fn fetch(&self, id: &AccountId) -> Result<Option<Account>, RepositoryError> {
        let guard = lock(&self.records, "account")?;
        Ok(guard.get(id).cloned())
    }

    fn update(&self, account: Account) -> Result<(), RepositoryError> {
        let mut guard = lock(&self.records, "account")?;
        guard.insert(account.id.clone(), account);
        Ok(())
    }

    fn delete(&self, id: &AccountId) -> Result<Account, RepositoryError> {
        let mut guard = lock(&self.records, "account")?;
        guard.remove(id).ok_or(RepositoryError::NotFound)
    }

    fn list(&self) -> Result<Vec<Account>, RepositoryError> {
        let guard = lock(&self.records, "account")?;
        let mut accounts: Vec<Account> = guard.values().cloned().collect();
        accounts.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(accounts)
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryNotificationStore {
    events: Arc<Mutex<Vec<Notification>>>,
}

impl InMemoryNotificationStore {
    fn events(&self) -> Result<MutexGuard<'_, Vec<Notification>>, NotificationError> {
        self.events
            .lock()
            .map_err(|_| NotificationError::Unavailable("notification mutex poisoned".to_string()))
    }
}

impl NotificationStore for InMemoryNotificationStore {
    fn append(&self, notification: Notification) -> Result<(), NotificationError> {
        self.events()?.push(notification);
        Ok(())
    }

    fn list_for(&self, user: &AccountId) -> Result<Vec<Notification>, NotificationError> {
        Ok(self
            .events()?
            .iter()
            .filter(|notification| &notification.user_id == user)
            .cloned()
            .collect())
    }

    fn mark_read(&self, user: &AccountId, id: &NotificationId) -> Result<bool, NotificationError> {
        let mut events = self.events()?;
        let Some(notification) = events
            .iter_mut()
            .find(|notification| &notification.user_id == user && &notification.id == id)
        else {
            return Ok(false);
        };
        notification.read = true;
        Ok(true)
    }

    fn clear_for(&self, user: &AccountId) -> Result<usize, NotificationError> {
        let mut events = self.events()?;
        let before = events.len();
        events.retain(|notification| &notification.user_id != user);
        Ok(before - events.len())
    }
}

/// Offline stand-in for the AI analyzer. Document names carry the outcome: `tampered`
/// flags tampering, `blurry` or `scan` lowers confidence, `offline` simulates an outage.
#[derive(Debug, Clone)]
pub(crate) struct KeywordAnalyzer {
    baseline: AnalysisResult,
}

impl KeywordAnalyzer {
    pub(crate) fn new(confidence_score: u8, is_tampered: bool) -> Self {
        let mut baseline = AnalysisResult::scored(confidence_score.min(100), is_tampered);
        baseline.authenticity_notes = "Offline keyword analysis.".to_string();
        Self { baseline }
    }
}

impl Default for KeywordAnalyzer {
    fn default() -> Self {
        Self::new(92, false)
    }
}

impl DocumentAnalyzer for KeywordAnalyzer {
    fn analyze(&self, document: &DocumentRef) -> Result<AnalysisResult, AnalysisError> {
        let name = document.0.to_ascii_lowercase();
        if name.contains("offline") {
            return Err(AnalysisError::Unavailable(
                "analysis backend unreachable".to_string(),
            ));
        }

        let mut result = self.baseline.clone();
        if name.contains("tampered") {
            result.is_tampered = true;
        }
        if name.contains("blurry") || name.contains("scan") {
            result.confidence_score = result.confidence_score.min(62);
        }
        Ok(result)
    }
}

fn seed_account(id: &str, name: &str, organization: &str, role: AccountRole, credits: u32) -> Account {
    Account {
        id: AccountId(id.to_string()),
        name: name.to_string(),
        email: format!("{id}@verifivue.example"),
        organization: organization.to_string(),
        role,
        credits,
        subscription_plan: None,
        subscription_expiry: None,
        status: AccountStatus::Active,
    }
}

/// Accounts available in a fresh in-memory deployment.
pub(crate) fn seed_accounts() -> Vec<Account> {
    vec![
        seed_account("u-admin", "Avery Admin", "VerifiVUE", AccountRole::Admin, 0),
        seed_account(
            "u-officer",
            "Olu Officer",
            "VerifiVUE",
            AccountRole::VerificationOfficer,
            0,
        ),
        seed_account(
            "client-1",
            "Casey Client",
            "Northwind Staffing",
            AccountRole::Client,
            3,
        ),
    ]
}
