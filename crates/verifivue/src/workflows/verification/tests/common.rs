use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;

use crate::workflows::verification::domain::{
    Account, AccountId, AccountRole, AccountStatus, AnalysisResult, CandidateFacts, DocumentRef,
    RequestId, SubmissionInput, VerificationRequest,
};
use crate::workflows::verification::notifications::{Notification, NotificationId};
use crate::workflows::verification::repository::{
    AccountRepository, AnalysisError, DocumentAnalyzer, NotificationError, NotificationStore,
    RepositoryError, RequestRepository,
};
use crate::workflows::verification::{
    verification_router, AnalysisPolicy, Clock, VerificationService,
};

pub(super) type TestService =
    VerificationService<MemoryRequests, MemoryAccounts, MemoryNotifications, StubAnalyzer>;

pub(super) fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 14, 9, 0, 0)
        .single()
        .expect("valid start instant")
}

pub(super) fn client_id() -> AccountId {
    AccountId("client-1".to_string())
}

pub(super) fn officer_id() -> AccountId {
    AccountId("u-officer".to_string())
}

pub(super) fn admin_id() -> AccountId {
    AccountId("u-admin".to_string())
}

pub(super) fn client(credits: u32) -> Account {
    Account {
        id: client_id(),
        name: "Dana Whitfield".to_string(),
        email: "dana@northwind.example".to_string(),
        organization: "Northwind Staffing".to_string(),
        role: AccountRole::Client,
        credits,
        subscription_plan: None,
        subscription_expiry: None,
        status: AccountStatus::Active,
    }
}

pub(super) fn officer() -> Account {
    Account {
        id: officer_id(),
        name: "Sam Okafor".to_string(),
        email: "sam@verifivue.example".to_string(),
        organization: "VerifiVUE".to_string(),
        role: AccountRole::VerificationOfficer,
        credits: 0,
        subscription_plan: None,
        subscription_expiry: None,
        status: AccountStatus::Active,
    }
}

pub(super) fn admin() -> Account {
    Account {
        id: admin_id(),
        name: "Riley Chen".to_string(),
        email: "riley@verifivue.example".to_string(),
        organization: "VerifiVUE".to_string(),
        role: AccountRole::Admin,
        credits: 0,
        subscription_plan: None,
        subscription_expiry: None,
        status: AccountStatus::Active,
    }
}

pub(super) fn candidate() -> CandidateFacts {
    CandidateFacts {
        name: "Jordan Alvarez".to_string(),
        institution: "University of Lagos".to_string(),
        degree: "BSc Computer Science".to_string(),
        graduation_year: "2019".to_string(),
    }
}

pub(super) fn analysis(confidence_score: u8, is_tampered: bool) -> AnalysisResult {
    AnalysisResult {
        extracted_name: "Jordan Alvarez".to_string(),
        extracted_institution: "University of Lagos".to_string(),
        extracted_degree: "BSc Computer Science".to_string(),
        extracted_date: "2019-07-12".to_string(),
        confidence_score,
        authenticity_notes: "Seal and signature consistent.".to_string(),
        is_tampered,
    }
}

pub(super) fn submission_with(result: AnalysisResult) -> SubmissionInput {
    SubmissionInput {
        candidate: candidate(),
        document: Some(DocumentRef("s3://verifivue/docs/diploma.pdf".to_string())),
        analysis: Some(result),
    }
}

pub(super) fn manual_submission() -> SubmissionInput {
    SubmissionInput {
        candidate: candidate(),
        document: None,
        analysis: None,
    }
}

pub(super) fn document(name: &str) -> DocumentRef {
    DocumentRef(format!("s3://verifivue/docs/{name}"))
}

/// Clock that only moves when told to.
pub(super) struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub(super) fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub(super) fn advance(&self, minutes: i64) {
        let mut now = self.now.lock().expect("clock mutex poisoned");
        *now += Duration::minutes(minutes);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock mutex poisoned")
    }
}

pub(super) struct Harness {
    pub(super) service: Arc<TestService>,
    pub(super) requests: Arc<MemoryRequests>,
    pub(super) accounts: Arc<MemoryAccounts>,
    pub(super) notifications: Arc<MemoryNotifications>,
    pub(super) analyzer: Arc<StubAnalyzer>,
    pub(super) clock: Arc<ManualClock>,
}

impl Harness {
    pub(super) fn router(&self) -> axum::Router {
        verification_router(self.service.clone())
    }

    pub(super) fn stored(&self, id: &RequestId) -> VerificationRequest {
        self.requests
            .fetch(id)
            .expect("fetch succeeds")
            .expect("request present")
    }

    pub(super) fn account(&self, id: &AccountId) -> Account {
        AccountRepository::fetch(self.accounts.as_ref(), id)
            .expect("fetch succeeds")
            .expect("account present")
    }
}

pub(super) fn harness_with(accounts: Vec<Account>) -> Harness {
    let requests = Arc::new(MemoryRequests::default());
    let store = Arc::new(MemoryAccounts::with(accounts));
    let notifications = Arc::new(MemoryNotifications::default());
    let analyzer = Arc::new(StubAnalyzer::returning(analysis(92, false)));
    let clock = Arc::new(ManualClock::new(start()));
    let service = VerificationService::new(
        requests.clone(),
        store.clone(),
        notifications.clone(),
        analyzer.clone(),
        AnalysisPolicy::default(),
    )
    .with_clock(clock.clone());
    let service = Arc::new(service);

    Harness {
        service,
        requests,
        accounts: store,
        notifications,
        analyzer,
        clock,
    }
}

pub(super) fn harness(credits: u32) -> Harness {
    harness_with(vec![client(credits), officer(), admin()])
}

#[derive(Default, Clone)]
pub(super) struct MemoryRequests {
    records: Arc<Mutex<HashMap<RequestId, VerificationRequest>>>,
}

impl MemoryRequests {
    pub(super) fn len(&self) -> usize {
        self.records.lock().expect("repository mutex poisoned").len()
    }
}

impl RequestRepository for MemoryRequests {
    fn insert(
        &self,
        request: VerificationRequest,
    ) -> Result<VerificationRequest, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if guard.contains_key(&request.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(request.id.clone(), request.clone());
        Ok(request)
    }

    fn update(&self, request: VerificationRequest) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        guard.insert(request.id.clone(), request);
        Ok(())
    }

    fn fetch(&self, id: &RequestId) -> Result<Option<VerificationRequest>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn list(&self) -> Result<Vec<VerificationRequest>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.values().cloned().collect())
    }

    fn list_by_owner(
        &self,
        owner: &AccountId,
    ) -> Result<Vec<VerificationRequest>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard
            .values()
            .filter(|request| &request.owner_id == owner)
            .cloned()
            .collect())
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryAccounts {
    records: Arc<Mutex<HashMap<AccountId, Account>>>,
}

impl MemoryAccounts {
    pub(super) fn with(accounts: Vec<Account>) -> Self {
        let records = accounts
            .into_iter()
            .map(|account| (account.id.clone(), account))
            .collect();
        Self {
            records: Arc::new(Mutex::new(records)),
        }
    }
}

impl AccountRepository for MemoryAccounts {
    fn insert(&self, account: Account) -> Result<Account, RepositoryError> {
        let mut guard = self.records.lock().expect("account mutex poisoned");
        if guard.contains_key(&account.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(account.id.clone(), account.clone());
        Ok(account)
    }

    fn fetch(&self, id: &AccountId) -> Result<Option<Account>, RepositoryError> {
        let guard = self.records.lock().expect("account mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn update(&self, account: Account) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("account mutex poisoned");
        guard.insert(account.id.clone(), account);
        Ok(())
    }

    fn delete(&self, id: &AccountId) -> Result<Account, RepositoryError> {
        let mut guard = self.records.lock().expect("account mutex poisoned");
        guard.remove(id).ok_or(RepositoryError::NotFound)
    }

    fn list(&self) -> Result<Vec<Account>, RepositoryError> {
        let guard = self.records.lock().expect("account mutex poisoned");
        let mut accounts: Vec<Account> = guard.values().cloned().collect();
        accounts.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(accounts)
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryNotifications {
    events: Arc<Mutex<Vec<Notification>>>,
    offline: Arc<AtomicBool>,
}

impl MemoryNotifications {
    /// Every later `append` fails until the store comes back.
    pub(super) fn go_offline(&self) {
        self.offline.store(true, Ordering::SeqCst);
    }

    pub(super) fn come_online(&self) {
        self.offline.store(false, Ordering::SeqCst);
    }

    pub(super) fn events(&self) -> Vec<Notification> {
        self.events.lock().expect("notification mutex poisoned").clone()
    }

    pub(super) fn for_user(&self, user: &AccountId) -> Vec<Notification> {
        self.events()
            .into_iter()
            .filter(|notification| &notification.user_id == user)
            .collect()
    }
}

impl NotificationStore for MemoryNotifications {
    fn append(&self, notification: Notification) -> Result<(), NotificationError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(NotificationError::Unavailable("inbox offline".to_string()));
        }
        self.events
            .lock()
            .expect("notification mutex poisoned")
            .push(notification);
        Ok(())
    }

    fn list_for(&self, user: &AccountId) -> Result<Vec<Notification>, NotificationError> {
        Ok(self.for_user(user))
    }

    fn mark_read(&self, user: &AccountId, id: &NotificationId) -> Result<bool, NotificationError> {
        let mut guard = self.events.lock().expect("notification mutex poisoned");
        match guard
            .iter_mut()
            .find(|notification| &notification.user_id == user && &notification.id == id)
        {
            Some(notification) => {
                notification.read = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn clear_for(&self, user: &AccountId) -> Result<usize, NotificationError> {
        let mut guard = self.events.lock().expect("notification mutex poisoned");
        let before = guard.len();
        guard.retain(|notification| &notification.user_id != user);
        Ok(before - guard.len())
    }
}

/// Analyzer that replays queued results, then falls back to a default.
pub(super) struct StubAnalyzer {
    queued: Mutex<VecDeque<Result<AnalysisResult, AnalysisError>>>,
    fallback: AnalysisResult,
    calls: Mutex<usize>,
}

impl StubAnalyzer {
    pub(super) fn returning(fallback: AnalysisResult) -> Self {
        Self {
            queued: Mutex::new(VecDeque::new()),
            fallback,
            calls: Mutex::new(0),
        }
    }

    pub(super) fn push(&self, outcome: Result<AnalysisResult, AnalysisError>) {
        self.queued
            .lock()
            .expect("analyzer mutex poisoned")
            .push_back(outcome);
    }

    pub(super) fn calls(&self) -> usize {
        *self.calls.lock().expect("analyzer mutex poisoned")
    }
}

impl DocumentAnalyzer for StubAnalyzer {
    fn analyze(&self, _document: &DocumentRef) -> Result<AnalysisResult, AnalysisError> {
        *self.calls.lock().expect("analyzer mutex poisoned") += 1;
        self.queued
            .lock()
            .expect("analyzer mutex poisoned")
            .pop_front()
            .unwrap_or_else(|| Ok(self.fallback.clone()))
    }
}

pub(super) struct UnavailableRequests;

impl RequestRepository for UnavailableRequests {
    fn insert(
        &self,
        _request: VerificationRequest,
    ) -> Result<VerificationRequest, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn update(&self, _request: VerificationRequest) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch(&self, _id: &RequestId) -> Result<Option<VerificationRequest>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn list(&self) -> Result<Vec<VerificationRequest>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn list_by_owner(
        &self,
        _owner: &AccountId,
    ) -> Result<Vec<VerificationRequest>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
