//! End-to-end scenarios for the verification lifecycle, driven through the public service
//! facade with in-memory collaborators.

mod common {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use chrono::{DateTime, TimeZone, Utc};

    use verifivue::workflows::verification::{
        Account, AccountId, AccountRepository, AccountRole, AccountStatus, AnalysisError,
        AnalysisPolicy, AnalysisResult, CandidateFacts, Clock, DocumentAnalyzer, DocumentRef,
        Notification, NotificationError, NotificationId, NotificationStore, RepositoryError,
        RequestId, RequestRepository, SubmissionInput, VerificationRequest, VerificationService,
    };

    pub(super) type Service = VerificationService<Requests, Accounts, Inbox, FixedAnalyzer>;

    pub(super) fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 2, 14, 30, 0)
            .single()
            .expect("valid instant")
    }

    pub(super) fn owner() -> AccountId {
        AccountId("client-1".to_string())
    }

    fn account(id: &str, role: AccountRole, credits: u32) -> Account {
        Account {
            id: AccountId(id.to_string()),
            name: format!("{id} user"),
            email: format!("{id}@example.com"),
            organization: "Acme Recruiting".to_string(),
            role,
            credits,
            subscription_plan: None,
            subscription_expiry: None,
            status: AccountStatus::Active,
        }
    }

    pub(super) fn result(confidence_score: u8) -> AnalysisResult {
        AnalysisResult::scored(confidence_score, false)
    }

    pub(super) fn input(confidence_score: u8) -> SubmissionInput {
        SubmissionInput {
            candidate: CandidateFacts {
                name: "Priya Natarajan".to_string(),
                institution: "University of Toronto".to_string(),
                degree: "MEng Electrical".to_string(),
                graduation_year: "2017".to_string(),
            },
            document: Some(DocumentRef("uploads/priya-degree.pdf".to_string())),
            analysis: Some(result(confidence_score)),
        }
    }

    pub(super) struct FixedClock(pub(super) DateTime<Utc>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    #[derive(Default)]
    pub(super) struct Requests(Mutex<HashMap<RequestId, VerificationRequest>>);

    impl RequestRepository for Requests {
        fn insert(
            &self,
            request: VerificationRequest,
        ) -> Result<VerificationRequest, RepositoryError> {
            let mut guard = self.0.lock().expect("requests mutex poisoned");
            if guard.contains_key(&request.id) {
                return Err(RepositoryError::Conflict);
            }
            guard.insert(request.id.clone(), request.clone());
            Ok(request)
        }

        fn update(&self, request: VerificationRequest) -> Result<(), RepositoryError> {
            self.0
                .lock()
                .expect("requests mutex poisoned")
                .insert(request.id.clone(), request);
            Ok(())
        }

        fn fetch(&self, id: &RequestId) -> Result<Option<VerificationRequest>, RepositoryError> {
            Ok(self.0.lock().expect("requests mutex poisoned").get(id).cloned())
        }

        fn list(&self) -> Result<Vec<VerificationRequest>, RepositoryError> {
            Ok(self
                .0
                .lock()
                .expect("requests mutex poisoned")
                .values()
                .cloned()
                .collect())
        }

        fn list_by_owner(
            &self,
            owner: &AccountId,
        ) -> Result<Vec<VerificationRequest>, RepositoryError> {
            Ok(self
                .list()?
                .into_iter()
                .filter(|request| &request.owner_id == owner)
                .collect())
        }
    }

    pub(super) struct Accounts(Mutex<HashMap<AccountId, Account>>);

    impl Accounts {
        pub(super) fn seeded(client_credits: u32) -> Self {
            let accounts = [
                account("client-1", AccountRole::Client, client_credits),
                account("u-officer", AccountRole::VerificationOfficer, 0),
            ];
            Self(Mutex::new(
                accounts
                    .into_iter()
                    .map(|account| (account.id.clone(), account))
                    .collect(),
            ))
        }
    }

    impl AccountRepository for Accounts {
        fn insert(&self, account: Account) -> Result<Account, RepositoryError> {
            let mut guard = self.0.lock().expect("accounts mutex poisoned");
            if guard.contains_key(&account.id) {
                return Err(RepositoryError::Conflict);
            }
            guard.insert(account.id.clone(), account.clone());
            Ok(account)
        }

        fn fetch(&self, id: &AccountId) -> Result<Option<Account>, RepositoryError> {
            Ok(self.0.lock().expect("accounts mutex poisoned").get(id).cloned())
        }

        fn update(&self, account: Account) -> Result<(), RepositoryError> {
            self.0
                .lock()
                .expect("accounts mutex poisoned")
                .insert(account.id.clone(), account);
            Ok(())
        }

        fn delete(&self, id: &AccountId) -> Result<Account, RepositoryError> {
            self.0
                .lock()
                .expect("accounts mutex poisoned")
                .remove(id)
                .ok_or(RepositoryError::NotFound)
        }

        fn list(&self) -> Result<Vec<Account>, RepositoryError> {
            Ok(self
                .0
                .lock()
                .expect("accounts mutex poisoned")
                .values()
                .cloned()
                .collect())
        }
    }

    #[derive(Default)]
    pub(super) struct Inbox(Mutex<Vec<Notification>>);

    impl Inbox {
        pub(super) fn for_user(&self, user: &AccountId) -> Vec<Notification> {
            self.0
                .lock()
                .expect("inbox mutex poisoned")
                .iter()
                .filter(|notification| &notification.user_id == user)
                .cloned()
                .collect()
        }
    }

    impl NotificationStore for Inbox {
        fn append(&self, notification: Notification) -> Result<(), NotificationError> {
            self.0.lock().expect("inbox mutex poisoned").push(notification);
            Ok(())
        }

        fn list_for(&self, user: &AccountId) -> Result<Vec<Notification>, NotificationError> {
            Ok(self.for_user(user))
        }

        fn mark_read(
            &self,
            user: &AccountId,
            id: &NotificationId,
        ) -> Result<bool, NotificationError> {
            let mut guard = self.0.lock().expect("inbox mutex poisoned");
            let found = guard
                .iter_mut()
                .find(|notification| &notification.user_id == user && &notification.id == id);
            Ok(found.map(|notification| notification.read = true).is_some())
        }

        fn clear_for(&self, user: &AccountId) -> Result<usize, NotificationError> {
            let mut guard = self.0.lock().expect("inbox mutex poisoned");
            let before = guard.len();
            guard.retain(|notification| &notification.user_id != user);
            Ok(before - guard.len())
        }
    }

    pub(super) struct FixedAnalyzer(pub(super) AnalysisResult);

    impl DocumentAnalyzer for FixedAnalyzer {
        fn analyze(&self, _document: &DocumentRef) -> Result<AnalysisResult, AnalysisError> {
            Ok(self.0.clone())
        }
    }

    pub(super) fn service(client_credits: u32) -> (Service, Arc<Accounts>, Arc<Inbox>) {
        let accounts = Arc::new(Accounts::seeded(client_credits));
        let inbox = Arc::new(Inbox::default());
        let service = VerificationService::new(
            Arc::new(Requests::default()),
            accounts.clone(),
            inbox.clone(),
            Arc::new(FixedAnalyzer(result(90))),
            AnalysisPolicy::default(),
        )
        .with_clock(Arc::new(FixedClock(start())));
        (service, accounts, inbox)
    }
}

use common::*;
use verifivue::workflows::verification::{
    AccountRepository, NotificationKind, OfficerAction, RequestStatus, Stage, StepStatus,
    Timeline, VerificationServiceError,
};

#[test]
fn confident_submission_consumes_the_last_credit() {
    let (service, accounts, inbox) = service(1);

    let request = service.submit(&owner(), input(95)).expect("submitted");

    assert_eq!(request.status, RequestStatus::Processing);
    let analysis = request.timeline.step(Stage::Analysis);
    assert_eq!(analysis.status, StepStatus::Current);
    assert!(analysis.description.contains("passed"));
    let account = accounts
        .fetch(&owner())
        .expect("fetch")
        .expect("account present");
    assert_eq!(account.credits, 0);

    let notifications = inbox.for_user(&owner());
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].kind, NotificationKind::Success);
}

#[test]
fn empty_balance_blocks_submission() {
    let (service, _, inbox) = service(0);

    let outcome = service.submit(&owner(), input(95));

    assert!(matches!(
        outcome,
        Err(VerificationServiceError::InsufficientCredits(_))
    ));
    assert!(service.list_visible(&owner()).expect("listing").is_empty());
    assert!(inbox.for_user(&owner()).is_empty());
}

#[test]
fn low_confidence_submission_needs_review() {
    let (service, _, _) = service(1);

    let request = service.submit(&owner(), input(65)).expect("submitted");

    assert_eq!(request.status, RequestStatus::ReviewRequired);
    assert_eq!(
        request.timeline.step(Stage::Analysis).status,
        StepStatus::Error
    );
}

#[test]
fn failed_outreach_rejects_with_the_reason() {
    let (service, _, inbox) = service(1);
    let request = service.submit(&owner(), input(95)).expect("submitted");
    service
        .apply_officer_action(&request.id, OfficerAction::ApproveAnalysis)
        .expect("outreach started");
    let before = inbox.for_user(&owner()).len();

    let rejected = service
        .apply_officer_action(
            &request.id,
            OfficerAction::MarkOutreachFailed {
                reason: "Registrar has no record".to_string(),
            },
        )
        .expect("rejected");

    assert_eq!(rejected.status, RequestStatus::Rejected);
    assert_eq!(
        rejected.final_report_note.as_deref(),
        Some("Registrar has no record")
    );
    assert_eq!(
        rejected.timeline.step(Stage::Outreach).status,
        StepStatus::Error
    );
    assert_eq!(
        rejected.timeline.step(Stage::Final).status,
        StepStatus::Completed
    );

    let notifications = inbox.for_user(&owner());
    assert_eq!(notifications.len(), before + 1);
    assert_eq!(
        notifications.last().map(|notification| notification.kind),
        Some(NotificationKind::Error)
    );
}

#[test]
fn blank_outreach_reason_leaves_request_unchanged() {
    let (service, _, _) = service(1);
    let request = service.submit(&owner(), input(95)).expect("submitted");
    let outreach = service
        .apply_officer_action(&request.id, OfficerAction::ApproveAnalysis)
        .expect("outreach started");

    let outcome = service.apply_officer_action(
        &request.id,
        OfficerAction::MarkOutreachFailed {
            reason: String::new(),
        },
    );

    assert!(matches!(
        outcome,
        Err(VerificationServiceError::MissingReason { .. })
    ));
    assert_eq!(service.get(&request.id).expect("stored"), outreach);
}

#[test]
fn finalizing_twice_is_idempotent() {
    let (service, _, inbox) = service(1);
    let request = service.submit(&owner(), input(95)).expect("submitted");
    for action in [
        OfficerAction::ApproveAnalysis,
        OfficerAction::MarkAuthenticated,
        OfficerAction::Finalize { note: None },
    ] {
        service
            .apply_officer_action(&request.id, action)
            .expect("accepted");
    }
    let verified = service.get(&request.id).expect("stored");
    let delivered = inbox.for_user(&owner()).len();

    let again = service
        .apply_officer_action(&request.id, OfficerAction::Finalize { note: None })
        .expect("second finalize");

    assert_eq!(again, verified);
    assert_eq!(again.status, RequestStatus::Verified);
    assert_eq!(inbox.for_user(&owner()).len(), delivered);
}

#[test]
fn requests_round_trip_through_json() {
    let (service, _, _) = service(1);
    let request = service.submit(&owner(), input(95)).expect("submitted");

    let encoded = serde_json::to_string(&request).expect("encode request");
    let decoded = serde_json::from_str(&encoded).expect("decode request");
    assert_eq!(request, decoded);

    let timeline = Timeline::initialize(start());
    let encoded = serde_json::to_value(&timeline).expect("encode timeline");
    assert_eq!(encoded.as_array().map(Vec::len), Some(4));
    let decoded: Timeline = serde_json::from_value(encoded).expect("decode timeline");
    assert_eq!(decoded, timeline);
}
