use crate::infra::{
    seed_accounts, InMemoryAccountRepository, InMemoryNotificationStore,
    InMemoryRequestRepository, InMemoryVerificationService, KeywordAnalyzer,
};
use clap::Args;
use std::sync::Arc;
use verifivue::error::AppError;
use verifivue::workflows::verification::{
    AccountId, AnalysisPolicy, CandidateFacts, DocumentRef, OfficerAction, RequestStatus,
    Stage, SubmissionInput, VerificationRequest, VerificationService,
    REVIEW_CONFIDENCE_THRESHOLD,
};

const CLIENT: &str = "client-1";
const OFFICER: &str = "u-officer";
const MAX_STEPS: usize = 8;

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Confidence score reported by the offline analyzer (0-100)
    #[arg(long, default_value_t = 92, value_parser = clap::value_parser!(u8).range(0..=100))]
    pub(crate) confidence: u8,
    /// Report the uploaded certificate as tampered
    #[arg(long)]
    pub(crate) tampered: bool,
    /// Ask the client for a clearer copy before approving the analysis
    #[arg(long)]
    pub(crate) manual_review: bool,
    /// Fail institution outreach with the given reason instead of authenticating
    #[arg(long, value_name = "REASON")]
    pub(crate) fail_outreach: Option<String>,
    /// Confidence threshold below which analysis is routed to review
    #[arg(long, default_value_t = REVIEW_CONFIDENCE_THRESHOLD)]
    pub(crate) review_threshold: u8,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let service = demo_service(&args);
    let client = AccountId(CLIENT.to_string());
    let officer = AccountId(OFFICER.to_string());

    println!("=== VerifiVUE lifecycle demo ===");
    println!(
        "Analyzer: confidence {} | tampered {} | review threshold {}",
        args.confidence,
        yes_no(args.tampered),
        service.gate().policy().review_confidence_threshold()
    );

    let before = service.account(&client)?;
    let mut request = service.submit(&client, demo_submission())?;
    let after = service.account(&client)?;
    println!(
        "\nSubmitted {} for {} ({} -> {} credits)",
        request.id, request.candidate.name, before.credits, after.credits
    );
    render_request(&request);

    let mut manual_review = args.manual_review;
    for _ in 0..MAX_STEPS {
        let next = match (request.status, request.timeline.active_stage()) {
            (RequestStatus::Processing, Some(Stage::Final)) => {
                Step::Officer(OfficerAction::Finalize {
                    note: Some("Report issued to client.".to_string()),
                })
            }
            (RequestStatus::Processing | RequestStatus::ReviewRequired, _) if manual_review => {
                manual_review = false;
                Step::Officer(OfficerAction::RequestManualReview)
            }
            (RequestStatus::Processing | RequestStatus::ReviewRequired, _) => {
                Step::Officer(OfficerAction::ApproveAnalysis)
            }
            (RequestStatus::PendingClientAction, _) => {
                Step::Reupload(DocumentRef("uploads/diploma-resubmitted.pdf".to_string()))
            }
            (RequestStatus::InstitutionOutreach, _) => match args.fail_outreach.clone() {
                Some(reason) => Step::Officer(OfficerAction::MarkOutreachFailed { reason }),
                None => Step::Officer(OfficerAction::MarkAuthenticated),
            },
            (
                RequestStatus::Verified
                | RequestStatus::Rejected
                | RequestStatus::Draft
                | RequestStatus::Pending,
                _,
            ) => break,
        };

        request = match next {
            Step::Officer(action) => {
                println!("\n> officer: {}", action.name());
                service.apply_officer_action(&request.id, action)?
            }
            Step::Reupload(document) => {
                println!("\n> client re-upload: {}", document.0);
                service.reupload(&request.id, document)?
            }
        };
        render_request(&request);
    }

    render_notifications(&service, &client)?;
    render_notifications(&service, &officer)?;
    render_dashboard(&service, &client)?;
    render_audit(&service, &officer)?;
    Ok(())
}

enum Step {
    Officer(OfficerAction),
    Reupload(DocumentRef),
}

fn demo_service(args: &DemoArgs) -> InMemoryVerificationService {
    VerificationService::new(
        Arc::new(InMemoryRequestRepository::default()),
        Arc::new(InMemoryAccountRepository::seeded(seed_accounts())),
        Arc::new(InMemoryNotificationStore::default()),
        Arc::new(KeywordAnalyzer::new(args.confidence, args.tampered)),
        AnalysisPolicy::new(args.review_threshold),
    )
}

fn demo_submission() -> SubmissionInput {
    SubmissionInput {
        candidate: CandidateFacts {
            name: "Amara Nsubuga".to_string(),
            institution: "Makerere University".to_string(),
            degree: "BSc Computer Science".to_string(),
            graduation_year: "2019".to_string(),
        },
        document: Some(DocumentRef("uploads/diploma.pdf".to_string())),
        analysis: None,
    }
}

fn render_request(request: &VerificationRequest) {
    println!("Status: {}", request.status);
    if let Some(analysis) = &request.ai_analysis {
        println!(
            "Analysis: confidence {} | tampered {}",
            analysis.confidence_score,
            yes_no(analysis.is_tampered)
        );
    }
    for step in request.timeline.steps() {
        let date = step
            .date
            .map(|date| date.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  [{:<9}] {:<24} {:<16} {}",
            step.status.label(),
            step.label,
            date,
            step.description
        );
    }
    if let Some(note) = &request.final_report_note {
        println!("Final note: {note}");
    }
}

fn render_notifications(
    service: &InMemoryVerificationService,
    user: &AccountId,
) -> Result<(), AppError> {
    let notifications = service.notifications_for(user)?;
    println!("\nNotifications for {user} ({}):", notifications.len());
    for notification in notifications {
        println!(
            "  - [{}] {}: {}",
            notification.id, notification.title, notification.message
        );
    }
    Ok(())
}

fn render_dashboard(
    service: &InMemoryVerificationService,
    viewer: &AccountId,
) -> Result<(), AppError> {
    let summary = service.dashboard(viewer)?;
    println!("\nDashboard for {viewer}:");
    println!(
        "  total {} | verified {} | in progress {} | rejected {}",
        summary.total, summary.verified, summary.in_progress, summary.rejected
    );
    if let Some(credits) = summary.credits {
        println!("  credits remaining: {credits}");
    }
    Ok(())
}

fn render_audit(
    service: &InMemoryVerificationService,
    viewer: &AccountId,
) -> Result<(), AppError> {
    let entries = service.audit_log(viewer)?;
    println!("\nAudit log ({} entries, newest first):", entries.len());
    for entry in entries {
        println!(
            "  {} | {:<20} | {:<22} | {}",
            entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
            entry.actor,
            entry.action,
            entry.outcome.label()
        );
    }
    Ok(())
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}
