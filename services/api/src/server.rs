use crate::cli::ServeArgs;
use crate::infra::{
    seed_accounts, AppState, InMemoryAccountRepository, InMemoryNotificationStore,
    InMemoryRequestRepository, KeywordAnalyzer,
};
use crate::routes::with_verification_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;
use verifivue::config::AppConfig;
use verifivue::error::AppError;
use verifivue::telemetry;
use verifivue::workflows::verification::{AnalysisPolicy, VerificationService};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let policy = AnalysisPolicy::from(&config.verification);
    let verification_service = Arc::new(VerificationService::new(
        Arc::new(InMemoryRequestRepository::default()),
        Arc::new(InMemoryAccountRepository::seeded(seed_accounts())),
        Arc::new(InMemoryNotificationStore::default()),
        Arc::new(KeywordAnalyzer::default()),
        policy,
    ));

    let app = with_verification_routes(verification_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        review_threshold = policy.review_confidence_threshold(),
        "verification lifecycle service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
