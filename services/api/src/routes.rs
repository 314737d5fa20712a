use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use serde_json::json;
use std::sync::Arc;
use verifivue::workflows::verification::{
    verification_router, AccountRepository, DocumentAnalyzer, NotificationStore,
    RequestRepository, VerificationService,
};

pub(crate) fn with_verification_routes<R, A, N, D>(
    service: Arc<VerificationService<R, A, N, D>>,
) -> axum::Router
where
    R: RequestRepository + 'static,
    A: AccountRepository + 'static,
    N: NotificationStore + 'static,
    D: DocumentAnalyzer + 'static,
{
    verification_router(service)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::{
        seed_accounts, InMemoryAccountRepository, InMemoryNotificationStore,
        InMemoryRequestRepository, KeywordAnalyzer,
    };
    use axum::body::Body;
    use axum::http::Request;
    use std::sync::atomic::AtomicBool;
    use tower::ServiceExt;
    use verifivue::workflows::verification::AnalysisPolicy;

    fn service() -> Arc<crate::infra::InMemoryVerificationService> {
        Arc::new(VerificationService::new(
            Arc::new(InMemoryRequestRepository::default()),
            Arc::new(InMemoryAccountRepository::seeded(seed_accounts())),
            Arc::new(InMemoryNotificationStore::default()),
            Arc::new(KeywordAnalyzer::default()),
            AnalysisPolicy::default(),
        ))
    }

    #[tokio::test]
    async fn healthcheck_reports_ok() {
        let Json(body) = healthcheck().await;
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn readiness_reflects_the_flag() {
        let handle = metrics_exporter_prometheus::PrometheusBuilder::new()
            .build_recorder()
            .handle();
        let state = AppState {
            readiness: Arc::new(AtomicBool::new(false)),
            metrics: Arc::new(handle),
        };

        let response = readiness_endpoint(Extension(state.clone()))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        state
            .readiness
            .store(true, std::sync::atomic::Ordering::Release);
        let response = readiness_endpoint(Extension(state)).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn verification_routes_are_mounted() {
        let app = with_verification_routes(service());

        let response = app
            .oneshot(
                Request::get("/api/v1/verification/accounts/client-1/dashboard")
                    .body(Body::empty())
                    .expect("build request"),
            )
            .await
            .expect("route executes");

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn keyword_analyzer_outage_maps_to_service_unavailable() {
        let app = with_verification_routes(service());
        let payload = json!({
            "account_id": "client-1",
            "candidate": {
                "name": "Morgan Lee",
                "institution": "Makerere University",
                "degree": "LLB",
                "graduation_year": "2016"
            },
            "document": "uploads/offline-diploma.pdf"
        });

        let response = app
            .oneshot(
                Request::post("/api/v1/verification/requests")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        serde_json::to_vec(&payload).expect("encode payload"),
                    ))
                    .expect("build request"),
            )
            .await
            .expect("route executes");

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn seeded_admin_adds_and_removes_users() {
        let service = service();
        let draft = json!({
            "name": "Noor Haddad",
            "email": "noor@harbor.example",
            "organization": "Harbor Health",
            "role": "CLIENT",
            "credits": 3
        });

        let response = with_verification_routes(service.clone())
            .oneshot(
                Request::post("/api/v1/verification/accounts/u-admin/users")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        serde_json::to_vec(&draft).expect("encode payload"),
                    ))
                    .expect("build request"),
            )
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::CREATED);

        let added = verifivue::workflows::verification::AccountId("user-000001".to_string());
        assert_eq!(service.account(&added).expect("stored").credits, 3);

        let response = with_verification_routes(service.clone())
            .oneshot(
                Request::delete("/api/v1/verification/accounts/u-admin/users/user-000001")
                    .body(Body::empty())
                    .expect("build request"),
            )
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(service.account(&added).is_err());
    }
}
