use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::domain::{
    Account, AccountId, AccountStatus, DocumentRef, NewAccount, Package, RequestId,
    SubmissionInput,
};
use super::lifecycle::OfficerAction;
use super::notifications::NotificationId;
use super::repository::{AccountRepository, DocumentAnalyzer, NotificationStore, RequestRepository};
use super::service::{VerificationService, VerificationServiceError};
use crate::error::AppError;

type SharedService<R, A, N, D> = Arc<VerificationService<R, A, N, D>>;

/// Router builder exposing the verification lifecycle over HTTP.
pub fn verification_router<R, A, N, D>(service: SharedService<R, A, N, D>) -> Router
where
    R: RequestRepository + 'static,
    A: AccountRepository + 'static,
    N: NotificationStore + 'static,
    D: DocumentAnalyzer + 'static,
{
    Router::new()
        .route(
            "/api/v1/verification/packages",
            get(packages_handler::<R, A, N, D>),
        )
        .route(
            "/api/v1/verification/requests",
            post(submit_handler::<R, A, N, D>),
        )
        .route(
            "/api/v1/verification/requests/:request_id",
            get(status_handler::<R, A, N, D>),
        )
        .route(
            "/api/v1/verification/requests/:request_id/actions",
            post(action_handler::<R, A, N, D>),
        )
        .route(
            "/api/v1/verification/requests/:request_id/reupload",
            post(reupload_handler::<R, A, N, D>),
        )
        .route(
            "/api/v1/verification/accounts/:account_id/packages",
            post(grant_handler::<R, A, N, D>),
        )
        .route(
            "/api/v1/verification/accounts/:account_id/status",
            put(account_status_handler::<R, A, N, D>),
        )
        .route(
            "/api/v1/verification/accounts/:account_id/requests",
            get(list_handler::<R, A, N, D>),
        )
        .route(
            "/api/v1/verification/accounts/:account_id/notifications",
            get(notifications_handler::<R, A, N, D>)
                .delete(clear_notifications_handler::<R, A, N, D>),
        )
        .route(
            "/api/v1/verification/accounts/:account_id/notifications/:notification_id/read",
            post(mark_read_handler::<R, A, N, D>),
        )
        .route(
            "/api/v1/verification/accounts/:account_id/dashboard",
            get(dashboard_handler::<R, A, N, D>),
        )
        .route(
            "/api/v1/verification/accounts/:account_id/clients",
            get(clients_handler::<R, A, N, D>),
        )
        .route(
            "/api/v1/verification/accounts/:account_id/audit",
            get(audit_handler::<R, A, N, D>),
        )
        .route(
            "/api/v1/verification/accounts/:account_id/users",
            post(add_account_handler::<R, A, N, D>),
        )
        .route(
            "/api/v1/verification/accounts/:account_id/users/:user_id",
            put(update_account_handler::<R, A, N, D>)
                .delete(delete_account_handler::<R, A, N, D>),
        )
        .route(
            "/api/v1/verification/accounts/:account_id/catalog",
            post(add_package_handler::<R, A, N, D>),
        )
        .route(
            "/api/v1/verification/accounts/:account_id/catalog/:package_id",
            put(update_package_handler::<R, A, N, D>)
                .delete(delete_package_handler::<R, A, N, D>),
        )
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub(crate) struct SubmitBody {
    account_id: AccountId,
    #[serde(flatten)]
    input: SubmissionInput,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReuploadBody {
    document: DocumentRef,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GrantBody {
    package_id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AccountStatusBody {
    status: AccountStatus,
}

fn error_response(error: VerificationServiceError) -> Response {
    AppError::from(error).into_response()
}

fn respond<T: Serialize>(
    status: StatusCode,
    result: Result<T, VerificationServiceError>,
) -> Response {
    match result {
        Ok(body) => (status, axum::Json(body)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn packages_handler<R, A, N, D>(
    State(service): State<SharedService<R, A, N, D>>,
) -> Response
where
    R: RequestRepository + 'static,
    A: AccountRepository + 'static,
    N: NotificationStore + 'static,
    D: DocumentAnalyzer + 'static,
{
    respond(
        StatusCode::OK,
        service.catalog().map(|catalog| catalog.packages().to_vec()),
    )
}

pub(crate) async fn submit_handler<R, A, N, D>(
    State(service): State<SharedService<R, A, N, D>>,
    axum::Json(body): axum::Json<SubmitBody>,
) -> Response
where
    R: RequestRepository + 'static,
    A: AccountRepository + 'static,
    N: NotificationStore + 'static,
    D: DocumentAnalyzer + 'static,
{
    respond(StatusCode::CREATED, service.submit(&body.account_id, body.input))
}

pub(crate) async fn status_handler<R, A, N, D>(
    State(service): State<SharedService<R, A, N, D>>,
    Path(request_id): Path<String>,
) -> Response
where
    R: RequestRepository + 'static,
    A: AccountRepository + 'static,
    N: NotificationStore + 'static,
    D: DocumentAnalyzer + 'static,
{
    respond(StatusCode::OK, service.get(&RequestId(request_id)))
}

pub(crate) async fn action_handler<R, A, N, D>(
    State(service): State<SharedService<R, A, N, D>>,
    Path(request_id): Path<String>,
    axum::Json(action): axum::Json<OfficerAction>,
) -> Response
where
    R: RequestRepository + 'static,
    A: AccountRepository + 'static,
    N: NotificationStore + 'static,
    D: DocumentAnalyzer + 'static,
{
    respond(
        StatusCode::OK,
        service
            .apply_officer_action(&RequestId(request_id), action)
            .map(|request| request.status_view()),
    )
}

pub(crate) async fn reupload_handler<R, A, N, D>(
    State(service): State<SharedService<R, A, N, D>>,
    Path(request_id): Path<String>,
    axum::Json(body): axum::Json<ReuploadBody>,
) -> Response
where
    R: RequestRepository + 'static,
    A: AccountRepository + 'static,
    N: NotificationStore + 'static,
    D: DocumentAnalyzer + 'static,
{
    respond(
        StatusCode::OK,
        service
            .reupload(&RequestId(request_id), body.document)
            .map(|request| request.status_view()),
    )
}

pub(crate) async fn grant_handler<R, A, N, D>(
    State(service): State<SharedService<R, A, N, D>>,
    Path(account_id): Path<String>,
    axum::Json(body): axum::Json<GrantBody>,
) -> Response
where
    R: RequestRepository + 'static,
    A: AccountRepository + 'static,
    N: NotificationStore + 'static,
    D: DocumentAnalyzer + 'static,
{
    respond(
        StatusCode::OK,
        service.grant_package(&AccountId(account_id), &body.package_id),
    )
}

pub(crate) async fn account_status_handler<R, A, N, D>(
    State(service): State<SharedService<R, A, N, D>>,
    Path(account_id): Path<String>,
    axum::Json(body): axum::Json<AccountStatusBody>,
) -> Response
where
    R: RequestRepository + 'static,
    A: AccountRepository + 'static,
    N: NotificationStore + 'static,
    D: DocumentAnalyzer + 'static,
{
    respond(
        StatusCode::OK,
        service.set_account_status(&AccountId(account_id), body.status),
    )
}

pub(crate) async fn list_handler<R, A, N, D>(
    State(service): State<SharedService<R, A, N, D>>,
    Path(account_id): Path<String>,
) -> Response
where
    R: RequestRepository + 'static,
    A: AccountRepository + 'static,
    N: NotificationStore + 'static,
    D: DocumentAnalyzer + 'static,
{
    match service.list_visible(&AccountId(account_id)) {
        Ok(requests) => {
            let views: Vec<_> = requests.iter().map(|request| request.status_view()).collect();
            (StatusCode::OK, axum::Json(views)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn notifications_handler<R, A, N, D>(
    State(service): State<SharedService<R, A, N, D>>,
    Path(account_id): Path<String>,
) -> Response
where
    R: RequestRepository + 'static,
    A: AccountRepository + 'static,
    N: NotificationStore + 'static,
    D: DocumentAnalyzer + 'static,
{
    match service.notifications_for(&AccountId(account_id)) {
        Ok(notifications) => {
            let unread = notifications.iter().filter(|n| !n.read).count();
            let payload = json!({
                "unread": unread,
                "notifications": notifications,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn mark_read_handler<R, A, N, D>(
    State(service): State<SharedService<R, A, N, D>>,
    Path((account_id, notification_id)): Path<(String, String)>,
) -> Response
where
    R: RequestRepository + 'static,
    A: AccountRepository + 'static,
    N: NotificationStore + 'static,
    D: DocumentAnalyzer + 'static,
{
    match service.mark_notification_read(&AccountId(account_id), &NotificationId(notification_id))
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn clear_notifications_handler<R, A, N, D>(
    State(service): State<SharedService<R, A, N, D>>,
    Path(account_id): Path<String>,
) -> Response
where
    R: RequestRepository + 'static,
    A: AccountRepository + 'static,
    N: NotificationStore + 'static,
    D: DocumentAnalyzer + 'static,
{
    respond(
        StatusCode::OK,
        service
            .clear_notifications(&AccountId(account_id))
            .map(|cleared| json!({ "cleared": cleared })),
    )
}

pub(crate) async fn dashboard_handler<R, A, N, D>(
    State(service): State<SharedService<R, A, N, D>>,
    Path(account_id): Path<String>,
) -> Response
where
    R: RequestRepository + 'static,
    A: AccountRepository + 'static,
    N: NotificationStore + 'static,
    D: DocumentAnalyzer + 'static,
{
    respond(StatusCode::OK, service.dashboard(&AccountId(account_id)))
}

pub(crate) async fn clients_handler<R, A, N, D>(
    State(service): State<SharedService<R, A, N, D>>,
    Path(account_id): Path<String>,
) -> Response
where
    R: RequestRepository + 'static,
    A: AccountRepository + 'static,
    N: NotificationStore + 'static,
    D: DocumentAnalyzer + 'static,
{
    respond(StatusCode::OK, service.client_summaries(&AccountId(account_id)))
}

pub(crate) async fn audit_handler<R, A, N, D>(
    State(service): State<SharedService<R, A, N, D>>,
    Path(account_id): Path<String>,
) -> Response
where
    R: RequestRepository + 'static,
    A: AccountRepository + 'static,
    N: NotificationStore + 'static,
    D: DocumentAnalyzer + 'static,
{
    respond(StatusCode::OK, service.audit_log(&AccountId(account_id)))
}

pub(crate) async fn add_account_handler<R, A, N, D>(
    State(service): State<SharedService<R, A, N, D>>,
    Path(actor_id): Path<String>,
    axum::Json(draft): axum::Json<NewAccount>,
) -> Response
where
    R: RequestRepository + 'static,
    A: AccountRepository + 'static,
    N: NotificationStore + 'static,
    D: DocumentAnalyzer + 'static,
{
    respond(
        StatusCode::CREATED,
        service.add_account(&AccountId(actor_id), draft),
    )
}

pub(crate) async fn update_account_handler<R, A, N, D>(
    State(service): State<SharedService<R, A, N, D>>,
    Path((actor_id, user_id)): Path<(String, String)>,
    axum::Json(mut account): axum::Json<Account>,
) -> Response
where
    R: RequestRepository + 'static,
    A: AccountRepository + 'static,
    N: NotificationStore + 'static,
    D: DocumentAnalyzer + 'static,
{
    account.id = AccountId(user_id);
    respond(
        StatusCode::OK,
        service.update_account(&AccountId(actor_id), account),
    )
}

pub(crate) async fn delete_account_handler<R, A, N, D>(
    State(service): State<SharedService<R, A, N, D>>,
    Path((actor_id, user_id)): Path<(String, String)>,
) -> Response
where
    R: RequestRepository + 'static,
    A: AccountRepository + 'static,
    N: NotificationStore + 'static,
    D: DocumentAnalyzer + 'static,
{
    match service.delete_account(&AccountId(actor_id), &AccountId(user_id)) {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn add_package_handler<R, A, N, D>(
    State(service): State<SharedService<R, A, N, D>>,
    Path(actor_id): Path<String>,
    axum::Json(package): axum::Json<Package>,
) -> Response
where
    R: RequestRepository + 'static,
    A: AccountRepository + 'static,
    N: NotificationStore + 'static,
    D: DocumentAnalyzer + 'static,
{
    respond(
        StatusCode::CREATED,
        service.add_package(&AccountId(actor_id), package),
    )
}

pub(crate) async fn update_package_handler<R, A, N, D>(
    State(service): State<SharedService<R, A, N, D>>,
    Path((actor_id, package_id)): Path<(String, String)>,
    axum::Json(mut package): axum::Json<Package>,
) -> Response
where
    R: RequestRepository + 'static,
    A: AccountRepository + 'static,
    N: NotificationStore + 'static,
    D: DocumentAnalyzer + 'static,
{
    package.id = package_id;
    respond(
        StatusCode::OK,
        service.update_package(&AccountId(actor_id), package),
    )
}

pub(crate) async fn delete_package_handler<R, A, N, D>(
    State(service): State<SharedService<R, A, N, D>>,
    Path((actor_id, package_id)): Path<(String, String)>,
) -> Response
where
    R: RequestRepository + 'static,
    A: AccountRepository + 'static,
    N: NotificationStore + 'static,
    D: DocumentAnalyzer + 'static,
{
    match service.delete_package(&AccountId(actor_id), &package_id) {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => error_response(error),
    }
}
