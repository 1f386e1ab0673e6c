use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use super::domain::{
    Actor, ActorRole, ApplicationId, ApplicationStatus, ApplicationSubmission,
    DeliverableDecision, DeliverableDraft, DeliverableId, MilestoneDraft, MilestoneId,
    ProjectDraft, ProjectId, ProjectRevision, ReviewDecision, StudentId,
};
use super::errors::{ErrorKind, ProjectError};
use super::repository::ProjectRepository;
use super::service::ProjectService;

pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";
pub const ACTOR_ID_HEADER: &str = "x-actor-id";

/// Router builder exposing the project lifecycle over HTTP.
///
/// Mutating routes expect the caller in the `x-actor-role` / `x-actor-id` headers.
pub fn project_router<R>(service: Arc<ProjectService<R>>) -> Router
where
    R: ProjectRepository + 'static,
{
    Router::new()
        .route("/api/v1/projects", post(create_handler::<R>))
        .route(
            "/api/v1/projects/:project_id",
            get(status_handler::<R>).patch(revise_handler::<R>),
        )
        .route(
            "/api/v1/projects/:project_id/submit",
            post(submit_handler::<R>),
        )
        .route(
            "/api/v1/projects/:project_id/review",
            post(review_handler::<R>),
        )
        .route(
            "/api/v1/projects/:project_id/cancel",
            post(cancel_handler::<R>),
        )
        .route(
            "/api/v1/projects/:project_id/complete",
            post(complete_handler::<R>),
        )
        .route(
            "/api/v1/projects/:project_id/applications",
            post(apply_handler::<R>),
        )
        .route(
            "/api/v1/applications/:application_id/transition",
            post(transition_handler::<R>),
        )
        .route(
            "/api/v1/projects/:project_id/milestones",
            post(add_milestone_handler::<R>),
        )
        .route(
            "/api/v1/projects/:project_id/milestones/:milestone_id",
            delete(remove_milestone_handler::<R>),
        )
        .route(
            "/api/v1/projects/:project_id/milestones/:milestone_id/approve",
            post(approve_milestone_handler::<R>),
        )
        .route(
            "/api/v1/projects/:project_id/ledger",
            get(ledger_handler::<R>),
        )
        .route(
            "/api/v1/projects/:project_id/deliverables",
            post(submit_deliverable_handler::<R>),
        )
        .route(
            "/api/v1/projects/:project_id/deliverables/:deliverable_id/review",
            post(review_deliverable_handler::<R>),
        )
        .route(
            "/api/v1/students/:student_id/eligible-projects",
            get(eligible_projects_handler::<R>),
        )
        .with_state(service)
}

/// Body of `POST /api/v1/applications/:id/transition`.
#[derive(Debug, Deserialize)]
pub struct TransitionRequest {
    pub status: ApplicationStatus,
}

/// Resolve the pre-authenticated caller from request headers.
pub(crate) fn actor_from_headers(headers: &HeaderMap) -> Result<Actor, Response> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    };

    let role = header(ACTOR_ROLE_HEADER)
        .ok_or_else(|| unauthenticated("missing x-actor-role header"))?;
    let role = ActorRole::parse(role)
        .ok_or_else(|| unauthenticated(&format!("unknown actor role '{role}'")))?;
    let id = header(ACTOR_ID_HEADER).ok_or_else(|| unauthenticated("missing x-actor-id header"))?;

    Ok(role.with_id(id))
}

fn unauthenticated(message: &str) -> Response {
    let payload = json!({
        "error": "unauthenticated",
        "message": message,
    });
    (StatusCode::UNAUTHORIZED, Json(payload)).into_response()
}

pub(crate) fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::State | ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Authorization => StatusCode::FORBIDDEN,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Repository => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub(crate) fn error_response(error: ProjectError) -> Response {
    let kind = error.kind();
    let payload = json!({
        "error": kind.label(),
        "message": error.to_string(),
    });
    (status_for(kind), Json(payload)).into_response()
}

fn respond<T: serde::Serialize>(status: StatusCode, result: Result<T, ProjectError>) -> Response {
    match result {
        Ok(value) => (status, Json(value)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn create_handler<R>(
    State(service): State<Arc<ProjectService<R>>>,
    headers: HeaderMap,
    Json(draft): Json<ProjectDraft>,
) -> Response
where
    R: ProjectRepository + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    let result = service
        .create_project(&actor, draft)
        .map(|record| record.status_view());
    respond(StatusCode::CREATED, result)
}

pub(crate) async fn status_handler<R>(
    State(service): State<Arc<ProjectService<R>>>,
    Path(project_id): Path<String>,
) -> Response
where
    R: ProjectRepository + 'static,
{
    let result = service
        .get_project(&ProjectId(project_id))
        .map(|record| record.status_view());
    respond(StatusCode::OK, result)
}

pub(crate) async fn revise_handler<R>(
    State(service): State<Arc<ProjectService<R>>>,
    headers: HeaderMap,
    Path(project_id): Path<String>,
    Json(revision): Json<ProjectRevision>,
) -> Response
where
    R: ProjectRepository + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    let result = service
        .revise_project(&actor, &ProjectId(project_id), revision)
        .map(|record| record.status_view());
    respond(StatusCode::OK, result)
}

pub(crate) async fn submit_handler<R>(
    State(service): State<Arc<ProjectService<R>>>,
    headers: HeaderMap,
    Path(project_id): Path<String>,
) -> Response
where
    R: ProjectRepository + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    respond(
        StatusCode::OK,
        service.submit_for_review(&actor, &ProjectId(project_id)),
    )
}

pub(crate) async fn review_handler<R>(
    State(service): State<Arc<ProjectService<R>>>,
    headers: HeaderMap,
    Path(project_id): Path<String>,
    Json(decision): Json<ReviewDecision>,
) -> Response
where
    R: ProjectRepository + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    respond(
        StatusCode::OK,
        service.review_project(&actor, &ProjectId(project_id), decision),
    )
}

pub(crate) async fn cancel_handler<R>(
    State(service): State<Arc<ProjectService<R>>>,
    headers: HeaderMap,
    Path(project_id): Path<String>,
) -> Response
where
    R: ProjectRepository + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    respond(
        StatusCode::OK,
        service.cancel_project(&actor, &ProjectId(project_id)),
    )
}

pub(crate) async fn complete_handler<R>(
    State(service): State<Arc<ProjectService<R>>>,
    headers: HeaderMap,
    Path(project_id): Path<String>,
) -> Response
where
    R: ProjectRepository + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    respond(
        StatusCode::OK,
        service.complete_project(&actor, &ProjectId(project_id)),
    )
}

pub(crate) async fn apply_handler<R>(
    State(service): State<Arc<ProjectService<R>>>,
    headers: HeaderMap,
    Path(project_id): Path<String>,
    Json(submission): Json<ApplicationSubmission>,
) -> Response
where
    R: ProjectRepository + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    respond(
        StatusCode::CREATED,
        service.submit_application(&actor, &ProjectId(project_id), submission),
    )
}

pub(crate) async fn transition_handler<R>(
    State(service): State<Arc<ProjectService<R>>>,
    headers: HeaderMap,
    Path(application_id): Path<String>,
    Json(request): Json<TransitionRequest>,
) -> Response
where
    R: ProjectRepository + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    respond(
        StatusCode::OK,
        service.transition_application(&actor, &ApplicationId(application_id), request.status),
    )
}

pub(crate) async fn add_milestone_handler<R>(
    State(service): State<Arc<ProjectService<R>>>,
    headers: HeaderMap,
    Path(project_id): Path<String>,
    Json(draft): Json<MilestoneDraft>,
) -> Response
where
    R: ProjectRepository + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    respond(
        StatusCode::CREATED,
        service.add_milestone(&actor, &ProjectId(project_id), draft),
    )
}

pub(crate) async fn remove_milestone_handler<R>(
    State(service): State<Arc<ProjectService<R>>>,
    headers: HeaderMap,
    Path((project_id, milestone_id)): Path<(String, String)>,
) -> Response
where
    R: ProjectRepository + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    respond(
        StatusCode::OK,
        service.remove_milestone(&actor, &ProjectId(project_id), &MilestoneId(milestone_id)),
    )
}

pub(crate) async fn approve_milestone_handler<R>(
    State(service): State<Arc<ProjectService<R>>>,
    headers: HeaderMap,
    Path((project_id, milestone_id)): Path<(String, String)>,
) -> Response
where
    R: ProjectRepository + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    respond(
        StatusCode::OK,
        service.approve_milestone(&actor, &ProjectId(project_id), &MilestoneId(milestone_id)),
    )
}

pub(crate) async fn ledger_handler<R>(
    State(service): State<Arc<ProjectService<R>>>,
    Path(project_id): Path<String>,
) -> Response
where
    R: ProjectRepository + 'static,
{
    respond(StatusCode::OK, service.ledger(&ProjectId(project_id)))
}

pub(crate) async fn submit_deliverable_handler<R>(
    State(service): State<Arc<ProjectService<R>>>,
    headers: HeaderMap,
    Path(project_id): Path<String>,
    Json(draft): Json<DeliverableDraft>,
) -> Response
where
    R: ProjectRepository + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    respond(
        StatusCode::CREATED,
        service.submit_deliverable(&actor, &ProjectId(project_id), draft),
    )
}

pub(crate) async fn review_deliverable_handler<R>(
    State(service): State<Arc<ProjectService<R>>>,
    headers: HeaderMap,
    Path((project_id, deliverable_id)): Path<(String, String)>,
    Json(decision): Json<DeliverableDecision>,
) -> Response
where
    R: ProjectRepository + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    respond(
        StatusCode::OK,
        service.review_deliverable(
            &actor,
            &ProjectId(project_id),
            &DeliverableId(deliverable_id),
            decision,
        ),
    )
}

pub(crate) async fn eligible_projects_handler<R>(
    State(service): State<Arc<ProjectService<R>>>,
    Path(student_id): Path<String>,
) -> Response
where
    R: ProjectRepository + 'static,
{
    respond(
        StatusCode::OK,
        service.eligible_projects(&StudentId(student_id)),
    )
}
