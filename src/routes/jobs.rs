use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json},
    Extension,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::application_dto::{ApplicationListQuery, ApplicationResponse},
    dto::job_dto::{
        CreateJobPayload, JobListQuery, JobResponse, JobSummary, UpdateJobPayload,
        UpdateJobStatusPayload,
    },
    error::Result,
    middleware::auth::Claims,
    routes::current_actor,
    services::{export_service::ExportService, job_service::JobVisibility},
    AppState,
};

const XLSX_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

#[utoipa::path(
    get,
    path = "/api/v1/jobs",
    params(
        ("page" = Option<i64>, Query, description = "Page number"),
        ("limit" = Option<i64>, Query, description = "Items per page"),
        ("sort" = Option<String>, Query, description = "Comma separated fields, '-' prefix for descending"),
        ("search" = Option<String>, Query, description = "Matches title and description"),
        ("location" = Option<String>, Query, description = "Location substring"),
        ("employment_type" = Option<String>, Query, description = "Filter by employment type"),
        ("experience_level" = Option<String>, Query, description = "Filter by experience level"),
        ("company_id" = Option<Uuid>, Query, description = "Filter by company"),
        ("is_remote" = Option<bool>, Query, description = "Remote jobs only"),
        ("skills" = Option<String>, Query, description = "Comma separated skills"),
        ("salary_min" = Option<String>, Query, description = "Minimum salary")
    ),
    responses(
        (status = 200, description = "Open jobs", body = Json<Vec<JobSummary>>),
        (status = 400, description = "Invalid query")
    )
)]
#[axum::debug_handler]
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(query): Query<JobListQuery>,
) -> Result<impl IntoResponse> {
    let page = state
        .job_service
        .list(JobVisibility::Public, &query)
        .await?;
    Ok(Json(page.map(JobSummary::from)))
}

#[utoipa::path(
    get,
    path = "/api/v1/jobs/mine",
    responses(
        (status = 200, description = "Jobs posted by the caller", body = Json<Vec<JobResponse>>),
        (status = 401, description = "Missing or invalid token")
    )
)]
#[axum::debug_handler]
pub async fn list_my_jobs(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<JobListQuery>,
) -> Result<impl IntoResponse> {
    let (_, actor) = current_actor(&state, &claims).await?;
    let page = state.job_service.list_mine(&actor, &query).await?;
    Ok(Json(page.map(JobResponse::from)))
}

#[utoipa::path(
    get,
    path = "/api/v1/jobs/{id}",
    params(
        ("id" = Uuid, Path, description = "Job ID")
    ),
    responses(
        (status = 200, description = "Job details", body = Json<JobResponse>),
        (status = 404, description = "Job not found")
    )
)]
#[axum::debug_handler]
pub async fn get_job(
    State(state): State<AppState>,
    claims: Option<Extension<Claims>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let viewer = match claims {
        Some(Extension(claims)) => current_actor(&state, &claims).await.ok().map(|(_, a)| a),
        None => None,
    };
    let job = state.job_service.view(id, viewer.as_ref()).await?;
    Ok(Json(JobResponse::from(job)))
}

#[utoipa::path(
    post,
    path = "/api/v1/jobs",
    request_body = CreateJobPayload,
    responses(
        (status = 201, description = "Job created", body = Json<JobResponse>),
        (status = 400, description = "Invalid payload"),
        (status = 403, description = "Not allowed to post for this company")
    )
)]
#[axum::debug_handler]
pub async fn create_job(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateJobPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let (_, actor) = current_actor(&state, &claims).await?;
    let job = state.job_service.create(&actor, payload).await?;
    Ok((StatusCode::CREATED, Json(JobResponse::from(job))))
}

#[utoipa::path(
    patch,
    path = "/api/v1/jobs/{id}",
    params(
        ("id" = Uuid, Path, description = "Job ID")
    ),
    request_body = UpdateJobPayload,
    responses(
        (status = 200, description = "Job updated", body = Json<JobResponse>),
        (status = 400, description = "Invalid payload"),
        (status = 403, description = "Not the owning recruiter"),
        (status = 404, description = "Job not found")
    )
)]
#[axum::debug_handler]
pub async fn update_job(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateJobPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let (_, actor) = current_actor(&state, &claims).await?;
    let job = state.job_service.update(&actor, id, payload).await?;
    Ok(Json(JobResponse::from(job)))
}

#[utoipa::path(
    patch,
    path = "/api/v1/jobs/{id}/status",
    params(
        ("id" = Uuid, Path, description = "Job ID")
    ),
    request_body = UpdateJobStatusPayload,
    responses(
        (status = 200, description = "Status changed", body = Json<JobResponse>),
        (status = 403, description = "Not the owning recruiter"),
        (status = 404, description = "Job not found")
    )
)]
#[axum::debug_handler]
pub async fn update_job_status(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateJobStatusPayload>,
) -> Result<impl IntoResponse> {
    let (_, actor) = current_actor(&state, &claims).await?;
    let job = state
        .job_service
        .update_status(&actor, id, payload.status)
        .await?;
    Ok(Json(JobResponse::from(job)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/jobs/{id}",
    params(
        ("id" = Uuid, Path, description = "Job ID")
    ),
    responses(
        (status = 204, description = "Job deleted"),
        (status = 403, description = "Not the owning recruiter"),
        (status = 404, description = "Job not found")
    )
)]
#[axum::debug_handler]
pub async fn delete_job(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let (_, actor) = current_actor(&state, &claims).await?;
    state.job_service.delete(&actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/v1/jobs/{id}/applications",
    params(
        ("id" = Uuid, Path, description = "Job ID"),
        ("status" = Option<String>, Query, description = "Filter by application status")
    ),
    responses(
        (status = 200, description = "Applications for the job", body = Json<Vec<ApplicationResponse>>),
        (status = 403, description = "Not allowed to view this job's applications"),
        (status = 404, description = "Job not found")
    )
)]
#[axum::debug_handler]
pub async fn list_job_applications(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Query(query): Query<ApplicationListQuery>,
) -> Result<impl IntoResponse> {
    let (_, actor) = current_actor(&state, &claims).await?;
    let page = state
        .application_service
        .list_for_job(&actor, id, &query)
        .await?;
    Ok(Json(page.map(ApplicationResponse::from)))
}

/// XLSX workbook of every application for the job.
#[axum::debug_handler]
pub async fn export_job_applications(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let (_, actor) = current_actor(&state, &claims).await?;
    let (job, rows) = state.application_service.export_rows(&actor, id).await?;

    let buffer = ExportService::applications_xlsx(&job, &rows)?;
    let disposition = format!(
        "attachment; filename=\"{}\"",
        ExportService::file_name(&job)
    );
    tracing::info!(job_id = %job.id, rows = rows.len(), "applications exported");

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, XLSX_CONTENT_TYPE.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        buffer,
    ))
}
