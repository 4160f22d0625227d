use axum::{
    body::Bytes,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::application_dto::{
        AddNotePayload, ApplicationListQuery, ApplicationResponse, ApplyForm,
        ExtendOfferPayload, RespondOfferPayload, ScheduleInterviewPayload,
        UpdateApplicationStatusPayload, UpdateInterviewPayload, WithdrawPayload,
    },
    error::{Error, Result},
    middleware::auth::Claims,
    models::user::Role,
    routes::{current_actor, read_upload},
    services::access::Actor,
    AppState,
};

fn present(actor: &Actor, response: ApplicationResponse) -> ApplicationResponse {
    if actor.role == Role::Candidate {
        response.for_candidate()
    } else {
        response
    }
}

fn text_value(raw: String) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Multipart form: `job_id`, optional `cover_letter` and `source` text
/// parts, and an optional `resume` file. Without a file the profile resume
/// is used.
#[axum::debug_handler]
pub async fn apply(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse> {
    let (user, _) = current_actor(&state, &claims).await?;

    let mut form = ApplyForm::default();
    let mut resume = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "job_id" => {
                let raw = field.text().await?;
                let id = Uuid::parse_str(raw.trim())
                    .map_err(|_| Error::BadRequest("job_id must be a UUID".to_string()))?;
                form.job_id = Some(id);
            }
            "cover_letter" => form.cover_letter = text_value(field.text().await?),
            "source" => form.source = text_value(field.text().await?),
            "resume" => {
                if field.file_name().map(|n| !n.is_empty()).unwrap_or(false) {
                    resume = Some(read_upload(field).await?);
                }
            }
            _ => {
                tracing::debug!(field = %name, "ignoring unknown apply form field");
            }
        }
    }

    form.validate()?;
    let application = state
        .application_service
        .apply(&user, form, resume)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(ApplicationResponse::from(application).for_candidate()),
    ))
}

#[axum::debug_handler]
pub async fn list_applications(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<ApplicationListQuery>,
) -> Result<impl IntoResponse> {
    let (_, actor) = current_actor(&state, &claims).await?;
    let page = state.application_service.list(&actor, &query).await?;
    Ok(Json(page.map(|row| present(&actor, ApplicationResponse::from(row)))))
}

#[axum::debug_handler]
pub async fn get_application(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let (_, actor) = current_actor(&state, &claims).await?;
    let row = state.application_service.get(&actor, id).await?;
    Ok(Json(present(&actor, ApplicationResponse::from(row))))
}

#[axum::debug_handler]
pub async fn update_application_status(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateApplicationStatusPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let (_, actor) = current_actor(&state, &claims).await?;
    let application = state
        .application_service
        .update_status(&actor, id, payload)
        .await?;
    Ok(Json(ApplicationResponse::from(application)))
}

/// The body is optional; an empty request withdraws without a reason.
#[axum::debug_handler]
pub async fn withdraw(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> Result<impl IntoResponse> {
    let reason = if body.iter().all(u8::is_ascii_whitespace) {
        None
    } else {
        let payload: WithdrawPayload = serde_json::from_slice(&body)?;
        payload.validate()?;
        payload.reason.and_then(text_value)
    };

    let (_, actor) = current_actor(&state, &claims).await?;
    let application = state
        .application_service
        .withdraw(&actor, id, reason)
        .await?;
    Ok(Json(ApplicationResponse::from(application).for_candidate()))
}

#[axum::debug_handler]
pub async fn add_note(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AddNotePayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let (_, actor) = current_actor(&state, &claims).await?;
    let application = state
        .application_service
        .add_note(&actor, id, payload)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(ApplicationResponse::from(application)),
    ))
}

#[axum::debug_handler]
pub async fn schedule_interview(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ScheduleInterviewPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let (_, actor) = current_actor(&state, &claims).await?;
    let application = state
        .application_service
        .schedule_interview(&actor, id, payload)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(ApplicationResponse::from(application)),
    ))
}

#[axum::debug_handler]
pub async fn update_interview(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((id, interview_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<UpdateInterviewPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let (_, actor) = current_actor(&state, &claims).await?;
    let application = state
        .application_service
        .update_interview(&actor, id, interview_id, payload)
        .await?;
    Ok(Json(ApplicationResponse::from(application)))
}

#[axum::debug_handler]
pub async fn extend_offer(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ExtendOfferPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let (_, actor) = current_actor(&state, &claims).await?;
    let application = state
        .application_service
        .extend_offer(&actor, id, payload)
        .await?;
    Ok(Json(ApplicationResponse::from(application)))
}

#[axum::debug_handler]
pub async fn respond_offer(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RespondOfferPayload>,
) -> Result<impl IntoResponse> {
    let (_, actor) = current_actor(&state, &claims).await?;
    let application = state
        .application_service
        .respond_offer(&actor, id, payload.accept)
        .await?;
    Ok(Json(ApplicationResponse::from(application).for_candidate()))
}

#[axum::debug_handler]
pub async fn delete_application(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let (_, actor) = current_actor(&state, &claims).await?;
    state.application_service.delete(&actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
