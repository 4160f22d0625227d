use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use validator::Validate;

use crate::{
    dto::auth_dto::{
        AuthResponse, ChangePasswordPayload, ForgotPasswordPayload, LoginPayload,
        MessageResponse, RegisterPayload, ResetPasswordPayload, UpdateProfilePayload,
    },
    dto::user_dto::UserResponse,
    error::{Error, Result},
    middleware::auth::Claims,
    routes::read_upload,
    services::auth_service::Session,
    utils::upload::save_resume,
    AppState,
};

fn auth_response(session: Session) -> AuthResponse {
    AuthResponse {
        token: session.token,
        token_type: "Bearer".to_string(),
        expires_in: session.expires_in,
        user: UserResponse::from(session.user),
    }
}

#[axum::debug_handler]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let session = state.auth_service.register(payload).await?;
    Ok((StatusCode::CREATED, Json(auth_response(session))))
}

#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let session = state.auth_service.login(payload).await?;
    Ok(Json(auth_response(session)))
}

#[axum::debug_handler]
pub async fn me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse> {
    let user = state.user_service.load_active(claims.user_id()?).await?;
    Ok(Json(UserResponse::from(user)))
}

#[axum::debug_handler]
pub async fn update_me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<UpdateProfilePayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let user = state.user_service.load_active(claims.user_id()?).await?;
    let user = state.auth_service.update_profile(user, payload).await?;
    Ok(Json(UserResponse::from(user)))
}

/// Multipart upload with a single `resume` file part.
#[axum::debug_handler]
pub async fn upload_resume(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse> {
    let user = state.user_service.load_active(claims.user_id()?).await?;

    let mut upload = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some("resume") {
            upload = Some(read_upload(field).await?);
        }
    }
    let upload = upload.ok_or_else(|| Error::BadRequest("Missing 'resume' file".to_string()))?;

    let stored = save_resume(
        &state.uploads.uploads_dir,
        &upload.filename,
        &upload.data,
        state.uploads.max_bytes,
    )
    .await?;
    tracing::info!(user_id = %user.id, url = %stored.url, size = stored.size, "resume uploaded");

    let user = state.auth_service.set_resume(user.id, stored).await?;
    Ok(Json(UserResponse::from(user)))
}

#[axum::debug_handler]
pub async fn change_password(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<ChangePasswordPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let user = state.user_service.load_active(claims.user_id()?).await?;
    state.auth_service.change_password(&user, payload).await?;
    Ok(Json(MessageResponse::new("Password updated")))
}

#[axum::debug_handler]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<ForgotPasswordPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    state.auth_service.forgot_password(&payload.email).await?;
    Ok(Json(MessageResponse::new(
        "If an account exists for that email, a reset link has been sent",
    )))
}

#[axum::debug_handler]
pub async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    state.auth_service.reset_password(payload).await?;
    Ok(Json(MessageResponse::new("Password has been reset")))
}
