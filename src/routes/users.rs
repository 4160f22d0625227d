use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Json},
    Extension,
};
use uuid::Uuid;

use crate::{
    dto::user_dto::{UpdateRolePayload, UpdateUserStatusPayload, UserListQuery, UserResponse},
    error::Result,
    middleware::auth::Claims,
    routes::current_actor,
    AppState,
};

#[axum::debug_handler]
pub async fn list_users(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<UserListQuery>,
) -> Result<impl IntoResponse> {
    let (_, admin) = current_actor(&state, &claims).await?;
    let page = state.user_service.list(&admin, &query).await?;
    Ok(Json(page.map(UserResponse::from)))
}

#[axum::debug_handler]
pub async fn get_user(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let (_, admin) = current_actor(&state, &claims).await?;
    let user = state.user_service.get(&admin, id).await?;
    Ok(Json(UserResponse::from(user)))
}

#[axum::debug_handler]
pub async fn update_user_role(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateRolePayload>,
) -> Result<impl IntoResponse> {
    let (_, admin) = current_actor(&state, &claims).await?;
    let user = state.user_service.update_role(&admin, id, payload).await?;
    Ok(Json(UserResponse::from(user)))
}

#[axum::debug_handler]
pub async fn update_user_status(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUserStatusPayload>,
) -> Result<impl IntoResponse> {
    let (_, admin) = current_actor(&state, &claims).await?;
    let user = state
        .user_service
        .set_active(&admin, id, payload.is_active)
        .await?;
    Ok(Json(UserResponse::from(user)))
}
