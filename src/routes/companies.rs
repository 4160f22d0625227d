use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::company_dto::{
        AddCompanyAdminPayload, CompanyAdminResponse, CompanyResponse, CreateCompanyPayload,
        UpdateCompanyPayload,
    },
    error::Result,
    middleware::auth::Claims,
    routes::current_actor,
    services::access::{can_edit_company, is_member_of},
    AppState,
};

#[axum::debug_handler]
pub async fn create_company(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateCompanyPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let (_, actor) = current_actor(&state, &claims).await?;
    let company = state.company_service.create(&actor, payload).await?;
    let admins = state.company_service.admins(company.id).await?;
    Ok((
        StatusCode::CREATED,
        Json(CompanyResponse::from(company).with_admins(admins)),
    ))
}

/// Public profile. Editors and admins also get the admin list.
#[axum::debug_handler]
pub async fn get_company(
    State(state): State<AppState>,
    claims: Option<Extension<Claims>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let company = state.company_service.get(id).await?;
    let mut response = CompanyResponse::from(company);

    if let Some(Extension(claims)) = claims {
        if let Ok((_, actor)) = current_actor(&state, &claims).await {
            let membership = state.company_service.membership(id, actor.id).await?;
            let member = membership.is_some() && is_member_of(&actor, id);
            if member || can_edit_company(&actor, id, membership) {
                let admins = state.company_service.admins(id).await?;
                response = response.with_admins(admins);
            }
        }
    }

    Ok(Json(response))
}

#[axum::debug_handler]
pub async fn update_company(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCompanyPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let (_, actor) = current_actor(&state, &claims).await?;
    let company = state.company_service.update(&actor, id, payload).await?;
    Ok(Json(CompanyResponse::from(company)))
}

#[axum::debug_handler]
pub async fn add_company_admin(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AddCompanyAdminPayload>,
) -> Result<impl IntoResponse> {
    let (_, actor) = current_actor(&state, &claims).await?;
    let admin = state.company_service.add_admin(&actor, id, payload).await?;
    Ok((StatusCode::CREATED, Json(CompanyAdminResponse::from(admin))))
}

#[axum::debug_handler]
pub async fn remove_company_admin(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((id, user_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse> {
    let (_, actor) = current_actor(&state, &claims).await?;
    state
        .company_service
        .remove_admin(&actor, id, user_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
