use axum::{
    extract::Request,
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::user::Role;
use crate::utils::token::decode_jwt;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    pub role: Option<String>,
}

impl Claims {
    pub fn user_id(&self) -> Result<Uuid> {
        Uuid::parse_str(&self.sub).map_err(|_| Error::Unauthorized("invalid_token".into()))
    }

    pub fn role(&self) -> Option<Role> {
        self.role.as_deref().and_then(|r| r.parse().ok())
    }
}

pub const STAFF_ROLES: &[Role] = &[Role::Recruiter, Role::HrManager, Role::Admin];
pub const RECRUITER_ROLES: &[Role] = &[Role::Recruiter, Role::Admin];
pub const CANDIDATE_ROLES: &[Role] = &[Role::Candidate];
pub const ADMIN_ROLES: &[Role] = &[Role::Admin];

fn reject(status: StatusCode, code: &str) -> Response {
    (status, Json(json!({ "error": code }))).into_response()
}

fn claims_from_headers(headers: &HeaderMap) -> std::result::Result<Claims, &'static str> {
    let auth_header = headers
        .get(AUTHORIZATION)
        .ok_or("missing_authorization")?;
    let auth_str = auth_header.to_str().map_err(|_| "bad_authorization")?;
    let token = auth_str
        .strip_prefix("Bearer ")
        .ok_or("unsupported_scheme")?;

    let config = crate::config::get_config();
    decode_jwt(&config.jwt_secret, token.trim()).map_err(|_| "invalid_token")
}

pub async fn require_bearer_auth(req: Request, next: Next) -> Response {
    require_roles(req, next, &[]).await
}

/// Rejects requests without a valid token, or whose role claim is not in
/// `allowed`. An empty `allowed` accepts any authenticated user.
pub async fn require_roles(mut req: Request, next: Next, allowed: &[Role]) -> Response {
    let claims = match claims_from_headers(req.headers()) {
        Ok(claims) => claims,
        Err(code) => return reject(StatusCode::UNAUTHORIZED, code),
    };

    if !allowed.is_empty() {
        let permitted = claims.role().map(|r| allowed.contains(&r)).unwrap_or(false);
        if !permitted {
            tracing::debug!(sub = %claims.sub, role = ?claims.role, "role not permitted");
            return reject(StatusCode::FORBIDDEN, "forbidden");
        }
    }

    req.extensions_mut().insert(claims);
    next.run(req).await
}

pub async fn require_staff(req: Request, next: Next) -> Response {
    require_roles(req, next, STAFF_ROLES).await
}

pub async fn require_recruiter(req: Request, next: Next) -> Response {
    require_roles(req, next, RECRUITER_ROLES).await
}

pub async fn require_candidate(req: Request, next: Next) -> Response {
    require_roles(req, next, CANDIDATE_ROLES).await
}

pub async fn require_admin(req: Request, next: Next) -> Response {
    require_roles(req, next, ADMIN_ROLES).await
}

/// Attaches claims when a valid token is present and never rejects.
pub async fn optional_auth(mut req: Request, next: Next) -> Response {
    if let Ok(claims) = claims_from_headers(req.headers()) {
        req.extensions_mut().insert(claims);
    }
    next.run(req).await
}
