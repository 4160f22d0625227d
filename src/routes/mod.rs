pub mod applications;
pub mod auth;
pub mod companies;
pub mod health;
pub mod jobs;
pub mod users;

use axum::{
    extract::{multipart::Field, DefaultBodyLimit},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, patch, post, put},
    Router,
};
use tower_http::{
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};

use crate::{
    config::Config,
    error::{Error, Result},
    middleware::{
        auth::{
            optional_auth, require_admin, require_bearer_auth, require_candidate,
            require_recruiter, require_staff, Claims,
        },
        cors::cors_layer,
        rate_limit::{new_rps_state, rps_middleware},
    },
    models::user::User,
    services::access::Actor,
    utils::upload::UploadedFile,
    AppState,
};

/// Multipart overhead allowed on top of the file size limit.
const FORM_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Reloads the caller so role and company changes apply without a new token.
pub(crate) async fn current_actor(state: &AppState, claims: &Claims) -> Result<(User, Actor)> {
    state.user_service.load_actor(claims.user_id()?).await
}

pub(crate) async fn read_upload(field: Field<'_>) -> Result<UploadedFile> {
    let filename = field
        .file_name()
        .map(str::to_string)
        .ok_or_else(|| Error::BadRequest("Uploaded part has no file name".to_string()))?;
    let data = field.bytes().await?;
    Ok(UploadedFile { filename, data })
}

/// Everything under `/api/v1`.
pub fn api_router(config: &Config) -> Router<AppState> {
    let auth_public = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/forgot-password", post(auth::forgot_password))
        .route("/auth/reset-password", post(auth::reset_password))
        .layer(from_fn_with_state(
            new_rps_state(config.auth_rps, config.trust_proxy),
            rps_middleware,
        ));

    let public = Router::new()
        .route("/jobs", get(jobs::list_jobs))
        .route("/jobs/:id", get(jobs::get_job))
        .route("/companies/:id", get(companies::get_company))
        .route_layer(from_fn(optional_auth));

    let authenticated = Router::new()
        .route("/auth/me", get(auth::me).patch(auth::update_me))
        .route("/auth/password", patch(auth::change_password))
        .route("/companies/:id", patch(companies::update_company))
        .route("/companies/:id/admins", post(companies::add_company_admin))
        .route(
            "/companies/:id/admins/:user_id",
            axum::routing::delete(companies::remove_company_admin),
        )
        .route("/applications", get(applications::list_applications))
        .route("/applications/:id", get(applications::get_application))
        .route_layer(from_fn(require_bearer_auth));

    let candidate = Router::new()
        .route("/auth/me/resume", post(auth::upload_resume))
        .route("/applications", post(applications::apply))
        .route("/applications/:id/withdraw", post(applications::withdraw))
        .route(
            "/applications/:id/offer/respond",
            post(applications::respond_offer),
        )
        .route_layer(from_fn(require_candidate));

    let staff = Router::new()
        .route(
            "/jobs/:id/applications",
            get(jobs::list_job_applications),
        )
        .route(
            "/jobs/:id/applications/export",
            get(jobs::export_job_applications),
        )
        .route("/applications/:id/notes", post(applications::add_note))
        .route_layer(from_fn(require_staff));

    let recruiter = Router::new()
        .route("/companies", post(companies::create_company))
        .route("/jobs", post(jobs::create_job))
        .route("/jobs/mine", get(jobs::list_my_jobs))
        .route(
            "/jobs/:id",
            patch(jobs::update_job).delete(jobs::delete_job),
        )
        .route("/jobs/:id/status", patch(jobs::update_job_status))
        .route(
            "/applications/:id/status",
            patch(applications::update_application_status),
        )
        .route(
            "/applications/:id/interviews",
            post(applications::schedule_interview),
        )
        .route(
            "/applications/:id/interviews/:interview_id",
            patch(applications::update_interview),
        )
        .route("/applications/:id/offer", put(applications::extend_offer))
        .route_layer(from_fn(require_recruiter));

    let admin = Router::new()
        .route("/users", get(users::list_users))
        .route("/users/:id", get(users::get_user))
        .route("/users/:id/role", patch(users::update_user_role))
        .route("/users/:id/status", patch(users::update_user_status))
        .route(
            "/applications/:id",
            axum::routing::delete(applications::delete_application),
        )
        .route_layer(from_fn(require_admin));

    Router::new()
        .merge(public)
        .merge(authenticated)
        .merge(candidate)
        .merge(staff)
        .merge(recruiter)
        .merge(admin)
        .layer(from_fn_with_state(
            new_rps_state(config.api_rps, config.trust_proxy),
            rps_middleware,
        ))
        .merge(auth_public)
}

/// The full application: health check, API, uploaded files and the
/// optional static frontend.
pub fn app_router(state: AppState, config: &Config) -> Router {
    let mut app = Router::new()
        .route("/health", get(health::health))
        .nest("/api/v1", api_router(config))
        .nest_service("/uploads", ServeDir::new(&config.uploads_dir));

    if let Some(static_dir) = &config.static_dir {
        let index = std::path::Path::new(static_dir).join("index.html");
        app = app.fallback_service(ServeDir::new(static_dir).fallback(ServeFile::new(index)));
    }

    app.layer(DefaultBodyLimit::max(
        config.max_upload_bytes + FORM_OVERHEAD_BYTES,
    ))
    .layer(cors_layer(&config.cors_origins))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}
