pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

use crate::config::Config;
use crate::error::Result;
use crate::services::{
    application_service::{ApplicationService, UploadSettings},
    auth_service::{AuthService, AuthSettings},
    company_service::CompanyService,
    email_service::EmailService,
    job_service::JobService,
    user_service::UserService,
};
use sqlx::PgPool;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub user_service: UserService,
    pub auth_service: AuthService,
    pub company_service: CompanyService,
    pub job_service: JobService,
    pub application_service: ApplicationService,
    pub uploads: UploadSettings,
}

impl AppState {
    pub fn new(pool: PgPool) -> Result<Self> {
        let config = crate::config::get_config();
        let email_service = EmailService::from_config(config.smtp.as_ref(), &config.frontend_url)?;
        Ok(Self::with_email(pool, config, email_service))
    }

    pub fn with_email(pool: PgPool, config: &Config, email_service: EmailService) -> Self {
        let uploads = UploadSettings {
            uploads_dir: config.uploads_dir.clone(),
            max_bytes: config.max_upload_bytes,
        };

        let user_service = UserService::new(pool.clone());
        let auth_service = AuthService::new(
            pool.clone(),
            AuthSettings::from_config(config),
            email_service.clone(),
        );
        let company_service = CompanyService::new(pool.clone());
        let job_service = JobService::new(pool.clone(), company_service.clone());
        let application_service = ApplicationService::new(
            pool.clone(),
            job_service.clone(),
            company_service.clone(),
            user_service.clone(),
            email_service,
            uploads.clone(),
        );

        Self {
            pool,
            user_service,
            auth_service,
            company_service,
            job_service,
            application_service,
            uploads,
        }
    }
}
