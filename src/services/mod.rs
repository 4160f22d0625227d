pub mod access;
pub mod application_service;
pub mod auth_service;
pub mod company_service;
pub mod email_service;
pub mod export_service;
pub mod job_service;
pub mod user_service;
