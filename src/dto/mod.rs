pub mod application_dto;
pub mod auth_dto;
pub mod company_dto;
pub mod job_dto;
pub mod user_dto;
