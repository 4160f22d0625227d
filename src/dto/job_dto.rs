use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::models::job::{EmploymentType, ExperienceLevel, Job, JobStatus, SalaryPeriod};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_create_salary"))]
pub struct CreateJobPayload {
    /// Required for admins; recruiters always post for their own company.
    pub company_id: Option<Uuid>,
    #[validate(length(min = 3, max = 160))]
    pub title: String,
    #[validate(length(min = 20, max = 20000))]
    pub description: String,
    #[serde(default)]
    pub responsibilities: Vec<String>,
    #[serde(default)]
    #[validate(custom(function = "crate::utils::validation::skill_list"))]
    pub required_skills: Vec<String>,
    #[serde(default)]
    #[validate(custom(function = "crate::utils::validation::skill_list"))]
    pub preferred_skills: Vec<String>,
    #[serde(default)]
    pub benefits: Vec<String>,
    pub employment_type: EmploymentType,
    pub experience_level: Option<ExperienceLevel>,
    #[validate(length(min = 2, max = 160))]
    pub location: String,
    #[serde(default)]
    pub is_remote: bool,
    pub salary_min: Option<Decimal>,
    pub salary_max: Option<Decimal>,
    #[validate(length(equal = 3))]
    pub salary_currency: Option<String>,
    pub salary_period: Option<SalaryPeriod>,
    /// Only `draft` or `active` are accepted at creation.
    pub status: Option<JobStatus>,
    pub application_deadline: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default)]
#[validate(schema(function = "validate_update_salary"))]
pub struct UpdateJobPayload {
    #[validate(length(min = 3, max = 160))]
    pub title: Option<String>,
    #[validate(length(min = 20, max = 20000))]
    pub description: Option<String>,
    pub responsibilities: Option<Vec<String>>,
    #[validate(custom(function = "crate::utils::validation::skill_list"))]
    pub required_skills: Option<Vec<String>>,
    #[validate(custom(function = "crate::utils::validation::skill_list"))]
    pub preferred_skills: Option<Vec<String>>,
    pub benefits: Option<Vec<String>>,
    pub employment_type: Option<EmploymentType>,
    pub experience_level: Option<ExperienceLevel>,
    #[validate(length(min = 2, max = 160))]
    pub location: Option<String>,
    pub is_remote: Option<bool>,
    pub salary_min: Option<Decimal>,
    pub salary_max: Option<Decimal>,
    #[validate(length(equal = 3))]
    pub salary_currency: Option<String>,
    pub salary_period: Option<SalaryPeriod>,
    pub application_deadline: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateJobStatusPayload {
    pub status: JobStatus,
}

fn check_salary(min: Option<Decimal>, max: Option<Decimal>) -> Result<(), ValidationError> {
    if min.map(|m| m.is_sign_negative()).unwrap_or(false)
        || max.map(|m| m.is_sign_negative()).unwrap_or(false)
    {
        return Err(ValidationError::new("negative_salary"));
    }
    if let (Some(min), Some(max)) = (min, max) {
        if min > max {
            let mut err = ValidationError::new("salary_range");
            err.message = Some("salary_min must not exceed salary_max".into());
            return Err(err);
        }
    }
    Ok(())
}

fn validate_create_salary(payload: &CreateJobPayload) -> Result<(), ValidationError> {
    check_salary(payload.salary_min, payload.salary_max)
}

fn validate_update_salary(payload: &UpdateJobPayload) -> Result<(), ValidationError> {
    check_salary(payload.salary_min, payload.salary_max)
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct JobListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub sort: Option<String>,
    pub search: Option<String>,
    pub location: Option<String>,
    pub employment_type: Option<EmploymentType>,
    pub experience_level: Option<ExperienceLevel>,
    pub company_id: Option<Uuid>,
    pub is_remote: Option<bool>,
    /// Comma separated; matches jobs requiring any of them.
    pub skills: Option<String>,
    pub salary_min: Option<Decimal>,
    /// Only honoured on the recruiter listing.
    pub status: Option<JobStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResponse {
    pub id: Uuid,
    pub company_id: Uuid,
    pub recruiter_id: Uuid,
    pub title: String,
    pub description: String,
    pub responsibilities: Vec<String>,
    pub required_skills: Vec<String>,
    pub preferred_skills: Vec<String>,
    pub benefits: Vec<String>,
    pub employment_type: String,
    pub experience_level: Option<String>,
    pub location: String,
    pub is_remote: bool,
    pub salary_min: Option<Decimal>,
    pub salary_max: Option<Decimal>,
    pub salary_currency: String,
    pub salary_period: String,
    pub status: String,
    pub application_deadline: Option<DateTime<Utc>>,
    pub applications_count: i32,
    pub views_count: i32,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Public listing card: no counters, description trimmed to a teaser.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSummary {
    pub id: Uuid,
    pub company_id: Uuid,
    pub title: String,
    pub summary: String,
    pub employment_type: String,
    pub experience_level: Option<String>,
    pub location: String,
    pub is_remote: bool,
    pub salary_min: Option<Decimal>,
    pub salary_max: Option<Decimal>,
    pub salary_currency: String,
    pub salary_period: String,
    pub required_skills: Vec<String>,
    pub application_deadline: Option<DateTime<Utc>>,
    pub published_at: Option<DateTime<Utc>>,
}

const SUMMARY_CHARS: usize = 280;

fn teaser(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() > SUMMARY_CHARS {
        format!("{}…", trimmed.chars().take(SUMMARY_CHARS).collect::<String>().trim_end())
    } else {
        trimmed.to_string()
    }
}

impl From<Job> for JobResponse {
    fn from(value: Job) -> Self {
        Self {
            id: value.id,
            company_id: value.company_id,
            recruiter_id: value.recruiter_id,
            title: value.title,
            description: value.description,
            responsibilities: value.responsibilities,
            required_skills: value.required_skills,
            preferred_skills: value.preferred_skills,
            benefits: value.benefits,
            employment_type: value.employment_type,
            experience_level: value.experience_level,
            location: value.location,
            is_remote: value.is_remote,
            salary_min: value.salary_min,
            salary_max: value.salary_max,
            salary_currency: value.salary_currency,
            salary_period: value.salary_period,
            status: value.status,
            application_deadline: value.application_deadline,
            applications_count: value.applications_count,
            views_count: value.views_count,
            published_at: value.published_at,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

impl From<Job> for JobSummary {
    fn from(value: Job) -> Self {
        Self {
            id: value.id,
            company_id: value.company_id,
            summary: teaser(&value.description),
            title: value.title,
            employment_type: value.employment_type,
            experience_level: value.experience_level,
            location: value.location,
            is_remote: value.is_remote,
            salary_min: value.salary_min,
            salary_max: value.salary_max,
            salary_currency: value.salary_currency,
            salary_period: value.salary_period,
            required_skills: value.required_skills,
            application_deadline: value.application_deadline,
            published_at: value.published_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures;

    fn create_payload() -> CreateJobPayload {
        CreateJobPayload {
            company_id: None,
            title: "Assistant Teacher".into(),
            description: "Support the lead teacher in a preschool classroom.".into(),
            responsibilities: vec![],
            required_skills: vec!["CPR".into()],
            preferred_skills: vec![],
            benefits: vec![],
            employment_type: EmploymentType::PartTime,
            experience_level: None,
            location: "Northside".into(),
            is_remote: false,
            salary_min: Some(Decimal::new(18, 0)),
            salary_max: Some(Decimal::new(22, 0)),
            salary_currency: Some("USD".into()),
            salary_period: Some(SalaryPeriod::Hourly),
            status: None,
            application_deadline: None,
        }
    }

    #[test]
    fn create_payload_validates() {
        assert!(create_payload().validate().is_ok());
    }

    #[test]
    fn inverted_salary_range_is_rejected() {
        let mut p = create_payload();
        p.salary_min = Some(Decimal::new(30, 0));
        assert!(p.validate().is_err());

        let update = UpdateJobPayload {
            salary_min: Some(Decimal::new(-1, 0)),
            ..Default::default()
        };
        assert!(update.validate().is_err());
    }

    #[test]
    fn short_description_is_rejected() {
        let mut p = create_payload();
        p.description = "too short".into();
        assert!(p.validate().is_err());
    }

    #[test]
    fn summary_truncates_long_descriptions() {
        let mut job = fixtures::job();
        job.description = "a".repeat(400);
        let summary = JobSummary::from(job);
        assert_eq!(summary.summary.chars().count(), SUMMARY_CHARS + 1);
        assert!(summary.summary.ends_with('…'));
    }

    #[test]
    fn employment_type_deserializes_from_json() {
        let raw = serde_json::json!({
            "title": "Cook",
            "description": "Prepare healthy meals for 80 children daily.",
            "employment_type": "full_time",
            "location": "Central"
        });
        let p: CreateJobPayload = serde_json::from_value(raw).unwrap();
        assert_eq!(p.employment_type, EmploymentType::FullTime);
        assert!(p.required_skills.is_empty());
    }
}
