use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::text_enum;

text_enum! {
    JobStatus {
        Draft => "draft",
        Active => "active",
        Paused => "paused",
        Filled => "filled",
        Cancelled => "cancelled",
        Expired => "expired",
    }
}

text_enum! {
    EmploymentType {
        FullTime => "full_time",
        PartTime => "part_time",
        Contract => "contract",
        Temporary => "temporary",
        Internship => "internship",
    }
}

text_enum! {
    ExperienceLevel {
        Entry => "entry",
        Mid => "mid",
        Senior => "senior",
        Lead => "lead",
    }
}

text_enum! {
    SalaryPeriod {
        Hourly => "hourly",
        Monthly => "monthly",
        Yearly => "yearly",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Job {
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

impl Job {
    pub fn status(&self) -> Option<JobStatus> {
        self.status.parse().ok()
    }

    pub fn deadline_passed(&self, now: DateTime<Utc>) -> bool {
        matches!(self.application_deadline, Some(deadline) if deadline < now)
    }

    /// Whether candidates may apply right now.
    pub fn accepts_applications(&self, now: DateTime<Utc>) -> bool {
        self.status() == Some(JobStatus::Active) && !self.deadline_passed(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures;
    use chrono::Duration;

    #[test]
    fn parses_status_strings() {
        assert_eq!("paused".parse::<JobStatus>().unwrap(), JobStatus::Paused);
        assert!("archived".parse::<JobStatus>().is_err());
        assert_eq!(JobStatus::ALL.len(), 6);
        assert_eq!(EmploymentType::PartTime.to_string(), "part_time");
    }

    #[test]
    fn serde_uses_snake_case_text() {
        let json = serde_json::to_string(&EmploymentType::FullTime).unwrap();
        assert_eq!(json, "\"full_time\"");
        let level: ExperienceLevel = serde_json::from_str("\"lead\"").unwrap();
        assert_eq!(level, ExperienceLevel::Lead);
    }

    #[test]
    fn active_job_before_deadline_accepts_applications() {
        let now = Utc::now();
        let mut job = fixtures::job();
        job.application_deadline = Some(now + Duration::days(3));
        assert!(job.accepts_applications(now));

        job.application_deadline = Some(now - Duration::hours(1));
        assert!(!job.accepts_applications(now));

        job.application_deadline = None;
        job.status = "paused".into();
        assert!(!job.accepts_applications(now));
    }
}
