use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use super::text_enum;

text_enum! {
    /// Pipeline stages. Any stage may be set from any other by an authorized
    /// actor; the pipeline order is only used for display.
    ApplicationStatus {
        Submitted => "submitted",
        UnderReview => "under_review",
        Shortlisted => "shortlisted",
        InterviewScheduled => "interview_scheduled",
        Interviewed => "interviewed",
        OfferExtended => "offer_extended",
        Hired => "hired",
        Rejected => "rejected",
        Withdrawn => "withdrawn",
    }
}

impl ApplicationStatus {
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            ApplicationStatus::Hired | ApplicationStatus::Rejected | ApplicationStatus::Withdrawn
        )
    }
}

text_enum! {
    InterviewKind {
        Phone => "phone",
        Video => "video",
        Onsite => "onsite",
    }
}

text_enum! {
    InterviewStatus {
        Scheduled => "scheduled",
        Completed => "completed",
        Cancelled => "cancelled",
        NoShow => "no_show",
    }
}

text_enum! {
    OfferStatus {
        Pending => "pending",
        Accepted => "accepted",
        Declined => "declined",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub status: ApplicationStatus,
    pub note: Option<String>,
    pub changed_by: Option<Uuid>,
    pub changed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Note {
    pub id: Uuid,
    pub author_id: Uuid,
    pub content: String,
    #[serde(default)]
    pub is_private: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interview {
    pub id: Uuid,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: i32,
    pub kind: InterviewKind,
    pub location: Option<String>,
    #[serde(default)]
    pub interviewer_ids: Vec<Uuid>,
    pub status: InterviewStatus,
    pub feedback: Option<String>,
    pub rating: Option<i32>,
    pub created_by: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Offer {
    pub salary: Decimal,
    pub currency: String,
    pub start_date: Option<NaiveDate>,
    pub expires_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub status: OfferStatus,
    pub extended_by: Uuid,
    pub extended_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, FromRow)]
pub struct Application {
    pub id: Uuid,
    pub job_id: Uuid,
    pub candidate_id: Uuid,
    pub status: String,
    pub cover_letter: Option<String>,
    pub resume_url: Option<String>,
    pub source: Option<String>,
    pub timeline: Json<Vec<TimelineEntry>>,
    pub notes: Json<Vec<Note>>,
    pub interviews: Json<Vec<Interview>>,
    pub offer: Option<Json<Offer>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Application {
    pub fn status(&self) -> Option<ApplicationStatus> {
        self.status.parse().ok()
    }
}

/// Application row joined with the job fields needed for access checks.
#[derive(Debug, Clone, FromRow)]
pub struct ApplicationWithJob {
    #[sqlx(flatten)]
    pub application: Application,
    pub job_title: String,
    pub job_company_id: Uuid,
    pub job_recruiter_id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn final_statuses() {
        let finals: Vec<_> = ApplicationStatus::ALL
            .iter()
            .filter(|s| s.is_final())
            .map(|s| s.as_str())
            .collect();
        assert_eq!(finals, vec!["hired", "rejected", "withdrawn"]);
    }

    #[test]
    fn timeline_entry_serializes_status_as_text() {
        let entry = TimelineEntry {
            status: ApplicationStatus::InterviewScheduled,
            note: None,
            changed_by: None,
            changed_at: Utc::now(),
        };
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["status"], "interview_scheduled");
    }
}
