use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::models::application::{
    Application, ApplicationStatus, ApplicationWithJob, Interview, InterviewKind, InterviewStatus,
    Note, Offer, TimelineEntry,
};

/// Text fields of the multipart apply form; the resume travels as a file part.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct ApplyForm {
    pub job_id: Option<Uuid>,
    #[validate(length(max = 10000))]
    pub cover_letter: Option<String>,
    #[validate(length(max = 60))]
    pub source: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ApplicationListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub sort: Option<String>,
    pub status: Option<ApplicationStatus>,
    pub job_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpdateApplicationStatusPayload {
    pub status: ApplicationStatus,
    #[validate(length(max = 2000))]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct WithdrawPayload {
    #[validate(length(max = 2000))]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AddNotePayload {
    #[validate(length(min = 1, max = 5000))]
    pub content: String,
    #[serde(default)]
    pub is_private: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ScheduleInterviewPayload {
    pub scheduled_at: DateTime<Utc>,
    #[validate(range(min = 15, max = 480))]
    pub duration_minutes: Option<i32>,
    pub kind: InterviewKind,
    #[validate(length(max = 500))]
    pub location: Option<String>,
    #[serde(default)]
    pub interviewer_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default)]
pub struct UpdateInterviewPayload {
    pub scheduled_at: Option<DateTime<Utc>>,
    #[validate(range(min = 15, max = 480))]
    pub duration_minutes: Option<i32>,
    #[validate(length(max = 500))]
    pub location: Option<String>,
    pub status: Option<InterviewStatus>,
    #[validate(length(max = 5000))]
    pub feedback: Option<String>,
    #[validate(range(min = 1, max = 5))]
    pub rating: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ExtendOfferPayload {
    #[validate(custom(function = "positive_amount"))]
    pub salary: Decimal,
    #[validate(length(equal = 3))]
    pub currency: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub expires_at: Option<DateTime<Utc>>,
    #[validate(length(max = 5000))]
    pub notes: Option<String>,
}

fn positive_amount(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_positive() && !value.is_zero() {
        Ok(())
    } else {
        Err(ValidationError::new("positive_amount"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RespondOfferPayload {
    pub accept: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationResponse {
    pub id: Uuid,
    pub job_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_title: Option<String>,
    pub candidate_id: Uuid,
    pub status: String,
    pub cover_letter: Option<String>,
    pub resume_url: Option<String>,
    pub source: Option<String>,
    pub timeline: Vec<TimelineEntry>,
    pub notes: Vec<Note>,
    pub interviews: Vec<Interview>,
    pub offer: Option<Offer>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Application> for ApplicationResponse {
    fn from(value: Application) -> Self {
        Self {
            id: value.id,
            job_id: value.job_id,
            job_title: None,
            candidate_id: value.candidate_id,
            status: value.status,
            cover_letter: value.cover_letter,
            resume_url: value.resume_url,
            source: value.source,
            timeline: value.timeline.0,
            notes: value.notes.0,
            interviews: value.interviews.0,
            offer: value.offer.map(|o| o.0),
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

impl From<ApplicationWithJob> for ApplicationResponse {
    fn from(value: ApplicationWithJob) -> Self {
        let mut response = ApplicationResponse::from(value.application);
        response.job_title = Some(value.job_title);
        response
    }
}

impl ApplicationResponse {
    /// Candidates never see private staff notes, interview feedback or the
    /// interview panel.
    pub fn for_candidate(mut self) -> Self {
        self.notes.retain(|n| !n.is_private);
        for interview in &mut self.interviews {
            interview.feedback = None;
            interview.rating = None;
            interview.interviewer_ids.clear();
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures;
    use sqlx::types::Json;

    #[test]
    fn candidate_view_hides_private_notes() {
        let mut app = fixtures::application(Uuid::new_v4(), Uuid::new_v4());
        let now = Utc::now();
        app.notes = Json(vec![
            Note {
                id: Uuid::new_v4(),
                author_id: Uuid::new_v4(),
                content: "strong references".into(),
                is_private: true,
                created_at: now,
            },
            Note {
                id: Uuid::new_v4(),
                author_id: Uuid::new_v4(),
                content: "please bring ID".into(),
                is_private: false,
                created_at: now,
            },
        ]);

        let response = ApplicationResponse::from(app).for_candidate();
        assert_eq!(response.notes.len(), 1);
        assert_eq!(response.notes[0].content, "please bring ID");
    }

    #[test]
    fn candidate_view_strips_interview_assessment() {
        let mut app = fixtures::application(Uuid::new_v4(), Uuid::new_v4());
        app.interviews = Json(vec![Interview {
            id: Uuid::new_v4(),
            scheduled_at: Utc::now(),
            duration_minutes: 45,
            kind: InterviewKind::Video,
            location: Some("https://meet.example.com/abc".into()),
            interviewer_ids: vec![Uuid::new_v4(), Uuid::new_v4()],
            status: InterviewStatus::Completed,
            feedback: Some("Hesitant with parents".into()),
            rating: Some(2),
            created_by: Uuid::new_v4(),
        }]);

        let staff_view = ApplicationResponse::from(app.clone());
        assert_eq!(staff_view.interviews[0].rating, Some(2));

        let candidate_view = ApplicationResponse::from(app).for_candidate();
        let interview = &candidate_view.interviews[0];
        assert_eq!(interview.feedback, None);
        assert_eq!(interview.rating, None);
        assert!(interview.interviewer_ids.is_empty());
        assert_eq!(interview.duration_minutes, 45);
        assert_eq!(interview.status, InterviewStatus::Completed);
    }

    #[test]
    fn offer_requires_positive_salary() {
        let offer = ExtendOfferPayload {
            salary: Decimal::ZERO,
            currency: None,
            start_date: None,
            expires_at: None,
            notes: None,
        };
        assert!(offer.validate().is_err());

        let offer = ExtendOfferPayload {
            salary: Decimal::new(52000, 0),
            ..offer
        };
        assert!(offer.validate().is_ok());
    }

    #[test]
    fn interview_rating_is_bounded() {
        let update = UpdateInterviewPayload {
            rating: Some(6),
            ..Default::default()
        };
        assert!(update.validate().is_err());
    }

    #[test]
    fn status_payload_parses_pipeline_stage() {
        let payload: UpdateApplicationStatusPayload =
            serde_json::from_value(serde_json::json!({ "status": "shortlisted" })).unwrap();
        assert_eq!(payload.status, ApplicationStatus::Shortlisted);
        assert!(payload.note.is_none());
    }
}
