use rust_xlsxwriter::{Color, Format, FormatAlign, FormatBorder, Workbook};
use sqlx::types::Json;
use sqlx::FromRow;

use crate::error::Result;
use crate::models::application::{Application, ApplicationStatus};
use crate::models::job::Job;
use crate::models::user::Profile;

/// An application joined with the candidate's contact details.
#[derive(Debug, Clone, FromRow)]
pub struct ApplicantRow {
    #[sqlx(flatten)]
    pub application: Application,
    pub candidate_email: String,
    pub candidate_profile: Json<Profile>,
}

const COLUMNS: [(&str, f64); 10] = [
    ("#", 6.0),
    ("Candidate", 28.0),
    ("Email", 32.0),
    ("Phone", 18.0),
    ("Status", 20.0),
    ("Applied", 18.0),
    ("Last update", 18.0),
    ("Interviews", 12.0),
    ("Avg rating", 12.0),
    ("Offer", 16.0),
];

fn status_color(status: Option<ApplicationStatus>) -> Color {
    match status {
        Some(ApplicationStatus::Submitted) => Color::RGB(0x3B82F6),
        Some(ApplicationStatus::UnderReview) | Some(ApplicationStatus::Shortlisted) => {
            Color::RGB(0xF59E0B)
        }
        Some(ApplicationStatus::InterviewScheduled) | Some(ApplicationStatus::Interviewed) => {
            Color::RGB(0x8B5CF6)
        }
        Some(ApplicationStatus::OfferExtended) | Some(ApplicationStatus::Hired) => {
            Color::RGB(0x10B981)
        }
        Some(ApplicationStatus::Rejected) => Color::RGB(0xEF4444),
        Some(ApplicationStatus::Withdrawn) | None => Color::RGB(0x64748B),
    }
}

/// Mean of the rated interviews, if any.
pub fn average_rating(application: &Application) -> Option<f64> {
    let ratings: Vec<i32> = application
        .interviews
        .iter()
        .filter_map(|i| i.rating)
        .collect();
    if ratings.is_empty() {
        None
    } else {
        Some(ratings.iter().sum::<i32>() as f64 / ratings.len() as f64)
    }
}

pub struct ExportService;

impl ExportService {
    pub fn file_name(job: &Job) -> String {
        let slug: String = job
            .title
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
            .collect();
        let slug = slug
            .split('-')
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("-");
        format!("applications-{}.xlsx", if slug.is_empty() { "job" } else { &slug })
    }

    /// Styled XLSX workbook listing every application to a job.
    pub fn applications_xlsx(job: &Job, rows: &[ApplicantRow]) -> Result<Vec<u8>> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.set_name("Applications")?;

        let header_bg = Color::RGB(0x0F172A);
        let title_bg = Color::RGB(0x1E293B);
        let border_color = Color::RGB(0xE2E8F0);
        let last_col = (COLUMNS.len() - 1) as u16;

        for (i, (_, width)) in COLUMNS.iter().enumerate() {
            worksheet.set_column_width(i as u16, *width)?;
        }

        let title_format = Format::new()
            .set_font_size(16)
            .set_bold()
            .set_font_color(Color::White)
            .set_background_color(title_bg)
            .set_align(FormatAlign::Center)
            .set_align(FormatAlign::VerticalCenter);
        worksheet.set_row_height(0, 36)?;
        worksheet.merge_range(0, 0, 0, last_col, &format!("Applications: {}", job.title), &title_format)?;

        let subtitle_format = Format::new()
            .set_font_size(10)
            .set_italic()
            .set_font_color(Color::RGB(0x94A3B8))
            .set_background_color(title_bg)
            .set_align(FormatAlign::Center);
        let subtitle = format!(
            "Exported {}  •  {} applications  •  {} views",
            chrono::Utc::now().format("%Y-%m-%d %H:%M UTC"),
            rows.len(),
            job.views_count
        );
        worksheet.merge_range(1, 0, 1, last_col, &subtitle, &subtitle_format)?;

        let header_format = Format::new()
            .set_bold()
            .set_font_size(10)
            .set_font_color(Color::White)
            .set_background_color(header_bg)
            .set_align(FormatAlign::Center)
            .set_align(FormatAlign::VerticalCenter)
            .set_border(FormatBorder::Thin)
            .set_border_color(border_color);
        let header_row = 2;
        worksheet.set_row_height(header_row, 26)?;
        for (i, (name, _)) in COLUMNS.iter().enumerate() {
            worksheet.write_string_with_format(header_row, i as u16, *name, &header_format)?;
        }

        let first_data_row = header_row + 1;
        for (idx, applicant) in rows.iter().enumerate() {
            let row = first_data_row + idx as u32;
            let app = &applicant.application;
            let bg = if idx % 2 == 0 { Color::RGB(0xF8FAFC) } else { Color::White };
            let base = Format::new()
                .set_font_size(10)
                .set_background_color(bg)
                .set_border(FormatBorder::Thin)
                .set_border_color(border_color);
            let center = base.clone().set_align(FormatAlign::Center);

            let profile = &applicant.candidate_profile;
            let status = app.status();
            let status_format = Format::new()
                .set_font_size(10)
                .set_bold()
                .set_font_color(Color::White)
                .set_background_color(status_color(status))
                .set_align(FormatAlign::Center)
                .set_border(FormatBorder::Thin)
                .set_border_color(border_color);

            worksheet.write_number_with_format(row, 0, (idx + 1) as f64, &center)?;
            worksheet.write_string_with_format(row, 1, &profile.full_name(), &base.clone().set_bold())?;
            worksheet.write_string_with_format(row, 2, &applicant.candidate_email, &base)?;
            worksheet.write_string_with_format(row, 3, profile.phone.as_deref().unwrap_or("—"), &base)?;
            worksheet.write_string_with_format(row, 4, &app.status, &status_format)?;
            worksheet.write_string_with_format(
                row,
                5,
                &app.created_at.format("%Y-%m-%d").to_string(),
                &center,
            )?;
            worksheet.write_string_with_format(
                row,
                6,
                &app.updated_at.format("%Y-%m-%d").to_string(),
                &center,
            )?;
            worksheet.write_number_with_format(row, 7, app.interviews.len() as f64, &center)?;
            match average_rating(app) {
                Some(avg) => worksheet.write_number_with_format(row, 8, avg, &center)?,
                None => worksheet.write_string_with_format(row, 8, "—", &center)?,
            };
            let offer = app
                .offer
                .as_ref()
                .map(|o| o.status.to_string())
                .unwrap_or_else(|| "—".to_string());
            worksheet.write_string_with_format(row, 9, &offer, &center)?;
        }

        let summary_row = first_data_row + rows.len() as u32 + 1;
        let summary_format = Format::new()
            .set_bold()
            .set_font_size(10)
            .set_background_color(Color::RGB(0xE0E7FF))
            .set_align(FormatAlign::Center)
            .set_border(FormatBorder::Thin)
            .set_border_color(border_color);
        let summary = ApplicationStatus::ALL
            .iter()
            .map(|s| {
                let count = rows.iter().filter(|r| r.application.status() == Some(*s)).count();
                (s, count)
            })
            .filter(|(_, count)| *count > 0)
            .map(|(s, count)| format!("{}: {}", s, count))
            .collect::<Vec<_>>()
            .join("  |  ");
        let summary = if summary.is_empty() { "No applications yet".to_string() } else { summary };
        worksheet.merge_range(summary_row, 0, summary_row, last_col, &summary, &summary_format)?;

        worksheet.set_freeze_panes(first_data_row, 0)?;
        if !rows.is_empty() {
            worksheet.autofilter(
                header_row,
                0,
                first_data_row + rows.len() as u32 - 1,
                last_col,
            )?;
        }

        let buffer = workbook.save_to_buffer()?;
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::application::{Interview, InterviewKind, InterviewStatus};
    use crate::models::fixtures;
    use chrono::Utc;
    use uuid::Uuid;

    fn interview(rating: Option<i32>) -> Interview {
        Interview {
            id: Uuid::new_v4(),
            scheduled_at: Utc::now(),
            duration_minutes: 30,
            kind: InterviewKind::Onsite,
            location: None,
            interviewer_ids: vec![],
            status: InterviewStatus::Completed,
            feedback: None,
            rating,
            created_by: Uuid::new_v4(),
        }
    }

    #[test]
    fn average_rating_ignores_unrated_interviews() {
        let mut app = fixtures::application(Uuid::new_v4(), Uuid::new_v4());
        assert_eq!(average_rating(&app), None);
        app.interviews = Json(vec![interview(Some(4)), interview(None), interview(Some(5))]);
        assert_eq!(average_rating(&app), Some(4.5));
    }

    #[test]
    fn file_name_is_slugged() {
        let mut job = fixtures::job();
        job.title = "Lead Educator (Toddlers) / Riverside".into();
        assert_eq!(
            ExportService::file_name(&job),
            "applications-lead-educator-toddlers-riverside.xlsx"
        );
    }

    #[test]
    fn workbook_is_a_zip_archive() {
        let job = fixtures::job();
        let user = fixtures::user("candidate");
        let rows = vec![ApplicantRow {
            application: fixtures::application(job.id, user.id),
            candidate_email: user.email.clone(),
            candidate_profile: user.profile.clone(),
        }];
        let bytes = ExportService::applications_xlsx(&job, &rows).unwrap();
        assert!(bytes.starts_with(b"PK\x03\x04"));

        let empty = ExportService::applications_xlsx(&job, &[]).unwrap();
        assert!(empty.starts_with(b"PK"));
    }
}
