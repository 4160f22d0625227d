use chrono::Utc;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::database::listing::{Paginated, Pagination, Sort};
use crate::dto::application_dto::{
    AddNotePayload, ApplicationListQuery, ApplyForm, ExtendOfferPayload, ScheduleInterviewPayload,
    UpdateApplicationStatusPayload, UpdateInterviewPayload,
};
use crate::error::{Error, Result};
use crate::models::application::{
    Application, ApplicationStatus, ApplicationWithJob, Interview, InterviewStatus, Note, Offer,
    OfferStatus, TimelineEntry,
};
use crate::models::company::CompanyPermissions;
use crate::models::job::Job;
use crate::models::user::User;
use crate::services::access::{
    can_add_note, can_manage_applications, can_view_application, can_view_job_applications,
    ensure, is_owning_candidate, Actor, ApplicationScope, JobOwner,
};
use crate::services::company_service::CompanyService;
use crate::services::email_service::EmailService;
use crate::services::export_service::ApplicantRow;
use crate::services::job_service::JobService;
use crate::services::user_service::UserService;
use crate::utils::upload::{remove_stored, save_resume, UploadedFile};

const APPLICATION_SORT_FIELDS: &[(&str, &str)] = &[
    ("created_at", "a.created_at"),
    ("updated_at", "a.updated_at"),
    ("status", "a.status"),
];

const JOINED_SELECT: &str = "SELECT a.*, j.title AS job_title, j.company_id AS job_company_id, \
     j.recruiter_id AS job_recruiter_id FROM applications a JOIN jobs j ON j.id = a.job_id WHERE TRUE";
const JOINED_COUNT: &str =
    "SELECT COUNT(*) FROM applications a JOIN jobs j ON j.id = a.job_id WHERE TRUE";

const DEFAULT_INTERVIEW_MINUTES: i32 = 60;

fn owner_of(row: &ApplicationWithJob) -> JobOwner {
    JobOwner {
        company_id: row.job_company_id,
        recruiter_id: row.job_recruiter_id,
    }
}

fn push_application_filters(
    qb: &mut QueryBuilder<'_, Postgres>,
    scope: ApplicationScope,
    query: &ApplicationListQuery,
) {
    scope.push_filter(qb);
    if let Some(status) = query.status {
        qb.push(" AND a.status = ").push_bind(status.as_str());
    }
    if let Some(job_id) = query.job_id {
        qb.push(" AND a.job_id = ").push_bind(job_id);
    }
}

/// Change in the company's hire total when an application moves between statuses.
pub fn hires_delta(from: Option<ApplicationStatus>, to: ApplicationStatus) -> i32 {
    let was = from == Some(ApplicationStatus::Hired);
    let is = to == ApplicationStatus::Hired;
    match (was, is) {
        (false, true) => 1,
        (true, false) => -1,
        _ => 0,
    }
}

#[derive(Debug, Clone)]
pub struct UploadSettings {
    pub uploads_dir: String,
    pub max_bytes: usize,
}

#[derive(Clone)]
pub struct ApplicationService {
    pool: PgPool,
    jobs: JobService,
    companies: CompanyService,
    users: UserService,
    email: EmailService,
    uploads: UploadSettings,
}

impl ApplicationService {
    pub fn new(
        pool: PgPool,
        jobs: JobService,
        companies: CompanyService,
        users: UserService,
        email: EmailService,
        uploads: UploadSettings,
    ) -> Self {
        Self {
            pool,
            jobs,
            companies,
            users,
            email,
            uploads,
        }
    }

    async fn load(&self, id: Uuid) -> Result<ApplicationWithJob> {
        let mut qb = QueryBuilder::<Postgres>::new(JOINED_SELECT);
        qb.push(" AND a.id = ").push_bind(id);
        qb.build_query_as::<ApplicationWithJob>()
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound("Application not found".to_string()))
    }

    async fn membership(&self, actor: &Actor, row: &ApplicationWithJob) -> Result<Option<CompanyPermissions>> {
        if actor.is_admin() {
            return Ok(None);
        }
        self.companies.membership(row.job_company_id, actor.id).await
    }

    /// Loads an application the actor may change the status of, schedule
    /// interviews on or make offers for.
    async fn managed(&self, actor: &Actor, id: Uuid) -> Result<ApplicationWithJob> {
        let row = self.load(id).await?;
        let membership = self.membership(actor, &row).await?;
        ensure(
            can_manage_applications(actor, owner_of(&row), membership),
            "Only the owning recruiter or an admin can manage this application",
        )?;
        Ok(row)
    }

    /// Applies on behalf of a candidate. The uploaded resume wins over the one
    /// stored on the profile; one of them is required.
    pub async fn apply(
        &self,
        candidate: &User,
        form: ApplyForm,
        resume: Option<UploadedFile>,
    ) -> Result<Application> {
        let job_id = form
            .job_id
            .ok_or_else(|| Error::BadRequest("job_id is required".to_string()))?;
        let job = self.jobs.get(job_id).await?;

        let now = Utc::now();
        if job.deadline_passed(now) {
            return Err(Error::BadRequest(
                "The application deadline for this job has passed".to_string(),
            ));
        }
        if !job.accepts_applications(now) {
            return Err(Error::BadRequest(
                "This job is not accepting applications".to_string(),
            ));
        }

        let already_applied = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM applications WHERE job_id = $1 AND candidate_id = $2)",
        )
        .bind(job.id)
        .bind(candidate.id)
        .fetch_one(&self.pool)
        .await?;
        if already_applied {
            return Err(Error::Conflict("You have already applied to this job".to_string()));
        }

        let (resume_url, uploaded) = match resume {
            Some(file) => {
                let stored = save_resume(
                    &self.uploads.uploads_dir,
                    &file.filename,
                    &file.data,
                    self.uploads.max_bytes,
                )
                .await?;
                (stored.url, true)
            }
            None => match candidate.profile.resume.as_ref() {
                Some(resume) => (resume.url.clone(), false),
                None => {
                    return Err(Error::BadRequest(
                        "Attach a resume or add one to your profile first".to_string(),
                    ))
                }
            },
        };

        let inserted = self.insert_application(candidate, &job, form, &resume_url).await;
        let application = match inserted {
            Ok(application) => application,
            Err(e) => {
                if uploaded {
                    remove_stored(&self.uploads.uploads_dir, &resume_url).await;
                }
                return Err(e);
            }
        };
        tracing::info!(application_id = %application.id, job_id = %job.id, candidate_id = %candidate.id, "application submitted");

        self.email.application_received(candidate, &job.title);
        match self.users.get_by_id(job.recruiter_id).await {
            Ok(recruiter) => {
                self.email
                    .new_application(&recruiter, candidate, &job.title, application.id)
            }
            Err(e) => tracing::warn!(job_id = %job.id, error = %e, "could not load recruiter for notification"),
        }

        Ok(application)
    }

    /// Inserts the application and bumps the job and company counters.
    async fn insert_application(
        &self,
        candidate: &User,
        job: &Job,
        form: ApplyForm,
        resume_url: &str,
    ) -> Result<Application> {
        let timeline = vec![TimelineEntry {
            status: ApplicationStatus::Submitted,
            note: None,
            changed_by: Some(candidate.id),
            changed_at: Utc::now(),
        }];

        let mut tx = self.pool.begin().await?;

        let application = sqlx::query_as::<_, Application>(
            r#"
            INSERT INTO applications (job_id, candidate_id, status, cover_letter, resume_url, source, timeline)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(job.id)
        .bind(candidate.id)
        .bind(ApplicationStatus::Submitted.as_str())
        .bind(form.cover_letter.filter(|c| !c.trim().is_empty()))
        .bind(resume_url)
        .bind(form.source.filter(|s| !s.trim().is_empty()))
        .bind(Json(&timeline))
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match Error::from(e) {
            Error::Conflict(_) => Error::Conflict("You have already applied to this job".to_string()),
            other => other,
        })?;

        sqlx::query("UPDATE jobs SET applications_count = applications_count + 1 WHERE id = $1")
            .bind(job.id)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "UPDATE companies SET total_applications = total_applications + 1 WHERE id = $1",
        )
        .bind(job.company_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(application)
    }

    async fn page(
        &self,
        scope: ApplicationScope,
        query: &ApplicationListQuery,
    ) -> Result<Paginated<ApplicationWithJob>> {
        let pagination = Pagination::new(query.page, query.limit);
        let sort = Sort::parse(query.sort.as_deref(), APPLICATION_SORT_FIELDS, "-created_at")?;

        let mut count_qb = QueryBuilder::<Postgres>::new(JOINED_COUNT);
        push_application_filters(&mut count_qb, scope, query);
        let total = count_qb
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        let mut qb = QueryBuilder::<Postgres>::new(JOINED_SELECT);
        push_application_filters(&mut qb, scope, query);
        sort.push_order_by(&mut qb);
        pagination.push_limit(&mut qb);
        let items = qb
            .build_query_as::<ApplicationWithJob>()
            .fetch_all(&self.pool)
            .await?;

        Ok(Paginated::new(items, total, pagination))
    }

    pub async fn list(
        &self,
        actor: &Actor,
        query: &ApplicationListQuery,
    ) -> Result<Paginated<ApplicationWithJob>> {
        self.page(ApplicationScope::for_actor(actor), query).await
    }

    pub async fn list_for_job(
        &self,
        actor: &Actor,
        job_id: Uuid,
        query: &ApplicationListQuery,
    ) -> Result<Paginated<ApplicationWithJob>> {
        let job = self.jobs.get(job_id).await?;
        ensure(
            can_view_job_applications(actor, JobOwner::from(&job)),
            "You cannot view applications for this job",
        )?;
        let query = ApplicationListQuery {
            job_id: Some(job_id),
            ..query.clone()
        };
        self.page(ApplicationScope::All, &query).await
    }

    pub async fn export_rows(&self, actor: &Actor, job_id: Uuid) -> Result<(Job, Vec<ApplicantRow>)> {
        let job = self.jobs.get(job_id).await?;
        ensure(
            can_view_job_applications(actor, JobOwner::from(&job)),
            "You cannot export applications for this job",
        )?;
        let rows = sqlx::query_as::<_, ApplicantRow>(
            r#"
            SELECT a.*, u.email AS candidate_email, u.profile AS candidate_profile
            FROM applications a
            JOIN users u ON u.id = a.candidate_id
            WHERE a.job_id = $1
            ORDER BY a.created_at
            "#,
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await?;
        Ok((job, rows))
    }

    pub async fn get(&self, actor: &Actor, id: Uuid) -> Result<ApplicationWithJob> {
        let row = self.load(id).await?;
        ensure(
            can_view_application(actor, row.application.candidate_id, owner_of(&row)),
            "You cannot view this application",
        )?;
        Ok(row)
    }

    /// Sets the status, appends to the timeline and keeps the hire counter in
    /// step, all in one transaction. The previous status is read under a row
    /// lock so concurrent transitions each see the status they replace.
    async fn transition(
        &self,
        row: &ApplicationWithJob,
        status: ApplicationStatus,
        note: Option<String>,
        changed_by: Uuid,
        reject_final: bool,
    ) -> Result<(Option<ApplicationStatus>, Application)> {
        let entry = TimelineEntry {
            status,
            note: note.filter(|n| !n.trim().is_empty()),
            changed_by: Some(changed_by),
            changed_at: Utc::now(),
        };

        let mut tx = self.pool.begin().await?;

        let previous = sqlx::query_scalar::<_, String>(
            "SELECT status FROM applications WHERE id = $1 FOR UPDATE",
        )
        .bind(row.application.id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| Error::NotFound("Application not found".to_string()))?;
        let previous = previous.parse::<ApplicationStatus>().ok();

        if reject_final {
            if let Some(current) = previous.filter(|s| s.is_final()) {
                return Err(Error::BadRequest(format!(
                    "Application is already {}",
                    current
                )));
            }
        }

        let updated = sqlx::query_as::<_, Application>(
            r#"
            UPDATE applications
            SET status = $2, timeline = timeline || $3, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(row.application.id)
        .bind(status.as_str())
        .bind(Json(vec![entry]))
        .fetch_one(&mut *tx)
        .await?;

        let delta = hires_delta(previous, status);
        if delta != 0 {
            sqlx::query(
                "UPDATE companies SET total_hires = GREATEST(total_hires + $2, 0) WHERE id = $1",
            )
            .bind(row.job_company_id)
            .bind(delta)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        tracing::info!(
            application_id = %row.application.id,
            from = ?previous,
            to = %status,
            by = %changed_by,
            "application status changed"
        );
        Ok((previous, updated))
    }

    async fn notify_candidate<F>(&self, candidate_id: Uuid, send: F)
    where
        F: FnOnce(&EmailService, &User),
    {
        match self.users.get_by_id(candidate_id).await {
            Ok(candidate) => send(&self.email, &candidate),
            Err(e) => tracing::warn!(%candidate_id, error = %e, "could not load candidate for notification"),
        }
    }

    pub async fn update_status(
        &self,
        actor: &Actor,
        id: Uuid,
        payload: UpdateApplicationStatusPayload,
    ) -> Result<Application> {
        let row = self.managed(actor, id).await?;

        let (previous, updated) = self
            .transition(&row, payload.status, payload.note, actor.id, false)
            .await?;

        if previous != Some(payload.status) {
            let job_title = row.job_title.clone();
            let status = payload.status;
            self.notify_candidate(row.application.candidate_id, |email, candidate| {
                email.status_changed(candidate, &job_title, status)
            })
            .await;
        }
        Ok(updated)
    }

    pub async fn withdraw(&self, actor: &Actor, id: Uuid, reason: Option<String>) -> Result<Application> {
        let row = self.load(id).await?;
        ensure(
            is_owning_candidate(actor, row.application.candidate_id),
            "You can only withdraw your own applications",
        )?;
        let (_, updated) = self
            .transition(&row, ApplicationStatus::Withdrawn, reason, actor.id, true)
            .await?;
        Ok(updated)
    }

    pub async fn add_note(&self, actor: &Actor, id: Uuid, payload: AddNotePayload) -> Result<Application> {
        let row = self.load(id).await?;
        let membership = self.membership(actor, &row).await?;
        ensure(
            can_add_note(actor, owner_of(&row), membership),
            "You cannot add notes to this application",
        )?;

        let note = Note {
            id: Uuid::new_v4(),
            author_id: actor.id,
            content: payload.content.trim().to_string(),
            is_private: payload.is_private,
            created_at: Utc::now(),
        };
        let updated = sqlx::query_as::<_, Application>(
            r#"
            UPDATE applications
            SET notes = notes || $2, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(Json(vec![note]))
        .fetch_one(&self.pool)
        .await?;
        Ok(updated)
    }

    async fn managed_open(&self, actor: &Actor, id: Uuid) -> Result<ApplicationWithJob> {
        let row = self.managed(actor, id).await?;
        if let Some(current) = row.application.status().filter(|s| s.is_final()) {
            return Err(Error::BadRequest(format!(
                "Application is already {}",
                current
            )));
        }
        Ok(row)
    }

    pub async fn schedule_interview(
        &self,
        actor: &Actor,
        id: Uuid,
        payload: ScheduleInterviewPayload,
    ) -> Result<Application> {
        let row = self.managed_open(actor, id).await?;
        if payload.scheduled_at <= Utc::now() {
            return Err(Error::BadRequest(
                "Interviews must be scheduled in the future".to_string(),
            ));
        }

        let interview = Interview {
            id: Uuid::new_v4(),
            scheduled_at: payload.scheduled_at,
            duration_minutes: payload.duration_minutes.unwrap_or(DEFAULT_INTERVIEW_MINUTES),
            kind: payload.kind,
            location: payload.location,
            interviewer_ids: payload.interviewer_ids,
            status: InterviewStatus::Scheduled,
            feedback: None,
            rating: None,
            created_by: actor.id,
        };

        let updated = sqlx::query_as::<_, Application>(
            r#"
            UPDATE applications
            SET interviews = interviews || $2, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(Json(vec![interview.clone()]))
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(application_id = %id, interview_id = %interview.id, by = %actor.id, "interview scheduled");
        let job_title = row.job_title.clone();
        self.notify_candidate(row.application.candidate_id, |email, candidate| {
            email.interview_scheduled(candidate, &job_title, &interview)
        })
        .await;
        Ok(updated)
    }

    pub async fn update_interview(
        &self,
        actor: &Actor,
        id: Uuid,
        interview_id: Uuid,
        payload: UpdateInterviewPayload,
    ) -> Result<Application> {
        let row = self.managed(actor, id).await?;

        let mut interviews = row.application.interviews.0;
        apply_interview_update(&mut interviews, interview_id, payload)?;

        let updated = sqlx::query_as::<_, Application>(
            "UPDATE applications SET interviews = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(Json(&interviews))
        .fetch_one(&self.pool)
        .await?;
        Ok(updated)
    }

    /// Extending again replaces any earlier offer.
    pub async fn extend_offer(
        &self,
        actor: &Actor,
        id: Uuid,
        payload: ExtendOfferPayload,
    ) -> Result<Application> {
        let row = self.managed_open(actor, id).await?;
        if matches!(payload.expires_at, Some(exp) if exp <= Utc::now()) {
            return Err(Error::BadRequest(
                "Offer expiry must be in the future".to_string(),
            ));
        }
        let currency = match payload.currency {
            Some(c) => c.to_uppercase(),
            None => self.jobs.get(row.application.job_id).await?.salary_currency,
        };

        let offer = Offer {
            salary: payload.salary,
            currency,
            start_date: payload.start_date,
            expires_at: payload.expires_at,
            notes: payload.notes,
            status: OfferStatus::Pending,
            extended_by: actor.id,
            extended_at: Utc::now(),
            responded_at: None,
        };

        let updated = sqlx::query_as::<_, Application>(
            "UPDATE applications SET offer = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(Json(&offer))
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(application_id = %id, by = %actor.id, "offer extended");
        let job_title = row.job_title.clone();
        self.notify_candidate(row.application.candidate_id, |email, candidate| {
            email.offer_extended(candidate, &job_title, &offer)
        })
        .await;
        Ok(updated)
    }

    pub async fn respond_offer(&self, actor: &Actor, id: Uuid, accept: bool) -> Result<Application> {
        let row = self.load(id).await?;
        ensure(
            is_owning_candidate(actor, row.application.candidate_id),
            "You can only respond to your own offers",
        )?;

        let mut offer = row
            .application
            .offer
            .map(|o| o.0)
            .ok_or_else(|| Error::BadRequest("There is no offer on this application".to_string()))?;
        respond(&mut offer, accept, Utc::now())?;

        let updated = sqlx::query_as::<_, Application>(
            "UPDATE applications SET offer = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(Json(&offer))
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(application_id = %id, accepted = accept, "offer answered");
        Ok(updated)
    }

    pub async fn delete(&self, actor: &Actor, id: Uuid) -> Result<()> {
        ensure(actor.is_admin(), "Only admins can delete applications")?;

        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query_as::<_, Application>(
            "DELETE FROM applications WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| Error::NotFound("Application not found".to_string()))?;

        let company_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            UPDATE jobs
            SET applications_count = GREATEST(applications_count - 1, 0)
            WHERE id = $1
            RETURNING company_id
            "#,
        )
        .bind(deleted.job_id)
        .fetch_one(&mut *tx)
        .await?;

        let hires = if deleted.status() == Some(ApplicationStatus::Hired) { 1 } else { 0 };
        sqlx::query(
            r#"
            UPDATE companies
            SET total_applications = GREATEST(total_applications - 1, 0),
                total_hires = GREATEST(total_hires - $2, 0)
            WHERE id = $1
            "#,
        )
        .bind(company_id)
        .bind(hires)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(application_id = %id, by = %actor.id, "application deleted");
        Ok(())
    }
}

fn apply_interview_update(
    interviews: &mut [Interview],
    interview_id: Uuid,
    payload: UpdateInterviewPayload,
) -> Result<()> {
    let interview = interviews
        .iter_mut()
        .find(|i| i.id == interview_id)
        .ok_or_else(|| Error::NotFound("Interview not found".to_string()))?;

    if let Some(at) = payload.scheduled_at {
        interview.scheduled_at = at;
    }
    if let Some(minutes) = payload.duration_minutes {
        interview.duration_minutes = minutes;
    }
    if payload.location.is_some() {
        interview.location = payload.location;
    }
    if let Some(status) = payload.status {
        interview.status = status;
    }
    if payload.feedback.is_some() {
        interview.feedback = payload.feedback;
    }
    if payload.rating.is_some() {
        interview.rating = payload.rating;
    }
    Ok(())
}

fn respond(offer: &mut Offer, accept: bool, now: chrono::DateTime<Utc>) -> Result<()> {
    if offer.status != OfferStatus::Pending {
        return Err(Error::BadRequest(format!(
            "Offer has already been {}",
            offer.status
        )));
    }
    if matches!(offer.expires_at, Some(exp) if exp <= now) {
        return Err(Error::BadRequest("This offer has expired".to_string()));
    }
    offer.status = if accept {
        OfferStatus::Accepted
    } else {
        OfferStatus::Declined
    };
    offer.responded_at = Some(now);
    Ok(())
}
