use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use uuid::Uuid;

use crate::database::listing::{like_pattern, Paginated, Pagination, Sort};
use crate::dto::job_dto::{CreateJobPayload, JobListQuery, UpdateJobPayload};
use crate::error::{Error, Result};
use crate::models::job::{Job, JobStatus, SalaryPeriod};
use crate::models::user::Role;
use crate::services::access::{can_manage_job, can_view_job_applications, ensure, Actor, JobOwner};
use crate::services::company_service::CompanyService;
use crate::utils::validation::normalize_skills;

pub const JOB_SORT_FIELDS: &[(&str, &str)] = &[
    ("created_at", "j.created_at"),
    ("published_at", "j.published_at"),
    ("title", "j.title"),
    ("salary_min", "j.salary_min"),
    ("salary_max", "j.salary_max"),
    ("application_deadline", "j.application_deadline"),
    ("applications_count", "j.applications_count"),
    ("views_count", "j.views_count"),
];

/// Which rows a job listing starts from before user filters apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobVisibility {
    /// Active and not past the application deadline.
    Public,
    Recruiter(Uuid),
    All,
}

impl JobVisibility {
    fn push_filter(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        match *self {
            JobVisibility::Public => {
                qb.push(" AND j.status = 'active'")
                    .push(" AND (j.application_deadline IS NULL OR j.application_deadline > NOW())");
            }
            JobVisibility::Recruiter(id) => {
                qb.push(" AND j.recruiter_id = ").push_bind(id);
            }
            JobVisibility::All => {}
        }
    }
}

pub fn push_job_filters(
    qb: &mut QueryBuilder<'_, Postgres>,
    visibility: JobVisibility,
    query: &JobListQuery,
) {
    visibility.push_filter(qb);

    if visibility != JobVisibility::Public {
        if let Some(status) = query.status {
            qb.push(" AND j.status = ").push_bind(status.as_str());
        }
    }
    if let Some(pattern) = like_pattern(query.search.as_deref()) {
        qb.push(" AND (j.title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR j.description ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(pattern) = like_pattern(query.location.as_deref()) {
        qb.push(" AND j.location ILIKE ").push_bind(pattern);
    }
    if let Some(kind) = query.employment_type {
        qb.push(" AND j.employment_type = ").push_bind(kind.as_str());
    }
    if let Some(level) = query.experience_level {
        qb.push(" AND j.experience_level = ").push_bind(level.as_str());
    }
    if let Some(company_id) = query.company_id {
        qb.push(" AND j.company_id = ").push_bind(company_id);
    }
    if let Some(is_remote) = query.is_remote {
        qb.push(" AND j.is_remote = ").push_bind(is_remote);
    }
    if let Some(salary_min) = query.salary_min {
        qb.push(" AND COALESCE(j.salary_max, j.salary_min) >= ")
            .push_bind(salary_min);
    }
    let skills = query
        .skills
        .as_deref()
        .map(|raw| normalize_skills(raw.split(',').map(str::to_string).collect()))
        .unwrap_or_default();
    if !skills.is_empty() {
        qb.push(" AND (j.required_skills && ")
            .push_bind(skills.clone())
            .push(" OR j.preferred_skills && ")
            .push_bind(skills)
            .push(")");
    }
}

/// Rejects a min above max once a partial update is merged with stored values.
fn check_salary_range(min: Option<Decimal>, max: Option<Decimal>) -> Result<()> {
    match (min, max) {
        (Some(min), Some(max)) if min > max => Err(Error::BadRequest(
            "salary_min must not exceed salary_max".to_string(),
        )),
        _ => Ok(()),
    }
}

#[derive(Clone)]
pub struct JobService {
    pool: PgPool,
    companies: CompanyService,
}

impl JobService {
    pub fn new(pool: PgPool, companies: CompanyService) -> Self {
        Self { pool, companies }
    }

    pub async fn get(&self, id: Uuid) -> Result<Job> {
        sqlx::query_as::<_, Job>("SELECT * FROM jobs WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound("Job not found".to_string()))
    }

    pub async fn list(
        &self,
        visibility: JobVisibility,
        query: &JobListQuery,
    ) -> Result<Paginated<Job>> {
        let pagination = Pagination::new(query.page, query.limit);
        let default_sort = match visibility {
            JobVisibility::Public => "-published_at,-created_at",
            _ => "-created_at",
        };
        let sort = Sort::parse(query.sort.as_deref(), JOB_SORT_FIELDS, default_sort)?;

        let mut count_qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM jobs j WHERE TRUE");
        push_job_filters(&mut count_qb, visibility, query);
        let total = count_qb
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        let mut qb = QueryBuilder::<Postgres>::new("SELECT j.* FROM jobs j WHERE TRUE");
        push_job_filters(&mut qb, visibility, query);
        sort.push_order_by(&mut qb);
        pagination.push_limit(&mut qb);
        let items = qb.build_query_as::<Job>().fetch_all(&self.pool).await?;

        Ok(Paginated::new(items, total, pagination))
    }

    pub async fn list_mine(&self, actor: &Actor, query: &JobListQuery) -> Result<Paginated<Job>> {
        let visibility = if actor.is_admin() {
            JobVisibility::All
        } else {
            JobVisibility::Recruiter(actor.id)
        };
        self.list(visibility, query).await
    }

    /// Non-public jobs look missing to anyone who cannot manage them. Views by
    /// outsiders bump the view counter.
    pub async fn view(&self, id: Uuid, viewer: Option<&Actor>) -> Result<Job> {
        let job = self.get(id).await?;
        let owner = JobOwner::from(&job);
        let insider = viewer
            .map(|a| can_view_job_applications(a, owner))
            .unwrap_or(false);

        if insider {
            return Ok(job);
        }
        if job.status() != Some(JobStatus::Active) {
            return Err(Error::NotFound("Job not found".to_string()));
        }

        let job = sqlx::query_as::<_, Job>(
            "UPDATE jobs SET views_count = views_count + 1 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        Ok(job)
    }

    pub async fn create(&self, actor: &Actor, payload: CreateJobPayload) -> Result<Job> {
        let company_id = match actor.role {
            Role::Admin => payload.company_id.or(actor.company_id).ok_or_else(|| {
                Error::BadRequest("company_id is required".to_string())
            })?,
            Role::Recruiter => {
                let company_id = actor.company_id.ok_or_else(|| {
                    Error::BadRequest("Create or join a company before posting jobs".to_string())
                })?;
                if matches!(payload.company_id, Some(requested) if requested != company_id) {
                    return Err(Error::Forbidden(
                        "Recruiters can only post jobs for their own company".to_string(),
                    ));
                }
                if let Some(permissions) = self.companies.membership(company_id, actor.id).await? {
                    ensure(
                        permissions.can_post_jobs,
                        "You do not have permission to post jobs for this company",
                    )?;
                }
                company_id
            }
            _ => return Err(Error::Forbidden("Only recruiters can post jobs".to_string())),
        };
        self.companies.get(company_id).await?;

        let status = payload.status.unwrap_or(JobStatus::Draft);
        if !matches!(status, JobStatus::Draft | JobStatus::Active) {
            return Err(Error::BadRequest(
                "New jobs must start as draft or active".to_string(),
            ));
        }
        let is_active = status == JobStatus::Active;
        if is_active && matches!(payload.application_deadline, Some(d) if d <= Utc::now()) {
            return Err(Error::BadRequest(
                "application_deadline must be in the future".to_string(),
            ));
        }

        let mut tx = self.pool.begin().await?;

        let job = sqlx::query_as::<_, Job>(
            r#"
            INSERT INTO jobs (
                company_id, recruiter_id, title, description, responsibilities,
                required_skills, preferred_skills, benefits, employment_type, experience_level,
                location, is_remote, salary_min, salary_max, salary_currency,
                salary_period, status, application_deadline, published_at
            ) VALUES (
                $1, $2, $3, $4, $5,
                $6, $7, $8, $9, $10,
                $11, $12, $13, $14, $15,
                $16, $17, $18, CASE WHEN $17 = 'active' THEN NOW() END
            )
            RETURNING *
            "#,
        )
        .bind(company_id)
        .bind(actor.id)
        .bind(payload.title.trim())
        .bind(payload.description)
        .bind(payload.responsibilities)
        .bind(normalize_skills(payload.required_skills))
        .bind(normalize_skills(payload.preferred_skills))
        .bind(payload.benefits)
        .bind(payload.employment_type.as_str())
        .bind(payload.experience_level.map(|l| l.as_str()))
        .bind(payload.location.trim())
        .bind(payload.is_remote)
        .bind(payload.salary_min)
        .bind(payload.salary_max)
        .bind(
            payload
                .salary_currency
                .map(|c| c.to_uppercase())
                .unwrap_or_else(|| "USD".to_string()),
        )
        .bind(payload.salary_period.unwrap_or(SalaryPeriod::Yearly).as_str())
        .bind(status.as_str())
        .bind(payload.application_deadline)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE companies
            SET total_jobs = total_jobs + 1,
                active_jobs = active_jobs + $2,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(company_id)
        .bind(if is_active { 1 } else { 0 })
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(job_id = %job.id, %company_id, status = %status, by = %actor.id, "job created");
        Ok(job)
    }

    async fn managed(&self, actor: &Actor, id: Uuid) -> Result<Job> {
        let job = self.get(id).await?;
        ensure(
            can_manage_job(actor, JobOwner::from(&job)),
            "Only the owning recruiter or an admin can manage this job",
        )?;
        Ok(job)
    }

    pub async fn update(&self, actor: &Actor, id: Uuid, payload: UpdateJobPayload) -> Result<Job> {
        let job = self.managed(actor, id).await?;
        check_salary_range(
            payload.salary_min.or(job.salary_min),
            payload.salary_max.or(job.salary_max),
        )?;

        let job = sqlx::query_as::<_, Job>(
            r#"
            UPDATE jobs
            SET
                title = COALESCE($2, title),
                description = COALESCE($3, description),
                responsibilities = COALESCE($4, responsibilities),
                required_skills = COALESCE($5, required_skills),
                preferred_skills = COALESCE($6, preferred_skills),
                benefits = COALESCE($7, benefits),
                employment_type = COALESCE($8, employment_type),
                experience_level = COALESCE($9, experience_level),
                location = COALESCE($10, location),
                is_remote = COALESCE($11, is_remote),
                salary_min = COALESCE($12, salary_min),
                salary_max = COALESCE($13, salary_max),
                salary_currency = COALESCE($14, salary_currency),
                salary_period = COALESCE($15, salary_period),
                application_deadline = COALESCE($16, application_deadline),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(job.id)
        .bind(payload.title.map(|t| t.trim().to_string()))
        .bind(payload.description)
        .bind(payload.responsibilities)
        .bind(payload.required_skills.map(normalize_skills))
        .bind(payload.preferred_skills.map(normalize_skills))
        .bind(payload.benefits)
        .bind(payload.employment_type.map(|t| t.as_str()))
        .bind(payload.experience_level.map(|l| l.as_str()))
        .bind(payload.location.map(|l| l.trim().to_string()))
        .bind(payload.is_remote)
        .bind(payload.salary_min)
        .bind(payload.salary_max)
        .bind(payload.salary_currency.map(|c| c.to_uppercase()))
        .bind(payload.salary_period.map(|p| p.as_str()))
        .bind(payload.application_deadline)
        .fetch_one(&self.pool)
        .await?;
        Ok(job)
    }

    /// Any status may follow any other. Entering or leaving `active` adjusts
    /// the company's active job counter, and the first activation stamps
    /// `published_at`.
    pub async fn update_status(&self, actor: &Actor, id: Uuid, status: JobStatus) -> Result<Job> {
        let job = self.managed(actor, id).await?;

        let mut tx = self.pool.begin().await?;

        let previous = lock_status(&mut tx, id).await?;
        let was_active = previous == Some(JobStatus::Active);
        let now_active = status == JobStatus::Active;

        let updated = sqlx::query_as::<_, Job>(
            r#"
            UPDATE jobs
            SET status = $2,
                published_at = CASE WHEN $2 = 'active' THEN COALESCE(published_at, NOW()) ELSE published_at END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .fetch_one(&mut *tx)
        .await?;

        let delta = active_delta(was_active, now_active);
        if delta != 0 {
            sqlx::query(
                "UPDATE companies SET active_jobs = GREATEST(active_jobs + $2, 0), updated_at = NOW() WHERE id = $1",
            )
            .bind(job.company_id)
            .bind(delta)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        tracing::info!(job_id = %id, from = ?previous, to = %status, by = %actor.id, "job status changed");
        Ok(updated)
    }

    /// Deleting a job drops its applications, so the company's application
    /// and hire totals shrink with it.
    pub async fn delete(&self, actor: &Actor, id: Uuid) -> Result<()> {
        let job = self.managed(actor, id).await?;

        let mut tx = self.pool.begin().await?;

        // Holding the row lock also waits out in-flight applications, which
        // take a key share lock on the job through their foreign key.
        let was_active = lock_status(&mut tx, id).await? == Some(JobStatus::Active);

        let (applications, hires): (i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*), COUNT(*) FILTER (WHERE status = 'hired')
            FROM applications
            WHERE job_id = $1
            "#,
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM jobs WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            UPDATE companies
            SET total_jobs = GREATEST(total_jobs - 1, 0),
                active_jobs = GREATEST(active_jobs - $2, 0),
                total_applications = GREATEST(total_applications - $3, 0),
                total_hires = GREATEST(total_hires - $4, 0),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(job.company_id)
        .bind(if was_active { 1 } else { 0 })
        .bind(applications as i32)
        .bind(hires as i32)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(job_id = %id, applications, by = %actor.id, "job deleted");
        Ok(())
    }
}

/// Current status of a job, read under `FOR UPDATE`.
async fn lock_status(tx: &mut Transaction<'_, Postgres>, id: Uuid) -> Result<Option<JobStatus>> {
    let status = sqlx::query_scalar::<_, String>("SELECT status FROM jobs WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| Error::NotFound("Job not found".to_string()))?;
    Ok(status.parse().ok())
}

fn active_delta(was_active: bool, now_active: bool) -> i32 {
    match (was_active, now_active) {
        (false, true) => 1,
        (true, false) => -1,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::job::EmploymentType;

    #[test]
    fn public_listing_hides_inactive_and_expired_jobs() {
        let query = JobListQuery {
            status: Some(JobStatus::Draft),
            ..Default::default()
        };
        let mut qb = QueryBuilder::<Postgres>::new("SELECT j.* FROM jobs j WHERE TRUE");
        push_job_filters(&mut qb, JobVisibility::Public, &query);
        assert_eq!(
            qb.sql(),
            "SELECT j.* FROM jobs j WHERE TRUE AND j.status = 'active' \
             AND (j.application_deadline IS NULL OR j.application_deadline > NOW())"
        );
    }

    #[test]
    fn recruiter_listing_filters_by_owner_and_status() {
        let query = JobListQuery {
            status: Some(JobStatus::Paused),
            employment_type: Some(EmploymentType::PartTime),
            ..Default::default()
        };
        let mut qb = QueryBuilder::<Postgres>::new("SELECT j.* FROM jobs j WHERE TRUE");
        push_job_filters(&mut qb, JobVisibility::Recruiter(Uuid::new_v4()), &query);
        assert_eq!(
            qb.sql(),
            "SELECT j.* FROM jobs j WHERE TRUE AND j.recruiter_id = $1 \
             AND j.status = $2 AND j.employment_type = $3"
        );
    }

    #[test]
    fn skills_filter_matches_either_list() {
        let query = JobListQuery {
            skills: Some("CPR, first aid,cpr".into()),
            is_remote: Some(false),
            ..Default::default()
        };
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM jobs j WHERE TRUE");
        push_job_filters(&mut qb, JobVisibility::All, &query);
        assert_eq!(
            qb.sql(),
            "SELECT COUNT(*) FROM jobs j WHERE TRUE AND j.is_remote = $1 \
             AND (j.required_skills && $2 OR j.preferred_skills && $3)"
        );
    }

    #[test]
    fn merged_salary_range_is_checked() {
        assert!(check_salary_range(Some(Decimal::new(10, 0)), Some(Decimal::new(20, 0))).is_ok());
        assert!(check_salary_range(Some(Decimal::new(30, 0)), Some(Decimal::new(20, 0))).is_err());
        assert!(check_salary_range(None, Some(Decimal::new(20, 0))).is_ok());
    }

    #[test]
    fn active_delta_tracks_transitions() {
        assert_eq!(active_delta(false, true), 1);
        assert_eq!(active_delta(true, false), -1);
        assert_eq!(active_delta(true, true), 0);
        assert_eq!(active_delta(false, false), 0);
    }
}
