//! Role and ownership rules.
//!
//! Route middleware only gates on the role claim; everything that depends on
//! who owns a record is decided here against fresh user data.

use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::company::CompanyPermissions;
use crate::models::job::Job;
use crate::models::user::{Role, User};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: Uuid,
    pub role: Role,
    pub company_id: Option<Uuid>,
}

impl Actor {
    pub fn from_user(user: &User) -> Self {
        Self {
            id: user.id,
            role: user.role(),
            company_id: user.company_id,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// The ownership fields of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobOwner {
    pub company_id: Uuid,
    pub recruiter_id: Uuid,
}

impl From<&Job> for JobOwner {
    fn from(job: &Job) -> Self {
        Self {
            company_id: job.company_id,
            recruiter_id: job.recruiter_id,
        }
    }
}

pub fn ensure(allowed: bool, message: &str) -> Result<()> {
    if allowed {
        Ok(())
    } else {
        Err(Error::Forbidden(message.to_string()))
    }
}

/// The owning recruiter or an admin.
pub fn can_manage_job(actor: &Actor, job: JobOwner) -> bool {
    actor.is_admin() || (actor.role == Role::Recruiter && job.recruiter_id == actor.id)
}

pub fn can_view_job_applications(actor: &Actor, job: JobOwner) -> bool {
    can_manage_job(actor, job)
        || (actor.role == Role::HrManager && actor.company_id == Some(job.company_id))
}

pub fn can_view_application(actor: &Actor, candidate_id: Uuid, job: JobOwner) -> bool {
    is_owning_candidate(actor, candidate_id) || can_view_job_applications(actor, job)
}

fn manages_applications(membership: Option<CompanyPermissions>) -> bool {
    membership.map(|p| p.can_manage_applications).unwrap_or(false)
}

/// Staff acting inside their own company.
pub fn is_member_of(actor: &Actor, company_id: Uuid) -> bool {
    actor.role.is_staff() && actor.company_id == Some(company_id)
}

/// Status changes, interviews and offers. The owning recruiter also needs
/// `can_manage_applications` in the job's company.
pub fn can_manage_applications(
    actor: &Actor,
    job: JobOwner,
    membership: Option<CompanyPermissions>,
) -> bool {
    actor.is_admin()
        || (can_manage_job(actor, job)
            && is_member_of(actor, job.company_id)
            && manages_applications(membership))
}

pub fn can_add_note(actor: &Actor, job: JobOwner, membership: Option<CompanyPermissions>) -> bool {
    actor.is_admin()
        || (can_view_job_applications(actor, job)
            && is_member_of(actor, job.company_id)
            && manages_applications(membership))
}

pub fn is_owning_candidate(actor: &Actor, candidate_id: Uuid) -> bool {
    actor.role == Role::Candidate && actor.id == candidate_id
}

/// Admin rows only count while the user is still staff of that company.
pub fn can_edit_company(
    actor: &Actor,
    company_id: Uuid,
    membership: Option<CompanyPermissions>,
) -> bool {
    actor.is_admin()
        || (is_member_of(actor, company_id)
            && membership.map(|p| p.can_edit_company).unwrap_or(false))
}

/// Which applications an actor may list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplicationScope {
    All,
    Candidate(Uuid),
    Recruiter(Uuid),
    Company(Uuid),
    Nothing,
}

impl ApplicationScope {
    pub fn for_actor(actor: &Actor) -> Self {
        match actor.role {
            Role::Admin => ApplicationScope::All,
            Role::Candidate => ApplicationScope::Candidate(actor.id),
            Role::Recruiter => ApplicationScope::Recruiter(actor.id),
            Role::HrManager => actor
                .company_id
                .map(ApplicationScope::Company)
                .unwrap_or(ApplicationScope::Nothing),
        }
    }

    /// Appends an `AND ...` clause over `a` (applications) and `j` (jobs).
    pub fn push_filter(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        match *self {
            ApplicationScope::All => {}
            ApplicationScope::Candidate(id) => {
                qb.push(" AND a.candidate_id = ").push_bind(id);
            }
            ApplicationScope::Recruiter(id) => {
                qb.push(" AND j.recruiter_id = ").push_bind(id);
            }
            ApplicationScope::Company(id) => {
                qb.push(" AND j.company_id = ").push_bind(id);
            }
            ApplicationScope::Nothing => {
                qb.push(" AND FALSE");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actor(role: Role) -> Actor {
        Actor {
            id: Uuid::new_v4(),
            role,
            company_id: None,
        }
    }

    fn job_of(recruiter: &Actor) -> JobOwner {
        JobOwner {
            company_id: recruiter.company_id.unwrap_or_else(Uuid::new_v4),
            recruiter_id: recruiter.id,
        }
    }

    #[test]
    fn owning_recruiter_and_admin_manage_jobs() {
        let owner = actor(Role::Recruiter);
        let other = actor(Role::Recruiter);
        let admin = actor(Role::Admin);
        let job = job_of(&owner);

        assert!(can_manage_job(&owner, job));
        assert!(can_manage_job(&admin, job));
        assert!(!can_manage_job(&other, job));
    }

    #[test]
    fn candidates_never_manage_jobs_even_with_matching_id() {
        let candidate = actor(Role::Candidate);
        let job = JobOwner {
            company_id: Uuid::new_v4(),
            recruiter_id: candidate.id,
        };
        assert!(!can_manage_job(&candidate, job));
    }

    #[test]
    fn hr_manager_sees_company_applications_only() {
        let company = Uuid::new_v4();
        let mut hr = actor(Role::HrManager);
        hr.company_id = Some(company);
        let recruiter = Actor {
            company_id: Some(company),
            ..actor(Role::Recruiter)
        };

        let own_company_job = job_of(&recruiter);
        let foreign_job = JobOwner {
            company_id: Uuid::new_v4(),
            recruiter_id: recruiter.id,
        };

        let member = Some(CompanyPermissions::default());
        assert!(can_view_job_applications(&hr, own_company_job));
        assert!(can_add_note(&hr, own_company_job, member));
        assert!(!can_manage_job(&hr, own_company_job));
        assert!(!can_manage_applications(&hr, own_company_job, member));
        assert!(!can_view_job_applications(&hr, foreign_job));
        assert!(!can_add_note(&hr, foreign_job, member));
    }

    #[test]
    fn application_handling_needs_the_company_permission() {
        let company = Uuid::new_v4();
        let recruiter = Actor {
            company_id: Some(company),
            ..actor(Role::Recruiter)
        };
        let job = job_of(&recruiter);
        let granted = Some(CompanyPermissions::owner());
        let withheld = Some(CompanyPermissions {
            can_manage_applications: false,
            ..CompanyPermissions::owner()
        });

        assert!(can_manage_applications(&recruiter, job, granted));
        assert!(can_add_note(&recruiter, job, granted));
        assert!(!can_manage_applications(&recruiter, job, withheld));
        assert!(!can_add_note(&recruiter, job, withheld));
        assert!(!can_manage_applications(&recruiter, job, None));
        // Job ownership outlives a move to another company; application rights do not.
        let moved = Actor {
            company_id: Some(Uuid::new_v4()),
            ..recruiter
        };
        assert!(can_manage_job(&moved, job));
        assert!(!can_manage_applications(&moved, job, granted));
        assert!(can_manage_applications(&actor(Role::Admin), job, None));
    }

    #[test]
    fn candidate_sees_only_own_application() {
        let candidate = actor(Role::Candidate);
        let job = job_of(&actor(Role::Recruiter));
        assert!(can_view_application(&candidate, candidate.id, job));
        assert!(!can_view_application(&candidate, Uuid::new_v4(), job));
        assert!(!can_add_note(&candidate, job, Some(CompanyPermissions::owner())));
    }

    #[test]
    fn company_edit_needs_permission_or_admin() {
        let company = Uuid::new_v4();
        let recruiter = Actor {
            company_id: Some(company),
            ..actor(Role::Recruiter)
        };
        assert!(!can_edit_company(&recruiter, company, None));
        assert!(!can_edit_company(&recruiter, company, Some(CompanyPermissions::default())));
        assert!(can_edit_company(&recruiter, company, Some(CompanyPermissions::owner())));
        assert!(can_edit_company(&actor(Role::Admin), company, None));
    }

    #[test]
    fn stale_admin_row_grants_nothing() {
        let company = Uuid::new_v4();
        let owner = Some(CompanyPermissions::owner());

        let demoted = actor(Role::Candidate);
        assert!(!can_edit_company(&demoted, company, owner));
        let still_pointing = Actor {
            company_id: Some(company),
            ..actor(Role::Candidate)
        };
        assert!(!can_edit_company(&still_pointing, company, owner));

        let moved = Actor {
            company_id: Some(Uuid::new_v4()),
            ..actor(Role::Recruiter)
        };
        assert!(!can_edit_company(&moved, company, owner));
    }

    #[test]
    fn scope_follows_role() {
        let admin = actor(Role::Admin);
        let candidate = actor(Role::Candidate);
        let recruiter = actor(Role::Recruiter);
        let hr = actor(Role::HrManager);

        assert_eq!(ApplicationScope::for_actor(&admin), ApplicationScope::All);
        assert_eq!(
            ApplicationScope::for_actor(&candidate),
            ApplicationScope::Candidate(candidate.id)
        );
        assert_eq!(
            ApplicationScope::for_actor(&recruiter),
            ApplicationScope::Recruiter(recruiter.id)
        );
        assert_eq!(ApplicationScope::for_actor(&hr), ApplicationScope::Nothing);
    }

    #[test]
    fn scope_filters_render_sql() {
        let base = "SELECT a.* FROM applications a JOIN jobs j ON j.id = a.job_id WHERE TRUE";

        let mut qb = QueryBuilder::<Postgres>::new(base);
        ApplicationScope::Recruiter(Uuid::new_v4()).push_filter(&mut qb);
        assert!(qb.sql().ends_with("AND j.recruiter_id = $1"));

        let mut qb = QueryBuilder::<Postgres>::new(base);
        ApplicationScope::All.push_filter(&mut qb);
        assert_eq!(qb.sql(), base);

        let mut qb = QueryBuilder::<Postgres>::new(base);
        ApplicationScope::Nothing.push_filter(&mut qb);
        assert!(qb.sql().ends_with("AND FALSE"));
    }

    #[test]
    fn ensure_maps_to_forbidden() {
        assert!(ensure(true, "nope").is_ok());
        assert!(matches!(ensure(false, "nope"), Err(Error::Forbidden(_))));
    }
}
