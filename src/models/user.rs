use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Candidate,
    Recruiter,
    Admin,
    HrManager,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Candidate, Role::Recruiter, Role::Admin, Role::HrManager];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Candidate => "candidate",
            Role::Recruiter => "recruiter",
            Role::Admin => "admin",
            Role::HrManager => "hr_manager",
        }
    }

    /// Roles a visitor may pick for themselves at registration.
    pub fn is_self_assignable(&self) -> bool {
        matches!(self, Role::Candidate | Role::Recruiter)
    }

    /// Staff roles act on behalf of a company.
    pub fn is_staff(&self) -> bool {
        !matches!(self, Role::Candidate)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown role '{}'", s))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub location: Option<String>,
    pub headline: Option<String>,
    pub bio: Option<String>,
    pub skills: Vec<String>,
    pub experience: Vec<Experience>,
    pub education: Vec<Education>,
    pub resume: Option<ResumeRef>,
}

impl Profile {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
            .trim()
            .to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Experience {
    pub title: String,
    pub company: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub current: bool,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Education {
    pub institution: String,
    pub degree: Option<String>,
    pub field: Option<String>,
    pub graduation_year: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumeRef {
    pub url: String,
    pub original_name: String,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub profile: Json<Profile>,
    pub company_id: Option<Uuid>,
    pub is_active: bool,
    pub login_attempts: i32,
    pub lock_until: Option<DateTime<Utc>>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub password_reset_hash: Option<String>,
    pub password_reset_expires: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Unknown role strings degrade to the least privileged role.
    pub fn role(&self) -> Role {
        self.role.parse().unwrap_or(Role::Candidate)
    }

    pub fn lockout(&self) -> Lockout {
        Lockout {
            attempts: self.login_attempts,
            lock_until: self.lock_until,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LockoutPolicy {
    pub max_attempts: i32,
    pub lock_duration: chrono::Duration,
}

/// Failed-login counters carried on the user row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Lockout {
    pub attempts: i32,
    pub lock_until: Option<DateTime<Utc>>,
}

impl Lockout {
    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        matches!(self.lock_until, Some(until) if until > now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn role_round_trips_through_strings() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert_eq!("HR_MANAGER".parse::<Role>().unwrap(), Role::HrManager);
        assert!("superuser".parse::<Role>().is_err());
    }

    #[test]
    fn only_candidate_and_recruiter_are_self_assignable() {
        assert!(Role::Candidate.is_self_assignable());
        assert!(Role::Recruiter.is_self_assignable());
        assert!(!Role::Admin.is_self_assignable());
        assert!(!Role::HrManager.is_self_assignable());
    }

    #[test]
    fn lock_holds_until_its_deadline() {
        let now = Utc::now();
        assert!(!Lockout::default().is_locked(now));

        let locked = Lockout {
            attempts: 5,
            lock_until: Some(now + Duration::minutes(120)),
        };
        assert!(locked.is_locked(now));
        assert!(locked.is_locked(now + Duration::minutes(119)));
        assert!(!locked.is_locked(now + Duration::minutes(121)));
    }

    #[test]
    fn full_name_trims_missing_parts() {
        let profile = Profile {
            first_name: "Ada".into(),
            ..Default::default()
        };
        assert_eq!(profile.full_name(), "Ada");
    }
}
