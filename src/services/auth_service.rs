use chrono::{DateTime, Duration, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::config::Config;
use crate::dto::auth_dto::{
    ChangePasswordPayload, LoginPayload, RegisterPayload, ResetPasswordPayload,
    UpdateProfilePayload,
};
use crate::error::{Error, Result};
use crate::models::company::CompanyPermissions;
use crate::models::user::{Lockout, LockoutPolicy, Profile, ResumeRef, Role, User};
use crate::services::email_service::EmailService;
use crate::utils::crypto::{constant_time_eq, hash_password, sha256_hex, verify_password};
use crate::utils::token::{generate_access_token, issue_jwt};
use crate::utils::upload::StoredFile;
use crate::utils::validation::normalize_skills;

const RESET_TOKEN_LEN: usize = 48;

#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub jwt_secret: String,
    pub token_ttl: Duration,
    pub lockout: LockoutPolicy,
    pub reset_ttl: Duration,
}

impl AuthSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            jwt_secret: config.jwt_secret.clone(),
            token_ttl: Duration::hours(config.jwt_expires_in_hours.max(1)),
            lockout: LockoutPolicy {
                max_attempts: config.max_login_attempts,
                lock_duration: Duration::minutes(config.lockout_minutes.max(1)),
            },
            reset_ttl: Duration::minutes(config.password_reset_ttl_minutes.max(1)),
        }
    }
}

/// A freshly issued token and the user it belongs to.
pub struct Session {
    pub token: String,
    pub expires_in: i64,
    pub user: User,
}

#[derive(Clone)]
pub struct AuthService {
    pool: PgPool,
    settings: AuthSettings,
    email: EmailService,
}

fn hashing_error(e: argon2::password_hash::Error) -> Error {
    Error::Internal(format!("Password hashing failed: {}", e))
}

impl AuthService {
    pub fn new(pool: PgPool, settings: AuthSettings, email: EmailService) -> Self {
        Self {
            pool,
            settings,
            email,
        }
    }

    fn issue(&self, user: User) -> Result<Session> {
        let token = issue_jwt(
            &self.settings.jwt_secret,
            user.id,
            user.role(),
            self.settings.token_ttl,
        )?;
        Ok(Session {
            token,
            expires_in: self.settings.token_ttl.num_seconds(),
            user,
        })
    }

    pub async fn register(&self, payload: RegisterPayload) -> Result<Session> {
        let role = payload.role.unwrap_or(Role::Candidate);
        if !role.is_self_assignable() {
            return Err(Error::Forbidden(format!(
                "The {} role cannot be chosen at registration",
                role
            )));
        }
        let company_name = payload
            .company_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty());
        if company_name.is_some() && role != Role::Recruiter {
            return Err(Error::BadRequest(
                "Only recruiters can register a company".to_string(),
            ));
        }

        let email = payload.email.trim().to_lowercase();
        let password_hash = hash_password(&payload.password).map_err(hashing_error)?;
        let profile = Profile {
            first_name: payload.first_name.trim().to_string(),
            last_name: payload.last_name.trim().to_string(),
            phone: payload.phone.clone(),
            ..Default::default()
        };

        let mut tx = self.pool.begin().await?;

        let company_id: Option<Uuid> = match company_name {
            Some(name) => Some(
                sqlx::query_scalar::<_, Uuid>("INSERT INTO companies (name) VALUES ($1) RETURNING id")
                    .bind(name)
                    .fetch_one(&mut *tx)
                    .await?,
            ),
            None => None,
        };

        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, password_hash, role, profile, company_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(&email)
        .bind(&password_hash)
        .bind(role.as_str())
        .bind(Json(&profile))
        .bind(company_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match Error::from(e) {
            Error::Conflict(_) => Error::Conflict("Email is already registered".to_string()),
            other => other,
        })?;

        if let Some(company_id) = company_id {
            sqlx::query(
                "INSERT INTO company_admins (company_id, user_id, permissions) VALUES ($1, $2, $3)",
            )
            .bind(company_id)
            .bind(user.id)
            .bind(Json(CompanyPermissions::owner()))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        tracing::info!(user_id = %user.id, role = %role, with_company = company_id.is_some(), "user registered");
        self.email.welcome(&user);
        self.issue(user)
    }

    /// Failed attempts are counted in a single UPDATE so parallel guesses
    /// cannot overwrite each other's increments. An expired lock restarts the
    /// count at one.
    pub async fn login(&self, payload: LoginPayload) -> Result<Session> {
        let invalid = || Error::Unauthorized("Invalid email or password".to_string());

        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(payload.email.trim().to_lowercase())
            .fetch_optional(&self.pool)
            .await?;
        let Some(user) = user else {
            // Same argon2 cost as a real check so timing does not reveal
            // which emails are registered.
            hash_password(&payload.password).map_err(hashing_error)?;
            return Err(invalid());
        };

        let lockout = user.lockout();
        if lockout.is_locked(Utc::now()) {
            return Err(locked_error(lockout.lock_until));
        }

        let verified = verify_password(&payload.password, &user.password_hash).map_err(hashing_error)?;
        if !verified {
            let next = self.record_failure(user.id).await?;
            if next.is_locked(Utc::now()) {
                tracing::warn!(user_id = %user.id, attempts = next.attempts, "account locked after failed logins");
                return Err(locked_error(next.lock_until));
            }
            tracing::info!(user_id = %user.id, attempts = next.attempts, "failed login");
            return Err(invalid());
        }

        if !user.is_active {
            return Err(Error::Forbidden("Account is deactivated".to_string()));
        }

        // A lock taken by a parallel request since the read above still wins.
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET login_attempts = 0, lock_until = NULL, last_login_at = NOW()
            WHERE id = $1 AND (lock_until IS NULL OR lock_until <= NOW())
            RETURNING *
            "#,
        )
        .bind(user.id)
        .fetch_optional(&self.pool)
        .await?;
        match user {
            Some(user) => self.issue(user),
            None => Err(locked_error(None)),
        }
    }

    async fn record_failure(&self, user_id: Uuid) -> Result<Lockout> {
        let policy = &self.settings.lockout;
        let (attempts, lock_until) = sqlx::query_as::<_, (i32, Option<DateTime<Utc>>)>(
            r#"
            WITH counted AS (
                SELECT id,
                       lock_until > NOW() AS still_locked,
                       CASE WHEN lock_until <= NOW() THEN 1 ELSE login_attempts + 1 END AS attempts
                FROM users
                WHERE id = $1
                FOR UPDATE
            )
            UPDATE users u
            SET login_attempts = c.attempts,
                lock_until = CASE
                    WHEN c.still_locked THEN u.lock_until
                    WHEN c.attempts >= $2 THEN NOW() + make_interval(secs => $3)
                    ELSE NULL
                END
            FROM counted c
            WHERE u.id = c.id
            RETURNING u.login_attempts, u.lock_until
            "#,
        )
        .bind(user_id)
        .bind(policy.max_attempts.max(1))
        .bind(policy.lock_duration.num_seconds() as f64)
        .fetch_one(&self.pool)
        .await?;
        Ok(Lockout {
            attempts,
            lock_until,
        })
    }

    pub async fn update_profile(&self, user: User, payload: UpdateProfilePayload) -> Result<User> {
        let mut profile = user.profile.0;
        if let Some(first_name) = payload.first_name {
            profile.first_name = first_name.trim().to_string();
        }
        if let Some(last_name) = payload.last_name {
            profile.last_name = last_name.trim().to_string();
        }
        if payload.phone.is_some() {
            profile.phone = payload.phone;
        }
        if payload.location.is_some() {
            profile.location = payload.location;
        }
        if payload.headline.is_some() {
            profile.headline = payload.headline;
        }
        if payload.bio.is_some() {
            profile.bio = payload.bio;
        }
        if let Some(skills) = payload.skills {
            profile.skills = normalize_skills(skills);
        }
        if let Some(experience) = payload.experience {
            profile.experience = experience;
        }
        if let Some(education) = payload.education {
            profile.education = education;
        }

        let updated = sqlx::query_as::<_, User>(
            "UPDATE users SET profile = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(user.id)
        .bind(Json(&profile))
        .fetch_one(&self.pool)
        .await?;
        Ok(updated)
    }

    pub async fn set_resume(&self, user_id: Uuid, file: StoredFile) -> Result<User> {
        let resume = ResumeRef {
            url: file.url,
            original_name: file.original_name,
            uploaded_at: Utc::now(),
        };
        let updated = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET profile = jsonb_set(profile, '{resume}', $2, true), updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(Json(&resume))
        .fetch_one(&self.pool)
        .await?;
        Ok(updated)
    }

    pub async fn change_password(&self, user: &User, payload: ChangePasswordPayload) -> Result<()> {
        let verified =
            verify_password(&payload.current_password, &user.password_hash).map_err(hashing_error)?;
        if !verified {
            return Err(Error::BadRequest("Current password is incorrect".to_string()));
        }
        if payload.current_password == payload.new_password {
            return Err(Error::BadRequest(
                "New password must differ from the current one".to_string(),
            ));
        }

        let hash = hash_password(&payload.new_password).map_err(hashing_error)?;
        sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $2, password_reset_hash = NULL, password_reset_expires = NULL,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(user.id)
        .bind(hash)
        .execute(&self.pool)
        .await?;

        tracing::info!(user_id = %user.id, "password changed");
        Ok(())
    }

    /// Succeeds whether or not the address is known.
    pub async fn forgot_password(&self, email: &str) -> Result<()> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email.trim().to_lowercase())
            .fetch_optional(&self.pool)
            .await?;

        let user = match user {
            Some(user) if user.is_active => user,
            _ => {
                tracing::debug!("password reset requested for unknown or inactive account");
                return Ok(());
            }
        };

        let token = generate_access_token(RESET_TOKEN_LEN);
        let expires = Utc::now() + self.settings.reset_ttl;
        sqlx::query(
            r#"
            UPDATE users
            SET password_reset_hash = $2, password_reset_expires = $3
            WHERE id = $1
            "#,
        )
        .bind(user.id)
        .bind(sha256_hex(&token))
        .bind(expires)
        .execute(&self.pool)
        .await?;

        tracing::info!(user_id = %user.id, "password reset requested");
        self.email
            .password_reset(&user, &token, self.settings.reset_ttl.num_minutes());
        Ok(())
    }

    pub async fn reset_password(&self, payload: ResetPasswordPayload) -> Result<()> {
        let invalid = || Error::BadRequest("Invalid or expired reset token".to_string());
        let digest = sha256_hex(payload.token.trim());

        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE password_reset_hash = $1")
            .bind(&digest)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(invalid)?;

        let stored = user.password_reset_hash.as_deref().unwrap_or_default();
        let unexpired = matches!(user.password_reset_expires, Some(exp) if exp > Utc::now());
        if !constant_time_eq(stored, &digest) || !unexpired {
            return Err(invalid());
        }

        let hash = hash_password(&payload.password).map_err(hashing_error)?;
        sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $2, password_reset_hash = NULL, password_reset_expires = NULL,
                login_attempts = 0, lock_until = NULL, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(user.id)
        .bind(hash)
        .execute(&self.pool)
        .await?;

        tracing::info!(user_id = %user.id, "password reset completed");
        Ok(())
    }
}

fn locked_error(until: Option<chrono::DateTime<Utc>>) -> Error {
    match until {
        Some(until) => Error::Locked(format!(
            "Too many failed login attempts. Try again after {}",
            until.format("%Y-%m-%d %H:%M UTC")
        )),
        None => Error::Locked("Account is temporarily locked".to_string()),
    }
}
