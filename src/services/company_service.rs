use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::dto::company_dto::{AddCompanyAdminPayload, CreateCompanyPayload, UpdateCompanyPayload};
use crate::error::{Error, Result};
use crate::models::company::{Company, CompanyAdmin, CompanyPermissions};
use crate::models::user::{Role, User};
use crate::services::access::{can_edit_company, ensure, Actor};

#[derive(Clone)]
pub struct CompanyService {
    pool: PgPool,
}

impl CompanyService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: Uuid) -> Result<Company> {
        sqlx::query_as::<_, Company>("SELECT * FROM companies WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound("Company not found".to_string()))
    }

    pub async fn admins(&self, company_id: Uuid) -> Result<Vec<CompanyAdmin>> {
        let admins = sqlx::query_as::<_, CompanyAdmin>(
            "SELECT * FROM company_admins WHERE company_id = $1 ORDER BY added_at",
        )
        .bind(company_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(admins)
    }

    pub async fn membership(
        &self,
        company_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<CompanyPermissions>> {
        let permissions = sqlx::query_scalar::<_, Json<CompanyPermissions>>(
            "SELECT permissions FROM company_admins WHERE company_id = $1 AND user_id = $2",
        )
        .bind(company_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(permissions.map(|p| p.0))
    }

    /// The creator becomes the company's first admin. A recruiter without a
    /// company is attached to the new one.
    pub async fn create(&self, actor: &Actor, payload: CreateCompanyPayload) -> Result<Company> {
        if actor.role == Role::Recruiter && actor.company_id.is_some() {
            return Err(Error::Conflict(
                "You already belong to a company".to_string(),
            ));
        }

        let mut tx = self.pool.begin().await?;

        let company = sqlx::query_as::<_, Company>(
            r#"
            INSERT INTO companies (name, description, website, industry, size, location, logo_url)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(payload.name.trim())
        .bind(payload.description)
        .bind(payload.website)
        .bind(payload.industry)
        .bind(payload.size)
        .bind(payload.location)
        .bind(payload.logo_url)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO company_admins (company_id, user_id, permissions) VALUES ($1, $2, $3)",
        )
        .bind(company.id)
        .bind(actor.id)
        .bind(Json(CompanyPermissions::owner()))
        .execute(&mut *tx)
        .await?;

        if actor.role == Role::Recruiter {
            sqlx::query("UPDATE users SET company_id = $2, updated_at = NOW() WHERE id = $1")
                .bind(actor.id)
                .bind(company.id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        tracing::info!(company_id = %company.id, by = %actor.id, "company created");
        Ok(company)
    }

    async fn ensure_can_edit(&self, actor: &Actor, company_id: Uuid) -> Result<()> {
        let membership = if actor.is_admin() {
            None
        } else {
            self.membership(company_id, actor.id).await?
        };
        ensure(
            can_edit_company(actor, company_id, membership),
            "You do not have permission to edit this company",
        )
    }

    pub async fn update(
        &self,
        actor: &Actor,
        id: Uuid,
        payload: UpdateCompanyPayload,
    ) -> Result<Company> {
        self.get(id).await?;
        self.ensure_can_edit(actor, id).await?;

        let company = sqlx::query_as::<_, Company>(
            r#"
            UPDATE companies
            SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                website = COALESCE($4, website),
                industry = COALESCE($5, industry),
                size = COALESCE($6, size),
                location = COALESCE($7, location),
                logo_url = COALESCE($8, logo_url),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(payload.name.map(|n| n.trim().to_string()))
        .bind(payload.description)
        .bind(payload.website)
        .bind(payload.industry)
        .bind(payload.size)
        .bind(payload.location)
        .bind(payload.logo_url)
        .fetch_one(&self.pool)
        .await?;
        Ok(company)
    }

    /// Adds or updates an admin row. Only staff accounts can be company admins.
    pub async fn add_admin(
        &self,
        actor: &Actor,
        company_id: Uuid,
        payload: AddCompanyAdminPayload,
    ) -> Result<CompanyAdmin> {
        self.get(company_id).await?;
        self.ensure_can_edit(actor, company_id).await?;

        let target = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(payload.user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound("User not found".to_string()))?;
        if !matches!(target.role(), Role::Recruiter | Role::HrManager) {
            return Err(Error::BadRequest(
                "Only recruiters and HR managers can be company admins".to_string(),
            ));
        }
        if matches!(target.company_id, Some(other) if other != company_id) {
            return Err(Error::Conflict(
                "User already belongs to another company".to_string(),
            ));
        }

        let permissions = payload.permissions.unwrap_or_default();
        let mut tx = self.pool.begin().await?;

        let admin = sqlx::query_as::<_, CompanyAdmin>(
            r#"
            INSERT INTO company_admins (company_id, user_id, permissions)
            VALUES ($1, $2, $3)
            ON CONFLICT (company_id, user_id) DO UPDATE SET permissions = EXCLUDED.permissions
            RETURNING *
            "#,
        )
        .bind(company_id)
        .bind(target.id)
        .bind(Json(permissions))
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE users SET company_id = $2, updated_at = NOW() WHERE id = $1")
            .bind(target.id)
            .bind(company_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::info!(%company_id, user_id = %target.id, by = %actor.id, "company admin saved");
        Ok(admin)
    }

    pub async fn remove_admin(&self, actor: &Actor, company_id: Uuid, user_id: Uuid) -> Result<()> {
        self.ensure_can_edit(actor, company_id).await?;

        let admins = self.admins(company_id).await?;
        let target = admins
            .iter()
            .find(|a| a.user_id == user_id)
            .ok_or_else(|| Error::NotFound("Company admin not found".to_string()))?;
        if !remaining_editor_exists(&admins, target.user_id) && target.permissions.can_edit_company {
            return Err(Error::BadRequest(
                "A company needs at least one admin who can edit it".to_string(),
            ));
        }

        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM company_admins WHERE company_id = $1 AND user_id = $2")
            .bind(company_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "UPDATE users SET company_id = NULL, updated_at = NOW() WHERE id = $1 AND company_id = $2",
        )
        .bind(user_id)
        .bind(company_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(%company_id, %user_id, by = %actor.id, "company admin removed");
        Ok(())
    }
}

/// Whether someone other than `removed` keeps `can_edit_company`.
fn remaining_editor_exists(admins: &[CompanyAdmin], removed: Uuid) -> bool {
    admins
        .iter()
        .any(|a| a.user_id != removed && a.permissions.can_edit_company)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn admin(permissions: CompanyPermissions) -> CompanyAdmin {
        CompanyAdmin {
            company_id: Uuid::nil(),
            user_id: Uuid::new_v4(),
            permissions: Json(permissions),
            added_at: Utc::now(),
        }
    }

    #[test]
    fn last_editor_cannot_be_removed() {
        let owner = admin(CompanyPermissions::owner());
        let member = admin(CompanyPermissions::default());
        let admins = vec![owner.clone(), member.clone()];

        assert!(!remaining_editor_exists(&admins, owner.user_id));
        assert!(remaining_editor_exists(&admins, member.user_id));

        let second_owner = admin(CompanyPermissions::owner());
        let admins = vec![owner.clone(), second_owner];
        assert!(remaining_editor_exists(&admins, owner.user_id));
    }
}
