use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::database::listing::{like_pattern, Paginated, Pagination, Sort};
use crate::dto::user_dto::{UpdateRolePayload, UserListQuery};
use crate::error::{Error, Result};
use crate::models::company::CompanyPermissions;
use crate::models::user::{Role, User};
use crate::services::access::{ensure, Actor};

const ADMIN_ONLY: &str = "Only admins can manage users";

const USER_SORT_FIELDS: &[(&str, &str)] = &[
    ("created_at", "u.created_at"),
    ("email", "u.email"),
    ("role", "u.role"),
    ("last_login_at", "u.last_login_at"),
];

#[derive(Clone)]
pub struct UserService {
    pool: PgPool,
}

impl UserService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<User> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound("User not found".to_string()))
    }

    pub async fn get(&self, admin: &Actor, id: Uuid) -> Result<User> {
        ensure(admin.is_admin(), ADMIN_ONLY)?;
        self.get_by_id(id).await
    }

    /// Loads the calling user. Role and company come from the row, not the
    /// token, so demotions take effect before the token expires.
    pub async fn load_active(&self, id: Uuid) -> Result<User> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::Unauthorized("Account no longer exists".to_string()))?;
        if !user.is_active {
            return Err(Error::Unauthorized("Account is deactivated".to_string()));
        }
        Ok(user)
    }

    pub async fn load_actor(&self, id: Uuid) -> Result<(User, Actor)> {
        let user = self.load_active(id).await?;
        let actor = Actor::from_user(&user);
        Ok((user, actor))
    }

    pub async fn list(&self, admin: &Actor, query: &UserListQuery) -> Result<Paginated<User>> {
        ensure(admin.is_admin(), ADMIN_ONLY)?;
        let pagination = Pagination::new(query.page, query.limit);
        let sort = Sort::parse(query.sort.as_deref(), USER_SORT_FIELDS, "-created_at")?;

        let mut count_qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM users u WHERE TRUE");
        push_user_filters(&mut count_qb, query);
        let total = count_qb
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        let mut qb = QueryBuilder::<Postgres>::new("SELECT u.* FROM users u WHERE TRUE");
        push_user_filters(&mut qb, query);
        sort.push_order_by(&mut qb);
        pagination.push_limit(&mut qb);
        let items = qb.build_query_as::<User>().fetch_all(&self.pool).await?;

        Ok(Paginated::new(items, total, pagination))
    }

    /// Changing the role or the company drops the user's company admin rows.
    /// Staff moved into a company get a default admin row there.
    pub async fn update_role(
        &self,
        admin: &Actor,
        id: Uuid,
        payload: UpdateRolePayload,
    ) -> Result<User> {
        ensure(admin.is_admin(), ADMIN_ONLY)?;
        let user = self.get_by_id(id).await?;
        if admin.id == id && payload.role != Role::Admin {
            return Err(Error::BadRequest(
                "Admins cannot remove their own admin role".to_string(),
            ));
        }

        let company_id = match payload.role {
            Role::Candidate => None,
            _ => payload.company_id.or(user.company_id),
        };
        if let Some(company_id) = company_id {
            let exists =
                sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM companies WHERE id = $1)")
                    .bind(company_id)
                    .fetch_one(&self.pool)
                    .await?;
            if !exists {
                return Err(Error::NotFound("Company not found".to_string()));
            }
        }
        if payload.role == Role::HrManager && company_id.is_none() {
            return Err(Error::BadRequest(
                "HR managers must belong to a company".to_string(),
            ));
        }

        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET role = $2, company_id = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(payload.role.as_str())
        .bind(company_id)
        .fetch_one(&mut *tx)
        .await?;

        let revoked = sqlx::query(
            r#"
            DELETE FROM company_admins
            WHERE user_id = $1 AND ($2 = 'candidate' OR company_id IS DISTINCT FROM $3)
            "#,
        )
        .bind(id)
        .bind(payload.role.as_str())
        .bind(company_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if let (Some(company_id), Role::Recruiter | Role::HrManager) = (company_id, payload.role) {
            sqlx::query(
                r#"
                INSERT INTO company_admins (company_id, user_id, permissions)
                VALUES ($1, $2, $3)
                ON CONFLICT (company_id, user_id) DO NOTHING
                "#,
            )
            .bind(company_id)
            .bind(id)
            .bind(Json(CompanyPermissions::default()))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        tracing::info!(
            user_id = %id,
            from = %user.role,
            to = %payload.role,
            revoked_memberships = revoked,
            by = %admin.id,
            "user role changed"
        );
        Ok(updated)
    }

    /// Reactivating an account also clears any login lockout.
    pub async fn set_active(&self, admin: &Actor, id: Uuid, is_active: bool) -> Result<User> {
        ensure(admin.is_admin(), ADMIN_ONLY)?;
        if admin.id == id && !is_active {
            return Err(Error::BadRequest(
                "Admins cannot deactivate their own account".to_string(),
            ));
        }

        let updated = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET is_active = $2,
                login_attempts = CASE WHEN $2 THEN 0 ELSE login_attempts END,
                lock_until = CASE WHEN $2 THEN NULL ELSE lock_until END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(is_active)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound("User not found".to_string()))?;

        tracing::info!(user_id = %id, is_active, by = %admin.id, "user status changed");
        Ok(updated)
    }
}

fn push_user_filters(qb: &mut QueryBuilder<'_, Postgres>, query: &UserListQuery) {
    if let Some(role) = query.role {
        qb.push(" AND u.role = ").push_bind(role.as_str());
    }
    if let Some(is_active) = query.is_active {
        qb.push(" AND u.is_active = ").push_bind(is_active);
    }
    if let Some(pattern) = like_pattern(query.search.as_deref()) {
        qb.push(" AND (u.email ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR u.profile->>'first_name' ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR u.profile->>'last_name' ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}
