use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Company {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub website: Option<String>,
    pub industry: Option<String>,
    pub size: Option<String>,
    pub location: Option<String>,
    pub logo_url: Option<String>,
    pub total_jobs: i32,
    pub active_jobs: i32,
    pub total_applications: i32,
    pub total_hires: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyPermissions {
    #[serde(default)]
    pub can_post_jobs: bool,
    #[serde(default)]
    pub can_manage_applications: bool,
    #[serde(default)]
    pub can_edit_company: bool,
}

impl CompanyPermissions {
    pub fn owner() -> Self {
        Self {
            can_post_jobs: true,
            can_manage_applications: true,
            can_edit_company: true,
        }
    }
}

impl Default for CompanyPermissions {
    fn default() -> Self {
        Self {
            can_post_jobs: true,
            can_manage_applications: true,
            can_edit_company: false,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct CompanyAdmin {
    pub company_id: Uuid,
    pub user_id: Uuid,
    pub permissions: Json<CompanyPermissions>,
    pub added_at: DateTime<Utc>,
}
