use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::company::{Company, CompanyAdmin, CompanyPermissions};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateCompanyPayload {
    #[validate(length(min = 2, max = 160))]
    pub name: String,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    #[validate(url)]
    pub website: Option<String>,
    #[validate(length(max = 80))]
    pub industry: Option<String>,
    #[validate(length(max = 40))]
    pub size: Option<String>,
    #[validate(length(max = 160))]
    pub location: Option<String>,
    #[validate(url)]
    pub logo_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default)]
pub struct UpdateCompanyPayload {
    #[validate(length(min = 2, max = 160))]
    pub name: Option<String>,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    #[validate(url)]
    pub website: Option<String>,
    #[validate(length(max = 80))]
    pub industry: Option<String>,
    #[validate(length(max = 40))]
    pub size: Option<String>,
    #[validate(length(max = 160))]
    pub location: Option<String>,
    #[validate(url)]
    pub logo_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddCompanyAdminPayload {
    pub user_id: Uuid,
    #[serde(default)]
    pub permissions: Option<CompanyPermissions>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyAdminResponse {
    pub user_id: Uuid,
    pub permissions: CompanyPermissions,
    pub added_at: DateTime<Utc>,
}

impl From<CompanyAdmin> for CompanyAdminResponse {
    fn from(value: CompanyAdmin) -> Self {
        Self {
            user_id: value.user_id,
            permissions: value.permissions.0,
            added_at: value.added_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyStats {
    pub total_jobs: i32,
    pub active_jobs: i32,
    pub total_applications: i32,
    pub total_hires: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyResponse {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub website: Option<String>,
    pub industry: Option<String>,
    pub size: Option<String>,
    pub location: Option<String>,
    pub logo_url: Option<String>,
    pub stats: CompanyStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admins: Option<Vec<CompanyAdminResponse>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CompanyResponse {
    pub fn with_admins(mut self, admins: Vec<CompanyAdmin>) -> Self {
        self.admins = Some(admins.into_iter().map(Into::into).collect());
        self
    }
}

impl From<Company> for CompanyResponse {
    fn from(value: Company) -> Self {
        Self {
            id: value.id,
            name: value.name,
            description: value.description,
            website: value.website,
            industry: value.industry,
            size: value.size,
            location: value.location,
            logo_url: value.logo_url,
            stats: CompanyStats {
                total_jobs: value.total_jobs,
                active_jobs: value.active_jobs,
                total_applications: value.total_applications,
                total_hires: value.total_hires,
            },
            admins: None,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}
