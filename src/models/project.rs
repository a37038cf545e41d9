use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{Bucket, Database, File};

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize, ToSchema)]
pub struct Project {
    pub id: Uuid,
    pub application_name: String,
    pub user_id: Uuid,
    pub domain_name: String,
    pub file_id: Option<Uuid>,
    pub database_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FileWithBucket {
    #[serde(flatten)]
    pub file: File,
    pub bucket: Option<Bucket>,
}

/// A project with its database and file relations loaded.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProjectDetail {
    #[serde(flatten)]
    pub project: Project,
    pub database: Option<Database>,
    pub file: Option<FileWithBucket>,
}
