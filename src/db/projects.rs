use sqlx::PgPool;
use uuid::Uuid;

use crate::models::Project;

pub struct ProjectChanges<'a> {
    pub application_name: Option<&'a str>,
    pub user_id: Option<Uuid>,
    pub domain_name: Option<&'a str>,
    pub file_id: Option<Uuid>,
    pub database_id: Option<Uuid>,
}

pub async fn list(pool: &PgPool) -> Result<Vec<Project>, sqlx::Error> {
    sqlx::query_as::<_, Project>("SELECT * FROM projects ORDER BY created_at DESC")
        .fetch_all(pool)
        .await
}

pub async fn list_by_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<Project>, sqlx::Error> {
    sqlx::query_as::<_, Project>(
        "SELECT * FROM projects WHERE user_id = $1 ORDER BY created_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

pub async fn create<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
    application_name: &str,
    user_id: Uuid,
    domain_name: &str,
    file_id: Option<Uuid>,
    database_id: Option<Uuid>,
) -> Result<Project, sqlx::Error> {
    sqlx::query_as::<_, Project>(
        "INSERT INTO projects (application_name, user_id, domain_name, file_id, database_id)
         VALUES ($1, $2, $3, $4, $5) RETURNING *",
    )
    .bind(application_name)
    .bind(user_id)
    .bind(domain_name)
    .bind(file_id)
    .bind(database_id)
    .fetch_one(executor)
    .await
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Project>, sqlx::Error> {
    sqlx::query_as::<_, Project>("SELECT * FROM projects WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Apply the present fields; absent ones keep their stored value.
pub async fn update(
    pool: &PgPool,
    id: Uuid,
    changes: &ProjectChanges<'_>,
) -> Result<Option<Project>, sqlx::Error> {
    sqlx::query_as::<_, Project>(
        "UPDATE projects SET
            application_name = COALESCE($2, application_name),
            user_id = COALESCE($3, user_id),
            domain_name = COALESCE($4, domain_name),
            file_id = COALESCE($5, file_id),
            database_id = COALESCE($6, database_id),
            updated_at = now()
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(changes.application_name)
    .bind(changes.user_id)
    .bind(changes.domain_name)
    .bind(changes.file_id)
    .bind(changes.database_id)
    .fetch_optional(pool)
    .await
}

pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM projects WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn exists(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let row: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM projects WHERE id = $1)")
        .bind(id)
        .fetch_one(pool)
        .await?;
    Ok(row.0)
}
