use sqlx::PgPool;
use uuid::Uuid;

use crate::models::Database;

pub async fn list(pool: &PgPool) -> Result<Vec<Database>, sqlx::Error> {
    sqlx::query_as::<_, Database>("SELECT * FROM databases ORDER BY created_at DESC")
        .fetch_all(pool)
        .await
}

pub async fn create<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
    name: &str,
) -> Result<Database, sqlx::Error> {
    sqlx::query_as::<_, Database>("INSERT INTO databases (name) VALUES ($1) RETURNING *")
        .bind(name)
        .fetch_one(executor)
        .await
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Database>, sqlx::Error> {
    sqlx::query_as::<_, Database>("SELECT * FROM databases WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn rename(pool: &PgPool, id: Uuid, name: &str) -> Result<Option<Database>, sqlx::Error> {
    sqlx::query_as::<_, Database>(
        "UPDATE databases SET name = $2, updated_at = now() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(name)
    .fetch_optional(pool)
    .await
}

pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM databases WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() == 1)
}

/// Whether any project still points at this database.
pub async fn is_referenced(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let row: (bool,) =
        sqlx::query_as("SELECT EXISTS(SELECT 1 FROM projects WHERE database_id = $1)")
            .bind(id)
            .fetch_one(pool)
            .await?;
    Ok(row.0)
}
