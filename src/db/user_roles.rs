use sqlx::PgPool;
use uuid::Uuid;

use crate::models::UserRole;

pub async fn list(pool: &PgPool) -> Result<Vec<UserRole>, sqlx::Error> {
    sqlx::query_as::<_, UserRole>("SELECT * FROM user_roles ORDER BY name")
        .fetch_all(pool)
        .await
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<UserRole>, sqlx::Error> {
    sqlx::query_as::<_, UserRole>("SELECT * FROM user_roles WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}
