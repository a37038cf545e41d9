use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{Bucket, File};

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<File>, sqlx::Error> {
    sqlx::query_as::<_, File>("SELECT * FROM files WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn find_bucket(pool: &PgPool, id: Uuid) -> Result<Option<Bucket>, sqlx::Error> {
    sqlx::query_as::<_, Bucket>("SELECT * FROM buckets WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}
