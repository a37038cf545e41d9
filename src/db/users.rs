use sqlx::PgPool;
use uuid::Uuid;

use crate::models::User;

pub struct NewUser<'a> {
    pub role_id: Uuid,
    pub lastname: &'a str,
    pub firstname: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub currency_code: &'a str,
    pub ip_address: &'a str,
    pub ip_region: &'a str,
    pub active_code: i32,
}

pub async fn create<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
    user: &NewUser<'_>,
) -> Result<User, sqlx::Error> {
    sqlx::query_as::<_, User>(
        "INSERT INTO users
            (role_id, lastname, firstname, email, password_hash,
             currency_code, ip_address, ip_region, is_active, active_code)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, false, $9) RETURNING *",
    )
    .bind(user.role_id)
    .bind(user.lastname)
    .bind(user.firstname)
    .bind(user.email)
    .bind(user.password_hash)
    .bind(user.currency_code)
    .bind(user.ip_address)
    .bind(user.ip_region)
    .bind(user.active_code)
    .fetch_one(executor)
    .await
}

pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE lower(email) = lower($1)")
        .bind(email)
        .fetch_optional(pool)
        .await
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn exists(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let row: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
        .bind(id)
        .fetch_one(pool)
        .await?;
    Ok(row.0)
}

pub async fn set_keycloak_id<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
    id: Uuid,
    keycloak_id: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET keycloak_id = $2, updated_at = now() WHERE id = $1")
        .bind(id)
        .bind(keycloak_id)
        .execute(executor)
        .await?;
    Ok(())
}

/// Activate the account if `code` matches. Returns whether a row changed.
pub async fn activate(pool: &PgPool, id: Uuid, code: i32) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE users SET is_active = true, updated_at = now()
         WHERE id = $1 AND active_code = $2 AND is_active = false",
    )
    .bind(id)
    .bind(code)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn update_active_code(pool: &PgPool, id: Uuid, code: i32) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET active_code = $2, updated_at = now() WHERE id = $1")
        .bind(id)
        .bind(code)
        .execute(pool)
        .await?;
    Ok(())
}
