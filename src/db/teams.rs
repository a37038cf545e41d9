use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{Team, TeamMember};

pub async fn list(pool: &PgPool) -> Result<Vec<Team>, sqlx::Error> {
    sqlx::query_as::<_, Team>("SELECT * FROM teams ORDER BY created_at DESC")
        .fetch_all(pool)
        .await
}

pub async fn create(
    pool: &PgPool,
    name: &str,
    description: Option<&str>,
    owner_id: Uuid,
) -> Result<Team, sqlx::Error> {
    sqlx::query_as::<_, Team>(
        "INSERT INTO teams (name, description, owner_id) VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(name)
    .bind(description)
    .bind(owner_id)
    .fetch_one(pool)
    .await
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Team>, sqlx::Error> {
    sqlx::query_as::<_, Team>("SELECT * FROM teams WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn update(
    pool: &PgPool,
    id: Uuid,
    name: Option<&str>,
    description: Option<&str>,
) -> Result<Option<Team>, sqlx::Error> {
    sqlx::query_as::<_, Team>(
        "UPDATE teams SET
            name = COALESCE($2, name),
            description = COALESCE($3, description),
            updated_at = now()
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(name)
    .bind(description)
    .fetch_optional(pool)
    .await
}

pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM teams WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn list_members(pool: &PgPool, team_id: Uuid) -> Result<Vec<TeamMember>, sqlx::Error> {
    sqlx::query_as::<_, TeamMember>(
        "SELECT ut.user_id, ut.team_id, ut.role, u.email, u.firstname, u.lastname
         FROM user_teams ut
         JOIN users u ON u.id = ut.user_id
         WHERE ut.team_id = $1
         ORDER BY u.email",
    )
    .bind(team_id)
    .fetch_all(pool)
    .await
}

/// Insert or update the membership's role.
pub async fn upsert_member(
    pool: &PgPool,
    team_id: Uuid,
    user_id: Uuid,
    role: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO user_teams (user_id, team_id, role) VALUES ($1, $2, $3)
         ON CONFLICT (user_id, team_id) DO UPDATE SET role = EXCLUDED.role",
    )
    .bind(user_id)
    .bind(team_id)
    .bind(role)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn update_member_role(
    pool: &PgPool,
    team_id: Uuid,
    user_id: Uuid,
    role: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE user_teams SET role = $3 WHERE team_id = $1 AND user_id = $2")
        .bind(team_id)
        .bind(user_id)
        .bind(role)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn remove_member(pool: &PgPool, team_id: Uuid, user_id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM user_teams WHERE team_id = $1 AND user_id = $2")
        .bind(team_id)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn attach_project(pool: &PgPool, team_id: Uuid, project_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO team_projects (team_id, project_id) VALUES ($1, $2)
         ON CONFLICT DO NOTHING",
    )
    .bind(team_id)
    .bind(project_id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn detach_project(pool: &PgPool, team_id: Uuid, project_id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM team_projects WHERE team_id = $1 AND project_id = $2")
        .bind(team_id)
        .bind(project_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() == 1)
}
