use axum::extract::State;
use axum::http::StatusCode;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::auth::extractor::AuthUser;
use crate::db;
use crate::error::AppError;
use crate::extract::{Json, Path};
use crate::models::{Team, TeamMember};
use crate::routes::MessageResponse;
use crate::state::SharedState;

const DEFAULT_MEMBER_ROLE: &str = "member";

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateTeamRequest {
    #[validate(length(min = 1, max = 255, message = "The name field is required"))]
    pub name: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateTeamRequest {
    #[validate(length(min = 1, max = 255, message = "The name field is required"))]
    pub name: Option<String>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AddMemberRequest {
    pub user_id: Uuid,
    #[validate(length(min = 1, max = 50))]
    pub role: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateMemberRequest {
    #[validate(length(min = 1, max = 50))]
    pub role: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AttachProjectRequest {
    pub project_id: Uuid,
}

async fn find_team(state: &SharedState, id: Uuid) -> Result<Team, AppError> {
    db::teams::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Team not found".to_string()))
}

#[utoipa::path(
    get,
    path = "/teams",
    tag = "teams",
    security(("bearer" = [])),
    responses((status = 200, description = "All teams", body = [Team]))
)]
pub async fn list(
    State(state): State<SharedState>,
    _auth: AuthUser,
) -> Result<Json<Vec<Team>>, AppError> {
    Ok(Json(db::teams::list(&state.pool).await?))
}

#[utoipa::path(
    post,
    path = "/teams",
    tag = "teams",
    request_body = CreateTeamRequest,
    security(("bearer" = [])),
    responses(
        (status = 201, description = "Team created, owned by the caller", body = Team),
        (status = 400, description = "Validation failure")
    )
)]
pub async fn create(
    State(state): State<SharedState>,
    auth: AuthUser,
    Json(req): Json<CreateTeamRequest>,
) -> Result<(StatusCode, Json<Team>), AppError> {
    req.validate()?;
    let team = db::teams::create(
        &state.pool,
        req.name.trim(),
        req.description.as_deref(),
        auth.user_id,
    )
    .await?;
    tracing::info!(team_id = %team.id, owner = %auth.user_id, "Team created");
    Ok((StatusCode::CREATED, Json(team)))
}

#[utoipa::path(
    get,
    path = "/teams/{id}",
    tag = "teams",
    params(("id" = Uuid, Path, description = "Team id")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Team", body = Team),
        (status = 404, description = "Team not found")
    )
)]
pub async fn get(
    State(state): State<SharedState>,
    _auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Team>, AppError> {
    Ok(Json(find_team(&state, id).await?))
}

#[utoipa::path(
    put,
    path = "/teams/{id}",
    tag = "teams",
    params(("id" = Uuid, Path, description = "Team id")),
    request_body = UpdateTeamRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Updated team", body = Team),
        (status = 404, description = "Team not found")
    )
)]
pub async fn update(
    State(state): State<SharedState>,
    _auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateTeamRequest>,
) -> Result<Json<Team>, AppError> {
    req.validate()?;
    let team = db::teams::update(
        &state.pool,
        id,
        req.name.as_deref().map(str::trim),
        req.description.as_deref(),
    )
    .await?
    .ok_or_else(|| AppError::NotFound("Team not found".to_string()))?;
    Ok(Json(team))
}

#[utoipa::path(
    delete,
    path = "/teams/{id}",
    tag = "teams",
    params(("id" = Uuid, Path, description = "Team id")),
    security(("bearer" = [])),
    responses(
        (status = 204, description = "Team deleted"),
        (status = 404, description = "Team not found")
    )
)]
pub async fn delete(
    State(state): State<SharedState>,
    _auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if !db::teams::delete(&state.pool, id).await? {
        return Err(AppError::NotFound("Team not found".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/teams/{id}/users",
    tag = "teams",
    params(("id" = Uuid, Path, description = "Team id")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Members with their team role", body = [TeamMember]),
        (status = 404, description = "Team not found")
    )
)]
pub async fn list_members(
    State(state): State<SharedState>,
    _auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<TeamMember>>, AppError> {
    find_team(&state, id).await?;
    Ok(Json(db::teams::list_members(&state.pool, id).await?))
}

#[utoipa::path(
    post,
    path = "/teams/{id}/users",
    tag = "teams",
    params(("id" = Uuid, Path, description = "Team id")),
    request_body = AddMemberRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "User attached", body = MessageResponse),
        (status = 404, description = "Team or user not found")
    )
)]
pub async fn add_member(
    State(state): State<SharedState>,
    _auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<AddMemberRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    req.validate()?;
    find_team(&state, id).await?;
    if !db::users::exists(&state.pool, req.user_id).await? {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    let role = req.role.as_deref().unwrap_or(DEFAULT_MEMBER_ROLE);
    db::teams::upsert_member(&state.pool, id, req.user_id, role).await?;
    Ok(Json(MessageResponse::new("User added to team")))
}

#[utoipa::path(
    put,
    path = "/teams/{id}/users/{user_id}",
    tag = "teams",
    params(
        ("id" = Uuid, Path, description = "Team id"),
        ("user_id" = Uuid, Path, description = "Member id")
    ),
    request_body = UpdateMemberRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Role updated", body = MessageResponse),
        (status = 404, description = "Membership not found")
    )
)]
pub async fn update_member(
    State(state): State<SharedState>,
    _auth: AuthUser,
    Path((id, user_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<UpdateMemberRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    req.validate()?;
    if !db::teams::update_member_role(&state.pool, id, user_id, &req.role).await? {
        return Err(AppError::NotFound("Team member not found".to_string()));
    }
    Ok(Json(MessageResponse::new("Member role updated")))
}

#[utoipa::path(
    delete,
    path = "/teams/{id}/users/{user_id}",
    tag = "teams",
    params(
        ("id" = Uuid, Path, description = "Team id"),
        ("user_id" = Uuid, Path, description = "Member id")
    ),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "User detached", body = MessageResponse),
        (status = 404, description = "Membership not found")
    )
)]
pub async fn remove_member(
    State(state): State<SharedState>,
    _auth: AuthUser,
    Path((id, user_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<MessageResponse>, AppError> {
    if !db::teams::remove_member(&state.pool, id, user_id).await? {
        return Err(AppError::NotFound("Team member not found".to_string()));
    }
    Ok(Json(MessageResponse::new("User removed from team")))
}

#[utoipa::path(
    post,
    path = "/teams/{id}/projects",
    tag = "teams",
    params(("id" = Uuid, Path, description = "Team id")),
    request_body = AttachProjectRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Project attached", body = MessageResponse),
        (status = 404, description = "Team or project not found")
    )
)]
pub async fn attach_project(
    State(state): State<SharedState>,
    _auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<AttachProjectRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    find_team(&state, id).await?;
    if !db::projects::exists(&state.pool, req.project_id).await? {
        return Err(AppError::NotFound("Project not found".to_string()));
    }
    db::teams::attach_project(&state.pool, id, req.project_id).await?;
    Ok(Json(MessageResponse::new("Project added to team")))
}

#[utoipa::path(
    delete,
    path = "/teams/{id}/projects/{project_id}",
    tag = "teams",
    params(
        ("id" = Uuid, Path, description = "Team id"),
        ("project_id" = Uuid, Path, description = "Project id")
    ),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Project detached", body = MessageResponse),
        (status = 404, description = "Project not attached to this team")
    )
)]
pub async fn detach_project(
    State(state): State<SharedState>,
    _auth: AuthUser,
    Path((id, project_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<MessageResponse>, AppError> {
    if !db::teams::detach_project(&state.pool, id, project_id).await? {
        return Err(AppError::NotFound(
            "Project is not attached to this team".to_string(),
        ));
    }
    Ok(Json(MessageResponse::new("Project removed from team")))
}
