use axum::extract::State;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::auth::extractor::AuthUser;
use crate::db;
use crate::db::projects::ProjectChanges;
use crate::error::AppError;
use crate::extract::{Json, Path};
use crate::models::project::FileWithBucket;
use crate::models::{Project, ProjectDetail};
use crate::routes::MessageResponse;
use crate::state::SharedState;
use crate::validation;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateProjectRequest {
    #[validate(length(min = 3, max = 255, message = "The application name must be between 3 and 255 characters"))]
    pub application_name: String,
    pub user_id: Uuid,
    #[validate(custom(function = "validation::hostname"))]
    pub domain_name: String,
    pub file_id: Option<Uuid>,
    pub database_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateProjectRequest {
    #[validate(length(min = 3, max = 255, message = "The application name must be between 3 and 255 characters"))]
    pub application_name: Option<String>,
    pub user_id: Option<Uuid>,
    #[validate(custom(function = "validation::hostname"))]
    pub domain_name: Option<String>,
    pub file_id: Option<Uuid>,
    pub database_id: Option<Uuid>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreatedResponse {
    pub message: String,
    pub id: Uuid,
}

/// Check that every referenced row exists.
async fn check_references(
    state: &SharedState,
    user_id: Option<Uuid>,
    file_id: Option<Uuid>,
    database_id: Option<Uuid>,
) -> Result<(), AppError> {
    if let Some(user_id) = user_id
        && !db::users::exists(&state.pool, user_id).await?
    {
        return Err(AppError::field("user_id", "exists", "The selected user does not exist"));
    }
    if let Some(file_id) = file_id
        && db::files::find_by_id(&state.pool, file_id).await?.is_none()
    {
        return Err(AppError::field("file_id", "exists", "The selected file does not exist"));
    }
    if let Some(database_id) = database_id
        && db::databases::find_by_id(&state.pool, database_id).await?.is_none()
    {
        return Err(AppError::field(
            "database_id",
            "exists",
            "The selected database does not exist",
        ));
    }
    Ok(())
}

#[utoipa::path(
    post,
    path = "/project",
    tag = "projects",
    request_body = CreateProjectRequest,
    security(("bearer" = [])),
    responses(
        (status = 201, description = "Project created", body = CreatedResponse),
        (status = 400, description = "Validation failure")
    )
)]
pub async fn create(
    State(state): State<SharedState>,
    _auth: AuthUser,
    Json(mut req): Json<CreateProjectRequest>,
) -> Result<(StatusCode, Json<CreatedResponse>), AppError> {
    req.application_name = req.application_name.trim().to_string();
    req.domain_name = req.domain_name.trim().to_lowercase();
    req.validate()?;
    check_references(&state, Some(req.user_id), req.file_id, req.database_id).await?;

    let project = db::projects::create(
        &state.pool,
        &req.application_name,
        req.user_id,
        &req.domain_name,
        req.file_id,
        req.database_id,
    )
    .await?;

    tracing::info!(project_id = %project.id, "Project created");
    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse {
            message: "Project created successfully".to_string(),
            id: project.id,
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/projects",
    tag = "projects",
    security(("bearer" = [])),
    responses((status = 200, description = "All projects", body = [Project]))
)]
pub async fn list(
    State(state): State<SharedState>,
    _auth: AuthUser,
) -> Result<Json<Vec<Project>>, AppError> {
    Ok(Json(db::projects::list(&state.pool).await?))
}

#[utoipa::path(
    get,
    path = "/project/{id}",
    tag = "projects",
    params(("id" = Uuid, Path, description = "Project id")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Project with its relations", body = ProjectDetail),
        (status = 404, description = "Project not found")
    )
)]
pub async fn get(
    State(state): State<SharedState>,
    _auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ProjectDetail>, AppError> {
    let project = db::projects::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Project not found".to_string()))?;

    let database = match project.database_id {
        Some(database_id) => db::databases::find_by_id(&state.pool, database_id).await?,
        None => None,
    };

    let file = match project.file_id {
        Some(file_id) => match db::files::find_by_id(&state.pool, file_id).await? {
            Some(file) => {
                let bucket = db::files::find_bucket(&state.pool, file.bucket_id).await?;
                Some(FileWithBucket { file, bucket })
            }
            None => None,
        },
        None => None,
    };

    Ok(Json(ProjectDetail {
        project,
        database,
        file,
    }))
}

#[utoipa::path(
    get,
    path = "/project/user/{user_id}",
    tag = "projects",
    params(("user_id" = Uuid, Path, description = "Owner id")),
    security(("bearer" = [])),
    responses((status = 200, description = "Projects of the user", body = [Project]))
)]
pub async fn list_by_user(
    State(state): State<SharedState>,
    _auth: AuthUser,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Vec<Project>>, AppError> {
    Ok(Json(db::projects::list_by_user(&state.pool, user_id).await?))
}

#[utoipa::path(
    put,
    path = "/project/{id}",
    tag = "projects",
    params(("id" = Uuid, Path, description = "Project id")),
    request_body = UpdateProjectRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Updated project", body = Project),
        (status = 400, description = "Validation failure"),
        (status = 404, description = "Project not found")
    )
)]
pub async fn update(
    State(state): State<SharedState>,
    _auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(mut req): Json<UpdateProjectRequest>,
) -> Result<Json<Project>, AppError> {
    req.application_name = req.application_name.map(|n| n.trim().to_string());
    req.domain_name = req.domain_name.map(|d| d.trim().to_lowercase());
    req.validate()?;
    check_references(&state, req.user_id, req.file_id, req.database_id).await?;

    let changes = ProjectChanges {
        application_name: req.application_name.as_deref(),
        user_id: req.user_id,
        domain_name: req.domain_name.as_deref(),
        file_id: req.file_id,
        database_id: req.database_id,
    };

    let project = db::projects::update(&state.pool, id, &changes)
        .await?
        .ok_or_else(|| AppError::NotFound("Project not found".to_string()))?;

    Ok(Json(project))
}

#[utoipa::path(
    delete,
    path = "/project/{id}",
    tag = "projects",
    params(("id" = Uuid, Path, description = "Project id")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Project deleted", body = MessageResponse),
        (status = 404, description = "Project not found")
    )
)]
pub async fn delete(
    State(state): State<SharedState>,
    _auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, AppError> {
    if !db::projects::delete(&state.pool, id).await? {
        return Err(AppError::NotFound("Project not found".to_string()));
    }
    tracing::info!(project_id = %id, "Project deleted");
    Ok(Json(MessageResponse::new("Project deleted successfully")))
}
