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
use crate::models::Database;
use crate::providers::ProviderError;
use crate::routes::MessageResponse;
use crate::state::SharedState;
use crate::validation;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct DatabaseRequest {
    #[validate(
        length(min = 1, max = 64, message = "The name must be between 1 and 64 characters"),
        custom(function = "validation::resource_name")
    )]
    pub name: String,
}

fn refused(message: String) -> AppError {
    AppError::Upstream(ProviderError::rejected("cpanel", message))
}

/// Record management for MySQL databases. When a hosting panel is configured
/// writes are applied there first, then mirrored locally.
#[utoipa::path(
    post,
    path = "/databases",
    tag = "databases",
    request_body = DatabaseRequest,
    security(("bearer" = [])),
    responses(
        (status = 201, description = "Database record created", body = MessageResponse),
        (status = 400, description = "Validation failure")
    )
)]
pub async fn create(
    State(state): State<SharedState>,
    _auth: AuthUser,
    Json(req): Json<DatabaseRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), AppError> {
    req.validate()?;
    if let Some(hosting) = state.providers.hosting.as_ref() {
        if !hosting.create_database(&req.name).await? {
            return Err(refused(format!("could not create {}", req.name)));
        }
        if !hosting.link_user_to_database(&req.name).await? {
            return Err(refused(format!("could not grant privileges on {}", req.name)));
        }
    }
    let database = db::databases::create(&state.pool, &req.name).await?;
    tracing::info!(database_id = %database.id, name = %database.name, "Database record created");
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new("Database created successfully")),
    ))
}

#[utoipa::path(
    get,
    path = "/databases",
    tag = "databases",
    security(("bearer" = [])),
    responses((status = 200, description = "All database records", body = [Database]))
)]
pub async fn list(
    State(state): State<SharedState>,
    _auth: AuthUser,
) -> Result<Json<Vec<Database>>, AppError> {
    Ok(Json(db::databases::list(&state.pool).await?))
}

#[utoipa::path(
    get,
    path = "/databases/{id}",
    tag = "databases",
    params(("id" = Uuid, Path, description = "Database id")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Database record", body = Database),
        (status = 404, description = "Database not found")
    )
)]
pub async fn get(
    State(state): State<SharedState>,
    _auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Database>, AppError> {
    let database = db::databases::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Database not found".to_string()))?;
    Ok(Json(database))
}

#[utoipa::path(
    put,
    path = "/databases/{id}",
    tag = "databases",
    params(("id" = Uuid, Path, description = "Database id")),
    request_body = DatabaseRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Database renamed", body = MessageResponse),
        (status = 404, description = "Database not found")
    )
)]
pub async fn rename(
    State(state): State<SharedState>,
    _auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<DatabaseRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    req.validate()?;
    let current = db::databases::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Database not found".to_string()))?;
    if let Some(hosting) = state.providers.hosting.as_ref()
        && current.name != req.name
        && !hosting.rename_database(&current.name, &req.name).await?
    {
        return Err(refused(format!("could not rename {}", current.name)));
    }
    db::databases::rename(&state.pool, id, &req.name)
        .await?
        .ok_or_else(|| AppError::NotFound("Database not found".to_string()))?;
    Ok(Json(MessageResponse::new("Database updated successfully")))
}

#[utoipa::path(
    delete,
    path = "/databases/{id}",
    tag = "databases",
    params(("id" = Uuid, Path, description = "Database id")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Database deleted", body = MessageResponse),
        (status = 404, description = "Database not found"),
        (status = 409, description = "Database still used by a project")
    )
)]
pub async fn delete(
    State(state): State<SharedState>,
    _auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, AppError> {
    let current = db::databases::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Database not found".to_string()))?;
    if db::databases::is_referenced(&state.pool, id).await? {
        return Err(AppError::Conflict(
            "Database is used by a project".to_string(),
        ));
    }
    if let Some(hosting) = state.providers.hosting.as_ref()
        && !hosting.delete_database(&current.name).await?
    {
        return Err(refused(format!("could not delete {}", current.name)));
    }
    // A project may have been linked since the check above
    let deleted = db::databases::delete(&state.pool, id).await.map_err(|e| {
        if db::is_foreign_key_violation(&e) {
            AppError::Conflict("Database is used by a project".to_string())
        } else {
            AppError::Database(e)
        }
    })?;
    if !deleted {
        return Err(AppError::NotFound("Database not found".to_string()));
    }
    Ok(Json(MessageResponse::new("Database deleted successfully")))
}
