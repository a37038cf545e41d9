//! Maintenance operations on the shared MySQL host.

use std::collections::HashMap;

use axum::extract::State;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::auth::extractor::AuthUser;
use crate::error::AppError;
use crate::extract::{Json, Path};
use crate::providers::{MySqlDatabase, MySqlServer};
use crate::routes::{MessageResponse, require_provider};
use crate::state::SharedState;
use crate::validation;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RestoreRequest {
    #[validate(
        length(min = 1, max = 255),
        custom(function = "validation::resource_name")
    )]
    pub backup_file: String,
    /// Seconds; 0 means no limit.
    #[serde(default)]
    pub timeout: u32,
    #[serde(default)]
    pub verbose: bool,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RemoteHostRequest {
    #[validate(length(min = 1, max = 255))]
    pub host: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OperationResult {
    pub success: bool,
    pub message: String,
}

fn outcome(ok: bool, success: &str, failure: &str) -> Json<OperationResult> {
    Json(OperationResult {
        success: ok,
        message: if ok { success } else { failure }.to_string(),
    })
}

fn checked_name(name: &str) -> Result<&str, AppError> {
    validation::resource_name(name)
        .map(|_| name)
        .map_err(|_| AppError::BadRequest("Invalid database name".to_string()))
}

#[utoipa::path(
    get,
    path = "/hosting/databases",
    tag = "hosting",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "MySQL databases on the hosting account", body = [MySqlDatabase]),
        (status = 503, description = "Hosting panel not configured")
    )
)]
pub async fn list_databases(
    State(state): State<SharedState>,
    _auth: AuthUser,
) -> Result<Json<Vec<MySqlDatabase>>, AppError> {
    let hosting = require_provider(&state.providers.hosting, "Hosting panel")?;
    Ok(Json(hosting.list_databases().await?))
}

#[utoipa::path(
    get,
    path = "/hosting/server",
    tag = "hosting",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "MySQL server host and version", body = MySqlServer),
        (status = 502, description = "Server information unavailable")
    )
)]
pub async fn server_information(
    State(state): State<SharedState>,
    _auth: AuthUser,
) -> Result<Json<MySqlServer>, AppError> {
    let hosting = require_provider(&state.providers.hosting, "Hosting panel")?;
    let info = hosting.server_information().await?.ok_or_else(|| {
        AppError::Upstream(crate::providers::ProviderError::rejected(
            "cpanel",
            "server information unavailable",
        ))
    })?;
    Ok(Json(info))
}

#[utoipa::path(
    post,
    path = "/hosting/databases/{name}/check",
    tag = "hosting",
    params(("name" = String, Path, description = "Database name without the account prefix")),
    security(("bearer" = [])),
    responses((status = 200, description = "Integrity check result", body = OperationResult))
)]
pub async fn check_database(
    State(state): State<SharedState>,
    _auth: AuthUser,
    Path(name): Path<String>,
) -> Result<Json<OperationResult>, AppError> {
    let hosting = require_provider(&state.providers.hosting, "Hosting panel")?;
    let ok = hosting.check_database(checked_name(&name)?).await?;
    Ok(outcome(
        ok,
        "Database integrity is valid",
        "Database integrity check failed",
    ))
}

#[utoipa::path(
    post,
    path = "/hosting/databases/{name}/repair",
    tag = "hosting",
    params(("name" = String, Path, description = "Database name without the account prefix")),
    security(("bearer" = [])),
    responses((status = 200, description = "Repair result", body = OperationResult))
)]
pub async fn repair_database(
    State(state): State<SharedState>,
    _auth: AuthUser,
    Path(name): Path<String>,
) -> Result<Json<OperationResult>, AppError> {
    let hosting = require_provider(&state.providers.hosting, "Hosting panel")?;
    let ok = hosting.repair_database(checked_name(&name)?).await?;
    Ok(outcome(ok, "Database tables repaired", "Database repair failed"))
}

#[utoipa::path(
    post,
    path = "/hosting/restore",
    tag = "hosting",
    request_body = RestoreRequest,
    security(("bearer" = [])),
    responses((status = 200, description = "Restore result", body = OperationResult))
)]
pub async fn restore(
    State(state): State<SharedState>,
    _auth: AuthUser,
    Json(req): Json<RestoreRequest>,
) -> Result<Json<OperationResult>, AppError> {
    req.validate()?;
    let hosting = require_provider(&state.providers.hosting, "Hosting panel")?;
    let ok = hosting
        .restore_databases(&req.backup_file, req.timeout, req.verbose)
        .await?;
    Ok(outcome(ok, "Database restored", "Database restore failed"))
}

#[utoipa::path(
    get,
    path = "/hosting/remote-hosts",
    tag = "hosting",
    security(("bearer" = [])),
    responses((status = 200, description = "Authorized remote hosts and their notes", body = HashMap<String, String>))
)]
pub async fn remote_hosts(
    State(state): State<SharedState>,
    _auth: AuthUser,
) -> Result<Json<HashMap<String, String>>, AppError> {
    let hosting = require_provider(&state.providers.hosting, "Hosting panel")?;
    let hosts = hosting.remote_hosts().await?.ok_or_else(|| {
        AppError::Upstream(crate::providers::ProviderError::rejected(
            "cpanel",
            "remote hosts unavailable",
        ))
    })?;
    Ok(Json(hosts))
}

#[utoipa::path(
    post,
    path = "/hosting/remote-hosts",
    tag = "hosting",
    request_body = RemoteHostRequest,
    security(("bearer" = [])),
    responses((status = 200, description = "Authorization result", body = MessageResponse))
)]
pub async fn add_remote_host(
    State(state): State<SharedState>,
    _auth: AuthUser,
    Json(req): Json<RemoteHostRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    req.validate()?;
    let hosting = require_provider(&state.providers.hosting, "Hosting panel")?;
    if !hosting.add_remote_host(req.host.trim()).await? {
        return Err(AppError::Upstream(crate::providers::ProviderError::rejected(
            "cpanel",
            format!("could not authorize {}", req.host.trim()),
        )));
    }
    Ok(Json(MessageResponse::new("Remote host authorized")))
}
