use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::auth::extractor::AuthUser;
use crate::error::AppError;
use crate::extract::Json;
use crate::provisioning::{NewApplication, ProvisionedApplication, Provisioner};
use crate::routes::require_provider;
use crate::state::SharedState;

#[derive(Debug, Serialize, ToSchema)]
pub struct ApplicationCreated {
    pub success: bool,
    pub message: String,
    pub application: ProvisionedApplication,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProvisioningFailure {
    pub success: bool,
    pub message: String,
    pub error: String,
    pub completed_steps: Vec<String>,
}

#[utoipa::path(
    post,
    path = "/client/app/create",
    tag = "client",
    request_body = NewApplication,
    security(("bearer" = [])),
    responses(
        (status = 201, description = "Application provisioned", body = ApplicationCreated),
        (status = 400, description = "Validation failure"),
        (status = 409, description = "One of the stage hosts already exists", body = ProvisioningFailure),
        (status = 500, description = "A provisioning step failed", body = ProvisioningFailure),
        (status = 503, description = "A required provider is not configured")
    )
)]
pub async fn create_application(
    State(state): State<SharedState>,
    auth: AuthUser,
    Json(req): Json<NewApplication>,
) -> Result<Response, AppError> {
    req.validate()?;

    let dns = require_provider(&state.providers.dns, "DNS provider")?;
    let source = require_provider(&state.providers.source, "Source host")?;
    let hosting = require_provider(&state.providers.hosting, "Hosting panel")?;
    let cluster_address = state
        .config
        .aws
        .as_ref()
        .map(|aws| aws.cluster_address.clone())
        .ok_or_else(|| {
            AppError::ServiceUnavailable("Cluster address is not configured".to_string())
        })?;

    let provisioner = Provisioner {
        pool: state.pool.clone(),
        dns: dns.clone(),
        source: source.clone(),
        hosting: hosting.clone(),
        mailer: state.providers.mailer.clone(),
        cluster_address,
        repo_ready_delay: state.config.repo_ready_delay,
    };

    tracing::info!(user_id = %auth.user_id, role = %auth.role, "Application provisioning requested");
    let response = match provisioner.run(auth.user_id, &req).await {
        Ok(application) => (
            StatusCode::CREATED,
            Json(ApplicationCreated {
                success: true,
                message: "Application created successfully".to_string(),
                application,
            }),
        )
            .into_response(),
        Err(e) => e.into_response(),
    };
    Ok(response)
}
