use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use subtle::ConstantTimeEq;
use utoipa::ToSchema;

use crate::error::AppError;
use crate::state::SharedState;

pub const MONITORING_SECRET_HEADER: &str = "x-monitoring-secret";

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthCheck {
    pub name: String,
    pub status: String,
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthReport {
    pub is_healthy: bool,
    pub status: String,
    pub finished_at: DateTime<Utc>,
    pub version: String,
    pub checks: Vec<HealthCheck>,
}

pub async fn hello() -> Json<serde_json::Value> {
    Json(json!({ "hello": "world" }))
}

fn provider_check(name: &str, configured: bool) -> HealthCheck {
    HealthCheck {
        name: name.to_string(),
        status: if configured { "ok" } else { "warning" }.to_string(),
        message: if configured {
            "Configured".to_string()
        } else {
            "Not configured".to_string()
        },
    }
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    params(("x-monitoring-secret" = Option<String>, Header, description = "Required when a monitoring secret is configured")),
    responses(
        (status = 200, description = "Healthy", body = HealthReport),
        (status = 401, description = "Missing or wrong monitoring secret"),
        (status = 503, description = "Unhealthy", body = HealthReport)
    )
)]
pub async fn health(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<(StatusCode, Json<HealthReport>), AppError> {
    if let Some(secret) = state.config.health_secret.as_deref() {
        let provided = headers
            .get(MONITORING_SECRET_HEADER)
            .map(|v| v.as_bytes())
            .unwrap_or_default();
        if !bool::from(provided.ct_eq(secret.as_bytes())) {
            return Err(AppError::Unauthorized(
                "Invalid monitoring secret".to_string(),
            ));
        }
    }

    let database = match sqlx::query("SELECT 1").execute(&state.pool).await {
        Ok(_) => HealthCheck {
            name: "database".to_string(),
            status: "ok".to_string(),
            message: "Connected successfully".to_string(),
        },
        Err(e) => {
            tracing::error!("Health check database query failed: {e}");
            HealthCheck {
                name: "database".to_string(),
                status: "error".to_string(),
                message: "Database unreachable".to_string(),
            }
        }
    };

    let providers = &state.providers;
    let checks = vec![
        database,
        provider_check("dns", providers.dns.is_some()),
        provider_check("source_host", providers.source.is_some()),
        provider_check("hosting_panel", providers.hosting.is_some()),
        provider_check("identity", providers.identity.is_some()),
        provider_check("mailer", providers.mailer.is_some()),
    ];

    let is_healthy = checks.iter().all(|c| c.status != "error");
    let report = HealthReport {
        is_healthy,
        status: if is_healthy { "ok" } else { "error" }.to_string(),
        finished_at: Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks,
    };

    let status = if is_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    Ok((status, Json(report)))
}
