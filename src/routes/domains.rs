use axum::extract::State;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::auth::extractor::AuthUser;
use crate::error::AppError;
use crate::extract::{Json, Query};
use crate::routes::require_provider;
use crate::state::SharedState;
use crate::validation;

#[derive(Debug, Deserialize, Validate, IntoParams)]
pub struct DomainQuery {
    #[validate(custom(function = "validation::hostname"))]
    pub domain: String,
}

#[derive(Debug, Deserialize, Validate, IntoParams)]
pub struct SubdomainQuery {
    #[validate(custom(function = "validation::hostname"))]
    pub subdomain: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DomainAvailability {
    pub domain: String,
    pub is_available: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SubdomainAvailability {
    pub subdomain: String,
    pub is_available: bool,
}

#[utoipa::path(
    get,
    path = "/aws/domain/check",
    tag = "domains",
    params(DomainQuery),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Whether the domain can be registered", body = DomainAvailability),
        (status = 400, description = "Invalid domain name"),
        (status = 503, description = "DNS provider not configured")
    )
)]
pub async fn check_domain(
    State(state): State<SharedState>,
    _auth: AuthUser,
    Query(query): Query<DomainQuery>,
) -> Result<Json<DomainAvailability>, AppError> {
    query.validate()?;
    let dns = require_provider(&state.providers.dns, "DNS provider")?;

    let domain = query.domain.to_lowercase();
    let is_available = dns.check_domain_availability(&domain).await?;
    Ok(Json(DomainAvailability {
        domain,
        is_available,
    }))
}

#[utoipa::path(
    get,
    path = "/aws/subdomain/check",
    tag = "domains",
    params(SubdomainQuery),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Whether no record exists for the host", body = SubdomainAvailability),
        (status = 400, description = "Invalid host name"),
        (status = 502, description = "No hosted zone for the domain"),
        (status = 503, description = "DNS provider not configured")
    )
)]
pub async fn check_subdomain(
    State(state): State<SharedState>,
    _auth: AuthUser,
    Query(query): Query<SubdomainQuery>,
) -> Result<Json<SubdomainAvailability>, AppError> {
    query.validate()?;
    let dns = require_provider(&state.providers.dns, "DNS provider")?;

    let subdomain = query.subdomain.to_lowercase();
    let exists = dns.subdomain_exists(&subdomain).await?;
    Ok(Json(SubdomainAvailability {
        subdomain,
        is_available: !exists,
    }))
}
