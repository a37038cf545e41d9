pub mod auth;
pub mod client;
pub mod databases;
pub mod domains;
pub mod health;
pub mod hosting;
pub mod projects;
pub mod teams;

use axum::Router;
use axum::routing::{get, post, put};
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::AppError;
use crate::state::SharedState;

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Unwrap an optional provider, answering 503 when it is not configured.
pub fn require_provider<'a, T: ?Sized>(
    provider: &'a Option<std::sync::Arc<T>>,
    name: &str,
) -> Result<&'a std::sync::Arc<T>, AppError> {
    provider
        .as_ref()
        .ok_or_else(|| AppError::ServiceUnavailable(format!("{name} is not configured")))
}

pub fn api_routes() -> Router<SharedState> {
    Router::new()
        // Public
        .route("/", get(health::hello))
        .route("/health", get(health::health))
        // Auth
        .route("/signup", post(auth::sign_up))
        .route("/signIn", post(auth::sign_in))
        .route("/signOut", post(auth::sign_out))
        .route("/auth/refresh", post(auth::refresh))
        .route("/verify-code", post(auth::verify_code))
        .route("/resend-code", post(auth::resend_code))
        .route("/roles", get(auth::list_roles))
        // Projects
        .route("/project", post(projects::create))
        .route("/projects", get(projects::list))
        .route(
            "/project/{id}",
            get(projects::get)
                .put(projects::update)
                .delete(projects::delete),
        )
        .route("/project/user/{user_id}", get(projects::list_by_user))
        // Teams
        .route("/teams", get(teams::list).post(teams::create))
        .route(
            "/teams/{id}",
            get(teams::get).put(teams::update).delete(teams::delete),
        )
        .route(
            "/teams/{id}/users",
            get(teams::list_members).post(teams::add_member),
        )
        .route(
            "/teams/{id}/users/{user_id}",
            put(teams::update_member).delete(teams::remove_member),
        )
        .route("/teams/{id}/projects", post(teams::attach_project))
        .route(
            "/teams/{id}/projects/{project_id}",
            axum::routing::delete(teams::detach_project),
        )
        // Databases
        .route("/databases", get(databases::list).post(databases::create))
        .route(
            "/databases/{id}",
            get(databases::get)
                .put(databases::rename)
                .delete(databases::delete),
        )
        // Domains
        .route("/aws/domain/check", get(domains::check_domain))
        .route("/aws/subdomain/check", get(domains::check_subdomain))
        // Hosting panel
        .route("/hosting/databases", get(hosting::list_databases))
        .route("/hosting/server", get(hosting::server_information))
        .route("/hosting/databases/{name}/check", post(hosting::check_database))
        .route("/hosting/databases/{name}/repair", post(hosting::repair_database))
        .route("/hosting/restore", post(hosting::restore))
        .route(
            "/hosting/remote-hosts",
            get(hosting::remote_hosts).post(hosting::add_remote_host),
        )
        // Provisioning
        .route("/client/app/create", post(client::create_application))
}
