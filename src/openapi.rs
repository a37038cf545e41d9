use axum::Json;
use axum::response::Html;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::routes::{auth, client, databases, domains, health, hosting, projects, teams};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Flapi API",
        description = "Application provisioning backend"
    ),
    paths(
        health::health,
        auth::sign_up,
        auth::sign_in,
        auth::sign_out,
        auth::refresh,
        auth::verify_code,
        auth::resend_code,
        auth::list_roles,
        projects::create,
        projects::list,
        projects::get,
        projects::list_by_user,
        projects::update,
        projects::delete,
        teams::list,
        teams::create,
        teams::get,
        teams::update,
        teams::delete,
        teams::list_members,
        teams::add_member,
        teams::update_member,
        teams::remove_member,
        teams::attach_project,
        teams::detach_project,
        databases::create,
        databases::list,
        databases::get,
        databases::rename,
        databases::delete,
        domains::check_domain,
        domains::check_subdomain,
        hosting::list_databases,
        hosting::server_information,
        hosting::check_database,
        hosting::repair_database,
        hosting::restore,
        hosting::remote_hosts,
        hosting::add_remote_host,
        client::create_application,
    ),
    components(schemas(
        crate::routes::MessageResponse,
        crate::models::Project,
        crate::models::ProjectDetail,
        crate::models::Team,
        crate::models::TeamMember,
        crate::models::Database,
        crate::models::UserRole,
    )),
    modifiers(&BearerAuth),
    tags(
        (name = "health", description = "Liveness and dependency checks"),
        (name = "auth", description = "Accounts and sessions"),
        (name = "projects", description = "Customer projects"),
        (name = "teams", description = "Teams and memberships"),
        (name = "databases", description = "MySQL database records"),
        (name = "domains", description = "Domain and subdomain availability"),
        (name = "hosting", description = "Hosting panel maintenance"),
        (name = "client", description = "Application provisioning")
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi
            .components
            .get_or_insert_with(utoipa::openapi::Components::new);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

const SWAGGER_UI: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>Flapi API</title>
  <link rel="stylesheet" href="https://unpkg.com/swagger-ui-dist@5/swagger-ui.css">
</head>
<body>
  <div id="swagger-ui"></div>
  <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-bundle.js" crossorigin></script>
  <script>
    window.onload = () => {
      window.ui = SwaggerUIBundle({ url: "/swagger", dom_id: "#swagger-ui" });
    };
  </script>
</body>
</html>
"##;

pub async fn docs() -> Html<&'static str> {
    Html(SWAGGER_UI)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_routes_and_bearer_scheme() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/client/app/create"));
        assert!(doc.paths.paths.contains_key("/project/{id}"));
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer"));
    }

    #[test]
    fn docs_page_mounts_swagger_ui_on_the_json_document() {
        assert!(SWAGGER_UI.starts_with("<!DOCTYPE html>"));
        assert!(SWAGGER_UI.contains(r##"dom_id: "#swagger-ui""##));
        assert!(SWAGGER_UI.contains(r#"url: "/swagger""#));
        assert!(SWAGGER_UI.trim_end().ends_with("</html>"));
    }
}
