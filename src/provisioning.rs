//! Application provisioning: DNS records, MySQL databases, a repository
//! generated from a template and a first CI run, one step after the other.
//!
//! Nothing is rolled back. When a step fails the error lists every step
//! that already completed so the leftovers can be cleaned up by hand.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::PgPool;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::db;
use crate::email::Mailer;
use crate::models::Project;
use crate::providers::route53::extract_subdomain;
use crate::providers::{DnsProvider, HostingPanel, RepoOptions, SourceHost};
use crate::validation;

/// Branches locked down when protection is requested.
pub const PROTECTED_BRANCHES: [&str; 3] = ["main", "staging", "develop"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Dev,
    Staging,
    Prod,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Dev, Stage::Staging, Stage::Prod];

    pub fn label(self) -> &'static str {
        match self {
            Stage::Dev => "dev",
            Stage::Staging => "staging",
            Stage::Prod => "prod",
        }
    }

    /// `dev.<subdomain>`, `staging.<subdomain>`, and the bare subdomain for prod.
    pub fn host(self, subdomain: &str) -> String {
        match self {
            Stage::Prod => subdomain.to_string(),
            other => format!("{}.{subdomain}", other.label()),
        }
    }
}

/// `My Shop!` -> `my_shop`. Used as the stem of every database name.
pub fn database_stem(project_name: &str) -> String {
    let mut stem = String::with_capacity(project_name.len());
    for c in project_name.trim().chars() {
        if c.is_ascii_alphanumeric() {
            stem.push(c.to_ascii_lowercase());
        } else if !stem.ends_with('_') {
            stem.push('_');
        }
    }
    stem.trim_matches('_').to_string()
}

/// Unprefixed database name for one stage, e.g. `shop_staging`.
pub fn database_name(project_name: &str, stage: Stage) -> String {
    format!("{}_{}", database_stem(project_name), stage.label())
}

fn default_true() -> bool {
    true
}

fn default_branch() -> String {
    "main".to_string()
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct NewApplication {
    #[validate(length(min = 1, max = 255, message = "The customer_name field is required"))]
    pub customer_name: String,
    #[validate(
        length(min = 3, max = 40, message = "The project name must be between 3 and 40 characters"),
        custom(function = "validation::project_name")
    )]
    pub project_name: String,
    /// Fully qualified production host, e.g. `shop.flapi.org`.
    #[validate(custom(function = "validation::hostname"))]
    pub subdomain: String,
    #[validate(custom(function = "validation::resource_name"))]
    pub template_repo: String,
    /// Defaults to the first label of `subdomain`.
    #[validate(custom(function = "validation::resource_name"))]
    pub repo_name: Option<String>,
    pub repo_description: Option<String>,
    #[serde(default = "default_true")]
    pub private_repo: bool,
    /// Workflow file name or id, e.g. `deploy.yml`.
    #[validate(custom(function = "validation::resource_name"))]
    pub workflow_name: String,
    #[serde(default = "default_branch")]
    #[validate(length(min = 1, max = 255))]
    pub workflow_branch: String,
    #[serde(default)]
    pub workflow_inputs: BTreeMap<String, String>,
    #[serde(default)]
    pub protect_branches: bool,
}

impl NewApplication {
    pub fn repository_name(&self) -> String {
        self.repo_name
            .clone()
            .unwrap_or_else(|| extract_subdomain(&self.subdomain))
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProvisionedApplication {
    pub project: Project,
    pub repository: String,
    pub workflow: String,
    pub hosts: Vec<String>,
    pub databases: Vec<String>,
}

#[derive(Debug)]
pub enum ProvisionError {
    /// One or more stage hosts already have DNS records. Nothing was created.
    HostsTaken(Vec<String>),
    Failed {
        message: String,
        error: String,
        completed_steps: Vec<String>,
    },
}

impl IntoResponse for ProvisionError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ProvisionError::HostsTaken(hosts) => (
                StatusCode::CONFLICT,
                json!({
                    "success": false,
                    "message": "Subdomain is not available",
                    "error": format!("Records already exist for: {}", hosts.join(", ")),
                    "completed_steps": Vec::<String>::new(),
                }),
            ),
            ProvisionError::Failed {
                message,
                error,
                completed_steps,
            } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({
                    "success": false,
                    "message": message,
                    "error": error,
                    "completed_steps": completed_steps,
                }),
            ),
        };
        (status, Json(body)).into_response()
    }
}

/// Everything the pipeline talks to.
pub struct Provisioner {
    pub pool: PgPool,
    pub dns: Arc<dyn DnsProvider>,
    pub source: Arc<dyn SourceHost>,
    pub hosting: Arc<dyn HostingPanel>,
    pub mailer: Option<Arc<dyn Mailer>>,
    /// Address every A record points at.
    pub cluster_address: String,
    pub repo_ready_delay: Duration,
}

/// Collects completed steps and turns failures into [`ProvisionError::Failed`].
struct Progress {
    completed: Vec<String>,
}

impl Progress {
    fn done(&mut self, step: String) {
        tracing::info!(step = %step, "Provisioning step completed");
        self.completed.push(step);
    }

    fn fail(&mut self, message: &str, error: impl std::fmt::Display) -> ProvisionError {
        let error = error.to_string();
        tracing::error!(
            completed = ?self.completed,
            "Provisioning failed: {message}: {error}"
        );
        ProvisionError::Failed {
            message: message.to_string(),
            error,
            completed_steps: std::mem::take(&mut self.completed),
        }
    }
}

impl Provisioner {
    pub async fn run(
        &self,
        user_id: Uuid,
        app: &NewApplication,
    ) -> Result<ProvisionedApplication, ProvisionError> {
        let subdomain = app.subdomain.to_lowercase();
        let repository = app.repository_name();
        let hosts: Vec<String> = Stage::ALL.iter().map(|s| s.host(&subdomain)).collect();
        let mut progress = Progress {
            completed: Vec::new(),
        };

        tracing::info!(
            customer = %app.customer_name,
            project = %app.project_name,
            %subdomain,
            %repository,
            "Provisioning application"
        );

        // 1. Every stage host must be free before anything is created
        let mut taken = Vec::new();
        for host in &hosts {
            match self.dns.subdomain_exists(host).await {
                Ok(true) => taken.push(host.clone()),
                Ok(false) => {}
                Err(e) => return Err(progress.fail("Unable to check subdomain availability", e)),
            }
        }
        if !taken.is_empty() {
            tracing::warn!(?taken, "Subdomains already in use");
            return Err(ProvisionError::HostsTaken(taken));
        }

        // 2. DNS records
        for host in &hosts {
            match self.dns.create_subdomain(host, &self.cluster_address).await {
                Ok(true) => progress.done(format!("subdomain_created:{host}")),
                Ok(false) => {
                    return Err(progress.fail(
                        "Unable to create subdomain",
                        format!("change for {host} was not accepted"),
                    ));
                }
                Err(e) => return Err(progress.fail("Unable to create subdomain", e)),
            }
        }

        // 3. One MySQL database per stage
        let mut database_names = Vec::with_capacity(Stage::ALL.len());
        let mut prod_database_id = None;
        for stage in Stage::ALL {
            let name = database_name(&app.project_name, stage);
            match self.hosting.create_database(&name).await {
                Ok(true) => progress.done(format!("database_created:{name}")),
                Ok(false) => {
                    return Err(progress.fail(
                        "Unable to create database",
                        format!("hosting panel refused to create {name}"),
                    ));
                }
                Err(e) => return Err(progress.fail("Unable to create database", e)),
            }

            match self.hosting.link_user_to_database(&name).await {
                Ok(true) => progress.done(format!("database_user_linked:{name}")),
                Ok(false) => {
                    return Err(progress.fail(
                        "Unable to grant database privileges",
                        format!("hosting panel refused privileges on {name}"),
                    ));
                }
                Err(e) => return Err(progress.fail("Unable to grant database privileges", e)),
            }

            let record = db::databases::create(&self.pool, &name)
                .await
                .map_err(|e| progress.fail("Unable to record database", e))?;
            if stage == Stage::Prod {
                prod_database_id = Some(record.id);
            }
            database_names.push(self.hosting.full_database_name(&name));
        }

        // 4. Repository from template
        let options = RepoOptions {
            description: app.repo_description.clone().unwrap_or_default(),
            private: app.private_repo,
        };
        match self
            .source
            .create_repository_from_template(&app.template_repo, &repository, &options)
            .await
        {
            Ok(true) => progress.done(format!("repository_created:{repository}")),
            Ok(false) => {
                return Err(progress.fail(
                    "Unable to create the repository",
                    "repository generation did not return 201 Created",
                ));
            }
            Err(e) => return Err(progress.fail("Unable to create the repository", e)),
        }

        // 5. Template generation finishes asynchronously on the host side
        if !self.repo_ready_delay.is_zero() {
            tracing::debug!(delay = ?self.repo_ready_delay, "Waiting for repository");
            tokio::time::sleep(self.repo_ready_delay).await;
        }

        // 6. Branch protection needs the generated branches
        if app.protect_branches {
            self.source
                .protect_branches(&repository, &PROTECTED_BRANCHES)
                .await
                .map_err(|e| progress.fail("Unable to protect branches", e))?;
            progress.done(format!("branches_protected:{repository}"));
        }

        // 7. First CI run
        match self.source.list_workflows(&repository).await {
            Ok(workflows) => {
                let names: Vec<&str> = workflows.iter().map(|w| w.path.as_str()).collect();
                tracing::debug!(%repository, ?names, "Available workflows");
            }
            Err(e) => tracing::debug!(%repository, "Could not list workflows: {e}"),
        }

        match self
            .source
            .trigger_workflow(
                &repository,
                &app.workflow_name,
                &app.workflow_branch,
                &app.workflow_inputs,
            )
            .await
        {
            Ok(true) => progress.done(format!("workflow_dispatched:{}", app.workflow_name)),
            Ok(false) => {
                return Err(progress.fail(
                    "The repository was created, but triggering the workflow failed",
                    "workflow dispatch did not return 204 No Content",
                ));
            }
            Err(e) => {
                return Err(progress.fail(
                    "The repository was created, but triggering the workflow failed",
                    e,
                ));
            }
        }

        // 8. Record the project
        let project = db::projects::create(
            &self.pool,
            &app.project_name,
            user_id,
            &subdomain,
            None,
            prod_database_id,
        )
        .await
        .map_err(|e| progress.fail("Unable to record the project", e))?;
        progress.done(format!("project_saved:{}", project.id));

        self.notify_ready(user_id, &app.project_name, hosts.clone());

        Ok(ProvisionedApplication {
            project,
            repository,
            workflow: app.workflow_name.clone(),
            hosts,
            databases: database_names,
        })
    }

    /// Best-effort "application ready" mail to the requesting user.
    fn notify_ready(&self, user_id: Uuid, project_name: &str, hosts: Vec<String>) {
        let Some(mailer) = self.mailer.clone() else {
            return;
        };
        let pool = self.pool.clone();
        let project_name = project_name.to_string();

        tokio::spawn(async move {
            match db::users::find_by_id(&pool, user_id).await {
                Ok(Some(user)) => {
                    if let Err(e) = mailer
                        .send_application_ready(&user.email, &project_name, &hosts)
                        .await
                    {
                        tracing::error!(%user_id, "Failed to send application ready email: {e}");
                    }
                }
                Ok(None) => tracing::warn!(%user_id, "Requesting user vanished before notification"),
                Err(e) => tracing::error!(%user_id, "Failed to load user for notification: {e}"),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_hosts() {
        assert_eq!(Stage::Dev.host("shop.flapi.org"), "dev.shop.flapi.org");
        assert_eq!(Stage::Staging.host("shop.flapi.org"), "staging.shop.flapi.org");
        assert_eq!(Stage::Prod.host("shop.flapi.org"), "shop.flapi.org");
    }

    #[test]
    fn database_names_are_sanitized_per_stage() {
        assert_eq!(database_name("Shop", Stage::Dev), "shop_dev");
        assert_eq!(database_name("My Shop!", Stage::Staging), "my_shop_staging");
        assert_eq!(database_name("  a--b  ", Stage::Prod), "a_b_prod");
    }

    #[test]
    fn repository_defaults_to_first_label() {
        let app: NewApplication = serde_json::from_value(json!({
            "customer_name": "Acme",
            "project_name": "shop",
            "subdomain": "shop.flapi.org",
            "template_repo": "template-next",
            "workflow_name": "deploy.yml"
        }))
        .unwrap();
        assert_eq!(app.repository_name(), "shop");
        assert!(app.private_repo);
        assert_eq!(app.workflow_branch, "main");
        assert!(!app.protect_branches);
        assert!(app.validate().is_ok());
    }
}
