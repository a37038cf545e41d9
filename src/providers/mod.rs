//! Clients for the third-party platforms an application is provisioned on.
//!
//! Each platform sits behind an async trait so handlers and the provisioning
//! pipeline only see `Arc<dyn ...>`. Real clients are built from [`Config`];
//! tests swap in their own implementations through [`Providers`].

pub mod cpanel;
pub mod github;
pub mod keycloak;
pub mod route53;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::config::Config;
use crate::email::{self, Mailer};

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("{service} request failed: {source}")]
    Http {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{service} returned HTTP {status}: {body}")]
    Status {
        service: &'static str,
        status: u16,
        body: String,
    },
    #[error("{service} rejected the request: {message}")]
    Rejected {
        service: &'static str,
        message: String,
    },
}

impl ProviderError {
    pub fn http(service: &'static str, source: reqwest::Error) -> Self {
        ProviderError::Http { service, source }
    }

    pub fn rejected(service: &'static str, message: impl Into<String>) -> Self {
        ProviderError::Rejected {
            service,
            message: message.into(),
        }
    }

    /// Turn a non-2xx response into a `Status` error, keeping the first 1 KiB of the body.
    pub async fn from_response(service: &'static str, resp: reqwest::Response) -> Self {
        let status = resp.status().as_u16();
        let body = resp
            .text()
            .await
            .unwrap_or_default()
            .chars()
            .take(1024)
            .collect::<String>();
        ProviderError::Status {
            service,
            status,
            body,
        }
    }
}

/// DNS zone host and domain registrar.
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// Whether `domain` can be registered.
    async fn check_domain_availability(&self, domain: &str) -> Result<bool, ProviderError>;

    /// Whether a record named exactly `fqdn` already exists in its hosted zone.
    async fn subdomain_exists(&self, fqdn: &str) -> Result<bool, ProviderError>;

    /// Create an A record for `fqdn` pointing at `target`. Returns whether the
    /// change was accepted.
    async fn create_subdomain(&self, fqdn: &str, target: &str) -> Result<bool, ProviderError>;
}

#[derive(Debug, Clone, Default)]
pub struct RepoOptions {
    pub description: String,
    pub private: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Workflow {
    pub id: u64,
    pub name: String,
    pub path: String,
    pub state: String,
}

/// Source-code host with a CI runner.
#[async_trait]
pub trait SourceHost: Send + Sync {
    async fn create_repository_from_template(
        &self,
        template_repo: &str,
        new_repo: &str,
        options: &RepoOptions,
    ) -> Result<bool, ProviderError>;

    async fn list_workflows(&self, repo: &str) -> Result<Vec<Workflow>, ProviderError>;

    async fn trigger_workflow(
        &self,
        repo: &str,
        workflow: &str,
        git_ref: &str,
        inputs: &BTreeMap<String, String>,
    ) -> Result<bool, ProviderError>;

    async fn protect_branches(&self, repo: &str, branches: &[&str]) -> Result<(), ProviderError>;
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MySqlServer {
    pub host: String,
    pub is_remote: bool,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MySqlDatabase {
    pub database: String,
    #[serde(default)]
    pub disk_usage: i64,
    #[serde(default)]
    pub users: Vec<String>,
}

/// Shared-hosting control panel that owns the MySQL databases.
///
/// Database names passed in are unprefixed; implementations apply the
/// account prefix.
#[async_trait]
pub trait HostingPanel: Send + Sync {
    fn full_database_name(&self, name: &str) -> String;

    async fn create_database(&self, name: &str) -> Result<bool, ProviderError>;
    async fn delete_database(&self, name: &str) -> Result<bool, ProviderError>;
    async fn rename_database(&self, old_name: &str, new_name: &str) -> Result<bool, ProviderError>;
    async fn link_user_to_database(&self, name: &str) -> Result<bool, ProviderError>;
    async fn check_database(&self, name: &str) -> Result<bool, ProviderError>;
    async fn repair_database(&self, name: &str) -> Result<bool, ProviderError>;
    async fn restore_databases(
        &self,
        backup_file: &str,
        timeout_secs: u32,
        verbose: bool,
    ) -> Result<bool, ProviderError>;
    async fn server_information(&self) -> Result<Option<MySqlServer>, ProviderError>;
    async fn list_databases(&self) -> Result<Vec<MySqlDatabase>, ProviderError>;
    async fn add_remote_host(&self, host: &str) -> Result<bool, ProviderError>;
    async fn remote_hosts(&self) -> Result<Option<HashMap<String, String>>, ProviderError>;
}

/// Identity provider holding the canonical login for each user.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Create an enabled user with a permanent password. Returns the provider's user id.
    async fn create_user(
        &self,
        email: &str,
        password: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<String, ProviderError>;

    async fn assign_realm_role(&self, user_id: &str, role: &str) -> Result<(), ProviderError>;

    async fn delete_user(&self, user_id: &str) -> Result<(), ProviderError>;
}

#[derive(Clone, Default)]
pub struct Providers {
    pub dns: Option<Arc<dyn DnsProvider>>,
    pub source: Option<Arc<dyn SourceHost>>,
    pub hosting: Option<Arc<dyn HostingPanel>>,
    pub identity: Option<Arc<dyn IdentityProvider>>,
    pub mailer: Option<Arc<dyn Mailer>>,
}

impl Providers {
    pub async fn from_config(config: &Config) -> Self {
        let dns: Option<Arc<dyn DnsProvider>> = match &config.aws {
            Some(aws) => {
                tracing::info!("Route 53 configured");
                Some(Arc::new(route53::Route53Dns::new(aws).await))
            }
            None => None,
        };

        let source: Option<Arc<dyn SourceHost>> = config.github.as_ref().map(|gh| {
            tracing::info!(owner = %gh.owner, "GitHub configured");
            Arc::new(github::GitHubClient::new(gh)) as Arc<dyn SourceHost>
        });

        let hosting: Option<Arc<dyn HostingPanel>> = config.hosting.as_ref().map(|h| {
            tracing::info!(host = %h.host, "Hosting panel configured");
            Arc::new(cpanel::CpanelClient::new(h)) as Arc<dyn HostingPanel>
        });

        let identity: Option<Arc<dyn IdentityProvider>> = config.keycloak.as_ref().map(|kc| {
            tracing::info!(realm = %kc.realm, "Keycloak configured");
            Arc::new(keycloak::KeycloakAdmin::new(kc)) as Arc<dyn IdentityProvider>
        });

        Providers {
            dns,
            source,
            hosting,
            identity,
            mailer: email::mailer_from_config(config),
        }
    }
}
