#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use flapi::config::{AwsConfig, Config, Environment};
use flapi::providers::{
    DnsProvider, HostingPanel, IdentityProvider, MySqlDatabase, MySqlServer, ProviderError,
    Providers, RepoOptions, SourceHost, Workflow,
};

pub const PASSWORD: &str = "Sup3r$ecret";
pub const CLUSTER_ADDRESS: &str = "203.0.113.10";

/// Every provider call, in the order it happened.
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn push(&self, call: String) {
        self.0.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    /// Calls whose name starts with `prefix`.
    pub fn matching(&self, prefix: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with(prefix))
            .collect()
    }
}

/// Knobs for the fake providers.
#[derive(Clone, Default)]
pub struct FakeSettings {
    /// Hosts that already have a DNS record.
    pub existing_hosts: HashSet<String>,
    /// Make repository generation answer without 201.
    pub repo_creation_fails: bool,
    /// Branch protection is refused until this long after the repository was generated.
    pub repo_ready_after: Duration,
    /// Workflow dispatch answers without 204.
    pub workflow_not_accepted: bool,
    /// Workflow dispatch fails outright.
    pub workflow_dispatch_errors: bool,
    /// Database names the hosting panel refuses to create.
    pub refused_databases: HashSet<String>,
    /// Mirror signups into a fake identity provider.
    pub identity: bool,
    pub identity_create_fails: bool,
    pub role_assignment_fails: bool,
}

pub struct FakeDns {
    log: CallLog,
    existing: HashSet<String>,
}

#[async_trait]
impl DnsProvider for FakeDns {
    async fn check_domain_availability(&self, domain: &str) -> Result<bool, ProviderError> {
        self.log.push(format!("check_domain:{domain}"));
        Ok(!domain.starts_with("taken"))
    }

    async fn subdomain_exists(&self, fqdn: &str) -> Result<bool, ProviderError> {
        self.log.push(format!("subdomain_exists:{fqdn}"));
        Ok(self.existing.contains(fqdn))
    }

    async fn create_subdomain(&self, fqdn: &str, target: &str) -> Result<bool, ProviderError> {
        self.log.push(format!("create_subdomain:{fqdn}->{target}"));
        Ok(true)
    }
}

pub struct FakeSource {
    log: CallLog,
    repo_creation_fails: bool,
    repo_ready_after: Duration,
    generated_at: Mutex<Option<Instant>>,
    workflow_not_accepted: bool,
    workflow_dispatch_errors: bool,
}

#[async_trait]
impl SourceHost for FakeSource {
    async fn create_repository_from_template(
        &self,
        template_repo: &str,
        new_repo: &str,
        options: &RepoOptions,
    ) -> Result<bool, ProviderError> {
        self.log.push(format!(
            "create_repository:{template_repo}->{new_repo}:private={}",
            options.private
        ));
        if self.repo_creation_fails {
            return Ok(false);
        }
        *self.generated_at.lock().unwrap() = Some(Instant::now());
        Ok(true)
    }

    async fn list_workflows(&self, repo: &str) -> Result<Vec<Workflow>, ProviderError> {
        self.log.push(format!("list_workflows:{repo}"));
        Ok(vec![Workflow {
            id: 1,
            name: "Deploy".to_string(),
            path: ".github/workflows/deploy.yml".to_string(),
            state: "active".to_string(),
        }])
    }

    async fn trigger_workflow(
        &self,
        repo: &str,
        workflow: &str,
        git_ref: &str,
        inputs: &BTreeMap<String, String>,
    ) -> Result<bool, ProviderError> {
        self.log.push(format!(
            "trigger_workflow:{repo}:{workflow}@{git_ref}:{}",
            inputs.len()
        ));
        if self.workflow_dispatch_errors {
            return Err(ProviderError::rejected("github", "workflow not found"));
        }
        Ok(!self.workflow_not_accepted)
    }

    async fn protect_branches(&self, repo: &str, branches: &[&str]) -> Result<(), ProviderError> {
        self.log
            .push(format!("protect_branches:{repo}:{}", branches.join(",")));
        let ready = self
            .generated_at
            .lock()
            .unwrap()
            .is_some_and(|at| at.elapsed() >= self.repo_ready_after);
        if ready {
            Ok(())
        } else {
            Err(ProviderError::rejected("github", "Branch not found"))
        }
    }
}

pub struct FakeHosting {
    log: CallLog,
    refused: HashSet<String>,
}

#[async_trait]
impl HostingPanel for FakeHosting {
    fn full_database_name(&self, name: &str) -> String {
        format!("acct_{name}")
    }

    async fn create_database(&self, name: &str) -> Result<bool, ProviderError> {
        self.log.push(format!("create_database:{name}"));
        Ok(!self.refused.contains(name))
    }

    async fn delete_database(&self, name: &str) -> Result<bool, ProviderError> {
        self.log.push(format!("delete_database:{name}"));
        Ok(true)
    }

    async fn rename_database(&self, old_name: &str, new_name: &str) -> Result<bool, ProviderError> {
        self.log.push(format!("rename_database:{old_name}->{new_name}"));
        Ok(true)
    }

    async fn link_user_to_database(&self, name: &str) -> Result<bool, ProviderError> {
        self.log.push(format!("link_user:{name}"));
        Ok(true)
    }

    async fn check_database(&self, name: &str) -> Result<bool, ProviderError> {
        self.log.push(format!("check_database:{name}"));
        Ok(true)
    }

    async fn repair_database(&self, name: &str) -> Result<bool, ProviderError> {
        self.log.push(format!("repair_database:{name}"));
        Ok(true)
    }

    async fn restore_databases(
        &self,
        backup_file: &str,
        timeout_secs: u32,
        verbose: bool,
    ) -> Result<bool, ProviderError> {
        self.log
            .push(format!("restore:{backup_file}:{timeout_secs}:{verbose}"));
        Ok(true)
    }

    async fn server_information(&self) -> Result<Option<MySqlServer>, ProviderError> {
        Ok(Some(MySqlServer {
            host: "localhost".to_string(),
            is_remote: false,
            version: "10.6".to_string(),
        }))
    }

    async fn list_databases(&self) -> Result<Vec<MySqlDatabase>, ProviderError> {
        Ok(vec![MySqlDatabase {
            database: "acct_shop_prod".to_string(),
            disk_usage: 2048,
            users: vec!["acct_app".to_string()],
        }])
    }

    async fn add_remote_host(&self, host: &str) -> Result<bool, ProviderError> {
        self.log.push(format!("add_remote_host:{host}"));
        Ok(true)
    }

    async fn remote_hosts(&self) -> Result<Option<HashMap<String, String>>, ProviderError> {
        Ok(Some(HashMap::from([(
            "198.51.100.7".to_string(),
            "ci runner".to_string(),
        )])))
    }
}

pub struct FakeIdentity {
    log: CallLog,
    create_fails: bool,
    role_assignment_fails: bool,
}

#[async_trait]
impl IdentityProvider for FakeIdentity {
    async fn create_user(
        &self,
        email: &str,
        _password: &str,
        _first_name: &str,
        _last_name: &str,
    ) -> Result<String, ProviderError> {
        self.log.push(format!("create_user:{email}"));
        if self.create_fails {
            return Err(ProviderError::rejected("keycloak", "User exists with same email"));
        }
        Ok(format!("kc-{email}"))
    }

    async fn assign_realm_role(&self, user_id: &str, role: &str) -> Result<(), ProviderError> {
        self.log.push(format!("assign_role:{user_id}:{role}"));
        if self.role_assignment_fails {
            return Err(ProviderError::rejected("keycloak", "Role not found"));
        }
        Ok(())
    }

    async fn delete_user(&self, user_id: &str) -> Result<(), ProviderError> {
        self.log.push(format!("delete_user:{user_id}"));
        Ok(())
    }
}

/// A running test server instance with a dedicated test database.
pub struct TestApp {
    pub addr: SocketAddr,
    pub pool: PgPool,
    pub client: Client,
    pub db_name: String,
    pub log: CallLog,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn role_id(&self, name: &str) -> Uuid {
        sqlx::query_scalar("SELECT id FROM user_roles WHERE name = $1")
            .bind(name)
            .fetch_one(&self.pool)
            .await
            .expect("role lookup failed")
    }

    pub async fn signup_body(&self, email: &str) -> Value {
        json!({
            "role_id": self.role_id("app_manager").await,
            "lastname": "Doe",
            "firstname": "Jane",
            "email": email,
            "password": PASSWORD,
            "password_confirmation": PASSWORD,
            "ip_address": "192.0.2.1",
            "ip_region": "FR",
            "currency_code": "EUR",
        })
    }

    pub async fn post(&self, path: &str, body: &Value) -> (Value, StatusCode) {
        let resp = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .expect("post request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    pub async fn sign_up(&self, email: &str) -> (Value, StatusCode) {
        let body = self.signup_body(email).await;
        self.post("/signup", &body).await
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> (Value, StatusCode) {
        self.post("/signIn", &json!({ "email": email, "password": password }))
            .await
    }

    pub async fn active_code(&self, email: &str) -> i32 {
        sqlx::query_scalar("SELECT active_code FROM users WHERE email = $1")
            .bind(email)
            .fetch_one(&self.pool)
            .await
            .expect("active code lookup failed")
    }

    /// Sign up, activate and sign in. Returns (user id, access token).
    pub async fn login_as(&self, email: &str) -> (Uuid, String) {
        let (body, status) = self.sign_up(email).await;
        assert_eq!(status, StatusCode::CREATED, "signup failed: {body}");

        let code = self.active_code(email).await;
        let (body, status) = self
            .post("/verify-code", &json!({ "email": email, "code": code }))
            .await;
        assert_eq!(status, StatusCode::OK, "activation failed: {body}");

        let (body, status) = self.sign_in(email, PASSWORD).await;
        assert_eq!(status, StatusCode::OK, "sign in failed: {body}");

        let user_id = sqlx::query_scalar("SELECT id FROM users WHERE email = $1")
            .bind(email)
            .fetch_one(&self.pool)
            .await
            .expect("user lookup failed");
        (user_id, body["token"].as_str().unwrap().to_string())
    }

    pub async fn get_auth(&self, path: &str, token: &str) -> (Value, StatusCode) {
        let resp = self
            .client
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .expect("get request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    pub async fn post_auth(&self, path: &str, token: &str, body: &Value) -> (Value, StatusCode) {
        let resp = self
            .client
            .post(self.url(path))
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .expect("post request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    pub async fn put_auth(&self, path: &str, token: &str, body: &Value) -> (Value, StatusCode) {
        let resp = self
            .client
            .put(self.url(path))
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .expect("put request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    pub async fn delete_auth(&self, path: &str, token: &str) -> (Value, StatusCode) {
        let resp = self
            .client
            .delete(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .expect("delete request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }
}

fn test_config(database_url: String) -> Config {
    Config {
        database_url,
        jwt_secret: "test-jwt-secret-that-is-long-enough".to_string(),
        host: "127.0.0.1".parse().unwrap(),
        port: 0,
        environment: Environment::Test,
        frontend_url: "http://localhost:3000".to_string(),
        health_secret: None,
        max_body_size: 1_048_576,
        repo_ready_delay: Duration::ZERO,
        log_level: "warn".to_string(),
        aws: Some(AwsConfig {
            access_key_id: "test".to_string(),
            secret_access_key: "test".to_string(),
            cluster_address: CLUSTER_ADDRESS.to_string(),
        }),
        github: None,
        hosting: None,
        keycloak: None,
        mail_from: "support@flapi.test".to_string(),
        mailjet: None,
        smtp: None,
    }
}

/// Spawn a test app with a fresh database and no third-party providers.
pub async fn spawn_app() -> TestApp {
    spawn(|_| {}, None).await
}

/// Spawn a test app whose DNS, source host and hosting panel are in-process fakes.
pub async fn spawn_app_with_fakes(settings: FakeSettings) -> TestApp {
    spawn(|_| {}, Some(settings)).await
}

/// Spawn a test app with fake providers after adjusting its configuration.
pub async fn spawn_app_with_fakes_and_config(
    settings: FakeSettings,
    adjust: impl FnOnce(&mut Config),
) -> TestApp {
    spawn(adjust, Some(settings)).await
}

/// Spawn a test app after adjusting its configuration.
pub async fn spawn_app_with_config(adjust: impl FnOnce(&mut Config)) -> TestApp {
    spawn(adjust, None).await
}

async fn spawn(adjust: impl FnOnce(&mut Config), fakes: Option<FakeSettings>) -> TestApp {
    let _ = dotenvy::dotenv();

    let base_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for tests");

    let db_name = format!("flapi_test_{}", Uuid::now_v7().simple());

    let admin_url = base_url
        .rsplit_once('/')
        .map(|(base, _)| format!("{base}/postgres"))
        .unwrap_or_else(|| base_url.clone());

    let admin_pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&admin_url)
        .await
        .expect("Failed to connect to postgres for test DB creation");

    sqlx::query(&format!("CREATE DATABASE \"{db_name}\""))
        .execute(&admin_pool)
        .await
        .expect("Failed to create test database");

    admin_pool.close().await;

    let test_url = base_url
        .rsplit_once('/')
        .map(|(base, _)| format!("{base}/{db_name}"))
        .unwrap_or_else(|| base_url.clone());

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&test_url)
        .await
        .expect("Failed to connect to test database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations on test database");

    let mut config = test_config(test_url);
    adjust(&mut config);

    let log = CallLog::default();
    let providers = match fakes {
        Some(settings) => Providers {
            dns: Some(Arc::new(FakeDns {
                log: log.clone(),
                existing: settings.existing_hosts,
            })),
            source: Some(Arc::new(FakeSource {
                log: log.clone(),
                repo_creation_fails: settings.repo_creation_fails,
                repo_ready_after: settings.repo_ready_after,
                generated_at: Mutex::new(None),
                workflow_not_accepted: settings.workflow_not_accepted,
                workflow_dispatch_errors: settings.workflow_dispatch_errors,
            })),
            hosting: Some(Arc::new(FakeHosting {
                log: log.clone(),
                refused: settings.refused_databases,
            })),
            identity: settings.identity.then(|| {
                Arc::new(FakeIdentity {
                    log: log.clone(),
                    create_fails: settings.identity_create_fails,
                    role_assignment_fails: settings.role_assignment_fails,
                }) as Arc<dyn IdentityProvider>
            }),
            mailer: None,
        },
        None => Providers::default(),
    };

    let app = flapi::build_app(pool.clone(), config, providers);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind to random port");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Server failed");
    });

    let client = Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();

    TestApp {
        addr,
        pool,
        client,
        db_name,
        log,
    }
}

/// Drop the test database.
pub async fn cleanup(app: TestApp) {
    let TestApp { pool, db_name, .. } = app;
    pool.close().await;

    let base_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for tests");
    let admin_url = base_url
        .rsplit_once('/')
        .map(|(base, _)| format!("{base}/postgres"))
        .unwrap_or_else(|| base_url.clone());

    if let Ok(admin_pool) = PgPoolOptions::new()
        .max_connections(2)
        .connect(&admin_url)
        .await
    {
        let _ = sqlx::query(&format!("DROP DATABASE IF EXISTS \"{db_name}\" WITH (FORCE)"))
            .execute(&admin_pool)
            .await;
        admin_pool.close().await;
    }
}
