use std::net::IpAddr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub host: IpAddr,
    pub port: u16,
    pub environment: Environment,
    pub frontend_url: String,
    pub health_secret: Option<String>,
    pub max_body_size: usize,
    pub repo_ready_delay: Duration,
    pub log_level: String,
    pub aws: Option<AwsConfig>,
    pub github: Option<GitHubConfig>,
    pub hosting: Option<HostingConfig>,
    pub keycloak: Option<KeycloakConfig>,
    pub mail_from: String,
    pub mailjet: Option<MailjetConfig>,
    pub smtp: Option<SmtpConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    DevelopmentRemote,
    Staging,
    Production,
    Test,
}

impl Environment {
    fn parse(value: &str) -> Result<Self, String> {
        match value {
            "development" => Ok(Environment::Development),
            "development-remote" => Ok(Environment::DevelopmentRemote),
            "staging" => Ok(Environment::Staging),
            "production" => Ok(Environment::Production),
            "test" => Ok(Environment::Test),
            other => Err(format!("Invalid FLAPI_ENV: {other}")),
        }
    }

    /// Local environments deliver mail over SMTP instead of the Mailjet API.
    pub fn is_local(&self) -> bool {
        matches!(self, Environment::Development | Environment::Test)
    }
}

#[derive(Debug, Clone)]
pub struct AwsConfig {
    pub access_key_id: String,
    pub secret_access_key: String,
    /// Address every provisioned A record points at.
    pub cluster_address: String,
}

#[derive(Debug, Clone)]
pub struct GitHubConfig {
    pub token: String,
    pub owner: String,
}

#[derive(Debug, Clone)]
pub struct HostingConfig {
    pub host: String,
    pub username: String,
    pub api_token: String,
    pub database_prefix: String,
    pub database_user: String,
    pub database_password: String,
    pub backup_path: String,
}

#[derive(Debug, Clone)]
pub struct KeycloakConfig {
    pub url: String,
    pub realm: String,
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone)]
pub struct MailjetConfig {
    pub api_key: String,
    pub api_secret: String,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub pass: String,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let database_url = env_required("DATABASE_URL")?;
        let jwt_secret = env_required("JWT_SECRET")?;

        let host: IpAddr = env_or("FLAPI_HOST", "0.0.0.0")
            .parse()
            .map_err(|e| format!("Invalid FLAPI_HOST: {e}"))?;

        let port: u16 = env_or("FLAPI_PORT", "3333")
            .parse()
            .map_err(|e| format!("Invalid FLAPI_PORT: {e}"))?;

        let environment = Environment::parse(&env_or("FLAPI_ENV", "development"))?;
        let frontend_url = env_or("FLAPI_FRONTEND_URL", "http://localhost:3000");
        let health_secret = env_optional("FLAPI_HEALTH_SECRET");

        let max_body_size: usize = env_or("FLAPI_MAX_BODY_SIZE", "1048576")
            .parse()
            .map_err(|e| format!("Invalid FLAPI_MAX_BODY_SIZE: {e}"))?;

        let repo_ready_delay: u64 = env_or("FLAPI_REPO_READY_DELAY_SECS", "15")
            .parse()
            .map_err(|e| format!("Invalid FLAPI_REPO_READY_DELAY_SECS: {e}"))?;

        let log_level = env_or("FLAPI_LOG_LEVEL", "info");

        let aws = match (
            env_optional("AWS_ACCESS_KEY_ID"),
            env_optional("AWS_SECRET_ACCESS_KEY"),
            env_optional("AWS_SERVER_CLUSTER_K3S"),
        ) {
            (Some(access_key_id), Some(secret_access_key), Some(cluster_address)) => {
                Some(AwsConfig {
                    access_key_id,
                    secret_access_key,
                    cluster_address,
                })
            }
            _ => None,
        };

        let github = match (
            env_optional("GITHUB_PERSONAL_ACCESS_TOKEN"),
            env_optional("GITHUB_USERNAME_OR_ORGANIZATION"),
        ) {
            (Some(token), Some(owner)) => Some(GitHubConfig { token, owner }),
            _ => None,
        };

        let hosting = match (
            env_optional("O2SWITCH_HOST"),
            env_optional("O2SWITCH_USERNAME"),
            env_optional("O2SWITCH_API_TOKEN"),
        ) {
            (Some(host), Some(username), Some(api_token)) => Some(HostingConfig {
                host,
                username,
                api_token,
                database_prefix: env_or("O2SWITCH_BEGINNING_DATABASE_NAME", ""),
                database_user: env_or("O2SWITCH_DATABASE_USERNAME", ""),
                database_password: env_or("O2SWITCH_DATABASE_PASSWORD", ""),
                backup_path: env_or("O2SWITCH_BACKUP_DATABASE_PATH", ""),
            }),
            _ => None,
        };

        let keycloak = match (
            env_optional("KEYCLOAK_URL"),
            env_optional("KEYCLOAK_REALM"),
            env_optional("KEYCLOAK_CLIENT_ID"),
            env_optional("KEYCLOAK_CLIENT_SECRET"),
        ) {
            (Some(url), Some(realm), Some(client_id), Some(client_secret)) => {
                Some(KeycloakConfig {
                    url: url.trim_end_matches('/').to_string(),
                    realm,
                    client_id,
                    client_secret,
                })
            }
            _ => None,
        };

        let mail_from = env_or("MAIL_USERNAME", "support@flapi.org");

        let mailjet = match (
            env_optional("MAILJET_API_KEY"),
            env_optional("MAILJET_API_SECRET_KEY"),
        ) {
            (Some(api_key), Some(api_secret)) => Some(MailjetConfig {
                api_key,
                api_secret,
            }),
            _ => None,
        };

        let smtp = match (
            env_optional("SMTP_HOST"),
            env_optional("SMTP_PORT"),
            env_optional("SMTP_USERNAME"),
            env_optional("SMTP_PASSWORD"),
        ) {
            (Some(host), Some(port), Some(user), Some(pass)) => Some(SmtpConfig {
                host,
                port: port
                    .parse()
                    .map_err(|e| format!("Invalid SMTP_PORT: {e}"))?,
                user,
                pass,
            }),
            _ => None,
        };

        Ok(Config {
            database_url,
            jwt_secret,
            host,
            port,
            environment,
            frontend_url,
            health_secret,
            max_body_size,
            repo_ready_delay: Duration::from_secs(repo_ready_delay),
            log_level,
            aws,
            github,
            hosting,
            keycloak,
            mail_from,
            mailjet,
            smtp,
        })
    }
}

fn env_required(key: &str) -> Result<String, String> {
    std::env::var(key).map_err(|_| format!("Missing required environment variable: {key}"))
}

fn env_optional(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
