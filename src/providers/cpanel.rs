//! cPanel UAPI client for the shared MySQL host.
//!
//! Every call goes to `https://{host}/execute/{Module}/{function}` and is
//! authenticated with an account API token. UAPI always answers HTTP 200;
//! success is signalled by `status == 1` in the body.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use super::{HostingPanel, MySqlDatabase, MySqlServer, ProviderError};
use crate::config::HostingConfig;

const SERVICE: &str = "cpanel";

pub struct CpanelClient {
    client: reqwest::Client,
    base_url: String,
    auth_header: String,
    prefix: String,
    database_user: String,
    database_password: String,
    backup_path: String,
}

#[derive(Debug, Deserialize)]
struct UapiResponse<T> {
    status: i32,
    data: Option<T>,
    #[serde(default)]
    errors: Option<Vec<String>>,
    #[serde(default)]
    messages: Option<Vec<String>>,
}

impl<T> UapiResponse<T> {
    fn ok(&self) -> bool {
        self.status == 1
    }

    fn error_text(&self) -> String {
        self.errors
            .as_ref()
            .filter(|e| !e.is_empty())
            .map(|e| e.join("; "))
            .unwrap_or_else(|| "Unknown error".to_string())
    }
}

#[derive(Debug, Deserialize)]
struct ServerInfo {
    host: String,
    #[serde(default)]
    is_remote: serde_json::Value,
    version: String,
}

impl CpanelClient {
    pub fn new(config: &HostingConfig) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(60))
                .build()
                .unwrap_or_default(),
            base_url: format!("https://{}/execute", config.host.trim_end_matches('/')),
            auth_header: format!("cpanel {}:{}", config.username, config.api_token),
            prefix: config.database_prefix.clone(),
            database_user: config.database_user.clone(),
            database_password: config.database_password.clone(),
            backup_path: config.backup_path.trim_end_matches('/').to_string(),
        }
    }

    async fn post<T: DeserializeOwned>(
        &self,
        module: &str,
        function: &str,
        params: &[(&str, &str)],
    ) -> Result<UapiResponse<T>, ProviderError> {
        let resp = self
            .client
            .post(format!("{}/{module}/{function}", self.base_url))
            .header("Authorization", &self.auth_header)
            .form(params)
            .send()
            .await
            .map_err(|e| ProviderError::http(SERVICE, e))?;
        Self::decode(resp).await
    }

    async fn get<T: DeserializeOwned>(
        &self,
        module: &str,
        function: &str,
    ) -> Result<UapiResponse<T>, ProviderError> {
        let resp = self
            .client
            .get(format!("{}/{module}/{function}", self.base_url))
            .header("Authorization", &self.auth_header)
            .send()
            .await
            .map_err(|e| ProviderError::http(SERVICE, e))?;
        Self::decode(resp).await
    }

    async fn decode<T: DeserializeOwned>(
        resp: reqwest::Response,
    ) -> Result<UapiResponse<T>, ProviderError> {
        if !resp.status().is_success() {
            return Err(ProviderError::from_response(SERVICE, resp).await);
        }
        resp.json()
            .await
            .map_err(|e| ProviderError::http(SERVICE, e))
    }

    /// Run a database-level UAPI function and log the outcome.
    async fn database_call(
        &self,
        function: &str,
        params: &[(&str, &str)],
    ) -> Result<bool, ProviderError> {
        let out: UapiResponse<serde_json::Value> = self.post("Mysql", function, params).await?;
        if !out.ok() {
            tracing::warn!(function, "cPanel call failed: {}", out.error_text());
        }
        Ok(out.ok())
    }
}

#[async_trait]
impl HostingPanel for CpanelClient {
    fn full_database_name(&self, name: &str) -> String {
        format!("{}{name}", self.prefix)
    }

    async fn create_database(&self, name: &str) -> Result<bool, ProviderError> {
        let full = self.full_database_name(name);
        let ok = self
            .database_call("create_database", &[("name", &full), ("prefix-size", "16")])
            .await?;
        if ok {
            tracing::info!(database = %full, "MySQL database created");
        }
        Ok(ok)
    }

    async fn delete_database(&self, name: &str) -> Result<bool, ProviderError> {
        let full = self.full_database_name(name);
        self.database_call("delete_database", &[("name", &full)])
            .await
    }

    async fn rename_database(&self, old_name: &str, new_name: &str) -> Result<bool, ProviderError> {
        let old_full = self.full_database_name(old_name);
        let new_full = self.full_database_name(new_name);
        self.database_call(
            "rename_database",
            &[("oldname", &old_full), ("newname", &new_full)],
        )
        .await
    }

    async fn link_user_to_database(&self, name: &str) -> Result<bool, ProviderError> {
        let full = self.full_database_name(name);
        self.database_call(
            "set_privileges_on_database",
            &[
                ("privileges", "ALL PRIVILEGES"),
                ("database", &full),
                ("user", &self.database_user),
                ("password", &self.database_password),
            ],
        )
        .await
    }

    async fn check_database(&self, name: &str) -> Result<bool, ProviderError> {
        let full = self.full_database_name(name);
        self.database_call("check_database", &[("name", &full)])
            .await
    }

    async fn repair_database(&self, name: &str) -> Result<bool, ProviderError> {
        let full = self.full_database_name(name);
        self.database_call("repair_database", &[("name", &full)])
            .await
    }

    async fn restore_databases(
        &self,
        backup_file: &str,
        timeout_secs: u32,
        verbose: bool,
    ) -> Result<bool, ProviderError> {
        let backup = format!("{}/{backup_file}", self.backup_path);
        let timeout = timeout_secs.to_string();
        let out: UapiResponse<serde_json::Value> = self
            .post(
                "Backup",
                "restore_databases",
                &[
                    ("backup", &backup),
                    ("timeout", &timeout),
                    ("verbose", if verbose { "1" } else { "0" }),
                ],
            )
            .await?;

        if out.ok() {
            let message = out
                .messages
                .as_ref()
                .and_then(|m| m.first().cloned())
                .unwrap_or_else(|| "No specific message returned.".to_string());
            tracing::info!(%backup, "Database restoration successful: {message}");
        } else {
            tracing::warn!(%backup, "Database restoration failed: {}", out.error_text());
        }
        Ok(out.ok())
    }

    async fn server_information(&self) -> Result<Option<MySqlServer>, ProviderError> {
        let out: UapiResponse<ServerInfo> = self.get("Mysql", "get_server_information").await?;
        if !out.ok() {
            tracing::warn!(
                "Failed to fetch MySQL server information: {}",
                out.error_text()
            );
            return Ok(None);
        }

        Ok(out.data.map(|info| MySqlServer {
            host: info.host,
            is_remote: truthy(&info.is_remote),
            version: info.version,
        }))
    }

    async fn list_databases(&self) -> Result<Vec<MySqlDatabase>, ProviderError> {
        let out: UapiResponse<Vec<MySqlDatabase>> = self.get("Mysql", "list_databases").await?;
        if !out.ok() {
            tracing::warn!("Failed to list MySQL databases: {}", out.error_text());
            return Ok(Vec::new());
        }
        Ok(out.data.unwrap_or_default())
    }

    async fn add_remote_host(&self, host: &str) -> Result<bool, ProviderError> {
        let ok = self.database_call("add_host", &[("host", host)]).await?;
        if ok {
            tracing::info!(%host, "Remote MySQL host authorized");
        }
        Ok(ok)
    }

    async fn remote_hosts(&self) -> Result<Option<HashMap<String, String>>, ProviderError> {
        let out: UapiResponse<HashMap<String, String>> =
            self.get("Mysql", "get_host_notes").await?;
        if !out.ok() {
            tracing::warn!("Failed to fetch remote MySQL hosts: {}", out.error_text());
            return Ok(None);
        }
        Ok(Some(out.data.unwrap_or_default()))
    }
}

/// UAPI encodes booleans as `0`/`1`, `"0"`/`"1"` or real booleans depending on the function.
fn truthy(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::Number(n) => n.as_i64().is_some_and(|n| n != 0),
        serde_json::Value::String(s) => !s.is_empty() && s != "0",
        _ => false,
    }
}
