//! Keycloak admin REST client, authenticated with the service account's
//! client credentials.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;

use super::{IdentityProvider, ProviderError};
use crate::config::KeycloakConfig;

const SERVICE: &str = "keycloak";

pub struct KeycloakAdmin {
    client: reqwest::Client,
    base_url: String,
    realm: String,
    client_id: String,
    client_secret: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct UserRepresentation {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RoleRepresentation {
    id: Option<String>,
    name: String,
}

impl KeycloakAdmin {
    pub fn new(config: &KeycloakConfig) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(15))
                .build()
                .unwrap_or_default(),
            base_url: config.url.clone(),
            realm: config.realm.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
        }
    }

    fn admin_url(&self, path: &str) -> String {
        format!("{}/admin/realms/{}{path}", self.base_url, self.realm)
    }

    async fn admin_token(&self) -> Result<String, ProviderError> {
        let resp = self
            .client
            .post(format!(
                "{}/realms/{}/protocol/openid-connect/token",
                self.base_url, self.realm
            ))
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| ProviderError::http(SERVICE, e))?;

        if !resp.status().is_success() {
            let err = ProviderError::from_response(SERVICE, resp).await;
            tracing::error!("Keycloak admin authentication failed: {err}");
            return Err(err);
        }

        let token: TokenResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::http(SERVICE, e))?;
        Ok(token.access_token)
    }

    async fn find_users_by_email(
        &self,
        token: &str,
        email: &str,
    ) -> Result<Vec<UserRepresentation>, ProviderError> {
        let mut url = reqwest::Url::parse(&self.admin_url("/users"))
            .map_err(|e| ProviderError::rejected(SERVICE, format!("bad admin url: {e}")))?;
        url.query_pairs_mut()
            .append_pair("email", email)
            .append_pair("exact", "true");

        let resp = self
            .client
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| ProviderError::http(SERVICE, e))?;

        if !resp.status().is_success() {
            return Err(ProviderError::from_response(SERVICE, resp).await);
        }
        resp.json()
            .await
            .map_err(|e| ProviderError::http(SERVICE, e))
    }
}

#[async_trait]
impl IdentityProvider for KeycloakAdmin {
    async fn create_user(
        &self,
        email: &str,
        password: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<String, ProviderError> {
        let token = self.admin_token().await?;

        if !self.find_users_by_email(&token, email).await?.is_empty() {
            return Err(ProviderError::rejected(
                SERVICE,
                format!("The email {email} is already registered"),
            ));
        }

        let resp = self
            .client
            .post(self.admin_url("/users"))
            .bearer_auth(&token)
            .json(&json!({
                "username": email,
                "email": email,
                "firstName": first_name,
                "lastName": last_name,
                "enabled": true,
                "credentials": [{
                    "type": "password",
                    "value": password,
                    "temporary": false
                }]
            }))
            .send()
            .await
            .map_err(|e| ProviderError::http(SERVICE, e))?;

        if resp.status() != StatusCode::CREATED {
            return Err(ProviderError::from_response(SERVICE, resp).await);
        }

        // The new id is the last segment of the Location header.
        let id = resp
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .and_then(user_id_from_location)
            .map(str::to_string);

        let id = match id {
            Some(id) => id,
            None => self
                .find_users_by_email(&token, email)
                .await?
                .into_iter()
                .next()
                .map(|u| u.id)
                .ok_or_else(|| {
                    ProviderError::rejected(
                        SERVICE,
                        format!("User {email} was created but its id could not be found"),
                    )
                })?,
        };

        tracing::info!(%email, keycloak_id = %id, "Keycloak user created");
        Ok(id)
    }

    async fn assign_realm_role(&self, user_id: &str, role: &str) -> Result<(), ProviderError> {
        let token = self.admin_token().await?;

        let resp = self
            .client
            .get(self.admin_url(&format!("/roles/{role}")))
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| ProviderError::http(SERVICE, e))?;

        if resp.status() == StatusCode::NOT_FOUND {
            tracing::warn!(%role, "Keycloak realm role not found");
            return Err(ProviderError::rejected(
                SERVICE,
                format!("Role {role} not found"),
            ));
        }
        if !resp.status().is_success() {
            return Err(ProviderError::from_response(SERVICE, resp).await);
        }

        let found: RoleRepresentation = resp
            .json()
            .await
            .map_err(|e| ProviderError::http(SERVICE, e))?;
        let Some(role_id) = found.id else {
            return Err(ProviderError::rejected(
                SERVICE,
                format!("Role {role} has no id"),
            ));
        };

        let resp = self
            .client
            .post(self.admin_url(&format!("/users/{user_id}/role-mappings/realm")))
            .bearer_auth(&token)
            .json(&json!([{ "id": role_id, "name": found.name }]))
            .send()
            .await
            .map_err(|e| ProviderError::http(SERVICE, e))?;

        if !resp.status().is_success() {
            return Err(ProviderError::from_response(SERVICE, resp).await);
        }

        tracing::info!(%role, %user_id, "Keycloak realm role assigned");
        Ok(())
    }

    async fn delete_user(&self, user_id: &str) -> Result<(), ProviderError> {
        let token = self.admin_token().await?;
        let resp = self
            .client
            .delete(self.admin_url(&format!("/users/{user_id}")))
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| ProviderError::http(SERVICE, e))?;

        if !resp.status().is_success() {
            return Err(ProviderError::from_response(SERVICE, resp).await);
        }

        tracing::info!(%user_id, "Keycloak user deleted");
        Ok(())
    }
}

fn user_id_from_location(location: &str) -> Option<&str> {
    location
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|id| !id.is_empty())
}
