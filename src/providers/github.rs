//! GitHub REST client for template repositories and Actions workflows.

use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{ProviderError, RepoOptions, SourceHost, Workflow};
use crate::config::GitHubConfig;

const SERVICE: &str = "github";
const GITHUB_API_URL: &str = "https://api.github.com";

pub struct GitHubClient {
    client: reqwest::Client,
    token: String,
    owner: String,
}

impl GitHubClient {
    pub fn new(config: &GitHubConfig) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .user_agent("flapi")
                .build()
                .unwrap_or_default(),
            token: config.token.clone(),
            owner: config.owner.clone(),
        }
    }

    /// Build `https://api.github.com/repos/{owner}/{repo}/...`, percent-encoding each segment.
    fn repo_url(&self, repo: &str, rest: &[&str]) -> Result<Url, ProviderError> {
        let mut url = Url::parse(GITHUB_API_URL)
            .map_err(|e| ProviderError::rejected(SERVICE, format!("bad API url: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| ProviderError::rejected(SERVICE, "API url cannot be a base"))?
            .extend(["repos", self.owner.as_str(), repo])
            .extend(rest);
        Ok(url)
    }

    fn request(&self, method: reqwest::Method, url: Url) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .header("Authorization", format!("token {}", self.token))
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
    }
}

#[derive(Debug, Serialize)]
struct GenerateRepoRequest<'a> {
    owner: &'a str,
    name: &'a str,
    description: &'a str,
    private: bool,
    include_all_branches: bool,
}

#[derive(Debug, Deserialize)]
struct ListWorkflowsResponse {
    #[allow(dead_code)]
    total_count: u64,
    workflows: Vec<Workflow>,
}

#[async_trait]
impl SourceHost for GitHubClient {
    async fn create_repository_from_template(
        &self,
        template_repo: &str,
        new_repo: &str,
        options: &RepoOptions,
    ) -> Result<bool, ProviderError> {
        let url = self.repo_url(template_repo, &["generate"])?;
        let body = GenerateRepoRequest {
            owner: &self.owner,
            name: new_repo,
            description: &options.description,
            private: options.private,
            include_all_branches: true,
        };

        let resp = self
            .request(reqwest::Method::POST, url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::http(SERVICE, e))?;

        if !resp.status().is_success() {
            let err = ProviderError::from_response(SERVICE, resp).await;
            tracing::error!(template = %template_repo, repo = %new_repo, "Repository creation failed: {err}");
            return Err(err);
        }

        tracing::info!(template = %template_repo, repo = %new_repo, "Repository generated from template");
        Ok(resp.status() == StatusCode::CREATED)
    }

    async fn list_workflows(&self, repo: &str) -> Result<Vec<Workflow>, ProviderError> {
        let url = self.repo_url(repo, &["actions", "workflows"])?;
        let resp = self
            .request(reqwest::Method::GET, url)
            .send()
            .await
            .map_err(|e| ProviderError::http(SERVICE, e))?;

        if !resp.status().is_success() {
            return Err(ProviderError::from_response(SERVICE, resp).await);
        }

        let body: ListWorkflowsResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::http(SERVICE, e))?;
        Ok(body.workflows)
    }

    async fn trigger_workflow(
        &self,
        repo: &str,
        workflow: &str,
        git_ref: &str,
        inputs: &BTreeMap<String, String>,
    ) -> Result<bool, ProviderError> {
        let url = self.repo_url(repo, &["actions", "workflows", workflow, "dispatches"])?;
        let resp = self
            .request(reqwest::Method::POST, url)
            .json(&json!({ "ref": git_ref, "inputs": inputs }))
            .send()
            .await
            .map_err(|e| ProviderError::http(SERVICE, e))?;

        if !resp.status().is_success() {
            let err = ProviderError::from_response(SERVICE, resp).await;
            tracing::error!(%repo, %workflow, "Workflow dispatch failed: {err}");
            return Err(err);
        }

        Ok(resp.status() == StatusCode::NO_CONTENT)
    }

    async fn protect_branches(&self, repo: &str, branches: &[&str]) -> Result<(), ProviderError> {
        let rules = json!({
            "required_status_checks": null,
            "enforce_admins": null,
            "required_pull_request_reviews": {
                "required_approving_review_count": 1
            },
            "restrictions": null,
            "lock_branch": true
        });

        for branch in branches {
            let url = self.repo_url(repo, &["branches", branch, "protection"])?;
            let resp = self
                .request(reqwest::Method::PUT, url)
                .json(&rules)
                .send()
                .await
                .map_err(|e| ProviderError::http(SERVICE, e))?;

            if !resp.status().is_success() {
                return Err(ProviderError::from_response(SERVICE, resp).await);
            }
            tracing::info!(%repo, %branch, "Branch protection applied");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> GitHubClient {
        GitHubClient::new(&GitHubConfig {
            token: "t".to_string(),
            owner: "flapi-org".to_string(),
        })
    }

    #[test]
    fn workflow_file_name_is_percent_encoded() {
        let url = client()
            .repo_url("shop", &["actions", "workflows", "deploy app.yml", "dispatches"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.github.com/repos/flapi-org/shop/actions/workflows/deploy%20app.yml/dispatches"
        );
    }
}
