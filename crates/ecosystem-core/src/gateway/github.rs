use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use reqwest::{Client, header};
use serde::Deserialize;

use super::{RawRepo, RepoQuery, RepoSearch};
use crate::{EcosystemError, SecretValue};

/// Repository search against the GitHub REST search endpoint.
#[derive(Clone)]
pub struct GithubClient {
    client: Client,
    endpoint: String,
}

impl GithubClient {
    pub fn new(
        endpoint: impl Into<String>,
        token: Option<SecretValue>,
        timeout: Duration,
    ) -> Result<Self, EcosystemError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/vnd.github+json"),
        );
        if let Some(token) = token {
            let mut value = header::HeaderValue::from_str(&format!("token {}", token.expose()))
                .map_err(|err| EcosystemError::InvalidConfiguration(err.to_string()))?;
            value.set_sensitive(true);
            headers.insert(header::AUTHORIZATION, value);
        }

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("research-ecosystem/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()
            .map_err(|err| EcosystemError::Http(err.to_string()))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    full_name: String,
    description: Option<String>,
    #[serde(default)]
    stargazers_count: u64,
    language: Option<String>,
    #[serde(default)]
    updated_at: String,
    html_url: String,
}

impl From<SearchItem> for RawRepo {
    fn from(item: SearchItem) -> Self {
        Self {
            full_name: item.full_name,
            description: item.description,
            stargazers_count: item.stargazers_count,
            language: item.language,
            updated_at: item.updated_at,
            html_url: item.html_url,
        }
    }
}

#[async_trait]
impl RepoSearch for GithubClient {
    async fn search(&self, query: &RepoQuery) -> Result<Vec<RawRepo>> {
        let per_page = query.per_page.to_string();
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("q", query.query.as_str()),
                ("sort", query.sort.as_str()),
                ("order", query.order.as_str()),
                ("per_page", per_page.as_str()),
            ])
            .send()
            .await
            .context("repository search request failed")?;

        let status = response.status();
        if !status.is_success() {
            bail!("repository search returned HTTP {}", status.as_u16());
        }

        let body: SearchResponse = response
            .json()
            .await
            .context("malformed repository search response")?;
        Ok(body.items.into_iter().map(RawRepo::from).collect())
    }
}
