use std::sync::Arc;
use std::time::Duration;

use log::debug;
use reqwest::header::HeaderMap;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tokio::sync::Semaphore;
use url::Url;

use crate::auth::Token;
use crate::error::{Result, StageScopeError};

const CONTINUATION_HEADER: &str = "x-ms-continuationtoken";

/// Thin REST client bound to one Azure DevOps project.
///
/// Shared read-only by every task of a snapshot; the semaphore caps how many
/// requests are in flight at once.
pub struct AzureClient {
    client: Client,
    pub organization_url: Url,
    /// `{organization}/{project}/`, the base every endpoint is joined onto.
    pub project_url: Url,
    token: Option<Token>,
    api_version: String,
    semaphore: Arc<Semaphore>,
}

/// One page of a list endpoint.
pub(super) struct Page<T> {
    pub body: T,
    pub continuation: Option<String>,
}

impl AzureClient {
    pub fn new(
        organization_url: &str,
        project: &str,
        token: Option<Token>,
        api_version: &str,
        max_concurrent_requests: usize,
        request_timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("stagescope/", env!("CARGO_PKG_VERSION")))
            .timeout(request_timeout)
            .build()
            .map_err(|e| StageScopeError::Config(format!("Failed to create HTTP client: {e}")))?;

        let organization_url = Url::parse(organization_url)
            .map_err(|e| StageScopeError::Config(format!("Invalid organization URL: {e}")))?;

        if project.trim().is_empty() {
            return Err(StageScopeError::Config("Project must not be empty".into()));
        }

        let mut project_url = organization_url.clone();
        project_url
            .path_segments_mut()
            .map_err(|()| {
                StageScopeError::Config(format!(
                    "Organization URL cannot be a base: {organization_url}"
                ))
            })?
            .pop_if_empty()
            .push(project)
            .push("");

        Ok(Self {
            client,
            organization_url,
            project_url,
            token,
            api_version: api_version.to_string(),
            semaphore: Arc::new(Semaphore::new(max_concurrent_requests.max(1))),
        })
    }

    /// Builds a project-relative endpoint URL with `api-version` appended.
    pub(super) fn endpoint(&self, path: &str, query: &[(&str, String)]) -> Result<Url> {
        let mut url = self
            .project_url
            .join(path)
            .map_err(|e| StageScopeError::Config(format!("Invalid endpoint {path}: {e}")))?;

        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
            pairs.append_pair("api-version", &self.api_version);
        }

        Ok(url)
    }

    fn auth_request(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        // PATs go in as the basic-auth password with an empty user name
        if let Some(token) = &self.token {
            request.basic_auth("", Some(token.as_str()))
        } else {
            request
        }
    }

    /// GET `url` and return the raw body, or `None` for a 204.
    async fn get_body(&self, url: Url) -> Result<(Option<String>, HeaderMap)> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| StageScopeError::Config(format!("Request limiter closed: {e}")))?;

        debug!("GET {url}");
        let response = self.auth_request(self.client.get(url)).send().await?;

        let status = response.status();
        if status == StatusCode::NO_CONTENT {
            return Ok((None, response.headers().clone()));
        }

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(StageScopeError::Api {
                status: status.as_u16(),
                message: error_text,
            });
        }

        let headers = response.headers().clone();
        let body = response.text().await?;
        Ok((Some(body), headers))
    }

    pub(super) async fn get_json<T>(&self, url: Url) -> Result<T>
    where
        T: DeserializeOwned,
    {
        Ok(self.get_page(url).await?.body)
    }

    pub(super) async fn get_page<T>(&self, url: Url) -> Result<Page<T>>
    where
        T: DeserializeOwned,
    {
        let (body, headers) = self.get_body(url).await?;
        let body = serde_json::from_str(body.as_deref().unwrap_or_default())?;

        let continuation = headers
            .get(CONTINUATION_HEADER)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
            .map(ToString::to_string);

        Ok(Page { body, continuation })
    }

    /// Like `get_json`, but an empty response (204, empty body, `null`) is `None`.
    pub(super) async fn get_optional_json<T>(&self, url: Url) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        let (body, _) = self.get_body(url).await?;
        match body.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(body) => Ok(serde_json::from_str(body)?),
        }
    }
}
