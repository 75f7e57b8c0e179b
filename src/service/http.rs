//! HTTP job service implementation
//!
//! Talks to a REST job API with basic auth. Listing is paged; each page
//! carries the URL of the next one.

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use reqwest::{Client, Response, StatusCode, Url};
use serde::Deserialize;
use serde_json::json;

use super::traits::{RemoteJobService, ServiceError};
use crate::domain::{JobRequest, JobState, ListFilter, RemoteJob};
use crate::error::{BatchrError, Result};

/// Fallback pause when a 429 carries no Retry-After header
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(1);

/// Account credentials for basic auth
#[derive(Clone)]
pub struct Credentials {
    pub account: String,
    pub token: String,
}

impl Credentials {
    pub fn new(account: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            token: token.into(),
        }
    }

    /// Read credentials from the named environment variables
    pub fn from_env(account_env: &str, token_env: &str) -> Result<Self> {
        let read = |name: &str| {
            std::env::var(name).map_err(|_| BatchrError::MissingCredential {
                env_var: name.to_string(),
            })
        };
        Ok(Self::new(read(account_env)?, read(token_env)?))
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("account", &self.account)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// One page of the job listing
#[derive(Debug, Deserialize)]
struct JobPage {
    #[serde(default)]
    jobs: Vec<RemoteJob>,
    #[serde(default)]
    next_page_url: Option<String>,
}

/// REST client for the remote job service
#[derive(Debug, Clone)]
pub struct HttpJobService {
    client: Client,
    base_url: Url,
    credentials: Credentials,
}

impl HttpJobService {
    pub fn new(base_url: &str, credentials: Credentials, timeout: Duration) -> Result<Self> {
        // A trailing slash keeps Url::join from dropping the last path segment
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };
        let base_url =
            Url::parse(&normalized).map_err(|e| BatchrError::Config(format!("Invalid base_url {}: {}", base_url, e)))?;

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BatchrError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            credentials,
        })
    }

    fn url(&self, path: &str) -> std::result::Result<Url, ServiceError> {
        self.base_url
            .join(path)
            .map_err(|e| ServiceError::InvalidResponse(format!("Bad URL {}: {}", path, e)))
    }

    fn list_url(&self, filter: &ListFilter) -> std::result::Result<Url, ServiceError> {
        let mut url = self.url("Jobs")?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("PageSize", &filter.page_size.to_string());
            if let Some(to) = &filter.to {
                query.append_pair("To", to);
            }
        }
        Ok(url)
    }
}

/// Map non-2xx responses to service errors
async fn check_status(response: Response) -> std::result::Result<Response, ServiceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_RETRY_AFTER);
        return Err(ServiceError::RateLimited { retry_after });
    }

    let message = response.text().await.unwrap_or_default();
    Err(ServiceError::Api {
        status: status.as_u16(),
        message,
    })
}

async fn fetch_page(
    client: &Client,
    credentials: &Credentials,
    url: Url,
) -> std::result::Result<JobPage, ServiceError> {
    tracing::debug!(%url, "Fetching job page");
    let response = client
        .get(url)
        .basic_auth(&credentials.account, Some(&credentials.token))
        .send()
        .await?;
    let body = check_status(response).await?.text().await?;
    Ok(serde_json::from_str(&body)?)
}

#[async_trait]
impl RemoteJobService for HttpJobService {
    async fn create(&self, request: JobRequest) -> std::result::Result<(), ServiceError> {
        let response = self
            .client
            .post(self.url("Jobs")?)
            .basic_auth(&self.credentials.account, Some(&self.credentials.token))
            .json(&request)
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    async fn transition(&self, id: &str, state: JobState) -> std::result::Result<(), ServiceError> {
        let response = self
            .client
            .post(self.url(&format!("Jobs/{}", id))?)
            .basic_auth(&self.credentials.account, Some(&self.credentials.token))
            .json(&json!({ "status": state }))
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    async fn remove(&self, id: &str) -> std::result::Result<(), ServiceError> {
        let response = self
            .client
            .delete(self.url(&format!("Jobs/{}", id))?)
            .basic_auth(&self.credentials.account, Some(&self.credentials.token))
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    fn list(&self, filter: ListFilter) -> BoxStream<'static, std::result::Result<RemoteJob, ServiceError>> {
        let first = match self.list_url(&filter) {
            Ok(url) => url,
            Err(e) => return stream::once(async move { Err(e) }).boxed(),
        };
        let client = self.client.clone();
        let credentials = self.credentials.clone();
        let base_url = self.base_url.clone();

        stream::try_unfold(Some(first), move |next| {
            let client = client.clone();
            let credentials = credentials.clone();
            let base_url = base_url.clone();
            async move {
                let Some(url) = next else {
                    return Ok::<_, ServiceError>(None);
                };
                let page = fetch_page(&client, &credentials, url).await?;
                let next = match page.next_page_url {
                    Some(next) if !next.is_empty() => Some(
                        base_url
                            .join(&next)
                            .map_err(|e| ServiceError::InvalidResponse(format!("Bad next page {}: {}", next, e)))?,
                    ),
                    _ => None,
                };
                let jobs = stream::iter(page.jobs.into_iter().map(Ok::<_, ServiceError>));
                Ok(Some((jobs, next)))
            }
        })
        .try_flatten()
        .boxed()
    }
}
