//! HTTP Data API target client.
//!
//! Talks to a Data-API-style administrative endpoint: JSON documents
//! POSTed to `{base_url}/action/{verb}` with an `api-key` header. The
//! per-operation timeout comes from the target settings and is enforced
//! by the underlying HTTP client.

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::TargetSettings;
use crate::error::{Error, Result};
use crate::retry::{with_retry, RetryConfig};
use crate::target::{CreateOutcome, TargetClient};

/// Request body for database-scoped actions.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DatabaseRequest<'a> {
    data_source: &'a str,
    database: &'a str,
}

/// Request body for collection-scoped actions.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CollectionRequest<'a> {
    data_source: &'a str,
    database: &'a str,
    collection: &'a str,
}

/// Request body for the connectivity check.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PingRequest<'a> {
    data_source: &'a str,
}

/// Response from the listCollections action.
#[derive(Debug, Deserialize)]
struct ListCollectionsResponse {
    collections: Vec<String>,
}

/// HTTP client for the target Data API.
pub struct DataApiClient {
    settings: TargetSettings,
    client: Client,
    retry: RetryConfig,
}

impl DataApiClient {
    /// Creates a client with the configured per-operation timeout.
    #[must_use]
    pub fn new(settings: TargetSettings) -> Self {
        let client = Client::builder()
            .timeout(settings.timeout())
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            settings,
            client,
            retry: RetryConfig::default(),
        }
    }

    /// Override the retry policy (tests use [`RetryConfig::no_retry`]).
    #[must_use]
    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Builds the API URL for a specific action.
    fn build_url(&self, action: &str) -> String {
        format!(
            "{}/action/{}",
            self.settings.base_url.trim_end_matches('/'),
            action
        )
    }

    /// POSTs a request body to an action endpoint, mapping transport
    /// failures to the error taxonomy. Status handling is left to the
    /// caller because "already exists" is only an error for some actions.
    async fn post<T: Serialize>(&self, action: &str, body: &T) -> Result<Response> {
        let url = self.build_url(action);
        debug!(action, url = %url, "target request");

        self.client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("api-key", &self.settings.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout(self.settings.timeout_secs)
                } else if e.is_connect() {
                    Error::Connection(format!("cannot reach target: {e}"))
                } else {
                    Error::Connection(format!("target request failed: {e}"))
                }
            })
    }

    /// POSTs with rate-limit and server errors converted into retryable
    /// errors, so `with_retry` can do its job. Other statuses pass
    /// through for the caller to interpret.
    async fn post_checked<T: Serialize>(&self, action: &str, body: &T) -> Result<Response> {
        let response = self.post(action, body).await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(Error::RateLimit(60));
        }
        if status.is_server_error() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(Error::Materialization(format!(
                "{action} failed with {status}: {body}"
            )));
        }

        Ok(response)
    }

    /// Maps a non-success response to an error.
    async fn error_for(&self, action: &str, response: Response) -> Error {
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "unknown error".to_string());

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::Connection(format!(
                "target rejected credentials for {action}: {body}"
            )),
            s => Error::Materialization(format!("{action} failed with {s}: {body}")),
        }
    }
}

/// Whether a failed create response means the object already exists.
fn is_already_exists(status: StatusCode, body: &str) -> bool {
    status == StatusCode::CONFLICT
        || body.contains("NamespaceExists")
        || body.to_lowercase().contains("already exists")
}

#[async_trait]
impl TargetClient for DataApiClient {
    fn target_type(&self) -> &'static str {
        "data-api"
    }

    async fn connect(&mut self) -> Result<()> {
        let request = PingRequest {
            data_source: &self.settings.data_source,
        };
        let response = self.post("ping", &request).await?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            // Any ping failure is a startup-time connection problem.
            return Err(Error::Connection(format!(
                "ping failed with {status}: {body}"
            )));
        }
        Ok(())
    }

    async fn create_database(&self, database: &str) -> Result<()> {
        let data_source = self.settings.data_source.as_str();
        let response = with_retry(&self.retry, "createDatabase", move || async move {
            let request = DatabaseRequest {
                data_source,
                database,
            };
            self.post_checked("createDatabase", &request).await
        })
        .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let err = self.error_for("createDatabase", response).await;
        // An existing database is exactly the state we want.
        if let Error::Materialization(ref msg) = err {
            if is_already_exists(status, msg) {
                return Ok(());
            }
        }
        Err(err)
    }

    async fn create_collection(
        &self,
        database: &str,
        collection: &str,
    ) -> Result<CreateOutcome> {
        let data_source = self.settings.data_source.as_str();
        let response = with_retry(&self.retry, "createCollection", move || async move {
            let request = CollectionRequest {
                data_source,
                database,
                collection,
            };
            self.post_checked("createCollection", &request).await
        })
        .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(CreateOutcome::Created);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "unknown error".to_string());

        if is_already_exists(status, &body) {
            return Ok(CreateOutcome::AlreadyExisted);
        }

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(Error::Connection(format!(
                "target rejected credentials for createCollection: {body}"
            ))),
            s => Err(Error::Materialization(format!(
                "createCollection failed with {s}: {body}"
            ))),
        }
    }

    async fn list_collections(&self, database: &str) -> Result<Vec<String>> {
        let data_source = self.settings.data_source.as_str();
        let response = with_retry(&self.retry, "listCollections", move || async move {
            let request = DatabaseRequest {
                data_source,
                database,
            };
            self.post_checked("listCollections", &request).await
        })
        .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            // Unknown database: nothing exists yet.
            return Ok(Vec::new());
        }
        if !status.is_success() {
            return Err(self.error_for("listCollections", response).await);
        }

        let parsed: ListCollectionsResponse = response
            .json()
            .await
            .map_err(|e| Error::Materialization(format!("bad listCollections response: {e}")))?;
        Ok(parsed.collections)
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
#[path = "data_api_tests.rs"]
mod tests;
