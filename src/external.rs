//! Client for the external service that approves each work item.

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::Result;

/// Success/failure oracle consulted once per work item.
#[async_trait]
pub trait ExternalApi: Send + Sync {
    /// `true` when the service accepted the item. Transport errors are `false`.
    async fn process(&self, id: i64, branch: &str) -> bool;
}

/// [`ExternalApi`] over HTTP: POSTs `{"id", "branch"}` as JSON.
pub struct HttpExternalApi {
    client: reqwest::Client,
    url: String,
}

impl HttpExternalApi {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl ExternalApi for HttpExternalApi {
    async fn process(&self, id: i64, branch: &str) -> bool {
        let body = serde_json::json!({ "id": id, "branch": branch });
        match self.client.post(&self.url).json(&body).send().await {
            Ok(response) if response.status().is_success() => {
                debug!(id, branch, status = %response.status(), "external api accepted item");
                true
            }
            Ok(response) => {
                warn!(id, branch, status = %response.status(), "external api rejected item");
                false
            }
            Err(e) => {
                warn!(id, branch, error = %e, "external api call failed");
                false
            }
        }
    }
}
