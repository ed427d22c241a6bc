//! HTTP client for the backend profile store
//!
//! Point reads and partial-merge writes against the profile document,
//! keyed by user id. A missing document is `Ok(None)`, not an error.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};

use super::{ProfilePatch, ProfileStore};
use crate::config::Config;
use crate::entitlement::types::UserProfile;
use crate::error::BackendError;

/// Request timeout: callers see a failure instead of hanging.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct HttpProfileStore {
    client: Client,
    base_url: String,
    api_key: String,
}

impl HttpProfileStore {
    pub fn new(config: &Config) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            client,
            base_url: config.backend_url.trim_end_matches('/').to_string(),
            api_key: config.backend_api_key.clone(),
        })
    }

    fn profile_url(&self, user_id: &str) -> String {
        format!("{}/profiles/{}", self.base_url, user_id)
    }
}

#[async_trait]
impl ProfileStore for HttpProfileStore {
    async fn fetch(&self, user_id: &str) -> Result<Option<UserProfile>, BackendError> {
        let response = self
            .client
            .get(self.profile_url(user_id))
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Status { status, body });
        }

        let profile = response
            .json::<UserProfile>()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))?;
        Ok(Some(profile))
    }

    async fn merge(&self, user_id: &str, patch: &ProfilePatch) -> Result<(), BackendError> {
        let response = self
            .client
            .patch(self.profile_url(user_id))
            .bearer_auth(&self.api_key)
            .json(patch)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Status { status, body });
        }
        Ok(())
    }
}
