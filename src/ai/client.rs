//! HTTP client for the AI cloud functions
//!
//! Stateless request/response calls for prompt generation, reflection and
//! voice-transcript cleanup. Callers attach the signed-in user's bearer
//! token; each request carries a fresh request id.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::Config;
use crate::error::BackendError;

/// AI calls may take a while; still bounded so callers see a failure
/// instead of hanging.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// The three stateless AI operations the app uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiOperation {
    /// Journaling prompt for a wish/goal topic
    GeneratePrompt,
    /// Reflection on a finished entry
    Reflect,
    /// Cleanup of a raw voice transcript
    CleanTranscript,
}

impl AiOperation {
    fn path(self) -> &'static str {
        match self {
            Self::GeneratePrompt => "generate-prompt",
            Self::Reflect => "reflect",
            Self::CleanTranscript => "clean-transcript",
        }
    }
}

/// Transport seam for the AI endpoint, so the gateway is testable
/// without network access.
#[async_trait]
pub trait AiBackend: Send + Sync {
    async fn invoke(
        &self,
        token: &str,
        operation: AiOperation,
        input: &str,
    ) -> Result<String, BackendError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AiRequest<'a> {
    request_id: Uuid,
    input: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AiResponse {
    output: String,
}

pub struct HttpAiClient {
    client: Client,
    base_url: String,
}

impl HttpAiClient {
    pub fn new(config: &Config) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            client,
            base_url: config.ai_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl AiBackend for HttpAiClient {
    async fn invoke(
        &self,
        token: &str,
        operation: AiOperation,
        input: &str,
    ) -> Result<String, BackendError> {
        let body = AiRequest {
            request_id: Uuid::new_v4(),
            input,
        };
        let response = self
            .client
            .post(format!("{}/{}", self.base_url, operation.path()))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Status { status, body });
        }

        let parsed = response
            .json::<AiResponse>()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))?;
        Ok(parsed.output)
    }
}
