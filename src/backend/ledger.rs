//! HTTP client for the purchase ledger service
//!
//! Wraps the ledger's subscriber API: current entitlements, purchase, and
//! restore. Wire entitlements are keyed by product name (`plus`/`connect`);
//! anything else is ignored.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Response};
use serde::Deserialize;
use tracing::debug;

use super::PurchaseLedger;
use crate::config::Config;
use crate::entitlement::types::{LedgerEntitlement, LedgerSnapshot, Platform, Tier};
use crate::error::{BackendError, PurchaseError};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Wire shape of one entitlement in the subscriber response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireEntitlement {
    #[serde(default)]
    is_active: bool,
    #[serde(default)]
    expires_date: Option<DateTime<Utc>>,
    #[serde(default)]
    will_renew: bool,
    #[serde(default)]
    store: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubscriberResponse {
    #[serde(default)]
    entitlements: HashMap<String, WireEntitlement>,
}

/// Wire shape of a ledger error body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LedgerErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

pub struct HttpPurchaseLedger {
    client: Client,
    base_url: String,
    api_key: String,
}

impl HttpPurchaseLedger {
    pub fn new(config: &Config) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            client,
            base_url: config.ledger_url.trim_end_matches('/').to_string(),
            api_key: config.ledger_api_key.clone(),
        })
    }

    fn subscriber_url(&self, user_id: &str) -> String {
        format!("{}/subscribers/{}", self.base_url, user_id)
    }

    async fn decode_snapshot(response: Response) -> Result<LedgerSnapshot, BackendError> {
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Status { status, body });
        }
        let subscriber = response
            .json::<SubscriberResponse>()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))?;
        Ok(snapshot_from_wire(subscriber))
    }

    /// Map a failed purchase/restore response into the purchase taxonomy.
    /// Cancellation is reported distinctly so the UI can stay silent.
    async fn purchase_failure(response: Response) -> PurchaseError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        if let Ok(parsed) = serde_json::from_str::<LedgerErrorBody>(&body) {
            match parsed.code.as_deref() {
                Some("purchase_cancelled") => return PurchaseError::Cancelled,
                Some("payment_declined") => {
                    return PurchaseError::Declined(
                        parsed.message.unwrap_or_else(|| "payment declined".to_string()),
                    )
                }
                _ => {}
            }
        }
        PurchaseError::Backend(BackendError::Status { status, body })
    }
}

fn snapshot_from_wire(subscriber: SubscriberResponse) -> LedgerSnapshot {
    let entitlements = subscriber
        .entitlements
        .into_iter()
        .filter_map(|(name, wire)| {
            let tier = match name.as_str() {
                "plus" => Tier::Plus,
                "connect" => Tier::Connect,
                other => {
                    debug!(entitlement = other, "ignoring unknown ledger entitlement");
                    return None;
                }
            };
            Some(LedgerEntitlement {
                tier,
                is_active: wire.is_active,
                expiration_date: wire.expires_date,
                will_renew: wire.will_renew,
                platform: wire.store.as_deref().map(platform_from_store),
            })
        })
        .collect();
    LedgerSnapshot { entitlements }
}

fn platform_from_store(store: &str) -> Platform {
    match store {
        "app_store" | "ios" => Platform::IosStore,
        "play_store" | "android" => Platform::AndroidStore,
        _ => Platform::WebBilling,
    }
}

#[async_trait]
impl PurchaseLedger for HttpPurchaseLedger {
    async fn entitlements(&self, user_id: &str) -> Result<LedgerSnapshot, BackendError> {
        let response = self
            .client
            .get(self.subscriber_url(user_id))
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        Self::decode_snapshot(response).await
    }

    async fn purchase(
        &self,
        user_id: &str,
        package_id: &str,
    ) -> Result<LedgerSnapshot, PurchaseError> {
        let response = self
            .client
            .post(format!("{}/purchases", self.subscriber_url(user_id)))
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({ "packageId": package_id }))
            .send()
            .await
            .map_err(BackendError::from)?;

        if !response.status().is_success() {
            return Err(Self::purchase_failure(response).await);
        }
        Self::decode_snapshot(response).await.map_err(PurchaseError::from)
    }

    async fn restore(&self, user_id: &str) -> Result<LedgerSnapshot, PurchaseError> {
        let response = self
            .client
            .post(format!("{}/restore", self.subscriber_url(user_id)))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(BackendError::from)?;

        if !response.status().is_success() {
            return Err(Self::purchase_failure(response).await);
        }
        Self::decode_snapshot(response).await.map_err(PurchaseError::from)
    }
}
