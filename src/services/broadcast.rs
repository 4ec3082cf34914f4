use async_trait::async_trait;
use serde::{ Deserialize, Serialize };

use crate::db::entity::withdrawal;
use crate::error::{ AppError, Result };

/// The external signer/broadcaster. Given a verified withdrawal it signs
/// and broadcasts the raw transaction and returns the resulting tx hash.
/// Key custody lives entirely on the other side of this trait.
///
/// Implementations must be idempotent on `withdrawal_id`: re-broadcasting
/// a withdrawal that was already signed returns the original tx hash, it
/// never spends a second time. The pipeline records every attempt before
/// calling, so a crash between signing and storing the hash results in a
/// re-send of the same `withdrawal_id`, not a fresh transaction.
#[async_trait]
pub trait Broadcaster: Send + Sync {
    async fn broadcast(&self, withdrawal: &withdrawal::Model) -> Result<String>;
}

#[derive(Serialize)]
struct BroadcastRequest<'a> {
    withdrawal_id: uuid::Uuid,
    chain: &'a str,
    currency: &'a str,
    to_address: &'a str,
    amount: String,
}

#[derive(Deserialize)]
struct BroadcastResponse {
    tx_hash: String,
}

/// HTTP client for a signer service. The signer deduplicates on the
/// `withdrawal_id` carried in every request.
pub struct HttpBroadcaster {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBroadcaster {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl Broadcaster for HttpBroadcaster {
    async fn broadcast(&self, withdrawal: &withdrawal::Model) -> Result<String> {
        let url = format!("{}/broadcast", self.base_url);

        let request = BroadcastRequest {
            withdrawal_id: withdrawal.id,
            chain: &withdrawal.chain,
            currency: &withdrawal.currency,
            to_address: &withdrawal.to_address,
            // The net amount is what actually moves on-chain.
            amount: withdrawal.net_amount.to_string(),
        };

        let resp = self.client
            .post(&url)
            .json(&request)
            .send().await
            .map_err(|e| AppError::External(format!("Signer request failed: {}", e)))?;

        if !resp.status().is_success() {
            return Err(AppError::External(format!("Signer returned status: {}", resp.status())));
        }

        let body: BroadcastResponse = resp
            .json().await
            .map_err(|e| AppError::External(format!("Failed to parse signer response: {}", e)))?;

        Ok(body.tx_hash)
    }
}
