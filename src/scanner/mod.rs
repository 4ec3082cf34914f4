use async_trait::async_trait;
use chrono::{ DateTime, Utc };
use rust_decimal::Decimal;
use serde::{ Deserialize, Serialize };

use crate::enums::Chain;
use crate::error::Result;

/// A normalized transfer into one of our deposit addresses, as observed
/// on-chain. Candidates are raw observations; the deposit pipeline decides
/// whether they become deposits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositCandidate {
    pub chain: Chain,
    pub tx_hash: String,
    /// UTXO output index or EVM log index; part of the dedup key.
    pub event_index: i64,
    pub from_address: String,
    pub to_address: String,
    /// Token symbol, resolved against the registry.
    pub token: String,
    pub amount: Decimal,
    pub block_number: Option<i64>,
    pub confirmations: i32,
    pub timestamp: DateTime<Utc>,
}

/// Result of one poll. `scanned_to` is the highest block fully covered by
/// this poll; the caller persists it as the watermark only after every
/// candidate has been ingested, so a crash mid-poll rescans instead of
/// skipping. None for chains that scan per-address rather than per-range.
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    pub candidates: Vec<DepositCandidate>,
    pub scanned_to: Option<i64>,
}

#[async_trait]
pub trait DepositScanner: Send + Sync {
    fn chain(&self) -> Chain;

    /// Current chain tip height.
    async fn tip_height(&self) -> Result<u64>;

    /// One poll: find transfers into the given addresses, starting past
    /// `from_height` where the chain supports range scans. Finite per
    /// call, restartable every cycle; repeated observations of the same
    /// event are expected and deduplicated downstream.
    async fn scan(&self, addresses: &[String], from_height: Option<i64>) -> Result<ScanOutcome>;

    /// Confirmation count for an outbound transaction, used to advance
    /// withdrawals. None while the transaction is unconfirmed or unknown.
    async fn tx_confirmations(&self, tx_hash: &str) -> Result<Option<u64>>;
}
