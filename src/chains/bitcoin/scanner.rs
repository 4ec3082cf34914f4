use async_trait::async_trait;
use chrono::{ DateTime, Utc };
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::enums::Chain;
use crate::error::{ AppError, Result };
use crate::scanner::{ DepositCandidate, DepositScanner, ScanOutcome };

/// Deposit scanner for Bitcoin over an esplora-style API (mempool.space).
/// UTXO model: every matching output of every transaction touching one of
/// our addresses is a candidate; the (chain, txid, vout) key deduplicates
/// across polls, so no watermark is kept.
pub struct BitcoinScanner {
    client: reqwest::Client,
    base_url: String,
}

// ── Esplora API response types ──────────────────────────────────────

#[derive(Debug, Deserialize)]
struct EsploraTx {
    txid: String,
    vin: Vec<EsploraVin>,
    vout: Vec<EsploraVout>,
    status: EsploraTxStatus,
}

#[derive(Debug, Deserialize)]
struct EsploraVin {
    prevout: Option<EsploraVout>,
}

#[derive(Debug, Deserialize)]
struct EsploraVout {
    scriptpubkey_address: Option<String>,
    value: u64,
}

#[derive(Debug, Deserialize)]
struct EsploraTxStatus {
    confirmed: bool,
    block_height: Option<u64>,
    block_time: Option<i64>,
}

// ── Implementation ──────────────────────────────────────────────────

impl BitcoinScanner {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(15))
                .build()
                .unwrap_or_default(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self.client
            .get(&url)
            .send().await
            .map_err(|e| AppError::External(format!("Esplora request failed: {}", e)))?;

        if !resp.status().is_success() {
            return Err(AppError::External(format!("Esplora API error: {}", resp.status())));
        }

        resp
            .json().await
            .map_err(|e| AppError::External(format!("Failed to parse Esplora response: {}", e)))
    }

    async fn address_txs(&self, address: &str) -> Result<Vec<EsploraTx>> {
        self.get_json(&format!("/address/{}/txs", address)).await
    }

    fn satoshis_to_btc(sats: u64) -> Decimal {
        Decimal::new(sats as i64, 8)
    }

    fn confirmations(tip: u64, status: &EsploraTxStatus) -> i32 {
        match (status.confirmed, status.block_height) {
            (true, Some(height)) => (tip.saturating_sub(height) + 1).min(i32::MAX as u64) as i32,
            _ => 0,
        }
    }

    /// Best-effort sender: the address behind the first input. Multi-input
    /// transactions have no single sender; the first is informative only.
    fn from_address(tx: &EsploraTx) -> String {
        tx.vin
            .iter()
            .filter_map(|vin| vin.prevout.as_ref())
            .filter_map(|prev| prev.scriptpubkey_address.clone())
            .next()
            .unwrap_or_else(|| "unknown".to_string())
    }
}

#[async_trait]
impl DepositScanner for BitcoinScanner {
    fn chain(&self) -> Chain {
        Chain::Btc
    }

    async fn tip_height(&self) -> Result<u64> {
        let url = format!("{}/blocks/tip/height", self.base_url);
        let resp = self.client
            .get(&url)
            .send().await
            .map_err(|e| AppError::External(format!("Esplora request failed: {}", e)))?;

        if !resp.status().is_success() {
            return Err(AppError::External(format!("Esplora API error: {}", resp.status())));
        }

        let body = resp
            .text().await
            .map_err(|e| AppError::External(format!("Failed to read tip height: {}", e)))?;

        body
            .trim()
            .parse()
            .map_err(|_| AppError::External(format!("Unexpected tip height: {}", body)))
    }

    async fn scan(&self, addresses: &[String], _from_height: Option<i64>) -> Result<ScanOutcome> {
        if addresses.is_empty() {
            return Ok(ScanOutcome { candidates: vec![], scanned_to: None });
        }

        let tip = self.tip_height().await?;
        let mut candidates = Vec::new();

        for address in addresses {
            // A failing address must not fail the whole tick; skip it and
            // let the next cycle retry.
            let txs = match self.address_txs(address).await {
                Ok(txs) => txs,
                Err(e) => {
                    tracing::warn!(address = %address, error = %e, "Address scan failed, skipping");
                    continue;
                }
            };

            for tx in &txs {
                let confirmations = Self::confirmations(tip, &tx.status);
                let timestamp = tx.status.block_time
                    .and_then(|t| DateTime::<Utc>::from_timestamp(t, 0))
                    .unwrap_or_else(Utc::now);
                let from_address = Self::from_address(tx);

                for (vout_index, vout) in tx.vout.iter().enumerate() {
                    if vout.scriptpubkey_address.as_deref() != Some(address.as_str()) {
                        continue;
                    }

                    candidates.push(DepositCandidate {
                        chain: Chain::Btc,
                        tx_hash: tx.txid.clone(),
                        event_index: vout_index as i64,
                        from_address: from_address.clone(),
                        to_address: address.clone(),
                        token: "BTC".to_string(),
                        amount: Self::satoshis_to_btc(vout.value),
                        block_number: tx.status.block_height.map(|h| h as i64),
                        confirmations,
                        timestamp,
                    });
                }
            }
        }

        Ok(ScanOutcome { candidates, scanned_to: None })
    }

    async fn tx_confirmations(&self, tx_hash: &str) -> Result<Option<u64>> {
        let status: EsploraTxStatus = self.get_json(&format!("/tx/{}/status", tx_hash)).await?;

        match (status.confirmed, status.block_height) {
            (true, Some(height)) => {
                let tip = self.tip_height().await?;
                Ok(Some(tip.saturating_sub(height) + 1))
            }
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_satoshis_to_btc() {
        assert_eq!(BitcoinScanner::satoshis_to_btc(50_000_000).to_string(), "0.50000000");
        assert_eq!(BitcoinScanner::satoshis_to_btc(1).to_string(), "0.00000001");
    }

    #[test]
    fn test_confirmations_from_status() {
        let confirmed = EsploraTxStatus {
            confirmed: true,
            block_height: Some(900_000),
            block_time: Some(1_700_000_000),
        };
        assert_eq!(BitcoinScanner::confirmations(900_002, &confirmed), 3);

        let mempool = EsploraTxStatus {
            confirmed: false,
            block_height: None,
            block_time: None,
        };
        assert_eq!(BitcoinScanner::confirmations(900_002, &mempool), 0);
    }

    #[test]
    fn test_parse_address_txs_payload() {
        let payload = r#"[{
            "txid": "f4184fc596403b9d638783cf57adfe4c75c605f6356fbc91338530e9831e9e16",
            "vin": [{"prevout": {"scriptpubkey_address": "bc1qsender", "value": 60000000}}],
            "vout": [
                {"scriptpubkey_address": "bc1qdeposit", "value": 50000000},
                {"scriptpubkey_address": "bc1qchange", "value": 9990000}
            ],
            "status": {"confirmed": true, "block_height": 899999, "block_time": 1700000000}
        }]"#;

        let txs: Vec<EsploraTx> = serde_json::from_str(payload).unwrap();
        assert_eq!(txs.len(), 1);
        assert_eq!(BitcoinScanner::from_address(&txs[0]), "bc1qsender");
        assert_eq!(txs[0].vout[0].value, 50_000_000);
        assert!(txs[0].status.confirmed);
    }
}
