use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{ DateTime, Utc };
use ethers::{
    providers::{ Http, Middleware, Provider },
    types::{ Address, Filter, Log, ValueOrArray, H256, U256 },
    utils::{ format_units, keccak256 },
};
use rust_decimal::Decimal;

use crate::enums::Chain;
use crate::error::{ AppError, Result };
use crate::registry::ChainSpec;
use crate::scanner::{ DepositCandidate, DepositScanner, ScanOutcome };

lazy_static::lazy_static! {
    /// keccak256("Transfer(address,address,uint256)")
    static ref TRANSFER_TOPIC: H256 = H256::from(
        keccak256("Transfer(address,address,uint256)".as_bytes())
    );
}

/// Deposit scanner for EVM chains: ERC20 Transfer logs filtered on our
/// addresses plus native transfers found by walking blocks, both over the
/// watermark..tip range.
pub struct EvmScanner {
    provider: Arc<Provider<Http>>,
    spec: ChainSpec,
    lookback_blocks: u64,
    max_block_range: u64,
}

impl EvmScanner {
    pub fn new(
        rpc_url: &str,
        spec: ChainSpec,
        lookback_blocks: u64,
        max_block_range: u64
    ) -> Result<Self> {
        let provider = Provider::<Http>
            ::try_from(rpc_url)
            .map_err(|e| AppError::Rpc(format!("Failed to create provider: {}", e)))?;

        Ok(Self {
            provider: Arc::new(provider),
            spec,
            lookback_blocks,
            max_block_range,
        })
    }

    fn parse_addresses(&self, addresses: &[String]) -> Vec<Address> {
        addresses
            .iter()
            .filter_map(|a| {
                match a.parse::<Address>() {
                    Ok(addr) => Some(addr),
                    Err(_) => {
                        tracing::warn!(
                            address = %a,
                            chain = %self.spec.chain,
                            "Skipping unparseable deposit address"
                        );
                        None
                    }
                }
            })
            .collect()
    }

    fn confirmations(tip: u64, block: u64) -> i32 {
        (tip.saturating_sub(block) + 1).min(i32::MAX as u64) as i32
    }

    /// Turn one ERC20 Transfer log into a candidate. None for logs we do
    /// not track (unknown contract, malformed payload).
    fn candidate_from_log(&self, log: &Log, tip: u64, now: DateTime<Utc>) -> Option<DepositCandidate> {
        let contract = format!("{:?}", log.address);
        let token = self.registry_token_by_contract(&contract)?;

        if log.topics.len() < 3 || log.data.len() != 32 {
            return None;
        }

        let from = Address::from(log.topics[1]);
        let to = Address::from(log.topics[2]);
        let raw_amount = U256::from_big_endian(log.data.as_ref());

        let amount = format_units(raw_amount, token.1 as u32)
            .ok()
            .and_then(|s| Decimal::from_str(s.trim()).ok())?;

        let block_number = log.block_number.map(|b| b.as_u64());

        Some(DepositCandidate {
            chain: self.spec.chain,
            tx_hash: format!("{:?}", log.transaction_hash?),
            event_index: log.log_index.map(|i| i.as_u64() as i64).unwrap_or(0),
            from_address: format!("{:?}", from),
            to_address: format!("{:?}", to),
            token: token.0,
            amount,
            block_number: block_number.map(|b| b as i64),
            confirmations: block_number.map(|b| Self::confirmations(tip, b)).unwrap_or(0),
            timestamp: now,
        })
    }

    fn registry_token_by_contract(&self, contract: &str) -> Option<(String, u8)> {
        self.spec.tokens
            .iter()
            .find(|t| {
                t.contract_address
                    .as_deref()
                    .map(|a| a.eq_ignore_ascii_case(contract))
                    .unwrap_or(false)
            })
            .map(|t| (t.symbol.clone(), t.decimals))
    }
}

#[async_trait]
impl DepositScanner for EvmScanner {
    fn chain(&self) -> Chain {
        self.spec.chain
    }

    async fn tip_height(&self) -> Result<u64> {
        let tip = self.provider
            .get_block_number().await
            .map_err(|e| AppError::Rpc(format!("Failed to get block number: {}", e)))?;

        Ok(tip.as_u64())
    }

    async fn scan(&self, addresses: &[String], from_height: Option<i64>) -> Result<ScanOutcome> {
        if addresses.is_empty() {
            return Ok(ScanOutcome { candidates: vec![], scanned_to: from_height });
        }

        let tip = self.tip_height().await?;

        let from = match from_height {
            Some(h) => (h as u64) + 1,
            None => tip.saturating_sub(self.lookback_blocks),
        };
        if from > tip {
            return Ok(ScanOutcome { candidates: vec![], scanned_to: from_height });
        }
        let to = tip.min(from + self.max_block_range - 1);

        let watched: Vec<Address> = self.parse_addresses(addresses);
        let watched_set: HashSet<Address> = watched.iter().copied().collect();

        let now = Utc::now();

        // ERC20 transfers to any of our addresses, in one batched filter.
        // A failed fetch fails the whole tick so the watermark stays put.
        let to_topics: Vec<Option<H256>> = watched
            .iter()
            .map(|a| Some(H256::from(*a)))
            .collect();

        let filter = Filter::new()
            .from_block(from)
            .to_block(to)
            .topic0(ValueOrArray::Value(Some(*TRANSFER_TOPIC)))
            .topic2(ValueOrArray::Array(to_topics));

        let logs = self.provider
            .get_logs(&filter).await
            .map_err(|e| AppError::Rpc(format!("Transfer log query failed: {}", e)))?;

        let mut candidates: Vec<DepositCandidate> = logs
            .iter()
            .filter(|log| {
                log.topics
                    .get(2)
                    .map(|t| watched_set.contains(&Address::from(*t)))
                    .unwrap_or(false)
            })
            .filter_map(|log| self.candidate_from_log(log, tip, now))
            .collect();

        // Native transfers require walking the blocks in range. A block
        // fetch failure truncates the tick at the last fully scanned
        // height rather than erroring everything collected so far.
        let mut scanned_to = to;
        'blocks: for number in from..=to {
            let block = match self.provider.get_block_with_txs(number).await {
                Ok(Some(block)) => block,
                Ok(None) => {
                    scanned_to = number.saturating_sub(1);
                    break 'blocks;
                }
                Err(e) => {
                    tracing::warn!(
                        chain = %self.spec.chain,
                        block = number,
                        error = %e,
                        "Block fetch failed, truncating scan"
                    );
                    scanned_to = number.saturating_sub(1);
                    break 'blocks;
                }
            };

            let block_time = DateTime::<Utc>
                ::from_timestamp(block.timestamp.as_u64() as i64, 0)
                .unwrap_or(now);

            for tx in &block.transactions {
                let Some(tx_to) = tx.to else {
                    continue;
                };
                if !watched_set.contains(&tx_to) || tx.value.is_zero() {
                    continue;
                }

                let Some(amount) = format_units(tx.value, 18u32)
                    .ok()
                    .and_then(|s| Decimal::from_str(s.trim()).ok())
                else {
                    continue;
                };

                candidates.push(DepositCandidate {
                    chain: self.spec.chain,
                    tx_hash: format!("{:?}", tx.hash),
                    event_index: 0,
                    from_address: format!("{:?}", tx.from),
                    to_address: format!("{:?}", tx_to),
                    token: self.spec.native_currency.clone(),
                    amount,
                    block_number: Some(number as i64),
                    confirmations: Self::confirmations(tip, number),
                    timestamp: block_time,
                });
            }
        }

        // Drop log candidates beyond the truncation point; they will be
        // rescanned next tick together with their blocks.
        if scanned_to < to {
            candidates.retain(|c| {
                c.block_number.map(|b| b <= scanned_to as i64).unwrap_or(false)
            });
        }

        Ok(ScanOutcome {
            candidates,
            scanned_to: Some(scanned_to as i64),
        })
    }

    async fn tx_confirmations(&self, tx_hash: &str) -> Result<Option<u64>> {
        let hash: H256 = tx_hash
            .parse()
            .map_err(|_| AppError::InvalidInput(format!("Invalid tx hash: {}", tx_hash)))?;

        let receipt = self.provider
            .get_transaction_receipt(hash).await
            .map_err(|e| AppError::Rpc(format!("Receipt query failed: {}", e)))?;

        let Some(block) = receipt.and_then(|r| r.block_number) else {
            return Ok(None);
        };

        let tip = self.tip_height().await?;
        Ok(Some(tip.saturating_sub(block.as_u64()) + 1))
    }
}
