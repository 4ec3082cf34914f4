use std::collections::HashMap;
use std::time::Duration;

use rust_decimal::Decimal;

use crate::enums::Chain;
use crate::error::{ AppError, Result };

/// Per-token deposit/withdrawal limits and fees.
#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub symbol: String,
    pub decimals: u8,
    /// Contract address for tokens; None for the chain's native asset.
    pub contract_address: Option<String>,
    pub min_deposit: Decimal,
    pub min_withdrawal: Decimal,
    pub withdrawal_fee: Decimal,
}

/// Static description of one supported chain: confirmation policy, timing
/// and the tokens we accept on it.
#[derive(Debug, Clone)]
pub struct ChainSpec {
    pub chain: Chain,
    pub native_currency: String,
    pub required_confirmations: i32,
    pub block_time: Duration,
    pub poll_interval: Duration,
    pub explorer_url: String,
    pub tokens: Vec<TokenConfig>,
}

impl ChainSpec {
    pub fn tx_url(&self, tx_hash: &str) -> String {
        format!("{}/tx/{}", self.explorer_url, tx_hash)
    }

    pub fn address_url(&self, address: &str) -> String {
        format!("{}/address/{}", self.explorer_url, address)
    }
}

/// Read-only lookup table over every supported chain/token pair.
///
/// Lookup failures are configuration errors and fatal to the calling
/// operation; nothing here is ever silently defaulted.
#[derive(Debug, Clone)]
pub struct ChainRegistry {
    chains: HashMap<Chain, ChainSpec>,
}

impl ChainRegistry {
    pub fn builtin() -> Self {
        let mut chains = HashMap::new();

        chains.insert(Chain::Eth, ChainSpec {
            chain: Chain::Eth,
            native_currency: "ETH".to_string(),
            required_confirmations: 12,
            block_time: Duration::from_secs(12),
            poll_interval: Duration::from_secs(30),
            explorer_url: "https://etherscan.io".to_string(),
            tokens: vec![
                TokenConfig {
                    symbol: "ETH".to_string(),
                    decimals: 18,
                    contract_address: None,
                    min_deposit: Decimal::new(1, 3), // 0.001
                    min_withdrawal: Decimal::new(1, 2), // 0.01
                    withdrawal_fee: Decimal::new(2, 3), // 0.002
                },
                TokenConfig {
                    symbol: "USDT".to_string(),
                    decimals: 6,
                    contract_address: Some(
                        "0xdac17f958d2ee523a2206206994597c13d831ec7".to_string()
                    ),
                    min_deposit: Decimal::new(1, 0), // 1
                    min_withdrawal: Decimal::new(10, 0), // 10
                    withdrawal_fee: Decimal::new(5, 0), // 5
                },
                TokenConfig {
                    symbol: "USDC".to_string(),
                    decimals: 6,
                    contract_address: Some(
                        "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48".to_string()
                    ),
                    min_deposit: Decimal::new(1, 0),
                    min_withdrawal: Decimal::new(10, 0),
                    withdrawal_fee: Decimal::new(5, 0),
                }
            ],
        });

        chains.insert(Chain::Bsc, ChainSpec {
            chain: Chain::Bsc,
            native_currency: "BNB".to_string(),
            required_confirmations: 15,
            block_time: Duration::from_secs(3),
            poll_interval: Duration::from_secs(3),
            explorer_url: "https://bscscan.com".to_string(),
            tokens: vec![
                TokenConfig {
                    symbol: "BNB".to_string(),
                    decimals: 18,
                    contract_address: None,
                    min_deposit: Decimal::new(1, 2), // 0.01
                    min_withdrawal: Decimal::new(5, 2), // 0.05
                    withdrawal_fee: Decimal::new(5, 4), // 0.0005
                },
                TokenConfig {
                    symbol: "USDT".to_string(),
                    decimals: 18,
                    contract_address: Some(
                        "0x55d398326f99059ff775485246999027b3197955".to_string()
                    ),
                    min_deposit: Decimal::new(1, 0),
                    min_withdrawal: Decimal::new(10, 0),
                    withdrawal_fee: Decimal::new(1, 0), // 1
                }
            ],
        });

        chains.insert(Chain::Btc, ChainSpec {
            chain: Chain::Btc,
            native_currency: "BTC".to_string(),
            required_confirmations: 3,
            block_time: Duration::from_secs(600),
            poll_interval: Duration::from_secs(60),
            explorer_url: "https://mempool.space".to_string(),
            tokens: vec![TokenConfig {
                symbol: "BTC".to_string(),
                decimals: 8,
                contract_address: None,
                min_deposit: Decimal::new(1, 4), // 0.0001
                min_withdrawal: Decimal::new(5, 4), // 0.0005
                withdrawal_fee: Decimal::new(2, 4), // 0.0002
            }],
        });

        chains.insert(Chain::Tron, ChainSpec {
            chain: Chain::Tron,
            native_currency: "TRX".to_string(),
            required_confirmations: 20,
            block_time: Duration::from_secs(3),
            poll_interval: Duration::from_secs(30),
            explorer_url: "https://tronscan.org/#".to_string(),
            tokens: vec![TokenConfig {
                symbol: "USDT".to_string(),
                decimals: 6,
                contract_address: Some("TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t".to_string()),
                min_deposit: Decimal::new(1, 0),
                min_withdrawal: Decimal::new(10, 0),
                withdrawal_fee: Decimal::new(1, 0),
            }],
        });

        chains.insert(Chain::Solana, ChainSpec {
            chain: Chain::Solana,
            native_currency: "SOL".to_string(),
            required_confirmations: 32,
            block_time: Duration::from_millis(400),
            poll_interval: Duration::from_secs(10),
            explorer_url: "https://solscan.io".to_string(),
            tokens: vec![TokenConfig {
                symbol: "SOL".to_string(),
                decimals: 9,
                contract_address: None,
                min_deposit: Decimal::new(1, 2), // 0.01
                min_withdrawal: Decimal::new(5, 2), // 0.05
                withdrawal_fee: Decimal::new(1, 3), // 0.001
            }],
        });

        Self { chains }
    }

    pub fn chain(&self, chain: Chain) -> Result<&ChainSpec> {
        self.chains
            .get(&chain)
            .ok_or_else(|| AppError::Config(format!("Chain not configured: {}", chain)))
    }

    pub fn token(&self, chain: Chain, symbol: &str) -> Result<&TokenConfig> {
        let spec = self.chain(chain)?;
        spec.tokens
            .iter()
            .find(|t| t.symbol.eq_ignore_ascii_case(symbol))
            .ok_or_else(|| {
                AppError::Config(format!("Token {} not configured on {}", symbol, chain))
            })
    }

    /// Resolve a token by its contract address, case-insensitively.
    /// Returns None for contracts we do not track (their transfers are
    /// simply not deposits).
    pub fn token_by_contract(&self, chain: Chain, contract: &str) -> Option<&TokenConfig> {
        self.chains
            .get(&chain)?
            .tokens.iter()
            .find(|t| {
                t.contract_address
                    .as_deref()
                    .map(|a| a.eq_ignore_ascii_case(contract))
                    .unwrap_or(false)
            })
    }

    pub fn chains(&self) -> impl Iterator<Item = &ChainSpec> {
        self.chains.values()
    }

    /// Override timing settings from config (intervals are data, not code).
    pub fn set_poll_interval(&mut self, chain: Chain, interval: Duration) {
        if let Some(spec) = self.chains.get_mut(&chain) {
            spec.poll_interval = interval;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_lookups() {
        let registry = ChainRegistry::builtin();

        let btc = registry.chain(Chain::Btc).unwrap();
        assert_eq!(btc.required_confirmations, 3);

        let usdt = registry.token(Chain::Eth, "usdt").unwrap();
        assert_eq!(usdt.decimals, 6);
        assert!(usdt.contract_address.is_some());
    }

    #[test]
    fn test_unknown_token_is_config_error() {
        let registry = ChainRegistry::builtin();
        let err = registry.token(Chain::Btc, "DOGE").unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn test_token_by_contract_case_insensitive() {
        let registry = ChainRegistry::builtin();
        let token = registry
            .token_by_contract(Chain::Eth, "0xDAC17F958D2EE523A2206206994597C13D831EC7")
            .unwrap();
        assert_eq!(token.symbol, "USDT");

        assert!(registry.token_by_contract(Chain::Eth, "0x0000000000000000000000000000000000000000").is_none());
    }

    #[test]
    fn test_explorer_urls() {
        let registry = ChainRegistry::builtin();
        let eth = registry.chain(Chain::Eth).unwrap();
        assert_eq!(eth.tx_url("0xabc"), "https://etherscan.io/tx/0xabc");
        assert_eq!(eth.address_url("0xdef"), "https://etherscan.io/address/0xdef");
    }
}
