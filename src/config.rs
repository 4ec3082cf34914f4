use std::collections::HashMap;
use std::env;
use std::time::Duration;

use crate::enums::Chain;
use crate::error::{ AppError, Result };

/// Data-source settings for one scanned chain, resolved from environment
/// variables. Chains without a configured endpoint are simply not scanned.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub chain: Chain,
    /// EVM RPC endpoint or esplora-style API base, depending on the chain.
    pub endpoint: String,
    /// Overrides the registry's default poll interval when set.
    pub poll_interval: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub scan_configs: HashMap<Chain, ScanConfig>,
    pub signer_url: String,
    pub server_host: String,
    pub server_port: u16,
    /// How far back a fresh EVM scan starts when no watermark exists yet.
    pub scan_lookback_blocks: u64,
    /// Upper bound on blocks covered by a single EVM scan tick.
    pub scan_max_block_range: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let database_url = env
            ::var("DATABASE_URL")
            .map_err(|_| AppError::Config("DATABASE_URL is not set".to_string()))?;

        let signer_url = env
            ::var("SIGNER_URL")
            .map_err(|_| AppError::Config("SIGNER_URL is not set".to_string()))?;

        // Build scan configs for whichever chains have endpoints set.
        let mut scan_configs = HashMap::new();
        for &chain in Chain::all() {
            let endpoint_key = if chain.is_evm() {
                format!("{}_RPC_URL", chain.as_str())
            } else {
                format!("{}_API_URL", chain.as_str())
            };

            if let Ok(endpoint) = env::var(&endpoint_key) {
                let poll_interval = env
                    ::var(format!("{}_POLL_INTERVAL_SECS", chain.as_str()))
                    .ok()
                    .map(|v| {
                        v
                            .parse::<u64>()
                            .map(Duration::from_secs)
                            .map_err(|_| {
                                AppError::Config(
                                    format!("{}_POLL_INTERVAL_SECS must be an integer", chain)
                                )
                            })
                    })
                    .transpose()?;

                scan_configs.insert(chain, ScanConfig {
                    chain,
                    endpoint: endpoint.trim_end_matches('/').to_string(),
                    poll_interval,
                });
            }
        }

        if scan_configs.is_empty() {
            return Err(
                AppError::Config(
                    "No chain endpoints configured. Set at least one *_RPC_URL or *_API_URL.".to_string()
                )
            );
        }

        let server_host = env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let server_port = env
            ::var("SERVER_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .map_err(|_| AppError::Config("SERVER_PORT must be a port number".to_string()))?;

        let scan_lookback_blocks = env
            ::var("SCAN_LOOKBACK_BLOCKS")
            .unwrap_or_else(|_| "1000".to_string())
            .parse()
            .map_err(|_| AppError::Config("SCAN_LOOKBACK_BLOCKS must be an integer".to_string()))?;

        let scan_max_block_range = env
            ::var("SCAN_MAX_BLOCK_RANGE")
            .unwrap_or_else(|_| "2000".to_string())
            .parse()
            .map_err(|_| AppError::Config("SCAN_MAX_BLOCK_RANGE must be an integer".to_string()))?;

        Ok(Config {
            database_url,
            scan_configs,
            signer_url,
            server_host,
            server_port,
            scan_lookback_blocks,
            scan_max_block_range,
        })
    }

    /// Chains this instance actively scans.
    pub fn scanned_chains(&self) -> Vec<Chain> {
        self.scan_configs.keys().copied().collect()
    }
}
