use std::collections::HashMap;
use std::sync::Arc;
use std::time::{ Duration, SystemTime };
use rand::Rng;
use tokio::sync::RwLock;
use serde::{ Deserialize, Serialize };
use crate::error::{ AppError, Result };

const BINANCE_API_BASE: &str = "https://api.binance.com/api/v3";
const CACHE_DURATION_SECS: u64 = 60; // Cache prices for 1 minute
const MAX_RETRIES: u32 = 3;

const STABLECOINS: &[&str] = &["USDT", "USDC", "DAI"];

// Synthetic peg noise: stablecoins walk inside [0.99, 1.00], re-stepped at
// most every few seconds. Advisory display data only.
const PEG_FLOOR: f64 = 0.99;
const PEG_CEILING: f64 = 1.0;
const PEG_MAX_STEP: f64 = 0.0008;
const PEG_STEP_SECS: u64 = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPrice {
    pub symbol: String,
    pub usd_price: f64,
    pub last_updated: SystemTime,
}

#[derive(Debug, Clone)]
struct CachedPrice {
    price: TokenPrice,
    fetched_at: SystemTime,
}

#[derive(Debug, Clone, Copy)]
struct PegState {
    price: f64,
    stepped_at: SystemTime,
}

pub struct PriceService {
    client: reqwest::Client,
    cache: Arc<RwLock<HashMap<String, CachedPrice>>>,
    pegs: Arc<RwLock<HashMap<String, PegState>>>,
    cache_ttl: Duration,
}

#[derive(Deserialize)]
struct BinanceTicker {
    symbol: String,
    price: String,
}

impl PriceService {
    pub fn new() -> Self {
        Self::with_ttl(Duration::from_secs(CACHE_DURATION_SECS))
    }

    pub fn with_ttl(cache_ttl: Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            cache: Arc::new(RwLock::new(HashMap::new())),
            pegs: Arc::new(RwLock::new(HashMap::new())),
            cache_ttl,
        }
    }

    pub fn is_stablecoin(symbol: &str) -> bool {
        STABLECOINS.iter().any(|s| s.eq_ignore_ascii_case(symbol))
    }

    /// Get the USD price for a single asset symbol.
    pub async fn get_price(&self, symbol: &str) -> Result<TokenPrice> {
        let symbol_upper = symbol.to_uppercase();

        if Self::is_stablecoin(&symbol_upper) {
            return Ok(self.peg_price(&symbol_upper).await);
        }

        if let Some(cached) = self.get_from_cache(&symbol_upper).await {
            return Ok(cached);
        }

        let binance_symbol = Self::symbol_to_binance_pair(&symbol_upper).ok_or_else(||
            AppError::InvalidInput(format!("Unknown token symbol: {}", symbol))
        )?;

        let price = self.fetch_ticker(&binance_symbol, &symbol_upper).await?;

        self.update_cache(symbol_upper, price.clone()).await;

        Ok(price)
    }

    /// Get prices for multiple assets at once.
    pub async fn get_prices(&self, symbols: &[String]) -> Result<HashMap<String, TokenPrice>> {
        let mut results = HashMap::new();
        let mut symbols_to_fetch = Vec::new();

        for symbol in symbols {
            let symbol_upper = symbol.to_uppercase();
            if Self::is_stablecoin(&symbol_upper) {
                let price = self.peg_price(&symbol_upper).await;
                results.insert(symbol_upper, price);
            } else if let Some(cached) = self.get_from_cache(&symbol_upper).await {
                results.insert(symbol_upper, cached);
            } else {
                symbols_to_fetch.push(symbol_upper);
            }
        }

        if !symbols_to_fetch.is_empty() {
            let fetched = self.fetch_multiple_prices(&symbols_to_fetch).await?;
            for (symbol, price) in fetched {
                self.update_cache(symbol.clone(), price.clone()).await;
                results.insert(symbol, price);
            }
        }

        Ok(results)
    }

    /// Bounded random-walk price for a pegged asset. Steps at most every
    /// PEG_STEP_SECS, never leaves [PEG_FLOOR, PEG_CEILING].
    async fn peg_price(&self, symbol: &str) -> TokenPrice {
        let now = SystemTime::now();
        let mut pegs = self.pegs.write().await;

        let state = pegs.entry(symbol.to_string()).or_insert(PegState {
            price: 0.995,
            stepped_at: now,
        });

        let age = now.duration_since(state.stepped_at).unwrap_or(Duration::ZERO);
        if age.as_secs() >= PEG_STEP_SECS {
            let step = rand::rng().random_range(-PEG_MAX_STEP..=PEG_MAX_STEP);
            state.price = (state.price + step).clamp(PEG_FLOOR, PEG_CEILING);
            state.stepped_at = now;
        }

        TokenPrice {
            symbol: symbol.to_string(),
            usd_price: state.price,
            last_updated: state.stepped_at,
        }
    }

    async fn get_from_cache(&self, symbol: &str) -> Option<TokenPrice> {
        let cache = self.cache.read().await;
        if let Some(cached) = cache.get(symbol) {
            let age = SystemTime::now()
                .duration_since(cached.fetched_at)
                .unwrap_or(Duration::from_secs(999));

            if age < self.cache_ttl {
                return Some(cached.price.clone());
            }
        }
        None
    }

    async fn update_cache(&self, symbol: String, price: TokenPrice) {
        let mut cache = self.cache.write().await;
        cache.insert(symbol, CachedPrice {
            price,
            fetched_at: SystemTime::now(),
        });
    }

    /// Fetch a URL with retry on 429 rate-limit responses
    async fn fetch_with_retry(&self, url: &str) -> Result<reqwest::Response> {
        let mut last_err = None;
        for attempt in 0..MAX_RETRIES {
            let response = self.client
                .get(url)
                .send().await
                .map_err(|e| AppError::External(format!("Binance API error: {}", e)))?;

            if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
                let wait_secs = 2u64.pow(attempt + 1);
                tokio::time::sleep(Duration::from_secs(wait_secs)).await;
                last_err = Some(AppError::External("Binance rate limited".to_string()));
                continue;
            }

            if !response.status().is_success() {
                return Err(
                    AppError::External(format!("Binance API returned status: {}", response.status()))
                );
            }

            return Ok(response);
        }
        Err(
            last_err.unwrap_or_else(||
                AppError::External("Binance API request failed after retries".to_string())
            )
        )
    }

    async fn fetch_ticker(&self, binance_symbol: &str, symbol: &str) -> Result<TokenPrice> {
        let url = format!("{}/ticker/price?symbol={}", BINANCE_API_BASE, binance_symbol);

        let response = self.fetch_with_retry(&url).await?;

        let ticker: BinanceTicker = response
            .json().await
            .map_err(|e| AppError::External(format!("Failed to parse Binance response: {}", e)))?;

        let usd_price: f64 = ticker.price.parse().unwrap_or(0.0);

        Ok(TokenPrice {
            symbol: symbol.to_string(),
            usd_price,
            last_updated: SystemTime::now(),
        })
    }

    async fn fetch_multiple_prices(
        &self,
        symbols: &[String]
    ) -> Result<HashMap<String, TokenPrice>> {
        let pairs: Vec<(&String, String)> = symbols
            .iter()
            .filter_map(|s| Self::symbol_to_binance_pair(s).map(|pair| (s, pair)))
            .collect();

        if pairs.is_empty() {
            return Ok(HashMap::new());
        }

        let binance_symbols: Vec<String> = pairs
            .iter()
            .map(|(_, p)| format!("\"{}\"", p))
            .collect();
        let symbols_param = format!("[{}]", binance_symbols.join(","));

        let url = format!(
            "{}/ticker/price?symbols={}",
            BINANCE_API_BASE,
            urlencoding::encode(&symbols_param)
        );

        let response = self.fetch_with_retry(&url).await?;

        let tickers: Vec<BinanceTicker> = response
            .json().await
            .map_err(|e| AppError::External(format!("Failed to parse Binance response: {}", e)))?;

        let ticker_map: HashMap<String, &BinanceTicker> = tickers
            .iter()
            .map(|t| (t.symbol.clone(), t))
            .collect();

        let mut results = HashMap::new();
        for (symbol, binance_pair) in &pairs {
            if let Some(ticker) = ticker_map.get(binance_pair) {
                let usd_price: f64 = ticker.price.parse().unwrap_or(0.0);

                results.insert((*symbol).clone(), TokenPrice {
                    symbol: (*symbol).clone(),
                    usd_price,
                    last_updated: SystemTime::now(),
                });
            }
        }

        Ok(results)
    }

    /// Map an asset symbol to a Binance USDT trading pair.
    fn symbol_to_binance_pair(symbol: &str) -> Option<String> {
        let base = match symbol {
            "BTC" | "BITCOIN" => "BTC",
            "ETH" | "ETHEREUM" => "ETH",
            "BNB" | "BSC" => "BNB",
            "SOL" | "SOLANA" => "SOL",
            "TRX" | "TRON" => "TRX",
            _ => return None,
        };
        Some(format!("{}USDT", base))
    }
}

impl Default for PriceService {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_peg_price_stays_bounded() {
        let service = PriceService::new();

        for _ in 0..200 {
            let price = service.peg_price("USDT").await;
            assert!(price.usd_price >= PEG_FLOOR);
            assert!(price.usd_price <= PEG_CEILING);
        }
    }

    #[tokio::test]
    async fn test_peg_price_does_not_step_between_intervals() {
        let service = PriceService::new();

        let first = service.peg_price("USDC").await;
        let second = service.peg_price("USDC").await;

        // Two immediate reads fall inside the same step window.
        assert_eq!(first.usd_price, second.usd_price);
    }

    #[tokio::test]
    async fn test_get_prices_serves_stablecoins_without_fetching() {
        let service = PriceService::new();

        let symbols = vec!["USDT".to_string(), "usdc".to_string()];
        let prices = service.get_prices(&symbols).await.unwrap();

        assert_eq!(prices.len(), 2);
        assert!(prices["USDT"].usd_price >= PEG_FLOOR);
        assert!(prices["USDC"].usd_price <= PEG_CEILING);
    }

    #[test]
    fn test_stablecoin_detection() {
        assert!(PriceService::is_stablecoin("USDT"));
        assert!(PriceService::is_stablecoin("usdc"));
        assert!(!PriceService::is_stablecoin("BTC"));
    }

    #[test]
    fn test_binance_pair_mapping() {
        assert_eq!(PriceService::symbol_to_binance_pair("BTC"), Some("BTCUSDT".to_string()));
        assert_eq!(PriceService::symbol_to_binance_pair("UNLISTED"), None);
    }
}
