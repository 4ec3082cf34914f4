use std::str::FromStr;

use regex::Regex;

use crate::enums::Chain;

lazy_static::lazy_static! {
    static ref EVM_ADDRESS: Regex = Regex::new(r"^0x[a-fA-F0-9]{40}$").unwrap();
    static ref TRON_ADDRESS: Regex = Regex::new(r"^T[1-9A-HJ-NP-Za-km-z]{33}$").unwrap();
    static ref BTC_ADDRESS: Regex = Regex::new(r"^(1|3|bc1)[a-zA-HJ-NP-Z0-9]{25,62}$").unwrap();
    static ref SOLANA_ADDRESS: Regex = Regex::new(r"^[1-9A-HJ-NP-Za-km-z]{32,44}$").unwrap();
}

/// Chain-family address format check for withdrawal destinations.
///
/// Bitcoin goes through full parsing on top of the shape check; Solana
/// addresses must base58-decode to 32 bytes.
pub fn is_valid(chain: Chain, address: &str) -> bool {
    match chain {
        Chain::Eth | Chain::Bsc => EVM_ADDRESS.is_match(address),
        Chain::Tron => TRON_ADDRESS.is_match(address),
        Chain::Btc => {
            BTC_ADDRESS.is_match(address) &&
                bitcoin::Address::from_str(address)
                    .map(|a| a.is_valid_for_network(bitcoin::Network::Bitcoin))
                    .unwrap_or(false)
        }
        Chain::Solana => {
            SOLANA_ADDRESS.is_match(address) &&
                bs58::decode(address)
                    .into_vec()
                    .map(|bytes| bytes.len() == 32)
                    .unwrap_or(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evm_addresses() {
        assert!(is_valid(Chain::Eth, "0x742d35cc6634c0532925a3b844bc9e7595f0beb0"));
        assert!(is_valid(Chain::Bsc, "0x742D35Cc6634C0532925a3b844Bc9e7595f0bEb0"));
        assert!(!is_valid(Chain::Eth, "742d35cc6634c0532925a3b844bc9e7595f0beb0"));
        assert!(!is_valid(Chain::Eth, "0x742d35cc"));
        assert!(!is_valid(Chain::Eth, "0x742d35cc6634c0532925a3b844bc9e7595f0bezz"));
    }

    #[test]
    fn test_bitcoin_addresses() {
        assert!(is_valid(Chain::Btc, "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa"));
        assert!(is_valid(Chain::Btc, "3J98t1WpEZ73CNmQviecrnyiWrnqRhWNLy"));
        assert!(is_valid(Chain::Btc, "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4"));
        // Testnet address rejected on mainnet.
        assert!(!is_valid(Chain::Btc, "tb1qw508d6qejxtdg4y5r3zarvary0c5xw7kxpjzsx"));
        assert!(!is_valid(Chain::Btc, "not-an-address"));
    }

    #[test]
    fn test_tron_addresses() {
        assert!(is_valid(Chain::Tron, "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t"));
        assert!(!is_valid(Chain::Tron, "R7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t"));
        assert!(!is_valid(Chain::Tron, "TR7NHqje"));
    }

    #[test]
    fn test_solana_addresses() {
        assert!(is_valid(Chain::Solana, "4Nd1mBQtrMJVYVfKf2PJy9NZUZdTAsp7D4xWLs4gDB4T"));
        // Valid base58 but wrong decoded length.
        assert!(!is_valid(Chain::Solana, "4Nd1mBQtrMJVYVfKf2PJy9NZUZdTAsp7"));
        // 0, O, I, l are not base58.
        assert!(!is_valid(Chain::Solana, "0Nd1mBQtrMJVYVfKf2PJy9NZUZdTAsp7D4xWLs4gDB4T"));
    }
}
