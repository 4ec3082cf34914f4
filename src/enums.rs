use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

// ─── Chain ───────────────────────────────────────────────────────────

/// Supported blockchain networks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Chain {
    Eth,
    Bsc,
    Btc,
    Tron,
    Solana,
}

impl Chain {
    /// Canonical string stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Chain::Eth => "ETH",
            Chain::Bsc => "BSC",
            Chain::Btc => "BTC",
            Chain::Tron => "TRON",
            Chain::Solana => "SOLANA",
        }
    }

    /// Native token symbol for the chain.
    pub fn native_symbol(&self) -> &'static str {
        match self {
            Chain::Eth => "ETH",
            Chain::Bsc => "BNB",
            Chain::Btc => "BTC",
            Chain::Tron => "TRX",
            Chain::Solana => "SOL",
        }
    }

    /// EVM chain ID. Returns None for non-EVM chains.
    pub fn chain_id(&self) -> Option<u64> {
        match self {
            Chain::Eth => Some(1),
            Chain::Bsc => Some(56),
            Chain::Btc | Chain::Tron | Chain::Solana => None,
        }
    }

    /// Whether this chain uses the EVM (Ethereum Virtual Machine).
    pub fn is_evm(&self) -> bool {
        matches!(self, Chain::Eth | Chain::Bsc)
    }

    /// Whether this chain uses the UTXO model.
    pub fn is_utxo(&self) -> bool {
        matches!(self, Chain::Btc)
    }

    pub fn all() -> &'static [Chain] {
        &[Chain::Eth, Chain::Bsc, Chain::Btc, Chain::Tron, Chain::Solana]
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Chain {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "ETH" => Ok(Chain::Eth),
            "BSC" => Ok(Chain::Bsc),
            "BTC" => Ok(Chain::Btc),
            "TRON" => Ok(Chain::Tron),
            "SOLANA" => Ok(Chain::Solana),
            other => Err(AppError::Config(format!("Unknown chain: {}", other))),
        }
    }
}

// ─── Deposit status ──────────────────────────────────────────────────

/// Deposit lifecycle. There is no failed state: an invalid candidate is
/// never persisted in the first place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DepositStatus {
    Pending,
    Confirming,
    Completed,
}

impl DepositStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DepositStatus::Pending => "PENDING",
            DepositStatus::Confirming => "CONFIRMING",
            DepositStatus::Completed => "COMPLETED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, DepositStatus::Completed)
    }
}

impl fmt::Display for DepositStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DepositStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(DepositStatus::Pending),
            "CONFIRMING" => Ok(DepositStatus::Confirming),
            "COMPLETED" => Ok(DepositStatus::Completed),
            other => Err(AppError::Internal(format!("Unknown deposit status: {}", other))),
        }
    }
}

// ─── Withdrawal status ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WithdrawalStatus {
    Pending,
    Processing,
    AwaitingConfirmation,
    Completed,
    Cancelled,
    Failed,
}

impl WithdrawalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawalStatus::Pending => "PENDING",
            WithdrawalStatus::Processing => "PROCESSING",
            WithdrawalStatus::AwaitingConfirmation => "AWAITING_CONFIRMATION",
            WithdrawalStatus::Completed => "COMPLETED",
            WithdrawalStatus::Cancelled => "CANCELLED",
            WithdrawalStatus::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WithdrawalStatus::Completed | WithdrawalStatus::Cancelled | WithdrawalStatus::Failed
        )
    }

    /// Cancellation is only valid before anything was handed to the
    /// broadcaster; once AWAITING_CONFIRMATION the funds may be in flight.
    pub fn is_cancellable(&self) -> bool {
        matches!(self, WithdrawalStatus::Pending | WithdrawalStatus::Processing)
    }
}

impl fmt::Display for WithdrawalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for WithdrawalStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(WithdrawalStatus::Pending),
            "PROCESSING" => Ok(WithdrawalStatus::Processing),
            "AWAITING_CONFIRMATION" => Ok(WithdrawalStatus::AwaitingConfirmation),
            "COMPLETED" => Ok(WithdrawalStatus::Completed),
            "CANCELLED" => Ok(WithdrawalStatus::Cancelled),
            "FAILED" => Ok(WithdrawalStatus::Failed),
            other => Err(AppError::Internal(format!("Unknown withdrawal status: {}", other))),
        }
    }
}

// ─── Verification code kind ──────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CodeKind {
    Withdrawal,
}

impl CodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CodeKind::Withdrawal => "WITHDRAWAL",
        }
    }
}

impl fmt::Display for CodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_roundtrip() {
        for chain in Chain::all() {
            assert_eq!(chain.as_str().parse::<Chain>().unwrap(), *chain);
        }
    }

    #[test]
    fn test_chain_families() {
        assert!(Chain::Eth.is_evm());
        assert!(Chain::Bsc.is_evm());
        assert!(!Chain::Btc.is_evm());
        assert!(Chain::Btc.is_utxo());
        assert!(!Chain::Solana.is_utxo());
    }

    #[test]
    fn test_withdrawal_status_transition_guards() {
        assert!(WithdrawalStatus::Pending.is_cancellable());
        assert!(WithdrawalStatus::Processing.is_cancellable());
        assert!(!WithdrawalStatus::AwaitingConfirmation.is_cancellable());
        assert!(!WithdrawalStatus::Completed.is_cancellable());
        assert!(WithdrawalStatus::Cancelled.is_terminal());
        assert!(WithdrawalStatus::Failed.is_terminal());
        assert!(!WithdrawalStatus::AwaitingConfirmation.is_terminal());
    }

    #[test]
    fn test_deposit_status_terminal() {
        assert!(!DepositStatus::Pending.is_terminal());
        assert!(!DepositStatus::Confirming.is_terminal());
        assert!(DepositStatus::Completed.is_terminal());
    }
}
