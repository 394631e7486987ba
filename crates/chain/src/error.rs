use thiserror::Error;

/// Error kinds surfaced by chain adapters.
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: u64, available: u64 },

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("invalid destination address: {0}")]
    InvalidAddress(String),

    #[error("chain rpc error: {0}")]
    Rpc(String),

    #[error("rpc call timed out")]
    Timeout,
}
