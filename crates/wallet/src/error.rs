use thiserror::Error;

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("wallet '{0}' has not completed keygen yet")]
    NotInitialized(String),

    #[error("wallet '{0}' has already completed keygen with different key material")]
    AlreadyInitialized(String),

    #[error(transparent)]
    Chain(#[from] thresher_chain::ChainError),

    #[error("malformed key material: {0}")]
    Decode(String),
}
