use thiserror::Error;

/// Top-level error surfaced to the user at the command boundary (spec §7).
/// Component-specific errors (`ChainError`, `ProtocolError`, `RoomError`,
/// `SigCodecError`, `WalletError`) are wrapped rather than flattened so the
/// original error kind survives for logging.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Chain(#[from] thresher_chain::ChainError),

    #[error(transparent)]
    Protocol(#[from] thresher_session::ProtocolError),

    #[error(transparent)]
    Wallet(#[from] thresher_wallet::WalletError),

    #[error("signature conversion error: {0}")]
    SignatureConversion(#[from] thresher_sigcodec::SigCodecError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}
