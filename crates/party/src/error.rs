use thiserror::Error;

/// Errors surfaced while deriving or (de)serializing identity material.
#[derive(Debug, Error)]
pub enum PartyError {
    #[error("invalid base64 key material: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("malformed ed25519 key: {0}")]
    Key(#[from] ed25519_dalek::SignatureError),

    #[error("key material has the wrong length: expected {expected}, got {got}")]
    WrongLength { expected: usize, got: usize },
}
