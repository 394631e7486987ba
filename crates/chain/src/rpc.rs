use async_trait::async_trait;

use crate::{utxo::Utxo, ChainError};

pub struct SubmitResult {
    pub tx_id: String,
    pub confirmed: bool,
}

/// Opaque chain RPC client. UTXO fetch, submission, and confirmation
/// polling are the three calls the core chain adapters need; a production
/// binary supplies a real implementation talking to a node.
#[async_trait]
pub trait ChainRpc: Send + Sync {
    async fn fetch_utxos(&self, address: &str) -> Result<Vec<Utxo>, ChainError>;
    async fn issue_tx(&self, raw: &[u8]) -> Result<String, ChainError>;
    async fn confirm_tx(&self, tx_id: &str) -> Result<bool, ChainError>;
}
