//! Chain adapter — address formatting, unsigned-tx construction, signature
//! attachment, submission, confirmation polling.
//!
//! Two concrete variants: [`utxo::UtxoAdapter`] (Avalanche X-chain-shaped,
//! grounded in `wallet/avmwallet/avmwallet.go`) and
//! [`account::AccountAdapter`] (Ethereum-shaped, grounded in
//! `wallet/ethwallet/ethwallet.go`). Chain RPC clients are out of scope here;
//! adapters depend on an injected [`ChainRpc`].

mod account;
mod error;
mod rpc;
mod utxo;

pub use account::AccountAdapter;
pub use error::ChainError;
pub use rpc::{ChainRpc, SubmitResult};
pub use utxo::{Utxo, UtxoAdapter, UtxoAssetId, UtxoTxId};

use async_trait::async_trait;
use k256::ecdsa::VerifyingKey;

/// A signed, chain-native payload ready to submit, and its tx id once known.
pub struct SignedTx {
    pub raw: Vec<u8>,
}

/// An unsigned transaction plus the 32-byte hash the signing session must
/// produce a signature over.
pub struct UnsignedTx {
    pub raw: Vec<u8>,
    pub message_hash: [u8; 32],
}

/// The chain-specific collaborator the core `Wallet` delegates to.
/// Two shapes cover the common cases: UTXO-based chains and account-based
/// chains.
#[async_trait]
pub trait ChainAdapter: Send + Sync {
    /// Derive this chain's string address form from the wallet's public key.
    fn format_address(&self, public_key: &VerifyingKey) -> String;

    /// Build an unsigned transaction and the hash to sign.
    async fn create_unsigned_tx(
        &self,
        public_key: &VerifyingKey,
        asset: &str,
        amount: u64,
        dest: &str,
        memo: &str,
    ) -> Result<UnsignedTx, ChainError>;

    /// Attach a 65-byte recoverable signature (chain-agnostic `{0,1,2,3}`
    /// form) to an unsigned transaction, remapping `v` as this chain
    /// requires.
    fn attach_signature(&self, tx: UnsignedTx, signature_65: &[u8; 65]) -> Result<SignedTx, ChainError>;

    async fn submit(&self, tx: &SignedTx) -> Result<SubmitResult, ChainError>;
}
