use async_trait::async_trait;
use k256::ecdsa::VerifyingKey;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use sha3::{Digest, Keccak256};
use std::sync::Arc;
use std::time::Duration;

use crate::{ChainAdapter, ChainError, ChainRpc, SignedTx, SubmitResult, UnsignedTx};

const RPC_TIMEOUT: Duration = Duration::from_secs(30);

/// Account-based chain adapter (Ethereum shaped), grounded in
/// `wallet/ethwallet/ethwallet.go`.
pub struct AccountAdapter {
    pub chain_id: u64,
    pub rpc: Arc<dyn ChainRpc>,
}

impl AccountAdapter {
    pub fn new(chain_id: u64, rpc: Arc<dyn ChainRpc>) -> Self {
        Self { chain_id, rpc }
    }

    /// EIP-155: `v = recovery_id + chain_id * 2 + 35`. The codec always
    /// returns `{0,1,2,3}`; this remap is entirely the chain adapter's job.
    fn eip155_v(&self, recovery_id: u8) -> u64 {
        recovery_id as u64 + self.chain_id * 2 + 35
    }
}

#[async_trait]
impl ChainAdapter for AccountAdapter {
    fn format_address(&self, public_key: &VerifyingKey) -> String {
        let uncompressed = public_key.to_encoded_point(false);
        // Ethereum address: last 20 bytes of keccak256(pubkey_bytes_without_prefix).
        let hash = keccak256(&uncompressed.as_bytes()[1..]);
        format!("0x{}", hex::encode(&hash[12..]))
    }

    async fn create_unsigned_tx(
        &self,
        public_key: &VerifyingKey,
        _asset: &str,
        amount: u64,
        dest: &str,
        memo: &str,
    ) -> Result<UnsignedTx, ChainError> {
        if amount == 0 {
            return Err(ChainError::InvalidAmount("amount must be nonzero".into()));
        }
        if !dest.starts_with("0x") || dest.len() != 42 {
            return Err(ChainError::InvalidAddress(dest.to_string()));
        }

        let self_address = self.format_address(public_key);
        // Balance check only; account chains have no UTXO set to select from.
        let utxos = tokio::time::timeout(RPC_TIMEOUT, self.rpc.fetch_utxos(&self_address))
            .await
            .map_err(|_| ChainError::Timeout)??;
        let balance: u64 = utxos.iter().map(|u| u.amount).sum();
        if balance < amount {
            return Err(ChainError::InsufficientFunds { needed: amount, available: balance });
        }

        let mut raw = Vec::new();
        raw.extend_from_slice(dest.as_bytes());
        raw.extend_from_slice(&amount.to_be_bytes());
        raw.extend_from_slice(&self.chain_id.to_be_bytes());
        raw.extend_from_slice(memo.as_bytes());

        let message_hash = keccak256(&raw);

        Ok(UnsignedTx { raw, message_hash })
    }

    fn attach_signature(&self, tx: UnsignedTx, signature_65: &[u8; 65]) -> Result<SignedTx, ChainError> {
        let recovery_id = signature_65[64];
        let v = self.eip155_v(recovery_id);

        let mut raw = tx.raw;
        raw.extend_from_slice(&signature_65[0..64]);
        raw.extend_from_slice(&v.to_be_bytes());
        Ok(SignedTx { raw })
    }

    async fn submit(&self, tx: &SignedTx) -> Result<SubmitResult, ChainError> {
        let tx_id = tokio::time::timeout(RPC_TIMEOUT, self.rpc.issue_tx(&tx.raw))
            .await
            .map_err(|_| ChainError::Timeout)??;
        let confirmed = tokio::time::timeout(RPC_TIMEOUT, self.rpc.confirm_tx(&tx_id))
            .await
            .map_err(|_| ChainError::Timeout)??;
        Ok(SubmitResult { tx_id, confirmed })
    }
}

/// Keccak-256, Ethereum's address/hash function (distinct from standard
/// SHA3-256 despite the similar construction).
fn keccak256(data: &[u8]) -> [u8; 32] {
    Keccak256::digest(data).into()
}
