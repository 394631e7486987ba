use async_trait::async_trait;
use k256::ecdsa::VerifyingKey;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;

use crate::{ChainAdapter, ChainError, ChainRpc, SignedTx, SubmitResult, UnsignedTx};

pub type UtxoAssetId = [u8; 32];
pub type UtxoTxId = [u8; 32];

const RPC_TIMEOUT: Duration = Duration::from_secs(30);
const TX_FEE: u64 = 1_000_000; // 1 mAVAX-equivalent unit, matches avmwallet.go's txFee default

#[derive(Clone, Debug)]
pub struct Utxo {
    pub tx_id: UtxoTxId,
    pub output_index: u32,
    pub asset_id: UtxoAssetId,
    pub amount: u64,
}

/// UTXO-based chain adapter (Avalanche X-chain shaped), grounded in
/// `wallet/avmwallet/avmwallet.go`.
pub struct UtxoAdapter {
    pub chain_name: String,
    pub network_name: String,
    pub asset_id: UtxoAssetId,
    pub rpc: Arc<dyn ChainRpc>,
}

impl UtxoAdapter {
    pub fn new(chain_name: impl Into<String>, network_name: impl Into<String>, asset_id: UtxoAssetId, rpc: Arc<dyn ChainRpc>) -> Self {
        Self {
            chain_name: chain_name.into(),
            network_name: network_name.into(),
            asset_id,
            rpc,
        }
    }

    /// Smallest-first UTXO selection: sort owned UTXOs by ascending amount,
    /// accumulate until `sum >= amount + fee`, spending dust first.
    fn select_utxos(utxos: &[Utxo], amount: u64, fee: u64) -> Result<(Vec<Utxo>, u64), ChainError> {
        let mut sorted: Vec<Utxo> = utxos.to_vec();
        sorted.sort_by_key(|u| u.amount);

        let target = amount
            .checked_add(fee)
            .ok_or_else(|| ChainError::InvalidAmount("amount + fee overflows".into()))?;

        let mut selected = Vec::new();
        let mut sum = 0u64;
        for u in sorted {
            if sum >= target {
                break;
            }
            sum += u.amount;
            selected.push(u);
        }

        if sum < target {
            return Err(ChainError::InsufficientFunds { needed: target, available: sum });
        }

        Ok((selected, sum - target))
    }
}

#[async_trait]
impl ChainAdapter for UtxoAdapter {
    fn format_address(&self, public_key: &VerifyingKey) -> String {
        let encoded = public_key.to_encoded_point(true);
        let digest = Sha256::digest(encoded.as_bytes());
        format!("{}-{}1{}", self.chain_name, self.network_name, hex::encode(&digest[..20]))
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
        if dest.is_empty() {
            return Err(ChainError::InvalidAddress(dest.to_string()));
        }

        let self_address = self.format_address(public_key);
        let utxos = tokio::time::timeout(RPC_TIMEOUT, self.rpc.fetch_utxos(&self_address))
            .await
            .map_err(|_| ChainError::Timeout)??;

        let (inputs, change) = Self::select_utxos(&utxos, amount, TX_FEE)?;

        let mut raw = Vec::new();
        raw.extend_from_slice(dest.as_bytes());
        raw.extend_from_slice(&amount.to_be_bytes());
        raw.extend_from_slice(&change.to_be_bytes());
        raw.extend_from_slice(memo.as_bytes());
        for input in &inputs {
            raw.extend_from_slice(&input.tx_id);
            raw.extend_from_slice(&input.output_index.to_be_bytes());
        }

        let message_hash: [u8; 32] = Sha256::digest(&raw).into();

        Ok(UnsignedTx { raw, message_hash })
    }

    fn attach_signature(&self, tx: UnsignedTx, signature_65: &[u8; 65]) -> Result<SignedTx, ChainError> {
        // UTXO chains take the codec's `{0,1,2,3}` form as-is.
        let mut raw = tx.raw;
        raw.extend_from_slice(signature_65);
        Ok(SignedTx { raw })
    }

    async fn submit(&self, tx: &SignedTx) -> Result<SubmitResult, ChainError> {
        let tx_id = tokio::time::timeout(RPC_TIMEOUT, self.rpc.issue_tx(&tx.raw))
            .await
            .map_err(|_| ChainError::Timeout)??;

        // Blocks until confirmed (bounded attempts), matching the original's
        // ConfirmTx retry shape.
        let mut confirmed = false;
        for _ in 0..3 {
            if tokio::time::timeout(RPC_TIMEOUT, self.rpc.confirm_tx(&tx_id))
                .await
                .map_err(|_| ChainError::Timeout)??
            {
                confirmed = true;
                break;
            }
            tokio::time::sleep(Duration::from_secs(3)).await;
        }

        Ok(SubmitResult { tx_id, confirmed })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utxo(amount: u64) -> Utxo {
        Utxo { tx_id: [0u8; 32], output_index: 0, asset_id: [0u8; 32], amount }
    }

    #[test]
    fn smallest_first_selection_spends_dust_first() {
        let utxos = vec![utxo(5_000_000), utxo(100), utxo(2_000_000)];
        let (selected, change) = UtxoAdapter::select_utxos(&utxos, 900_000, TX_FEE).unwrap();

        // dust (100) and the 2_000_000 utxo cover amount+fee before the
        // 5_000_000 one is touched.
        assert_eq!(selected.len(), 2);
        assert_eq!(selected[0].amount, 100);
        assert_eq!(selected[1].amount, 2_000_000);
        assert_eq!(selected.iter().map(|u| u.amount).sum::<u64>(), change + 900_000 + TX_FEE);
    }

    #[test]
    fn insufficient_funds_is_reported() {
        let utxos = vec![utxo(10)];
        let err = UtxoAdapter::select_utxos(&utxos, 1_000_000, TX_FEE).unwrap_err();
        assert!(matches!(err, ChainError::InsufficientFunds { .. }));
    }
}
