//! Builds the concrete [`ChainAdapter`] named by a loaded config's
//! `Blockchain`/`Network` fields. A real RPC client is out of scope (spec
//! §1); [`UnimplementedRpc`] stands in so the adapter wiring itself is
//! exercised without a node to talk to.

use std::sync::Arc;

use async_trait::async_trait;

use thresher_chain::{AccountAdapter, ChainAdapter, ChainError, ChainRpc, SubmitResult, Utxo, UtxoAdapter};

use crate::config::{AppConfig, Blockchain};

struct UnimplementedRpc;

#[async_trait]
impl ChainRpc for UnimplementedRpc {
    async fn fetch_utxos(&self, _address: &str) -> Result<Vec<Utxo>, ChainError> {
        Err(ChainError::Rpc("no chain RPC client is configured in this build".into()))
    }
    async fn issue_tx(&self, _raw: &[u8]) -> Result<String, ChainError> {
        Err(ChainError::Rpc("no chain RPC client is configured in this build".into()))
    }
    async fn confirm_tx(&self, _tx_id: &str) -> Result<bool, ChainError> {
        Err(ChainError::Rpc("no chain RPC client is configured in this build".into()))
    }
}

/// Test/simulation-friendly RPC that always reports funded and confirmed,
/// so `bootstrap`'s local round trip can exercise `create_unsigned_tx`
/// without a real node.
pub struct FakeFundedRpc {
    pub utxos: Vec<Utxo>,
}

#[async_trait]
impl ChainRpc for FakeFundedRpc {
    async fn fetch_utxos(&self, _address: &str) -> Result<Vec<Utxo>, ChainError> {
        Ok(self.utxos.clone())
    }
    async fn issue_tx(&self, _raw: &[u8]) -> Result<String, ChainError> {
        Ok("simulated-tx-id".into())
    }
    async fn confirm_tx(&self, _tx_id: &str) -> Result<bool, ChainError> {
        Ok(true)
    }
}

pub fn build_adapter(cfg: &AppConfig) -> Arc<dyn ChainAdapter> {
    build_adapter_with_rpc(cfg, Arc::new(UnimplementedRpc))
}

pub fn build_adapter_with_rpc(cfg: &AppConfig, rpc: Arc<dyn ChainRpc>) -> Arc<dyn ChainAdapter> {
    match cfg.blockchain {
        Blockchain::Avalanche => {
            let network_name = format!("{:?}", cfg.network).to_lowercase();
            Arc::new(UtxoAdapter::new("avalanche", network_name, [0u8; 32], rpc))
        }
        Blockchain::Ethereum => {
            let chain_id = match cfg.network {
                crate::config::Network::Mainnet => 1,
                crate::config::Network::Goerli => 5,
                _ => 0,
            };
            Arc::new(AccountAdapter::new(chain_id, rpc))
        }
    }
}
