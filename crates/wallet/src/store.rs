use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::wallet::Wallet;

/// The wallet map: mutex-protected, writer-rare (spec §5). Readers must not
/// hold the lock across I/O — callers should clone/extract what they need
/// and drop the guard before making a chain RPC call.
#[derive(Default)]
pub struct WalletStore {
    wallets: Mutex<HashMap<String, Arc<Mutex<Wallet>>>>,
}

impl WalletStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, wallet: Wallet) {
        let name = wallet.name().to_string();
        self.wallets.lock().await.insert(name, Arc::new(Mutex::new(wallet)));
    }

    pub async fn get(&self, name: &str) -> Option<Arc<Mutex<Wallet>>> {
        self.wallets.lock().await.get(name).cloned()
    }

    pub async fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.wallets.lock().await.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn rename(&self, old_name: &str, new_name: &str) -> bool {
        let mut wallets = self.wallets.lock().await;
        if wallets.contains_key(new_name) {
            return false;
        }
        if let Some(wallet) = wallets.remove(old_name) {
            wallet.lock().await.set_name(new_name);
            wallets.insert(new_name.to_string(), wallet);
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::SigningKey;
    use thresher_chain::ChainAdapter;
    use thresher_party::Participant;

    struct FakeAdapter;
    #[async_trait::async_trait]
    impl ChainAdapter for FakeAdapter {
        fn format_address(&self, _public_key: &k256::ecdsa::VerifyingKey) -> String {
            "fake-address".into()
        }
        async fn create_unsigned_tx(
            &self,
            _public_key: &k256::ecdsa::VerifyingKey,
            _asset: &str,
            _amount: u64,
            _dest: &str,
            _memo: &str,
        ) -> Result<thresher_chain::UnsignedTx, thresher_chain::ChainError> {
            unimplemented!()
        }
        fn attach_signature(&self, _tx: thresher_chain::UnsignedTx, _sig: &[u8; 65]) -> Result<thresher_chain::SignedTx, thresher_chain::ChainError> {
            unimplemented!()
        }
        async fn submit(&self, _tx: &thresher_chain::SignedTx) -> Result<thresher_chain::SubmitResult, thresher_chain::ChainError> {
            unimplemented!()
        }
    }

    fn participant(nick: &str) -> Participant {
        let vk = SigningKey::generate(&mut rand::rngs::OsRng).verifying_key();
        Participant::new(nick, "X-fuji1abc", vk)
    }

    #[tokio::test]
    async fn insert_and_lookup_by_name() {
        let store = WalletStore::new();
        let wallet = Wallet::new_empty(Arc::new(FakeAdapter), "treasury", 1, participant("alice"), vec![], "2026-01-01T00:00:00Z");
        store.insert(wallet).await;

        assert!(store.get("treasury").await.is_some());
        assert!(store.get("missing").await.is_none());
        assert_eq!(store.names().await, vec!["treasury".to_string()]);
    }

    #[tokio::test]
    async fn rename_moves_the_entry_and_rejects_collisions() {
        let store = WalletStore::new();
        store.insert(Wallet::new_empty(Arc::new(FakeAdapter), "a", 1, participant("alice"), vec![], "2026-01-01T00:00:00Z")).await;
        store.insert(Wallet::new_empty(Arc::new(FakeAdapter), "b", 1, participant("alice"), vec![], "2026-01-01T00:00:00Z")).await;

        assert!(!store.rename("a", "b").await, "renaming onto an existing name must fail");
        assert!(store.rename("a", "c").await);
        assert!(store.get("c").await.is_some());
        assert!(store.get("a").await.is_none());
    }
}
