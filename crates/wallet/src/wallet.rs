use std::sync::Arc;

use k256::ecdsa::VerifyingKey;
use serde::{Deserialize, Serialize};

use thresher_chain::{ChainAdapter, SignedTx, UnsignedTx};
use thresher_party::Participant;
use thresher_sigcodec::RawSignature;

use crate::error::WalletError;

/// The JSON-serializable half of a wallet: everything that survives a
/// process restart. Matches spec §6's wallet object shape (`Name`,
/// `Threshold`, `Me`, `Others`, `KeyData`, `Address`, `CreatedAt`); `Config`
/// (chain-specific parameters) is owned by the `ChainAdapter` a caller
/// reattaches on load, not serialized here, since the adapter is itself a
/// runtime collaborator (spec §1's "opaque chain adapter").
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WalletRecord {
    pub name: String,
    pub threshold: u16,
    pub me: Participant,
    pub others: Vec<Participant>,
    #[serde(with = "opt_base64", default)]
    pub key_data: Option<Vec<u8>>,
    /// SEC1 encoding of the wallet's public key, cached alongside `key_data`
    /// at install time so a reload never needs to understand the CMP
    /// library's own key-share serialization to recover it.
    #[serde(with = "opt_base64", default)]
    pub public_key_sec1: Option<Vec<u8>>,
    pub address: Option<String>,
    pub created_at: String,
}

/// The persistent object: threshold, roster, key material, public address.
/// Lifecycle: empty (keygen not run) -> initialized (exactly once) ->
/// immutable except for `name` and cached balances (spec §3).
pub struct Wallet {
    record: WalletRecord,
    chain: Arc<dyn ChainAdapter>,
    public_key: Option<VerifyingKey>,
}

impl Wallet {
    pub fn new_empty(
        chain: Arc<dyn ChainAdapter>,
        name: impl Into<String>,
        threshold: u16,
        me: Participant,
        others: Vec<Participant>,
        created_at: impl Into<String>,
    ) -> Self {
        Self {
            record: WalletRecord {
                name: name.into(),
                threshold,
                me,
                others,
                key_data: None,
                public_key_sec1: None,
                address: None,
                created_at: created_at.into(),
            },
            chain,
            public_key: None,
        }
    }

    /// Rehydrate a wallet from its persisted record plus a freshly
    /// constructed chain adapter (the adapter itself is never serialized).
    pub fn from_record(record: WalletRecord, chain: Arc<dyn ChainAdapter>) -> Result<Self, WalletError> {
        let public_key = match &record.public_key_sec1 {
            Some(bytes) => Some(decode_public_key(bytes)?),
            None => None,
        };
        Ok(Self { record, chain, public_key })
    }

    pub fn name(&self) -> &str {
        &self.record.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.record.name = name.into();
    }

    pub fn threshold(&self) -> u16 {
        self.record.threshold
    }

    pub fn is_initialized(&self) -> bool {
        self.record.key_data.is_some()
    }

    pub fn record(&self) -> &WalletRecord {
        &self.record
    }

    /// Every party id that must participate in a protocol round: self plus
    /// the other participants in the roster.
    pub fn party_ids(&self) -> Vec<thresher_party::PartyId> {
        let mut ids: Vec<_> = std::iter::once(self.record.me.party_id())
            .chain(self.record.others.iter().map(|p| p.party_id()))
            .collect();
        ids.sort();
        ids
    }

    /// Install the keygen session's result, transitioning the wallet from
    /// empty to usable. The caller supplies the public key alongside the
    /// opaque blob since only the session layer (which links against the
    /// CMP library) can extract it from the blob's native type — this crate
    /// only re-parses it back from the wire encoding on later loads.
    ///
    /// Idempotent only if called with byte-identical `blob`; any other call
    /// while already initialized is an error (spec §4.6).
    pub fn install_keygen_result(&mut self, blob: Vec<u8>, public_key: VerifyingKey) -> Result<(), WalletError> {
        if let Some(existing) = &self.record.key_data {
            if existing == &blob {
                return Ok(());
            }
            return Err(WalletError::AlreadyInitialized(self.record.name.clone()));
        }

        self.record.address = Some(self.chain.format_address(&public_key));
        self.record.public_key_sec1 = Some(public_key.to_sec1_bytes().to_vec());
        self.record.key_data = Some(blob);
        self.public_key = Some(public_key);
        Ok(())
    }

    pub fn public_key(&self) -> Option<&VerifyingKey> {
        self.public_key.as_ref()
    }

    /// Derived from the key blob's public point via the Chain Adapter.
    pub fn public_address(&self) -> Result<&str, WalletError> {
        self.record.address.as_deref().ok_or_else(|| WalletError::NotInitialized(self.record.name.clone()))
    }

    pub async fn create_unsigned_tx(&self, asset: &str, amount: u64, dest: &str, memo: &str) -> Result<UnsignedTx, WalletError> {
        let public_key = self.public_key.ok_or_else(|| WalletError::NotInitialized(self.record.name.clone()))?;
        Ok(self.chain.create_unsigned_tx(&public_key, asset, amount, dest, memo).await?)
    }

    pub fn attach_signature(&self, tx: UnsignedTx, signature_65: &[u8; 65]) -> Result<SignedTx, WalletError> {
        Ok(self.chain.attach_signature(tx, signature_65)?)
    }

    /// Convenience wrapper over the Signature Codec: does `(R, S)` actually
    /// verify against this wallet's public key and the given hash?
    pub fn verify(&self, message_hash: &[u8; 32], raw: RawSignature) -> bool {
        match self.public_key {
            Some(public_key) => thresher_sigcodec::convert(message_hash, &public_key, raw).is_ok(),
            None => false,
        }
    }
}

fn decode_public_key(key_share_sec1: &[u8]) -> Result<VerifyingKey, WalletError> {
    VerifyingKey::from_sec1_bytes(key_share_sec1).map_err(|e| WalletError::Decode(e.to_string()))
}

mod opt_base64 {
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(b) => s.serialize_str(&base64::engine::general_purpose::STANDARD.encode(b)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<u8>>, D::Error> {
        let opt: Option<String> = Option::deserialize(d)?;
        match opt {
            Some(s) if !s.is_empty() => base64::engine::general_purpose::STANDARD
                .decode(s.as_bytes())
                .map(Some)
                .map_err(serde::de::Error::custom),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ed25519_dalek::SigningKey;
    use k256::ecdsa::{signature::hazmat::PrehashSigner, Signature, SigningKey as EcdsaSigningKey};

    struct FakeAdapter;

    #[async_trait]
    impl ChainAdapter for FakeAdapter {
        fn format_address(&self, public_key: &VerifyingKey) -> String {
            format!("fake-{}", hex::encode(public_key.to_sec1_bytes()))
        }
        async fn create_unsigned_tx(
            &self,
            _public_key: &VerifyingKey,
            _asset: &str,
            _amount: u64,
            _dest: &str,
            _memo: &str,
        ) -> Result<UnsignedTx, thresher_chain::ChainError> {
            Ok(UnsignedTx { raw: vec![], message_hash: [0u8; 32] })
        }
        fn attach_signature(&self, tx: UnsignedTx, signature_65: &[u8; 65]) -> Result<SignedTx, thresher_chain::ChainError> {
            let mut raw = tx.raw;
            raw.extend_from_slice(signature_65);
            Ok(SignedTx { raw })
        }
        async fn submit(&self, _tx: &SignedTx) -> Result<thresher_chain::SubmitResult, thresher_chain::ChainError> {
            unimplemented!()
        }
    }

    fn participant(nick: &str) -> Participant {
        let vk = SigningKey::generate(&mut rand::rngs::OsRng).verifying_key();
        Participant::new(nick, "X-fuji1abc", vk)
    }

    #[test]
    fn install_is_idempotent_for_the_identical_blob_only() {
        let mut wallet = Wallet::new_empty(Arc::new(FakeAdapter), "treasury", 1, participant("alice"), vec![], "2026-01-01T00:00:00Z");
        let signing_key = EcdsaSigningKey::random(&mut rand::rngs::OsRng);
        let public_key = *signing_key.verifying_key();

        wallet.install_keygen_result(vec![1, 2, 3], public_key).unwrap();
        assert!(wallet.is_initialized());

        // Same blob again: fine.
        wallet.install_keygen_result(vec![1, 2, 3], public_key).unwrap();

        // Different blob: error, wallet stays on the original.
        let err = wallet.install_keygen_result(vec![4, 5, 6], public_key).unwrap_err();
        assert!(matches!(err, WalletError::AlreadyInitialized(_)));
    }

    #[test]
    fn public_address_is_unavailable_before_install() {
        let wallet = Wallet::new_empty(Arc::new(FakeAdapter), "treasury", 1, participant("alice"), vec![], "2026-01-01T00:00:00Z");
        assert!(matches!(wallet.public_address(), Err(WalletError::NotInitialized(_))));
    }

    #[test]
    fn verify_wraps_the_signature_codec() {
        let mut wallet = Wallet::new_empty(Arc::new(FakeAdapter), "treasury", 1, participant("alice"), vec![], "2026-01-01T00:00:00Z");
        let signing_key = EcdsaSigningKey::random(&mut rand::rngs::OsRng);
        let public_key = *signing_key.verifying_key();
        wallet.install_keygen_result(vec![9], public_key).unwrap();

        let hash = [3u8; 32];
        let sig: Signature = signing_key.sign_prehash(&hash).unwrap();
        let bytes = sig.to_bytes();
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..]);

        assert!(wallet.verify(&hash, RawSignature { r, s }));
        assert!(!wallet.verify(&[0u8; 32], RawSignature { r, s }));
    }

    #[test]
    fn record_round_trips_including_a_rehydrated_public_key() {
        let mut wallet = Wallet::new_empty(Arc::new(FakeAdapter), "treasury", 1, participant("alice"), vec![], "2026-01-01T00:00:00Z");
        let signing_key = EcdsaSigningKey::random(&mut rand::rngs::OsRng);
        let public_key = *signing_key.verifying_key();
        wallet.install_keygen_result(vec![9, 9, 9], public_key).unwrap();

        let json = serde_json::to_string(wallet.record()).unwrap();
        let record: WalletRecord = serde_json::from_str(&json).unwrap();
        let rehydrated = Wallet::from_record(record, Arc::new(FakeAdapter)).unwrap();

        assert_eq!(rehydrated.public_key(), Some(&public_key));
        assert_eq!(rehydrated.public_address().unwrap(), wallet.public_address().unwrap());
    }
}
