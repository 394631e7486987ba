use ed25519_dalek::VerifyingKey;
use sha2::{Digest, Sha256};
use std::fmt;

/// Opaque 32-byte name for a participant inside every CMP protocol round.
///
/// `Ord` is derived field-by-field over the raw bytes, which gives a
/// lexicographic, canonical ordering for a party-id set.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct PartyId(#[serde(with = "hex_bytes")] pub [u8; 32]);

impl PartyId {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for PartyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PartyId({})", hex::encode(self.0))
    }
}

impl fmt::Display for PartyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8; 32], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<[u8; 32], D::Error> {
        let s = String::deserialize(d)?;
        let v = hex::decode(&s).map_err(serde::de::Error::custom)?;
        v.try_into()
            .map_err(|_| serde::de::Error::custom("party id must be 32 bytes"))
    }
}

/// Derive the canonical party id for an identity public key.
///
/// This MUST produce byte-identical output on every node: serialize the
/// verifying key to its canonical compressed form, compute a stable textual
/// peer-identifier for it (a hex-encoded SHA-256 digest stands in for the
/// transport layer's own peer-id encoding, since the gossip transport itself
/// lives outside this crate), then take the last 32 bytes of that textual
/// form's UTF-8 encoding.
///
/// The derivation never fails: every valid public key has a canonical byte
/// encoding, and the digest step makes collisions a SHA-256-breaking event.
pub fn derive_party_id(verifying_key: &VerifyingKey) -> PartyId {
    let canonical = verifying_key.to_bytes();
    let digest = Sha256::digest(canonical);
    let textual = hex::encode(digest); // 64 ASCII hex chars, like a Pretty() peer-id string

    let tail = &textual.as_bytes()[textual.len() - 32..];
    let mut out = [0u8; 32];
    out.copy_from_slice(tail);
    PartyId(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::SigningKey;
    use rand::rngs::OsRng;

    #[test]
    fn derivation_is_deterministic() {
        let signing_key = SigningKey::generate(&mut OsRng);
        let vk = signing_key.verifying_key();

        let a = derive_party_id(&vk);
        let b = derive_party_id(&vk);
        assert_eq!(a, b);
    }

    #[test]
    fn derivation_is_total_and_injective_in_practice() {
        let mut seen = std::collections::HashSet::new();
        for _ in 0..256 {
            let vk = SigningKey::generate(&mut OsRng).verifying_key();
            let id = derive_party_id(&vk);
            assert!(seen.insert(id), "collision in party id derivation");
        }
    }

    #[test]
    fn ordering_is_lexicographic_on_bytes() {
        let low = PartyId([0u8; 32]);
        let mut high = [0u8; 32];
        high[31] = 1;
        let high = PartyId(high);
        assert!(low < high);
    }
}
