use ed25519_dalek::{SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};

use crate::error::PartyError;
use crate::party_id::{derive_party_id, PartyId};

/// A member of a room. `ident_pub_key` determines `party_id()`
/// deterministically: two participants with the same identity key are the
/// same participant.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Participant {
    pub nick: String,
    pub address: String,
    #[serde(with = "verifying_key_b64")]
    pub ident_pub_key: VerifyingKey,
}

impl Participant {
    pub fn new(nick: impl Into<String>, address: impl Into<String>, ident_pub_key: VerifyingKey) -> Self {
        Self {
            nick: nick.into(),
            address: address.into(),
            ident_pub_key,
        }
    }

    pub fn party_id(&self) -> PartyId {
        derive_party_id(&self.ident_pub_key)
    }

    /// Whether this participant's claimed chain address has been bound to
    /// their identity key. The original source stubs this to always-true
    /// and never commits to a binding mechanism; this preserves that
    /// behavior rather than inventing one.
    pub fn is_verified(&self) -> bool {
        true
    }
}

impl PartialEq for Participant {
    fn eq(&self, other: &Self) -> bool {
        self.party_id() == other.party_id()
    }
}
impl Eq for Participant {}

/// A distinguished participant who also holds the identity private key.
/// Persisted alongside the wallet configuration.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Me {
    #[serde(flatten)]
    pub participant: Participant,
    #[serde(with = "signing_key_b64")]
    pub ident_priv_key: SigningKey,
}

impl Me {
    pub fn generate(nick: impl Into<String>, address: impl Into<String>) -> Self {
        let signing_key = SigningKey::generate(&mut rand::rngs::OsRng);
        let verifying_key = signing_key.verifying_key();
        Self {
            participant: Participant::new(nick, address, verifying_key),
            ident_priv_key: signing_key,
        }
    }

    pub fn party_id(&self) -> PartyId {
        self.participant.party_id()
    }
}

impl std::fmt::Debug for Me {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Me")
            .field("participant", &self.participant)
            .field("ident_priv_key", &"<redacted>")
            .finish()
    }
}

mod verifying_key_b64 {
    use super::*;
    use base64::Engine;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(key: &VerifyingKey, s: S) -> Result<S::Ok, S::Error> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(key.as_bytes());
        s.serialize_str(&encoded)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<VerifyingKey, D::Error> {
        let s = String::deserialize(d)?;
        decode_verifying_key(&s).map_err(serde::de::Error::custom)
    }
}

mod signing_key_b64 {
    use super::*;
    use base64::Engine;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(key: &SigningKey, s: S) -> Result<S::Ok, S::Error> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(key.to_bytes());
        s.serialize_str(&encoded)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<SigningKey, D::Error> {
        let s = String::deserialize(d)?;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(s.as_bytes())
            .map_err(serde::de::Error::custom)?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("signing key must be 32 bytes"))?;
        Ok(SigningKey::from_bytes(&arr))
    }
}

fn decode_verifying_key(b64: &str) -> Result<VerifyingKey, PartyError> {
    use base64::Engine;
    let bytes = base64::engine::general_purpose::STANDARD.decode(b64.as_bytes())?;
    let arr: [u8; 32] = bytes
        .clone()
        .try_into()
        .map_err(|_| PartyError::WrongLength { expected: 32, got: bytes.len() })?;
    Ok(VerifyingKey::from_bytes(&arr)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn participant_roundtrips_through_json() {
        let me = Me::generate("alice", "X-fuji1abc");
        let json = serde_json::to_string(&me.participant).unwrap();
        let back: Participant = serde_json::from_str(&json).unwrap();
        assert_eq!(me.participant.party_id(), back.party_id());
        assert_eq!(back.nick, "alice");
    }

    #[test]
    fn me_roundtrips_through_json_including_private_key() {
        let me = Me::generate("bob", "X-fuji1def");
        let json = serde_json::to_string(&me).unwrap();
        let back: Me = serde_json::from_str(&json).unwrap();
        assert_eq!(me.ident_priv_key.to_bytes(), back.ident_priv_key.to_bytes());
    }

    #[test]
    fn same_key_means_same_participant() {
        let me = Me::generate("carol", "X-fuji1ghi");
        let p1 = me.participant.clone();
        let mut p2 = me.participant.clone();
        p2.nick = "carol-alt".into();
        assert_eq!(p1, p2);
    }
}
