use serde::{Deserialize, Serialize};

use thresher_party::{Participant, PartyId};
use thresher_session::SessionKind;

/// One protocol message as carried on the wire: the CMP payload plus
/// whatever routing the Room needs to demultiplex it, matching spec §4.2's
/// "round number, sender party id, optional recipient, opaque payload"
/// (round number is not threaded through explicitly — the underlying
/// state-machine library tracks rounds internally and the per-sender
/// ordering the bus already guarantees is sufficient to replay them).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WireProtocolMessage {
    pub recipient: Option<PartyId>,
    #[serde(with = "base64_bytes")]
    pub payload: Vec<u8>,
}

/// The wire-level message on the bus (spec §3, §6). Exactly one variant is
/// ever populated; unknown variants deserialize-fail and are logged+dropped
/// by the caller rather than panicking.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Envelope {
    #[serde(rename = "chat.message")]
    Chat {
        senderid: PartyId,
        sendername: String,
        usermessage: String,
    },

    #[serde(rename = "chat.advertise")]
    Advertise {
        senderid: PartyId,
        sendername: String,
        advmsg: Participant,
    },

    #[serde(rename = "chat.protocol")]
    Protocol {
        senderid: PartyId,
        sendername: String,
        wallet: String,
        kind: SessionKind,
        protmessage: WireProtocolMessage,
    },

    #[serde(rename = "chat.startkeygen")]
    StartKeygen {
        senderid: PartyId,
        sendername: String,
        wallet: String,
        threshold: u16,
        signers: Vec<Participant>,
    },

    #[serde(rename = "chat.startsign")]
    StartSign {
        senderid: PartyId,
        sendername: String,
        wallet: String,
        #[serde(with = "base64_bytes32")]
        message_hash: [u8; 32],
        signers: Vec<Participant>,
    },

    #[serde(rename = "chat.startsendtx")]
    StartSendTx {
        senderid: PartyId,
        sendername: String,
        wallet: String,
        amount: u64,
        dest_addr: String,
        memo: String,
        signers: Vec<Participant>,
    },
}

impl Envelope {
    pub fn sender(&self) -> PartyId {
        match self {
            Envelope::Chat { senderid, .. }
            | Envelope::Advertise { senderid, .. }
            | Envelope::Protocol { senderid, .. }
            | Envelope::StartKeygen { senderid, .. }
            | Envelope::StartSign { senderid, .. }
            | Envelope::StartSendTx { senderid, .. } => *senderid,
        }
    }

    pub fn signers(&self) -> Option<&[Participant]> {
        match self {
            Envelope::StartKeygen { signers, .. }
            | Envelope::StartSign { signers, .. }
            | Envelope::StartSendTx { signers, .. } => Some(signers),
            _ => None,
        }
    }
}

mod base64_bytes {
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        base64::engine::general_purpose::STANDARD
            .decode(s.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

mod base64_bytes32 {
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8; 32], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<[u8; 32], D::Error> {
        let s = String::deserialize(d)?;
        let v = base64::engine::general_purpose::STANDARD
            .decode(s.as_bytes())
            .map_err(serde::de::Error::custom)?;
        v.try_into()
            .map_err(|_| serde::de::Error::custom("message_hash must be 32 bytes"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::SigningKey;
    use rand::rngs::OsRng;

    fn participant(nick: &str) -> Participant {
        let vk = SigningKey::generate(&mut OsRng).verifying_key();
        Participant::new(nick, "X-fuji1abc", vk)
    }

    #[test]
    fn chat_envelope_round_trips_through_json() {
        let p = participant("alice");
        let env = Envelope::Chat {
            senderid: p.party_id(),
            sendername: "alice".into(),
            usermessage: "hello".into(),
        };
        let json = serde_json::to_string(&env).unwrap();
        assert!(json.contains("\"type\":\"chat.message\""));
        let back: Envelope = serde_json::from_str(&json).unwrap();
        assert_eq!(back.sender(), p.party_id());
    }

    #[test]
    fn unknown_variant_fails_to_decode() {
        let json = r#"{"type":"chat.unknown","senderid":"00","sendername":"x"}"#;
        assert!(serde_json::from_str::<Envelope>(json).is_err());
    }

    #[test]
    fn start_sign_round_trips_the_message_hash() {
        let p = participant("bob");
        let env = Envelope::StartSign {
            senderid: p.party_id(),
            sendername: "bob".into(),
            wallet: "treasury".into(),
            message_hash: [7u8; 32],
            signers: vec![p],
        };
        let json = serde_json::to_string(&env).unwrap();
        let back: Envelope = serde_json::from_str(&json).unwrap();
        match back {
            Envelope::StartSign { message_hash, .. } => assert_eq!(message_hash, [7u8; 32]),
            _ => panic!("wrong variant"),
        }
    }
}
