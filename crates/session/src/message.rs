use serde::{Deserialize, Serialize};
use thresher_party::PartyId;

/// Which multi-party protocol a session runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionKind {
    Keygen,
    Sign,
}

/// One protocol message exchanged between parties inside a running session.
///
/// `recipient` is absent for broadcast rounds and present for point-to-point
/// rounds; which round and what it means is opaque, carried inside
/// `payload`. Demultiplexing by recipient happens at the Room, not here.
#[derive(Clone, Debug)]
pub struct ProtocolMessage {
    pub sender: PartyId,
    pub recipient: Option<PartyId>,
    pub payload: Vec<u8>,
}
