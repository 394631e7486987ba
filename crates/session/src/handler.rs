use crate::error::ProtocolError;
use crate::message::ProtocolMessage;

/// What a handler produces on success.
#[derive(Clone, Debug)]
pub enum HandlerResult {
    /// Serialized key-material blob (keygen).
    KeyShare(Vec<u8>),
    /// Raw `(R.x, S)` scalar pair (signing), big-endian, pre-codec.
    Signature { r: [u8; 32], s: [u8; 32] },
}

/// The CMP protocol handler contract: a synchronous state machine the
/// session engine drives. Implementations own exactly one protocol run and
/// are never touched concurrently — the engine is the sole caller.
pub trait Handler: Send {
    /// Drive the handler until it needs an inbound message or finishes,
    /// collecting every outbound message produced along the way.
    fn drive(&mut self) -> Result<Vec<ProtocolMessage>, ProtocolError>;

    /// Feed one inbound protocol message already filtered to this party.
    fn accept(&mut self, msg: ProtocolMessage) -> Result<(), ProtocolError>;

    /// `Some` once the protocol has terminated, successfully or not.
    fn result(&self) -> Option<Result<HandlerResult, ProtocolError>>;
}
