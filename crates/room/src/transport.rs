use async_trait::async_trait;
use thiserror::Error;

/// Opaque tag the transport uses to identify the publisher of an inbound
/// message. The Room never inspects it directly — only `Envelope::sender()`
/// (the party id inside the decoded payload) matters for routing.
pub type PeerTag = String;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("publish failed: {0}")]
    Publish(String),

    #[error("failed to join topic '{0}'")]
    Join(String),
}

/// The gossip bus the Room is built on. Peer discovery, NAT traversal, and
/// message signing/encryption live inside implementations of this trait and
/// are out of scope here (spec §1) — the Room only needs publish/subscribe
/// fan-out with per-sender ordering preserved, which `next()` callers must
/// provide.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn publish(&self, topic: &str, bytes: Vec<u8>) -> Result<(), TransportError>;

    /// Next inbound message for any joined topic, or `None` once the
    /// transport has shut down. Implementations must preserve the order in
    /// which a single publisher's messages were published (per-sender
    /// ordering), though no ordering across distinct publishers is implied.
    async fn next(&self) -> Option<(PeerTag, Vec<u8>)>;
}
