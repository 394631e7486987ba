//! An in-process `Transport` for running a room entirely within one binary,
//! used by the `bootstrap` command to exercise a full keygen/sign cycle
//! without a real gossip network (spec §4.4a names this explicitly out of
//! scope: "a real libp2p/gossip transport is not implemented here").

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{broadcast, Mutex};

use thresher_room::{PeerTag, Transport, TransportError};

const CHANNEL_CAPACITY: usize = 256;

/// Shared registry of topics, so multiple `LocalTransport` handles created
/// from the same `LocalBus` fan out to each other in-process.
#[derive(Default)]
pub struct LocalBus {
    topics: Mutex<HashMap<String, broadcast::Sender<(PeerTag, Vec<u8>)>>>,
}

impl LocalBus {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { topics: Mutex::new(HashMap::new()) })
    }

    async fn sender_for(&self, topic: &str) -> broadcast::Sender<(PeerTag, Vec<u8>)> {
        let mut topics = self.topics.lock().await;
        topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }

    /// Create a transport handle for `peer_tag`, subscribed to `topic`.
    pub async fn join(self: &Arc<Self>, topic: &str, peer_tag: impl Into<String>) -> LocalTransport {
        let tx = self.sender_for(topic).await;
        let rx = tx.subscribe();
        LocalTransport { tx, rx: Mutex::new(rx), peer_tag: peer_tag.into() }
    }
}

pub struct LocalTransport {
    tx: broadcast::Sender<(PeerTag, Vec<u8>)>,
    rx: Mutex<broadcast::Receiver<(PeerTag, Vec<u8>)>>,
    peer_tag: PeerTag,
}

#[async_trait]
impl Transport for LocalTransport {
    async fn publish(&self, _topic: &str, bytes: Vec<u8>) -> Result<(), TransportError> {
        // No subscribers is not an error: a lone participant publishing its
        // first heartbeat before anyone else has joined is the common case.
        let _ = self.tx.send((self.peer_tag.clone(), bytes));
        Ok(())
    }

    async fn next(&self) -> Option<(PeerTag, Vec<u8>)> {
        loop {
            match self.rx.lock().await.recv().await {
                Ok(msg) => return Some(msg),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fans_out_to_every_other_member_of_the_topic() {
        let bus = LocalBus::new();
        let alice = bus.join("room", "alice").await;
        let bob = bus.join("room", "bob").await;
        let carol = bus.join("room", "carol").await;

        alice.publish("room", b"hello".to_vec()).await.unwrap();

        let (from, bytes) = bob.next().await.unwrap();
        assert_eq!(from, "alice");
        assert_eq!(bytes, b"hello");

        let (from, bytes) = carol.next().await.unwrap();
        assert_eq!(from, "alice");
        assert_eq!(bytes, b"hello");
    }

    #[tokio::test]
    async fn distinct_topics_do_not_cross_talk() {
        let bus = LocalBus::new();
        let alice = bus.join("room-a", "alice").await;
        let bob = bus.join("room-b", "bob").await;

        alice.publish("room-a", b"only-for-a".to_vec()).await.unwrap();

        // bob is on a different topic so never sees it; publish again on
        // room-b to prove bob's receiver is otherwise live.
        bob.publish("room-b", b"for-b".to_vec()).await.unwrap();
        let (from, bytes) = bob.next().await.unwrap();
        assert_eq!(from, "bob");
        assert_eq!(bytes, b"for-b");
    }
}
