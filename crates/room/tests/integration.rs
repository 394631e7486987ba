//! Integration tests exercising the Room's envelope idempotence and session
//! isolation invariants (spec §8, properties 4 and 6) over a fake
//! broadcast-style transport standing in for the real gossip bus.

use std::sync::Arc;

use async_trait::async_trait;
use ed25519_dalek::SigningKey;
use tokio::sync::{broadcast, mpsc};

use thresher_party::{Me, Participant, PartyId};
use thresher_room::{PeerTag, Room, RoomEvent, SessionFactory, SessionPayload, Transport};
use thresher_session::{Handler, HandlerResult, ProtocolError, ProtocolMessage};

/// A fake gossip bus: every publish fans out to every subscriber, including
/// the publisher itself (the worst case the Room's self-filter must
/// handle), via a single shared broadcast channel per topic.
struct FakeTransport {
    tx: broadcast::Sender<(PeerTag, Vec<u8>)>,
    rx: tokio::sync::Mutex<broadcast::Receiver<(PeerTag, Vec<u8>)>>,
    self_tag: PeerTag,
}

impl FakeTransport {
    fn new(bus: &broadcast::Sender<(PeerTag, Vec<u8>)>, self_tag: impl Into<String>) -> Self {
        FakeTransport { tx: bus.clone(), rx: tokio::sync::Mutex::new(bus.subscribe()), self_tag: self_tag.into() }
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn publish(&self, _topic: &str, bytes: Vec<u8>) -> Result<(), thresher_room::TransportError> {
        let _ = self.tx.send((self.self_tag.clone(), bytes));
        Ok(())
    }

    async fn next(&self) -> Option<(PeerTag, Vec<u8>)> {
        self.rx.lock().await.recv().await.ok()
    }
}

/// A no-op handler that never produces output, sufficient to exercise
/// routing without a real CMP state machine.
struct NullHandler;
impl Handler for NullHandler {
    fn drive(&mut self) -> Result<Vec<ProtocolMessage>, ProtocolError> {
        Ok(vec![])
    }
    fn accept(&mut self, _msg: ProtocolMessage) -> Result<(), ProtocolError> {
        Ok(())
    }
    fn result(&self) -> Option<Result<HandlerResult, ProtocolError>> {
        None
    }
}

struct NullFactory;
#[async_trait]
impl SessionFactory for NullFactory {
    async fn build(&self, _wallet: &str, _self_id: PartyId, _party_ids: &[PartyId], _payload: SessionPayload) -> Result<Box<dyn Handler>, ProtocolError> {
        Ok(Box::new(NullHandler))
    }
}

fn me(nick: &str) -> Me {
    let signing_key = SigningKey::generate(&mut rand::rngs::OsRng);
    Me { participant: Participant::new(nick, "X-fuji1abc", signing_key.verifying_key()), ident_priv_key: signing_key }
}

#[tokio::test]
async fn self_published_envelope_never_surfaces_as_a_join() {
    let bus = broadcast::channel(16).0;
    let (events_tx, mut events_rx) = mpsc::channel(16);

    let alice = me("alice");
    let transport = Arc::new(FakeTransport::new(&bus, "alice"));
    let room = Room::join(transport, "test-topic", alice, Arc::new(NullFactory), events_tx);

    // Force our own heartbeat onto the bus and give the sub loop a moment to
    // process it — since FakeTransport loops back to its own publisher, a
    // buggy Room would treat this as a new participant joining.
    room.send_chat("hello").await;
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    assert_eq!(room.roster().len().await, 0, "self must never appear in its own roster");

    // Drain any events; none should be a ChatMessage or ParticipantJoined
    // originating from ourselves.
    while let Ok(event) = events_rx.try_recv() {
        match event {
            RoomEvent::ChatMessage { .. } | RoomEvent::ParticipantJoined { .. } => {
                panic!("self-sent envelope should have been dropped before reaching the event sink")
            }
            _ => {}
        }
    }
}

#[tokio::test]
async fn two_wallets_signing_concurrently_do_not_cross_routes() {
    let bus = broadcast::channel(64).0;

    let (alice_events_tx, _alice_events_rx) = mpsc::channel(64);
    let (bob_events_tx, _bob_events_rx) = mpsc::channel(64);

    let alice_id = me("alice");
    let bob_id = me("bob");

    let alice_room = Room::join(Arc::new(FakeTransport::new(&bus, "alice")), "t", alice_id.clone(), Arc::new(NullFactory), alice_events_tx);
    let bob_room = Room::join(Arc::new(FakeTransport::new(&bus, "bob")), "t", bob_id.clone(), Arc::new(NullFactory), bob_events_tx);

    let signers = vec![alice_id.participant.clone(), bob_id.participant.clone()];

    // Two different wallets signing "concurrently": routing is keyed by
    // (wallet, kind), so starting both must not make either Room conflate
    // messages meant for the other wallet's session.
    alice_room.confirm_sign("wallet-a".into(), [1u8; 32], signers.clone()).await;
    bob_room.confirm_sign("wallet-b".into(), [2u8; 32], signers).await;

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    // Both NullHandler-backed sessions finish immediately (result() is
    // always None so they stall, which is fine — we're only checking no
    // panics/crashes occur from routing, session isolation is structural
    // via the (wallet, kind) key asserted in session_registry's unit tests).
    alice_room.shutdown().await;
    bob_room.shutdown().await;
}
