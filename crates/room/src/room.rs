use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use thresher_party::{Me, Participant, PartyId};
use thresher_session::{run as run_session, Handler, ProtocolError, ProtocolMessage, SessionIo, SessionKind};

use crate::envelope::{Envelope, WireProtocolMessage};
use crate::event::{LogLevel, RoomEvent};
use crate::roster::Roster;
use crate::session_registry::{SessionArena, SessionHandle, SessionKey};
use crate::transport::Transport;

/// Bus channel capacity, matching spec §4.4/§6's `channel_size = 10`.
const CHANNEL_CAPACITY: usize = 10;
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);
const ROSTER_SWEEP_INTERVAL: Duration = Duration::from_secs(5);

/// What a started session needs beyond its `(wallet, kind)` key: the
/// payload distinguishing keygen's threshold from signing's message hash.
#[derive(Clone, Debug)]
pub enum SessionPayload {
    Keygen { threshold: u16 },
    Sign { message_hash: [u8; 32] },
}

/// Builds the concrete CMP [`Handler`] for a session. The Room deliberately
/// does not depend on `cggmp24` itself — constructing a handler needs key
/// material and Paillier primes that only the wallet layer holds, so the
/// Room is handed a factory instead (spec §9's "event-sink interface rather
/// than a direct back-pointer" generalized to session construction too).
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn build(
        &self,
        wallet: &str,
        self_id: PartyId,
        party_ids: &[PartyId],
        payload: SessionPayload,
    ) -> Result<Box<dyn Handler>, ProtocolError>;
}

/// Publish/subscribe fan-out over a [`Transport`]: roster, heartbeat,
/// TTL eviction, envelope (de)serialization, and session demultiplexing
/// (spec §4.4).
pub struct Room {
    transport: Arc<dyn Transport>,
    topic: String,
    me: Me,
    roster: Arc<Roster>,
    sessions: Mutex<SessionArena>,
    outbound_tx: mpsc::Sender<Envelope>,
    events_tx: mpsc::Sender<RoomEvent>,
    factory: Arc<dyn SessionFactory>,
    cancel: CancellationToken,
}

impl Room {
    /// Join `topic` on `transport` and start the publish loop, subscribe
    /// loop, heartbeat loop, and roster-TTL loop (spec §4.4, §5).
    pub fn join(
        transport: Arc<dyn Transport>,
        topic: impl Into<String>,
        me: Me,
        factory: Arc<dyn SessionFactory>,
        events_tx: mpsc::Sender<RoomEvent>,
    ) -> Arc<Room> {
        let (outbound_tx, outbound_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let room = Arc::new(Room {
            transport,
            topic: topic.into(),
            me,
            roster: Arc::new(Roster::new()),
            sessions: Mutex::new(SessionArena::new()),
            outbound_tx,
            events_tx,
            factory,
            cancel: CancellationToken::new(),
        });

        tokio::spawn(room.clone().pub_loop(outbound_rx));
        tokio::spawn(room.clone().sub_loop());
        tokio::spawn(room.clone().heartbeat_loop());
        tokio::spawn(room.clone().roster_sweep_loop());

        room
    }

    pub fn roster(&self) -> &Arc<Roster> {
        &self.roster
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancel every background loop and abort every running session,
    /// matching spec §5's "single lifecycle cancellation handle".
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        self.sessions.lock().await.abort_all();
    }

    async fn log(&self, level: LogLevel, message: impl Into<String>) {
        let _ = self.events_tx.send(RoomEvent::Log { level, message: message.into() }).await;
    }

    // -- publish-facing API ---------------------------------------------

    pub async fn send_chat(&self, text: impl Into<String>) {
        let envelope = Envelope::Chat {
            senderid: self.me.party_id(),
            sendername: self.me.participant.nick.clone(),
            usermessage: text.into(),
        };
        let _ = self.outbound_tx.send(envelope).await;
    }

    /// Publish a start-keygen envelope and spawn our own session locally.
    /// The local and remote paths converge on the same parameters: the same
    /// envelope is what remote peers use to spawn their sessions too (spec
    /// §4.7).
    pub async fn initiate_keygen(self: &Arc<Self>, wallet: impl Into<String>, threshold: u16, signers: Vec<Participant>) {
        let wallet = wallet.into();
        let envelope = Envelope::StartKeygen {
            senderid: self.me.party_id(),
            sendername: self.me.participant.nick.clone(),
            wallet: wallet.clone(),
            threshold,
            signers: signers.clone(),
        };
        let _ = self.outbound_tx.send(envelope).await;
        self.confirm_keygen(wallet, threshold, signers).await;
    }

    pub async fn initiate_sign(self: &Arc<Self>, wallet: impl Into<String>, message_hash: [u8; 32], signers: Vec<Participant>) {
        let wallet = wallet.into();
        let envelope = Envelope::StartSign {
            senderid: self.me.party_id(),
            sendername: self.me.participant.nick.clone(),
            wallet: wallet.clone(),
            message_hash,
            signers: signers.clone(),
        };
        let _ = self.outbound_tx.send(envelope).await;
        self.confirm_sign(wallet, message_hash, signers).await;
    }

    pub async fn initiate_send_tx(&self, wallet: impl Into<String>, amount: u64, dest_addr: impl Into<String>, memo: impl Into<String>, signers: Vec<Participant>) {
        let envelope = Envelope::StartSendTx {
            senderid: self.me.party_id(),
            sendername: self.me.participant.nick.clone(),
            wallet: wallet.into(),
            amount,
            dest_addr: dest_addr.into(),
            memo: memo.into(),
            signers,
        };
        let _ = self.outbound_tx.send(envelope).await;
    }

    /// Called once the user (or an auto-accepting test harness) has
    /// confirmed participation in a keygen a `StartKeygen` envelope named
    /// us for. Spawns the local session if one isn't already running for
    /// this `(wallet, Keygen)` pair.
    pub async fn confirm_keygen(self: &Arc<Self>, wallet: String, threshold: u16, signers: Vec<Participant>) {
        let mut party_ids: Vec<PartyId> = signers.iter().map(|p| p.party_id()).collect();
        party_ids.sort();
        self.spawn_session(wallet, SessionKind::Keygen, SessionPayload::Keygen { threshold }, party_ids).await;
    }

    pub async fn confirm_sign(self: &Arc<Self>, wallet: String, message_hash: [u8; 32], signers: Vec<Participant>) {
        let mut party_ids: Vec<PartyId> = signers.iter().map(|p| p.party_id()).collect();
        party_ids.sort();
        self.spawn_session(wallet, SessionKind::Sign, SessionPayload::Sign { message_hash }, party_ids).await;
    }

    async fn spawn_session(self: &Arc<Self>, wallet: String, kind: SessionKind, payload: SessionPayload, party_ids: Vec<PartyId>) {
        let key: SessionKey = (wallet.clone(), kind);
        let self_id = self.me.party_id();

        let handler = match self.factory.build(&wallet, self_id, &party_ids, payload).await {
            Ok(h) => h,
            Err(e) => {
                self.log(LogLevel::Error, format!("failed to build session handler for '{wallet}': {e}")).await;
                return;
            }
        };

        let (inbound_tx, inbound_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let io = BusIo {
            outbound_tx: self.outbound_tx.clone(),
            sendername: self.me.participant.nick.clone(),
            wallet: wallet.clone(),
            kind,
            inbound_rx,
        };

        let room = self.clone();
        let task_wallet = wallet.clone();
        let task = tokio::spawn(async move {
            let outcome = run_session(handler, io).await;
            room.sessions.lock().await.remove(&(task_wallet.clone(), kind));
            match outcome {
                Ok(result) => {
                    let _ = room.events_tx.send(RoomEvent::SessionCompleted { wallet: task_wallet, kind, result }).await;
                }
                Err(e) => {
                    let _ = room.events_tx.send(RoomEvent::SessionFailed { wallet: task_wallet, kind, error: e.to_string() }).await;
                }
            }
        });

        let mut sessions = self.sessions.lock().await;
        if let Err(_handle) = sessions.insert(key, SessionHandle { inbound: inbound_tx, task }) {
            drop(sessions);
            self.log(LogLevel::Info, format!("a {kind:?} session for wallet '{wallet}' is already running; dropping duplicate start")).await;
        }
    }

    // -- background loops -------------------------------------------------

    async fn pub_loop(self: Arc<Self>, mut outbound_rx: mpsc::Receiver<Envelope>) {
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return,
                maybe = outbound_rx.recv() => {
                    let Some(envelope) = maybe else { return };
                    match serde_json::to_vec(&envelope) {
                        Ok(bytes) => {
                            if let Err(e) = self.transport.publish(&self.topic, bytes).await {
                                self.log(LogLevel::Error, format!("could not publish to topic: {e}")).await;
                            }
                        }
                        Err(e) => self.log(LogLevel::Error, format!("could not marshal envelope: {e}")).await,
                    }
                }
            }
        }
    }

    async fn sub_loop(self: Arc<Self>) {
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return,
                next = self.transport.next() => {
                    let Some((_peer_tag, bytes)) = next else {
                        self.log(LogLevel::Error, "subscription has closed").await;
                        return;
                    };
                    self.handle_inbound(&bytes).await;
                }
            }
        }
    }

    async fn handle_inbound(self: &Arc<Self>, bytes: &[u8]) {
        let envelope: Envelope = match serde_json::from_slice(bytes) {
            Ok(e) => e,
            Err(e) => {
                self.log(LogLevel::Error, format!("could not unmarshal envelope: {e}")).await;
                return;
            }
        };

        // Drop envelopes whose sender equals self — a participant never
        // sees their own heartbeat/chat/protocol message as inbound
        // (spec §4.4, testable property 4).
        if envelope.sender() == self.me.party_id() {
            return;
        }

        match envelope {
            Envelope::Chat { senderid, sendername, usermessage } => {
                let _ = self.events_tx.send(RoomEvent::ChatMessage { sender_id: senderid, sender_nick: sendername, text: usermessage }).await;
            }
            Envelope::Advertise { advmsg, .. } => {
                let is_new = self.roster.advertise(advmsg.clone()).await;
                if is_new {
                    info!(nick = %advmsg.nick, "participant joined");
                    let _ = self.events_tx.send(RoomEvent::ParticipantJoined { participant: advmsg }).await;
                }
            }
            Envelope::StartKeygen { wallet, threshold, signers, .. } => {
                if self.names_self(&signers) {
                    let _ = self.events_tx.send(RoomEvent::KeygenRequested { wallet, threshold, signers }).await;
                }
            }
            Envelope::StartSign { wallet, message_hash, signers, .. } => {
                if self.names_self(&signers) {
                    let _ = self.events_tx.send(RoomEvent::SignRequested { wallet, message_hash, signers }).await;
                }
            }
            Envelope::StartSendTx { wallet, amount, dest_addr, memo, signers, .. } => {
                if self.names_self(&signers) {
                    let _ = self.events_tx.send(RoomEvent::SendTxRequested { wallet, amount, dest_addr, memo, signers }).await;
                }
            }
            Envelope::Protocol { senderid, wallet, kind, protmessage, .. } => {
                self.route_protocol_message(senderid, wallet, kind, protmessage).await;
            }
        }
    }

    /// Demultiplexing: a protocol envelope is forwarded to the session's
    /// handler only if addressed to self (broadcast, or recipient == self),
    /// per spec §4.3's routing rule. This happens here, at the Room, not
    /// inside the handler.
    async fn route_protocol_message(&self, sender: PartyId, wallet: String, kind: SessionKind, wire: WireProtocolMessage) {
        let for_me = wire.recipient.is_none() || wire.recipient == Some(self.me.party_id());
        if !for_me {
            return;
        }

        debug!(%wallet, ?kind, "routing protocol message");
        let key: SessionKey = (wallet, kind);
        let sender_tx = {
            let sessions = self.sessions.lock().await;
            sessions.inbound_sender(&key)
        };
        match sender_tx {
            Some(tx) => {
                let msg = ProtocolMessage { sender, recipient: wire.recipient, payload: wire.payload };
                if tx.send(msg).await.is_err() {
                    warn!(wallet = %key.0, "session inbound channel closed; message dropped");
                }
            }
            None => {
                // No running session for this (wallet, kind) — message is
                // for a session that hasn't started, already finished, or
                // was abandoned. Logged and dropped, never fatal.
                debug!(wallet = %key.0, "no running session for protocol message, dropping");
            }
        }
    }

    fn names_self(&self, signers: &[Participant]) -> bool {
        let self_id = self.me.party_id();
        signers.iter().any(|p| p.party_id() == self_id)
    }

    async fn heartbeat_loop(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(HEARTBEAT_INTERVAL);
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return,
                _ = ticker.tick() => {
                    let envelope = Envelope::Advertise {
                        senderid: self.me.party_id(),
                        sendername: self.me.participant.nick.clone(),
                        advmsg: self.me.participant.clone(),
                    };
                    let _ = self.outbound_tx.send(envelope).await;
                }
            }
        }
    }

    async fn roster_sweep_loop(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(ROSTER_SWEEP_INTERVAL);
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return,
                _ = ticker.tick() => {
                    for entry in self.roster.evict_expired().await {
                        info!(nick = %entry.participant.nick, "participant left (ttl expired)");
                        let _ = self.events_tx.send(RoomEvent::ParticipantLeft { participant: entry.participant }).await;
                    }
                }
            }
        }
    }
}

/// Bridges the session engine's [`SessionIo`] contract onto the Room's
/// outbound envelope channel and a per-session inbound `mpsc` queue that
/// `route_protocol_message` feeds.
struct BusIo {
    outbound_tx: mpsc::Sender<Envelope>,
    sendername: String,
    wallet: String,
    kind: SessionKind,
    inbound_rx: mpsc::Receiver<ProtocolMessage>,
}

#[async_trait]
impl SessionIo for BusIo {
    async fn send(&mut self, msg: ProtocolMessage) -> Result<(), ProtocolError> {
        let envelope = Envelope::Protocol {
            senderid: msg.sender,
            sendername: self.sendername.clone(),
            wallet: self.wallet.clone(),
            kind: self.kind,
            protmessage: WireProtocolMessage { recipient: msg.recipient, payload: msg.payload },
        };
        self.outbound_tx.send(envelope).await.map_err(|_| ProtocolError::BusClosed)
    }

    async fn recv(&mut self) -> Option<ProtocolMessage> {
        self.inbound_rx.recv().await
    }
}
