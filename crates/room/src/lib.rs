//! Room / message bus: publish/subscribe fan-out over a [`Transport`],
//! roster maintenance, heartbeat, TTL eviction, and protocol-message
//! demultiplexing into running [`thresher_session`] sessions.
//!
//! Grounded in `network/chat/chat.go`'s `ChatRoom` (`JoinChatRoom`,
//! `PubLoop`, `SubLoop`, `advertiseLoop`, `refreshParticipantsLoop`,
//! `runProtocolKeygen`/`runProtocolSign`/`runProtocolSendTx`), generalized
//! from a libp2p pubsub topic to the injected [`Transport`] trait since the
//! gossip layer itself is out of scope (spec §1).

mod envelope;
mod error;
mod event;
mod roster;
mod room;
mod session_registry;
mod transport;

pub use envelope::{Envelope, WireProtocolMessage};
pub use error::RoomError;
pub use event::{LogLevel, RoomEvent};
pub use roster::{Roster, RosterEntry, ROSTER_TTL};
pub use room::{Room, SessionFactory, SessionPayload};
pub use transport::{PeerTag, Transport, TransportError};
