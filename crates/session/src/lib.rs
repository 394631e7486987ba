//! Session engine: per-session wrapper driving a [`Handler`] against a
//! message bus.
//!
//! The Room owns demultiplexing (which envelopes are protocol messages
//! addressed to self); this crate only drives the handler's inbound/outbound
//! queues until the protocol finishes or fails. Grounded in
//! `protocols/handler.go`'s `handlerLoop` (a `select` over the handler's
//! outbound channel and the network's inbound channel for this party).

mod cmp;
mod error;
mod handler;
mod message;
mod session;

pub use cmp::{extract_public_key, CmpHandler};
pub use error::ProtocolError;
pub use handler::{Handler, HandlerResult};
pub use message::{ProtocolMessage, SessionKind};
pub use session::{SessionIo, SessionOutcome};
