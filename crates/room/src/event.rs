use thresher_party::{Participant, PartyId};
use thresher_session::{HandlerResult, ProtocolError, SessionKind};

/// Log severity, matching chat.go's `logLevelType` (debug/info/error).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Error,
}

/// Everything the Room surfaces to whatever is consuming it — a terminal
/// UI, a headless test harness, or a higher-level wallet service. The
/// terminal UI itself is out of scope (spec §1); this is the event sink
/// contract it would be built on.
#[derive(Clone, Debug)]
pub enum RoomEvent {
    Log { level: LogLevel, message: String },

    ChatMessage { sender_id: PartyId, sender_nick: String, text: String },

    ParticipantJoined { participant: Participant },
    ParticipantLeft { participant: Participant },

    /// A start-keygen/start-sign envelope named self as a signer. A caller
    /// (command dispatcher, spec §4.7) should prompt for confirmation and
    /// then call `Room::confirm_keygen`/`confirm_sign`.
    KeygenRequested { wallet: String, threshold: u16, signers: Vec<Participant> },
    SignRequested { wallet: String, message_hash: [u8; 32], signers: Vec<Participant> },

    /// A start-send-tx envelope. Building the unsigned tx (and thus the
    /// message hash to actually sign) needs a `ChainAdapter`, which lives
    /// outside this crate — the consumer is expected to build the tx, then
    /// drive signing itself via `Room::initiate_sign`/`confirm_sign`.
    SendTxRequested { wallet: String, amount: u64, dest_addr: String, memo: String, signers: Vec<Participant> },

    SessionCompleted { wallet: String, kind: SessionKind, result: HandlerResult },
    SessionFailed { wallet: String, kind: SessionKind, error: String },
}

impl From<&ProtocolError> for LogLevel {
    fn from(_: &ProtocolError) -> Self {
        LogLevel::Error
    }
}
