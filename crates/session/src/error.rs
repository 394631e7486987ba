use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed protocol message: {0}")]
    Decode(String),

    #[error("sender {0} is not part of this session's party set")]
    UnknownSender(String),

    #[error("cmp state machine error: {0}")]
    StateMachine(String),

    #[error("cmp protocol reported failure: {0}")]
    Failed(String),

    #[error("message bus closed before the session completed")]
    BusClosed,
}
