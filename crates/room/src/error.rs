use thiserror::Error;

#[derive(Debug, Error)]
pub enum RoomError {
    #[error("transport publish failed: {0}")]
    Transport(String),

    #[error("failed to join topic: {0}")]
    Join(String),

    #[error("a session for wallet '{wallet}' ({kind:?}) is already running")]
    SessionAlreadyRunning { wallet: String, kind: thresher_session::SessionKind },
}
