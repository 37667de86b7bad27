/// Reasons an incoming frame is rejected before it reaches the store.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("message has no \"type\" field")]
    MissingType,
    #[error("unknown message type: {0}")]
    UnknownType(String),
    #[error("error messages may only come from the administrative sender, got: {0}")]
    ErrorFromPeer(String),
}
