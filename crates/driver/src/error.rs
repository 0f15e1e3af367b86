use mcore::{Capability, WidgetId, codec::CodecError};

/// Orchestrator failures.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// The worker answered with an error.
    #[error("{capability} failed: {message}")]
    Remote {
        capability: Capability,
        message: String,
    },
    /// The worker went away.
    #[error("worker disconnected")]
    Disconnected,
    /// A payload could not be built or a reply could not be read.
    #[error("malformed {capability} payload: {source}")]
    Payload {
        capability: Capability,
        #[source]
        source: serde_json::Error,
    },
    /// A derived buffer in the mirror could not be decoded.
    #[error(transparent)]
    Codec(#[from] CodecError),
    /// The widget is not in the mirror.
    #[error("widget {0} is not loaded")]
    Unknown(WidgetId),
}
