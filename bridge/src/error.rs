use engine::TransportError;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("Failed to start engine: {0}")]
    Spawn(#[from] TransportError),

    #[error("No embedded engine is configured")]
    NoEmbeddedEngine,

    #[error("Engine gave no bestmove within {waited:?}")]
    EngineUnresponsive { waited: Duration },

    #[error("Engine closed before answering")]
    EngineClosed,

    #[error("Position changed while the engine was thinking")]
    PositionChanged,

    #[error("Move {mv} rejected: {source}")]
    MoveRejected {
        mv: String,
        #[source]
        source: chess::GameError,
    },

    #[error("Failed to start worker thread: {0}")]
    Thread(#[source] std::io::Error),
}
