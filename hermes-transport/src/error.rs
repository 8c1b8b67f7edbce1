use std::time::Duration;

use thiserror::Error;

/// The connection was lost, refused, or never arrived, in every sense the
/// transport layer can observe.
#[derive(Debug, Error)]
pub enum ConnectionLost {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("expected message <{tag}>, but timed out after {waited:?}")]
    Timeout { tag: String, waited: Duration },

    #[error("socket was closed before expected message <{tag}> arrived")]
    ClosedWhileWaiting { tag: String },

    #[error("peer closed the connection")]
    PeerClosed,

    #[error("frame exceeded the maximum message size of {max} bytes")]
    FrameTooLarge { max: usize },

    #[error("connection is not established")]
    NotConnected,

    #[error("a peer is already connected on this channel")]
    AlreadyConnected,

    #[error("{0}")]
    Parse(#[from] hermes_message::ParseError),

    #[error(transparent)]
    StateMachine(#[from] hermes_state::StateMachineError),
}
