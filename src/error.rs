//! Error taxonomy for the capture and dispatch loops.
//!
//! Only source-level failures are fatal to the capture loop. Everything else is
//! reported per event (capture) or per poll (dispatch) and the loop keeps going.

use std::io;
use std::path::PathBuf;

/// Errors raised while running a capture cycle.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    /// The frame source has no more cycles to hand out.
    #[error("frame source exhausted")]
    SourceExhausted,

    /// The frame source failed to produce a cycle.
    #[error("frame source failed: {0:#}")]
    Source(anyhow::Error),

    /// The selected frame could not be written to the capture directory.
    #[error("failed to persist capture {name}: {source}")]
    Persist {
        name: String,
        #[source]
        source: io::Error,
    },
}

impl CaptureError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::SourceExhausted | Self::Source(_))
    }
}

/// Errors raised by the delivery channel.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// The notification could not be turned into a transport message.
    #[error("invalid message: {0}")]
    Message(String),

    /// The transport rejected or failed to carry the message.
    #[error("transport error: {0}")]
    Transport(String),
}

/// Errors raised while forming or sending a batch.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("failed to scan {}: {source}", dir.display())]
    Scan {
        dir: PathBuf,
        #[source]
        source: io::Error,
    },

    /// One member of the batch could not be read; the whole batch is abandoned.
    #[error("attachment {name} unreadable: {source}")]
    Attachment {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("delivery failed: {0}")]
    Delivery(#[from] DeliveryError),

    /// A delivered file could not be removed afterwards.
    #[error("failed to delete delivered {name}: {source}")]
    Delete {
        name: String,
        #[source]
        source: io::Error,
    },
}
