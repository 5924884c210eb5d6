use thiserror::Error;
use uuid::Uuid;

use crate::broker::ConnectionId;

/// Failures that abort the handling of a single inbound message.
///
/// None of these reach a client as a distinct payload: the dispatcher turns
/// every variant into a state resync.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("malformed message: {0}")]
    Parse(String),

    #[error("payload does not match action {action}: {reason}")]
    PayloadShape {
        action: &'static str,
        reason: String,
    },

    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: Uuid },
}

impl SyncError {
    pub fn shape(action: &'static str, reason: impl Into<String>) -> Self {
        SyncError::PayloadShape {
            action,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BrokerError {
    #[error("connection {0} is already attached")]
    AlreadyAttached(ConnectionId),
}
