//! Result and error types for pointer automation.

use crate::dom::WindowId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for pointer automation operations
pub type PointerResult<T> = Result<T, PointerError>;

/// Errors that can surface from a pointer automation
///
/// Unreachable targets are not errors: an off-viewport end point ends the
/// automation with [`crate::MoveOutcome::Skipped`].
#[derive(Debug, Error)]
pub enum PointerError {
    /// The active window never answered a handoff request
    #[error("Cursor handoff from window {window} to window {target} timed out after {waited_ms}ms")]
    HandoffTimeout {
        /// Window driving the movement
        window: WindowId,
        /// Window that owned the cursor
        target: WindowId,
        /// Time waited before giving up
        waited_ms: u64,
    },

    /// A handoff is already waiting on the same response channel
    #[error("Window {window} already has a pending request on channel '{channel}'")]
    HandoffInFlight {
        /// Window that tried to send the second request
        window: WindowId,
        /// Response channel name
        channel: String,
    },

    /// The transport has no route to the window
    #[error("Window {window} is not reachable (detached or navigated away)")]
    WindowUnreachable {
        /// Window that could not be reached
        window: WindowId,
    },

    /// A message arrived on a channel that expected something else
    #[error("Unexpected message on channel '{channel}': {received}")]
    UnexpectedMessage {
        /// Channel the message arrived on
        channel: String,
        /// Command of the received message
        received: String,
    },

    /// A host collaborator failed
    #[error("{stage} failed in window {window}: {message}")]
    Collaborator {
        /// Automation stage (e.g. "scroll", "step #3", "native-replay")
        stage: String,
        /// Window the stage ran in
        window: WindowId,
        /// Error message
        message: String,
    },

    /// Configuration rejected by validation
    #[error("Invalid automation config: {message}")]
    InvalidConfig {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl PointerError {
    /// Build a collaborator failure for a stage of an automation
    pub fn collaborator(
        stage: impl Into<String>,
        window: &WindowId,
        message: impl std::fmt::Display,
    ) -> Self {
        Self::Collaborator {
            stage: stage.into(),
            window: window.clone(),
            message: message.to_string(),
        }
    }

    /// Re-label a collaborator failure with the stage it surfaced in
    ///
    /// Other variants pass through unchanged.
    #[must_use]
    pub fn at_stage(self, stage: impl Into<String>) -> Self {
        match self {
            Self::Collaborator {
                window, message, ..
            } => Self::Collaborator {
                stage: stage.into(),
                window,
                message,
            },
            other => other,
        }
    }

    /// Whether this error is a handoff timeout
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::HandoffTimeout { .. })
    }
}

/// A failure reported by another window, in wire form
///
/// Errors cannot be sent between windows directly. The answering side turns
/// its error into a `RemoteFailure` and the requester turns it back into the
/// matching [`PointerError`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum RemoteFailure {
    /// See [`PointerError::HandoffTimeout`]
    HandoffTimeout {
        /// Window driving the movement
        window: WindowId,
        /// Window that owned the cursor
        target: WindowId,
        /// Time waited before giving up
        #[serde(rename = "waitedMs")]
        waited_ms: u64,
    },
    /// See [`PointerError::HandoffInFlight`]
    HandoffInFlight {
        /// Window that tried to send the second request
        window: WindowId,
        /// Response channel name
        channel: String,
    },
    /// See [`PointerError::WindowUnreachable`]
    WindowUnreachable {
        /// Window that could not be reached
        window: WindowId,
    },
    /// See [`PointerError::UnexpectedMessage`]
    UnexpectedMessage {
        /// Channel the message arrived on
        channel: String,
        /// Command of the received message
        received: String,
    },
    /// See [`PointerError::Collaborator`]
    Collaborator {
        /// Automation stage
        stage: String,
        /// Window the stage ran in
        window: WindowId,
        /// Error message
        message: String,
    },
    /// Any other failure, by message only
    Other {
        /// Error message
        message: String,
    },
}

impl From<&PointerError> for RemoteFailure {
    fn from(err: &PointerError) -> Self {
        match err {
            PointerError::HandoffTimeout {
                window,
                target,
                waited_ms,
            } => Self::HandoffTimeout {
                window: window.clone(),
                target: target.clone(),
                waited_ms: *waited_ms,
            },
            PointerError::HandoffInFlight { window, channel } => Self::HandoffInFlight {
                window: window.clone(),
                channel: channel.clone(),
            },
            PointerError::WindowUnreachable { window } => Self::WindowUnreachable {
                window: window.clone(),
            },
            PointerError::UnexpectedMessage { channel, received } => Self::UnexpectedMessage {
                channel: channel.clone(),
                received: received.clone(),
            },
            PointerError::Collaborator {
                stage,
                window,
                message,
            } => Self::Collaborator {
                stage: stage.clone(),
                window: window.clone(),
                message: message.clone(),
            },
            other => Self::Other {
                message: other.to_string(),
            },
        }
    }
}

impl RemoteFailure {
    /// Rebuild the error, attributing message-only failures to `remote`
    #[must_use]
    pub fn into_error(self, remote: &WindowId) -> PointerError {
        match self {
            Self::HandoffTimeout {
                window,
                target,
                waited_ms,
            } => PointerError::HandoffTimeout {
                window,
                target,
                waited_ms,
            },
            Self::HandoffInFlight { window, channel } => {
                PointerError::HandoffInFlight { window, channel }
            }
            Self::WindowUnreachable { window } => PointerError::WindowUnreachable { window },
            Self::UnexpectedMessage { channel, received } => {
                PointerError::UnexpectedMessage { channel, received }
            }
            Self::Collaborator {
                stage,
                window,
                message,
            } => PointerError::Collaborator {
                stage,
                window,
                message,
            },
            Self::Other { message } => PointerError::collaborator("remote", remote, message),
        }
    }
}
