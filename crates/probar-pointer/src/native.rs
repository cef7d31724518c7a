//! Native input channel.
//!
//! When the host drives the browser through a native-input channel (for
//! example CDP `Input.dispatchMouseEvent`), movement steps are recorded as
//! [`NativeEvent`]s and replayed in one batch at the end.

use crate::config::Modifiers;
use crate::geometry::ClientPoint;
use crate::result::PointerResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Modifier bit for Alt in CDP input events
pub const MODIFIER_ALT: u8 = 1;
/// Modifier bit for Ctrl in CDP input events
pub const MODIFIER_CTRL: u8 = 2;
/// Modifier bit for Meta in CDP input events
pub const MODIFIER_META: u8 = 4;
/// Modifier bit for Shift in CDP input events
pub const MODIFIER_SHIFT: u8 = 8;

/// A recorded native input event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum NativeEvent {
    /// Mouse moved to a client-space point
    MouseMoved {
        /// X coordinate
        x: f64,
        /// Y coordinate
        y: f64,
        /// CDP modifier bitmask
        modifiers: u8,
    },
    /// Touch point moved
    TouchMoved {
        /// X coordinate
        x: f64,
        /// Y coordinate
        y: f64,
    },
}

impl NativeEvent {
    /// Create a mouse move event
    #[must_use]
    pub fn mouse_moved(point: ClientPoint, modifiers: Modifiers) -> Self {
        Self::MouseMoved {
            x: point.x,
            y: point.y,
            modifiers: modifier_bits(modifiers),
        }
    }

    /// Create a touch move event
    #[must_use]
    pub const fn touch_moved(point: ClientPoint) -> Self {
        Self::TouchMoved {
            x: point.x,
            y: point.y,
        }
    }

    /// Target point of the event
    #[must_use]
    pub const fn point(&self) -> ClientPoint {
        match self {
            Self::MouseMoved { x, y, .. } | Self::TouchMoved { x, y } => ClientPoint::new(*x, *y),
        }
    }
}

/// CDP modifier bitmask for held keys
#[must_use]
pub const fn modifier_bits(modifiers: Modifiers) -> u8 {
    let mut bits = 0;
    if modifiers.alt {
        bits |= MODIFIER_ALT;
    }
    if modifiers.ctrl {
        bits |= MODIFIER_CTRL;
    }
    if modifiers.meta {
        bits |= MODIFIER_META;
    }
    if modifiers.shift {
        bits |= MODIFIER_SHIFT;
    }
    bits
}

/// Low-level input channel of the host browser
#[async_trait]
pub trait NativeInput: Send + Sync {
    /// Build a move event for a point without dispatching it
    async fn create_move_event(
        &self,
        point: ClientPoint,
        modifiers: Modifiers,
    ) -> PointerResult<NativeEvent>;

    /// Dispatch a batch of events in order
    async fn execute_event_sequence(&self, events: Vec<NativeEvent>) -> PointerResult<()>;
}
