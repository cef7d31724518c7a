//! Probar Pointer: cursor movement automation for multi-frame pages
//!
//! Moves a simulated cursor from its current position to a point on an
//! element with human-plausible timing. Targets may live in nested frames
//! owned by other windows; cursor ownership is pulled across frame
//! boundaries through an explicit request/response handoff.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                       MoveAutomation::run                        │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  ┌────────────┐   ┌────────────┐   ┌────────────┐   ┌─────────┐  │
//! │  │ resolve    │──►│ end point  │──►│ handoff    │──►│ stepper │  │
//! │  │ target     │   │ (coords)   │   │ (frames)   │   │         │  │
//! │  └────────────┘   └────────────┘   └────────────┘   └────┬────┘  │
//! │                                                          ▼       │
//! │                                  ┌───────────────────────────┐   │
//! │                                  │ StepEmitter               │   │
//! │                                  │  synthetic │ native batch │   │
//! │                                  └───────────────────────────┘   │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything the host browser provides (layout, hit-testing, scrolling,
//! event dispatch, native input, the cursor and cross-window messaging) is
//! injected through traits on an [`AutomationContext`].
//!
//! # Example
//!
//! ```no_run
//! use probar_pointer::{AutomationContext, ElementRef, MoveAutomation, MoveOptions, WindowId};
//! use std::sync::Arc;
//!
//! # async fn demo(context: Arc<AutomationContext>) -> probar_pointer::PointerResult<()> {
//! let button = ElementRef::new("submit", "button");
//! let options = MoveOptions::new().offset(5.0, 5.0);
//! let automation = MoveAutomation::create(context, &button, options).await?;
//! let outcome = automation.run().await?;
//! assert!(outcome.is_completed());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]

/// Movement automations and the per-window automation context
pub mod automation;
/// Time source for pacing movement steps
pub mod clock;
/// Speed settings, modifier keys and per-window tunables
pub mod config;
/// Conversions from element offsets to client and device points
pub mod coords;
/// The logical cursor and its single owning window
pub mod cursor;
/// Host page collaborators: documents, hit-testing and scrolling
pub mod dom;
/// Turning movement steps into DOM or native events
pub mod emission;
/// Points, rectangles and coordinate spaces
pub mod geometry;
/// Cross-frame cursor handoff
///
/// A window that does not own the cursor asks the owner to walk it to the
/// shared frame boundary, then continues from there.
pub mod handoff;
/// Native input events and modifier masks
pub mod native;
/// Error types
pub mod result;
/// Movement planning and timed stepping
pub mod stepper;
/// Target element resolution
pub mod target;
/// Message transports between windows
pub mod transport;

/// In-memory host collaborators for tests and demos
pub mod testing;

pub use automation::{
    perform_move, AutomationContext, AutomationContextBuilder, MoveAutomation, MoveOutcome,
    SkipReason,
};
pub use clock::{Clock, ManualClock, TokioClock};
pub use config::{
    AutomationConfig, AutomationSettings, Modifiers, MoveOptions, CURSOR_FACTOR,
    DEFAULT_HANDOFF_TIMEOUT_MS, DEFAULT_TICK_INTERVAL_MS, MAX_CURSOR_SPEED, MAX_DRAGGING_SPEED,
};
pub use coords::{
    device_point, element_client_point, reachable_end_point, root_client_point,
    target_client_point,
};
pub use cursor::{Cursor, CursorState, SharedCursor};
pub use dom::{Document, ElementKind, ElementRef, HitTester, ScrollAutomation, WindowId};
pub use emission::{
    DescriptorTarget, EventDescriptor, EventDispatcher, EventOptions, EventSequenceBuilder,
    HoverTracker, NativeBatchEmitter, PointerSequenceBuilder, SequenceRequest, StepEmitter,
    SyntheticEmitter, TransitionKind,
};
pub use geometry::{
    AxisValues, Boundary, ClientPoint, ClientRect, ClientSpace, CoordinateSpace, DevicePoint,
    DeviceSpace, DocumentPoint, DocumentSpace, Point, Rounding, ScreenMetrics,
};
pub use handoff::{
    move_to_current_frame, FrameMessage, HandoffOutcome, HandoffResponder, HandoffState,
    IframeGeometry, MoveRequest, MoveResponse, MOVE_REQUEST_CMD, MOVE_RESPONSE_CMD,
};
pub use native::{
    modifier_bits, NativeEvent, NativeInput, MODIFIER_ALT, MODIFIER_CTRL, MODIFIER_META,
    MODIFIER_SHIFT,
};
pub use result::{PointerError, PointerResult, RemoteFailure};
pub use stepper::{movement_duration, MovePath, MovePlan, MoveStep, MoveStepper};
pub use target::{resolve_target, ResolvedTarget, TargetOffset};
pub use transport::{
    DirectTransport, Envelope, FrameHandler, FrameTransport, MessageBus, Payload,
};

/// Install a `tracing` subscriber filtered by `RUST_LOG`
///
/// Defaults to `probar_pointer=info` when `RUST_LOG` is unset. Does nothing
/// if a global subscriber is already installed, so tests may call it freely.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("probar_pointer=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
