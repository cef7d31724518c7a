//! Step emission strategies.
//!
//! A movement hands every step to a [`StepEmitter`] chosen once when the
//! automation starts:
//!
//! - [`SyntheticEmitter`] moves the cursor, hit-tests the point and dispatches
//!   the ordered DOM event sequence on the element under it.
//! - [`NativeBatchEmitter`] records native move events and replays them in a
//!   single batch once the path is complete.
//!
//! Which events fire, and in what order, is decided by an
//! [`EventSequenceBuilder`]. The emitter only tracks which element is hovered.

use crate::config::{Modifiers, MoveOptions};
use crate::coords::device_point;
use crate::cursor::Cursor;
use crate::dom::{ElementRef, HitTester, WindowId};
use crate::geometry::{ClientPoint, DevicePoint, ScreenMetrics};
use crate::native::{NativeEvent, NativeInput};
use crate::result::PointerResult;
use crate::stepper::MoveStep;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

/// Which transition a sequence describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransitionKind {
    /// Plain pointer movement
    Move,
    /// Movement while dragging
    DragMove,
}

/// Element a descriptor is dispatched on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DescriptorTarget {
    /// Element under the cursor at this step
    Current,
    /// Element hovered before this step
    PreviouslyHovered,
}

/// One event to dispatch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDescriptor {
    /// DOM event type
    pub event: String,
    /// Dispatch target
    pub target: DescriptorTarget,
    /// Only fire when the hovered element changed on this step
    pub only_on_change: bool,
}

impl EventDescriptor {
    /// Event on the current element, every step
    #[must_use]
    pub fn on_current(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            target: DescriptorTarget::Current,
            only_on_change: false,
        }
    }

    /// Event on the current element when the hovered element changed
    #[must_use]
    pub fn entering(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            target: DescriptorTarget::Current,
            only_on_change: true,
        }
    }

    /// Event on the previously hovered element when it is being left
    #[must_use]
    pub fn leaving(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            target: DescriptorTarget::PreviouslyHovered,
            only_on_change: true,
        }
    }
}

/// Parameters for building a step's event sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceRequest {
    /// First emitting step of the automation
    pub is_first_step: bool,
    /// Touch simulation is active
    pub touch_mode: bool,
    /// Transition kind
    pub kind: TransitionKind,
}

/// Builds the ordered event list for one step
pub trait EventSequenceBuilder: Send + Sync {
    /// Ordered descriptors to dispatch
    fn build(&self, request: SequenceRequest) -> Vec<EventDescriptor>;
}

/// Standard pointer event ordering
///
/// The first step always enters the element under the cursor; later steps
/// only emit out/over pairs when the hovered element changes. Touch moves
/// have no hover transitions.
#[derive(Debug, Clone, Copy, Default)]
pub struct PointerSequenceBuilder;

impl EventSequenceBuilder for PointerSequenceBuilder {
    fn build(&self, request: SequenceRequest) -> Vec<EventDescriptor> {
        if request.touch_mode {
            return vec![EventDescriptor::on_current("touchmove")];
        }

        let (leave, over, step_event) = match request.kind {
            TransitionKind::Move => ("mouseout", "mouseover", "mousemove"),
            TransitionKind::DragMove => ("dragleave", "dragenter", "dragover"),
        };

        let mut sequence = vec![EventDescriptor::leaving(leave)];
        if request.is_first_step {
            sequence.push(EventDescriptor::on_current(over));
        } else {
            sequence.push(EventDescriptor::entering(over));
        }
        sequence.push(EventDescriptor::on_current(step_event));
        sequence
    }
}

/// Options attached to every synthesized event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventOptions {
    /// Client-space position
    pub client: ClientPoint,
    /// Device-space position, when the host exposes screen metrics
    pub device: Option<DevicePoint>,
    /// Pressed buttons bitmask; always zero for movement
    pub buttons: u8,
    /// Held modifier keys
    pub modifiers: Modifiers,
    /// Ask the dispatcher to suppress default drag behavior
    pub skip_default_drag_behavior: bool,
}

/// Dispatches one synthesized event on an element
#[async_trait]
pub trait EventDispatcher: Send + Sync {
    /// Dispatch `event` on `target`
    async fn dispatch(
        &self,
        target: &ElementRef,
        event: &str,
        options: &EventOptions,
    ) -> PointerResult<()>;
}

/// Last hovered element of a window
///
/// Shared across automations so leave/enter pairs stay correct from one
/// automation to the next.
#[derive(Debug, Clone, Default)]
pub struct HoverTracker {
    last: Arc<Mutex<Option<ElementRef>>>,
}

impl HoverTracker {
    /// Tracker with nothing hovered
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Currently hovered element
    #[must_use]
    pub fn get(&self) -> Option<ElementRef> {
        self.last
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Record the hovered element
    pub fn set(&self, element: ElementRef) {
        *self.last.lock().unwrap_or_else(PoisonError::into_inner) = Some(element);
    }

    /// Forget the hovered element
    pub fn clear(&self) {
        *self.last.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

/// Emission strategy for movement steps
#[async_trait]
pub trait StepEmitter: Send {
    /// Handle one step of the path
    async fn emit_step(&mut self, step: &MoveStep) -> PointerResult<()>;

    /// Called once after the final step
    async fn finish(&mut self, end: ClientPoint) -> PointerResult<()>;
}

/// Emits synthetic DOM events at every step
pub struct SyntheticEmitter {
    window: WindowId,
    cursor: Arc<dyn Cursor>,
    hit_tester: Arc<dyn HitTester>,
    builder: Arc<dyn EventSequenceBuilder>,
    dispatcher: Arc<dyn EventDispatcher>,
    hover: HoverTracker,
    screen: Option<ScreenMetrics>,
    modifiers: Modifiers,
    skip_default_drag_behavior: bool,
    kind: TransitionKind,
    touch_mode: bool,
    touch_target: Option<ElementRef>,
    first_step_occurred: bool,
}

impl fmt::Debug for SyntheticEmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyntheticEmitter")
            .field("window", &self.window)
            .field("kind", &self.kind)
            .field("touch_mode", &self.touch_mode)
            .field("first_step_occurred", &self.first_step_occurred)
            .finish_non_exhaustive()
    }
}

impl SyntheticEmitter {
    /// Create an emitter for one automation
    #[must_use]
    pub fn new(
        window: WindowId,
        cursor: Arc<dyn Cursor>,
        hit_tester: Arc<dyn HitTester>,
        builder: Arc<dyn EventSequenceBuilder>,
        dispatcher: Arc<dyn EventDispatcher>,
        hover: HoverTracker,
    ) -> Self {
        Self {
            window,
            cursor,
            hit_tester,
            builder,
            dispatcher,
            hover,
            screen: None,
            modifiers: Modifiers::none(),
            skip_default_drag_behavior: false,
            kind: TransitionKind::Move,
            touch_mode: false,
            touch_target: None,
            first_step_occurred: false,
        }
    }

    /// Take modifiers, drag flags and touch target from the request
    #[must_use]
    pub fn with_options(mut self, options: &MoveOptions) -> Self {
        self.modifiers = options.modifiers;
        self.skip_default_drag_behavior = options.skip_default_drag_behavior;
        self.kind = if options.drag_and_drop {
            TransitionKind::DragMove
        } else {
            TransitionKind::Move
        };
        self.touch_target = options.touch_target.clone();
        self
    }

    /// Enable touch simulation
    #[must_use]
    pub const fn with_touch_mode(mut self, touch_mode: bool) -> Self {
        self.touch_mode = touch_mode;
        self
    }

    /// Screen metrics used for device-space coordinates
    #[must_use]
    pub const fn with_screen_metrics(mut self, screen: Option<ScreenMetrics>) -> Self {
        self.screen = screen;
        self
    }

    /// Whether any step has emitted events yet
    #[must_use]
    pub const fn first_step_occurred(&self) -> bool {
        self.first_step_occurred
    }

    // In touch mode events go to the element the touch started on.
    fn corrected_top_element(&self, top: Option<ElementRef>) -> Option<ElementRef> {
        match (&self.touch_target, self.touch_mode) {
            (Some(pinned), true) => Some(pinned.clone()),
            _ => top,
        }
    }

    fn event_options(&self, point: ClientPoint) -> EventOptions {
        EventOptions {
            client: point,
            device: device_point(self.screen.as_ref(), point),
            buttons: 0,
            modifiers: self.modifiers,
            skip_default_drag_behavior: self.skip_default_drag_behavior,
        }
    }

    async fn emulate_events(&mut self, current: ElementRef, point: ClientPoint) {
        let options = self.event_options(point);
        let sequence = self.builder.build(SequenceRequest {
            is_first_step: !self.first_step_occurred,
            touch_mode: self.touch_mode,
            kind: self.kind,
        });
        let previous = self.hover.get();
        let changed = previous.as_ref() != Some(&current);

        for descriptor in &sequence {
            if descriptor.only_on_change && !changed {
                continue;
            }
            let target = match descriptor.target {
                DescriptorTarget::Current => Some(&current),
                DescriptorTarget::PreviouslyHovered => previous.as_ref(),
            };
            let Some(target) = target else {
                continue;
            };
            if let Err(err) = self
                .dispatcher
                .dispatch(target, &descriptor.event, &options)
                .await
            {
                tracing::warn!(
                    window = %self.window,
                    event = %descriptor.event,
                    target = %target,
                    error = %err,
                    "event dispatch failed"
                );
            }
        }

        self.first_step_occurred = true;
        self.hover.set(current);
    }
}

#[async_trait]
impl StepEmitter for SyntheticEmitter {
    async fn emit_step(&mut self, step: &MoveStep) -> PointerResult<()> {
        self.cursor.move_to(step.point).await?;

        let top = match self
            .hit_tester
            .element_from_point(self.cursor.position())
            .await
        {
            Ok(top) => top,
            Err(err) => {
                tracing::warn!(
                    window = %self.window,
                    step = step.index,
                    error = %err,
                    "hit-test failed"
                );
                None
            }
        };

        // Hosts may resolve nothing at a point; the step then emits nothing.
        let Some(current) = self.corrected_top_element(top) else {
            tracing::trace!(window = %self.window, step = step.index, "no element under cursor");
            return Ok(());
        };

        self.emulate_events(current, step.point).await;
        Ok(())
    }

    async fn finish(&mut self, _end: ClientPoint) -> PointerResult<()> {
        Ok(())
    }
}

/// Records native move events and replays them after the last step
pub struct NativeBatchEmitter {
    window: WindowId,
    cursor: Arc<dyn Cursor>,
    native: Arc<dyn NativeInput>,
    modifiers: Modifiers,
    touch_mode: bool,
    events: Vec<NativeEvent>,
}

impl fmt::Debug for NativeBatchEmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeBatchEmitter")
            .field("window", &self.window)
            .field("touch_mode", &self.touch_mode)
            .field("pending_events", &self.events.len())
            .finish_non_exhaustive()
    }
}

impl NativeBatchEmitter {
    /// Create an emitter for one automation
    #[must_use]
    pub fn new(
        window: WindowId,
        cursor: Arc<dyn Cursor>,
        native: Arc<dyn NativeInput>,
        modifiers: Modifiers,
    ) -> Self {
        Self {
            window,
            cursor,
            native,
            modifiers,
            touch_mode: false,
            events: Vec::new(),
        }
    }

    /// Record touch moves instead of mouse moves
    #[must_use]
    pub const fn with_touch_mode(mut self, touch_mode: bool) -> Self {
        self.touch_mode = touch_mode;
        self
    }

    /// Events recorded and not yet replayed
    #[must_use]
    pub fn pending(&self) -> &[NativeEvent] {
        &self.events
    }
}

#[async_trait]
impl StepEmitter for NativeBatchEmitter {
    async fn emit_step(&mut self, step: &MoveStep) -> PointerResult<()> {
        let event = if self.touch_mode {
            NativeEvent::touch_moved(step.point)
        } else {
            self.native
                .create_move_event(step.point, self.modifiers)
                .await?
        };
        self.events.push(event);
        Ok(())
    }

    async fn finish(&mut self, end: ClientPoint) -> PointerResult<()> {
        let events = std::mem::take(&mut self.events);
        tracing::debug!(
            window = %self.window,
            events = events.len(),
            "replaying native move batch"
        );
        self.native
            .execute_event_sequence(events)
            .await
            .map_err(|e| e.at_stage("native-replay"))?;
        self.cursor
            .move_to(end)
            .await
            .map_err(|e| e.at_stage("cursor-sync"))
    }
}
