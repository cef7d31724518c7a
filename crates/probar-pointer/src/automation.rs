//! Move automation orchestration.
//!
//! An [`AutomationContext`] bundles the host collaborators of one window.
//! A [`MoveAutomation`] is one movement request against that window:
//!
//! 1. resolve the target (once, at creation)
//! 2. scroll it into view unless asked not to
//! 3. compute the end point and skip if it is off-screen
//! 4. pull cursor ownership into this window
//! 5. step the cursor to the end point

use crate::clock::{Clock, TokioClock};
use crate::config::{AutomationConfig, Modifiers, MoveOptions};
use crate::coords::{device_point, reachable_end_point};
use crate::cursor::Cursor;
use crate::dom::{Document, ElementRef, HitTester, ScrollAutomation, WindowId};
use crate::emission::{
    EventDispatcher, EventOptions, EventSequenceBuilder, HoverTracker, NativeBatchEmitter,
    PointerSequenceBuilder,
    StepEmitter, SyntheticEmitter,
};
use crate::geometry::{AxisValues, ClientPoint};
use crate::handoff::{move_to_current_frame, HandoffOutcome, HandoffResponder};
use crate::native::NativeInput;
use crate::result::{PointerError, PointerResult};
use crate::stepper::{MovePlan, MoveStepper};
use crate::target::{resolve_target, ResolvedTarget};
use crate::transport::FrameTransport;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Host collaborators and settings for one window
pub struct AutomationContext {
    window: WindowId,
    document: Arc<dyn Document>,
    hit_tester: Arc<dyn HitTester>,
    scroll: Arc<dyn ScrollAutomation>,
    cursor: Arc<dyn Cursor>,
    transport: Arc<dyn FrameTransport>,
    sequence_builder: Arc<dyn EventSequenceBuilder>,
    dispatcher: Arc<dyn EventDispatcher>,
    native_input: Option<Arc<dyn NativeInput>>,
    clock: Arc<dyn Clock>,
    hover: HoverTracker,
    config: AutomationConfig,
}

impl fmt::Debug for AutomationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AutomationContext")
            .field("window", &self.window)
            .field("native_input", &self.native_input.is_some())
            .field("clock", &self.clock)
            .field("hover", &self.hover.get())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl AutomationContext {
    /// Start building a context for `window`
    #[must_use]
    pub fn builder(window: WindowId) -> AutomationContextBuilder {
        AutomationContextBuilder::new(window)
    }

    /// Window this context drives
    #[must_use]
    pub const fn window(&self) -> &WindowId {
        &self.window
    }

    /// Document collaborator
    #[must_use]
    pub fn document(&self) -> &dyn Document {
        self.document.as_ref()
    }

    /// Hit-testing collaborator
    #[must_use]
    pub fn hit_tester(&self) -> &dyn HitTester {
        self.hit_tester.as_ref()
    }

    /// Shared cursor
    #[must_use]
    pub fn cursor(&self) -> &dyn Cursor {
        self.cursor.as_ref()
    }

    /// Cross-window transport
    #[must_use]
    pub fn transport(&self) -> &dyn FrameTransport {
        self.transport.as_ref()
    }

    /// Native-input channel, when the host drives input natively
    #[must_use]
    pub fn native_input(&self) -> Option<&dyn NativeInput> {
        self.native_input.as_deref()
    }

    /// Hover bookkeeping shared by every automation in this window
    #[must_use]
    pub const fn hover(&self) -> &HoverTracker {
        &self.hover
    }

    /// Ambient configuration
    #[must_use]
    pub const fn config(&self) -> &AutomationConfig {
        &self.config
    }

    /// Handler that answers other windows' handoff requests for this window
    #[must_use]
    pub fn responder(self: &Arc<Self>) -> HandoffResponder {
        HandoffResponder::new(self.window.clone(), Arc::downgrade(self))
    }

    /// Leave the hovered element and forget it
    ///
    /// Used when the cursor exits this window without a local movement. With
    /// native input the browser emits the leave events itself.
    pub(crate) async fn release_hover(&self, modifiers: Modifiers) {
        let Some(hovered) = self.hover.get() else {
            return;
        };
        self.hover.clear();
        if self.native_input.is_some() {
            return;
        }

        let point = self.cursor.position();
        let options = EventOptions {
            client: point,
            device: device_point(self.document.screen_metrics().as_ref(), point),
            buttons: 0,
            modifiers,
            skip_default_drag_behavior: false,
        };
        for event in ["mouseout", "mouseleave"] {
            if let Err(err) = self.dispatcher.dispatch(&hovered, event, &options).await {
                tracing::warn!(
                    window = %self.window,
                    event,
                    target = %hovered,
                    error = %err,
                    "event dispatch failed"
                );
            }
        }
    }

    /// Emission strategy for one movement
    fn step_emitter(&self, options: &MoveOptions) -> Box<dyn StepEmitter> {
        if let Some(native) = &self.native_input {
            return Box::new(
                NativeBatchEmitter::new(
                    self.window.clone(),
                    Arc::clone(&self.cursor),
                    Arc::clone(native),
                    options.modifiers,
                )
                .with_touch_mode(self.config.touch_mode),
            );
        }

        Box::new(
            SyntheticEmitter::new(
                self.window.clone(),
                Arc::clone(&self.cursor),
                Arc::clone(&self.hit_tester),
                Arc::clone(&self.sequence_builder),
                Arc::clone(&self.dispatcher),
                self.hover.clone(),
            )
            .with_options(options)
            .with_touch_mode(self.config.touch_mode)
            .with_screen_metrics(self.document.screen_metrics()),
        )
    }
}

/// Builder for [`AutomationContext`]
pub struct AutomationContextBuilder {
    window: WindowId,
    document: Option<Arc<dyn Document>>,
    hit_tester: Option<Arc<dyn HitTester>>,
    scroll: Option<Arc<dyn ScrollAutomation>>,
    cursor: Option<Arc<dyn Cursor>>,
    transport: Option<Arc<dyn FrameTransport>>,
    sequence_builder: Arc<dyn EventSequenceBuilder>,
    dispatcher: Option<Arc<dyn EventDispatcher>>,
    native_input: Option<Arc<dyn NativeInput>>,
    clock: Option<Arc<dyn Clock>>,
    hover: HoverTracker,
    config: AutomationConfig,
}

impl fmt::Debug for AutomationContextBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AutomationContextBuilder")
            .field("window", &self.window)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl AutomationContextBuilder {
    /// Builder with the default sequence builder and configuration
    #[must_use]
    pub fn new(window: WindowId) -> Self {
        Self {
            window,
            document: None,
            hit_tester: None,
            scroll: None,
            cursor: None,
            transport: None,
            sequence_builder: Arc::new(PointerSequenceBuilder),
            dispatcher: None,
            native_input: None,
            clock: None,
            hover: HoverTracker::new(),
            config: AutomationConfig::default(),
        }
    }

    /// Use one host object as both document and hit-tester
    #[must_use]
    pub fn page<P>(mut self, page: Arc<P>) -> Self
    where
        P: Document + HitTester + 'static,
    {
        let document: Arc<dyn Document> = page.clone();
        let hit_tester: Arc<dyn HitTester> = page;
        self.document = Some(document);
        self.hit_tester = Some(hit_tester);
        self
    }

    /// Set the document collaborator
    #[must_use]
    pub fn document(mut self, document: Arc<dyn Document>) -> Self {
        self.document = Some(document);
        self
    }

    /// Set the hit-testing collaborator
    #[must_use]
    pub fn hit_tester(mut self, hit_tester: Arc<dyn HitTester>) -> Self {
        self.hit_tester = Some(hit_tester);
        self
    }

    /// Set the scroll collaborator
    #[must_use]
    pub fn scroll(mut self, scroll: Arc<dyn ScrollAutomation>) -> Self {
        self.scroll = Some(scroll);
        self
    }

    /// Set the shared cursor
    #[must_use]
    pub fn cursor(mut self, cursor: Arc<dyn Cursor>) -> Self {
        self.cursor = Some(cursor);
        self
    }

    /// Set the cross-window transport
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn FrameTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Replace the event sequence builder
    #[must_use]
    pub fn sequence_builder(mut self, builder: Arc<dyn EventSequenceBuilder>) -> Self {
        self.sequence_builder = builder;
        self
    }

    /// Set the event dispatcher
    #[must_use]
    pub fn dispatcher(mut self, dispatcher: Arc<dyn EventDispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Drive input through a native channel instead of synthetic events
    #[must_use]
    pub fn native_input(mut self, native: Arc<dyn NativeInput>) -> Self {
        self.native_input = Some(native);
        self.config.native_automation = true;
        self
    }

    /// Replace the pacing clock
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Share hover state with another context of the same window
    #[must_use]
    pub fn hover(mut self, hover: HoverTracker) -> Self {
        self.hover = hover;
        self
    }

    /// Set the ambient configuration
    #[must_use]
    pub fn config(mut self, config: AutomationConfig) -> Self {
        let native = self.config.native_automation;
        self.config = config;
        self.config.native_automation |= native;
        self
    }

    /// Validate and build the context
    pub fn build(self) -> PointerResult<AutomationContext> {
        self.config.validate()?;

        fn required<T: ?Sized>(value: Option<Arc<T>>, name: &str) -> PointerResult<Arc<T>> {
            value.ok_or_else(|| PointerError::InvalidConfig {
                message: format!("automation context is missing a {name}"),
            })
        }

        if self.config.native_automation && self.native_input.is_none() {
            return Err(PointerError::InvalidConfig {
                message: "native_automation is enabled but no native input channel was provided"
                    .to_string(),
            });
        }

        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(TokioClock::new(self.config.tick_interval())));

        Ok(AutomationContext {
            document: required(self.document, "document")?,
            hit_tester: required(self.hit_tester, "hit tester")?,
            scroll: required(self.scroll, "scroll automation")?,
            cursor: required(self.cursor, "cursor")?,
            transport: required(self.transport, "frame transport")?,
            dispatcher: required(self.dispatcher, "event dispatcher")?,
            window: self.window,
            sequence_builder: self.sequence_builder,
            native_input: self.native_input,
            clock,
            hover: self.hover,
            config: self.config,
        })
    }
}

/// Move the cursor from its current position to `end` in the context's window
///
/// No ownership check happens here; callers pull ownership first.
pub async fn perform_move(
    context: &AutomationContext,
    end: ClientPoint,
    options: &MoveOptions,
) -> PointerResult<usize> {
    let plan = MovePlan::new(
        context.cursor.position(),
        end,
        options.pixels_per_ms(),
        options.min_moving_time,
        context.config.touch_mode,
    );
    let mut emitter = context.step_emitter(options);
    MoveStepper::new(Arc::clone(&context.clock))
        .run(&plan, emitter.as_mut())
        .await
}

/// Why a movement did nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    /// The end point lies outside the window's viewport
    OutsideViewport,
}

/// Result of [`MoveAutomation::run`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MoveOutcome {
    /// Nothing was moved and no event was emitted
    Skipped {
        /// Why the movement was skipped
        reason: SkipReason,
    },
    /// The cursor reached the end point
    Completed {
        /// End point in the window's client space
        end: ClientPoint,
        /// Number of steps emitted
        steps: usize,
        /// Whether ownership had to be pulled from another window
        handoff: HandoffOutcome,
    },
}

impl MoveOutcome {
    /// Whether the movement ran
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

/// One pointer movement against an element of a window
#[derive(Debug)]
pub struct MoveAutomation {
    id: Uuid,
    context: Arc<AutomationContext>,
    target: ResolvedTarget,
    options: MoveOptions,
}

impl MoveAutomation {
    /// Resolve the target and prepare the movement
    ///
    /// An offset outside `element` retargets the document root.
    pub async fn create(
        context: Arc<AutomationContext>,
        element: &ElementRef,
        options: MoveOptions,
    ) -> PointerResult<Self> {
        let target = resolve_target(context.document(), element, options.offset)
            .await
            .map_err(|e| e.at_stage("resolve-target"))?;
        Ok(Self {
            id: Uuid::new_v4(),
            context,
            target,
            options,
        })
    }

    /// Unique id of this automation, used in log spans
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Target actually used for coordinates
    #[must_use]
    pub const fn target(&self) -> &ResolvedTarget {
        &self.target
    }

    /// Movement request
    #[must_use]
    pub const fn options(&self) -> &MoveOptions {
        &self.options
    }

    /// Run the movement to completion
    #[tracing::instrument(skip(self), fields(id = %self.id, window = %self.context.window()))]
    pub async fn run(&self) -> PointerResult<MoveOutcome> {
        let context = self.context.as_ref();

        if self.options.skip_scrolling {
            tracing::trace!("scrolling skipped");
        } else {
            let offset: AxisValues = self.target.offset.axis();
            let scrolled = context
                .scroll
                .scroll_into_view(&self.target.element, offset)
                .await
                .map_err(|e| e.at_stage("scroll"))?;
            tracing::trace!(scrolled, "scroll into view");
        }

        let Some(end) = reachable_end_point(context.document(), &self.target)
            .await
            .map_err(|e| e.at_stage("resolve-end-point"))?
        else {
            tracing::info!(element = %self.target.element, "end point outside viewport, skipping");
            return Ok(MoveOutcome::Skipped {
                reason: SkipReason::OutsideViewport,
            });
        };

        let handoff = move_to_current_frame(context, end, &self.options).await?;
        let steps = perform_move(context, end, &self.options).await?;
        tracing::debug!(x = end.x, y = end.y, steps, "move automation completed");

        Ok(MoveOutcome::Completed {
            end,
            steps,
            handoff,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::cursor::SharedCursor;
    use crate::geometry::ClientRect;
    use crate::testing::{FakePage, RecordingDispatcher, RecordingNativeInput, RecordingScroll};
    use crate::transport::DirectTransport;
    use std::time::Duration;

    fn page() -> Arc<FakePage> {
        Arc::new(
            FakePage::builder("top")
                .viewport(800.0, 600.0)
                .element(
                    ElementRef::new("box", "div"),
                    ClientRect::from_size(100.0, 100.0, 100.0, 100.0),
                )
                .build(),
        )
    }

    fn builder(
        page: Arc<FakePage>,
        scroll: Arc<RecordingScroll>,
        dispatcher: Arc<RecordingDispatcher>,
    ) -> AutomationContextBuilder {
        AutomationContext::builder(WindowId::new("top"))
            .page(page)
            .scroll(scroll)
            .cursor(Arc::new(SharedCursor::new(WindowId::new("top"))))
            .transport(Arc::new(DirectTransport::new()))
            .dispatcher(dispatcher)
            .clock(Arc::new(ManualClock::new(Duration::from_millis(5))))
    }

    mod builder_tests {
        use super::*;

        #[test]
        fn test_missing_collaborator_rejected() {
            let err = AutomationContext::builder(WindowId::new("top"))
                .page(page())
                .build()
                .unwrap_err();
            assert!(err.to_string().contains("missing a scroll automation"));
        }

        #[test]
        fn test_native_flag_needs_channel() {
            let err = builder(
                page(),
                Arc::new(RecordingScroll::new()),
                Arc::new(RecordingDispatcher::new()),
            )
            .config(AutomationConfig::new().with_native_automation(true))
            .build()
            .unwrap_err();
            assert!(matches!(err, PointerError::InvalidConfig { .. }));
        }

        #[test]
        fn test_native_channel_enables_flag() {
            let context = builder(
                page(),
                Arc::new(RecordingScroll::new()),
                Arc::new(RecordingDispatcher::new()),
            )
            .native_input(Arc::new(RecordingNativeInput::new()))
            .config(AutomationConfig::new())
            .build()
            .unwrap();
            assert!(context.config().native_automation);
            assert!(context.native_input().is_some());
        }
    }

    mod run_tests {
        use super::*;

        #[tokio::test]
        async fn test_scrolls_then_moves() {
            let scroll = Arc::new(RecordingScroll::new());
            let dispatcher = Arc::new(RecordingDispatcher::new());
            let builder = builder(page(), scroll.clone(), dispatcher.clone());
            let context = Arc::new(builder.build().unwrap());

            let automation = MoveAutomation::create(
                context.clone(),
                &ElementRef::new("box", "div"),
                MoveOptions::new().offset(5.0, 5.0),
            )
            .await
            .unwrap();
            let outcome = automation.run().await.unwrap();

            assert_eq!(scroll.calls().len(), 1);
            assert!(outcome.is_completed());
            assert_eq!(context.cursor().position(), ClientPoint::new(105.0, 105.0));
            assert_eq!(dispatcher.count("mouseover"), 1);
            assert_eq!(context.hover().get().unwrap().id, "box");
        }

        #[tokio::test]
        async fn test_skip_scrolling() {
            let scroll = Arc::new(RecordingScroll::new());
            let context = Arc::new(
                builder(page(), scroll.clone(), Arc::new(RecordingDispatcher::new()))
                    .build()
                    .unwrap(),
            );
            let automation = MoveAutomation::create(
                context,
                &ElementRef::new("box", "div"),
                MoveOptions::new().offset(5.0, 5.0).skip_scrolling(true),
            )
            .await
            .unwrap();
            automation.run().await.unwrap();
            assert!(scroll.calls().is_empty());
        }

        #[tokio::test]
        async fn test_touch_mode_moves_immediately() {
            let dispatcher = Arc::new(RecordingDispatcher::new());
            let context = Arc::new(
                builder(page(), Arc::new(RecordingScroll::new()), dispatcher.clone())
                    .config(AutomationConfig::new().with_touch_mode(true))
                    .build()
                    .unwrap(),
            );
            let automation = MoveAutomation::create(
                context,
                &ElementRef::new("box", "div"),
                MoveOptions::new().offset(50.0, 50.0),
            )
            .await
            .unwrap();

            let outcome = automation.run().await.unwrap();
            let MoveOutcome::Completed { steps, .. } = outcome else {
                panic!("expected completed outcome");
            };
            assert_eq!(steps, 1);
            assert_eq!(dispatcher.events().len(), 1);
            assert_eq!(dispatcher.events()[0].event, "touchmove");
        }

        #[tokio::test]
        async fn test_drag_uses_drag_events() {
            let dispatcher = Arc::new(RecordingDispatcher::new());
            let context = Arc::new(
                builder(page(), Arc::new(RecordingScroll::new()), dispatcher.clone())
                    .build()
                    .unwrap(),
            );
            let automation = MoveAutomation::create(
                context,
                &ElementRef::new("box", "div"),
                MoveOptions::new().offset(5.0, 5.0).drag_and_drop(true),
            )
            .await
            .unwrap();
            automation.run().await.unwrap();

            assert!(dispatcher.count("dragover") > 0);
            assert_eq!(dispatcher.count("mousemove"), 0);
        }

        #[tokio::test]
        async fn test_scroll_failure_names_stage() {
            let scroll = Arc::new(RecordingScroll::failing(
                WindowId::new("top"),
                "element detached",
            ));
            let context = Arc::new(
                builder(page(), scroll, Arc::new(RecordingDispatcher::new()))
                    .build()
                    .unwrap(),
            );
            let automation = MoveAutomation::create(
                context,
                &ElementRef::new("box", "div"),
                MoveOptions::new().offset(5.0, 5.0),
            )
            .await
            .unwrap();

            let err = automation.run().await.unwrap_err();
            assert_eq!(err.to_string(), "scroll failed in window top: element detached");
        }
    }
}
