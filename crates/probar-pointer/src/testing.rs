//! In-memory host collaborators.
//!
//! [`FakePage`] models one window's layout as a list of rectangles, which is
//! enough to drive target resolution, hit-testing and frame lookup without a
//! browser. The recording collaborators capture what an automation did so
//! tests can assert on it.

use crate::config::Modifiers;
use crate::dom::{Document, ElementRef, HitTester, ScrollAutomation, WindowId};
use crate::emission::{EventDispatcher, EventOptions};
use crate::geometry::{AxisValues, ClientPoint, ClientRect, DocumentPoint, ScreenMetrics};
use crate::handoff::FrameMessage;
use crate::native::{NativeEvent, NativeInput};
use crate::result::{PointerError, PointerResult};
use crate::transport::FrameHandler;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Layout of one window
#[derive(Debug, Clone)]
pub struct FakePage {
    window: WindowId,
    root: ElementRef,
    viewport: ClientRect,
    window_scroll: AxisValues,
    elements: Vec<(ElementRef, ClientRect)>,
    element_scroll: HashMap<String, AxisValues>,
    frames: HashMap<WindowId, ElementRef>,
    parent: Option<WindowId>,
    screen: Option<ScreenMetrics>,
    hit_testing: bool,
}

impl FakePage {
    /// Start describing the page of `window`
    #[must_use]
    pub fn builder(window: impl Into<String>) -> FakePageBuilder {
        FakePageBuilder::new(WindowId::new(window))
    }

    /// Window the page belongs to
    #[must_use]
    pub const fn window(&self) -> &WindowId {
        &self.window
    }

    fn rect_of(&self, element: &ElementRef) -> PointerResult<ClientRect> {
        if element.is_document_root() {
            return Ok(self.viewport);
        }
        self.elements
            .iter()
            .find(|(candidate, _)| candidate == element)
            .map(|(_, rect)| *rect)
            .ok_or_else(|| {
                PointerError::collaborator(
                    "layout",
                    &self.window,
                    format!("unknown element {element}"),
                )
            })
    }
}

#[async_trait]
impl Document for FakePage {
    fn parent_window(&self) -> Option<WindowId> {
        self.parent.clone()
    }

    fn screen_metrics(&self) -> Option<ScreenMetrics> {
        self.screen
    }

    async fn contains_offset(
        &self,
        element: &ElementRef,
        offset: AxisValues,
    ) -> PointerResult<bool> {
        let rect = self.rect_of(element)?;
        Ok(offset.x >= 0.0
            && offset.x <= rect.width()
            && offset.y >= 0.0
            && offset.y <= rect.height())
    }

    async fn automation_point(
        &self,
        element: &ElementRef,
        offset: AxisValues,
    ) -> PointerResult<DocumentPoint> {
        if element.is_document_root() {
            return Ok(DocumentPoint::from_axis(offset));
        }
        let rect = self.rect_of(element)?;
        Ok(DocumentPoint::from_axis(rect.origin() + self.window_scroll + offset))
    }

    async fn document_element(&self) -> PointerResult<ElementRef> {
        Ok(self.root.clone())
    }

    async fn element_scroll(&self, element: &ElementRef) -> PointerResult<AxisValues> {
        if element.is_document_root() {
            return Ok(self.window_scroll);
        }
        Ok(self.element_scroll.get(&element.id).copied().unwrap_or(AxisValues::ZERO))
    }

    async fn client_position(&self, element: &ElementRef) -> PointerResult<ClientPoint> {
        if element.is_document_root() {
            return Ok(ClientPoint::from_axis(AxisValues::ZERO - self.window_scroll));
        }
        Ok(ClientPoint::from_axis(self.rect_of(element)?.origin()))
    }

    async fn window_dimensions(&self) -> PointerResult<ClientRect> {
        Ok(self.viewport)
    }

    async fn find_iframe_by_window(&self, window: &WindowId) -> PointerResult<Option<ElementRef>> {
        Ok(self.frames.get(window).cloned())
    }

    async fn iframe_client_rect(&self, iframe: &ElementRef) -> PointerResult<ClientRect> {
        self.rect_of(iframe)
    }
}

#[async_trait]
impl HitTester for FakePage {
    async fn element_from_point(&self, point: ClientPoint) -> PointerResult<Option<ElementRef>> {
        if !self.hit_testing {
            return Ok(None);
        }
        let topmost = self
            .elements
            .iter()
            .rev()
            .find(|(_, rect)| rect.contains(point))
            .map(|(element, _)| element.clone());
        Ok(topmost.or_else(|| Some(self.root.clone())))
    }
}

/// Builder for [`FakePage`]
#[derive(Debug)]
pub struct FakePageBuilder {
    page: FakePage,
}

impl FakePageBuilder {
    /// Empty 1024x768 page
    #[must_use]
    pub fn new(window: WindowId) -> Self {
        Self {
            page: FakePage {
                window,
                root: ElementRef::document_root("html"),
                viewport: ClientRect::viewport(1024.0, 768.0),
                window_scroll: AxisValues::ZERO,
                elements: Vec::new(),
                element_scroll: HashMap::new(),
                frames: HashMap::new(),
                parent: None,
                screen: None,
                hit_testing: true,
            },
        }
    }

    /// Visible viewport size
    #[must_use]
    pub fn viewport(mut self, width: f64, height: f64) -> Self {
        self.page.viewport = ClientRect::viewport(width, height);
        self
    }

    /// Document scroll position
    #[must_use]
    pub const fn window_scroll(mut self, x: f64, y: f64) -> Self {
        self.page.window_scroll = AxisValues::new(x, y);
        self
    }

    /// Add an element; later elements stack on top of earlier ones
    #[must_use]
    pub fn element(mut self, element: ElementRef, rect: ClientRect) -> Self {
        self.page.elements.push((element, rect));
        self
    }

    /// Scroll offset of a scrollable element
    #[must_use]
    pub fn element_scroll(mut self, id: impl Into<String>, x: f64, y: f64) -> Self {
        self.page.element_scroll.insert(id.into(), AxisValues::new(x, y));
        self
    }

    /// Add an iframe element embedding `child`
    #[must_use]
    pub fn frame(mut self, iframe: ElementRef, child: WindowId, rect: ClientRect) -> Self {
        self.page.frames.insert(child, iframe.clone());
        self.page.elements.push((iframe, rect));
        self
    }

    /// Mark this page as embedded in `parent`
    #[must_use]
    pub fn parent(mut self, parent: WindowId) -> Self {
        self.page.parent = Some(parent);
        self
    }

    /// Screen placement for device-space coordinates
    #[must_use]
    pub const fn screen(mut self, metrics: ScreenMetrics) -> Self {
        self.page.screen = Some(metrics);
        self
    }

    /// Make every hit-test resolve nothing
    #[must_use]
    pub const fn without_hit_testing(mut self) -> Self {
        self.page.hit_testing = false;
        self
    }

    /// Finish the page
    #[must_use]
    pub fn build(self) -> FakePage {
        self.page
    }
}

/// Scroll collaborator that records its calls
#[derive(Debug, Default)]
pub struct RecordingScroll {
    calls: Mutex<Vec<(ElementRef, AxisValues)>>,
    failure: Option<(WindowId, String)>,
}

impl RecordingScroll {
    /// Scroll that always succeeds
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Scroll that always fails with `message`
    #[must_use]
    pub fn failing(window: WindowId, message: impl Into<String>) -> Self {
        Self {
            failure: Some((window, message.into())),
            ..Self::default()
        }
    }

    /// Calls received so far
    #[must_use]
    pub fn calls(&self) -> Vec<(ElementRef, AxisValues)> {
        lock(&self.calls).clone()
    }
}

#[async_trait]
impl ScrollAutomation for RecordingScroll {
    async fn scroll_into_view(
        &self,
        element: &ElementRef,
        offset: AxisValues,
    ) -> PointerResult<bool> {
        lock(&self.calls).push((element.clone(), offset));
        match &self.failure {
            Some((window, message)) => Err(PointerError::collaborator(
                "scroll-into-view",
                window,
                message,
            )),
            None => Ok(false),
        }
    }
}

/// One event seen by [`RecordingDispatcher`]
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchedEvent {
    /// Dispatch target
    pub target: ElementRef,
    /// DOM event type
    pub event: String,
    /// Event options
    pub options: EventOptions,
}

/// Event dispatcher that records every dispatch
#[derive(Debug, Default)]
pub struct RecordingDispatcher {
    events: Mutex<Vec<DispatchedEvent>>,
    fail_on: Option<String>,
}

impl RecordingDispatcher {
    /// Dispatcher that accepts every event
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Dispatcher that rejects events of type `event`
    #[must_use]
    pub fn failing_on(event: impl Into<String>) -> Self {
        Self {
            fail_on: Some(event.into()),
            ..Self::default()
        }
    }

    /// Events dispatched so far, in order
    #[must_use]
    pub fn events(&self) -> Vec<DispatchedEvent> {
        lock(&self.events).clone()
    }

    /// Number of dispatched events of type `event`
    #[must_use]
    pub fn count(&self, event: &str) -> usize {
        lock(&self.events).iter().filter(|e| e.event == event).count()
    }

    /// Client points of dispatched events of type `event`, in order
    #[must_use]
    pub fn points(&self, event: &str) -> Vec<ClientPoint> {
        lock(&self.events)
            .iter()
            .filter(|e| e.event == event)
            .map(|e| e.options.client)
            .collect()
    }
}

#[async_trait]
impl EventDispatcher for RecordingDispatcher {
    async fn dispatch(
        &self,
        target: &ElementRef,
        event: &str,
        options: &EventOptions,
    ) -> PointerResult<()> {
        if self.fail_on.as_deref() == Some(event) {
            return Err(PointerError::collaborator(
                "dispatch",
                &WindowId::new("test"),
                format!("{event} rejected"),
            ));
        }
        lock(&self.events).push(DispatchedEvent {
            target: target.clone(),
            event: event.to_string(),
            options: options.clone(),
        });
        Ok(())
    }
}

/// Native-input channel that records replayed batches
#[derive(Debug, Default)]
pub struct RecordingNativeInput {
    batches: Mutex<Vec<Vec<NativeEvent>>>,
}

impl RecordingNativeInput {
    /// Empty recorder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Batches executed so far
    #[must_use]
    pub fn batches(&self) -> Vec<Vec<NativeEvent>> {
        lock(&self.batches).clone()
    }
}

#[async_trait]
impl NativeInput for RecordingNativeInput {
    async fn create_move_event(
        &self,
        point: ClientPoint,
        modifiers: Modifiers,
    ) -> PointerResult<NativeEvent> {
        Ok(NativeEvent::mouse_moved(point, modifiers))
    }

    async fn execute_event_sequence(&self, events: Vec<NativeEvent>) -> PointerResult<()> {
        lock(&self.batches).push(events);
        Ok(())
    }
}

/// Frame that accepts requests and never answers them
#[derive(Debug, Default)]
pub struct UnresponsiveFrame;

#[async_trait]
impl FrameHandler for UnresponsiveFrame {
    async fn handle(
        &self,
        _source: &WindowId,
        _message: FrameMessage,
    ) -> PointerResult<FrameMessage> {
        std::future::pending().await
    }
}
