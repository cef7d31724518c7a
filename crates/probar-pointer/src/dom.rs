//! Host page collaborators.
//!
//! The automation never touches a live DOM directly. Each window exposes its
//! layout, hit-testing and scrolling through these traits; a CDP-backed host,
//! an in-page agent or a test fake can sit behind them.

use crate::geometry::{AxisValues, Boundary, ClientPoint, ClientRect, DocumentPoint, ScreenMetrics};
use crate::result::PointerResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a window (top-level page or nested frame)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowId(String);

impl WindowId {
    /// Create a new window id
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Id as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Role of an element for coordinate purposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementKind {
    /// The document root (`<html>`)
    DocumentRoot,
    /// The document body
    Body,
    /// A frame element embedding another window
    Frame,
    /// Any other element
    Other,
}

/// Handle to an element inside one window
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementRef {
    /// Host-assigned unique id
    pub id: String,
    /// Element tag name
    pub tag_name: String,
    /// Coordinate role
    pub kind: ElementKind,
}

impl ElementRef {
    /// Create a handle for an ordinary element
    #[must_use]
    pub fn new(id: impl Into<String>, tag_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tag_name: tag_name.into(),
            kind: ElementKind::Other,
        }
    }

    /// Handle for the document root of a window
    #[must_use]
    pub fn document_root(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tag_name: "html".to_string(),
            kind: ElementKind::DocumentRoot,
        }
    }

    /// Handle for the document body of a window
    #[must_use]
    pub fn body(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tag_name: "body".to_string(),
            kind: ElementKind::Body,
        }
    }

    /// Handle for a frame element
    #[must_use]
    pub fn frame(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tag_name: "iframe".to_string(),
            kind: ElementKind::Frame,
        }
    }

    /// Whether this is the document root element
    #[must_use]
    pub fn is_document_root(&self) -> bool {
        self.kind == ElementKind::DocumentRoot
    }

    /// Whether this is the document body
    #[must_use]
    pub fn is_body(&self) -> bool {
        self.kind == ElementKind::Body
    }
}

impl fmt::Display for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}#{}>", self.tag_name, self.id)
    }
}

/// Layout and frame-tree queries against one window's document
#[async_trait]
pub trait Document: Send + Sync {
    /// Parent window, `None` for a top-level window
    fn parent_window(&self) -> Option<WindowId>;

    /// Whether this window is embedded in a frame
    fn is_iframe_window(&self) -> bool {
        self.parent_window().is_some()
    }

    /// Screen placement of the viewport, when the host exposes it
    fn screen_metrics(&self) -> Option<ScreenMetrics>;

    /// Whether `offset` (relative to the element box) falls inside the element
    async fn contains_offset(&self, element: &ElementRef, offset: AxisValues)
        -> PointerResult<bool>;

    /// Map an element-relative offset to an absolute document point
    async fn automation_point(
        &self,
        element: &ElementRef,
        offset: AxisValues,
    ) -> PointerResult<DocumentPoint>;

    /// The document root element of this window
    async fn document_element(&self) -> PointerResult<ElementRef>;

    /// Current scroll offset of the element
    async fn element_scroll(&self, element: &ElementRef) -> PointerResult<AxisValues>;

    /// Client-space position of the element's box
    async fn client_position(&self, element: &ElementRef) -> PointerResult<ClientPoint>;

    /// Visible viewport of this window
    async fn window_dimensions(&self) -> PointerResult<Boundary>;

    /// Frame element embedding the given child window
    async fn find_iframe_by_window(&self, window: &WindowId)
        -> PointerResult<Option<ElementRef>>;

    /// Client rectangle of a frame element's content area
    async fn iframe_client_rect(&self, iframe: &ElementRef) -> PointerResult<ClientRect>;
}

/// Topmost element at a point, ignoring automation-owned overlays
#[async_trait]
pub trait HitTester: Send + Sync {
    /// Returns `None` when nothing can be resolved at the point
    async fn element_from_point(&self, point: ClientPoint) -> PointerResult<Option<ElementRef>>;
}

/// Scrolls a target into view before movement
#[async_trait]
pub trait ScrollAutomation: Send + Sync {
    /// Returns whether any scrolling happened
    async fn scroll_into_view(&self, element: &ElementRef, offset: AxisValues)
        -> PointerResult<bool>;
}
