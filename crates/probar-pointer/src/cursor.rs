//! The logical cursor shared by all windows of a page.
//!
//! Exactly one window owns the cursor at any time. Ownership only changes
//! through [`Cursor::set_active_window`], which the handoff protocol calls
//! once the remote window has answered.
//!
//! Each window keeps its own last cursor position in its own client space.
//! Positions of different windows are never mixed; the handoff protocol
//! converts between them explicitly using frame rectangles.

use crate::dom::WindowId;
use crate::geometry::ClientPoint;
use crate::result::PointerResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Cursor collaborator used by movement and handoff, as seen from one window
#[async_trait]
pub trait Cursor: Send + Sync {
    /// Last position in this window's client space
    fn position(&self) -> ClientPoint;

    /// Move the visible cursor within this window
    async fn move_to(&self, point: ClientPoint) -> PointerResult<()>;

    /// Whether `window` currently owns the cursor
    fn is_active(&self, window: &WindowId) -> bool {
        self.active_window(window) == *window
    }

    /// Window owning the cursor, as seen from `window`
    fn active_window(&self, window: &WindowId) -> WindowId;

    /// Transfer ownership to `window`
    fn set_active_window(&self, window: &WindowId);
}

/// Snapshot of the shared cursor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CursorState {
    /// Window that last received pointer events
    pub owner: WindowId,
    /// Last position of each window, in that window's client space
    pub positions: BTreeMap<WindowId, ClientPoint>,
    /// Number of position writes so far, across all windows
    pub moves: u64,
}

impl CursorState {
    /// Last position of `window`; the origin if it never held the cursor
    #[must_use]
    pub fn position_in(&self, window: &WindowId) -> ClientPoint {
        self.positions
            .get(window)
            .copied()
            .unwrap_or_else(|| ClientPoint::new(0.0, 0.0))
    }
}

/// In-memory cursor state holder
///
/// A `SharedCursor` is one window's view of the cursor. Views made with
/// [`SharedCursor::for_window`] share the ownership token and move counter;
/// hand one view to each window's automation context.
#[derive(Debug, Clone)]
pub struct SharedCursor {
    window: WindowId,
    state: Arc<Mutex<CursorState>>,
}

impl SharedCursor {
    /// Cursor at the origin, owned by `owner`; the view is for `owner`
    #[must_use]
    pub fn new(owner: WindowId) -> Self {
        Self::at(owner, ClientPoint::new(0.0, 0.0))
    }

    /// Cursor at `position` in `owner`'s client space; the view is for `owner`
    #[must_use]
    pub fn at(owner: WindowId, position: ClientPoint) -> Self {
        let positions = BTreeMap::from([(owner.clone(), position)]);
        Self {
            window: owner.clone(),
            state: Arc::new(Mutex::new(CursorState {
                owner,
                positions,
                moves: 0,
            })),
        }
    }

    /// View of the same cursor from another window
    #[must_use]
    pub fn for_window(&self, window: WindowId) -> Self {
        Self {
            window,
            state: Arc::clone(&self.state),
        }
    }

    /// Window this view belongs to
    #[must_use]
    pub const fn window(&self) -> &WindowId {
        &self.window
    }

    /// Last position of any window, in that window's client space
    #[must_use]
    pub fn position_in(&self, window: &WindowId) -> ClientPoint {
        self.lock().position_in(window)
    }

    /// Copy of the current state
    #[must_use]
    pub fn snapshot(&self) -> CursorState {
        self.lock().clone()
    }

    /// Number of position writes so far
    #[must_use]
    pub fn move_count(&self) -> u64 {
        self.lock().moves
    }

    fn lock(&self) -> MutexGuard<'_, CursorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Cursor for SharedCursor {
    fn position(&self) -> ClientPoint {
        self.lock().position_in(&self.window)
    }

    async fn move_to(&self, point: ClientPoint) -> PointerResult<()> {
        let mut state = self.lock();
        state.positions.insert(self.window.clone(), point);
        state.moves += 1;
        Ok(())
    }

    fn active_window(&self, _window: &WindowId) -> WindowId {
        self.lock().owner.clone()
    }

    fn set_active_window(&self, window: &WindowId) {
        let mut state = self.lock();
        if state.owner != *window {
            tracing::debug!(from = %state.owner, to = %window, "cursor ownership transferred");
            state.owner = window.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_move_updates_position_and_counts() {
        let cursor = SharedCursor::new(WindowId::new("top"));
        cursor.move_to(ClientPoint::new(10.0, 20.0)).await.unwrap();
        cursor.move_to(ClientPoint::new(11.0, 21.0)).await.unwrap();

        assert_eq!(cursor.position(), ClientPoint::new(11.0, 21.0));
        assert_eq!(cursor.move_count(), 2);
    }

    #[test]
    fn test_single_owner() {
        let top = WindowId::new("top");
        let child = WindowId::new("child");
        let cursor = SharedCursor::new(top.clone());

        assert!(cursor.is_active(&top));
        assert!(!cursor.is_active(&child));
        assert_eq!(cursor.active_window(&child), top);

        cursor.set_active_window(&child);
        assert!(cursor.is_active(&child));
        assert!(!cursor.is_active(&top));
    }

    #[test]
    fn test_views_share_owner() {
        let cursor = SharedCursor::at(WindowId::new("top"), ClientPoint::new(5.0, 5.0));
        let frame = cursor.for_window(WindowId::new("frame"));
        frame.set_active_window(&WindowId::new("frame"));

        let snapshot = cursor.snapshot();
        assert_eq!(snapshot.owner, WindowId::new("frame"));
        assert_eq!(snapshot.position_in(&WindowId::new("top")), ClientPoint::new(5.0, 5.0));
        assert_eq!(snapshot.moves, 0);
    }

    #[tokio::test]
    async fn test_positions_are_kept_per_window() {
        let top = SharedCursor::at(WindowId::new("top"), ClientPoint::new(150.0, 150.0));
        let frame = top.for_window(WindowId::new("frame"));
        assert_eq!(frame.position(), ClientPoint::new(0.0, 0.0));

        frame.move_to(ClientPoint::new(10.0, 10.0)).await.unwrap();

        assert_eq!(frame.position(), ClientPoint::new(10.0, 10.0));
        assert_eq!(top.position(), ClientPoint::new(150.0, 150.0));
        assert_eq!(top.position_in(&WindowId::new("frame")), ClientPoint::new(10.0, 10.0));
        assert_eq!(top.move_count(), 1);
    }

    #[test]
    fn test_state_serializes_positions_by_window() {
        let cursor = SharedCursor::at(WindowId::new("top"), ClientPoint::new(1.0, 2.0));
        let json = serde_json::to_value(cursor.snapshot()).unwrap();
        assert_eq!(json["owner"], "top");
        assert_eq!(json["positions"]["top"]["x"], 1.0);
    }
}
