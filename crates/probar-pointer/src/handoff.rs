//! Cross-frame cursor handoff.
//!
//! Only one window owns the cursor. Before a window can move it, ownership
//! has to be pulled from whichever window has it now:
//!
//! ```text
//! Local ──(cursor active here)──────────────────────────────▶ done
//!   │
//!   └─▶ RequestingRemote ─▶ AwaitingResponse ─▶ Resolved ─▶ done
//!                               │
//!                               └─(no reply in time)─▶ HandoffTimeout
//! ```
//!
//! The owning window finishes its part of the movement up to the frame
//! boundary ([`HandoffResponder`]) and replies with where the cursor left
//! off. The destination itself never travels back; the requester keeps
//! its own end point.

use crate::automation::{perform_move, AutomationContext};
use crate::config::{Modifiers, MoveOptions};
use crate::dom::WindowId;
use crate::geometry::{ClientPoint, ClientRect};
use crate::result::{PointerError, PointerResult};
use crate::transport::FrameHandler;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Weak;

/// Command of a handoff request
pub const MOVE_REQUEST_CMD: &str = "automation|move|request";
/// Command of a handoff response, also the fixed response channel
pub const MOVE_RESPONSE_CMD: &str = "automation|move|response";

/// Message exchanged between windows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd")]
pub enum FrameMessage {
    /// Ask the owning window to give up the cursor
    #[serde(rename = "automation|move|request")]
    MoveRequest(MoveRequest),
    /// Cursor position after the owning window finished its part
    #[serde(rename = "automation|move|response")]
    MoveResponse(MoveResponse),
}

impl FrameMessage {
    /// Wire command of this message
    #[must_use]
    pub const fn cmd(&self) -> &'static str {
        match self {
            Self::MoveRequest(_) => MOVE_REQUEST_CMD,
            Self::MoveResponse(_) => MOVE_RESPONSE_CMD,
        }
    }
}

/// Geometry of the iframe embedding the owning window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IframeGeometry {
    /// Iframe rectangle in the requester's client space
    #[serde(flatten)]
    pub rect: ClientRect,
    /// The iframe element itself is under the cursor
    pub iframe_under_cursor: bool,
}

/// Handoff request, in the requester's client space
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveRequest {
    /// Requester's own last cursor X
    pub start_x: f64,
    /// Requester's own last cursor Y
    pub start_y: f64,
    /// Movement end X
    pub end_x: f64,
    /// Movement end Y
    pub end_y: f64,
    /// Held modifier keys
    pub modifiers: Modifiers,
    /// Requested speed factor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    /// The requester replays moves through a native-input channel
    pub native_automation_move: bool,
    /// Present when the owning window is a child of the requester
    #[serde(flatten)]
    pub iframe: Option<IframeGeometry>,
}

impl MoveRequest {
    /// Requester's own last cursor position
    #[must_use]
    pub const fn start(&self) -> ClientPoint {
        ClientPoint::new(self.start_x, self.start_y)
    }

    /// End point of the requester's movement
    #[must_use]
    pub const fn end(&self) -> ClientPoint {
        ClientPoint::new(self.end_x, self.end_y)
    }
}

/// Handoff response, in the requester's client space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MoveResponse {
    /// Cursor X
    pub x: f64,
    /// Cursor Y
    pub y: f64,
}

impl MoveResponse {
    /// Response carrying `point`
    #[must_use]
    pub const fn at(point: ClientPoint) -> Self {
        Self {
            x: point.x,
            y: point.y,
        }
    }

    /// Cursor position carried by the response
    #[must_use]
    pub const fn point(&self) -> ClientPoint {
        ClientPoint::new(self.x, self.y)
    }
}

/// Handoff progress of one automation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HandoffState {
    /// Cursor already owned locally
    Local,
    /// Building the request
    RequestingRemote,
    /// Waiting for the owning window's reply
    AwaitingResponse,
    /// Ownership transferred
    Resolved,
}

/// Result of [`move_to_current_frame`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HandoffOutcome {
    /// No handoff was needed; no message was sent
    Local,
    /// Ownership was pulled from another window
    Transferred {
        /// Window that owned the cursor
        from: WindowId,
        /// Cursor position reported by that window
        cursor: ClientPoint,
        /// The visible cursor was moved to `cursor`
        moved_cursor: bool,
    },
}

impl HandoffOutcome {
    /// Whether a handoff round trip took place
    #[must_use]
    pub const fn is_transferred(&self) -> bool {
        matches!(self, Self::Transferred { .. })
    }
}

fn enter(window: &WindowId, state: HandoffState) {
    tracing::trace!(%window, ?state, "handoff state");
}

/// Make the driving window own the cursor before it starts stepping
#[tracing::instrument(skip_all, fields(window = %context.window()))]
pub async fn move_to_current_frame(
    context: &AutomationContext,
    end: ClientPoint,
    options: &MoveOptions,
) -> PointerResult<HandoffOutcome> {
    let window = context.window();
    let cursor = context.cursor();

    if cursor.is_active(window) {
        enter(window, HandoffState::Local);
        return Ok(HandoffOutcome::Local);
    }

    enter(window, HandoffState::RequestingRemote);
    let active = cursor.active_window(window);
    let start = cursor.position();
    let stage = |e: PointerError| e.at_stage("handoff");

    // Owner embedded in this window: send the iframe's box along.
    let iframe = context
        .document()
        .find_iframe_by_window(&active)
        .await
        .map_err(stage)?;
    let geometry = match &iframe {
        Some(frame) => Some(context.document().iframe_client_rect(frame).await.map_err(stage)?),
        None => None,
    };
    let top = context
        .hit_tester()
        .element_from_point(start)
        .await
        .map_err(stage)?;
    let iframe_under_cursor = iframe.is_some() && top == iframe;

    let request = MoveRequest {
        start_x: start.x,
        start_y: start.y,
        end_x: end.x,
        end_y: end.y,
        modifiers: options.modifiers,
        speed: options.speed,
        native_automation_move: context.native_input().is_some(),
        iframe: geometry.map(|rect| IframeGeometry {
            rect,
            iframe_under_cursor,
        }),
    };

    enter(window, HandoffState::AwaitingResponse);
    let timeout = context.config().handoff_timeout();
    let reply = tokio::time::timeout(
        timeout,
        context.transport().request(
            window,
            &active,
            FrameMessage::MoveRequest(request),
            MOVE_RESPONSE_CMD,
        ),
    )
    .await
    .map_err(|_| {
        tracing::warn!(
            %window,
            target = %active,
            waited_ms = timeout.as_millis() as u64,
            "handoff timed out"
        );
        PointerError::HandoffTimeout {
            window: window.clone(),
            target: active.clone(),
            waited_ms: timeout.as_millis() as u64,
        }
    })?
    .map_err(stage)?;

    let FrameMessage::MoveResponse(response) = reply else {
        return Err(PointerError::UnexpectedMessage {
            channel: MOVE_RESPONSE_CMD.to_string(),
            received: reply.cmd().to_string(),
        });
    };

    cursor.set_active_window(window);
    enter(window, HandoffState::Resolved);

    let moved_cursor = iframe_under_cursor || context.document().is_iframe_window();
    if moved_cursor {
        cursor.move_to(response.point()).await.map_err(stage)?;
    }
    tracing::debug!(
        %window,
        from = %active,
        x = response.x,
        y = response.y,
        moved_cursor,
        "cursor handed off"
    );

    Ok(HandoffOutcome::Transferred {
        from: active,
        cursor: response.point(),
        moved_cursor,
    })
}

/// Answers handoff requests on behalf of the window that owns the cursor
///
/// The responder walks its own cursor, from where this window last left it,
/// to where the requester's path crosses the frame boundary. It answers with
/// that crossing point in the requester's client space.
#[derive(Debug, Clone)]
pub struct HandoffResponder {
    window: WindowId,
    context: Weak<AutomationContext>,
}

/// Where the owning window hands the cursor over
#[derive(Debug, Clone, Copy, PartialEq)]
enum Crossing {
    /// Walk to `local` here; the requester sees the cursor at `remote`
    Boundary {
        local: ClientPoint,
        remote: ClientPoint,
    },
    /// The cursor already left through the requester's own layer
    Released,
    /// The requester is not a frame this window knows about
    Unknown,
}

impl HandoffResponder {
    /// Responder for `window`, driven by its automation context
    #[must_use]
    pub const fn new(window: WindowId, context: Weak<AutomationContext>) -> Self {
        Self { window, context }
    }

    /// Window this responder answers for
    #[must_use]
    pub const fn window(&self) -> &WindowId {
        &self.window
    }

    async fn crossing(
        context: &AutomationContext,
        source: &WindowId,
        request: &MoveRequest,
    ) -> PointerResult<Crossing> {
        let here = context.cursor().position();

        if let Some(geometry) = request.iframe {
            // Requester is our parent; the path leaves our iframe box.
            if !geometry.iframe_under_cursor {
                return Ok(Crossing::Released);
            }
            let rect = geometry.rect;
            let start = here.translate(rect.origin());
            let exit = rect.exit_point(start, request.end());
            let local = ClientPoint::from_axis(exit.axis() - rect.origin());
            return Ok(Crossing::Boundary {
                local,
                remote: exit,
            });
        }

        // Requester is embedded here; the path enters its iframe box.
        let Some(frame) = context.document().find_iframe_by_window(source).await? else {
            return Ok(Crossing::Unknown);
        };
        let rect = context.document().iframe_client_rect(&frame).await?;
        let origin = rect.origin();
        let entry = rect.entry_point(here, request.end().translate(origin));
        let remote = ClientPoint::from_axis(entry.axis() - origin);
        Ok(Crossing::Boundary {
            local: entry,
            remote,
        })
    }

    async fn respond(
        &self,
        source: &WindowId,
        request: &MoveRequest,
    ) -> PointerResult<MoveResponse> {
        let Some(context) = self.context.upgrade() else {
            return Err(PointerError::WindowUnreachable {
                window: self.window.clone(),
            });
        };
        let window = context.window();

        let crossing = Self::crossing(&context, source, request)
            .await
            .map_err(|e| e.at_stage("handoff-response"))?;
        let (local, remote) = match crossing {
            Crossing::Boundary { local, remote } => (local, remote),
            Crossing::Released => {
                context.release_hover(request.modifiers).await;
                tracing::debug!(%window, %source, "cursor already outside frame, released hover");
                return Ok(MoveResponse::at(request.start()));
            }
            Crossing::Unknown => {
                tracing::warn!(%window, %source, "handoff request from unknown frame");
                return Ok(MoveResponse::at(request.start()));
            }
        };

        if request.native_automation_move {
            context.cursor().move_to(local).await?;
        } else {
            let mut options = MoveOptions::new().modifiers(request.modifiers);
            options.speed = request.speed;
            perform_move(&context, local, &options).await?;
        }

        tracing::debug!(
            %window,
            %source,
            x = remote.x,
            y = remote.y,
            "released cursor at frame boundary"
        );
        Ok(MoveResponse::at(remote))
    }
}

#[async_trait]
impl FrameHandler for HandoffResponder {
    async fn handle(
        &self,
        source: &WindowId,
        message: FrameMessage,
    ) -> PointerResult<FrameMessage> {
        match message {
            FrameMessage::MoveRequest(request) => {
                let response = self.respond(source, &request).await?;
                Ok(FrameMessage::MoveResponse(response))
            }
            other => Err(PointerError::UnexpectedMessage {
                channel: MOVE_REQUEST_CMD.to_string(),
                received: other.cmd().to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod message_tests {
        use super::*;

        #[test]
        fn test_request_wire_shape() {
            let message = FrameMessage::MoveRequest(MoveRequest {
                start_x: 1.0,
                start_y: 2.0,
                end_x: 3.0,
                end_y: 4.0,
                modifiers: Modifiers::none(),
                speed: Some(0.5),
                native_automation_move: true,
                iframe: Some(IframeGeometry {
                    rect: ClientRect::new(10.0, 20.0, 110.0, 120.0),
                    iframe_under_cursor: true,
                }),
            });
            let json = serde_json::to_value(&message).unwrap();

            assert_eq!(json["cmd"], MOVE_REQUEST_CMD);
            assert_eq!(json["startX"], 1.0);
            assert_eq!(json["endY"], 4.0);
            assert_eq!(json["nativeAutomationMove"], true);
            assert_eq!(json["left"], 10.0);
            assert_eq!(json["bottom"], 120.0);
            assert_eq!(json["iframeUnderCursor"], true);

            let back: FrameMessage = serde_json::from_value(json).unwrap();
            assert_eq!(back, message);
        }

        #[test]
        fn test_request_without_iframe_omits_rect() {
            let message = FrameMessage::MoveRequest(MoveRequest {
                start_x: 0.0,
                start_y: 0.0,
                end_x: 0.0,
                end_y: 0.0,
                modifiers: Modifiers::none(),
                speed: None,
                native_automation_move: false,
                iframe: None,
            });
            let json = serde_json::to_value(&message).unwrap();
            assert!(json.get("left").is_none());
            assert!(json.get("iframeUnderCursor").is_none());
        }

        #[test]
        fn test_response_cmd() {
            let message = FrameMessage::MoveResponse(MoveResponse { x: 5.0, y: 6.0 });
            assert_eq!(message.cmd(), MOVE_RESPONSE_CMD);
            let json = serde_json::to_string(&message).unwrap();
            assert_eq!(json, r#"{"cmd":"automation|move|response","x":5.0,"y":6.0}"#);
        }
    }

    mod outcome_tests {
        use super::*;

        #[test]
        fn test_is_transferred() {
            assert!(!HandoffOutcome::Local.is_transferred());
            assert!(HandoffOutcome::Transferred {
                from: WindowId::new("top"),
                cursor: ClientPoint::new(0.0, 0.0),
                moved_cursor: false,
            }
            .is_transferred());
        }
    }
}
