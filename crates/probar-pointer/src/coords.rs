//! End point resolution in client space.
//!
//! Root-element targets already describe absolute viewport offsets and round
//! to the nearest pixel. Element-relative targets accumulate fractional layout
//! measurements and are floored so they stay inside the element's box.

use crate::dom::Document;
use crate::geometry::{
    AxisValues, ClientPoint, DevicePoint, DocumentPoint, Rounding, ScreenMetrics,
};
use crate::result::PointerResult;
use crate::target::ResolvedTarget;

/// End point for a document-root target
#[must_use]
pub fn root_client_point(offset: AxisValues, scroll: AxisValues) -> ClientPoint {
    DocumentPoint::from_axis(offset)
        .to_client(scroll)
        .rounded(Rounding::Nearest)
}

/// End point for an ordinary (or body) element target
///
/// The body's scroll is already folded into its client position.
#[must_use]
pub fn element_client_point(
    position: ClientPoint,
    offset: AxisValues,
    scroll: AxisValues,
    is_body: bool,
) -> ClientPoint {
    let mut point = position.translate(offset);
    if !is_body {
        point = point.translate(AxisValues::ZERO - scroll);
    }
    point.rounded(Rounding::Floor)
}

/// Convert a resolved target into the movement's client-space end point
pub async fn target_client_point(
    document: &dyn Document,
    target: &ResolvedTarget,
) -> PointerResult<ClientPoint> {
    let scroll = document.element_scroll(&target.element).await?;
    let offset = target.offset.axis();

    if target.element.is_document_root() {
        return Ok(root_client_point(offset, scroll));
    }

    let position = document.client_position(&target.element).await?;
    Ok(element_client_point(
        position,
        offset,
        scroll,
        target.element.is_body(),
    ))
}

/// End point, or `None` when it falls outside the window's viewport
pub async fn reachable_end_point(
    document: &dyn Document,
    target: &ResolvedTarget,
) -> PointerResult<Option<ClientPoint>> {
    let end = target_client_point(document, target).await?;
    let boundary = document.window_dimensions().await?;

    if !end.axis().is_finite() || !boundary.contains(end) {
        tracing::debug!(x = end.x, y = end.y, "end point outside viewport boundary");
        return Ok(None);
    }
    Ok(Some(end))
}

/// Device-space position of a client point
///
/// `None` when the host does not expose the window's screen placement.
#[must_use]
pub fn device_point(screen: Option<&ScreenMetrics>, point: ClientPoint) -> Option<DevicePoint> {
    screen.map(|metrics| point.to_device(metrics))
}
