//! Target disambiguation.
//!
//! Callers may ask for an offset outside the nominal element, for example to
//! click just past its edge. Such requests are redirected to the document
//! root with the offset rewritten as an absolute document point, so that
//! hit-testing downstream still has something meaningful to resolve.

use crate::dom::{Document, ElementRef};
use crate::geometry::{AxisValues, DocumentPoint};
use crate::result::PointerResult;
use serde::{Deserialize, Serialize};

/// Offset of a resolved target
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TargetOffset {
    /// Relative to the element's own box
    Element(AxisValues),
    /// Absolute document point, relative to the document root
    Document(DocumentPoint),
}

impl TargetOffset {
    /// Raw axis values of the offset
    #[must_use]
    pub fn axis(&self) -> AxisValues {
        match self {
            Self::Element(offset) => *offset,
            Self::Document(point) => point.axis(),
        }
    }
}

/// The element and offset actually used for coordinate computation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedTarget {
    /// Element that receives hit-testing
    pub element: ElementRef,
    /// Offset relative to `element`
    pub offset: TargetOffset,
}

impl ResolvedTarget {
    /// Whether the request was redirected to the document root
    #[must_use]
    pub const fn is_redirected(&self) -> bool {
        matches!(self.offset, TargetOffset::Document(_))
    }
}

/// Decide whether `(element, offset)` can be used as-is
pub async fn resolve_target(
    document: &dyn Document,
    element: &ElementRef,
    offset: AxisValues,
) -> PointerResult<ResolvedTarget> {
    if document.contains_offset(element, offset).await? {
        return Ok(ResolvedTarget {
            element: element.clone(),
            offset: TargetOffset::Element(offset),
        });
    }

    let point = document.automation_point(element, offset).await?;
    let root = document.document_element().await?;
    tracing::debug!(
        element = %element,
        offset_x = offset.x,
        offset_y = offset.y,
        "offset outside element, redirecting to document root"
    );

    Ok(ResolvedTarget {
        element: root,
        offset: TargetOffset::Document(point),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::ClientRect;
    use crate::testing::FakePage;
    use proptest::prelude::*;

    fn page() -> FakePage {
        FakePage::builder("top")
            .viewport(800.0, 600.0)
            .element(
                ElementRef::new("box", "div"),
                ClientRect::from_size(100.0, 100.0, 100.0, 100.0),
            )
            .build()
    }

    #[tokio::test]
    async fn test_offset_inside_is_unchanged() {
        let page = page();
        let element = ElementRef::new("box", "div");
        let target = resolve_target(&page, &element, AxisValues::new(5.0, 5.0))
            .await
            .unwrap();

        assert_eq!(target.element, element);
        assert_eq!(target.offset, TargetOffset::Element(AxisValues::new(5.0, 5.0)));
        assert!(!target.is_redirected());
    }

    #[tokio::test]
    async fn test_offset_outside_redirects_to_root() {
        let page = page();
        let element = ElementRef::new("box", "div");
        let target = resolve_target(&page, &element, AxisValues::new(9999.0, 9999.0))
            .await
            .unwrap();

        assert!(target.element.is_document_root());
        assert!(target.is_redirected());
        assert_eq!(
            target.offset,
            TargetOffset::Document(DocumentPoint::new(10099.0, 10099.0))
        );
    }

    #[tokio::test]
    async fn test_negative_offset_redirects() {
        let page = page();
        let target = resolve_target(
            &page,
            &ElementRef::new("box", "div"),
            AxisValues::new(-1.0, 10.0),
        )
        .await
        .unwrap();
        assert_eq!(target.offset.axis(), AxisValues::new(99.0, 110.0));
    }

    proptest! {
        /// Offsets inside the 100x100 box are never rewritten
        #[test]
        fn prop_inside_offsets_unchanged(x in 0.0f64..=100.0, y in 0.0f64..=100.0) {
            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let target = runtime
                .block_on(resolve_target(
                    &page(),
                    &ElementRef::new("box", "div"),
                    AxisValues::new(x, y),
                ))
                .unwrap();
            prop_assert_eq!(target.offset, TargetOffset::Element(AxisValues::new(x, y)));
        }

        /// Offsets past the box always land on the document root
        #[test]
        fn prop_outside_offsets_redirect(x in 100.5f64..5000.0, y in -5000.0f64..5000.0) {
            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let target = runtime
                .block_on(resolve_target(
                    &page(),
                    &ElementRef::new("box", "div"),
                    AxisValues::new(x, y),
                ))
                .unwrap();
            prop_assert!(target.element.is_document_root());
            prop_assert!(target.is_redirected());
        }
    }
}
