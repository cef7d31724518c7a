//! Geometry primitives for pointer automation.
//!
//! Points are tagged with the coordinate space they live in. A client-space
//! point and a device-space point have different types, so comparing them
//! does not compile; every conversion is an explicit method call.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use std::ops::{Add, Mul, Sub};

/// Rounding policy applied when a point is snapped to whole pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rounding {
    /// Round half away from zero
    Nearest,
    /// Round toward negative infinity
    Floor,
}

impl Rounding {
    /// Apply the policy to one axis value
    #[must_use]
    pub fn apply(self, value: f64) -> f64 {
        match self {
            Self::Nearest => value.round(),
            Self::Floor => value.floor(),
        }
    }
}

/// An untyped pair of axis values
///
/// Used for offsets, distances and scroll positions, which are relative
/// quantities rather than positions in a particular space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AxisValues {
    /// X axis
    pub x: f64,
    /// Y axis
    pub y: f64,
}

impl AxisValues {
    /// Zero on both axes
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    /// Create a new pair
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Round both axes with the given policy
    #[must_use]
    pub fn round(self, rounding: Rounding) -> Self {
        Self::new(rounding.apply(self.x), rounding.apply(self.y))
    }

    /// Absolute value of the dominant axis
    #[must_use]
    pub fn dominant(self) -> f64 {
        self.x.abs().max(self.y.abs())
    }

    /// Whether both axes are finite numbers
    #[must_use]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Add for AxisValues {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for AxisValues {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for AxisValues {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self {
        Self::new(self.x * rhs, self.y * rhs)
    }
}

/// Marker trait for a named coordinate space
pub trait CoordinateSpace: fmt::Debug + Clone + Copy + PartialEq + Default + 'static {
    /// Human readable name of the space
    const NAME: &'static str;
}

/// Relative to the visible viewport origin of a window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClientSpace;

/// Physical screen coordinates, used by low-level input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeviceSpace;

/// Relative to the document origin, independent of scrolling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DocumentSpace;

impl CoordinateSpace for ClientSpace {
    const NAME: &'static str = "client";
}

impl CoordinateSpace for DeviceSpace {
    const NAME: &'static str = "device";
}

impl CoordinateSpace for DocumentSpace {
    const NAME: &'static str = "document";
}

/// A position in coordinate space `S`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Point<S: CoordinateSpace> {
    /// X coordinate
    pub x: f64,
    /// Y coordinate
    pub y: f64,
    #[serde(skip)]
    space: PhantomData<S>,
}

/// Point relative to a window's viewport
pub type ClientPoint = Point<ClientSpace>;
/// Point on the physical screen
pub type DevicePoint = Point<DeviceSpace>;
/// Point relative to the document origin
pub type DocumentPoint = Point<DocumentSpace>;

impl<S: CoordinateSpace> Point<S> {
    /// Create a new point
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            space: PhantomData,
        }
    }

    /// Create a point from raw axis values
    #[must_use]
    pub const fn from_axis(values: AxisValues) -> Self {
        Self::new(values.x, values.y)
    }

    /// Raw axis values of this point
    #[must_use]
    pub fn axis(self) -> AxisValues {
        AxisValues::new(self.x, self.y)
    }

    /// Translate by a relative offset, staying in the same space
    #[must_use]
    pub fn translate(self, by: AxisValues) -> Self {
        Self::from_axis(self.axis() + by)
    }

    /// Vector from `self` to `other`
    #[must_use]
    pub fn delta_to(self, other: Self) -> AxisValues {
        other.axis() - self.axis()
    }

    /// Snap both axes with the given rounding policy
    #[must_use]
    pub fn rounded(self, rounding: Rounding) -> Self {
        Self::from_axis(self.axis().round(rounding))
    }

    /// Name of the coordinate space
    #[must_use]
    pub fn space_name(self) -> &'static str {
        S::NAME
    }
}

impl<S: CoordinateSpace> fmt::Display for Point<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})@{}", self.x, self.y, S::NAME)
    }
}

impl DocumentPoint {
    /// Convert to the client space of a window scrolled by `scroll`
    #[must_use]
    pub fn to_client(self, scroll: AxisValues) -> ClientPoint {
        ClientPoint::from_axis(self.axis() - scroll)
    }
}

/// Screen placement of a window, needed for device-space conversion
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenMetrics {
    /// Position of the viewport origin on the screen
    pub viewport_origin: AxisValues,
    /// Device pixel ratio
    pub device_pixel_ratio: f64,
}

impl Default for ScreenMetrics {
    fn default() -> Self {
        Self {
            viewport_origin: AxisValues::ZERO,
            device_pixel_ratio: 1.0,
        }
    }
}

impl ClientPoint {
    /// Convert to device space using the window's screen placement
    #[must_use]
    pub fn to_device(self, metrics: &ScreenMetrics) -> DevicePoint {
        let scaled = (metrics.viewport_origin + self.axis()) * metrics.device_pixel_ratio;
        DevicePoint::from_axis(scaled.round(Rounding::Nearest))
    }
}

/// Axis-aligned rectangle in client space
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ClientRect {
    /// Left edge
    pub left: f64,
    /// Top edge
    pub top: f64,
    /// Right edge
    pub right: f64,
    /// Bottom edge
    pub bottom: f64,
}

/// Visible viewport of a window; end points outside it are unreachable
pub type Boundary = ClientRect;

impl ClientRect {
    /// Create from edges
    #[must_use]
    pub const fn new(left: f64, top: f64, right: f64, bottom: f64) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Create from origin and size
    #[must_use]
    pub fn from_size(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self::new(left, top, left + width, top + height)
    }

    /// Viewport boundary of a window with the given size
    #[must_use]
    pub fn viewport(width: f64, height: f64) -> Self {
        Self::from_size(0.0, 0.0, width, height)
    }

    /// Width of the rectangle
    #[must_use]
    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    /// Height of the rectangle
    #[must_use]
    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }

    /// Top-left corner as an offset
    #[must_use]
    pub const fn origin(&self) -> AxisValues {
        AxisValues::new(self.left, self.top)
    }

    /// Whether the point lies inside or on the edge of the rectangle
    #[must_use]
    pub fn contains(&self, point: ClientPoint) -> bool {
        point.x >= self.left
            && point.x <= self.right
            && point.y >= self.top
            && point.y <= self.bottom
    }

    /// Parametric range `[t0, t1]` of the segment that lies inside the rectangle
    ///
    /// Liang-Barsky clipping; `None` when the segment misses the rectangle.
    #[must_use]
    pub fn clip_segment(&self, start: ClientPoint, end: ClientPoint) -> Option<(f64, f64)> {
        let delta = start.delta_to(end);
        let checks = [
            (-delta.x, start.x - self.left),
            (delta.x, self.right - start.x),
            (-delta.y, start.y - self.top),
            (delta.y, self.bottom - start.y),
        ];

        let mut t0: f64 = 0.0;
        let mut t1: f64 = 1.0;
        for (p, q) in checks {
            if p == 0.0 {
                if q < 0.0 {
                    return None;
                }
                continue;
            }
            let r = q / p;
            if p < 0.0 {
                t0 = t0.max(r);
            } else {
                t1 = t1.min(r);
            }
        }

        (t0 <= t1).then_some((t0, t1))
    }

    /// Nearest point inside or on the edge of the rectangle
    #[must_use]
    pub fn clamp(&self, point: ClientPoint) -> ClientPoint {
        ClientPoint::new(
            point.x.clamp(self.left, self.right),
            point.y.clamp(self.top, self.bottom),
        )
    }

    /// Point where a segment starting inside the rectangle leaves it
    ///
    /// Returns `end` when the segment never leaves, and `start` when it
    /// misses the rectangle entirely.
    #[must_use]
    pub fn exit_point(&self, start: ClientPoint, end: ClientPoint) -> ClientPoint {
        match self.clip_segment(start, end) {
            Some((_, t1)) => self.clamp(start.translate(start.delta_to(end) * t1)),
            None => start,
        }
    }

    /// Point where a segment ending inside the rectangle enters it
    ///
    /// Returns `start` when the segment starts inside, and `end` when it
    /// misses the rectangle entirely.
    #[must_use]
    pub fn entry_point(&self, start: ClientPoint, end: ClientPoint) -> ClientPoint {
        match self.clip_segment(start, end) {
            Some((t0, _)) => self.clamp(start.translate(start.delta_to(end) * t0)),
            None => end,
        }
    }
}
