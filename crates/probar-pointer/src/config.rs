//! Automation configuration.
//!
//! [`MoveOptions`] describes one movement request and is never mutated once
//! an automation is built from it. [`AutomationConfig`] carries the ambient
//! tunables shared by every automation in a window.

use crate::dom::ElementRef;
use crate::geometry::AxisValues;
use crate::result::{PointerError, PointerResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Maximum cursor speed at speed factor 1 (pixels per millisecond)
pub const MAX_CURSOR_SPEED: f64 = 100.0;

/// Maximum dragging speed at speed factor 1 (pixels per millisecond)
pub const MAX_DRAGGING_SPEED: f64 = 4.0;

/// Exponent base scaling for the speed curve
pub const CURSOR_FACTOR: f64 = 4.0;

/// Default wait for a cross-frame handoff response (30 seconds)
pub const DEFAULT_HANDOFF_TIMEOUT_MS: u64 = 30_000;

/// Default scheduler yield granularity between steps
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 4;

/// Speed-derived timing for an automation
///
/// The speed factor lies in `(0, 1]`; cursor speed grows exponentially with
/// it so the slowest settings stay visibly slow.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AutomationSettings {
    speed_factor: f64,
}

impl AutomationSettings {
    /// Settings for a speed factor; non-positive or non-finite values mean 1
    #[must_use]
    pub fn new(speed: Option<f64>) -> Self {
        let speed_factor = match speed {
            Some(s) if s.is_finite() && s > 0.0 => s.min(1.0),
            _ => 1.0,
        };
        Self { speed_factor }
    }

    /// Effective speed factor
    #[must_use]
    pub const fn speed_factor(&self) -> f64 {
        self.speed_factor
    }

    /// Cursor speed in pixels of the dominant axis per millisecond
    #[must_use]
    pub fn cursor_speed(&self) -> f64 {
        (MAX_CURSOR_SPEED * CURSOR_FACTOR).powf(self.speed_factor) / CURSOR_FACTOR
    }

    /// Speed used while dragging, in pixels per millisecond
    #[must_use]
    pub fn dragging_speed(&self) -> f64 {
        (MAX_DRAGGING_SPEED * CURSOR_FACTOR).powf(self.speed_factor) / CURSOR_FACTOR
    }
}

impl Default for AutomationSettings {
    fn default() -> Self {
        Self::new(None)
    }
}

/// Modifier keys held during the movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Modifiers {
    /// Control key
    #[serde(default)]
    pub ctrl: bool,
    /// Alt key
    #[serde(default)]
    pub alt: bool,
    /// Shift key
    #[serde(default)]
    pub shift: bool,
    /// Meta key
    #[serde(default)]
    pub meta: bool,
}

impl Modifiers {
    /// No modifier held
    #[must_use]
    pub const fn none() -> Self {
        Self {
            ctrl: false,
            alt: false,
            shift: false,
            meta: false,
        }
    }
}

/// One movement request
#[derive(Debug, Clone, Default)]
pub struct MoveOptions {
    /// Offset relative to the target element's box
    pub offset: AxisValues,
    /// Modifier keys held
    pub modifiers: Modifiers,
    /// Speed factor in `(0, 1]`
    pub speed: Option<f64>,
    /// Minimum duration of the movement
    pub min_moving_time: Duration,
    /// Do not scroll the target into view first
    pub skip_scrolling: bool,
    /// Ask the dispatcher to suppress default drag behavior
    pub skip_default_drag_behavior: bool,
    /// Movement is part of a drag-and-drop gesture
    pub drag_and_drop: bool,
    /// Element that received the touch start, for touch-mode correction
    pub touch_target: Option<ElementRef>,
}

impl MoveOptions {
    /// Options with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the element-relative offset
    #[must_use]
    pub const fn offset(mut self, x: f64, y: f64) -> Self {
        self.offset = AxisValues::new(x, y);
        self
    }

    /// Set held modifiers
    #[must_use]
    pub const fn modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    /// Set the speed factor
    #[must_use]
    pub const fn speed(mut self, speed: f64) -> Self {
        self.speed = Some(speed);
        self
    }

    /// Set the minimum movement duration
    #[must_use]
    pub const fn min_moving_time(mut self, duration: Duration) -> Self {
        self.min_moving_time = duration;
        self
    }

    /// Skip scrolling the target into view
    #[must_use]
    pub const fn skip_scrolling(mut self, skip: bool) -> Self {
        self.skip_scrolling = skip;
        self
    }

    /// Suppress default drag behavior in dispatched events
    #[must_use]
    pub const fn skip_default_drag_behavior(mut self, skip: bool) -> Self {
        self.skip_default_drag_behavior = skip;
        self
    }

    /// Mark the movement as part of a drag-and-drop gesture
    #[must_use]
    pub const fn drag_and_drop(mut self, enabled: bool) -> Self {
        self.drag_and_drop = enabled;
        self
    }

    /// Pin the touch-mode event target
    #[must_use]
    pub fn touch_target(mut self, element: ElementRef) -> Self {
        self.touch_target = Some(element);
        self
    }

    /// Speed-derived settings for this request
    #[must_use]
    pub fn settings(&self) -> AutomationSettings {
        AutomationSettings::new(self.speed)
    }

    /// Pixels per millisecond used for this request
    #[must_use]
    pub fn pixels_per_ms(&self) -> f64 {
        let settings = self.settings();
        if self.drag_and_drop {
            settings.dragging_speed()
        } else {
            settings.cursor_speed()
        }
    }
}

/// Ambient tunables for every automation in a window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutomationConfig {
    /// How long to wait for a cross-frame handoff response
    pub handoff_timeout_ms: u64,
    /// Scheduler yield granularity between movement steps
    pub tick_interval_ms: u64,
    /// Host simulates a touch device
    pub touch_mode: bool,
    /// Host drives input through a native-input channel
    pub native_automation: bool,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            handoff_timeout_ms: DEFAULT_HANDOFF_TIMEOUT_MS,
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            touch_mode: false,
            native_automation: false,
        }
    }
}

impl AutomationConfig {
    /// Config with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the handoff timeout
    #[must_use]
    pub const fn with_handoff_timeout(mut self, timeout: Duration) -> Self {
        self.handoff_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the scheduler tick interval
    #[must_use]
    pub const fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Enable touch simulation
    #[must_use]
    pub const fn with_touch_mode(mut self, enabled: bool) -> Self {
        self.touch_mode = enabled;
        self
    }

    /// Expect a native-input channel
    #[must_use]
    pub const fn with_native_automation(mut self, enabled: bool) -> Self {
        self.native_automation = enabled;
        self
    }

    /// Handoff timeout as a duration
    #[must_use]
    pub const fn handoff_timeout(&self) -> Duration {
        Duration::from_millis(self.handoff_timeout_ms)
    }

    /// Tick interval as a duration
    #[must_use]
    pub const fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Reject configurations the automation cannot run with
    pub fn validate(&self) -> PointerResult<()> {
        if self.handoff_timeout_ms == 0 {
            return Err(PointerError::InvalidConfig {
                message: "handoff_timeout_ms must be greater than zero".to_string(),
            });
        }
        if self.tick_interval_ms == 0 {
            return Err(PointerError::InvalidConfig {
                message: "tick_interval_ms must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Parse and validate a YAML config
    pub fn from_yaml(yaml: &str) -> PointerResult<Self> {
        let config: Self = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a JSON config
    pub fn from_json(json: &str) -> PointerResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file, choosing the format from its extension
    pub fn from_file(path: impl AsRef<std::path::Path>) -> PointerResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&text),
            _ => Self::from_yaml(&text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod settings_tests {
        use super::*;

        #[test]
        fn test_full_speed() {
            let settings = AutomationSettings::new(Some(1.0));
            assert!((settings.cursor_speed() - 100.0).abs() < 1e-9);
            assert!((settings.dragging_speed() - 4.0).abs() < 1e-9);
        }

        #[test]
        fn test_half_speed_is_slower() {
            let settings = AutomationSettings::new(Some(0.5));
            assert!((settings.cursor_speed() - 5.0).abs() < 1e-9);
        }

        #[test]
        fn test_invalid_speed_falls_back_to_one() {
            assert_eq!(AutomationSettings::new(None).speed_factor(), 1.0);
            assert_eq!(AutomationSettings::new(Some(0.0)).speed_factor(), 1.0);
            assert_eq!(AutomationSettings::new(Some(f64::NAN)).speed_factor(), 1.0);
            assert_eq!(AutomationSettings::new(Some(7.0)).speed_factor(), 1.0);
        }
    }

    mod move_options_tests {
        use super::*;

        #[test]
        fn test_builder() {
            let options = MoveOptions::new()
                .offset(5.0, 6.0)
                .speed(0.5)
                .min_moving_time(Duration::from_millis(25))
                .skip_scrolling(true)
                .modifiers(Modifiers {
                    shift: true,
                    ..Modifiers::none()
                });

            assert_eq!(options.offset, AxisValues::new(5.0, 6.0));
            assert_eq!(options.speed, Some(0.5));
            assert_eq!(options.min_moving_time, Duration::from_millis(25));
            assert!(options.skip_scrolling);
            assert!(options.modifiers.shift);
            assert!(options.touch_target.is_none());
        }

        #[test]
        fn test_drag_uses_dragging_speed() {
            let moving = MoveOptions::new();
            let dragging = MoveOptions::new().drag_and_drop(true);
            assert!(dragging.pixels_per_ms() < moving.pixels_per_ms());
        }
    }

    mod automation_config_tests {
        use super::*;

        #[test]
        fn test_defaults() {
            let config = AutomationConfig::default();
            assert_eq!(config.handoff_timeout(), Duration::from_secs(30));
            assert_eq!(config.tick_interval(), Duration::from_millis(4));
            assert!(!config.touch_mode);
            assert!(config.validate().is_ok());
        }

        #[test]
        fn test_from_yaml_partial() {
            let config = AutomationConfig::from_yaml("handoff_timeout_ms: 500\ntouch_mode: true\n")
                .unwrap();
            assert_eq!(config.handoff_timeout_ms, 500);
            assert!(config.touch_mode);
            assert_eq!(config.tick_interval_ms, DEFAULT_TICK_INTERVAL_MS);
        }

        #[test]
        fn test_from_json_rejects_zero_tick() {
            let err = AutomationConfig::from_json(r#"{"tick_interval_ms": 0}"#).unwrap_err();
            assert!(matches!(err, PointerError::InvalidConfig { .. }));
        }

        #[test]
        fn test_builder_roundtrips_durations() {
            let config = AutomationConfig::new()
                .with_handoff_timeout(Duration::from_millis(750))
                .with_tick_interval(Duration::from_millis(16))
                .with_native_automation(true);
            assert_eq!(config.handoff_timeout(), Duration::from_millis(750));
            assert_eq!(config.tick_interval(), Duration::from_millis(16));
            assert!(config.native_automation);
        }
    }
}
