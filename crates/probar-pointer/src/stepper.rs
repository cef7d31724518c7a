//! Time-paced cursor movement.
//!
//! A movement is planned once from its start point, end point and speed,
//! then sampled against a [`Clock`]: every sample reads how much time has
//! passed and interpolates the matching point. The number of steps therefore
//! depends on how fast the host processes them, never on a fixed count. The
//! last sample is always the exact end point.

use crate::clock::Clock;
use crate::emission::StepEmitter;
use crate::geometry::{AxisValues, ClientPoint, Rounding};
use crate::result::PointerResult;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::FusedIterator;
use std::sync::Arc;
use std::time::Duration;

/// Duration of a movement covering `distance`
///
/// Speed is measured along the dominant axis. The result is never shorter
/// than `min_moving_time`.
#[must_use]
pub fn movement_duration(
    distance: AxisValues,
    px_per_ms: f64,
    min_moving_time: Duration,
) -> Duration {
    let dominant = distance.dominant();
    if !dominant.is_finite() || !px_per_ms.is_finite() || px_per_ms <= 0.0 {
        return min_moving_time;
    }

    let travel = Duration::try_from_secs_f64(dominant / px_per_ms / 1000.0)
        .unwrap_or(min_moving_time);
    travel.max(min_moving_time)
}

/// A planned movement
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MovePlan {
    /// Cursor position when the movement starts
    pub start: ClientPoint,
    /// Exact point the movement ends on
    pub end: ClientPoint,
    /// Total movement time
    pub duration: Duration,
    /// Jump straight to the end in one step
    pub immediate: bool,
}

impl MovePlan {
    /// Plan a movement at `px_per_ms`
    #[must_use]
    pub fn new(
        start: ClientPoint,
        end: ClientPoint,
        px_per_ms: f64,
        min_moving_time: Duration,
        immediate: bool,
    ) -> Self {
        Self {
            start,
            end,
            duration: movement_duration(start.delta_to(end), px_per_ms, min_moving_time),
            immediate,
        }
    }

    /// Distance to cover on each axis
    #[must_use]
    pub fn distance(&self) -> AxisValues {
        self.start.delta_to(self.end)
    }
}

/// One sampled step of a movement
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MoveStep {
    /// Zero-based step index
    pub index: usize,
    /// Cursor position for this step
    pub point: ClientPoint,
    /// Time since the movement started
    pub elapsed: Duration,
    /// Fraction of the duration covered, in `[0, 1]`
    pub progress: f64,
    /// First step of the movement
    pub is_first: bool,
    /// Last step; `point` equals the plan's end
    pub is_final: bool,
}

/// Lazy sequence of steps along a plan
///
/// Each call to `next` reads the clock. Elapsed time never goes backwards,
/// even if the clock does, and the sequence ends after the end point has
/// been yielded.
pub struct MovePath {
    plan: MovePlan,
    clock: Arc<dyn Clock>,
    started_at: Duration,
    last_elapsed: Duration,
    index: usize,
    done: bool,
}

impl fmt::Debug for MovePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MovePath")
            .field("plan", &self.plan)
            .field("index", &self.index)
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

impl MovePath {
    /// Start sampling `plan` from the clock's current time
    #[must_use]
    pub fn new(plan: MovePlan, clock: Arc<dyn Clock>) -> Self {
        let started_at = clock.now();
        Self {
            plan,
            clock,
            started_at,
            last_elapsed: Duration::ZERO,
            index: 0,
            done: false,
        }
    }

    /// Whether the end point has been yielded
    #[must_use]
    pub const fn is_done(&self) -> bool {
        self.done
    }

    fn step(
        &mut self,
        point: ClientPoint,
        elapsed: Duration,
        progress: f64,
        is_final: bool,
    ) -> MoveStep {
        let step = MoveStep {
            index: self.index,
            point,
            elapsed,
            progress,
            is_first: self.index == 0,
            is_final,
        };
        self.index += 1;
        step
    }
}

impl Iterator for MovePath {
    type Item = MoveStep;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let duration = self.plan.duration;
        let elapsed = self
            .clock
            .now()
            .saturating_sub(self.started_at)
            .max(self.last_elapsed)
            .min(duration);
        self.last_elapsed = elapsed;

        if self.plan.immediate || elapsed >= duration {
            self.done = true;
            return Some(self.step(self.plan.end, elapsed, 1.0, true));
        }

        let progress = elapsed.as_secs_f64() / duration.as_secs_f64();
        let point = self
            .plan
            .start
            .translate(self.plan.distance() * progress)
            .rounded(Rounding::Nearest);
        Some(self.step(point, elapsed, progress, false))
    }
}

impl FusedIterator for MovePath {}

/// Drives a [`MovePath`] through a [`StepEmitter`]
#[derive(Debug, Clone)]
pub struct MoveStepper {
    clock: Arc<dyn Clock>,
}

impl MoveStepper {
    /// Stepper paced by `clock`
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Run a planned movement to completion
    ///
    /// Yields to the clock before each sample, except for immediate plans
    /// which emit the end point right away. Returns the number of steps.
    pub async fn run(
        &self,
        plan: &MovePlan,
        emitter: &mut dyn StepEmitter,
    ) -> PointerResult<usize> {
        let mut path = MovePath::new(*plan, Arc::clone(&self.clock));
        let mut steps = 0;

        loop {
            if !plan.immediate {
                self.clock.tick().await;
            }
            let Some(step) = path.next() else {
                break;
            };

            tracing::trace!(
                step = step.index,
                x = step.point.x,
                y = step.point.y,
                elapsed_ms = step.elapsed.as_millis() as u64,
                "move step"
            );
            emitter
                .emit_step(&step)
                .await
                .map_err(|e| e.at_stage(format!("step #{}", step.index)))?;
            steps += 1;

            if step.is_final {
                break;
            }
        }

        emitter.finish(plan.end).await?;
        tracing::debug!(steps, duration_ms = plan.duration.as_millis() as u64, "movement finished");
        Ok(steps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::dom::WindowId;
    use crate::result::PointerError;
    use async_trait::async_trait;
    use proptest::prelude::*;

    #[derive(Default)]
    struct CollectingEmitter {
        steps: Vec<MoveStep>,
        finished: Option<ClientPoint>,
        fail_at: Option<usize>,
    }

    #[async_trait]
    impl StepEmitter for CollectingEmitter {
        async fn emit_step(&mut self, step: &MoveStep) -> PointerResult<()> {
            if self.fail_at == Some(step.index) {
                return Err(PointerError::collaborator("emit", &WindowId::new("top"), "boom"));
            }
            self.steps.push(*step);
            Ok(())
        }

        async fn finish(&mut self, end: ClientPoint) -> PointerResult<()> {
            self.finished = Some(end);
            Ok(())
        }
    }

    fn manual(step_ms: u64) -> Arc<ManualClock> {
        Arc::new(ManualClock::new(Duration::from_millis(step_ms)))
    }

    mod duration_tests {
        use super::*;

        #[test]
        fn test_dominant_axis_sets_duration() {
            let duration = movement_duration(AxisValues::new(300.0, -100.0), 1.0, Duration::ZERO);
            assert_eq!(duration, Duration::from_millis(300));
        }

        #[test]
        fn test_zero_distance_is_min_time() {
            let min = Duration::from_millis(25);
            assert_eq!(movement_duration(AxisValues::ZERO, 100.0, min), min);
        }

        #[test]
        fn test_short_distance_clamped_to_min() {
            let min = Duration::from_millis(200);
            assert_eq!(movement_duration(AxisValues::new(5.0, 5.0), 1.0, min), min);
        }

        #[test]
        fn test_invalid_speed_falls_back_to_min() {
            let min = Duration::from_millis(10);
            assert_eq!(movement_duration(AxisValues::new(100.0, 0.0), 0.0, min), min);
            assert_eq!(movement_duration(AxisValues::new(f64::NAN, 0.0), 1.0, min), min);
        }
    }

    mod path_tests {
        use super::*;

        #[test]
        fn test_path_interpolates_and_ends_exactly() {
            let clock = manual(0);
            let plan = MovePlan {
                start: ClientPoint::new(0.0, 0.0),
                end: ClientPoint::new(100.3, 50.7),
                duration: Duration::from_millis(100),
                immediate: false,
            };
            let mut path = MovePath::new(plan, clock.clone());

            clock.advance(Duration::from_millis(50));
            let half = path.next().unwrap();
            assert_eq!(half.point, ClientPoint::new(50.0, 25.0));
            assert!(half.is_first);
            assert!(!half.is_final);

            clock.advance(Duration::from_millis(80));
            let last = path.next().unwrap();
            assert_eq!(last.point, ClientPoint::new(100.3, 50.7));
            assert!(last.is_final);
            assert_eq!(last.elapsed, Duration::from_millis(100));
            assert!(path.next().is_none());
            assert!(path.is_done());
        }

        #[test]
        fn test_immediate_yields_only_end() {
            let plan = MovePlan::new(
                ClientPoint::new(0.0, 0.0),
                ClientPoint::new(400.0, 0.0),
                1.0,
                Duration::ZERO,
                true,
            );
            let steps: Vec<_> = MovePath::new(plan, manual(0)).collect();
            assert_eq!(steps.len(), 1);
            assert_eq!(steps[0].point, plan.end);
            assert!(steps[0].is_first && steps[0].is_final);
        }
    }

    mod stepper_tests {
        use super::*;

        #[tokio::test]
        async fn test_run_paces_with_clock() {
            let clock = manual(10);
            let stepper = MoveStepper::new(clock.clone());
            let plan = MovePlan {
                start: ClientPoint::new(0.0, 0.0),
                end: ClientPoint::new(200.0, 100.0),
                duration: Duration::from_millis(100),
                immediate: false,
            };
            let mut emitter = CollectingEmitter::default();

            let steps = stepper.run(&plan, &mut emitter).await.unwrap();

            assert_eq!(steps, 10);
            assert_eq!(clock.tick_count(), 10);
            let (last, intermediate) = emitter.steps.split_last().unwrap();
            assert_eq!(last.point, plan.end);
            for step in intermediate {
                assert!(step.point.x > 0.0 && step.point.x < 200.0);
                assert!(step.point.y > 0.0 && step.point.y < 100.0);
            }
            assert!(emitter.steps.windows(2).all(|w| w[0].elapsed < w[1].elapsed));
            assert_eq!(emitter.finished, Some(plan.end));
        }

        #[tokio::test]
        async fn test_zero_distance_still_steps() {
            let stepper = MoveStepper::new(manual(1));
            let plan = MovePlan::new(
                ClientPoint::new(5.0, 5.0),
                ClientPoint::new(5.0, 5.0),
                1.0,
                Duration::ZERO,
                false,
            );
            let mut emitter = CollectingEmitter::default();
            assert_eq!(stepper.run(&plan, &mut emitter).await.unwrap(), 1);
            assert_eq!(emitter.steps[0].point, ClientPoint::new(5.0, 5.0));
        }

        #[tokio::test]
        async fn test_immediate_skips_ticks() {
            let clock = manual(10);
            let stepper = MoveStepper::new(clock.clone());
            let plan = MovePlan::new(
                ClientPoint::new(0.0, 0.0),
                ClientPoint::new(10.0, 10.0),
                1.0,
                Duration::from_millis(500),
                true,
            );
            let mut emitter = CollectingEmitter::default();
            assert_eq!(stepper.run(&plan, &mut emitter).await.unwrap(), 1);
            assert_eq!(clock.tick_count(), 0);
        }

        #[tokio::test]
        async fn test_step_failure_names_step() {
            let stepper = MoveStepper::new(manual(10));
            let plan = MovePlan {
                start: ClientPoint::new(0.0, 0.0),
                end: ClientPoint::new(100.0, 0.0),
                duration: Duration::from_millis(100),
                immediate: false,
            };
            let mut emitter = CollectingEmitter {
                fail_at: Some(3),
                ..CollectingEmitter::default()
            };

            let err = stepper.run(&plan, &mut emitter).await.unwrap_err();
            assert!(err.to_string().starts_with("step #3 failed in window top"));
            assert_eq!(emitter.steps.len(), 3);
            assert!(emitter.finished.is_none());
        }

        #[tokio::test(start_paused = true)]
        async fn test_tokio_clock_reaches_end() {
            let clock = Arc::new(crate::clock::TokioClock::new(Duration::from_millis(4)));
            let stepper = MoveStepper::new(clock);
            let plan = MovePlan {
                start: ClientPoint::new(0.0, 0.0),
                end: ClientPoint::new(40.0, 0.0),
                duration: Duration::from_millis(40),
                immediate: false,
            };
            let mut emitter = CollectingEmitter::default();

            let steps = stepper.run(&plan, &mut emitter).await.unwrap();
            assert!(steps >= 2);
            assert_eq!(emitter.steps.last().unwrap().point, plan.end);
        }
    }

    proptest! {
        /// Duration never drops below the minimum moving time
        #[test]
        fn prop_duration_at_least_min(
            dx in -5000.0f64..5000.0,
            dy in -5000.0f64..5000.0,
            speed in 0.01f64..100.0,
            min in 0u64..1000
        ) {
            let min = Duration::from_millis(min);
            prop_assert!(movement_duration(AxisValues::new(dx, dy), speed, min) >= min);
        }

        /// The last step is the exact end point whatever the clock step
        #[test]
        fn prop_final_point_exact(
            ex in -2000.0f64..2000.0,
            ey in -2000.0f64..2000.0,
            step_ms in 1u64..50,
            duration_ms in 0u64..500
        ) {
            let plan = MovePlan {
                start: ClientPoint::new(0.0, 0.0),
                end: ClientPoint::new(ex, ey),
                duration: Duration::from_millis(duration_ms),
                immediate: false,
            };
            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let mut emitter = CollectingEmitter::default();
            runtime
                .block_on(MoveStepper::new(manual(step_ms)).run(&plan, &mut emitter))
                .unwrap();
            let last = emitter.steps.last().unwrap();
            prop_assert_eq!(last.point, plan.end);
            prop_assert!(last.is_final);
            prop_assert!(emitter.steps.windows(2).all(|w| w[0].elapsed <= w[1].elapsed));
        }
    }
}
