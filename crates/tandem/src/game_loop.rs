//! # Dual-Loop Driver
//!
//! Runs the fixed-rate loop inside the variable-rate one:
//!
//! ```text
//! Frame N (delta):
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │ 1. CLAMP delta to max_frame_delta                                   │
//! │                                                                     │
//! │ 2. FIXED STEPS (0..=max_fixed_steps_per_frame)                      │
//! │    while accumulator >= fixed_step:                                 │
//! │    ├─ systems.fixed_update(step)                                    │
//! │    └─ swap_all(Fixed)                                               │
//! │    leftover whole steps past the cap are dropped                    │
//! │                                                                     │
//! │ 3. FRAME UPDATE                                                     │
//! │    ├─ systems.frame_update(frame)                                   │
//! │    └─ swap_all(Variable)                                            │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Events written during a fixed step reach the frame update of the same
//! frame. Events written during a frame update are still in the Fixed
//! loop's Current sequence when the next fixed step runs, however many
//! frames later that is.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tandem_core::LoopKind;

use crate::config::DriverConfig;
use crate::error::HostResult;
use crate::registry::EventRegistry;

/// What a fixed step sees.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FixedStep {
    /// Steps run before this one.
    pub index: u64,
    /// Simulated time covered by the step.
    pub dt: Duration,
}

/// What a frame update sees.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameTick {
    /// Frames run before this one.
    pub frame: u64,
    /// Clamped frame delta.
    pub delta: Duration,
    /// Fraction of a fixed step left in the accumulator, for interpolation.
    pub alpha: f32,
}

/// The host's per-loop work.
pub trait LoopSystems {
    /// Runs one fixed-rate step.
    fn fixed_update(&mut self, step: &FixedStep);

    /// Runs the variable-rate update of a frame.
    fn frame_update(&mut self, frame: &FrameTick);
}

/// Outcome of one frame.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrameReport {
    /// Frame number.
    pub frame: u64,
    /// Delta after clamping.
    pub delta: Duration,
    /// `true` if the incoming delta was clamped.
    pub clamped: bool,
    /// Fixed steps run this frame.
    pub fixed_steps: u32,
    /// Fixed-loop time discarded because of the step cap.
    pub dropped_fixed: Duration,
    /// Events retired by the Fixed swaps.
    pub retired_fixed: usize,
    /// Events retired by the Variable swap.
    pub retired_variable: usize,
    /// Wall time spent in the frame.
    pub total_us: u64,
}

/// Accumulator for frame reports.
#[derive(Clone, Debug)]
pub struct DriverStats {
    /// Total frames recorded.
    pub frames_recorded: u64,
    /// Total fixed steps run.
    pub fixed_steps: u64,
    /// Frames whose delta was clamped.
    pub frames_clamped: u64,
    /// Frames that hit the fixed step cap.
    pub frames_capped: u64,
    /// Fixed-loop time dropped, in microseconds.
    pub dropped_fixed_us: u64,
    /// Sum of frame wall times.
    pub total_us_sum: u64,
    /// Min frame wall time.
    pub min_frame_us: u64,
    /// Max frame wall time.
    pub max_frame_us: u64,
}

impl DriverStats {
    /// Creates a new accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self {
            frames_recorded: 0,
            fixed_steps: 0,
            frames_clamped: 0,
            frames_capped: 0,
            dropped_fixed_us: 0,
            total_us_sum: 0,
            min_frame_us: u64::MAX,
            max_frame_us: 0,
        }
    }

    /// Records a frame's report.
    pub fn record(&mut self, report: &FrameReport) {
        self.frames_recorded += 1;
        self.fixed_steps += u64::from(report.fixed_steps);
        self.total_us_sum += report.total_us;
        self.min_frame_us = self.min_frame_us.min(report.total_us);
        self.max_frame_us = self.max_frame_us.max(report.total_us);

        if report.clamped {
            self.frames_clamped += 1;
        }
        if !report.dropped_fixed.is_zero() {
            self.frames_capped += 1;
            self.dropped_fixed_us += report.dropped_fixed.as_micros() as u64;
        }
    }

    /// Returns average frame wall time in milliseconds.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn avg_frame_ms(&self) -> f64 {
        if self.frames_recorded == 0 {
            return 0.0;
        }
        (self.total_us_sum as f64 / self.frames_recorded as f64) / 1000.0
    }

    /// Returns average fixed steps per frame.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn avg_fixed_steps(&self) -> f64 {
        if self.frames_recorded == 0 {
            return 0.0;
        }
        self.fixed_steps as f64 / self.frames_recorded as f64
    }

    /// Logs a summary at `info` level.
    pub fn log_summary(&self) {
        tracing::info!(
            frames = self.frames_recorded,
            fixed_steps = self.fixed_steps,
            avg_frame_ms = self.avg_frame_ms(),
            avg_fixed_steps = self.avg_fixed_steps(),
            min_frame_us = if self.frames_recorded == 0 { 0 } else { self.min_frame_us },
            max_frame_us = self.max_frame_us,
            frames_clamped = self.frames_clamped,
            frames_capped = self.frames_capped,
            dropped_fixed_us = self.dropped_fixed_us,
            "loop driver summary"
        );
    }
}

impl Default for DriverStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Drives both loops and their channel swaps.
pub struct LoopDriver {
    registry: Arc<EventRegistry>,
    fixed_step: Duration,
    max_frame_delta: Duration,
    max_steps: u32,
    accumulator: Duration,
    frame: u64,
    fixed_index: u64,
    stats: DriverStats,
}

impl LoopDriver {
    /// Creates a driver that swaps the channels of `registry`.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::Config`](crate::HostError::Config) if the
    /// cadence is invalid.
    pub fn new(config: &DriverConfig, registry: Arc<EventRegistry>) -> HostResult<Self> {
        config.validate()?;
        Ok(Self {
            registry,
            fixed_step: config.fixed_step(),
            max_frame_delta: config.max_frame_delta(),
            max_steps: config.max_fixed_steps_per_frame,
            accumulator: Duration::ZERO,
            frame: 0,
            fixed_index: 0,
            stats: DriverStats::new(),
        })
    }

    /// Runs one frame: capped fixed steps, then the frame update.
    pub fn run_frame<S: LoopSystems>(&mut self, delta: Duration, systems: &mut S) -> FrameReport {
        let start = Instant::now();

        let clamped = delta > self.max_frame_delta;
        let delta = delta.min(self.max_frame_delta);
        self.accumulator += delta;

        let mut report = FrameReport {
            frame: self.frame,
            delta,
            clamped,
            ..FrameReport::default()
        };

        while self.accumulator >= self.fixed_step && report.fixed_steps < self.max_steps {
            systems.fixed_update(&FixedStep {
                index: self.fixed_index,
                dt: self.fixed_step,
            });
            report.retired_fixed += self.registry.swap_all(LoopKind::Fixed);

            self.accumulator -= self.fixed_step;
            self.fixed_index += 1;
            report.fixed_steps += 1;
        }

        if self.accumulator >= self.fixed_step {
            let leftover = self.accumulator.as_nanos() % self.fixed_step.as_nanos();
            let kept = Duration::from_nanos(leftover as u64);
            report.dropped_fixed = self.accumulator - kept;
            self.accumulator = kept;
            tracing::debug!(
                frame = self.frame,
                dropped_us = report.dropped_fixed.as_micros() as u64,
                "fixed step cap reached, dropping simulation time"
            );
        }

        systems.frame_update(&FrameTick {
            frame: self.frame,
            delta,
            alpha: self.accumulator.as_secs_f32() / self.fixed_step.as_secs_f32(),
        });
        report.retired_variable = self.registry.swap_all(LoopKind::Variable);

        self.frame += 1;
        report.total_us = start.elapsed().as_micros() as u64;
        self.stats.record(&report);
        report
    }

    /// Returns the registry whose channels this driver swaps.
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &Arc<EventRegistry> {
        &self.registry
    }

    /// Frames run so far.
    #[inline]
    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.frame
    }

    /// Fixed steps run so far.
    #[inline]
    #[must_use]
    pub fn fixed_step_count(&self) -> u64 {
        self.fixed_index
    }

    /// Simulation time not yet consumed by a fixed step.
    #[inline]
    #[must_use]
    pub fn accumulator(&self) -> Duration {
        self.accumulator
    }

    /// Returns the accumulated statistics.
    #[must_use]
    pub fn stats(&self) -> &DriverStats {
        &self.stats
    }
}
