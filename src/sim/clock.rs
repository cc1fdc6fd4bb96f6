//! Fixed-timestep accumulator
//!
//! Converts variable wall-clock frame deltas into a whole number of fixed
//! simulation steps. Frame deltas are clamped (tab-backgrounding spikes) and
//! steps per frame are capped; time beyond the cap is discarded.

use crate::consts::{MAX_FRAME_DELTA, MAX_SUBSTEPS, SIM_DT};

/// Result of feeding one frame into the clock
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameSteps {
    /// Fixed steps to run this frame
    pub steps: u32,
    /// Leftover fraction of a step, for render interpolation
    pub alpha: f32,
    /// Seconds of accumulated time thrown away by the step cap
    pub dropped: f32,
}

#[derive(Debug, Clone)]
pub struct SimulationClock {
    step: f32,
    max_frame_delta: f32,
    max_steps: u32,
    accumulator: f32,
}

impl Default for SimulationClock {
    fn default() -> Self {
        Self::new(SIM_DT, MAX_FRAME_DELTA, MAX_SUBSTEPS)
    }
}

impl SimulationClock {
    pub fn new(step: f32, max_frame_delta: f32, max_steps: u32) -> Self {
        Self {
            step,
            max_frame_delta,
            max_steps: max_steps.max(1),
            accumulator: 0.0,
        }
    }

    pub fn step(&self) -> f32 {
        self.step
    }

    /// Feed a frame's wall-clock delta (seconds)
    pub fn advance(&mut self, frame_dt: f32) -> FrameSteps {
        let frame_dt = if frame_dt.is_finite() {
            frame_dt.clamp(0.0, self.max_frame_delta)
        } else {
            0.0
        };
        self.accumulator += frame_dt;

        let mut steps = 0;
        while self.accumulator >= self.step && steps < self.max_steps {
            self.accumulator -= self.step;
            steps += 1;
        }

        // Spiral-of-death guard: keep less than one step of backlog
        let mut dropped = 0.0;
        if self.accumulator >= self.step {
            dropped = self.accumulator - self.accumulator % self.step;
            self.accumulator %= self.step;
        }

        FrameSteps {
            steps,
            alpha: self.accumulator / self.step,
            dropped,
        }
    }

    /// Drive `step_fn` for each fixed step in this frame; returns the interpolation alpha
    pub fn run_frame(&mut self, frame_dt: f32, mut step_fn: impl FnMut(f32)) -> f32 {
        let frame = self.advance(frame_dt);
        for _ in 0..frame.steps {
            step_fn(self.step);
        }
        frame.alpha
    }

    /// Forget any backlog (after pause or restore)
    pub fn reset(&mut self) {
        self.accumulator = 0.0;
    }
}

/// Blend two samples for rendering between fixed steps
#[inline]
pub fn interpolate(prev: glam::Vec2, current: glam::Vec2, alpha: f32) -> glam::Vec2 {
    prev.lerp(current, alpha.clamp(0.0, 1.0))
}
