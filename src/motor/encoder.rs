// Quadrature encoder step counting and velocity estimation
//
// The pulse handler is the single asynchronous entry point into the motor's
// otherwise synchronous state: it runs in the board's interrupt delivery
// context and must stay non-blocking and allocation-free. Steps land in a
// shared atomic counter; velocity is derived every `sample_rate` pulses and
// published through a lock-free cell.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Instant;

use super::atomic::AtomicF64;
use super::board::PulseCallback;
use super::velocity::Side;

/// Accumulates signed step counts from quadrature pulses.
///
/// The callback is the counter's only writer; the control loop and the
/// estimator only read.
pub struct EncoderCounter {
    steps: Arc<AtomicI64>,
    sign: i64,
}

impl EncoderCounter {
    pub fn new(steps: Arc<AtomicI64>, side: Side, reverse_encoder: bool) -> Self {
        // four sign combinations: the port encoder is mounted mirrored, and
        // either side may additionally be wired backwards
        let sign = match (side, reverse_encoder) {
            (Side::Port, false) => -1,
            (Side::Port, true) => 1,
            (Side::Starboard, false) => 1,
            (Side::Starboard, true) => -1,
        };
        Self { steps, sign }
    }

    /// Apply one pulse, returning the updated step count.
    pub fn on_pulse(&self, pulse: i32) -> i64 {
        let delta = self.sign * i64::from(pulse);
        self.steps.fetch_add(delta, Ordering::Relaxed) + delta
    }

    pub fn steps(&self) -> i64 {
        self.steps.load(Ordering::Relaxed)
    }
}

/// Derives instantaneous velocity from step deltas each time the step count
/// crosses a `sample_rate` boundary.
pub struct VelocityEstimator {
    velocity: Arc<AtomicF64>,
    max_velocity: Arc<AtomicF64>,
    sample_rate: i64,
    fudge_factor: f64,
    // step count and timestamp at the start of the current sample window;
    // None until the first boundary crossing, so no estimate is produced
    // from a null baseline
    window_begin: Option<(i64, Instant)>,
}

impl VelocityEstimator {
    pub(crate) fn new(
        velocity: Arc<AtomicF64>,
        max_velocity: Arc<AtomicF64>,
        sample_rate: i64,
        fudge_factor: f64,
    ) -> Self {
        Self {
            velocity,
            max_velocity,
            sample_rate,
            fudge_factor,
            window_begin: None,
        }
    }

    /// Called with every updated step count; produces a velocity sample when
    /// the count lands on a sample-rate boundary.
    pub fn observe(&mut self, steps: i64) {
        if steps % self.sample_rate != 0 {
            return;
        }
        let now = Instant::now();
        if let Some((begin_steps, begin_ts)) = self.window_begin {
            let elapsed = now.duration_since(begin_ts).as_secs_f64();
            if elapsed > 0.0 && steps != begin_steps {
                let velocity = (steps - begin_steps) as f64 / elapsed / self.fudge_factor;
                self.velocity.store(velocity);
                self.max_velocity.fetch_max(velocity);
            }
        }
        self.window_begin = Some((steps, now));
    }
}

/// Bundle a counter and estimator into the pulse callback handed to the
/// driver board.
pub fn pulse_handler(counter: EncoderCounter, mut estimator: VelocityEstimator) -> PulseCallback {
    Box::new(move |pulse| {
        let steps = counter.on_pulse(pulse);
        estimator.observe(steps);
    })
}
