// Velocity PID controller and the step-goal control loop
//
// Seeks to hold encoder-derived velocity at a setpoint by issuing
// incremental power corrections. The loop runs at a fixed sample frequency
// (default 20 Hz) and is the only consumer of suspension in the control
// path: it blocks solely at its tick boundary.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::actuator::{Motor, MotorError};
use super::slew::SlewLimiter;
use super::velocity::{Direction, SlewProfile, Velocity};
use crate::config::PidConfig;
use crate::rate::Rate;

/// Dead-band around zero error: 2% of the full power scale.
const ZERO_TOLERANCE: f64 = 0.02;

/// True if the value is within 2% of zero (exact zero trivially included).
pub fn equals_zero(value: f64) -> bool {
    value.abs() <= ZERO_TOLERANCE
}

/// Result of one step-goal run: how long it took and where the step counter
/// ended up. An interrupted run reports partial progress here, not an error.
#[derive(Debug, Clone, Copy)]
pub struct StepOutcome {
    pub elapsed: Duration,
    pub steps: i64,
}

/// One motor's PID controller.
///
/// Gains are individually toggleable; the integral and derivative terms use
/// the error history up to (not including) the current tick, so a single
/// correction is never double-counted within its own tick.
pub struct PidController {
    motor: Arc<Motor>,
    kp: f64,
    ki: f64,
    kd: f64,
    enable_p: bool,
    enable_i: bool,
    enable_d: bool,
    clip_limit: f64,
    sample_freq_hz: u32,
    slew: Option<SlewLimiter>,
    last_error: f64,
    sum_errors: f64,
    // absolute step-count target; None runs unbounded (cruise)
    step_limit: Option<i64>,
}

impl PidController {
    pub fn new(cfg: &PidConfig, motor: Arc<Motor>) -> Self {
        Self {
            motor,
            kp: cfg.kp,
            ki: cfg.ki,
            kd: cfg.kd,
            enable_p: cfg.enable_p,
            enable_i: cfg.enable_i,
            enable_d: cfg.enable_d,
            clip_limit: cfg.clip_limit,
            sample_freq_hz: cfg.sample_freq_hz,
            slew: cfg.enable_slew.then(|| SlewLimiter::new(SlewProfile::Normal)),
            last_error: 0.0,
            sum_errors: 0.0,
            step_limit: None,
        }
    }

    pub fn motor(&self) -> &Arc<Motor> {
        &self.motor
    }

    pub fn set_tuning(&mut self, kp: f64, ki: f64, kd: f64) {
        self.kp = kp;
        self.ki = ki;
        self.kd = kd;
        info!(
            "{} pid tuning set; P={:.4} I={:.4} D={:.4}",
            self.motor.side(),
            kp,
            ki,
            kd
        );
    }

    pub fn tuning(&self) -> (f64, f64, f64) {
        (self.kp, self.ki, self.kd)
    }

    /// Set the absolute step-count goal from the current count and a
    /// relative distance, signed by direction. Must be called before
    /// [`PidController::step_to`].
    pub fn set_step_limit(&mut self, direction: Direction, steps: i64) {
        let limit = match direction {
            Direction::Forward => self.motor.steps() + steps,
            Direction::Reverse => self.motor.steps() - steps,
        };
        self.step_limit = Some(limit);
    }

    /// Remove the step-count bound; the next run cruises until interrupted.
    pub fn clear_step_limit(&mut self) {
        self.step_limit = None;
    }

    /// True while the step goal has not yet been reached in the commanded
    /// direction. Unbounded runs are always stepping.
    pub fn is_stepping(&self, direction: Direction) -> bool {
        match self.step_limit {
            None => true,
            Some(limit) => match direction {
                Direction::Forward => self.motor.steps() < limit,
                Direction::Reverse => self.motor.steps() > limit,
            },
        }
    }

    /// Run the PID loop at the configured sample frequency until the step
    /// goal is reached, `is_enabled` goes false, or the motor is
    /// interrupted. On exit the interrupt flag is cleared and the slew
    /// limiter disabled.
    pub async fn step_to(
        &mut self,
        target: Velocity,
        direction: Direction,
        profile: SlewProfile,
        is_enabled: impl Fn() -> bool,
    ) -> Result<StepOutcome, MotorError> {
        let start = Instant::now();
        let target_velocity = match direction {
            Direction::Forward => target.percent(),
            Direction::Reverse => -target.percent(),
        };
        // accumulators are per-run
        self.last_error = 0.0;
        self.sum_errors = 0.0;
        if let Some(slew) = self.slew.as_mut() {
            slew.set_profile(profile);
            slew.enable();
        }
        info!(
            "{} step-to velocity {:+.1}; step limit {:?}",
            self.motor.side(),
            target_velocity,
            self.step_limit
        );

        let mut rate = Rate::new(self.sample_freq_hz);
        while is_enabled() && self.is_stepping(direction) {
            let tick_target = match self.slew.as_mut() {
                Some(slew) => slew.shape(self.motor.velocity(), target_velocity),
                None => target_velocity,
            };
            let changed = self.compute(tick_target).await?;

            // stationary with a zero target: the goal is unreachable, so
            // bail instead of spinning forever
            if !changed
                && self.motor.velocity() == 0.0
                && target_velocity == 0.0
                && self.step_limit.is_some()
            {
                debug!("{} stationary at zero target; breaking", self.motor.side());
                break;
            }
            if self.motor.is_interrupted() {
                info!("{} step-to interrupted", self.motor.side());
                break;
            }
            rate.wait().await;
        }

        if let Some(slew) = self.slew.as_mut() {
            slew.disable();
        }
        self.motor.reset_interrupt();

        let outcome = StepOutcome {
            elapsed: start.elapsed(),
            steps: self.motor.steps(),
        };
        info!(
            "{} step-to complete; {:.2}s elapsed, {}/{:?} steps",
            self.motor.side(),
            outcome.elapsed.as_secs_f64(),
            outcome.steps,
            self.step_limit
        );
        Ok(outcome)
    }

    /// One PID step: compute a clipped power correction from the velocity
    /// error and apply it. Returns false when the error sits inside the
    /// dead-band and no correction was applied.
    pub(crate) async fn compute(&mut self, target_velocity: f64) -> Result<bool, MotorError> {
        let current_velocity = self.motor.velocity();
        let error = target_velocity - current_velocity;
        let current_power = self.motor.current_power().await?;

        if equals_zero(error) {
            if target_velocity == 0.0 {
                // snap to exactly zero so residual power cannot drift
                if let Err(e) = self.motor.set_power(0.0).await {
                    warn!("{} zero snap rejected: {}", self.motor.side(), e);
                }
            }
            self.last_error = 0.0;
            return Ok(false);
        }

        let p = if self.enable_p { self.kp * error } else { 0.0 };
        let i = if self.enable_i {
            self.ki * self.sum_errors
        } else {
            0.0
        };
        // derivative acts on the previous tick's error
        let d = if self.enable_d {
            self.kd * self.last_error
        } else {
            0.0
        };
        let output = (p + i + d).clamp(-self.clip_limit, self.clip_limit);
        let power = current_power + output;
        debug!(
            "{} velocity {:+6.2} -> {:+6.2}; power {:+.3} = {:+.3} + {:+.3} (P={:+.4} I={:+.4} D={:+.4})",
            self.motor.side(),
            current_velocity,
            target_velocity,
            power,
            current_power,
            output,
            p,
            i,
            d
        );
        if let Err(e) = self.motor.set_power(power).await {
            warn!("{} pid correction rejected: {}", self.motor.side(), e);
        }

        self.last_error = error;
        self.sum_errors += error;
        Ok(true)
    }
}
