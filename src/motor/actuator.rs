// Motor actuator: power safety checks, open-loop ramps, telemetry
//
// One instance per side. The actuator owns the side's orientation and power
// bookkeeping, converts logical power (-1.0..1.0) into driving power via
// the battery/motor voltage ratio, and enforces the hardware interlocks: no
// command beyond the power ceiling, no abrupt sign reversal.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::Duration;

use tracing::{debug, info, warn};

use super::atomic::AtomicF64;
use super::board::{POWER_READ_ATTEMPTS, POWER_READ_DELAY, SharedBoard, read_power};
use super::encoder::{EncoderCounter, VelocityEstimator, pulse_handler};
use super::velocity::{Side, SlewProfile};
use crate::config::{ConfigError, MotorsConfig, PowerReadPolicy};
use crate::rate::Rate;

/// Hard ceiling on commanded logical power magnitude.
pub const POWER_LIMIT: f64 = 0.99;

/// Largest tolerated power change across a sign reversal. Anything bigger
/// must ramp through an explicit stop or risk stripping the gearbox.
pub const POWER_JUMP_LIMIT: f64 = 0.3;

#[derive(Debug, thiserror::Error)]
pub enum MotorError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("driver board error: {0}")]
    Board(#[from] super::board::BoardError),

    #[error("power {requested:+.2} outside ±{limit:.2}")]
    PowerOutOfBounds { requested: f64, limit: f64 },

    #[error("sign-reversing power jump {current:+.2} -> {requested:+.2}")]
    PowerJump { current: f64, requested: f64 },

    #[error("{side} motor power unreadable after {attempts} attempts")]
    PowerUnavailable { side: Side, attempts: u32 },
}

/// One side's motor: safety-checked power primitive plus shared telemetry.
///
/// All mutable state lives in atomics so the control loop, the encoder
/// callback, and external callers (emergency stop, status queries) can share
/// one `Arc<Motor>` across tasks. Only one control path may drive a motor at
/// a time; that invariant rests with the caller.
pub struct Motor {
    side: Side,
    board: SharedBoard,
    steps: Arc<AtomicI64>,
    velocity: Arc<AtomicF64>,
    max_velocity: Arc<AtomicF64>,
    // last commanded logical power plus monotonic-max trackers
    last_power: AtomicF64,
    max_power: AtomicF64,
    max_driving_power: AtomicF64,
    max_power_ratio: AtomicF64,
    max_power_limit: f64,
    accel_delay: Duration,
    read_policy: PowerReadPolicy,
    interrupted: AtomicBool,
}

impl Motor {
    /// Build a motor for one side and attach its encoder to the shared
    /// board. Fails immediately on invalid configuration or a missing
    /// encoder; there is no partially-constructed motor.
    pub fn new(cfg: &MotorsConfig, board: SharedBoard, side: Side) -> Result<Arc<Self>, MotorError> {
        cfg.validate()?;

        // in case something is wired up backwards
        let side = if cfg.reverse_motor_orientation {
            side.opposite()
        } else {
            side
        };
        if cfg.reverse_motor_orientation && cfg.reverse_encoder_orientation {
            warn!("both reversal flags set; the two sign flips may cancel out");
        }

        let steps = Arc::new(AtomicI64::new(0));
        let velocity = Arc::new(AtomicF64::new(0.0));
        let max_velocity = Arc::new(AtomicF64::new(0.0));

        let (pin_a, pin_b) = match side {
            Side::Port => (cfg.encoder_a1_port, cfg.encoder_b1_port),
            Side::Starboard => (cfg.encoder_a2_stbd, cfg.encoder_b2_stbd),
        };
        let counter = EncoderCounter::new(steps.clone(), side, cfg.reverse_encoder_orientation);
        let estimator = VelocityEstimator::new(
            velocity.clone(),
            max_velocity.clone(),
            cfg.sample_rate,
            cfg.velocity_fudge_factor,
        );
        board
            .lock()
            .attach_encoder(pin_a, pin_b, pulse_handler(counter, estimator))?;
        info!("{} motor ready; encoder on pins {}/{}", side, pin_a, pin_b);

        Ok(Arc::new(Self {
            side,
            board,
            steps,
            velocity,
            max_velocity,
            last_power: AtomicF64::new(0.0),
            max_power: AtomicF64::new(0.0),
            max_driving_power: AtomicF64::new(0.0),
            max_power_ratio: AtomicF64::new(cfg.max_power_ratio()),
            max_power_limit: cfg.max_power_limit,
            accel_delay: Duration::from_secs_f64(cfg.accel_loop_delay_sec),
            read_policy: cfg.power_read_policy,
            interrupted: AtomicBool::new(false),
        }))
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn steps(&self) -> i64 {
        self.steps.load(Ordering::Relaxed)
    }

    pub fn velocity(&self) -> f64 {
        self.velocity.load()
    }

    pub fn max_velocity(&self) -> f64 {
        self.max_velocity.load()
    }

    /// Last logical power this actuator commanded.
    pub fn last_power(&self) -> f64 {
        self.last_power.load()
    }

    pub fn max_power(&self) -> f64 {
        self.max_power.load()
    }

    pub fn max_driving_power(&self) -> f64 {
        self.max_driving_power.load()
    }

    pub fn set_max_power_ratio(&self, ratio: f64) {
        self.max_power_ratio.store(ratio);
    }

    pub fn max_power_ratio(&self) -> f64 {
        self.max_power_ratio.load()
    }

    #[cfg(test)]
    pub(crate) fn force_velocity(&self, velocity: f64) {
        self.velocity.store(velocity);
    }

    /// Best-effort read of the board's reported power in logical units,
    /// degrading to 0.0 when the board has no reading. Used for bookkeeping
    /// where an unpowered default is safe.
    async fn read_power_or_zero(&self) -> Result<f64, MotorError> {
        let value = read_power(&self.board, self.side, POWER_READ_ATTEMPTS, POWER_READ_DELAY).await?;
        match value {
            Some(driving) => Ok(driving / self.max_power_ratio.load()),
            None => {
                warn!("{} power unreadable; assuming zero", self.side);
                Ok(0.0)
            }
        }
    }

    /// The board's reported power in logical units, subject to the
    /// configured read policy once the retry budget is exhausted.
    pub async fn current_power(&self) -> Result<f64, MotorError> {
        let value = read_power(&self.board, self.side, POWER_READ_ATTEMPTS, POWER_READ_DELAY).await?;
        match value {
            Some(driving) => Ok(driving / self.max_power_ratio.load()),
            None => match self.read_policy {
                PowerReadPolicy::AssumeZero => {
                    warn!("{} power unreadable; assuming zero", self.side);
                    Ok(0.0)
                }
                PowerReadPolicy::Fail => Err(MotorError::PowerUnavailable {
                    side: self.side,
                    attempts: POWER_READ_ATTEMPTS,
                }),
            },
        }
    }

    /// Command a logical power level.
    ///
    /// Rejects levels beyond the power ceiling and sign-reversing jumps
    /// larger than [`POWER_JUMP_LIMIT`], leaving motor state unchanged; the
    /// caller may retry with a corrected value or ramp through zero.
    pub async fn set_power(&self, level: f64) -> Result<(), MotorError> {
        if level.abs() > POWER_LIMIT {
            warn!("{} power {:+.2} rejected: outside ±{:.2}", self.side, level, POWER_LIMIT);
            return Err(MotorError::PowerOutOfBounds {
                requested: level,
                limit: POWER_LIMIT,
            });
        }
        let current = self.read_power_or_zero().await?;
        let reversing = (current > 0.0 && level < 0.0) || (current < 0.0 && level > 0.0);
        if reversing && (current - level).abs() > POWER_JUMP_LIMIT {
            warn!(
                "{} power jump {:+.2} -> {:+.2} rejected; ramp through zero instead",
                self.side, current, level
            );
            return Err(MotorError::PowerJump {
                current,
                requested: level,
            });
        }

        let driving = level * self.max_power_ratio.load();
        self.max_power.fetch_max(level.abs());
        self.max_driving_power.fetch_max(driving.abs());
        debug!("{} power {:+.3} (driving {:+.3})", self.side, level, driving);
        self.board.lock().set_motor_power(self.side, driving)?;
        self.last_power.store(level);
        Ok(())
    }

    /// Immediate zero-power command, bypassing all ramp logic.
    pub fn stop(&self) -> Result<(), MotorError> {
        info!("{} stop", self.side);
        self.board.lock().set_motor_power(self.side, 0.0)?;
        self.last_power.store(0.0);
        Ok(())
    }

    /// Open-loop ramp toward `speed` (-100..100), stepping by the profile's
    /// ratio once per acceleration tick. This is the non-PID path behind
    /// `ahead`/`astern`/`halt`/`brake`.
    pub async fn ramp_to(&self, speed: f64, profile: SlewProfile) -> Result<(), MotorError> {
        // a stale interrupt from an earlier run must not truncate this ramp
        self.reset_interrupt();
        let target = (speed / 100.0).clamp(-self.max_power_limit, self.max_power_limit);
        // the ramp needs a definite starting point; an unreadable board
        // fails here under the strict read policy
        let mut level = self.current_power().await?;
        debug!(
            "{} ramping {:+.3} -> {:+.3} at {:.3}/tick",
            self.side,
            level,
            target,
            profile.ratio()
        );
        if level == target {
            return Ok(());
        }
        let step = if level < target {
            profile.ratio()
        } else {
            -profile.ratio()
        };
        let mut rate = Rate::with_period(self.accel_delay);
        loop {
            level += step;
            if (step > 0.0 && level > target) || (step < 0.0 && level < target) {
                level = target;
            }
            if let Err(e) = self.set_power(level).await {
                warn!("{} ramp step rejected: {}", self.side, e);
            }
            if self.is_interrupted() || level == target {
                break;
            }
            rate.wait().await;
        }
        // be sure we are entirely powered off
        if target == 0.0 && self.last_power.load().abs() > 1e-5 {
            self.stop()?;
        }
        Ok(())
    }

    /// Ramp ahead to `speed` (0..100).
    pub async fn ahead(&self, speed: f64) -> Result<(), MotorError> {
        self.ramp_to(speed, SlewProfile::Normal).await
    }

    /// Ramp astern to `speed` (0..100).
    pub async fn astern(&self, speed: f64) -> Result<(), MotorError> {
        self.ramp_to(-speed, SlewProfile::Normal).await
    }

    /// Quickly (but not immediately) decelerate to zero.
    pub async fn halt(&self) -> Result<(), MotorError> {
        info!("{} halting", self.side);
        self.ramp_to(0.0, SlewProfile::Fast).await
    }

    /// Slowly coast to a stop.
    pub async fn brake(&self) -> Result<(), MotorError> {
        info!("{} braking", self.side);
        self.ramp_to(0.0, SlewProfile::Slower).await
    }

    pub async fn is_in_motion(&self) -> bool {
        self.read_power_or_zero().await.map(|p| p != 0.0).unwrap_or(false)
    }

    pub async fn is_stopped(&self) -> bool {
        !self.is_in_motion().await
    }

    /// Cooperative cancellation: active loops notice the flag at their next
    /// tick boundary.
    pub fn interrupt(&self) {
        self.interrupted.store(true, Ordering::Relaxed);
    }

    pub fn reset_interrupt(&self) {
        self.interrupted.store(false, Ordering::Relaxed);
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::Relaxed)
    }

    /// Log peak telemetry and power off.
    pub fn close(&self) -> Result<(), MotorError> {
        info!(
            "{} closing; max velocity {:.2}, max power {:.2}, max driving power {:.2}",
            self.side,
            self.max_velocity.load(),
            self.max_power.load(),
            self.max_driving_power.load()
        );
        self.stop()
    }
}
