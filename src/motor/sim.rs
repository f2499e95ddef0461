// Simulated motor driver board
//
// Stands in for real driver hardware during development: stores commanded
// power per side, reports it back after a configurable warm-up, and feeds
// attached encoder callbacks either from injected pulses (tests) or from a
// crude power-proportional wheel model (demo runtime).

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::debug;

use super::board::{BoardError, MotorBoard, PulseCallback, SharedBoard};
use super::velocity::Side;
use crate::config::{ENCODER_A1_PORT, ENCODER_A2_STBD};

/// Simulated pulses per second at full power, roughly one wheel rotation
/// (494 steps) per second.
const PULSES_PER_UNIT_POWER: f64 = 494.0;

#[derive(Default)]
struct Channel {
    power: f64,
    residual: f64,
    callback: Option<PulseCallback>,
}

pub struct SimBoard {
    port: Channel,
    stbd: Channel,
    // reads report "no reading yet" until this many polls have happened
    warmup: u32,
}

impl SimBoard {
    pub fn new() -> Self {
        Self::with_warmup(0)
    }

    pub fn with_warmup(warmup: u32) -> Self {
        Self {
            port: Channel::default(),
            stbd: Channel::default(),
            warmup,
        }
    }

    /// A fresh board behind the shared handle both motors use.
    pub fn shared() -> SharedBoard {
        Arc::new(Mutex::new(Self::new()))
    }

    pub fn shared_with_warmup(warmup: u32) -> SharedBoard {
        Arc::new(Mutex::new(Self::with_warmup(warmup)))
    }

    fn channel(&mut self, side: Side) -> &mut Channel {
        match side {
            Side::Port => &mut self.port,
            Side::Starboard => &mut self.stbd,
        }
    }

    /// Deliver `count` quadrature pulses of the given sign to one side's
    /// encoder callback, one edge at a time.
    pub fn pulse(&mut self, side: Side, pulse: i32, count: u32) {
        if let Some(callback) = self.channel(side).callback.as_mut() {
            for _ in 0..count {
                callback(pulse);
            }
        }
    }

    /// Advance the wheel model by `dt`, emitting pulses proportional to the
    /// commanded power. The port encoder counts inverted relative to wheel
    /// rotation, matching the mirrored mounting on a real base.
    pub fn advance(&mut self, dt: Duration) {
        let secs = dt.as_secs_f64();
        Self::advance_channel(&mut self.port, Side::Port, secs);
        Self::advance_channel(&mut self.stbd, Side::Starboard, secs);
    }

    fn advance_channel(channel: &mut Channel, side: Side, secs: f64) {
        channel.residual += channel.power * PULSES_PER_UNIT_POWER * secs;
        let whole = channel.residual.trunc();
        channel.residual -= whole;
        let count = whole as i64;
        if count == 0 {
            return;
        }
        let pulse = if (count > 0) == (side == Side::Starboard) {
            1
        } else {
            -1
        };
        if let Some(callback) = channel.callback.as_mut() {
            for _ in 0..count.unsigned_abs() {
                callback(pulse);
            }
        }
    }
}

impl Default for SimBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl MotorBoard for SimBoard {
    fn set_motor_power(&mut self, side: Side, power: f64) -> Result<(), BoardError> {
        debug!("sim board: {} power set to {:+.3}", side, power);
        self.channel(side).power = power;
        Ok(())
    }

    fn motor_power(&mut self, side: Side) -> Result<Option<f64>, BoardError> {
        if self.warmup > 0 {
            self.warmup -= 1;
            return Ok(None);
        }
        Ok(Some(self.channel(side).power))
    }

    fn attach_encoder(
        &mut self,
        pin_a: u8,
        pin_b: u8,
        callback: PulseCallback,
    ) -> Result<(), BoardError> {
        let side = match pin_a {
            ENCODER_A1_PORT => Side::Port,
            ENCODER_A2_STBD => Side::Starboard,
            _ => return Err(BoardError::NoEncoder { pin_a, pin_b }),
        };
        debug!("sim board: encoder attached on pins {}/{} ({})", pin_a, pin_b, side);
        self.channel(side).callback = Some(callback);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ENCODER_B1_PORT, ENCODER_B2_STBD};
    use std::sync::atomic::{AtomicI32, Ordering};

    #[test]
    fn test_power_roundtrip() {
        let mut board = SimBoard::new();
        board.set_motor_power(Side::Port, 0.4).unwrap();
        assert_eq!(board.motor_power(Side::Port).unwrap(), Some(0.4));
        assert_eq!(board.motor_power(Side::Starboard).unwrap(), Some(0.0));
    }

    #[test]
    fn test_warmup_reads_are_empty() {
        let mut board = SimBoard::with_warmup(2);
        board.set_motor_power(Side::Port, 0.4).unwrap();
        assert_eq!(board.motor_power(Side::Port).unwrap(), None);
        assert_eq!(board.motor_power(Side::Port).unwrap(), None);
        assert_eq!(board.motor_power(Side::Port).unwrap(), Some(0.4));
    }

    #[test]
    fn test_advance_emits_pulses() {
        let mut board = SimBoard::new();
        let seen = Arc::new(AtomicI32::new(0));

        let port_seen = seen.clone();
        board
            .attach_encoder(
                ENCODER_A1_PORT,
                ENCODER_B1_PORT,
                Box::new(move |p| {
                    port_seen.fetch_add(p, Ordering::Relaxed);
                }),
            )
            .unwrap();
        let stbd_seen = Arc::new(AtomicI32::new(0));
        let stbd = stbd_seen.clone();
        board
            .attach_encoder(
                ENCODER_A2_STBD,
                ENCODER_B2_STBD,
                Box::new(move |p| {
                    stbd.fetch_add(p, Ordering::Relaxed);
                }),
            )
            .unwrap();

        board.set_motor_power(Side::Port, 0.5).unwrap();
        board.set_motor_power(Side::Starboard, 0.5).unwrap();
        board.advance(Duration::from_secs(1));

        // half power for one second is 247 pulses; the port encoder is
        // mirrored so its raw pulses run negative for forward rotation
        assert_eq!(seen.load(Ordering::Relaxed), -247);
        assert_eq!(stbd_seen.load(Ordering::Relaxed), 247);
    }

    #[test]
    fn test_unknown_pins_rejected() {
        let mut board = SimBoard::new();
        let result = board.attach_encoder(99, 98, Box::new(|_| {}));
        assert!(matches!(result, Err(BoardError::NoEncoder { .. })));
    }
}
