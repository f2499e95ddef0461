// Hardware boundary for the motor driver board
//
// The board exposes a raw set-power/get-power contract per side plus an
// encoder subscription primitive. Concrete bindings (I2C driver boards, the
// simulator in `sim.rs`) implement this trait; everything above it is
// hardware-agnostic.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::trace;

use super::velocity::Side;

/// Signed quadrature pulse callback, invoked from the board's interrupt
/// delivery context. Must be non-blocking and allocation-free.
pub type PulseCallback = Box<dyn FnMut(i32) + Send>;

/// Errors raised at the hardware boundary.
#[derive(Debug, thiserror::Error)]
pub enum BoardError {
    #[error("driver board not responding")]
    NotResponding,

    #[error("no encoder available on pins {pin_a}/{pin_b}")]
    NoEncoder { pin_a: u8, pin_b: u8 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Abstract motor driver board: one power channel per side.
pub trait MotorBoard: Send {
    /// Command a raw normalized power (-1.0..1.0) to one side's motor.
    fn set_motor_power(&mut self, side: Side, power: f64) -> Result<(), BoardError>;

    /// Read back the power the board reports for one side.
    ///
    /// Returns `None` while the board has no reading yet.
    fn motor_power(&mut self, side: Side) -> Result<Option<f64>, BoardError>;

    /// Subscribe to quadrature pulses on the given pin pair.
    fn attach_encoder(
        &mut self,
        pin_a: u8,
        pin_b: u8,
        callback: PulseCallback,
    ) -> Result<(), BoardError>;
}

/// The board handle shared by both motors. Held only for short, non-blocking
/// calls; never across an await point.
pub type SharedBoard = Arc<Mutex<dyn MotorBoard>>;

/// Retry budget for power read-back: the board answers `None` until its
/// first conversion completes.
pub const POWER_READ_ATTEMPTS: u32 = 20;
pub const POWER_READ_DELAY: Duration = Duration::from_millis(5);

/// Bounded-retry read of a side's reported power.
///
/// Polls up to `attempts` times with a short fixed delay between polls,
/// returning `Ok(None)` if the board never produced a reading. The delay is
/// a plain sleep; no lock is held while waiting.
pub async fn read_power(
    board: &SharedBoard,
    side: Side,
    attempts: u32,
    delay: Duration,
) -> Result<Option<f64>, BoardError> {
    for attempt in 0..attempts {
        let value = board.lock().motor_power(side)?;
        if let Some(power) = value {
            trace!("{} power read {:.3} on attempt {}", side, power, attempt + 1);
            return Ok(Some(power));
        }
        tokio::time::sleep(delay).await;
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motor::sim::SimBoard;

    #[tokio::test(start_paused = true)]
    async fn test_read_power_retries_through_warmup() {
        // the board needs 5 polls before it has a reading
        let board = SimBoard::shared_with_warmup(5);
        board.lock().set_motor_power(Side::Port, 0.25).unwrap();

        let value = read_power(&board, Side::Port, POWER_READ_ATTEMPTS, POWER_READ_DELAY)
            .await
            .unwrap();
        assert_eq!(value, Some(0.25));
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_power_exhausts_budget() {
        let board = SimBoard::shared_with_warmup(100);
        let value = read_power(&board, Side::Starboard, POWER_READ_ATTEMPTS, POWER_READ_DELAY)
            .await
            .unwrap();
        assert_eq!(value, None);
    }
}
