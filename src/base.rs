// Two-motor differential base
//
// Owns the port and starboard motors over one shared board handle and
// exposes the motion interface the arbitrator drives: open-loop ramps for
// continuous motion, PID step-goal runs for bounded motion, and the
// escalating stop ladder (brake, halt, stop). The two sides run their
// control loops independently; this layer only issues both calls and waits
// on both.

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::MotorsConfig;
use crate::motor::actuator::{Motor, MotorError};
use crate::motor::board::SharedBoard;
use crate::motor::pid::StepOutcome;
use crate::motor::stepper::StepController;
use crate::motor::velocity::{Direction, Side, SlewProfile, Velocity};

pub struct Base {
    board: SharedBoard,
    port: Arc<Motor>,
    stbd: Arc<Motor>,
    port_step: StepController,
    stbd_step: StepController,
}

impl Base {
    /// Construct both motors over the shared board handle. Fatal on invalid
    /// configuration or missing encoders; no partial base is ever returned.
    pub fn new(cfg: &MotorsConfig, board: SharedBoard) -> Result<Self, MotorError> {
        cfg.validate()?;
        info!(
            "battery {:.1}V, motors {:.1}V; max power ratio {:.3}",
            cfg.battery_voltage,
            cfg.motor_voltage,
            cfg.max_power_ratio()
        );
        let port = Motor::new(cfg, board.clone(), Side::Port)?;
        let stbd = Motor::new(cfg, board.clone(), Side::Starboard)?;
        let port_step = StepController::new(&cfg.pid, port.clone());
        let stbd_step = StepController::new(&cfg.pid, stbd.clone());
        info!("base ready");
        Ok(Self {
            board,
            port,
            stbd,
            port_step,
            stbd_step,
        })
    }

    pub fn motor(&self, side: Side) -> &Arc<Motor> {
        match side {
            Side::Port => &self.port,
            Side::Starboard => &self.stbd,
        }
    }

    /// Ramp both motors ahead to `speed` (0..100).
    pub async fn ahead(&self, speed: f64) -> Result<(), MotorError> {
        info!("ahead at {:.0}", speed);
        let (p, s) = tokio::join!(self.port.ahead(speed), self.stbd.ahead(speed));
        p.and(s)
    }

    /// Ramp both motors astern to `speed` (0..100).
    pub async fn astern(&self, speed: f64) -> Result<(), MotorError> {
        info!("astern at {:.0}", speed);
        let (p, s) = tokio::join!(self.port.astern(speed), self.stbd.astern(speed));
        p.and(s)
    }

    /// PID step-goal run ahead on both sides.
    pub async fn step_ahead(
        &mut self,
        target: Velocity,
        steps: i64,
        profile: SlewProfile,
    ) -> Result<(StepOutcome, StepOutcome), MotorError> {
        info!("step ahead {} steps at {:?}", steps, target);
        let (p, s) = tokio::join!(
            self.port_step
                .move_steps(Direction::Forward, steps, target, profile),
            self.stbd_step
                .move_steps(Direction::Forward, steps, target, profile),
        );
        Ok((p?, s?))
    }

    /// PID step-goal run astern on both sides.
    pub async fn step_astern(
        &mut self,
        target: Velocity,
        steps: i64,
        profile: SlewProfile,
    ) -> Result<(StepOutcome, StepOutcome), MotorError> {
        info!("step astern {} steps at {:?}", steps, target);
        let (p, s) = tokio::join!(
            self.port_step
                .move_steps(Direction::Reverse, steps, target, profile),
            self.stbd_step
                .move_steps(Direction::Reverse, steps, target, profile),
        );
        Ok((p?, s?))
    }

    /// True while either side's current step goal is unreached.
    pub fn is_stepping(&self, direction: Direction) -> bool {
        self.port_step.is_stepping(direction) || self.stbd_step.is_stepping(direction)
    }

    /// Stop both motors immediately, with no slewing.
    pub fn stop(&self) -> Result<(), MotorError> {
        info!("stopping");
        self.port.stop()?;
        self.stbd.stop()?;
        Ok(())
    }

    /// Quickly (but not immediately) stop both motors.
    pub async fn halt(&self) -> Result<(), MotorError> {
        info!("halting");
        let (p, s) = tokio::join!(self.port.halt(), self.stbd.halt());
        p.and(s)
    }

    /// Slowly coast both motors to a stop.
    pub async fn brake(&self) -> Result<(), MotorError> {
        info!("braking");
        let (p, s) = tokio::join!(self.port.brake(), self.stbd.brake());
        p.and(s)
    }

    /// Drop both sides one named setpoint, staging the deceleration.
    pub async fn slow_down(&self) -> Result<(), MotorError> {
        if !self.is_in_motion().await {
            warn!("not moving; cannot slow down");
            return Ok(());
        }
        let port_target = Velocity::get_slower_than(self.port.velocity().abs());
        let stbd_target = Velocity::get_slower_than(self.stbd.velocity().abs());
        info!(
            "slowing to {:?} (port) / {:?} (stbd)",
            port_target, stbd_target
        );
        let (p, s) = tokio::join!(
            self.port
                .ramp_to(port_target.percent() * self.port.last_power().signum(), SlewProfile::Fast),
            self.stbd
                .ramp_to(stbd_target.percent() * self.stbd.last_power().signum(), SlewProfile::Fast),
        );
        p.and(s)
    }

    pub async fn is_in_motion(&self) -> bool {
        let (p, s) = tokio::join!(self.port.is_in_motion(), self.stbd.is_in_motion());
        p || s
    }

    pub async fn is_stopped(&self) -> bool {
        !self.is_in_motion().await
    }

    pub fn steps(&self) -> (i64, i64) {
        (self.port.steps(), self.stbd.steps())
    }

    pub fn velocities(&self) -> (f64, f64) {
        (self.port.velocity(), self.stbd.velocity())
    }

    /// Interrupt any active loop on either motor.
    pub fn interrupt(&self) {
        self.port.interrupt();
        self.stbd.interrupt();
    }

    pub fn reset_interrupt(&self) {
        self.port.reset_interrupt();
        self.stbd.reset_interrupt();
    }

    /// Halt, then power everything off.
    pub async fn close(&self) -> Result<(), MotorError> {
        self.halt().await?;
        self.port.close()?;
        self.stbd.close()?;
        Ok(())
    }
}

impl Drop for Base {
    fn drop(&mut self) {
        // double-stop through the shared handle; last line of defense if
        // the base goes away mid-motion
        let mut board = self.board.lock();
        for side in [Side::Port, Side::Starboard] {
            if let Err(e) = board.set_motor_power(side, 0.0) {
                warn!("failed to stop {} motor on drop: {}", side, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motor::board::MotorBoard;
    use crate::motor::sim::SimBoard;
    use parking_lot::Mutex;

    fn test_config() -> MotorsConfig {
        MotorsConfig {
            battery_voltage: 9.0,
            motor_voltage: 9.0,
            ..Default::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_ahead_then_stop() {
        let base = Base::new(&test_config(), SimBoard::shared()).unwrap();
        base.ahead(30.0).await.unwrap();
        assert!(base.is_in_motion().await);
        assert!((base.motor(Side::Port).last_power() - 0.30).abs() < 1e-9);
        assert!((base.motor(Side::Starboard).last_power() - 0.30).abs() < 1e-9);

        base.stop().unwrap();
        assert!(base.is_stopped().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_halt_ramps_both_sides_to_zero() {
        let base = Base::new(&test_config(), SimBoard::shared()).unwrap();
        base.ahead(50.0).await.unwrap();
        base.halt().await.unwrap();
        assert_eq!(base.motor(Side::Port).last_power(), 0.0);
        assert_eq!(base.motor(Side::Starboard).last_power(), 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_down_steps_one_setpoint() {
        let base = Base::new(&test_config(), SimBoard::shared()).unwrap();
        base.ahead(50.0).await.unwrap();
        // pretend both sides settled a little below half velocity
        base.motor(Side::Port).force_velocity(45.0);
        base.motor(Side::Starboard).force_velocity(45.0);

        base.slow_down().await.unwrap();
        // just under HALF steps down to SLOW (30)
        assert!((base.motor(Side::Port).last_power() - 0.30).abs() < 1e-9);
        assert!((base.motor(Side::Starboard).last_power() - 0.30).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_issues_double_stop() {
        let board = Arc::new(Mutex::new(SimBoard::new()));
        {
            let base = Base::new(&test_config(), board.clone()).unwrap();
            base.motor(Side::Port).set_power(0.2).await.unwrap();
            base.motor(Side::Starboard).set_power(0.2).await.unwrap();
        }
        // dropping the base powered both sides off through the shared handle
        assert_eq!(board.lock().motor_power(Side::Port).unwrap(), Some(0.0));
        assert_eq!(board.lock().motor_power(Side::Starboard).unwrap(), Some(0.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_step_ahead_runs_both_goals() {
        let cfg = MotorsConfig {
            pid: crate::config::PidConfig {
                enable_slew: false,
                enable_i: false,
                enable_d: false,
                kp: 0.002,
                ..Default::default()
            },
            ..test_config()
        };
        let board = Arc::new(Mutex::new(SimBoard::new()));
        let mut base = Base::new(&cfg, board.clone()).unwrap();

        // feed both encoders: the port decoder runs inverted, so forward
        // motion is negative raw pulses on that side
        let feeder_board = board.clone();
        let feeder = tokio::spawn(async move {
            for _ in 0..50 {
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
                let mut b = feeder_board.lock();
                b.pulse(Side::Port, -1, 1);
                b.pulse(Side::Starboard, 1, 1);
            }
        });

        let (p, s) = base
            .step_ahead(Velocity::DeadSlow, 50, SlewProfile::Normal)
            .await
            .unwrap();
        feeder.await.unwrap();

        assert_eq!(p.steps, 50);
        assert_eq!(s.steps, 50);
        assert_eq!(base.steps(), (50, 50));
        assert!(!base.is_stepping(Direction::Forward));
    }
}
