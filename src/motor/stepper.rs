// Step-goal orchestration over the PID controller
//
// Thin layer turning "move N steps that way at this speed" into a bounded
// PID run: computes the absolute step limit, then hands off to the loop.

use std::sync::Arc;

use super::actuator::{Motor, MotorError};
use super::pid::{PidController, StepOutcome};
use super::velocity::{Direction, SlewProfile, Velocity};
use crate::config::PidConfig;

pub struct StepController {
    pid: PidController,
}

impl StepController {
    pub fn new(cfg: &PidConfig, motor: Arc<Motor>) -> Self {
        Self {
            pid: PidController::new(cfg, motor),
        }
    }

    pub fn motor(&self) -> &Arc<Motor> {
        self.pid.motor()
    }

    pub fn pid_mut(&mut self) -> &mut PidController {
        &mut self.pid
    }

    /// Run a bounded motion: `steps` encoder steps in `direction`, chasing
    /// `target` velocity shaped by `profile`. Returns once the step goal is
    /// reached or the run is interrupted; inspect the outcome's step count
    /// for partial progress.
    pub async fn move_steps(
        &mut self,
        direction: Direction,
        steps: i64,
        target: Velocity,
        profile: SlewProfile,
    ) -> Result<StepOutcome, MotorError> {
        self.pid.set_step_limit(direction, steps);
        self.pid.step_to(target, direction, profile, || true).await
    }

    /// Unbounded velocity hold: runs until interrupted.
    pub async fn cruise(
        &mut self,
        direction: Direction,
        target: Velocity,
        profile: SlewProfile,
    ) -> Result<StepOutcome, MotorError> {
        self.pid.clear_step_limit();
        self.pid.step_to(target, direction, profile, || true).await
    }

    /// True while the current step goal has not been reached in the given
    /// direction.
    pub fn is_stepping(&self, direction: Direction) -> bool {
        self.pid.is_stepping(direction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MotorsConfig;
    use crate::motor::sim::SimBoard;
    use crate::motor::velocity::Side;
    use parking_lot::Mutex;
    use std::time::Duration;

    fn test_config() -> MotorsConfig {
        MotorsConfig {
            battery_voltage: 9.0,
            motor_voltage: 9.0,
            pid: PidConfig {
                enable_slew: false,
                enable_i: false,
                enable_d: false,
                kp: 0.002,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_move_steps_terminates_on_the_goal() {
        let cfg = test_config();
        let board = Arc::new(Mutex::new(SimBoard::new()));
        let motor = Motor::new(&cfg, board.clone(), Side::Starboard).unwrap();
        let mut stepper = StepController::new(&cfg.pid, motor.clone());

        // emit exactly 494 forward pulses, one every 5ms, while the run is
        // active; the goal is reached on the last one
        let pulse_board = board.clone();
        let feeder = tokio::spawn(async move {
            for _ in 0..494 {
                tokio::time::sleep(Duration::from_millis(5)).await;
                pulse_board.lock().pulse(Side::Starboard, 1, 1);
            }
        });

        let outcome = stepper
            .move_steps(Direction::Forward, 494, Velocity::Slow, SlewProfile::Normal)
            .await
            .unwrap();
        feeder.await.unwrap();

        assert_eq!(outcome.steps, 494);
        assert_eq!(motor.steps(), 494);
        assert!(!stepper.is_stepping(Direction::Forward));
    }

    #[tokio::test(start_paused = true)]
    async fn test_move_steps_reverse() {
        let cfg = test_config();
        let board = Arc::new(Mutex::new(SimBoard::new()));
        let motor = Motor::new(&cfg, board.clone(), Side::Starboard).unwrap();
        let mut stepper = StepController::new(&cfg.pid, motor.clone());

        let pulse_board = board.clone();
        let feeder = tokio::spawn(async move {
            for _ in 0..100 {
                tokio::time::sleep(Duration::from_millis(5)).await;
                pulse_board.lock().pulse(Side::Starboard, -1, 1);
            }
        });

        let outcome = stepper
            .move_steps(Direction::Reverse, 100, Velocity::DeadSlow, SlewProfile::Normal)
            .await
            .unwrap();
        feeder.await.unwrap();

        assert_eq!(outcome.steps, -100);
        assert!(!stepper.is_stepping(Direction::Reverse));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cruise_runs_until_interrupted() {
        let cfg = test_config();
        let board = Arc::new(Mutex::new(SimBoard::new()));
        let motor = Motor::new(&cfg, board.clone(), Side::Port).unwrap();
        let mut stepper = StepController::new(&cfg.pid, motor.clone());

        let interrupter = motor.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            interrupter.interrupt();
        });

        stepper
            .cruise(Direction::Forward, Velocity::Slow, SlewProfile::Normal)
            .await
            .unwrap();
        assert!(!motor.is_interrupted());
    }
}
