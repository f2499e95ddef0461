// Motor control stack for the differential base
//
// Provides:
// - The hardware boundary trait and a simulated board behind it
// - Encoder decoding and velocity estimation
// - The per-side motor actuator with its power safety checks
// - The PID velocity loop and step-goal runner above it

mod atomic;
pub mod actuator;
pub mod board;
pub mod encoder;
pub mod pid;
pub mod sim;
pub mod slew;
pub mod stepper;
pub mod velocity;

pub use actuator::{Motor, MotorError, POWER_JUMP_LIMIT, POWER_LIMIT};
pub use board::{BoardError, MotorBoard, PulseCallback, SharedBoard};
pub use pid::{PidController, StepOutcome};
pub use sim::SimBoard;
pub use stepper::StepController;
pub use velocity::{Direction, Side, SlewProfile, Velocity};
