// Differential-drive base runtime
//
// Encoder feedback, per-side velocity estimation, a PID velocity loop with
// slew-limited setpoints, and safety-checked motor power, composed into a
// two-motor base.

pub mod base;
pub mod config;
pub mod motor;
pub mod rate;
pub mod runtime;
