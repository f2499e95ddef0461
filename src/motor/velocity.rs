// Named setpoints and ramp profiles for the differential base
//
// Velocities are expressed on a 0-100 percentage-like scale rather than
// physical units; the PID loop closes over encoder-derived velocity on the
// same scale.

use std::fmt;

/// Which side of the base a motor sits on.
///
/// Nautical convention: port is the left side when facing forward,
/// starboard the right.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Port,
    Starboard,
}

impl Side {
    /// The opposite side, used when the motor wiring is reversed.
    pub fn opposite(self) -> Self {
        match self {
            Side::Port => Side::Starboard,
            Side::Starboard => Side::Port,
        }
    }

    /// Short label used in log output.
    pub fn label(self) -> &'static str {
        match self {
            Side::Port => "port",
            Side::Starboard => "stbd",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Direction of travel for a step-goal run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Reverse,
}

/// Named velocity setpoints, each mapping to a percentage magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Velocity {
    Stop,
    DeadSlow,
    Slow,
    Half,
    TwoThirds,
    ThreeQuarter,
    Full,
    Emergency,
    Maximum,
}

impl Velocity {
    /// The setpoint as a percentage of full velocity.
    pub fn percent(self) -> f64 {
        match self {
            Velocity::Stop => 0.0,
            Velocity::DeadSlow => 20.0,
            Velocity::Slow => 30.0,
            Velocity::Half => 50.0,
            Velocity::TwoThirds => 66.7,
            Velocity::ThreeQuarter => 75.0,
            Velocity::Full => 90.0,
            Velocity::Emergency => 100.0,
            // sorts above Emergency so the threshold table stays ordered
            Velocity::Maximum => 100.000001,
        }
    }

    /// Given a value between 0 and 100, return the nearest named setpoint
    /// strictly below it. Used for staged deceleration.
    pub fn get_slower_than(velocity: f64) -> Velocity {
        if velocity < Velocity::DeadSlow.percent() {
            Velocity::Stop
        } else if velocity < Velocity::Slow.percent() {
            Velocity::DeadSlow
        } else if velocity < Velocity::Half.percent() {
            Velocity::Slow
        } else if velocity < Velocity::TwoThirds.percent() {
            Velocity::Half
        } else if velocity < Velocity::ThreeQuarter.percent() {
            Velocity::TwoThirds
        } else if velocity < Velocity::Full.percent() {
            Velocity::ThreeQuarter
        } else {
            Velocity::Full
        }
    }
}

/// Ramp presets bounding how fast a shaped target may change per tick.
///
/// `ratio` is the maximum change per control tick; `pid_bias` is the
/// matching gain bias for PID runs using this profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SlewProfile {
    ExtremelySlow,
    VerySlow,
    Slower,
    Slow,
    Normal,
    Fast,
    VeryFast,
}

impl SlewProfile {
    pub fn ratio(self) -> f64 {
        match self {
            SlewProfile::ExtremelySlow => 0.0034,
            SlewProfile::VerySlow => 0.01,
            SlewProfile::Slower => 0.03,
            SlewProfile::Slow => 0.05,
            SlewProfile::Normal => 0.08,
            SlewProfile::Fast => 0.20,
            SlewProfile::VeryFast => 0.40,
        }
    }

    pub fn pid_bias(self) -> f64 {
        match self {
            SlewProfile::ExtremelySlow => 0.16,
            SlewProfile::VerySlow => 0.22,
            SlewProfile::Slower => 0.38,
            SlewProfile::Slow => 0.48,
            SlewProfile::Normal => 0.58,
            SlewProfile::Fast => 0.68,
            SlewProfile::VeryFast => 0.90,
        }
    }
}
