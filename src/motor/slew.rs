// First-order rate limiter shaping the PID target velocity
//
// Bounds how far the effective target may move from the current velocity in
// one control tick, so the PID loop chases a ramp rather than a step input.

use tracing::debug;

use super::velocity::SlewProfile;

/// Limits the per-tick change of a target velocity.
///
/// Must be started before a run; while disabled, [`SlewLimiter::shape`] is
/// the identity function. Shaping is derived from the measured current
/// velocity each tick, so the limiter carries no baseline of its own.
pub struct SlewLimiter {
    ratio: f64,
    enabled: bool,
}

impl SlewLimiter {
    pub fn new(profile: SlewProfile) -> Self {
        Self {
            ratio: profile.ratio(),
            enabled: false,
        }
    }

    /// Replace the rate limit with the given profile's ratio.
    pub fn set_profile(&mut self, profile: SlewProfile) {
        self.ratio = profile.ratio();
        debug!("slew rate limit set to {:.4}/tick", self.ratio);
    }

    /// Move the effective target toward `target` by at most the rate limit,
    /// measured from `current`. Sign-aware: works for deceleration and
    /// reverse targets alike.
    pub fn shape(&mut self, current: f64, target: f64) -> f64 {
        if !self.enabled {
            return target;
        }
        current + (target - current).clamp(-self.ratio, self.ratio)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn enable(&mut self) {
        self.enabled = true;
    }

    pub fn disable(&mut self) {
        self.enabled = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_is_identity() {
        let mut slew = SlewLimiter::new(SlewProfile::Normal);
        assert_eq!(slew.shape(0.0, 50.0), 50.0);
    }

    #[test]
    fn test_shape_bounded_by_ratio() {
        let mut slew = SlewLimiter::new(SlewProfile::Normal);
        slew.enable();
        let ratio = SlewProfile::Normal.ratio();
        // regardless of how far the target is, one call moves at most
        // `ratio` from the current velocity
        for (current, target) in [(0.0, 100.0), (10.0, -100.0), (-5.0, 5.0)] {
            let shaped = slew.shape(current, target);
            assert!((shaped - current).abs() <= ratio + 1e-12);
        }
    }

    #[test]
    fn test_shape_reaches_near_target() {
        let mut slew = SlewLimiter::new(SlewProfile::Fast);
        slew.enable();
        // when the target is within the rate limit, shape returns it exactly
        assert_eq!(slew.shape(10.0, 10.1), 10.1);
        assert_eq!(slew.shape(10.0, 9.95), 9.95);
    }

    #[test]
    fn test_shape_carries_no_history() {
        let mut slew = SlewLimiter::new(SlewProfile::Slow);
        slew.enable();
        let first = slew.shape(0.0, 50.0);
        // a large excursion in between must not affect later calls
        slew.shape(80.0, -80.0);
        assert_eq!(slew.shape(0.0, 50.0), first);
    }
}
