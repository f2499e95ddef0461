// Motor and PID configuration
//
// These structs are consumed, not owned, by the drive core: an external
// loader (file, service, test harness) produces them, typically through
// serde. Defaults match the reference robot's wiring and tuning.

use serde::Deserialize;

// Default GPIO pins for the quadrature encoders (A1/B1 port, A2/B2 stbd)
pub const ENCODER_A1_PORT: u8 = 22;
pub const ENCODER_B1_PORT: u8 = 17;
pub const ENCODER_A2_STBD: u8 = 27;
pub const ENCODER_B2_STBD: u8 = 18;

/// What `current_power` does when the board never produces a reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerReadPolicy {
    /// Treat the motor as unpowered. Safe for bookkeeping, but can mask a
    /// disconnected driver board.
    #[default]
    AssumeZero,
    /// Fail the calling operation.
    Fail,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MotorsConfig {
    /// Swap which physical motor is considered port vs starboard.
    pub reverse_motor_orientation: bool,
    /// Invert the encoder step sign on both sides.
    pub reverse_encoder_orientation: bool,
    pub encoder_a1_port: u8,
    pub encoder_b1_port: u8,
    pub encoder_a2_stbd: u8,
    pub encoder_b2_stbd: u8,
    /// Pulses per velocity sample window.
    pub sample_rate: i64,
    /// Divisor mapping raw steps-per-second onto the 0-100 velocity scale.
    pub velocity_fudge_factor: f64,
    /// Ceiling for open-loop ramp targets, at most 1.0.
    pub max_power_limit: f64,
    /// Tick period of the open-loop acceleration ramp.
    pub accel_loop_delay_sec: f64,
    /// Battery voltage feeding the driver board.
    pub battery_voltage: f64,
    /// Rated motor voltage; with battery voltage this fixes the
    /// logical-power to driving-power ratio.
    pub motor_voltage: f64,
    pub power_read_policy: PowerReadPolicy,
    pub pid: PidConfig,
}

impl Default for MotorsConfig {
    fn default() -> Self {
        Self {
            reverse_motor_orientation: false,
            reverse_encoder_orientation: false,
            encoder_a1_port: ENCODER_A1_PORT,
            encoder_b1_port: ENCODER_B1_PORT,
            encoder_a2_stbd: ENCODER_A2_STBD,
            encoder_b2_stbd: ENCODER_B2_STBD,
            sample_rate: 10,
            velocity_fudge_factor: 14.0,
            max_power_limit: 1.0,
            accel_loop_delay_sec: 0.10,
            battery_voltage: 19.2,
            motor_voltage: 9.0,
            power_read_policy: PowerReadPolicy::default(),
            pid: PidConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PidConfig {
    pub enable_slew: bool,
    /// Symmetric clamp on the raw PID output per tick.
    pub clip_limit: f64,
    pub enable_p: bool,
    pub enable_i: bool,
    pub enable_d: bool,
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    pub sample_freq_hz: u32,
}

impl Default for PidConfig {
    fn default() -> Self {
        Self {
            enable_slew: true,
            clip_limit: 1.0,
            enable_p: true,
            enable_i: true,
            enable_d: true,
            kp: 0.095,
            ki: 0.000_33,
            kd: 0.017_5,
            sample_freq_hz: 20,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("max_power_limit {0} exceeds 1.0")]
    PowerLimitTooHigh(f64),

    #[error("sample_rate must be positive, got {0}")]
    BadSampleRate(i64),

    #[error("velocity_fudge_factor must be positive, got {0}")]
    BadFudgeFactor(f64),

    #[error("accel_loop_delay_sec must be positive, got {0}")]
    BadAccelDelay(f64),

    #[error("pid sample_freq_hz must be positive")]
    BadSampleFreq,

    #[error("battery voltage {battery:.1}V below motor voltage {motor:.1}V")]
    BatteryTooLow { battery: f64, motor: f64 },
}

impl MotorsConfig {
    /// Validate the configuration. Motor construction fails immediately on
    /// the first violation; there is no partially-constructed state.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_power_limit > 1.0 {
            return Err(ConfigError::PowerLimitTooHigh(self.max_power_limit));
        }
        if self.sample_rate <= 0 {
            return Err(ConfigError::BadSampleRate(self.sample_rate));
        }
        if self.velocity_fudge_factor <= 0.0 {
            return Err(ConfigError::BadFudgeFactor(self.velocity_fudge_factor));
        }
        if self.accel_loop_delay_sec <= 0.0 {
            return Err(ConfigError::BadAccelDelay(self.accel_loop_delay_sec));
        }
        if self.pid.sample_freq_hz == 0 {
            return Err(ConfigError::BadSampleFreq);
        }
        if self.battery_voltage < self.motor_voltage {
            return Err(ConfigError::BatteryTooLow {
                battery: self.battery_voltage,
                motor: self.motor_voltage,
            });
        }
        Ok(())
    }

    /// Ratio scaling logical power into driving power, capped at 1.0 when
    /// the battery sags to the motor voltage.
    pub fn max_power_ratio(&self) -> f64 {
        if self.motor_voltage >= self.battery_voltage {
            1.0
        } else {
            self.motor_voltage / self.battery_voltage
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        MotorsConfig::default().validate().unwrap();
    }

    #[test]
    fn test_power_limit_capped() {
        let cfg = MotorsConfig {
            max_power_limit: 1.2,
            ..Default::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::PowerLimitTooHigh(_))
        ));
    }

    #[test]
    fn test_low_battery_is_fatal() {
        let cfg = MotorsConfig {
            battery_voltage: 8.0,
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::BatteryTooLow { .. })));
    }

    #[test]
    fn test_power_ratio() {
        let cfg = MotorsConfig::default();
        assert!((cfg.max_power_ratio() - 9.0 / 19.2).abs() < 1e-12);

        let even = MotorsConfig {
            battery_voltage: 9.0,
            ..Default::default()
        };
        assert_eq!(even.max_power_ratio(), 1.0);
    }

    #[test]
    fn test_deserialize_partial_json() {
        let cfg: MotorsConfig = serde_json::from_str(
            r#"{ "sample_rate": 20, "pid": { "kp": 0.2, "enable_d": false } }"#,
        )
        .unwrap();
        assert_eq!(cfg.sample_rate, 20);
        assert_eq!(cfg.pid.kp, 0.2);
        assert!(!cfg.pid.enable_d);
        assert!(cfg.pid.enable_p);
    }

    #[test]
    fn test_read_policy_parses() {
        let cfg: MotorsConfig =
            serde_json::from_str(r#"{ "power_read_policy": "fail" }"#).unwrap();
        assert_eq!(cfg.power_read_policy, PowerReadPolicy::Fail);
    }
}
