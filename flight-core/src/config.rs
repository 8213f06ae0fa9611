//! Mission configuration loaded once at boot.
//!
//! All thresholds and windows the state handlers consult live in
//! [`MissionConfig`]. The value is validated before the controller is built and
//! then travels with the mission context, so no handler reads ambient
//! constants.

use core::fmt;

use crate::time::Millis;

/// Acceleration magnitude below which the device is considered falling.
pub const DEFAULT_FREE_FALL_THRESHOLD_G: f32 = 0.3;
/// Acceleration magnitude above which ground contact is assumed.
pub const DEFAULT_RESTORED_THRESHOLD_G: f32 = 1.5;
/// Length of the ranging window that starts at fall detection.
pub const DEFAULT_ACQUISITION_WINDOW: Millis = Millis::new(300);
/// Half field-of-view of each ultrasonic ranger.
pub const DEFAULT_RANGER_HALF_FOV_DEG: f32 = 15.0;
/// Shortest motor run worth commanding.
pub const DEFAULT_MINIMAL_MOTOR_ACTIVITY: Millis = Millis::new(50);
/// Halt this long after fall detection.
pub const DEFAULT_WATCHDOG_POST_FALL: Millis = Millis::new(1_000);
/// Halt unconditionally once the clock reaches this value.
pub const DEFAULT_WATCHDOG_ABSOLUTE: Millis = Millis::from_secs(30);
/// Propagator step taken right after seeding.
pub const DEFAULT_SEED_STEP: Millis = Millis::new(2);
/// Propagator step taken while no ranger faces the ground.
pub const DEFAULT_IDLE_STEP: Millis = Millis::new(20);
/// Propagator step taken while a ranger is sampling.
pub const DEFAULT_SAMPLING_STEP: Millis = Millis::new(10);
/// Delay between safety plug polls during boot.
pub const DEFAULT_INTERLOCK_POLL_INTERVAL: Millis = Millis::new(500);
/// Motor supply voltage above which the power-OK indicator lights.
pub const DEFAULT_POWER_OK_VOLTS: f32 = 5.5;

/// Threshold and timing set consumed by the state handlers.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MissionConfig {
    pub free_fall_threshold_g: f32,
    pub restored_threshold_g: f32,
    pub acquisition_window: Millis,
    pub ranger_half_fov_deg: f32,
    pub minimal_motor_activity: Millis,
    pub watchdog_post_fall: Millis,
    pub watchdog_absolute: Millis,
    pub seed_step: Millis,
    pub idle_step: Millis,
    pub sampling_step: Millis,
    pub interlock_poll_interval: Millis,
    pub power_ok_volts: f32,
}

impl MissionConfig {
    /// Configuration flown by the reference hardware.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            free_fall_threshold_g: DEFAULT_FREE_FALL_THRESHOLD_G,
            restored_threshold_g: DEFAULT_RESTORED_THRESHOLD_G,
            acquisition_window: DEFAULT_ACQUISITION_WINDOW,
            ranger_half_fov_deg: DEFAULT_RANGER_HALF_FOV_DEG,
            minimal_motor_activity: DEFAULT_MINIMAL_MOTOR_ACTIVITY,
            watchdog_post_fall: DEFAULT_WATCHDOG_POST_FALL,
            watchdog_absolute: DEFAULT_WATCHDOG_ABSOLUTE,
            seed_step: DEFAULT_SEED_STEP,
            idle_step: DEFAULT_IDLE_STEP,
            sampling_step: DEFAULT_SAMPLING_STEP,
            interlock_poll_interval: DEFAULT_INTERLOCK_POLL_INTERVAL,
            power_ok_volts: DEFAULT_POWER_OK_VOLTS,
        }
    }

    /// Checks the value set for internal consistency.
    ///
    /// The watchdog bounds are not compared against the acquisition and motor
    /// windows.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_positive(self.free_fall_threshold_g) {
            return Err(ConfigError::InvalidThreshold("free_fall_threshold_g"));
        }
        if !is_positive(self.restored_threshold_g) {
            return Err(ConfigError::InvalidThreshold("restored_threshold_g"));
        }
        if self.free_fall_threshold_g >= self.restored_threshold_g {
            return Err(ConfigError::ThresholdsInverted {
                free_fall_g: self.free_fall_threshold_g,
                restored_g: self.restored_threshold_g,
            });
        }
        if !is_positive(self.ranger_half_fov_deg) || self.ranger_half_fov_deg > 90.0 {
            return Err(ConfigError::FieldOfViewOutOfRange(self.ranger_half_fov_deg));
        }
        if !self.power_ok_volts.is_finite() {
            return Err(ConfigError::InvalidThreshold("power_ok_volts"));
        }

        let windows = [
            ("acquisition_window", self.acquisition_window),
            ("watchdog_post_fall", self.watchdog_post_fall),
            ("watchdog_absolute", self.watchdog_absolute),
            ("seed_step", self.seed_step),
            ("idle_step", self.idle_step),
            ("sampling_step", self.sampling_step),
            ("interlock_poll_interval", self.interlock_poll_interval),
        ];
        for (name, window) in windows {
            if window.is_zero() {
                return Err(ConfigError::ZeroDuration(name));
            }
        }

        Ok(())
    }

    /// Validates and returns the configuration.
    pub fn validated(self) -> Result<Self, ConfigError> {
        self.validate().map(|()| self)
    }
}

impl Default for MissionConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn is_positive(value: f32) -> bool {
    value.is_finite() && value > 0.0
}

/// Reason a [`MissionConfig`] was rejected.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum ConfigError {
    /// Threshold is non-finite or not strictly positive.
    InvalidThreshold(&'static str),
    /// Free-fall threshold must sit below the restored threshold.
    ThresholdsInverted { free_fall_g: f32, restored_g: f32 },
    /// Ranger half field-of-view must be in (0, 90] degrees.
    FieldOfViewOutOfRange(f32),
    /// Window, step, or watchdog bound configured as zero.
    ZeroDuration(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidThreshold(name) => write!(f, "{name} must be finite and > 0"),
            ConfigError::ThresholdsInverted {
                free_fall_g,
                restored_g,
            } => write!(
                f,
                "free-fall threshold {free_fall_g} g must be below restored threshold {restored_g} g"
            ),
            ConfigError::FieldOfViewOutOfRange(value) => {
                write!(f, "ranger half field-of-view {value} deg outside (0, 90]")
            }
            ConfigError::ZeroDuration(name) => write!(f, "{name} must be non-zero"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let config = MissionConfig::default();
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.watchdog_post_fall, Millis::new(1_000));
        assert_eq!(config.watchdog_absolute, Millis::new(30_000));
    }

    #[test]
    fn watchdog_shorter_than_windows_is_accepted() {
        let config = MissionConfig {
            watchdog_post_fall: Millis::new(10),
            acquisition_window: Millis::new(5_000),
            ..MissionConfig::default()
        };
        assert!(config.validated().is_ok());
    }

    #[test]
    fn rejects_inverted_thresholds() {
        let config = MissionConfig {
            free_fall_threshold_g: 2.0,
            ..MissionConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ThresholdsInverted { .. })
        ));
    }

    #[test]
    fn rejects_non_finite_and_zero_values() {
        let nan = MissionConfig {
            restored_threshold_g: f32::NAN,
            ..MissionConfig::default()
        };
        assert_eq!(
            nan.validate(),
            Err(ConfigError::InvalidThreshold("restored_threshold_g"))
        );

        let zero_step = MissionConfig {
            sampling_step: Millis::ZERO,
            ..MissionConfig::default()
        };
        assert_eq!(
            zero_step.validate(),
            Err(ConfigError::ZeroDuration("sampling_step"))
        );

        let wide = MissionConfig {
            ranger_half_fov_deg: 120.0,
            ..MissionConfig::default()
        };
        assert_eq!(
            wide.validate(),
            Err(ConfigError::FieldOfViewOutOfRange(120.0))
        );
    }
}
