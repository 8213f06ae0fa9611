//! Capability traits the control loop consumes.
//!
//! The controller never touches pins, buses, or numerical models directly.
//! Production builds bind these traits to real drivers, the emulator binds them
//! to a simulated drop, and tests bind them to deterministic fakes. Each trait
//! ships a `Noop*` implementation for collaborators a target does not have.

use core::fmt;

use crate::time::Millis;

/// Body-frame angular rate in rad/s.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct AngularRate {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl AngularRate {
    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Magnitude of the rate vector.
    #[must_use]
    pub fn norm(self) -> f32 {
        libm::sqrtf(self.x * self.x + self.y * self.y + self.z * self.z)
    }
}

/// Unit attitude quaternion.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Quaternion {
    pub w: f32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Quaternion {
    pub const IDENTITY: Self = Self::new(1.0, 0.0, 0.0, 0.0);

    #[must_use]
    pub const fn new(w: f32, x: f32, y: f32, z: f32) -> Self {
        Self { w, x, y, z }
    }

    /// Rotation of `angle_deg` about the body x axis.
    #[must_use]
    pub fn about_x(angle_deg: f32) -> Self {
        let half = angle_deg.to_radians() * 0.5;
        Self::new(libm::cosf(half), libm::sinf(half), 0.0, 0.0)
    }

    /// Hamilton product `self * rhs`.
    #[must_use]
    pub fn mul(self, rhs: Self) -> Self {
        Self {
            w: self.w * rhs.w - self.x * rhs.x - self.y * rhs.y - self.z * rhs.z,
            x: self.w * rhs.x + self.x * rhs.w + self.y * rhs.z - self.z * rhs.y,
            y: self.w * rhs.y - self.x * rhs.z + self.y * rhs.w + self.z * rhs.x,
            z: self.w * rhs.z + self.x * rhs.y - self.y * rhs.x + self.z * rhs.w,
        }
    }

    /// Returns the quaternion scaled to unit length, or identity when degenerate.
    #[must_use]
    pub fn normalized(self) -> Self {
        let norm = libm::sqrtf(self.w * self.w + self.x * self.x + self.y * self.y + self.z * self.z);
        if !norm.is_finite() || norm <= f32::EPSILON {
            return Self::IDENTITY;
        }
        Self::new(self.w / norm, self.x / norm, self.y / norm, self.z / norm)
    }

    /// Rotates by `rate` held for `span_ms`, which may be negative.
    #[must_use]
    pub fn rotated(self, rate: AngularRate, span_ms: f32) -> Self {
        let magnitude = rate.norm();
        if magnitude <= f32::EPSILON {
            return self;
        }

        let half = magnitude * span_ms / 1_000.0 * 0.5;
        let scale = libm::sinf(half) / magnitude;
        let delta = Self::new(libm::cosf(half), rate.x * scale, rate.y * scale, rate.z * scale);
        self.mul(delta).normalized()
    }

    /// Signed zenith angle of the device reference axis in degrees, in (-180, 180].
    ///
    /// The reference axis is body z. Zero means the axis points along local
    /// vertical; the sign follows the rotation about body x.
    #[must_use]
    pub fn zenith_angle(self) -> f32 {
        let sin_term = 2.0 * (self.w * self.x + self.y * self.z);
        let cos_term = 1.0 - 2.0 * (self.x * self.x + self.y * self.y);
        let degrees = libm::atan2f(sin_term, cos_term).to_degrees();
        if degrees <= -180.0 { degrees + 360.0 } else { degrees }
    }
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Inertial measurement unit.
///
/// Readers return the values captured by the most recent [`sample`].
///
/// [`sample`]: InertialSensor::sample
pub trait InertialSensor {
    fn init(&mut self);

    /// Latches a fresh measurement.
    fn sample(&mut self);

    /// Acceleration magnitude in g.
    fn acceleration_magnitude(&self) -> f32;

    /// Zenith angle in degrees.
    fn zenith_angle(&self) -> f32;

    fn angular_rate(&self) -> AngularRate;

    fn orientation(&self) -> Quaternion;
}

/// Ultrasonic ranger selected by the acquisition phase.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum RangeDevice {
    #[default]
    None,
    /// Mounted at the device's 0° reference.
    UpFacing,
    /// Mounted at 180°.
    DownFacing,
}

impl RangeDevice {
    /// Numeric code written to the `DistDevice` telemetry field.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            RangeDevice::None => 0,
            RangeDevice::UpFacing => 1,
            RangeDevice::DownFacing => 2,
        }
    }
}

impl fmt::Display for RangeDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RangeDevice::None => f.write_str("none"),
            RangeDevice::UpFacing => f.write_str("up"),
            RangeDevice::DownFacing => f.write_str("down"),
        }
    }
}

/// Last measurement exported by a [`RangeFinder`].
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct RangeReading {
    pub device: RangeDevice,
    pub distance_m: f32,
}

/// Pair of ultrasonic rangers multiplexed behind one selector.
pub trait RangeFinder {
    fn init(&mut self);

    fn select_device(&mut self, device: RangeDevice);

    /// Measures with the selected device. A no-op when none is selected.
    fn sample(&mut self);

    /// Distance in metres from the most recent sample.
    fn distance(&self) -> f32;

    /// Active device together with its most recent distance.
    fn export(&self) -> RangeReading;
}

/// Integrates attitude forward from a seed state.
pub trait AttitudePropagator {
    /// Resets the integrator to `orientation` and `rate` at `t0`.
    fn seed(&mut self, t0: Millis, orientation: Quaternion, rate: AngularRate);

    /// Extends the internal time grid by `step`.
    fn advance(&mut self, step: Millis);

    /// Predicted zenith angle in degrees at absolute time `at`.
    fn zenith_angle(&self, at: Millis) -> f32;
}

/// Raw value the forecaster returns when no motor start time exists.
pub const FORECAST_FAILED: u32 = 0;

/// Translates the forecaster's raw sentinel into an optional start time.
#[must_use]
pub const fn motor_start_from_raw(raw: u32) -> Option<Millis> {
    if raw == FORECAST_FAILED {
        None
    } else {
        Some(Millis::new(raw))
    }
}

/// Impact prediction model fed during distance acquisition.
pub trait ImpactForecaster {
    fn init(&mut self);

    /// Records a distance observation `elapsed` after fall detection.
    fn add_sample(&mut self, elapsed: Millis, distance_m: f32);

    /// Impact time relative to fall detection.
    fn predict_impact_time(&self) -> Millis;

    /// Absolute motor start time for an impact at `impact_at` with the device
    /// oriented at `angle_deg`, or `None` when no start time can be derived.
    fn when_to_start_motor(&self, impact_at: Millis, angle_deg: f32) -> Option<Millis>;
}

/// Direction commanded to the corrective motor.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MotorPolarization {
    Forward,
    Backward,
}

impl MotorPolarization {
    /// Chooses the direction that rights the device from `angle_deg` at impact.
    #[must_use]
    pub fn for_impact_angle(angle_deg: f32) -> Self {
        if angle_deg < 0.0 {
            MotorPolarization::Forward
        } else {
            MotorPolarization::Backward
        }
    }
}

impl fmt::Display for MotorPolarization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MotorPolarization::Forward => f.write_str("forward"),
            MotorPolarization::Backward => f.write_str("backward"),
        }
    }
}

/// H-bridge driven corrective motor.
pub trait MotorDriver {
    fn init(&mut self);

    fn start_forward(&mut self);

    fn start_backward(&mut self);

    fn brake(&mut self);

    /// Supply voltage sensed at the motor driver input.
    fn input_voltage(&mut self) -> f32;

    /// Starts the motor in `polarization`.
    fn start(&mut self, polarization: MotorPolarization) {
        match polarization {
            MotorPolarization::Forward => self.start_forward(),
            MotorPolarization::Backward => self.start_backward(),
        }
    }
}

/// Binary power-OK indicator output.
pub trait PowerIndicator {
    fn set(&mut self, power_ok: bool);
}

/// Removable safety plug gating the exit from boot.
pub trait SafetyInterlock {
    fn init(&mut self);

    fn is_removed(&mut self) -> bool;
}

/// Sensor that reports a resting, upright device.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopInertialSensor;

impl NoopInertialSensor {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl InertialSensor for NoopInertialSensor {
    fn init(&mut self) {}

    fn sample(&mut self) {}

    fn acceleration_magnitude(&self) -> f32 {
        1.0
    }

    fn zenith_angle(&self) -> f32 {
        0.0
    }

    fn angular_rate(&self) -> AngularRate {
        AngularRate::default()
    }

    fn orientation(&self) -> Quaternion {
        Quaternion::IDENTITY
    }
}

/// Ranger that never measures anything.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopRangeFinder {
    device: RangeDevice,
}

impl NoopRangeFinder {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            device: RangeDevice::None,
        }
    }
}

impl RangeFinder for NoopRangeFinder {
    fn init(&mut self) {}

    fn select_device(&mut self, device: RangeDevice) {
        self.device = device;
    }

    fn sample(&mut self) {}

    fn distance(&self) -> f32 {
        0.0
    }

    fn export(&self) -> RangeReading {
        RangeReading {
            device: self.device,
            distance_m: 0.0,
        }
    }
}

/// Motor driver that performs no hardware interaction.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopMotorDriver;

impl NoopMotorDriver {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl MotorDriver for NoopMotorDriver {
    fn init(&mut self) {}

    fn start_forward(&mut self) {}

    fn start_backward(&mut self) {}

    fn brake(&mut self) {}

    fn input_voltage(&mut self) -> f32 {
        0.0
    }
}

/// Indicator with no backing output.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopPowerIndicator;

impl PowerIndicator for NoopPowerIndicator {
    fn set(&mut self, _: bool) {}
}

/// Interlock that reads as already removed.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopSafetyInterlock;

impl SafetyInterlock for NoopSafetyInterlock {
    fn init(&mut self) {}

    fn is_removed(&mut self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        let diff = a - b;
        diff < 1e-3 && diff > -1e-3
    }

    #[test]
    fn zenith_follows_rotation_about_x() {
        assert!(close(Quaternion::IDENTITY.zenith_angle(), 0.0));
        assert!(close(Quaternion::about_x(30.0).zenith_angle(), 30.0));
        assert!(close(Quaternion::about_x(-45.0).zenith_angle(), -45.0));
        assert!(close(Quaternion::about_x(170.0).zenith_angle(), 170.0));
        assert!(close(Quaternion::about_x(190.0).zenith_angle(), -170.0));
    }

    #[test]
    fn rotation_by_rate_matches_rotation_by_angle() {
        let rate = AngularRate::new(90.0_f32.to_radians(), 0.0, 0.0);
        let forward = Quaternion::about_x(10.0).rotated(rate, 500.0);
        let backward = Quaternion::about_x(10.0).rotated(rate, -200.0);

        let (forward, backward) = (forward.zenith_angle(), backward.zenith_angle());
        assert!(forward > 54.99 && forward < 55.01, "{forward}");
        assert!(backward > -8.01 && backward < -7.99, "{backward}");
        assert_eq!(Quaternion::IDENTITY.rotated(AngularRate::default(), 1e3), Quaternion::IDENTITY);
    }

    #[test]
    fn composed_rotations_add() {
        let q = Quaternion::about_x(100.0).mul(Quaternion::about_x(100.0));
        assert!(close(q.zenith_angle(), -160.0));
    }

    #[test]
    fn forecaster_sentinel_maps_to_none() {
        assert_eq!(motor_start_from_raw(FORECAST_FAILED), None);
        assert_eq!(motor_start_from_raw(420), Some(Millis::new(420)));
    }

    #[test]
    fn polarization_follows_angle_sign() {
        assert_eq!(
            MotorPolarization::for_impact_angle(-10.0),
            MotorPolarization::Forward
        );
        assert_eq!(
            MotorPolarization::for_impact_angle(10.0),
            MotorPolarization::Backward
        );
        assert_eq!(
            MotorPolarization::for_impact_angle(0.0),
            MotorPolarization::Backward
        );
    }

    #[test]
    fn motor_start_dispatches_on_polarization() {
        #[derive(Default)]
        struct Recorder {
            forward: u8,
            backward: u8,
        }

        impl MotorDriver for Recorder {
            fn init(&mut self) {}
            fn start_forward(&mut self) {
                self.forward += 1;
            }
            fn start_backward(&mut self) {
                self.backward += 1;
            }
            fn brake(&mut self) {}
            fn input_voltage(&mut self) -> f32 {
                0.0
            }
        }

        let mut motor = Recorder::default();
        motor.start(MotorPolarization::Forward);
        motor.start(MotorPolarization::Backward);
        motor.start(MotorPolarization::Backward);
        assert_eq!((motor.forward, motor.backward), (1, 2));
    }
}
