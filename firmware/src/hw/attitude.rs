//! IMU frame decoding and on-board attitude tracking.
//!
//! While the accelerometer sees gravity the tilt is taken straight from it;
//! once the device is falling there is no gravity reference, so the estimate
//! is carried forward by integrating the gyro.

use flight_core::capabilities::{AngularRate, Quaternion};
use flight_core::time::Millis;

/// Accelerometer scale at the ±2 g range.
pub const ACCEL_LSB_PER_G: f32 = 16_384.0;

/// Gyro scale at the ±500 °/s range.
pub const GYRO_LSB_PER_DEG_PER_S: f32 = 65.5;

/// Burst read length starting at `ACCEL_XOUT_H`: accel, temperature, gyro.
pub const FRAME_LEN: usize = 14;

/// Below this magnitude the accelerometer is no longer a tilt reference.
const TILT_REFERENCE_MIN_G: f32 = 0.5;

/// One decoded accelerometer and gyro sample.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Motion {
    pub accel_g: [f32; 3],
    pub rate: AngularRate,
}

impl Motion {
    /// Device at rest and upright.
    pub const RESTING: Self = Self {
        accel_g: [0.0, 0.0, 1.0],
        rate: AngularRate::new(0.0, 0.0, 0.0),
    };

    #[must_use]
    pub fn acceleration_magnitude(&self) -> f32 {
        let [x, y, z] = self.accel_g;
        libm::sqrtf(x * x + y * y + z * z)
    }

    /// Rotation about body x implied by the gravity direction, in degrees.
    #[must_use]
    pub fn tilt_deg(&self) -> f32 {
        libm::atan2f(self.accel_g[1], self.accel_g[2]).to_degrees()
    }
}

fn word(frame: &[u8; FRAME_LEN], offset: usize) -> f32 {
    f32::from(i16::from_be_bytes([frame[offset], frame[offset + 1]]))
}

/// Decodes a big-endian burst read. The temperature words are skipped.
#[must_use]
pub fn decode_frame(frame: &[u8; FRAME_LEN]) -> Motion {
    let accel = |offset| word(frame, offset) / ACCEL_LSB_PER_G;
    let gyro = |offset| (word(frame, offset) / GYRO_LSB_PER_DEG_PER_S).to_radians();
    Motion {
        accel_g: [accel(0), accel(2), accel(4)],
        rate: AngularRate::new(gyro(8), gyro(10), gyro(12)),
    }
}

/// Tilt-from-gravity estimator with gyro hold-over during free fall.
#[derive(Copy, Clone, Debug, Default)]
pub struct AttitudeEstimator {
    orientation: Quaternion,
    last_at: Option<Millis>,
}

impl AttitudeEstimator {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            orientation: Quaternion::IDENTITY,
            last_at: None,
        }
    }

    pub fn update(&mut self, motion: &Motion, at: Millis) {
        if motion.acceleration_magnitude() >= TILT_REFERENCE_MIN_G {
            self.orientation = Quaternion::about_x(motion.tilt_deg());
        } else if let Some(last) = self.last_at {
            self.orientation = self
                .orientation
                .rotated(motion.rate, at.saturating_sub(last).as_f32());
        }
        self.last_at = Some(at);
    }

    #[must_use]
    pub const fn orientation(&self) -> Quaternion {
        self.orientation
    }

    #[must_use]
    pub fn zenith_angle(&self) -> f32 {
        self.orientation.zenith_angle()
    }
}
