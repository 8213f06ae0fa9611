//! MPU-6050 over blocking I2C.

use core::fmt;

use defmt::{Display2Format, warn};
use embassy_stm32::i2c::{self, I2c};
use embassy_stm32::mode::Blocking;
use flight_core::capabilities::{AngularRate, InertialSensor, Quaternion};

use super::attitude::{AttitudeEstimator, FRAME_LEN, Motion, decode_frame};
use super::now_millis;

const ADDRESS: u8 = 0x68;
const WHO_AM_I_VALUE: u8 = 0x68;

mod registers {
    pub const SMPLRT_DIV: u8 = 0x19;
    pub const CONFIG: u8 = 0x1A;
    pub const GYRO_CONFIG: u8 = 0x1B;
    pub const ACCEL_CONFIG: u8 = 0x1C;
    pub const ACCEL_XOUT_H: u8 = 0x3B;
    pub const PWR_MGMT_1: u8 = 0x6B;
    pub const WHO_AM_I: u8 = 0x75;

    /// Wake up on the X gyro PLL.
    pub const PWR_MGMT_1_CLKSEL_PLL_X: u8 = 0x01;
    /// 1 kHz internal rate, no divider.
    pub const SMPLRT_DIV_1KHZ: u8 = 0x00;
    /// 44 Hz low-pass on both sensors.
    pub const CONFIG_DLPF_44HZ: u8 = 0x03;
    pub const GYRO_CONFIG_500DPS: u8 = 0x08;
    pub const ACCEL_CONFIG_2G: u8 = 0x00;
}

#[derive(Debug)]
pub enum ImuError {
    Bus(i2c::Error),
    UnexpectedDevice(u8),
}

impl fmt::Display for ImuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImuError::Bus(err) => write!(f, "i2c error: {err:?}"),
            ImuError::UnexpectedDevice(id) => {
                write!(f, "unexpected WHO_AM_I {id:#04x}, expected {WHO_AM_I_VALUE:#04x}")
            }
        }
    }
}

impl From<i2c::Error> for ImuError {
    fn from(err: i2c::Error) -> Self {
        ImuError::Bus(err)
    }
}

pub struct Mpu6050<'d> {
    i2c: I2c<'d, Blocking>,
    motion: Motion,
    estimator: AttitudeEstimator,
}

impl<'d> Mpu6050<'d> {
    pub fn new(i2c: I2c<'d, Blocking>) -> Self {
        Self {
            i2c,
            motion: Motion::RESTING,
            estimator: AttitudeEstimator::new(),
        }
    }

    fn write_register(&mut self, register: u8, value: u8) -> Result<(), ImuError> {
        self.i2c.blocking_write(ADDRESS, &[register, value])?;
        Ok(())
    }

    fn read_register(&mut self, register: u8) -> Result<u8, ImuError> {
        let mut value = [0u8; 1];
        self.i2c
            .blocking_write_read(ADDRESS, &[register], &mut value)?;
        Ok(value[0])
    }

    fn configure(&mut self) -> Result<(), ImuError> {
        let id = self.read_register(registers::WHO_AM_I)?;
        if id != WHO_AM_I_VALUE {
            return Err(ImuError::UnexpectedDevice(id));
        }

        self.write_register(registers::PWR_MGMT_1, registers::PWR_MGMT_1_CLKSEL_PLL_X)?;
        self.write_register(registers::SMPLRT_DIV, registers::SMPLRT_DIV_1KHZ)?;
        self.write_register(registers::CONFIG, registers::CONFIG_DLPF_44HZ)?;
        self.write_register(registers::GYRO_CONFIG, registers::GYRO_CONFIG_500DPS)?;
        self.write_register(registers::ACCEL_CONFIG, registers::ACCEL_CONFIG_2G)
    }

    fn read_frame(&mut self) -> Result<[u8; FRAME_LEN], ImuError> {
        let mut frame = [0u8; FRAME_LEN];
        self.i2c
            .blocking_write_read(ADDRESS, &[registers::ACCEL_XOUT_H], &mut frame)?;
        Ok(frame)
    }
}

impl InertialSensor for Mpu6050<'_> {
    fn init(&mut self) {
        self.motion = Motion::RESTING;
        self.estimator = AttitudeEstimator::new();
        if let Err(err) = self.configure() {
            warn!("imu: init failed: {}", Display2Format(&err));
        }
    }

    // A failed read keeps the previous sample.
    fn sample(&mut self) {
        match self.read_frame() {
            Ok(frame) => {
                self.motion = decode_frame(&frame);
                self.estimator.update(&self.motion, now_millis());
            }
            Err(err) => warn!("imu: read failed: {}", Display2Format(&err)),
        }
    }

    fn acceleration_magnitude(&self) -> f32 {
        self.motion.acceleration_magnitude()
    }

    fn zenith_angle(&self) -> f32 {
        self.estimator.zenith_angle()
    }

    fn angular_rate(&self) -> AngularRate {
        self.motion.rate
    }

    fn orientation(&self) -> Quaternion {
        self.estimator.orientation()
    }
}
