//! Single-wire ultrasonic rangers.
//!
//! Each sensor shares one pin for trigger and echo: a short high pulse starts a
//! ping, then the pin is released and the echo pulse width is timed.

use embassy_stm32::gpio::{Flex, Pull, Speed};
use embassy_time::{Duration, Instant, block_for};
use flight_core::capabilities::{RangeDevice, RangeFinder, RangeReading};

use super::signals::{ECHO_TIMEOUT_US, echo_to_metres};

const TRIGGER_SETTLE: Duration = Duration::from_micros(2);
const TRIGGER_PULSE: Duration = Duration::from_micros(5);
#[allow(clippy::cast_lossless)]
const ECHO_TIMEOUT: Duration = Duration::from_micros(ECHO_TIMEOUT_US as u64);

pub struct PingSensor<'d> {
    pin: Flex<'d>,
}

impl<'d> PingSensor<'d> {
    pub fn new(pin: Flex<'d>) -> Self {
        Self { pin }
    }

    /// Fires one ping and returns the distance, or 0 m without an echo.
    pub fn measure(&mut self) -> f32 {
        self.pin.set_as_output(Speed::Low);
        self.pin.set_low();
        block_for(TRIGGER_SETTLE);
        self.pin.set_high();
        block_for(TRIGGER_PULSE);
        self.pin.set_low();
        self.pin.set_as_input(Pull::None);

        let armed = Instant::now();
        while self.pin.is_low() {
            if armed.elapsed() > ECHO_TIMEOUT {
                return 0.0;
            }
        }

        let rise = Instant::now();
        while self.pin.is_high() {
            if rise.elapsed() > ECHO_TIMEOUT {
                return 0.0;
            }
        }

        let width = u32::try_from(rise.elapsed().as_micros()).unwrap_or(u32::MAX);
        echo_to_metres(width)
    }
}

/// Up- and down-facing sensors behind one [`RangeFinder`].
pub struct PingPair<'d> {
    up: PingSensor<'d>,
    down: PingSensor<'d>,
    device: RangeDevice,
    distance_m: f32,
}

impl<'d> PingPair<'d> {
    pub fn new(up: PingSensor<'d>, down: PingSensor<'d>) -> Self {
        Self {
            up,
            down,
            device: RangeDevice::None,
            distance_m: 0.0,
        }
    }
}

impl RangeFinder for PingPair<'_> {
    fn init(&mut self) {
        self.device = RangeDevice::None;
        self.distance_m = 0.0;
    }

    fn select_device(&mut self, device: RangeDevice) {
        self.device = device;
    }

    fn sample(&mut self) {
        self.distance_m = match self.device {
            RangeDevice::UpFacing => self.up.measure(),
            RangeDevice::DownFacing => self.down.measure(),
            RangeDevice::None => 0.0,
        };
    }

    fn distance(&self) -> f32 {
        self.distance_m
    }

    fn export(&self) -> RangeReading {
        RangeReading {
            device: self.device,
            distance_m: self.distance_m,
        }
    }
}
