//! Board bindings for the flight controller.
//!
//! Pin map on the STM32G0B1:
//!
//! | signal                         | pin              |
//! |--------------------------------|------------------|
//! | motor INA / INB / enable       | PB4 / PB5 / PB3  |
//! | capacitor sense (÷3)           | PA0 (ADC1)       |
//! | voltage-OK LED                 | PA5              |
//! | safety plug source / terminal  | PB8 / PB9        |
//! | ping up-facing / down-facing   | PA6 / PA7        |
//! | IMU on I2C1 SCL / SDA          | PB6 / PB7        |
//!
//! Conversions live in host-testable modules; the drivers only compile for
//! the MCU.

pub mod attitude;
pub mod signals;

#[cfg(target_os = "none")]
pub mod imu;
#[cfg(target_os = "none")]
pub mod motor;
#[cfg(target_os = "none")]
pub mod panel;
#[cfg(target_os = "none")]
pub mod ping;

#[cfg(target_os = "none")]
pub use clock::{EmbassyClock, now_millis};

#[cfg(target_os = "none")]
mod clock {
    use embassy_time::{Duration, Instant, block_for};
    use flight_core::time::{Clock, Millis};

    /// Milliseconds since boot, pinned at `u32::MAX` rather than wrapping.
    pub fn now_millis() -> Millis {
        Millis::new(u32::try_from(Instant::now().as_millis()).unwrap_or(u32::MAX))
    }

    /// Embassy time driver as the loop clock. Delays block the executor.
    pub struct EmbassyClock;

    impl Clock for EmbassyClock {
        fn now(&mut self) -> Millis {
            now_millis()
        }

        fn delay(&mut self, duration: Millis) {
            block_for(Duration::from_millis(u64::from(duration.as_u32())));
        }
    }
}
