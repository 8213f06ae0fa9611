use cortex_m::interrupt;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt::{error, info};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_stm32 as hal;
use embassy_stm32::adc::{Adc, AdcChannel};
use embassy_stm32::gpio::{Flex, Input, Level, Output, Pull, Speed};
use embassy_stm32::i2c::{self, I2c};
use flight_core::config::MissionConfig;
use flight_core::controller::{FlightController, Rig};
use flight_core::models::{BallisticForecaster, RateIntegrator};
use static_cell::StaticCell;

use crate::hw::EmbassyClock;
use crate::hw::imu::Mpu6050;
use crate::hw::motor::HBridge;
use crate::hw::panel::{SafetyPlug, VoltageLed};
use crate::hw::ping::{PingPair, PingSensor};
use crate::telemetry;

use control_task::FirmwareController;

mod control_task;

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                interrupt::enable();
            }
        }
    }
}

/// The telemetry cache makes the controller too large for the task arena.
static CONTROLLER: StaticCell<FirmwareController> = StaticCell::new();

#[embassy_executor::main]
pub async fn main(spawner: Spawner) {
    let config = hal::Config::default();
    let hal::Peripherals {
        PA0,
        PA5,
        PA6,
        PA7,
        PB3,
        PB4,
        PB5,
        PB6,
        PB7,
        PB8,
        PB9,
        ADC1,
        I2C1,
        ..
    } = hal::init(config);

    let motor = HBridge::new(
        Output::new(PB4, Level::Low, Speed::Low),
        Output::new(PB5, Level::Low, Speed::Low),
        Output::new(PB3, Level::Low, Speed::Low),
        Adc::new(ADC1),
        PA0.degrade_adc(),
    );
    let indicator = VoltageLed::new(Output::new(PA5, Level::Low, Speed::Low));
    let interlock = SafetyPlug::new(
        Output::new(PB8, Level::Low, Speed::Low),
        Input::new(PB9, Pull::Up),
    );
    let ranger = PingPair::new(PingSensor::new(Flex::new(PA6)), PingSensor::new(Flex::new(PA7)));
    let imu = Mpu6050::new(I2c::new_blocking(I2C1, PB6, PB7, i2c::Config::default()));

    let rig = Rig {
        clock: EmbassyClock,
        telemetry: telemetry::flight_telemetry(),
        imu,
        ranger,
        propagator: RateIntegrator::new(),
        forecaster: BallisticForecaster::new(),
        motor,
        indicator,
        interlock,
    };

    let controller = match FlightController::new(MissionConfig::new(), rig) {
        Ok(controller) => CONTROLLER.init(controller),
        Err(err) => {
            error!("mission config rejected: {}", defmt::Display2Format(&err));
            core::future::pending::<()>().await;
            return;
        }
    };
    info!("flight controller armed");

    spawner
        .spawn(control_task::run(controller))
        .expect("failed to spawn control task");

    core::future::pending::<()>().await;
}
