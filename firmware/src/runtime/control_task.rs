use defmt::info;
use flight_core::controller::FlightController;
use flight_core::models::{BallisticForecaster, RateIntegrator};

use crate::hw::EmbassyClock;
use crate::hw::imu::Mpu6050;
use crate::hw::motor::HBridge;
use crate::hw::panel::{SafetyPlug, VoltageLed};
use crate::hw::ping::PingPair;
use crate::status;
use crate::telemetry::FlightTelemetry;

pub type FirmwareController = FlightController<
    EmbassyClock,
    FlightTelemetry,
    Mpu6050<'static>,
    PingPair<'static>,
    RateIntegrator,
    BallisticForecaster,
    HBridge<'static>,
    VoltageLed<'static>,
    SafetyPlug<'static>,
>;

/// Runs the loop to completion, then parks. The loop never yields, so this
/// task owns the executor for the whole experiment.
#[embassy_executor::task]
#[allow(clippy::unused_async)]
pub async fn run(controller: &'static mut FirmwareController) -> ! {
    let reason = controller.run_observed(status::publish);
    let published = status::published();
    info!(
        "experiment halted: {} after {} iterations",
        defmt::Display2Format(&reason),
        published.iterations
    );

    loop {
        cortex_m::asm::wfi();
    }
}
