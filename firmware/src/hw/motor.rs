//! H-bridge motor driver with capacitor voltage sense.

use embassy_stm32::adc::{Adc, AnyAdcChannel, SampleTime};
use embassy_stm32::gpio::Output;
use embassy_stm32::peripherals::ADC1;
use flight_core::capabilities::MotorDriver;

use super::signals::adc_to_volts;

pub struct HBridge<'d> {
    ina: Output<'d>,
    inb: Output<'d>,
    enable: Output<'d>,
    adc: Adc<'d, ADC1>,
    sense: AnyAdcChannel<ADC1>,
}

impl<'d> HBridge<'d> {
    pub fn new(
        ina: Output<'d>,
        inb: Output<'d>,
        enable: Output<'d>,
        mut adc: Adc<'d, ADC1>,
        sense: AnyAdcChannel<ADC1>,
    ) -> Self {
        adc.set_sample_time(SampleTime::CYCLES160_5);
        Self {
            ina,
            inb,
            enable,
            adc,
            sense,
        }
    }

    fn drive(&mut self, ina: bool, inb: bool, enable: bool) {
        self.ina.set_level(ina.into());
        self.inb.set_level(inb.into());
        self.enable.set_level(enable.into());
    }
}

impl MotorDriver for HBridge<'_> {
    fn init(&mut self) {
        self.drive(false, false, false);
    }

    fn start_forward(&mut self) {
        self.drive(true, false, true);
    }

    fn start_backward(&mut self) {
        self.drive(false, true, true);
    }

    /// Both low-side switches on.
    fn brake(&mut self) {
        self.drive(false, false, true);
    }

    fn input_voltage(&mut self) -> f32 {
        adc_to_volts(self.adc.blocking_read(&mut self.sense))
    }
}
