//! Front-panel indicator and safety plug.

use embassy_stm32::gpio::{Input, Output};
use flight_core::capabilities::{PowerIndicator, SafetyInterlock};

pub struct VoltageLed<'d> {
    led: Output<'d>,
}

impl<'d> VoltageLed<'d> {
    pub fn new(led: Output<'d>) -> Self {
        Self { led }
    }
}

impl PowerIndicator for VoltageLed<'_> {
    fn set(&mut self, power_ok: bool) {
        self.led.set_level(power_ok.into());
    }
}

/// Plug shorting a driven-low source pin to a pulled-up terminal. The
/// terminal reads high once the plug is pulled.
pub struct SafetyPlug<'d> {
    source: Output<'d>,
    terminal: Input<'d>,
}

impl<'d> SafetyPlug<'d> {
    pub fn new(source: Output<'d>, terminal: Input<'d>) -> Self {
        Self { source, terminal }
    }
}

impl SafetyInterlock for SafetyPlug<'_> {
    fn init(&mut self) {
        self.source.set_low();
    }

    fn is_removed(&mut self) -> bool {
        self.terminal.is_high()
    }
}
