#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Telemetry sink for the flight log.
//!
//! Every rendered line goes out over defmt RTT on the target and to stdout on
//! a host build. Warnings take the `warn` level so they stand out in a capture.

use flight_core::telemetry::{Delivery, LogSink, TelemetryLogger, TelemetryWarning};

/// Lines held back when [`DELIVERY`] caches until close.
pub const LOG_CACHE_LINES: usize = 16;

/// RTT keeps up with the loop, so lines go out as they are committed.
pub const DELIVERY: Delivery = Delivery::Immediate;

pub type FlightTelemetry = TelemetryLogger<RttSink, LOG_CACHE_LINES>;

#[must_use]
pub const fn flight_telemetry() -> FlightTelemetry {
    TelemetryLogger::new(RttSink::new(), DELIVERY)
}

/// Line sink counting what it has written.
#[derive(Debug, Default)]
pub struct RttSink {
    lines: u32,
    warnings: u32,
}

impl RttSink {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            lines: 0,
            warnings: 0,
        }
    }
}

impl LogSink for RttSink {
    fn open(&mut self) {
        emit_event("log open", self.lines, self.warnings);
    }

    fn write_line(&mut self, line: &str) {
        self.lines = self.lines.wrapping_add(1);
        emit_line(line);
    }

    fn warn(&mut self, warning: TelemetryWarning) {
        self.warnings = self.warnings.wrapping_add(1);
        emit_warning(warning);
    }

    fn close(&mut self) {
        emit_event("log closed", self.lines, self.warnings);
    }
}

#[cfg(target_os = "none")]
fn emit_line(line: &str) {
    defmt::println!("{=str}", line);
}

#[cfg(not(target_os = "none"))]
fn emit_line(line: &str) {
    println!("{line}");
}

#[cfg(target_os = "none")]
fn emit_warning(warning: TelemetryWarning) {
    defmt::warn!("telemetry: {}", defmt::Display2Format(&warning));
}

#[cfg(not(target_os = "none"))]
fn emit_warning(warning: TelemetryWarning) {
    eprintln!("telemetry: {warning}");
}

#[cfg(target_os = "none")]
fn emit_event(event: &'static str, lines: u32, warnings: u32) {
    defmt::info!("telemetry: {} lines={} warnings={}", event, lines, warnings);
}

#[cfg(not(target_os = "none"))]
fn emit_event(event: &'static str, lines: u32, warnings: u32) {
    println!("telemetry: {event} lines={lines} warnings={warnings}");
}
