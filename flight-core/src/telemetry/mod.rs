//! Telemetry facade consumed by the control loop.
//!
//! The controller assembles one row per iteration through [`Telemetry`]: the
//! elapsed time, a fixed catalog of numeric fields, the active [`Mode`], and a
//! free-text note. The row belongs to the facade and is cleared by
//! [`Telemetry::commit_line`]. [`TelemetryLogger`] is the reference
//! implementation that renders rows as fixed-width text lines.

use core::fmt;

use heapless::String;

use crate::mode::Mode;
use crate::time::Millis;

mod logger;

pub use logger::{
    CELL_WIDTH, Delivery, LINE_CAPACITY, LogLine, LogSink, NoopLogSink, TelemetryLogger,
    TelemetryRow,
};

/// Maximum number of numeric fields a row may carry.
pub const MAX_TELEMETRY_FIELDS: usize = 12;

/// Maximum note length per row, in bytes.
pub const MAX_NOTE_LEN: usize = 160;

/// Text appended by the loop when an iteration picks a different next mode.
pub const STATE_CHANGED_NOTE: &str = "State Changed";

/// Name and unit of one telemetry column.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub unit: &'static str,
}

impl FieldSpec {
    #[must_use]
    pub const fn new(name: &'static str, unit: &'static str) -> Self {
        Self { name, unit }
    }
}

/// Column indices of the per-iteration gather, in registration order.
pub mod fields {
    use super::FieldSpec;

    pub const ITERATION_LENGTH: usize = 0;
    pub const ACCELERATION_MAGNITUDE: usize = 1;
    pub const ZENITH_ANGLE: usize = 2;
    pub const OMEGA_X: usize = 3;
    pub const OMEGA_Y: usize = 4;
    pub const OMEGA_Z: usize = 5;
    pub const DISTANCE_TO_GROUND: usize = 6;
    pub const DISTANCE_DEVICE: usize = 7;
    pub const CAPACITOR_VOLTAGE: usize = 8;

    /// Columns registered during boot.
    pub const CATALOG: [FieldSpec; 9] = [
        FieldSpec::new("IterLen", "msec"),
        FieldSpec::new("AccMag", "g"),
        FieldSpec::new("ZenitAng", "deg"),
        FieldSpec::new("omegaX", "rad/sec"),
        FieldSpec::new("omegaY", "rad/sec"),
        FieldSpec::new("omegaZ", "rad/sec"),
        FieldSpec::new("DistToGND", "mm"),
        FieldSpec::new("DistDevice", "#"),
        FieldSpec::new("Capacitor", "V"),
    ];
}

/// Recoverable conditions reported by a telemetry implementation.
///
/// None of these stop the control loop; the affected value, field, note tail,
/// or line is dropped and processing continues.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TelemetryWarning {
    /// `set_field` addressed a column that was never defined.
    FieldIndexOutOfRange { index: usize, defined: usize },
    /// `define_field` was called with the catalog already full.
    TooManyFields { limit: usize },
    /// The line cache is full and a committed line was dropped.
    CacheExhausted { capacity: usize },
    /// A note did not fit the row and was cut short.
    NoteTruncated,
    /// A rendered line exceeded [`LINE_CAPACITY`] and was cut short.
    LineTruncated,
}

impl fmt::Display for TelemetryWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryWarning::FieldIndexOutOfRange { index, defined } => write!(
                f,
                "field index {index} out of range ({defined} fields defined)"
            ),
            TelemetryWarning::TooManyFields { limit } => write!(
                f,
                "too many logged fields, limit is {limit}"
            ),
            TelemetryWarning::CacheExhausted { .. } => {
                f.write_str("Log cache has run out of memory!")
            }
            TelemetryWarning::NoteTruncated => f.write_str("note truncated"),
            TelemetryWarning::LineTruncated => f.write_str("line truncated"),
        }
    }
}

/// Telemetry capability driven by the control loop.
pub trait Telemetry {
    /// Opens the log and resets the field catalog.
    fn init(&mut self);

    /// Registers the next column. Must precede [`write_header`](Self::write_header).
    fn define_field(&mut self, name: &'static str, unit: &'static str);

    fn write_header(&mut self);

    /// Elapsed time stamped on the current row.
    fn set_time(&mut self, elapsed: Millis);

    /// Sets one column of the current row; unknown columns are reported, not fatal.
    fn set_field(&mut self, index: usize, value: f32);

    fn set_mode(&mut self, mode: Mode);

    /// Appends `text` to the current row's note.
    fn add_note(&mut self, text: &str);

    /// Emits the current row and resets it.
    fn commit_line(&mut self);

    fn close(&mut self);

    /// Formats and appends a note.
    fn add_note_fmt(&mut self, args: fmt::Arguments<'_>) {
        let mut note: String<MAX_NOTE_LEN> = String::new();
        // Overflow keeps the prefix that fit.
        let _ = fmt::write(&mut note, args);
        self.add_note(&note);
    }

    /// Registers every column in `catalog`.
    fn define_fields(&mut self, catalog: &[FieldSpec]) {
        for field in catalog {
            self.define_field(field.name, field.unit);
        }
    }
}

/// Telemetry that discards everything.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopTelemetry;

impl NoopTelemetry {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Telemetry for NoopTelemetry {
    fn init(&mut self) {}

    fn define_field(&mut self, _: &'static str, _: &'static str) {}

    fn write_header(&mut self) {}

    fn set_time(&mut self, _: Millis) {}

    fn set_field(&mut self, _: usize, _: f32) {}

    fn set_mode(&mut self, _: Mode) {}

    fn add_note(&mut self, _: &str) {}

    fn commit_line(&mut self) {}

    fn close(&mut self) {}
}
