//! Fixed-width text logger backing the [`Telemetry`] facade.
//!
//! Lines are comma separated cells, each right-padded with spaces to
//! [`CELL_WIDTH`] characters so a capture reads as aligned columns:
//!
//! ```text
//! Time [msec],        IterLen [msec],     ...  LogicState,         Notes
//! 120,                3.00,               ...  STAND_BY,           Fall Detected.State Changed.
//! ```
//!
//! Output goes to a [`LogSink`], either line by line or held in a bounded
//! cache and flushed when the log closes.

use core::fmt::{self, Write as _};

use heapless::{String, Vec};

use super::{FieldSpec, MAX_NOTE_LEN, MAX_TELEMETRY_FIELDS, Telemetry, TelemetryWarning};
use crate::mode::Mode;
use crate::time::Millis;

/// Width every cell is padded to.
pub const CELL_WIDTH: usize = 20;

/// Capacity of one rendered line.
pub const LINE_CAPACITY: usize = 512;

/// One rendered log line.
pub type LogLine = String<LINE_CAPACITY>;

const CLOSING_LINE: &str = "Closing Log";

/// Destination for rendered lines.
pub trait LogSink {
    /// Prepares the backing store. Called before the first line is written.
    fn open(&mut self);

    fn write_line(&mut self, line: &str);

    /// Out-of-band warning hook.
    fn warn(&mut self, warning: TelemetryWarning);

    fn close(&mut self);
}

/// Sink that drops everything.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopLogSink;

impl LogSink for NoopLogSink {
    fn open(&mut self) {}

    fn write_line(&mut self, _: &str) {}

    fn warn(&mut self, _: TelemetryWarning) {}

    fn close(&mut self) {}
}

/// When committed lines reach the sink.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum Delivery {
    /// Each line is written as it is committed.
    #[default]
    Immediate,
    /// Lines are cached and the sink is opened, filled, and closed on `close()`.
    CacheUntilClose,
}

/// Row under assembly for the current iteration.
#[derive(Clone, Debug, PartialEq)]
pub struct TelemetryRow {
    time: Millis,
    values: [f32; MAX_TELEMETRY_FIELDS],
    mode: Mode,
    note: String<MAX_NOTE_LEN>,
}

impl TelemetryRow {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            time: Millis::ZERO,
            values: [0.0; MAX_TELEMETRY_FIELDS],
            mode: Mode::BootUp,
            note: String::new(),
        }
    }

    #[must_use]
    pub const fn time(&self) -> Millis {
        self.time
    }

    /// Value stored in column `index`, if the column exists.
    #[must_use]
    pub fn value(&self, index: usize) -> Option<f32> {
        self.values.get(index).copied()
    }

    #[must_use]
    pub const fn mode(&self) -> Mode {
        self.mode
    }

    #[must_use]
    pub fn note(&self) -> &str {
        &self.note
    }

    /// Returns `true` when every value is zero and the note is empty.
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn is_clear(&self) -> bool {
        self.note.is_empty() && self.values.iter().all(|value| *value == 0.0)
    }

    fn clear(&mut self) {
        self.values = [0.0; MAX_TELEMETRY_FIELDS];
        self.note.clear();
    }
}

impl Default for TelemetryRow {
    fn default() -> Self {
        Self::new()
    }
}

/// Reference [`Telemetry`] implementation.
///
/// `CACHE` bounds the number of lines held under
/// [`Delivery::CacheUntilClose`]; it is unused for immediate delivery.
pub struct TelemetryLogger<S, const CACHE: usize>
where
    S: LogSink,
{
    sink: S,
    delivery: Delivery,
    fields: Vec<FieldSpec, MAX_TELEMETRY_FIELDS>,
    row: TelemetryRow,
    cache: Vec<LogLine, CACHE>,
    warnings: u32,
}

impl<S, const CACHE: usize> TelemetryLogger<S, CACHE>
where
    S: LogSink,
{
    #[must_use]
    pub const fn new(sink: S, delivery: Delivery) -> Self {
        Self {
            sink,
            delivery,
            fields: Vec::new(),
            row: TelemetryRow::new(),
            cache: Vec::new(),
            warnings: 0,
        }
    }

    /// Row being assembled for the current iteration.
    #[must_use]
    pub fn row(&self) -> &TelemetryRow {
        &self.row
    }

    /// Number of warnings reported since construction.
    #[must_use]
    pub const fn warnings(&self) -> u32 {
        self.warnings
    }

    #[must_use]
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Lines waiting for `close()` under cached delivery.
    #[must_use]
    pub fn cached_lines(&self) -> usize {
        self.cache.len()
    }

    #[must_use]
    pub const fn delivery(&self) -> Delivery {
        self.delivery
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    fn report(&mut self, warning: TelemetryWarning) {
        self.warnings = self.warnings.saturating_add(1);
        self.sink.warn(warning);
    }

    fn emit(&mut self, line: &str) {
        match self.delivery {
            Delivery::Immediate => self.sink.write_line(line),
            Delivery::CacheUntilClose => {
                let mut cached = LogLine::new();
                // Rendered lines never exceed LINE_CAPACITY.
                let _ = cached.push_str(line);
                if self.cache.push(cached).is_err() {
                    self.report(TelemetryWarning::CacheExhausted { capacity: CACHE });
                }
            }
        }
    }

    fn render_header(&self, line: &mut LogLine) -> fmt::Result {
        push_cell(line, format_args!("Time [msec],"))?;
        for field in &self.fields {
            push_cell(line, format_args!("{} [{}],", field.name, field.unit))?;
        }
        push_cell(line, format_args!("LogicState,"))?;
        line.push_str("Notes").map_err(|_| fmt::Error)
    }

    fn render_row(&self, line: &mut LogLine) -> fmt::Result {
        push_cell(line, format_args!("{},", self.row.time))?;
        for value in self.row.values.iter().take(self.fields.len()) {
            push_cell(line, format_args!("{value:.2},"))?;
        }
        push_cell(line, format_args!("{},", self.row.mode))?;
        line.push_str(&self.row.note).map_err(|_| fmt::Error)
    }

    fn finish_line(&mut self, line: &LogLine, rendered: fmt::Result) {
        if rendered.is_err() {
            self.report(TelemetryWarning::LineTruncated);
        }
        self.emit(line);
    }
}

impl<S, const CACHE: usize> Telemetry for TelemetryLogger<S, CACHE>
where
    S: LogSink,
{
    fn init(&mut self) {
        if self.delivery == Delivery::Immediate {
            self.sink.open();
        }
        self.cache.clear();
        self.fields.clear();
        self.row = TelemetryRow::new();
    }

    fn define_field(&mut self, name: &'static str, unit: &'static str) {
        if self.fields.push(FieldSpec::new(name, unit)).is_err() {
            self.report(TelemetryWarning::TooManyFields {
                limit: MAX_TELEMETRY_FIELDS,
            });
        }
    }

    fn write_header(&mut self) {
        let mut line = LogLine::new();
        let rendered = self.render_header(&mut line);
        self.finish_line(&line, rendered);
    }

    fn set_time(&mut self, elapsed: Millis) {
        self.row.time = elapsed;
    }

    fn set_field(&mut self, index: usize, value: f32) {
        if index < self.fields.len() {
            self.row.values[index] = value;
        } else {
            self.report(TelemetryWarning::FieldIndexOutOfRange {
                index,
                defined: self.fields.len(),
            });
        }
    }

    fn set_mode(&mut self, mode: Mode) {
        self.row.mode = mode;
    }

    fn add_note(&mut self, text: &str) {
        let complete = push_truncating(&mut self.row.note, text)
            && push_truncating(&mut self.row.note, ".");
        if !complete {
            self.report(TelemetryWarning::NoteTruncated);
        }
    }

    fn commit_line(&mut self) {
        let mut line = LogLine::new();
        let rendered = self.render_row(&mut line);
        self.finish_line(&line, rendered);
        self.row.clear();
    }

    fn close(&mut self) {
        self.emit(CLOSING_LINE);

        if self.delivery == Delivery::CacheUntilClose {
            self.sink.open();
            for line in &self.cache {
                self.sink.write_line(line);
            }
            self.cache.clear();
        }
        self.sink.close();
    }
}

/// Appends one cell and pads it to [`CELL_WIDTH`]. Longer cells are kept whole.
fn push_cell(line: &mut LogLine, args: fmt::Arguments<'_>) -> fmt::Result {
    let start = line.len();
    line.write_fmt(args)?;
    while line.len() - start < CELL_WIDTH {
        line.push(' ').map_err(|_| fmt::Error)?;
    }
    Ok(())
}

/// Appends as much of `text` as fits; returns `false` if anything was dropped.
fn push_truncating<const N: usize>(dst: &mut String<N>, text: &str) -> bool {
    for ch in text.chars() {
        if dst.push(ch).is_err() {
            return false;
        }
    }
    true
}
