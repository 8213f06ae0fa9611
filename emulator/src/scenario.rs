//! Canned drops and the runner that pushes the controller through them.

use std::fmt;
use std::io::{self, Write};

use flight_core::config::MissionConfig;
use flight_core::controller::{FlightController, HaltReason, Iteration, Rig};
use flight_core::mode::Mode;
use flight_core::models::{BallisticForecaster, RateIntegrator};
use flight_core::telemetry::{Delivery, LogSink, TelemetryLogger, TelemetryWarning};
use flight_core::time::Millis;

use crate::world::{
    DropProfile, MotorCommand, SimClock, SimImu, SimIndicator, SimInterlock, SimMotor, SimRanger,
    World,
};

/// Lines held back when the log is cached until close.
pub const LOG_CACHE_LINES: usize = 256;

/// Absolute watchdog used by hosted runs unless overridden.
pub const DEFAULT_RUN_LENGTH: Millis = Millis::new(2_500);

type Logger<W> = TelemetryLogger<WriterSink<W>, LOG_CACHE_LINES>;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Scenario {
    /// Tumbling drop where the motor has time to right the device.
    Nominal,
    /// Near-level drop; the correction is too short to be worth starting.
    SkipStart,
    /// Side-on drop where neither ranger sees the ground.
    ForecastFailure,
}

impl Scenario {
    pub const ALL: [Scenario; 3] = [
        Scenario::Nominal,
        Scenario::SkipStart,
        Scenario::ForecastFailure,
    ];

    pub fn from_tag(tag: &str) -> Result<Self, String> {
        Self::ALL
            .into_iter()
            .find(|scenario| tag.eq_ignore_ascii_case(scenario.tag()))
            .ok_or_else(|| {
                let known: Vec<&str> = Self::ALL.iter().map(|scenario| scenario.tag()).collect();
                format!(
                    "Unknown scenario `{tag}`. Expected one of: {}",
                    known.join(", ")
                )
            })
    }

    pub const fn tag(self) -> &'static str {
        match self {
            Scenario::Nominal => "nominal",
            Scenario::SkipStart => "skip-start",
            Scenario::ForecastFailure => "forecast-failure",
        }
    }

    pub const fn description(self) -> &'static str {
        match self {
            Scenario::Nominal => "1 m drop released upside down, tumbling at 30 deg/s",
            Scenario::SkipStart => "1 m drop released nearly level, no rotation",
            Scenario::ForecastFailure => "1 m drop released on its side, no ranger aimed at the ground",
        }
    }

    pub const fn profile(self) -> DropProfile {
        let (start_angle_deg, rate_deg_per_s) = match self {
            Scenario::Nominal => (170.0, 30.0),
            Scenario::SkipStart => (5.0, 0.0),
            Scenario::ForecastFailure => (90.0, 0.0),
        };
        DropProfile {
            release_at: Millis::new(1_500),
            height_m: 1.0,
            start_angle_deg,
            rate_deg_per_s,
            plugged_polls: 2,
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[derive(Copy, Clone, Debug)]
pub struct RunOptions {
    pub config: MissionConfig,
    pub delivery: Delivery,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            config: MissionConfig {
                watchdog_absolute: DEFAULT_RUN_LENGTH,
                ..MissionConfig::new()
            },
            delivery: Delivery::Immediate,
        }
    }
}

/// Log sink writing lines to any [`Write`] and keeping warnings for the report.
///
/// The first I/O error stops further writes and is returned from [`WriterSink::finish`].
pub struct WriterSink<W> {
    writer: W,
    lines: usize,
    warnings: Vec<TelemetryWarning>,
    error: Option<io::Error>,
}

impl<W: Write> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            lines: 0,
            warnings: Vec::new(),
            error: None,
        }
    }

    fn record(&mut self, result: io::Result<()>) {
        if let Err(err) = result {
            self.error.get_or_insert(err);
        }
    }

    fn finish(self) -> io::Result<(W, usize, Vec<TelemetryWarning>)> {
        match self.error {
            Some(err) => Err(err),
            None => Ok((self.writer, self.lines, self.warnings)),
        }
    }
}

impl<W: Write> LogSink for WriterSink<W> {
    fn open(&mut self) {}

    fn write_line(&mut self, line: &str) {
        if self.error.is_some() {
            return;
        }
        let result = writeln!(self.writer, "{line}");
        if result.is_ok() {
            self.lines += 1;
        }
        self.record(result);
    }

    fn warn(&mut self, warning: TelemetryWarning) {
        self.warnings.push(warning);
    }

    fn close(&mut self) {
        let result = self.writer.flush();
        self.record(result);
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Transition {
    pub at: Millis,
    pub from: Mode,
    pub to: Mode,
}

#[derive(Debug)]
pub struct RunReport {
    pub scenario: Scenario,
    pub halt: HaltReason,
    pub transitions: Vec<Transition>,
    pub motor: Vec<(Millis, MotorCommand)>,
    pub landing_at_ms: f32,
    pub power_ok: Option<bool>,
    pub lines: usize,
    pub warnings: Vec<TelemetryWarning>,
}

impl RunReport {
    pub fn visited(&self, mode: Mode) -> bool {
        self.transitions.iter().any(|transition| transition.to == mode)
    }

    pub fn motor_commands(&self) -> Vec<MotorCommand> {
        self.motor.iter().map(|(_, command)| *command).collect()
    }

    /// Distinct warnings with how often each was raised.
    pub fn warning_tally(&self) -> Vec<(TelemetryWarning, usize)> {
        let mut tally: Vec<(TelemetryWarning, usize)> = Vec::new();
        for warning in &self.warnings {
            match tally.iter_mut().find(|(seen, _)| seen == warning) {
                Some((_, count)) => *count += 1,
                None => tally.push((*warning, 1)),
            }
        }
        tally
    }

    pub fn write_summary(&self, out: &mut impl Write) -> io::Result<()> {
        writeln!(out, "# scenario: {} ({})", self.scenario, self.scenario.description())?;
        writeln!(out, "# halted: {}", self.halt)?;
        writeln!(out, "# landed at: {:.1} ms", self.landing_at_ms)?;
        writeln!(out, "# transitions:")?;
        for transition in &self.transitions {
            writeln!(
                out,
                "#   {:>6} ms  {} -> {}",
                transition.at.as_u32(),
                transition.from,
                transition.to
            )?;
        }
        writeln!(out, "# motor:")?;
        if self.motor.is_empty() {
            writeln!(out, "#   (idle)")?;
        }
        for (at, command) in &self.motor {
            writeln!(out, "#   {:>6} ms  {command}", at.as_u32())?;
        }
        if let Some(power_ok) = self.power_ok {
            writeln!(out, "# power ok: {power_ok}")?;
        }
        writeln!(
            out,
            "# log lines: {}, warnings: {}",
            self.lines,
            self.warnings.len()
        )
    }
}

/// Runs `scenario` until the watchdog halts it, writing the log to `writer`.
pub fn run<W: Write>(
    scenario: Scenario,
    options: &RunOptions,
    writer: W,
) -> io::Result<(RunReport, W)> {
    let world = World::shared(scenario.profile());
    let rig = Rig {
        clock: SimClock::new(&world),
        telemetry: Logger::new(WriterSink::new(writer), options.delivery),
        imu: SimImu::new(&world),
        ranger: SimRanger::new(&world),
        propagator: RateIntegrator::new(),
        forecaster: BallisticForecaster::new(),
        motor: SimMotor::new(&world),
        indicator: SimIndicator::new(&world),
        interlock: SimInterlock::new(&world),
    };
    let mut controller = FlightController::new(options.config, rig)
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err.to_string()))?;

    let mut transitions = Vec::new();
    let halt = loop {
        match controller.step() {
            Iteration::Halted(reason) => break reason,
            Iteration::Continued { from, to } if from != to => transitions.push(Transition {
                at: controller.context().now(),
                from,
                to,
            }),
            Iteration::Continued { .. } => {}
        }
    };

    let (writer, lines, warnings) = controller.into_rig().telemetry.into_sink().finish()?;
    let state = world.borrow();
    let report = RunReport {
        scenario,
        halt,
        transitions,
        motor: state.motor_log().to_vec(),
        landing_at_ms: state.landing_at_ms(),
        power_ok: state.power_ok(),
        lines,
        warnings,
    };
    Ok((report, writer))
}
