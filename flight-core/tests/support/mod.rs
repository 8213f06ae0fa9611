#![allow(dead_code)]

use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;

use flight_core::capabilities::{
    AngularRate, AttitudePropagator, ImpactForecaster, InertialSensor, MotorDriver,
    PowerIndicator, Quaternion, RangeDevice, RangeFinder, RangeReading, SafetyInterlock,
    motor_start_from_raw,
};
use flight_core::config::{ConfigError, MissionConfig};
use flight_core::controller::{FlightController, Rig};
use flight_core::mode::Mode;
use flight_core::telemetry::{MAX_TELEMETRY_FIELDS, Telemetry};
use flight_core::time::{Clock, Millis};

pub type Bench = FlightController<
    MockClock,
    RecordingTelemetry,
    ScriptedImu,
    MockRanger,
    FixedPropagator,
    MockForecaster,
    RecordingMotor,
    RecordingIndicator,
    MockInterlock,
>;

/// Clock the test moves by hand. Reads never advance it; delays do.
#[derive(Clone, Debug, Default)]
pub struct MockClock {
    now: Rc<Cell<u32>>,
    pub delays: Vec<u32>,
}

impl MockClock {
    pub fn handle(&self) -> ClockHandle {
        ClockHandle(Rc::clone(&self.now))
    }
}

#[derive(Clone, Debug)]
pub struct ClockHandle(Rc<Cell<u32>>);

impl ClockHandle {
    pub fn set(&self, millis: u32) {
        self.0.set(millis);
    }
}

impl Clock for MockClock {
    fn now(&mut self) -> Millis {
        Millis::new(self.now.get())
    }

    fn delay(&mut self, duration: Millis) {
        self.delays.push(duration.as_u32());
        self.now.set(self.now.get() + duration.as_u32());
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Row {
    pub time: u32,
    pub fields: [f32; MAX_TELEMETRY_FIELDS],
    pub mode: Mode,
    pub note: String,
}

impl Row {
    fn blank() -> Self {
        Self {
            time: 0,
            fields: [0.0; MAX_TELEMETRY_FIELDS],
            mode: Mode::BootUp,
            note: String::new(),
        }
    }
}

/// Telemetry fake keeping every committed row.
#[derive(Debug)]
pub struct RecordingTelemetry {
    pub defined: Vec<(&'static str, &'static str)>,
    pub headers: u32,
    pub closes: u32,
    pub rejected_fields: Vec<usize>,
    pub rows: Vec<Row>,
    current: Row,
}

impl Default for RecordingTelemetry {
    fn default() -> Self {
        Self {
            defined: Vec::new(),
            headers: 0,
            closes: 0,
            rejected_fields: Vec::new(),
            rows: Vec::new(),
            current: Row::blank(),
        }
    }
}

impl RecordingTelemetry {
    pub fn last(&self) -> &Row {
        self.rows.last().expect("no committed rows")
    }

    pub fn pending(&self) -> &Row {
        &self.current
    }
}

impl Telemetry for RecordingTelemetry {
    fn init(&mut self) {
        self.defined.clear();
    }

    fn define_field(&mut self, name: &'static str, unit: &'static str) {
        self.defined.push((name, unit));
    }

    fn write_header(&mut self) {
        self.headers += 1;
    }

    fn set_time(&mut self, elapsed: Millis) {
        self.current.time = elapsed.as_u32();
    }

    fn set_field(&mut self, index: usize, value: f32) {
        if index < self.defined.len() {
            self.current.fields[index] = value;
        } else {
            self.rejected_fields.push(index);
        }
    }

    fn set_mode(&mut self, mode: Mode) {
        self.current.mode = mode;
    }

    fn add_note(&mut self, text: &str) {
        self.current.note.push_str(text);
        self.current.note.push('.');
    }

    fn commit_line(&mut self) {
        self.rows.push(self.current.clone());
        self.current.fields = [0.0; MAX_TELEMETRY_FIELDS];
        self.current.note.clear();
    }

    fn close(&mut self) {
        self.closes += 1;
    }
}

/// IMU replaying a scripted acceleration sequence; the last value repeats.
#[derive(Debug)]
pub struct ScriptedImu {
    script: VecDeque<f32>,
    current: f32,
    pub zenith: f32,
    pub rate: AngularRate,
    pub samples: u32,
}

impl ScriptedImu {
    pub fn resting() -> Self {
        Self {
            script: VecDeque::new(),
            current: 1.0,
            zenith: 0.0,
            rate: AngularRate::default(),
            samples: 0,
        }
    }

    pub fn script(&mut self, values: &[f32]) {
        self.script.extend(values.iter().copied());
    }
}

impl InertialSensor for ScriptedImu {
    fn init(&mut self) {}

    fn sample(&mut self) {
        self.samples += 1;
        if let Some(next) = self.script.pop_front() {
            self.current = next;
        }
    }

    fn acceleration_magnitude(&self) -> f32 {
        self.current
    }

    fn zenith_angle(&self) -> f32 {
        self.zenith
    }

    fn angular_rate(&self) -> AngularRate {
        self.rate
    }

    fn orientation(&self) -> Quaternion {
        Quaternion::about_x(self.zenith)
    }
}

#[derive(Debug, Default)]
pub struct MockRanger {
    pub distance_m: f32,
    pub device: RangeDevice,
    pub selected: Vec<RangeDevice>,
    pub samples: u32,
}

impl RangeFinder for MockRanger {
    fn init(&mut self) {}

    fn select_device(&mut self, device: RangeDevice) {
        self.device = device;
        self.selected.push(device);
    }

    fn sample(&mut self) {
        self.samples += 1;
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

/// Propagator reporting a fixed zenith angle.
#[derive(Debug, Default)]
pub struct FixedPropagator {
    pub angle: f32,
    pub seeded_at: Option<Millis>,
    pub steps: Vec<u32>,
}

impl AttitudePropagator for FixedPropagator {
    fn seed(&mut self, t0: Millis, _: Quaternion, _: AngularRate) {
        self.seeded_at = Some(t0);
        self.steps.clear();
    }

    fn advance(&mut self, step: Millis) {
        self.steps.push(step.as_u32());
    }

    fn zenith_angle(&self, _: Millis) -> f32 {
        self.angle
    }
}

/// Forecaster answering with a fixed impact offset and a raw start time.
#[derive(Debug, Default)]
pub struct MockForecaster {
    pub impact_in: u32,
    /// Start time in the forecaster's raw encoding; 0 means failure.
    pub raw_start: u32,
    pub samples: Vec<(u32, f32)>,
    pub inits: u32,
}

impl ImpactForecaster for MockForecaster {
    fn init(&mut self) {
        self.inits += 1;
        self.samples.clear();
    }

    fn add_sample(&mut self, elapsed: Millis, distance_m: f32) {
        self.samples.push((elapsed.as_u32(), distance_m));
    }

    fn predict_impact_time(&self) -> Millis {
        Millis::new(self.impact_in)
    }

    fn when_to_start_motor(&self, _: Millis, _: f32) -> Option<Millis> {
        motor_start_from_raw(self.raw_start)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MotorCommand {
    Forward,
    Backward,
    Brake,
}

#[derive(Debug, Default)]
pub struct RecordingMotor {
    pub volts: f32,
    pub commands: Vec<MotorCommand>,
}

impl RecordingMotor {
    pub fn starts(&self) -> Vec<MotorCommand> {
        self.commands
            .iter()
            .copied()
            .filter(|command| *command != MotorCommand::Brake)
            .collect()
    }
}

impl MotorDriver for RecordingMotor {
    fn init(&mut self) {}

    fn start_forward(&mut self) {
        self.commands.push(MotorCommand::Forward);
    }

    fn start_backward(&mut self) {
        self.commands.push(MotorCommand::Backward);
    }

    fn brake(&mut self) {
        self.commands.push(MotorCommand::Brake);
    }

    fn input_voltage(&mut self) -> f32 {
        self.volts
    }
}

#[derive(Debug, Default)]
pub struct RecordingIndicator {
    pub states: Vec<bool>,
}

impl PowerIndicator for RecordingIndicator {
    fn set(&mut self, power_ok: bool) {
        self.states.push(power_ok);
    }
}

/// Interlock that reads as plugged for a fixed number of polls.
#[derive(Debug, Default)]
pub struct MockInterlock {
    pub plugged_polls: u32,
    pub polls: u32,
}

impl SafetyInterlock for MockInterlock {
    fn init(&mut self) {}

    fn is_removed(&mut self) -> bool {
        self.polls += 1;
        self.polls > self.plugged_polls
    }
}

pub struct BenchBuilder {
    pub config: MissionConfig,
    pub imu: ScriptedImu,
    pub ranger: MockRanger,
    pub propagator: FixedPropagator,
    pub forecaster: MockForecaster,
    pub motor: RecordingMotor,
    pub interlock: MockInterlock,
}

impl Default for BenchBuilder {
    fn default() -> Self {
        Self {
            config: MissionConfig::default(),
            imu: ScriptedImu::resting(),
            ranger: MockRanger::default(),
            propagator: FixedPropagator::default(),
            forecaster: MockForecaster::default(),
            motor: RecordingMotor::default(),
            interlock: MockInterlock::default(),
        }
    }
}

impl BenchBuilder {
    pub fn build(self) -> (Bench, ClockHandle) {
        self.try_build().expect("valid config")
    }

    pub fn try_build(self) -> Result<(Bench, ClockHandle), ConfigError> {
        let clock = MockClock::default();
        let handle = clock.handle();
        let rig = Rig {
            clock,
            telemetry: RecordingTelemetry::default(),
            imu: self.imu,
            ranger: self.ranger,
            propagator: self.propagator,
            forecaster: self.forecaster,
            motor: self.motor,
            indicator: RecordingIndicator::default(),
            interlock: self.interlock,
        };
        let bench = FlightController::new(self.config, rig)?;
        Ok((bench, handle))
    }
}

/// Boots the bench at t=0 and detects a fall at `t0`.
pub fn fall_at(bench: &mut Bench, clock: &ClockHandle, t0: u32) {
    clock.set(0);
    bench.step();
    assert_eq!(bench.mode(), Mode::StandBy);

    clock.set(t0);
    bench.step();
    assert_eq!(bench.mode(), Mode::DistanceAcquisition, "fall not detected");
}
