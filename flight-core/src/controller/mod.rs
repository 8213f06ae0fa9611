//! Control loop for a single bounded drop experiment.
//!
//! [`FlightController`] owns the mission context and every collaborator. Each
//! [`step`](FlightController::step) samples the clock, evaluates the global
//! watchdog, runs the handler for the active [`Mode`], gathers the telemetry
//! row, commits it, and only then moves to the next mode. The watchdog is the
//! only way the loop ends; once it fires the log is closed and every later step
//! reports the same halt.

use core::fmt;

use crate::capabilities::{
    AttitudePropagator, ImpactForecaster, InertialSensor, MotorDriver, PowerIndicator,
    RangeFinder, SafetyInterlock,
};
use crate::config::{ConfigError, MissionConfig};
use crate::mode::Mode;
use crate::telemetry::{STATE_CHANGED_NOTE, Telemetry, fields};
use crate::time::{Clock, Millis};

mod context;
pub mod states;

pub use context::MissionContext;

/// Collaborators bound to a controller.
pub struct Rig<C, T, I, R, P, F, M, O, S> {
    pub clock: C,
    pub telemetry: T,
    pub imu: I,
    pub ranger: R,
    pub propagator: P,
    pub forecaster: F,
    pub motor: M,
    pub indicator: O,
    pub interlock: S,
}

/// Watchdog bound that stopped the loop.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum HaltReason {
    /// Too long since fall detection.
    PostFallTimeout,
    /// The experiment reached its absolute time limit.
    AbsoluteTimeout,
}

impl fmt::Display for HaltReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HaltReason::PostFallTimeout => f.write_str("post-fall watchdog expired"),
            HaltReason::AbsoluteTimeout => f.write_str("absolute watchdog expired"),
        }
    }
}

/// Outcome of one loop iteration.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Iteration {
    Continued { from: Mode, to: Mode },
    Halted(HaltReason),
}

impl Iteration {
    #[must_use]
    pub const fn changed_mode(self) -> bool {
        match self {
            Iteration::Continued { from, to } => from.code() != to.code(),
            Iteration::Halted(_) => false,
        }
    }
}

/// Read-only view of the loop published after every iteration.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MissionSnapshot {
    pub mode: Mode,
    pub now: Millis,
    pub fall_detected_at: Option<Millis>,
    pub impact_predicted_at: Option<Millis>,
    pub motor_started: bool,
    pub halted: Option<HaltReason>,
    pub iterations: u32,
}

/// Evaluates both watchdog bounds at `ctx.now()`. The post-fall bound wins
/// when both have expired.
#[must_use]
pub fn watchdog(ctx: &MissionContext) -> Option<HaltReason> {
    let config = ctx.config();
    let post_fall_expired = ctx
        .fall_detected_at()
        .is_some_and(|t0| ctx.now().saturating_sub(t0) >= config.watchdog_post_fall);

    if post_fall_expired {
        Some(HaltReason::PostFallTimeout)
    } else if ctx.now() >= config.watchdog_absolute {
        Some(HaltReason::AbsoluteTimeout)
    } else {
        None
    }
}

/// Free-fall control loop.
pub struct FlightController<C, T, I, R, P, F, M, O, S> {
    rig: Rig<C, T, I, R, P, F, M, O, S>,
    context: MissionContext,
    mode: Mode,
    halted: Option<HaltReason>,
    iterations: u32,
}

impl<C, T, I, R, P, F, M, O, S> FlightController<C, T, I, R, P, F, M, O, S>
where
    C: Clock,
    T: Telemetry,
    I: InertialSensor,
    R: RangeFinder,
    P: AttitudePropagator,
    F: ImpactForecaster,
    M: MotorDriver,
    O: PowerIndicator,
    S: SafetyInterlock,
{
    /// Validates `config` and builds a controller that starts in [`Mode::BootUp`].
    pub fn new(
        config: MissionConfig,
        rig: Rig<C, T, I, R, P, F, M, O, S>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            rig,
            context: MissionContext::new(config.validated()?),
            mode: Mode::BootUp,
            halted: None,
            iterations: 0,
        })
    }

    #[must_use]
    pub const fn mode(&self) -> Mode {
        self.mode
    }

    #[must_use]
    pub const fn context(&self) -> &MissionContext {
        &self.context
    }

    #[must_use]
    pub const fn halted(&self) -> Option<HaltReason> {
        self.halted
    }

    pub fn rig(&self) -> &Rig<C, T, I, R, P, F, M, O, S> {
        &self.rig
    }

    pub fn into_rig(self) -> Rig<C, T, I, R, P, F, M, O, S> {
        self.rig
    }

    #[must_use]
    pub fn snapshot(&self) -> MissionSnapshot {
        MissionSnapshot {
            mode: self.mode,
            now: self.context.now(),
            fall_detected_at: self.context.fall_detected_at(),
            impact_predicted_at: self.context.impact_predicted_at(),
            motor_started: self.context.motor_started(),
            halted: self.halted,
            iterations: self.iterations,
        }
    }

    /// Runs one iteration of the loop.
    pub fn step(&mut self) -> Iteration {
        if let Some(reason) = self.halted {
            return Iteration::Halted(reason);
        }

        let now = self.rig.clock.now();
        self.context.set_now(now);

        if let Some(reason) = watchdog(&self.context) {
            self.rig.telemetry.close();
            self.halted = Some(reason);
            return Iteration::Halted(reason);
        }

        self.rig.telemetry.set_time(self.context.elapsed());

        let current = self.mode;
        let next = self.dispatch(current);

        self.gather();
        self.rig.telemetry.set_mode(current);
        if next != current {
            self.rig.telemetry.add_note(STATE_CHANGED_NOTE);
        }
        self.rig.telemetry.commit_line();

        if next == Mode::StandBy && current != Mode::StandBy {
            self.context.rearm();
            self.rig.forecaster.init();
        }

        self.mode = next;
        self.iterations = self.iterations.saturating_add(1);
        Iteration::Continued {
            from: current,
            to: next,
        }
    }

    /// Steps until the watchdog fires.
    pub fn run_until_halt(&mut self) -> HaltReason {
        self.run_observed(|_| {})
    }

    /// Steps until the watchdog fires, handing a snapshot to `observe` after
    /// every iteration, the halting one included.
    pub fn run_observed(&mut self, mut observe: impl FnMut(&MissionSnapshot)) -> HaltReason {
        loop {
            let outcome = self.step();
            observe(&self.snapshot());
            if let Iteration::Halted(reason) = outcome {
                return reason;
            }
        }
    }

    /// Runs the experiment and parks the CPU once it halts.
    pub fn run(mut self) -> ! {
        self.run_until_halt();
        loop {
            core::hint::spin_loop();
        }
    }

    fn dispatch(&mut self, mode: Mode) -> Mode {
        let ctx = &mut self.context;
        let rig = &mut self.rig;

        match mode {
            Mode::BootUp => states::boot_up(ctx, rig),
            Mode::StandBy => {
                states::stand_by(ctx, &mut rig.telemetry, &mut rig.imu, &mut rig.propagator)
            }
            Mode::DistanceAcquisition => states::distance_acquisition(
                ctx,
                &mut rig.ranger,
                &mut rig.propagator,
                &mut rig.forecaster,
            ),
            Mode::ImpactForecast => states::impact_forecast(
                ctx,
                &mut rig.telemetry,
                &rig.propagator,
                &rig.forecaster,
            ),
            Mode::WaitForEngineStart => {
                states::wait_for_engine_start(ctx, &mut rig.telemetry, &mut rig.motor)
            }
            Mode::WaitForEngineShutdown => states::wait_for_engine_shutdown(
                ctx,
                &mut rig.telemetry,
                &mut rig.imu,
                &mut rig.motor,
            ),
            Mode::Impact => states::impact(ctx, &mut rig.telemetry, &mut rig.imu),
            Mode::Error => states::error(),
        }
    }

    fn gather(&mut self) {
        let rig = &mut self.rig;
        let iteration = rig.clock.now().saturating_sub(self.context.now());
        let rate = rig.imu.angular_rate();
        let reading = rig.ranger.export();
        let volts = rig.motor.input_voltage();

        let telemetry = &mut rig.telemetry;
        telemetry.set_field(fields::ITERATION_LENGTH, iteration.as_f32());
        telemetry.set_field(fields::ACCELERATION_MAGNITUDE, rig.imu.acceleration_magnitude());
        telemetry.set_field(fields::ZENITH_ANGLE, rig.imu.zenith_angle());
        telemetry.set_field(fields::OMEGA_X, rate.x);
        telemetry.set_field(fields::OMEGA_Y, rate.y);
        telemetry.set_field(fields::OMEGA_Z, rate.z);
        telemetry.set_field(fields::DISTANCE_TO_GROUND, reading.distance_m * 1_000.0);
        telemetry.set_field(fields::DISTANCE_DEVICE, f32::from(reading.device.code()));
        telemetry.set_field(fields::CAPACITOR_VOLTAGE, volts);

        rig.indicator.set(volts > self.context.config().power_ok_volts);
    }
}
