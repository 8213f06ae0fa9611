//! One handler per [`Mode`].
//!
//! Each handler receives the mission context plus exactly the capabilities it
//! touches and returns the next mode. None of them assign the mode themselves.

use crate::capabilities::{
    AttitudePropagator, ImpactForecaster, InertialSensor, MotorDriver, MotorPolarization,
    PowerIndicator, RangeDevice, RangeFinder, SafetyInterlock,
};
use crate::mode::Mode;
use crate::telemetry::{Telemetry, fields};
use crate::time::{Clock, Millis};

use super::{MissionContext, Rig};

/// Ranger facing the ground at zenith angle `angle_deg`, if any.
///
/// The up-facing ranger sits at the 0° reference so it sees the ground when the
/// device is inverted; the down-facing one sits at 180°.
#[must_use]
pub fn select_ranger(angle_deg: f32, half_fov_deg: f32) -> RangeDevice {
    let within = |target: f32| libm::fabsf(angle_deg - target) <= half_fov_deg;
    if within(180.0) || within(-180.0) {
        RangeDevice::UpFacing
    } else if within(0.0) || within(360.0) {
        RangeDevice::DownFacing
    } else {
        RangeDevice::None
    }
}

/// Brings every collaborator up and holds until the safety plug is removed.
pub fn boot_up<C, T, I, R, P, F, M, O, S>(
    ctx: &MissionContext,
    rig: &mut Rig<C, T, I, R, P, F, M, O, S>,
) -> Mode
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
    rig.telemetry.init();
    rig.telemetry.define_fields(&fields::CATALOG);
    rig.telemetry.write_header();

    rig.ranger.init();
    rig.imu.init();
    rig.forecaster.init();
    rig.motor.init();
    rig.indicator.set(false);
    rig.interlock.init();

    while !rig.interlock.is_removed() {
        rig.telemetry.add_note("Waiting For Safety Plug Removal");
        rig.telemetry.commit_line();
        rig.clock.delay(ctx.config().interlock_poll_interval);
    }

    Mode::StandBy
}

/// Watches for the acceleration drop that marks free fall.
pub fn stand_by<T, I, P>(
    ctx: &mut MissionContext,
    telemetry: &mut T,
    imu: &mut I,
    propagator: &mut P,
) -> Mode
where
    T: Telemetry,
    I: InertialSensor,
    P: AttitudePropagator,
{
    imu.sample();
    if imu.acceleration_magnitude() >= ctx.config().free_fall_threshold_g {
        return Mode::StandBy;
    }

    telemetry.add_note("Fall Detected");
    let t0 = ctx.mark_fall_detected();
    propagator.seed(t0, imu.orientation(), imu.angular_rate());
    propagator.advance(ctx.config().seed_step);

    Mode::DistanceAcquisition
}

/// Ranges the ground with whichever sensor faces it until the window closes.
pub fn distance_acquisition<R, P, F>(
    ctx: &mut MissionContext,
    ranger: &mut R,
    propagator: &mut P,
    forecaster: &mut F,
) -> Mode
where
    R: RangeFinder,
    P: AttitudePropagator,
    F: ImpactForecaster,
{
    let config = *ctx.config();
    let t0 = ctx.time_origin();

    if ctx.now() >= t0 + config.acquisition_window {
        ctx.mark_acquisition_ended();
        ranger.select_device(RangeDevice::None);
        return Mode::ImpactForecast;
    }

    let angle = propagator.zenith_angle(ctx.now());
    let device = select_ranger(angle, config.ranger_half_fov_deg);
    ranger.select_device(device);

    if device == RangeDevice::None {
        propagator.advance(config.idle_step);
        return Mode::DistanceAcquisition;
    }

    ranger.sample();
    forecaster.add_sample(ctx.elapsed(), ranger.distance());
    propagator.advance(config.sampling_step);

    Mode::DistanceAcquisition
}

/// Predicts impact and decides whether, when, and which way to run the motor.
pub fn impact_forecast<T, P, F>(
    ctx: &mut MissionContext,
    telemetry: &mut T,
    propagator: &P,
    forecaster: &F,
) -> Mode
where
    T: Telemetry,
    P: AttitudePropagator,
    F: ImpactForecaster,
{
    let t0 = ctx.time_origin();
    let predicted = ctx.mark_impact_predicted(forecaster.predict_impact_time() + t0);
    telemetry.add_note_fmt(format_args!(
        "Predicted T2-T0={}[msec]",
        predicted.saturating_sub(t0)
    ));

    let angle = propagator.zenith_angle(predicted);
    telemetry.add_note_fmt(format_args!("Predicted Ang@T2={angle:.2}[deg]"));

    let Some(start) = forecaster.when_to_start_motor(predicted, angle) else {
        return Mode::Error;
    };
    let start = ctx.mark_motor_start(start);

    // A start at or past the predicted impact leaves no run time either.
    if predicted.saturating_sub(start) < ctx.config().minimal_motor_activity {
        return Mode::WaitForEngineShutdown;
    }

    ctx.set_polarization(MotorPolarization::for_impact_angle(angle));
    Mode::WaitForEngineStart
}

/// Fires the motor once its start time arrives.
pub fn wait_for_engine_start<T, M>(
    ctx: &mut MissionContext,
    telemetry: &mut T,
    motor: &mut M,
) -> Mode
where
    T: Telemetry,
    M: MotorDriver,
{
    let (Some(start), Some(polarization)) = (ctx.motor_start_at(), ctx.polarization()) else {
        return Mode::Error;
    };
    if ctx.now() < start {
        return Mode::WaitForEngineStart;
    }

    telemetry.add_note("Motor Start");
    if ctx.claim_motor_start() {
        motor.start(polarization);
    }

    Mode::WaitForEngineShutdown
}

/// Brakes on early impact or once the predicted impact time passes.
pub fn wait_for_engine_shutdown<T, I, M>(
    ctx: &mut MissionContext,
    telemetry: &mut T,
    imu: &mut I,
    motor: &mut M,
) -> Mode
where
    T: Telemetry,
    I: InertialSensor,
    M: MotorDriver,
{
    let deadline = ctx.impact_predicted_at().unwrap_or(Millis::ZERO);
    if ctx.now() >= deadline {
        motor.brake();
        telemetry.add_note("Motor Break");
        return Mode::Impact;
    }

    imu.sample();
    if imu.acceleration_magnitude() > ctx.config().restored_threshold_g {
        motor.brake();
        telemetry.add_note("Motor Break, Impact");
        return Mode::Impact;
    }

    Mode::WaitForEngineShutdown
}

/// Confirms impact from the accelerometer and logs the observed outcome.
pub fn impact<T, I>(ctx: &mut MissionContext, telemetry: &mut T, imu: &mut I) -> Mode
where
    T: Telemetry,
    I: InertialSensor,
{
    imu.sample();
    if imu.acceleration_magnitude() <= ctx.config().restored_threshold_g {
        return Mode::Impact;
    }

    let angle = imu.zenith_angle();
    let actual = ctx.mark_impact_actual();
    telemetry.add_note("Impact!");
    telemetry.add_note_fmt(format_args!(
        "Actual T2-T0={}[msec]",
        actual.saturating_sub(ctx.time_origin())
    ));
    telemetry.add_note_fmt(format_args!("Actual AngT2={angle:.2}[deg]"));

    Mode::StandBy
}

/// Returns to stand-by; the next cycle starts fresh.
#[must_use]
pub const fn error() -> Mode {
    Mode::StandBy
}
