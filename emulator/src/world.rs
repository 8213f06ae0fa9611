//! Simulated drop rig for hosted runs.
//!
//! A [`World`] models one device held at rest, released at a fixed height and
//! tumbling about its x axis at a constant rate until it lands. The fakes in
//! this module read the world at the current simulated time, so the real
//! controller, attitude integrator and forecaster run against it unmodified.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use flight_core::capabilities::{
    AngularRate, InertialSensor, MotorDriver, PowerIndicator, Quaternion, RangeDevice,
    RangeFinder, RangeReading, SafetyInterlock,
};
use flight_core::time::{Clock, Millis};

const GRAVITY_M_PER_S2: f32 = 9.806_65;

const RESTING_G: f32 = 1.0;
const FREE_FALL_G: f32 = 0.02;
const IMPACT_SPIKE_G: f32 = 4.0;
const IMPACT_SPIKE_MS: f32 = 25.0;

const SUPPLY_VOLTS: f32 = 6.3;
const LOADED_VOLTS: f32 = 5.2;

/// Simulated time consumed by every clock read.
const LOOP_COST: Millis = Millis::new(1);

/// Shape of one simulated drop.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DropProfile {
    pub release_at: Millis,
    pub height_m: f32,
    pub start_angle_deg: f32,
    pub rate_deg_per_s: f32,
    /// Interlock polls that still read as plugged.
    pub plugged_polls: u32,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MotorCommand {
    Forward,
    Backward,
    Brake,
}

impl fmt::Display for MotorCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MotorCommand::Forward => "forward",
            MotorCommand::Backward => "backward",
            MotorCommand::Brake => "brake",
        })
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
enum Phase {
    Resting,
    Falling { elapsed_ms: f32 },
    Landed { since_ms: f32 },
}

pub struct World {
    profile: DropProfile,
    now: Millis,
    motor_log: Vec<(Millis, MotorCommand)>,
    motor_running: bool,
    power_ok: Option<bool>,
    polls: u32,
}

pub type SharedWorld = Rc<RefCell<World>>;

impl World {
    pub fn new(profile: DropProfile) -> Self {
        Self {
            profile,
            now: Millis::ZERO,
            motor_log: Vec::new(),
            motor_running: false,
            power_ok: None,
            polls: 0,
        }
    }

    pub fn shared(profile: DropProfile) -> SharedWorld {
        Rc::new(RefCell::new(Self::new(profile)))
    }

    pub fn motor_log(&self) -> &[(Millis, MotorCommand)] {
        &self.motor_log
    }

    /// Last state written to the power LED.
    pub fn power_ok(&self) -> Option<bool> {
        self.power_ok
    }

    pub fn fall_duration_ms(&self) -> f32 {
        (2.0 * self.profile.height_m / GRAVITY_M_PER_S2).sqrt() * 1_000.0
    }

    pub fn landing_at_ms(&self) -> f32 {
        self.profile.release_at.as_f32() + self.fall_duration_ms()
    }

    fn phase(&self) -> Phase {
        let now = self.now.as_f32();
        let release = self.profile.release_at.as_f32();
        let landing = self.landing_at_ms();
        if now <= release {
            Phase::Resting
        } else if now < landing {
            Phase::Falling {
                elapsed_ms: now - release,
            }
        } else {
            Phase::Landed {
                since_ms: now - landing,
            }
        }
    }

    fn acceleration_g(&self) -> f32 {
        match self.phase() {
            Phase::Resting => RESTING_G,
            Phase::Falling { .. } => FREE_FALL_G,
            Phase::Landed { since_ms } if since_ms < IMPACT_SPIKE_MS => IMPACT_SPIKE_G,
            Phase::Landed { .. } => RESTING_G,
        }
    }

    fn zenith_angle(&self) -> f32 {
        let spun_ms = match self.phase() {
            Phase::Resting => 0.0,
            Phase::Falling { elapsed_ms } => elapsed_ms,
            Phase::Landed { .. } => self.fall_duration_ms(),
        };
        wrap_degrees(self.profile.start_angle_deg + self.profile.rate_deg_per_s * spun_ms / 1_000.0)
    }

    fn angular_rate(&self) -> AngularRate {
        match self.phase() {
            Phase::Falling { .. } => {
                AngularRate::new(self.profile.rate_deg_per_s.to_radians(), 0.0, 0.0)
            }
            Phase::Resting | Phase::Landed { .. } => AngularRate::default(),
        }
    }

    fn height_m(&self) -> f32 {
        match self.phase() {
            Phase::Resting => self.profile.height_m,
            Phase::Falling { elapsed_ms } => {
                let seconds = elapsed_ms / 1_000.0;
                (self.profile.height_m - 0.5 * GRAVITY_M_PER_S2 * seconds * seconds).max(0.0)
            }
            Phase::Landed { .. } => 0.0,
        }
    }

    fn record_motor(&mut self, command: MotorCommand) {
        self.motor_log.push((self.now, command));
        self.motor_running = command != MotorCommand::Brake;
    }
}

/// Wraps an angle into (-180, 180].
pub fn wrap_degrees(angle: f32) -> f32 {
    let wrapped = (angle + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped <= -180.0 { 180.0 } else { wrapped }
}

/// Clock that charges [`LOOP_COST`] per read and jumps over delays.
pub struct SimClock {
    world: SharedWorld,
}

impl SimClock {
    pub fn new(world: &SharedWorld) -> Self {
        Self {
            world: Rc::clone(world),
        }
    }
}

impl Clock for SimClock {
    fn now(&mut self) -> Millis {
        let mut world = self.world.borrow_mut();
        world.now = world.now + LOOP_COST;
        world.now
    }

    fn delay(&mut self, duration: Millis) {
        let mut world = self.world.borrow_mut();
        world.now = world.now + duration;
    }
}

#[derive(Copy, Clone, Debug, Default)]
struct ImuReading {
    acceleration_g: f32,
    zenith_deg: f32,
    rate: AngularRate,
}

/// IMU latching the world's motion on every `sample`.
pub struct SimImu {
    world: SharedWorld,
    reading: ImuReading,
}

impl SimImu {
    pub fn new(world: &SharedWorld) -> Self {
        Self {
            world: Rc::clone(world),
            reading: ImuReading::default(),
        }
    }
}

impl InertialSensor for SimImu {
    fn init(&mut self) {
        self.reading = ImuReading::default();
    }

    fn sample(&mut self) {
        let world = self.world.borrow();
        self.reading = ImuReading {
            acceleration_g: world.acceleration_g(),
            zenith_deg: world.zenith_angle(),
            rate: world.angular_rate(),
        };
    }

    fn acceleration_magnitude(&self) -> f32 {
        self.reading.acceleration_g
    }

    fn zenith_angle(&self) -> f32 {
        self.reading.zenith_deg
    }

    fn angular_rate(&self) -> AngularRate {
        self.reading.rate
    }

    fn orientation(&self) -> Quaternion {
        Quaternion::about_x(self.reading.zenith_deg)
    }
}

/// Range finder pair reporting the height above ground when either is selected.
pub struct SimRanger {
    world: SharedWorld,
    device: RangeDevice,
    distance_m: f32,
}

impl SimRanger {
    pub fn new(world: &SharedWorld) -> Self {
        Self {
            world: Rc::clone(world),
            device: RangeDevice::None,
            distance_m: 0.0,
        }
    }
}

impl RangeFinder for SimRanger {
    fn init(&mut self) {
        self.device = RangeDevice::None;
        self.distance_m = 0.0;
    }

    fn select_device(&mut self, device: RangeDevice) {
        self.device = device;
    }

    fn sample(&mut self) {
        if self.device != RangeDevice::None {
            self.distance_m = self.world.borrow().height_m();
        }
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

/// Motor recording each command; the supply sags while it runs.
pub struct SimMotor {
    world: SharedWorld,
}

impl SimMotor {
    pub fn new(world: &SharedWorld) -> Self {
        Self {
            world: Rc::clone(world),
        }
    }
}

impl MotorDriver for SimMotor {
    fn init(&mut self) {
        self.world.borrow_mut().motor_running = false;
    }

    fn start_forward(&mut self) {
        self.world.borrow_mut().record_motor(MotorCommand::Forward);
    }

    fn start_backward(&mut self) {
        self.world.borrow_mut().record_motor(MotorCommand::Backward);
    }

    fn brake(&mut self) {
        self.world.borrow_mut().record_motor(MotorCommand::Brake);
    }

    fn input_voltage(&mut self) -> f32 {
        if self.world.borrow().motor_running {
            LOADED_VOLTS
        } else {
            SUPPLY_VOLTS
        }
    }
}

pub struct SimIndicator {
    world: SharedWorld,
}

impl SimIndicator {
    pub fn new(world: &SharedWorld) -> Self {
        Self {
            world: Rc::clone(world),
        }
    }
}

impl PowerIndicator for SimIndicator {
    fn set(&mut self, power_ok: bool) {
        self.world.borrow_mut().power_ok = Some(power_ok);
    }
}

pub struct SimInterlock {
    world: SharedWorld,
}

impl SimInterlock {
    pub fn new(world: &SharedWorld) -> Self {
        Self {
            world: Rc::clone(world),
        }
    }
}

impl SafetyInterlock for SimInterlock {
    fn init(&mut self) {}

    fn is_removed(&mut self) -> bool {
        let mut world = self.world.borrow_mut();
        world.polls += 1;
        world.polls > world.profile.plugged_polls
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_metre_drop() -> SharedWorld {
        World::shared(DropProfile {
            release_at: Millis::new(100),
            height_m: 1.0,
            start_angle_deg: 170.0,
            rate_deg_per_s: 30.0,
            plugged_polls: 0,
        })
    }

    fn set_now(world: &SharedWorld, millis: u32) {
        world.borrow_mut().now = Millis::new(millis);
    }

    #[test]
    fn angles_wrap_into_half_open_range() {
        assert!((wrap_degrees(190.0) + 170.0).abs() < 1e-4);
        assert!((wrap_degrees(-180.0) - 180.0).abs() < 1e-4);
        assert!((wrap_degrees(540.0) - 180.0).abs() < 1e-4);
        assert!((wrap_degrees(-30.0) + 30.0).abs() < 1e-4);
    }

    #[test]
    fn imu_follows_drop_phases() {
        let world = one_metre_drop();
        let mut imu = SimImu::new(&world);

        imu.sample();
        assert!((imu.acceleration_magnitude() - RESTING_G).abs() < 1e-6);
        assert!((imu.zenith_angle() - 170.0).abs() < 1e-3);

        set_now(&world, 400);
        imu.sample();
        assert!(imu.acceleration_magnitude() < 0.3);
        assert!((imu.zenith_angle() - 179.0).abs() < 1e-2);
        assert!(imu.angular_rate().x > 0.0);

        // Lands at 100 + 451.6 ms.
        set_now(&world, 560);
        imu.sample();
        assert!(imu.acceleration_magnitude() > 1.5);
        assert!((imu.angular_rate().norm()).abs() < 1e-6);

        set_now(&world, 700);
        imu.sample();
        assert!((imu.acceleration_magnitude() - RESTING_G).abs() < 1e-6);
    }

    #[test]
    fn ranger_reports_height_only_when_aimed() {
        let world = one_metre_drop();
        let mut ranger = SimRanger::new(&world);
        set_now(&world, 300);

        ranger.sample();
        assert!(ranger.distance() < f32::EPSILON);

        ranger.select_device(RangeDevice::UpFacing);
        ranger.sample();
        // 1 m - g * (0.2 s)^2 / 2
        assert!((ranger.distance() - 0.803_867).abs() < 1e-4);
        assert_eq!(ranger.export().device, RangeDevice::UpFacing);
    }

    #[test]
    fn clock_charges_reads_and_skips_delays() {
        let world = one_metre_drop();
        let mut clock = SimClock::new(&world);

        assert_eq!(clock.now(), Millis::new(1));
        clock.delay(Millis::new(500));
        assert_eq!(clock.now(), Millis::new(502));
    }

    #[test]
    fn motor_log_and_supply_sag() {
        let world = one_metre_drop();
        let mut motor = SimMotor::new(&world);
        set_now(&world, 40);

        assert!(motor.input_voltage() > 6.0);
        motor.start_forward();
        assert!(motor.input_voltage() < 6.0);
        motor.brake();

        assert_eq!(
            world.borrow().motor_log(),
            [
                (Millis::new(40), MotorCommand::Forward),
                (Millis::new(40), MotorCommand::Brake)
            ]
        );
    }
}
