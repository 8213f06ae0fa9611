#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Last published controller snapshot.
//!
//! The control task stores a copy after every iteration so the panic handler
//! and an attached debugger can see where the loop stood without touching
//! the controller itself.

use flight_core::controller::{HaltReason, MissionSnapshot};
use flight_core::mode::Mode;
use flight_core::time::Millis;
use portable_atomic::{AtomicBool, AtomicU8, AtomicU32, Ordering};

const NO_MODE: u8 = u8::MAX;
const NOT_HALTED: u8 = 0;
const HALTED_POST_FALL: u8 = 1;
const HALTED_ABSOLUTE: u8 = 2;

static MODE: AtomicU8 = AtomicU8::new(NO_MODE);
/// Milliseconds since boot, +1 (0 == unset).
static FALL_DETECTED_AT: AtomicU32 = AtomicU32::new(0);
/// Milliseconds since boot, +1 (0 == unset).
static IMPACT_PREDICTED_AT: AtomicU32 = AtomicU32::new(0);
static MOTOR_STARTED: AtomicBool = AtomicBool::new(false);
static HALT: AtomicU8 = AtomicU8::new(NOT_HALTED);
static ITERATIONS: AtomicU32 = AtomicU32::new(0);

/// Read-back of the last published snapshot.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PublishedStatus {
    pub mode: Option<Mode>,
    pub fall_detected_at: Option<Millis>,
    pub impact_predicted_at: Option<Millis>,
    pub motor_started: bool,
    pub halted: Option<HaltReason>,
    pub iterations: u32,
}

fn encode_millis(value: Option<Millis>) -> u32 {
    value.map_or(0, |millis| millis.as_u32().saturating_add(1))
}

fn decode_millis(raw: u32) -> Option<Millis> {
    raw.checked_sub(1).map(Millis::new)
}

const fn encode_halt(halted: Option<HaltReason>) -> u8 {
    match halted {
        None => NOT_HALTED,
        Some(HaltReason::PostFallTimeout) => HALTED_POST_FALL,
        Some(HaltReason::AbsoluteTimeout) => HALTED_ABSOLUTE,
    }
}

const fn decode_halt(raw: u8) -> Option<HaltReason> {
    match raw {
        HALTED_POST_FALL => Some(HaltReason::PostFallTimeout),
        HALTED_ABSOLUTE => Some(HaltReason::AbsoluteTimeout),
        _ => None,
    }
}

/// Stores `snapshot` for later inspection.
pub fn publish(snapshot: &MissionSnapshot) {
    MODE.store(snapshot.mode.code(), Ordering::Relaxed);
    FALL_DETECTED_AT.store(encode_millis(snapshot.fall_detected_at), Ordering::Relaxed);
    IMPACT_PREDICTED_AT.store(encode_millis(snapshot.impact_predicted_at), Ordering::Relaxed);
    MOTOR_STARTED.store(snapshot.motor_started, Ordering::Relaxed);
    HALT.store(encode_halt(snapshot.halted), Ordering::Relaxed);
    ITERATIONS.store(snapshot.iterations, Ordering::Relaxed);
}

/// Mode of the last published snapshot, if any.
#[must_use]
pub fn last_mode() -> Option<Mode> {
    Mode::from_code(MODE.load(Ordering::Relaxed))
}

#[must_use]
pub fn published() -> PublishedStatus {
    PublishedStatus {
        mode: last_mode(),
        fall_detected_at: decode_millis(FALL_DETECTED_AT.load(Ordering::Relaxed)),
        impact_predicted_at: decode_millis(IMPACT_PREDICTED_AT.load(Ordering::Relaxed)),
        motor_started: MOTOR_STARTED.load(Ordering::Relaxed),
        halted: decode_halt(HALT.load(Ordering::Relaxed)),
        iterations: ITERATIONS.load(Ordering::Relaxed),
    }
}
