//! Millisecond timestamps and the clock capability driving the control loop.
//!
//! Every milestone the controller tracks lives on one monotonic millisecond
//! clock that starts at boot. [`Millis`] wraps the raw counter so timestamps and
//! durations cannot be mixed up with sensor readings, and all arithmetic
//! saturates instead of wrapping.

use core::{fmt, ops::Add};

/// Monotonic milliseconds since boot, or a millisecond duration.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Millis(u32);

impl Millis {
    pub const ZERO: Self = Self(0);

    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn from_secs(seconds: u32) -> Self {
        Self(seconds.saturating_mul(1_000))
    }

    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Returns `self - earlier`, clamped at zero.
    #[must_use]
    pub const fn saturating_sub(self, earlier: Self) -> Self {
        Self(self.0.saturating_sub(earlier.0))
    }

    #[must_use]
    pub const fn saturating_add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }

    /// Lossy conversion used when the value is written into a telemetry field.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f32(self) -> f32 {
        self.0 as f32
    }
}

impl Add for Millis {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        self.saturating_add(rhs)
    }
}

impl From<u32> for Millis {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl fmt::Display for Millis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Time base consumed by the control loop.
///
/// `delay` is the only way the loop stalls: the caller blocks for the given
/// duration and no other state evaluation happens meanwhile. Hosted builds bind
/// this to a simulated clock so stalls cost no wall-clock time.
pub trait Clock {
    /// Samples the monotonic clock.
    fn now(&mut self) -> Millis;

    /// Stalls for `duration`.
    fn delay(&mut self, duration: Millis);
}
