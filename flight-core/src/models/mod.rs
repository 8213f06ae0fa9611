//! Reference collaborator models.
//!
//! These bind the attitude and forecast capabilities for the firmware and the
//! emulator. Either can be swapped for a better model without touching the
//! control loop.

mod forecast;
mod propagator;

pub use forecast::{BallisticForecaster, DEFAULT_SLEW_DEG_PER_MS, GRAVITY_M_PER_MS2, MAX_SAMPLES};
pub use propagator::{HISTORY_DEPTH, RateIntegrator};
