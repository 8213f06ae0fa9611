use heapless::HistoryBuf;

use crate::capabilities::{AngularRate, AttitudePropagator, Quaternion};
use crate::time::Millis;

/// Grid points retained by [`RateIntegrator`].
pub const HISTORY_DEPTH: usize = 64;

#[derive(Copy, Clone, Debug, PartialEq)]
struct GridPoint {
    at: Millis,
    orientation: Quaternion,
}

/// Constant body-rate attitude integrator.
///
/// `advance` appends grid points by integrating the seed rate; queries start
/// from the newest grid point at or before the requested time and extrapolate
/// the remainder with the same rate. Times older than the retained grid are
/// extrapolated backwards from the oldest point.
pub struct RateIntegrator {
    rate: AngularRate,
    grid: HistoryBuf<GridPoint, HISTORY_DEPTH>,
}

impl RateIntegrator {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            rate: AngularRate::new(0.0, 0.0, 0.0),
            grid: HistoryBuf::new(),
        }
    }

    /// Time of the newest grid point, if seeded.
    #[must_use]
    pub fn horizon(&self) -> Option<Millis> {
        self.grid.recent().map(|point| point.at)
    }

    fn anchor(&self, at: Millis) -> Option<GridPoint> {
        let mut anchor = None;
        for point in self.grid.oldest_ordered() {
            if point.at <= at || anchor.is_none() {
                anchor = Some(*point);
            }
        }
        anchor
    }
}

impl Default for RateIntegrator {
    fn default() -> Self {
        Self::new()
    }
}

impl AttitudePropagator for RateIntegrator {
    fn seed(&mut self, t0: Millis, orientation: Quaternion, rate: AngularRate) {
        self.grid.clear();
        self.rate = rate;
        self.grid.write(GridPoint {
            at: t0,
            orientation: orientation.normalized(),
        });
    }

    fn advance(&mut self, step: Millis) {
        let Some(last) = self.grid.recent().copied() else {
            return;
        };
        self.grid.write(GridPoint {
            at: last.at + step,
            orientation: last.orientation.rotated(self.rate, step.as_f32()),
        });
    }

    fn zenith_angle(&self, at: Millis) -> f32 {
        match self.anchor(at) {
            Some(anchor) => anchor
                .orientation
                .rotated(self.rate, span_ms(anchor.at, at))
                .zenith_angle(),
            None => 0.0,
        }
    }
}

/// Signed milliseconds from `from` to `to`.
fn span_ms(from: Millis, to: Millis) -> f32 {
    if to >= from {
        to.saturating_sub(from).as_f32()
    } else {
        -from.saturating_sub(to).as_f32()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deg_per_sec(value: f32) -> AngularRate {
        AngularRate::new(value.to_radians(), 0.0, 0.0)
    }

    fn assert_close(actual: f32, expected: f32) {
        let diff = actual - expected;
        assert!(diff < 0.05 && diff > -0.05, "{actual} != {expected}");
    }

    #[test]
    fn unseeded_integrator_reports_upright() {
        let integrator = RateIntegrator::new();
        assert_close(integrator.zenith_angle(Millis::new(500)), 0.0);
        assert_eq!(integrator.horizon(), None);
    }

    #[test]
    fn constant_rate_extrapolates_from_seed() {
        let mut integrator = RateIntegrator::new();
        integrator.seed(Millis::new(100), Quaternion::about_x(10.0), deg_per_sec(100.0));

        assert_close(integrator.zenith_angle(Millis::new(100)), 10.0);
        assert_close(integrator.zenith_angle(Millis::new(300)), 30.0);
    }

    #[test]
    fn grid_and_extrapolation_agree() {
        let mut integrator = RateIntegrator::new();
        integrator.seed(Millis::ZERO, Quaternion::about_x(-20.0), deg_per_sec(50.0));
        for _ in 0..10 {
            integrator.advance(Millis::new(20));
        }

        assert_eq!(integrator.horizon(), Some(Millis::new(200)));
        assert_close(integrator.zenith_angle(Millis::new(150)), -12.5);
        assert_close(integrator.zenith_angle(Millis::new(400)), 0.0);
    }

    #[test]
    fn queries_behind_the_retained_grid_extrapolate_backwards() {
        let mut integrator = RateIntegrator::new();
        integrator.seed(Millis::ZERO, Quaternion::about_x(0.0), deg_per_sec(10.0));
        for _ in 0..(HISTORY_DEPTH * 2) {
            integrator.advance(Millis::new(10));
        }

        assert_close(integrator.zenith_angle(Millis::new(500)), 5.0);
    }

    #[test]
    fn wraps_through_half_turn() {
        let mut integrator = RateIntegrator::new();
        integrator.seed(Millis::ZERO, Quaternion::about_x(170.0), deg_per_sec(100.0));
        integrator.advance(Millis::new(2));

        assert_close(integrator.zenith_angle(Millis::new(200)), -170.0);
    }

    #[test]
    fn reseeding_discards_previous_grid() {
        let mut integrator = RateIntegrator::new();
        integrator.seed(Millis::ZERO, Quaternion::about_x(45.0), deg_per_sec(10.0));
        integrator.advance(Millis::new(20));
        integrator.seed(Millis::new(1_000), Quaternion::IDENTITY, AngularRate::default());

        assert_eq!(integrator.horizon(), Some(Millis::new(1_000)));
        assert_close(integrator.zenith_angle(Millis::new(1_500)), 0.0);
    }
}
