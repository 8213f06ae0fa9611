use heapless::Vec;

use crate::capabilities::{FORECAST_FAILED, ImpactForecaster, motor_start_from_raw};
use crate::time::Millis;

/// Distance observations retained per fall.
pub const MAX_SAMPLES: usize = 64;

/// Standard gravity in m/ms².
pub const GRAVITY_M_PER_MS2: f32 = 9.806_65e-6;

/// Rate at which the corrective motor rights the device, in degrees per ms.
pub const DEFAULT_SLEW_DEG_PER_MS: f32 = 1.5;

#[derive(Copy, Clone, Debug, PartialEq)]
struct Sample {
    elapsed_ms: f32,
    distance_m: f32,
}

/// Height and downward speed at fall detection.
#[derive(Copy, Clone, Debug, PartialEq)]
struct Fit {
    height_m: f32,
    speed_m_per_ms: f32,
}

/// Least-squares ballistic impact forecaster.
///
/// Fits `d(t) = h - v*t - g*t²/2` to the collected (elapsed, distance)
/// samples. Samples beyond [`MAX_SAMPLES`] are ignored.
pub struct BallisticForecaster {
    samples: Vec<Sample, MAX_SAMPLES>,
    slew_deg_per_ms: f32,
}

impl BallisticForecaster {
    #[must_use]
    pub const fn new() -> Self {
        Self::with_slew_rate(DEFAULT_SLEW_DEG_PER_MS)
    }

    #[must_use]
    pub const fn with_slew_rate(slew_deg_per_ms: f32) -> Self {
        Self {
            samples: Vec::new(),
            slew_deg_per_ms,
        }
    }

    #[must_use]
    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    fn fit(&self) -> Option<Fit> {
        let first = self.samples.first()?;

        // Removing the gravity term leaves a straight line y = h - v*t.
        let lifted = |sample: &Sample| {
            sample.distance_m + 0.5 * GRAVITY_M_PER_MS2 * sample.elapsed_ms * sample.elapsed_ms
        };

        let fit = if self.samples.len() == 1 {
            Fit {
                height_m: lifted(first),
                speed_m_per_ms: 0.0,
            }
        } else {
            #[allow(clippy::cast_precision_loss)]
            let count = self.samples.len() as f32;
            let mean_t = self.samples.iter().map(|s| s.elapsed_ms).sum::<f32>() / count;
            let mean_y = self.samples.iter().map(lifted).sum::<f32>() / count;

            let mut sxx = 0.0;
            let mut sxy = 0.0;
            for sample in &self.samples {
                let dt = sample.elapsed_ms - mean_t;
                sxx += dt * dt;
                sxy += dt * (lifted(sample) - mean_y);
            }

            if sxx <= f32::EPSILON {
                Fit {
                    height_m: mean_y,
                    speed_m_per_ms: 0.0,
                }
            } else {
                let slope = sxy / sxx;
                Fit {
                    height_m: mean_y - slope * mean_t,
                    speed_m_per_ms: -slope,
                }
            }
        };

        (fit.height_m.is_finite() && fit.height_m > 0.0 && fit.speed_m_per_ms.is_finite())
            .then_some(fit)
    }

    /// Positive root of `g*t²/2 + v*t - h = 0`, in ms.
    fn time_to_impact(fit: Fit) -> Option<f32> {
        let v = fit.speed_m_per_ms;
        let discriminant = v * v + 2.0 * GRAVITY_M_PER_MS2 * fit.height_m;
        let t = (libm::sqrtf(discriminant) - v) / GRAVITY_M_PER_MS2;
        (t.is_finite() && t > 0.0).then_some(t)
    }

    /// Motor start time in the forecaster's raw encoding, `FORECAST_FAILED` on failure.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn motor_start_raw(&self, impact_at: Millis, angle_deg: f32) -> u32 {
        if self.fit().is_none() || !angle_deg.is_finite() {
            return FORECAST_FAILED;
        }
        let magnitude = if angle_deg < 0.0 { -angle_deg } else { angle_deg };
        let lead = magnitude / self.slew_deg_per_ms;
        let impact = impact_at.as_f32();
        if !lead.is_finite() || lead > impact {
            return FORECAST_FAILED;
        }
        libm::roundf(impact - lead) as u32
    }
}

impl Default for BallisticForecaster {
    fn default() -> Self {
        Self::new()
    }
}

impl ImpactForecaster for BallisticForecaster {
    fn init(&mut self) {
        self.samples.clear();
    }

    fn add_sample(&mut self, elapsed: Millis, distance_m: f32) {
        if !distance_m.is_finite() || distance_m <= 0.0 {
            return;
        }
        // Full buffer keeps the earliest samples.
        let _ = self.samples.push(Sample {
            elapsed_ms: elapsed.as_f32(),
            distance_m,
        });
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn predict_impact_time(&self) -> Millis {
        self.fit()
            .and_then(Self::time_to_impact)
            .map_or(Millis::ZERO, |t| Millis::new(libm::roundf(t) as u32))
    }

    fn when_to_start_motor(&self, impact_at: Millis, angle_deg: f32) -> Option<Millis> {
        motor_start_from_raw(self.motor_start_raw(impact_at, angle_deg))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drop_from(height_m: f32, speed_m_per_ms: f32, at_ms: f32) -> f32 {
        height_m - speed_m_per_ms * at_ms - 0.5 * GRAVITY_M_PER_MS2 * at_ms * at_ms
    }

    #[test]
    fn empty_forecaster_fails() {
        let forecaster = BallisticForecaster::new();
        assert_eq!(forecaster.predict_impact_time(), Millis::ZERO);
        assert_eq!(
            forecaster.when_to_start_motor(Millis::new(1_000), 10.0),
            None
        );
    }

    #[test]
    fn recovers_drop_from_rest() {
        let mut forecaster = BallisticForecaster::new();
        for step in 0..10u16 {
            let t = f32::from(step) * 10.0 + 20.0;
            forecaster.add_sample(Millis::new(u32::from(step) * 10 + 20), drop_from(1.0, 0.0, t));
        }

        // sqrt(2 * 1 m / g) = 451.6 ms
        let predicted = forecaster.predict_impact_time().as_u32();
        assert!((450..=453).contains(&predicted), "predicted {predicted}");
    }

    #[test]
    fn single_sample_assumes_zero_speed() {
        let mut forecaster = BallisticForecaster::new();
        forecaster.add_sample(Millis::ZERO, 0.5);

        let predicted = forecaster.predict_impact_time().as_u32();
        assert!((318..=321).contains(&predicted), "predicted {predicted}");
    }

    #[test]
    fn motor_leads_impact_by_slew_time() {
        let mut forecaster = BallisticForecaster::new();
        forecaster.add_sample(Millis::ZERO, 0.5);

        assert_eq!(
            forecaster.when_to_start_motor(Millis::new(1_000), -150.0),
            Some(Millis::new(900))
        );
        assert_eq!(
            forecaster.when_to_start_motor(Millis::new(1_000), 3.0),
            Some(Millis::new(998))
        );
    }

    #[test]
    fn rejects_unusable_inputs() {
        let mut forecaster = BallisticForecaster::new();
        forecaster.add_sample(Millis::ZERO, 0.5);
        forecaster.add_sample(Millis::new(5), f32::NAN);
        assert_eq!(forecaster.sample_count(), 1);

        assert_eq!(
            forecaster.when_to_start_motor(Millis::new(1_000), f32::INFINITY),
            None
        );
        assert_eq!(forecaster.when_to_start_motor(Millis::new(50), 180.0), None);
    }

    #[test]
    fn init_discards_samples() {
        let mut forecaster = BallisticForecaster::new();
        forecaster.add_sample(Millis::ZERO, 0.5);
        forecaster.init();
        assert_eq!(forecaster.sample_count(), 0);
        assert_eq!(forecaster.predict_impact_time(), Millis::ZERO);
    }
}
