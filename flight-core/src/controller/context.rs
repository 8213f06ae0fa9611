use crate::capabilities::MotorPolarization;
use crate::config::MissionConfig;
use crate::time::Millis;

/// Timers and flags for one fall cycle, owned by the control loop.
///
/// Milestones are set at most once per cycle; later writes are ignored until
/// [`rearm`](Self::rearm) starts the next cycle.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MissionContext {
    config: MissionConfig,
    now: Millis,
    fall_detected_at: Option<Millis>,
    acquisition_ended_at: Option<Millis>,
    motor_start_at: Option<Millis>,
    impact_predicted_at: Option<Millis>,
    impact_actual_at: Option<Millis>,
    polarization: Option<MotorPolarization>,
    motor_started: bool,
}

impl MissionContext {
    #[must_use]
    pub const fn new(config: MissionConfig) -> Self {
        Self {
            config,
            now: Millis::ZERO,
            fall_detected_at: None,
            acquisition_ended_at: None,
            motor_start_at: None,
            impact_predicted_at: None,
            impact_actual_at: None,
            polarization: None,
            motor_started: false,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &MissionConfig {
        &self.config
    }

    /// `t_current` of the running iteration.
    #[must_use]
    pub const fn now(&self) -> Millis {
        self.now
    }

    #[must_use]
    pub const fn fall_detected_at(&self) -> Option<Millis> {
        self.fall_detected_at
    }

    #[must_use]
    pub const fn acquisition_ended_at(&self) -> Option<Millis> {
        self.acquisition_ended_at
    }

    #[must_use]
    pub const fn motor_start_at(&self) -> Option<Millis> {
        self.motor_start_at
    }

    #[must_use]
    pub const fn impact_predicted_at(&self) -> Option<Millis> {
        self.impact_predicted_at
    }

    #[must_use]
    pub const fn impact_actual_at(&self) -> Option<Millis> {
        self.impact_actual_at
    }

    #[must_use]
    pub const fn polarization(&self) -> Option<MotorPolarization> {
        self.polarization
    }

    #[must_use]
    pub const fn motor_started(&self) -> bool {
        self.motor_started
    }

    /// Origin for logged time: fall detection once known, boot before that.
    #[must_use]
    pub fn time_origin(&self) -> Millis {
        self.fall_detected_at.unwrap_or(Millis::ZERO)
    }

    /// Time elapsed since the logged origin.
    #[must_use]
    pub fn elapsed(&self) -> Millis {
        self.now.saturating_sub(self.time_origin())
    }

    pub(crate) fn set_now(&mut self, now: Millis) {
        self.now = now;
    }

    pub(crate) fn mark_fall_detected(&mut self) -> Millis {
        *self.fall_detected_at.get_or_insert(self.now)
    }

    pub(crate) fn mark_acquisition_ended(&mut self) -> Millis {
        *self.acquisition_ended_at.get_or_insert(self.now)
    }

    pub(crate) fn mark_impact_predicted(&mut self, at: Millis) -> Millis {
        *self.impact_predicted_at.get_or_insert(at)
    }

    pub(crate) fn mark_motor_start(&mut self, at: Millis) -> Millis {
        *self.motor_start_at.get_or_insert(at)
    }

    pub(crate) fn mark_impact_actual(&mut self) -> Millis {
        *self.impact_actual_at.get_or_insert(self.now)
    }

    pub(crate) fn set_polarization(&mut self, polarization: MotorPolarization) {
        self.polarization.get_or_insert(polarization);
    }

    /// Records the motor command; returns `false` if one was already issued.
    pub(crate) fn claim_motor_start(&mut self) -> bool {
        !core::mem::replace(&mut self.motor_started, true)
    }

    /// Clears every milestone for the next fall cycle.
    pub fn rearm(&mut self) {
        *self = Self {
            now: self.now,
            ..Self::new(self.config)
        };
    }
}
