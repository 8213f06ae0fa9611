//! Controller modes shared by firmware and host targets.

use core::fmt;

/// Active state of the control loop. Exactly one is active per iteration.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Mode {
    BootUp,
    StandBy,
    DistanceAcquisition,
    ImpactForecast,
    WaitForEngineStart,
    WaitForEngineShutdown,
    Impact,
    Error,
}

impl Mode {
    /// Every mode, in code order.
    pub const ALL: [Mode; 8] = [
        Mode::BootUp,
        Mode::StandBy,
        Mode::DistanceAcquisition,
        Mode::ImpactForecast,
        Mode::WaitForEngineStart,
        Mode::WaitForEngineShutdown,
        Mode::Impact,
        Mode::Error,
    ];

    /// Compact numeric code used by status snapshots and legacy log tooling.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Mode::BootUp => 0,
            Mode::StandBy => 1,
            Mode::DistanceAcquisition => 2,
            Mode::ImpactForecast => 3,
            Mode::WaitForEngineStart => 4,
            Mode::WaitForEngineShutdown => 5,
            Mode::Impact => 6,
            Mode::Error => 7,
        }
    }

    /// Decodes a numeric code produced by [`Mode::code`].
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Mode::BootUp),
            1 => Some(Mode::StandBy),
            2 => Some(Mode::DistanceAcquisition),
            3 => Some(Mode::ImpactForecast),
            4 => Some(Mode::WaitForEngineStart),
            5 => Some(Mode::WaitForEngineShutdown),
            6 => Some(Mode::Impact),
            7 => Some(Mode::Error),
            _ => None,
        }
    }

    /// Label written into the telemetry `LogicState` column.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Mode::BootUp => "BOOT_UP",
            Mode::StandBy => "STAND_BY",
            Mode::DistanceAcquisition => "DISTANCE_ACQUISITION",
            Mode::ImpactForecast => "IMPACT_FORECAST",
            Mode::WaitForEngineStart => "WAIT_FOR_ENGINE_START",
            Mode::WaitForEngineShutdown => "WAIT_FOR_ENGINE_SHUTDOWN",
            Mode::Impact => "IMPACT",
            Mode::Error => "ERROR",
        }
    }

    /// Returns `true` for the modes that belong to an in-progress fall cycle.
    #[must_use]
    pub const fn is_falling(self) -> bool {
        matches!(
            self,
            Mode::DistanceAcquisition
                | Mode::ImpactForecast
                | Mode::WaitForEngineStart
                | Mode::WaitForEngineShutdown
        )
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
