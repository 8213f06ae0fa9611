//! Raw signal conversions shared by the board drivers.
//!
//! Kept free of HAL types so the arithmetic is checked by host tests.

/// Speed of sound at room temperature.
pub const SPEED_OF_SOUND_M_PER_S: f32 = 343.0;

/// Longest echo the ping sensors report; anything longer reads as no echo.
pub const ECHO_TIMEOUT_US: u32 = 18_500;

/// 12-bit converter full scale.
pub const ADC_FULL_SCALE: f32 = 4_095.0;

pub const ADC_REFERENCE_VOLTS: f32 = 3.3;

/// Capacitor sense divider, 20k over 10k.
pub const CAPACITOR_DIVIDER: f32 = 3.0;

/// Converts a round-trip echo width to a one-way distance. Missing or timed
/// out echoes read as 0 m.
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn echo_to_metres(echo_us: u32) -> f32 {
    if echo_us == 0 || echo_us >= ECHO_TIMEOUT_US {
        return 0.0;
    }
    echo_us as f32 * SPEED_OF_SOUND_M_PER_S / 2.0 / 1_000_000.0
}

/// Capacitor voltage from a raw reading of the divided sense line.
#[must_use]
pub fn adc_to_volts(raw: u16) -> f32 {
    f32::from(raw) / ADC_FULL_SCALE * ADC_REFERENCE_VOLTS * CAPACITOR_DIVIDER
}
