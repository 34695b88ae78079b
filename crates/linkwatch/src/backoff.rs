//! Capped exponential backoff shared by probing and reconnection.

use std::time::Duration;

/// Largest exponent applied to a backoff factor.
pub const MAX_BACKOFF_EXPONENT: u32 = 5;

/// Delay after `count` consecutive failures:
/// `base * factor ^ min(MAX_BACKOFF_EXPONENT, count)`.
pub fn delay(base: Duration, factor: f64, count: u32) -> Duration {
    delay_capped(base, factor, count, MAX_BACKOFF_EXPONENT)
}

/// Same as [`delay`] with an explicit exponent cap.
///
/// Saturates at `Duration::MAX` when the product is out of range.
pub fn delay_capped(base: Duration, factor: f64, count: u32, cap: u32) -> Duration {
    let exponent = count.min(cap) as i32;
    let scale = factor.powi(exponent);
    if scale == 1.0 {
        return base;
    }
    Duration::try_from_secs_f64(base.as_secs_f64() * scale).unwrap_or(Duration::MAX)
}
