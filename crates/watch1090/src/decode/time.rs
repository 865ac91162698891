/*!
 * Timestamp helpers. Frames are stamped with Unix seconds as an `f64`
 * when they are received; Beast records additionally carry a device
 * timestamp counted by the receiver's 12 MHz clock, kept only as an
 * annotation (receiver clocks are not comparable across devices).
 */
use std::time::{SystemTime, UNIX_EPOCH};

/// Ticks of the Beast 12 MHz sample clock per second
pub const BEAST_TICKS_PER_S: u64 = 12_000_000;

pub fn now_in_s() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("SystemTime before unix epoch")
        .as_secs_f64()
}

/// Convert a 48-bit Beast device timestamp to seconds since the
/// receiver started counting.
pub fn beast_ticks_to_s(ticks: u64) -> f64 {
    ticks as f64 / BEAST_TICKS_PER_S as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn beast_clock_conversion() {
        assert_eq!(beast_ticks_to_s(12_000_000), 1.0);
        assert_eq!(beast_ticks_to_s(6_000_000), 0.5);
    }
}
