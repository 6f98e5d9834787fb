// crates/playback-types/src/time_base.rs
//
// Rational stream time-base, replacing the ad-hoc `pts * num / den` math
// scattered through the original decoder in favor of one small, testable type.

/// A stream time-base expressed as `num/den` seconds per tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimeBase {
    pub num: i32,
    pub den: i32,
}

impl TimeBase {
    pub fn new(num: i32, den: i32) -> Self {
        debug_assert!(den != 0, "TimeBase: denominator must be non-zero");
        Self { num, den }
    }

    /// Convert a raw PTS (relative to `start_pts`) to milliseconds.
    pub fn pts_to_ms(&self, pts: i64, start_pts: i64) -> f64 {
        (pts - start_pts) as f64 * self.num as f64 / self.den as f64 * 1000.0
    }

    /// Convert seconds to a raw PTS in this time base.
    pub fn secs_to_pts(&self, secs: f64) -> i64 {
        (secs * self.den as f64 / self.num as f64) as i64
    }

    /// Convert a raw PTS to seconds (no start offset).
    pub fn pts_to_secs(&self, pts: i64) -> f64 {
        pts as f64 * self.num as f64 / self.den as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ntsc_round_trip() {
        let tb = TimeBase::new(1, 90000);
        let pts = tb.secs_to_pts(2.5);
        assert_eq!(pts, 225_000);
        assert!((tb.pts_to_ms(pts, 0) - 2500.0).abs() < 1e-6);
    }

    #[test]
    fn start_pts_offset_is_subtracted() {
        let tb = TimeBase::new(1, 1000);
        // start_pts of 500 means a raw pts of 1500 is 1 second (1000ms) in.
        assert!((tb.pts_to_ms(1500, 500) - 1000.0).abs() < 1e-9);
    }
}
