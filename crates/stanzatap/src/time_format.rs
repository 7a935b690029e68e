//! Fixed-width formatting of the time between two logged stanzas.
//!
//! Every bracket renders to a column-aligned string so a live log can be
//! scanned quickly:
//!
//! | delta (ms)    | output    |
//! |---------------|-----------|
//! | 0..=9         | `+Nms  `  |
//! | 10..=99       | `+NNms `  |
//! | 100..=999     | `+NNNms`  |
//! | 1000..=9999   | `+N.NNs`  |
//! | 10000..=59999 | `+NN.Ns`  |
//! | 60000..       | `+MmSs`   |
//!
//! Fractions are truncated, never rounded, so `9999` is `+9.99s` and not
//! `+10.0s`.

const ONE_SECOND: u64 = 1_000;
const ONE_MINUTE: u64 = 60 * ONE_SECOND;

/// Format a millisecond delta.
///
/// Negative deltas (a clock step backwards) keep the same layout with a `-`
/// sign.
#[must_use]
pub fn format_delta(delta_ms: i64) -> String {
    let sign = if delta_ms >= 0 { '+' } else { '-' };
    let ms = delta_ms.unsigned_abs();

    match ms {
        0..=9 => format!("{sign}{ms}ms  "),
        10..=99 => format!("{sign}{ms}ms "),
        100..=999 => format!("{sign}{ms}ms"),
        1_000..=9_999 => {
            let hundredths = (ms % ONE_SECOND) / 10;
            format!("{sign}{}.{hundredths:02}s", ms / ONE_SECOND)
        }
        10_000..=59_999 => {
            let tenths = (ms % ONE_SECOND) / 100;
            format!("{sign}{}.{tenths}s", ms / ONE_SECOND)
        }
        _ => {
            let mins = ms / ONE_MINUTE;
            let secs = (ms % ONE_MINUTE) / ONE_SECOND;
            format!("{sign}{mins}m{secs}s")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_millisecond_brackets_are_padded() {
        assert_eq!(format_delta(0), "+0ms  ");
        assert_eq!(format_delta(9), "+9ms  ");
        assert_eq!(format_delta(10), "+10ms ");
        assert_eq!(format_delta(99), "+99ms ");
        assert_eq!(format_delta(100), "+100ms");
        assert_eq!(format_delta(999), "+999ms");
    }

    #[test]
    fn test_seconds_two_decimals() {
        assert_eq!(format_delta(1_000), "+1.00s");
        assert_eq!(format_delta(1_500), "+1.50s");
        assert_eq!(format_delta(1_005), "+1.00s");
        assert_eq!(format_delta(9_999), "+9.99s");
    }

    #[test]
    fn test_seconds_one_decimal() {
        assert_eq!(format_delta(10_000), "+10.0s");
        assert_eq!(format_delta(12_345), "+12.3s");
        assert_eq!(format_delta(59_999), "+59.9s");
    }

    #[test]
    fn test_minutes() {
        assert_eq!(format_delta(60_000), "+1m0s");
        assert_eq!(format_delta(65_000), "+1m5s");
        assert_eq!(format_delta(125_999), "+2m5s");
        assert_eq!(format_delta(3_600_000), "+60m0s");
    }

    #[test]
    fn test_negative_delta() {
        assert_eq!(format_delta(-5), "-5ms  ");
        assert_eq!(format_delta(-1_500), "-1.50s");
        assert_eq!(format_delta(-65_000), "-1m5s");
    }

    fn magnitude(formatted: &str) -> f64 {
        let body = &formatted[1..];
        let body = body.trim_end();
        if let Some(ms) = body.strip_suffix("ms") {
            ms.parse::<f64>().unwrap()
        } else if let Some((mins, secs)) = body.split_once('m') {
            let secs = secs.trim_end_matches('s');
            mins.parse::<f64>().unwrap() * 60_000.0 + secs.parse::<f64>().unwrap() * 1_000.0
        } else {
            body.trim_end_matches('s').parse::<f64>().unwrap() * 1_000.0
        }
    }

    proptest! {
        #[test]
        fn prop_sub_minute_output_is_six_wide(ms in 0i64..60_000) {
            prop_assert_eq!(format_delta(ms).chars().count(), 6);
        }

        #[test]
        fn prop_display_never_exceeds_input(ms in 0i64..10_000_000) {
            #[allow(clippy::cast_precision_loss)]
            let exact = ms as f64;
            prop_assert!(magnitude(&format_delta(ms)) <= exact + 1e-6);
        }

        #[test]
        fn prop_monotonic_within_bracket(a in 0i64..10_000_000, b in 0i64..10_000_000) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(magnitude(&format_delta(lo)) <= magnitude(&format_delta(hi)) + 1e-6);
        }
    }
}
