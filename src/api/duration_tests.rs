// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for Go-style duration parsing and formatting

#[cfg(test)]
mod tests {
    use super::super::{format_go_duration, mount_attempts_to_timeout, parse_go_duration};
    use crate::errors::DurationError;
    use std::time::Duration;

    // ========================================================================
    // Parsing
    // ========================================================================

    #[test]
    fn test_parse_single_units() {
        assert_eq!(parse_go_duration("10m").unwrap(), Duration::from_secs(600));
        assert_eq!(parse_go_duration("2h").unwrap(), Duration::from_secs(7200));
        assert_eq!(parse_go_duration("45s").unwrap(), Duration::from_secs(45));
        assert_eq!(parse_go_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_go_duration("7us").unwrap(), Duration::from_micros(7));
        assert_eq!(parse_go_duration("7µs").unwrap(), Duration::from_micros(7));
        assert_eq!(parse_go_duration("3ns").unwrap(), Duration::from_nanos(3));
    }

    #[test]
    fn test_parse_compound_and_fraction() {
        assert_eq!(
            parse_go_duration("1h30m").unwrap(),
            Duration::from_secs(5400)
        );
        assert_eq!(
            parse_go_duration("8m32s").unwrap(),
            Duration::from_secs(512)
        );
        assert_eq!(
            parse_go_duration("1.5s").unwrap(),
            Duration::from_millis(1500)
        );
        assert_eq!(parse_go_duration(".5s").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_go_duration("+5s").unwrap(), Duration::from_secs(5));
    }

    #[test]
    fn test_parse_zero() {
        assert_eq!(parse_go_duration("0").unwrap(), Duration::ZERO);
        assert_eq!(parse_go_duration("-0s").unwrap(), Duration::ZERO);
    }

    #[test]
    fn test_parse_rejects_invalid() {
        assert!(matches!(
            parse_go_duration(""),
            Err(DurationError::Invalid(_))
        ));
        assert!(matches!(
            parse_go_duration("10"),
            Err(DurationError::Invalid(_))
        ));
        assert!(matches!(
            parse_go_duration("abc"),
            Err(DurationError::Invalid(_))
        ));
        assert!(matches!(
            parse_go_duration("10x"),
            Err(DurationError::UnknownUnit { .. })
        ));
        assert!(matches!(
            parse_go_duration("10d"),
            Err(DurationError::UnknownUnit { .. })
        ));
    }

    #[test]
    fn test_parse_rejects_negative() {
        assert_eq!(
            parse_go_duration("-5m"),
            Err(DurationError::Negative("-5m".to_string()))
        );
    }

    #[test]
    fn test_parse_rejects_overflow() {
        assert!(matches!(
            parse_go_duration("9999999999999h"),
            Err(DurationError::Overflow(_))
        ));
    }

    // ========================================================================
    // Formatting
    // ========================================================================

    #[test]
    fn test_format_seconds_and_above() {
        assert_eq!(format_go_duration(Duration::from_secs(16)), "16s");
        assert_eq!(format_go_duration(Duration::from_secs(512)), "8m32s");
        assert_eq!(format_go_duration(Duration::from_secs(600)), "10m0s");
        assert_eq!(format_go_duration(Duration::from_secs(3600)), "1h0m0s");
        assert_eq!(format_go_duration(Duration::from_millis(1500)), "1.5s");
    }

    #[test]
    fn test_format_sub_second() {
        assert_eq!(format_go_duration(Duration::ZERO), "0s");
        assert_eq!(format_go_duration(Duration::from_millis(500)), "500ms");
        assert_eq!(format_go_duration(Duration::from_micros(1500)), "1.5ms");
        assert_eq!(format_go_duration(Duration::from_micros(7)), "7µs");
        assert_eq!(format_go_duration(Duration::from_nanos(42)), "42ns");
    }

    #[test]
    fn test_format_parses_back() {
        for input in ["16s", "8m32s", "1h0m0s", "500ms", "1.5s", "2h45m10s"] {
            let parsed = parse_go_duration(input).unwrap();
            assert_eq!(format_go_duration(parsed), input);
        }
    }

    // ========================================================================
    // CSI mount attempts
    // ========================================================================

    #[test]
    fn test_mount_attempts_to_timeout() {
        assert_eq!(mount_attempts_to_timeout(0), "500ms");
        assert_eq!(mount_attempts_to_timeout(1), "1s");
        assert_eq!(mount_attempts_to_timeout(5), "16s");
        assert_eq!(mount_attempts_to_timeout(10), "8m32s");
    }

    #[test]
    fn test_mount_attempts_to_timeout_negative() {
        assert_eq!(mount_attempts_to_timeout(-3), "0s");
    }

    #[test]
    fn test_mount_attempts_to_timeout_saturates() {
        assert_eq!(mount_attempts_to_timeout(500), mount_attempts_to_timeout(34));
    }
}
