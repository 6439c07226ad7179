// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Duration parsing and formatting for Go-style duration strings.
//!
//! Feature flags such as `max-csi-mount-timeout` carry durations in the format
//! understood by the downstream components (`"10m"`, `"1h30m"`, `"500ms"`).
//! This module parses that format into `std::time::Duration` and renders a
//! `Duration` back into its canonical string.

use std::fmt::Write as _;
use std::time::Duration;

use crate::errors::DurationError;

const NANOS_PER_MICRO: u128 = 1_000;
const NANOS_PER_MILLI: u128 = 1_000_000;
const NANOS_PER_SECOND: u128 = 1_000_000_000;
const NANOS_PER_MINUTE: u128 = 60 * NANOS_PER_SECOND;
const NANOS_PER_HOUR: u128 = 60 * NANOS_PER_MINUTE;

/// Largest value representable by a signed 64-bit nanosecond counter.
const MAX_NANOS: u128 = i64::MAX as u128;

/// Base delay of the CSI mount retry backoff.
const MOUNT_RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

/// Largest exponent for which `0.5s * 2^n` still fits [`MAX_NANOS`].
const MAX_MOUNT_RETRY_EXPONENT: u32 = 34;

/// Parse a Go-style duration string into a Rust `Duration`.
///
/// Supported units: `ns`, `us` (also `µs`/`μs`), `ms`, `s`, `m`, `h`. Segments may
/// be combined (`"1h30m"`) and may carry a decimal fraction (`"1.5s"`). A lone
/// `"0"` is accepted without a unit.
///
/// # Examples
///
/// ```
/// use dynakube::api::duration::parse_go_duration;
/// use std::time::Duration;
///
/// assert_eq!(parse_go_duration("10m").unwrap(), Duration::from_secs(600));
/// assert_eq!(parse_go_duration("1h30m").unwrap(), Duration::from_secs(5400));
/// assert_eq!(parse_go_duration("500ms").unwrap(), Duration::from_millis(500));
/// assert!(parse_go_duration("10").is_err());
/// assert!(parse_go_duration("-5s").is_err());
/// ```
///
/// # Errors
///
/// Returns an error if the string does not follow the grammar, uses an unknown
/// unit, is negative, or overflows.
pub fn parse_go_duration(input: &str) -> Result<Duration, DurationError> {
    let invalid = || DurationError::Invalid(input.to_string());

    let (negative, mut rest) = match input.as_bytes().first() {
        Some(b'-') => (true, &input[1..]),
        Some(b'+') => (false, &input[1..]),
        _ => (false, input),
    };

    if rest == "0" {
        return Ok(Duration::ZERO);
    }
    if rest.is_empty() {
        return Err(invalid());
    }

    let mut total: u128 = 0;
    while !rest.is_empty() {
        let whole_len = rest.chars().take_while(char::is_ascii_digit).count();
        let whole_str = &rest[..whole_len];
        rest = &rest[whole_len..];

        let mut fraction_str = "";
        if let Some(after_dot) = rest.strip_prefix('.') {
            let fraction_len = after_dot.chars().take_while(char::is_ascii_digit).count();
            fraction_str = &after_dot[..fraction_len];
            rest = &after_dot[fraction_len..];
        }

        if whole_str.is_empty() && fraction_str.is_empty() {
            return Err(invalid());
        }

        let unit_len = rest
            .char_indices()
            .find(|(_, c)| *c == '.' || c.is_ascii_digit())
            .map_or(rest.len(), |(index, _)| index);
        let unit = &rest[..unit_len];
        rest = &rest[unit_len..];

        let scale = match unit {
            "ns" => 1,
            "us" | "µs" | "μs" => NANOS_PER_MICRO,
            "ms" => NANOS_PER_MILLI,
            "s" => NANOS_PER_SECOND,
            "m" => NANOS_PER_MINUTE,
            "h" => NANOS_PER_HOUR,
            "" => return Err(invalid()),
            other => {
                return Err(DurationError::UnknownUnit {
                    input: input.to_string(),
                    unit: other.to_string(),
                })
            }
        };

        let overflow = || DurationError::Overflow(input.to_string());
        let whole: u128 = if whole_str.is_empty() {
            0
        } else {
            whole_str.parse().map_err(|_| overflow())?
        };
        let mut segment = whole.checked_mul(scale).ok_or_else(overflow)?;

        // Digits beyond nanosecond precision cannot contribute.
        let fraction_digits = &fraction_str[..fraction_str.len().min(18)];
        if !fraction_digits.is_empty() {
            let numerator: u128 = fraction_digits.parse().map_err(|_| overflow())?;
            let exponent = u32::try_from(fraction_digits.len()).map_err(|_| overflow())?;
            segment += numerator * scale / 10u128.pow(exponent);
        }

        total = total.checked_add(segment).ok_or_else(overflow)?;
        if total > MAX_NANOS {
            return Err(overflow());
        }
    }

    if negative && total > 0 {
        return Err(DurationError::Negative(input.to_string()));
    }

    let secs = u64::try_from(total / NANOS_PER_SECOND)
        .map_err(|_| DurationError::Overflow(input.to_string()))?;
    let nanos = u32::try_from(total % NANOS_PER_SECOND)
        .map_err(|_| DurationError::Overflow(input.to_string()))?;
    Ok(Duration::new(secs, nanos))
}

/// Render a `Duration` in the canonical Go format.
///
/// Durations below one second use the largest fitting sub-second unit
/// (`"500ms"`); longer durations use `h`, `m` and `s` components where the
/// leading zero components are omitted (`"16s"`, `"8m32s"`, `"1h0m0s"`).
///
/// # Examples
///
/// ```
/// use dynakube::api::duration::format_go_duration;
/// use std::time::Duration;
///
/// assert_eq!(format_go_duration(Duration::from_secs(512)), "8m32s");
/// assert_eq!(format_go_duration(Duration::from_millis(500)), "500ms");
/// assert_eq!(format_go_duration(Duration::ZERO), "0s");
/// ```
#[must_use]
pub fn format_go_duration(duration: Duration) -> String {
    let nanos = duration.as_nanos();
    if nanos == 0 {
        return "0s".to_string();
    }

    if nanos < NANOS_PER_SECOND {
        let (scale, unit) = if nanos < NANOS_PER_MICRO {
            (1, "ns")
        } else if nanos < NANOS_PER_MILLI {
            (NANOS_PER_MICRO, "µs")
        } else {
            (NANOS_PER_MILLI, "ms")
        };
        return format!("{}{unit}", format_scaled(nanos, scale));
    }

    let hours = nanos / NANOS_PER_HOUR;
    let minutes = (nanos % NANOS_PER_HOUR) / NANOS_PER_MINUTE;
    let seconds = nanos % NANOS_PER_MINUTE;

    let mut out = String::new();
    if hours > 0 {
        let _ = write!(out, "{hours}h");
    }
    if hours > 0 || minutes > 0 {
        let _ = write!(out, "{minutes}m");
    }
    let _ = write!(out, "{}s", format_scaled(seconds, NANOS_PER_SECOND));
    out
}

/// Convert a legacy CSI mount retry count into the equivalent timeout.
///
/// The retry backoff doubles a base delay of 0.5s per attempt, so the total
/// timeout is `0.5s * 2^attempts`. Negative counts yield `"0s"`.
///
/// # Examples
///
/// ```
/// use dynakube::api::duration::mount_attempts_to_timeout;
///
/// assert_eq!(mount_attempts_to_timeout(5), "16s");
/// assert_eq!(mount_attempts_to_timeout(10), "8m32s");
/// ```
#[must_use]
pub fn mount_attempts_to_timeout(max_attempts: i64) -> String {
    let Ok(exponent) = u32::try_from(max_attempts) else {
        return format_go_duration(Duration::ZERO);
    };
    let exponent = exponent.min(MAX_MOUNT_RETRY_EXPONENT);
    let nanos = MOUNT_RETRY_BASE_DELAY.as_nanos() << exponent;
    let secs = u64::try_from(nanos / NANOS_PER_SECOND).unwrap_or(u64::MAX);
    let subsec = u32::try_from(nanos % NANOS_PER_SECOND).unwrap_or(0);
    format_go_duration(Duration::new(secs, subsec))
}

fn format_scaled(value: u128, scale: u128) -> String {
    let whole = value / scale;
    let remainder = value % scale;
    if remainder == 0 {
        return whole.to_string();
    }

    let width = scale.to_string().len() - 1;
    let fraction = format!("{remainder:0width$}");
    format!("{whole}.{}", fraction.trim_end_matches('0'))
}

#[cfg(test)]
#[path = "duration_tests.rs"]
mod duration_tests;
