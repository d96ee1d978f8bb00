//! Typed parsing of configuration strings
//!
//! Durations use the `<number><unit>` sequence syntax (`1m`, `168h`, `1h30m`,
//! `1.5h`); booleans accept the same spellings the recommender has always
//! accepted (`1`, `t`, `TRUE`, `false`, ...).

use std::time::Duration;

const NANOS_PER_MICRO: f64 = 1e3;
const NANOS_PER_MILLI: f64 = 1e6;
const NANOS_PER_SEC: f64 = 1e9;

/// Parse a duration such as `1m`, `168h` or `1h30m15s`
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let s = input.trim();
    if s.is_empty() {
        return Err("empty duration".to_string());
    }
    if s.starts_with('-') {
        return Err("negative durations are not allowed".to_string());
    }
    let s = s.strip_prefix('+').unwrap_or(s);
    if s == "0" {
        return Ok(Duration::ZERO);
    }

    let mut total_nanos = 0.0_f64;
    let mut rest = s;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if number_len == 0 {
            return Err(format!("expected a number at {:?}", rest));
        }
        let number: f64 = rest[..number_len]
            .parse()
            .map_err(|_| format!("invalid number {:?}", &rest[..number_len]))?;
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let unit = &rest[..unit_len];
        rest = &rest[unit_len..];

        let scale = match unit {
            "ns" => 1.0,
            "us" | "µs" | "μs" => NANOS_PER_MICRO,
            "ms" => NANOS_PER_MILLI,
            "s" => NANOS_PER_SEC,
            "m" => 60.0 * NANOS_PER_SEC,
            "h" => 3600.0 * NANOS_PER_SEC,
            "" => return Err("missing unit".to_string()),
            other => return Err(format!("unknown unit {:?}", other)),
        };
        total_nanos += number * scale;
    }

    if !total_nanos.is_finite() || total_nanos > u64::MAX as f64 {
        return Err("duration overflows".to_string());
    }
    Ok(Duration::from_nanos(total_nanos.round() as u64))
}

/// Parse a boolean in any of the accepted spellings
pub fn parse_bool(input: &str) -> Result<bool, String> {
    match input.trim() {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Ok(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Ok(false),
        other => Err(format!("{:?} is not a boolean", other)),
    }
}

/// Parse a finite float
pub fn parse_float(input: &str) -> Result<f64, String> {
    let value: f64 = input
        .trim()
        .parse()
        .map_err(|_| format!("{:?} is not a number", input))?;
    if !value.is_finite() {
        return Err("value must be finite".to_string());
    }
    Ok(value)
}
