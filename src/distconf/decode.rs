//! Raw byte decoders for configuration values.
//!
//! Every source hands out raw bytes; the [`Codec`] chosen when a key is
//! registered decides how those bytes become a typed value and how the value
//! is rendered back for diagnostics.

use std::fmt::Write as _;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::distconf::error::{DistconfError, Result};

const NANOS_PER_MICRO: u128 = 1_000;
const NANOS_PER_MILLI: u128 = 1_000_000;
const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Decode and encode functions for one value type, fixed at registration.
pub struct Codec<T> {
    /// Short name used in decode errors.
    pub kind: &'static str,
    /// Turns raw source bytes into a value.
    pub decode: fn(&[u8]) -> Result<T>,
    /// Renders a value for snapshots.
    pub encode: fn(&T) -> serde_json::Value,
    /// Decides whether an update changed the value.
    pub eq: fn(&T, &T) -> bool,
}

impl<T> Clone for Codec<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Codec<T> {}

impl Codec<i64> {
    /// Base-10 signed integers.
    pub fn int() -> Self {
        Codec {
            kind: "int",
            decode: decode_int,
            encode: |v| serde_json::Value::from(*v),
            eq: |a, b| a == b,
        }
    }
}

impl Codec<f64> {
    /// Floating point numbers.
    pub fn float() -> Self {
        Codec {
            kind: "float",
            decode: decode_float,
            encode: |v| serde_json::Value::from(*v),
            // Bitwise, so a repeated NaN counts as unchanged.
            eq: |a, b| a.to_bits() == b.to_bits(),
        }
    }
}

impl Codec<bool> {
    /// Booleans in any of the accepted spellings, see [`parse_bool`].
    pub fn bool() -> Self {
        Codec {
            kind: "bool",
            decode: decode_bool,
            encode: |v| serde_json::Value::from(*v),
            eq: |a, b| a == b,
        }
    }
}

impl Codec<String> {
    /// UTF-8 strings, taken verbatim.
    pub fn string() -> Self {
        Codec {
            kind: "string",
            decode: decode_string,
            encode: |v| serde_json::Value::from(v.as_str()),
            eq: |a, b| a == b,
        }
    }
}

impl Codec<Duration> {
    /// Human readable durations such as `1h30m` or `250ms`.
    pub fn duration() -> Self {
        Codec {
            kind: "duration",
            decode: decode_duration,
            encode: |v| serde_json::Value::from(format_duration(*v)),
            eq: |a, b| a == b,
        }
    }
}

impl<T: DeserializeOwned + Serialize + PartialEq> Codec<T> {
    /// Structured values stored as JSON documents.
    pub fn json() -> Self {
        Codec {
            kind: "json",
            decode: decode_json::<T>,
            encode: encode_json::<T>,
            eq: |a, b| a == b,
        }
    }
}

fn as_str<'a>(kind: &'static str, raw: &'a [u8]) -> Result<&'a str> {
    std::str::from_utf8(raw).map_err(|e| DistconfError::decode(kind, raw, e))
}

fn decode_int(raw: &[u8]) -> Result<i64> {
    as_str("int", raw)?
        .parse::<i64>()
        .map_err(|e| DistconfError::decode("int", raw, e))
}

fn decode_float(raw: &[u8]) -> Result<f64> {
    as_str("float", raw)?
        .parse::<f64>()
        .map_err(|e| DistconfError::decode("float", raw, e))
}

fn decode_bool(raw: &[u8]) -> Result<bool> {
    parse_bool(as_str("bool", raw)?)
        .ok_or_else(|| DistconfError::decode("bool", raw, "expected true or false"))
}

fn decode_string(raw: &[u8]) -> Result<String> {
    as_str("string", raw).map(str::to_owned)
}

fn decode_duration(raw: &[u8]) -> Result<Duration> {
    parse_duration(as_str("duration", raw)?).map_err(|e| DistconfError::decode("duration", raw, e))
}

fn decode_json<T: DeserializeOwned>(raw: &[u8]) -> Result<T> {
    serde_json::from_slice(raw).map_err(|e| DistconfError::decode("json", raw, e))
}

fn encode_json<T: Serialize>(value: &T) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or(serde_json::Value::Null)
}

/// Parse a permissive boolean.
pub fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

/// Parse a duration string made of decimal numbers with unit suffixes,
/// e.g. `300ms`, `1.5h` or `2h45m`.
///
/// Valid units are `ns`, `us` (or `µs`), `ms`, `s`, `m` and `h`. A bare `0`
/// is accepted. Negative durations are rejected.
pub fn parse_duration(input: &str) -> std::result::Result<Duration, String> {
    let mut s = input.strip_prefix('+').unwrap_or(input);
    if s.starts_with('-') {
        return Err("negative durations are not supported".to_string());
    }
    if s == "0" {
        return Ok(Duration::ZERO);
    }
    if s.is_empty() {
        return Err("empty duration".to_string());
    }

    let mut total: u128 = 0;
    while !s.is_empty() {
        let int_end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
        let (int_part, rest) = s.split_at(int_end);

        let (frac_part, rest) = match rest.strip_prefix('.') {
            Some(after_dot) => {
                let end = after_dot
                    .find(|c: char| !c.is_ascii_digit())
                    .unwrap_or(after_dot.len());
                after_dot.split_at(end)
            }
            None => ("", rest),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(format!("expected a number in {input:?}"));
        }

        let unit_end = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let (unit, rest) = rest.split_at(unit_end);
        let unit_nanos = match unit {
            "ns" => 1,
            "us" | "µs" | "μs" => NANOS_PER_MICRO,
            "ms" => NANOS_PER_MILLI,
            "s" => NANOS_PER_SEC,
            "m" => 60 * NANOS_PER_SEC,
            "h" => 3600 * NANOS_PER_SEC,
            "" => return Err(format!("missing unit in {input:?}")),
            other => return Err(format!("unknown unit {other:?} in {input:?}")),
        };

        let overflow = || format!("duration {input:?} is out of range");
        let whole: u128 = if int_part.is_empty() {
            0
        } else {
            int_part.parse().map_err(|_| overflow())?
        };
        total = whole
            .checked_mul(unit_nanos)
            .and_then(|n| total.checked_add(n))
            .ok_or_else(overflow)?;

        if !frac_part.is_empty() {
            // Digits beyond nanosecond precision for hours are noise.
            let digits = &frac_part[..frac_part.len().min(18)];
            let scale = 10u128.pow(digits.len() as u32);
            let frac: u128 = digits.parse().map_err(|_| overflow())?;
            total = total
                .checked_add(frac * unit_nanos / scale)
                .ok_or_else(overflow)?;
        }

        s = rest;
    }

    let nanos = u64::try_from(total).map_err(|_| format!("duration {input:?} is out of range"))?;
    Ok(Duration::from_nanos(nanos))
}

/// Render a duration in the same notation [`parse_duration`] accepts.
pub fn format_duration(d: Duration) -> String {
    let nanos = d.as_nanos();
    if nanos == 0 {
        return "0s".to_string();
    }
    if nanos < NANOS_PER_MICRO {
        return format!("{nanos}ns");
    }
    if nanos < NANOS_PER_MILLI {
        return format!("{}µs", with_fraction(nanos, NANOS_PER_MICRO));
    }
    if nanos < NANOS_PER_SEC {
        return format!("{}ms", with_fraction(nanos, NANOS_PER_MILLI));
    }

    let secs = nanos / NANOS_PER_SEC;
    let sub_sec = nanos % NANOS_PER_SEC;
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;

    let mut out = String::new();
    if hours > 0 {
        let _ = write!(out, "{hours}h");
    }
    if hours > 0 || minutes > 0 {
        let _ = write!(out, "{minutes}m");
    }
    let _ = write!(
        out,
        "{}s",
        with_fraction((secs % 60) * NANOS_PER_SEC + sub_sec, NANOS_PER_SEC)
    );
    out
}

fn with_fraction(value: u128, unit: u128) -> String {
    let whole = value / unit;
    let rem = value % unit;
    if rem == 0 {
        return whole.to_string();
    }
    let width = unit.to_string().len() - 1;
    let digits = format!("{rem:0width$}");
    format!("{whole}.{}", digits.trim_end_matches('0'))
}
