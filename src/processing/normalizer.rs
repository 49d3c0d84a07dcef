//! Unit Normalizer - native source units to canonical m/s, °C, hPa and
//! timestamp strings

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};

use crate::acquisition::RawObservation;
use crate::types::{PressureUnit, Provenance, SpeedUnit, TemperatureUnit, WeatherReading};

// ============================================================================
// Conversion Constants
// ============================================================================

/// 1 knot in m/s.
pub const KNOTS_TO_MS: f64 = 0.514444;

/// 1 mph in m/s.
pub const MPH_TO_MS: f64 = 0.44704;

/// 1 km/h in m/s.
pub const KMH_TO_MS: f64 = 1.0 / 3.6;

/// 1 inHg in hPa.
pub const INHG_TO_HPA: f64 = 33.8639;

/// Timestamp strings meaning "this reading is current".
pub const LIVE_PLACEHOLDERS: &[&str] = &["live data", "live", "now"];

/// Zone suffix appended to naive upstream timestamps.
pub const ASSUMED_ZONE: &str = " GMT";

/// Digit count of an epoch in seconds (2001..2286).
const EPOCH_SECONDS_DIGITS: usize = 10;

/// Digit count of an epoch in milliseconds.
const EPOCH_MILLIS_DIGITS: usize = 13;

// ============================================================================
// Speed / Temperature / Pressure
// ============================================================================

pub fn knots_to_ms(knots: f64) -> f64 {
    knots * KNOTS_TO_MS
}

pub fn ms_to_knots(ms: f64) -> f64 {
    ms / KNOTS_TO_MS
}

pub fn speed_to_ms(value: f64, unit: SpeedUnit) -> f64 {
    match unit {
        SpeedUnit::Knots => knots_to_ms(value),
        SpeedUnit::MetersPerSecond => value,
        SpeedUnit::MilesPerHour => value * MPH_TO_MS,
        SpeedUnit::KilometersPerHour => value * KMH_TO_MS,
    }
}

pub fn fahrenheit_to_celsius(f: f64) -> f64 {
    (f - 32.0) * 5.0 / 9.0
}

pub fn temperature_to_celsius(value: f64, unit: TemperatureUnit) -> f64 {
    match unit {
        TemperatureUnit::Celsius => value,
        TemperatureUnit::Fahrenheit => fahrenheit_to_celsius(value),
    }
}

pub fn pressure_to_hpa(value: f64, unit: PressureUnit) -> f64 {
    match unit {
        PressureUnit::Hectopascal => value,
        PressureUnit::InchesOfMercury => value * INHG_TO_HPA,
    }
}

// ============================================================================
// Direction
// ============================================================================

/// Reduce a bearing into `[0, 360)`. Non-finite input is no bearing at all.
pub fn normalize_direction(degrees: f64) -> Option<f64> {
    if !degrees.is_finite() {
        return None;
    }
    let d = degrees.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs
    Some(if d >= 360.0 { 0.0 } else { d })
}

const COMPASS_POINTS: [&str; 16] = [
    "N", "NNE", "NE", "ENE", "E", "ESE", "SE", "SSE", "S", "SSW", "SW", "WSW", "W", "WNW", "NW",
    "NNW",
];

/// 16-point compass label to degrees (`"SW"` → 225).
pub fn cardinal_to_degrees(label: &str) -> Option<f64> {
    let l = label.trim().to_ascii_uppercase();
    COMPASS_POINTS
        .iter()
        .position(|p| *p == l)
        .map(|i| i as f64 * 22.5)
}

// ============================================================================
// Timestamps
// ============================================================================

fn iso(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// True when the string already says which zone it is in.
pub fn has_zone_marker(ts: &str) -> bool {
    let t = ts.trim();
    let upper = t.to_ascii_uppercase();
    if upper.contains("UTC") || upper.contains("GMT") {
        return true;
    }
    let bytes = t.as_bytes();
    if bytes.len() >= 2 && bytes[bytes.len() - 1] == b'Z' && bytes[bytes.len() - 2].is_ascii_digit() {
        return true;
    }
    // Trailing numeric offset: +HH:MM or -HHMM after a time component
    if let Some(pos) = t.rfind(['+', '-']) {
        let offset = &t[pos + 1..];
        let digits: String = offset.chars().filter(|c| *c != ':').collect();
        let shape_ok = match offset.len() {
            5 => offset.as_bytes()[2] == b':',
            4 => true,
            _ => false,
        };
        return pos > 0
            && t[..pos].contains(':')
            && shape_ok
            && digits.len() == 4
            && digits.chars().all(|c| c.is_ascii_digit());
    }
    false
}

/// Canonicalise an upstream timestamp.
///
/// - absent, empty or a live placeholder → `now` as ISO-8601 UTC
/// - 10 digits → Unix epoch seconds, 13 digits → milliseconds, as ISO-8601 UTC
/// - other digit runs (compact dates such as `20250829`) are naive strings
/// - already zone-marked → unchanged
/// - anything else → the string with `" GMT"` appended
pub fn normalize_timestamp(raw: Option<&str>, now: DateTime<Utc>) -> String {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return iso(now);
    };
    if LIVE_PLACEHOLDERS.iter().any(|p| raw.eq_ignore_ascii_case(p)) {
        return iso(now);
    }
    if raw.chars().all(|c| c.is_ascii_digit()) {
        let parsed = match raw.len() {
            EPOCH_SECONDS_DIGITS => raw
                .parse::<i64>()
                .ok()
                .and_then(|n| Utc.timestamp_opt(n, 0).single()),
            EPOCH_MILLIS_DIGITS => raw
                .parse::<i64>()
                .ok()
                .and_then(|n| Utc.timestamp_millis_opt(n).single()),
            _ => None,
        };
        if let Some(dt) = parsed {
            return iso(dt);
        }
    }
    if has_zone_marker(raw) {
        return raw.to_string();
    }
    format!("{raw}{ASSUMED_ZONE}")
}

// ============================================================================
// Observation → Reading
// ============================================================================

/// Units a source reports in when the payload itself does not say.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceUnits {
    pub speed: SpeedUnit,
    pub temperature: TemperatureUnit,
    pub pressure: PressureUnit,
}

fn non_negative_speed(
    value: Option<f64>,
    unit: SpeedUnit,
    field: &str,
    skipped: &mut Vec<String>,
) -> Option<f64> {
    let v = value?;
    if v.is_finite() && v >= 0.0 {
        Some(speed_to_ms(v, unit))
    } else {
        skipped.push(field.to_string());
        None
    }
}

/// Build the canonical reading for one cycle.
///
/// Payload unit hints win over `units`. Gust defaults to speed when the
/// source had no separate peak.
pub fn normalize(
    raw: RawObservation,
    units: SourceUnits,
    provenance: Provenance,
    duration_ms: u64,
    now: DateTime<Utc>,
) -> WeatherReading {
    let mut skipped = raw.skipped;
    let speed_unit = raw.speed_unit.unwrap_or(units.speed);
    let temperature_unit = raw.temperature_unit.unwrap_or(units.temperature);
    let pressure_unit = raw.pressure_unit.unwrap_or(units.pressure);

    let wind_speed = non_negative_speed(raw.wind_speed, speed_unit, "wind_speed", &mut skipped);
    let wind_gust = non_negative_speed(raw.wind_gust, speed_unit, "wind_gust", &mut skipped)
        .or(wind_speed);
    let wind_direction = match raw.wind_direction {
        Some(d) => {
            let n = normalize_direction(d);
            if n.is_none() {
                skipped.push("wind_direction".to_string());
            }
            n
        }
        None => None,
    };
    let temperature = raw
        .temperature
        .filter(|t| t.is_finite())
        .map(|t| temperature_to_celsius(t, temperature_unit));
    let pressure = raw
        .pressure
        .filter(|p| p.is_finite() && *p > 0.0)
        .map(|p| pressure_to_hpa(p, pressure_unit));

    WeatherReading {
        source_id: provenance.source_id.clone(),
        wind_speed,
        wind_gust,
        wind_direction,
        temperature,
        pressure,
        timestamp: normalize_timestamp(raw.timestamp.as_deref(), now),
        valid: wind_speed.is_some() || wind_direction.is_some(),
        provenance,
        duration_ms,
        sample_count: raw.sample_count.max(1),
        skipped_fields: skipped,
    }
}
