//! Canonical weather reading and its provenance

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which endpoint of a source produced a reading.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EndpointRole {
    Primary,
    Fallback,
}

impl fmt::Display for EndpointRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndpointRole::Primary => write!(f, "primary"),
            EndpointRole::Fallback => write!(f, "fallback"),
        }
    }
}

/// Wire format family an endpoint is decoded with.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum ParserTag {
    HtmlTable,
    JsonPath,
    HexTelemetry,
}

impl fmt::Display for ParserTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParserTag::HtmlTable => write!(f, "html-table"),
            ParserTag::JsonPath => write!(f, "json-path"),
            ParserTag::HexTelemetry => write!(f, "hex-telemetry"),
        }
    }
}

/// States of a single fetch cycle.
///
/// ```text
/// Attempting ──► Success
///     │
///     ▼
/// Retrying ──► Exhausted ──► Fallback ──► Success | Failed
///                  │
///                  └──► Failed (no fallback configured)
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FetchState {
    Attempting,
    Retrying,
    Exhausted,
    Fallback,
    Success,
    Failed,
}

/// Where a reading came from, kept for diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Provenance {
    pub source_id: String,
    pub endpoint: EndpointRole,
    /// Fully resolved request URL (history placeholders substituted)
    pub url: String,
    pub parser: ParserTag,
    /// Attempts made in the cycle, primary and fallback combined
    pub attempts: u32,
    /// States traversed by the orchestrator, in order
    pub states: Vec<FetchState>,
}

/// One canonical weather record, built fresh per fetch cycle.
///
/// Speeds are m/s and directions are degrees in `[0, 360)` whatever the
/// source encoding. Wind quantities are `None` when the source did not
/// provide them, which is distinct from a measured zero.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeatherReading {
    pub source_id: String,
    /// Sustained (or averaged) wind speed (m/s)
    pub wind_speed: Option<f64>,
    /// Peak wind speed (m/s); equals `wind_speed` for instantaneous-only sources
    pub wind_gust: Option<f64>,
    /// Wind direction (degrees true, 0-359)
    pub wind_direction: Option<f64>,
    /// Air temperature (°C)
    pub temperature: Option<f64>,
    /// Barometric pressure (hPa)
    pub pressure: Option<f64>,
    /// ISO-8601, or the source string with an explicit zone marker
    pub timestamp: String,
    /// True when at least one of speed or direction resolved
    pub valid: bool,
    pub provenance: Provenance,
    /// Wall time spent fetching and parsing, across all attempts (ms)
    pub duration_ms: u64,
    /// Samples the values were computed from (1 for a live reading)
    pub sample_count: usize,
    /// Fields that were present upstream but could not be parsed
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped_fields: Vec<String>,
}

impl WeatherReading {
    /// Wind speed in knots, for display layers that still work in knots.
    pub fn wind_speed_knots(&self) -> Option<f64> {
        self.wind_speed.map(crate::processing::normalizer::ms_to_knots)
    }

    pub fn wind_gust_knots(&self) -> Option<f64> {
        self.wind_gust.map(crate::processing::normalizer::ms_to_knots)
    }

    pub fn is_fallback(&self) -> bool {
        self.provenance.endpoint == EndpointRole::Fallback
    }
}
