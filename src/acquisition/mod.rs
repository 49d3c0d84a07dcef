//! Payload acquisition module
//!
//! Turns raw upstream bodies into `RawObservation`s. Three wire formats are
//! supported, each behind the `Extractor` trait:
//! - `html_table`: label/value table cells (Southampton VTS)
//! - `json_path`: prioritised field-name predicates over JSON (WeatherLink, WeatherFile)
//! - `hex_telemetry`: packed bitfield records (Navis live and history)
//!
//! Extractors are pure. They never touch the network and keep no state
//! between calls.

pub mod hex_telemetry;
pub mod html_table;
pub mod json_path;

pub use hex_telemetry::{HexSample, HexTelemetryExtractor, SampleWindow};
pub use html_table::HtmlTableExtractor;
pub use json_path::JsonPathExtractor;

use thiserror::Error;

use crate::config::ParserKind;
use crate::types::{ParserTag, PressureUnit, SpeedUnit, TemperatureUnit};

/// Extraction errors
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The body is not in the expected format at all
    #[error("Malformed payload: {0}")]
    Malformed(String),

    /// The body is well-formed but the upstream says it has no data
    #[error("Upstream reported failure: {0}")]
    Upstream(String),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid extractor pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Extractor output in the source's native units.
///
/// Every quantity is optional; `None` means the payload did not provide it.
/// Unit hints are set only when the payload itself names a unit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawObservation {
    pub wind_speed: Option<f64>,
    pub wind_gust: Option<f64>,
    pub wind_direction: Option<f64>,
    pub temperature: Option<f64>,
    pub pressure: Option<f64>,
    pub timestamp: Option<String>,
    pub speed_unit: Option<SpeedUnit>,
    pub temperature_unit: Option<TemperatureUnit>,
    pub pressure_unit: Option<PressureUnit>,
    /// Samples behind the values (0 when not applicable)
    pub sample_count: usize,
    /// Fields that were configured but missing or unparsable
    pub skipped: Vec<String>,
}

impl RawObservation {
    /// At least one wind quantity resolved.
    pub fn has_wind(&self) -> bool {
        self.wind_speed.is_some() || self.wind_direction.is_some()
    }
}

/// Decodes one upstream body.
pub trait Extractor: Send + Sync {
    fn tag(&self) -> ParserTag;

    fn extract(&self, body: &str) -> Result<RawObservation, ExtractError>;
}

/// Build the extractor for a parser profile.
pub fn build_extractor(kind: &ParserKind) -> Result<Box<dyn Extractor>, ExtractError> {
    Ok(match kind {
        ParserKind::HtmlTable(profile) => Box::new(HtmlTableExtractor::new(profile.clone())?),
        ParserKind::JsonPath(profile) => Box::new(JsonPathExtractor::new(profile.clone())),
        ParserKind::HexTelemetry(profile) => Box::new(HexTelemetryExtractor::new(profile.clone())),
    })
}

/// Leading numeric token of `text`, with the remainder after it.
///
/// `"12.3 Knots"` → `(12.3, "Knots")`.
pub(crate) fn leading_number(text: &str) -> Option<(f64, &str)> {
    let t = text.trim_start();
    let bytes = t.as_bytes();
    let mut end = 0;
    if end < bytes.len() && (bytes[end] == b'-' || bytes[end] == b'+') {
        end += 1;
    }
    let digits_start = end;
    let mut seen_dot = false;
    while end < bytes.len() {
        match bytes[end] {
            b'0'..=b'9' => end += 1,
            b'.' if !seen_dot => {
                seen_dot = true;
                end += 1;
            }
            _ => break,
        }
    }
    let token = &t[digits_start..end];
    if !token.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    let value: f64 = t[..end].parse().ok()?;
    Some((value, t[end..].trim()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourceRegistry;

    #[test]
    fn test_leading_number() {
        assert_eq!(leading_number("12.3 Knots"), Some((12.3, "Knots")));
        assert_eq!(leading_number("  -4.5°C"), Some((-4.5, "°C")));
        assert_eq!(leading_number("225"), Some((225.0, "")));
        assert_eq!(leading_number("7. kts"), Some((7.0, "kts")));
        assert_eq!(leading_number("SW 225"), None);
        assert_eq!(leading_number("--"), None);
        assert_eq!(leading_number(""), None);
    }

    #[test]
    fn test_build_extractor_for_every_builtin_endpoint() {
        let registry = SourceRegistry::builtin();
        for source in registry.iter() {
            let extractor = build_extractor(&source.primary.parser).expect("primary extractor");
            assert_eq!(extractor.tag(), source.primary.parser.tag());
            if let Some(fallback) = &source.fallback {
                let extractor = build_extractor(&fallback.parser).expect("fallback extractor");
                assert_eq!(extractor.tag(), ParserTag::HexTelemetry);
            }
        }
    }
}
