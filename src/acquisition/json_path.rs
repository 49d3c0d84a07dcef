//! JSON Path Extractor
//!
//! Resolves each physical quantity by walking a prioritised list of
//! field-name predicates over the entries of a JSON document. The first
//! predicate with a usable value wins, so a "2 Min Avg Wind Speed" entry can
//! be preferred over a plain "Wind Speed" one without depending on entry
//! order.

use serde_json::Value;

use super::{leading_number, ExtractError, Extractor, RawObservation};
use crate::config::{FieldMatch, JsonLayout, JsonPathProfile};
use crate::processing::normalizer::cardinal_to_degrees;
use crate::types::{ParserTag, PressureUnit, SpeedUnit, TemperatureUnit};

/// Values upstreams use for "sensor has nothing right now".
pub const NO_DATA_SENTINELS: &[&str] = &["--", "---", "N/A", "", "null"];

/// One named value in the document.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry<'a> {
    pub name: &'a str,
    pub value: &'a Value,
    pub unit: Option<&'a str>,
}

/// Outcome of reading one entry value.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Reading {
    Number(f64),
    NoData,
    Malformed,
}

fn read_value(value: &Value, allow_cardinal: bool) -> Reading {
    match value {
        Value::Null => Reading::NoData,
        Value::Number(n) => n.as_f64().map_or(Reading::Malformed, Reading::Number),
        Value::String(s) => {
            let t = s.trim();
            if NO_DATA_SENTINELS.iter().any(|x| t.eq_ignore_ascii_case(x)) {
                return Reading::NoData;
            }
            if let Some((v, _)) = leading_number(t) {
                return Reading::Number(v);
            }
            if allow_cardinal {
                if let Some(deg) = cardinal_to_degrees(t) {
                    return Reading::Number(deg);
                }
            }
            Reading::Malformed
        }
        _ => Reading::Malformed,
    }
}

/// A root that is a single-element array is unwrapped to its element.
pub fn unwrap_root(doc: &Value) -> Option<&Value> {
    match doc {
        Value::Object(_) => Some(doc),
        Value::Array(items) => items.first().filter(|v| v.is_object()),
        _ => None,
    }
}

fn sensor_entries<'a>(
    collection: Option<&'a Value>,
    name_key: &str,
    value_key: &str,
    unit_key: Option<&str>,
) -> Vec<Entry<'a>> {
    let Some(items) = collection.and_then(Value::as_array) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| {
            let name = item.get(name_key)?.as_str()?;
            let value = item.get(value_key).unwrap_or(&Value::Null);
            let unit = unit_key.and_then(|k| item.get(k)).and_then(Value::as_str);
            Some(Entry { name, value, unit })
        })
        .collect()
}

fn object_entries(data: Option<&Value>) -> Vec<Entry<'_>> {
    let Some(map) = data.and_then(Value::as_object) else {
        return Vec::new();
    };
    map.iter()
        .map(|(k, v)| Entry {
            name: k.as_str(),
            value: v,
            unit: None,
        })
        .collect()
}

/// Highest-priority usable value among `entries`.
///
/// Returns the value and the matched entry's unit label. A matched entry
/// holding neither a number nor a no-data sentinel marks the field malformed.
pub fn resolve<'a>(
    entries: &[Entry<'a>],
    predicates: &[FieldMatch],
    allow_cardinal: bool,
    malformed: &mut bool,
) -> Option<(f64, Option<&'a str>)> {
    for predicate in predicates {
        for entry in entries.iter().filter(|e| predicate.matches(e.name)) {
            match read_value(entry.value, allow_cardinal) {
                Reading::Number(v) => return Some((v, entry.unit)),
                Reading::NoData => {}
                Reading::Malformed => *malformed = true,
            }
        }
    }
    None
}

/// Prioritised-predicate extractor for JSON payloads.
pub struct JsonPathExtractor {
    profile: JsonPathProfile,
}

impl JsonPathExtractor {
    pub fn new(profile: JsonPathProfile) -> Self {
        Self { profile }
    }

    /// Parse the body and split it into (current, extremes, root timestamp).
    fn entries<'a>(
        &self,
        root: &'a Value,
    ) -> Result<(Vec<Entry<'a>>, Vec<Entry<'a>>, Option<String>), ExtractError> {
        match &self.profile.layout {
            JsonLayout::SensorArray {
                current,
                extremes,
                name_key,
                value_key,
                unit_key,
                timestamp_key,
            } => {
                let cur = sensor_entries(root.get(current), name_key, value_key, unit_key.as_deref());
                let ext = extremes
                    .as_deref()
                    .map(|k| sensor_entries(root.get(k), name_key, value_key, unit_key.as_deref()))
                    .unwrap_or_default();
                let ts = timestamp_key
                    .as_deref()
                    .and_then(|k| root.get(k))
                    .and_then(value_to_string);
                Ok((cur, ext, ts))
            }
            JsonLayout::StatusEnvelope {
                status_key,
                ok_value,
                data_key,
            } => {
                let status = root.get(status_key).and_then(value_to_string);
                match status {
                    Some(s) if s.eq_ignore_ascii_case(ok_value) => {}
                    Some(s) => {
                        return Err(ExtractError::Upstream(format!("{status_key} = '{s}'")));
                    }
                    None => {
                        return Err(ExtractError::Upstream(format!("missing '{status_key}'")));
                    }
                }
                Ok((object_entries(root.get(data_key)), Vec::new(), None))
            }
        }
    }
}

fn value_to_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl Extractor for JsonPathExtractor {
    fn tag(&self) -> ParserTag {
        ParserTag::JsonPath
    }

    fn extract(&self, body: &str) -> Result<RawObservation, ExtractError> {
        let doc: Value = serde_json::from_str(body)?;
        let root = unwrap_root(&doc)
            .ok_or_else(|| ExtractError::Malformed("root is not an object".to_string()))?;
        let (current, extremes, root_ts) = self.entries(root)?;

        let p = &self.profile;
        let mut obs = RawObservation {
            sample_count: 1,
            ..Default::default()
        };
        let mut skipped = Vec::new();
        let mut field = |name: &str,
                         entries: &[Entry<'_>],
                         preds: &[FieldMatch],
                         cardinal: bool|
         -> Option<(f64, Option<String>)> {
            let mut malformed = false;
            let found = resolve(entries, preds, cardinal, &mut malformed);
            if found.is_none() && malformed {
                skipped.push(name.to_string());
            }
            found.map(|(v, u)| (v, u.map(str::to_string)))
        };

        if let Some((v, unit)) = field("wind_speed", &current, &p.speed, false) {
            obs.wind_speed = Some(v);
            obs.speed_unit = unit.as_deref().and_then(SpeedUnit::from_label);
        }
        let mut gust = field("wind_gust", &current, &p.gust, false).map(|(v, _)| v);
        if let Some((peak, _)) = field("wind_gust", &extremes, &p.extremes_gust, false) {
            if gust.map_or(true, |g| peak > g) {
                gust = Some(peak);
            }
        }
        obs.wind_gust = gust;
        obs.wind_direction = field("wind_direction", &current, &p.direction, true).map(|(v, _)| v);
        if let Some((v, unit)) = field("temperature", &current, &p.temperature, false) {
            obs.temperature = Some(v);
            obs.temperature_unit = unit.as_deref().and_then(TemperatureUnit::from_label);
        }
        if let Some((v, unit)) = field("pressure", &current, &p.pressure, false) {
            obs.pressure = Some(v);
            obs.pressure_unit = unit.as_deref().and_then(PressureUnit::from_label);
        }

        obs.timestamp = root_ts.or_else(|| {
            p.timestamp.iter().find_map(|pred| {
                current
                    .iter()
                    .filter(|e| pred.matches(e.name))
                    .find_map(|e| value_to_string(e.value))
                    .filter(|s| !NO_DATA_SENTINELS.contains(&s.trim()))
            })
        });

        skipped.dedup();
        obs.skipped = skipped;
        Ok(obs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourceRegistry;

    fn weatherlink() -> JsonPathExtractor {
        let registry = SourceRegistry::builtin();
        match &registry.get("seaview").unwrap().primary.parser {
            crate::config::ParserKind::JsonPath(p) => JsonPathExtractor::new(p.clone()),
            other => panic!("unexpected parser {other:?}"),
        }
    }

    fn weatherfile() -> JsonPathExtractor {
        let registry = SourceRegistry::builtin();
        match &registry.get("lymington").unwrap().primary.parser {
            crate::config::ParserKind::JsonPath(p) => JsonPathExtractor::new(p.clone()),
            other => panic!("unexpected parser {other:?}"),
        }
    }

    const SUMMARY: &str = r#"[{
        "lastReceived": 1756475100000,
        "currConditionValues": [
            {"sensorDataName": "Wind Speed", "convertedValue": "14", "unitLabel": "kts"},
            {"sensorDataName": "2 Min Avg Wind Speed", "convertedValue": "11.5", "unitLabel": "kts"},
            {"sensorDataName": "10 Min High Wind Speed", "convertedValue": "19", "unitLabel": "kts"},
            {"sensorDataName": "Wind Direction", "convertedValue": "SW", "unitLabel": ""},
            {"sensorDataName": "2 Min Avg Wind Direction", "convertedValue": "--", "unitLabel": "°"},
            {"sensorDataName": "Temp", "convertedValue": "64.4", "unitLabel": "°F"},
            {"sensorDataName": "Inside Temp", "convertedValue": "70.0", "unitLabel": "°F"},
            {"sensorDataName": "Barometer", "convertedValue": "29.92", "unitLabel": "in Hg"}
        ],
        "highLowValues": [
            {"sensorDataName": "High Wind Speed", "convertedValue": "23", "unitLabel": "kts"}
        ]
    }]"#;

    #[test]
    fn test_two_minute_average_preferred() {
        let obs = weatherlink().extract(SUMMARY).unwrap();
        assert_eq!(obs.wind_speed, Some(11.5));
        assert_eq!(obs.speed_unit, Some(SpeedUnit::Knots));
    }

    #[test]
    fn test_sentinel_skipped_and_cardinal_fallback() {
        let obs = weatherlink().extract(SUMMARY).unwrap();
        // 2-min direction is "--", so the plain entry's "SW" wins
        assert_eq!(obs.wind_direction, Some(225.0));
        assert!(obs.skipped.is_empty(), "{:?}", obs.skipped);
    }

    #[test]
    fn test_extremes_raise_gust() {
        let obs = weatherlink().extract(SUMMARY).unwrap();
        assert_eq!(obs.wind_gust, Some(23.0));
    }

    #[test]
    fn test_extremes_do_not_lower_gust() {
        let body = r#"{
            "currConditionValues": [
                {"sensorDataName": "2 Min Avg Wind Speed", "convertedValue": 10},
                {"sensorDataName": "2 Min High Wind Speed", "convertedValue": 25}
            ],
            "highLowValues": [
                {"sensorDataName": "High Wind Speed", "convertedValue": 20}
            ]
        }"#;
        let obs = weatherlink().extract(body).unwrap();
        assert_eq!(obs.wind_gust, Some(25.0));
    }

    #[test]
    fn test_temperature_and_pressure_units() {
        let obs = weatherlink().extract(SUMMARY).unwrap();
        assert_eq!(obs.temperature, Some(64.4));
        assert_eq!(obs.temperature_unit, Some(TemperatureUnit::Fahrenheit));
        assert_eq!(obs.pressure, Some(29.92));
        assert_eq!(obs.pressure_unit, Some(PressureUnit::InchesOfMercury));
        assert_eq!(obs.timestamp.as_deref(), Some("1756475100000"));
    }

    #[test]
    fn test_missing_arrays_are_no_data() {
        let obs = weatherlink().extract("{}").unwrap();
        assert!(!obs.has_wind());
        assert!(obs.skipped.is_empty());
    }

    #[test]
    fn test_malformed_value_recorded() {
        let body = r#"{"currConditionValues": [
            {"sensorDataName": "Wind Speed", "convertedValue": "calm-ish"},
            {"sensorDataName": "Wind Direction", "convertedValue": 90}
        ]}"#;
        let obs = weatherlink().extract(body).unwrap();
        assert_eq!(obs.wind_speed, None);
        assert_eq!(obs.wind_direction, Some(90.0));
        assert_eq!(obs.skipped, vec!["wind_speed".to_string()]);
    }

    #[test]
    fn test_status_envelope_ok() {
        let body = r#"{"status": "ok", "data": {"loc_name": "Lymington", "wsc": 8.7, "wdc": 240, "lastact": "2025-08-29 14:45:00"}}"#;
        let obs = weatherfile().extract(body).unwrap();
        assert_eq!(obs.wind_speed, Some(8.7));
        assert_eq!(obs.wind_direction, Some(240.0));
        assert_eq!(obs.timestamp.as_deref(), Some("2025-08-29 14:45:00"));
    }

    #[test]
    fn test_status_envelope_not_ok_is_upstream_error() {
        let body = r#"{"status": "error", "data": {}}"#;
        assert!(matches!(weatherfile().extract(body), Err(ExtractError::Upstream(_))));
    }

    #[test]
    fn test_not_json() {
        assert!(matches!(weatherfile().extract("<html>"), Err(ExtractError::Json(_))));
        assert!(matches!(weatherfile().extract("[1, 2]"), Err(ExtractError::Malformed(_))));
    }
}
