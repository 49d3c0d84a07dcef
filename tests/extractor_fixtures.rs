//! Extractor Fixture Tests
//!
//! Runs the built-in station profiles over captured-style payloads and
//! checks the canonical readings after normalization.

use chrono::{DateTime, TimeZone, Utc};

use windfetch::acquisition::{build_extractor, Extractor, RawObservation};
use windfetch::config::{SourceConfig, SourceRegistry};
use windfetch::processing::{normalize, SourceUnits};
use windfetch::{EndpointRole, Provenance, WeatherReading};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 8, 29, 14, 0, 0).unwrap()
}

fn extractor_for(source: &SourceConfig, role: EndpointRole) -> Box<dyn Extractor> {
    let endpoint = match role {
        EndpointRole::Primary => &source.primary,
        EndpointRole::Fallback => source.fallback.as_ref().unwrap(),
    };
    build_extractor(&endpoint.parser).unwrap()
}

/// Extract and normalize `body` the way the orchestrator would.
fn read(id: &str, role: EndpointRole, body: &str) -> WeatherReading {
    let registry = SourceRegistry::builtin();
    let source = registry.get(id).unwrap();
    let extractor = extractor_for(source, role);
    let raw = extractor.extract(body).unwrap();
    let endpoint = match role {
        EndpointRole::Primary => &source.primary,
        EndpointRole::Fallback => source.fallback.as_ref().unwrap(),
    };
    let units = SourceUnits {
        speed: source.speed_unit_for(endpoint),
        temperature: source.temperature_unit,
        pressure: source.pressure_unit,
    };
    let provenance = Provenance {
        source_id: source.id.clone(),
        endpoint: role,
        url: endpoint.url.clone(),
        parser: extractor.tag(),
        attempts: 1,
        states: Vec::new(),
    };
    normalize(raw, units, provenance, 0, now())
}

fn raw(id: &str, body: &str) -> RawObservation {
    let registry = SourceRegistry::builtin();
    extractor_for(registry.get(id).unwrap(), EndpointRole::Primary)
        .extract(body)
        .unwrap()
}

// ============================================================================
// Southampton VTS (HTML table)
// ============================================================================

const BRAMBLE_FULL: &str = r#"<table class="snapshot">
<tr><td class="label">Updated:</td><td><span>29/08/2025 14:45:00</span></td></tr>
<tr><td class="label">Wind Speed:</td><td>12.3 Knots</td></tr>
<tr><td class="label">Max Gust:</td><td>18.0 Knots</td></tr>
<tr><td class="label">Wind Direction:</td><td>225 Deg</td></tr>
<tr><td class="label">Air Temp:</td><td>16.4</td></tr>
<tr><td class="label">Pressure:</td><td>1013</td></tr>
</table>"#;

#[test]
fn bramble_table_reads_every_quantity() {
    let r = read("brambles", EndpointRole::Primary, BRAMBLE_FULL);
    assert!(r.valid);
    assert!((r.wind_speed.unwrap() - 12.3 * 0.514444).abs() < 1e-9);
    assert!((r.wind_gust_knots().unwrap() - 18.0).abs() < 1e-4);
    assert_eq!(r.wind_direction, Some(225.0));
    assert_eq!(r.temperature, Some(16.4));
    assert_eq!(r.pressure, Some(1013.0));
    assert_eq!(r.timestamp, "29/08/2025 14:45:00 GMT");
    assert!(r.skipped_fields.is_empty(), "{:?}", r.skipped_fields);
}

#[test]
fn bramble_without_gust_row_uses_speed() {
    let body = BRAMBLE_FULL.replace("Max Gust", "Visibility");
    let r = read("brambles", EndpointRole::Primary, &body);
    assert_eq!(r.wind_gust, r.wind_speed);
}

#[test]
fn bramble_unparsable_speed_is_skipped_not_zero() {
    let body = BRAMBLE_FULL.replace("12.3 Knots", "n/a");
    let r = read("brambles", EndpointRole::Primary, &body);
    assert_eq!(r.wind_speed, None);
    assert_eq!(r.wind_direction, Some(225.0));
    assert!(r.valid, "direction alone keeps the reading valid");
}

#[test]
fn html_extraction_is_deterministic() {
    assert_eq!(raw("brambles", BRAMBLE_FULL), raw("brambles", BRAMBLE_FULL));
}

// ============================================================================
// WeatherLink (JSON sensor array)
// ============================================================================

const WEATHERLINK: &str = r#"{
  "lastReceived": 1756475100000,
  "currConditionValues": [
    {"sensorDataName": "Temp", "convertedValue": "17.1", "unitLabel": "°C"},
    {"sensorDataName": "Wind Speed", "convertedValue": "14", "unitLabel": "kts"},
    {"sensorDataName": "2 Min Avg Wind Speed", "convertedValue": "--", "unitLabel": "kts"},
    {"sensorDataName": "10 Min Avg Wind Speed", "convertedValue": "11", "unitLabel": "kts"},
    {"sensorDataName": "Wind Direction", "convertedValue": "SW", "unitLabel": ""}
  ],
  "highLowValues": [
    {"sensorDataName": "High Wind Speed", "convertedValue": "22", "unitLabel": "kts"}
  ]
}"#;

#[test]
fn weatherlink_skips_no_data_average() {
    let r = read("seaview", EndpointRole::Primary, WEATHERLINK);
    // 2-min average is "--", the 10-min one is next in line
    assert!((r.wind_speed_knots().unwrap() - 11.0).abs() < 1e-4);
}

#[test]
fn weatherlink_extremes_supply_gust() {
    let r = read("seaview", EndpointRole::Primary, WEATHERLINK);
    assert!((r.wind_gust_knots().unwrap() - 22.0).abs() < 1e-4);
}

#[test]
fn weatherlink_cardinal_direction_and_epoch_millis() {
    let r = read("seaview", EndpointRole::Primary, WEATHERLINK);
    assert_eq!(r.wind_direction, Some(225.0));
    assert_eq!(r.temperature, Some(17.1));
    assert_eq!(r.timestamp, "2025-08-29T13:45:00Z");
}

#[test]
fn weatherlink_array_root_is_unwrapped() {
    let body = format!("[{WEATHERLINK}]");
    let r = read("seaview", EndpointRole::Primary, &body);
    assert!((r.wind_speed_knots().unwrap() - 11.0).abs() < 1e-4);
}

// ============================================================================
// WeatherFile (JSON status envelope)
// ============================================================================

#[test]
fn weatherfile_prefers_average_over_current() {
    let body = r#"{"status": "ok", "data": {"wsc": 9.0, "wsa": 7.5, "wsh": 12.0, "wda": 190, "lastact": "2025-08-29 14:40:00"}}"#;
    let r = read("lymington", EndpointRole::Primary, body);
    assert!((r.wind_speed_knots().unwrap() - 7.5).abs() < 1e-4);
    assert!((r.wind_gust_knots().unwrap() - 12.0).abs() < 1e-4);
    assert_eq!(r.wind_direction, Some(190.0));
    assert_eq!(r.timestamp, "2025-08-29 14:40:00 GMT");
}

#[test]
fn weatherfile_error_status_is_upstream_failure() {
    let registry = SourceRegistry::builtin();
    let extractor = extractor_for(registry.get("lymington").unwrap(), EndpointRole::Primary);
    let err = extractor
        .extract(r#"{"status": "nodata", "data": {}}"#)
        .unwrap_err();
    assert!(err.to_string().contains("nodata"));
}

// ============================================================================
// Navis (hex telemetry)
// ============================================================================

#[test]
fn navis_live_record_decodes() {
    let r = read("seaview", EndpointRole::Fallback, "1756475100:1:23200377de0");
    assert!((r.wind_speed.unwrap() - 5.5).abs() < 1e-9);
    assert!((r.wind_direction.unwrap() - 25.1).abs() < 1e-9);
    assert!((r.temperature.unwrap() - 16.2).abs() < 1e-9);
    assert_eq!(r.sample_count, 1);
}

#[test]
fn navis_history_reports_mean_and_peak() {
    // 4.0, 4.0, 4.0, 16.0 m/s: one gust among steady samples
    let body = "1756475100,10:00280000|10:00280000|10:00280000|10:00a00000";
    let r = read("seaview-history", EndpointRole::Primary, body);
    assert_eq!(r.sample_count, 4);
    assert!((r.wind_speed.unwrap() - 7.0).abs() < 1e-9);
    assert!((r.wind_gust.unwrap() - 16.0).abs() < 1e-9);
    assert_eq!(r.timestamp, "2025-08-29T13:45:00Z");
}

#[test]
fn navis_history_skips_bad_records() {
    let body = "1756475100,10:00280000|10:garbage|10:zzzzzzzz|10:00500000";
    let r = read("seaview-history", EndpointRole::Primary, body);
    assert_eq!(r.sample_count, 2);
    assert!((r.wind_speed.unwrap() - 6.0).abs() < 1e-9);
    assert_eq!(r.skipped_fields.len(), 2);
}
