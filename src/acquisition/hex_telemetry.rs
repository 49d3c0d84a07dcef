//! Hex Telemetry Decoder
//!
//! Navis loggers pack one observation into a hex word pair:
//!
//! ```text
//! payload  = [ MSB word (0-8 hex digits) ][ LSB word (8 hex digits) ]
//!
//! LSB bits  31..16  wind speed, tenths of the native unit
//!           15..7   wind direction, tenths of a degree (9-bit field)
//!            6..0   signal strength
//! MSB bits  10..0   temperature, (raw - 400) / 10 °C
//! ```
//!
//! Live bodies carry one `timestamp:status:payload` record. History bodies
//! carry many records separated by `|` (or `,`); the first may be prefixed
//! with `timestamp,`. The payload is always the last `:` field.

use std::collections::VecDeque;

use statrs::statistics::Statistics;

use super::{ExtractError, Extractor, RawObservation};
use crate::config::{HexMode, HexProfile};
use crate::types::ParserTag;

// ============================================================================
// Bit Layout
// ============================================================================

/// Hex digits in the least-significant word.
pub const LSB_HEX_DIGITS: usize = 8;

/// Longest payload accepted (two full 32-bit words).
pub const MAX_PAYLOAD_HEX_DIGITS: usize = 16;

pub const SPEED_SHIFT: u32 = 16;
pub const SPEED_MASK: u32 = 0xFFFF;
pub const SPEED_DIVISOR: f64 = 10.0;

pub const DIRECTION_SHIFT: u32 = 7;
pub const DIRECTION_MASK: u32 = 0x1FF;
pub const DIRECTION_SCALE: f64 = 0.1;

pub const RSSI_MASK: u32 = 0x7F;

pub const TEMPERATURE_MASK: u64 = 0x7FF;
pub const TEMPERATURE_OFFSET: f64 = 400.0;
pub const TEMPERATURE_DIVISOR: f64 = 10.0;

/// Plausible air temperature band; decoded values outside it are dropped.
pub const TEMPERATURE_MIN_C: f64 = -20.0;
pub const TEMPERATURE_MAX_C: f64 = 50.0;

/// Linear and circular batch directions further apart than this are logged.
pub const DIRECTION_DIVERGENCE_WARN_DEG: f64 = 45.0;

/// Record timestamps shorter than this are logger intervals, not epochs.
const MIN_EPOCH_DIGITS: usize = 9;

/// One decoded record.
#[derive(Debug, Clone, PartialEq)]
pub struct HexSample {
    pub timestamp: Option<String>,
    /// Native speed unit (the source config says which)
    pub speed: f64,
    /// Degrees, `[0, 360)`
    pub direction: f64,
    /// °C, `None` without an MSB word or when implausible
    pub temperature: Option<f64>,
    pub rssi: u8,
}

/// Decode one hex payload.
pub fn decode_payload(payload: &str) -> Result<HexSample, ExtractError> {
    let hex = payload.trim();
    if hex.len() < LSB_HEX_DIGITS {
        return Err(ExtractError::Malformed(format!(
            "hex payload '{hex}' shorter than {LSB_HEX_DIGITS} digits"
        )));
    }
    if hex.len() > MAX_PAYLOAD_HEX_DIGITS {
        return Err(ExtractError::Malformed(format!(
            "hex payload of {} digits exceeds {MAX_PAYLOAD_HEX_DIGITS}",
            hex.len()
        )));
    }
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ExtractError::Malformed(format!("'{hex}' is not hex")));
    }

    let (msb_hex, lsb_hex) = hex.split_at(hex.len() - LSB_HEX_DIGITS);
    let lsb = u32::from_str_radix(lsb_hex, 16)
        .map_err(|e| ExtractError::Malformed(format!("LSB '{lsb_hex}': {e}")))?;
    let msb = if msb_hex.is_empty() {
        None
    } else {
        Some(
            u64::from_str_radix(msb_hex, 16)
                .map_err(|e| ExtractError::Malformed(format!("MSB '{msb_hex}': {e}")))?,
        )
    };

    let speed = f64::from((lsb >> SPEED_SHIFT) & SPEED_MASK) / SPEED_DIVISOR;
    let direction =
        (f64::from((lsb >> DIRECTION_SHIFT) & DIRECTION_MASK) * DIRECTION_SCALE).rem_euclid(360.0);
    let rssi = (lsb & RSSI_MASK) as u8;
    let temperature = msb
        .map(|m| ((m & TEMPERATURE_MASK) as f64 - TEMPERATURE_OFFSET) / TEMPERATURE_DIVISOR)
        .filter(|t| (TEMPERATURE_MIN_C..=TEMPERATURE_MAX_C).contains(t));

    Ok(HexSample {
        timestamp: None,
        speed,
        direction,
        temperature,
        rssi,
    })
}

/// Decode one `...:payload` record, keeping its timestamp when it has one.
pub fn decode_record(record: &str) -> Result<HexSample, ExtractError> {
    let record = record.trim();
    let fields: Vec<&str> = record.split(':').collect();
    if fields.len() < 2 {
        return Err(ExtractError::Malformed(format!("record '{record}' has no payload field")));
    }
    let mut sample = decode_payload(fields[fields.len() - 1])?;
    sample.timestamp = record_timestamp(fields[0], fields.len());
    Ok(sample)
}

fn record_timestamp(head: &str, field_count: usize) -> Option<String> {
    let head = head.trim();
    let ts = match head.split_once(',') {
        Some((ts, _interval)) => ts.trim(),
        None if field_count >= 3 || head.len() >= MIN_EPOCH_DIGITS => head,
        None => return None,
    };
    Some(ts.to_string()).filter(|s| !s.is_empty())
}

/// Split a body into records: `|`-separated if any `|` occurs, else on
/// commas and newlines.
pub fn split_records(body: &str) -> Vec<&str> {
    let parts: Vec<&str> = if body.contains('|') {
        body.split('|').collect()
    } else {
        body.split([',', '\n']).collect()
    };
    parts
        .into_iter()
        .map(str::trim)
        .filter(|r| !r.is_empty() && r.contains(':'))
        .collect()
}

// ============================================================================
// Sliding Window
// ============================================================================

/// Mean/peak summary of a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchStats {
    pub mean_speed: f64,
    pub min_speed: f64,
    pub peak_speed: f64,
    /// Linear (not circular) mean of directions
    pub mean_direction: f64,
    /// Vector-averaged bearing, `None` when the directions cancel
    pub circular_direction: Option<f64>,
    pub mean_temperature: Option<f64>,
    pub sample_count: usize,
    pub latest_timestamp: Option<String>,
}

/// Fixed-capacity sample buffer; pushing past capacity evicts the oldest.
#[derive(Debug, Clone)]
pub struct SampleWindow {
    samples: VecDeque<HexSample>,
    cap: usize,
    evicted: usize,
}

impl SampleWindow {
    pub fn new(cap: usize) -> Self {
        let cap = cap.max(1);
        Self {
            samples: VecDeque::with_capacity(cap),
            cap,
            evicted: 0,
        }
    }

    pub fn push(&mut self, sample: HexSample) {
        if self.samples.len() == self.cap {
            self.samples.pop_front();
            self.evicted += 1;
        }
        self.samples.push_back(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.cap
    }

    /// Samples dropped to stay within capacity.
    pub fn evicted(&self) -> usize {
        self.evicted
    }

    pub fn iter(&self) -> impl Iterator<Item = &HexSample> {
        self.samples.iter()
    }

    pub fn stats(&self) -> Option<BatchStats> {
        if self.samples.is_empty() {
            return None;
        }
        let speeds: Vec<f64> = self.samples.iter().map(|s| s.speed).collect();
        let directions: Vec<f64> = self.samples.iter().map(|s| s.direction).collect();
        let temps: Vec<f64> = self.samples.iter().filter_map(|s| s.temperature).collect();

        Some(BatchStats {
            mean_speed: Statistics::mean(speeds.iter()),
            min_speed: Statistics::min(speeds.iter()),
            peak_speed: Statistics::max(speeds.iter()),
            mean_direction: Statistics::mean(directions.iter()),
            circular_direction: circular_mean_direction(&directions),
            mean_temperature: (!temps.is_empty()).then(|| Statistics::mean(temps.iter())),
            sample_count: self.samples.len(),
            latest_timestamp: self.samples.iter().rev().find_map(|s| s.timestamp.clone()),
        })
    }
}

/// Vector-averaged bearing, for diagnostics. `None` when the vectors cancel.
pub fn circular_mean_direction(directions: &[f64]) -> Option<f64> {
    if directions.is_empty() {
        return None;
    }
    let (sin, cos) = directions.iter().fold((0.0_f64, 0.0_f64), |(s, c), d| {
        let r = d.to_radians();
        (s + r.sin(), c + r.cos())
    });
    if sin.hypot(cos) < 1e-9 {
        return None;
    }
    Some(sin.atan2(cos).to_degrees().rem_euclid(360.0))
}

impl BatchStats {
    /// Angle between the linear and circular direction means, when it
    /// exceeds `DIRECTION_DIVERGENCE_WARN_DEG`.
    pub fn direction_divergence(&self) -> Option<f64> {
        let circular = self.circular_direction?;
        let diff = (self.mean_direction - circular).rem_euclid(360.0);
        let diff = diff.min(360.0 - diff);
        (diff > DIRECTION_DIVERGENCE_WARN_DEG).then_some(diff)
    }
}

// ============================================================================
// Extractor
// ============================================================================

/// Decoder for Navis live and history bodies.
pub struct HexTelemetryExtractor {
    profile: HexProfile,
}

impl HexTelemetryExtractor {
    pub fn new(profile: HexProfile) -> Self {
        Self { profile }
    }

    fn decode_all(&self, body: &str) -> (Vec<HexSample>, Vec<String>) {
        let mut samples = Vec::new();
        let mut skipped = Vec::new();
        for (i, record) in split_records(body).into_iter().enumerate() {
            match decode_record(record) {
                Ok(s) => samples.push(s),
                Err(e) => {
                    tracing::debug!(record = i, error = %e, "[HexTelemetry] Skipping record");
                    skipped.push(format!("record[{i}]"));
                }
            }
        }
        (samples, skipped)
    }
}

impl Extractor for HexTelemetryExtractor {
    fn tag(&self) -> ParserTag {
        ParserTag::HexTelemetry
    }

    fn extract(&self, body: &str) -> Result<RawObservation, ExtractError> {
        let (samples, skipped) = self.decode_all(body);
        if samples.is_empty() {
            return Err(ExtractError::Malformed(format!(
                "no decodable hex records ({} skipped)",
                skipped.len()
            )));
        }

        match self.profile.mode {
            HexMode::Live => {
                let mut samples = samples;
                let Some(latest) = samples.pop() else {
                    return Err(ExtractError::Malformed("no decodable hex records".to_string()));
                };
                Ok(RawObservation {
                    wind_speed: Some(latest.speed),
                    wind_gust: Some(latest.speed),
                    wind_direction: Some(latest.direction),
                    temperature: latest.temperature,
                    timestamp: latest.timestamp,
                    sample_count: 1,
                    skipped,
                    ..Default::default()
                })
            }
            HexMode::History => {
                let mut window = SampleWindow::new(self.profile.sample_cap);
                for s in samples {
                    window.push(s);
                }
                if window.evicted() > 0 {
                    tracing::debug!(
                        evicted = window.evicted(),
                        cap = window.capacity(),
                        "[HexTelemetry] Batch exceeded sample cap, oldest samples dropped"
                    );
                }
                let Some(stats) = window.stats() else {
                    return Err(ExtractError::Malformed("empty sample window".to_string()));
                };
                tracing::debug!(
                    samples = stats.sample_count,
                    min = stats.min_speed,
                    mean = stats.mean_speed,
                    peak = stats.peak_speed,
                    "[HexTelemetry] Batch summarised"
                );
                if let Some(divergence) = stats.direction_divergence() {
                    tracing::warn!(
                        linear = stats.mean_direction,
                        circular = ?stats.circular_direction,
                        divergence,
                        "[HexTelemetry] Linear direction mean diverges from circular mean"
                    );
                }
                Ok(RawObservation {
                    wind_speed: Some(stats.mean_speed),
                    wind_gust: Some(stats.peak_speed),
                    wind_direction: Some(stats.mean_direction),
                    temperature: stats.mean_temperature,
                    timestamp: stats.latest_timestamp,
                    sample_count: stats.sample_count,
                    skipped,
                    ..Default::default()
                })
            }
        }
    }
}
