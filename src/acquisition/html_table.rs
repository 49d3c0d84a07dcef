//! HTML Table Extractor
//!
//! Pulls values out of label/value table rows such as
//! `<td>Wind Speed</td><td>12.3 Knots</td>`. Cells are located by their
//! label text rather than position, so added rows or attributes upstream
//! do not shift the values read.

use std::sync::LazyLock;

use regex::Regex;

use super::{leading_number, ExtractError, Extractor, RawObservation};
use crate::config::HtmlTableProfile;
use crate::processing::normalizer::cardinal_to_degrees;
use crate::types::{ParserTag, PressureUnit, SpeedUnit, TemperatureUnit};

/// A table cell: its inner markup and its flattened text.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub inner: String,
    pub text: String,
}

/// Compiled once per process and shared by every extractor.
static SHARED_TABLE: LazyLock<Result<HtmlTable, regex::Error>> = LazyLock::new(HtmlTable::new);

/// Cell scanner for `<td>` / `<th>` markup.
#[derive(Debug, Clone)]
pub struct HtmlTable {
    cell_re: Regex,
    tag_re: Regex,
    /// A single element spanning the whole cell
    child_re: Regex,
}

impl HtmlTable {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            cell_re: Regex::new(r"(?is)<t[dh]\b[^>]*>(.*?)</t[dh]\s*>")?,
            tag_re: Regex::new(r"(?s)<[^>]*>")?,
            child_re: Regex::new(
                r"(?is)^\s*<([a-z][a-z0-9]*)\b[^>]*>(.*)</\s*([a-z][a-z0-9]*)\s*>\s*$",
            )?,
        })
    }

    /// The process-wide scanner.
    pub fn shared() -> Result<&'static Self, ExtractError> {
        SHARED_TABLE.as_ref().map_err(|e| ExtractError::Pattern(e.clone()))
    }

    /// All cells in document order.
    pub fn cells(&self, html: &str) -> Vec<Cell> {
        self.cell_re
            .captures_iter(html)
            .filter_map(|c| c.get(1))
            .map(|m| Cell {
                inner: m.as_str().to_string(),
                text: self.flatten(m.as_str()),
            })
            .collect()
    }

    /// Strip tags, decode entities, collapse whitespace.
    pub fn flatten(&self, markup: &str) -> String {
        let stripped = self.tag_re.replace_all(markup, " ");
        collapse_whitespace(&decode_entities(&stripped))
    }

    /// The cell following the one labelled `label`.
    ///
    /// Label comparison is case-insensitive on whitespace-collapsed text with
    /// a trailing `:` ignored. An exact label match wins over a prefix match.
    pub fn value_cell<'a>(&self, cells: &'a [Cell], label: &str) -> Option<&'a Cell> {
        let wanted = label_key(label);
        if wanted.is_empty() {
            return None;
        }
        let keys: Vec<String> = cells.iter().map(|c| label_key(&c.text)).collect();
        let exact = keys.iter().position(|k| *k == wanted);
        let idx = exact.or_else(|| keys.iter().position(|k| k.starts_with(&wanted)))?;
        cells.get(idx + 1)
    }

    /// Leading number in the value cell of `label`.
    pub fn number(&self, html: &str, label: &str) -> Option<f64> {
        let cells = self.cells(html);
        let cell = self.value_cell(&cells, label)?;
        leading_number(&cell.text).map(|(v, _)| v)
    }

    /// Text of the value cell of `label`, unwrapping one nested element if
    /// one wraps the value.
    pub fn text(&self, html: &str, label: &str) -> Option<String> {
        let cells = self.cells(html);
        let cell = self.value_cell(&cells, label)?;
        Some(self.cell_string(cell)).filter(|s| !s.is_empty())
    }

    /// Unwraps only when one element holds the whole value; sibling text or
    /// elements fall back to the flattened cell.
    fn cell_string(&self, cell: &Cell) -> String {
        if let Some(caps) = self.child_re.captures(&cell.inner) {
            let open = caps.get(1).map(|m| m.as_str().to_ascii_lowercase());
            let close = caps.get(3).map(|m| m.as_str().to_ascii_lowercase());
            if let (Some(open), Some(close), Some(inner)) = (open, close, caps.get(2)) {
                let reopened = inner.as_str().to_ascii_lowercase().contains(&format!("</{open}"));
                if open == close && !reopened {
                    let text = self.flatten(inner.as_str());
                    if !text.is_empty() {
                        return text;
                    }
                }
            }
        }
        cell.text.clone()
    }
}

fn label_key(text: &str) -> String {
    collapse_whitespace(text)
        .trim_end_matches(':')
        .trim()
        .to_lowercase()
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Decode the handful of entities station pages actually use.
pub fn decode_entities(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&#160;", " ")
        .replace("&deg;", "°")
        .replace("&#176;", "°")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

// ============================================================================
// Extractor
// ============================================================================

/// Label-driven extractor for station HTML snapshots.
pub struct HtmlTableExtractor {
    profile: HtmlTableProfile,
    table: &'static HtmlTable,
}

impl HtmlTableExtractor {
    pub fn new(profile: HtmlTableProfile) -> Result<Self, ExtractError> {
        Ok(Self {
            profile,
            table: HtmlTable::shared()?,
        })
    }

    /// Degrees, or a compass label such as "SW" when the cell has no number.
    fn direction(&self, cells: &[Cell], label: &str, skipped: &mut Vec<String>) -> Option<f64> {
        if label.trim().is_empty() {
            return None;
        }
        let cell = self.table.value_cell(cells, label);
        let parsed = cell.and_then(|c| {
            leading_number(&c.text)
                .map(|(v, _)| v)
                .or_else(|| c.text.split_whitespace().next().and_then(cardinal_to_degrees))
        });
        if parsed.is_none() {
            skipped.push("wind_direction".to_string());
        }
        parsed
    }

    /// Number plus the first word after it, for unit hints.
    fn number_with_unit(
        &self,
        cells: &[Cell],
        label: &str,
        field: &str,
        skipped: &mut Vec<String>,
    ) -> Option<(f64, String)> {
        if label.trim().is_empty() {
            return None;
        }
        let parsed = self.table.value_cell(cells, label).and_then(|cell| {
            leading_number(&cell.text).map(|(v, rest)| {
                let unit = rest.split_whitespace().next().unwrap_or("").to_string();
                (v, unit)
            })
        });
        if parsed.is_none() {
            skipped.push(field.to_string());
        }
        parsed
    }
}

impl Extractor for HtmlTableExtractor {
    fn tag(&self) -> ParserTag {
        ParserTag::HtmlTable
    }

    fn extract(&self, body: &str) -> Result<RawObservation, ExtractError> {
        let cells = self.table.cells(body);
        if cells.is_empty() {
            return Err(ExtractError::Malformed("no table cells in body".to_string()));
        }

        let p = &self.profile;
        let mut obs = RawObservation {
            sample_count: 1,
            ..Default::default()
        };
        let mut skipped = Vec::new();

        if let Some((v, unit)) = self.number_with_unit(&cells, &p.speed_label, "wind_speed", &mut skipped) {
            obs.wind_speed = Some(v);
            obs.speed_unit = SpeedUnit::from_label(&unit);
        }
        if let Some(label) = &p.gust_label {
            obs.wind_gust = self
                .number_with_unit(&cells, label, "wind_gust", &mut skipped)
                .map(|(v, _)| v);
        }
        obs.wind_direction = self.direction(&cells, &p.direction_label, &mut skipped);
        if let Some(label) = &p.temperature_label {
            if let Some((v, unit)) = self.number_with_unit(&cells, label, "temperature", &mut skipped) {
                obs.temperature = Some(v);
                obs.temperature_unit = TemperatureUnit::from_label(&unit);
            }
        }
        if let Some(label) = &p.pressure_label {
            if let Some((v, unit)) = self.number_with_unit(&cells, label, "pressure", &mut skipped) {
                obs.pressure = Some(v);
                obs.pressure_unit = PressureUnit::from_label(&unit);
            }
        }
        if let Some(label) = &p.timestamp_label {
            obs.timestamp = self
                .table
                .value_cell(&cells, label)
                .map(|c| self.table.cell_string(c))
                .filter(|s| !s.is_empty());
            if obs.timestamp.is_none() {
                skipped.push("timestamp".to_string());
            }
        }

        obs.skipped = skipped;
        Ok(obs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BRAMBLE: &str = r#"
<table class="met">
  <tr><th colspan="2">Bramble Bank</th></tr>
  <tr><td class="label">Updated:</td><td><span class="ts">29/08/2025 14:45:00</span></td></tr>
  <tr><td class="label">Wind Speed</td><td>12.3 Knots</td></tr>
  <tr><td class="label">Max Gust</td><td>18.1&nbsp;Knots</td></tr>
  <tr><td class="label">Wind Direction</td><td>225 &deg;</td></tr>
  <tr><td class="label">Air Temp</td><td>17.4 &deg;C</td></tr>
  <tr><td class="label">Pressure</td><td>1013 mb</td></tr>
</table>"#;

    fn profile() -> HtmlTableProfile {
        HtmlTableProfile {
            speed_label: "Wind Speed".to_string(),
            gust_label: Some("Max Gust".to_string()),
            direction_label: "Wind Direction".to_string(),
            temperature_label: Some("Air Temp".to_string()),
            pressure_label: Some("Pressure".to_string()),
            timestamp_label: Some("Updated".to_string()),
        }
    }

    #[test]
    fn test_single_pair() {
        let table = HtmlTable::new().unwrap();
        assert_eq!(table.number("<td>Label</td><td>12.3 Knots</td>", "Label"), Some(12.3));
    }

    #[test]
    fn test_missing_label_is_none() {
        let table = HtmlTable::new().unwrap();
        assert_eq!(table.number("<td>Other</td><td>1.0</td>", "Label"), None);
        assert_eq!(table.text("<td>Other</td><td>1.0</td>", "Label"), None);
    }

    #[test]
    fn test_exact_match_beats_prefix() {
        let html = "<td>Wind Speed Max</td><td>30</td><td>Wind Speed</td><td>12</td>";
        let table = HtmlTable::new().unwrap();
        assert_eq!(table.number(html, "wind speed"), Some(12.0));
        // Prefix still resolves when no exact label exists
        assert_eq!(table.number(html, "Wind Speed M"), Some(30.0));
    }

    #[test]
    fn test_markup_drift_tolerated() {
        let html = r#"<TD   style="x">  Wind
            Speed </TD>
            <td><b>9.8</b> kts</td>"#;
        let table = HtmlTable::new().unwrap();
        assert_eq!(table.number(html, "Wind Speed"), Some(9.8));
    }

    #[test]
    fn test_nested_markup_unwrapped_for_text() {
        let table = HtmlTable::new().unwrap();
        assert_eq!(
            table.text(BRAMBLE, "Updated").as_deref(),
            Some("29/08/2025 14:45:00")
        );
    }

    #[test]
    fn test_split_value_keeps_every_part() {
        let table = HtmlTable::new().unwrap();
        let spans = "<td>Updated</td><td><span>29/08/2025</span> <span>14:45:00</span></td>";
        assert_eq!(table.text(spans, "Updated").as_deref(), Some("29/08/2025 14:45:00"));
        let mixed = "<td>Updated</td><td>29/08/2025 <b>14:45:00</b></td>";
        assert_eq!(table.text(mixed, "Updated").as_deref(), Some("29/08/2025 14:45:00"));
        let trailing = "<td>Updated</td><td><b>29/08/2025</b> 14:45:00</td>";
        assert_eq!(table.text(trailing, "Updated").as_deref(), Some("29/08/2025 14:45:00"));
    }

    #[test]
    fn test_single_wrapper_with_padding_unwrapped() {
        let table = HtmlTable::new().unwrap();
        let html = "<td>Updated</td><td>\n  <span class=\"ts\"><i>29/08/2025</i> 14:45</span>  </td>";
        assert_eq!(table.text(html, "Updated").as_deref(), Some("29/08/2025 14:45"));
    }

    #[test]
    fn test_shared_scanner_is_reused() {
        let a = HtmlTable::shared().unwrap();
        let b = HtmlTable::shared().unwrap();
        assert!(std::ptr::eq(a, b));
    }

    #[test]
    fn test_compass_direction_accepted() {
        let html = "<td>Wind Speed</td><td>10 Knots</td><td>Wind Direction</td><td>SW</td>";
        let ex = HtmlTableExtractor::new(profile()).unwrap();
        let obs = ex.extract(html).unwrap();
        assert_eq!(obs.wind_direction, Some(225.0));
        assert!(!obs.skipped.contains(&"wind_direction".to_string()));

        let garbled = html.replace("SW", "calm");
        let obs = ex.extract(&garbled).unwrap();
        assert_eq!(obs.wind_direction, None);
        assert!(obs.skipped.contains(&"wind_direction".to_string()));
    }

    #[test]
    fn test_full_extraction() {
        let ex = HtmlTableExtractor::new(profile()).unwrap();
        let obs = ex.extract(BRAMBLE).unwrap();
        assert_eq!(obs.wind_speed, Some(12.3));
        assert_eq!(obs.wind_gust, Some(18.1));
        assert_eq!(obs.wind_direction, Some(225.0));
        assert_eq!(obs.temperature, Some(17.4));
        assert_eq!(obs.pressure, Some(1013.0));
        assert_eq!(obs.timestamp.as_deref(), Some("29/08/2025 14:45:00"));
        assert_eq!(obs.speed_unit, Some(SpeedUnit::Knots));
        assert_eq!(obs.temperature_unit, Some(TemperatureUnit::Celsius));
        assert_eq!(obs.pressure_unit, Some(PressureUnit::Hectopascal));
        assert!(obs.skipped.is_empty(), "{:?}", obs.skipped);
    }

    #[test]
    fn test_malformed_field_skipped_not_fatal() {
        let html = "<td>Wind Speed</td><td>n/a</td><td>Wind Direction</td><td>180</td>";
        let ex = HtmlTableExtractor::new(profile()).unwrap();
        let obs = ex.extract(html).unwrap();
        assert_eq!(obs.wind_speed, None);
        assert_eq!(obs.wind_direction, Some(180.0));
        assert!(obs.skipped.contains(&"wind_speed".to_string()));
        assert!(obs.skipped.contains(&"temperature".to_string()));
    }

    #[test]
    fn test_no_cells_is_malformed() {
        let ex = HtmlTableExtractor::new(profile()).unwrap();
        assert!(matches!(ex.extract("<html>maintenance</html>"), Err(ExtractError::Malformed(_))));
    }

    #[test]
    fn test_entities_decoded() {
        assert_eq!(decode_entities("5&nbsp;&deg;C &amp; &lt;b&gt;"), "5 °C & <b>");
    }
}
