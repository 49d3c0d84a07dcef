//! Config validation: unknown-key detection with Levenshtein suggestions
//! and retry budget checks.
//!
//! Two-pass parse approach: first deserialize raw TOML into `toml::Value`,
//! walk the key tree, compare against known field names, and emit warnings
//! with "did you mean?" suggestions. Then proceed with normal serde
//! deserialization. Warnings never break existing configs.

use std::collections::HashSet;

use crate::pipeline::BackoffPolicy;

/// A non-fatal config warning (typo, suspicious value).
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, " (did you mean '{s}'?)")?;
        }
        Ok(())
    }
}

// ============================================================================
// Known Config Keys
// ============================================================================

/// Keys valid inside an endpoint table (`primary` / `fallback`).
const ENDPOINT_KEYS: &[&str] = &[
    "method",
    "url",
    "headers",
    "session_url",
    "parser",
    "speed_unit",
    "error_sentinels",
    "min_body_len",
    "history_window_secs",
];

/// Keys valid inside a parser table, across all parser kinds.
const PARSER_KEYS: &[&str] = &[
    "kind",
    // html-table
    "speed_label",
    "gust_label",
    "direction_label",
    "temperature_label",
    "pressure_label",
    "timestamp_label",
    // json-path
    "layout",
    "speed",
    "gust",
    "extremes_gust",
    "direction",
    "temperature",
    "pressure",
    "timestamp",
    // hex-telemetry
    "mode",
    "sample_cap",
];

const LAYOUT_KEYS: &[&str] = &[
    "type",
    "current",
    "extremes",
    "name_key",
    "value_key",
    "unit_key",
    "timestamp_key",
    "status_key",
    "ok_value",
    "data_key",
];

const FIELD_MATCH_KEYS: &[&str] = &["exact", "all", "none"];

const FIELD_MATCH_LISTS: &[&str] = &[
    "speed",
    "gust",
    "extremes_gust",
    "direction",
    "temperature",
    "pressure",
    "timestamp",
];

/// Returns the complete set of valid dotted key paths for WindfetchConfig.
///
/// Array-of-table elements share their parent's path (no index), so
/// `[[sources]]` entries all map to `sources.*`. Any new field added to
/// WindfetchConfig must be added here too.
pub fn known_config_keys() -> HashSet<String> {
    let mut keys: Vec<String> = [
        // [http]
        "http",
        "http.timeout_secs",
        "http.cycle_timeout_secs",
        "http.user_agent",
        "include_builtin",
        // [[sources]]
        "sources",
        "sources.id",
        "sources.name",
        "sources.primary",
        "sources.fallback",
        "sources.speed_unit",
        "sources.temperature_unit",
        "sources.pressure_unit",
        // [sources.retry]
        "sources.retry",
        "sources.retry.max_attempts",
        "sources.retry.base_delay_ms",
        "sources.retry.multiplier",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    for endpoint in ["sources.primary", "sources.fallback"] {
        for k in ENDPOINT_KEYS {
            keys.push(format!("{endpoint}.{k}"));
        }
        for k in PARSER_KEYS {
            keys.push(format!("{endpoint}.parser.{k}"));
        }
        for k in LAYOUT_KEYS {
            keys.push(format!("{endpoint}.parser.layout.{k}"));
        }
        for list in FIELD_MATCH_LISTS {
            for k in FIELD_MATCH_KEYS {
                keys.push(format!("{endpoint}.parser.{list}.{k}"));
            }
        }
    }
    keys.into_iter().collect()
}

// ============================================================================
// TOML Key Walking
// ============================================================================

/// Recursively walks a `toml::Value` tree and collects all dotted key paths.
///
/// For example, a table `{ a = { b = 1, c = 2 } }` yields:
/// `["a", "a.b", "a.c"]`. Tables inside arrays are walked under the array's
/// own path. Free-form `headers` maps are not descended into.
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    if let Some(table) = value.as_table() {
        for (k, v) in table {
            let path = if prefix.is_empty() {
                k.clone()
            } else {
                format!("{prefix}.{k}")
            };
            keys.push(path.clone());
            if k == "headers" {
                continue;
            }
            match v {
                toml::Value::Table(_) => keys.extend(walk_toml_keys(v, &path)),
                toml::Value::Array(items) => {
                    for item in items.iter().filter(|i| i.is_table()) {
                        keys.extend(walk_toml_keys(item, &path));
                    }
                }
                _ => {}
            }
        }
    }
    keys.sort();
    keys.dedup();
    keys
}

// ============================================================================
// Levenshtein Distance
// ============================================================================

/// Compute the Levenshtein edit distance between two strings.
fn levenshtein(a: &str, b: &str) -> usize {
    let a_len = a.chars().count();
    let b_len = b.chars().count();
    if a_len == 0 {
        return b_len;
    }
    if b_len == 0 {
        return a_len;
    }

    let mut prev: Vec<usize> = (0..=b_len).collect();
    let mut curr = vec![0; b_len + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.chars().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b_len]
}

/// Suggest the closest known key for an unknown key, if within edit distance 3.
pub fn suggest_correction(unknown: &str, known: &HashSet<String>) -> Option<String> {
    let mut best: Option<(&str, usize)> = None;
    for k in known {
        let dist = levenshtein(unknown, k);
        if dist <= 3 {
            match best {
                Some((_, best_dist)) if dist >= best_dist => {}
                _ => best = Some((k.as_str(), dist)),
            }
        }
    }
    best.map(|(k, _)| k.to_string())
}

// ============================================================================
// Unknown Key Validation (entry point)
// ============================================================================

/// Parse a raw TOML string and return warnings for any unknown config keys.
///
/// This does NOT fail on unknown keys; it only warns.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let value: toml::Value = match raw_toml.parse() {
        Ok(v) => v,
        Err(_) => return Vec::new(), // parse errors are handled by serde later
    };

    let known = known_config_keys();
    let found = walk_toml_keys(&value, "");
    let mut warnings = Vec::new();

    for key in &found {
        if !known.contains(key.as_str()) {
            let suggestion = suggest_correction(key, &known);
            let message = format!("Unknown config key '{key}'");
            warnings.push(ValidationWarning {
                field: key.clone(),
                message,
                suggestion,
            });
        }
    }

    warnings
}

// ============================================================================
// Retry Budget Validation
// ============================================================================

/// Flag sources whose worst-case cycle cannot finish inside the cycle timeout.
///
/// Worst case is every attempt timing out on both endpoints plus all backoff
/// sleeps. Such configs still load; the orchestrator cuts the cycle short.
pub fn validate_retry_budget(config: &super::WindfetchConfig) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();
    let cycle_ms = config.http.cycle_timeout_secs.saturating_mul(1000);
    let request_ms = config.http.timeout_secs.saturating_mul(1000);

    for source in config.registry().iter() {
        let policy = source.retry.bounded();
        let endpoints: u64 = if source.fallback.is_some() { 2 } else { 1 };
        let worst = endpoints
            * (u64::from(policy.max_attempts) * request_ms + total_backoff_ms(&policy));
        if worst > cycle_ms {
            warnings.push(ValidationWarning {
                field: format!("sources.{}.retry", source.id),
                message: format!(
                    "{}: worst-case fetch time {:.1}s exceeds http.cycle_timeout_secs ({}s)",
                    source.id,
                    worst as f64 / 1000.0,
                    config.http.cycle_timeout_secs
                ),
                suggestion: None,
            });
        }
    }
    warnings
}

fn total_backoff_ms(policy: &BackoffPolicy) -> u64 {
    policy.total_backoff().as_millis() as u64
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WindfetchConfig;

    #[test]
    fn test_levenshtein_identical() {
        assert_eq!(levenshtein("hello", "hello"), 0);
    }

    #[test]
    fn test_levenshtein_one_edit() {
        assert_eq!(levenshtein("multipler", "multiplier"), 1);
    }

    #[test]
    fn test_levenshtein_empty() {
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("abc", ""), 3);
    }

    #[test]
    fn test_walk_toml_keys_descends_arrays_of_tables() {
        let toml: toml::Value = r#"
            [[sources]]
            id = "a"
            [sources.primary]
            url = "http://x"
            [sources.primary.headers]
            Anything-Goes = "yes"

            [[sources]]
            id = "b"
        "#
        .parse()
        .unwrap();
        let keys = walk_toml_keys(&toml, "");
        assert!(keys.contains(&"sources".to_string()));
        assert!(keys.contains(&"sources.id".to_string()));
        assert!(keys.contains(&"sources.primary.url".to_string()));
        assert!(keys.contains(&"sources.primary.headers".to_string()));
        assert!(!keys.iter().any(|k| k.contains("Anything-Goes")));
        // Both array entries collapse onto one path
        assert_eq!(keys.iter().filter(|k| *k == "sources.id").count(), 1);
    }

    #[test]
    fn test_typo_key_produces_warning_with_suggestion() {
        let toml_str = r#"
[[sources]]
id = "brambles"
[sources.retry]
multipler = 2.0
"#;
        let warnings = validate_unknown_keys(toml_str);
        assert_eq!(warnings.len(), 1, "{warnings:?}");
        assert!(warnings[0].field.contains("multipler"));
        assert_eq!(
            warnings[0].suggestion.as_deref(),
            Some("sources.retry.multiplier")
        );
    }

    #[test]
    fn test_all_valid_keys_produce_zero_warnings() {
        let toml_str = r#"
include_builtin = true

[http]
timeout_secs = 5

[[sources]]
id = "local"
speed_unit = "knots"

[sources.primary]
url = "http://localhost/data.json"

[sources.primary.parser]
kind = "json-path"
speed = [{ all = ["wind speed"], none = ["high"] }]
direction = [{ exact = "dir" }]

[sources.primary.parser.layout]
type = "status-envelope"
status_key = "status"
ok_value = "ok"
data_key = "data"

[sources.fallback]
url = "http://localhost/live"

[sources.fallback.parser]
kind = "hex-telemetry"
mode = "live"
"#;
        let warnings = validate_unknown_keys(toml_str);
        assert!(warnings.is_empty(), "Expected 0 warnings, got: {:?}", warnings);
    }

    #[test]
    fn test_unknown_section_produces_warning() {
        let toml_str = r#"
[htp]
timeout_secs = 5
"#;
        let warnings = validate_unknown_keys(toml_str);
        assert!(warnings.iter().any(|w| w.field == "htp"));
        assert_eq!(
            warnings
                .iter()
                .find(|w| w.field == "htp")
                .and_then(|w| w.suggestion.as_deref()),
            Some("http")
        );
    }

    #[test]
    fn test_suggest_correction_no_match_for_garbage() {
        let known = known_config_keys();
        let suggestion = suggest_correction("completely_unrelated_garbage_key_xyz", &known);
        assert!(suggestion.is_none());
    }

    #[test]
    fn test_known_keys_cover_both_endpoints() {
        let known = known_config_keys();
        assert!(known.contains("sources.primary.parser.layout.name_key"));
        assert!(known.contains("sources.fallback.parser.sample_cap"));
        assert!(known.contains("sources.primary.parser.speed.exact"));
        assert!(known.contains("http.cycle_timeout_secs"));
    }

    #[test]
    fn test_retry_budget_defaults_clean() {
        let warnings = validate_retry_budget(&WindfetchConfig::default());
        assert!(warnings.is_empty(), "Defaults should fit the cycle: {warnings:?}");
    }

    #[test]
    fn test_retry_budget_flags_tight_cycle() {
        let mut config = WindfetchConfig::default();
        config.http.cycle_timeout_secs = config.http.timeout_secs;
        let warnings = validate_retry_budget(&config);
        assert!(warnings.iter().any(|w| w.field.contains("seaview")));
    }
}
