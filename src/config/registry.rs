//! Source Registry - every upstream station as an operator-tunable TOML value
//!
//! The built-in table describes the known stations. A config file can replace
//! any built-in source (matched by `id`) or add new ones; whatever is loaded is
//! validated once and never mutated afterwards.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::defaults::{
    CYCLE_TIMEOUT_SECS, DEFAULT_ERROR_SENTINELS, DEFAULT_HISTORY_WINDOW_SECS,
    DEFAULT_MIN_BODY_LEN, DEFAULT_SAMPLE_CAP, HTTP_TIMEOUT_SECS, MAX_ATTEMPTS_CEILING,
    MAX_BODY_BYTES, MAX_DELAY_MS, MAX_SAMPLE_CAP, USER_AGENT,
};
use crate::pipeline::BackoffPolicy;
use crate::types::{ParserTag, SpeedUnit, TemperatureUnit, PressureUnit};

/// Environment variable naming the config file.
pub const CONFIG_ENV_VAR: &str = "WINDFETCH_CONFIG";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "windfetch.toml";

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration.
///
/// Load with `WindfetchConfig::load()` which searches:
/// 1. `$WINDFETCH_CONFIG` env var
/// 2. `./windfetch.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindfetchConfig {
    /// HTTP client settings shared by every source
    #[serde(default)]
    pub http: HttpConfig,

    /// Start from the built-in station table before applying `sources`
    #[serde(default = "default_true")]
    pub include_builtin: bool,

    /// Sources replacing built-ins with the same id, or adding new ones
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

fn default_true() -> bool {
    true
}

impl Default for WindfetchConfig {
    fn default() -> Self {
        Self {
            http: HttpConfig::default(),
            include_builtin: true,
            sources: Vec::new(),
        }
    }
}

impl WindfetchConfig {
    /// Load configuration using the standard search order:
    /// 1. `$WINDFETCH_CONFIG` environment variable
    /// 2. `./windfetch.toml` in the current working directory
    /// 3. Built-in defaults
    pub fn load() -> Self {
        // 1. Check env var
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), sources = config.sources.len(), "Loaded config from WINDFETCH_CONFIG");
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from WINDFETCH_CONFIG, falling back");
                    }
                }
            } else {
                warn!(path = %path, "WINDFETCH_CONFIG points to non-existent file, falling back");
            }
        }

        // 2. Check ./windfetch.toml
        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!(sources = config.sources.len(), "Loaded config from ./windfetch.toml");
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./windfetch.toml, using defaults");
                }
            }
        }

        // 3. Defaults
        info!("No windfetch.toml found, using built-in station table");
        Self::default()
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let (config, _warnings) = Self::load_from_file_with_warnings(path)?;
        Ok(config)
    }

    /// Load from a specific TOML file path, also returning the unknown-key
    /// warnings so callers can surface them.
    pub fn load_from_file_with_warnings(
        path: &Path,
    ) -> Result<(Self, Vec<super::validation::ValidationWarning>), ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;

        // Two-pass: check for unknown keys first (warnings only)
        let typo_warnings = super::validation::validate_unknown_keys(&contents);
        for w in &typo_warnings {
            warn!("{}", w);
        }

        let config: Self = toml::from_str(&contents)
            .map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
        config.validate()?;

        let budget_warnings = super::validation::validate_retry_budget(&config);
        for w in &budget_warnings {
            warn!("{}", w);
        }

        let mut warnings = typo_warnings;
        warnings.extend(budget_warnings);
        Ok((config, warnings))
    }

    /// Serialize the current config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Build the effective source table: built-ins (if enabled) with file
    /// sources layered on top by id, compared case-insensitively like `get`.
    pub fn registry(&self) -> SourceRegistry {
        let mut sources = if self.include_builtin {
            builtin_sources()
        } else {
            Vec::new()
        };
        for source in &self.sources {
            match sources.iter_mut().find(|s| s.id.eq_ignore_ascii_case(&source.id)) {
                Some(existing) => *existing = source.clone(),
                None => sources.push(source.clone()),
            }
        }
        SourceRegistry { sources }
    }

    /// Validate the config and the effective source table.
    ///
    /// Rules:
    /// - Source ids are non-empty and unique within the file, ignoring case
    /// - URLs are absolute http(s) URLs
    /// - Retry policies stay inside the hard attempt/delay ceilings
    /// - Hex sample caps are within `1..=MAX_SAMPLE_CAP`
    /// - The cycle timeout is at least one request timeout
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        if self.http.timeout_secs == 0 {
            errors.push("http.timeout_secs must be > 0".to_string());
        }
        if self.http.cycle_timeout_secs < self.http.timeout_secs {
            errors.push(format!(
                "http.cycle_timeout_secs ({}) must be >= http.timeout_secs ({})",
                self.http.cycle_timeout_secs, self.http.timeout_secs
            ));
        }

        let mut seen = HashSet::new();
        for source in &self.sources {
            if !seen.insert(source.id.to_ascii_lowercase()) {
                errors.push(format!("duplicate source id '{}'", source.id));
            }
        }

        let registry = self.registry();
        if registry.is_empty() {
            errors.push("no sources configured (include_builtin = false and no [[sources]])".to_string());
        }
        for source in registry.iter() {
            source.collect_errors(&mut errors);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

// ============================================================================
// HTTP Config
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Per-request timeout (seconds)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Upper bound on one fetch cycle including backoff (seconds)
    #[serde(default = "default_cycle_timeout_secs")]
    pub cycle_timeout_secs: u64,

    /// User agent for sources that do not set one in their headers
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_timeout_secs() -> u64 {
    HTTP_TIMEOUT_SECS
}
fn default_cycle_timeout_secs() -> u64 {
    CYCLE_TIMEOUT_SECS
}
fn default_user_agent() -> String {
    USER_AGENT.to_string()
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            cycle_timeout_secs: default_cycle_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

// ============================================================================
// Source Config
// ============================================================================

/// One upstream station: where to fetch, how to decode, how hard to retry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceConfig {
    pub id: String,

    /// Human-readable station name
    #[serde(default)]
    pub name: String,

    pub primary: EndpointConfig,

    /// Tried once the primary's attempts are exhausted
    #[serde(default)]
    pub fallback: Option<EndpointConfig>,

    #[serde(default)]
    pub retry: BackoffPolicy,

    /// Native speed unit; endpoints may override
    #[serde(default)]
    pub speed_unit: SpeedUnit,

    #[serde(default)]
    pub temperature_unit: TemperatureUnit,

    #[serde(default)]
    pub pressure_unit: PressureUnit,
}

impl SourceConfig {
    /// Speed unit that applies to values decoded from `endpoint`.
    pub fn speed_unit_for(&self, endpoint: &EndpointConfig) -> SpeedUnit {
        endpoint.speed_unit.unwrap_or(self.speed_unit)
    }

    fn collect_errors(&self, errors: &mut Vec<String>) {
        if self.id.trim().is_empty() {
            errors.push("source id must not be empty".to_string());
        }
        let p = &self.retry;
        if p.max_attempts == 0 || p.max_attempts > MAX_ATTEMPTS_CEILING {
            errors.push(format!(
                "{}: retry.max_attempts = {} must be within 1..={}",
                self.id, p.max_attempts, MAX_ATTEMPTS_CEILING
            ));
        }
        if p.base_delay_ms > MAX_DELAY_MS {
            errors.push(format!(
                "{}: retry.base_delay_ms = {} exceeds {} ms",
                self.id, p.base_delay_ms, MAX_DELAY_MS
            ));
        }
        if !p.multiplier.is_finite() || p.multiplier < 1.0 {
            errors.push(format!(
                "{}: retry.multiplier = {} must be finite and >= 1.0",
                self.id, p.multiplier
            ));
        }
        self.primary.collect_errors(&format!("{}.primary", self.id), errors);
        if let Some(fallback) = &self.fallback {
            fallback.collect_errors(&format!("{}.fallback", self.id), errors);
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
}

/// A single request recipe plus the parser its response is fed to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EndpointConfig {
    #[serde(default)]
    pub method: HttpMethod,

    /// Request URL; `{from}` / `{to}` are replaced with Unix seconds of the
    /// history window
    pub url: String,

    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Page fetched first to establish a cookie session
    #[serde(default)]
    pub session_url: Option<String>,

    pub parser: ParserKind,

    /// Overrides the source speed unit for this endpoint
    #[serde(default)]
    pub speed_unit: Option<SpeedUnit>,

    /// Bodies equal to one of these strings are upstream errors
    #[serde(default = "default_error_sentinels")]
    pub error_sentinels: Vec<String>,

    /// Bodies shorter than this are upstream errors
    #[serde(default = "default_min_body_len")]
    pub min_body_len: usize,

    /// Look-back for `{from}` / `{to}` placeholders (seconds)
    #[serde(default)]
    pub history_window_secs: Option<u64>,
}

fn default_error_sentinels() -> Vec<String> {
    DEFAULT_ERROR_SENTINELS.iter().map(|s| s.to_string()).collect()
}
fn default_min_body_len() -> usize {
    DEFAULT_MIN_BODY_LEN
}

impl EndpointConfig {
    fn new(method: HttpMethod, url: &str, parser: ParserKind) -> Self {
        Self {
            method,
            url: url.to_string(),
            headers: BTreeMap::new(),
            session_url: None,
            parser,
            speed_unit: None,
            error_sentinels: default_error_sentinels(),
            min_body_len: default_min_body_len(),
            history_window_secs: None,
        }
    }

    fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_string(), value.to_string());
        self
    }

    /// Substitute `{from}` / `{to}` with the history window ending at `now_unix`.
    pub fn resolve_url(&self, now_unix: i64) -> String {
        if !self.url.contains("{from}") && !self.url.contains("{to}") {
            return self.url.clone();
        }
        let window = self.history_window_secs.unwrap_or(DEFAULT_HISTORY_WINDOW_SECS) as i64;
        self.url
            .replace("{from}", &(now_unix - window).to_string())
            .replace("{to}", &now_unix.to_string())
    }

    fn collect_errors(&self, at: &str, errors: &mut Vec<String>) {
        if !(self.url.starts_with("http://") || self.url.starts_with("https://")) {
            errors.push(format!("{at}.url = '{}' must be an absolute http(s) URL", self.url));
        }
        if let Some(session) = &self.session_url {
            if !(session.starts_with("http://") || session.starts_with("https://")) {
                errors.push(format!("{at}.session_url = '{session}' must be an absolute http(s) URL"));
            }
        }
        if self.min_body_len >= MAX_BODY_BYTES {
            errors.push(format!(
                "{at}.min_body_len = {} rejects every body (limit {} bytes)",
                self.min_body_len, MAX_BODY_BYTES
            ));
        }
        match &self.parser {
            ParserKind::HtmlTable(p) => {
                if p.speed_label.trim().is_empty() && p.direction_label.trim().is_empty() {
                    errors.push(format!("{at}.parser needs a speed_label or direction_label"));
                }
            }
            ParserKind::JsonPath(p) => {
                if p.speed.is_empty() && p.direction.is_empty() {
                    errors.push(format!("{at}.parser needs speed or direction predicates"));
                }
            }
            ParserKind::HexTelemetry(p) => {
                if p.sample_cap == 0 || p.sample_cap > MAX_SAMPLE_CAP {
                    errors.push(format!(
                        "{at}.parser.sample_cap = {} must be within 1..={}",
                        p.sample_cap, MAX_SAMPLE_CAP
                    ));
                }
            }
        }
    }
}

// ============================================================================
// Parser Profiles
// ============================================================================

/// Wire format of an endpoint and the source-specific knobs for decoding it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ParserKind {
    HtmlTable(HtmlTableProfile),
    JsonPath(JsonPathProfile),
    HexTelemetry(HexProfile),
}

impl ParserKind {
    pub fn tag(&self) -> ParserTag {
        match self {
            ParserKind::HtmlTable(_) => ParserTag::HtmlTable,
            ParserKind::JsonPath(_) => ParserTag::JsonPath,
            ParserKind::HexTelemetry(_) => ParserTag::HexTelemetry,
        }
    }
}

/// Label text of the table cells holding each quantity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HtmlTableProfile {
    #[serde(default)]
    pub speed_label: String,
    #[serde(default)]
    pub gust_label: Option<String>,
    #[serde(default)]
    pub direction_label: String,
    #[serde(default)]
    pub temperature_label: Option<String>,
    #[serde(default)]
    pub pressure_label: Option<String>,
    #[serde(default)]
    pub timestamp_label: Option<String>,
}

/// Case-insensitive predicate on an entry's field name.
///
/// Matches when `exact` (if set) equals the name, every `all` substring
/// occurs in it and no `none` substring does.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct FieldMatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exact: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub all: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub none: Vec<String>,
}

impl FieldMatch {
    pub fn exact(name: &str) -> Self {
        Self {
            exact: Some(name.to_string()),
            ..Default::default()
        }
    }

    pub fn containing(terms: &[&str]) -> Self {
        Self {
            all: terms.iter().map(|t| t.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn excluding(mut self, terms: &[&str]) -> Self {
        self.none = terms.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn matches(&self, name: &str) -> bool {
        let lower = name.trim().to_lowercase();
        if let Some(exact) = &self.exact {
            if !lower.eq_ignore_ascii_case(exact.trim()) {
                return false;
            }
        }
        self.all.iter().all(|t| lower.contains(&t.to_lowercase()))
            && !self.none.iter().any(|t| lower.contains(&t.to_lowercase()))
    }
}

/// Where the entries live inside a JSON document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum JsonLayout {
    /// Arrays of `{name, value, unit}` objects (WeatherLink style)
    SensorArray {
        current: String,
        #[serde(default)]
        extremes: Option<String>,
        name_key: String,
        value_key: String,
        #[serde(default)]
        unit_key: Option<String>,
        /// Root-level key holding the observation time
        #[serde(default)]
        timestamp_key: Option<String>,
    },
    /// `{status, data: {key: value, ...}}` (WeatherFile style)
    StatusEnvelope {
        status_key: String,
        ok_value: String,
        data_key: String,
    },
}

/// Prioritised name predicates per quantity; earlier entries win.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonPathProfile {
    pub layout: JsonLayout,
    #[serde(default)]
    pub speed: Vec<FieldMatch>,
    #[serde(default)]
    pub gust: Vec<FieldMatch>,
    /// Matched against the extremes collection only
    #[serde(default)]
    pub extremes_gust: Vec<FieldMatch>,
    #[serde(default)]
    pub direction: Vec<FieldMatch>,
    #[serde(default)]
    pub temperature: Vec<FieldMatch>,
    #[serde(default)]
    pub pressure: Vec<FieldMatch>,
    #[serde(default)]
    pub timestamp: Vec<FieldMatch>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum HexMode {
    /// One `timestamp:status:payload` record
    #[default]
    Live,
    /// A batch of records aggregated into mean/peak
    History,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HexProfile {
    #[serde(default)]
    pub mode: HexMode,
    #[serde(default = "default_sample_cap")]
    pub sample_cap: usize,
}

fn default_sample_cap() -> usize {
    DEFAULT_SAMPLE_CAP
}

impl Default for HexProfile {
    fn default() -> Self {
        Self {
            mode: HexMode::Live,
            sample_cap: default_sample_cap(),
        }
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Immutable lookup table of sources by id.
#[derive(Debug, Clone)]
pub struct SourceRegistry {
    sources: Vec<SourceConfig>,
}

impl SourceRegistry {
    pub fn builtin() -> Self {
        Self {
            sources: builtin_sources(),
        }
    }

    pub fn from_sources(sources: Vec<SourceConfig>) -> Self {
        Self { sources }
    }

    pub fn get(&self, id: &str) -> Option<&SourceConfig> {
        self.sources.iter().find(|s| s.id.eq_ignore_ascii_case(id))
    }

    pub fn ids(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.id.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SourceConfig> {
        self.sources.iter()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

// ============================================================================
// Built-in Stations
// ============================================================================

const BROWSER_UA: &str = "Mozilla/5.0 (compatible; WeatherStation/1.0)";
const NAVIS_VIEW_URL: &str = "https://www.navis-livedata.com/view.php?u=36371";
const NAVIS_QUERY_URL: &str = "https://www.navis-livedata.com/query.php?imei=083af23b9b89_15_1";

fn navis_endpoint(type_query: &str, mode: HexMode) -> EndpointConfig {
    let mut endpoint = EndpointConfig::new(
        HttpMethod::Get,
        &format!("{NAVIS_QUERY_URL}&{type_query}"),
        ParserKind::HexTelemetry(HexProfile {
            mode,
            sample_cap: DEFAULT_SAMPLE_CAP,
        }),
    )
    .header("User-Agent", BROWSER_UA)
    .header("Accept", "*/*")
    .header("Referer", NAVIS_VIEW_URL);
    endpoint.session_url = Some(NAVIS_VIEW_URL.to_string());
    // Navis reports tenths of m/s
    endpoint.speed_unit = Some(SpeedUnit::MetersPerSecond);
    endpoint
}

fn weatherlink_profile() -> JsonPathProfile {
    JsonPathProfile {
        layout: JsonLayout::SensorArray {
            current: "currConditionValues".to_string(),
            extremes: Some("highLowValues".to_string()),
            name_key: "sensorDataName".to_string(),
            value_key: "convertedValue".to_string(),
            unit_key: Some("unitLabel".to_string()),
            timestamp_key: Some("lastReceived".to_string()),
        },
        speed: vec![
            FieldMatch::containing(&["2 min", "wind speed"]).excluding(&["high"]),
            FieldMatch::containing(&["10 min", "wind speed"]).excluding(&["high"]),
            FieldMatch::exact("Wind Speed"),
        ],
        gust: vec![
            FieldMatch::containing(&["high", "wind speed"]),
            FieldMatch::containing(&["gust"]),
        ],
        extremes_gust: vec![
            FieldMatch::containing(&["high", "wind speed"]),
            FieldMatch::containing(&["gust"]),
        ],
        direction: vec![
            FieldMatch::containing(&["2 min", "wind direction"]),
            FieldMatch::containing(&["10 min", "wind direction"]),
            FieldMatch::exact("Wind Direction"),
        ],
        temperature: vec![
            FieldMatch::exact("Temp"),
            FieldMatch::containing(&["temp"]).excluding(&["high", "low", "chill", "heat", "dew", "inside"]),
        ],
        pressure: vec![
            FieldMatch::containing(&["barometer"]),
            FieldMatch::containing(&["pressure"]),
        ],
        timestamp: Vec::new(),
    }
}

fn weatherfile_profile() -> JsonPathProfile {
    JsonPathProfile {
        layout: JsonLayout::StatusEnvelope {
            status_key: "status".to_string(),
            ok_value: "ok".to_string(),
            data_key: "data".to_string(),
        },
        speed: vec![FieldMatch::exact("wsa"), FieldMatch::exact("wsc")],
        gust: vec![FieldMatch::exact("wsh"), FieldMatch::containing(&["gust"])],
        extremes_gust: Vec::new(),
        direction: vec![FieldMatch::exact("wda"), FieldMatch::exact("wdc")],
        temperature: vec![FieldMatch::exact("tmp"), FieldMatch::containing(&["temp"])],
        pressure: vec![FieldMatch::exact("prs"), FieldMatch::containing(&["pres"])],
        timestamp: vec![FieldMatch::exact("lastact"), FieldMatch::exact("ts")],
    }
}

/// The stations windfetch knows about out of the box.
pub fn builtin_sources() -> Vec<SourceConfig> {
    let brambles = SourceConfig {
        id: "brambles".to_string(),
        name: "Bramble Bank (Southampton VTS)".to_string(),
        primary: EndpointConfig::new(
            HttpMethod::Get,
            "https://www.southamptonvts.co.uk/BackgroundSite/Ajax/LoadXmlFileWithTransform?xmlFilePath=D%3A%5Cftp%5Csouthampton%5CBramble.xml&xslFilePath=D%3A%5Cwwwroot%5CCMS_Southampton%5Ccontent%5Cfiles%5Cassets%5CSotonSnapshotmetBramble.xsl&w=51",
            ParserKind::HtmlTable(HtmlTableProfile {
                speed_label: "Wind Speed".to_string(),
                gust_label: Some("Max Gust".to_string()),
                direction_label: "Wind Direction".to_string(),
                temperature_label: Some("Air Temp".to_string()),
                pressure_label: Some("Pressure".to_string()),
                timestamp_label: Some("Updated".to_string()),
            }),
        )
        .header("User-Agent", BROWSER_UA)
        .header("Accept", "text/html,*/*")
        .header("Referer", "https://www.southamptonvts.co.uk/Live_Information/Tides_and_Weather/"),
        fallback: None,
        retry: BackoffPolicy::default(),
        speed_unit: SpeedUnit::Knots,
        temperature_unit: TemperatureUnit::Celsius,
        pressure_unit: PressureUnit::Hectopascal,
    };

    let seaview = SourceConfig {
        id: "seaview".to_string(),
        name: "Seaview (WeatherLink, Navis fallback)".to_string(),
        primary: EndpointConfig::new(
            HttpMethod::Get,
            "https://www.weatherlink.com/embeddablePage/summaryData/0d117f9a7c7e425a8cc88e870f0e76fb",
            ParserKind::JsonPath(weatherlink_profile()),
        )
        .header("User-Agent", BROWSER_UA)
        .header("Accept", "application/json,*/*")
        .header("X-Requested-With", "XMLHttpRequest")
        .header(
            "Referer",
            "https://www.weatherlink.com/embeddablePage/show/0d117f9a7c7e425a8cc88e870f0e76fb/summary",
        ),
        fallback: Some(navis_endpoint("type=live", HexMode::Live)),
        retry: BackoffPolicy::default(),
        speed_unit: SpeedUnit::Knots,
        temperature_unit: TemperatureUnit::Celsius,
        pressure_unit: PressureUnit::Hectopascal,
    };

    let lymington = SourceConfig {
        id: "lymington".to_string(),
        name: "Lymington (WeatherFile)".to_string(),
        primary: EndpointConfig::new(
            HttpMethod::Post,
            "https://weatherfile.com/V03/loc/GBR00001/latest.json",
            ParserKind::JsonPath(weatherfile_profile()),
        )
        .header("User-Agent", BROWSER_UA)
        .header("Accept", "*/*")
        .header("X-Requested-With", "XMLHttpRequest")
        .header("Referer", "https://weatherfile.com/location?loc_id=GBR00001&wt=KTS")
        .header("Origin", "https://weatherfile.com")
        .header("wf-tkn", "PUBLIC"),
        fallback: None,
        retry: BackoffPolicy::default(),
        speed_unit: SpeedUnit::Knots,
        temperature_unit: TemperatureUnit::Celsius,
        pressure_unit: PressureUnit::Hectopascal,
    };

    let navis_live = SourceConfig {
        id: "seaview-navis".to_string(),
        name: "Seaview (Navis live)".to_string(),
        primary: navis_endpoint("type=live", HexMode::Live),
        fallback: None,
        retry: BackoffPolicy::default(),
        speed_unit: SpeedUnit::MetersPerSecond,
        temperature_unit: TemperatureUnit::Celsius,
        pressure_unit: PressureUnit::Hectopascal,
    };

    let mut history_endpoint = navis_endpoint("type=data&from={from}&to={to}", HexMode::History);
    history_endpoint.history_window_secs = Some(DEFAULT_HISTORY_WINDOW_SECS);
    let navis_history = SourceConfig {
        id: "seaview-history".to_string(),
        name: "Seaview (Navis last hour)".to_string(),
        primary: history_endpoint,
        fallback: None,
        retry: BackoffPolicy::default(),
        speed_unit: SpeedUnit::MetersPerSecond,
        temperature_unit: TemperatureUnit::Celsius,
        pressure_unit: PressureUnit::Hectopascal,
    };

    vec![brambles, seaview, lymington, navis_live, navis_history]
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, std::io::Error),
    Parse(PathBuf, toml::de::Error),
    Serialize(toml::ser::Error),
    Validation(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(path, e) => write!(f, "Config I/O error ({}): {}", path.display(), e),
            ConfigError::Parse(path, e) => {
                write!(f, "Config parse error ({}): {}", path.display(), e)
            }
            ConfigError::Serialize(e) => write!(f, "Config serialization error: {}", e),
            ConfigError::Validation(errors) => {
                writeln!(f, "Config validation failed:")?;
                for e in errors {
                    writeln!(f, "  - {}", e)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Tests
// ============================================================================
