//! Unit tags carried by source configs and extracted payloads

use serde::{Deserialize, Serialize};

/// Native speed unit of a source.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum SpeedUnit {
    #[default]
    Knots,
    #[serde(alias = "m/s", alias = "ms")]
    MetersPerSecond,
    #[serde(alias = "mph")]
    MilesPerHour,
    #[serde(alias = "km/h", alias = "kph")]
    KilometersPerHour,
}

impl SpeedUnit {
    /// Recognise the unit labels upstream payloads attach to values
    /// (`"kts"`, `"knots"`, `"m/s"`, `"mph"`, `"km/h"`).
    pub fn from_label(label: &str) -> Option<Self> {
        let l = label.trim().to_ascii_lowercase();
        match l.as_str() {
            "kt" | "kts" | "knot" | "knots" => Some(Self::Knots),
            "m/s" | "ms" | "mps" | "m s-1" => Some(Self::MetersPerSecond),
            "mph" => Some(Self::MilesPerHour),
            "km/h" | "kmh" | "kph" | "km/hr" => Some(Self::KilometersPerHour),
            _ => None,
        }
    }
}

/// Native temperature unit of a source.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum TemperatureUnit {
    #[default]
    Celsius,
    Fahrenheit,
}

impl TemperatureUnit {
    pub fn from_label(label: &str) -> Option<Self> {
        let l = label.trim().trim_start_matches('°').to_ascii_lowercase();
        match l.as_str() {
            "c" | "celsius" | "degc" => Some(Self::Celsius),
            "f" | "fahrenheit" | "degf" => Some(Self::Fahrenheit),
            _ => None,
        }
    }
}

/// Native pressure unit of a source.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum PressureUnit {
    #[default]
    #[serde(alias = "mb", alias = "mbar")]
    Hectopascal,
    InchesOfMercury,
}

impl PressureUnit {
    pub fn from_label(label: &str) -> Option<Self> {
        let l = label.trim().to_ascii_lowercase();
        match l.as_str() {
            "hpa" | "mb" | "mbar" | "millibars" => Some(Self::Hectopascal),
            "inhg" | "in" | "in hg" => Some(Self::InchesOfMercury),
            _ => None,
        }
    }
}
