//! windfetch: marine weather telemetry ingestion
//!
//! Fetches wind observations from heterogeneous upstream stations and turns
//! them into one canonical record per fetch cycle.
//!
//! ## Architecture
//!
//! - **Source Registry** (`config`): per-station endpoints, parser profiles and retry policy
//! - **Extractors** (`acquisition`): HTML table, JSON path and hex telemetry decoders
//! - **Normalizer** (`processing`): units to m/s, °C, hPa and canonical timestamps
//! - **Orchestrator** (`pipeline`): transport, retry/backoff, fallback

pub mod acquisition;
pub mod config;
pub mod pipeline;
pub mod processing;
pub mod types;

// Re-export configuration
pub use config::{SourceConfig, SourceRegistry, WindfetchConfig};

// Re-export commonly used types
pub use types::{EndpointRole, FetchState, ParserTag, Provenance, SpeedUnit, WeatherReading};

// Re-export pipeline entry points
pub use pipeline::{FetchError, FetchOrchestrator, ReadingCache, Transport};
