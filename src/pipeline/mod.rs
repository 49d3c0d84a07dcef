//! Fetch Pipeline Module
//!
//! ```text
//! SourceConfig ─► Transport ─► screen ─► Extractor ─► Normalizer ─► WeatherReading
//!                    ▲                                    │
//!                    └──── BackoffPolicy (retry/fallback) ┘
//! ```
//!
//! The orchestrator is source-agnostic: everything station-specific lives in
//! the registry entry it is handed.

mod backoff;
pub mod cache;
pub mod orchestrator;
pub mod transport;

pub use backoff::BackoffPolicy;
pub use cache::{CachedReading, ReadingCache};
pub use orchestrator::{FetchError, FetchOrchestrator};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, Transport, TransportError};
