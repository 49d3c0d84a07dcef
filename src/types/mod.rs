//! Shared data structures for the fetch pipeline
//!
//! - `WeatherReading`: the canonical per-cycle output, with its `Provenance`
//! - `FetchState`: orchestrator state trail
//! - Unit tags used by source configs and extractor hints

mod reading;
mod units;

pub use reading::*;
pub use units::*;
