//! Processing module - unit and timestamp normalization

pub mod normalizer;

pub use normalizer::{normalize, SourceUnits};
