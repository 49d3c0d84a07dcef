//! System-wide default constants.
//!
//! Centralises the bounds and tuning numbers used by the fetch pipeline.
//! Grouped by subsystem for easy discovery.

// ============================================================================
// HTTP Transport
// ============================================================================

/// Per-request HTTP timeout (seconds).
pub const HTTP_TIMEOUT_SECS: u64 = 10;

/// Maximum redirects followed per request.
pub const MAX_REDIRECTS: usize = 3;

/// User agent sent when a source does not set its own.
pub const USER_AGENT: &str = "windfetch/0.1 (marine weather telemetry)";

/// Upper bound on a whole fetch cycle, primary and fallback included (seconds).
pub const CYCLE_TIMEOUT_SECS: u64 = 90;

// ============================================================================
// Retry / Backoff
// ============================================================================

/// Attempts per endpoint when a source does not configure its own.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// First backoff delay (ms).
pub const DEFAULT_BASE_DELAY_MS: u64 = 2_000;

/// Growth factor applied to the delay after every failed attempt.
///
/// 2 s, 3 s, 4.5 s, ...
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 1.5;

/// Hard ceiling on attempts per endpoint, whatever the config says.
pub const MAX_ATTEMPTS_CEILING: u32 = 8;

/// Hard ceiling on a single backoff delay (ms).
pub const MAX_DELAY_MS: u64 = 30_000;

// ============================================================================
// Payload Screening
// ============================================================================

/// Bodies shorter than this (after trimming) are treated as upstream errors.
pub const DEFAULT_MIN_BODY_LEN: usize = 8;

/// Bodies that consist of exactly one of these strings are upstream errors.
pub const DEFAULT_ERROR_SENTINELS: &[&str] = &["error", "ERROR", "no data"];

/// Maximum body size accepted from an upstream (bytes). 8 KiB was the
/// firmware's parse buffer; desktop hosts get more headroom for history batches.
pub const MAX_BODY_BYTES: usize = 512 * 1024;

// ============================================================================
// Hex Telemetry
// ============================================================================

/// Sliding-window capacity for historical hex batches (samples).
///
/// 360 samples = one hour at the 10 s logger interval.
pub const DEFAULT_SAMPLE_CAP: usize = 360;

/// Largest sample cap a config may request.
pub const MAX_SAMPLE_CAP: usize = 8_640;

/// Default look-back window for historical queries (seconds).
pub const DEFAULT_HISTORY_WINDOW_SECS: u64 = 3_600;
