//! Fetch Orchestrator
//!
//! One fetch cycle per call: request, screen, extract, normalize, with
//! bounded retries on the primary endpoint and a single switch to the
//! fallback endpoint once those are exhausted.
//!
//! ```text
//! Attempting ──► Success
//!     │
//!     ▼
//! Retrying ──► Exhausted ──► Fallback ──► Success | Failed
//! ```

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::transport::{HttpRequest, HttpTransport, Transport, TransportError};
use super::BackoffPolicy;
use crate::acquisition::{build_extractor, ExtractError, Extractor, RawObservation};
use crate::config::{EndpointConfig, HttpConfig, SourceConfig, SourceRegistry};
use crate::processing::{normalize, SourceUnits};
use crate::types::{EndpointRole, FetchState, Provenance, WeatherReading};

/// Fetch cycle errors
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Transport failure: {0}")]
    Transport(TransportError),

    /// 200 response whose content says there is no data
    #[error("Upstream reported no usable data: {0}")]
    UpstreamSemantic(String),

    #[error("Upstream returned HTTP {status}")]
    HttpStatus { status: u16 },

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("{source_id}: all {attempts} attempts failed (last error: {last})")]
    ExhaustedRetries {
        source_id: String,
        attempts: u32,
        last: Box<FetchError>,
    },

    #[error("Fetch cancelled")]
    Cancelled,

    #[error("Unknown source '{0}'")]
    UnknownSource(String),
}

impl FetchError {
    /// Whether another attempt on the same endpoint could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Transport(e) => e.is_retryable(),
            FetchError::UpstreamSemantic(_) | FetchError::MalformedPayload(_) => true,
            FetchError::HttpStatus { status } => is_retryable_status(*status),
            FetchError::ExhaustedRetries { .. }
            | FetchError::Cancelled
            | FetchError::UnknownSource(_) => false,
        }
    }
}

impl From<TransportError> for FetchError {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::Cancelled => FetchError::Cancelled,
            other => FetchError::Transport(other),
        }
    }
}

impl From<ExtractError> for FetchError {
    fn from(e: ExtractError) -> Self {
        match e {
            ExtractError::Upstream(msg) => FetchError::UpstreamSemantic(msg),
            other => FetchError::MalformedPayload(other.to_string()),
        }
    }
}

/// 408, 429 and 5xx may clear up; other statuses will not.
pub fn is_retryable_status(status: u16) -> bool {
    matches!(status, 408 | 429) || (500..600).contains(&status)
}

/// Reject bodies that are an error sentinel or too short to hold data.
pub fn screen_body(body: &str, endpoint: &EndpointConfig) -> Result<(), FetchError> {
    let trimmed = body.trim();
    if endpoint.error_sentinels.iter().any(|s| trimmed == s.trim()) {
        return Err(FetchError::UpstreamSemantic(format!("error sentinel body '{trimmed}'")));
    }
    if trimmed.len() < endpoint.min_body_len {
        return Err(FetchError::UpstreamSemantic(format!(
            "body of {} bytes is shorter than {}",
            trimmed.len(),
            endpoint.min_body_len
        )));
    }
    Ok(())
}

/// States and attempt count of one cycle.
struct CycleTrail<'a> {
    source_id: &'a str,
    states: Vec<FetchState>,
    attempts: u32,
}

impl<'a> CycleTrail<'a> {
    fn new(source_id: &'a str) -> Self {
        debug!(source = %source_id, state = ?FetchState::Attempting, "[Orchestrator] State");
        Self {
            source_id,
            states: vec![FetchState::Attempting],
            attempts: 0,
        }
    }

    fn enter(&mut self, state: FetchState) {
        debug!(source = %self.source_id, state = ?state, "[Orchestrator] State");
        self.states.push(state);
    }
}

/// Drives fetch cycles for any registered source.
pub struct FetchOrchestrator {
    transport: Arc<dyn Transport>,
    cycle_timeout: Option<Duration>,
}

impl FetchOrchestrator {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            cycle_timeout: None,
        }
    }

    /// Orchestrator over a reqwest transport configured from `config`.
    pub fn from_config(config: &HttpConfig) -> Result<Self, TransportError> {
        let transport = HttpTransport::new(config)?;
        Ok(Self::new(Arc::new(transport))
            .with_cycle_timeout(Duration::from_secs(config.cycle_timeout_secs)))
    }

    /// Bound a whole cycle, primary and fallback included.
    pub fn with_cycle_timeout(mut self, timeout: Duration) -> Self {
        self.cycle_timeout = Some(timeout);
        self
    }

    /// Look up `id` in `registry` and fetch it.
    pub async fn fetch_id(
        &self,
        registry: &SourceRegistry,
        id: &str,
        cancel: &CancellationToken,
    ) -> Result<WeatherReading, FetchError> {
        let source = registry
            .get(id)
            .ok_or_else(|| FetchError::UnknownSource(id.to_string()))?;
        self.fetch(source, cancel).await
    }

    /// Fetch several sources concurrently. Results keep the input order.
    pub async fn fetch_all<'s>(
        &self,
        sources: impl IntoIterator<Item = &'s SourceConfig>,
        cancel: &CancellationToken,
    ) -> Vec<(String, Result<WeatherReading, FetchError>)> {
        let cycles = sources.into_iter().map(|source| async move {
            (source.id.clone(), self.fetch(source, cancel).await)
        });
        join_all(cycles).await
    }

    /// Run one fetch cycle for `source`.
    pub async fn fetch(
        &self,
        source: &SourceConfig,
        cancel: &CancellationToken,
    ) -> Result<WeatherReading, FetchError> {
        let started = Instant::now();
        let deadline = self.cycle_timeout.map(|t| started + t);
        let policy = source.retry.bounded();
        let mut trail = CycleTrail::new(&source.id);

        info!(source = %source.id, max_attempts = policy.max_attempts, "[Orchestrator] Fetch cycle started");

        let primary = self
            .run_endpoint(source, &source.primary, EndpointRole::Primary, &policy, &mut trail, started, deadline, cancel)
            .await;
        let mut last = match primary {
            Ok(reading) => return Ok(reading),
            Err(FetchError::Cancelled) => return Err(FetchError::Cancelled),
            Err(e) => e,
        };
        trail.enter(FetchState::Exhausted);

        if let Some(fallback) = &source.fallback {
            warn!(
                source = %source.id,
                attempts = trail.attempts,
                error = %last,
                "[Orchestrator] Primary exhausted, switching to fallback"
            );
            trail.enter(FetchState::Fallback);
            match self
                .run_endpoint(source, fallback, EndpointRole::Fallback, &policy, &mut trail, started, deadline, cancel)
                .await
            {
                Ok(reading) => return Ok(reading),
                Err(FetchError::Cancelled) => return Err(FetchError::Cancelled),
                Err(e) => last = e,
            }
        }

        trail.enter(FetchState::Failed);
        warn!(
            source = %source.id,
            attempts = trail.attempts,
            elapsed_ms = started.elapsed().as_millis() as u64,
            error = %last,
            "[Orchestrator] Fetch cycle failed"
        );
        Err(FetchError::ExhaustedRetries {
            source_id: source.id.clone(),
            attempts: trail.attempts,
            last: Box::new(last),
        })
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_endpoint(
        &self,
        source: &SourceConfig,
        endpoint: &EndpointConfig,
        role: EndpointRole,
        policy: &BackoffPolicy,
        trail: &mut CycleTrail<'_>,
        started: Instant,
        deadline: Option<Instant>,
        cancel: &CancellationToken,
    ) -> Result<WeatherReading, FetchError> {
        let extractor = build_extractor(&endpoint.parser)?;
        let units = SourceUnits {
            speed: source.speed_unit_for(endpoint),
            temperature: source.temperature_unit,
            pressure: source.pressure_unit,
        };

        let mut last_err = None;
        for attempt in 1..=policy.max_attempts {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                warn!(source = %source.id, endpoint = %role, "[Orchestrator] Cycle deadline reached");
                break;
            }
            trail.attempts += 1;
            let now = Utc::now();
            let request = HttpRequest::from_endpoint(endpoint, now.timestamp());
            debug!(source = %source.id, endpoint = %role, attempt, url = %request.url, "[Orchestrator] Attempt");

            let outcome = match deadline {
                Some(d) => match tokio::time::timeout_at(d, self.attempt(&request, endpoint, extractor.as_ref(), cancel)).await {
                    Ok(r) => r,
                    Err(_) => Err(FetchError::Transport(TransportError::Timeout(d - started))),
                },
                None => self.attempt(&request, endpoint, extractor.as_ref(), cancel).await,
            };

            match outcome {
                Ok(raw) => {
                    trail.enter(FetchState::Success);
                    let provenance = Provenance {
                        source_id: source.id.clone(),
                        endpoint: role,
                        url: request.url.clone(),
                        parser: extractor.tag(),
                        attempts: trail.attempts,
                        states: trail.states.clone(),
                    };
                    let duration_ms = started.elapsed().as_millis() as u64;
                    let reading = normalize(raw, units, provenance, duration_ms, now);
                    info!(
                        source = %source.id,
                        endpoint = %role,
                        attempts = trail.attempts,
                        duration_ms,
                        wind_speed = ?reading.wind_speed,
                        wind_direction = ?reading.wind_direction,
                        "[Orchestrator] Fetch cycle succeeded"
                    );
                    return Ok(reading);
                }
                Err(FetchError::Cancelled) => {
                    info!(source = %source.id, "[Orchestrator] Cancelled");
                    return Err(FetchError::Cancelled);
                }
                Err(e) => {
                    warn!(
                        source = %source.id,
                        endpoint = %role,
                        attempt,
                        max_attempts = policy.max_attempts,
                        error = %e,
                        "[Orchestrator] Attempt failed"
                    );
                    let retryable = e.is_retryable();
                    last_err = Some(e);
                    if !retryable {
                        break;
                    }
                    if attempt < policy.max_attempts {
                        let delay = policy.delay_for(attempt);
                        if deadline.is_some_and(|d| Instant::now() + delay >= d) {
                            warn!(source = %source.id, delay_ms = delay.as_millis() as u64, "[Orchestrator] Backoff would pass cycle deadline");
                            break;
                        }
                        trail.enter(FetchState::Retrying);
                        info!(
                            source = %source.id,
                            endpoint = %role,
                            delay_ms = delay.as_millis() as u64,
                            "[Orchestrator] Backing off before retry"
                        );
                        tokio::select! {
                            biased;
                            _ = cancel.cancelled() => {
                                info!(source = %source.id, "[Orchestrator] Cancelled during backoff");
                                return Err(FetchError::Cancelled);
                            }
                            _ = tokio::time::sleep(delay) => {}
                        }
                    }
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            FetchError::Transport(TransportError::Timeout(started.elapsed()))
        }))
    }

    /// One request → screen → extract pass.
    async fn attempt(
        &self,
        request: &HttpRequest,
        endpoint: &EndpointConfig,
        extractor: &dyn Extractor,
        cancel: &CancellationToken,
    ) -> Result<RawObservation, FetchError> {
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }
        let response = self.transport.send(request, cancel).await?;
        if !response.is_success() {
            return Err(FetchError::HttpStatus {
                status: response.status,
            });
        }
        screen_body(&response.body, endpoint)?;
        let raw = extractor.extract(&response.body)?;
        if !raw.has_wind() {
            return Err(FetchError::UpstreamSemantic(
                "neither wind speed nor direction resolved".to_string(),
            ));
        }
        if !raw.skipped.is_empty() {
            debug!(skipped = ?raw.skipped, "[Orchestrator] Fields skipped");
        }
        Ok(raw)
    }
}
