//! # Application State Management
//!
//! Shared state that every HTTP handler can reach through `web::Data<AppState>`.
//!
//! ## What lives here:
//! - **config**: runtime configuration, replaceable through `PUT /api/v1/config`
//! - **metrics**: request counters written by middleware and the reversal handler
//! - **codec**: the codec collaborator, shared read-only by all requests
//!
//! ## Arc<RwLock<T>> Pattern
//! - **Arc**: every worker's clone of `AppState` points at the same data
//! - **RwLock**: many readers or one writer
//!
//! The reversal pipeline itself never touches this state: the handler copies
//! the limits out and hands them to a fresh `RequestProcessor`.

use crate::audio::{AudioCodec, RequestProcessor};
use crate::config::AppConfig;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

#[derive(Clone)]
pub struct AppState {
    /// Application configuration (can be updated at runtime)
    pub config: Arc<RwLock<AppConfig>>,

    /// Performance metrics (constantly being updated by requests)
    pub metrics: Arc<RwLock<AppMetrics>>,

    /// Codec collaborator used by every reversal
    pub codec: Arc<dyn AudioCodec>,

    /// `ffmpeg -version` banner captured at startup, `None` if ffmpeg is missing
    pub ffmpeg_version: Option<String>,

    /// When the server started
    pub start_time: Instant,
}

/// Performance metrics collected across all HTTP requests.
#[derive(Debug, Default, Clone)]
pub struct AppMetrics {
    /// Total number of HTTP requests processed since server start
    pub request_count: u64,

    /// Total number of 4xx/5xx responses since server start
    pub error_count: u64,

    /// Reversals currently running on the blocking pool
    pub active_reversals: u32,

    /// How finished reversals ended
    pub reversals: ReversalMetrics,

    /// Key: endpoint name (e.g., "POST /reverse-audio")
    pub endpoint_metrics: HashMap<String, EndpointMetric>,
}

/// Outcome counters for `/reverse-audio`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReversalMetrics {
    /// 200 responses
    pub succeeded: u64,
    /// 400 responses (caller input failed validation)
    pub rejected: u64,
    /// 500 responses (codec or runtime failure)
    pub failed: u64,
}

/// How a single reversal request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReversalOutcome {
    Succeeded,
    Rejected,
    Failed,
}

impl ReversalOutcome {
    pub fn from_status(code: u16) -> Self {
        match code {
            200..=299 => ReversalOutcome::Succeeded,
            400..=499 => ReversalOutcome::Rejected,
            _ => ReversalOutcome::Failed,
        }
    }
}

/// Detailed performance metrics for a specific API endpoint.
#[derive(Debug, Default, Clone)]
pub struct EndpointMetric {
    pub request_count: u64,

    /// Total time spent processing all requests to this endpoint (milliseconds)
    pub total_duration_ms: u64,

    pub error_count: u64,
}

impl AppState {
    pub fn new(config: AppConfig, codec: Arc<dyn AudioCodec>, ffmpeg_version: Option<String>) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
            metrics: Arc::new(RwLock::new(AppMetrics::default())),
            codec,
            ffmpeg_version,
            start_time: Instant::now(),
        }
    }

    /// Get a copy of the current configuration.
    ///
    /// Cloning releases the lock immediately, so other threads aren't blocked.
    /// A poisoned lock still holds a validated config, so it is read anyway.
    pub fn get_config(&self) -> AppConfig {
        self.config.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Apply a partial JSON update and return the resulting configuration.
    ///
    /// The write lock is held from read to write-back, so concurrent updates
    /// to different fields cannot overwrite each other. A rejected update
    /// leaves the configuration untouched.
    pub fn apply_config_update(&self, json_str: &str) -> anyhow::Result<AppConfig> {
        let mut config = self.config.write().unwrap_or_else(PoisonError::into_inner);
        config.update_from_json(json_str)?;
        Ok(config.clone())
    }

    /// A processor bound to the current limits and the shared codec.
    pub fn processor(&self) -> RequestProcessor {
        RequestProcessor::new(self.get_config().limits, self.codec.clone())
    }

    fn with_metrics(&self, update: impl FnOnce(&mut AppMetrics)) {
        let mut metrics = self.metrics.write().unwrap_or_else(PoisonError::into_inner);
        update(&mut metrics);
    }

    pub fn increment_request_count(&self) {
        self.with_metrics(|metrics| metrics.request_count += 1);
    }

    pub fn increment_error_count(&self) {
        self.with_metrics(|metrics| metrics.error_count += 1);
    }

    /// Record detailed metrics for a specific endpoint.
    ///
    /// The first time we see an endpoint, we create a new EndpointMetric with default values.
    pub fn record_endpoint_request(&self, endpoint: &str, duration_ms: u64, is_error: bool) {
        self.with_metrics(|metrics| {
            let endpoint_metric = metrics.endpoint_metrics.entry(endpoint.to_string()).or_default();
            endpoint_metric.request_count += 1;
            endpoint_metric.total_duration_ms += duration_ms;
            if is_error {
                endpoint_metric.error_count += 1;
            }
        });
    }

    /// Count a reversal as running until the returned guard is dropped.
    ///
    /// The guard also decrements when the request future is dropped mid-await,
    /// e.g. because the client went away.
    pub fn begin_reversal(&self) -> ActiveReversal {
        self.with_metrics(|metrics| metrics.active_reversals += 1);
        ActiveReversal {
            metrics: self.metrics.clone(),
        }
    }

    pub fn record_reversal(&self, outcome: ReversalOutcome) {
        self.with_metrics(|metrics| match outcome {
            ReversalOutcome::Succeeded => metrics.reversals.succeeded += 1,
            ReversalOutcome::Rejected => metrics.reversals.rejected += 1,
            ReversalOutcome::Failed => metrics.reversals.failed += 1,
        });
    }

    /// Get a snapshot of current metrics (used for the /metrics endpoint).
    ///
    /// Cloning means the lock is not held while the response is serialized.
    pub fn get_metrics_snapshot(&self) -> AppMetrics {
        self.metrics.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

/// Keeps `active_reversals` raised while alive. See [`AppState::begin_reversal`].
pub struct ActiveReversal {
    metrics: Arc<RwLock<AppMetrics>>,
}

impl Drop for ActiveReversal {
    fn drop(&mut self) {
        let mut metrics = self.metrics.write().unwrap_or_else(PoisonError::into_inner);
        metrics.active_reversals = metrics.active_reversals.saturating_sub(1);
    }
}

impl AppMetrics {
    pub fn error_rate(&self) -> f64 {
        if self.request_count > 0 {
            self.error_count as f64 / self.request_count as f64
        } else {
            0.0
        }
    }
}

impl EndpointMetric {
    pub fn average_duration_ms(&self) -> f64 {
        if self.request_count > 0 {
            self.total_duration_ms as f64 / self.request_count as f64
        } else {
            0.0
        }
    }

    /// Error rate as a fraction between 0.0 and 1.0.
    pub fn error_rate(&self) -> f64 {
        if self.request_count > 0 {
            self.error_count as f64 / self.request_count as f64
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::wav::WavCodec;

    fn state() -> AppState {
        AppState::new(AppConfig::default(), Arc::new(WavCodec), None)
    }

    #[test]
    fn test_reversal_outcomes_are_counted() {
        let state = state();
        state.record_reversal(ReversalOutcome::from_status(200));
        state.record_reversal(ReversalOutcome::from_status(400));
        state.record_reversal(ReversalOutcome::from_status(400));
        state.record_reversal(ReversalOutcome::from_status(500));

        let snapshot = state.get_metrics_snapshot();
        assert_eq!(
            snapshot.reversals,
            ReversalMetrics {
                succeeded: 1,
                rejected: 2,
                failed: 1
            }
        );
    }

    #[test]
    fn test_active_reversal_guard() {
        let state = state();
        let first = state.begin_reversal();
        let second = state.begin_reversal();
        assert_eq!(state.get_metrics_snapshot().active_reversals, 2);

        drop(first);
        assert_eq!(state.get_metrics_snapshot().active_reversals, 1);
        drop(second);
        assert_eq!(state.get_metrics_snapshot().active_reversals, 0);
    }

    #[actix_web::test]
    async fn test_cancelled_reversal_releases_the_gauge() {
        let state = state();
        let task_state = state.clone();
        let (started_tx, started_rx) = tokio::sync::oneshot::channel();

        let task = tokio::spawn(async move {
            let _active = task_state.begin_reversal();
            let _ = started_tx.send(());
            std::future::pending::<()>().await;
        });

        started_rx.await.expect("task started");
        assert_eq!(state.get_metrics_snapshot().active_reversals, 1);

        task.abort();
        let _ = task.await;
        assert_eq!(state.get_metrics_snapshot().active_reversals, 0);
    }

    #[test]
    fn test_endpoint_metrics() {
        let state = state();
        state.record_endpoint_request("POST /reverse-audio", 30, false);
        state.record_endpoint_request("POST /reverse-audio", 10, true);

        let snapshot = state.get_metrics_snapshot();
        let metric = &snapshot.endpoint_metrics["POST /reverse-audio"];
        assert_eq!(metric.request_count, 2);
        assert_eq!(metric.average_duration_ms(), 20.0);
        assert_eq!(metric.error_rate(), 0.5);
    }

    #[test]
    fn test_invalid_config_update_is_refused() {
        let state = state();
        let result = state.apply_config_update(r#"{"limits": {"max_duration_ms": 0}}"#);
        assert!(result.is_err());
        assert_eq!(state.get_config().limits.max_duration_ms, 10_000);
    }

    #[test]
    fn test_concurrent_config_updates_are_not_lost() {
        let state = state();

        std::thread::scope(|scope| {
            for round in 1..=50u64 {
                let duration = state.clone();
                let size = state.clone();
                scope.spawn(move || {
                    let json = format!(r#"{{"limits": {{"max_duration_ms": {}}}}}"#, 5000 + round);
                    duration.apply_config_update(&json).expect("valid duration");
                });
                scope.spawn(move || {
                    let json = format!(r#"{{"limits": {{"max_file_size_bytes": {}}}}}"#, 1000 + round);
                    size.apply_config_update(&json).expect("valid size");
                });
            }
        });

        // Each field keeps a value written by its own updates
        let limits = state.get_config().limits;
        assert!((5001..=5050).contains(&limits.max_duration_ms), "{}", limits.max_duration_ms);
        assert!((1001..=1050).contains(&limits.max_file_size_bytes), "{}", limits.max_file_size_bytes);
    }

    #[test]
    fn test_processor_uses_current_limits() {
        let state = state();
        state
            .apply_config_update(r#"{"limits": {"max_file_size_bytes": 1}}"#)
            .expect("valid config");

        let response = state.processor().process(&crate::audio::AudioRequest {
            audio: "AAAA".to_string(),
            format: "wav".to_string(),
        });
        assert!(response.message.starts_with("file too large"));
    }
}
