//! Liveness and performance classification.

use std::{sync::Arc, time::Duration};

use serde::Serialize;
use serde_json::{Map, Value};
use time::OffsetDateTime;

use crate::{
	Error, Result,
	cache::Cache,
	lifecycle::IndexManager,
	metrics::{MetricsSnapshot, PerformanceMetrics},
};

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
	Healthy,
	Degraded,
	Unhealthy,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
	pub status: HealthStatus,
	pub message: String,
	pub metadata: Map<String, Value>,
	#[serde(with = "time::serde::rfc3339")]
	pub checked_at: OffsetDateTime,
}

pub struct HealthMonitor {
	cache: Arc<Cache>,
	indexes: Arc<IndexManager>,
	metrics: Arc<PerformanceMetrics>,
	thresholds: roost_config::Health,
}
impl HealthMonitor {
	pub fn new(
		cache: Arc<Cache>,
		indexes: Arc<IndexManager>,
		metrics: Arc<PerformanceMetrics>,
		thresholds: roost_config::Health,
	) -> Self {
		Self { cache, indexes, metrics, thresholds }
	}

	/// Never fails; probe and evaluation errors are reported as [`HealthStatus::Unhealthy`].
	pub async fn check_health(&self) -> HealthReport {
		let probe = match tokio::time::timeout(PROBE_TIMEOUT, self.probe()).await {
			Ok(outcome) => outcome,
			Err(_) => Err(Error::BackendUnavailable {
				message: format!("Health probe timed out after {}s.", PROBE_TIMEOUT.as_secs()),
			}),
		};
		let snapshot = self.metrics.snapshot();
		let probe_failure = probe.as_ref().err().map(ToString::to_string);
		let (status, message) = classify(&snapshot, probe_failure.as_deref(), &self.thresholds);
		let mut metadata = Map::new();

		metadata.insert("backend".to_string(), Value::from(self.indexes.backend_name()));
		metadata.insert(
			"backend_info".to_string(),
			probe.ok().map(Value::String).unwrap_or(Value::Null),
		);
		metadata.insert("cache_store".to_string(), Value::from(self.cache.store_name()));
		metadata.insert("metrics".to_string(), serde_json::to_value(&snapshot).unwrap_or(Value::Null));

		match status {
			HealthStatus::Healthy => tracing::debug!(reason = %message, "Health check passed."),
			HealthStatus::Degraded => tracing::warn!(reason = %message, "Service degraded."),
			HealthStatus::Unhealthy => tracing::error!(reason = %message, "Service unhealthy."),
		}

		HealthReport { status, message, metadata, checked_at: OffsetDateTime::now_utc() }
	}

	async fn probe(&self) -> Result<String> {
		self.cache.probe().await?;

		self.indexes.backend_info().await
	}
}

/// Maps a metrics snapshot and probe outcome to a status and a human-readable reason.
pub fn classify(
	snapshot: &MetricsSnapshot,
	probe_failure: Option<&str>,
	thresholds: &roost_config::Health,
) -> (HealthStatus, String) {
	if let Some(failure) = probe_failure {
		return (HealthStatus::Unhealthy, format!("Probe failed: {failure}"));
	}

	let mut unhealthy = Vec::new();
	let mut degraded = Vec::new();

	if snapshot.error_rate > thresholds.unhealthy_error_rate {
		unhealthy.push(format!("error rate {:.3} above {}", snapshot.error_rate, thresholds.unhealthy_error_rate));
	} else if snapshot.error_rate > thresholds.degraded_error_rate {
		degraded.push(format!("error rate {:.3} above {}", snapshot.error_rate, thresholds.degraded_error_rate));
	}

	// Idle indexing says nothing about throughput.
	if let Some(throughput) = snapshot.indexing_ops_per_sec {
		if throughput < thresholds.unhealthy_min_indexing_throughput {
			unhealthy.push(format!(
				"indexing throughput {throughput:.2} ops/s below {}",
				thresholds.unhealthy_min_indexing_throughput
			));
		} else if throughput < thresholds.degraded_min_indexing_throughput {
			degraded.push(format!(
				"indexing throughput {throughput:.2} ops/s below {}",
				thresholds.degraded_min_indexing_throughput
			));
		}
	}

	if snapshot.avg_response_ms > thresholds.unhealthy_response_ms {
		unhealthy.push(format!(
			"average response {:.1} ms above {}",
			snapshot.avg_response_ms, thresholds.unhealthy_response_ms
		));
	} else if snapshot.avg_response_ms > thresholds.degraded_response_ms {
		degraded.push(format!(
			"average response {:.1} ms above {}",
			snapshot.avg_response_ms, thresholds.degraded_response_ms
		));
	}

	if !unhealthy.is_empty() {
		unhealthy.extend(degraded);

		return (HealthStatus::Unhealthy, unhealthy.join("; "));
	}
	if !degraded.is_empty() {
		return (HealthStatus::Degraded, degraded.join("; "));
	}

	(HealthStatus::Healthy, "All checks passed.".to_string())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{
		BoxFuture,
		cache::MemoryCacheStore,
		lifecycle::{IndexInfo, IndexKind, IndexLifecycle},
		metrics::OperationKind,
	};

	fn snapshot(error_rate: f64, indexing_ops_per_sec: Option<f64>, avg_response_ms: f64) -> MetricsSnapshot {
		MetricsSnapshot {
			window_seconds: 60.0,
			indexing_ops: if indexing_ops_per_sec.is_some() { 600 } else { 0 },
			search_ops: 100,
			failed_ops: 0,
			indexing_ops_per_sec,
			search_ops_per_sec: 1.5,
			error_rate,
			avg_response_ms,
			samples_dropped: 0,
		}
	}

	#[test]
	fn error_rate_thresholds() {
		let thresholds = roost_config::Health::default();

		assert_eq!(classify(&snapshot(0.06, None, 50.0), None, &thresholds).0, HealthStatus::Degraded);
		assert_eq!(classify(&snapshot(0.12, None, 50.0), None, &thresholds).0, HealthStatus::Unhealthy);
		assert_eq!(classify(&snapshot(0.0, Some(20.0), 50.0), None, &thresholds).0, HealthStatus::Healthy);
	}

	#[test]
	fn throughput_and_latency_thresholds() {
		let thresholds = roost_config::Health::default();

		assert_eq!(classify(&snapshot(0.0, Some(7.0), 50.0), None, &thresholds).0, HealthStatus::Degraded);
		assert_eq!(classify(&snapshot(0.0, Some(2.0), 50.0), None, &thresholds).0, HealthStatus::Unhealthy);
		assert_eq!(classify(&snapshot(0.0, None, 1_500.0), None, &thresholds).0, HealthStatus::Degraded);
		assert_eq!(classify(&snapshot(0.0, None, 2_500.0), None, &thresholds).0, HealthStatus::Unhealthy);
	}

	#[test]
	fn idle_indexing_skips_throughput_checks() {
		let (status, message) = classify(&snapshot(0.0, None, 10.0), None, &roost_config::Health::default());

		assert_eq!(status, HealthStatus::Healthy);
		assert_eq!(message, "All checks passed.");
	}

	#[test]
	fn probe_failure_wins() {
		let (status, message) =
			classify(&snapshot(0.0, None, 10.0), Some("offline"), &roost_config::Health::default());

		assert_eq!(status, HealthStatus::Unhealthy);
		assert!(message.contains("offline"));
	}

	struct StaticLifecycle {
		reachable: bool,
	}
	impl IndexLifecycle for StaticLifecycle {
		fn backend_name(&self) -> &'static str {
			"static"
		}

		fn index_exists(&self, _kind: IndexKind) -> BoxFuture<'_, Result<bool>> {
			Box::pin(async { Ok(true) })
		}

		fn create_index(&self, _kind: IndexKind) -> BoxFuture<'_, Result<()>> {
			Box::pin(async { Ok(()) })
		}

		fn drop_index(&self, _kind: IndexKind, _delete_documents: bool) -> BoxFuture<'_, Result<()>> {
			Box::pin(async { Ok(()) })
		}

		fn index_info(&self, kind: IndexKind) -> BoxFuture<'_, Result<IndexInfo>> {
			Box::pin(async move { Ok(IndexInfo::missing(kind, kind.as_str())) })
		}

		fn backend_info(&self) -> BoxFuture<'_, Result<String>> {
			Box::pin(async move {
				if self.reachable {
					Ok("static 1.0".to_string())
				} else {
					Err(Error::BackendUnavailable { message: "connection refused".to_string() })
				}
			})
		}
	}

	fn monitor_with(reachable: bool, metrics: Arc<PerformanceMetrics>) -> HealthMonitor {
		HealthMonitor::new(
			Arc::new(Cache::new(MemoryCacheStore::new())),
			Arc::new(IndexManager::new(Arc::new(StaticLifecycle { reachable }))),
			metrics,
			roost_config::Health::default(),
		)
	}

	fn monitor(reachable: bool) -> HealthMonitor {
		monitor_with(reachable, Arc::new(PerformanceMetrics::new(Duration::from_secs(60))))
	}

	#[tokio::test]
	async fn reachable_idle_service_is_healthy() {
		let report = monitor(true).check_health().await;

		assert_eq!(report.status, HealthStatus::Healthy);
		assert_eq!(report.metadata.get("backend_info"), Some(&Value::from("static 1.0")));
	}

	#[tokio::test]
	async fn one_quick_index_event_keeps_the_service_healthy() {
		let metrics = Arc::new(PerformanceMetrics::new(Duration::from_secs(60)));

		metrics.record(OperationKind::Indexing, Duration::from_millis(20), false);

		let report = monitor_with(true, metrics).check_health().await;

		assert_eq!(report.status, HealthStatus::Healthy, "{}", report.message);
	}

	#[tokio::test]
	async fn slow_indexing_is_unhealthy() {
		let metrics = Arc::new(PerformanceMetrics::new(Duration::from_secs(60)));

		for _ in 0..3 {
			metrics.record(OperationKind::Indexing, Duration::from_millis(400), false);
		}

		let report = monitor_with(true, metrics).check_health().await;

		assert_eq!(report.status, HealthStatus::Unhealthy);
		assert!(report.message.contains("throughput"));
	}

	#[tokio::test]
	async fn unreachable_backend_is_unhealthy_not_an_error() {
		let report = monitor(false).check_health().await;

		assert_eq!(report.status, HealthStatus::Unhealthy);
		assert!(report.message.contains("connection refused"));
		assert_eq!(report.metadata.get("backend_info"), Some(&Value::Null));
	}
}
