//! Operational entry points: index lifecycle, forced reindex, cache control and health.

use std::time::Instant;

use uuid::Uuid;

use crate::{
	CacheStatistics, HealthReport, IndexEvent, IndexKind, IndexesInfo, IndexingReport,
	MetricsSnapshot, OperationKind, Result, RoostService,
};

impl RoostService {
	pub async fn indexes_info(&self) -> Result<IndexesInfo> {
		self.indexes.indexes_info().await
	}

	/// Returns the indexes that had to be built.
	pub async fn ensure_indexes(&self) -> Result<Vec<IndexKind>> {
		self.indexes.ensure_indexes_exist().await
	}

	/// Drops and rebuilds both index structures. Indexed documents survive.
	pub async fn recreate_indexes(&self) -> Result<()> {
		self.indexes.create_indexes(true).await?;

		let invalidated = self.cache.remove_prefix(crate::search::SEARCH_CACHE_PREFIX).await;

		tracing::info!(cache_entries_invalidated = invalidated, "Indexes recreated.");

		Ok(())
	}

	/// Applies one mutation notification. Failures are returned unretried.
	pub async fn apply_index_event(&self, event: IndexEvent) -> Result<IndexingReport> {
		let started = Instant::now();
		let outcome = self.indexer.apply(event).await;

		self.record_indexing(started, outcome.is_err());

		match outcome.as_ref() {
			Ok(report) => tracing::info!(
				event = event.name(),
				entity = %event.entity(),
				backend = self.indexer.backend_name(),
				units_upserted = report.units_upserted,
				units_removed = report.units_removed,
				schedule_upserted = report.schedule_upserted,
				schedule_removed = report.schedule_removed,
				"Index event applied."
			),
			Err(err) => tracing::warn!(
				error = %err,
				event = event.name(),
				entity = %event.entity(),
				"Index event failed."
			),
		}

		outcome
	}

	pub async fn reindex_unit(&self, unit_id: Uuid) -> Result<IndexingReport> {
		let started = Instant::now();
		let outcome = self.indexer.reindex_unit(unit_id).await;

		self.record_indexing(started, outcome.is_err());

		if let Err(err) = outcome.as_ref() {
			tracing::warn!(error = %err, %unit_id, "Forced reindex failed.");
		} else {
			tracing::info!(%unit_id, "Unit reindexed.");
		}

		outcome
	}

	pub async fn flush_cache(&self) -> Result<()> {
		self.cache.flush().await
	}

	pub async fn cache_statistics(&self) -> CacheStatistics {
		self.cache.statistics().await
	}

	pub async fn check_health(&self) -> HealthReport {
		self.health.check_health().await
	}

	pub fn metrics_snapshot(&self) -> MetricsSnapshot {
		self.metrics.snapshot()
	}

	fn record_indexing(&self, started: Instant, failed: bool) {
		self.metrics.record(OperationKind::Indexing, started.elapsed(), failed);
	}
}
