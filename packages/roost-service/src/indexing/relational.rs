//! The relational backend searches the source tables directly, so an indexing hook only has to
//! drop cached pages that may now be stale.

use std::sync::Arc;

use uuid::Uuid;

use crate::{
	BoxFuture, Result,
	cache::Cache,
	indexing::{IndexingPipeline, IndexingReport},
	search::SEARCH_CACHE_PREFIX,
};

pub struct RelationalIndexer {
	cache: Arc<Cache>,
}
impl RelationalIndexer {
	pub fn new(cache: Arc<Cache>) -> Self {
		Self { cache }
	}

	async fn invalidate(&self, entity: String) -> Result<IndexingReport> {
		let invalidated = self.cache.remove_prefix(SEARCH_CACHE_PREFIX).await;

		tracing::debug!(entity, cache_entries_invalidated = invalidated, "Search cache invalidated.");

		Ok(IndexingReport { cache_entries_invalidated: invalidated, ..Default::default() })
	}
}
impl IndexingPipeline for RelationalIndexer {
	fn backend_name(&self) -> &'static str {
		"postgres"
	}

	fn index_unit(&self, unit_id: Uuid) -> BoxFuture<'_, Result<IndexingReport>> {
		Box::pin(self.invalidate(format!("unit:{unit_id}")))
	}

	fn remove_unit(&self, unit_id: Uuid, _property_id: Uuid) -> BoxFuture<'_, Result<IndexingReport>> {
		Box::pin(self.invalidate(format!("unit:{unit_id}")))
	}

	fn index_property(&self, property_id: Uuid) -> BoxFuture<'_, Result<IndexingReport>> {
		Box::pin(self.invalidate(format!("property:{property_id}")))
	}

	fn remove_property(&self, property_id: Uuid) -> BoxFuture<'_, Result<IndexingReport>> {
		Box::pin(self.invalidate(format!("property:{property_id}")))
	}
}
