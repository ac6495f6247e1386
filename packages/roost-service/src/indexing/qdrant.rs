use std::{
	collections::{HashMap, HashSet},
	sync::Arc,
};

use qdrant_client::qdrant::{
	Condition, CountPointsBuilder, DeletePointsBuilder, Filter, PointId, PointStruct, PointsIdsList,
	ScrollPointsBuilder, UpsertPointsBuilder, Vector,
};
use uuid::Uuid;

use roost_storage::qdrant::QdrantStore;

use crate::{
	BoxFuture, Result,
	cache::Cache,
	indexing::{IndexingPipeline, IndexingReport},
	qdrant_payload,
	search::SEARCH_CACHE_PREFIX,
	source::InventorySource,
};

const UPSERT_BATCH: usize = 256;
const SCROLL_PAGE: u32 = 512;

pub struct QdrantIndexer {
	qdrant: Arc<QdrantStore>,
	source: Arc<dyn InventorySource>,
	cache: Arc<Cache>,
}
impl QdrantIndexer {
	pub fn new(qdrant: Arc<QdrantStore>, source: Arc<dyn InventorySource>, cache: Arc<Cache>) -> Self {
		Self { qdrant, source, cache }
	}

	async fn rebuild_unit(&self, unit_id: Uuid) -> Result<IndexingReport> {
		let Some(unit) = self.source.load_unit(unit_id).await? else {
			tracing::info!(%unit_id, "Unit is gone from the source. Removing its documents.");

			return self.delete_unit_documents(unit_id).await;
		};
		let schedule = self.source.load_schedule(unit_id).await?;
		let mut report = IndexingReport::default();
		let mut live_ids = Vec::with_capacity(schedule.len());
		let mut points = Vec::with_capacity(schedule.len());

		for entry in schedule.iter().filter(|entry| entry.unit_id == unit_id) {
			let point_id = qdrant_payload::schedule_point_id(unit_id, entry.date);

			live_ids.push(PointId::from(point_id.to_string()));
			points.push(PointStruct::new(
				point_id.to_string(),
				HashMap::<String, Vector>::new(),
				qdrant_payload::schedule_payload(entry, unit.property_id),
			));
		}

		// Schedule first so a unit document never appears without its calendar.
		for batch in points.chunks(UPSERT_BATCH) {
			self.qdrant
				.client
				.upsert_points(
					UpsertPointsBuilder::new(self.qdrant.schedule_collection.clone(), batch.to_vec())
						.wait(true),
				)
				.await?;
		}

		report.schedule_upserted = points.len() as u64;

		let unit_point = PointStruct::new(
			unit_id.to_string(),
			HashMap::<String, Vector>::new(),
			qdrant_payload::unit_payload(&unit),
		);

		self.qdrant
			.client
			.upsert_points(
				UpsertPointsBuilder::new(self.qdrant.units_collection.clone(), vec![unit_point])
					.wait(true),
			)
			.await?;

		report.units_upserted = 1;

		let stale = Filter {
			must: vec![Condition::matches("unit_id", unit_id.to_string())],
			must_not: vec![Condition::has_id(live_ids)],
			..Default::default()
		};

		report.schedule_removed = self.delete_by_filter(&self.qdrant.schedule_collection, stale).await?;

		tracing::debug!(
			%unit_id,
			schedule_upserted = report.schedule_upserted,
			schedule_removed = report.schedule_removed,
			"Unit indexed."
		);

		Ok(report)
	}

	async fn delete_unit_documents(&self, unit_id: Uuid) -> Result<IndexingReport> {
		let by_unit = Filter::must([Condition::matches("unit_id", unit_id.to_string())]);
		let units_removed = self.delete_by_filter(&self.qdrant.units_collection, by_unit.clone()).await?;
		let schedule_removed = self.delete_by_filter(&self.qdrant.schedule_collection, by_unit).await?;

		Ok(IndexingReport { units_removed, schedule_removed, ..Default::default() })
	}

	async fn delete_by_filter(&self, collection: &str, filter: Filter) -> Result<u64> {
		let matching = self
			.qdrant
			.client
			.count(CountPointsBuilder::new(collection).filter(filter.clone()).exact(true))
			.await?
			.result
			.map(|count| count.count)
			.unwrap_or(0);

		if matching == 0 {
			return Ok(0);
		}

		self.qdrant
			.client
			.delete_points(DeletePointsBuilder::new(collection).points(filter).wait(true))
			.await?;

		Ok(matching)
	}

	async fn indexed_units_of_property(&self, property_id: Uuid) -> Result<Vec<Uuid>> {
		let mut unit_ids = Vec::new();
		let mut offset: Option<PointId> = None;

		loop {
			let mut request = ScrollPointsBuilder::new(self.qdrant.units_collection.clone())
				.filter(Filter::must([Condition::matches("property_id", property_id.to_string())]))
				.limit(SCROLL_PAGE)
				.with_payload(false);

			if let Some(offset) = offset.take() {
				request = request.offset(offset);
			}

			let response = self.qdrant.client.scroll(request).await?;

			unit_ids.extend(
				response.result.iter().filter_map(|point| point.id.as_ref()).filter_map(qdrant_payload::point_uuid),
			);

			match response.next_page_offset {
				Some(next) => offset = Some(next),
				None => break,
			}
		}

		Ok(unit_ids)
	}

	async fn rebuild_property(&self, property_id: Uuid) -> Result<IndexingReport> {
		let unit_ids = self.source.property_unit_ids(property_id).await?;
		let current: HashSet<Uuid> = unit_ids.iter().copied().collect();
		let mut report = IndexingReport::default();

		for unit_id in &unit_ids {
			report += self.rebuild_unit(*unit_id).await?;
		}

		for indexed in self.indexed_units_of_property(property_id).await? {
			if !current.contains(&indexed) {
				report += self.delete_unit_documents(indexed).await?;
			}
		}

		Ok(report)
	}

	async fn delete_property_documents(&self, property_id: Uuid) -> Result<IndexingReport> {
		let by_property = Filter::must([Condition::matches("property_id", property_id.to_string())]);
		let units_removed =
			self.delete_by_filter(&self.qdrant.units_collection, by_property.clone()).await?;
		let schedule_removed =
			self.delete_by_filter(&self.qdrant.schedule_collection, by_property).await?;

		Ok(IndexingReport { units_removed, schedule_removed, ..Default::default() })
	}

	async fn invalidate(&self, mut report: IndexingReport) -> IndexingReport {
		report.cache_entries_invalidated = self.cache.remove_prefix(SEARCH_CACHE_PREFIX).await;

		report
	}
}
impl IndexingPipeline for QdrantIndexer {
	fn backend_name(&self) -> &'static str {
		"qdrant"
	}

	fn index_unit(&self, unit_id: Uuid) -> BoxFuture<'_, Result<IndexingReport>> {
		Box::pin(async move {
			let report = self.rebuild_unit(unit_id).await?;

			Ok(self.invalidate(report).await)
		})
	}

	fn remove_unit(&self, unit_id: Uuid, property_id: Uuid) -> BoxFuture<'_, Result<IndexingReport>> {
		Box::pin(async move {
			let report = self.delete_unit_documents(unit_id).await?;

			tracing::debug!(%unit_id, %property_id, units_removed = report.units_removed, "Unit removed.");

			Ok(self.invalidate(report).await)
		})
	}

	fn index_property(&self, property_id: Uuid) -> BoxFuture<'_, Result<IndexingReport>> {
		Box::pin(async move {
			let report = self.rebuild_property(property_id).await?;

			Ok(self.invalidate(report).await)
		})
	}

	fn remove_property(&self, property_id: Uuid) -> BoxFuture<'_, Result<IndexingReport>> {
		Box::pin(async move {
			let report = self.delete_property_documents(property_id).await?;

			Ok(self.invalidate(report).await)
		})
	}
}

#[cfg(test)]
mod tests {
	use time::macros::date;

	use super::*;

	#[test]
	fn rebuild_of_same_calendar_targets_same_points() {
		let unit_id = Uuid::new_v4();
		let first: Vec<Uuid> = [date!(2026 - 04 - 01), date!(2026 - 04 - 02)]
			.into_iter()
			.map(|day| qdrant_payload::schedule_point_id(unit_id, day))
			.collect();
		let second: Vec<Uuid> = [date!(2026 - 04 - 01), date!(2026 - 04 - 02)]
			.into_iter()
			.map(|day| qdrant_payload::schedule_point_id(unit_id, day))
			.collect();

		assert_eq!(first, second);
	}
}
