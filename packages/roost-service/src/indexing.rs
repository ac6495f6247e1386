//! Keeps the search index in step with mutations of the relational source of truth.
//!
//! Every hook is an idempotent upsert or delete keyed by entity id. Failures are returned to the
//! caller unchanged; retrying is the caller's responsibility.

pub mod qdrant;
pub mod relational;

pub use qdrant::QdrantIndexer;
pub use relational::RelationalIndexer;

use std::ops::AddAssign;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{BoxFuture, Result};

/// Domain mutation notifications sent by the booking workflows after they commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum IndexEvent {
	PropertyCreated { property_id: Uuid },
	PropertyUpdated { property_id: Uuid },
	PropertyDeleted { property_id: Uuid },
	UnitCreated { unit_id: Uuid, property_id: Uuid },
	UnitUpdated { unit_id: Uuid, property_id: Uuid },
	UnitDeleted { unit_id: Uuid, property_id: Uuid },
}
impl IndexEvent {
	pub fn name(&self) -> &'static str {
		match self {
			Self::PropertyCreated { .. } => "property_created",
			Self::PropertyUpdated { .. } => "property_updated",
			Self::PropertyDeleted { .. } => "property_deleted",
			Self::UnitCreated { .. } => "unit_created",
			Self::UnitUpdated { .. } => "unit_updated",
			Self::UnitDeleted { .. } => "unit_deleted",
		}
	}

	/// Entity named in "manual reindex required" alerts.
	pub fn entity(&self) -> String {
		match self {
			Self::PropertyCreated { property_id }
			| Self::PropertyUpdated { property_id }
			| Self::PropertyDeleted { property_id } => format!("property:{property_id}"),
			Self::UnitCreated { unit_id, .. }
			| Self::UnitUpdated { unit_id, .. }
			| Self::UnitDeleted { unit_id, .. } => format!("unit:{unit_id}"),
		}
	}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexingReport {
	pub units_upserted: u64,
	pub units_removed: u64,
	pub schedule_upserted: u64,
	pub schedule_removed: u64,
	pub cache_entries_invalidated: u64,
}
impl AddAssign for IndexingReport {
	fn add_assign(&mut self, other: Self) {
		self.units_upserted += other.units_upserted;
		self.units_removed += other.units_removed;
		self.schedule_upserted += other.schedule_upserted;
		self.schedule_removed += other.schedule_removed;
		self.cache_entries_invalidated += other.cache_entries_invalidated;
	}
}

pub trait IndexingPipeline
where
	Self: Send + Sync,
{
	fn backend_name(&self) -> &'static str;

	/// Rebuilds the unit document and every schedule entry of the unit.
	fn index_unit(&self, unit_id: Uuid) -> BoxFuture<'_, Result<IndexingReport>>;

	fn remove_unit(&self, unit_id: Uuid, property_id: Uuid) -> BoxFuture<'_, Result<IndexingReport>>;

	/// Rebuilds every unit the property owns.
	fn index_property(&self, property_id: Uuid) -> BoxFuture<'_, Result<IndexingReport>>;

	fn remove_property(&self, property_id: Uuid) -> BoxFuture<'_, Result<IndexingReport>>;

	fn on_property_created(&self, property_id: Uuid) -> BoxFuture<'_, Result<IndexingReport>> {
		self.index_property(property_id)
	}

	fn on_property_updated(&self, property_id: Uuid) -> BoxFuture<'_, Result<IndexingReport>> {
		self.index_property(property_id)
	}

	fn on_property_deleted(&self, property_id: Uuid) -> BoxFuture<'_, Result<IndexingReport>> {
		self.remove_property(property_id)
	}

	fn on_unit_created(&self, unit_id: Uuid, _property_id: Uuid) -> BoxFuture<'_, Result<IndexingReport>> {
		self.index_unit(unit_id)
	}

	fn on_unit_updated(&self, unit_id: Uuid, _property_id: Uuid) -> BoxFuture<'_, Result<IndexingReport>> {
		self.index_unit(unit_id)
	}

	fn on_unit_deleted(&self, unit_id: Uuid, property_id: Uuid) -> BoxFuture<'_, Result<IndexingReport>> {
		self.remove_unit(unit_id, property_id)
	}

	fn reindex_unit(&self, unit_id: Uuid) -> BoxFuture<'_, Result<IndexingReport>> {
		self.index_unit(unit_id)
	}

	fn apply(&self, event: IndexEvent) -> BoxFuture<'_, Result<IndexingReport>> {
		match event {
			IndexEvent::PropertyCreated { property_id } => self.on_property_created(property_id),
			IndexEvent::PropertyUpdated { property_id } => self.on_property_updated(property_id),
			IndexEvent::PropertyDeleted { property_id } => self.on_property_deleted(property_id),
			IndexEvent::UnitCreated { unit_id, property_id } => self.on_unit_created(unit_id, property_id),
			IndexEvent::UnitUpdated { unit_id, property_id } => self.on_unit_updated(unit_id, property_id),
			IndexEvent::UnitDeleted { unit_id, property_id } => self.on_unit_deleted(unit_id, property_id),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn events_decode_from_tagged_json() {
		let unit_id = Uuid::new_v4();
		let property_id = Uuid::new_v4();
		let event: IndexEvent = serde_json::from_value(serde_json::json!({
			"event": "unit_deleted",
			"unit_id": unit_id,
			"property_id": property_id,
		}))
		.expect("Event must decode.");

		assert_eq!(event, IndexEvent::UnitDeleted { unit_id, property_id });
		assert_eq!(event.name(), "unit_deleted");
		assert_eq!(event.entity(), format!("unit:{unit_id}"));
	}

	#[test]
	fn reports_accumulate() {
		let mut total = IndexingReport { units_upserted: 1, schedule_upserted: 3, ..Default::default() };

		total += IndexingReport { units_upserted: 2, schedule_removed: 1, ..Default::default() };

		assert_eq!(total.units_upserted, 3);
		assert_eq!(total.schedule_upserted, 3);
		assert_eq!(total.schedule_removed, 1);
	}
}
