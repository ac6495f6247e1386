//! In-memory stand-ins for the relational source and a search backend.
//!
//! [`MemoryIndex`] implements every backend seam at once and answers searches with the reference
//! filter semantics from `roost_domain::filter`, so contract tests run without Postgres or Qdrant.

use std::{
	collections::{BTreeMap, BTreeSet, HashSet},
	sync::{
		Arc, Mutex,
		atomic::{AtomicU32, AtomicU64, Ordering},
	},
};

use time::Date;
use uuid::Uuid;

use roost_domain::{ScheduleEntry, SearchQuery, UnitDocument, filter};
use roost_service::{
	BoxFuture, Cache, Error, IndexInfo, IndexKind, IndexLifecycle, IndexingPipeline,
	IndexingReport, InventorySource, Result, SearchBackend, SearchPage,
	search::SEARCH_CACHE_PREFIX,
};

#[derive(Default)]
struct Inventory {
	units: BTreeMap<Uuid, UnitDocument>,
	schedule: BTreeMap<(Uuid, Date), ScheduleEntry>,
}

/// Source of truth double. Mutations here are what index events announce.
#[derive(Default)]
pub struct MemoryInventory {
	state: Mutex<Inventory>,
}
impl MemoryInventory {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn put_unit(&self, unit: UnitDocument) {
		self.lock().units.insert(unit.unit_id, unit);
	}

	pub fn put_schedule(&self, entry: ScheduleEntry) {
		self.lock().schedule.insert((entry.unit_id, entry.date), entry);
	}

	pub fn remove_schedule(&self, unit_id: Uuid, date: Date) {
		self.lock().schedule.remove(&(unit_id, date));
	}

	/// Deletes the unit and its calendar, like the relational cascade.
	pub fn remove_unit(&self, unit_id: Uuid) {
		let mut state = self.lock();

		state.units.remove(&unit_id);
		state.schedule.retain(|(owner, _), _| *owner != unit_id);
	}

	pub fn remove_property(&self, property_id: Uuid) {
		let mut state = self.lock();
		let owned = state
			.units
			.values()
			.filter(|unit| unit.property_id == property_id)
			.map(|unit| unit.unit_id)
			.collect::<BTreeSet<_>>();

		state.units.retain(|unit_id, _| !owned.contains(unit_id));
		state.schedule.retain(|(unit_id, _), _| !owned.contains(unit_id));
	}

	fn lock(&self) -> std::sync::MutexGuard<'_, Inventory> {
		self.state.lock().unwrap_or_else(|err| err.into_inner())
	}
}
impl InventorySource for MemoryInventory {
	fn load_unit(&self, unit_id: Uuid) -> BoxFuture<'_, Result<Option<UnitDocument>>> {
		let unit = self.lock().units.get(&unit_id).cloned();

		Box::pin(async move { Ok(unit) })
	}

	fn load_schedule(&self, unit_id: Uuid) -> BoxFuture<'_, Result<Vec<ScheduleEntry>>> {
		let entries = self
			.lock()
			.schedule
			.range((unit_id, Date::MIN)..=(unit_id, Date::MAX))
			.map(|(_, entry)| entry.clone())
			.collect();

		Box::pin(async move { Ok(entries) })
	}

	fn property_unit_ids(&self, property_id: Uuid) -> BoxFuture<'_, Result<Vec<Uuid>>> {
		let unit_ids = self
			.lock()
			.units
			.values()
			.filter(|unit| unit.property_id == property_id)
			.map(|unit| unit.unit_id)
			.collect();

		Box::pin(async move { Ok(unit_ids) })
	}
}

#[derive(Default)]
struct IndexState {
	indexes: HashSet<IndexKind>,
	units: BTreeMap<Uuid, UnitDocument>,
	schedule: BTreeMap<(Uuid, Date), ScheduleEntry>,
}

/// Index double mirroring an [`InventorySource`].
pub struct MemoryIndex {
	source: Arc<dyn InventorySource>,
	cache: Option<Arc<Cache>>,
	state: Mutex<IndexState>,
	writes: AtomicU64,
	failures_remaining: AtomicU32,
}
impl MemoryIndex {
	pub fn new(source: Arc<dyn InventorySource>) -> Self {
		Self {
			source,
			cache: None,
			state: Mutex::new(IndexState::default()),
			writes: AtomicU64::new(0),
			failures_remaining: AtomicU32::new(0),
		}
	}

	/// Invalidates cached search pages after each successful indexing call.
	pub fn with_cache(mut self, cache: Arc<Cache>) -> Self {
		self.cache = Some(cache);

		self
	}

	/// Makes the next `count` indexing calls fail as if the backend were down.
	pub fn fail_next(&self, count: u32) {
		self.failures_remaining.store(count, Ordering::SeqCst);
	}

	/// Backend writes issued so far: index creates and drops plus document upserts and deletes.
	pub fn writes(&self) -> u64 {
		self.writes.load(Ordering::SeqCst)
	}

	pub fn unit(&self, unit_id: Uuid) -> Option<UnitDocument> {
		self.lock().units.get(&unit_id).cloned()
	}

	pub fn unit_count(&self) -> usize {
		self.lock().units.len()
	}

	pub fn schedule_of(&self, unit_id: Uuid) -> Vec<ScheduleEntry> {
		self.lock()
			.schedule
			.range((unit_id, Date::MIN)..=(unit_id, Date::MAX))
			.map(|(_, entry)| entry.clone())
			.collect()
	}

	pub fn schedule_count(&self) -> usize {
		self.lock().schedule.len()
	}

	fn lock(&self) -> std::sync::MutexGuard<'_, IndexState> {
		self.state.lock().unwrap_or_else(|err| err.into_inner())
	}

	fn write(&self) {
		self.writes.fetch_add(1, Ordering::SeqCst);
	}

	fn injected_failure(&self) -> Result<()> {
		let consumed = self
			.failures_remaining
			.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
			.is_ok();

		if consumed {
			return Err(Error::BackendUnavailable { message: "injected failure".to_string() });
		}

		Ok(())
	}

	async fn rebuild_unit(&self, unit_id: Uuid) -> Result<IndexingReport> {
		let Some(unit) = self.source.load_unit(unit_id).await? else {
			return Ok(self.delete_unit(unit_id));
		};
		let schedule = self.source.load_schedule(unit_id).await?;
		let live = schedule.iter().map(|entry| entry.date).collect::<BTreeSet<_>>();
		let mut state = self.lock();
		let before = state.schedule.len();

		state.schedule.retain(|(owner, date), _| *owner != unit_id || live.contains(date));

		let schedule_removed = (before - state.schedule.len()) as u64;
		let schedule_upserted = schedule.len() as u64;

		for entry in schedule {
			state.schedule.insert((unit_id, entry.date), entry);
		}

		state.units.insert(unit_id, unit);
		drop(state);
		self.write();

		Ok(IndexingReport {
			units_upserted: 1,
			schedule_upserted,
			schedule_removed,
			..Default::default()
		})
	}

	fn delete_unit(&self, unit_id: Uuid) -> IndexingReport {
		let mut state = self.lock();
		let units_removed = u64::from(state.units.remove(&unit_id).is_some());
		let before = state.schedule.len();

		state.schedule.retain(|(owner, _), _| *owner != unit_id);

		let schedule_removed = (before - state.schedule.len()) as u64;

		drop(state);
		self.write();

		IndexingReport { units_removed, schedule_removed, ..Default::default() }
	}

	fn indexed_units_of(&self, property_id: Uuid) -> Vec<Uuid> {
		self.lock()
			.units
			.values()
			.filter(|unit| unit.property_id == property_id)
			.map(|unit| unit.unit_id)
			.collect()
	}

	async fn finish(&self, mut report: IndexingReport) -> Result<IndexingReport> {
		if let Some(cache) = self.cache.as_ref() {
			report.cache_entries_invalidated = cache.remove_prefix(SEARCH_CACHE_PREFIX).await;
		}

		Ok(report)
	}
}
impl IndexLifecycle for MemoryIndex {
	fn backend_name(&self) -> &'static str {
		"memory"
	}

	fn index_exists(&self, kind: IndexKind) -> BoxFuture<'_, Result<bool>> {
		let exists = self.lock().indexes.contains(&kind);

		Box::pin(async move { Ok(exists) })
	}

	fn create_index(&self, kind: IndexKind) -> BoxFuture<'_, Result<()>> {
		Box::pin(async move {
			self.lock().indexes.insert(kind);
			self.write();

			Ok(())
		})
	}

	fn drop_index(&self, kind: IndexKind, delete_documents: bool) -> BoxFuture<'_, Result<()>> {
		Box::pin(async move {
			let mut state = self.lock();

			state.indexes.remove(&kind);

			if delete_documents {
				match kind {
					IndexKind::Units => state.units.clear(),
					IndexKind::Schedule => state.schedule.clear(),
				}
			}

			drop(state);
			self.write();

			Ok(())
		})
	}

	fn index_info(&self, kind: IndexKind) -> BoxFuture<'_, Result<IndexInfo>> {
		Box::pin(async move {
			let state = self.lock();
			let exists = state.indexes.contains(&kind);
			let documents = match kind {
				IndexKind::Units => state.units.len(),
				IndexKind::Schedule => state.schedule.len(),
			} as u64;

			Ok(IndexInfo {
				kind,
				name: kind.as_str().to_string(),
				exists,
				document_count: documents,
				record_count: documents,
				term_count: 0,
				indexing: false,
			})
		})
	}

	fn backend_info(&self) -> BoxFuture<'_, Result<String>> {
		Box::pin(async { Ok("memory index".to_string()) })
	}
}
impl IndexingPipeline for MemoryIndex {
	fn backend_name(&self) -> &'static str {
		"memory"
	}

	fn index_unit(&self, unit_id: Uuid) -> BoxFuture<'_, Result<IndexingReport>> {
		Box::pin(async move {
			self.injected_failure()?;

			let report = self.rebuild_unit(unit_id).await?;

			self.finish(report).await
		})
	}

	fn remove_unit(&self, unit_id: Uuid, _property_id: Uuid) -> BoxFuture<'_, Result<IndexingReport>> {
		Box::pin(async move {
			self.injected_failure()?;

			let report = self.delete_unit(unit_id);

			self.finish(report).await
		})
	}

	fn index_property(&self, property_id: Uuid) -> BoxFuture<'_, Result<IndexingReport>> {
		Box::pin(async move {
			self.injected_failure()?;

			let current = self.source.property_unit_ids(property_id).await?;
			let mut report = IndexingReport::default();

			for unit_id in &current {
				report += self.rebuild_unit(*unit_id).await?;
			}

			for indexed in self.indexed_units_of(property_id) {
				if !current.contains(&indexed) {
					report += self.delete_unit(indexed);
				}
			}

			self.finish(report).await
		})
	}

	fn remove_property(&self, property_id: Uuid) -> BoxFuture<'_, Result<IndexingReport>> {
		Box::pin(async move {
			self.injected_failure()?;

			let mut report = IndexingReport::default();

			for unit_id in self.indexed_units_of(property_id) {
				report += self.delete_unit(unit_id);
			}

			self.finish(report).await
		})
	}
}
impl SearchBackend for MemoryIndex {
	fn name(&self) -> &'static str {
		"memory"
	}

	fn search<'a>(&'a self, query: &'a SearchQuery) -> BoxFuture<'a, Result<SearchPage>> {
		Box::pin(async move {
			let state = self.lock();
			let mut items = state
				.units
				.values()
				.filter_map(|unit| {
					let schedule = state
						.schedule
						.range((unit.unit_id, Date::MIN)..=(unit.unit_id, Date::MAX))
						.map(|(_, entry)| entry.clone())
						.collect::<Vec<_>>();

					filter::evaluate(query, unit, &schedule)
				})
				.collect::<Vec<_>>();

			drop(state);
			filter::sort_items(&mut items, query.sort);

			let total_count = items.len() as u64;
			let offset = usize::try_from(query.offset()).unwrap_or(usize::MAX);
			let items = items.into_iter().skip(offset).take(query.size as usize).collect();

			Ok(SearchPage { items, total_count })
		})
	}
}
