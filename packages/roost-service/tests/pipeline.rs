use std::{
	collections::{BTreeMap, BTreeSet},
	sync::Arc,
};

use time::{Date, macros::date};
use uuid::Uuid;

use roost_domain::{
	Currency, GeoPoint, PriceRange, ScheduleEntry, ScheduleStatus, SearchFilters, SearchRequest,
	UnitDocument,
};
use roost_service::{
	Backends, Cache, HealthStatus, IndexEvent, IndexKind, RoostService, cache::MemoryCacheStore,
};
use roost_testkit::{MemoryIndex, MemoryInventory};

const POOL: Uuid = Uuid::from_u128(0xA1);
const WIFI: Uuid = Uuid::from_u128(0xA2);
const PARKING: Uuid = Uuid::from_u128(0xA3);

struct Harness {
	inventory: Arc<MemoryInventory>,
	index: Arc<MemoryIndex>,
	service: RoostService,
}

fn harness() -> Harness {
	let cfg = roost_testkit::offline_config().expect("Offline config must build.");
	let cache = Arc::new(Cache::new(MemoryCacheStore::new()));
	let inventory = Arc::new(MemoryInventory::new());
	let index = Arc::new(MemoryIndex::new(inventory.clone()).with_cache(cache.clone()));
	let backends =
		Backends { lifecycle: index.clone(), indexer: index.clone(), search: index.clone() };

	Harness { inventory, index, service: RoostService::with_backends(cfg, cache, backends) }
}

fn unit(property_id: Uuid, city: &str, rating: f64, amenities: &[Uuid]) -> UnitDocument {
	UnitDocument {
		unit_id: Uuid::new_v4(),
		property_id,
		property_type_id: Uuid::from_u128(1),
		unit_type_id: Uuid::from_u128(2),
		name: format!("{city} unit"),
		city: city.to_string(),
		location: Some(GeoPoint { lat: 12.7855, lon: 45.0187 }),
		max_adults: 2,
		max_children: 0,
		rating,
		amenity_ids: amenities.iter().copied().collect(),
		service_ids: BTreeSet::new(),
		base_prices: BTreeMap::from([(Currency::Yer, 20_000.0)]),
		dynamic_fields: BTreeMap::new(),
	}
}

fn day(unit_id: Uuid, date: Date, status: ScheduleStatus, amount: f64) -> ScheduleEntry {
	ScheduleEntry {
		unit_id,
		date,
		status,
		amount,
		currency: Currency::Usd,
		price_type: "nightly".to_string(),
	}
}

fn stay(check_in: Date, check_out: Date) -> SearchRequest {
	SearchRequest::new(SearchFilters {
		check_in: Some(check_in),
		check_out: Some(check_out),
		..Default::default()
	})
}

#[tokio::test]
async fn second_ensure_issues_no_backend_writes() {
	let h = harness();
	let built = h.service.ensure_indexes().await.expect("Ensure failed.");

	assert_eq!(built, IndexKind::ALL.to_vec());

	let writes = h.index.writes();
	let rebuilt = h.service.ensure_indexes().await.expect("Ensure failed.");

	assert!(rebuilt.is_empty());
	assert_eq!(h.index.writes(), writes);

	let info = h.service.indexes_info().await.expect("Info failed.");

	assert!(info.indexes.iter().all(|index| index.exists));
}

#[tokio::test]
async fn unit_updates_are_idempotent() {
	let h = harness();
	let property_id = Uuid::new_v4();
	let doc = unit(property_id, "Aden", 4.5, &[POOL]);
	let unit_id = doc.unit_id;
	let event = IndexEvent::UnitUpdated { unit_id, property_id };

	h.inventory.put_unit(doc);
	h.inventory.put_schedule(day(unit_id, date!(2026 - 05 - 01), ScheduleStatus::Available, 90.0));
	h.inventory.put_schedule(day(unit_id, date!(2026 - 05 - 02), ScheduleStatus::Booked, 90.0));

	h.service.apply_index_event(event).await.expect("First update failed.");

	let first_unit = h.index.unit(unit_id);
	let first_schedule = h.index.schedule_of(unit_id);

	h.service.apply_index_event(event).await.expect("Second update failed.");

	assert_eq!(h.index.unit(unit_id), first_unit);
	assert_eq!(h.index.schedule_of(unit_id), first_schedule);
	assert_eq!(h.index.schedule_count(), 2);
}

#[tokio::test]
async fn rebuild_drops_schedule_days_gone_from_the_source() {
	let h = harness();
	let property_id = Uuid::new_v4();
	let doc = unit(property_id, "Aden", 4.0, &[]);
	let unit_id = doc.unit_id;

	h.inventory.put_unit(doc);
	h.inventory.put_schedule(day(unit_id, date!(2026 - 05 - 01), ScheduleStatus::Available, 90.0));
	h.inventory.put_schedule(day(unit_id, date!(2026 - 05 - 02), ScheduleStatus::Available, 90.0));
	h.service.reindex_unit(unit_id).await.expect("Reindex failed.");
	h.inventory.remove_schedule(unit_id, date!(2026 - 05 - 02));

	let report = h.service.reindex_unit(unit_id).await.expect("Reindex failed.");

	assert_eq!(report.schedule_removed, 1);
	assert_eq!(h.index.schedule_of(unit_id).len(), 1);
}

#[tokio::test]
async fn property_deletion_cascades_to_units_and_schedule() {
	let h = harness();
	let property_id = Uuid::new_v4();
	let other_property = Uuid::new_v4();
	let first = unit(property_id, "Aden", 4.0, &[]);
	let second = unit(property_id, "Aden", 3.5, &[]);
	let bystander = unit(other_property, "Mukalla", 4.1, &[]);

	for doc in [&first, &second, &bystander] {
		h.inventory.put_unit(doc.clone());
		h.inventory.put_schedule(day(doc.unit_id, date!(2026 - 06 - 01), ScheduleStatus::Available, 80.0));
	}

	h.service
		.apply_index_event(IndexEvent::PropertyCreated { property_id })
		.await
		.expect("Property indexing failed.");
	h.service
		.apply_index_event(IndexEvent::PropertyCreated { property_id: other_property })
		.await
		.expect("Property indexing failed.");

	assert_eq!(h.index.unit_count(), 3);

	h.inventory.remove_property(property_id);

	let report = h
		.service
		.apply_index_event(IndexEvent::PropertyDeleted { property_id })
		.await
		.expect("Property deletion failed.");

	assert_eq!(report.units_removed, 2);
	assert_eq!(report.schedule_removed, 2);
	assert!(h.index.unit(first.unit_id).is_none());
	assert!(h.index.schedule_of(second.unit_id).is_empty());
	assert!(h.index.unit(bystander.unit_id).is_some());
	assert_eq!(h.index.schedule_count(), 1);
}

#[tokio::test]
async fn update_of_a_vanished_unit_removes_it() {
	let h = harness();
	let property_id = Uuid::new_v4();
	let doc = unit(property_id, "Aden", 4.0, &[]);
	let unit_id = doc.unit_id;

	h.inventory.put_unit(doc);
	h.service.reindex_unit(unit_id).await.expect("Reindex failed.");
	h.inventory.remove_unit(unit_id);
	h.service
		.apply_index_event(IndexEvent::UnitUpdated { unit_id, property_id })
		.await
		.expect("Update failed.");

	assert!(h.index.unit(unit_id).is_none());
}

#[tokio::test]
async fn availability_excludes_stays_over_booked_nights() {
	let h = harness();
	let property_id = Uuid::new_v4();
	let doc = unit(property_id, "Aden", 4.0, &[]);
	let unit_id = doc.unit_id;
	let d1 = date!(2026 - 05 - 01);
	let d2 = date!(2026 - 05 - 02);
	let d3 = date!(2026 - 05 - 03);

	h.inventory.put_unit(doc);
	h.inventory.put_schedule(day(unit_id, d1, ScheduleStatus::Available, 90.0));
	h.inventory.put_schedule(day(unit_id, d2, ScheduleStatus::Booked, 90.0));
	h.inventory.put_schedule(day(unit_id, d3, ScheduleStatus::Available, 90.0));
	h.service.reindex_unit(unit_id).await.expect("Reindex failed.");

	let over_booked = h.service.search(stay(d1, d3)).await.expect("Search failed.");
	let one_night = h.service.search(stay(d1, d2)).await.expect("Search failed.");

	assert_eq!(over_booked.total_count, 0);
	assert_eq!(one_night.total_count, 1);
	assert_eq!(one_night.meta.and_then(|meta| meta.nights), Some(1));
}

#[tokio::test]
async fn price_ranges_match_any_currency() {
	let h = harness();
	let mut doc = unit(Uuid::new_v4(), "Aden", 4.0, &[]);

	doc.base_prices = BTreeMap::from([(Currency::Yer, 15_000.0), (Currency::Usd, 60.0)]);

	let unit_id = doc.unit_id;

	h.inventory.put_unit(doc);
	h.service.reindex_unit(unit_id).await.expect("Reindex failed.");

	let request = SearchRequest::new(SearchFilters {
		price_ranges: BTreeMap::from([
			(Currency::Yer, PriceRange { min: Some(30_000.0), max: None }),
			(Currency::Usd, PriceRange { min: Some(50.0), max: Some(70.0) }),
		]),
		..Default::default()
	});
	let result = h.service.search(request).await.expect("Search failed.");

	assert_eq!(result.total_count, 1);
	assert_eq!(result.items[0].unit.unit_id, unit_id);
}

#[tokio::test]
async fn aden_search_end_to_end() {
	let h = harness();
	let property_id = Uuid::new_v4();
	let best = unit(property_id, "Aden", 4.8, &[POOL, WIFI]);
	let good = unit(property_id, "Aden", 4.2, &[POOL, WIFI, PARKING]);
	let low_rated = unit(property_id, "Aden", 3.1, &[POOL, WIFI]);
	let no_wifi = unit(property_id, "Aden", 4.9, &[POOL]);
	let elsewhere = unit(Uuid::new_v4(), "Sanaa", 5.0, &[POOL, WIFI]);

	for doc in [&best, &good, &low_rated, &no_wifi, &elsewhere] {
		h.inventory.put_unit(doc.clone());
		h.service.reindex_unit(doc.unit_id).await.expect("Reindex failed.");
	}

	let request = SearchRequest {
		size: Some(1),
		..SearchRequest::new(SearchFilters {
			city: Some("ADEN".to_string()),
			min_rating: Some(4.0),
			amenity_ids: BTreeSet::from([POOL, WIFI]),
			..Default::default()
		})
	};
	let first = h.service.search(request.clone()).await.expect("Search failed.");
	let second =
		h.service.search(SearchRequest { page: 2, ..request }).await.expect("Search failed.");

	assert_eq!(first.total_count, 2);
	assert_eq!(first.total_pages, 2);
	assert_eq!(first.items[0].unit.unit_id, best.unit_id);
	assert_eq!(second.items[0].unit.unit_id, good.unit_id);
	assert!(second.meta.is_none());
}

#[tokio::test]
async fn indexing_invalidates_cached_pages() {
	let h = harness();
	let property_id = Uuid::new_v4();
	let doc = unit(property_id, "Aden", 4.0, &[]);
	let unit_id = doc.unit_id;
	let request = || {
		SearchRequest::new(SearchFilters { city: Some("Aden".to_string()), ..Default::default() })
	};

	assert_eq!(h.service.search(request()).await.expect("Search failed.").total_count, 0);

	h.inventory.put_unit(doc);

	let report = h
		.service
		.apply_index_event(IndexEvent::UnitCreated { unit_id, property_id })
		.await
		.expect("Indexing failed.");

	assert_eq!(report.cache_entries_invalidated, 1);
	assert_eq!(h.service.search(request()).await.expect("Search failed.").total_count, 1);
}

#[tokio::test]
async fn indexing_failures_surface_without_retry() {
	let h = harness();
	let unit_id = Uuid::new_v4();

	h.index.fail_next(1);

	let failed = h
		.service
		.apply_index_event(IndexEvent::UnitCreated { unit_id, property_id: Uuid::new_v4() })
		.await;

	assert!(failed.is_err_and(|err| !err.is_caller_error()));
	assert_eq!(h.service.metrics_snapshot().failed_ops, 1);
}

#[tokio::test]
async fn a_single_index_event_leaves_health_untouched() {
	let h = harness();
	let unit = unit(Uuid::new_v4(), "Aden", 4.0, &[]);
	let unit_id = unit.unit_id;

	h.inventory.put_unit(unit);
	h.service
		.apply_index_event(IndexEvent::UnitCreated { unit_id, property_id: Uuid::new_v4() })
		.await
		.expect("Index event failed.");

	let report = h.service.check_health().await;

	assert_eq!(h.service.metrics_snapshot().indexing_ops, 1);
	assert_eq!(report.status, HealthStatus::Healthy, "{}", report.message);
}

#[tokio::test]
async fn health_reflects_probe_and_flush_resets_cache_counters() {
	let h = harness();

	h.service.search(SearchRequest::new(SearchFilters::default())).await.expect("Search failed.");

	let report = h.service.check_health().await;

	assert_eq!(report.status, HealthStatus::Healthy);
	assert_eq!(h.service.cache_statistics().await.misses, 1);

	h.service.flush_cache().await.expect("Flush failed.");

	let stats = h.service.cache_statistics().await;

	assert_eq!((stats.hits, stats.misses, stats.key_count), (0, 0, 0));
	assert!(stats.last_flush_at.is_some());
}
