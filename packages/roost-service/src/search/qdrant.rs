//! Search over the Qdrant collections.
//!
//! Unit attributes are filtered inside the units collection. Stay and dated-price constraints are
//! resolved first against the schedule collection and folded back in as point id conditions.

use std::{collections::BTreeSet, sync::Arc};

use qdrant_client::qdrant::{
	Condition, CountPointsBuilder, Direction, Filter, GeoPoint as QdrantGeoPoint, GeoRadius,
	OrderByBuilder, PointId, Query, QueryPointsBuilder, Range, ScrollPointsBuilder,
};
use uuid::Uuid;

use roost_domain::{Currency, DynamicFieldFilter, PriceRange, SearchItem, SearchQuery, SortKey, Stay};
use roost_storage::qdrant::QdrantStore;

use crate::{
	BoxFuture, Result, qdrant_payload,
	search::{SearchBackend, SearchPage},
};

const SCROLL_PAGE: u32 = 1_024;

pub struct QdrantSearch {
	qdrant: Arc<QdrantStore>,
}
impl QdrantSearch {
	pub fn new(qdrant: Arc<QdrantStore>) -> Self {
		Self { qdrant }
	}

	async fn run(&self, query: &SearchQuery) -> Result<SearchPage> {
		let mut constraints = UnitIdConstraints::default();

		if let Some(stay) = query.stay.as_ref() {
			constraints.excluded = self.schedule_unit_ids(unavailable_days_filter(stay)).await?;

			if !query.price_ranges.is_empty() {
				let priced = self.schedule_unit_ids(priced_days_filter(stay, &query.price_ranges)).await?;

				if priced.is_empty() {
					return Ok(SearchPage { items: Vec::new(), total_count: 0 });
				}

				constraints.required = Some(priced);
			}
		}

		let filter = unit_filter(query, &constraints);
		let total_count = self
			.qdrant
			.client
			.count(
				CountPointsBuilder::new(self.qdrant.units_collection.clone())
					.filter(filter.clone())
					.exact(true),
			)
			.await?
			.result
			.map(|count| count.count)
			.unwrap_or(0);

		if total_count <= query.offset() {
			return Ok(SearchPage { items: Vec::new(), total_count });
		}

		let response = self
			.qdrant
			.client
			.query(
				QueryPointsBuilder::new(self.qdrant.units_collection.clone())
					.query(Query::new_order_by(order_by(query.sort)))
					.filter(filter)
					.offset(query.offset())
					.limit(u64::from(query.size))
					.with_payload(true),
			)
			.await?;
		let mut items = Vec::with_capacity(response.result.len());

		for point in &response.result {
			let unit = qdrant_payload::unit_from_payload(&point.payload)?;
			let distance_km = match (query.geo.as_ref(), unit.location.as_ref()) {
				(Some(geo), Some(location)) => Some(geo.center.distance_km(location)),
				_ => None,
			};

			items.push(SearchItem { unit, distance_km });
		}

		Ok(SearchPage { items, total_count })
	}

	/// Distinct unit ids owning at least one schedule point that matches `filter`.
	async fn schedule_unit_ids(&self, filter: Filter) -> Result<BTreeSet<Uuid>> {
		let mut unit_ids = BTreeSet::new();
		let mut offset: Option<PointId> = None;

		loop {
			let mut request = ScrollPointsBuilder::new(self.qdrant.schedule_collection.clone())
				.filter(filter.clone())
				.limit(SCROLL_PAGE)
				.with_payload(true);

			if let Some(offset) = offset.take() {
				request = request.offset(offset);
			}

			let response = self.qdrant.client.scroll(request).await?;

			unit_ids.extend(
				response
					.result
					.iter()
					.filter_map(|point| qdrant_payload::payload_uuid(&point.payload, "unit_id")),
			);

			match response.next_page_offset {
				Some(next) => offset = Some(next),
				None => break,
			}
		}

		Ok(unit_ids)
	}
}
impl SearchBackend for QdrantSearch {
	fn name(&self) -> &'static str {
		"qdrant"
	}

	fn search<'a>(&'a self, query: &'a SearchQuery) -> BoxFuture<'a, Result<SearchPage>> {
		Box::pin(self.run(query))
	}
}

#[derive(Debug, Default)]
struct UnitIdConstraints {
	excluded: BTreeSet<Uuid>,
	required: Option<BTreeSet<Uuid>>,
}

fn unit_filter(query: &SearchQuery, constraints: &UnitIdConstraints) -> Filter {
	let mut must = Vec::new();
	let mut must_not = Vec::new();

	if let Some(city) = query.city.as_ref() {
		must.push(Condition::matches("city", city.clone()));
	}
	if let Some(prefix) = query.city_prefix.as_ref() {
		must.push(Condition::matches_text("city_text", prefix.clone()));
	}
	if let Some(prefix) = query.name.as_ref() {
		must.push(Condition::matches_text("name", prefix.clone()));
	}
	if let Some(id) = query.property_type_id {
		must.push(Condition::matches("property_type_id", id.to_string()));
	}
	if let Some(id) = query.unit_type_id {
		must.push(Condition::matches("unit_type_id", id.to_string()));
	}
	if let Some(min) = query.min_rating {
		must.push(Condition::range("rating", Range { gte: Some(min), ..Default::default() }));
	}
	if let Some(min) = query.min_adults {
		must.push(Condition::range("max_adults", Range { gte: Some(f64::from(min)), ..Default::default() }));
	}
	if let Some(min) = query.min_children {
		must.push(Condition::range(
			"max_children",
			Range { gte: Some(f64::from(min)), ..Default::default() },
		));
	}

	for id in &query.amenity_ids {
		must.push(Condition::matches("amenity_ids", id.to_string()));
	}
	for id in &query.service_ids {
		must.push(Condition::matches("service_ids", id.to_string()));
	}

	for filter in &query.dynamic_fields {
		must.push(match filter {
			DynamicFieldFilter::Exact { key, value } =>
				Condition::matches(qdrant_payload::dynamic_field(key), value.clone()),
			DynamicFieldFilter::Range { key, min, max } => Condition::range(
				qdrant_payload::dynamic_numeric_field(key),
				Range { gte: *min, lte: *max, ..Default::default() },
			),
		});
	}

	if query.stay.is_none() && !query.price_ranges.is_empty() {
		let any_currency = query
			.price_ranges
			.iter()
			.map(|(currency, range)| {
				Condition::range(qdrant_payload::price_field(*currency), bounds(range))
			})
			.collect::<Vec<_>>();

		must.push(Condition::from(Filter::should(any_currency)));
	}

	if let Some(geo) = query.geo.as_ref() {
		must.push(Condition::geo_radius(
			"location",
			GeoRadius {
				center: Some(QdrantGeoPoint { lat: geo.center.lat, lon: geo.center.lon }),
				radius: (geo.radius_km * 1_000.0) as f32,
			},
		));
	}

	if !constraints.excluded.is_empty() {
		must_not.push(Condition::has_id(point_ids(&constraints.excluded)));
	}
	if let Some(required) = constraints.required.as_ref() {
		must.push(Condition::has_id(point_ids(required)));
	}

	Filter { must, must_not, ..Default::default() }
}

/// Days inside the stay on which the unit cannot be booked.
fn unavailable_days_filter(stay: &Stay) -> Filter {
	Filter {
		must: vec![day_window(stay)],
		must_not: vec![Condition::matches("status", "available".to_string())],
		..Default::default()
	}
}

/// Days inside the stay priced within any requested currency range.
fn priced_days_filter(stay: &Stay, price_ranges: &[(Currency, PriceRange)]) -> Filter {
	let per_currency = price_ranges
		.iter()
		.map(|(currency, range)| {
			Condition::from(Filter::must([
				Condition::matches("currency", currency.as_str().to_string()),
				Condition::range("amount", bounds(range)),
			]))
		})
		.collect::<Vec<_>>();

	Filter::must([day_window(stay), Condition::from(Filter::should(per_currency))])
}

fn day_window(stay: &Stay) -> Condition {
	Condition::range(
		"day",
		Range {
			gte: Some(qdrant_payload::day_number(stay.check_in) as f64),
			lt: Some(qdrant_payload::day_number(stay.check_out) as f64),
			..Default::default()
		},
	)
}

fn bounds(range: &PriceRange) -> Range {
	Range { gte: range.min, lte: range.max, ..Default::default() }
}

fn point_ids(ids: &BTreeSet<Uuid>) -> Vec<PointId> {
	ids.iter().map(|id| PointId::from(id.to_string())).collect()
}

fn order_by(sort: SortKey) -> qdrant_client::qdrant::OrderBy {
	let (field, direction) = match sort {
		SortKey::RatingDesc => ("rating", Direction::Desc),
		SortKey::RatingAsc => ("rating", Direction::Asc),
		SortKey::CapacityDesc => ("max_adults", Direction::Desc),
	};

	OrderByBuilder::new(field).direction(direction as i32).build()
}
