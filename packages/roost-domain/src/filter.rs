//! Reference evaluation of the search filter semantics.
//!
//! Both production backends compile [`SearchQuery`] into their own query language; this module is
//! the executable statement of what those compiled queries must select, evaluated over a unit
//! document and that unit's schedule rows.

use std::cmp::Ordering;

use crate::{
	currency::Currency,
	schedule::{ScheduleEntry, Stay},
	search::{SearchItem, SearchQuery, SortKey},
	text,
	unit::UnitDocument,
};

/// Returns the search item for `unit` when it satisfies every filter in `query`.
pub fn evaluate(query: &SearchQuery, unit: &UnitDocument, schedule: &[ScheduleEntry]) -> Option<SearchItem> {
	if let Some(city) = query.city.as_deref()
		&& unit.city_key() != city
	{
		return None;
	}
	if let Some(prefix) = query.city_prefix.as_deref()
		&& !text::prefix_matches(&unit.city, prefix)
	{
		return None;
	}
	if let Some(prefix) = query.name.as_deref()
		&& !text::prefix_matches(&unit.name, prefix)
	{
		return None;
	}
	if query.property_type_id.is_some_and(|id| id != unit.property_type_id) {
		return None;
	}
	if query.unit_type_id.is_some_and(|id| id != unit.unit_type_id) {
		return None;
	}
	if query.min_rating.is_some_and(|min| unit.rating < min) {
		return None;
	}
	if query.min_adults.is_some_and(|min| unit.max_adults < min) {
		return None;
	}
	if query.min_children.is_some_and(|min| unit.max_children < min) {
		return None;
	}
	if !query.amenity_ids.iter().all(|id| unit.amenity_ids.contains(id)) {
		return None;
	}
	if !query.service_ids.iter().all(|id| unit.service_ids.contains(id)) {
		return None;
	}
	if !query
		.dynamic_fields
		.iter()
		.all(|filter| filter.matches(unit.dynamic_fields.get(filter.key()).map(String::as_str)))
	{
		return None;
	}
	if let Some(stay) = query.stay.as_ref()
		&& !is_available(unit, schedule, stay)
	{
		return None;
	}
	if !query.price_ranges.is_empty() && !price_matches(query, unit, schedule) {
		return None;
	}

	let distance_km = match query.geo.as_ref() {
		Some(geo) => Some(geo.distance_within(unit.location.as_ref()?)?),
		None => None,
	};

	Some(SearchItem { unit: unit.clone(), distance_km })
}

/// Every existing schedule row inside the stay must be available.
pub fn is_available(unit: &UnitDocument, schedule: &[ScheduleEntry], stay: &Stay) -> bool {
	schedule
		.iter()
		.filter(|entry| entry.unit_id == unit.unit_id && stay.contains(entry.date))
		.all(|entry| entry.status.is_available())
}

/// A unit matches when any requested currency range covers that currency's stored amount.
pub fn price_matches(query: &SearchQuery, unit: &UnitDocument, schedule: &[ScheduleEntry]) -> bool {
	match query.stay.as_ref() {
		Some(stay) => schedule
			.iter()
			.filter(|entry| entry.unit_id == unit.unit_id && stay.contains(entry.date))
			.any(|entry| in_requested_range(query, entry.currency, entry.amount)),
		None => unit
			.base_prices
			.iter()
			.any(|(currency, amount)| in_requested_range(query, *currency, *amount)),
	}
}

/// Orders items the way the backends order their result pages. Ties fall back to unit id.
pub fn sort_items(items: &mut [SearchItem], sort: SortKey) {
	items.sort_by(|a, b| {
		let primary = match sort {
			SortKey::RatingDesc => b.unit.rating.total_cmp(&a.unit.rating),
			SortKey::RatingAsc => a.unit.rating.total_cmp(&b.unit.rating),
			SortKey::CapacityDesc => b.unit.max_adults.cmp(&a.unit.max_adults),
		};

		match primary {
			Ordering::Equal => a.unit.unit_id.cmp(&b.unit.unit_id),
			other => other,
		}
	});
}

fn in_requested_range(query: &SearchQuery, currency: Currency, amount: f64) -> bool {
	query.price_range(currency).is_some_and(|range| range.contains(amount))
}
