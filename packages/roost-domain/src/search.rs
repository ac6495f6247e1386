use std::{
	collections::{BTreeMap, BTreeSet},
	fmt::{Display, Formatter},
};

use serde::{Deserialize, Serialize};
use time::Date;
use uuid::Uuid;

use crate::{
	currency::Currency,
	dynamic_field::{DynamicFieldFilter, numeric_in_range},
	geo::GeoFilter,
	schedule::Stay,
	text::{self, MAX_PREFIX_WORD_LEN},
	unit::{UnitDocument, normalize_city},
};

const MAX_RATING: f64 = 5.0;
const MAX_ID_FILTER_ITEMS: usize = 64;
const MAX_DYNAMIC_FILTERS: usize = 32;
const MAX_RADIUS_KM: f64 = 20_000.0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterError {
	pub path: String,
	pub message: String,
}
impl FilterError {
	fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
		Self { path: path.into(), message: message.into() }
	}
}
impl Display for FilterError {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}: {}", self.path, self.message)
	}
}
impl std::error::Error for FilterError {}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceRange {
	pub min: Option<f64>,
	pub max: Option<f64>,
}
impl PriceRange {
	pub fn contains(&self, amount: f64) -> bool {
		numeric_in_range(amount, self.min, self.max)
	}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
	#[default]
	RatingDesc,
	RatingAsc,
	CapacityDesc,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchFilters {
	pub city: Option<String>,
	/// Word-prefix match on the city, e.g. `"shei oth"` finds Sheikh Othman.
	pub city_prefix: Option<String>,
	/// Word-prefix match on the unit name.
	pub name: Option<String>,
	pub property_type_id: Option<Uuid>,
	pub unit_type_id: Option<Uuid>,
	pub price_ranges: BTreeMap<Currency, PriceRange>,
	pub min_rating: Option<f64>,
	pub min_adults: Option<u32>,
	pub min_children: Option<u32>,
	pub amenity_ids: BTreeSet<Uuid>,
	pub service_ids: BTreeSet<Uuid>,
	#[serde(with = "crate::date_serde::option")]
	pub check_in: Option<Date>,
	#[serde(with = "crate::date_serde::option")]
	pub check_out: Option<Date>,
	pub dynamic_fields: BTreeMap<String, String>,
	pub geo: Option<GeoFilter>,
}

/// Search request as callers send it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
	#[serde(default = "default_page")]
	pub page: u32,
	#[serde(default)]
	pub size: Option<u32>,
	#[serde(default)]
	pub filters: SearchFilters,
	#[serde(default)]
	pub sort: Option<SortKey>,
}
impl SearchRequest {
	pub fn new(filters: SearchFilters) -> Self {
		Self { page: default_page(), size: None, filters, sort: None }
	}

	/// Validates and normalizes the request into the form both backends compile.
	pub fn into_query(self, default_size: u32, max_size: u32) -> Result<SearchQuery, FilterError> {
		if self.page == 0 {
			return Err(FilterError::new("$.page", "page is 1-based and must be at least 1."));
		}

		let size = self.size.unwrap_or(default_size);

		if size == 0 || size > max_size {
			return Err(FilterError::new("$.size", format!("size must be between 1 and {max_size}.")));
		}

		let filters = self.filters;
		let city = match filters.city.as_deref().map(normalize_city) {
			Some(city) if city.is_empty() =>
				return Err(FilterError::new("$.filters.city", "city must be non-empty when present.")),
			other => other,
		};
		let city_prefix = prefix_query("$.filters.city_prefix", filters.city_prefix.as_deref())?;
		let name = prefix_query("$.filters.name", filters.name.as_deref())?;
		let mut price_ranges = Vec::with_capacity(filters.price_ranges.len());

		for (currency, range) in filters.price_ranges {
			validate_price_range(currency, &range)?;
			price_ranges.push((currency, range));
		}

		if let Some(rating) = filters.min_rating
			&& (!rating.is_finite() || !(0.0..=MAX_RATING).contains(&rating))
		{
			return Err(FilterError::new(
				"$.filters.min_rating",
				format!("min_rating must be between 0 and {MAX_RATING}."),
			));
		}

		for (path, ids) in [
			("$.filters.amenity_ids", &filters.amenity_ids),
			("$.filters.service_ids", &filters.service_ids),
		] {
			if ids.len() > MAX_ID_FILTER_ITEMS {
				return Err(FilterError::new(
					path,
					format!("at most {MAX_ID_FILTER_ITEMS} ids may be required."),
				));
			}
		}

		let stay = match (filters.check_in, filters.check_out) {
			(None, None) => None,
			(Some(check_in), Some(check_out)) => Some(Stay::new(check_in, check_out).ok_or_else(
				|| FilterError::new("$.filters.check_out", "check_out must be after check_in."),
			)?),
			_ => {
				return Err(FilterError::new(
					"$.filters",
					"check_in and check_out must be supplied together.",
				));
			},
		};

		if filters.dynamic_fields.len() > MAX_DYNAMIC_FILTERS {
			return Err(FilterError::new(
				"$.filters.dynamic_fields",
				format!("at most {MAX_DYNAMIC_FILTERS} dynamic field filters are allowed."),
			));
		}

		let mut dynamic_fields = Vec::with_capacity(filters.dynamic_fields.len());

		for (key, raw) in &filters.dynamic_fields {
			let filter = DynamicFieldFilter::parse(key, raw).map_err(|message| {
				FilterError::new(format!("$.filters.dynamic_fields.{key}"), message)
			})?;

			dynamic_fields.push(filter);
		}

		if let Some(geo) = filters.geo.as_ref() {
			if !geo.center.is_valid() {
				return Err(FilterError::new(
					"$.filters.geo.center",
					"center must be a valid latitude/longitude.",
				));
			}
			if !geo.radius_km.is_finite() || geo.radius_km <= 0.0 || geo.radius_km > MAX_RADIUS_KM {
				return Err(FilterError::new(
					"$.filters.geo.radius_km",
					format!("radius_km must be greater than 0 and at most {MAX_RADIUS_KM}."),
				));
			}
		}

		Ok(SearchQuery {
			page: self.page,
			size,
			city,
			city_prefix,
			name,
			property_type_id: filters.property_type_id,
			unit_type_id: filters.unit_type_id,
			price_ranges,
			min_rating: filters.min_rating,
			min_adults: filters.min_adults,
			min_children: filters.min_children,
			amenity_ids: filters.amenity_ids.into_iter().collect(),
			service_ids: filters.service_ids.into_iter().collect(),
			stay,
			dynamic_fields,
			geo: filters.geo,
			sort: self.sort.unwrap_or_default(),
		})
	}
}

/// Validated search. Field order is stable so the JSON encoding doubles as a cache key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchQuery {
	pub page: u32,
	pub size: u32,
	pub city: Option<String>,
	pub city_prefix: Option<String>,
	pub name: Option<String>,
	pub property_type_id: Option<Uuid>,
	pub unit_type_id: Option<Uuid>,
	pub price_ranges: Vec<(Currency, PriceRange)>,
	pub min_rating: Option<f64>,
	pub min_adults: Option<u32>,
	pub min_children: Option<u32>,
	pub amenity_ids: Vec<Uuid>,
	pub service_ids: Vec<Uuid>,
	pub stay: Option<Stay>,
	pub dynamic_fields: Vec<DynamicFieldFilter>,
	pub geo: Option<GeoFilter>,
	pub sort: SortKey,
}
impl SearchQuery {
	pub fn offset(&self) -> u64 {
		u64::from(self.page - 1) * u64::from(self.size)
	}

	pub fn total_pages(&self, total_count: u64) -> u64 {
		total_count.div_ceil(u64::from(self.size))
	}

	pub fn price_range(&self, currency: Currency) -> Option<&PriceRange> {
		self.price_ranges.iter().find(|(candidate, _)| *candidate == currency).map(|(_, range)| range)
	}

	pub fn applied_filters(&self) -> Vec<String> {
		let mut applied = Vec::new();

		for (name, present) in [
			("city", self.city.is_some()),
			("city_prefix", self.city_prefix.is_some()),
			("name", self.name.is_some()),
			("property_type_id", self.property_type_id.is_some()),
			("unit_type_id", self.unit_type_id.is_some()),
			("price_ranges", !self.price_ranges.is_empty()),
			("min_rating", self.min_rating.is_some()),
			("min_adults", self.min_adults.is_some()),
			("min_children", self.min_children.is_some()),
			("amenity_ids", !self.amenity_ids.is_empty()),
			("service_ids", !self.service_ids.is_empty()),
			("stay", self.stay.is_some()),
			("dynamic_fields", !self.dynamic_fields.is_empty()),
			("geo", self.geo.is_some()),
		] {
			if present {
				applied.push(name.to_string());
			}
		}

		applied
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchItem {
	pub unit: UnitDocument,
	pub distance_km: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchMeta {
	pub backend: String,
	pub applied_filters: Vec<String>,
	pub currencies: Vec<Currency>,
	pub nights: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
	pub items: Vec<SearchItem>,
	pub page: u32,
	pub size: u32,
	pub total_count: u64,
	pub total_pages: u64,
	pub meta: Option<SearchMeta>,
}

fn validate_price_range(currency: Currency, range: &PriceRange) -> Result<(), FilterError> {
	let path = format!("$.filters.price_ranges.{currency}");

	if range.min.is_none() && range.max.is_none() {
		return Err(FilterError::new(path, "price range needs at least one bound."));
	}

	for bound in [range.min, range.max].into_iter().flatten() {
		if !bound.is_finite() || bound < 0.0 {
			return Err(FilterError::new(path, "price bounds must be finite and non-negative."));
		}
	}

	if let (Some(min), Some(max)) = (range.min, range.max)
		&& min > max
	{
		return Err(FilterError::new(path, "price range minimum exceeds maximum."));
	}

	Ok(())
}

fn prefix_query(path: &str, raw: Option<&str>) -> Result<Option<String>, FilterError> {
	let Some(raw) = raw else {
		return Ok(None);
	};
	let normalized = text::normalize_prefix_query(raw);

	if normalized.is_empty() {
		return Err(FilterError::new(path, "prefix filter needs at least one letter or digit."));
	}
	if normalized.split(' ').any(|word| word.chars().count() > MAX_PREFIX_WORD_LEN) {
		return Err(FilterError::new(
			path,
			format!("prefix words may be at most {MAX_PREFIX_WORD_LEN} characters."),
		));
	}

	Ok(Some(normalized))
}

fn default_page() -> u32 {
	1
}
