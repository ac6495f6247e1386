use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{currency::Currency, geo::GeoPoint};

/// Searchable projection of one bookable unit and the property it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitDocument {
	pub unit_id: Uuid,
	pub property_id: Uuid,
	pub property_type_id: Uuid,
	pub unit_type_id: Uuid,
	pub name: String,
	pub city: String,
	pub location: Option<GeoPoint>,
	pub max_adults: u32,
	pub max_children: u32,
	pub rating: f64,
	#[serde(default)]
	pub amenity_ids: BTreeSet<Uuid>,
	#[serde(default)]
	pub service_ids: BTreeSet<Uuid>,
	#[serde(default)]
	pub base_prices: BTreeMap<Currency, f64>,
	#[serde(default)]
	pub dynamic_fields: BTreeMap<String, String>,
}
impl UnitDocument {
	pub fn city_key(&self) -> String {
		normalize_city(&self.city)
	}
}

/// Cities compare case-insensitively with surrounding whitespace ignored.
pub fn normalize_city(raw: &str) -> String {
	raw.trim().to_lowercase()
}
