use serde_json::Value;
use time::Date;
use uuid::Uuid;

/// Relational projection of one unit joined with its property.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UnitRow {
	pub unit_id: Uuid,
	pub property_id: Uuid,
	pub property_type_id: Uuid,
	pub unit_type_id: Uuid,
	pub name: String,
	pub city: String,
	pub latitude: Option<f64>,
	pub longitude: Option<f64>,
	pub max_adults: i32,
	pub max_children: i32,
	pub rating: f64,
	pub amenity_ids: Vec<Uuid>,
	pub service_ids: Vec<Uuid>,
	/// `{ "<CCY>": amount }`.
	pub base_prices: Value,
	/// `{ "<field name>": "<value>" }`.
	pub dynamic_fields: Value,
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct SchedulePeriodRow {
	pub unit_id: Uuid,
	pub day: Date,
	pub status: String,
	pub amount: f64,
	pub currency: String,
	pub price_type: String,
}

#[derive(Debug, Clone)]
pub struct PropertyRecord {
	pub property_id: Uuid,
	pub property_type_id: Uuid,
	pub name: String,
	pub city: String,
	pub latitude: Option<f64>,
	pub longitude: Option<f64>,
	pub rating: f64,
}

#[derive(Debug, Clone)]
pub struct UnitRecord {
	pub unit_id: Uuid,
	pub property_id: Uuid,
	pub unit_type_id: Uuid,
	pub name: String,
	pub max_adults: i32,
	pub max_children: i32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheUsage {
	pub entries: i64,
	pub bytes: i64,
}
