//! Mapping between domain documents and Qdrant points.

use std::collections::HashMap;

use qdrant_client::{
	Payload,
	qdrant::{PointId, Value as QdrantValue, point_id::PointIdOptions, value::Kind},
};
use serde_json::{Map, Number, Value};
use time::Date;
use uuid::Uuid;

use roost_domain::{Currency, ScheduleEntry, UnitDocument, date_serde};

use crate::{Error, Result};

pub const DYNAMIC_FIELD_PREFIX: &str = "dyn";
pub const DYNAMIC_NUMERIC_PREFIX: &str = "dyn_num";

pub fn price_field(currency: Currency) -> String {
	format!("price_{}", currency.as_str().to_ascii_lowercase())
}

pub fn dynamic_field(key: &str) -> String {
	format!("{DYNAMIC_FIELD_PREFIX}.{key}")
}

pub fn dynamic_numeric_field(key: &str) -> String {
	format!("{DYNAMIC_NUMERIC_PREFIX}.{key}")
}

/// Julian day number; schedule range filters compare integers.
pub fn day_number(date: Date) -> i64 {
	i64::from(date.to_julian_day())
}

/// Rewriting the same unit and date always lands on the same point.
pub fn schedule_point_id(unit_id: Uuid, date: Date) -> Uuid {
	Uuid::new_v5(&unit_id, date_serde::format(date).as_bytes())
}

pub fn point_uuid(point_id: &PointId) -> Option<Uuid> {
	match point_id.point_id_options.as_ref() {
		Some(PointIdOptions::Uuid(id)) => Uuid::parse_str(id).ok(),
		_ => None,
	}
}

pub fn unit_payload(unit: &UnitDocument) -> Payload {
	let mut payload = Payload::new();

	payload.insert("unit_id", unit.unit_id.to_string());
	payload.insert("property_id", unit.property_id.to_string());
	payload.insert("property_type_id", unit.property_type_id.to_string());
	payload.insert("unit_type_id", unit.unit_type_id.to_string());
	payload.insert("name", unit.name.clone());
	payload.insert("city", unit.city_key());
	payload.insert("city_text", unit.city.clone());
	payload.insert("max_adults", Value::from(unit.max_adults));
	payload.insert("max_children", Value::from(unit.max_children));
	payload.insert("rating", Value::from(unit.rating));
	payload.insert(
		"amenity_ids",
		Value::Array(unit.amenity_ids.iter().map(|id| Value::String(id.to_string())).collect()),
	);
	payload.insert(
		"service_ids",
		Value::Array(unit.service_ids.iter().map(|id| Value::String(id.to_string())).collect()),
	);

	if let Some(location) = unit.location {
		payload.insert("location", serde_json::json!({ "lat": location.lat, "lon": location.lon }));
	}

	for (currency, amount) in &unit.base_prices {
		payload.insert(price_field(*currency).as_str(), Value::from(*amount));
	}

	let mut dynamic = Map::new();
	let mut numeric = Map::new();

	for (key, raw) in &unit.dynamic_fields {
		let value = raw.trim();

		dynamic.insert(key.clone(), Value::String(value.to_string()));

		if let Some(number) =
			roost_domain::dynamic_field::parse_number(value).and_then(Number::from_f64)
		{
			numeric.insert(key.clone(), Value::Number(number));
		}
	}

	payload.insert(DYNAMIC_FIELD_PREFIX, Value::Object(dynamic));
	payload.insert(DYNAMIC_NUMERIC_PREFIX, Value::Object(numeric));

	payload
}

pub fn schedule_payload(entry: &ScheduleEntry, property_id: Uuid) -> Payload {
	let mut payload = Payload::new();

	payload.insert("unit_id", entry.unit_id.to_string());
	payload.insert("property_id", property_id.to_string());
	payload.insert("day", Value::from(day_number(entry.date)));
	payload.insert("date", date_serde::format(entry.date));
	payload.insert("status", entry.status.as_str().to_string());
	payload.insert("amount", Value::from(entry.amount));
	payload.insert("currency", entry.currency.as_str());
	payload.insert("price_type", entry.price_type.clone());

	payload
}

/// Rebuilds the unit document stored by [`unit_payload`].
pub fn unit_from_payload(payload: &HashMap<String, QdrantValue>) -> Result<UnitDocument> {
	let field = |name: &str| payload.get(name).map(to_json).unwrap_or(Value::Null);
	let mut base_prices = Map::new();

	for currency in Currency::ALL {
		if let Some(amount) = payload.get(&price_field(currency)).map(to_json)
			&& amount.is_number()
		{
			base_prices.insert(currency.as_str().to_string(), amount);
		}
	}

	let document = serde_json::json!({
		"unit_id": field("unit_id"),
		"property_id": field("property_id"),
		"property_type_id": field("property_type_id"),
		"unit_type_id": field("unit_type_id"),
		"name": field("name"),
		"city": field("city_text"),
		"location": field("location"),
		"max_adults": field("max_adults"),
		"max_children": field("max_children"),
		"rating": field("rating"),
		"amenity_ids": field("amenity_ids"),
		"service_ids": field("service_ids"),
		"base_prices": base_prices,
		"dynamic_fields": object_or_empty(field(DYNAMIC_FIELD_PREFIX)),
	});

	serde_json::from_value(document)
		.map_err(|err| Error::Qdrant { message: format!("Malformed unit payload: {err}.") })
}

pub fn payload_uuid(payload: &HashMap<String, QdrantValue>, name: &str) -> Option<Uuid> {
	match payload.get(name).and_then(|value| value.kind.as_ref()) {
		Some(Kind::StringValue(raw)) => Uuid::parse_str(raw).ok(),
		_ => None,
	}
}

fn object_or_empty(value: Value) -> Value {
	if value.is_object() { value } else { Value::Object(Map::new()) }
}

fn to_json(value: &QdrantValue) -> Value {
	match value.kind.as_ref() {
		None | Some(Kind::NullValue(_)) => Value::Null,
		Some(Kind::BoolValue(flag)) => Value::Bool(*flag),
		Some(Kind::IntegerValue(number)) => Value::from(*number),
		Some(Kind::DoubleValue(number)) =>
			Number::from_f64(*number).map(Value::Number).unwrap_or(Value::Null),
		Some(Kind::StringValue(text)) => Value::String(text.clone()),
		Some(Kind::ListValue(list)) => Value::Array(list.values.iter().map(to_json).collect()),
		Some(Kind::StructValue(object)) => Value::Object(
			object.fields.iter().map(|(key, value)| (key.clone(), to_json(value))).collect(),
		),
	}
}

#[cfg(test)]
mod tests {
	use std::collections::{BTreeMap, BTreeSet};

	use time::macros::date;

	use roost_domain::{GeoPoint, ScheduleStatus};

	use super::*;

	fn sample_unit() -> UnitDocument {
		UnitDocument {
			unit_id: Uuid::new_v4(),
			property_id: Uuid::new_v4(),
			property_type_id: Uuid::new_v4(),
			unit_type_id: Uuid::new_v4(),
			name: "Crater View".to_string(),
			city: "Aden".to_string(),
			location: Some(GeoPoint { lat: 12.79, lon: 45.03 }),
			max_adults: 4,
			max_children: 2,
			rating: 4.5,
			amenity_ids: BTreeSet::from([Uuid::new_v4(), Uuid::new_v4()]),
			service_ids: BTreeSet::new(),
			base_prices: BTreeMap::from([(Currency::Yer, 20_000.0), (Currency::Usd, 80.0)]),
			dynamic_fields: BTreeMap::from([
				("bedrooms".to_string(), " 3 ".to_string()),
				("view".to_string(), "sea".to_string()),
			]),
		}
	}

	#[test]
	fn unit_payload_splits_searchable_fields() {
		let unit = sample_unit();
		let payload: HashMap<String, QdrantValue> = unit_payload(&unit).into();

		assert_eq!(payload.get("city").map(to_json), Some(Value::from("aden")));
		assert_eq!(payload.get("price_yer").map(to_json), Some(Value::from(20_000.0)));
		assert!(payload.get("price_eur").is_none());

		let numeric = payload.get("dyn_num").map(to_json).expect("Numeric fields must exist.");

		assert_eq!(numeric, serde_json::json!({ "bedrooms": 3.0 }));
	}

	#[test]
	fn unit_payload_reads_back_into_the_same_document() {
		let unit = sample_unit();
		let payload: HashMap<String, QdrantValue> = unit_payload(&unit).into();
		let decoded = unit_from_payload(&payload).expect("Payload must decode.");

		assert_eq!(decoded.city, "Aden");
		assert_eq!(decoded.amenity_ids, unit.amenity_ids);
		assert_eq!(decoded.base_prices, unit.base_prices);
		assert_eq!(decoded.dynamic_fields.get("bedrooms").map(String::as_str), Some("3"));
		assert_eq!(decoded.location, unit.location);
	}

	#[test]
	fn schedule_point_ids_are_stable_per_unit_and_day() {
		let unit_id = Uuid::new_v4();
		let day = date!(2026 - 07 - 14);

		assert_eq!(schedule_point_id(unit_id, day), schedule_point_id(unit_id, day));
		assert_ne!(schedule_point_id(unit_id, day), schedule_point_id(unit_id, date!(2026 - 07 - 15)));
		assert_ne!(schedule_point_id(unit_id, day), schedule_point_id(Uuid::new_v4(), day));
	}

	#[test]
	fn schedule_payload_uses_day_numbers() {
		let entry = ScheduleEntry {
			unit_id: Uuid::new_v4(),
			date: date!(2026 - 01 - 02),
			status: ScheduleStatus::Booked,
			amount: 90.0,
			currency: Currency::Usd,
			price_type: "nightly".to_string(),
		};
		let payload: HashMap<String, QdrantValue> = schedule_payload(&entry, Uuid::new_v4()).into();
		let day = payload.get("day").map(to_json).and_then(|value| value.as_i64());

		assert_eq!(day, Some(day_number(date!(2026 - 01 - 01)) + 1));
		assert_eq!(payload.get("status").map(to_json), Some(Value::from("booked")));
	}
}
