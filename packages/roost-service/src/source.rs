//! Read access to the relational source of truth that the index mirrors.

use std::{
	collections::{BTreeMap, BTreeSet},
	sync::Arc,
};

use serde_json::Value;
use uuid::Uuid;

use roost_domain::{Currency, GeoPoint, ScheduleEntry, ScheduleStatus, UnitDocument};
use roost_storage::{
	db::Db,
	models::{SchedulePeriodRow, UnitRow},
	queries,
};

use crate::{BoxFuture, Error, Result};

pub trait InventorySource
where
	Self: Send + Sync,
{
	fn load_unit(&self, unit_id: Uuid) -> BoxFuture<'_, Result<Option<UnitDocument>>>;

	fn load_schedule(&self, unit_id: Uuid) -> BoxFuture<'_, Result<Vec<ScheduleEntry>>>;

	fn property_unit_ids(&self, property_id: Uuid) -> BoxFuture<'_, Result<Vec<Uuid>>>;
}

pub struct PgInventory {
	db: Arc<Db>,
}
impl PgInventory {
	pub fn new(db: Arc<Db>) -> Self {
		Self { db }
	}
}
impl InventorySource for PgInventory {
	fn load_unit(&self, unit_id: Uuid) -> BoxFuture<'_, Result<Option<UnitDocument>>> {
		Box::pin(async move { queries::load_unit(&self.db, unit_id).await?.map(unit_document).transpose() })
	}

	fn load_schedule(&self, unit_id: Uuid) -> BoxFuture<'_, Result<Vec<ScheduleEntry>>> {
		Box::pin(async move {
			queries::load_schedule(&self.db, unit_id).await?.into_iter().map(schedule_entry).collect()
		})
	}

	fn property_unit_ids(&self, property_id: Uuid) -> BoxFuture<'_, Result<Vec<Uuid>>> {
		Box::pin(async move { Ok(queries::property_unit_ids(&self.db, property_id).await?) })
	}
}

pub fn unit_document(row: UnitRow) -> Result<UnitDocument> {
	let location = match (row.latitude, row.longitude) {
		(Some(lat), Some(lon)) => Some(GeoPoint { lat, lon }),
		_ => None,
	};
	let mut base_prices = BTreeMap::new();

	if let Value::Object(prices) = row.base_prices {
		for (code, amount) in prices {
			let currency = parse_currency(&code)?;
			let amount = amount.as_f64().ok_or_else(|| Error::Storage {
				message: format!("Base price {code} of unit {} is not a number.", row.unit_id),
			})?;

			base_prices.insert(currency, amount);
		}
	}

	let dynamic_fields = match row.dynamic_fields {
		Value::Object(fields) => fields
			.into_iter()
			.filter_map(|(key, value)| match value {
				Value::String(text) => Some((key, text)),
				Value::Null => None,
				other => Some((key, other.to_string())),
			})
			.collect(),
		_ => BTreeMap::new(),
	};

	Ok(UnitDocument {
		unit_id: row.unit_id,
		property_id: row.property_id,
		property_type_id: row.property_type_id,
		unit_type_id: row.unit_type_id,
		name: row.name,
		city: row.city,
		location,
		max_adults: u32::try_from(row.max_adults).unwrap_or(0),
		max_children: u32::try_from(row.max_children).unwrap_or(0),
		rating: row.rating,
		amenity_ids: row.amenity_ids.into_iter().collect::<BTreeSet<_>>(),
		service_ids: row.service_ids.into_iter().collect::<BTreeSet<_>>(),
		base_prices,
		dynamic_fields,
	})
}

pub fn schedule_entry(row: SchedulePeriodRow) -> Result<ScheduleEntry> {
	Ok(ScheduleEntry {
		unit_id: row.unit_id,
		date: row.day,
		status: ScheduleStatus::parse(&row.status),
		amount: row.amount,
		currency: parse_currency(&row.currency)?,
		price_type: row.price_type,
	})
}

fn parse_currency(code: &str) -> Result<Currency> {
	Currency::parse(code)
		.ok_or_else(|| Error::Storage { message: format!("Unsupported currency code {code:?}.") })
}
