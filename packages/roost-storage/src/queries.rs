use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
	Error, Result,
	db::Db,
	models::{CacheUsage, PropertyRecord, SchedulePeriodRow, UnitRecord, UnitRow},
};

/// Columns of [`UnitRow`], selected from `units u` joined with `properties p`.
pub const UNIT_COLUMNS: &str = "\
	u.unit_id,
	u.property_id,
	p.property_type_id,
	u.unit_type_id,
	u.name,
	p.city,
	p.latitude,
	p.longitude,
	u.max_adults,
	u.max_children,
	p.rating,
	array(SELECT ua.amenity_id FROM unit_amenities ua WHERE ua.unit_id = u.unit_id ORDER BY ua.amenity_id) AS amenity_ids,
	array(SELECT ps.service_id FROM property_services ps WHERE ps.property_id = u.property_id ORDER BY ps.service_id) AS service_ids,
	(SELECT coalesce(jsonb_object_agg(bp.currency, bp.amount), '{}'::jsonb) FROM unit_base_prices bp WHERE bp.unit_id = u.unit_id) AS base_prices,
	(SELECT coalesce(jsonb_object_agg(f.field_name, btrim(f.field_value)), '{}'::jsonb) FROM unit_field_values f WHERE f.unit_id = u.unit_id) AS dynamic_fields";
pub const UNIT_FROM: &str = "\
FROM units u
JOIN properties p ON p.property_id = u.property_id";

pub async fn load_unit(db: &Db, unit_id: Uuid) -> Result<Option<UnitRow>> {
	let sql = format!("SELECT\n{UNIT_COLUMNS}\n{UNIT_FROM}\nWHERE u.unit_id = $1");
	let row = sqlx::query_as::<_, UnitRow>(&sql).bind(unit_id).fetch_optional(&db.pool).await?;

	Ok(row)
}

pub async fn load_schedule(db: &Db, unit_id: Uuid) -> Result<Vec<SchedulePeriodRow>> {
	let rows = sqlx::query_as::<_, SchedulePeriodRow>(
		"\
SELECT unit_id, day, status, amount, currency, price_type
FROM schedule_periods
WHERE unit_id = $1
ORDER BY day",
	)
	.bind(unit_id)
	.fetch_all(&db.pool)
	.await?;

	Ok(rows)
}

pub async fn property_unit_ids(db: &Db, property_id: Uuid) -> Result<Vec<Uuid>> {
	let ids: Vec<Uuid> =
		sqlx::query_scalar("SELECT unit_id FROM units WHERE property_id = $1 ORDER BY unit_id")
			.bind(property_id)
			.fetch_all(&db.pool)
			.await?;

	Ok(ids)
}

pub async fn upsert_property(db: &Db, property: &PropertyRecord) -> Result<()> {
	sqlx::query(
		"\
INSERT INTO properties (
	property_id,
	property_type_id,
	name,
	city,
	latitude,
	longitude,
	rating
)
VALUES ($1, $2, $3, $4, $5, $6, $7)
ON CONFLICT (property_id) DO UPDATE
SET
	property_type_id = EXCLUDED.property_type_id,
	name = EXCLUDED.name,
	city = EXCLUDED.city,
	latitude = EXCLUDED.latitude,
	longitude = EXCLUDED.longitude,
	rating = EXCLUDED.rating,
	updated_at = now()",
	)
	.bind(property.property_id)
	.bind(property.property_type_id)
	.bind(property.name.as_str())
	.bind(property.city.as_str())
	.bind(property.latitude)
	.bind(property.longitude)
	.bind(property.rating)
	.execute(&db.pool)
	.await?;

	Ok(())
}

pub async fn upsert_unit(db: &Db, unit: &UnitRecord) -> Result<()> {
	if unit.max_adults < 0 || unit.max_children < 0 {
		return Err(Error::InvalidArgument(format!(
			"unit {} capacity must be zero or greater.",
			unit.unit_id
		)));
	}

	sqlx::query(
		"\
INSERT INTO units (unit_id, property_id, unit_type_id, name, max_adults, max_children)
VALUES ($1, $2, $3, $4, $5, $6)
ON CONFLICT (unit_id) DO UPDATE
SET
	property_id = EXCLUDED.property_id,
	unit_type_id = EXCLUDED.unit_type_id,
	name = EXCLUDED.name,
	max_adults = EXCLUDED.max_adults,
	max_children = EXCLUDED.max_children,
	updated_at = now()",
	)
	.bind(unit.unit_id)
	.bind(unit.property_id)
	.bind(unit.unit_type_id)
	.bind(unit.name.as_str())
	.bind(unit.max_adults)
	.bind(unit.max_children)
	.execute(&db.pool)
	.await?;

	Ok(())
}

pub async fn set_unit_base_price(db: &Db, unit_id: Uuid, currency: &str, amount: f64) -> Result<()> {
	sqlx::query(
		"\
INSERT INTO unit_base_prices (unit_id, currency, amount)
VALUES ($1, $2, $3)
ON CONFLICT (unit_id, currency) DO UPDATE SET amount = EXCLUDED.amount",
	)
	.bind(unit_id)
	.bind(currency)
	.bind(amount)
	.execute(&db.pool)
	.await?;

	Ok(())
}

pub async fn add_unit_amenity(db: &Db, unit_id: Uuid, amenity_id: Uuid) -> Result<()> {
	sqlx::query("INSERT INTO unit_amenities (unit_id, amenity_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
		.bind(unit_id)
		.bind(amenity_id)
		.execute(&db.pool)
		.await?;

	Ok(())
}

pub async fn add_property_service(db: &Db, property_id: Uuid, service_id: Uuid) -> Result<()> {
	sqlx::query(
		"INSERT INTO property_services (property_id, service_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
	)
	.bind(property_id)
	.bind(service_id)
	.execute(&db.pool)
	.await?;

	Ok(())
}

pub async fn set_unit_field_value(db: &Db, unit_id: Uuid, field_name: &str, value: &str) -> Result<()> {
	sqlx::query(
		"\
INSERT INTO unit_field_values (unit_id, field_name, field_value)
VALUES ($1, $2, $3)
ON CONFLICT (unit_id, field_name) DO UPDATE SET field_value = EXCLUDED.field_value",
	)
	.bind(unit_id)
	.bind(field_name)
	.bind(value)
	.execute(&db.pool)
	.await?;

	Ok(())
}

pub async fn upsert_schedule_period(db: &Db, period: &SchedulePeriodRow) -> Result<()> {
	sqlx::query(
		"\
INSERT INTO schedule_periods (unit_id, day, status, amount, currency, price_type)
VALUES ($1, $2, $3, $4, $5, $6)
ON CONFLICT (unit_id, day) DO UPDATE
SET
	status = EXCLUDED.status,
	amount = EXCLUDED.amount,
	currency = EXCLUDED.currency,
	price_type = EXCLUDED.price_type,
	updated_at = now()",
	)
	.bind(period.unit_id)
	.bind(period.day)
	.bind(period.status.as_str())
	.bind(period.amount)
	.bind(period.currency.as_str())
	.bind(period.price_type.as_str())
	.execute(&db.pool)
	.await?;

	Ok(())
}

pub async fn delete_unit(db: &Db, unit_id: Uuid) -> Result<bool> {
	let result = sqlx::query("DELETE FROM units WHERE unit_id = $1").bind(unit_id).execute(&db.pool).await?;

	Ok(result.rows_affected() > 0)
}

pub async fn delete_property(db: &Db, property_id: Uuid) -> Result<bool> {
	let result = sqlx::query("DELETE FROM properties WHERE property_id = $1")
		.bind(property_id)
		.execute(&db.pool)
		.await?;

	Ok(result.rows_affected() > 0)
}

pub async fn count_units(db: &Db) -> Result<i64> {
	Ok(sqlx::query_scalar("SELECT count(*) FROM units").fetch_one(&db.pool).await?)
}

pub async fn count_schedule_periods(db: &Db) -> Result<i64> {
	Ok(sqlx::query_scalar("SELECT count(*) FROM schedule_periods").fetch_one(&db.pool).await?)
}

pub async fn count_field_values(db: &Db) -> Result<i64> {
	Ok(sqlx::query_scalar("SELECT count(*) FROM unit_field_values").fetch_one(&db.pool).await?)
}

pub async fn clear_schedule_periods(db: &Db) -> Result<u64> {
	let result = sqlx::query("DELETE FROM schedule_periods").execute(&db.pool).await?;

	Ok(result.rows_affected())
}

pub async fn server_version(db: &Db) -> Result<String> {
	Ok(sqlx::query_scalar("SELECT current_setting('server_version')").fetch_one(&db.pool).await?)
}

/// Number of distinct routines from `names` installed in the database.
pub async fn installed_routine_count(db: &Db, names: &[&str]) -> Result<i64> {
	let count = sqlx::query_scalar(
		"SELECT count(DISTINCT proname) FROM pg_proc WHERE proname::text = ANY($1)",
	)
	.bind(names)
	.fetch_one(&db.pool)
	.await?;

	Ok(count)
}

pub async fn cache_get(db: &Db, key: &str, now: OffsetDateTime) -> Result<Option<Value>> {
	let payload = sqlx::query_scalar(
		"SELECT payload FROM search_cache WHERE cache_key = $1 AND expires_at > $2",
	)
	.bind(key)
	.bind(now)
	.fetch_optional(&db.pool)
	.await?;

	Ok(payload)
}

pub async fn cache_put(
	db: &Db,
	key: &str,
	payload: &Value,
	now: OffsetDateTime,
	expires_at: OffsetDateTime,
) -> Result<()> {
	sqlx::query(
		"\
INSERT INTO search_cache (cache_key, payload, created_at, expires_at)
VALUES ($1, $2, $3, $4)
ON CONFLICT (cache_key) DO UPDATE
SET
	payload = EXCLUDED.payload,
	created_at = EXCLUDED.created_at,
	expires_at = EXCLUDED.expires_at",
	)
	.bind(key)
	.bind(payload)
	.bind(now)
	.bind(expires_at)
	.execute(&db.pool)
	.await?;

	Ok(())
}

pub async fn cache_delete(db: &Db, key: &str) -> Result<bool> {
	let result =
		sqlx::query("DELETE FROM search_cache WHERE cache_key = $1").bind(key).execute(&db.pool).await?;

	Ok(result.rows_affected() > 0)
}

pub async fn cache_exists(db: &Db, key: &str, now: OffsetDateTime) -> Result<bool> {
	let exists = sqlx::query_scalar(
		"SELECT EXISTS (SELECT 1 FROM search_cache WHERE cache_key = $1 AND expires_at > $2)",
	)
	.bind(key)
	.bind(now)
	.fetch_one(&db.pool)
	.await?;

	Ok(exists)
}

/// Extends the expiry of a live entry. Returns false when the key is missing or expired.
pub async fn cache_touch(
	db: &Db,
	key: &str,
	now: OffsetDateTime,
	expires_at: OffsetDateTime,
) -> Result<bool> {
	let result = sqlx::query(
		"UPDATE search_cache SET expires_at = $1 WHERE cache_key = $2 AND expires_at > $3",
	)
	.bind(expires_at)
	.bind(key)
	.bind(now)
	.execute(&db.pool)
	.await?;

	Ok(result.rows_affected() > 0)
}

pub async fn cache_delete_prefix(db: &Db, prefix: &str) -> Result<u64> {
	let result = sqlx::query("DELETE FROM search_cache WHERE starts_with(cache_key, $1)")
		.bind(prefix)
		.execute(&db.pool)
		.await?;

	Ok(result.rows_affected())
}

pub async fn cache_clear(db: &Db) -> Result<u64> {
	let result = sqlx::query("DELETE FROM search_cache").execute(&db.pool).await?;

	Ok(result.rows_affected())
}

pub async fn cache_usage(db: &Db, now: OffsetDateTime) -> Result<CacheUsage> {
	let (entries, bytes): (i64, i64) = sqlx::query_as(
		"\
SELECT
	count(*),
	coalesce(sum(octet_length(cache_key) + pg_column_size(payload)), 0)::bigint
FROM search_cache
WHERE expires_at > $1",
	)
	.bind(now)
	.fetch_one(&db.pool)
	.await?;

	Ok(CacheUsage { entries, bytes })
}
