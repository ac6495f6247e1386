//! Search compiled to SQL over the source tables and the scalar routines installed by the
//! relational index lifecycle.

use std::sync::Arc;

use sqlx::{Postgres, QueryBuilder};

use roost_domain::{Currency, DynamicFieldFilter, SearchItem, SearchQuery, SortKey};
use roost_storage::{
	db::Db,
	models::UnitRow,
	queries::{UNIT_COLUMNS, UNIT_FROM},
};

use crate::{
	BoxFuture, Result,
	search::{SearchBackend, SearchPage},
	source,
};

#[derive(Debug, sqlx::FromRow)]
struct SearchRow {
	#[sqlx(flatten)]
	unit: UnitRow,
	distance_km: Option<f64>,
}

pub struct RelationalSearch {
	db: Arc<Db>,
}
impl RelationalSearch {
	pub fn new(db: Arc<Db>) -> Self {
		Self { db }
	}

	async fn run(&self, query: &SearchQuery) -> Result<SearchPage> {
		let total_count = count_query(query).build_query_scalar::<i64>().fetch_one(&self.db.pool).await?;
		let total_count = u64::try_from(total_count).unwrap_or_default();

		if total_count <= query.offset() {
			return Ok(SearchPage { items: Vec::new(), total_count });
		}

		let rows = page_query(query).build_query_as::<SearchRow>().fetch_all(&self.db.pool).await?;
		let mut items = Vec::with_capacity(rows.len());

		for row in rows {
			items.push(SearchItem { unit: source::unit_document(row.unit)?, distance_km: row.distance_km });
		}

		Ok(SearchPage { items, total_count })
	}
}
impl SearchBackend for RelationalSearch {
	fn name(&self) -> &'static str {
		"postgres"
	}

	fn search<'a>(&'a self, query: &'a SearchQuery) -> BoxFuture<'a, Result<SearchPage>> {
		Box::pin(self.run(query))
	}
}

fn count_query(query: &SearchQuery) -> QueryBuilder<'static, Postgres> {
	let mut builder = QueryBuilder::new(format!("SELECT count(*)\n{UNIT_FROM}\nWHERE TRUE"));

	push_filters(&mut builder, query);

	builder
}

fn page_query(query: &SearchQuery) -> QueryBuilder<'static, Postgres> {
	let mut builder = QueryBuilder::new(format!("SELECT\n{UNIT_COLUMNS},\n"));

	match query.geo.as_ref() {
		Some(geo) => {
			builder.push("roost_distance_km(");
			builder.push_bind(geo.center.lat);
			builder.push(", ");
			builder.push_bind(geo.center.lon);
			builder.push(", p.latitude, p.longitude) AS distance_km");
		},
		None => {
			builder.push("NULL::double precision AS distance_km");
		},
	}

	builder.push(format!("\n{UNIT_FROM}\nWHERE TRUE"));
	push_filters(&mut builder, query);
	builder.push(match query.sort {
		SortKey::RatingDesc => "\nORDER BY p.rating DESC, u.unit_id",
		SortKey::RatingAsc => "\nORDER BY p.rating ASC, u.unit_id",
		SortKey::CapacityDesc => "\nORDER BY u.max_adults DESC, u.unit_id",
	});
	builder.push("\nLIMIT ");
	builder.push_bind(i64::from(query.size));
	builder.push(" OFFSET ");
	builder.push_bind(i64::try_from(query.offset()).unwrap_or(i64::MAX));

	builder
}

fn push_filters(builder: &mut QueryBuilder<'static, Postgres>, query: &SearchQuery) {
	if let Some(city) = query.city.as_ref() {
		builder.push("\n\tAND lower(btrim(p.city)) = ");
		builder.push_bind(city.clone());
	}
	if let Some(prefix) = query.city_prefix.as_ref() {
		builder.push("\n\tAND roost_text_prefix_match(p.city, ");
		builder.push_bind(prefix.clone());
		builder.push(")");
	}
	if let Some(prefix) = query.name.as_ref() {
		builder.push("\n\tAND roost_text_prefix_match(u.name, ");
		builder.push_bind(prefix.clone());
		builder.push(")");
	}
	if let Some(id) = query.property_type_id {
		builder.push("\n\tAND p.property_type_id = ");
		builder.push_bind(id);
	}
	if let Some(id) = query.unit_type_id {
		builder.push("\n\tAND u.unit_type_id = ");
		builder.push_bind(id);
	}
	if let Some(min) = query.min_rating {
		builder.push("\n\tAND p.rating >= ");
		builder.push_bind(min);
	}
	if let Some(min) = query.min_adults {
		builder.push("\n\tAND u.max_adults >= ");
		builder.push_bind(i64::from(min));
	}
	if let Some(min) = query.min_children {
		builder.push("\n\tAND u.max_children >= ");
		builder.push_bind(i64::from(min));
	}
	if !query.amenity_ids.is_empty() {
		builder.push(
			"\n\tAND (SELECT count(*) FROM unit_amenities ua WHERE ua.unit_id = u.unit_id AND ua.amenity_id = ANY(",
		);
		builder.push_bind(query.amenity_ids.clone());
		builder.push(")) = ");
		builder.push_bind(query.amenity_ids.len() as i64);
	}
	if !query.service_ids.is_empty() {
		builder.push(
			"\n\tAND (SELECT count(*) FROM property_services ps WHERE ps.property_id = u.property_id AND ps.service_id = ANY(",
		);
		builder.push_bind(query.service_ids.clone());
		builder.push(")) = ");
		builder.push_bind(query.service_ids.len() as i64);
	}

	for filter in &query.dynamic_fields {
		match filter {
			DynamicFieldFilter::Exact { key, value } => {
				builder.push("\n\tAND roost_dynamic_fields_document(u.unit_id) ->> ");
				builder.push_bind(key.clone());
				builder.push(" = ");
				builder.push_bind(value.clone());
			},
			DynamicFieldFilter::Range { key, min, max } => {
				builder.push("\n\tAND roost_numeric_in_range(roost_dynamic_fields_document(u.unit_id) ->> ");
				builder.push_bind(key.clone());
				builder.push(", ");
				builder.push_bind(*min);
				builder.push(", ");
				builder.push_bind(*max);
				builder.push(")");
			},
		}
	}

	if let Some(stay) = query.stay {
		builder.push("\n\tAND roost_unit_available(u.unit_id, ");
		builder.push_bind(stay.check_in);
		builder.push(", ");
		builder.push_bind(stay.check_out);
		builder.push(")");
	}
	if !query.price_ranges.is_empty() {
		match query.stay {
			Some(stay) => {
				builder.push("\n\tAND roost_price_in_range(u.unit_id, ");
				builder.push_bind(stay.check_in);
				builder.push(", ");
				builder.push_bind(stay.check_out);
			},
			None => {
				builder.push("\n\tAND roost_any_price_in_range(u.unit_id");
			},
		}

		for currency in Currency::ALL {
			let range = query.price_range(currency);

			builder.push(", ");
			builder.push_bind(range.and_then(|range| range.min));
			builder.push(", ");
			builder.push_bind(range.and_then(|range| range.max));
		}

		builder.push(")");
	}

	if let Some(geo) = query.geo.as_ref() {
		builder.push(
			"\n\tAND p.latitude IS NOT NULL AND p.longitude IS NOT NULL AND roost_distance_km(",
		);
		builder.push_bind(geo.center.lat);
		builder.push(", ");
		builder.push_bind(geo.center.lon);
		builder.push(", p.latitude, p.longitude) <= ");
		builder.push_bind(geo.radius_km);
	}
}
