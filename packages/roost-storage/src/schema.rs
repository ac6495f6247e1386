//! Bundled SQL: the relational tables and the two sets of scalar search routines.

pub const UNITS_ROUTINES: &str = include_str!("../../../sql/routines/units.sql");
pub const SCHEDULE_ROUTINES: &str = include_str!("../../../sql/routines/schedule.sql");
pub const DROP_UNITS_ROUTINES: &str = include_str!("../../../sql/routines/drop_units.sql");
pub const DROP_SCHEDULE_ROUTINES: &str = include_str!("../../../sql/routines/drop_schedule.sql");
pub const UNITS_ROUTINE_NAMES: [&str; 5] = [
	"roost_numeric_in_range",
	"roost_distance_km",
	"roost_any_price_in_range",
	"roost_dynamic_fields_document",
	"roost_text_prefix_match",
];
pub const SCHEDULE_ROUTINE_NAMES: [&str; 2] = ["roost_unit_available", "roost_price_in_range"];

pub fn render_schema() -> String {
	expand_includes(include_str!("../../../sql/init.sql"))
}

/// Splits a script into executable statements. Routine bodies never contain `;`.
pub fn statements(sql: &str) -> impl Iterator<Item = &str> {
	sql.split(';').map(str::trim).filter(|statement| !statement.is_empty())
}

fn expand_includes(sql: &str) -> String {
	let mut out = String::new();

	for line in sql.lines() {
		let trimmed = line.trim();

		if let Some(path) = trimmed.strip_prefix("\\ir ") {
			match path.trim() {
				"tables/001_properties.sql" =>
					out.push_str(include_str!("../../../sql/tables/001_properties.sql")),
				"tables/002_units.sql" => out.push_str(include_str!("../../../sql/tables/002_units.sql")),
				"tables/003_unit_base_prices.sql" =>
					out.push_str(include_str!("../../../sql/tables/003_unit_base_prices.sql")),
				"tables/004_unit_amenities.sql" =>
					out.push_str(include_str!("../../../sql/tables/004_unit_amenities.sql")),
				"tables/005_property_services.sql" =>
					out.push_str(include_str!("../../../sql/tables/005_property_services.sql")),
				"tables/006_unit_field_values.sql" =>
					out.push_str(include_str!("../../../sql/tables/006_unit_field_values.sql")),
				"tables/007_schedule_periods.sql" =>
					out.push_str(include_str!("../../../sql/tables/007_schedule_periods.sql")),
				"tables/008_search_cache.sql" =>
					out.push_str(include_str!("../../../sql/tables/008_search_cache.sql")),
				_ => out.push_str(line),
			}
		} else {
			out.push_str(line);
		}

		out.push('\n');
	}

	out
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn schema_expands_every_table() {
		let schema = render_schema();

		assert!(!schema.contains("\\ir "));

		for table in [
			"properties",
			"units",
			"unit_base_prices",
			"unit_amenities",
			"property_services",
			"unit_field_values",
			"schedule_periods",
			"search_cache",
		] {
			assert!(
				schema.contains(&format!("CREATE TABLE IF NOT EXISTS {table} (")),
				"Missing table {table}."
			);
		}
	}

	#[test]
	fn routine_scripts_split_into_one_statement_per_routine() {
		assert_eq!(statements(UNITS_ROUTINES).count(), UNITS_ROUTINE_NAMES.len());
		assert_eq!(statements(SCHEDULE_ROUTINES).count(), SCHEDULE_ROUTINE_NAMES.len());
		assert_eq!(statements(DROP_UNITS_ROUTINES).count(), UNITS_ROUTINE_NAMES.len());
		assert_eq!(statements(DROP_SCHEDULE_ROUTINES).count(), SCHEDULE_ROUTINE_NAMES.len());

		for name in UNITS_ROUTINE_NAMES {
			assert!(UNITS_ROUTINES.contains(&format!("CREATE OR REPLACE FUNCTION {name}(")));
		}
		for name in SCHEDULE_ROUTINE_NAMES {
			assert!(SCHEDULE_ROUTINES.contains(&format!("CREATE OR REPLACE FUNCTION {name}(")));
		}
	}
}
