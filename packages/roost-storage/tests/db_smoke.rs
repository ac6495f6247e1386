use time::{Date, macros::date};
use uuid::Uuid;

use roost_storage::{
	db::Db,
	models::{PropertyRecord, SchedulePeriodRow, UnitRecord},
	queries, schema,
};
use roost_testkit::{Error, Result, TestDatabase};

fn storage(err: roost_storage::Error) -> Error {
	Error::Message(err.to_string())
}

fn period(unit_id: Uuid, day: Date, status: &str) -> SchedulePeriodRow {
	SchedulePeriodRow {
		unit_id,
		day,
		status: status.to_string(),
		amount: 120.0,
		currency: "USD".to_string(),
		price_type: "nightly".to_string(),
	}
}

async fn seed_unit(db: &Db) -> Result<Uuid> {
	let property_id = Uuid::new_v4();
	let unit_id = Uuid::new_v4();

	queries::upsert_property(
		db,
		&PropertyRecord {
			property_id,
			property_type_id: Uuid::new_v4(),
			name: "Gold Mohur".to_string(),
			city: "Aden".to_string(),
			latitude: None,
			longitude: None,
			rating: 4.2,
		},
	)
	.await
	.map_err(storage)?;
	queries::upsert_unit(
		db,
		&UnitRecord {
			unit_id,
			property_id,
			unit_type_id: Uuid::new_v4(),
			name: "Sea room".to_string(),
			max_adults: 2,
			max_children: 0,
		},
	)
	.await
	.map_err(storage)?;

	Ok(unit_id)
}

async fn unit_available(db: &Db, unit_id: Uuid, check_in: Date, check_out: Date) -> Result<bool> {
	let available = sqlx::query_scalar::<_, bool>("SELECT roost_unit_available($1, $2, $3)")
		.bind(unit_id)
		.bind(check_in)
		.bind(check_out)
		.fetch_one(&db.pool)
		.await?;

	Ok(available)
}

async fn connect(dsn: String) -> Result<Db> {
	let db = Db::connect(&roost_config::Postgres { dsn, pool_max_conns: 2 }).await.map_err(storage)?;

	db.ensure_schema().await.map_err(storage)?;

	Ok(db)
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set ROOST_PG_DSN to run."]
async fn schema_bootstrap_is_repeatable() {
	let Some(dsn) = roost_testkit::env_dsn() else {
		eprintln!("Skipping schema_bootstrap_is_repeatable; set ROOST_PG_DSN to run this test.");

		return;
	};

	roost_testkit::with_test_db(&dsn, |test_db: &TestDatabase| {
		let dsn = test_db.dsn().to_string();

		async move {
			let db = connect(dsn).await?;

			db.ensure_schema().await.map_err(storage)?;
			db.execute_script(schema::UNITS_ROUTINES).await.map_err(storage)?;
			db.execute_script(schema::SCHEDULE_ROUTINES).await.map_err(storage)?;

			let installed = queries::installed_routine_count(
				&db,
				&[schema::UNITS_ROUTINE_NAMES.as_slice(), schema::SCHEDULE_ROUTINE_NAMES.as_slice()]
					.concat(),
			)
			.await
			.map_err(storage)?;

			assert_eq!(installed, 7);

			db.execute_script(schema::DROP_SCHEDULE_ROUTINES).await.map_err(storage)?;
			db.execute_script(schema::DROP_UNITS_ROUTINES).await.map_err(storage)?;

			Ok(())
		}
	})
	.await
	.expect("Schema bootstrap failed.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set ROOST_PG_DSN to run."]
async fn unit_projection_and_cascade() {
	let Some(dsn) = roost_testkit::env_dsn() else {
		eprintln!("Skipping unit_projection_and_cascade; set ROOST_PG_DSN to run this test.");

		return;
	};

	roost_testkit::with_test_db(&dsn, |test_db: &TestDatabase| {
		let dsn = test_db.dsn().to_string();

		async move {
			let db = connect(dsn).await?;
			let property_id = Uuid::new_v4();
			let unit_id = Uuid::new_v4();
			let amenity_id = Uuid::new_v4();

			queries::upsert_property(
				&db,
				&PropertyRecord {
					property_id,
					property_type_id: Uuid::new_v4(),
					name: "Crater Inn".to_string(),
					city: "Aden".to_string(),
					latitude: None,
					longitude: None,
					rating: 3.9,
				},
			)
			.await
			.map_err(storage)?;
			queries::upsert_unit(
				&db,
				&UnitRecord {
					unit_id,
					property_id,
					unit_type_id: Uuid::new_v4(),
					name: "Twin room".to_string(),
					max_adults: 2,
					max_children: 0,
				},
			)
			.await
			.map_err(storage)?;
			queries::add_unit_amenity(&db, unit_id, amenity_id).await.map_err(storage)?;
			queries::set_unit_base_price(&db, unit_id, "SAR", 300.0).await.map_err(storage)?;
			queries::set_unit_field_value(&db, unit_id, "floor", " 3 ").await.map_err(storage)?;
			queries::upsert_schedule_period(
				&db,
				&SchedulePeriodRow {
					unit_id,
					day: date!(2026 - 08 - 01),
					status: "blocked".to_string(),
					amount: 300.0,
					currency: "SAR".to_string(),
					price_type: "nightly".to_string(),
				},
			)
			.await
			.map_err(storage)?;

			let row = queries::load_unit(&db, unit_id)
				.await
				.map_err(storage)?
				.ok_or_else(|| Error::Message("Unit projection is missing.".to_string()))?;

			assert_eq!(row.amenity_ids, vec![amenity_id]);
			assert_eq!(row.base_prices.get("SAR").and_then(serde_json::Value::as_f64), Some(300.0));
			assert_eq!(row.dynamic_fields, serde_json::json!({ "floor": "3" }));
			assert_eq!(queries::load_schedule(&db, unit_id).await.map_err(storage)?.len(), 1);
			assert_eq!(queries::property_unit_ids(&db, property_id).await.map_err(storage)?, vec![unit_id]);

			assert!(queries::delete_property(&db, property_id).await.map_err(storage)?);
			assert_eq!(queries::count_units(&db).await.map_err(storage)?, 0);
			assert_eq!(queries::count_schedule_periods(&db).await.map_err(storage)?, 0);

			Ok(())
		}
	})
	.await
	.expect("Unit projection scenario failed.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set ROOST_PG_DSN to run."]
async fn availability_routine_ignores_status_case_and_padding() {
	let Some(dsn) = roost_testkit::env_dsn() else {
		eprintln!("Skipping availability_routine_ignores_status_case_and_padding; set ROOST_PG_DSN to run this test.");

		return;
	};

	roost_testkit::with_test_db(&dsn, |test_db: &TestDatabase| {
		let dsn = test_db.dsn().to_string();

		async move {
			let db = connect(dsn).await?;
			db.execute_script(schema::SCHEDULE_ROUTINES).await.map_err(storage)?;

			let unit_id = seed_unit(&db).await?;
			let d1 = date!(2026 - 05 - 01);
			let d2 = date!(2026 - 05 - 02);
			let d3 = date!(2026 - 05 - 03);

			for row in [period(unit_id, d1, "Available"), period(unit_id, d2, " AVAILABLE ")] {
				queries::upsert_schedule_period(&db, &row).await.map_err(storage)?;
			}

			assert!(unit_available(&db, unit_id, d1, d3).await?);

			queries::upsert_schedule_period(&db, &period(unit_id, d2, "Booked")).await.map_err(storage)?;

			assert!(!unit_available(&db, unit_id, d1, d3).await?);
			assert!(unit_available(&db, unit_id, d1, d2).await?);

			Ok(())
		}
	})
	.await
	.expect("Availability routine scenario failed.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set ROOST_PG_DSN to run."]
async fn negative_capacity_is_rejected_before_the_database() {
	let Some(dsn) = roost_testkit::env_dsn() else {
		eprintln!("Skipping negative_capacity_is_rejected_before_the_database; set ROOST_PG_DSN to run this test.");

		return;
	};

	roost_testkit::with_test_db(&dsn, |test_db: &TestDatabase| {
		let dsn = test_db.dsn().to_string();

		async move {
			let db = connect(dsn).await?;
			let result = queries::upsert_unit(
				&db,
				&UnitRecord {
					unit_id: Uuid::new_v4(),
					property_id: Uuid::new_v4(),
					unit_type_id: Uuid::new_v4(),
					name: "Broken".to_string(),
					max_adults: -1,
					max_children: 0,
				},
			)
			.await;

			assert!(matches!(result, Err(roost_storage::Error::InvalidArgument(_))));

			Ok(())
		}
	})
	.await
	.expect("Capacity validation scenario failed.");
}
