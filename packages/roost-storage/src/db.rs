use sqlx::{PgPool, postgres::PgPoolOptions};

use crate::{Result, schema};

const SCHEMA_LOCK_ID: i64 = 7_660_801;

pub struct Db {
	pub pool: PgPool,
}
impl Db {
	pub async fn connect(cfg: &roost_config::Postgres) -> Result<Self> {
		let pool =
			PgPoolOptions::new().max_connections(cfg.pool_max_conns).connect(&cfg.dsn).await?;

		Ok(Self { pool })
	}

	pub async fn ensure_schema(&self) -> Result<()> {
		self.execute_script(&schema::render_schema()).await
	}

	/// Runs every statement of `sql` in one transaction under the schema advisory lock.
	pub async fn execute_script(&self, sql: &str) -> Result<()> {
		// Advisory locks are held per connection. The transaction scopes the lock to one connection.
		let mut tx = self.pool.begin().await?;

		sqlx::query("SELECT pg_advisory_xact_lock($1)").bind(SCHEMA_LOCK_ID).execute(&mut *tx).await?;

		for statement in schema::statements(sql) {
			sqlx::query(statement).execute(&mut *tx).await?;
		}

		tx.commit().await?;

		Ok(())
	}
}
