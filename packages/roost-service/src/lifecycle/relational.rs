use std::sync::Arc;

use roost_storage::{db::Db, queries, schema};

use crate::{
	BoxFuture, Result,
	lifecycle::{IndexInfo, IndexKind, IndexLifecycle},
};

/// The relational "indexes" are the scalar routines the search queries call inline.
pub struct RelationalLifecycle {
	db: Arc<Db>,
}
impl RelationalLifecycle {
	pub fn new(db: Arc<Db>) -> Self {
		Self { db }
	}

	async fn exists(&self, kind: IndexKind) -> Result<bool> {
		let names = routine_names(kind);
		let installed = queries::installed_routine_count(&self.db, names).await?;

		Ok(installed == names.len() as i64)
	}

	async fn drop(&self, kind: IndexKind, delete_documents: bool) -> Result<()> {
		let script = match kind {
			IndexKind::Units => schema::DROP_UNITS_ROUTINES,
			IndexKind::Schedule => schema::DROP_SCHEDULE_ROUTINES,
		};

		self.db.execute_script(script).await?;

		// Units and properties are the source of truth and are never removed here.
		if delete_documents && kind == IndexKind::Schedule {
			let removed = queries::clear_schedule_periods(&self.db).await?;

			tracing::warn!(removed, "Schedule rows deleted with the schedule routines.");
		}

		Ok(())
	}

	async fn info(&self, kind: IndexKind) -> Result<IndexInfo> {
		let name = format!("routines:{}", kind.as_str());

		if !self.exists(kind).await? {
			return Ok(IndexInfo::missing(kind, name));
		}

		let (document_count, record_count, term_count) = match kind {
			IndexKind::Units => {
				let units = queries::count_units(&self.db).await?;

				(units, units, queries::count_field_values(&self.db).await?)
			},
			IndexKind::Schedule => {
				let rows = queries::count_schedule_periods(&self.db).await?;

				(rows, rows, 0)
			},
		};

		Ok(IndexInfo {
			kind,
			name,
			exists: true,
			document_count: to_count(document_count),
			record_count: to_count(record_count),
			term_count: to_count(term_count),
			indexing: false,
		})
	}
}
impl IndexLifecycle for RelationalLifecycle {
	fn backend_name(&self) -> &'static str {
		"postgres"
	}

	fn index_exists(&self, kind: IndexKind) -> BoxFuture<'_, Result<bool>> {
		Box::pin(self.exists(kind))
	}

	fn create_index(&self, kind: IndexKind) -> BoxFuture<'_, Result<()>> {
		Box::pin(async move {
			let script = match kind {
				IndexKind::Units => schema::UNITS_ROUTINES,
				IndexKind::Schedule => schema::SCHEDULE_ROUTINES,
			};

			self.db.execute_script(script).await?;

			Ok(())
		})
	}

	fn drop_index(&self, kind: IndexKind, delete_documents: bool) -> BoxFuture<'_, Result<()>> {
		Box::pin(self.drop(kind, delete_documents))
	}

	fn index_info(&self, kind: IndexKind) -> BoxFuture<'_, Result<IndexInfo>> {
		Box::pin(self.info(kind))
	}

	fn backend_info(&self) -> BoxFuture<'_, Result<String>> {
		Box::pin(async move { Ok(format!("PostgreSQL {}", queries::server_version(&self.db).await?)) })
	}
}

fn routine_names(kind: IndexKind) -> &'static [&'static str] {
	match kind {
		IndexKind::Units => &schema::UNITS_ROUTINE_NAMES,
		IndexKind::Schedule => &schema::SCHEDULE_ROUTINE_NAMES,
	}
}

fn to_count(value: i64) -> u64 {
	u64::try_from(value).unwrap_or(0)
}
