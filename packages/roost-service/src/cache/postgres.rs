use std::{sync::Arc, time::Duration};

use serde_json::Value;
use time::OffsetDateTime;

use roost_storage::{db::Db, queries};

use crate::{
	BoxFuture, Error, Result,
	cache::{CacheStore, CacheUsage},
};

/// Shared store backed by the `search_cache` table.
pub struct PostgresCacheStore {
	db: Arc<Db>,
}
impl PostgresCacheStore {
	pub fn new(db: Arc<Db>) -> Self {
		Self { db }
	}
}
impl CacheStore for PostgresCacheStore {
	fn name(&self) -> &'static str {
		"postgres"
	}

	fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<Value>>> {
		Box::pin(async move { Ok(queries::cache_get(&self.db, key, OffsetDateTime::now_utc()).await?) })
	}

	fn set<'a>(&'a self, key: &'a str, value: Value, ttl: Duration) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			let now = OffsetDateTime::now_utc();

			queries::cache_put(&self.db, key, &value, now, expiry(now, ttl)?).await?;

			Ok(())
		})
	}

	fn remove<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<bool>> {
		Box::pin(async move { Ok(queries::cache_delete(&self.db, key).await?) })
	}

	fn exists<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<bool>> {
		Box::pin(async move { Ok(queries::cache_exists(&self.db, key, OffsetDateTime::now_utc()).await?) })
	}

	fn refresh<'a>(&'a self, key: &'a str, ttl: Duration) -> BoxFuture<'a, Result<bool>> {
		Box::pin(async move {
			let now = OffsetDateTime::now_utc();

			Ok(queries::cache_touch(&self.db, key, now, expiry(now, ttl)?).await?)
		})
	}

	fn remove_prefix<'a>(&'a self, prefix: &'a str) -> BoxFuture<'a, Result<u64>> {
		Box::pin(async move { Ok(queries::cache_delete_prefix(&self.db, prefix).await?) })
	}

	fn flush(&self) -> BoxFuture<'_, Result<()>> {
		Box::pin(async move {
			queries::cache_clear(&self.db).await?;

			Ok(())
		})
	}

	fn usage(&self) -> BoxFuture<'_, Result<CacheUsage>> {
		Box::pin(async move {
			let usage = queries::cache_usage(&self.db, OffsetDateTime::now_utc()).await?;

			Ok(CacheUsage {
				key_count: u64::try_from(usage.entries).unwrap_or(0),
				memory_bytes: u64::try_from(usage.bytes).unwrap_or(0),
			})
		})
	}
}

fn expiry(now: OffsetDateTime, ttl: Duration) -> Result<OffsetDateTime> {
	time::Duration::try_from(ttl)
		.ok()
		.and_then(|ttl| now.checked_add(ttl))
		.ok_or_else(|| Error::Cache { message: format!("Cache TTL {ttl:?} is out of range.") })
}
