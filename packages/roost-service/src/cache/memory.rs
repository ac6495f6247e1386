use std::time::{Duration, Instant};

use moka::{Expiry, future::Cache};
use serde_json::Value;

use crate::{
	BoxFuture, Error, Result,
	cache::{CacheStore, CacheUsage},
};

const DEFAULT_MAX_BYTES: u64 = 64 * 1024 * 1024;

#[derive(Clone)]
struct Entry {
	value: Value,
	size_bytes: u32,
	ttl: Duration,
}

/// Each entry lives for the TTL it was last written with.
struct EntryExpiry;
impl Expiry<String, Entry> for EntryExpiry {
	fn expire_after_create(&self, _key: &String, entry: &Entry, _created_at: Instant) -> Option<Duration> {
		Some(entry.ttl)
	}

	fn expire_after_update(
		&self,
		_key: &String,
		entry: &Entry,
		_updated_at: Instant,
		_duration_until_expiry: Option<Duration>,
	) -> Option<Duration> {
		Some(entry.ttl)
	}
}

/// Process-local store, bounded by the encoded size of its entries.
pub struct MemoryCacheStore {
	entries: Cache<String, Entry>,
}
impl MemoryCacheStore {
	pub fn new() -> Self {
		Self::with_max_bytes(DEFAULT_MAX_BYTES)
	}

	pub fn with_max_bytes(max_bytes: u64) -> Self {
		let entries = Cache::builder()
			.max_capacity(max_bytes)
			.weigher(|key: &String, entry: &Entry| {
				(key.len() as u32).saturating_add(entry.size_bytes)
			})
			.expire_after(EntryExpiry)
			.eviction_listener(|key, _entry, cause| {
				tracing::trace!(cache_key = %key, ?cause, "Cache entry evicted.");
			})
			.build();

		Self { entries }
	}
}
impl Default for MemoryCacheStore {
	fn default() -> Self {
		Self::new()
	}
}
impl CacheStore for MemoryCacheStore {
	fn name(&self) -> &'static str {
		"memory"
	}

	fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<Value>>> {
		Box::pin(async move { Ok(self.entries.get(key).await.map(|entry| entry.value)) })
	}

	fn set<'a>(&'a self, key: &'a str, value: Value, ttl: Duration) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			check_ttl(ttl)?;

			let size_bytes = u32::try_from(value.to_string().len()).unwrap_or(u32::MAX);

			self.entries.insert(key.to_string(), Entry { value, size_bytes, ttl }).await;

			Ok(())
		})
	}

	fn remove<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<bool>> {
		Box::pin(async move { Ok(self.entries.remove(key).await.is_some()) })
	}

	fn exists<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<bool>> {
		Box::pin(async move { Ok(self.entries.contains_key(key)) })
	}

	fn refresh<'a>(&'a self, key: &'a str, ttl: Duration) -> BoxFuture<'a, Result<bool>> {
		Box::pin(async move {
			check_ttl(ttl)?;

			let Some(entry) = self.entries.get(key).await else {
				return Ok(false);
			};

			// Re-inserting restarts the expiry clock with the new TTL.
			self.entries.insert(key.to_string(), Entry { ttl, ..entry }).await;

			Ok(true)
		})
	}

	fn remove_prefix<'a>(&'a self, prefix: &'a str) -> BoxFuture<'a, Result<u64>> {
		Box::pin(async move {
			let matching = self
				.entries
				.iter()
				.filter(|(key, _)| key.starts_with(prefix))
				.map(|(key, _)| key)
				.collect::<Vec<_>>();
			let mut removed = 0;

			for key in matching {
				if self.entries.remove(key.as_str()).await.is_some() {
					removed += 1;
				}
			}

			Ok(removed)
		})
	}

	fn flush(&self) -> BoxFuture<'_, Result<()>> {
		Box::pin(async move {
			self.entries.invalidate_all();
			self.entries.run_pending_tasks().await;

			Ok(())
		})
	}

	fn usage(&self) -> BoxFuture<'_, Result<CacheUsage>> {
		Box::pin(async move {
			self.entries.run_pending_tasks().await;

			Ok(CacheUsage {
				key_count: self.entries.entry_count(),
				memory_bytes: self.entries.weighted_size(),
			})
		})
	}
}

fn check_ttl(ttl: Duration) -> Result<()> {
	Instant::now()
		.checked_add(ttl)
		.map(|_| ())
		.ok_or_else(|| Error::Cache { message: format!("Cache TTL {ttl:?} is out of range.") })
}
