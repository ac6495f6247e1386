//! Read-through cache with single-flight fills over a pluggable store.

pub mod memory;
pub mod postgres;

pub use memory::MemoryCacheStore;
pub use postgres::PostgresCacheStore;

use std::{
	future::Future,
	sync::{
		Mutex,
		atomic::{AtomicU64, Ordering},
	},
	time::Duration,
};

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{BoxFuture, Error, Result};

const PROBE_KEY_PREFIX: &str = "health:probe:";
const PROBE_TTL: Duration = Duration::from_secs(30);

pub trait CacheStore
where
	Self: Send + Sync,
{
	fn name(&self) -> &'static str;

	fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<Value>>>;

	fn set<'a>(&'a self, key: &'a str, value: Value, ttl: Duration) -> BoxFuture<'a, Result<()>>;

	fn remove<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<bool>>;

	fn exists<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<bool>>;

	/// Resets the expiry of a live entry. Returns false when the key is absent.
	fn refresh<'a>(&'a self, key: &'a str, ttl: Duration) -> BoxFuture<'a, Result<bool>>;

	fn remove_prefix<'a>(&'a self, prefix: &'a str) -> BoxFuture<'a, Result<u64>>;

	fn flush(&self) -> BoxFuture<'_, Result<()>>;

	fn usage(&self) -> BoxFuture<'_, Result<CacheUsage>>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheUsage {
	pub key_count: u64,
	pub memory_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStatistics {
	pub store: String,
	pub hits: u64,
	pub misses: u64,
	pub hit_rate: f64,
	pub key_count: u64,
	pub memory_bytes: u64,
	#[serde(with = "time::serde::rfc3339::option")]
	pub last_flush_at: Option<OffsetDateTime>,
}

pub struct Cache {
	store: Box<dyn CacheStore>,
	hits: AtomicU64,
	misses: AtomicU64,
	last_flush_at: Mutex<Option<OffsetDateTime>>,
	// One gate for every key; fills for unrelated keys also serialize.
	fill_gate: tokio::sync::Mutex<()>,
}
impl Cache {
	pub fn new(store: impl CacheStore + 'static) -> Self {
		Self::from_boxed(Box::new(store))
	}

	pub fn from_boxed(store: Box<dyn CacheStore>) -> Self {
		Self {
			store,
			hits: AtomicU64::new(0),
			misses: AtomicU64::new(0),
			last_flush_at: Mutex::new(None),
			fill_gate: tokio::sync::Mutex::new(()),
		}
	}

	pub fn store_name(&self) -> &'static str {
		self.store.name()
	}

	pub async fn get(&self, key: &str) -> Option<Value> {
		let value = match self.store.get(key).await {
			Ok(value) => value,
			Err(err) => {
				tracing::warn!(error = %err, cache_key = key, store = self.store.name(), "Cache read failed.");

				None
			},
		};
		let counter = if value.is_some() { &self.hits } else { &self.misses };

		counter.fetch_add(1, Ordering::Relaxed);

		value
	}

	pub async fn get_as<T>(&self, key: &str) -> Option<T>
	where
		T: DeserializeOwned,
	{
		let value = self.get(key).await?;

		match serde_json::from_value(value) {
			Ok(decoded) => Some(decoded),
			Err(err) => {
				tracing::warn!(error = %err, cache_key = key, "Cached value has an unexpected shape.");

				None
			},
		}
	}

	pub async fn set(&self, key: &str, value: Value, ttl: Duration) {
		if let Err(err) = self.store.set(key, value, ttl).await {
			tracing::warn!(error = %err, cache_key = key, store = self.store.name(), "Cache write failed.");
		}
	}

	pub async fn remove(&self, key: &str) -> bool {
		self.store.remove(key).await.unwrap_or_else(|err| {
			tracing::warn!(error = %err, cache_key = key, "Cache remove failed.");

			false
		})
	}

	pub async fn exists(&self, key: &str) -> bool {
		self.store.exists(key).await.unwrap_or_else(|err| {
			tracing::warn!(error = %err, cache_key = key, "Cache exists check failed.");

			false
		})
	}

	pub async fn refresh(&self, key: &str, ttl: Duration) -> bool {
		self.store.refresh(key, ttl).await.unwrap_or_else(|err| {
			tracing::warn!(error = %err, cache_key = key, "Cache refresh failed.");

			false
		})
	}

	pub async fn remove_prefix(&self, prefix: &str) -> u64 {
		self.store.remove_prefix(prefix).await.unwrap_or_else(|err| {
			tracing::warn!(error = %err, cache_prefix = prefix, "Cache prefix invalidation failed.");

			0
		})
	}

	/// Clears every entry and starts a new statistics epoch.
	pub async fn flush(&self) -> Result<()> {
		self.store.flush().await?;
		self.hits.store(0, Ordering::Relaxed);
		self.misses.store(0, Ordering::Relaxed);

		*self.last_flush_at.lock().unwrap_or_else(|err| err.into_inner()) =
			Some(OffsetDateTime::now_utc());

		tracing::info!(store = self.store.name(), "Cache flushed.");

		Ok(())
	}

	/// Returns the cached value for `key`, or runs `factory` once across all concurrent callers
	/// and caches its output for `ttl`.
	pub async fn get_or_create<T, F, Fut>(&self, key: &str, ttl: Duration, factory: F) -> Result<T>
	where
		T: Serialize + DeserializeOwned,
		F: FnOnce() -> Fut,
		Fut: Future<Output = Result<T>>,
	{
		if let Some(cached) = self.get_as(key).await {
			return Ok(cached);
		}

		let _gate = self.fill_gate.lock().await;

		// The re-check is not a lookup of its own; the miss above was already counted.
		if let Some(cached) = self.peek_as(key).await {
			return Ok(cached);
		}

		let created = factory().await?;

		match serde_json::to_value(&created) {
			Ok(value) => self.set(key, value, ttl).await,
			Err(err) => {
				tracing::warn!(error = %err, cache_key = key, "Failed to encode value for caching.");
			},
		}

		Ok(created)
	}

	async fn peek_as<T>(&self, key: &str) -> Option<T>
	where
		T: DeserializeOwned,
	{
		let value = self.store.get(key).await.ok()??;

		serde_json::from_value(value).ok()
	}

	pub async fn statistics(&self) -> CacheStatistics {
		let usage = self.store.usage().await.unwrap_or_else(|err| {
			tracing::warn!(error = %err, store = self.store.name(), "Cache usage lookup failed.");

			CacheUsage::default()
		});
		let hits = self.hits.load(Ordering::Relaxed);
		let misses = self.misses.load(Ordering::Relaxed);
		let lookups = hits + misses;

		CacheStatistics {
			store: self.store.name().to_string(),
			hits,
			misses,
			hit_rate: if lookups == 0 { 0.0 } else { hits as f64 / lookups as f64 },
			key_count: usage.key_count,
			memory_bytes: usage.memory_bytes,
			last_flush_at: *self.last_flush_at.lock().unwrap_or_else(|err| err.into_inner()),
		}
	}

	/// Writes, reads back and deletes a disposable key, surfacing store errors.
	pub async fn probe(&self) -> Result<()> {
		let token = Uuid::new_v4();
		let key = format!("{PROBE_KEY_PREFIX}{token}");
		let expected = serde_json::json!({ "probe": token });

		self.store.set(&key, expected.clone(), PROBE_TTL).await?;

		let read_back = self.store.get(&key).await;

		self.store.remove(&key).await?;

		if read_back?.as_ref() != Some(&expected) {
			return Err(Error::Cache {
				message: format!("{} store returned a different probe value.", self.store.name()),
			});
		}

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use std::sync::{Arc, atomic::AtomicUsize};

	use super::*;

	struct BrokenStore;
	impl CacheStore for BrokenStore {
		fn name(&self) -> &'static str {
			"broken"
		}

		fn get<'a>(&'a self, _key: &'a str) -> BoxFuture<'a, Result<Option<Value>>> {
			Box::pin(async { Err(Error::Cache { message: "offline".to_string() }) })
		}

		fn set<'a>(&'a self, _key: &'a str, _value: Value, _ttl: Duration) -> BoxFuture<'a, Result<()>> {
			Box::pin(async { Err(Error::Cache { message: "offline".to_string() }) })
		}

		fn remove<'a>(&'a self, _key: &'a str) -> BoxFuture<'a, Result<bool>> {
			Box::pin(async { Err(Error::Cache { message: "offline".to_string() }) })
		}

		fn exists<'a>(&'a self, _key: &'a str) -> BoxFuture<'a, Result<bool>> {
			Box::pin(async { Err(Error::Cache { message: "offline".to_string() }) })
		}

		fn refresh<'a>(&'a self, _key: &'a str, _ttl: Duration) -> BoxFuture<'a, Result<bool>> {
			Box::pin(async { Err(Error::Cache { message: "offline".to_string() }) })
		}

		fn remove_prefix<'a>(&'a self, _prefix: &'a str) -> BoxFuture<'a, Result<u64>> {
			Box::pin(async { Err(Error::Cache { message: "offline".to_string() }) })
		}

		fn flush(&self) -> BoxFuture<'_, Result<()>> {
			Box::pin(async { Err(Error::Cache { message: "offline".to_string() }) })
		}

		fn usage(&self) -> BoxFuture<'_, Result<CacheUsage>> {
			Box::pin(async { Err(Error::Cache { message: "offline".to_string() }) })
		}
	}

	#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
	async fn concurrent_misses_run_the_factory_once() {
		let cache = Arc::new(Cache::new(MemoryCacheStore::new()));
		let calls = Arc::new(AtomicUsize::new(0));
		let mut handles = Vec::new();

		for _ in 0..16 {
			let cache = cache.clone();
			let calls = calls.clone();

			handles.push(tokio::spawn(async move {
				cache
					.get_or_create("search:same", Duration::from_secs(60), || async {
						calls.fetch_add(1, Ordering::SeqCst);
						tokio::time::sleep(Duration::from_millis(20)).await;

						Ok::<_, Error>(42_u32)
					})
					.await
			}));
		}

		for handle in handles {
			let value = handle.await.expect("Task panicked.").expect("Factory failed.");

			assert_eq!(value, 42);
		}

		assert_eq!(calls.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn factory_errors_are_not_cached() {
		let cache = Cache::new(MemoryCacheStore::new());
		let failed: Result<u32> = cache
			.get_or_create("k", Duration::from_secs(60), || async {
				Err(Error::BackendUnavailable { message: "down".to_string() })
			})
			.await;

		assert!(failed.is_err());
		assert!(!cache.exists("k").await);
	}

	#[tokio::test]
	async fn counters_track_lookups_and_reset_on_flush() {
		let cache = Cache::new(MemoryCacheStore::new());

		cache.set("k", Value::from("v"), Duration::from_secs(60)).await;

		assert!(cache.get("k").await.is_some());
		assert!(cache.get("missing").await.is_none());

		let before = cache.statistics().await;

		assert_eq!((before.hits, before.misses, before.key_count), (1, 1, 1));
		assert!(before.last_flush_at.is_none());

		cache.flush().await.expect("Flush failed.");

		let after = cache.statistics().await;

		assert_eq!((after.hits, after.misses, after.key_count), (0, 0, 0));
		assert!(after.last_flush_at.is_some());
	}

	#[tokio::test]
	async fn store_failures_degrade_to_misses() {
		let cache = Cache::new(BrokenStore);

		cache.set("k", Value::from(1), Duration::from_secs(1)).await;

		assert!(cache.get("k").await.is_none());
		assert!(!cache.exists("k").await);
		assert!(!cache.remove("k").await);
		assert!(!cache.refresh("k", Duration::from_secs(1)).await);
		assert_eq!(cache.remove_prefix("search:").await, 0);
		assert_eq!(cache.statistics().await.misses, 1);
		assert!(cache.probe().await.is_err());
		assert!(cache.flush().await.is_err());
	}

	#[tokio::test]
	async fn probe_leaves_no_entries_behind() {
		let cache = Cache::new(MemoryCacheStore::new());

		cache.probe().await.expect("Probe failed.");

		let stats = cache.statistics().await;

		assert_eq!((stats.hits, stats.misses, stats.key_count), (0, 0, 0));
	}
}
