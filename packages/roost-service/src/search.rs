//! Search entry point shared by both backends: validation, read-through caching, metrics and
//! response assembly.

pub mod qdrant;
pub mod relational;

pub use qdrant::QdrantSearch;
pub use relational::RelationalSearch;

use std::{
	sync::Arc,
	time::{Duration, Instant},
};

use serde::{Deserialize, Serialize};

use roost_domain::{SearchItem, SearchMeta, SearchQuery, SearchRequest, SearchResult};

use crate::{
	BoxFuture, Error, Result,
	cache::Cache,
	metrics::{OperationKind, PerformanceMetrics},
};

pub const SEARCH_CACHE_PREFIX: &str = "search:";

/// One page of matches plus the size of the whole match set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchPage {
	pub items: Vec<SearchItem>,
	pub total_count: u64,
}

pub trait SearchBackend
where
	Self: Send + Sync,
{
	fn name(&self) -> &'static str;

	fn search<'a>(&'a self, query: &'a SearchQuery) -> BoxFuture<'a, Result<SearchPage>>;
}

pub struct SearchEngine {
	backend: Arc<dyn SearchBackend>,
	cache: Arc<Cache>,
	metrics: Arc<PerformanceMetrics>,
	cfg: roost_config::Search,
}
impl SearchEngine {
	pub fn new(
		backend: Arc<dyn SearchBackend>,
		cache: Arc<Cache>,
		metrics: Arc<PerformanceMetrics>,
		cfg: roost_config::Search,
	) -> Self {
		Self { backend, cache, metrics, cfg }
	}

	pub fn backend_name(&self) -> &'static str {
		self.backend.name()
	}

	pub async fn search(&self, request: SearchRequest) -> Result<SearchResult> {
		let started = Instant::now();
		let outcome = self.execute(request).await;
		let elapsed = started.elapsed();

		match outcome.as_ref() {
			Ok(result) => tracing::debug!(
				backend = self.backend.name(),
				total_count = result.total_count,
				page = result.page,
				elapsed_ms = elapsed.as_millis() as u64,
				"Search completed."
			),
			Err(err) if err.is_caller_error() => {
				tracing::debug!(error = %err, "Search request rejected.");
			},
			Err(err) => {
				tracing::warn!(error = %err, backend = self.backend.name(), "Search failed.");
			},
		}

		self.metrics.record(
			OperationKind::Search,
			elapsed,
			outcome.as_ref().is_err_and(|err| !err.is_caller_error()),
		);

		outcome
	}

	async fn execute(&self, request: SearchRequest) -> Result<SearchResult> {
		let query = request.into_query(self.cfg.default_page_size, self.cfg.max_page_size)?;
		let page = if self.cfg.cache.enabled {
			let key = cache_key(self.backend.name(), &query)?;
			let ttl = Duration::from_secs(self.cfg.cache.ttl_seconds);

			self.cache.get_or_create(&key, ttl, || self.backend.search(&query)).await?
		} else {
			self.backend.search(&query).await?
		};

		Ok(assemble(self.backend.name(), &query, page))
	}
}

/// Cache keys hash the normalized query so equivalent requests share one entry.
pub fn cache_key(backend: &str, query: &SearchQuery) -> Result<String> {
	let encoded = serde_json::to_vec(query)
		.map_err(|err| Error::Cache { message: format!("Failed to encode search query: {err}.") })?;
	let mut hasher = blake3::Hasher::new();

	hasher.update(backend.as_bytes());
	hasher.update(b"\n");
	hasher.update(&encoded);

	Ok(format!("{SEARCH_CACHE_PREFIX}{}", hasher.finalize().to_hex()))
}

fn assemble(backend: &str, query: &SearchQuery, page: SearchPage) -> SearchResult {
	// Descriptive metadata rides on the first page only.
	let meta = (query.page == 1).then(|| SearchMeta {
		backend: backend.to_string(),
		applied_filters: query.applied_filters(),
		currencies: query.price_ranges.iter().map(|(currency, _)| *currency).collect(),
		nights: query.stay.map(|stay| stay.nights()),
	});

	SearchResult {
		total_pages: query.total_pages(page.total_count),
		items: page.items,
		page: query.page,
		size: query.size,
		total_count: page.total_count,
		meta,
	}
}

#[cfg(test)]
mod tests {
	use std::sync::atomic::{AtomicUsize, Ordering};

	use roost_domain::SearchFilters;

	use super::*;
	use crate::cache::MemoryCacheStore;

	struct CountingBackend {
		calls: AtomicUsize,
		fail: bool,
	}
	impl SearchBackend for CountingBackend {
		fn name(&self) -> &'static str {
			"counting"
		}

		fn search<'a>(&'a self, _query: &'a SearchQuery) -> BoxFuture<'a, Result<SearchPage>> {
			Box::pin(async move {
				self.calls.fetch_add(1, Ordering::SeqCst);

				if self.fail {
					return Err(Error::BackendUnavailable { message: "offline".to_string() });
				}

				Ok(SearchPage { items: Vec::new(), total_count: 41 })
			})
		}
	}

	fn search_cfg(cache_enabled: bool) -> roost_config::Search {
		roost_config::Search {
			backend: roost_config::SEARCH_BACKEND_INDEX.to_string(),
			default_page_size: 20,
			max_page_size: 100,
			cache: roost_config::SearchCache {
				enabled: cache_enabled,
				store: roost_config::CACHE_STORE_MEMORY.to_string(),
				ttl_seconds: 60,
				max_memory_bytes: 1024 * 1024,
			},
		}
	}

	fn build_engine(
		fail: bool,
		cache_enabled: bool,
	) -> (SearchEngine, Arc<CountingBackend>, Arc<PerformanceMetrics>) {
		let backend = Arc::new(CountingBackend { calls: AtomicUsize::new(0), fail });
		let metrics = Arc::new(PerformanceMetrics::new(Duration::from_secs(60)));
		let engine = SearchEngine::new(
			backend.clone(),
			Arc::new(Cache::new(MemoryCacheStore::new())),
			metrics.clone(),
			search_cfg(cache_enabled),
		);

		(engine, backend, metrics)
	}

	#[tokio::test]
	async fn repeated_queries_are_served_from_cache() {
		let (engine, backend, _) = build_engine(false, true);
		let request = SearchRequest::new(SearchFilters { city: Some("Aden".to_string()), ..Default::default() });
		let equivalent =
			SearchRequest::new(SearchFilters { city: Some(" aden ".to_string()), ..Default::default() });
		let first = engine.search(request).await.expect("Search failed.");
		let second = engine.search(equivalent).await.expect("Search failed.");

		assert_eq!(first, second);
		assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
		assert_eq!(first.total_pages, 3);
		assert_eq!(first.meta.map(|meta| meta.applied_filters), Some(vec!["city".to_string()]));
	}

	#[tokio::test]
	async fn disabled_cache_always_reaches_the_backend() {
		let (engine, backend, _) = build_engine(false, false);

		for _ in 0..2 {
			engine.search(SearchRequest::new(SearchFilters::default())).await.expect("Search failed.");
		}

		assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
	}

	#[tokio::test]
	async fn only_backend_failures_count_as_failed_operations() {
		let (engine, backend, metrics) = build_engine(true, true);
		let invalid = SearchRequest { page: 0, ..SearchRequest::new(SearchFilters::default()) };

		assert!(matches!(engine.search(invalid).await, Err(Error::InvalidRequest { .. })));
		assert!(matches!(
			engine.search(SearchRequest::new(SearchFilters::default())).await,
			Err(Error::BackendUnavailable { .. })
		));

		let snapshot = metrics.snapshot();

		assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
		assert_eq!(snapshot.search_ops, 2);
		assert_eq!(snapshot.failed_ops, 1);
	}

	#[tokio::test]
	async fn later_pages_carry_no_metadata() {
		let (engine, _, _) = build_engine(false, true);
		let request = SearchRequest { page: 2, ..SearchRequest::new(SearchFilters::default()) };
		let result = engine.search(request).await.expect("Search failed.");

		assert_eq!(result.page, 2);
		assert!(result.meta.is_none());
	}

	#[test]
	fn cache_keys_differ_by_backend_and_query() {
		let query = SearchRequest::new(SearchFilters::default()).into_query(20, 100).expect("Valid query.");
		let other = SearchRequest { page: 2, ..SearchRequest::new(SearchFilters::default()) }
			.into_query(20, 100)
			.expect("Valid query.");
		let key = cache_key("qdrant", &query).expect("Key must encode.");

		assert!(key.starts_with(SEARCH_CACHE_PREFIX));
		assert_eq!(key, cache_key("qdrant", &query).expect("Key must encode."));
		assert_ne!(key, cache_key("postgres", &query).expect("Key must encode."));
		assert_ne!(key, cache_key("qdrant", &other).expect("Key must encode."));
	}
}
