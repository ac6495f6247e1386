pub mod admin;
pub mod cache;
pub mod health;
pub mod indexing;
pub mod lifecycle;
pub mod metrics;
pub mod qdrant_payload;
pub mod search;
pub mod source;

mod error;

pub use cache::{Cache, CacheStatistics, CacheStore};
pub use error::{Error, Result};
pub use health::{HealthMonitor, HealthReport, HealthStatus};
pub use indexing::{IndexEvent, IndexingPipeline, IndexingReport};
pub use lifecycle::{IndexInfo, IndexKind, IndexLifecycle, IndexManager, IndexesInfo};
pub use metrics::{MetricsSnapshot, OperationKind, PerformanceMetrics};
pub use search::{SearchBackend, SearchEngine, SearchPage};
pub use source::InventorySource;

use std::{future::Future, pin::Pin, sync::Arc, time::Duration};

use roost_config::Config;
use roost_domain::{SearchRequest, SearchResult};
use roost_storage::{db::Db, qdrant::QdrantStore};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Backend variants selected at composition time. Every field must target the same store.
#[derive(Clone)]
pub struct Backends {
	pub lifecycle: Arc<dyn IndexLifecycle>,
	pub indexer: Arc<dyn IndexingPipeline>,
	pub search: Arc<dyn SearchBackend>,
}

pub struct RoostService {
	pub cfg: Config,
	pub cache: Arc<Cache>,
	pub metrics: Arc<PerformanceMetrics>,
	pub indexes: Arc<IndexManager>,
	pub indexer: Arc<dyn IndexingPipeline>,
	pub search: SearchEngine,
	pub health: HealthMonitor,
}
impl RoostService {
	/// Connects to Postgres (and Qdrant for the index backend) and wires the configured variants.
	pub async fn connect(cfg: Config) -> Result<Self> {
		let db = Arc::new(Db::connect(&cfg.storage.postgres).await?);

		db.ensure_schema().await?;

		let cache = Arc::new(match cfg.search.cache.store.as_str() {
			roost_config::CACHE_STORE_POSTGRES => Cache::new(cache::PostgresCacheStore::new(db.clone())),
			_ => Cache::new(cache::MemoryCacheStore::with_max_bytes(cfg.search.cache.max_memory_bytes)),
		});
		let backends = match cfg.search.backend.as_str() {
			roost_config::SEARCH_BACKEND_RELATIONAL => Backends {
				lifecycle: Arc::new(lifecycle::RelationalLifecycle::new(db.clone())),
				indexer: Arc::new(indexing::RelationalIndexer::new(cache.clone())),
				search: Arc::new(search::RelationalSearch::new(db)),
			},
			_ => {
				let qdrant = Arc::new(QdrantStore::new(&cfg.storage.qdrant)?);
				let inventory = Arc::new(source::PgInventory::new(db));

				Backends {
					lifecycle: Arc::new(lifecycle::QdrantLifecycle::new(qdrant.clone())),
					indexer: Arc::new(indexing::QdrantIndexer::new(
						qdrant.clone(),
						inventory,
						cache.clone(),
					)),
					search: Arc::new(search::QdrantSearch::new(qdrant)),
				}
			},
		};

		tracing::info!(
			backend = backends.search.name(),
			cache_store = cache.store_name(),
			cache_enabled = cfg.search.cache.enabled,
			"Search service wired."
		);

		Ok(Self::with_backends(cfg, cache, backends))
	}

	pub fn with_backends(cfg: Config, cache: Arc<Cache>, backends: Backends) -> Self {
		let metrics = Arc::new(PerformanceMetrics::new(Duration::from_secs(cfg.health.window_seconds)));
		let indexes = Arc::new(IndexManager::new(backends.lifecycle));
		let search =
			SearchEngine::new(backends.search, cache.clone(), metrics.clone(), cfg.search.clone());
		let health =
			HealthMonitor::new(cache.clone(), indexes.clone(), metrics.clone(), cfg.health.clone());

		Self { cfg, cache, metrics, indexes, indexer: backends.indexer, search, health }
	}

	pub async fn search(&self, request: SearchRequest) -> Result<SearchResult> {
		self.search.search(request).await
	}
}
