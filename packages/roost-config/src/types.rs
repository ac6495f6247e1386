use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub search: Search,
	#[serde(default)]
	pub indexing: Indexing,
	#[serde(default)]
	pub health: Health,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub admin_bind: String,
	pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
	pub qdrant: Qdrant,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Qdrant {
	pub url: String,
	/// Collection holding one point per unit (the unit-attributes index).
	pub units_collection: String,
	/// Collection holding one point per unit per calendar day.
	pub schedule_collection: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Search {
	/// Either "index" (Qdrant collections) or "relational" (Postgres scalar routines).
	pub backend: String,
	pub default_page_size: u32,
	pub max_page_size: u32,
	pub cache: SearchCache,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchCache {
	pub enabled: bool,
	/// Either "memory" or "postgres".
	#[serde(default = "default_cache_store")]
	pub store: String,
	pub ttl_seconds: u64,
	/// Size bound of the memory store; least valuable entries are evicted beyond it.
	#[serde(default = "default_cache_max_bytes")]
	pub max_memory_bytes: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Indexing {
	pub retry: IndexingRetry,
}

/// Retry budget honored by callers of the indexing hooks. The pipeline itself never retries.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IndexingRetry {
	pub max_attempts: u32,
	pub base_backoff_ms: u64,
	pub max_backoff_ms: u64,
}
impl Default for IndexingRetry {
	fn default() -> Self {
		Self { max_attempts: 4, base_backoff_ms: 200, max_backoff_ms: 5_000 }
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Health {
	pub window_seconds: u64,
	pub degraded_error_rate: f64,
	pub unhealthy_error_rate: f64,
	pub degraded_min_indexing_throughput: f64,
	pub unhealthy_min_indexing_throughput: f64,
	pub degraded_response_ms: f64,
	pub unhealthy_response_ms: f64,
}
impl Default for Health {
	fn default() -> Self {
		Self {
			window_seconds: 60,
			degraded_error_rate: 0.05,
			unhealthy_error_rate: 0.10,
			degraded_min_indexing_throughput: 10.0,
			unhealthy_min_indexing_throughput: 5.0,
			degraded_response_ms: 1_000.0,
			unhealthy_response_ms: 2_000.0,
		}
	}
}

fn default_cache_max_bytes() -> u64 {
	64 * 1024 * 1024
}

fn default_cache_store() -> String {
	"memory".to_string()
}
