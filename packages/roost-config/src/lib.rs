mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Config, Health, Indexing, IndexingRetry, Postgres, Qdrant, Search, SearchCache, Service,
	Storage,
};

use std::{fs, path::Path};

pub const SEARCH_BACKEND_INDEX: &str = "index";
pub const SEARCH_BACKEND_RELATIONAL: &str = "relational";
pub const CACHE_STORE_MEMORY: &str = "memory";
pub const CACHE_STORE_POSTGRES: &str = "postgres";

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	for (label, value) in [
		("service.http_bind", &cfg.service.http_bind),
		("service.admin_bind", &cfg.service.admin_bind),
		("storage.postgres.dsn", &cfg.storage.postgres.dsn),
		("storage.qdrant.url", &cfg.storage.qdrant.url),
		("storage.qdrant.units_collection", &cfg.storage.qdrant.units_collection),
		("storage.qdrant.schedule_collection", &cfg.storage.qdrant.schedule_collection),
	] {
		if value.trim().is_empty() {
			return Err(Error::Validation { message: format!("{label} must be non-empty.") });
		}
	}

	if cfg.storage.postgres.pool_max_conns == 0 {
		return Err(Error::Validation {
			message: "storage.postgres.pool_max_conns must be greater than zero.".to_string(),
		});
	}
	if cfg.storage.qdrant.units_collection == cfg.storage.qdrant.schedule_collection {
		return Err(Error::Validation {
			message: "storage.qdrant.units_collection and storage.qdrant.schedule_collection must differ."
				.to_string(),
		});
	}
	if !matches!(cfg.search.backend.as_str(), SEARCH_BACKEND_INDEX | SEARCH_BACKEND_RELATIONAL) {
		return Err(Error::Validation {
			message: "search.backend must be one of index or relational.".to_string(),
		});
	}
	if cfg.search.default_page_size == 0 {
		return Err(Error::Validation {
			message: "search.default_page_size must be greater than zero.".to_string(),
		});
	}
	if cfg.search.default_page_size > cfg.search.max_page_size {
		return Err(Error::Validation {
			message: "search.default_page_size must not exceed search.max_page_size.".to_string(),
		});
	}
	if !matches!(cfg.search.cache.store.as_str(), CACHE_STORE_MEMORY | CACHE_STORE_POSTGRES) {
		return Err(Error::Validation {
			message: "search.cache.store must be one of memory or postgres.".to_string(),
		});
	}
	if cfg.search.cache.max_memory_bytes == 0 {
		return Err(Error::Validation {
			message: "search.cache.max_memory_bytes must be greater than zero.".to_string(),
		});
	}
	if cfg.search.cache.enabled && cfg.search.cache.ttl_seconds == 0 {
		return Err(Error::Validation {
			message: "search.cache.ttl_seconds must be greater than zero when the cache is enabled."
				.to_string(),
		});
	}

	let retry = &cfg.indexing.retry;

	if retry.max_attempts == 0 {
		return Err(Error::Validation {
			message: "indexing.retry.max_attempts must be greater than zero.".to_string(),
		});
	}
	if retry.base_backoff_ms > retry.max_backoff_ms {
		return Err(Error::Validation {
			message: "indexing.retry.base_backoff_ms must not exceed indexing.retry.max_backoff_ms."
				.to_string(),
		});
	}

	validate_health(&cfg.health)
}

fn validate_health(health: &Health) -> Result<()> {
	if health.window_seconds == 0 {
		return Err(Error::Validation {
			message: "health.window_seconds must be greater than zero.".to_string(),
		});
	}

	for (label, value) in [
		("health.degraded_error_rate", health.degraded_error_rate),
		("health.unhealthy_error_rate", health.unhealthy_error_rate),
		("health.degraded_min_indexing_throughput", health.degraded_min_indexing_throughput),
		("health.unhealthy_min_indexing_throughput", health.unhealthy_min_indexing_throughput),
		("health.degraded_response_ms", health.degraded_response_ms),
		("health.unhealthy_response_ms", health.unhealthy_response_ms),
	] {
		if !value.is_finite() {
			return Err(Error::Validation { message: format!("{label} must be a finite number.") });
		}
		if value < 0.0 {
			return Err(Error::Validation { message: format!("{label} must be zero or greater.") });
		}
	}

	if health.unhealthy_error_rate > 1.0 {
		return Err(Error::Validation {
			message: "health.unhealthy_error_rate must be 1.0 or less.".to_string(),
		});
	}
	if health.degraded_error_rate > health.unhealthy_error_rate {
		return Err(Error::Validation {
			message: "health.degraded_error_rate must not exceed health.unhealthy_error_rate."
				.to_string(),
		});
	}
	if health.degraded_min_indexing_throughput < health.unhealthy_min_indexing_throughput {
		return Err(Error::Validation {
			message: "health.degraded_min_indexing_throughput must be at least health.unhealthy_min_indexing_throughput."
				.to_string(),
		});
	}
	if health.degraded_response_ms > health.unhealthy_response_ms {
		return Err(Error::Validation {
			message: "health.degraded_response_ms must not exceed health.unhealthy_response_ms."
				.to_string(),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	cfg.search.backend = cfg.search.backend.trim().to_ascii_lowercase();
	cfg.search.cache.store = cfg.search.cache.store.trim().to_ascii_lowercase();

	if cfg.service.log_level.trim().is_empty() {
		cfg.service.log_level = "info".to_string();
	}
}
