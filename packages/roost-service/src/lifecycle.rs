//! Creation, teardown and introspection of the two search indexes.

pub mod qdrant;
pub mod relational;

pub use qdrant::QdrantLifecycle;
pub use relational::RelationalLifecycle;

use std::sync::{Arc, LazyLock};

use serde::Serialize;
use tokio::sync::Mutex;

use crate::{BoxFuture, Result};

// Shared by every manager in the process so concurrent start-ups build each index once.
static INDEX_BUILD_LOCK: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexKind {
	/// One document per unit with its searchable attributes.
	Units,
	/// One document per unit per calendar day.
	Schedule,
}
impl IndexKind {
	pub const ALL: [Self; 2] = [Self::Units, Self::Schedule];

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Units => "units",
			Self::Schedule => "schedule",
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexInfo {
	pub kind: IndexKind,
	pub name: String,
	pub exists: bool,
	pub document_count: u64,
	pub record_count: u64,
	pub term_count: u64,
	pub indexing: bool,
}
impl IndexInfo {
	pub fn missing(kind: IndexKind, name: impl Into<String>) -> Self {
		Self {
			kind,
			name: name.into(),
			exists: false,
			document_count: 0,
			record_count: 0,
			term_count: 0,
			indexing: false,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexesInfo {
	pub backend: String,
	pub indexes: Vec<IndexInfo>,
}

/// Backend primitives. "Already exists" on create and "not found" on drop are successes.
pub trait IndexLifecycle
where
	Self: Send + Sync,
{
	fn backend_name(&self) -> &'static str;

	fn index_exists(&self, kind: IndexKind) -> BoxFuture<'_, Result<bool>>;

	fn create_index(&self, kind: IndexKind) -> BoxFuture<'_, Result<()>>;

	fn drop_index(&self, kind: IndexKind, delete_documents: bool) -> BoxFuture<'_, Result<()>>;

	fn index_info(&self, kind: IndexKind) -> BoxFuture<'_, Result<IndexInfo>>;

	/// Short description of the live backend, used as a connectivity probe.
	fn backend_info(&self) -> BoxFuture<'_, Result<String>>;
}

pub struct IndexManager {
	backend: Arc<dyn IndexLifecycle>,
}
impl IndexManager {
	pub fn new(backend: Arc<dyn IndexLifecycle>) -> Self {
		Self { backend }
	}

	pub fn backend_name(&self) -> &'static str {
		self.backend.backend_name()
	}

	/// Creates whichever index is missing. Returns the kinds that were built.
	pub async fn ensure_indexes_exist(&self) -> Result<Vec<IndexKind>> {
		if self.missing_indexes().await?.is_empty() {
			return Ok(Vec::new());
		}

		let _guard = INDEX_BUILD_LOCK.lock().await;
		let missing = self.missing_indexes().await?;

		for kind in &missing {
			self.create(*kind).await?;
		}

		Ok(missing)
	}

	pub async fn create_indexes(&self, recreate: bool) -> Result<()> {
		let _guard = INDEX_BUILD_LOCK.lock().await;

		if recreate {
			for kind in IndexKind::ALL {
				self.drop(kind, false).await?;
			}
		}

		for kind in IndexKind::ALL {
			self.create(kind).await?;
		}

		Ok(())
	}

	pub async fn drop_indexes(&self, delete_documents: bool) -> Result<()> {
		let _guard = INDEX_BUILD_LOCK.lock().await;

		for kind in IndexKind::ALL {
			self.drop(kind, delete_documents).await?;
		}

		Ok(())
	}

	pub async fn indexes_info(&self) -> Result<IndexesInfo> {
		let mut indexes = Vec::with_capacity(IndexKind::ALL.len());

		for kind in IndexKind::ALL {
			indexes.push(self.backend.index_info(kind).await?);
		}

		Ok(IndexesInfo { backend: self.backend.backend_name().to_string(), indexes })
	}

	pub async fn backend_info(&self) -> Result<String> {
		self.backend.backend_info().await
	}

	async fn missing_indexes(&self) -> Result<Vec<IndexKind>> {
		let mut missing = Vec::new();

		for kind in IndexKind::ALL {
			if !self.backend.index_exists(kind).await? {
				missing.push(kind);
			}
		}

		Ok(missing)
	}

	async fn create(&self, kind: IndexKind) -> Result<()> {
		match self.backend.create_index(kind).await {
			Ok(()) => {
				tracing::info!(backend = self.backend.backend_name(), index = kind.as_str(), "Index created.");

				Ok(())
			},
			Err(err) => {
				tracing::error!(
					error = %err,
					backend = self.backend.backend_name(),
					index = kind.as_str(),
					"Index creation failed."
				);

				Err(err)
			},
		}
	}

	async fn drop(&self, kind: IndexKind, delete_documents: bool) -> Result<()> {
		match self.backend.drop_index(kind, delete_documents).await {
			Ok(()) => {
				tracing::info!(
					backend = self.backend.backend_name(),
					index = kind.as_str(),
					delete_documents,
					"Index dropped."
				);

				Ok(())
			},
			Err(err) => {
				tracing::error!(
					error = %err,
					backend = self.backend.backend_name(),
					index = kind.as_str(),
					"Index drop failed."
				);

				Err(err)
			},
		}
	}
}
