use roost_domain::FilterError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Not found: {message}")]
	NotFound { message: String },
	#[error("Backend unavailable: {message}")]
	BackendUnavailable { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
	#[error("Qdrant error: {message}")]
	Qdrant { message: String },
	#[error("Cache error: {message}")]
	Cache { message: String },
}
impl Error {
	/// True when the caller can fix the failure by changing the request.
	pub fn is_caller_error(&self) -> bool {
		matches!(self, Self::InvalidRequest { .. } | Self::NotFound { .. })
	}
}
impl From<sqlx::Error> for Error {
	fn from(err: sqlx::Error) -> Self {
		match err {
			sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) =>
				Self::BackendUnavailable { message: err.to_string() },
			other => Self::Storage { message: other.to_string() },
		}
	}
}
impl From<roost_storage::Error> for Error {
	fn from(err: roost_storage::Error) -> Self {
		match err {
			roost_storage::Error::Sqlx(inner) => Self::from(inner),
			roost_storage::Error::InvalidArgument(message) => Self::InvalidRequest { message },
			roost_storage::Error::Qdrant(inner) => Self::Qdrant { message: inner.to_string() },
		}
	}
}
impl From<qdrant_client::QdrantError> for Error {
	fn from(err: qdrant_client::QdrantError) -> Self {
		Self::Qdrant { message: err.to_string() }
	}
}
impl From<FilterError> for Error {
	fn from(err: FilterError) -> Self {
		Self::InvalidRequest { message: err.to_string() }
	}
}
