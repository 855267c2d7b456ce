pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Provider error: {message}")]
	Provider { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
	#[error("Qdrant error: {message}")]
	Qdrant { message: String },
	#[error("Backend error: {message}")]
	Backend { message: String },
	#[error("Configuration error: {message}")]
	Config { message: String },
}
impl From<sqlx::Error> for Error {
	fn from(err: sqlx::Error) -> Self {
		Self::Storage { message: err.to_string() }
	}
}
impl From<graphrag_storage::Error> for Error {
	fn from(err: graphrag_storage::Error) -> Self {
		match err {
			graphrag_storage::Error::Sqlx(inner) => Self::Storage { message: inner.to_string() },
			graphrag_storage::Error::InvalidArgument(message) => Self::Backend { message },
			graphrag_storage::Error::Qdrant(inner) => Self::Qdrant { message: inner.to_string() },
		}
	}
}
impl From<graphrag_providers::Error> for Error {
	fn from(err: graphrag_providers::Error) -> Self {
		Self::Provider { message: err.to_string() }
	}
}
