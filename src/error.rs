use thiserror::Error;

/// Error taxonomy for the indexing and query core.
///
/// The variants deliberately separate caller mistakes (`BadRequest`,
/// `Forbidden`, `NotFound`) from infrastructure failures (`Storage`,
/// `Upstream`) so the transport layer can map them to distinct responses.
/// An empty query result is not an error.
#[derive(Error, Debug)]
pub enum KgError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("graph store failure: {0}")]
    Storage(String),

    #[error("document repository failure: {0}")]
    Upstream(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl KgError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        KgError::BadRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        KgError::NotFound(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        KgError::Forbidden(message.into())
    }
}
