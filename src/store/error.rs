//! Content store error types.

use thiserror::Error;

/// Errors surfaced by [`super::ContentStore`] operations.
///
/// `NotFound` and `Conflict` are separated from generic database failures so
/// the request boundary can answer 404/409 instead of a blanket 500.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no post with slug `{0}`")]
    NotFound(String),

    #[error("a post with slug `{0}` already exists")]
    Conflict(String),

    #[error("no image with id {0}")]
    ImageNotFound(i64),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;
