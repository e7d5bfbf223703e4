#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum DatabaseError {
    #[error("Internal database error: {0}")]
    BackendError(#[from] diesel::result::Error),

    #[error("Database pool error: {message}")]
    PoolError { message: String },

    #[error("Internal database error: {message}")]
    InternalError { message: String },
}
