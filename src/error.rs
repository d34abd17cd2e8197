use thiserror::Error;

/// Error type for task pool operations.
#[derive(Error, Debug)]
pub enum PoolError {
    /// The operation is not implemented by this pool variant.
    #[error("operation not supported by this task pool")]
    NotSupported,

    /// Thread or resource creation failed while allocating a backend.
    #[error("failed to allocate pool backend: {0}")]
    BackendAllocation(String),

    /// The caller violated a usage contract of the pool.
    ///
    /// The built-in pools report schedule-thread contract violations
    /// (unbalanced release, acquiring on the default pool) through the
    /// boolean results of those operations; this variant is the typed
    /// surface for custom pool variants whose fallible operations want to
    /// signal the same class of error.
    #[error("invalid usage: {0}")]
    InvalidUsage(String),
}

/// Result type alias for task pool operations.
pub type Result<T> = std::result::Result<T, PoolError>;
