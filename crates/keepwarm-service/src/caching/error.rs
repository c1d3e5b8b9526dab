use thiserror::Error;

/// An error on the registration, resolution or replay path.
///
/// Replay errors ([`UnknownTarget`](Self::UnknownTarget),
/// [`UnknownOperation`](Self::UnknownOperation),
/// [`Invocation`](Self::Invocation), [`Malformed`](Self::Malformed)) are
/// always recovered inside the refresher: the broken descriptor is deleted
/// and the error is logged, never surfaced past the worker unit.
///
/// Resolution and evaluation errors indicate configuration defects and
/// propagate to the triggering call instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    /// No cache could be resolved for a required name.
    #[error("cannot find cache named `{0}`")]
    NoSuchCache(String),
    /// A condition or key expression failed to evaluate.
    #[error("expression evaluation failed: {0}")]
    Evaluation(String),
    /// The shared store failed a read or write.
    #[error("shared store error: {0}")]
    Store(String),
    /// A replay descriptor names a target that is not registered.
    #[error("unknown replay target `{0}`")]
    UnknownTarget(String),
    /// A replay descriptor names an operation its target does not have.
    #[error("unknown operation `{1}` on target `{0}`")]
    UnknownOperation(String, String),
    /// The replayed operation itself failed.
    #[error("replay invocation failed: {0}")]
    Invocation(String),
    /// A value read from the shared store does not have the expected shape.
    #[error("malformed: {0}")]
    Malformed(String),
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}

/// Result alias used throughout the caching layer.
pub type CacheResult<T = ()> = Result<T, CacheError>;
