use thiserror::Error;

/// Misuse of a construction-time API.
///
/// Failures of the work behind a [`Deferred`](crate::Deferred) never show up here; they
/// travel through the deferred's own error type.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum Error {
    #[error("no target to define methods on")]
    NoTarget,
    #[error("unknown method name: {0}")]
    UnknownMethod(String),
}
