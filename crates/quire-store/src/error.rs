use quire_git::GitError;
use quire_stats::StatsError;

/// Errors produced by store operations.
///
/// Domain-expected absence (a missing resource or project) is never an
/// error; those surface as `None` or empty collections. What remains here is
/// infrastructure failure plus the explicit search stub.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Stats(#[from] StatsError),

    #[error("i/o error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("resource search is not implemented")]
    SearchUnimplemented,
}

pub type StoreResult<T> = Result<T, StoreError>;
