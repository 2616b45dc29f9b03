/// Errors produced by statistics stores.
#[derive(Debug, thiserror::Error)]
pub enum StatsError {
    #[error("i/o error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt statistics file {path}: {source}")]
    Corrupt {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

pub type StatsResult<T> = Result<T, StatsError>;
