use crate::record::Status;

/// Errors raised by the local store, the codec, the remote client and the
/// synchronization engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("observation record {0} not found")]
    NotFound(i64),

    #[error("failed to write observation record {id}")]
    Write {
        id: i64,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read observation record {id}: {reason}")]
    Read { id: i64, reason: String },

    #[error("observation record {id} has invalid status '{status}'")]
    InvalidStatus { id: i64, status: Status },

    #[error("failed to synchronize observation record {id}: {reason}")]
    Synchronize { id: i64, reason: String },

    #[error("no default nomenclature values found")]
    NoDefaultNomenclatureValuesFound,

    #[error("a synchronization is already running, retry later")]
    SyncAlreadyRunning,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl Error {
    pub(crate) fn synchronize(id: i64, reason: impl Into<String>) -> Self {
        Error::Synchronize {
            id,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
